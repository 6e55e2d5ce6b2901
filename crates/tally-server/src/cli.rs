//! Command line interface
//!
//! `tally serve` runs the HTTP service; `tally aggregate` runs the pipeline
//! over a local file. Unset options fall back to [`ServerConfig::default`].

use crate::config::{LogFormat, ServerConfig};
use anyhow::Context;
use clap::error::ErrorKind;
use clap::{value_parser, Arg, ArgMatches, Command};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use tally_pipeline::{aggregate_reader, serialize, HeaderPolicy, PipelineOptions, RunSummary};

/// Parsed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    /// Log output format (global option)
    pub log_format: LogFormat,
    /// Selected subcommand
    pub command: CliCommand,
}

/// Selected subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// `tally serve`
    Serve(ServerConfig),
    /// `tally aggregate`
    Aggregate(AggregateArgs),
}

/// Arguments of `tally aggregate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateArgs {
    /// CSV file to read
    pub input: PathBuf,
    /// `None` writes to stdout
    pub output: Option<PathBuf>,
    /// First-row handling
    pub header: HeaderPolicy,
}

fn header_arg() -> Arg {
    Arg::new("header")
        .long("header")
        .env("TALLY_HEADER")
        .value_parser(value_parser!(HeaderPolicy))
        .help("First-row handling: detect, present or absent [default: detect]")
}

/// Build the clap command tree
pub fn command() -> Command {
    Command::new("tally")
        .version(crate::VERSION)
        .about("Group-and-sum CSV aggregation service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .env("TALLY_LOG_FORMAT")
                .value_parser(value_parser!(LogFormat))
                .help("Log output: pretty or json [default: pretty]"),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the upload/download HTTP service")
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .env("TALLY_BIND")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address [default: 0.0.0.0:8080]"),
                )
                .arg(
                    Arg::new("public-url")
                        .long("public-url")
                        .env("TALLY_PUBLIC_URL")
                        .help("Base URL used in download links [default: http://localhost:8080]"),
                )
                .arg(
                    Arg::new("allowed-origin")
                        .long("allowed-origin")
                        .env("TALLY_ALLOWED_ORIGIN")
                        .help("Origin allowed by CORS [default: http://localhost:3000]"),
                )
                .arg(
                    Arg::new("storage-dir")
                        .long("storage-dir")
                        .env("TALLY_STORAGE_DIR")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory holding generated artifacts [default: processed_files]"),
                )
                .arg(
                    Arg::new("artifact-prefix")
                        .long("artifact-prefix")
                        .env("TALLY_ARTIFACT_PREFIX")
                        .help("Prefix of generated artifact names [default: city_sales]"),
                )
                .arg(
                    Arg::new("max-upload-bytes")
                        .long("max-upload-bytes")
                        .env("TALLY_MAX_UPLOAD_BYTES")
                        .value_parser(value_parser!(u64))
                        .help("Largest accepted upload in bytes [default: 10485760]"),
                )
                .arg(header_arg()),
        )
        .subcommand(
            Command::new("aggregate")
                .about("Aggregate a local CSV file")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .short('i')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("CSV file to read"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Result file (stdout when omitted)"),
                )
                .arg(header_arg()),
        )
}

/// Parse the process arguments, exiting on `--help` or bad input
pub fn parse() -> Cli {
    match try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    }
}

/// Parse an explicit argument list
///
/// # Errors
/// Returns the clap error for unknown or invalid arguments
pub fn try_parse_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    let log_format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or_default();

    let command = match matches.subcommand() {
        Some(("serve", args)) => CliCommand::Serve(server_config(args)),
        Some(("aggregate", args)) => CliCommand::Aggregate(aggregate_args(args)?),
        _ => {
            return Err(clap::Error::raw(
                ErrorKind::MissingSubcommand,
                "a subcommand is required\n",
            ))
        }
    };
    Ok(Cli {
        log_format,
        command,
    })
}

fn server_config(args: &ArgMatches) -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(bind) = args.get_one::<SocketAddr>("bind") {
        config = config.with_bind(*bind);
    }
    if let Some(url) = args.get_one::<String>("public-url") {
        config = config.with_public_url(url);
    }
    if let Some(origin) = args.get_one::<String>("allowed-origin") {
        config = config.with_allowed_origin(origin);
    }
    if let Some(dir) = args.get_one::<PathBuf>("storage-dir") {
        config = config.with_storage_dir(dir);
    }
    if let Some(prefix) = args.get_one::<String>("artifact-prefix") {
        config = config.with_artifact_prefix(prefix);
    }
    if let Some(max) = args.get_one::<u64>("max-upload-bytes") {
        config = config.with_max_upload_bytes(*max);
    }
    if let Some(header) = args.get_one::<HeaderPolicy>("header") {
        config = config.with_header(*header);
    }
    config
}

fn aggregate_args(args: &ArgMatches) -> Result<AggregateArgs, clap::Error> {
    let input = args.get_one::<PathBuf>("input").cloned().ok_or_else(|| {
        clap::Error::raw(ErrorKind::MissingRequiredArgument, "--input is required\n")
    })?;
    Ok(AggregateArgs {
        input,
        output: args.get_one::<PathBuf>("output").cloned(),
        header: args
            .get_one::<HeaderPolicy>("header")
            .copied()
            .unwrap_or_default(),
    })
}

/// Run `tally aggregate`
///
/// The output file is only created once the whole input has aggregated.
///
/// # Errors
/// Fails on unreadable input, a pipeline error, or an unwritable output
pub fn run_aggregate(args: &AggregateArgs) -> anyhow::Result<RunSummary> {
    let mut input = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let options = PipelineOptions::new().with_header(args.header);
    let (mapping, summary) = aggregate_reader(&mut input, &options)
        .with_context(|| format!("failed to aggregate {}", args.input.display()))?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            serialize(&mapping, &mut out)?;
            out.flush()
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serialize(&mapping, &mut out)?;
        }
    }
    Ok(summary)
}
