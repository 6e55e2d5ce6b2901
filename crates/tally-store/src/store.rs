//! Flat-file artifact store
//!
//! One directory, one file per artifact. Artifacts are written through an
//! [`ArtifactWriter`] to a hidden partial file and only become visible under
//! their final name on [`ArtifactWriter::commit`].

use crate::error::StoreError;
use crate::name::{ArtifactName, NameError, MAX_NAME_LEN};
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

/// Extension given to generated artifact names
pub const ARTIFACT_EXTENSION: &str = "csv";

/// Attempts at finding an unused name before giving up
const MAX_CREATE_ATTEMPTS: usize = 16;

/// Suffix of in-progress artifact files (they also gain a leading `.`)
const PARTIAL_SUFFIX: &str = ".partial";

/// Check that every name generated from `prefix` is usable
///
/// Validates the widest possible name (`i64::MAX` stamp) and requires its
/// partial-file form to fit in [`MAX_NAME_LEN`] as well.
///
/// # Errors
/// - `NameError::InvalidCharacter`, `ParentReference`, `Hidden` for unsafe prefixes
/// - `NameError::TooLong` if a generated or partial name would exceed the limit
pub fn validate_prefix(prefix: &str) -> Result<(), NameError> {
    let widest = format!("{prefix}_{}.{ARTIFACT_EXTENSION}", i64::MAX);
    widest.parse::<ArtifactName>()?;
    let partial_len = 1 + widest.len() + PARTIAL_SUFFIX.len();
    if partial_len > MAX_NAME_LEN {
        return Err(NameError::TooLong(partial_len));
    }
    Ok(())
}

/// Directory-backed artifact store
///
/// Construct once at startup and share by reference (`Arc<ArtifactStore>`).
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    prefix: String,
    /// Highest timestamp handed out, keeps names strictly increasing
    last_stamp: AtomicI64,
}

impl ArtifactStore {
    /// Open (and create if needed) a store rooted at `root`
    ///
    /// # Errors
    /// - `StoreError::InvalidName` if `prefix` fails [`validate_prefix`]
    /// - `StoreError::Io` if the directory cannot be created
    pub async fn open(root: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let prefix = prefix.into();
        validate_prefix(&prefix)?;

        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io_error(&root, e))?;

        tracing::info!(root = %root.display(), %prefix, "artifact store ready");
        Ok(Self {
            root,
            prefix,
            last_stamp: AtomicI64::new(0),
        })
    }

    /// Store root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Prefix of generated names
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate the next unique name
    ///
    /// Derived from the current time in nanoseconds, forced strictly
    /// increasing within this store.
    #[must_use]
    pub fn next_name(&self) -> ArtifactName {
        let stamp = self.next_stamp();
        // prefix was validated in `open`, the stamp is digits only
        ArtifactName::from_generated(format!("{}_{stamp}.{ARTIFACT_EXTENSION}", self.prefix))
    }

    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(last.saturating_add(1));
            match self.last_stamp.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Resolve a validated name inside the store root
    #[inline]
    #[must_use]
    pub fn path_of(&self, name: &ArtifactName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// True for names of the form `{prefix}_<digits>.csv`
    fn is_generated(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix(ARTIFACT_EXTENSION))
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|stamp| !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()))
    }

    fn partial_path_of(&self, name: &ArtifactName) -> PathBuf {
        self.root.join(format!(".{name}{PARTIAL_SUFFIX}"))
    }

    /// Start a new artifact
    ///
    /// Blocking; call from a blocking context when running under tokio.
    ///
    /// # Errors
    /// - `StoreError::Io` if the partial file cannot be created
    pub fn create(&self) -> Result<ArtifactWriter, StoreError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let name = self.next_name();
            let target = self.path_of(&name);
            let partial = self.partial_path_of(&name);
            if target.exists() && attempts < MAX_CREATE_ATTEMPTS {
                continue;
            }

            match OpenOptions::new().write(true).create_new(true).open(&partial) {
                Ok(file) => {
                    tracing::debug!(artifact = %name, "artifact writer opened");
                    return Ok(ArtifactWriter {
                        name,
                        partial,
                        target,
                        file: Some(BufWriter::new(file)),
                        bytes_written: 0,
                        committed: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts < MAX_CREATE_ATTEMPTS => {}
                Err(e) => return Err(StoreError::io_error(&partial, e)),
            }
        }
    }

    /// Read a committed artifact by caller-supplied name
    ///
    /// The name is validated before any filesystem access.
    ///
    /// # Errors
    /// - `StoreError::InvalidName` if `name` could escape the store
    /// - `StoreError::NotFound` if no such artifact exists
    /// - `StoreError::Io` on other read failures
    pub async fn read(&self, name: &str) -> Result<(ArtifactName, Vec<u8>), StoreError> {
        let name: ArtifactName = name.parse().map_err(|e| {
            tracing::warn!(requested = name, error = %e, "rejected artifact name");
            StoreError::InvalidName(e)
        })?;

        let path = self.path_of(&name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((name, bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.into_string()))
            }
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    /// Names of committed artifacts, sorted
    ///
    /// Only `{prefix}_<digits>.csv` files count; partial files and anything
    /// else in the directory are skipped.
    ///
    /// # Errors
    /// - `StoreError::Io` if the directory cannot be listed
    pub async fn list(&self) -> Result<Vec<ArtifactName>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io_error(&self.root, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io_error(&self.root, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry
                .file_name()
                .to_str()
                .filter(|s| self.is_generated(s))
                .and_then(|s| s.parse::<ArtifactName>().ok())
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Sink for one artifact
///
/// Dropping without [`commit`](Self::commit) discards the partial file.
#[derive(Debug)]
pub struct ArtifactWriter {
    name: ArtifactName,
    partial: PathBuf,
    target: PathBuf,
    file: Option<BufWriter<File>>,
    bytes_written: u64,
    committed: bool,
}

impl ArtifactWriter {
    /// Name the artifact will have once committed
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ArtifactName {
        &self.name
    }

    /// Bytes accepted so far
    #[inline]
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush, sync and publish under the final name
    ///
    /// # Errors
    /// - `StoreError::Io` if flushing, syncing or renaming fails
    pub fn commit(mut self) -> Result<ArtifactName, StoreError> {
        let writer = self.file.take().ok_or_else(|| {
            StoreError::io_error(&self.partial, io::Error::new(io::ErrorKind::Other, "writer already closed"))
        })?;
        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io_error(&self.partial, e.into_error()))?;
        file.sync_all()
            .map_err(|e| StoreError::io_error(&self.partial, e))?;
        drop(file);

        std::fs::rename(&self.partial, &self.target)
            .map_err(|e| StoreError::io_error(&self.target, e))?;
        self.committed = true;

        tracing::info!(artifact = %self.name, bytes = self.bytes_written, "artifact committed");
        Ok(self.name.clone())
    }

    fn inner(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already closed"))
    }
}

impl Write for ArtifactWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner()?.write(buf)?;
        self.bytes_written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?.flush()
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.partial) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.partial.display(), error = %e, "failed to discard partial artifact");
            }
        } else {
            tracing::debug!(artifact = %self.name, "partial artifact discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn temp_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("processed"), "city_sales")
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn open_creates_directory() {
        let (_dir, store) = temp_store().await;
        assert!(store.root().is_dir());
        assert_eq!(store.prefix(), "city_sales");
    }

    #[tokio::test]
    async fn open_rejects_unsafe_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArtifactStore::open(dir.path(), "../escape").await;
        assert!(matches!(result, Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn prefix_must_leave_room_for_stamp_and_partial_suffix() {
        // 255 - len("_9223372036854775807.csv") - len(".") - len(".partial")
        let widest_ok = "a".repeat(222);
        assert!(validate_prefix(&widest_ok).is_ok());
        assert_eq!(
            validate_prefix(&"a".repeat(223)),
            Err(NameError::TooLong(256))
        );
        assert!(matches!(
            validate_prefix(&"a".repeat(240)),
            Err(NameError::TooLong(_))
        ));
        assert_eq!(validate_prefix("../x"), Err(NameError::ParentReference));
    }

    #[tokio::test]
    async fn open_rejects_overlong_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArtifactStore::open(dir.path(), "a".repeat(240)).await;
        assert!(matches!(
            result,
            Err(StoreError::InvalidName(NameError::TooLong(_)))
        ));
    }

    #[tokio::test]
    async fn longest_accepted_prefix_can_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "a".repeat(222)).await.unwrap();
        let mut writer = store.create().unwrap();
        writer.write_all(b"k,1\n").unwrap();
        let name = writer.commit().unwrap();
        assert_eq!(store.list().await.unwrap(), vec![name]);
    }

    #[tokio::test]
    async fn generated_names_are_unique_and_increasing() {
        let (_dir, store) = temp_store().await;
        let names: Vec<_> = (0..1000).map(|_| store.next_name()).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        let stamps: Vec<i64> = names
            .iter()
            .map(|n| {
                n.as_str()
                    .trim_start_matches("city_sales_")
                    .trim_end_matches(".csv")
                    .parse()
                    .unwrap()
            })
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn commit_publishes_artifact() {
        let (_dir, store) = temp_store().await;
        let mut writer = store.create().unwrap();
        writer.write_all(b"a,1\n").unwrap();
        assert_eq!(writer.bytes_written(), 4);
        let name = writer.commit().unwrap();

        let (read_name, bytes) = store.read(name.as_str()).await.unwrap();
        assert_eq!(read_name, name);
        assert_eq!(bytes, b"a,1\n");
    }

    #[tokio::test]
    async fn uncommitted_writer_leaves_nothing_behind() {
        let (_dir, store) = temp_store().await;
        let name = {
            let mut writer = store.create().unwrap();
            writer.write_all(b"partial").unwrap();
            writer.name().clone()
        };

        assert!(matches!(
            store.read(name.as_str()).await,
            Err(StoreError::NotFound(_))
        ));
        let leftovers = std::fs::read_dir(store.root()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn read_rejects_traversal_before_touching_disk() {
        let (_dir, store) = temp_store().await;
        for name in ["../secret.csv", "a/b.csv", "..", ".hidden", ""] {
            assert!(
                matches!(store.read(name).await, Err(StoreError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn list_skips_partial_and_foreign_entries() {
        let (_dir, store) = temp_store().await;
        let mut first = store.create().unwrap();
        first.write_all(b"x,1\n").unwrap();
        let first = first.commit().unwrap();

        let _pending = store.create().unwrap();
        std::fs::create_dir(store.root().join("subdir")).unwrap();
        std::fs::write(store.root().join("bad name.csv"), b"").unwrap();
        std::fs::write(store.root().join("notes.txt"), b"").unwrap();
        std::fs::write(store.root().join("other_report.csv"), b"").unwrap();
        std::fs::write(store.root().join("city_sales_.csv"), b"").unwrap();
        std::fs::write(store.root().join("city_sales_12x.csv"), b"").unwrap();

        assert_eq!(store.list().await.unwrap(), vec![first]);
    }
}
