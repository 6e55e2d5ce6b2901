//! Testing utilities for the Tally workspace
//!
//! Shared scenario inputs, multipart request bodies, and order-independent
//! output comparison.

#![allow(missing_docs)]

pub const HEADER_ONLY: &str = "City,Product,Sales";

/// Three data rows, no header; New York appears twice
pub const SCENARIO_A: &str =
    "New York,Laptop,1200.50\nLos Angeles,Tablet,800.00\nNew York,Tablet,750.00";

/// Header, then a non-numeric measure on row 2
pub const SCENARIO_B: &str =
    "City,Product,Sales\nNew York,Laptop,abc\nLos Angeles,Tablet,800.00";

/// Two-field header row
pub const SCENARIO_C: &str = "City,Product\nNew York,Laptop,1200.50";

/// Scenario A with a header row in front
pub const WITH_HEADER: &str =
    "City,Product,Sales\nNew York,Laptop,1200.50\nLos Angeles,Tablet,800.00\nNew York,Tablet,750.00";

pub const BOUNDARY: &str = "tally-test-boundary";

/// Split output into lines and sort them, for order-independent comparison
pub fn sorted_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

/// `Content-Type` header value matching [`BOUNDARY`]
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Builder for `multipart/form-data` request bodies
#[derive(Debug, Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file part
    pub fn file(mut self, field: &str, filename: &str, content_type: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Append a plain text part
    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    /// Close the body
    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// Single `csv_file` upload with `text/csv` content type
pub fn csv_upload(content: &str) -> Vec<u8> {
    MultipartBody::new()
        .file("csv_file", "sales.csv", "text/csv", content.as_bytes())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_lines_ignores_order_and_blank_lines() {
        assert_eq!(sorted_lines("b,2\na,1\n\n"), vec!["a,1", "b,2"]);
    }

    #[test]
    fn multipart_body_is_terminated() {
        let body = String::from_utf8(csv_upload("a,b,1")).unwrap();
        assert!(body.starts_with(&format!("--{BOUNDARY}\r\n")));
        assert!(body.contains("name=\"csv_file\""));
        assert!(body.ends_with(&format!("--{BOUNDARY}--\r\n")));
    }
}
