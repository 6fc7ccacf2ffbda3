//! Markdown files with a YAML metadata header.
//!
//! ```text
//! ---
//! id: 6f1c...
//! title: Fix login
//! ---
//! Body text, stored verbatim.
//! ```
//!
//! The codec is generic over the metadata type; absent optional fields fall back
//! to their serde defaults.

use serde::de::DeserializeOwned;
use serde::Serialize;

const DELIMITER: &str = "---";

/// Distinct failure kinds when decoding or encoding a frontmatter document.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("missing frontmatter delimiter")]
    MissingOpeningDelimiter,

    #[error("missing closing frontmatter delimiter")]
    MissingClosingDelimiter,

    #[error("malformed frontmatter metadata: {0}")]
    Metadata(#[from] serde_yaml::Error),
}

/// Splits `content` into typed metadata and the body that follows the closing delimiter.
///
/// One newline directly after the closing delimiter is dropped; the rest of the body is
/// returned untouched.
pub fn parse<T: DeserializeOwned>(content: &str) -> Result<(T, String), FrontmatterError> {
    let rest = content
        .strip_prefix(DELIMITER)
        .ok_or(FrontmatterError::MissingOpeningDelimiter)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    // An empty metadata block puts the closing delimiter at the very start.
    let (yaml, after) = if let Some(after) = rest.strip_prefix(DELIMITER) {
        ("", after)
    } else {
        let closing = format!("\n{DELIMITER}");
        let end = rest
            .find(&closing)
            .ok_or(FrontmatterError::MissingClosingDelimiter)?;
        (&rest[..end], &rest[end + closing.len()..])
    };

    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);

    let meta = if yaml.trim().is_empty() {
        serde_yaml::from_str("{}")?
    } else {
        serde_yaml::from_str(yaml)?
    };

    Ok((meta, body.to_string()))
}

/// Renders metadata and body as `---\n<yaml>---\n<body>`.
pub fn serialize<T: Serialize>(meta: &T, body: &str) -> Result<String, FrontmatterError> {
    let yaml = serde_yaml::to_string(meta)?;

    let mut out = String::with_capacity(yaml.len() + body.len() + 8);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(body);
    Ok(out)
}
