use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// URL validation utilities
pub struct UrlValidator;

impl UrlValidator {
    /// Validate URL format, allowing only HTTP and HTTPS.
    pub fn validate(url_str: &str) -> ValidationResult<Url> {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() == "http" || url.scheme() == "https" {
                    Ok(url)
                } else {
                    Err(ValidationError::InvalidUrl(format!(
                        "Only HTTP and HTTPS schemes allowed, got: {}",
                        url.scheme()
                    )))
                }
            }
            Err(_) => Err(ValidationError::InvalidUrl(url_str.to_string())),
        }
    }
}

/// File validation utilities
pub struct FileValidator;

fn unsafe_filename_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("static regex"))
}

impl FileValidator {
    /// Reduce a client-supplied filename to a flat, ASCII-only name that can
    /// neither traverse directories nor smuggle header syntax.
    ///
    /// Path separators become word breaks, whitespace runs become `_`, any
    /// character outside `[A-Za-z0-9_.-]` is dropped and leading or trailing
    /// dots and underscores are trimmed. `"../../etc/passwd"` becomes
    /// `"etc_passwd"`.
    pub fn sanitize_filename(filename: &str) -> String {
        let flattened = filename.replace(['/', '\\'], " ");
        let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
        let stripped = unsafe_filename_chars().replace_all(&joined, "");
        stripped.trim_matches(|c| c == '.' || c == '_').to_string()
    }

    /// Sanitize and reject names that end up empty.
    pub fn validate_filename(filename: &str) -> ValidationResult<String> {
        let sanitized = Self::sanitize_filename(filename);
        if sanitized.is_empty() {
            Err(ValidationError::InvalidFilename(filename.to_string()))
        } else {
            Ok(sanitized)
        }
    }
}
