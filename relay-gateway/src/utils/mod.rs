pub mod validation;

pub use validation::{FileValidator, UrlValidator, ValidationError, ValidationResult};
