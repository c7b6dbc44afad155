//! Tujali Health Shared Utilities
//!
//! This crate provides common functionality for all Tujali Health crates:
//! - Standard error type and result alias
//! - Pagination types
//! - Input validation with accumulated field errors

use serde::{Deserialize, Serialize};

// Re-export commonly used items
pub use errors::*;
pub use types::*;
pub use validation::*;

/// Declare a fieldless enum stored and transmitted as a lowercase string.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` (erroring with
/// [`HealthError::ValidationError`]) and serde impls using the same text.
#[macro_export]
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::HealthError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err($crate::HealthError::ValidationError(format!(
                        "Unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Error types shared by every domain crate
pub mod errors {
    use super::*;
    use thiserror::Error;

    /// Standard error types for consistent error handling
    #[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
    pub enum HealthError {
        #[error("Not found: {0}")]
        NotFound(String),
        #[error("Unauthorized: {0}")]
        Unauthorized(String),
        #[error("Validation error: {0}")]
        ValidationError(String),
        /// The operation conflicts with the current state of the record
        #[error("Conflict: {0}")]
        Conflict(String),
        #[error("Storage error: {0}")]
        StorageError(String),
        #[error("Internal error: {0}")]
        InternalError(String),
    }

    impl HealthError {
        pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
            HealthError::NotFound(format!("{} {}", kind, id))
        }

        pub fn validation(message: impl Into<String>) -> Self {
            HealthError::ValidationError(message.into())
        }

        pub fn conflict(message: impl Into<String>) -> Self {
            HealthError::Conflict(message.into())
        }

        /// Whether the error came from the persistence layer rather than the caller
        pub fn is_storage(&self) -> bool {
            matches!(self, HealthError::StorageError(_) | HealthError::InternalError(_))
        }
    }

    pub type HealthResult<T> = Result<T, HealthError>;
}

/// Common types used across crates
pub mod types {
    use super::*;

    /// Input for paginated queries
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PaginationInput {
        #[serde(default)]
        pub offset: usize,
        #[serde(default = "PaginationInput::default_limit")]
        pub limit: usize,
    }

    impl PaginationInput {
        pub const MAX_LIMIT: usize = 100;

        fn default_limit() -> usize {
            50
        }

        pub fn validate(&self) -> HealthResult<()> {
            if self.limit > Self::MAX_LIMIT {
                return Err(HealthError::validation(format!(
                    "Limit cannot exceed {}",
                    Self::MAX_LIMIT
                )));
            }
            if self.limit == 0 {
                return Err(HealthError::validation("Limit must be greater than 0"));
            }
            Ok(())
        }

        /// Slice a fully loaded list into one page
        pub fn paginate<T>(&self, items: Vec<T>) -> PaginatedResult<T> {
            let total = items.len();
            let page = items.into_iter().skip(self.offset).take(self.limit).collect();
            PaginatedResult::new(page, total, self)
        }
    }

    impl Default for PaginationInput {
        fn default() -> Self {
            Self {
                offset: 0,
                limit: Self::default_limit(),
            }
        }
    }

    /// Result wrapper for paginated queries
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PaginatedResult<T> {
        pub items: Vec<T>,
        pub total: usize,
        pub offset: usize,
        pub limit: usize,
        pub has_more: bool,
    }

    impl<T> PaginatedResult<T> {
        pub fn new(items: Vec<T>, total: usize, pagination: &PaginationInput) -> Self {
            Self {
                has_more: pagination.offset + items.len() < total,
                items,
                total,
                offset: pagination.offset,
                limit: pagination.limit,
            }
        }
    }
}

// ============================================================================
// Input Validation
// ============================================================================

/// Validation helpers used by the integrity crates
pub mod validation {
    use super::*;

    /// A single field error
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ValidationError {
        pub field: String,
        pub message: String,
        pub code: ValidationErrorCode,
    }

    /// Specific validation error codes for programmatic handling
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub enum ValidationErrorCode {
        Required,
        InvalidFormat,
        OutOfRange,
        TooLong,
        TooShort,
        InvalidCharacters,
        DuplicateValue,
        InvalidReference,
    }

    impl std::fmt::Display for ValidationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}: {} ({:?})", self.field, self.message, self.code)
        }
    }

    /// Validation result that can accumulate multiple errors
    #[derive(Clone, Debug, Default)]
    pub struct ValidationResult {
        pub errors: Vec<ValidationError>,
    }

    impl ValidationResult {
        pub fn new() -> Self {
            Self { errors: Vec::new() }
        }

        pub fn add_error(&mut self, field: &str, message: &str, code: ValidationErrorCode) {
            self.errors.push(ValidationError {
                field: field.to_string(),
                message: message.to_string(),
                code,
            });
        }

        pub fn is_valid(&self) -> bool {
            self.errors.is_empty()
        }

        pub fn into_result(self) -> HealthResult<()> {
            if self.is_valid() {
                Ok(())
            } else {
                let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
                Err(HealthError::ValidationError(format!(
                    "Validation failed: {}",
                    messages.join("; ")
                )))
            }
        }

        pub fn merge(&mut self, other: ValidationResult) {
            self.errors.extend(other.errors);
        }

        /// Whether any error was recorded for the given field
        pub fn has_error_for(&self, field: &str) -> bool {
            self.errors.iter().any(|e| e.field == field)
        }
    }

    /// Validate a required free-text field with length bounds (in characters)
    pub fn validate_text(value: &str, field_name: &str, min: usize, max: usize) -> ValidationResult {
        let mut result = ValidationResult::new();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            result.add_error(field_name, &format!("{} is required", field_name), ValidationErrorCode::Required);
            return result;
        }

        let len = trimmed.chars().count();
        if len < min {
            result.add_error(
                field_name,
                &format!("{} must be at least {} characters", field_name, min),
                ValidationErrorCode::TooShort,
            );
        }
        if len > max {
            result.add_error(
                field_name,
                &format!("{} cannot exceed {} characters", field_name, max),
                ValidationErrorCode::TooLong,
            );
        }

        result
    }

    /// Validate a phone number as delivered by the carrier or typed by staff
    ///
    /// Phone numbers must be:
    /// - 9-15 digits long
    /// - Digits only, with an optional leading `+`
    pub fn validate_phone_number(phone: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        let phone = phone.trim();

        if phone.is_empty() {
            result.add_error("phone_number", "Phone number is required", ValidationErrorCode::Required);
            return result;
        }

        let digits = phone.strip_prefix('+').unwrap_or(phone);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            result.add_error(
                "phone_number",
                "Phone number can only contain digits and a leading +",
                ValidationErrorCode::InvalidCharacters,
            );
            return result;
        }

        if digits.len() < 9 {
            result.add_error("phone_number", "Phone number is too short", ValidationErrorCode::TooShort);
        }
        if digits.len() > 15 {
            result.add_error("phone_number", "Phone number is too long", ValidationErrorCode::TooLong);
        }

        result
    }

    /// Validate an email address (basic structural check)
    pub fn validate_email(email: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        let email = email.trim();

        if email.is_empty() {
            result.add_error("email", "Email is required", ValidationErrorCode::Required);
            return result;
        }

        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !domain.contains('@')
            }
            None => false,
        };
        if !valid || email.chars().any(char::is_whitespace) {
            result.add_error("email", "Email address is not valid", ValidationErrorCode::InvalidFormat);
        }

        result
    }

    /// Validate a monetary amount (must be positive and finite)
    pub fn validate_amount(amount: f64, field_name: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        if amount.is_nan() || amount.is_infinite() {
            result.add_error(field_name, "Amount must be a number", ValidationErrorCode::InvalidFormat);
        } else if amount <= 0.0 {
            result.add_error(field_name, "Amount must be greater than zero", ValidationErrorCode::OutOfRange);
        }

        result
    }

    /// Validate an integer within an inclusive range
    pub fn validate_range(value: i64, min: i64, max: i64, field_name: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        if value < min || value > max {
            result.add_error(
                field_name,
                &format!("{} must be between {} and {}, got {}", field_name, min, max, value),
                ValidationErrorCode::OutOfRange,
            );
        }

        result
    }
}
