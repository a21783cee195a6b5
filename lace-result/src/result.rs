use crate::error::Error;

/// Result type alias used throughout lace.
///
/// Shorthand for `std::result::Result<T, Error>`. All lace operations that
/// can fail return this type.
pub type Result<T> = std::result::Result<T, Error>;
