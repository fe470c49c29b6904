use thiserror::Error;

/// Errors returned by map record classification and decoding.
///
/// # Examples
/// ```
/// use densoxdf_core::MapInfoError;
///
/// let err = MapInfoError::UnrecognizedType { type_id: 0x2b };
/// assert!(err.to_string().contains("unrecognized map type"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapInfoError {
    #[error("unrecognized map type: {type_id:#04x}")]
    UnrecognizedType { type_id: u8 },
    #[error("malformed record: need {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },
}
