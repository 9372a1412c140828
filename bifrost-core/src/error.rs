use serde::Serialize;
use thiserror::Error;

/// Unified error type for the admin control plane and the store layer.
///
/// Maps onto the wire contract `{"error_code": string, "message": string}`
/// with one of four codes: `invalid_data` (400), `not_found` (404),
/// `UNKNOWN_ERROR` (500), or "unsupported operation" (501).
#[derive(Error, Debug)]
pub enum BifrostError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] figment::Error),

    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_code: &'static str,
    message: String,
}

impl BifrostError {
    pub fn status_code(&self) -> u16 {
        match self {
            BifrostError::InvalidData(_) => 400,
            BifrostError::NotFound(_) => 404,
            BifrostError::Unsupported(_) => 501,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            BifrostError::InvalidData(_) => "invalid_data",
            BifrostError::NotFound(_) => "not_found",
            BifrostError::Unsupported(_) => "unsupported operation",
            _ => "UNKNOWN_ERROR",
        }
    }

    /// `{"error_code": ..., "message": ...}`, serialized to bytes.
    pub fn to_json_body(&self) -> Vec<u8> {
        let body = ErrorBody {
            error_code: self.error_code(),
            message: self.to_string(),
        };
        serde_json::to_vec(&body).unwrap_or_else(|_| {
            br#"{"error_code":"UNKNOWN_ERROR","message":"failed to serialize error"}"#.to_vec()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_data_is_400() {
        let err = BifrostError::InvalidData("bad field".into());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "invalid_data");
    }

    #[test]
    fn not_found_is_404() {
        let err = BifrostError::NotFound("route r1".into());
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "not_found");
    }

    #[test]
    fn unsupported_is_501() {
        let err = BifrostError::Unsupported("count on this store".into());
        assert_eq!(err.status_code(), 501);
        assert_eq!(err.error_code(), "unsupported operation");
    }

    #[test]
    fn unknown_defaults_to_500() {
        let err = BifrostError::Unknown("boom".into());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.error_code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn json_body_has_both_fields() {
        let err = BifrostError::NotFound("r1".into());
        let parsed: serde_json::Value = serde_json::from_slice(&err.to_json_body()).unwrap();
        assert_eq!(parsed["error_code"], "not_found");
        assert!(parsed["message"].as_str().unwrap().contains("r1"));
    }

    #[test]
    fn io_error_maps_to_unknown() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: BifrostError = io_err.into();
        assert_eq!(err.status_code(), 500);
    }
}
