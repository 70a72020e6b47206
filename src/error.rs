//! Error types for demprep

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::BoundingBox;

/// Result type for demprep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category, used by callers that only care about which part
/// of the run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or unusable inputs (tiles, vector layers, mosaic inputs)
    Input,
    /// Empty AOI intersection, unresolvable CRS, malformed geometry
    Geometry,
    /// Degenerate value range during normalization
    Range,
    /// Missing or rejected imagery API credentials
    Authentication,
    /// Non-success response from the imagery API
    RemoteProcessing,
    /// A network call exceeded its time limit
    Timeout,
    /// File read/write or encoding failure
    Io,
    /// Invalid configuration
    Config,
}

/// Error types that can occur in demprep operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TIFF decoding or encoding error
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration decoding error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A stage was handed no inputs at all
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Inputs that cannot be combined (CRS, band count, dtype, no-data)
    #[error("Incompatible inputs: {0}")]
    IncompatibleInput(String),

    /// A required input file or layer does not exist
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// Raster violates a structural invariant
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    /// CRS cannot be resolved by the projection backend
    #[error("Unsupported CRS {crs}: {reason}")]
    UnsupportedCrs {
        /// CRS identifier as given
        crs: String,
        /// Backend message
        reason: String,
    },

    /// Clip geometries do not overlap the raster
    #[error("Geometries do not intersect the raster extent")]
    EmptyIntersection,

    /// Geometry could not be parsed or used
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Zero dynamic range, normalization impossible
    #[error("Degenerate value range: vmin == vmax == {vmin}")]
    DegenerateRange {
        /// Lower stretch bound
        vmin: f64,
        /// Upper stretch bound
        vmax: f64,
    },

    /// Every pixel is no-data
    #[error("Raster contains no valid pixels")]
    NoValidPixels,

    /// Credentials missing or rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Imagery API answered with a non-success status
    #[error("{0}")]
    RemoteProcessing(Box<RemoteProcessingError>),

    /// Network call exceeded its bound
    #[error("{operation} timed out after {}s", .limit.as_secs())]
    Timeout {
        /// Which call timed out
        operation: &'static str,
        /// Configured limit
        limit: Duration,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns the taxonomy category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyInput(_) | Error::IncompatibleInput(_) | Error::MissingInput(_) => {
                ErrorKind::Input
            }
            Error::UnsupportedCrs { .. } | Error::EmptyIntersection | Error::InvalidGeometry(_) => {
                ErrorKind::Geometry
            }
            Error::DegenerateRange { .. } | Error::NoValidPixels => ErrorKind::Range,
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::RemoteProcessing(_) => ErrorKind::RemoteProcessing,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Config(_) | Error::Yaml(_) => ErrorKind::Config,
            Error::Io(_)
            | Error::Tiff(_)
            | Error::Json(_)
            | Error::Http(_)
            | Error::InvalidRaster(_)
            | Error::Unsupported(_) => ErrorKind::Io,
        }
    }

    /// Maps a reqwest failure onto `Timeout` when it elapsed the client limit
    pub(crate) fn from_http(err: reqwest::Error, operation: &'static str, limit: Duration) -> Self {
        if err.is_timeout() {
            Error::Timeout { operation, limit }
        } else {
            Error::Http(err)
        }
    }
}

impl From<RemoteProcessingError> for Error {
    fn from(error: RemoteProcessingError) -> Self {
        Error::RemoteProcessing(Box::new(error))
    }
}

/// Structured failure returned by the imagery processing API
#[derive(Debug, Clone)]
pub struct RemoteProcessingError {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status
    pub reason: String,
    /// Decoded JSON error body, if the server sent JSON
    pub body: Option<serde_json::Value>,
    /// Leading part of the raw body when it was not JSON
    pub raw_body: Option<String>,
    /// Requested bounding box
    pub bbox: BoundingBox,
    /// Requested output width
    pub width: u32,
    /// Requested output height
    pub height: u32,
}

impl RemoteProcessingError {
    /// Maximum number of characters kept from a non-JSON body
    pub const RAW_BODY_LIMIT: usize = 2000;

    /// Server-side error type, if the body carried one
    pub fn error_type(&self) -> Option<String> {
        let err = self.body.as_ref()?.get("error")?;
        match err {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Server-side message, looked up at the top level and inside `error`
    pub fn message(&self) -> Option<&str> {
        let body = self.body.as_ref()?;
        body.get("message")
            .or_else(|| body.get("error").and_then(|e| e.get("message")))
            .and_then(|m| m.as_str())
    }

    /// Requested pixel count
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for RemoteProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Imagery processing request failed: HTTP {} {}", self.status, self.reason)?;

        if let Some(body) = &self.body {
            writeln!(f, "Server response: {}", body)?;
            if let Some(kind) = self.error_type() {
                writeln!(f, "Error type: {}", kind)?;
            }
            if let Some(message) = self.message() {
                writeln!(f, "Message: {}", message)?;
            }
        } else if let Some(raw) = &self.raw_body {
            writeln!(f, "Raw response: {}", raw)?;
        }

        writeln!(f, "Request context:")?;
        writeln!(
            f,
            "  BBOX: [{}, {}, {}, {}]",
            self.bbox.min_x, self.bbox.min_y, self.bbox.max_x, self.bbox.max_y
        )?;
        write!(
            f,
            "  Size: {} x {} = {} pixels",
            self.width,
            self.height,
            self.pixel_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_error(body: Option<serde_json::Value>) -> RemoteProcessingError {
        RemoteProcessingError {
            status: 400,
            reason: "Bad Request".to_string(),
            body,
            raw_body: None,
            bbox: BoundingBox::new(126.0, 33.0, 130.0, 38.0),
            width: 2500,
            height: 1582,
        }
    }

    #[test]
    fn test_error_display() {
        let err = Error::IncompatibleInput("band count".to_string());
        assert_eq!(err.to_string(), "Incompatible inputs: band count");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::EmptyInput("tiles".into()).kind(), ErrorKind::Input);
        assert_eq!(Error::EmptyIntersection.kind(), ErrorKind::Geometry);
        assert_eq!(
            Error::DegenerateRange { vmin: 1.0, vmax: 1.0 }.kind(),
            ErrorKind::Range
        );
        assert_eq!(Error::Authentication("x".into()).kind(), ErrorKind::Authentication);
        assert_eq!(
            Error::Timeout { operation: "token exchange", limit: Duration::from_secs(30) }.kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::from(remote_error(None)).kind(), ErrorKind::RemoteProcessing);
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout { operation: "imagery fetch", limit: Duration::from_secs(180) };
        assert_eq!(err.to_string(), "imagery fetch timed out after 180s");
    }

    #[test]
    fn test_remote_error_nested_message() {
        let body = serde_json::json!({
            "error": { "status": 400, "reason": "Bad Request", "message": "Too many pixels" }
        });
        let err = remote_error(Some(body));
        assert_eq!(err.message(), Some("Too many pixels"));

        let text = err.to_string();
        assert!(text.contains("HTTP 400 Bad Request"));
        assert!(text.contains("Too many pixels"));
        assert!(text.contains("2500 x 1582 = 3955000 pixels"));
    }

    #[test]
    fn test_remote_error_raw_body() {
        let mut err = remote_error(None);
        err.raw_body = Some("<html>gateway</html>".to_string());
        assert!(err.to_string().contains("Raw response: <html>gateway</html>"));
        assert_eq!(err.error_type(), None);
    }
}
