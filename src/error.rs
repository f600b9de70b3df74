use std::fmt;

#[derive(Debug)]
pub enum SerialPressError {
    /// Malformed request payload; rejected before any output is produced.
    InvalidInput(String),
    /// An upstream asset (background, overlay, font) is unusable.
    InvalidAsset(String),
    /// Object-store read or write failed; retry policy belongs to the caller.
    Store(String),
    /// Output serialization failed.
    Pdf(String),
    Io(std::io::Error),
}

impl fmt::Display for SerialPressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialPressError::InvalidInput(message) => {
                write!(f, "invalid input: {}", message)
            }
            SerialPressError::InvalidAsset(message) => {
                write!(f, "invalid asset: {}", message)
            }
            SerialPressError::Store(message) => write!(f, "object store error: {}", message),
            SerialPressError::Pdf(message) => write!(f, "pdf error: {}", message),
            SerialPressError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for SerialPressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerialPressError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SerialPressError {
    fn from(value: std::io::Error) -> Self {
        SerialPressError::Io(value)
    }
}
