use failure::{Backtrace, Fail};
use std::fmt;

/// The category of a [`WireError`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Malformed or unexpected wire content, an unresolvable type id, or a failed dynamic
    /// load of a serializer implementation.
    Corrupt,
    /// An invariant violation that was not caused by wire data, e.g. a container
    /// serializer registered with the wrong number of type arguments.
    Internal,
    /// Failure of the underlying byte stream.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Corrupt => f.write_str("corrupt"),
            ErrorKind::Internal => f.write_str("internal"),
            ErrorKind::Io => f.write_str("io"),
        }
    }
}

#[derive(Debug)]
/// An error raised by a codec, the registry or a serializer.
///
/// Errors are raised at the point of detection and are never retried or suppressed inside
/// the codec.
pub struct WireError {
    kind: ErrorKind,
    message: String,
    position: Option<usize>,
    detail: Option<String>,
    cause: Option<failure::Error>,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WireError>;

impl WireError {
    /// Creates a new `WireError`.
    ///
    /// # Arguments
    ///
    /// * `kind: ErrorKind` - The category of the error.
    /// * `message: impl Into<String>` - The message associated with the error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        WireError {
            kind,
            message: message.into(),
            position: None,
            detail: None,
            cause: None,
        }
    }

    /// Creates a [`ErrorKind::Corrupt`] error.
    pub fn corrupt(message: impl Into<String>) -> Self { Self::new(ErrorKind::Corrupt, message) }

    /// Creates a [`ErrorKind::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self { Self::new(ErrorKind::Internal, message) }

    /// Creates a [`ErrorKind::Io`] error.
    pub fn io(message: impl Into<String>) -> Self { Self::new(ErrorKind::Io, message) }

    /// Attaches the byte offset at which the error was detected.
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Attaches a diagnostic dump of the surrounding buffer content.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attaches the failure that caused this error.
    pub fn with_cause(mut self, cause: failure::Error) -> Self {
        self.cause = Some(cause);
        self
    }

    /// The category of the error.
    pub fn kind(&self) -> ErrorKind { self.kind }

    /// The message, without position or kind.
    pub fn message(&self) -> &str { &self.message }

    /// Byte offset into the buffer, if known.
    pub fn position(&self) -> Option<usize> { self.position }

    /// Buffer context around [`position`](WireError::position), if captured.
    pub fn detail(&self) -> Option<&str> { self.detail.as_deref() }

    pub fn is_corrupt(&self) -> bool { self.kind == ErrorKind::Corrupt }

    pub fn is_internal(&self) -> bool { self.kind == ErrorKind::Internal }
}

impl Fail for WireError {
    fn cause(&self) -> Option<&dyn Fail> { self.cause.as_ref().map(failure::Error::as_fail) }

    fn backtrace(&self) -> Option<&Backtrace> { self.cause.as_ref().map(failure::Error::backtrace) }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)?;
        if let Some(position) = self.position {
            write!(f, " (at position {})", position)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failure::format_err;

    #[test]
    fn display_includes_position() {
        let e = WireError::corrupt("Expecting character :").at(12);
        assert_eq!(e.to_string(), "corrupt error: Expecting character : (at position 12)");
        assert_eq!(e.position(), Some(12));
        assert!(e.is_corrupt());
    }

    #[test]
    fn cause_is_exposed_through_fail() {
        let e = WireError::corrupt("No serializer for typeId=77").with_cause(format_err!("boom"));
        let cause = Fail::cause(&e).expect("cause");
        assert_eq!(cause.to_string(), "boom");
        assert!(e.to_string().ends_with(": boom"));
    }
}
