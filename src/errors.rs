use crate::StatusCode;
use std::{error, fmt, io};

#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    EmptyRequest,
    InvalidRequestLine,
    InvalidHeader,
    LineTooLong,
    TooManyHeaders,
    InvalidEncoding,
    ReadTimeout,
    Read(IoError),

    NotFound,
    OutsideRoot,

    UnsupportedFileType,
    NotAccessible,

    Io(IoError),
    CgiSpawn(IoError),
    CgiTimeout,
    WriteTimeout,
}

macro_rules! http_errors {
    ($($name:ident => $status:ident;)*) => {
        pub(crate) const fn status(&self) -> StatusCode {
            match self { $(
                Self::$name { .. } => StatusCode::$status,
            )* }
        }
    };
}

impl ErrorKind {
    http_errors! {
        EmptyRequest => BadRequest;
        InvalidRequestLine => BadRequest;
        InvalidHeader => BadRequest;
        LineTooLong => BadRequest;
        TooManyHeaders => BadRequest;
        InvalidEncoding => BadRequest;
        ReadTimeout => BadRequest;
        Read => BadRequest;

        NotFound => NotFound;
        OutsideRoot => NotFound;

        UnsupportedFileType => BadRequest;
        NotAccessible => NotFound;

        Io => InternalServerError;
        CgiSpawn => InternalServerError;
        CgiTimeout => InternalServerError;
        WriteTimeout => InternalServerError;
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) | Self::Io(e) | Self::CgiSpawn(e) => write!(f, "{:?}: {}", self, e.0),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let io = || IoError(io::Error::from(io::ErrorKind::BrokenPipe));

        #[rustfmt::skip]
        let cases = [
            (ErrorKind::EmptyRequest,        StatusCode::BadRequest),
            (ErrorKind::InvalidRequestLine,  StatusCode::BadRequest),
            (ErrorKind::InvalidHeader,       StatusCode::BadRequest),
            (ErrorKind::LineTooLong,         StatusCode::BadRequest),
            (ErrorKind::TooManyHeaders,      StatusCode::BadRequest),
            (ErrorKind::InvalidEncoding,     StatusCode::BadRequest),
            (ErrorKind::ReadTimeout,         StatusCode::BadRequest),
            (ErrorKind::Read(io()),          StatusCode::BadRequest),
            (ErrorKind::NotFound,            StatusCode::NotFound),
            (ErrorKind::OutsideRoot,         StatusCode::NotFound),
            (ErrorKind::UnsupportedFileType, StatusCode::BadRequest),
            (ErrorKind::NotAccessible,       StatusCode::NotFound),
            (ErrorKind::Io(io()),            StatusCode::InternalServerError),
            (ErrorKind::CgiSpawn(io()),      StatusCode::InternalServerError),
            (ErrorKind::CgiTimeout,          StatusCode::InternalServerError),
            (ErrorKind::WriteTimeout,        StatusCode::InternalServerError),
        ];

        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }

    #[test]
    fn io_errors_compare_by_kind() {
        let a = ErrorKind::from(io::Error::new(io::ErrorKind::NotFound, "a"));
        let b = ErrorKind::from(io::Error::new(io::ErrorKind::NotFound, "b"));
        let c = ErrorKind::from(io::Error::new(io::ErrorKind::PermissionDenied, "a"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.to_string().starts_with("Io("));
        assert!(a.to_string().ends_with(": a"));
    }
}
