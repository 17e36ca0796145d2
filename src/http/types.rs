//! Core HTTP protocol types

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// Outcome of serving one request.
        ///
        /// The set is closed: every request ends in exactly one of these.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            /// Numeric status code, e.g. `404`.
            #[inline]
            pub const fn as_u16(&self) -> u16 {
                match self { $(
                    StatusCode::$name => $num,
                )+ }
            }

            /// Code and reason phrase, e.g. `"404 Not Found"`.
            #[inline]
            pub const fn as_str(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => concat!($num, " ", $str),
                )+ }
            }

            // Returns the status line as bytes (e.g., `b"HTTP/1.0 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn first_line(&self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => concat!("HTTP/1.0 ", $num, " ", $str, "\r\n").as_bytes(),
                )+ }
            }

            // Complete response with a small HTML page naming the status.
            #[inline]
            pub(crate) const fn error_page(&self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => concat!(
                        "HTTP/1.0 ", $num, " ", $str, "\r\n",
                        "Content-Type: text/html\r\n",
                        "\r\n",
                        "<html><head><title>", $num, " ", $str, "</title></head>\n",
                        "<body><h1>", $num, " ", $str, "</h1></body></html>\n",
                    ).as_bytes(),
                )+ }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC1945, Section 9.2](https://datatracker.ietf.org/doc/html/rfc1945#section-9.2)]
    Ok = (200, "OK");
    /// [[RFC1945, Section 9.4](https://datatracker.ietf.org/doc/html/rfc1945#section-9.4)]
    BadRequest = (400, "Bad Request");
    /// [[RFC1945, Section 9.4](https://datatracker.ietf.org/doc/html/rfc1945#section-9.4)]
    NotFound = (404, "Not Found");
    /// [[RFC1945, Section 9.5](https://datatracker.ietf.org/doc/html/rfc1945#section-9.5)]
    InternalServerError = (500, "Internal Server Error");
}

impl StatusCode {
    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

// HEADER

/// A single request header as it appeared on the wire.
///
/// The name keeps its original casing, the value is trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub(crate) fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn first_line() {
        #[rustfmt::skip]
        let cases = [
            (StatusCode::Ok,                  "HTTP/1.0 200 OK\r\n"),
            (StatusCode::BadRequest,          "HTTP/1.0 400 Bad Request\r\n"),
            (StatusCode::NotFound,            "HTTP/1.0 404 Not Found\r\n"),
            (StatusCode::InternalServerError, "HTTP/1.0 500 Internal Server Error\r\n"),
        ];

        for (status, line) in cases {
            assert_eq!(str_op(status.first_line()), line);
            assert!(line.contains(status.as_str()));
            assert!(line.contains(&status.as_u16().to_string()));
        }
    }

    #[test]
    fn error_page() {
        let page = str_op(StatusCode::NotFound.error_page());

        assert!(page.starts_with("HTTP/1.0 404 Not Found\r\nContent-Type: text/html\r\n\r\n"));
        assert!(page.contains("<h1>404 Not Found</h1>"));
        assert_eq!(page.matches("\r\n\r\n").count(), 1);
    }

    #[test]
    fn only_ok_is_ok() {
        assert!(StatusCode::Ok.is_ok());
        assert!(!StatusCode::BadRequest.is_ok());
        assert!(!StatusCode::NotFound.is_ok());
        assert!(!StatusCode::InternalServerError.is_ok());
    }
}
