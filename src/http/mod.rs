//! HTTP/1.1 protocol types.
//!
//! This module provides the primitives the dispatcher is built on:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], [`ResponseWriter`],
//! and the [`BodySink`] streaming body sinks.

use std::fmt;

pub mod body;
pub mod headers;
pub mod request;
pub mod response;

pub use body::BodySink;
pub use headers::Headers;
pub use request::Request;
pub use response::ResponseWriter;

/// An HTTP response status code.
///
/// Each code carries a canonical reason phrase and a default response body
/// used when the dispatcher answers without a file: 200 gets an empty body,
/// the well-known error codes get their short page text, and anything else
/// gets a generic page naming the numeric code.
///
/// # Examples
///
/// ```
/// use fsroute::http::StatusCode;
///
/// assert_eq!(StatusCode::Forbidden.as_u16(), 403);
/// assert_eq!(StatusCode::Forbidden.canonical_reason(), "Forbidden");
/// assert_eq!(StatusCode::Forbidden.default_body(), "Forbidden");
/// assert_eq!(StatusCode::Ok.default_body(), "");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,
    NoContent = 204,

    // 3xx Redirection
    MovedPermanently = 301,
    Found = 302,
    NotModified = 304,

    // 4xx Client Error
    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    PayloadTooLarge = 413,

    // 5xx Server Error
    InternalServerError = 500,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NoContent => "No Content",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::NotModified => "Not Modified",
            Self::BadRequest => "Bad Request",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Returns the default body text sent when this code is answered
    /// without a resolved file.
    pub fn default_body(self) -> String {
        match self {
            Self::Ok => String::new(),
            Self::Forbidden => "Forbidden".to_owned(),
            Self::NotFound => "Not Found".to_owned(),
            Self::InternalServerError => "Internal Error".to_owned(),
            other => format!("Something went wrong, status code {}", other.as_u16()),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method.
///
/// The resolver serves every method the same way (method-based routing is
/// out of scope), but the method is parsed and surfaced for logging and for
/// delegate handlers that care.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            other => Self::Custom(other.to_owned()),
        })
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bodies_match_status_pages() {
        assert_eq!(StatusCode::Ok.default_body(), "");
        assert_eq!(StatusCode::Forbidden.default_body(), "Forbidden");
        assert_eq!(StatusCode::NotFound.default_body(), "Not Found");
        assert_eq!(
            StatusCode::InternalServerError.default_body(),
            "Internal Error"
        );
        assert_eq!(
            StatusCode::ServiceUnavailable.default_body(),
            "Something went wrong, status code 503"
        );
    }

    #[test]
    fn method_round_trip() {
        let m: Method = "GET".parse().unwrap();
        assert_eq!(m, Method::Get);
        let m: Method = "PURGE".parse().unwrap();
        assert_eq!(m, Method::Custom("PURGE".to_owned()));
        assert_eq!(m.as_str(), "PURGE");
    }
}
