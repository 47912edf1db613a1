//! Request-line recognition.
//!
//! Only the first `GET <path> HTTP/<d>.<d>` occurrence in the received bytes matters; anything
//! around it (headers, a body, garbage) is ignored.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Version echoed in a 400 when nothing in the request looks like a version token.
pub const FALLBACK_VERSION: &str = "HTTP/1.0";

static REQUEST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"GET ([A-Za-z0-9_\-./]*) (HTTP/[0-9]\.[0-9])").expect("invalid request regex")
});

static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"HTTP/[0-9]\.[0-9]").expect("invalid version regex"));

/// A well-formed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// URL path, always starting with `/`.
    pub target: String,
    /// Protocol token such as `HTTP/1.1`.
    pub version: String,
}

/// The request could not be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Malformed;

impl Request {
    pub fn parse(data: &[u8]) -> Result<Self, Malformed> {
        let captures = REQUEST_LINE.captures(data).ok_or(Malformed)?;
        let target = captures.get(1).ok_or(Malformed)?.as_bytes();
        let version = captures.get(2).ok_or(Malformed)?.as_bytes();
        if !target.starts_with(b"/") {
            return Err(Malformed);
        }
        // Both captures are ASCII-only by construction.
        Ok(Self {
            target: String::from_utf8_lossy(target).into_owned(),
            version: String::from_utf8_lossy(version).into_owned(),
        })
    }
}

/// Version token to answer a malformed request with: the first one found anywhere in `data`.
pub fn fallback_version(data: &[u8]) -> String {
    VERSION
        .find(data)
        .map(|version| String::from_utf8_lossy(version.as_bytes()).into_owned())
        .unwrap_or_else(|| FALLBACK_VERSION.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    use test_case::test_case;

    #[test_case(b"GET / HTTP/1.1\r\n\r\n", "/", "HTTP/1.1" ; "root")]
    #[test_case(b"GET /a.txt HTTP/1.0\r\n\r\n", "/a.txt", "HTTP/1.0" ; "file")]
    #[test_case(b"GET /sub/ HTTP/1.1\r\nHost: x\r\n\r\n", "/sub/", "HTTP/1.1" ; "with headers")]
    #[test_case(b"GET /a-b_c/d.e HTTP/2.0", "/a-b_c/d.e", "HTTP/2.0" ; "all path characters")]
    #[test_case(b"junk GET /x HTTP/1.1", "/x", "HTTP/1.1" ; "leading junk")]
    #[test_case(b"GET /x HTTP/1.1 GET /y HTTP/1.0", "/x", "HTTP/1.1" ; "first match wins")]
    #[test_case(b"GET /HTTP/1.1 HTTP/1.0", "/HTTP/1.1", "HTTP/1.0" ; "version-like path")]
    #[test_case(b"\xff\xfeGET /bin HTTP/1.1\xff", "/bin", "HTTP/1.1" ; "surrounding binary")]
    fn parse_accepts(data: &[u8], target: &str, version: &str) {
        assert_eq!(
            Request::parse(data),
            Ok(Request {
                target: target.to_string(),
                version: version.to_string(),
            })
        );
    }

    #[test_case(b"" ; "empty read")]
    #[test_case(b"POST / HTTP/1.1\r\n\r\n" ; "other method")]
    #[test_case(b"get / HTTP/1.1\r\n\r\n" ; "lowercase method")]
    #[test_case(b"GET a.txt HTTP/1.1\r\n\r\n" ; "no leading slash")]
    #[test_case(b"GET  HTTP/1.1\r\n\r\n" ; "empty path")]
    #[test_case(b"GET /a?b=c HTTP/1.1\r\n\r\n" ; "query string")]
    #[test_case(b"GET /a%20b HTTP/1.1\r\n\r\n" ; "percent escape")]
    #[test_case(b"GET / HTTP/x.1\r\n\r\n" ; "bad version")]
    #[test_case(b"GET / FTP/1.1\r\n\r\n" ; "bad protocol")]
    #[test_case(b"GET /\tHTTP/1.1\r\n\r\n" ; "tab separator")]
    #[test_case(b"GET / HTTP/1." ; "truncated")]
    #[test_case(b"\x00\x01\x02\x03" ; "binary")]
    fn parse_rejects(data: &[u8]) {
        assert_eq!(Request::parse(data), Err(Malformed));
    }

    #[test_case(b"POST / HTTP/1.1\r\n\r\n", "HTTP/1.1" ; "version still present")]
    #[test_case(b"\x00\x01\x02", "HTTP/1.0" ; "binary")]
    #[test_case(b"", "HTTP/1.0" ; "empty")]
    fn fallback_version_works(data: &[u8], version: &str) {
        assert_eq!(fallback_version(data), version);
    }
}
