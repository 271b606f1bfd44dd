//! Minimal parsing of the HTTP messages embedded in archive record blocks.

use crate::error::{ArchiveError, Result};
use crate::reader::trim_eol;
use crate::record::HeaderMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub status_code: i32,
    pub reason: String,
}

impl StatusLine {
    pub fn parse(line: &str) -> Result<Self> {
        if !line.starts_with("HTTP") {
            return Err(ArchiveError::RecoverableParse(format!(
                "Failed parse of http status line: {:?}",
                line.chars().take(64).collect::<String>()
            )));
        }

        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default().to_string();
        let status_code = parts
            .next()
            .and_then(|code| code.trim().parse::<i32>().ok())
            .ok_or_else(|| {
                ArchiveError::RecoverableParse(format!("Missing status code in {:?}", line))
            })?;
        let reason = parts.next().unwrap_or_default().trim().to_string();

        Ok(Self {
            version,
            status_code,
            reason,
        })
    }
}

/// Status line and headers of an HTTP response block.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusLine,
    pub headers: HeaderMap,
    /// Offset in the block where the entity body starts
    pub content_begin: usize,
}

/// Returns the next line starting at `pos` (without its EOL) and the
/// position after it, or `None` when the line has no terminating newline.
fn next_line(block: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = block.get(pos..)?;
    let end = rest.iter().position(|&b| b == b'\n')?;
    Some((trim_eol(&rest[..=end]), pos + end + 1))
}

/// Parses `Name: value` lines starting at `pos` until a blank line or the
/// end of the block. Returns the headers and the offset after the blank line.
pub fn parse_header_block(block: &[u8], pos: usize) -> (HeaderMap, usize) {
    let mut headers = HeaderMap::new();
    let mut pos = pos;

    loop {
        let (line, next) = match next_line(block, pos) {
            Some(found) => found,
            None => {
                // Last line without a newline still counts as a header.
                let tail = block.get(pos..).unwrap_or_default();
                if !tail.is_empty() {
                    push_header(&mut headers, tail);
                }
                return (headers, block.len());
            }
        };
        pos = next;
        if line.is_empty() {
            return (headers, pos);
        }
        push_header(&mut headers, line);
    }
}

fn push_header(headers: &mut HeaderMap, line: &[u8]) {
    let line = String::from_utf8_lossy(line);
    if let Some((name, value)) = line.split_once(':') {
        let name = name.trim();
        if !name.is_empty() {
            headers.insert(name, value.trim());
        }
    }
}

/// Parses the status line and headers of an HTTP response block.
///
/// A block whose first line has no end-of-line, or whose first line does not
/// start with `HTTP`, yields [`ArchiveError::RecoverableParse`].
pub fn parse_response(block: &[u8]) -> Result<HttpResponse> {
    let (line, pos) = next_line(block, 0).ok_or_else(|| {
        ArchiveError::RecoverableParse(
            "Failed to read http status where one was expected".to_string(),
        )
    })?;
    let status = StatusLine::parse(&String::from_utf8_lossy(line))?;
    let (headers, content_begin) = parse_header_block(block, pos);

    Ok(HttpResponse {
        status,
        headers,
        content_begin,
    })
}

/// Parses the headers of an HTTP request block, skipping its request line.
pub fn parse_request_headers(block: &[u8]) -> HeaderMap {
    match next_line(block, 0) {
        Some((_, pos)) => parse_header_block(block, pos).0,
        None => HeaderMap::new(),
    }
}

/// Trims parameters and case from a `Content-Type` value.
///
/// `text/html; charset=UTF-8` becomes `text/html`. Empty values yield `None`.
pub fn trim_content_type(content_type: &str) -> Option<String> {
    let media = content_type.split(';').next().unwrap_or_default().trim();
    if media.is_empty() {
        None
    } else {
        Some(media.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let block = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nServer: x\r\n\r\n<html></html>";
        let response = parse_response(block).unwrap();
        assert_eq!(response.status.status_code, 200);
        assert_eq!(response.status.reason, "OK");
        assert_eq!(response.headers.get("content-type"), Some("text/html"));
        assert_eq!(&block[response.content_begin..], b"<html></html>");
    }

    #[test]
    fn test_parse_response_without_http_prefix() {
        let block = b"GARBAGE 200 OK\r\n\r\n";
        let err = parse_response(block).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_parse_response_without_eol() {
        let err = parse_response(b"HTTP/1.1 200 OK").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_status_line_without_reason() {
        let status = StatusLine::parse("HTTP/1.0 404").unwrap();
        assert_eq!(status.status_code, 404);
        assert_eq!(status.reason, "");
    }

    #[test]
    fn test_parse_header_block_without_trailing_newline() {
        let (headers, end) = parse_header_block(b"via: http://a.example/\r\nseed: true", 0);
        assert_eq!(headers.get("via"), Some("http://a.example/"));
        assert_eq!(headers.get("seed"), Some("true"));
        assert_eq!(end, 34);
    }

    #[test]
    fn test_parse_request_headers() {
        let headers = parse_request_headers(
            b"GET /child HTTP/1.1\r\nHost: a.example\r\nReferer: http://a.example/\r\n\r\n",
        );
        assert_eq!(headers.get("host"), Some("a.example"));
        assert_eq!(headers.get("referer"), Some("http://a.example/"));
    }

    #[test]
    fn test_trim_content_type() {
        assert_eq!(
            trim_content_type("Text/HTML; charset=UTF-8"),
            Some("text/html".to_string())
        );
        assert_eq!(trim_content_type("image/png"), Some("image/png".to_string()));
        assert_eq!(trim_content_type("  ; charset=x"), None);
    }
}
