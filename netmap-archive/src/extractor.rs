use crate::error::Result;
use crate::http::{parse_header_block, parse_request_headers, parse_response, trim_content_type};
use crate::reader::ArchiveFormat;
use crate::record::{ArchiveRecord, HeaderMap, RecordType};
use crate::update::{Fact, NodeUpdate};
use tracing::debug;

/// URLs longer than this are not indexed; they would not fit a store key.
pub const MAX_URL_LENGTH: usize = 1020;

const DNS_MIME_TYPE: &str = "text/dns";

/// Interprets one archive record as a partial node update.
///
/// `Ok(None)` means the record carries nothing worth indexing. A
/// [`crate::ArchiveError::RecoverableParse`] error means this record is
/// broken but the rest of the file is fine.
pub trait ResourceExtractor: Send {
    fn extract(&self, record: &ArchiveRecord) -> Result<Option<NodeUpdate>>;
}

pub fn extractor_for(format: ArchiveFormat) -> Box<dyn ResourceExtractor> {
    match format {
        ArchiveFormat::Warc => Box::new(WarcExtractor),
        ArchiveFormat::Arc => Box::new(ArcExtractor),
    }
}

/// WARC: request, response and metadata arrive as separate records.
#[derive(Debug, Default, Clone, Copy)]
pub struct WarcExtractor;

/// ARC: one combined record per exchange.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArcExtractor;

fn indexable_url(record: &ArchiveRecord) -> Option<&str> {
    let url = record.url.as_deref()?;
    if url.chars().count() > MAX_URL_LENGTH {
        debug!(
            "Skipping record at offset {}: URL longer than {} characters",
            record.offset, MAX_URL_LENGTH
        );
        return None;
    }
    Some(url)
}

fn response_fact(record: &ArchiveRecord) -> Result<(i32, Option<String>, i64)> {
    let response = parse_response(&record.body)?;
    let content_length = (record.length as i64 - response.content_begin as i64).max(0);
    let content_type = response
        .headers
        .get("Content-Type")
        .and_then(trim_content_type);
    Ok((response.status.status_code, content_type, content_length))
}

/// A metadata `seed` pair, or an empty `hopsFromSeed` path, marks a seed.
fn is_seed_marker(pairs: &HeaderMap) -> bool {
    match pairs.get("seed") {
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        None => pairs
            .get("hopsFromSeed")
            .is_some_and(|hops| hops.trim().is_empty()),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ResourceExtractor for WarcExtractor {
    fn extract(&self, record: &ArchiveRecord) -> Result<Option<NodeUpdate>> {
        if record
            .mime_type()
            .is_some_and(|mime| mime.eq_ignore_ascii_case(DNS_MIME_TYPE))
        {
            return Ok(None);
        }

        let Some(url) = indexable_url(record) else {
            return Ok(None);
        };

        let Some(record_id) = record.record_id() else {
            debug!("Skipping record at offset {}: no record id", record.offset);
            return Ok(None);
        };
        let session_key = record.concurrent_to().unwrap_or(record_id);

        let fact = match record.record_type {
            RecordType::Request => {
                let headers = parse_request_headers(&record.body);
                Fact::Request {
                    referrer: non_empty(headers.get("Referer")),
                    host: non_empty(headers.get("Host")),
                }
            }
            RecordType::Response => {
                let (status_code, content_type, content_length) = response_fact(record)?;
                Fact::Response {
                    status_code,
                    content_type,
                    content_length,
                }
            }
            RecordType::Metadata => {
                let (pairs, _) = parse_header_block(&record.body, 0);
                Fact::Metadata {
                    via_url: non_empty(pairs.get("via")),
                    seed: is_seed_marker(&pairs),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(NodeUpdate::new(session_key, url, record.offset, fact)))
    }
}

impl ResourceExtractor for ArcExtractor {
    fn extract(&self, record: &ArchiveRecord) -> Result<Option<NodeUpdate>> {
        let Some(url) = indexable_url(record) else {
            return Ok(None);
        };
        if url.starts_with("dns:") || url.starts_with("filedesc:") {
            return Ok(None);
        }

        let (status_code, content_type, content_length) = response_fact(record)?;
        Ok(Some(NodeUpdate::new(
            url,
            url,
            record.offset,
            Fact::Exchange {
                status_code,
                content_type,
                content_length,
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_marker() {
        let (pairs, _) = parse_header_block(b"seed: true\r\n", 0);
        assert!(is_seed_marker(&pairs));

        let (pairs, _) = parse_header_block(b"hopsFromSeed: \r\nvia: \r\n", 0);
        assert!(is_seed_marker(&pairs));

        let (pairs, _) = parse_header_block(b"hopsFromSeed: L\r\nvia: http://a.example/\r\n", 0);
        assert!(!is_seed_marker(&pairs));

        let (pairs, _) = parse_header_block(b"seed: false\r\nhopsFromSeed: \r\n", 0);
        assert!(!is_seed_marker(&pairs));
    }
}
