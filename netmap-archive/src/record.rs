use std::fmt;

/// WARC header names used by the extractor.
pub const HEADER_TYPE: &str = "WARC-Type";
pub const HEADER_RECORD_ID: &str = "WARC-Record-ID";
pub const HEADER_CONCURRENT_TO: &str = "WARC-Concurrent-To";
pub const HEADER_TARGET_URI: &str = "WARC-Target-URI";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Warcinfo,
    Request,
    Response,
    Metadata,
    Resource,
    Revisit,
    /// ARC records carry request, response and capture metadata in one record
    Exchange,
    Other(String),
}

impl RecordType {
    pub fn from_warc_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "warcinfo" => RecordType::Warcinfo,
            "request" => RecordType::Request,
            "response" => RecordType::Response,
            "metadata" => RecordType::Metadata,
            "resource" => RecordType::Resource,
            "revisit" => RecordType::Revisit,
            other => RecordType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RecordType::Warcinfo => "warcinfo",
            RecordType::Request => "request",
            RecordType::Response => "response",
            RecordType::Metadata => "metadata",
            RecordType::Resource => "resource",
            RecordType::Revisit => "revisit",
            RecordType::Exchange => "exchange",
            RecordType::Other(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered name/value pairs with case-insensitive lookup.
///
/// Repeated names are kept (metadata records list one `outlink` per line).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One raw record read from a WARC or ARC container.
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    pub record_type: RecordType,
    pub url: Option<String>,
    /// Position of the record header in the (decompressed) stream
    pub offset: u64,
    /// Declared length of the record block
    pub length: u64,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ArchiveRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.headers.get(HEADER_CONTENT_TYPE)
    }

    /// `WARC-Record-ID` without its angle brackets.
    pub fn record_id(&self) -> Option<&str> {
        self.headers.get(HEADER_RECORD_ID).map(strip_angle_brackets)
    }

    /// `WARC-Concurrent-To` without its angle brackets.
    pub fn concurrent_to(&self) -> Option<&str> {
        self.headers
            .get(HEADER_CONCURRENT_TO)
            .map(strip_angle_brackets)
            .filter(|id| !id.is_empty())
    }
}

pub fn strip_angle_brackets(value: &str) -> &str {
    let value = value.trim();
    let value = value.strip_prefix('<').unwrap_or(value);
    value.strip_suffix('>').unwrap_or(value)
}
