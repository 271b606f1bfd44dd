//! Readers for WARC and ARC web archives and the per-record extraction
//! that turns raw records into node updates for the link graph.

pub mod error;
pub mod extractor;
pub mod http;
pub mod reader;
pub mod record;
pub mod update;

pub use error::ArchiveError;
pub use extractor::{
    ArcExtractor, MAX_URL_LENGTH, ResourceExtractor, WarcExtractor, extractor_for,
};
pub use reader::{ArchiveFormat, ArchiveReader, is_archive_file};
pub use record::{ArchiveRecord, HeaderMap, RecordType};
pub use update::{Fact, NodeUpdate};
