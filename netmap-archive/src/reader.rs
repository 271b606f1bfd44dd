use crate::error::{ArchiveError, Result};
use crate::record::{
    ArchiveRecord, HEADER_CONTENT_LENGTH, HEADER_TARGET_URI, HEADER_TYPE, HeaderMap, RecordType,
    strip_angle_brackets,
};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const WARC_SIGNATURE: &[u8] = b"WARC/";
const ARC_SIGNATURE: &[u8] = b"filedesc://";

const ARC_V1_FIELDS: [&str; 5] = ["url", "ip-address", "archive-date", "content-type", "length"];
const ARC_V2_FIELDS: [&str; 10] = [
    "url",
    "ip-address",
    "archive-date",
    "content-type",
    "result-code",
    "checksum",
    "location",
    "offset",
    "filename",
    "length",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Warc,
    Arc,
}

impl ArchiveFormat {
    /// Detects the container format from the file name.
    ///
    /// Returns the format and whether the file is gzip-compressed. Only
    /// `.warc`, `.warc.gz`, `.arc` and `.arc.gz` (any case) are recognised.
    pub fn from_path(path: &Path) -> Option<(Self, bool)> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".warc.gz") {
            Some((ArchiveFormat::Warc, true))
        } else if name.ends_with(".warc") {
            Some((ArchiveFormat::Warc, false))
        } else if name.ends_with(".arc.gz") {
            Some((ArchiveFormat::Arc, true))
        } else if name.ends_with(".arc") {
            Some((ArchiveFormat::Arc, false))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Warc => "warc",
            ArchiveFormat::Arc => "arc",
        }
    }
}

pub fn is_archive_file(path: &Path) -> bool {
    ArchiveFormat::from_path(path).is_some()
}

/// Forward-only reader over the records of one archive file.
///
/// Records are parsed lazily as the iterator advances. A malformed or
/// truncated record ends the iteration with an error, since the stream
/// cannot be resynchronised after it.
pub struct ArchiveReader {
    path: Option<PathBuf>,
    format: ArchiveFormat,
    compressed: bool,
    inner: Box<dyn BufRead + Send>,
    position: u64,
    done: bool,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (format, compressed) = ArchiveFormat::from_path(path)
            .ok_or_else(|| ArchiveError::UnsupportedFormat(path.display().to_string()))?;

        let open_error = |source: io::Error| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        };

        let mut file = BufReader::new(File::open(path).map_err(open_error)?);
        let inner: Box<dyn BufRead + Send> = if compressed {
            let has_magic = file.fill_buf().map_err(open_error)?.starts_with(&GZIP_MAGIC);
            if !has_magic {
                return Err(open_error(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "missing gzip header",
                )));
            }
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(file)
        };

        let mut reader = Self::from_reader(inner, format, compressed);
        reader.path = Some(path.to_path_buf());
        reader.check_signature().map_err(|e| match e {
            ArchiveError::IoError(source) => open_error(source),
            other => other,
        })?;

        debug!(
            "Opened {} archive {} (compressed: {})",
            format.as_str(),
            path.display(),
            compressed
        );
        Ok(reader)
    }

    /// Wraps an already-decompressed stream.
    pub fn from_reader<R>(reader: R, format: ArchiveFormat, compressed: bool) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self {
            path: None,
            format,
            compressed,
            inner: Box::new(reader),
            position: 0,
            done: false,
        }
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Bytes consumed so far from the decompressed stream.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn check_signature(&mut self) -> Result<()> {
        let expected = match self.format {
            ArchiveFormat::Warc => WARC_SIGNATURE,
            ArchiveFormat::Arc => ARC_SIGNATURE,
        };

        let buf = self.inner.fill_buf()?;
        if buf.is_empty() {
            return Err(ArchiveError::Truncated("archive is empty".to_string()));
        }

        let start = buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(buf.len());
        let head = &buf[start..];
        let n = head.len().min(expected.len());
        if head[..n] != expected[..n] {
            return Err(ArchiveError::InvalidHeader(format!(
                "not a {} file",
                self.format.as_str()
            )));
        }
        Ok(())
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        buf.clear();
        let n = self.inner.read_until(b'\n', buf)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Skips blank separator lines and returns the next line with its offset.
    fn next_header_line(&mut self) -> Result<Option<(u64, String)>> {
        let mut buf = Vec::new();
        loop {
            let start = self.position;
            if self.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            let line = trim_eol(&buf);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some((start, String::from_utf8_lossy(line).into_owned())));
        }
    }

    fn read_block(&mut self, length: u64, offset: u64) -> Result<Vec<u8>> {
        let capacity = length.min(1 << 20) as usize;
        let mut body = Vec::with_capacity(capacity);
        let read = Read::by_ref(&mut self.inner)
            .take(length)
            .read_to_end(&mut body)? as u64;
        self.position += read;
        if read < length {
            return Err(ArchiveError::Truncated(format!(
                "record at offset {} declares {} bytes but only {} remain",
                offset, length, read
            )));
        }
        Ok(body)
    }

    fn next_warc(&mut self) -> Result<Option<ArchiveRecord>> {
        let Some((offset, version)) = self.next_header_line()? else {
            return Ok(None);
        };
        if !version.starts_with("WARC/") {
            return Err(ArchiveError::InvalidHeader(format!(
                "expected WARC version line at offset {}, found {:?}",
                offset,
                preview(&version)
            )));
        }

        let mut headers = HeaderMap::new();
        let mut buf = Vec::new();
        loop {
            if self.read_line(&mut buf)? == 0 {
                return Err(ArchiveError::Truncated(format!(
                    "header block of record at offset {} ended early",
                    offset
                )));
            }
            let line = trim_eol(&buf);
            if line.is_empty() {
                break;
            }
            let line = String::from_utf8_lossy(line);
            match line.split_once(':') {
                Some((name, value)) => headers.insert(name.trim(), value.trim()),
                None => debug!("Ignoring malformed header line at offset {}", offset),
            }
        }

        let length = headers
            .get(HEADER_CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                ArchiveError::InvalidHeader(format!(
                    "record at offset {} has no valid Content-Length",
                    offset
                ))
            })?;
        let body = self.read_block(length, offset)?;

        let record_type = headers
            .get(HEADER_TYPE)
            .map(RecordType::from_warc_type)
            .unwrap_or_else(|| RecordType::Other(String::new()));
        let url = headers
            .get(HEADER_TARGET_URI)
            .map(strip_angle_brackets)
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Some(ArchiveRecord {
            record_type,
            url,
            offset,
            length,
            headers,
            body,
        }))
    }

    fn next_arc(&mut self) -> Result<Option<ArchiveRecord>> {
        loop {
            let Some((offset, line)) = self.next_header_line()? else {
                return Ok(None);
            };
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < ARC_V1_FIELDS.len() {
                return Err(ArchiveError::InvalidHeader(format!(
                    "ARC header at offset {} has {} fields: {:?}",
                    offset,
                    fields.len(),
                    preview(&line)
                )));
            }

            let length = fields[fields.len() - 1].parse::<u64>().map_err(|_| {
                ArchiveError::InvalidHeader(format!(
                    "ARC header at offset {} has no valid length",
                    offset
                ))
            })?;
            let body = self.read_block(length, offset)?;

            if fields[0].starts_with("filedesc://") {
                debug!("Skipping ARC file description block");
                continue;
            }

            let names: &[&str] = if fields.len() >= ARC_V2_FIELDS.len() {
                &ARC_V2_FIELDS
            } else {
                &ARC_V1_FIELDS
            };
            let mut headers = HeaderMap::new();
            for (name, value) in names.iter().zip(fields.iter()) {
                headers.insert(*name, *value);
            }

            return Ok(Some(ArchiveRecord {
                record_type: RecordType::Exchange,
                url: Some(fields[0].to_string()),
                offset,
                length,
                headers,
                body,
            }));
        }
    }
}

impl Iterator for ArchiveReader {
    type Item = Result<ArchiveRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.format {
            ArchiveFormat::Warc => self.next_warc(),
            ArchiveFormat::Arc => self.next_arc(),
        };

        match result {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub(crate) fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn preview(line: &str) -> String {
    line.chars().take(64).collect()
}
