// Archive fixtures shared by the integration tests
#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn warc_record(headers: &[(&str, &str)], block: &[u8]) -> Vec<u8> {
    let mut out = b"WARC/1.0\r\n".to_vec();
    for (name, value) in headers {
        out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", block.len()).as_bytes());
    out.extend_from_slice(block);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

/// Response body of exactly `length` bytes after the HTTP headers.
pub fn http_response(status: &str, content_type: &str, length: usize) -> Vec<u8> {
    let mut block =
        format!("HTTP/1.1 {}\r\nContent-Type: {}\r\n\r\n", status, content_type).into_bytes();
    block.extend(std::iter::repeat_n(b'x', length));
    block
}

/// Request, response and metadata records for one capture.
pub fn capture(
    id: &str,
    url: &str,
    via: Option<&str>,
    status: &str,
    content_type: &str,
    length: usize,
) -> Vec<u8> {
    let response_id = format!("<urn:uuid:{}-response>", id);

    let mut request_block = format!("GET / HTTP/1.1\r\nHost: {}\r\n", host_of(url));
    if let Some(via) = via {
        request_block.push_str(&format!("Referer: {}\r\n", via));
    }
    request_block.push_str("\r\n");

    let mut metadata_block = String::new();
    match via {
        Some(via) => metadata_block.push_str(&format!("via: {}\r\nhopsFromSeed: L\r\n", via)),
        None => metadata_block.push_str("hopsFromSeed: \r\n"),
    }

    let mut data = warc_record(
        &[
            ("WARC-Type", "response"),
            ("WARC-Record-ID", &response_id),
            ("WARC-Target-URI", url),
            ("Content-Type", "application/http; msgtype=response"),
        ],
        &http_response(status, content_type, length),
    );
    data.extend(warc_record(
        &[
            ("WARC-Type", "request"),
            ("WARC-Record-ID", &format!("<urn:uuid:{}-request>", id)),
            ("WARC-Concurrent-To", &response_id),
            ("WARC-Target-URI", url),
            ("Content-Type", "application/http; msgtype=request"),
        ],
        request_block.as_bytes(),
    ));
    data.extend(warc_record(
        &[
            ("WARC-Type", "metadata"),
            ("WARC-Record-ID", &format!("<urn:uuid:{}-metadata>", id)),
            ("WARC-Concurrent-To", &response_id),
            ("WARC-Target-URI", url),
            ("Content-Type", "application/warc-fields"),
        ],
        metadata_block.as_bytes(),
    ));
    data
}

pub fn warcinfo() -> Vec<u8> {
    warc_record(
        &[
            ("WARC-Type", "warcinfo"),
            ("WARC-Record-ID", "<urn:uuid:info>"),
            ("Content-Type", "application/warc-fields"),
        ],
        b"software: fixture\r\n",
    )
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}
