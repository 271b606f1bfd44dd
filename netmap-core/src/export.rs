//! Flat-file interchange format: one `{domainId}.unl` file per domain with a
//! line per URL, plus `domain.json` holding the domain nodes and their
//! aggregate buckets.

use crate::error::{NetworkMapError, Result};
use crate::model::{NO_ID, Node, NodeKind};
use crate::store::{Direction, GraphStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const RESOURCE_DIR: &str = "resource";
pub const DOMAIN_FILE: &str = "domain.json";
pub const RESOURCE_EXTENSION: &str = "unl";

/// URLs whose domain could not be derived are written under this id.
pub const NO_DOMAIN_FILE_ID: i64 = 0;

const FIELD_COUNT: usize = 7;

/// One URL record: `id,url,contentType,statusCode,contentLength,offset,viaUrl`.
///
/// Commas inside URLs are written as `%2C`. Absent values are empty fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLine {
    pub id: i64,
    pub url: String,
    pub content_type: Option<String>,
    pub status_code: i32,
    pub content_length: i64,
    pub offset: u64,
    pub via_url: Option<String>,
}

impl ResourceLine {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id,
            url: node.url.clone(),
            content_type: node.content_type.clone(),
            status_code: node.status_code,
            content_length: node.content_length,
            offset: node.offset,
            via_url: node.via_url.clone(),
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.id,
            escape(&self.url),
            self.content_type.as_deref().map(escape).unwrap_or_default(),
            self.status_code,
            self.content_length,
            self.offset,
            self.via_url.as_deref().map(escape).unwrap_or_default(),
        )
    }

    /// Parses a line written by [`ResourceLine::to_line`]. Anything other
    /// than exactly seven fields is rejected.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != FIELD_COUNT {
            return Err(NetworkMapError::InvalidLine(format!(
                "expected {} fields, found {}: {:?}",
                FIELD_COUNT,
                fields.len(),
                line
            )));
        }

        let number = |idx: usize, name: &str| -> Result<i64> {
            fields[idx].trim().parse::<i64>().map_err(|_| {
                NetworkMapError::InvalidLine(format!("invalid {} {:?}", name, fields[idx]))
            })
        };
        let optional = |idx: usize| -> Option<String> {
            let value = fields[idx].trim();
            (!value.is_empty()).then(|| unescape(value))
        };

        let url = unescape(fields[1].trim());
        if url.is_empty() {
            return Err(NetworkMapError::InvalidLine(format!("missing url: {:?}", line)));
        }
        let status_code = i32::try_from(number(3, "status code")?)
            .map_err(|_| NetworkMapError::InvalidLine(format!("invalid status code {:?}", fields[3])))?;
        let offset = u64::try_from(number(5, "offset")?)
            .map_err(|_| NetworkMapError::InvalidLine(format!("invalid offset {:?}", fields[5])))?;

        Ok(Self {
            id: number(0, "id")?,
            url,
            content_type: optional(2),
            status_code,
            content_length: number(4, "content length")?,
            offset,
            via_url: optional(6),
        })
    }
}

fn escape(value: &str) -> String {
    value.replace('%', "%25").replace(',', "%2C")
}

fn unescape(value: &str) -> String {
    value.replace("%2C", ",").replace("%25", "%")
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub directory: PathBuf,
    pub domain_files: usize,
    pub url_lines: usize,
    pub domains: usize,
}

/// Writes and reads the flat-file layout under `{root}/resource`.
pub struct NetworkMapExport {
    dir: PathBuf,
}

impl NetworkMapExport {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(RESOURCE_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn resource_file(&self, domain_id: i64) -> PathBuf {
        self.dir.join(format!("{}.{}", domain_id, RESOURCE_EXTENSION))
    }

    /// Exports every node of `job` held in `store`.
    pub fn export_store(&self, store: &GraphStore, job: i64) -> Result<ExportSummary> {
        let start = format!("{}/", job);
        let urls = store
            .range_iter(start.as_bytes(), Direction::Forward, NodeKind::Url)
            .within(start.as_bytes())
            .collect::<Result<Vec<_>>>()?;
        let domains = store
            .range_iter(start.as_bytes(), Direction::Forward, NodeKind::Domain)
            .within(start.as_bytes())
            .collect::<Result<Vec<_>>>()?;
        self.write(&urls, &domains)
    }

    /// Writes URL lines grouped by domain, then the domain tree.
    pub fn write(&self, urls: &[Node], domains: &[Node]) -> Result<ExportSummary> {
        fs::create_dir_all(&self.dir)?;

        let mut by_domain: BTreeMap<i64, Vec<&Node>> = BTreeMap::new();
        for node in urls {
            let domain_id = if node.domain_id == NO_ID {
                NO_DOMAIN_FILE_ID
            } else {
                node.domain_id
            };
            by_domain.entry(domain_id).or_default().push(node);
        }

        let mut url_lines = 0;
        for (domain_id, nodes) in &by_domain {
            let mut out = BufWriter::new(fs::File::create(self.resource_file(*domain_id))?);
            for node in nodes {
                writeln!(out, "{}", ResourceLine::from_node(node).to_line())?;
                url_lines += 1;
            }
            out.flush()?;
        }

        let domain_json = serde_json::to_vec(domains)?;
        fs::write(self.dir.join(DOMAIN_FILE), domain_json)?;

        info!(
            "Exported {} urls in {} files and {} domains to {}",
            url_lines,
            by_domain.len(),
            domains.len(),
            self.dir.display()
        );

        Ok(ExportSummary {
            directory: self.dir.clone(),
            domain_files: by_domain.len(),
            url_lines,
            domains: domains.len(),
        })
    }

    pub fn read_domains(&self) -> Result<Vec<Node>> {
        let bytes = fs::read(self.dir.join(DOMAIN_FILE))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Lines of one domain file. Blank lines are ignored.
    pub fn read_resources(&self, domain_id: i64) -> Result<Vec<ResourceLine>> {
        let content = fs::read_to_string(self.resource_file(domain_id))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ResourceLine::parse)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_with_empty_optionals() {
        let line = ResourceLine {
            id: 3,
            url: "http://a.example/".to_string(),
            content_type: None,
            status_code: 0,
            content_length: 0,
            offset: 0,
            via_url: None,
        };
        assert_eq!(line.to_line(), "3,http://a.example/,,0,0,0,");
        assert_eq!(ResourceLine::parse(&line.to_line()).unwrap(), line);
    }

    #[test]
    fn test_commas_in_urls_are_escaped() {
        let line = ResourceLine {
            id: 1,
            url: "http://a.example/a,b".to_string(),
            content_type: Some("text/html".to_string()),
            status_code: 200,
            content_length: 10,
            offset: 4,
            via_url: Some("http://a.example/?x=1,2".to_string()),
        };
        let text = line.to_line();
        assert_eq!(text.split(',').count(), 7);
        assert_eq!(ResourceLine::parse(&text).unwrap(), line);
    }

    #[test]
    fn test_percent_sequences_in_urls_survive() {
        let line = ResourceLine {
            id: 1,
            url: "http://a.example/q?x=%2C&y=%25".to_string(),
            content_type: None,
            status_code: 200,
            content_length: 1,
            offset: 0,
            via_url: Some("http://a.example/?a=1,2%2C3".to_string()),
        };
        let text = line.to_line();
        assert_eq!(text.split(',').count(), 7);
        assert_eq!(ResourceLine::parse(&text).unwrap(), line);
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        assert!(ResourceLine::parse("1,http://a.example/,text/html,200,10,0").is_err());
        assert!(ResourceLine::parse("1,http://a.example/,text/html,200,10,0,,extra").is_err());
        assert!(ResourceLine::parse("x,http://a.example/,text/html,200,10,0,").is_err());
    }
}
