use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel for an unresolved parent or domain reference.
pub const NO_ID: i64 = -1;

/// Bucket key used when a response carried no content type.
pub const UNKNOWN_CONTENT_TYPE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Url,
    Domain,
    /// Synthetic aggregate under a domain, keyed by content type or status code
    Bucket,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Url => "url",
            NodeKind::Domain => "domain",
            NodeKind::Bucket => "bucket",
        }
    }
}

/// A vertex of the link graph: a captured URL, a domain, or a domain bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: i64,
    pub kind: NodeKind,
    pub url: String,
    pub is_seed: bool,

    pub content_type: Option<String>,
    pub status_code: i32,
    pub content_length: i64,
    /// Offset of the response record in its archive stream
    pub offset: u64,

    pub via_url: Option<String>,
    pub parent_id: i64,
    pub domain_id: i64,
    pub outlinks: Vec<i64>,

    pub request_parsed: bool,
    pub response_parsed: bool,
    pub metadata_parsed: bool,

    // Domain: all URLs in the domain. URL: itself plus the URLs it discovered.
    pub tot_urls: i64,
    pub tot_success: i64,
    pub tot_failed: i64,
    pub tot_size: i64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Node>,
}

impl Node {
    fn empty(id: i64, kind: NodeKind, url: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            url: url.into(),
            is_seed: false,
            content_type: None,
            status_code: 0,
            content_length: 0,
            offset: 0,
            via_url: None,
            parent_id: NO_ID,
            domain_id: NO_ID,
            outlinks: Vec::new(),
            request_parsed: false,
            response_parsed: false,
            metadata_parsed: false,
            tot_urls: 0,
            tot_success: 0,
            tot_failed: 0,
            tot_size: 0,
            children: BTreeMap::new(),
        }
    }

    pub fn new_url(id: i64, url: impl Into<String>) -> Self {
        Self::empty(id, NodeKind::Url, url)
    }

    pub fn new_domain(id: i64, domain: impl Into<String>) -> Self {
        Self::empty(id, NodeKind::Domain, domain)
    }

    /// Buckets have no store key of their own, so their id is always 0.
    pub fn new_bucket(key: impl Into<String>) -> Self {
        Self::empty(0, NodeKind::Bucket, key)
    }

    pub fn is_success(status_code: i32) -> bool {
        (200..400).contains(&status_code)
    }

    /// Request, response and metadata have all been observed.
    pub fn is_finished(&self) -> bool {
        self.request_parsed && self.response_parsed && self.metadata_parsed
    }

    pub fn is_root(&self) -> bool {
        self.parent_id <= 0
    }

    /// Counts one URL with the given response into this node's totals.
    pub fn accumulate(&mut self, status_code: i32, content_length: i64) {
        self.tot_urls += 1;
        if Self::is_success(status_code) {
            self.tot_success += 1;
        } else {
            self.tot_failed += 1;
        }
        self.tot_size += content_length.max(0);
    }

    /// Accumulates into this node and into its content-type bucket, then
    /// into the status-code bucket nested under it.
    pub fn accumulate_as_children(
        &mut self,
        status_code: i32,
        content_length: i64,
        content_type: Option<&str>,
    ) {
        self.accumulate(status_code, content_length);

        let type_key = content_type.unwrap_or(UNKNOWN_CONTENT_TYPE);
        let type_bucket = self
            .children
            .entry(type_key.to_string())
            .or_insert_with(|| {
                let mut bucket = Node::new_bucket(type_key);
                bucket.content_type = content_type.map(str::to_string);
                bucket
            });
        type_bucket.accumulate(status_code, content_length);

        let status_key = status_code.to_string();
        let status_bucket = type_bucket
            .children
            .entry(status_key.clone())
            .or_insert_with(|| {
                let mut bucket = Node::new_bucket(status_key);
                bucket.content_type = content_type.map(str::to_string);
                bucket.status_code = status_code;
                bucket
            });
        status_bucket.accumulate(status_code, content_length);
    }

    /// Links `child_id` as an outlink. Self-links and duplicates are ignored.
    /// Returns whether the link was added.
    pub fn add_outlink(&mut self, child_id: i64) -> bool {
        if child_id == self.id || self.outlinks.contains(&child_id) {
            return false;
        }
        self.outlinks.push(child_id);
        true
    }

    /// Links a child URL node and folds its response into this node's totals.
    pub fn add_outlink_node(&mut self, child: &Node) {
        if self.add_outlink(child.id) {
            self.accumulate(child.status_code, child.content_length);
        }
    }
}

/// Search filter; an empty list matches every value for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCommand {
    pub domain_names: Vec<String>,
    pub content_types: Vec<String>,
    pub status_codes: Vec<i32>,
}

impl SearchCommand {
    pub fn is_empty(&self) -> bool {
        self.domain_names.is_empty() && self.content_types.is_empty() && self.status_codes.is_empty()
    }

    /// Domain name of the node is passed in since it is not stored on URL nodes.
    pub fn matches(&self, node: &Node, domain: Option<&str>) -> bool {
        let domain_ok = self.domain_names.is_empty()
            || domain.is_some_and(|d| {
                self.domain_names
                    .iter()
                    .any(|name| name.trim().eq_ignore_ascii_case(d))
            });

        // Stored content types are lowercase
        let type_ok = self.content_types.is_empty()
            || node.content_type.as_deref().is_some_and(|ct| {
                let ct = ct.to_ascii_lowercase();
                self.content_types.iter().any(|wanted| {
                    let wanted = wanted.trim().to_ascii_lowercase();
                    ct.starts_with(&wanted)
                })
            });

        let status_ok =
            self.status_codes.is_empty() || self.status_codes.contains(&node.status_code);

        domain_ok && type_ok && status_ok
    }
}

/// Written once the store holds a complete build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMarker {
    /// RFC 3339 timestamp
    pub completed_at: String,
    pub url_count: i64,
    pub domain_count: i64,
    pub malformed_count: i64,
}
