use crate::counters::RunCounters;
use crate::error::Result;
use crate::keys;
use crate::model::{BuildMarker, NO_ID, Node};
use crate::urls::{is_absolute, normalize_url, resolve_url, url2domain};
use netmap_archive::{Fact, NodeUpdate};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Request headers kept only to resolve relative via URLs.
#[derive(Debug, Default, Clone)]
struct RequestHints {
    referrer: Option<String>,
    host: Option<String>,
}

/// Merges per-record updates into URL nodes, then derives domains, edges and
/// aggregates in [`GraphBuilder::finish`].
///
/// Owned by a single indexing pass; nothing here is shared across jobs.
#[derive(Debug)]
pub struct GraphBuilder {
    job: i64,
    counters: RunCounters,
    seeds: HashSet<String>,
    sessions: HashMap<String, i64>,
    url_index: HashMap<String, i64>,
    nodes: BTreeMap<i64, Node>,
    hints: HashMap<i64, RequestHints>,
}

impl GraphBuilder {
    pub fn new(job: i64) -> Self {
        Self {
            job,
            counters: RunCounters::new(),
            seeds: HashSet::new(),
            sessions: HashMap::new(),
            url_index: HashMap::new(),
            nodes: BTreeMap::new(),
            hints: HashMap::new(),
        }
    }

    /// URLs declared as crawl seeds. Matching URL nodes are flagged as seed;
    /// both sides are compared in normalized form.
    pub fn with_seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.seeds = seeds
            .into_iter()
            .map(|seed| normalize_url(seed.as_ref()))
            .collect();
        self
    }

    pub fn job(&self) -> i64 {
        self.job
    }

    /// Drops all state and restarts id assignment.
    pub fn init(&mut self) {
        self.counters.init();
        self.sessions.clear();
        self.url_index.clear();
        self.nodes.clear();
        self.hints.clear();
    }

    pub fn url_count(&self) -> i64 {
        self.counters.url_count()
    }

    pub fn node_by_url(&self, url: &str) -> Option<&Node> {
        self.url_index.get(url).and_then(|id| self.nodes.get(id))
    }

    /// Merges one extracted fact into the node for its session key, creating
    /// the node on first sight.
    pub fn apply(&mut self, update: NodeUpdate) {
        let id = match self.sessions.get(&update.session_key) {
            Some(id) => *id,
            None => {
                let id = self.counters.next_url_id();
                let mut node = Node::new_url(id, update.url.clone());
                node.offset = update.offset;
                self.nodes.insert(id, node);
                self.sessions.insert(update.session_key.clone(), id);
                // First capture of a URL owns it; later duplicates stay unlinked
                self.url_index.entry(update.url.clone()).or_insert(id);
                id
            }
        };

        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if !node.is_seed
            && !self.seeds.is_empty()
            && self.seeds.contains(&normalize_url(&node.url))
        {
            node.is_seed = true;
        }

        match update.fact {
            Fact::Request { referrer, host } => {
                node.request_parsed = true;
                self.hints.insert(id, RequestHints { referrer, host });
            }
            Fact::Response {
                status_code,
                content_type,
                content_length,
            } => {
                node.response_parsed = true;
                node.status_code = status_code;
                node.content_type = content_type;
                node.content_length = content_length;
                node.offset = update.offset;
            }
            Fact::Metadata { via_url, seed } => {
                node.metadata_parsed = true;
                if via_url.is_some() {
                    node.via_url = via_url;
                }
                node.is_seed |= seed;
            }
            Fact::Exchange {
                status_code,
                content_type,
                content_length,
            } => {
                node.request_parsed = true;
                node.response_parsed = true;
                node.metadata_parsed = true;
                node.status_code = status_code;
                node.content_type = content_type;
                node.content_length = content_length;
                node.offset = update.offset;
            }
        }
    }

    /// Resolves domains and edges, accumulates statistics and materialises
    /// the root and malformed lists.
    pub fn finish(mut self) -> NetworkGraph {
        self.resolve_via_urls();

        let mut nodes = std::mem::take(&mut self.nodes);
        let mut domains: BTreeMap<i64, Node> = BTreeMap::new();
        let mut domain_index: HashMap<String, i64> = HashMap::new();
        self.counters.start_domains();

        for node in nodes.values_mut() {
            node.accumulate(node.status_code, node.content_length);

            let Some(name) = url2domain(&node.url) else {
                continue;
            };
            let domain_id = match domain_index.get(&name) {
                Some(id) => *id,
                None => {
                    let id = self.counters.next_domain_id();
                    domains.insert(id, Node::new_domain(id, name.clone()));
                    domain_index.insert(name, id);
                    id
                }
            };
            node.domain_id = domain_id;

            if let Some(domain) = domains.get_mut(&domain_id) {
                if node.is_seed {
                    domain.is_seed = true;
                }
                domain.accumulate_as_children(
                    node.status_code,
                    node.content_length,
                    node.content_type.as_deref(),
                );
            }
        }

        let ids: Vec<i64> = nodes.keys().copied().collect();
        for id in ids {
            let (parent_id, child) = {
                let Some(node) = nodes.get(&id) else {
                    continue;
                };
                let parent_id = node
                    .via_url
                    .as_ref()
                    .and_then(|via| self.url_index.get(via))
                    .copied()
                    .filter(|parent| *parent != id);
                (parent_id, node.clone())
            };

            let Some(parent_id) = parent_id else {
                if let Some(node) = nodes.get_mut(&id) {
                    node.parent_id = NO_ID;
                }
                continue;
            };

            let parent_domain = match nodes.get_mut(&parent_id) {
                Some(parent) => {
                    parent.add_outlink_node(&child);
                    parent.domain_id
                }
                None => continue,
            };
            if let Some(node) = nodes.get_mut(&id) {
                node.parent_id = parent_id;
            }

            if parent_domain != NO_ID && child.domain_id != NO_ID && parent_domain != child.domain_id {
                if let Some(domain) = domains.get_mut(&parent_domain) {
                    domain.add_outlink(child.domain_id);
                }
            }
        }

        let root_urls = nodes
            .values()
            .filter(|n| n.is_seed || n.is_root())
            .map(|n| n.id)
            .collect();
        let malformed_urls = nodes
            .values()
            .filter(|n| !n.is_finished())
            .map(|n| n.id)
            .collect();
        let root_domains = domains.keys().copied().collect();

        debug!(
            "Built graph for job {}: {} urls, {} domains",
            self.job,
            nodes.len(),
            domains.len()
        );

        NetworkGraph {
            job: self.job,
            url_count: self.counters.url_count(),
            domain_count: self.counters.domain_count(),
            urls: nodes.into_values().collect(),
            domains: domains.into_values().collect(),
            root_urls,
            malformed_urls,
            root_domains,
        }
    }

    /// Relative via URLs are resolved against the referrer, then the request
    /// host, then the node's own URL.
    fn resolve_via_urls(&mut self) {
        for (id, node) in self.nodes.iter_mut() {
            let Some(via) = node.via_url.as_deref() else {
                continue;
            };
            if is_absolute(via) {
                continue;
            }

            let hints = self.hints.get(id);
            let mut bases: Vec<String> = Vec::new();
            if let Some(referrer) = hints.and_then(|h| h.referrer.as_deref()) {
                bases.push(referrer.to_string());
            }
            if let Some(host) = hints.and_then(|h| h.host.as_deref()) {
                bases.push(format!("http://{}/", host));
            }
            bases.push(node.url.clone());

            let resolved = bases.iter().find_map(|base| resolve_url(base, via));
            if resolved.is_none() {
                debug!("Could not resolve via URL {:?} for {}", via, node.url);
            }
            node.via_url = resolved;
        }
    }
}

/// The complete graph of one run, ready to be flushed to a store.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    pub job: i64,
    pub url_count: i64,
    pub domain_count: i64,
    pub urls: Vec<Node>,
    pub domains: Vec<Node>,
    pub root_urls: Vec<i64>,
    pub malformed_urls: Vec<i64>,
    pub root_domains: Vec<i64>,
}

impl NetworkGraph {
    pub fn url(&self, id: i64) -> Option<&Node> {
        self.urls.iter().find(|n| n.id == id)
    }

    pub fn domain(&self, name: &str) -> Option<&Node> {
        self.domains.iter().find(|n| n.url == name)
    }

    /// Serialised key/value pairs for every node, list and count.
    pub fn to_records(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut records = Vec::with_capacity(self.urls.len() + self.domains.len() + 5);

        for node in self.urls.iter().chain(self.domains.iter()) {
            records.push((
                keys::node_key(self.job, node.id).into_bytes(),
                serde_json::to_vec(node)?,
            ));
        }

        let named = [
            (keys::ROOT_URL_LIST, serde_json::to_vec(&self.root_urls)?),
            (keys::MALFORMED_URL_LIST, serde_json::to_vec(&self.malformed_urls)?),
            (keys::ROOT_DOMAIN_LIST, serde_json::to_vec(&self.root_domains)?),
            (keys::URL_COUNT, serde_json::to_vec(&self.url_count)?),
            (keys::DOMAIN_COUNT, serde_json::to_vec(&self.domain_count)?),
        ];
        for (name, value) in named {
            records.push((keys::named_key(self.job, name).into_bytes(), value));
        }

        Ok(records)
    }

    pub fn build_marker(&self) -> BuildMarker {
        BuildMarker {
            completed_at: chrono::Utc::now().to_rfc3339(),
            url_count: self.url_count,
            domain_count: self.domain_count,
            malformed_count: self.malformed_urls.len() as i64,
        }
    }
}
