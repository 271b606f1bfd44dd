use crate::error::Result;
use crate::keys;
use crate::model::{BuildMarker, Node, NodeKind, SearchCommand};
use crate::pool::StorePool;
use crate::store::GraphStore;
use crate::urls::url2domain;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on parent links followed by [`NetworkMapService::get_hop_path`].
pub const MAX_HOPS: usize = 4096;

/// Read-only queries over the stores held by a [`StorePool`].
///
/// Missing keys and ids are reported as `None` or an empty list, never as
/// errors; only store failures are returned as `Err`.
#[derive(Clone)]
pub struct NetworkMapService {
    pool: Arc<StorePool>,
}

impl NetworkMapService {
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<StorePool> {
        &self.pool
    }

    fn store(&self, job: i64, run: i32) -> Result<Arc<GraphStore>> {
        self.pool.get_instance(job, run)
    }

    /// Raw value for `key`, decoded as UTF-8.
    pub fn get(&self, job: i64, run: i32, key: &str) -> Result<Option<String>> {
        let store = self.store(job, run)?;
        Ok(store
            .get(key.as_bytes())?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn get_node(&self, job: i64, run: i32, id: i64) -> Result<Option<Node>> {
        self.store(job, run)?.get_node(job, id)
    }

    /// Nodes linked from `id`, in link order.
    pub fn get_outlinks(&self, job: i64, run: i32, id: i64) -> Result<Vec<Node>> {
        self.linked_nodes(job, run, id, None)
    }

    /// Domain nodes linked from the domain `id`. Each returned domain carries
    /// its content-type and status-code buckets in `children`. A URL id yields
    /// nothing.
    pub fn get_children(&self, job: i64, run: i32, id: i64) -> Result<Vec<Node>> {
        self.linked_nodes(job, run, id, Some(NodeKind::Domain))
    }

    fn linked_nodes(&self, job: i64, run: i32, id: i64, kind: Option<NodeKind>) -> Result<Vec<Node>> {
        let store = self.store(job, run)?;
        let Some(node) = store.get_node(job, id)? else {
            return Ok(Vec::new());
        };
        if kind.is_some_and(|k| node.kind != k) {
            return Ok(Vec::new());
        }
        let mut linked = resolve_ids(&store, job, &node.outlinks)?;
        if let Some(k) = kind {
            linked.retain(|n| n.kind == k);
        }
        Ok(linked)
    }

    pub fn get_all_domains(&self, job: i64, run: i32) -> Result<Vec<Node>> {
        self.resolve_list(job, run, keys::ROOT_DOMAIN_LIST)
    }

    /// Seed-flagged and parentless URL nodes.
    pub fn get_seed_urls(&self, job: i64, run: i32) -> Result<Vec<Node>> {
        self.resolve_list(job, run, keys::ROOT_URL_LIST)
    }

    pub fn get_malformed_urls(&self, job: i64, run: i32) -> Result<Vec<Node>> {
        self.resolve_list(job, run, keys::MALFORMED_URL_LIST)
    }

    fn resolve_list(&self, job: i64, run: i32, name: &str) -> Result<Vec<Node>> {
        let store = self.store(job, run)?;
        let ids = store.get_ids(job, name)?;
        resolve_ids(&store, job, &ids)
    }

    pub fn url_count(&self, job: i64, run: i32) -> Result<i64> {
        let store = self.store(job, run)?;
        Ok(store
            .get_value::<i64>(&keys::named_key(job, keys::URL_COUNT))?
            .unwrap_or(0))
    }

    /// URL nodes matching every non-empty dimension of `filter`.
    pub fn search_url(&self, job: i64, run: i32, filter: &SearchCommand) -> Result<Vec<Node>> {
        let store = self.store(job, run)?;
        let count = store
            .get_value::<i64>(&keys::named_key(job, keys::URL_COUNT))?
            .unwrap_or(0);

        let mut results = Vec::new();
        for id in 1..=count {
            let Some(node) = store.get_node(job, id)? else {
                continue;
            };
            let domain = url2domain(&node.url);
            if filter.matches(&node, domain.as_deref()) {
                results.push(node);
            }
        }
        debug!("Search in job {} matched {} of {} urls", job, results.len(), count);
        Ok(results)
    }

    /// The node and its ancestors, child first. Stops at a root, at a
    /// missing parent, on a repeated id or after [`MAX_HOPS`] links.
    pub fn get_hop_path(&self, job: i64, run: i32, id: i64) -> Result<Vec<Node>> {
        let store = self.store(job, run)?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = id;

        while path.len() < MAX_HOPS && visited.insert(current) {
            let Some(node) = store.get_node(job, current)? else {
                if !path.is_empty() {
                    warn!("Hop path from {} references missing node {}", id, current);
                }
                break;
            };
            let parent = node.parent_id;
            path.push(node);
            if parent <= 0 {
                break;
            }
            current = parent;
        }

        Ok(path)
    }

    /// Completion marker of the last build, `None` if the build never
    /// finished.
    pub fn build_status(&self, job: i64, run: i32) -> Result<Option<BuildMarker>> {
        let store = self.store(job, run)?;
        store.get_value(&keys::named_key(job, keys::BUILD_COMPLETE))
    }
}

fn resolve_ids(store: &GraphStore, job: i64, ids: &[i64]) -> Result<Vec<Node>> {
    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        match store.get_node(job, *id)? {
            Some(node) => nodes.push(node),
            None => warn!("Dangling reference to node {} in job {}", id, job),
        }
    }
    Ok(nodes)
}
