use crate::error::Result;
use crate::store::GraphStore;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

pub const DEFAULT_POOL_SIZE: usize = 10;

#[derive(Default)]
struct PoolState {
    /// Oldest-opened first
    queue: VecDeque<String>,
    open: HashMap<String, Arc<GraphStore>>,
}

impl PoolState {
    fn remove(&mut self, name: &str) -> Option<Arc<GraphStore>> {
        let store = self.open.remove(name)?;
        self.queue.retain(|queued| queued != name);
        Some(store)
    }

    fn evict_oldest(&mut self) -> Option<Arc<GraphStore>> {
        let name = self.queue.pop_front()?;
        self.open.remove(&name)
    }
}

/// Bounded set of open stores keyed by (job, run).
///
/// When full, the store opened earliest is closed to make room; access
/// order does not matter. Every operation runs under one lock.
pub struct StorePool {
    root: PathBuf,
    capacity: usize,
    state: Mutex<PoolState>,
}

impl StorePool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_POOL_SIZE)
    }

    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity: capacity.max(1),
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, job: i64, run: i32) -> bool {
        self.lock().open.contains_key(&store_name(job, run))
    }

    /// `{root}/{job}/{run}/_resource`
    pub fn store_path(&self, job: i64, run: i32) -> PathBuf {
        self.root
            .join(job.to_string())
            .join(run.to_string())
            .join("_resource")
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a fresh store for indexing. Any open handle for the same key is
    /// closed and the on-disk directory is emptied first.
    pub fn create_instance(&self, job: i64, run: i32) -> Result<Arc<GraphStore>> {
        let mut state = self.lock();
        let name = store_name(job, run);

        if let Some(old) = state.remove(&name) {
            close_store(&old);
        }
        self.make_room(&mut state);

        let path = self.store_path(job, run);
        if let Err(e) = clean_directory(&path) {
            error!("Clear files failed: {}: {}", path.display(), e);
            return Err(e.into());
        }

        self.open_and_register(&mut state, &path, name)
    }

    /// Returns the open store for this key, opening the existing on-disk
    /// store (without clearing it) when needed.
    pub fn get_instance(&self, job: i64, run: i32) -> Result<Arc<GraphStore>> {
        let mut state = self.lock();
        let name = store_name(job, run);

        if let Some(store) = state.open.get(&name) {
            return Ok(Arc::clone(store));
        }
        self.make_room(&mut state);

        let path = self.store_path(job, run);
        self.open_and_register(&mut state, &path, name)
    }

    /// Closes and forgets one store. Absent keys are ignored.
    pub fn close(&self, job: i64, run: i32) {
        let mut state = self.lock();
        if let Some(store) = state.remove(&store_name(job, run)) {
            close_store(&store);
        }
    }

    pub fn close_all(&self) {
        let mut state = self.lock();
        while let Some(store) = state.evict_oldest() {
            close_store(&store);
        }
    }

    fn make_room(&self, state: &mut PoolState) {
        while state.open.len() >= self.capacity {
            match state.evict_oldest() {
                Some(store) => {
                    debug!("Evicting store {}", store.name());
                    close_store(&store);
                }
                None => break,
            }
        }
    }

    fn open_and_register(
        &self,
        state: &mut PoolState,
        path: &Path,
        name: String,
    ) -> Result<Arc<GraphStore>> {
        let store = match GraphStore::open(path, &name) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to open store: {} --> {}, {}", path.display(), name, e);
                return Err(e);
            }
        };
        state.queue.push_back(name.clone());
        state.open.insert(name, Arc::clone(&store));
        Ok(store)
    }
}

impl Drop for StorePool {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// `{job}_{run}`
pub fn store_name(job: i64, run: i32) -> String {
    format!("{}_{}", job, run)
}

/// Closes the handle even while other holders keep their `Arc`; their next
/// call returns a closed-store error.
fn close_store(store: &GraphStore) {
    if let Err(e) = store.close() {
        warn!("Failed to close store {}: {}", store.name(), e);
    }
}

/// Deletes everything inside `path`. A missing directory is not an error.
fn clean_directory(path: &Path) -> io::Result<()> {
    if !path.exists() {
        info!("Store directory does not exist yet: {}", path.display());
        return Ok(());
    }
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&entry_path)?;
        } else {
            fs::remove_file(&entry_path)?;
        }
    }
    Ok(())
}
