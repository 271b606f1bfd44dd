use crate::error::{NetworkMapError, Result};
use crate::graph::{GraphBuilder, NetworkGraph};
use crate::keys;
use crate::pool::StorePool;
use crate::store::GraphStore;
use indicatif::{ProgressBar, ProgressStyle};
use netmap_archive::{ArchiveReader, extractor_for, is_archive_file};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for one indexing pass over a job's archive directory
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub job: i64,
    pub harvest_result_number: i32,
    pub directory: PathBuf,
    pub seeds: Vec<String>,
    pub show_progress_bars: bool,
}

/// Callback for reporting indexing progress
pub type IndexProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFile {
    pub name: String,
    pub path: PathBuf,
    pub format: String,
    pub compressed: bool,
    /// Records that contributed to a node
    pub records: usize,
    pub skipped_records: usize,
    /// Reading stopped early at a corrupt record
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub job: i64,
    pub harvest_result_number: i32,
    pub files: Vec<IndexedFile>,
    pub skipped_files: Vec<PathBuf>,
    pub url_count: i64,
    pub domain_count: i64,
    pub root_count: usize,
    pub malformed_count: usize,
    pub records_written: usize,
}

/// Archive files directly inside `dir`, sorted by name. Other files are
/// ignored.
pub fn list_archive_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(NetworkMapError::InvalidPath(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_archive_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Feeds archive files through the extractors into a [`GraphBuilder`].
///
/// Unreadable files and malformed records are logged and skipped.
pub struct Indexer {
    builder: GraphBuilder,
    files: Vec<IndexedFile>,
    skipped_files: Vec<PathBuf>,
}

impl Indexer {
    pub fn new(job: i64, seeds: &[String]) -> Self {
        let mut builder = GraphBuilder::new(job).with_seeds(seeds.iter().cloned());
        builder.init();
        Self {
            builder,
            files: Vec::new(),
            skipped_files: Vec::new(),
        }
    }

    pub fn index_files(&mut self, paths: &[PathBuf], progress: Option<&IndexProgressCallback>) {
        for (idx, path) in paths.iter().enumerate() {
            if let Some(callback) = progress {
                callback(format!(
                    "Indexing file {}/{}: {}",
                    idx + 1,
                    paths.len(),
                    display_name(path)
                ));
            }
            self.index_file(path);
        }
    }

    /// Indexes one file. Returns `false` when the file could not be opened.
    pub fn index_file(&mut self, path: &Path) -> bool {
        info!("Indexing file: {}", path.display());

        let reader = match ArchiveReader::open(path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Failed to open archive file: {}: {}", path.display(), e);
                self.skipped_files.push(path.to_path_buf());
                return false;
            }
        };

        let extractor = extractor_for(reader.format());
        let mut file = IndexedFile {
            name: display_name(path),
            path: path.to_path_buf(),
            format: reader.format().as_str().to_string(),
            compressed: reader.is_compressed(),
            records: 0,
            skipped_records: 0,
            truncated: false,
        };

        for record in reader {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Stopped reading {}: {}", path.display(), e);
                    file.truncated = true;
                    break;
                }
            };

            match extractor.extract(&record) {
                Ok(Some(update)) => {
                    self.builder.apply(update);
                    file.records += 1;
                }
                Ok(None) => debug!("Ignoring {} record at offset {}", record.record_type, record.offset),
                Err(e) => {
                    warn!(
                        "Skipping record at offset {} in {}: {}",
                        record.offset,
                        path.display(),
                        e
                    );
                    file.skipped_records += 1;
                }
            }
        }

        self.files.push(file);
        true
    }

    pub fn files(&self) -> &[IndexedFile] {
        &self.files
    }

    pub fn skipped_files(&self) -> &[PathBuf] {
        &self.skipped_files
    }

    pub fn finish(self) -> (NetworkGraph, Vec<IndexedFile>, Vec<PathBuf>) {
        (self.builder.finish(), self.files, self.skipped_files)
    }
}

/// Writes the graph in one batch, then the completion marker.
pub fn save_graph(store: &GraphStore, graph: &NetworkGraph) -> Result<usize> {
    let written = store.bulk_insert(graph.to_records()?)?;
    store.put_value(
        &keys::named_key(graph.job, keys::BUILD_COMPLETE),
        &graph.build_marker(),
    )?;
    Ok(written)
}

/// Indexes every archive file of `options.directory` into `store`.
pub fn index_directory(
    options: &IndexOptions,
    store: &GraphStore,
    progress: Option<&IndexProgressCallback>,
) -> Result<IndexSummary> {
    let paths = list_archive_files(&options.directory)?;
    if paths.is_empty() {
        warn!(
            "Could not find any archive files in directory: {}",
            options.directory.display()
        );
    }

    let mut indexer = Indexer::new(options.job, &options.seeds);
    indexer.index_files(&paths, progress);
    let (graph, files, skipped_files) = indexer.finish();

    let records_written = save_graph(store, &graph)?;
    info!(
        "Indexed job {} run {}: {} urls, {} domains, {} malformed",
        options.job,
        options.harvest_result_number,
        graph.url_count,
        graph.domain_count,
        graph.malformed_urls.len()
    );

    Ok(IndexSummary {
        job: options.job,
        harvest_result_number: options.harvest_result_number,
        files,
        skipped_files,
        url_count: graph.url_count,
        domain_count: graph.domain_count,
        root_count: graph.root_urls.len(),
        malformed_count: graph.malformed_urls.len(),
        records_written,
    })
}

/// Execute an indexing pass with the given options.
///
/// The store is (re)created through the pool, which clears any previous
/// build for the same job and run. The blocking work runs on tokio's
/// blocking thread pool.
pub async fn execute_index(
    options: IndexOptions,
    pool: Arc<StorePool>,
    progress_callback: Option<IndexProgressCallback>,
) -> Result<IndexSummary> {
    let progress_bar = if options.show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Starting index...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let progress: Option<IndexProgressCallback> = match (&progress_bar, progress_callback) {
        (Some(pb), user) => {
            let pb = Arc::clone(pb);
            let callback: IndexProgressCallback = Arc::new(move |msg: String| {
                pb.set_message(msg.clone());
                pb.tick();
                if let Some(ref user) = user {
                    user(msg);
                }
            });
            Some(callback)
        }
        (None, user) => user,
    };

    let summary = tokio::task::spawn_blocking(move || {
        let store = pool.create_instance(options.job, options.harvest_result_number)?;
        index_directory(&options, &store, progress.as_ref())
    })
    .await??;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Index complete! {} urls, {} domains",
            summary.url_count, summary.domain_count
        ));
    }

    Ok(summary)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
