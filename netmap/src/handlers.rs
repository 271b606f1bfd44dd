use clap::ArgMatches;
use colored::Colorize;
use netmap_core::export::NetworkMapExport;
use netmap_core::index::{IndexOptions, IndexProgressCallback, IndexSummary, execute_index};
use netmap_core::model::SearchCommand;
use netmap_core::pool::StorePool;
use netmap_core::query::NetworkMapService;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::commands::DEFAULT_STORE_ROOT;

// Helper functions for argument handling

/// Expands `~` in the store root given on the command line.
pub fn resolve_store_root(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Pool over the store root and size given by the global arguments.
pub fn build_pool(args: &ArgMatches) -> Arc<StorePool> {
    let root = args
        .get_one::<String>("store")
        .map(String::as_str)
        .unwrap_or(DEFAULT_STORE_ROOT);
    let capacity = args
        .get_one::<usize>("pool-size")
        .copied()
        .unwrap_or(netmap_core::pool::DEFAULT_POOL_SIZE);
    Arc::new(StorePool::with_capacity(resolve_store_root(root), capacity))
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Load and parse seed URLs from a file
pub fn load_seeds_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read seeds file {}: {}", path.display(), e))?;

    let seeds: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if seeds.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(seeds)
}

/// Seeds from `--seed` followed by those of `--seeds-file`.
pub fn collect_seeds(args: &ArgMatches) -> Result<Vec<String>, String> {
    let mut seeds: Vec<String> = args
        .get_many::<String>("seed")
        .into_iter()
        .flatten()
        .filter_map(|s| parse_url_line(s.trim()))
        .collect();

    if let Some(path) = args.get_one::<PathBuf>("seeds-file") {
        seeds.extend(load_seeds_from_file(path)?);
    }
    Ok(seeds)
}

fn job_and_run(args: &ArgMatches) -> Result<(i64, i32), String> {
    let job = *args
        .get_one::<i64>("job")
        .ok_or_else(|| "--job is required".to_string())?;
    let run = args.get_one::<i32>("run").copied().unwrap_or(1);
    Ok((job, run))
}

/// A query subcommand with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    Get(String),
    Node(i64),
    Outlinks(i64),
    Children(i64),
    Domains,
    Seeds,
    Malformed,
    HopPath(i64),
    Search(SearchCommand),
    Status,
}

impl QueryRequest {
    pub fn from_matches(args: &ArgMatches) -> Result<Self, String> {
        let id = |sub: &ArgMatches| -> Result<i64, String> {
            sub.get_one::<i64>("ID")
                .copied()
                .ok_or_else(|| "missing node id".to_string())
        };

        match args.subcommand() {
            Some(("get", sub)) => sub
                .get_one::<String>("KEY")
                .cloned()
                .map(QueryRequest::Get)
                .ok_or_else(|| "missing key".to_string()),
            Some(("node", sub)) => Ok(QueryRequest::Node(id(sub)?)),
            Some(("outlinks", sub)) => Ok(QueryRequest::Outlinks(id(sub)?)),
            Some(("children", sub)) => Ok(QueryRequest::Children(id(sub)?)),
            Some(("domains", _)) => Ok(QueryRequest::Domains),
            Some(("seeds", _)) => Ok(QueryRequest::Seeds),
            Some(("malformed", _)) => Ok(QueryRequest::Malformed),
            Some(("hop-path", sub)) => Ok(QueryRequest::HopPath(id(sub)?)),
            Some(("search", sub)) => Ok(QueryRequest::Search(search_command_from_args(sub)?)),
            Some(("status", _)) => Ok(QueryRequest::Status),
            Some((other, _)) => Err(format!("Unknown query: {}", other)),
            None => Err("No query given".to_string()),
        }
    }
}

/// Builds the search filter from `--filter` JSON or the individual flags.
pub fn search_command_from_args(args: &ArgMatches) -> Result<SearchCommand, String> {
    if let Some(json) = args.get_one::<String>("filter") {
        return serde_json::from_str(json).map_err(|e| format!("Invalid search filter: {}", e));
    }

    let strings = |name: &str| -> Vec<String> {
        args.get_many::<String>(name)
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    };
    Ok(SearchCommand {
        domain_names: strings("domain"),
        content_types: strings("content-type"),
        status_codes: args
            .get_many::<i32>("status")
            .into_iter()
            .flatten()
            .copied()
            .collect(),
    })
}

/// Runs one query and returns its JSON payload. Missing nodes yield `null`.
pub fn run_query(
    service: &NetworkMapService,
    job: i64,
    run: i32,
    request: &QueryRequest,
) -> netmap_core::Result<Value> {
    let value = match request {
        QueryRequest::Get(key) => match service.get(job, run, key)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            None => Value::Null,
        },
        QueryRequest::Node(id) => serde_json::to_value(service.get_node(job, run, *id)?)?,
        QueryRequest::Outlinks(id) => serde_json::to_value(service.get_outlinks(job, run, *id)?)?,
        QueryRequest::Children(id) => serde_json::to_value(service.get_children(job, run, *id)?)?,
        QueryRequest::Domains => serde_json::to_value(service.get_all_domains(job, run)?)?,
        QueryRequest::Seeds => serde_json::to_value(service.get_seed_urls(job, run)?)?,
        QueryRequest::Malformed => serde_json::to_value(service.get_malformed_urls(job, run)?)?,
        QueryRequest::HopPath(id) => serde_json::to_value(service.get_hop_path(job, run, *id)?)?,
        QueryRequest::Search(filter) => serde_json::to_value(service.search_url(job, run, filter)?)?,
        QueryRequest::Status => serde_json::to_value(service.build_status(job, run)?)?,
    };
    Ok(value)
}

fn describe_result(value: &Value) -> String {
    match value {
        Value::Null => "not found".to_string(),
        Value::Array(items) => format!("{} node(s)", items.len()),
        _ => "1 value".to_string(),
    }
}

fn print_json(value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}

// Command handlers

pub async fn handle_index(
    args: &ArgMatches,
    pool: Arc<StorePool>,
    quiet: bool,
) -> Result<IndexSummary, String> {
    let (job, run) = job_and_run(args)?;
    let directory = args
        .get_one::<PathBuf>("dir")
        .cloned()
        .ok_or_else(|| "--dir is required".to_string())?;
    let seeds = collect_seeds(args)?;
    let show_progress_bars = !quiet && !args.get_flag("no-progress");

    if !quiet {
        eprintln!(
            "{} Indexing {} into job {} run {}",
            "→".blue(),
            directory.display().to_string().bright_white(),
            job,
            run
        );
        if !seeds.is_empty() {
            eprintln!("{} {} declared seed(s)", "→".blue(), seeds.len());
        }
    }

    let options = IndexOptions {
        job,
        harvest_result_number: run,
        directory,
        seeds,
        show_progress_bars,
    };

    let progress_callback: Option<IndexProgressCallback> = None;
    let summary = execute_index(options, pool, progress_callback)
        .await
        .map_err(|e| format!("Index failed: {}", e))?;

    print_json(&serde_json::to_value(&summary).map_err(|e| e.to_string())?)?;

    if !quiet {
        eprintln!(
            "{} {} urls, {} domains, {} roots, {} malformed from {} file(s)",
            "✓".green().bold(),
            summary.url_count.to_string().cyan(),
            summary.domain_count.to_string().cyan(),
            summary.root_count.to_string().cyan(),
            summary.malformed_count.to_string().cyan(),
            summary.files.len()
        );
        for path in &summary.skipped_files {
            eprintln!(
                "  {} skipped {}",
                "⚠".yellow(),
                path.display().to_string().bright_white()
            );
        }
    }

    Ok(summary)
}

pub fn handle_query(args: &ArgMatches, pool: Arc<StorePool>, quiet: bool) -> Result<Value, String> {
    let (job, run) = job_and_run(args)?;
    let request = QueryRequest::from_matches(args)?;
    let service = NetworkMapService::new(pool);

    let value = run_query(&service, job, run, &request).map_err(|e| format!("Query failed: {}", e))?;
    print_json(&value)?;

    if !quiet {
        eprintln!("{} {}", "✓".green().bold(), describe_result(&value));
    }
    Ok(value)
}

pub fn handle_export(args: &ArgMatches, pool: Arc<StorePool>, quiet: bool) -> Result<(), String> {
    let (job, run) = job_and_run(args)?;
    let output = args
        .get_one::<PathBuf>("output")
        .ok_or_else(|| "--output is required".to_string())?;

    let store = pool
        .get_instance(job, run)
        .map_err(|e| format!("Failed to open store for job {} run {}: {}", job, run, e))?;
    let summary = NetworkMapExport::new(output)
        .export_store(&store, job)
        .map_err(|e| format!("Export failed: {}", e))?;

    if !quiet {
        eprintln!(
            "{} Exported {} url lines in {} file(s) and {} domains to {}",
            "✓".green().bold(),
            summary.url_lines.to_string().cyan(),
            summary.domain_files,
            summary.domains.to_string().cyan(),
            summary.directory.display().to_string().bright_white()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_result() {
        assert_eq!(describe_result(&Value::Null), "not found");
        assert_eq!(describe_result(&serde_json::json!([1, 2])), "2 node(s)");
        assert_eq!(describe_result(&serde_json::json!({"id": 1})), "1 value");
    }
}
