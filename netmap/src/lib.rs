pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{
    QueryRequest, build_pool, collect_seeds, load_seeds_from_file, parse_url_line,
    resolve_store_root, run_query, search_command_from_args,
};
