use colored::Colorize;
use netmap::commands::command_argument_builder;
use netmap::handlers::{build_pool, handle_export, handle_index, handle_query};
use tracing::Level;

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // JSON goes to stdout, so logs stay on stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if quiet { Level::WARN } else { Level::INFO })
        .init();

    let pool = build_pool(&chosen_command);

    let result = match chosen_command.subcommand() {
        Some(("index", primary_command)) => handle_index(primary_command, pool.clone(), quiet)
            .await
            .map(|_| ()),
        Some(("query", primary_command)) => {
            handle_query(primary_command, pool.clone(), quiet).map(|_| ())
        }
        Some(("export", primary_command)) => handle_export(primary_command, pool.clone(), quiet),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    pool.close_all();

    if let Err(e) = result {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
