use clap::{arg, command};
use std::path::PathBuf;

pub const DEFAULT_STORE_ROOT: &str = "~/.local/share/netmap/";

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn job_arg() -> clap::Arg {
    arg!(-j --"job" <JOB>)
        .required(true)
        .help("The job whose graph is read or written")
        .value_parser(clap::value_parser!(i64))
}

fn run_arg() -> clap::Arg {
    arg!(-r --"run" <RUN>)
        .required(false)
        .help("The harvest result number within the job")
        .value_parser(clap::value_parser!(i32))
        .default_value("1")
}

fn id_arg() -> clap::Arg {
    arg!(<ID>)
        .required(true)
        .help("Node id")
        .value_parser(clap::value_parser!(i64))
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("netmap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("netmap")
        .about("Builds and queries link graphs from WARC/ARC web-archive files")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress summaries and informational logging").required(false))
        .arg(
            arg!(-s --"store" <PATH>)
                .required(false)
                .help("Root directory of the graph stores")
                .default_value(DEFAULT_STORE_ROOT),
        )
        .arg(
            arg!(--"pool-size" <NUM_STORES>)
                .required(false)
                .help("Maximum number of stores held open at once")
                .value_parser(clap::value_parser!(usize))
                .default_value("10"),
        )
        .subcommand_required(true)
        .subcommand(
            command!("index")
                .about("Indexes every archive file of a directory into the job's store")
                .arg(job_arg())
                .arg(run_arg())
                .arg(
                    arg!(-d --"dir" <PATH>)
                        .required(true)
                        .help("Directory holding the .warc, .warc.gz, .arc and .arc.gz files")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"seed" <URL>)
                        .required(false)
                        .help("Seed URL of the harvest (repeatable)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"seeds-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of seed URLs")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"no-progress")
                        .required(false)
                        .help("Disable the progress spinner")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("query")
                .about("Reads nodes and lists from an indexed job")
                .arg(job_arg())
                .arg(run_arg())
                .subcommand_required(true)
                .subcommand(
                    command!("get")
                        .about("Prints the raw value stored under a key")
                        .arg(arg!(<KEY>).required(true).help("Store key, e.g. 36/url-count")),
                )
                .subcommand(command!("node").about("Prints one node").arg(id_arg()))
                .subcommand(
                    command!("outlinks")
                        .about("Prints the nodes linked from a node")
                        .arg(id_arg()),
                )
                .subcommand(
                    command!("children")
                        .about("Prints the domains linked from a domain, with their buckets")
                        .arg(id_arg()),
                )
                .subcommand(command!("domains").about("Prints every domain node"))
                .subcommand(command!("seeds").about("Prints the seed and root URL nodes"))
                .subcommand(
                    command!("malformed").about("Prints URL nodes missing part of their exchange"),
                )
                .subcommand(
                    command!("hop-path")
                        .about("Prints a node and its ancestors up to the root")
                        .arg(id_arg()),
                )
                .subcommand(
                    command!("search")
                        .about("Prints URL nodes matching every given filter")
                        .arg(
                            arg!(--"domain" <NAME>)
                                .required(false)
                                .help("Domain name to match (repeatable)")
                                .action(clap::ArgAction::Append),
                        )
                        .arg(
                            arg!(--"content-type" <TYPE>)
                                .required(false)
                                .help("Content type or prefix to match (repeatable)")
                                .action(clap::ArgAction::Append),
                        )
                        .arg(
                            arg!(--"status" <CODE>)
                                .required(false)
                                .help("HTTP status code to match (repeatable)")
                                .value_parser(clap::value_parser!(i32))
                                .action(clap::ArgAction::Append),
                        )
                        .arg(
                            arg!(--"filter" <JSON>)
                                .required(false)
                                .help("Search command as JSON, e.g. {\"contentTypes\":[\"text/html\"]}")
                                .conflicts_with_all(["domain", "content-type", "status"]),
                        ),
                )
                .subcommand(command!("status").about("Prints the completion marker of the last build")),
        )
        .subcommand(
            command!("export")
                .about("Writes a job's graph as resource line files and domain.json")
                .arg(job_arg())
                .arg(run_arg())
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(true)
                        .help("Directory to write the resource/ folder into")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
