//! Run a slice query against a configured dataset from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Descriptor from a file, text table output
//! slice --config atlas.toml --dataset trade query.json
//!
//! # Descriptor on stdin, JSON output, debug logging (compiled SQL) on stderr
//! cat query.json | slice -c atlas.toml -d trade -f json -vv
//! ```
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use atlas_core::config::AtlasConfig;
use atlas_core::lookup::SliceDefinition;
use atlas_core::query::QueryDescriptor;
use atlas_core::table::TableFormat;
use clap::{ArgAction, Parser};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "slice",
    version,
    about = "Run a JSON slice query against a configured dataset"
)]
struct Args {
    /// Dataset configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Name of the dataset to query
    #[arg(short, long)]
    dataset: String,

    /// JSON query descriptor; read from stdin when absent or '-'
    #[arg(value_name = "DESCRIPTOR")]
    descriptor: Option<String>,

    /// Name of the slice, used in log output
    #[arg(long, default_value = "cli")]
    slice: String,

    /// Output format: text, csv or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

fn get_from_stdin() -> String {
    let mut data = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut data) {
        eprintln!("Error reading from STDIN: '{}'", e);
        process::exit(1);
    }
    data
}

fn read_descriptor(input: Option<&str>) -> String {
    match input {
        None | Some("-") => get_from_stdin(),
        Some(path) => match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Can't access query descriptor file: '{}'", e);
                process::exit(1);
            }
        },
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let table_format = match TableFormat::from_str(&args.format) {
        Ok(tf) => tf,
        Err(e) => {
            eprintln!("{}", &e);
            process::exit(1);
        }
    };

    let config = match AtlasConfig::load_from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {}", &e);
            process::exit(1);
        }
    };

    let query = match QueryDescriptor::from_json(&read_descriptor(args.descriptor.as_deref())) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error parsing query descriptor: {}", &e);
            process::exit(1);
        }
    };

    let conn = match config.open_connection() {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Error opening database: {}", &e);
            process::exit(1);
        }
    };
    let registry = match config.build_registry(&conn) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error setting up datasets: {}", &e);
            process::exit(1);
        }
    };

    let slice_def = SliceDefinition::new(&args.slice, &args.dataset);
    match registry
        .fetch(&slice_def, &query)
        .and_then(|table| table.output(table_format))
    {
        Ok(out) => print!("{}", out),
        Err(e) => {
            eprintln!("Error running slice query: {}", &e);
            process::exit(1);
        }
    }
}
