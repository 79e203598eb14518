#![cfg(not(tarpaulin_include))]

use autogroup::document::to_pdf;
use autogroup::downloader::{to_csv, to_xlsx};
use autogroup::grouping::{GroupSize, parse, partition, shuffle};
use autogroup::loader::import_from;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Split a list file into fixed-size groups
#[derive(Debug, Parser)]
#[command(name = "autogroup-cli", version)]
struct Args {
    /// List to group (.txt, .csv, .xlsx or .xls)
    input: PathBuf,

    /// Members per group
    #[arg(short, long)]
    size: String,

    /// Shuffle the list before grouping
    #[arg(long)]
    shuffle: bool,

    /// Write the groups as a PDF document
    #[arg(long, value_name = "PATH")]
    pdf: Option<PathBuf>,

    /// Write the groups as an XLSX spreadsheet
    #[arg(long, value_name = "PATH")]
    xlsx: Option<PathBuf>,

    /// Write the groups as CSV
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let text = import_from(&args.input)?;

    let mut items = parse(&text);
    if items.is_empty() {
        return Err(autogroup::GroupError::EmptyInput.into());
    }
    let size = GroupSize::parse(&args.size)?;
    if args.shuffle {
        items = shuffle(&items);
    }

    let groups = partition(&items, size)?;
    for (i, group) in groups.groups().iter().enumerate() {
        println!("Group {} ({} members):", i + 1, group.len());
        for item in group {
            println!("  \u{2022} {}", item);
        }
    }

    if let Some(path) = &args.pdf {
        fs::write(path, to_pdf(&groups)?)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &args.xlsx {
        fs::write(path, to_xlsx(&groups)?)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &args.csv {
        fs::write(path, to_csv(&groups)?)?;
        log::info!("wrote {}", path.display());
    }

    Ok(())
}
