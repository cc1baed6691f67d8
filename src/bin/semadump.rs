//! Dumps the sample target's semantics tables as Rust source.
//!
//! Mostly a debugging aid: run it to see exactly what the table builder
//! lays out for the demo description, or point `--output` at a file to
//! diff runs.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use sematab::core::TreeArena;
use sematab::emit::TableBuilder;
use sematab::render::render_tables;
use sematab::testdesc::TestDescription;

#[derive(Parser)]
#[command(name = "semadump", about = "Dump instruction semantics tables", version)]
struct Args {
    /// Write the rendered tables here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print table statistics to stderr.
    #[arg(long)]
    stats: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let arena = TreeArena::new();
    let desc = TestDescription::sample(&arena);
    let tables = match TableBuilder::build(&desc) {
        Ok(tables) => tables,
        Err(err) => {
            error!("cannot build tables: {err}");
            return ExitCode::FAILURE;
        }
    };

    if args.stats {
        eprintln!(
            "{} instructions, {} with programs, {} cells, {} constants, {} selectors, {} predicates",
            tables.offsets.len(),
            tables.num_accepted(),
            tables.program.len(),
            tables.constants.len(),
            tables.selector_names.len(),
            tables.predicate_names.len(),
        );
    }

    let text = render_tables(&tables);
    match args.output {
        Some(path) => {
            if let Err(err) = fs::write(&path, text) {
                error!("cannot write {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => print!("{text}"),
    }
    ExitCode::SUCCESS
}
