//! `sdatrie-build`: compile TAB-separated records into a trie image.
//!
//! Each input line is `key<TAB>value` (the value is optional and ignored in
//! `empty` mode); lines must be sorted by dictionary order of keys.

use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use sdatrie::{Builder, Element4, Element5, ElementCodec, Record, TailValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ValueKind {
    /// No values; the trie stores keys only.
    Empty,
    /// 32-bit integer values.
    Int,
    /// 64-bit floating-point values.
    Double,
    /// String values.
    String,
}

#[derive(Debug, Parser)]
#[command(
    name = "sdatrie-build",
    about = "Builds a static double-array trie from a sorted record file"
)]
struct Args {
    /// Type of the record values.
    #[arg(short = 't', long = "type", value_enum, default_value = "empty")]
    value_type: ValueKind,

    /// Store each double-array element in 4 bytes instead of 5; only viable
    /// for small tries.
    #[arg(short, long)]
    compact: bool,

    /// Database file to write the trie image to; without it the build is a
    /// dry run that only reports statistics.
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Input record file.
    input: PathBuf,
}

fn run<V: TailValue, C: ElementCodec>(
    args: &Args,
    parse: impl Fn(&str) -> Result<V, Box<dyn Error>>,
) -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string(&args.input)?;
    let mut records: Vec<Record<&str, V>> = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('\t').unwrap_or((line, ""));
        records.push(Record {
            key,
            value: parse(value)?,
        });
    }

    let mut builder: Builder<V, C> = Builder::new();
    builder.set_progress(|done, total| {
        if total >= 10 && done % (total / 10) == 0 {
            eprintln!("  {done}/{total} records stored");
        }
    });
    let stats = builder.build(&records)?;

    eprintln!("Number of records: {}", stats.leaf_count);
    eprintln!("Double array size: {} bytes", stats.element_bytes);
    eprintln!("Number of elements: {}", stats.element_count);
    eprintln!("Number of elements used: {}", stats.used_count);
    eprintln!("Utilization ratio: {:.4}", stats.usage);
    eprintln!("Number of nodes: {}", stats.node_count);
    eprintln!("Average number of BASE trials: {:.4}", stats.base_trial_avg);
    eprintln!("Tail size: {} bytes", stats.tail_bytes);

    if let Some(db) = &args.db {
        let mut out = BufWriter::new(File::create(db)?);
        builder.write(&mut out)?;
    }
    Ok(())
}

fn dispatch(args: &Args) -> Result<(), Box<dyn Error>> {
    match (args.value_type, args.compact) {
        (ValueKind::Empty, false) => run::<(), Element5>(args, |_| Ok(())),
        (ValueKind::Empty, true) => run::<(), Element4>(args, |_| Ok(())),
        (ValueKind::Int, false) => run::<i32, Element5>(args, |s| Ok(s.parse()?)),
        (ValueKind::Int, true) => run::<i32, Element4>(args, |s| Ok(s.parse()?)),
        (ValueKind::Double, false) => run::<f64, Element5>(args, |s| Ok(s.parse()?)),
        (ValueKind::Double, true) => run::<f64, Element4>(args, |s| Ok(s.parse()?)),
        (ValueKind::String, false) => run::<String, Element5>(args, |s| Ok(s.to_string())),
        (ValueKind::String, true) => run::<String, Element4>(args, |s| Ok(s.to_string())),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match dispatch(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
