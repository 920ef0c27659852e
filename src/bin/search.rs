//! `sdatrie-search`: query a trie image with keys read from standard input.
//!
//! Default mode prints `key<TAB>value` for every hit; `--in` prints a 0/1
//! membership flag per query; `--prefix` prints every stored key that is a
//! prefix of the query, with its value.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use sdatrie::{Element4, Element5, ElementCodec, TailValue, Trie};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ValueKind {
    Empty,
    Int,
    Double,
    String,
}

#[derive(Debug, Parser)]
#[command(
    name = "sdatrie-search",
    about = "Queries a static double-array trie image"
)]
struct Args {
    /// Type of the record values; must match the type the image was built
    /// with.
    #[arg(short = 't', long = "type", value_enum, default_value = "empty")]
    value_type: ValueKind,

    /// The image uses the compact 4-byte element packing.
    #[arg(short, long)]
    compact: bool,

    /// Database file holding the trie image.
    #[arg(short, long)]
    db: PathBuf,

    /// Only report membership (`query<TAB>1` or `query<TAB>0`).
    #[arg(long = "in", conflicts_with = "prefix")]
    membership: bool,

    /// Report every stored key that is a prefix of the query.
    #[arg(long)]
    prefix: bool,
}

fn run<V: TailValue, C: ElementCodec>(
    args: &Args,
    show: impl Fn(&V) -> String,
) -> Result<(), Box<dyn Error>> {
    let mut db = BufReader::new(File::open(&args.db)?);
    let trie: Trie<'static, V, C> = Trie::read(&mut db)?;

    for line in io::stdin().lock().lines() {
        let query = line?;
        if args.membership {
            println!("{query}\t{}", u8::from(trie.contains(&query)));
        } else if args.prefix {
            let mut cursor = trie.prefix(query.as_bytes());
            while let Some(m) = cursor.next()? {
                println!("{}\t{}", &query[..m.length], show(&m.value));
            }
        } else if let Some(value) = trie.find(&query) {
            println!("{query}\t{}", show(&value));
        }
    }
    Ok(())
}

fn dispatch(args: &Args) -> Result<(), Box<dyn Error>> {
    match (args.value_type, args.compact) {
        (ValueKind::Empty, false) => run::<(), Element5>(args, |_: &()| String::new()),
        (ValueKind::Empty, true) => run::<(), Element4>(args, |_: &()| String::new()),
        (ValueKind::Int, false) => run::<i32, Element5>(args, ToString::to_string),
        (ValueKind::Int, true) => run::<i32, Element4>(args, ToString::to_string),
        (ValueKind::Double, false) => run::<f64, Element5>(args, ToString::to_string),
        (ValueKind::Double, true) => run::<f64, Element4>(args, ToString::to_string),
        (ValueKind::String, false) => run::<String, Element5>(args, ToString::to_string),
        (ValueKind::String, true) => run::<String, Element4>(args, ToString::to_string),
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
