use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};

use blastnr::filter::{FilterConfig, HitFilter, DEFAULT_IDENTITY_THRESHOLD};
use blastnr::reader::open_blast_input;

/// blastnr - reduce BLAST tabular hits to a non-redundant set
///
/// Merges split hits against the same subject, suppresses redundant
/// overlapping hits in favor of the higher-identity one, and optionally
/// picks one representative hit per covered query region across subjects.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input hit table (BLAST -outfmt 6/7 layout; stdin if not given)
    #[clap(value_name = "HITS_TSV")]
    input: Option<String>,

    /// Output file (stdout if not specified)
    #[clap(short = 'o', long = "output")]
    output: Option<String>,

    /// Minimum percent identity to keep a hit
    #[clap(short = 'p', long = "min-identity", default_value_t = DEFAULT_IDENTITY_THRESHOLD)]
    min_identity: f64,

    /// Pick one representative per covered query region across subjects
    #[clap(short = 'n', long = "non-redundant")]
    non_redundant: bool,

    /// Keep input order instead of sorting by query start
    #[clap(long = "no-sort")]
    no_sort: bool,

    /// Emit retired hits too (flag column reads false)
    #[clap(short = 'a', long = "all")]
    all: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = FilterConfig {
        identity_threshold: args.min_identity,
        non_redundant: args.non_redundant,
        ordered: !args.no_sort,
    };
    let filter = HitFilter::new(config).with_emit_all(args.all);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => open_blast_input(path)?,
        None => Box::new(BufReader::new(io::stdin())),
    };

    match &args.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {path}"))?;
            let mut writer = BufWriter::new(file);
            filter.filter_stream(reader, &mut writer)
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            filter.filter_stream(reader, &mut writer)
        }
    }
}
