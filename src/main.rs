use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use gfftool::convert::parse_type_mapping;
use gfftool::sequence::{fasta_header, feature_sequence, write_fasta};
use gfftool::{
    convert_records, ConvertOptions, FilterChain, FilterParams, GffReader, IndexedFasta,
    OutputField, ReaderBuilder, Summary,
};

/// Inspect, filter and convert GFF3/GTF annotations.
#[derive(Parser, Debug)]
#[command(name = "gfftool")]
#[command(author, version, about)]
struct Cli {
    /// Log progress information (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print overview stats of a GFF file as JSON
    Stats(StatsArgs),

    /// Convert Ensembl-style GFF3 to GTF
    #[command(alias = "convert")]
    Conv(ConvArgs),

    /// Print records that pass the given filters
    Filter(FilterArgs),

    /// Extract the sequence of every record that passes the given filters
    Seq(SeqArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Input annotation file (.gff3/.gtf, optionally .gz)
    #[arg(value_name = "GFF_FILE")]
    gff_file: PathBuf,

    /// Column 5 marks one past the last base instead of the last base
    #[arg(long)]
    half_open: bool,

    /// Show a progress bar on stderr
    #[arg(long)]
    progress: bool,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Args, Debug)]
struct ConvArgs {
    #[command(flatten)]
    input: InputArgs,

    /// ID prefix to keep, e.g. `-p transcript -p gene` gives
    /// 'transcript:G9200.1' and 'gene:G9200' as ids
    #[arg(short = 'p', long = "reserve-id-prefix", value_name = "TYPE")]
    id_prefixes: Vec<String>,

    /// Rewrite one feature type to another, e.g. `-t mRNA:transcript`
    #[arg(short = 't', long = "transform-feature-type", value_name = "OLD:NEW")]
    type_mapping: Vec<String>,

    /// Separator between the type prefix and the id in `ID`/`Parent` values
    #[arg(short = 'd', long, default_value = ":")]
    type_delimiter: String,
}

#[derive(Args, Debug)]
struct FilterOpts {
    /// Keep records on this sequence (repeatable)
    #[arg(short = 'i', long)]
    seqid: Vec<String>,

    /// Keep records from this source (repeatable)
    #[arg(short = 's', long)]
    source: Vec<String>,

    /// Keep records of this feature type (repeatable)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    feature_type: Vec<String>,

    /// Keep records on this strand: +, - or . (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    strand: Vec<String>,

    /// Keep records carrying key=value; all given pairs must match (repeatable)
    #[arg(short = 'a', long, value_name = "KEY=VALUE")]
    attributes: Vec<String>,

    /// Keep records for which the expression holds, e.g.
    /// "type == 'exon' and end - start > 100" (repeatable, all must hold)
    #[arg(short = 'e', long)]
    expression: Vec<String>,

    /// Keep records inside seq:start-end, 1-based inclusive (repeatable, any may match)
    #[arg(short = 'r', long, value_name = "REGION")]
    region: Vec<String>,

    /// JSON file with filter settings; command-line values are added on top
    #[arg(short = 'c', long, value_name = "JSON")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FilterArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    filters: FilterOpts,

    /// What to print: all, attributes, a column name
    /// (seqid source type start end score strand phase) or an attribute key
    #[arg(short = 'p', long, default_value = "all")]
    print_field: OutputField,
}

#[derive(Args, Debug)]
struct SeqArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Genome FASTA with a .fai index next to it
    #[arg(short = 'g', long = "genome-file", value_name = "FASTA")]
    genome: PathBuf,

    #[command(flatten)]
    filters: FilterOpts,
}

impl FilterOpts {
    fn params(&self) -> Result<FilterParams> {
        let mut params = match &self.config {
            Some(path) => load_config(path)?,
            None => FilterParams::new(),
        };
        let cli = [
            ("seqid", &self.seqid),
            ("source", &self.source),
            ("type", &self.feature_type),
            ("strand", &self.strand),
            ("attributes", &self.attributes),
            ("expression", &self.expression),
            ("region", &self.region),
        ];
        for (key, values) in cli {
            if !values.is_empty() {
                params.entry(key.to_string()).or_default().extend(values.iter().cloned());
            }
        }
        Ok(params)
    }
}

fn load_config(path: &Path) -> Result<FilterParams> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading filter config {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing filter config {}", path.display()))
}

fn open_reader(input: &InputArgs) -> Result<(GffReader, Option<ProgressBar>)> {
    let mut builder = ReaderBuilder::new().end_included(!input.half_open);
    let mut bar = None;

    if input.progress {
        let total = fs::metadata(&input.gff_file)
            .with_context(|| format!("reading {}", input.gff_file.display()))?
            .len();
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}, ETA: {eta}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message(input.gff_file.display().to_string());
        let sink = pb.clone();
        builder = builder.progress(move |bytes| sink.set_position(bytes));
        bar = Some(pb);
    }

    Ok((builder.build_from_path(&input.gff_file), bar))
}

fn finish(bar: Option<ProgressBar>) {
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

/// Pretty JSON plus a newline. Rendered first so a failed write surfaces
/// as an `io::Error`.
fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn run(cmd: Command) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cmd {
        Command::Stats(args) => {
            let end_included = !args.input.half_open;
            let (mut reader, bar) = open_reader(&args.input)?;
            let summary = Summary::from_records(reader.records()?, end_included)
                .with_context(|| format!("reading {}", args.input.gff_file.display()))?;
            finish(bar);

            if !summary.favours_closed_intervals() {
                log::warn!("most codon-sized features are not a multiple of 3 long; try --half-open");
            }
            write_json(&mut out, &summary)?;
        }

        Command::Conv(args) => {
            let options = ConvertOptions {
                id_prefixes: args.id_prefixes,
                type_mapping: parse_type_mapping(&args.type_mapping)?,
                type_delimiter: args.type_delimiter,
                end_included: !args.input.half_open,
            };
            let (mut reader, bar) = open_reader(&args.input)?;
            let n = convert_records(reader.records()?, &mut out, options)
                .with_context(|| format!("converting {}", args.input.gff_file.display()))?;
            finish(bar);
            log::info!("{n} records converted");
        }

        Command::Filter(args) => {
            let chain = FilterChain::from_params(&args.filters.params()?)?;
            let (mut reader, bar) = open_reader(&args.input)?;
            for rec in chain.select(reader.records()?) {
                let (feature, raw) =
                    rec.with_context(|| format!("reading {}", args.input.gff_file.display()))?;
                args.print_field.write(&mut out, &feature, &raw)?;
            }
            finish(bar);
        }

        Command::Seq(args) => {
            let end_included = !args.input.half_open;
            let chain = FilterChain::from_params(&args.filters.params()?)?;
            let mut genome = IndexedFasta::from_file(&args.genome)
                .with_context(|| format!("opening genome {}", args.genome.display()))?;
            let (mut reader, bar) = open_reader(&args.input)?;
            for rec in chain.select(reader.records()?) {
                let (feature, _) =
                    rec.with_context(|| format!("reading {}", args.input.gff_file.display()))?;
                let seq = feature_sequence(&mut genome, &feature)?;
                write_fasta(&mut out, &fasta_header(&feature, end_included), &seq)?;
            }
            finish(bar);
        }
    }

    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli.cmd) {
        // downstream closed the pipe (e.g. `| head`)
        Err(e) if is_broken_pipe(&e) => Ok(()),
        other => other,
    }
}
