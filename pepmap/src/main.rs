use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::io::{BufReader, BufWriter, Write};

use pepmap::index::corpus::SequenceCorpus;
use pepmap::index::{IndexMeta, IndexOptions, ProteinIndex};
use pepmap::io::{fasta, query};
use pepmap::mapping::TagMapper;
use pepmap::modification::ModificationRegistry;
use pepmap::params::MappingParams;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "pepmap", author, version, about = "Map peptides and sequence tags to proteins with an FM index", arg_required_else_help = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a protein index from a FASTA file
    Index {
        /// Protein FASTA file
        fasta: String,
        /// Output prefix; the index is written to <prefix>.pidx
        #[arg(short, long, default_value = "proteins")]
        output: String,
        /// Parameter file (JSON); only the decoy settings are used here
        #[arg(long)]
        params: Option<String>,
        /// Do not append reversed decoy proteins
        #[arg(long = "no-decoys")]
        no_decoys: bool,
        /// Suffix appended to decoy accessions and headers
        #[arg(long = "decoy-tag")]
        decoy_tag: Option<String>,
        /// Suffix array sampling interval
        #[arg(long = "sa-sample", default_value_t = 8)]
        sa_sample: u32,
    },
    /// Map peptides (one per line) to the indexed proteins
    Map {
        /// Path to the protein index (.pidx)
        #[arg(short = 'i', long = "index")]
        index: String,
        /// Peptide list
        peptides: String,
        /// Output TSV path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        /// Parameter file (JSON)
        #[arg(long)]
        params: Option<String>,
        /// Worker threads (0 = all cores)
        #[arg(short = 't', long = "threads", default_value_t = 0)]
        threads: usize,
    },
    /// Map sequence tags such as <215.08>TEST<231.11>
    Tag {
        /// Path to the protein index (.pidx)
        #[arg(short = 'i', long = "index")]
        index: String,
        /// Tag list
        tags: String,
        /// Output TSV path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        /// Parameter file (JSON)
        #[arg(long)]
        params: Option<String>,
        /// Worker threads (0 = all cores)
        #[arg(short = 't', long = "threads", default_value_t = 0)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::default()
        .filter_level(level)
        .parse_env(env_logger::Env::default().filter_or("PEPMAP_LOG", level.as_str()))
        .init();

    match cli.command {
        Commands::Index { fasta, output, params, no_decoys, decoy_tag, sa_sample } => {
            run_index(&fasta, &output, params.as_deref(), no_decoys, decoy_tag, sa_sample)
        }
        Commands::Map { index, peptides, out, params, threads } => {
            init_threads(threads)?;
            run_map(&index, &peptides, out.as_deref(), params.as_deref())
        }
        Commands::Tag { index, tags, out, params, threads } => {
            init_threads(threads)?;
            run_tag(&index, &tags, out.as_deref(), params.as_deref())
        }
    }
}

fn init_threads(threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("failed to build thread pool")
}

fn load_params(path: Option<&str>) -> Result<MappingParams> {
    match path {
        Some(p) => MappingParams::from_json_file(p),
        None => Ok(MappingParams::default()),
    }
}

fn open_input(path: &str) -> Result<BufReader<std::fs::File>> {
    let fh = std::fs::File::open(path).with_context(|| format!("cannot open '{}'", path))?;
    Ok(BufReader::new(fh))
}

fn open_output(path: Option<&str>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => {
            let fh = std::fs::File::create(p).with_context(|| format!("cannot create output '{}'", p))?;
            Box::new(BufWriter::new(fh))
        }
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

fn run_index(
    fasta_path: &str,
    output: &str,
    params: Option<&str>,
    no_decoys: bool,
    decoy_tag: Option<String>,
    sa_sample: u32,
) -> Result<()> {
    if sa_sample == 0 {
        bail!("--sa-sample must be at least 1");
    }
    let mut decoys = load_params(params)?.decoys;
    if no_decoys {
        decoys.enabled = false;
    }
    if let Some(tag) = decoy_tag {
        decoys.suffix = tag;
    }

    let proteins = fasta::read_proteins(open_input(fasta_path)?)
        .with_context(|| format!("cannot read protein FASTA '{}'", fasta_path))?;
    if proteins.is_empty() {
        bail!("FASTA file '{}' contains no protein sequences", fasta_path);
    }
    let n_targets = proteins.len();
    let corpus = SequenceCorpus::new(proteins, &decoys)?;
    log::info!("proteins: {} targets, {} total, {} residues", n_targets, corpus.len(), corpus.text_len());

    let opts = IndexOptions { sa_step: sa_sample, ..IndexOptions::default() };
    let mut index = ProteinIndex::build(corpus, opts);
    index.set_meta(IndexMeta {
        source_file: Some(fasta_path.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    let out_path = format!("{}.pidx", output);
    index.save_to_file(&out_path)?;
    log::info!("protein index saved: {}", out_path);
    Ok(())
}

fn load_index(path: &str) -> Result<ProteinIndex> {
    let index = ProteinIndex::load_from_file(path)?;
    log::info!(
        "loaded index '{}' ({} proteins, built {})",
        path,
        index.corpus().len(),
        index.meta().build_timestamp.as_deref().unwrap_or("unknown")
    );
    Ok(index)
}

fn run_map(index_path: &str, peptides_path: &str, out_path: Option<&str>, params: Option<&str>) -> Result<()> {
    let params = load_params(params)?;
    let index = load_index(index_path)?;
    let peptides = query::read_peptides(open_input(peptides_path)?)?;
    log::info!("mapping {} peptides", peptides.len());

    let results = index.map_peptides(&peptides, &params.sequence_matching, &params.variants);

    let mut writer = query::TsvWriter::new(open_output(out_path)?)?;
    let mut unmapped = 0usize;
    for (peptide, mappings) in peptides.iter().zip(&results) {
        if mappings.is_empty() {
            unmapped += 1;
        }
        writer.write_mappings(peptide, mappings)?;
    }
    log::info!("{} mappings written, {} peptides unmapped", writer.rows(), unmapped);
    writer.finish()?;
    Ok(())
}

fn run_tag(index_path: &str, tags_path: &str, out_path: Option<&str>, params: Option<&str>) -> Result<()> {
    let params = load_params(params)?;
    let mut registry = ModificationRegistry::default();
    for m in params.custom_modifications.iter().cloned() {
        registry.add(m)?;
    }
    let index = load_index(index_path)?;
    let (queries, tags): (Vec<String>, Vec<_>) = query::read_tags(open_input(tags_path)?)?.into_iter().unzip();
    log::info!("mapping {} tags", tags.len());

    let mapper = TagMapper::new(&index, &params.search, &registry)?;
    let results = mapper.map_tags(&tags, &params.sequence_matching, &params.variants);

    let mut writer = query::TsvWriter::new(open_output(out_path)?)?;
    for (q, mappings) in queries.iter().zip(&results) {
        writer.write_mappings(q, mappings)?;
    }
    log::info!("{} mappings written for {} tags", writer.rows(), tags.len());
    writer.finish()?;
    Ok(())
}
