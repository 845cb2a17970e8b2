use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use common::Category;
use store::assemble::{self, InferenceRequest};
use store::config::StoreConfig;
use store::{MsaPayload, MsaStore, RecordAttrs, SqlCatalog};
use tracing::info;

/// Shared MSA metadata+blob store for structure-prediction pipelines.
#[derive(Parser)]
#[command(name = "msa-store", version, about)]
struct Cli {
    /// Catalog connection URL (overrides configuration).
    #[arg(long, global = true, env = "MSA_STORE_DATABASE")]
    database: Option<String>,

    /// Blob tree root (overrides configuration).
    #[arg(long, global = true, env = "MSA_STORE_BLOB_ROOT")]
    blob_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a pre-computed MSA document.
    Store(StoreArgs),
    /// Print a `name,sequence,category` tuple when no record exists.
    Check(CheckArgs),
    /// Write a stored alignment document to stdout or a file.
    Fetch(FetchArgs),
    /// Assemble an inference request document from stored alignments.
    Compose(ComposeArgs),
}

#[derive(Args)]
struct StoreArgs {
    #[arg(short = 't', long)]
    category: Category,
    #[arg(short, long)]
    sequence: String,
    /// Species of origin; required for mhc.
    #[arg(long)]
    species: Option<String>,
    #[arg(short, long)]
    name: Option<String>,
    #[arg(short, long)]
    chain: Option<String>,
    #[arg(long)]
    protein_class: Option<String>,
    /// Path to the upstream tool's MSA JSON output.
    #[arg(short = 'j', long)]
    msa_json: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(short = 't', long)]
    category: Category,
    #[arg(short, long)]
    sequence: String,
    #[arg(long)]
    species: Option<String>,
    /// Name echoed in the missing-record tuple.
    #[arg(short, long)]
    name: Option<String>,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(short = 't', long)]
    category: Category,
    #[arg(short, long)]
    sequence: String,
    #[arg(long)]
    species: Option<String>,
    /// Output path; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ComposeArgs {
    #[arg(short = 'j', long)]
    job_name: String,
    /// Peptide chain sequence (chain A).
    #[arg(short, long)]
    peptide: Option<String>,
    /// Use the stored peptide MSA instead of the trivial placeholder.
    #[arg(long)]
    peptide_msa: bool,
    /// MHC chain sequence, repeatable up to twice (chains B, C).
    #[arg(long = "mhc-seq")]
    mhc_seqs: Vec<String>,
    /// TCR chain sequence, repeatable up to twice (chains D, E).
    #[arg(long = "tcr-seq")]
    tcr_seqs: Vec<String>,
    /// Comma-separated model seeds.
    #[arg(long, default_value = "42")]
    seeds: String,
    /// Output path; defaults to `<job_name>.json`.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::load().context("Failed to load configuration")?;
    if let Some(database) = cli.database {
        config.database_url = database;
    }
    if let Some(blob_root) = cli.blob_root {
        config.blob_root = blob_root;
    }

    let db = store::database::init_db(&config.database_url)
        .await
        .with_context(|| format!("Failed to open catalog at {}", config.database_url))?;
    let msa_store = MsaStore::new(
        Arc::new(SqlCatalog::new(db)),
        config.blob_root.clone(),
        config.retry,
    );

    match cli.command {
        Command::Store(args) => run_store(&msa_store, args).await,
        Command::Check(args) => run_check(&msa_store, args).await,
        Command::Fetch(args) => run_fetch(&msa_store, args).await,
        Command::Compose(args) => run_compose(&msa_store, args).await,
    }
}

async fn run_store(msa_store: &MsaStore, args: StoreArgs) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(&args.msa_json)
        .await
        .with_context(|| format!("Failed to read MSA JSON {}", args.msa_json.display()))?;

    let payload = MsaPayload::from_document(&raw, &args.sequence)?;

    let attrs = RecordAttrs {
        species: args.species,
        name: args.name,
        chain: args.chain,
        protein_class: args.protein_class,
    };

    let row_id = msa_store
        .store(args.category, &args.sequence, attrs, &payload)
        .await?;

    info!(
        category = %args.category,
        row_id,
        is_empty = payload.is_empty,
        "alignment stored"
    );
    Ok(())
}

async fn run_check(msa_store: &MsaStore, args: CheckArgs) -> anyhow::Result<()> {
    let present = msa_store
        .exists(args.category, &args.sequence, args.species.as_deref())
        .await?;

    // Pipeline-compatible tuple on stdout when the record is missing;
    // silence means it is already stored.
    if !present {
        println!(
            "{},{},{}",
            args.name.unwrap_or_default(),
            args.sequence,
            args.category
        );
    }
    Ok(())
}

async fn run_fetch(msa_store: &MsaStore, args: FetchArgs) -> anyhow::Result<()> {
    let document = msa_store
        .fetch(args.category, &args.sequence, args.species.as_deref())
        .await?
        .with_context(|| {
            format!(
                "No stored alignment for {} sequence {}",
                args.category, args.sequence
            )
        })?;

    write_document(&document, args.output.as_deref()).await
}

async fn run_compose(msa_store: &MsaStore, args: ComposeArgs) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.mhc_seqs.len() <= 2 && args.tcr_seqs.len() <= 2,
        "at most two MHC and two TCR chains fit one request"
    );

    let model_seeds = args
        .seeds
        .split(',')
        .map(|seed| seed.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid seed list '{}'", args.seeds))?;

    let request = InferenceRequest {
        job_name: args.job_name.clone(),
        model_seeds,
        peptide: args.peptide,
        use_peptide_msa: args.peptide_msa,
        mhc_chains: args.mhc_seqs,
        tcr_chains: args.tcr_seqs,
    };

    let document = assemble::assemble(msa_store, &request).await?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", args.job_name)));
    write_document(&document, Some(&output)).await?;
    info!(job = %args.job_name, output = %output.display(), "inference request assembled");
    Ok(())
}

async fn write_document(
    document: &serde_json::Value,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let pretty = serde_json::to_string_pretty(document)?;
    match output {
        Some(path) => tokio::fs::write(path, pretty.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{pretty}"),
    }
    Ok(())
}
