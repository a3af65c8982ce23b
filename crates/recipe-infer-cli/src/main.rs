use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recipe_infer_core::ExtractionResult;
use recipe_infer_local::{html, load_extractor, lookup, normalize, DataDir};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recipe-infer")]
#[command(about = "Extract materials and procedures from recipe HTML", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the material list and procedure steps from an HTML file (json).
    Extract(ExtractCmd),
    /// Extract, then look up one material by (fuzzy) name (json).
    Material(MaterialCmd),
    /// Print the normalized form of a string (json).
    Normalize(NormalizeCmd),
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct DataArgs {
    /// Directory holding material-vector.json, material-stat.json,
    /// word2vec.model.txt and procedure-model.json.
    #[arg(long, env = "RECIPE_INFER_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    /// HTML file to read.
    #[arg(long)]
    html: PathBuf,
    #[command(flatten)]
    data: DataArgs,
}

#[derive(clap::Args, Debug)]
struct MaterialCmd {
    #[arg(long)]
    html: PathBuf,
    /// Material name to look up.
    #[arg(long)]
    name: String,
    #[command(flatten)]
    data: DataArgs,
}

#[derive(clap::Args, Debug)]
struct NormalizeCmd {
    text: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn extract_file(html_path: &Path, data: DataArgs) -> Result<ExtractionResult> {
    let data = DataDir::resolve(data.data_dir)?;
    let extractor = load_extractor(&data)
        .with_context(|| format!("load data from {}", data.root().display()))?;
    let html = std::fs::read_to_string(html_path)
        .with_context(|| format!("read {}", html_path.display()))?;
    let doc = html::parse_document(&html);
    Ok(extractor.extract(&doc).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "recipe-infer");

    match cli.command {
        Commands::Extract(args) => {
            let result = extract_file(&args.html, args.data).await?;
            let v = serde_json::json!({
                "schema_version": 1,
                "materials": result.materials,
                "procedures": result.procedures,
            });
            println!("{}", v);
        }
        Commands::Material(args) => {
            let result = extract_file(&args.html, args.data).await?;
            let hit = lookup::find_material(&result.materials, &args.name)
                .map(|(name, quantity)| serde_json::json!({ "name": name, "quantity": quantity }));
            let v = serde_json::json!({
                "schema_version": 1,
                "query": args.name,
                "match": hit,
            });
            println!("{}", v);
        }
        Commands::Normalize(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "input": args.text,
                "normalized": normalize::normalize(&args.text),
            });
            println!("{}", v);
        }
        Commands::Version => {
            let v = serde_json::json!({
                "schema_version": 1,
                "name": "recipe-infer",
                "version": env!("CARGO_PKG_VERSION"),
            });
            println!("{}", v);
        }
    }
    Ok(())
}
