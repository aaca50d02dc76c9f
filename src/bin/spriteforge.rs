use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use spriteforge::{AtlasMetadata, PipelineOptions, PipelineService, RunStatus};

#[derive(Parser, Debug)]
#[command(name = "spriteforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an avatar sprite package from a character photo.
    Generate(GenerateArgs),
    /// Pretty-print a generated atlas metadata document.
    Metadata(MetadataArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Input photo (PNG, JPEG or WebP).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Artifact root directory.
    #[arg(long)]
    out: PathBuf,

    /// Session identifier used for deduplication.
    #[arg(long, default_value = "cli")]
    session: String,

    /// Declared MIME type; guessed from the file extension when omitted.
    #[arg(long)]
    mime: Option<String>,

    /// Seconds to wait for the pipeline before giving up.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(Parser, Debug)]
struct MetadataArgs {
    /// Path to an atlas.json document.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
        Command::Metadata(args) => cmd_metadata(args),
    }
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read input '{}'", args.in_path.display()))?;
    let mime = args
        .mime
        .clone()
        .unwrap_or_else(|| mime_from_path(&args.in_path));

    let svc = PipelineService::new(PipelineOptions::new(&args.out));
    let receipt = svc.enqueue(&args.session, &bytes, &mime)?;
    if receipt.reused {
        eprintln!("reusing avatar {} for identical content", receipt.avatar.id);
    }
    let avatar = svc.wait_terminal(&receipt.avatar.id, Duration::from_secs(args.timeout_secs))?;
    match avatar.status {
        RunStatus::Completed => {
            let payload = svc.package_payload(&avatar.id)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            let atlas = svc.resolve_asset_path(&avatar.id, "atlas")?;
            eprintln!("wrote {}", atlas.display());
            Ok(())
        }
        _ => anyhow::bail!(
            "generation failed with {}: {}",
            avatar.error_code.as_deref().unwrap_or("UNKNOWN"),
            avatar.error_detail.as_deref().unwrap_or("no detail")
        ),
    }
}

fn cmd_metadata(args: MetadataArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read metadata '{}'", args.in_path.display()))?;
    let doc: AtlasMetadata =
        serde_json::from_slice(&bytes).context("parse atlas metadata document")?;
    eprintln!(
        "atlas {}x{} ({} frames per walk row), pipeline {} template {}",
        doc.atlas.w,
        doc.atlas.h,
        doc.clips.walk.south.len(),
        doc.pipeline_version,
        doc.template_version
    );
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn mime_from_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "webp" => "image/webp".to_string(),
        _ => "image/png".to_string(),
    }
}
