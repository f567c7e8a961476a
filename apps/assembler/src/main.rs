use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use assembly_core::{AssemblySession, DirectorySaveTrigger, InMemoryResourceHost, OutputEmitter};
use clap::{Parser, Subcommand};
use pdf_backend::LopdfMergeCollaborator;
use ports::PreviewRenderer;
use shared::{
    domain::SaveOutcome,
    protocol::{AssemblyCommand, AssemblyEvent},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, normalize_output_name, Settings};

#[derive(Parser, Debug)]
#[command(name = "assembler", about = "Combine PDF documents in a chosen order")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge FILES in argument order, after applying an optional command script.
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// JSON array of assembly commands, e.g. drag_start / hover_enter / drop.
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        output_name: Option<String>,
        #[arg(long)]
        overwrite: bool,
    },
    /// Print identity, size and page count of each file.
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Render a first-page PNG thumbnail for each file.
    Preview {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long)]
        width: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Command::Merge {
        output_dir,
        output_name,
        overwrite,
        ..
    } = &cli.command
    {
        if let Some(dir) = output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(name) = output_name {
            settings.output_name = normalize_output_name(name);
        }
        settings.overwrite |= *overwrite;
    }

    let filter =
        EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Merge { files, script, .. } => merge(&settings, &files, script).await,
        Command::Inspect { files } => inspect(&files).await,
        Command::Preview {
            files,
            out_dir,
            width,
        } => preview(&files, out_dir, width.unwrap_or(settings.preview_width)).await,
    }
}

async fn open_session(files: &[PathBuf]) -> Result<AssemblySession> {
    let mut session = AssemblySession::new();
    spawn_event_logger(session.subscribe_events());

    let report = session.ingest_paths(files).await;
    for err in &report.rejected {
        eprintln!("skipped {}: {err}", err.name());
    }
    if session.collection().is_empty() {
        bail!("none of the {} input file(s) could be ingested", files.len());
    }
    Ok(session)
}

fn spawn_event_logger(mut events: broadcast::Receiver<AssemblyEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(?event, "assembler: event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "assembler: event logger lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn merge(settings: &Settings, files: &[PathBuf], script: Option<PathBuf>) -> Result<()> {
    let mut session = open_session(files).await?;

    if let Some(path) = script {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read script '{}'", path.display()))?;
        let commands: Vec<AssemblyCommand> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse script '{}'", path.display()))?;
        for command in commands {
            if !session.apply(command.clone()) {
                warn!(?command, "assembler: command had no effect");
            }
        }
    }

    for summary in session.documents() {
        info!(
            position = summary.position,
            document_id = %summary.document_id,
            name = %summary.name,
            "assembler: merge order"
        );
    }

    let trigger =
        DirectorySaveTrigger::new(&settings.output_dir).with_overwrite(settings.overwrite);
    let emitter = OutputEmitter::new(Arc::new(InMemoryResourceHost::new()), Arc::new(trigger))
        .with_file_name(&settings.output_name);

    let report = session
        .begin_merge()?
        .run_and_deliver(&LopdfMergeCollaborator::new(), &emitter)
        .await?;

    match report.outcome {
        SaveOutcome::Saved { location } => println!(
            "wrote {} pages from {} documents to {location}",
            report.summary.page_count,
            report.summary.documents.len()
        ),
        SaveOutcome::Cancelled => println!("save cancelled"),
    }
    Ok(())
}

async fn inspect(files: &[PathBuf]) -> Result<()> {
    let session = open_session(files).await?;

    for document in session.collection().iter() {
        let pages = match pdf_backend::page_count(document.payload()) {
            Ok(count) => count.to_string(),
            Err(err) => format!("unreadable ({err:#})"),
        };
        println!(
            "{}\t{}\t{} bytes\t{} pages",
            document.id(),
            document.name(),
            document.size_bytes(),
            pages
        );
    }
    Ok(())
}

async fn preview(files: &[PathBuf], out_dir: PathBuf, width: u32) -> Result<()> {
    let session = open_session(files).await?;
    tokio::fs::create_dir_all(&out_dir)
        .await
        .with_context(|| format!("failed to create '{}'", out_dir.display()))?;

    let renderer = preview_renderer();
    let mut failed = 0usize;
    for preview in session.render_previews(renderer.as_ref(), width).await {
        let Some(document) = session.collection().get(preview.document_id) else {
            continue;
        };
        match preview.result {
            Ok(image) => {
                let path = out_dir.join(format!("{}.png", file_stem(document.name())));
                tokio::fs::write(&path, &image.png)
                    .await
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                println!(
                    "{} -> {} ({}x{})",
                    document.name(),
                    path.display(),
                    image.width,
                    image.height
                );
            }
            Err(err) => {
                failed += 1;
                eprintln!("{}: {err}", document.name());
            }
        }
    }

    if failed == session.collection().len() {
        bail!("no previews could be rendered");
    }
    Ok(())
}

#[cfg(feature = "pdfium")]
fn preview_renderer() -> Box<dyn PreviewRenderer> {
    Box::new(pdf_backend::PdfiumPreviewRenderer::system())
}

#[cfg(not(feature = "pdfium"))]
fn preview_renderer() -> Box<dyn PreviewRenderer> {
    Box::new(ports::MissingPreviewRenderer)
}

fn file_stem(name: &str) -> &str {
    std::path::Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
}
