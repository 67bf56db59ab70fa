//! image3d CLI - Image-to-3D generation and mesh inspection
//!
//! Command-line front end for the generation pipeline: submit an image to the
//! generation service, preview the normalized result headlessly and save the
//! mesh, or inspect a local OBJ file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use image3d::{
    DirectoryTarget, GenerationPipeline, HeadlessSurface, Image3dConfig, ImageAsset,
    PipelineState,
};
use indicatif::{ProgressBar, ProgressStyle};
use mesh::{normalize, Aabb, MeshLoader, ObjLoader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "image3d")]
#[command(author, version, about = "Generate 3D meshes from images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a mesh from an image and save it
    Generate {
        /// Image file to submit
        image: PathBuf,

        /// Directory the generated mesh is saved to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Generation service URL (overrides the config file)
        #[arg(long)]
        server: Option<String>,

        /// Request timeout in seconds (overrides the config file)
        #[arg(long)]
        timeout: Option<u64>,

        /// Retries for network and 5xx failures (overrides the config file)
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Load and normalize a local OBJ file, printing its bounds
    Inspect {
        /// OBJ file to inspect
        obj: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            image,
            out,
            config,
            server,
            timeout,
            retries,
        } => {
            let mut config = match config {
                Some(path) => Image3dConfig::load(&path)?,
                None => Image3dConfig::default(),
            };
            if let Some(server) = server {
                config.server_url = server;
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout.max(1);
            }
            if let Some(retries) = retries {
                config.max_retries = retries;
            }
            generate(config, image, out).await
        }
        Commands::Inspect { obj, json } => inspect(obj, json).await,
    }
}

async fn generate(config: Image3dConfig, image: PathBuf, out: PathBuf) -> anyhow::Result<()> {
    let asset = ImageAsset::from_path(&image)
        .with_context(|| format!("failed to read {}", image.display()))?;

    let surface = Arc::new(HeadlessSurface::new());
    let pipeline = GenerationPipeline::new(
        Arc::new(config.client()),
        Arc::new(ObjLoader::new()),
        surface.clone(),
    )
    .with_download_file_name(config.download_file_name.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Submitting {} to {}", asset.file_name(), config.server_url));

    let mut states = pipeline.subscribe();
    let progress = spinner.clone();
    let follow = async move {
        while states.changed().await.is_ok() {
            let message = match &*states.borrow_and_update() {
                PipelineState::Uploading => "Uploading image...".to_string(),
                PipelineState::AwaitingGeneration => "Waiting for generation...".to_string(),
                other => other.to_string(),
            };
            progress.set_message(message);
        }
    };

    tokio::select! {
        _ = pipeline.submit_image(asset) => {}
        _ = follow => {}
    }

    match pipeline.state() {
        PipelineState::Ready(mesh) => {
            spinner.finish_with_message(format!("Generated {} bytes", mesh.len()));
            if let Some(model) = surface.model() {
                println!("Meshes:     {}", model.mesh_count());
                println!("Vertices:   {}", model.vertex_count());
                println!("Triangles:  {}", model.triangle_count());
                println!("Source:     {}", model.source_bounds());
                println!("Normalized: {}", model.bounds());
                println!("Scene:      {}", surface.setup());
            }
            let path = pipeline.download(&DirectoryTarget::new(out))?;
            println!("Saved to {}", path.display());
            pipeline.end_session();
            Ok(())
        }
        PipelineState::Failed(reason) => {
            spinner.abandon_with_message("Generation failed");
            pipeline.end_session();
            anyhow::bail!("{reason}")
        }
        other => anyhow::bail!("generation ended in unexpected state {other}"),
    }
}

async fn inspect(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let bytes: Arc<[u8]> = std::fs::read(&path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .into();
    let model = ObjLoader::new()
        .load(bytes)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    let normalized = normalize(model);

    if json {
        let summary = serde_json::json!({
            "file": path.display().to_string(),
            "meshes": normalized.mesh_count(),
            "vertices": normalized.vertex_count(),
            "triangles": normalized.triangle_count(),
            "source": bounds_json(&normalized.source_bounds()),
            "normalized": bounds_json(&normalized.bounds()),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("File:       {}", path.display());
        println!("Meshes:     {}", normalized.mesh_count());
        println!("Vertices:   {}", normalized.vertex_count());
        println!("Triangles:  {}", normalized.triangle_count());
        println!("Source:     {}", normalized.source_bounds());
        println!("Normalized: {}", normalized.bounds());
    }
    Ok(())
}

fn bounds_json(bounds: &Aabb) -> serde_json::Value {
    serde_json::json!({
        "center": bounds.center().to_array(),
        "size": bounds.size().to_array(),
    })
}
