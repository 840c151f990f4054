//! sdflow CLI - render and inspect node-graph distance fields

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sdflow_engine::{
    Engine, PixelFormat, PreviewError, ProgressSink, RenderRequest, RenderSettings, prepare,
    scenes,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sdflow")]
#[command(about = "Node-graph signed distance fields, compiled and sphere traced", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a demo scene to a PNG file
    Render {
        /// Demo scene name (see `sdflow scenes`)
        scene: String,

        /// Output image file (.png)
        #[arg(short, long, default_value = "render.png")]
        output: PathBuf,

        /// Image width
        #[arg(long, default_value = "640")]
        width: u32,

        /// Image height
        #[arg(long, default_value = "480")]
        height: u32,

        /// Worker threads (0 = all cores)
        #[arg(short, long, default_value = "0")]
        workers: usize,

        /// Byte order of the rendered buffer
        #[arg(long, value_enum, default_value_t = Format::Rgba8)]
        format: Format,

        /// Render settings as JSON; missing fields keep their defaults
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Print the effective settings as JSON and exit
        #[arg(long)]
        dump_settings: bool,
    },

    /// Validate a demo scene and print its compiled program
    Check {
        /// Demo scene name
        scene: String,
    },

    /// List the built-in demo scenes
    Scenes,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Rgba8,
    Bgra8,
}

impl From<Format> for PixelFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Rgba8 => Self::Rgba8,
            Format::Bgra8 => Self::Bgra8,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            scene,
            output,
            width,
            height,
            workers,
            format,
            settings,
            dump_settings,
        } => {
            let settings = load_settings(settings.as_deref())?;
            if dump_settings {
                println!("{}", serde_json::to_string_pretty(&settings)?);
                return Ok(());
            }
            let request = RenderRequest {
                width,
                height,
                workers,
                format: format.into(),
                settings,
                ..RenderRequest::default()
            };
            run_render(&scene, &output, request)?;
        }
        Commands::Check { scene } => {
            run_check(&scene)?;
        }
        Commands::Scenes => {
            for demo in scenes::DEMOS {
                println!("{:<12} {}", demo.name, demo.description);
            }
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<RenderSettings> {
    let Some(path) = path else {
        return Ok(RenderSettings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid settings in {}", path.display()))
}

fn run_render(name: &str, output: &Path, request: RenderRequest) -> Result<()> {
    let mut engine = Engine::new();
    let scene = engine.load_demo(name)?;
    let sdf = prepare(&scene.graph, scene.output)?;
    let request = RenderRequest {
        camera: scene.camera.clone(),
        ..request
    };

    println!(
        "Rendering '{}' to {} ({}x{}, {} workers)...",
        name,
        output.display(),
        request.width,
        request.height,
        request.worker_count()
    );

    // Log once per quarter of the image
    let logged = AtomicUsize::new(0);
    let sink = ProgressSink::new(move |p| {
        let quarter = (p.fraction() * 4.0) as usize;
        if logged.fetch_max(quarter, Ordering::Relaxed) < quarter {
            info!(done = p.done, total = p.total, "{}%", quarter * 25);
        }
    });

    let start = Instant::now();
    let image = engine.render_with(&sdf, &request, Some(&sink))?;
    image.save_png(output)?;
    println!(
        "Saved to: {} in {:.2}s",
        output.display(),
        start.elapsed().as_secs_f32()
    );

    Ok(())
}

fn run_check(name: &str) -> Result<()> {
    let scene = scenes::build(name)?;
    println!(
        "Scene '{}': {} nodes, output {}",
        scene.name,
        scene.graph.len(),
        scene.output
    );

    match prepare(&scene.graph, scene.output) {
        Ok(sdf) => {
            let program = sdf.program();
            println!(
                "OK - {} instructions, {:?} -> {}",
                program.len(),
                program.params(),
                program.result_type()
            );
            println!("{program}");
            Ok(())
        }
        Err(e) => {
            report(&scene.graph, &e);
            Err(e.into())
        }
    }
}

fn report(graph: &sdflow_engine::Graph, error: &PreviewError) {
    eprintln!("ERROR: {error}");
    for id in error.offending_nodes() {
        let kind = graph.node(id).map_or("missing", |n| n.kind());
        eprintln!("  {id} ({kind})");
    }
}
