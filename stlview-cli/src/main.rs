/// stlview - inspect, convert and generate STL meshes
///
/// Usage:
///   stlview info model.stl
///   stlview convert model.stl model_ascii.stl --format ascii
///   stlview generate cone --triangles 1000000 --output cone.stl
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stlview_core::StlFormat;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::Shape;

/// STL mesh inspection and conversion
#[derive(Parser, Debug)]
#[command(name = "stlview")]
#[command(author, version, about = "Inspect, convert and generate STL meshes", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a mesh and print its summary, bounds and canonical viewpoints
    Info {
        /// STL file to inspect
        path: PathBuf,
    },

    /// Re-encode a mesh as ASCII or binary STL
    Convert {
        /// Source STL file (either format)
        input: PathBuf,

        /// Destination STL file
        output: PathBuf,

        /// Output encoding: ascii or binary
        #[arg(short, long, default_value = "binary")]
        format: StlFormat,
    },

    /// Write a procedurally generated mesh
    Generate {
        /// Shape to generate
        #[arg(value_enum)]
        shape: Shape,

        /// Destination STL file
        #[arg(short, long)]
        output: PathBuf,

        /// Output encoding: ascii or binary
        #[arg(short, long, default_value = "binary")]
        format: StlFormat,

        /// Approximate triangle count (cone)
        #[arg(long, default_value = "100000")]
        triangles: usize,

        /// Grid width (terrain)
        #[arg(long, default_value = "300")]
        width: usize,

        /// Grid height (terrain)
        #[arg(long, default_value = "300")]
        height: usize,

        /// Edge length (cube)
        #[arg(long, default_value = "2.0")]
        size: f32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("stlview v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Info { path } => commands::info(&path).await,
        Commands::Convert {
            input,
            output,
            format,
        } => commands::convert(&input, &output, format).await,
        Commands::Generate {
            shape,
            output,
            format,
            triangles,
            width,
            height,
            size,
        } => {
            let mesh = shape.build(triangles, width, height, size);
            commands::write(&mesh, &output, format).await
        }
    }
}
