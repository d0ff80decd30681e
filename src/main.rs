//! # imgcompress - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (su stderr, stdout resta per il JSON)
//! - Costruzione della `CompressionRequest` (file di config + override da CLI)
//! - Avvio del `BatchCompressor`
//!
//! ## Esempio di utilizzo:
//! ```bash
//! imgcompress photos/ --output photos-small --quality 75 --profile balanced
//! imgcompress banner.png --lossless --same-dir
//! imgcompress --tools
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imgcompress::{
    config::{CompressionRequest, OutputMode, QualityProfile},
    file_manager::FileManager,
    json_output::JsonMessage,
    optimizer::{BatchCompressor, Compressor},
    tool_resolver::ToolResolver,
};

#[derive(Parser)]
#[command(name = "imgcompress")]
#[command(about = "Compress JPEG, PNG, GIF and WebP images, never producing a larger file")]
struct Args {
    /// Image files or directories to compress
    #[arg(required_unless_present = "tools")]
    inputs: Vec<PathBuf>,

    /// Output root for mirror mode
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Root whose structure is mirrored under the output root
    #[arg(long)]
    input_root: Option<PathBuf>,

    /// Preserve pixel data exactly
    #[arg(long)]
    lossless: bool,

    /// Quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Quality profile
    #[arg(short, long, value_enum)]
    profile: Option<QualityProfile>,

    /// Write next to each source instead of mirroring
    #[arg(long)]
    same_dir: bool,

    /// Comma-separated extensions picked up from directories
    #[arg(long, value_delimiter = ',')]
    formats: Option<Vec<String>>,

    /// Number of parallel workers
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// JSON configuration file (CLI flags take precedence)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit one JSON event per line on stdout
    #[arg(long)]
    json: bool,

    /// Print tool discovery and engine selection, then exit
    #[arg(long)]
    tools: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    async fn build_request(&self) -> Result<CompressionRequest> {
        let mut request = match &self.config {
            Some(path) => CompressionRequest::from_file(path).await?,
            None => CompressionRequest::default(),
        };

        if self.lossless {
            request.lossless = true;
        }
        if let Some(quality) = self.quality {
            request.quality = quality;
        }
        if let Some(profile) = self.profile {
            request.profile = profile;
        }
        if self.same_dir {
            request.output_mode = OutputMode::SameDir;
        }
        if let Some(ref output) = self.output {
            request.output_root = output.clone();
        }
        if let Some(ref formats) = self.formats {
            request = request.with_formats(formats);
        }

        // A single directory argument is the natural mirror root
        match (&self.input_root, self.inputs.as_slice()) {
            (Some(root), _) => request.input_root = root.clone(),
            (None, [only]) if only.is_dir() => request.input_root = only.clone(),
            _ => {}
        }

        request.validate()?;
        Ok(request)
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_tools_report(compressor: &Compressor) {
    println!("{}", ToolResolver::detect().tools_report());
    for lossless in [false, true] {
        let status = compressor.engine_status(lossless);
        println!(
            "Engines ({}): jpeg={} png={} gif={} webp={}",
            if lossless { "lossless" } else { "lossy" },
            status.jpeg,
            status.png,
            status.gif,
            status.webp
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let compressor = Compressor::detect();
    if args.tools {
        print_tools_report(&compressor);
        return Ok(());
    }

    let request = args.build_request().await?;
    let files = match FileManager::collect_inputs(&args.inputs, &request) {
        Ok(files) => files,
        Err(e) => {
            if args.json {
                JsonMessage::error("Invalid input".to_string(), Some(e.to_string())).emit();
            }
            return Err(e);
        }
    };

    if files.is_empty() {
        info!("No images found to compress");
    }

    let batch = BatchCompressor::new(compressor, request, args.workers)?.with_json_output(args.json);
    let report = batch.run(files).await?;

    if !args.json {
        for result in report.results.iter().filter(|r| !r.succeeded) {
            info!("[FAILED] {}: {}", result.source.display(), result.message);
        }
    }

    Ok(())
}
