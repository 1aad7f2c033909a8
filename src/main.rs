use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use report_weaver::config::{load_config, Config};
use report_weaver::pipeline;
use report_weaver::{batch, splitter};

const DEFAULT_CONFIG_PATH: &str = "./config/weave.toml";

/// Build structured report skeletons from long documents.
#[derive(Parser)]
#[command(name = "weave", version, about)]
struct Cli {
    /// Path to the TOML configuration file [default: ./config/weave.toml].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// An explicitly named config file must exist and load; only the
/// implicit default path may be absent, falling back to defaults.
fn resolve_config(flag: Option<&Path>) -> anyhow::Result<Config> {
    match flag {
        Some(path) => load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: index, outline, and resolve section content.
    Run {
        /// Document to process (txt, md, docx, pdf).
        file: PathBuf,
    },
    /// Build an outline only, without embedding or retrieval.
    Outline {
        /// Document to process (txt, md, docx, pdf).
        file: PathBuf,
        /// Override the model's suggested document title.
        #[arg(long)]
        title: Option<String>,
        /// Abort on any failed analysis batch instead of skipping it.
        #[arg(long)]
        fail_fast: bool,
    },
    /// Split a document and print chunk statistics without any network calls.
    Chunks {
        /// Document to split (txt, md, docx, pdf).
        file: PathBuf,
        /// Override the configured chunk size.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Override the configured overlap.
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Probe the embedding API, Qdrant, and the LLM endpoint.
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run { file } => pipeline::run(&config, &file).await.map(|_| ()),
        Commands::Outline {
            file,
            title,
            fail_fast,
        } => pipeline::outline(&config, &file, title.as_deref(), fail_fast)
            .await
            .map(|_| ()),
        Commands::Chunks {
            file,
            chunk_size,
            overlap,
        } => print_chunk_stats(&config, &file, chunk_size, overlap),
        Commands::Health => {
            pipeline::health(&config).await;
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_chunk_stats(
    config: &Config,
    file: &PathBuf,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> anyhow::Result<()> {
    let chunk_size = chunk_size.unwrap_or(config.chunking.chunk_size);
    let overlap = overlap.unwrap_or(config.chunking.overlap);

    let text = report_weaver::loader::load(file)?;
    let chunks = splitter::split(&text, chunk_size, overlap)?;
    let batches = batch::assemble(&chunks, config.chunking.max_batch_size);

    let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
    let longest = chunks.iter().map(|c| c.chars().count()).max().unwrap_or(0);

    println!("File:       {}", file.display());
    println!("Characters: {}", text.chars().count());
    println!("Chunks:     {} (size {}, overlap {})", chunks.len(), chunk_size, overlap);
    println!("Longest:    {} chars", longest);
    println!("Average:    {} chars", total / chunks.len().max(1));
    println!("Batches:    {} (max {})", batches.len(), config.chunking.max_batch_size);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_missing_config_path_errors() {
        let err = resolve_config(Some(Path::new("/no/such/weave.toml"))).unwrap_err();
        assert!(err.to_string().contains("/no/such/weave.toml"));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"[chunking]\nchunk_size = 1234\n").unwrap();
        let config = resolve_config(Some(f.path())).unwrap();
        assert_eq!(config.chunking.chunk_size, 1234);
    }

    #[test]
    fn explicit_invalid_config_errors() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"[chunking]\nchunk_size = 100\noverlap = 100\n")
            .unwrap();
        assert!(resolve_config(Some(f.path())).is_err());
    }
}
