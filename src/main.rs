use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Deserialize;

use docweave_pdf::{Config, DocBlock, FontPaths};

#[derive(Parser)]
#[command(name = "docweave-pdf")]
#[command(version)]
#[command(about = "Lay out document blocks as a paginated PDF with a table of contents", long_about = None)]
struct Cli {
    /// JSON array of document blocks
    #[arg(value_name = "BLOCKS")]
    blocks: PathBuf,

    /// YAML configuration, including a `fonts:` section
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output PDF path (defaults to the blocks file with a .pdf extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    #[serde(flatten)]
    config: Config,
    fonts: FontPaths,
}

fn run(cli: Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let blocks: Vec<DocBlock> = serde_json::from_str(&std::fs::read_to_string(&cli.blocks)?)?;
    let file = match &cli.config {
        Some(path) => serde_yaml::from_str(&std::fs::read_to_string(path)?)?,
        None => ConfigFile::default(),
    };
    let output = cli
        .output
        .unwrap_or_else(|| cli.blocks.with_extension("pdf"));
    docweave_pdf::generate_to_file(&blocks, &file.config, &file.fonts, &output)?;
    Ok(output)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(output) => {
            println!("{}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
