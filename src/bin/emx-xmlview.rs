//! emx-xmlview CLI
//!
//! Show XML documents as text and extract their embedded attachments.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emx_xmlview::{summary_lines, Document, Exporter, Extraction, Extractor};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "emx-xmlview")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "XML document viewer and attachment extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the document as indented text followed by its attachments
    Show {
        /// XML file to read (default: stdin)
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Include SignatureValue and X509Certificate blocks
        #[arg(long)]
        keep_signatures: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List attachments
    #[command(name = "t")]
    List {
        /// XML file to read (default: stdin)
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Include SignatureValue and X509Certificate blocks
        #[arg(long)]
        keep_signatures: bool,

        /// Show detected format and decoded size
        #[arg(short, long)]
        verbose: bool,
    },

    /// Save attachments to a directory
    #[command(name = "x")]
    Extract {
        /// XML file to read (default: stdin)
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Directory to extract to (default: current directory)
        #[arg(short = 'C', long, default_value = ".")]
        directory: PathBuf,

        /// Replace existing files instead of adding a numeric suffix
        #[arg(long)]
        overwrite: bool,

        /// Include SignatureValue and X509Certificate blocks
        #[arg(long)]
        keep_signatures: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Find XML files under directories and list their attachments
    Scan {
        /// Directories or files to scan
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Include SignatureValue and X509Certificate blocks
        #[arg(long)]
        keep_signatures: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Show { input, keep_signatures, verbose } => {
            init_logging(verbose);
            show_document(input, keep_signatures)?;
        }
        Commands::List { input, keep_signatures, verbose } => {
            init_logging(verbose);
            list_attachments(input, keep_signatures, verbose)?;
        }
        Commands::Extract { input, directory, overwrite, keep_signatures, verbose } => {
            init_logging(verbose);
            extract_attachments(input, directory, overwrite, keep_signatures, verbose)?;
        }
        Commands::Scan { inputs, keep_signatures, verbose } => {
            init_logging(verbose);
            scan_directories(inputs, keep_signatures)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn load_document(input: Option<&Path>) -> Result<Document> {
    match input {
        Some(path) => Document::open(path),
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read stdin")?;
            Document::from_bytes(&buffer)
        }
    }
}

fn run_extraction(input: Option<&Path>, keep_signatures: bool) -> Result<Extraction> {
    let document = load_document(input)?;
    let extractor = Extractor::new().with_skip_signatures(!keep_signatures);
    Ok(extractor.extract(&document))
}

fn show_document(input: Option<PathBuf>, keep_signatures: bool) -> Result<()> {
    let extraction = run_extraction(input.as_deref(), keep_signatures)?;

    if let Some(path) = &input {
        println!("File: {}", path.display());
        println!();
    }
    println!("{}", extraction.text());

    if !extraction.attachments.is_empty() {
        println!();
        println!("Attachments:");
        for line in summary_lines(&extraction.attachments) {
            println!("  {}", line);
        }
    }

    Ok(())
}

fn list_attachments(input: Option<PathBuf>, keep_signatures: bool, verbose: bool) -> Result<()> {
    let extraction = run_extraction(input.as_deref(), keep_signatures)?;

    for attachment in &extraction.attachments {
        if verbose {
            match attachment.decode() {
                Ok(data) => {
                    let format = emx_xmlview::sniff(&data);
                    println!("{}  {}  {}", attachment.name, format, data.len());
                }
                Err(e) => println!("{}  undecodable  {}", attachment.name, e),
            }
        } else {
            println!("{}", attachment.name);
        }
    }

    Ok(())
}

fn extract_attachments(
    input: Option<PathBuf>,
    directory: PathBuf,
    overwrite: bool,
    keep_signatures: bool,
    verbose: bool,
) -> Result<()> {
    let extraction = run_extraction(input.as_deref(), keep_signatures)?;

    if verbose {
        println!("Attachments: {}", extraction.attachments.len());
    }

    let report = Exporter::new()
        .with_overwrite(overwrite)
        .save_all(&extraction.attachments, &directory)?;

    if verbose {
        for path in &report.saved {
            println!("Extracted: {}", path.display());
        }
    }
    for failure in &report.failed {
        eprintln!("Failed: {}: {}", failure.name, failure.reason);
    }

    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} attachments could not be saved",
            report.failed.len(),
            extraction.attachments.len()
        );
    }

    Ok(())
}

fn scan_directories(inputs: Vec<PathBuf>, keep_signatures: bool) -> Result<()> {
    let extractor = Extractor::new().with_skip_signatures(!keep_signatures);

    for input in &inputs {
        let files = walkdir::WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && is_xml_file(e.path()));

        for entry in files {
            let document = match Document::open(entry.path()) {
                Ok(document) => document,
                Err(e) => {
                    eprintln!("{}: {:#}", entry.path().display(), e);
                    continue;
                }
            };

            let extraction = extractor.extract(&document);
            println!("{} ({} attachments)", entry.path().display(), extraction.attachments.len());
            for line in summary_lines(&extraction.attachments) {
                println!("  {}", line);
            }
        }
    }

    Ok(())
}

fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}
