//! arca - command-line interface for the arca archive orchestrator
//!
//! This binary plays the role of the UI collaborator: it builds operation
//! requests, observes progress, presents terminal outcomes, performs
//! post-completion actions, and manages the defaults shared with the
//! context-menu integration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use arca_core::{
    build_tree, inspect, verify, ArchiveFormat, ArchiveItem, CompressionLevel, Error, LevelChoice,
    OperationObserver, OperationRequest, Orchestrator, Outcome, RemoteRequest, Settings,
    SharedDefaults,
};

/// arca - a multi-format compressor and extractor
#[derive(Parser)]
#[command(name = "arca")]
#[command(author, version, about = "A multi-format compressor and extractor", long_about = None)]
struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files and directories into an archive
    Compress {
        /// Input files and directories
        inputs: Vec<PathBuf>,

        /// Output archive path (derived from the inputs if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Archive format: zip, 7z, tar, xz (derived from the output
        /// extension if omitted)
        #[arg(short, long)]
        format: Option<String>,

        /// Compression level: none, fastest, fast, normal, maximum, ultra
        /// (low/high are accepted as aliases)
        #[arg(short, long)]
        level: Option<String>,

        /// Encrypt the archive with this password
        #[arg(short, long)]
        password: Option<String>,

        /// Remove the source files after the archive is written
        #[arg(long)]
        delete_source: bool,
    },

    /// Extract an archive
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory (the archive's directory if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extract into a new folder named after the archive
        #[arg(long)]
        new_folder: bool,

        /// Password for encrypted archives
        #[arg(short, long)]
        password: Option<String>,
    },

    /// List archive contents
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Show as a tree
        #[arg(long)]
        tree: bool,

        /// Password for archives with encrypted entry lists
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Check archive integrity without extracting
    Test {
        /// Archive file to check
        archive: PathBuf,

        /// Password for encrypted archives
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show or change the defaults shared with the context-menu helper
    Defaults {
        #[command(subcommand)]
        action: DefaultsAction,
    },

    /// Run an operation request sent by the context-menu helper
    Dispatch {
        /// The encoded request message
        message: String,

        /// Password to apply when the request asks for one
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum DefaultsAction {
    /// Print the current shared defaults
    Show,
    /// Set the default compression level (low, normal, high)
    SetLevel { level: String },
    /// Set whether compression applies a password by default
    SetUsePassword { value: bool },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let show_progress = !cli.quiet;
    match run(cli.command, show_progress) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}

fn run(command: Commands, show_progress: bool) -> Result<i32> {
    match command {
        Commands::Compress {
            inputs,
            output,
            format,
            level,
            password,
            delete_source,
        } => {
            if inputs.is_empty() {
                return Err(anyhow!("no inputs given"));
            }

            let format = resolve_format(format.as_deref(), output.as_deref())?;
            let destination =
                output.unwrap_or_else(|| default_archive_destination(&inputs, format));
            let settings = Settings {
                use_password: password.is_some(),
                password: password.unwrap_or_default(),
                compression_level: level
                    .as_deref()
                    .map(parse_level)
                    .transpose()?
                    .unwrap_or_default(),
                delete_source_after_completion: delete_source,
                ..Settings::default()
            };

            let code = run_operation(
                settings.clone(),
                OperationRequest::Compress {
                    inputs: inputs.clone(),
                    destination: destination.clone(),
                    format,
                },
                show_progress,
            );

            if code == 0 {
                finish_compression(&destination, &inputs, &settings);
            }
            Ok(code)
        }

        Commands::Extract {
            archive,
            output,
            new_folder,
            password,
        } => {
            let destination = output.unwrap_or_else(|| extract_destination(&archive, new_folder));
            let settings = Settings {
                use_password: password.is_some(),
                password: password.unwrap_or_default(),
                ..Settings::default()
            };

            let code = run_operation(
                settings,
                OperationRequest::Decompress {
                    source: archive,
                    destination: destination.clone(),
                },
                show_progress,
            );
            if code == 0 {
                println!("extracted to {}", destination.display());
            }
            Ok(code)
        }

        Commands::List {
            archive,
            json,
            tree,
            password,
        } => {
            let settings = Settings {
                use_password: password.is_some(),
                password: password.unwrap_or_default(),
                ..Settings::default()
            };
            let entries = match inspect(&archive, &settings) {
                Ok(entries) => entries,
                Err(Error::PasswordRequired) => {
                    error!("{}", Error::PasswordRequired);
                    return Ok(2);
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                let output = if tree {
                    serde_json::to_string_pretty(&build_tree(&entries))?
                } else {
                    serde_json::to_string_pretty(&entries)?
                };
                println!("{output}");
            } else if tree {
                for item in build_tree(&entries) {
                    print_tree_item(&item, 0);
                }
            } else {
                for entry in &entries {
                    println!("{:>12}  {}", entry.size, entry.path);
                }
            }
            Ok(0)
        }

        Commands::Test { archive, password } => {
            let settings = Settings {
                use_password: password.is_some(),
                password: password.unwrap_or_default(),
                ..Settings::default()
            };
            match verify(&archive, &settings) {
                Ok(true) => {
                    println!("{}: ok", archive.display());
                    Ok(0)
                }
                Ok(false) => {
                    println!("{}: damaged", archive.display());
                    Ok(1)
                }
                Err(Error::PasswordRequired) => {
                    error!("{}", Error::PasswordRequired);
                    Ok(2)
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Defaults { action } => {
            match action {
                DefaultsAction::Show => {
                    let defaults = SharedDefaults::load();
                    println!("CompressionLevel = {}", defaults.compression_level.as_str());
                    println!("UsePassword = {}", defaults.use_password);
                }
                DefaultsAction::SetLevel { level } => {
                    let compression_level = match level.as_str() {
                        "low" => LevelChoice::Low,
                        "normal" => LevelChoice::Normal,
                        "high" => LevelChoice::High,
                        other => return Err(anyhow!("unknown level: {other} (expected low, normal or high)")),
                    };
                    let mut defaults = SharedDefaults::load();
                    defaults.compression_level = compression_level;
                    defaults.save()?;
                }
                DefaultsAction::SetUsePassword { value } => {
                    let mut defaults = SharedDefaults::load();
                    defaults.use_password = value;
                    defaults.save()?;
                }
            }
            Ok(0)
        }

        Commands::Dispatch { message, password } => {
            dispatch(&message, password, show_progress)
        }
    }
}

/// Run one request to its terminal outcome, reporting progress, and map
/// the outcome onto the process exit code.
fn run_operation(settings: Settings, request: OperationRequest, show_progress: bool) -> i32 {
    let orchestrator = Orchestrator::new(settings);
    let mut observer = CliObserver::new(show_progress);
    match orchestrator.run(request, &mut observer) {
        Outcome::Succeeded => 0,
        Outcome::PasswordRequired => {
            error!("{}", Error::PasswordRequired);
            2
        }
        Outcome::Failed(message) => {
            error!("{message}");
            1
        }
    }
}

/// Progress observer rendering an indicatif bar.
struct CliObserver {
    bar: Option<ProgressBar>,
}

impl CliObserver {
    fn new(show_progress: bool) -> Self {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}%")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            bar
        });
        Self { bar }
    }
}

impl OperationObserver for CliObserver {
    fn on_progress(&mut self, fraction: f64) {
        if let Some(bar) = &self.bar {
            bar.set_position((fraction * 100.0).round() as u64);
        }
    }

    fn on_success(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn on_failure(&mut self, _error: &Error) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

/// Decode a collaborator message, merge it with the shared defaults, and
/// run the resulting operation.
fn dispatch(message: &str, password: Option<String>, show_progress: bool) -> Result<i32> {
    let defaults = SharedDefaults::load();

    match RemoteRequest::parse(message)? {
        RemoteRequest::Compress {
            inputs,
            format,
            level,
            use_password,
        } => {
            let use_password = use_password.unwrap_or(defaults.use_password);
            let settings = Settings {
                use_password,
                password: password.unwrap_or_default(),
                compression_level: level.unwrap_or_else(|| defaults.compression_level.to_level()),
                ..Settings::default()
            };
            let destination = default_archive_destination(&inputs, format);
            info!("dispatch: compress -> {:?}", destination);

            let code = run_operation(
                settings.clone(),
                OperationRequest::Compress {
                    inputs: inputs.clone(),
                    destination: destination.clone(),
                    format,
                },
                show_progress,
            );
            if code == 0 {
                finish_compression(&destination, &inputs, &settings);
            }
            Ok(code)
        }

        RemoteRequest::Decompress {
            inputs,
            create_new_folder,
        } => {
            let source = inputs
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("dispatch message carries no archive path"))?;
            let destination = extract_destination(&source, create_new_folder);
            let settings = Settings {
                use_password: password.is_some(),
                password: password.unwrap_or_default(),
                ..Settings::default()
            };
            info!("dispatch: decompress {:?} -> {:?}", source, destination);

            let code = run_operation(
                settings,
                OperationRequest::Decompress {
                    source,
                    destination: destination.clone(),
                },
                show_progress,
            );
            if code == 0 {
                println!("extracted to {}", destination.display());
            }
            Ok(code)
        }
    }
}

/// Post-completion actions, mirroring what the desktop UI does once it
/// observes success: reveal the result and optionally delete sources.
fn finish_compression(destination: &Path, inputs: &[PathBuf], settings: &Settings) {
    if settings.open_after_completion {
        println!("created {}", destination.display());
    }

    if settings.delete_source_after_completion {
        for input in inputs {
            let removed = if input.is_dir() {
                fs::remove_dir_all(input)
            } else {
                fs::remove_file(input)
            };
            if let Err(e) = removed {
                warn!("could not remove source {:?}: {}", input, e);
            }
        }
    }
}

fn resolve_format(format: Option<&str>, output: Option<&Path>) -> Result<ArchiveFormat> {
    if let Some(name) = format {
        return Ok(name.parse::<ArchiveFormat>()?);
    }
    if let Some(path) = output {
        return Ok(ArchiveFormat::detect(path));
    }
    Ok(ArchiveFormat::Zip)
}

fn parse_level(name: &str) -> Result<CompressionLevel> {
    let level = match name.to_ascii_lowercase().as_str() {
        "none" => CompressionLevel::None,
        "fastest" | "low" => CompressionLevel::Fastest,
        "fast" => CompressionLevel::Fast,
        "normal" => CompressionLevel::Normal,
        "maximum" => CompressionLevel::Maximum,
        "ultra" | "high" => CompressionLevel::Ultra,
        other => return Err(anyhow!("unknown compression level: {other}")),
    };
    Ok(level)
}

/// Default archive path: next to the first input, named after it for a
/// single input and `archive` otherwise.
fn default_archive_destination(inputs: &[PathBuf], format: ArchiveFormat) -> PathBuf {
    let parent = inputs
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let stem = if inputs.len() == 1 {
        inputs[0]
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string())
    } else {
        "archive".to_string()
    };

    parent.join(format!("{}.{}", stem, format.extension()))
}

/// Default extraction directory: the archive's own directory, or a fresh
/// folder named after the archive.
fn extract_destination(archive: &Path, new_folder: bool) -> PathBuf {
    let parent = archive
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if new_folder {
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "extracted".to_string());
        parent.join(stem)
    } else {
        parent
    }
}

fn print_tree_item(item: &ArchiveItem, depth: usize) {
    let indent = "  ".repeat(depth);
    if item.is_dir {
        println!("{}{}/ ({} bytes)", indent, item.name, item.total_size());
    } else {
        println!("{}{} ({} bytes)", indent, item.name, item.size);
    }
    for child in &item.children {
        print_tree_item(child, depth + 1);
    }
}
