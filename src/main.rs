//! `getexeicon` - Extract the icon of a Windows executable or process
//!
//! Writes the primary icon of a module, a running process, or the shell's
//! generic executable icon to a standalone `.ico` file, and lists the
//! entries of existing icon files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use getexeicon::{
    IconError, IconExtractor,
    config::ConfigManager,
    container::IconDirectory,
    error::user_friendly_message,
    utils,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about = "Extract the icon of a Windows executable or process.", long_about = None)]
struct Cli {
    /// Never embed PNG images; transcode them to bitmaps or drop oversized ones
    #[arg(long, global = true)]
    no_png: bool,

    /// Configuration file (defaults to %APPDATA%\getexeicon\config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extracts the primary icon of an executable or library.
    File {
        /// The module to read.
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Extracts the primary icon of the executable behind a running process.
    Pid {
        /// The process identifier.
        pid: u32,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Extracts the shell's generic executable icon.
    Default {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Lists the entries of an icon file.
    Inspect {
        /// The icon file to read.
        path: PathBuf,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Where to write the icon file.
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<IconError>() {
                Some(icon_error) => eprintln!("{}", user_friendly_message(icon_error)),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    utils::init_logging(&ConfigManager::get_data_dir(), &cli.log_level)
        .context("Failed to initialize logging system")?;

    let config = match &cli.config {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;

    let prefer_png = config.prefer_png && !cli.no_png;
    let extractor = IconExtractor::from_config(config);

    match cli.command {
        Command::File { path, output } => {
            let icon = extractor
                .icon_from_file(&path, prefer_png)
                .with_context(|| format!("Failed to extract icon from {}", path.display()))?;
            write_icon(&output.output, &icon)?;
        }
        Command::Pid { pid, output } => {
            let icon = extractor
                .icon_from_pid(pid, prefer_png)
                .with_context(|| format!("Failed to extract icon from process {pid}"))?;
            write_icon(&output.output, &icon)?;
        }
        Command::Default { output } => {
            let icon = extractor.default_exe_icon(prefer_png);
            write_icon(&output.output, &icon)?;
        }
        Command::Inspect { path } => inspect(&path)?,
    }

    Ok(())
}

/// Write the container next to its destination, then move it into place
fn write_icon(path: &Path, icon: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    temp.write_all(icon).context("Failed to write icon data")?;
    temp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote {} bytes to {}", icon.len(), path.display());
    println!("Saved icon: '{}' ({} bytes)", path.display(), icon.len());
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let directory = IconDirectory::parse(&data)
        .with_context(|| format!("{} is not a valid icon file", path.display()))?;

    println!("{}: {} entries", path.display(), directory.entries.len());
    for (index, entry) in directory.entries.iter().enumerate() {
        println!(
            "  #{index}: {}x{} {} bpp, {} {} bytes",
            entry.width,
            entry.height,
            entry.bit_count,
            if entry.is_png { "PNG" } else { "DIB" },
            entry.size(),
        );
    }
    Ok(())
}
