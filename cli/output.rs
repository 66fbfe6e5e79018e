use anyhow::{Context, Result};
use codecontext_core::{AppError, EntryWarning};
use colored::*;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Sends the result to `output_path`, or stdout when none is given.
pub fn deliver(content: &str, output_path: Option<&Path>, quiet: bool) -> Result<()> {
    match output_path {
        Some(path) => {
            write_to_file(path, content)?;
            if !quiet {
                eprintln!(
                    "{} Context saved to: {}",
                    "✅".green(),
                    path.display().to_string().blue()
                );
            }
            Ok(())
        }
        None => write_to_stdout(content),
    }
}

pub fn print_warnings(warnings: &[EntryWarning], quiet: bool) {
    if quiet || warnings.is_empty() {
        return;
    }
    for warning in warnings {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }
}

pub fn print_token_summary(summary: &str) {
    eprintln!("{} {}", "Tokens:".cyan().bold(), summary);
}

/// Writes through a temporary file in the destination directory, renamed into place only
/// once the whole content is on disk.
fn write_to_file(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| AppError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    temp.write_all(content.as_bytes())
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| AppError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    temp.persist(path).map_err(|e| AppError::FileWrite {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    log::debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .map_err(AppError::Io)
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .map_err(AppError::Io)
            .context("Failed to write newline to stdout")?;
    }
    handle
        .flush()
        .map_err(AppError::Io)
        .context("Failed to flush stdout")?;
    Ok(())
}
