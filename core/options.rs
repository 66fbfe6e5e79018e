use crate::config::Config;
use crate::error::{AppError, Result};
use crate::output_formats::OutputFormat;
use crate::sorter::SortKey;
use crate::template::Template;
use crate::tokens::{TokenFormat, Tokenizer};
use byte_unit::Byte;
use log;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub line_numbers: bool,
    pub absolute_paths: bool,
    pub code_fencing: bool,
    pub full_directory_tree: bool,
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    pub respect_ignore_files: bool,
    pub sort: SortKey,
    pub max_file_size: Option<u64>,
    pub format: OutputFormat,
    pub template: Template,
    pub tokenizer: Tokenizer,
    pub tokens: Option<TokenFormat>,
}

impl RenderOptions {
    /// Every configuration problem surfaces here, before the filesystem is walked.
    pub fn from_config(config: &Config, project_root: &Path) -> Result<Self> {
        let sort = SortKey::from_str(&config.render.sort)?;
        let format = OutputFormat::from_str(&config.output.format)?;
        let tokenizer = Tokenizer::from_str(&config.output.tokenizer)?;
        let tokens = config
            .output
            .tokens
            .as_deref()
            .map(TokenFormat::from_str)
            .transpose()?;
        let max_file_size = config
            .render
            .max_file_size
            .as_deref()
            .map(parse_size)
            .transpose()?;
        let template = match &config.output.template {
            Some(path) => Template::from_path(&resolve_template_path(path, project_root))?,
            None => Template::default(),
        };

        let options = Self {
            line_numbers: config.render.line_numbers,
            absolute_paths: config.render.absolute_paths,
            code_fencing: config.render.code_fencing,
            full_directory_tree: config.render.full_directory_tree,
            include_hidden: config.general.include_hidden,
            follow_symlinks: config.general.follow_symlinks,
            respect_ignore_files: config.general.use_gitignore,
            sort,
            max_file_size,
            format,
            template,
            tokenizer,
            tokens,
        };
        log::debug!(
            "Render options: sort {}, format {}, tokenizer {}, max size {:?}",
            options.sort,
            options.format,
            options.tokenizer,
            options.max_file_size
        );
        Ok(options)
    }
}

fn parse_size(size_str: &str) -> Result<u64> {
    let byte = Byte::from_str(size_str.trim()).map_err(|e| {
        AppError::Config(format!("Invalid max_file_size '{}': {}", size_str, e))
    })?;
    let bytes: u128 = byte.into();
    u64::try_from(bytes)
        .map_err(|_| AppError::Config(format!("max_file_size '{}' is too large", size_str)))
}

/// Relative template paths resolve against the current directory, then the root.
fn resolve_template_path(path: &Path, project_root: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
    if expanded.is_absolute() || expanded.exists() {
        return expanded;
    }
    let under_root = project_root.join(&expanded);
    if under_root.exists() {
        under_root
    } else {
        expanded
    }
}
