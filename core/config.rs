use crate::error::{AppError, Result};
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".codecontext";
pub const DEFAULT_CONFIG_FILENAME: &str = "codecontext.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_false")]
    pub include_hidden: bool,
    #[serde(default = "default_false")]
    pub follow_symlinks: bool,
    #[serde(default = "default_true")]
    pub use_gitignore: bool,
    #[serde(default)]
    pub ignore_files: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_false")]
    pub include_priority: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(default = "default_false")]
    pub line_numbers: bool,
    #[serde(default = "default_false")]
    pub absolute_paths: bool,
    #[serde(default = "default_true")]
    pub code_fencing: bool,
    #[serde(default = "default_false")]
    pub full_directory_tree: bool,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub max_file_size: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub template: Option<PathBuf>,
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
    #[serde(default)]
    pub tokens: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_sort() -> String {
    "name_asc".to_string()
}
fn default_format() -> String {
    "markdown".to_string()
}
fn default_tokenizer() -> String {
    "cl100k".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            include_hidden: default_false(),
            follow_symlinks: default_false(),
            use_gitignore: default_true(),
            ignore_files: Vec::new(),
        }
    }
}
impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            line_numbers: default_false(),
            absolute_paths: default_false(),
            code_fencing: default_true(),
            full_directory_tree: default_false(),
            sort: default_sort(),
            max_file_size: None,
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            template: None,
            tokenizer: default_tokenizer(),
            tokens: None,
        }
    }
}

impl Config {
    /// Resolves the codebase root: CLI value, then `CODECONTEXT_ROOT`, then the current directory.
    /// The result must exist and be a directory.
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("CODECONTEXT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        let canonical = path_to_resolve
            .canonicalize()
            .map_err(|e| AppError::InvalidRoot {
                path: path_to_resolve.clone(),
                reason: format!("cannot be resolved: {}", e),
            })?;
        if !canonical.is_dir() {
            return Err(AppError::InvalidRoot {
                path: path_to_resolve,
                reason: "is not a directory".to_string(),
            });
        }
        Ok(canonical)
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&PathBuf>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p) => {
                let path = PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref());
                if !path.is_file() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = project_root
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME);
                if default_path.is_file() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml_str(toml_content: &str) -> Result<Self> {
        toml::from_str::<Config>(toml_content).map_err(|e| {
            AppError::TomlParse(format!("{}. Check TOML syntax and structure.", e))
        })
    }

    /// Caller ignore files are resolved relative to the root unless absolute.
    pub fn resolved_ignore_files(&self, project_root: &Path) -> Vec<PathBuf> {
        self.general
            .ignore_files
            .iter()
            .map(|p| {
                let expanded = PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref());
                if expanded.is_absolute() {
                    expanded
                } else {
                    project_root.join(expanded)
                }
            })
            .collect()
    }
}
