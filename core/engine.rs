use crate::config::Config;
use crate::content;
use crate::document::Document;
use crate::error::{AppError, EntryWarning, Result};
use crate::matcher::PathMatcher;
use crate::options::RenderOptions;
use crate::output_formats::{self, OutputFormat};
use crate::sorter;
use crate::tree;
use crate::vcs::VcsContext;
use crate::walker::{self, FileEntry, WalkOutcome};
use log;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Result of one run: the formatted text plus everything the caller may want to report.
#[derive(Debug, Clone)]
pub struct PromptOutput {
    pub text: String,
    pub format: OutputFormat,
    pub token_count: Option<usize>,
    /// Token count rendered in the configured display mode.
    pub token_summary: Option<String>,
    pub warnings: Vec<EntryWarning>,
    pub files_rendered: usize,
}

/// Runs the pipeline for one root: walk, order, render, compose, format, count.
///
/// Construction performs all validation, so a built engine only fails on I/O-independent
/// formatter or tokenizer-table problems. Each phase is also exposed on its own so callers can
/// stop between phases.
#[derive(Debug, Clone)]
pub struct PromptEngine {
    project_root: PathBuf,
    options: RenderOptions,
    matcher: PathMatcher,
}

impl PromptEngine {
    pub fn new(project_root: &Path, config: &Config) -> Result<Self> {
        let project_root = validate_root(project_root)?;
        let options = RenderOptions::from_config(config, &project_root)?;
        let matcher = PathMatcher::from_config(config, &project_root)?;
        Ok(Self {
            project_root,
            options,
            matcher,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn walk(&self) -> WalkOutcome {
        walker::walk(&self.project_root, &self.options, &self.matcher)
    }

    /// Orders and renders the walked files and assembles them with the VCS text and request.
    /// Per-file read problems come back as warnings, and those files are left out of the tree.
    pub fn compose(
        &self,
        walked: &WalkOutcome,
        user_request: Option<&str>,
        vcs: &VcsContext,
    ) -> (Document, Vec<EntryWarning>) {
        let ordered = sorter::order(&walked.entries, self.options.sort);
        let (files, warnings) = content::render_files(&ordered, &self.options);
        let tree_text = tree::render(
            &without_unreadable(&walked.entries, &warnings),
            self.options.full_directory_tree,
            &self.root_name(),
        );
        let document = Document::compose(
            &self.root_label(),
            tree_text,
            files,
            vcs,
            user_request,
            &self.options.template,
            self.options.code_fencing,
        );
        (document, warnings)
    }

    /// Formats the document and, when a token display mode is configured, counts tokens on
    /// the formatted text.
    pub fn finish(&self, document: &Document) -> Result<(String, Option<usize>)> {
        let text = output_formats::format(document, self.options.format)?;
        let token_count = match self.options.tokens {
            Some(_) => {
                let count = self.options.tokenizer.count(&text)?;
                log::debug!("Counted {} tokens with {}", count, self.options.tokenizer);
                Some(count)
            }
            None => None,
        };
        Ok((text, token_count))
    }

    pub fn run(&self, user_request: Option<&str>, vcs: &VcsContext) -> Result<PromptOutput> {
        log::info!("Assembling context for {}", self.project_root.display());
        let walked = self.walk();
        let (document, render_warnings) = self.compose(&walked, user_request, vcs);
        let files_rendered = document.files().count();
        let (text, token_count) = self.finish(&document)?;

        let mut warnings = walked.errored;
        warnings.extend(render_warnings);
        let token_summary = self
            .options
            .tokens
            .zip(token_count)
            .map(|(mode, count)| mode.describe(count));

        log::info!(
            "Assembled {} files into {} bytes of {} ({} warnings)",
            files_rendered,
            text.len(),
            self.options.format,
            warnings.len()
        );
        Ok(PromptOutput {
            text,
            format: self.options.format,
            token_count,
            token_summary,
            warnings,
            files_rendered,
        })
    }

    fn root_name(&self) -> String {
        self.project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.project_root.to_string_lossy().into_owned())
    }

    fn root_label(&self) -> String {
        if self.options.absolute_paths {
            self.project_root.to_string_lossy().into_owned()
        } else {
            self.root_name()
        }
    }
}

fn without_unreadable(entries: &[FileEntry], warnings: &[EntryWarning]) -> Vec<FileEntry> {
    let unreadable: HashSet<&Path> = warnings.iter().map(|w| w.path.as_path()).collect();
    entries
        .iter()
        .filter(|entry| !unreadable.contains(entry.relative_path.as_path()))
        .cloned()
        .collect()
}

fn validate_root(project_root: &Path) -> Result<PathBuf> {
    let canonical = project_root
        .canonicalize()
        .map_err(|e| AppError::InvalidRoot {
            path: project_root.to_path_buf(),
            reason: format!("cannot be resolved: {}", e),
        })?;
    if !canonical.is_dir() {
        return Err(AppError::InvalidRoot {
            path: project_root.to_path_buf(),
            reason: "is not a directory".to_string(),
        });
    }
    Ok(canonical)
}
