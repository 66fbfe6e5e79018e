use crate::config::Config;
use crate::error::{AppError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log;
use std::path::{Path, PathBuf};

/// Compiled include/exclude rules plus caller-supplied ignore files.
///
/// Built once per run and shared read-only by the walker and the renderers.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include_set: GlobSet,
    has_includes: bool,
    exclude_set: GlobSet,
    include_priority: bool,
    ignore_rules: Option<Gitignore>,
    respect_ignore_file: bool,
}

impl PathMatcher {
    pub fn new(include: &[String], exclude: &[String], include_priority: bool) -> Result<Self> {
        log::trace!("Building glob sets for selection rules...");
        Ok(Self {
            include_set: build_glob_set_from_vec(include)?,
            has_includes: !include.is_empty(),
            exclude_set: build_glob_set_from_vec(exclude)?,
            include_priority,
            ignore_rules: None,
            respect_ignore_file: true,
        })
    }

    pub fn from_config(config: &Config, project_root: &Path) -> Result<Self> {
        Self::new(
            &config.filters.include,
            &config.filters.exclude,
            config.filters.include_priority,
        )?
        .with_ignore_files(
            project_root,
            &config.resolved_ignore_files(project_root),
            config.general.use_gitignore,
        )
    }

    /// Adds caller ignore files (gitignore syntax). Lines that fail to parse are skipped.
    pub fn with_ignore_files(
        mut self,
        project_root: &Path,
        ignore_files: &[PathBuf],
        respect_ignore_file: bool,
    ) -> Result<Self> {
        self.respect_ignore_file = respect_ignore_file;
        if ignore_files.is_empty() {
            return Ok(self);
        }

        let mut builder = GitignoreBuilder::new(project_root);
        for path in ignore_files {
            if !path.is_file() {
                return Err(AppError::Config(format!(
                    "Ignore file not found: {}",
                    path.display()
                )));
            }
            if let Some(err) = builder.add(path) {
                log::debug!("Skipping unparsable lines in {}: {}", path.display(), err);
            }
        }
        let rules = builder.build().map_err(|e| {
            AppError::Config(format!("Failed to compile ignore files: {}", e))
        })?;
        log::debug!("Compiled {} caller ignore rules.", rules.num_ignores());
        self.ignore_rules = Some(rules);
        Ok(self)
    }

    /// True when a caller ignore rule excludes the path or one of its parents.
    pub fn is_ignored(&self, relative_path: &Path, is_dir: bool) -> bool {
        if !self.respect_ignore_file {
            return false;
        }
        match &self.ignore_rules {
            Some(rules) => rules
                .matched_path_or_any_parents(relative_path, is_dir)
                .is_ignore(),
            None => false,
        }
    }

    /// Decides whether a file path relative to the root is selected for content rendering.
    pub fn classify(&self, relative_path: &Path) -> bool {
        if self.is_ignored(relative_path, false) {
            log::trace!("Path ignored by ignore file: {}", relative_path.display());
            return false;
        }

        let matched_include =
            self.has_includes && matches_path_or_ancestor(&self.include_set, relative_path);
        if self.has_includes && !matched_include {
            log::trace!(
                "Path not included by explicit include set: {}",
                relative_path.display()
            );
            return false;
        }

        if matches_path_or_ancestor(&self.exclude_set, relative_path) {
            let keep = self.include_priority && matched_include;
            log::trace!(
                "Path matched exclude set: {} (kept: {})",
                relative_path.display(),
                keep
            );
            return keep;
        }

        log::trace!("Path included: {}", relative_path.display());
        true
    }
}

fn matches_path_or_ancestor(set: &GlobSet, relative_path: &Path) -> bool {
    relative_path
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| set.is_match(p))
}

fn build_glob_set_from_vec(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern_str in patterns {
        let mut processed_pattern = pattern_str.trim().to_string();
        if processed_pattern.is_empty() {
            return Err(AppError::Glob("Empty glob pattern".to_string()));
        }
        if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
            processed_pattern.push_str("**");
        }
        match Glob::new(&processed_pattern) {
            Ok(glob) => {
                log::trace!(
                    "Adding glob pattern: {} (processed as {})",
                    pattern_str,
                    processed_pattern
                );
                builder.add(glob);
            }
            Err(e) => {
                return Err(AppError::Glob(format!(
                    "Invalid glob pattern \"{}\" (processed as \"{}\"): {}",
                    pattern_str, processed_pattern, e
                )));
            }
        }
    }
    builder.build().map_err(|e| AppError::Glob(e.to_string()))
}
