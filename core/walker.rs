use crate::error::{EntryWarning, WarningKind};
use crate::matcher::PathMatcher;
use crate::options::RenderOptions;
use ignore::{DirEntry, WalkBuilder};
use log;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub size_bytes: u64,
    pub modified_time: Option<SystemTime>,
    pub selected: bool,
}

impl FileEntry {
    /// Root-relative path with `/` separators on every platform.
    pub fn display_path(&self) -> String {
        slash_path(&self.relative_path)
    }
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Depth-first, byte-wise name order at each level.
    pub entries: Vec<FileEntry>,
    pub errored: Vec<EntryWarning>,
}

impl WalkOutcome {
    pub fn selected(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter().filter(|e| e.selected)
    }
}

pub fn walk(project_root: &Path, options: &RenderOptions, matcher: &PathMatcher) -> WalkOutcome {
    log::debug!("Starting walk of {}", project_root.display());
    let respect_ignore = options.respect_ignore_files;

    let mut builder = WalkBuilder::new(project_root);
    builder
        .hidden(!options.include_hidden)
        .follow_links(options.follow_symlinks)
        .ignore(respect_ignore)
        .git_ignore(respect_ignore)
        .git_exclude(respect_ignore)
        .git_global(false)
        .parents(respect_ignore)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    let filter_root = project_root.to_path_buf();
    let filter_matcher = matcher.clone();
    builder.filter_entry(move |entry| keep_entry(entry, &filter_root, &filter_matcher));
    log::debug!(
        "WalkBuilder configured (hidden: {}, follow_symlinks: {}, ignore files: {})",
        options.include_hidden,
        options.follow_symlinks,
        respect_ignore
    );

    let mut outcome = WalkOutcome::default();
    for entry_result in builder.build() {
        match entry_result {
            Ok(entry) => {
                if entry.depth() == 0 {
                    continue;
                }
                match build_entry(&entry, project_root, options, matcher) {
                    Ok(file_entry) => {
                        log::trace!(
                            "Walked path: {} (selected: {})",
                            file_entry.display_path(),
                            file_entry.selected
                        );
                        outcome.entries.push(file_entry);
                    }
                    Err(warning) => {
                        log::warn!("Skipping entry: {}", warning);
                        outcome.errored.push(warning);
                    }
                }
            }
            Err(err) if err.is_partial() => {
                log::debug!("Ignoring unparsable ignore-file lines: {}", err);
            }
            Err(err) => {
                let warning = warning_from_walk_error(&err, project_root);
                log::warn!("Error walking directory: {}", warning);
                outcome.errored.push(warning);
            }
        }
    }

    if !outcome.errored.is_empty() {
        let errored: HashSet<&Path> = outcome.errored.iter().map(|w| w.path.as_path()).collect();
        let before = outcome.entries.len();
        outcome
            .entries
            .retain(|e| !errored.contains(e.relative_path.as_path()));
        if before != outcome.entries.len() {
            log::debug!("Dropped {} unreadable entries.", before - outcome.entries.len());
        }
    }

    log::info!(
        "Walk complete. {} entries, {} selected, {} errors.",
        outcome.entries.len(),
        outcome.selected().count(),
        outcome.errored.len()
    );
    outcome
}

fn keep_entry(entry: &DirEntry, project_root: &Path, matcher: &PathMatcher) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if entry.file_name() == ".git" {
        log::trace!("Explicitly skipping .git: {}", entry.path().display());
        return false;
    }
    let relative_path = entry.path().strip_prefix(project_root).unwrap_or(entry.path());
    let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
    if matcher.is_ignored(relative_path, is_dir) {
        log::trace!("Pruned by ignore file: {}", relative_path.display());
        return false;
    }
    true
}

fn build_entry(
    entry: &DirEntry,
    project_root: &Path,
    options: &RenderOptions,
    matcher: &PathMatcher,
) -> Result<FileEntry, EntryWarning> {
    let path = entry.path();
    let relative_path = relative_to(path, project_root);
    let metadata = entry
        .metadata()
        .map_err(|e| warning_from_walk_error(&e, project_root))?;

    let is_symlink = entry.path_is_symlink();
    let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
    // An unfollowed symlink is a leaf: reading it would dereference it.
    let selectable = !is_dir && (options.follow_symlinks || !is_symlink);
    let selected = selectable && matcher.classify(&relative_path);

    Ok(FileEntry {
        absolute_path: path.to_path_buf(),
        relative_path,
        is_dir,
        is_symlink,
        size_bytes: metadata.len(),
        modified_time: metadata.modified().ok(),
        selected,
    })
}

fn warning_from_walk_error(err: &ignore::Error, project_root: &Path) -> EntryWarning {
    match err {
        ignore::Error::Loop { ancestor, child } => EntryWarning::new(
            relative_to(child, project_root),
            WarningKind::SymlinkCycle,
            format!(
                "points back to ancestor '{}', not re-entered",
                slash_path(&relative_to(ancestor, project_root))
            ),
        ),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            warning_from_walk_error(err, project_root)
        }
        ignore::Error::WithPath { path, err } => {
            let mut warning = warning_from_walk_error(err, project_root);
            if warning.path.as_os_str().is_empty() {
                warning.path = relative_to(path, project_root);
            }
            warning
        }
        other => match other.io_error() {
            Some(io_err) => EntryWarning::from_io(PathBuf::new(), io_err),
            None => EntryWarning::new(PathBuf::new(), WarningKind::Walk, other.to_string()),
        },
    }
}

fn relative_to(path: &Path, project_root: &Path) -> PathBuf {
    pathdiff::diff_paths(path, project_root).unwrap_or_else(|| path.to_path_buf())
}

pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
