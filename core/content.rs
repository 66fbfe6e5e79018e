use crate::error::EntryWarning;
use crate::options::RenderOptions;
use crate::walker::FileEntry;
use byte_unit::{Byte, UnitType};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Bytes handed to `content_inspector` for magic-number and encoding detection.
/// Null bytes are looked for over the whole file.
pub const INSPECT_WINDOW: usize = 8 * 1024;

#[derive(Debug, Deserialize)]
struct LanguageMap {
    extensions: HashMap<String, String>,
    filenames: HashMap<String, String>,
}

static LANGUAGES: Lazy<LanguageMap> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../data/languages.yaml"));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded languages.yaml")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Binary,
    TooLarge,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Binary => "binary",
            SkipReason::TooLarge => "too_large",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "binary" => Some(SkipReason::Binary),
            "too_large" => Some(SkipReason::TooLarge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBody {
    Text(String),
    Skipped { reason: SkipReason, size_bytes: u64 },
}

/// One file's rendered block, independent of the output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSection {
    pub path: String,
    pub language: Option<String>,
    pub body: FileBody,
}

impl FileSection {
    /// Markdown block: a path line followed by the (optionally fenced) content or a skip marker.
    pub fn to_markdown(&self, code_fencing: bool) -> String {
        match &self.body {
            FileBody::Text(text) => {
                let body = if code_fencing {
                    fence(text, self.language.as_deref())
                } else {
                    with_trailing_newline(text)
                };
                format!("`{}`:\n\n{}\n", self.path, body)
            }
            FileBody::Skipped { reason, size_bytes } => {
                let what = match reason {
                    SkipReason::Binary => "binary file skipped",
                    SkipReason::TooLarge => "file skipped, exceeds size limit",
                };
                format!("`{}`: {} ({})\n\n", self.path, what, human_size(*size_bytes))
            }
        }
    }
}

/// Reads and renders every entry in parallel; the result keeps the input order.
///
/// Files that cannot be read are left out and reported as warnings.
pub fn render_files(
    entries: &[&FileEntry],
    options: &RenderOptions,
) -> (Vec<FileSection>, Vec<EntryWarning>) {
    log::debug!("Rendering {} files...", entries.len());
    let results: Vec<Result<FileSection, EntryWarning>> = entries
        .par_iter()
        .map(|entry| render_file(entry, options))
        .collect();

    let mut sections = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for result in results {
        match result {
            Ok(section) => sections.push(section),
            Err(warning) => {
                log::warn!("Skipping file: {}", warning);
                warnings.push(warning);
            }
        }
    }
    (sections, warnings)
}

pub fn render_file(entry: &FileEntry, options: &RenderOptions) -> Result<FileSection, EntryWarning> {
    let path = if options.absolute_paths {
        entry.absolute_path.to_string_lossy().into_owned()
    } else {
        entry.display_path()
    };
    let language = language_hint(&entry.relative_path).map(str::to_string);

    if let Some(limit) = options.max_file_size {
        if entry.size_bytes > limit {
            log::debug!(
                "File {} exceeds size limit ({} > {} bytes)",
                path,
                entry.size_bytes,
                limit
            );
            return Ok(FileSection {
                path,
                language,
                body: FileBody::Skipped {
                    reason: SkipReason::TooLarge,
                    size_bytes: entry.size_bytes,
                },
            });
        }
    }

    let bytes = fs::read(&entry.absolute_path)
        .map_err(|e| EntryWarning::from_io(entry.relative_path.clone(), &e))?;
    let size_bytes = bytes.len() as u64;
    if is_binary(&bytes) {
        log::debug!("File {} detected as binary", path);
        return Ok(skipped_binary(path, language, size_bytes));
    }
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            log::debug!("File {} is not valid UTF-8, treating as binary", path);
            return Ok(skipped_binary(path, language, size_bytes));
        }
    };

    let text = if options.line_numbers {
        number_lines(&text)
    } else {
        text
    };
    log::trace!("Rendered {} ({} bytes)", path, size_bytes);
    Ok(FileSection {
        path,
        language,
        body: FileBody::Text(text),
    })
}

// content_inspector stops at the first KiB and trusts a leading BOM.
fn is_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(INSPECT_WINDOW)];
    content_inspector::inspect(head).is_binary() || bytes.contains(&0)
}

fn skipped_binary(path: String, language: Option<String>, size_bytes: u64) -> FileSection {
    FileSection {
        path,
        language,
        body: FileBody::Skipped {
            reason: SkipReason::Binary,
            size_bytes,
        },
    }
}

/// Prefixes each line with its 1-based number, right-aligned to the widest number.
pub fn number_lines(text: &str) -> String {
    let count = text.lines().count();
    if count == 0 {
        return String::new();
    }
    let width = count.to_string().len();
    let mut out = text
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {}", i + 1, line, width = width))
        .collect::<Vec<_>>()
        .join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Wraps content in a backtick fence longer than any backtick run inside it.
pub fn fence(content: &str, language: Option<&str>) -> String {
    let longest_run = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let ticks = "`".repeat((longest_run + 1).max(3));
    format!(
        "{ticks}{}\n{}{ticks}\n",
        language.unwrap_or(""),
        with_trailing_newline(content)
    )
}

pub fn language_hint(path: &Path) -> Option<&'static str> {
    let languages = &*LANGUAGES;
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some(lang) = languages.filenames.get(name) {
            return Some(lang.as_str());
        }
    }
    let extension = path.extension()?.to_str()?.to_lowercase();
    languages.extensions.get(&extension).map(String::as_str)
}

pub fn human_size(size_bytes: u64) -> String {
    let adjusted = Byte::from_u64(size_bytes).get_appropriate_unit(UnitType::Binary);
    if size_bytes < 1024 {
        format!("{} B", size_bytes)
    } else {
        format!("{:.2}", adjusted)
    }
}

fn with_trailing_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn entry_for(root: &Path, rel: &str) -> FileEntry {
        let absolute_path = root.join(rel);
        let size_bytes = fs::metadata(&absolute_path).map(|m| m.len()).unwrap_or(0);
        FileEntry {
            relative_path: PathBuf::from(rel),
            absolute_path,
            is_dir: false,
            is_symlink: false,
            size_bytes,
            modified_time: None,
            selected: true,
        }
    }

    fn options(root: &Path, config: &Config) -> RenderOptions {
        RenderOptions::from_config(config, root).unwrap()
    }

    #[test]
    fn fence_outgrows_embedded_backticks() {
        assert_eq!(fence("let x = 1;", Some("rust")), "```rust\nlet x = 1;\n```\n");
        let tricky = "before\n````\ninside\n````\nafter\n";
        let fenced = fence(tricky, None);
        assert!(fenced.starts_with("`````\n"));
        assert!(fenced.ends_with("\n`````\n"));
    }

    #[test]
    fn line_numbers_are_right_aligned() {
        let text: String = (1..=10).map(|i| format!("l{}\n", i)).collect();
        let numbered = number_lines(&text);
        let lines: Vec<&str> = numbered.lines().collect();
        assert_eq!(lines[0], " 1 | l1");
        assert_eq!(lines[9], "10 | l10");
        assert!(numbered.ends_with('\n'));
        assert_eq!(number_lines(""), "");
    }

    #[test]
    fn language_hints_use_extension_and_exact_names() {
        assert_eq!(language_hint(Path::new("src/main.rs")), Some("rust"));
        assert_eq!(language_hint(Path::new("SCRIPT.PY")), Some("python"));
        assert_eq!(language_hint(Path::new("Makefile")), Some("makefile"));
        assert_eq!(language_hint(Path::new("docker/Dockerfile")), Some("dockerfile"));
        assert_eq!(language_hint(Path::new("README")), None);
        assert_eq!(language_hint(Path::new("data.unknownext")), None);
    }

    #[test]
    fn binary_files_become_markers() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("image.png"), [0x89, b'P', b'N', b'G', 0, 0, 1, 2]).unwrap();
        let opts = options(dir.path(), &Config::default());

        let section = render_file(&entry_for(dir.path(), "image.png"), &opts).unwrap();
        assert_eq!(
            section.body,
            FileBody::Skipped {
                reason: SkipReason::Binary,
                size_bytes: 8
            }
        );
        let markdown = section.to_markdown(true);
        assert_eq!(markdown, "`image.png`: binary file skipped (8 B)\n\n");
    }

    #[test]
    fn nul_bytes_mark_binary_anywhere_in_the_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bom.txt"), b"\xEF\xBB\xBFhello\0SECRET").unwrap();
        let mut late = vec![b'a'; 9000];
        late.push(0);
        late.extend_from_slice(b"tail");
        fs::write(dir.path().join("late.txt"), &late).unwrap();
        let opts = options(dir.path(), &Config::default());

        for (name, size) in [("bom.txt", 15), ("late.txt", 9005)] {
            let section = render_file(&entry_for(dir.path(), name), &opts).unwrap();
            assert_eq!(
                section.body,
                FileBody::Skipped {
                    reason: SkipReason::Binary,
                    size_bytes: size
                },
                "{}",
                name
            );
        }
        assert!(is_binary(b"\xEF\xBB\xBFplain\0"));
        assert!(!is_binary(b"\xEF\xBB\xBFplain text"));
    }

    #[test]
    fn invalid_utf8_without_nul_is_treated_as_binary() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("latin1.txt"), b"caf\xe9 au lait").unwrap();
        let opts = options(dir.path(), &Config::default());
        let section = render_file(&entry_for(dir.path(), "latin1.txt"), &opts).unwrap();
        assert!(matches!(
            section.body,
            FileBody::Skipped {
                reason: SkipReason::Binary,
                ..
            }
        ));
    }

    #[test]
    fn size_limit_skips_without_reading() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(2048)).unwrap();
        let mut config = Config::default();
        config.render.max_file_size = Some("1KiB".to_string());
        let opts = options(dir.path(), &config);

        let section = render_file(&entry_for(dir.path(), "big.txt"), &opts).unwrap();
        assert_eq!(
            section.body,
            FileBody::Skipped {
                reason: SkipReason::TooLarge,
                size_bytes: 2048
            }
        );
        assert!(section.to_markdown(true).contains("exceeds size limit"));
    }

    #[test]
    fn text_files_render_fenced_or_raw() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("test.py"), "print('hi')").unwrap();
        let opts = options(dir.path(), &Config::default());
        let section = render_file(&entry_for(dir.path(), "test.py"), &opts).unwrap();

        assert_eq!(
            section.to_markdown(true),
            "`test.py`:\n\n```python\nprint('hi')\n```\n\n"
        );
        assert_eq!(section.to_markdown(false), "`test.py`:\n\nprint('hi')\n\n");
    }

    #[test]
    fn unreadable_files_are_reported_and_left_out() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), "fine").unwrap();
        let present = entry_for(dir.path(), "ok.txt");
        let missing = entry_for(dir.path(), "gone.txt");
        let opts = options(dir.path(), &Config::default());

        let (sections, warnings) = render_files(&[&present, &missing], &opts);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].path, "ok.txt");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, PathBuf::from("gone.txt"));
    }

    #[test]
    fn parallel_rendering_keeps_input_order() {
        let dir = tempdir().unwrap();
        let names: Vec<String> = (0..40).map(|i| format!("f{:02}.txt", 39 - i)).collect();
        for name in &names {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let entries: Vec<FileEntry> = names.iter().map(|n| entry_for(dir.path(), n)).collect();
        let refs: Vec<&FileEntry> = entries.iter().collect();
        let opts = options(dir.path(), &Config::default());

        let (sections, _) = render_files(&refs, &opts);
        let rendered: Vec<&str> = sections.iter().map(|s| s.path.as_str()).collect();
        let expected: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(rendered, expected);
    }
}
