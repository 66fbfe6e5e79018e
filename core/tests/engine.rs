use codecontext_core::{
    Config, Document, DocumentSection, FileBody, OutputFormat, PromptEngine, SkipReason,
    VcsContext, WarningKind, decode, format,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn run(root: &Path, config: &Config, request: Option<&str>) -> codecontext_core::PromptOutput {
    PromptEngine::new(root, config)
        .unwrap()
        .run(request, &VcsContext::new())
        .unwrap()
}

fn python_fixture() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    write(dir.path(), "test.py", "# Python file content\n");
    write(dir.path(), "test.txt", "# Text file content\n");
    dir
}

#[test]
fn include_filter_selects_python_only() {
    let dir = python_fixture();
    let mut config = Config::default();
    config.filters.include = vec!["*.py".to_string()];

    let output = run(dir.path(), &config, Some("Review this"));
    assert!(output.text.contains("## Source Tree"));
    assert!(output.text.contains("`test.py`:\n\n```python\n# Python file content\n```"));
    assert!(!output.text.contains("# Text file content"));
    assert!(output.text.contains("## User Request\n\nReview this"));
    assert!(output.text.contains("## Instructions for LLM"));
    assert_eq!(output.files_rendered, 1);
    assert!(output.warnings.is_empty());
}

#[test]
fn include_priority_resolves_conflicts() {
    let dir = python_fixture();
    let mut config = Config::default();
    config.filters.include = vec!["*.py".to_string()];
    config.filters.exclude = vec!["*.py".to_string()];

    let output = run(dir.path(), &config, None);
    assert_eq!(output.files_rendered, 0);
    assert!(!output.text.contains("# Python file content"));

    config.filters.include_priority = true;
    let output = run(dir.path(), &config, None);
    assert_eq!(output.files_rendered, 1);
    assert!(output.text.contains("# Python file content"));
}

#[test]
fn hidden_files_require_opt_in() {
    let dir = tempdir().unwrap();
    write(dir.path(), ".secret.py", "token = 1\n");
    write(dir.path(), "visible.py", "x = 1\n");

    let output = run(dir.path(), &Config::default(), None);
    assert!(!output.text.contains(".secret.py"));

    let mut config = Config::default();
    config.general.include_hidden = true;
    let output = run(dir.path(), &config, None);
    assert!(output.text.contains("`.secret.py`"));
}

#[test]
fn name_desc_orders_file_sections() {
    let dir = tempdir().unwrap();
    for name in ["a.py", "m.py", "z.py"] {
        write(dir.path(), name, format!("# {}\n", name));
    }
    let mut config = Config::default();
    config.render.sort = "name_desc".to_string();
    config.output.format = "json".to_string();

    let output = run(dir.path(), &config, None);
    let sections = decode(&output.text, OutputFormat::Json).unwrap();
    let paths: Vec<&str> = sections
        .iter()
        .filter_map(|s| match s {
            DocumentSection::File(f) => Some(f.path.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(paths, vec!["z.py", "m.py", "a.py"]);
}

#[test]
fn binary_files_are_skipped_in_every_format() {
    let dir = tempdir().unwrap();
    write(dir.path(), "blob.bin", [0u8, 159, 146, 150, 0, 1, 2, 3]);
    write(dir.path(), "main.rs", "fn main() {}\n");

    let output = run(dir.path(), &Config::default(), None);
    assert!(output.text.contains("`blob.bin`: binary file skipped"));
    assert!(!output.text.contains('\u{0}'));

    for format in ["json", "xml"] {
        let mut config = Config::default();
        config.output.format = format.to_string();
        let output = run(dir.path(), &config, None);
        assert!(!output.text.contains('\u{0}'));
        let parsed: OutputFormat = format.parse().unwrap();
        let sections = decode(&output.text, parsed).unwrap();
        let blob = sections
            .iter()
            .find_map(|s| match s {
                DocumentSection::File(f) if f.path == "blob.bin" => Some(f),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            blob.body,
            FileBody::Skipped {
                reason: SkipReason::Binary,
                size_bytes: 8
            }
        );
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = tempdir().unwrap();
    for i in 0..25 {
        write(
            dir.path(),
            &format!("pkg{}/mod{}.rs", i % 4, i),
            format!("pub fn f{}() {{}}\n", i),
        );
    }
    let mut config = Config::default();
    config.render.full_directory_tree = true;
    config.render.line_numbers = true;

    let first = run(dir.path(), &config, Some("same"));
    for _ in 0..3 {
        assert_eq!(run(dir.path(), &config, Some("same")).text, first.text);
    }
}

#[test]
fn every_format_decodes_to_the_composed_sections() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/lib.rs", "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n");
    write(dir.path(), "src/nested.py", "    leading = 1\n\n");
    write(dir.path(), "README.md", "# Title\n\nSome <html> & text\n");
    let vcs = VcsContext::new().with_diff(" unchanged\n+added\n");

    let engine = PromptEngine::new(dir.path(), &Config::default()).unwrap();
    let walked = engine.walk();
    let (document, warnings) = engine.compose(&walked, Some("Explain add"), &vcs);
    assert!(warnings.is_empty());

    let json = format(&document, OutputFormat::Json).unwrap();
    let xml = format(&document, OutputFormat::Xml).unwrap();
    assert_eq!(decode(&json, OutputFormat::Json).unwrap(), document.sections);
    assert_eq!(decode(&xml, OutputFormat::Xml).unwrap(), document.sections);

    let markdown = format(&document, OutputFormat::Markdown).unwrap();
    let rebuilt = Document::from_sections(&document.root_label, decode(&xml, OutputFormat::Xml).unwrap());
    assert_eq!(format(&rebuilt, OutputFormat::Markdown).unwrap(), markdown);
    assert!(markdown.contains("```python\n    leading = 1\n\n```"));
}

#[test]
fn custom_template_drops_unreferenced_sections() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.py", "print('hi')\n");
    write(dir.path(), "layout.md", "TREE:\n{{tree}}\nREQ: {{user_request}}\n");
    let mut config = Config::default();
    config.output.template = Some(dir.path().join("layout.md"));
    config.filters.exclude = vec!["layout.md".to_string()];

    let output = run(dir.path(), &config, Some("hello"));
    assert!(output.text.starts_with("TREE:\n"));
    assert!(output.text.contains("REQ: hello"));
    assert!(!output.text.contains("print('hi')"));

    config.output.format = "json".to_string();
    let output = run(dir.path(), &config, Some("hello"));
    let sections = decode(&output.text, OutputFormat::Json).unwrap();
    assert!(
        sections
            .iter()
            .all(|s| matches!(s, DocumentSection::DirectoryTree(_) | DocumentSection::UserRequest(_)))
    );
}

#[test]
fn tokens_are_counted_on_the_final_text() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.py", "print('hi')\n");
    write(dir.path(), "layout.md", "{{files}}");
    let mut config = Config::default();
    config.output.template = Some(dir.path().join("layout.md"));
    config.output.tokenizer = "words".to_string();
    config.output.tokens = Some("raw".to_string());
    config.filters.include = vec!["*.py".to_string()];

    let output = run(dir.path(), &config, None);
    let expected = codecontext_core::Tokenizer::Words.count(&output.text).unwrap();
    assert_eq!(output.token_count, Some(expected));
    assert_eq!(output.token_summary, Some(expected.to_string()));

    // Default layout adds headers and a tree, so the count must differ.
    config.output.template = None;
    let full = run(dir.path(), &config, None);
    assert!(full.token_count.unwrap() > expected);
}

#[test]
fn size_limit_emits_too_large_marker() {
    let dir = tempdir().unwrap();
    write(dir.path(), "big.log", "x".repeat(4096));
    write(dir.path(), "small.txt", "ok\n");
    let mut config = Config::default();
    config.render.max_file_size = Some("1KiB".to_string());

    let output = run(dir.path(), &config, None);
    assert!(output.text.contains("`big.log`: file skipped, exceeds size limit"));
    assert!(output.text.contains("`small.txt`:\n\n```\nok\n```"));
}

#[test]
fn configuration_errors_precede_traversal() {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.output.tokenizer = "bogus".to_string();
    let err = PromptEngine::new(dir.path(), &config).unwrap_err();
    assert!(err.is_configuration());

    let mut config = Config::default();
    config.filters.include = vec!["[".to_string()];
    let err = PromptEngine::new(dir.path(), &config).unwrap_err();
    assert!(err.is_configuration());
}

#[cfg(unix)]
#[test]
fn symlink_cycles_terminate_with_a_warning() {
    let dir = tempdir().unwrap();
    write(dir.path(), "pkg/code.py", "x = 1\n");
    std::os::unix::fs::symlink(dir.path().join("pkg"), dir.path().join("pkg/again")).unwrap();
    let mut config = Config::default();
    config.general.follow_symlinks = true;

    let output = run(dir.path(), &config, None);
    assert_eq!(output.files_rendered, 1);
    assert!(
        output
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::SymlinkCycle)
    );
}

#[cfg(unix)]
#[test]
fn broken_symlinks_do_not_abort_the_run() {
    let dir = tempdir().unwrap();
    write(dir.path(), "real.py", "x = 1\n");
    std::os::unix::fs::symlink(dir.path().join("gone.py"), dir.path().join("dangling.py")).unwrap();
    let mut config = Config::default();
    config.general.follow_symlinks = true;

    let output = run(dir.path(), &config, None);
    assert!(output.text.contains("`real.py`"));
    assert!(!output.warnings.is_empty());
}

#[cfg(unix)]
#[test]
fn unreadable_files_leave_the_tree_and_become_warnings() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "open.py", "x = 1\n");
    write(dir.path(), "locked.py", "secret = 1\n");
    let locked = dir.path().join("locked.py");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Permission bits do not stop root.
        return;
    }

    let engine = PromptEngine::new(dir.path(), &Config::default()).unwrap();
    let walked = engine.walk();
    let (document, warnings) = engine.compose(&walked, None, &VcsContext::new());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, Path::new("locked.py"));
    let tree = match &document.sections[0] {
        DocumentSection::DirectoryTree(tree) => tree.clone(),
        other => panic!("expected the tree first, got {:?}", other),
    };
    assert!(tree.contains("open.py"), "{}", tree);
    assert!(!tree.contains("locked.py"), "{}", tree);
    assert_eq!(document.files().count(), 1);
}
