use crate::walker::FileEntry;
use log;
use std::path::Component;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
struct TreeNode {
    name: String,
    kind: NodeKind,
    children: Vec<TreeNode>,
}

/// Renders the directory tree rooted at `root_name`.
///
/// With `full` every walked entry is shown; otherwise only selected files and the
/// directories leading to them. At each level files come before directories, each group in
/// byte-wise name order. Symlinks that were not followed appear as files.
pub fn render(entries: &[FileEntry], full: bool, root_name: &str) -> String {
    let nodes = build_tree(entries, full);
    let mut out = format!("{}/", root_name.trim_end_matches('/'));
    write_level(&nodes, 1, &mut out);
    out
}

fn build_tree(entries: &[FileEntry], full: bool) -> Vec<TreeNode> {
    let mut roots: Vec<TreeNode> = Vec::new();
    let shown = entries.iter().filter(|e| full || (e.selected && !e.is_dir));
    let mut count = 0usize;
    for entry in shown {
        let components: Vec<String> = entry
            .relative_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if components.is_empty() {
            continue;
        }
        let kind = if entry.is_dir {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        insert_node(&mut roots, &components, kind);
        count += 1;
    }
    log::debug!("Tree built from {} entries (full: {}).", count, full);
    roots
}

fn insert_node(level: &mut Vec<TreeNode>, components: &[String], kind_at_end: NodeKind) {
    let Some((name, rest)) = components.split_first() else {
        return;
    };
    let kind = if rest.is_empty() {
        kind_at_end
    } else {
        NodeKind::Directory
    };

    let index = match level.binary_search_by(|node| node.name.as_str().cmp(name.as_str())) {
        Ok(index) => {
            if kind == NodeKind::Directory {
                level[index].kind = NodeKind::Directory;
            }
            index
        }
        Err(insertion_point) => {
            level.insert(
                insertion_point,
                TreeNode {
                    name: name.clone(),
                    kind,
                    children: Vec::new(),
                },
            );
            insertion_point
        }
    };
    if !rest.is_empty() {
        insert_node(&mut level[index].children, rest, kind_at_end);
    }
}

fn write_level(nodes: &[TreeNode], depth: usize, out: &mut String) {
    let files = nodes.iter().filter(|n| n.kind == NodeKind::File);
    let dirs = nodes.iter().filter(|n| n.kind == NodeKind::Directory);
    for node in files.chain(dirs) {
        out.push('\n');
        out.push_str(&INDENT.repeat(depth));
        out.push_str(&node.name);
        if node.kind == NodeKind::Directory {
            out.push('/');
            write_level(&node.children, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(path: &str, selected: bool) -> FileEntry {
        FileEntry {
            relative_path: PathBuf::from(path),
            absolute_path: PathBuf::from("/proj").join(path),
            is_dir: false,
            is_symlink: false,
            size_bytes: 0,
            modified_time: None,
            selected,
        }
    }

    fn dir(path: &str) -> FileEntry {
        FileEntry {
            is_dir: true,
            ..file(path, false)
        }
    }

    #[test]
    fn files_precede_directories_at_each_level() {
        let entries = vec![
            dir("src"),
            file("src/main.rs", true),
            dir("src/util"),
            file("src/util/io.rs", true),
            file("src/zeta.rs", true),
            file("Cargo.toml", true),
        ];
        let expected = "proj/\n  Cargo.toml\n  src/\n    main.rs\n    zeta.rs\n    util/\n      io.rs";
        assert_eq!(render(&entries, false, "proj"), expected);
    }

    #[test]
    fn selected_only_tree_hides_unselected_branches() {
        let entries = vec![
            dir("docs"),
            file("docs/guide.md", false),
            dir("src"),
            file("src/lib.rs", true),
            file("notes.txt", false),
        ];
        assert_eq!(render(&entries, false, "proj"), "proj/\n  src/\n    lib.rs");
        assert_eq!(
            render(&entries, true, "proj"),
            "proj/\n  notes.txt\n  docs/\n    guide.md\n  src/\n    lib.rs"
        );
    }

    #[test]
    fn empty_directories_show_only_in_full_tree() {
        let entries = vec![dir("empty"), file("a.txt", true)];
        assert_eq!(render(&entries, false, "root"), "root/\n  a.txt");
        assert_eq!(render(&entries, true, "root"), "root/\n  a.txt\n  empty/");
    }

    #[test]
    fn nothing_selected_renders_root_line() {
        let entries = vec![file("a.txt", false)];
        assert_eq!(render(&entries, false, "root"), "root/");
    }
}
