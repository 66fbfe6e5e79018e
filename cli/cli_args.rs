use clap::{Args, Parser};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long = "path",
        help = "Codebase root to scan (default: current dir, or $CODECONTEXT_ROOT).",
        value_name = "DIR",
        help_heading = "Project Setup"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long = "config",
        help = "Path of the TOML config file (default: <root>/.codecontext/codecontext.toml).",
        value_name = "FILE",
        conflicts_with = "disable_config",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long = "no-config",
        help = "Do not load any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub disable_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(
        short = 'i',
        long = "include",
        help = "Glob of paths to include (repeatable or comma-separated).",
        value_name = "PATTERN",
        value_delimiter = ',',
        help_heading = "Selection"
    )]
    pub include: Vec<String>,

    #[arg(
        short = 'e',
        long = "exclude",
        help = "Glob of paths to exclude (repeatable or comma-separated).",
        value_name = "PATTERN",
        value_delimiter = ',',
        help_heading = "Selection"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long,
        help = "Keep a path matched by both include and exclude patterns.",
        help_heading = "Selection"
    )]
    pub include_priority: bool,

    #[arg(
        long,
        help = "Include hidden files and directories.",
        help_heading = "Selection"
    )]
    pub hidden: bool,

    #[arg(
        short = 'L',
        long,
        help = "Follow symbolic links.",
        help_heading = "Selection"
    )]
    pub follow_symlinks: bool,

    #[arg(
        long,
        help = "Ignore .gitignore, .ignore and extra ignore files.",
        help_heading = "Selection"
    )]
    pub no_ignore: bool,

    #[arg(
        long = "ignore-file",
        help = "Extra ignore file in gitignore syntax, relative to the root (repeatable).",
        value_name = "FILE",
        help_heading = "Selection"
    )]
    pub ignore_files: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RenderOpts {
    #[arg(
        short = 'l',
        long,
        help = "Prefix source lines with line numbers.",
        help_heading = "Rendering"
    )]
    pub line_numbers: bool,

    #[arg(
        long,
        help = "Show absolute paths instead of root-relative ones.",
        help_heading = "Rendering"
    )]
    pub absolute_paths: bool,

    #[arg(
        long,
        help = "Emit file contents without code fences.",
        help_heading = "Rendering"
    )]
    pub no_codeblock: bool,

    #[arg(
        long,
        help = "Show every walked entry in the tree, not only selected files.",
        help_heading = "Rendering"
    )]
    pub full_directory_tree: bool,

    #[arg(
        long,
        help = "Order of file sections.",
        value_name = "KEY",
        value_parser = ["name_asc", "name_desc", "date_asc", "date_desc"],
        help_heading = "Rendering"
    )]
    pub sort: Option<String>,

    #[arg(
        long,
        help = "Skip contents of files larger than this (e.g. 512KB, 1MiB).",
        value_name = "SIZE",
        help_heading = "Rendering"
    )]
    pub max_file_size: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputOpts {
    #[arg(
        short = 'O',
        long = "output-file",
        help = "Write the result to FILE instead of stdout.",
        value_name = "FILE",
        help_heading = "Output"
    )]
    pub output_file: Option<PathBuf>,

    #[arg(
        short = 'F',
        long = "output-format",
        help = "Output format.",
        value_name = "FORMAT",
        value_parser = ["markdown", "json", "xml"],
        help_heading = "Output"
    )]
    pub format: Option<String>,

    #[arg(
        short = 't',
        long,
        help = "Custom layout template file.",
        value_name = "TEMPLATE",
        help_heading = "Output"
    )]
    pub template: Option<PathBuf>,

    #[arg(
        short = 'c',
        long = "encoding",
        help = "Tokenizer used for counting (cl100k, o200k, p50k, r50k, words).",
        value_name = "TOKENIZER",
        help_heading = "Output"
    )]
    pub tokenizer: Option<String>,

    #[arg(
        long,
        help = "Report the token count of the result.",
        value_name = "MODE",
        value_parser = ["raw", "format"],
        help_heading = "Output"
    )]
    pub tokens: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GitOpts {
    #[arg(
        short = 'd',
        long = "diff",
        help = "Include uncommitted changes (git diff HEAD).",
        help_heading = "Git"
    )]
    pub diff: bool,

    #[arg(
        long,
        help = "Include the diff between two branches.",
        num_args = 2,
        value_names = ["FROM", "TO"],
        help_heading = "Git"
    )]
    pub git_diff_branch: Option<Vec<String>>,

    #[arg(
        long,
        help = "Include the commit log between two branches.",
        num_args = 2,
        value_names = ["FROM", "TO"],
        help_heading = "Git"
    )]
    pub git_log_branch: Option<Vec<String>>,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble a codebase into a single prompt for language models.",
    long_about = "codecontext walks a directory, selects files by glob patterns and ignore files, \nand renders a directory tree plus file contents (and optionally git diffs and logs) \nas Markdown, JSON or XML.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  codecontext \"Explain the parser\" -i '*.rs'\n  codecontext -i 'src/' -e '*.lock' -F json -O context.json\n  codecontext \"Review my changes\" -d --tokens format"
)]
pub struct Cli {
    #[arg(value_name = "PROMPT_TEXT", help = "Request appended to the generated context.")]
    pub prompt_text: Option<String>,

    #[command(flatten)]
    pub project_config: ProjectConfigOpts,

    #[command(flatten)]
    pub filters: FilterOpts,

    #[command(flatten)]
    pub render: RenderOpts,

    #[command(flatten)]
    pub output: OutputOpts,

    #[command(flatten)]
    pub git: GitOpts,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv, -vvv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn patterns_accept_commas_and_repeats() {
        let cli = Cli::parse_from([
            "codecontext",
            "-i",
            "*.rs,*.toml",
            "-i",
            "docs/",
            "-e",
            "target/",
        ]);
        assert_eq!(cli.filters.include, vec!["*.rs", "*.toml", "docs/"]);
        assert_eq!(cli.filters.exclude, vec!["target/"]);
        assert_eq!(cli.prompt_text, None);
    }

    #[test]
    fn branch_ranges_take_two_values() {
        let cli = Cli::parse_from([
            "codecontext",
            "why?",
            "--git-diff-branch",
            "main",
            "feature",
            "-vv",
        ]);
        assert_eq!(
            cli.git.git_diff_branch,
            Some(vec!["main".to_string(), "feature".to_string()])
        );
        assert_eq!(cli.prompt_text.as_deref(), Some("why?"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn config_flags_conflict() {
        let result = Cli::try_parse_from(["codecontext", "--config", "a.toml", "--no-config"]);
        assert!(result.is_err());
    }
}
