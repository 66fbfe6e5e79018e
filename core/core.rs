pub mod config;
pub mod content;
pub mod document;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod options;
pub mod output_formats;
pub mod sorter;
pub mod template;
pub mod tokens;
pub mod tree;
pub mod vcs;
pub mod walker;

pub use config::Config;
pub use content::{FileBody, FileSection, SkipReason};
pub use document::{Document, DocumentSection};
pub use engine::{PromptEngine, PromptOutput};
pub use error::{AppError, EntryWarning, Result, WarningKind};
pub use matcher::PathMatcher;
pub use options::RenderOptions;
pub use output_formats::{OutputFormat, decode, format};
pub use sorter::SortKey;
pub use template::Template;
pub use tokens::{TokenFormat, Tokenizer};
pub use vcs::VcsContext;
pub use walker::{FileEntry, WalkOutcome};
