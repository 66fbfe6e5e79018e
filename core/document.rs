use crate::content::{FileSection, fence};
use crate::template::{CLOSING_INSTRUCTIONS, Template};
use crate::vcs::VcsContext;
use log;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSection {
    DirectoryTree(String),
    File(FileSection),
    VcsDiff { label: String, text: String },
    VcsLog { label: String, text: String },
    UserRequest(String),
    Instructions(String),
}

impl DocumentSection {
    /// Placeholder name the section fills.
    pub fn name(&self) -> &'static str {
        match self {
            DocumentSection::DirectoryTree(_) => "tree",
            DocumentSection::File(_) => "files",
            DocumentSection::VcsDiff { .. } => "git_diff",
            DocumentSection::VcsLog { .. } => "git_log",
            DocumentSection::UserRequest(_) => "user_request",
            DocumentSection::Instructions(_) => "instructions",
        }
    }

    /// Human-readable identifier used in error messages.
    pub fn label(&self) -> String {
        match self {
            DocumentSection::DirectoryTree(_) => "directory tree".to_string(),
            DocumentSection::File(file) => format!("file '{}'", file.path),
            DocumentSection::VcsDiff { label, .. } | DocumentSection::VcsLog { label, .. } => {
                label.clone()
            }
            DocumentSection::UserRequest(_) => "user request".to_string(),
            DocumentSection::Instructions(_) => "instructions".to_string(),
        }
    }
}

/// The assembled, format-independent prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root_label: String,
    pub sections: Vec<DocumentSection>,
    layout: Template,
    code_fencing: bool,
}

impl Document {
    /// Builds the section list. Sections the layout never references are left out, so every
    /// output format carries the same content.
    pub fn compose(
        root_label: &str,
        tree: String,
        files: Vec<FileSection>,
        vcs: &VcsContext,
        user_request: Option<&str>,
        layout: &Template,
        code_fencing: bool,
    ) -> Self {
        let mut sections = Vec::with_capacity(files.len() + 4);
        if layout.references("tree") {
            sections.push(DocumentSection::DirectoryTree(tree));
        }
        if layout.references("files") {
            sections.extend(files.into_iter().map(DocumentSection::File));
        }
        sections.extend(
            vcs.sections()
                .into_iter()
                .filter(|section| layout.references(section.name())),
        );

        let request = user_request.map(str::trim).filter(|r| !r.is_empty());
        if let Some(request) = request {
            if layout.references("user_request") {
                sections.push(DocumentSection::UserRequest(request.to_string()));
            }
            if layout.references("instructions") {
                sections.push(DocumentSection::Instructions(CLOSING_INSTRUCTIONS.to_string()));
            }
        }
        log::debug!("Document composed with {} sections.", sections.len());

        Self {
            root_label: root_label.to_string(),
            sections,
            layout: layout.clone(),
            code_fencing,
        }
    }

    /// Reassembles a document from decoded sections, laid out with the default template.
    pub fn from_sections(root_label: &str, sections: Vec<DocumentSection>) -> Self {
        Self {
            root_label: root_label.to_string(),
            sections,
            layout: Template::default(),
            code_fencing: true,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &FileSection> {
        self.sections.iter().filter_map(|section| match section {
            DocumentSection::File(file) => Some(file),
            _ => None,
        })
    }

    pub fn layout(&self) -> &Template {
        &self.layout
    }

    /// Markdown text for each placeholder, ready to hand to the layout.
    pub fn layout_values(&self) -> HashMap<&'static str, String> {
        let mut values: HashMap<&'static str, String> = HashMap::new();
        values.insert("root", self.root_label.clone());
        for section in &self.sections {
            let rendered = match section {
                DocumentSection::DirectoryTree(tree) => tree.clone(),
                DocumentSection::File(file) => file.to_markdown(self.code_fencing),
                DocumentSection::VcsDiff { label, text } => {
                    self.vcs_block(label, text, Some("diff"))
                }
                DocumentSection::VcsLog { label, text } => self.vcs_block(label, text, None),
                DocumentSection::UserRequest(text) | DocumentSection::Instructions(text) => {
                    text.clone()
                }
            };
            values.entry(section.name()).or_default().push_str(&rendered);
        }
        values
    }

    fn vcs_block(&self, label: &str, text: &str, language: Option<&str>) -> String {
        let body = if self.code_fencing {
            fence(text, language)
        } else if text.ends_with('\n') || text.is_empty() {
            text.to_string()
        } else {
            format!("{}\n", text)
        };
        format!("## {}\n\n{}\n", label, body)
    }
}
