use crate::content::{FileBody, FileSection, SkipReason};
use crate::document::{Document, DocumentSection};
use crate::error::{AppError, Result};
use log;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const XML_ROOT: &str = "prompt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
    Xml,
}

impl OutputFormat {
    fn name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "Markdown",
            OutputFormat::Json => "JSON",
            OutputFormat::Xml => "XML",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(AppError::Config(format!(
                "Unknown output format '{}'. Expected markdown, json or xml",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilePayload {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VcsPayload {
    pub label: String,
    pub content: String,
}

/// Structured form of a document shared by the JSON and XML encodings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_tree: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FilePayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub git_diff: Vec<VcsPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub git_log: Vec<VcsPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// XML needs a named element per list item.
#[derive(Debug, Serialize)]
struct XmlFiles {
    file: Vec<FilePayload>,
}

#[derive(Debug, Serialize)]
struct XmlVcs {
    entry: Vec<VcsPayload>,
}

#[derive(Debug, Serialize)]
struct XmlPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    directory_tree: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<XmlFiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_diff: Option<XmlVcs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_log: Option<XmlVcs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
}

impl From<DocumentPayload> for XmlPayload {
    fn from(payload: DocumentPayload) -> Self {
        Self {
            directory_tree: payload.directory_tree,
            files: (!payload.files.is_empty()).then_some(XmlFiles {
                file: payload.files,
            }),
            git_diff: (!payload.git_diff.is_empty()).then_some(XmlVcs {
                entry: payload.git_diff,
            }),
            git_log: (!payload.git_log.is_empty()).then_some(XmlVcs {
                entry: payload.git_log,
            }),
            user_request: payload.user_request,
            instructions: payload.instructions,
        }
    }
}

impl From<&FileSection> for FilePayload {
    fn from(file: &FileSection) -> Self {
        let (content, skipped, size_bytes) = match &file.body {
            FileBody::Text(text) => (Some(text.clone()), None, None),
            FileBody::Skipped { reason, size_bytes } => {
                (None, Some(reason.as_str().to_string()), Some(*size_bytes))
            }
        };
        Self {
            path: file.path.clone(),
            language: file.language.clone(),
            content,
            skipped,
            size_bytes,
        }
    }
}

impl DocumentPayload {
    pub fn from_sections(sections: &[DocumentSection]) -> Self {
        let mut payload = Self::default();
        for section in sections {
            match section {
                DocumentSection::DirectoryTree(tree) => payload.directory_tree = Some(tree.clone()),
                DocumentSection::File(file) => payload.files.push(FilePayload::from(file)),
                DocumentSection::VcsDiff { label, text } => payload.git_diff.push(VcsPayload {
                    label: label.clone(),
                    content: text.clone(),
                }),
                DocumentSection::VcsLog { label, text } => payload.git_log.push(VcsPayload {
                    label: label.clone(),
                    content: text.clone(),
                }),
                DocumentSection::UserRequest(text) => payload.user_request = Some(text.clone()),
                DocumentSection::Instructions(text) => payload.instructions = Some(text.clone()),
            }
        }
        payload
    }

    fn texts(&self) -> Vec<&str> {
        let mut texts: Vec<&str> = Vec::new();
        texts.extend(self.directory_tree.as_deref());
        for file in &self.files {
            texts.push(&file.path);
            texts.extend(file.language.as_deref());
            texts.extend(file.content.as_deref());
            texts.extend(file.skipped.as_deref());
        }
        for entry in self.git_diff.iter().chain(&self.git_log) {
            texts.push(&entry.label);
            texts.push(&entry.content);
        }
        texts.extend(self.user_request.as_deref());
        texts.extend(self.instructions.as_deref());
        texts
    }

    /// Sections in canonical document order.
    pub fn into_sections(self) -> Result<Vec<DocumentSection>> {
        let mut sections = Vec::new();
        if let Some(tree) = self.directory_tree {
            sections.push(DocumentSection::DirectoryTree(tree));
        }
        for file in self.files {
            let body = match (file.skipped, file.content) {
                (Some(reason), _) => {
                    let reason = SkipReason::from_name(&reason).ok_or_else(|| AppError::Format {
                        format: "decode",
                        section: format!("file '{}'", file.path),
                        message: format!("unknown skip reason '{}'", reason),
                    })?;
                    FileBody::Skipped {
                        reason,
                        size_bytes: file.size_bytes.unwrap_or(0),
                    }
                }
                (None, content) => FileBody::Text(content.unwrap_or_default()),
            };
            sections.push(DocumentSection::File(FileSection {
                path: file.path,
                language: file.language,
                body,
            }));
        }
        sections.extend(self.git_diff.into_iter().map(|v| DocumentSection::VcsDiff {
            label: v.label,
            text: v.content,
        }));
        sections.extend(self.git_log.into_iter().map(|v| DocumentSection::VcsLog {
            label: v.label,
            text: v.content,
        }));
        if let Some(text) = self.user_request {
            sections.push(DocumentSection::UserRequest(text));
        }
        if let Some(text) = self.instructions {
            sections.push(DocumentSection::Instructions(text));
        }
        Ok(sections)
    }
}

/// Serializes the document. Failures name the first section that cannot be encoded.
pub fn format(document: &Document, output_format: OutputFormat) -> Result<String> {
    log::debug!(
        "Formatting {} sections as {}",
        document.sections.len(),
        output_format
    );
    match output_format {
        OutputFormat::Markdown => Ok(document.layout().render(&document.layout_values())),
        OutputFormat::Json => {
            encode(document, output_format, |payload| {
                serde_json::to_string_pretty(payload).map_err(|e| e.to_string())
            })
        }
        OutputFormat::Xml => encode(document, output_format, |payload| {
            if let Some(c) = payload.texts().into_iter().find_map(first_non_xml_char) {
                return Err(format!("character U+{:04X} cannot be represented in XML 1.0", c as u32));
            }
            quick_xml::se::to_string_with_root(XML_ROOT, &XmlPayload::from(payload.clone()))
                .map_err(|e| e.to_string())
        }),
    }
}

fn encode<F>(document: &Document, output_format: OutputFormat, serialize: F) -> Result<String>
where
    F: Fn(&DocumentPayload) -> std::result::Result<String, String>,
{
    let payload = DocumentPayload::from_sections(&document.sections);
    serialize(&payload).map_err(|message| {
        let section = document
            .sections
            .iter()
            .find(|s| {
                serialize(&DocumentPayload::from_sections(std::slice::from_ref(*s))).is_err()
            })
            .map(DocumentSection::label)
            .unwrap_or_else(|| "document".to_string());
        log::error!("{} serialization failed in {}: {}", output_format, section, message);
        AppError::Format {
            format: output_format.name(),
            section,
            message,
        }
    })
}

fn first_non_xml_char(text: &str) -> Option<char> {
    text.chars().find(|&c| {
        !matches!(
            c,
            '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..
        )
    })
}

/// Parses JSON or XML output back into sections.
///
/// Markdown is free-form once a layout is applied and is not parsed back.
pub fn decode(text: &str, output_format: OutputFormat) -> Result<Vec<DocumentSection>> {
    let payload: DocumentPayload = match output_format {
        OutputFormat::Json => serde_json::from_str(text).map_err(|e| AppError::Format {
            format: "JSON",
            section: "document".to_string(),
            message: e.to_string(),
        })?,
        OutputFormat::Xml => decode_xml(text)?,
        OutputFormat::Markdown => {
            return Err(AppError::Format {
                format: "Markdown",
                section: "document".to_string(),
                message: "markdown output cannot be decoded".to_string(),
            });
        }
    };
    payload.into_sections()
}

fn xml_error(message: impl fmt::Display) -> AppError {
    AppError::Format {
        format: "XML",
        section: "document".to_string(),
        message: message.to_string(),
    }
}

/// Event-driven reader for the `<prompt>` layout. Text is taken verbatim, so leading and
/// trailing whitespace of file bodies and diffs survives.
fn decode_xml(text: &str) -> Result<DocumentPayload> {
    let mut reader = Reader::from_str(text);
    let mut payload = DocumentPayload::default();
    let mut open: Vec<String> = Vec::new();
    let mut buffer = String::new();
    let mut file = FilePayload::default();
    let mut entry = VcsPayload::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error(format!("at byte {}: {}", reader.error_position(), e)))?;
        let (name, closes) = match event {
            Event::Eof => break,
            Event::Start(e) => (String::from_utf8_lossy(e.name().as_ref()).into_owned(), false),
            Event::Empty(e) => (String::from_utf8_lossy(e.name().as_ref()).into_owned(), true),
            Event::Text(e) => {
                buffer.push_str(&e.unescape().map_err(xml_error)?);
                continue;
            }
            Event::CData(e) => {
                buffer.push_str(&e.decode().map_err(xml_error)?);
                continue;
            }
            Event::End(_) => {
                let name = open.pop().ok_or_else(|| xml_error("unexpected closing tag"))?;
                let value = std::mem::take(&mut buffer);
                close_element(&mut payload, &mut file, &mut entry, open.last(), &name, value)?;
                continue;
            }
            _ => continue,
        };

        if open.is_empty() && name != XML_ROOT {
            return Err(xml_error(format!("expected <{}> root, found <{}>", XML_ROOT, name)));
        }
        buffer.clear();
        if closes {
            close_element(&mut payload, &mut file, &mut entry, open.last(), &name, String::new())?;
        } else {
            open.push(name);
        }
    }
    if let Some(name) = open.last() {
        return Err(xml_error(format!("unclosed element <{}>", name)));
    }
    Ok(payload)
}

fn close_element(
    payload: &mut DocumentPayload,
    file: &mut FilePayload,
    entry: &mut VcsPayload,
    parent: Option<&String>,
    name: &str,
    value: String,
) -> Result<()> {
    match (parent.map(String::as_str), name) {
        (Some(XML_ROOT), "directory_tree") => payload.directory_tree = Some(value),
        (Some(XML_ROOT), "user_request") => payload.user_request = Some(value),
        (Some(XML_ROOT), "instructions") => payload.instructions = Some(value),
        (Some("files"), "file") => payload.files.push(std::mem::take(file)),
        (Some("file"), "path") => file.path = value,
        (Some("file"), "language") => file.language = Some(value),
        (Some("file"), "content") => file.content = Some(value),
        (Some("file"), "skipped") => file.skipped = Some(value),
        (Some("file"), "size_bytes") => {
            let size = value
                .trim()
                .parse::<u64>()
                .map_err(|e| xml_error(format!("size_bytes of '{}': {}", file.path, e)))?;
            file.size_bytes = Some(size);
        }
        (Some("git_diff"), "entry") => payload.git_diff.push(std::mem::take(entry)),
        (Some("git_log"), "entry") => payload.git_log.push(std::mem::take(entry)),
        (Some("entry"), "label") => entry.label = value,
        (Some("entry"), "content") => entry.content = value,
        _ => {}
    }
    Ok(())
}
