use crate::document::DocumentSection;

#[derive(Debug, Clone, PartialEq, Eq)]
enum VcsText {
    WorkingDiff(String),
    BranchDiff { from: String, to: String, text: String },
    BranchLog { from: String, to: String, text: String },
}

/// Pre-fetched version-control text. The engine never runs git itself; callers collect
/// the text and hand it over here, and it is passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsContext {
    items: Vec<VcsText>,
}

impl VcsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Uncommitted changes against the current revision.
    pub fn with_diff(mut self, text: impl Into<String>) -> Self {
        self.items.push(VcsText::WorkingDiff(text.into()));
        self
    }

    pub fn with_branch_diff(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.items.push(VcsText::BranchDiff {
            from: from.into(),
            to: to.into(),
            text: text.into(),
        });
        self
    }

    pub fn with_branch_log(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.items.push(VcsText::BranchLog {
            from: from.into(),
            to: to.into(),
            text: text.into(),
        });
        self
    }

    /// Diffs first, then logs, each in the order they were added.
    pub fn sections(&self) -> Vec<DocumentSection> {
        let diffs = self.items.iter().filter_map(|item| match item {
            VcsText::WorkingDiff(text) => Some(DocumentSection::VcsDiff {
                label: "Git Diff".to_string(),
                text: text.clone(),
            }),
            VcsText::BranchDiff { from, to, text } => Some(DocumentSection::VcsDiff {
                label: format!("Git Diff: {}..{}", from, to),
                text: text.clone(),
            }),
            VcsText::BranchLog { .. } => None,
        });
        let logs = self.items.iter().filter_map(|item| match item {
            VcsText::BranchLog { from, to, text } => Some(DocumentSection::VcsLog {
                label: format!("Git Log: {}..{}", from, to),
                text: text.clone(),
            }),
            _ => None,
        });
        diffs.chain(logs).collect()
    }
}
