use crate::error::AppError;
use crate::walker::FileEntry;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    NameAsc,
    NameDesc,
    DateAsc,
    DateDesc,
}

impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name_asc" => Ok(SortKey::NameAsc),
            "name_desc" => Ok(SortKey::NameDesc),
            "date_asc" => Ok(SortKey::DateAsc),
            "date_desc" => Ok(SortKey::DateDesc),
            other => Err(AppError::Config(format!(
                "Unknown sort order '{}'. Expected one of: name_asc, name_desc, date_asc, date_desc",
                other
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::NameAsc => "name_asc",
            SortKey::NameDesc => "name_desc",
            SortKey::DateAsc => "date_asc",
            SortKey::DateDesc => "date_desc",
        };
        f.write_str(name)
    }
}

/// Returns the selected files in render order. Directories and unselected entries are dropped.
///
/// Names compare byte-wise on the `/`-joined relative path. Date orders fall back to
/// ascending name on equal (or unknown) modification times.
pub fn order<'a>(entries: impl IntoIterator<Item = &'a FileEntry>, key: SortKey) -> Vec<&'a FileEntry> {
    let mut files: Vec<(String, &FileEntry)> = entries
        .into_iter()
        .filter(|e| e.selected && !e.is_dir)
        .map(|e| (e.display_path(), e))
        .collect();

    files.sort_by(|(a_name, a), (b_name, b)| match key {
        SortKey::NameAsc => a_name.cmp(b_name),
        SortKey::NameDesc => b_name.cmp(a_name),
        SortKey::DateAsc => a
            .modified_time
            .cmp(&b.modified_time)
            .then_with(|| a_name.cmp(b_name)),
        SortKey::DateDesc => match b.modified_time.cmp(&a.modified_time) {
            Ordering::Equal => a_name.cmp(b_name),
            other => other,
        },
    });
    log::debug!("Ordered {} files by {}", files.len(), key);
    files.into_iter().map(|(_, e)| e).collect()
}
