use crate::document;
use crate::downloader;
use crate::error::GroupError;
use crate::grouping::{self, GroupSet};
use crate::loader;
use serde::Serialize;

/// One user's list, size field, generated groups and last error
///
/// Mirrors what the page shows: the raw text is kept verbatim and reparsed
/// on every generate or shuffle, groups live until the next generation or
/// shuffle, and a single error slot holds the message to display. Any
/// successful action clears that slot.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    input: String,
    group_size: String,
    groups: GroupSet,
    error: Option<GroupError>,
}

/// Serializable snapshot of a workspace for the page
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkspaceView {
    pub input: String,
    pub item_count: usize,
    pub group_size: String,
    pub groups: Vec<Vec<String>>,
    pub error: Option<String>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn group_size(&self) -> &str {
        &self.group_size
    }

    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    pub fn error(&self) -> Option<&GroupError> {
        self.error.as_ref()
    }

    /// Replace the raw list text as typed
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Replace the group-size field as typed; it is validated on generate
    pub fn set_group_size(&mut self, field: impl Into<String>) {
        self.group_size = field.into();
    }

    /// Partition the current input into groups of the current size
    ///
    /// On failure the previous groups are kept.
    pub fn generate(&mut self) -> Result<&GroupSet, GroupError> {
        let result = grouping::group_text(&self.input, &self.group_size);
        let groups = self.record(result)?;
        log::info!(
            "generated {} groups from {} items",
            groups.len(),
            grouping::item_count(&self.input)
        );
        self.groups = groups;
        Ok(&self.groups)
    }

    /// Shuffle the listed items in place, one per line
    ///
    /// Generated groups no longer match the input afterwards and are dropped.
    pub fn shuffle(&mut self) -> Result<&str, GroupError> {
        let result = if self.input.trim().is_empty() {
            Err(GroupError::NothingToShuffle)
        } else {
            Ok(grouping::shuffle(&grouping::parse(&self.input)))
        };
        let shuffled = self.record(result)?;

        self.input = shuffled.to_text();
        self.groups = GroupSet::default();
        Ok(&self.input)
    }

    /// Replace the input with the content of an uploaded file
    ///
    /// Unsupported or unreadable files leave the input untouched.
    pub fn import(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<&str, GroupError> {
        let result = loader::import_bytes(file_name, bytes);
        self.apply_import(file_name, result)
    }

    /// Apply the outcome of an import that was parsed elsewhere
    pub fn apply_import(
        &mut self,
        file_name: &str,
        result: Result<String, GroupError>,
    ) -> Result<&str, GroupError> {
        if let Err(e) = &result {
            log::warn!("import of {} failed: {}", file_name, e.detail().unwrap_or("-"));
        }
        self.input = self.record(result)?;
        Ok(&self.input)
    }

    pub fn export_pdf(&mut self) -> Result<Vec<u8>, GroupError> {
        let result = document::to_pdf(&self.groups);
        self.record(result)
    }

    pub fn export_xlsx(&mut self) -> Result<Vec<u8>, GroupError> {
        let result = downloader::to_xlsx(&self.groups);
        self.record(result)
    }

    pub fn export_csv(&mut self) -> Result<String, GroupError> {
        let result = downloader::to_csv(&self.groups);
        self.record(result)
    }

    pub fn view(&self) -> WorkspaceView {
        WorkspaceView {
            input: self.input.clone(),
            item_count: grouping::item_count(&self.input),
            group_size: self.group_size.clone(),
            groups: self.groups.to_strings(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }

    fn record<T>(&mut self, result: Result<T, GroupError>) -> Result<T, GroupError> {
        match &result {
            Ok(_) => self.error = None,
            Err(e) => self.error = Some(e.clone()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(input: &str, size: &str) -> Workspace {
        let mut ws = Workspace::new();
        ws.set_input(input);
        ws.set_group_size(size);
        ws
    }

    #[test]
    fn generate_stores_groups() {
        let mut ws = workspace("A\nB\nC\nD\nE", "2");
        assert_eq!(ws.generate().unwrap().len(), 3);
        assert_eq!(
            ws.view().groups,
            vec![vec!["A", "B"], vec!["C", "D"], vec!["E"]]
        );
        assert_eq!(ws.view().item_count, 5);
    }

    #[test]
    fn failed_generate_keeps_previous_groups() {
        let mut ws = workspace("A,B,C,D", "2");
        ws.generate().unwrap();

        ws.set_group_size("0");
        assert_eq!(ws.generate(), Err(GroupError::InvalidGroupSize));
        assert_eq!(ws.groups().len(), 2);
        assert_eq!(
            ws.view().error.as_deref(),
            Some("Group size must be a positive integer")
        );
    }

    #[test]
    fn empty_input_is_reported_before_size() {
        let mut ws = workspace(" \n , ", "");
        assert_eq!(ws.generate(), Err(GroupError::EmptyInput));
    }

    #[test]
    fn success_clears_the_error() {
        let mut ws = workspace("A,B", "x");
        assert!(ws.generate().is_err());
        assert!(ws.error().is_some());

        ws.set_group_size("1");
        ws.generate().unwrap();
        assert!(ws.error().is_none());
    }

    #[test]
    fn shuffle_rewrites_input_and_clears_groups() {
        let mut ws = workspace("A, B, C\nD", "2");
        ws.generate().unwrap();

        let shuffled = ws.shuffle().unwrap().to_string();
        let mut lines: Vec<&str> = shuffled.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["A", "B", "C", "D"]);
        assert!(ws.groups().is_empty());
        assert_eq!(ws.input(), shuffled);
    }

    #[test]
    fn shuffle_of_blank_input_fails() {
        let mut ws = workspace("   \n", "2");
        assert_eq!(ws.shuffle(), Err(GroupError::NothingToShuffle));
        assert_eq!(ws.input(), "   \n");
    }

    #[test]
    fn unsupported_import_leaves_input_unchanged() {
        let mut ws = workspace("keep me", "2");
        let result = ws.import("slides.pdf", b"%PDF-1.4".to_vec());

        assert!(matches!(result, Err(GroupError::UnsupportedFormat(_))));
        assert_eq!(ws.input(), "keep me");
        assert_eq!(
            ws.view().error.as_deref(),
            Some("Unsupported file format. Please use .txt, .csv, .xlsx, or .xls")
        );
    }

    #[test]
    fn broken_spreadsheet_leaves_input_unchanged() {
        let mut ws = workspace("keep me", "2");
        let result = ws.import("class.xlsx", b"garbage".to_vec());
        assert!(matches!(result, Err(GroupError::ImportFailed(_))));
        assert_eq!(ws.input(), "keep me");
    }

    #[test]
    fn import_replaces_input() {
        let mut ws = workspace("old", "2");
        ws.import("new.txt", b"X\nY\nZ".to_vec()).unwrap();
        assert_eq!(ws.input(), "X\nY\nZ");
        assert_eq!(ws.view().item_count, 3);
    }

    #[test]
    fn export_requires_generated_groups() {
        let mut ws = workspace("A,B", "1");
        assert_eq!(ws.export_pdf(), Err(GroupError::NoGroupsToExport));
        assert_eq!(ws.export_xlsx(), Err(GroupError::NoGroupsToExport));
        assert_eq!(ws.export_csv(), Err(GroupError::NoGroupsToExport));

        ws.generate().unwrap();
        assert!(ws.export_pdf().unwrap().starts_with(b"%PDF"));
        assert!(ws.export_xlsx().unwrap().starts_with(b"PK"));
        assert_eq!(ws.export_csv().unwrap(), "Group 1,Group 2\nA,B\n");
    }

    #[test]
    fn export_after_shuffle_needs_a_new_generation() {
        let mut ws = workspace("A,B,C", "2");
        ws.generate().unwrap();
        ws.shuffle().unwrap();
        assert_eq!(ws.export_csv(), Err(GroupError::NoGroupsToExport));
    }
}
