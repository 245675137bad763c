//! System prompt assembly for chat turns

use serde::{Deserialize, Serialize};

use crate::store::StagedFileSummary;

pub const VISUALIZATION_INSTRUCTIONS: &str = "
You can generate Python visualization code for data analysis tasks.
When appropriate, provide matplotlib, seaborn, or plotly code that visualizes data effectively.
Always use proper titles, labels, and formatting for clarity.
";

pub const ANALYSIS_REQUEST: &str = "Please analyze this data and provide insights.";

/// File description carried into the prompt, either from the `x-file-data`
/// header or from the forwarding station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptFile {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<&StagedFileSummary> for PromptFile {
    fn from(staged: &StagedFileSummary) -> Self {
        Self {
            name: staged.name.clone(),
            mime_type: staged.mime_type.clone(),
            preview: staged.preview.clone(),
            summary: staged.summary.clone(),
        }
    }
}

/// Base text, then the visualization block, then the file block.
/// Plain concatenation: nothing is deduplicated or capped.
pub fn compose(base: &str, visualization_enabled: bool, file: Option<&PromptFile>) -> String {
    let mut system = base.to_string();

    if visualization_enabled {
        system.push_str(VISUALIZATION_INSTRUCTIONS);
    }

    if let Some(file) = file {
        system.push_str(&file_block(file));
    }

    system
}

fn file_block(file: &PromptFile) -> String {
    let mut block = format!("\nThe user has uploaded a file: {} ({})\n", file.name, file.mime_type);
    if let Some(preview) = file.preview.as_deref().filter(|p| !p.is_empty()) {
        block.push_str(&format!("Preview of the content: {}\n", preview));
    }
    if let Some(summary) = file.summary.as_deref().filter(|s| !s.is_empty()) {
        block.push_str(&format!("Summary: {}\n", summary));
    }
    block.push('\n');
    block.push_str(ANALYSIS_REQUEST);
    block.push('\n');
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PromptFile {
        PromptFile {
            name: "sales.csv".to_string(),
            mime_type: "text/csv".to_string(),
            preview: Some("region,total\nnorth,10".to_string()),
            summary: Some("CSV file with 2 rows, 2 columns".to_string()),
        }
    }

    #[test]
    fn test_base_only() {
        assert_eq!(compose("BASE", false, None), "BASE");
        assert_eq!(compose("", false, None), "");
    }

    #[test]
    fn test_visualization_block_appended_once() {
        let plain = compose("BASE", true, None);
        assert_eq!(plain, format!("BASE{}", VISUALIZATION_INSTRUCTIONS));

        let with_file = compose("BASE", true, Some(&report()));
        assert_eq!(with_file.matches(VISUALIZATION_INSTRUCTIONS).count(), 1);
        assert_eq!(with_file.matches("matplotlib").count(), 1);
    }

    #[test]
    fn test_file_block_follows_visualization_block() {
        let prompt = compose("BASE", true, Some(&report()));
        let viz_at = prompt.find("matplotlib").unwrap();
        let file_at = prompt.find("The user has uploaded a file: sales.csv (text/csv)").unwrap();
        assert!(prompt.starts_with("BASE"));
        assert!(viz_at < file_at);
        assert_eq!(prompt.matches("The user has uploaded a file").count(), 1);
        assert!(prompt.contains("Preview of the content: region,total\nnorth,10"));
        assert!(prompt.contains("Summary: CSV file with 2 rows, 2 columns"));
        assert!(prompt.trim_end().ends_with(ANALYSIS_REQUEST));
    }

    #[test]
    fn test_file_block_skips_missing_fields() {
        let bare = PromptFile {
            name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
            preview: None,
            summary: None,
        };
        let prompt = compose("BASE", false, Some(&bare));
        assert!(!prompt.contains("Preview of the content"));
        assert!(!prompt.contains("Summary:"));
        assert!(prompt.contains(ANALYSIS_REQUEST));
    }

    #[test]
    fn test_prompt_file_from_header_json() {
        let parsed: PromptFile =
            serde_json::from_str(r#"{"name":"a.txt","type":"text/plain","summary":"s"}"#).unwrap();
        assert_eq!(parsed.mime_type, "text/plain");
        assert_eq!(parsed.preview, None);
        assert_eq!(parsed.summary.as_deref(), Some("s"));
    }
}
