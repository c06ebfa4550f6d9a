//! Shared types for taskscope-core.
//!
//! Workshop, file and task records travel over the wire in camelCase so the
//! browser client can consume them without renaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Maximum number of domain labels a workshop may declare
pub const MAX_DOMAINS: usize = 10;

/// Category used when a workshop declares no domain labels at all
pub const FALLBACK_CATEGORY: &str = "other";

// ─────────────────────────────────────────────────────────────────────────────
// Workshop
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a workshop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkshopStatus {
    DomainDefined,
    FilesUploaded,
    Analyzing,
    Analyzed,
    ToolsGenerated,
    Completed,
    Error,
}

impl WorkshopStatus {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "domain_defined" => Some(Self::DomainDefined),
            "files_uploaded" => Some(Self::FilesUploaded),
            "analyzing" => Some(Self::Analyzing),
            "analyzed" => Some(Self::Analyzed),
            "tools_generated" => Some(Self::ToolsGenerated),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainDefined => "domain_defined",
            Self::FilesUploaded => "files_uploaded",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::ToolsGenerated => "tools_generated",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether files may be attached in this state
    pub fn accepts_files(&self) -> bool {
        matches!(self, Self::DomainDefined | Self::FilesUploaded | Self::Error)
    }

    /// Whether an analysis run may start from this state
    pub fn can_start_analysis(&self) -> bool {
        matches!(self, Self::FilesUploaded | Self::Analyzed | Self::Error)
    }

    /// Allowed transitions. Forward-only, except that `error` is reachable from
    /// any non-terminal state and a finished run may be analyzed again.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use WorkshopStatus::*;
        if next == Error {
            return !self.is_terminal();
        }
        match self {
            DomainDefined => matches!(next, FilesUploaded),
            FilesUploaded => matches!(next, FilesUploaded | Analyzing),
            Analyzing => matches!(next, Analyzed),
            Analyzed => matches!(next, Analyzing | ToolsGenerated | Completed),
            ToolsGenerated => matches!(next, Completed),
            Completed => false,
            Error => matches!(next, FilesUploaded | Analyzing),
        }
    }
}

impl std::fmt::Display for WorkshopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One analysis run over a set of uploaded documents and domain labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workshop {
    pub id: String,
    pub name: String,
    pub domains: Vec<String>,
    pub participant_count: u32,
    pub status: WorkshopStatus,
    pub file_ids: Vec<String>,
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Workshop {
    /// Move to `next`, touching `updated_at`. Rejects transitions the
    /// lifecycle doesn't allow.
    pub fn transition(&mut self, next: WorkshopStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::transition(self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Input for creating a workshop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkshop {
    pub name: String,
    pub domains: Vec<String>,
    #[serde(default)]
    pub participant_count: Option<u32>,
}

/// Trim, drop blanks and duplicates, and enforce 1..=MAX_DOMAINS labels.
pub fn normalize_domains(domains: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(domains.len());
    for d in domains {
        let d = d.trim();
        if d.is_empty() {
            continue;
        }
        if out.iter().any(|existing| existing == d) {
            continue;
        }
        out.push(d.to_string());
    }
    if out.is_empty() {
        return Err(Error::Config("at least one domain label is required".into()));
    }
    if out.len() > MAX_DOMAINS {
        return Err(Error::Config(format!(
            "at most {} domain labels are allowed, got {}",
            MAX_DOMAINS,
            out.len()
        )));
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Files
// ─────────────────────────────────────────────────────────────────────────────

/// Processing status of an uploaded file. Never regresses; `error` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Parsed,
    Analyzed,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Parsed => "parsed",
            Self::Analyzed => "analyzed",
            Self::Error => "error",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Uploaded => 0,
            Self::Parsed => 1,
            Self::Analyzed => 2,
            Self::Error => 3,
        }
    }

    /// The status after attempting to move to `next`. Backward moves and
    /// moves out of `error` are ignored.
    pub fn advance(self, next: Self) -> Self {
        if self == Self::Error || next.rank() <= self.rank() {
            self
        } else {
            next
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A document uploaded into a workshop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopFile {
    pub id: String,
    pub workshop_id: String,
    pub original_name: String,
    #[serde(skip_serializing)]
    pub stored_path: PathBuf,
    pub media_type: String,
    pub size: u64,
    pub status: FileStatus,
    pub uploaded_at: DateTime<Utc>,
    /// Extracted text. Held only while a run is in progress.
    #[serde(skip)]
    pub content: Option<String>,
}

impl WorkshopFile {
    pub fn set_status(&mut self, next: FileStatus) {
        self.status = self.status.advance(next);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

/// How often a task recurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl TaskFrequency {
    /// Case-insensitive parse
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for TaskFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Automation potential of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationLevel {
    High,
    Medium,
    Low,
}

impl AutomationLevel {
    /// Case-insensitive parse
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for AutomationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated task as produced by the analysis engine, before it is bound to
/// a workshop and source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    /// Hours per occurrence, always > 0
    pub time_spent: f64,
    pub frequency: TaskFrequency,
    pub automation: AutomationLevel,
    pub automation_method: String,
    pub category: String,
}

impl TaskDraft {
    /// Bind the draft to its workshop and source file
    pub fn into_task(self, workshop_id: &str, file: &WorkshopFile) -> Task {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: self.title,
            description: self.description,
            time_spent: self.time_spent,
            frequency: self.frequency,
            automation: self.automation,
            automation_method: self.automation_method,
            category: self.category,
            source_file_id: file.id.clone(),
            source_filename: file.original_name.clone(),
            workshop_id: workshop_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// One inferred unit of repeatable work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub time_spent: f64,
    pub frequency: TaskFrequency,
    pub automation: AutomationLevel,
    pub automation_method: String,
    pub category: String,
    pub source_file_id: String,
    pub source_filename: String,
    pub workshop_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workshop_status_transitions() {
        use WorkshopStatus::*;
        assert!(DomainDefined.can_transition_to(FilesUploaded));
        assert!(!DomainDefined.can_transition_to(Analyzing));
        assert!(FilesUploaded.can_transition_to(Analyzing));
        assert!(Analyzed.can_transition_to(Analyzing));
        assert!(Analyzing.can_transition_to(Error));
        assert!(!Analyzed.can_transition_to(FilesUploaded));
        assert!(!Completed.can_transition_to(Error));
        assert!(!Completed.can_transition_to(Analyzing));
    }

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            WorkshopStatus::DomainDefined,
            WorkshopStatus::ToolsGenerated,
            WorkshopStatus::Error,
        ] {
            assert_eq!(WorkshopStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(WorkshopStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_file_status_never_regresses() {
        assert_eq!(FileStatus::Uploaded.advance(FileStatus::Parsed), FileStatus::Parsed);
        assert_eq!(FileStatus::Analyzed.advance(FileStatus::Parsed), FileStatus::Analyzed);
        assert_eq!(FileStatus::Parsed.advance(FileStatus::Error), FileStatus::Error);
        assert_eq!(FileStatus::Error.advance(FileStatus::Analyzed), FileStatus::Error);
    }

    #[test]
    fn test_normalize_domains() {
        let domains = vec![
            " Sales ".to_string(),
            "".to_string(),
            "Finance".to_string(),
            "Sales".to_string(),
        ];
        assert_eq!(normalize_domains(&domains).unwrap(), vec!["Sales", "Finance"]);

        assert!(normalize_domains(&["  ".to_string()]).is_err());
        let too_many: Vec<String> = (0..11).map(|i| format!("d{i}")).collect();
        assert!(normalize_domains(&too_many).is_err());
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!(TaskFrequency::from_str("Weekly"), Some(TaskFrequency::Weekly));
        assert_eq!(AutomationLevel::from_str(" HIGH "), Some(AutomationLevel::High));
        assert_eq!(TaskFrequency::from_str("yearly"), None);
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task {
            id: "t1".into(),
            title: "Weekly report".into(),
            description: "Compile numbers".into(),
            time_spent: 0.5,
            frequency: TaskFrequency::Weekly,
            automation: AutomationLevel::High,
            automation_method: "Script".into(),
            category: "Sales".into(),
            source_file_id: "f1".into(),
            source_filename: "notes.txt".into(),
            workshop_id: "w1".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["timeSpent"], 0.5);
        assert_eq!(json["frequency"], "weekly");
        assert_eq!(json["automation"], "high");
        assert_eq!(json["sourceFilename"], "notes.txt");
    }
}
