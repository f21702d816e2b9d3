use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Task priority, lowest to highest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Low
    }
}

/// When completed tasks move from the active list to the archive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
pub enum AutoClean {
    #[serde(rename = "never")]
    #[strum(serialize = "never")]
    Never,

    #[serde(rename = "refresh")]
    #[strum(serialize = "refresh")]
    Refresh,

    #[serde(rename = "24h")]
    #[strum(serialize = "24h")]
    After24h,

    #[serde(rename = "instant")]
    #[strum(serialize = "instant")]
    Instant,
}

impl Default for AutoClean {
    fn default() -> Self {
        AutoClean::Never
    }
}

fn default_category() -> String {
    "None".to_string()
}

/// One unit of work. The `archived` flag alone decides whether the task
/// belongs to the active list or the archive.
///
/// The serde aliases accept the camelCase spellings older stored payloads
/// used, so records are normalized into this one shape at the persistence
/// boundary and consumers never check two spellings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "reminderTime", alias = "reminder_time")]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A task draft before the backend (or the local fallback) assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub user_id: Uuid,
    pub text: String,
    pub category: String,
    pub priority: Priority,
    pub completed: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_at: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Build a draft from user input, deriving priority from the text.
    /// A category detected in the text overrides the chosen one.
    pub fn compose(
        user_id: Uuid,
        text: &str,
        category: &str,
        reminder_at: Option<DateTime<Utc>>,
    ) -> Self {
        let category = detect_category(text).unwrap_or(category).to_string();
        NewTask {
            user_id,
            text: text.to_string(),
            category,
            priority: detect_priority(text),
            completed: false,
            archived: false,
            created_at: Utc::now(),
            completed_at: None,
            reminder_at,
        }
    }

    /// Promote the draft into a full record once an id exists.
    pub fn into_task(self, id: Uuid) -> Task {
        Task {
            id,
            user_id: self.user_id,
            text: self.text,
            category: self.category,
            priority: self.priority,
            completed: self.completed,
            archived: self.archived,
            created_at: self.created_at,
            completed_at: self.completed_at,
            reminder_at: self.reminder_at,
            updated_at: None,
        }
    }
}

const HIGH_PRIORITY_KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "deadline",
    "today",
    "immediately",
    "critical",
    "important",
    "exam",
    "test",
    "due",
];

const MEDIUM_PRIORITY_KEYWORDS: &[&str] = &[
    "tomorrow",
    "soon",
    "this week",
    "project",
    "meeting",
    "appointment",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Work",
        &["work", "office", "meeting", "project", "client", "deadline", "presentation"],
    ),
    (
        "Study",
        &["study", "exam", "test", "homework", "assignment", "class", "lecture"],
    ),
    (
        "Personal",
        &["personal", "family", "friend", "gym", "exercise", "shopping", "grocery"],
    ),
];

/// Guess a priority from the task text.
pub fn detect_priority(text: &str) -> Priority {
    let lower = text.to_lowercase();
    if HIGH_PRIORITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Priority::High
    } else if MEDIUM_PRIORITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Guess a category from the task text. First matching group wins.
pub fn detect_category(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(name, _)| *name)
}

fn default_theme() -> String {
    "space".to_string()
}

fn default_dark_mode() -> bool {
    true
}

/// Per-user preferences. Each field falls back to its default
/// independently, so partial or legacy payloads still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_dark_mode", alias = "darkMode")]
    pub dark_mode: bool,
    #[serde(default, alias = "autoClean")]
    pub auto_clean: AutoClean,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            theme: default_theme(),
            dark_mode: true,
            auto_clean: AutoClean::Never,
        }
    }
}

/// What changed on the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One push notification from the backend's change feed. Consumed once by
/// reconciliation, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Task>,
}

impl ChangeEvent {
    pub fn insert(task: Task) -> Self {
        ChangeEvent {
            kind: ChangeKind::Insert,
            new: Some(task),
            old: None,
        }
    }

    pub fn update(task: Task) -> Self {
        ChangeEvent {
            kind: ChangeKind::Update,
            new: Some(task),
            old: None,
        }
    }

    pub fn delete(old: Task) -> Self {
        ChangeEvent {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Id of the affected row, whichever side carries it.
    pub fn task_id(&self) -> Option<Uuid> {
        self.new.as_ref().or(self.old.as_ref()).map(|t| t.id)
    }

    /// Owner of the affected row, for the current-session guard.
    pub fn user_id(&self) -> Option<Uuid> {
        self.new.as_ref().or(self.old.as_ref()).map(|t| t.user_id)
    }
}

/// The authenticated (or local-only) account a session runs as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl SessionUser {
    /// Display name: the full name when one is known, else the local part
    /// of the email address.
    pub fn new(id: Uuid, email: impl Into<String>, full_name: Option<String>) -> Self {
        let email = email.into();
        let name = full_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|part| !part.is_empty())
                    .unwrap_or("User")
                    .to_string()
            });
        SessionUser { id, email, name }
    }
}
