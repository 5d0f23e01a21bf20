use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub user_id: String,
    pub url: String,
    pub name: String,
    pub active: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeed {
    pub user_id: String,
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub user_id: String,
    /// Stored lowercase; matching is case-insensitive.
    pub word: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub summary: String,
    pub category: String,
    pub matched_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub user_id: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub summary: String,
    pub category: String,
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => ExecutionStatus::Completed,
            "error" => ExecutionStatus::Error,
            _ => ExecutionStatus::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionLog {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub articles_found: i64,
    pub articles_saved: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailStatus {
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "failed" => EmailStatus::Failed,
            _ => EmailStatus::Sent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailHistory {
    pub id: i64,
    pub user_id: String,
    pub recipient: String,
    pub subject: String,
    pub articles_count: i64,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmailHistory {
    pub user_id: String,
    pub recipient: String,
    pub subject: String,
    pub articles_count: i64,
    pub status: EmailStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailFormat {
    Html,
    Text,
}

impl EmailFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailFormat::Html => "html",
            EmailFormat::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "text" => EmailFormat::Text,
            _ => EmailFormat::Html,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    pub email_enabled: bool,
    pub email_address: String,
    pub max_articles_per_email: i64,
    pub subject_template: String,
    pub format: EmailFormat,
}

impl UserSettings {
    pub fn for_user(user_id: &str, email_address: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email_enabled: true,
            email_address: email_address.to_string(),
            max_articles_per_email: 20,
            subject_template: "RSS News Daily Digest - {date}".to_string(),
            format: EmailFormat::Html,
        }
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub articles_found: i64,
    pub articles_saved: i64,
    pub log_id: i64,
}
