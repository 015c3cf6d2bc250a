//! Wire types for the reminders API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;
use crate::time::parse_instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Scheduled,
    Completed,
    Failed,
}

impl ReminderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Completed => "completed",
            ReminderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted reminder as returned by the API. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_phone_number: Option<String>,
    /// Raw wire value; parsed on demand so one bad row can't fail a page.
    pub scheduled_time_utc: String,
    #[serde(default = "utc_name")]
    pub timezone: String,
    pub status: ReminderStatus,
    #[serde(default)]
    pub time_remaining_seconds: f64,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn utc_name() -> String {
    "UTC".to_string()
}

impl ReminderRecord {
    pub fn scheduled_instant(&self) -> Result<DateTime<Utc>, ConvertError> {
        parse_instant(&self.scheduled_time_utc)
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == ReminderStatus::Scheduled
    }
}

/// One page of `GET /reminders/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPage {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub items: Vec<ReminderRecord>,
}

/// Body of `POST /reminders/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReminder {
    pub title: String,
    pub message: String,
    pub phone_number: String,
    pub scheduled_time_utc: String,
    pub timezone: String,
}

/// Body of `PATCH /reminders/{id}`; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReminder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl UpdateReminder {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    #[default]
    All,
    Scheduled,
    Completed,
    Failed,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 4] = [
        StatusFilter::All,
        StatusFilter::Scheduled,
        StatusFilter::Completed,
        StatusFilter::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Scheduled => "scheduled",
            StatusFilter::Completed => "completed",
            StatusFilter::Failed => "failed",
        }
    }

    pub fn matches(self, status: ReminderStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Scheduled => status == ReminderStatus::Scheduled,
            StatusFilter::Completed => status == ReminderStatus::Completed,
            StatusFilter::Failed => status == ReminderStatus::Failed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status filter: {s} (all|scheduled|completed|failed)"))
    }
}

/// Sort by scheduled time. Absent means "server default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(SortOrder::Ascending),
            "descending" | "desc" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order: {other} (ascending|descending)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub status: StatusFilter,
    pub page: u32,
    pub per_page: u32,
    pub sort: Option<SortOrder>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            status: StatusFilter::All,
            page: 1,
            per_page: 25,
            sort: None,
        }
    }
}

impl ListQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("status", self.status.as_str().to_string()),
            ("page", self.page.max(1).to_string()),
            ("per_page", self.per_page.max(1).to_string()),
        ];
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        pairs
    }
}
