use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Report lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Fixed,
    Rejected,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Pending,
        ReportStatus::InProgress,
        ReportStatus::Fixed,
        ReportStatus::Rejected,
    ];

    /// Wire spelling, also used as the cache key component
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Fixed => "Fixed",
            ReportStatus::Rejected => "Rejected",
        }
    }

    /// Case-insensitive lookup by wire spelling
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of civic issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueType {
    Pothole,
    Garbage,
    Streetlight,
    #[serde(rename = "Water Leakage")]
    WaterLeakage,
    Drainage,
    Other,
}

impl IssueType {
    pub const ALL: [IssueType; 6] = [
        IssueType::Pothole,
        IssueType::Garbage,
        IssueType::Streetlight,
        IssueType::WaterLeakage,
        IssueType::Drainage,
        IssueType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Pothole => "Pothole",
            IssueType::Garbage => "Garbage",
            IssueType::Streetlight => "Streetlight",
            IssueType::WaterLeakage => "Water Leakage",
            IssueType::Drainage => "Drainage",
            IssueType::Other => "Other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|issue| issue.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WGS84 point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct GeoPoint {
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
}

/// Report entity - a location-tagged civic issue submitted by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issue_type: IssueType,
    pub location: GeoPoint,
    pub address: String,
    pub description: String,
    pub images: Vec<String>,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment entity - a comment on a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub report_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upvote entity - unique per (user, report)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upvote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub report_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Report plus requester-scoped engagement aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedReport {
    #[serde(flatten)]
    pub report: Report,
    pub upvote_count: i64,
    pub comment_count: i64,
    pub has_upvoted: bool,
}

/// Admin dashboard statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub total: i64,
    pub pending: i64,
    pub fixed: i64,
    /// Mean days from creation to the last update of Fixed reports, one decimal
    pub avg_resolution: f64,
    pub by_type: BTreeMap<IssueType, i64>,
    pub generated_at: DateTime<Utc>,
}

/// Input for a new report
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub issue_type: IssueType,
    #[validate(nested)]
    pub location: GeoPoint,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(length(max = 5))]
    #[serde(default)]
    pub images: Vec<String>,
}

/// Owner edits; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportUpdate {
    pub issue_type: Option<IssueType>,
    #[validate(nested)]
    pub location: Option<GeoPoint>,
    #[validate(length(min = 1, max = 200))]
    pub address: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 5))]
    pub images: Option<Vec<String>>,
}

/// Comment text input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 300))]
    pub text: String,
}

/// Result of an upvote toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteToggle {
    pub upvoted: bool,
    pub upvote_count: i64,
}
