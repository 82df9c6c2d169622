use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub skills: String, // raw comma-separated text
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub remote: bool,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>, // no min <= max invariant
    pub currency: String,
    pub skills: String, // raw comma-separated text
    pub description: String,
    pub posted_by_id: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when posting a job; defaults are applied on insert.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub currency: Option<String>,
    pub skills: Option<String>,
    pub description: String,
}

impl NewJob {
    pub const DEFAULT_LOCATION: &'static str = "Remote";
    pub const DEFAULT_CURRENCY: &'static str = "USD";
}

/// A listing annotated with its relevance score. Only produced by the ranker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedJobListing {
    #[serde(flatten)]
    pub job: JobListing,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub tags: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    Like,
    Insight,
    Question,
    HireMe,
    Refer,
}

impl FeedbackType {
    pub const ALL: [FeedbackType; 5] = [
        FeedbackType::Like,
        FeedbackType::Insight,
        FeedbackType::Question,
        FeedbackType::HireMe,
        FeedbackType::Refer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Like => "LIKE",
            FeedbackType::Insight => "INSIGHT",
            FeedbackType::Question => "QUESTION",
            FeedbackType::HireMe => "HIRE_ME",
            FeedbackType::Refer => "REFER",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for FeedbackType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    #[serde(rename = "type")]
    pub kind: FeedbackType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: AuthorRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStatus {
    #[default]
    Pending,
    Reviewing,
    Accepted,
    Rejected,
}

impl AppStatus {
    pub const ALL: [AppStatus; 4] = [
        AppStatus::Pending,
        AppStatus::Reviewing,
        AppStatus::Accepted,
        AppStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Pending => "PENDING",
            AppStatus::Reviewing => "REVIEWING",
            AppStatus::Accepted => "ACCEPTED",
            AppStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub job_id: String,
    pub job_title: String, // denormalized for listing
    pub user_id: String,
    pub message: String,
    pub status: AppStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}
