//! Feed aggregation: folds a post's feedback and comment count into a
//! fixed-shape summary.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AuthorRef, FeedbackType, Post};

pub const DEFAULT_FEED_CAP: usize = 50;

/// Count per feedback type. All five keys are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackTally {
    #[serde(rename = "LIKE")]
    pub like: u64,
    #[serde(rename = "INSIGHT")]
    pub insight: u64,
    #[serde(rename = "QUESTION")]
    pub question: u64,
    #[serde(rename = "HIRE_ME")]
    pub hire_me: u64,
    #[serde(rename = "REFER")]
    pub refer: u64,
}

impl FeedbackTally {
    pub fn get(&self, kind: FeedbackType) -> u64 {
        match kind {
            FeedbackType::Like => self.like,
            FeedbackType::Insight => self.insight,
            FeedbackType::Question => self.question,
            FeedbackType::HireMe => self.hire_me,
            FeedbackType::Refer => self.refer,
        }
    }

    pub fn increment(&mut self, kind: FeedbackType) {
        let slot = match kind {
            FeedbackType::Like => &mut self.like,
            FeedbackType::Insight => &mut self.insight,
            FeedbackType::Question => &mut self.question,
            FeedbackType::HireMe => &mut self.hire_me,
            FeedbackType::Refer => &mut self.refer,
        };
        *slot += 1;
    }

    /// Tally raw type strings as stored. Unrecognized values are skipped.
    pub fn from_raw<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tally = Self::default();
        for raw in kinds {
            match raw.as_ref().parse::<FeedbackType>() {
                Ok(kind) => tally.increment(kind),
                Err(_) => {}
            }
        }
        tally
    }

    pub fn total(&self) -> u64 {
        FeedbackType::ALL.iter().map(|k| self.get(*k)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub author: AuthorRef,
    pub content: String,
    pub tags: String,
    pub created_at: DateTime<Utc>,
    pub feedback_counts: FeedbackTally,
    pub comments_count: u64,
}

/// A post as fetched for the feed, with everything the summary needs.
#[derive(Debug, Clone)]
pub struct PostBundle {
    pub post: Post,
    pub author: AuthorRef,
    /// Raw stored type of every feedback on the post.
    pub feedback_types: Vec<String>,
    pub comments_count: u64,
}

pub fn summarize<S: AsRef<str>>(
    post: &Post,
    author: &AuthorRef,
    feedback_types: &[S],
    comments_count: u64,
) -> PostSummary {
    PostSummary {
        id: post.id.clone(),
        author: author.clone(),
        content: post.content.clone(),
        tags: post.tags.clone(),
        created_at: post.created_at,
        feedback_counts: FeedbackTally::from_raw(feedback_types),
        comments_count,
    }
}

/// Source of recent posts for the feed: at most `limit`, newest first.
pub trait FeedStore {
    fn recent_posts(&self, limit: usize) -> Result<Vec<PostBundle>>;
}

pub fn load_feed(store: &impl FeedStore, cap: usize) -> Result<Vec<PostSummary>> {
    let posts = store.recent_posts(cap)?;
    Ok(posts
        .iter()
        .map(|b| summarize(&b.post, &b.author, &b.feedback_types, b.comments_count))
        .collect())
}
