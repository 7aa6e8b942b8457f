//! Domain entities for devpulse.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

/// Discriminant of a GitHub activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// An issue was opened, closed, reopened, or edited.
    IssuesEvent,
    /// A comment was left on an issue or pull request.
    IssueCommentEvent,
    /// A pull request changed state.
    PullRequestEvent,
    /// A pull request review was submitted.
    PullRequestReviewEvent,
    /// Commits were pushed.
    PushEvent,
    /// A branch or tag was created.
    CreateEvent,
    /// A branch or tag was deleted.
    DeleteEvent,
    /// Any event type devpulse does not inspect.
    #[serde(other)]
    Other,
}

/// Repository reference attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRepo {
    /// Full `owner/name` of the repository.
    pub name: String,
}

/// Kind-specific event payload. Only the fields devpulse reads are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Action verb, e.g. `closed` for an issues event.
    #[serde(default)]
    pub action: Option<String>,
    /// Issue carried by issue events.
    #[serde(default)]
    pub issue: Option<Issue>,
}

/// A timestamped entry from a user's activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Host identifier of the event.
    pub id: String,
    /// Event discriminant.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Repository the event happened in.
    pub repo: EventRepo,
    /// Kind-specific payload.
    #[serde(default)]
    pub payload: EventPayload,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// An issue as embedded in event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number within its repository.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Markdown body, absent when the issue was filed without one.
    #[serde(default)]
    pub body: Option<String>,
    /// Canonical web URL.
    pub html_url: String,
    /// `open` or `closed`.
    #[serde(default)]
    pub state: String,
    /// When the issue was closed, if it is.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Account that authored a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login handle.
    pub login: String,
}

/// A pull request as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull request number within its repository.
    pub number: u64,
    /// Pull request title.
    pub title: String,
    /// Canonical web URL.
    pub html_url: String,
    /// Location of the unified diff for this pull request.
    pub diff_url: String,
    /// Author, missing for deleted accounts.
    #[serde(default)]
    pub user: Option<User>,
    /// Merge timestamp; `None` for PRs closed without merging.
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Last update timestamp, used as the pagination sort key.
    pub updated_at: DateTime<Utc>,
    /// Merge commit identifier.
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
}

impl PullRequest {
    /// Login of the author, if the account still exists.
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.login.as_str())
    }
}

/// A validated `owner/repo` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Account or organisation owning the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Build a reference from already-validated parts.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Full `owner/name` form, as used by event payloads.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = PulseError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let invalid = || PulseError::Config(format!("invalid repository `{value}`, expected owner/repo"));
        let (owner, name) = trimmed.split_once('/').ok_or_else(invalid)?;
        let valid_part =
            |part: &str| !part.is_empty() && !part.contains('/') && !part.contains(char::is_whitespace);
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }
        Ok(Self::new(owner, name))
    }
}

/// Source of the current time.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Trailing window of `days` days ending at a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    /// Window covering the `days` days before `now`.
    ///
    /// Fails with [`PulseError::Config`] when the start falls outside the
    /// representable date range.
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Result<Self> {
        let start = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| PulseError::Config(format!("period of {days} days is out of range")))?;
        Ok(Self { start, end: now })
    }

    /// Exclusive lower bound.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Instant the window was computed at.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `instant` falls strictly after the window start.
    ///
    /// No upper bound is applied: host timestamps slightly ahead of the local
    /// clock still count as in-window.
    pub fn includes(&self, instant: DateTime<Utc>) -> bool {
        instant > self.start
    }
}

/// Most recent goal-setting task from the task tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalTask {
    /// Free-text goals.
    #[serde(default)]
    pub notes: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A task completed within the reporting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTask {
    /// Task title.
    pub name: String,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
    /// Canonical web URL.
    pub permalink_url: String,
}
