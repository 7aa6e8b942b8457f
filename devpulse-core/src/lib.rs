#![deny(missing_docs)]
//! devpulse core library.
//!
//! This crate holds the activity-aggregation pipeline: windowed retrieval of
//! GitHub events and pull requests, diff statistics, and the markdown
//! rendering used to present them.

pub mod activity;
pub mod changes;
pub mod diff;
pub mod domain;
pub mod error;
pub mod markdown;
/// Async memoization keyed by structural arguments.
pub mod memo;
pub mod report;
pub mod source;

pub use activity::{DEFAULT_BASE_BRANCH, DEFAULT_PAGE_SIZE, GitHubActivity};
pub use changes::{Changes, EnrichedPr, FileChange, total_changes};
pub use diff::{FileDiff, changes_from_diff, parse_unified_diff};
pub use domain::{
    Clock, CompletedTask, Event, EventKind, EventPayload, EventRepo, GoalTask, Issue, PullRequest,
    RepoRef, SystemClock, User, Window,
};
pub use error::{PulseError, Result};
pub use memo::Memo;
pub use report::{ActivityReport, NOTES_LIMIT, REPORT_TITLE, render_json, render_report_markdown};
pub use source::{
    ActivitySource, Page, PageCursor, SourceFuture, TaskContext, TaskSource, latest_goal,
};
