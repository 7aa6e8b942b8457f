//! Collaborator contracts for the source-hosting and task-tracking services.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::domain::{CompletedTask, Event, GoalTask, PullRequest, RepoRef};
use crate::error::Result;

/// Boxed future returned by collaborator methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Opaque continuation token for the next page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(pub String);

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in host order.
    pub items: Vec<T>,
    /// Cursor for the following page, `None` on the last page.
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Raw access to the source-hosting service.
pub trait ActivitySource {
    /// Fetch one page of the user's activity feed, most recent first.
    fn list_events_page<'a>(
        &'a self,
        user: &'a str,
        cursor: Option<&'a PageCursor>,
    ) -> SourceFuture<'a, Page<Event>>;

    /// Fetch one page of closed pull requests against `base`, most recently
    /// updated first.
    fn list_closed_pulls_page<'a>(
        &'a self,
        repo: &'a RepoRef,
        base: &'a str,
        per_page: u32,
        cursor: Option<&'a PageCursor>,
    ) -> SourceFuture<'a, Page<PullRequest>>;

    /// Fetch raw unified diff text from `url`.
    fn fetch_diff_text<'a>(&'a self, url: &'a str) -> SourceFuture<'a, String>;
}

/// Identity of the user inside the task tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    /// Task tracker user id.
    pub user_id: String,
    /// Task tracker workspace id.
    pub workspace_id: String,
}

/// Queries against the task-tracking service.
pub trait TaskSource {
    /// Most recently created goal task since `since`, if any.
    fn find_goal<'a>(
        &'a self,
        context: &'a TaskContext,
        since: DateTime<Utc>,
    ) -> SourceFuture<'a, Option<GoalTask>>;

    /// Tasks assigned to the user and completed since `since`.
    fn find_completed_tasks<'a>(
        &'a self,
        context: &'a TaskContext,
        since: DateTime<Utc>,
    ) -> SourceFuture<'a, Vec<CompletedTask>>;
}

/// Pick the most recently created goal task.
pub fn latest_goal(tasks: Vec<GoalTask>) -> Option<GoalTask> {
    tasks.into_iter().max_by_key(|task| task.created_at)
}
