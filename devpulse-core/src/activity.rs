//! Windowed retrieval of GitHub activity.
//!
//! [`GitHubActivity`] owns the source client, the clock, and the memo tables,
//! so every retrieval goes through an explicit context rather than a shared
//! global client.

use std::sync::Arc;

use log::{debug, info};

use crate::changes::{Changes, EnrichedPr};
use crate::diff::changes_from_diff;
use crate::domain::{Clock, Event, EventKind, Issue, PullRequest, RepoRef, SystemClock, Window};
use crate::error::{PulseError, Result};
use crate::memo::Memo;
use crate::source::{ActivitySource, PageCursor};

/// Base branch used when the caller does not name one.
pub const DEFAULT_BASE_BRANCH: &str = "master";
/// Page size requested from the pull request listing.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

type EventKey = (String, u32);
type PullKey = (String, RepoRef, u32, String);

/// Memoized, windowed view over a user's GitHub activity.
pub struct GitHubActivity<S, C = SystemClock> {
    source: S,
    clock: C,
    per_page: u32,
    events: Memo<EventKey, Vec<Event>>,
    merged: Memo<PullKey, Vec<EnrichedPr>>,
}

impl<S: ActivitySource> GitHubActivity<S> {
    /// Build a context using the system clock.
    pub fn new(source: S) -> Self {
        Self::with_clock(source, SystemClock)
    }
}

impl<S: ActivitySource, C: Clock> GitHubActivity<S, C> {
    /// Build a context with an explicit clock.
    pub fn with_clock(source: S, clock: C) -> Self {
        Self {
            source,
            clock,
            per_page: DEFAULT_PAGE_SIZE,
            events: Memo::new(),
            merged: Memo::new(),
        }
    }

    /// Override the pull request page size.
    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Underlying source client.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// All events for `user` created within the last `days` days.
    ///
    /// The whole feed is read before filtering because the host gives no
    /// ordering guarantee that would allow stopping early.
    pub async fn events_in_window(&self, user: &str, days: u32) -> Result<Arc<Vec<Event>>> {
        self.events
            .get_or_try_fetch((user.to_string(), days), || self.fetch_events(user, days))
            .await
    }

    /// Issues in `repo` that `user` closed within the last `days` days.
    pub async fn closed_issues(&self, user: &str, repo: &RepoRef, days: u32) -> Result<Vec<Issue>> {
        let events = self.events_in_window(user, days).await?;
        let repo_name = repo.full_name();
        let issues: Vec<Issue> = events
            .iter()
            .filter(|event| {
                event.kind == EventKind::IssuesEvent
                    && event.payload.action.as_deref() == Some("closed")
                    && event.repo.name == repo_name
            })
            .filter_map(|event| event.payload.issue.clone())
            .collect();
        info!("found {} closed issues in {repo_name}", issues.len());
        Ok(issues)
    }

    /// Pull requests by `user` merged into `base` within the last `days`
    /// days, each enriched with its diff statistics.
    ///
    /// Results keep the host's most-recently-updated-first order.
    pub async fn merged_pull_requests(
        &self,
        user: &str,
        repo: &RepoRef,
        days: u32,
        base: &str,
    ) -> Result<Arc<Vec<EnrichedPr>>> {
        let key = (user.to_string(), repo.clone(), days, base.to_string());
        self.merged
            .get_or_try_fetch(key, || self.collect_merged(user, repo, days, base))
            .await
    }

    /// Fetch and parse the diff of a single pull request.
    pub async fn pull_request_changes(&self, pr: &PullRequest) -> Result<Changes> {
        debug!("fetching diff for #{} from {}", pr.number, pr.diff_url);
        let text = self.source.fetch_diff_text(&pr.diff_url).await?;
        changes_from_diff(&text).map_err(|err| match err {
            PulseError::DiffParse(message) => {
                PulseError::DiffParse(format!("pull request #{}: {message}", pr.number))
            }
            other => other,
        })
    }

    async fn fetch_events(&self, user: &str, days: u32) -> Result<Vec<Event>> {
        let window = Window::trailing_days(self.clock.now(), days)?;
        let mut events = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0usize;
        loop {
            let page = self.source.list_events_page(user, cursor.as_ref()).await?;
            pages += 1;
            events.extend(page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        let fetched = events.len();
        events.retain(|event| window.includes(event.created_at));
        info!(
            "read {fetched} events for {user} across {pages} pages, {} within {days} days",
            events.len()
        );
        Ok(events)
    }

    async fn collect_merged(
        &self,
        user: &str,
        repo: &RepoRef,
        days: u32,
        base: &str,
    ) -> Result<Vec<EnrichedPr>> {
        let window = Window::trailing_days(self.clock.now(), days)?;
        let mut collected = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        loop {
            let page = self
                .source
                .list_closed_pulls_page(repo, base, self.per_page, cursor.as_ref())
                .await?;
            let mut past_window = false;
            for pr in page.items {
                if window.includes(pr.updated_at) {
                    let merged_in_window = pr.merged_at.is_some_and(|at| window.includes(at));
                    if pr.author() == Some(user) && merged_in_window {
                        let changes = self.pull_request_changes(&pr).await?;
                        collected.push(EnrichedPr {
                            pull_request: pr,
                            changes,
                        });
                    }
                } else if pr.merge_commit_sha.is_some() {
                    // Listing is sorted by update time, so everything on later
                    // pages is older still.
                    past_window = true;
                }
            }
            if past_window {
                debug!("pull request listing for {repo} crossed the window boundary");
                break;
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        info!(
            "collected {} merged pull requests by {user} in {repo}",
            collected.len()
        );
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::FileChange;
    use crate::domain::{EventPayload, EventRepo, MockClock, User};
    use crate::source::{Page, SourceFuture};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap()
    }

    fn clock() -> MockClock {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(now());
        clock
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn event(id: &str, kind: EventKind, repo: &str, action: Option<&str>, age: i64) -> Event {
        Event {
            id: id.to_string(),
            kind,
            repo: EventRepo {
                name: repo.to_string(),
            },
            payload: EventPayload {
                action: action.map(str::to_string),
                issue: Some(Issue {
                    number: id.parse().unwrap_or(0),
                    title: format!("Issue {id}"),
                    body: Some("details".to_string()),
                    html_url: format!("https://github.com/{repo}/issues/{id}"),
                    state: "closed".to_string(),
                    closed_at: None,
                }),
            },
            created_at: days_ago(age),
        }
    }

    fn pr(number: u64, author: &str, updated: i64, merged: Option<i64>) -> PullRequest {
        PullRequest {
            number,
            title: format!("Change {number}"),
            html_url: format!("https://github.com/octo/widgets/pull/{number}"),
            diff_url: format!("https://github.com/octo/widgets/pull/{number}.diff"),
            user: Some(User {
                login: author.to_string(),
            }),
            merged_at: merged.map(days_ago),
            updated_at: days_ago(updated),
            merge_commit_sha: merged.map(|_| format!("sha{number}")),
        }
    }

    fn diff_for(path: &str, additions: usize, deletions: usize) -> String {
        let mut text = format!(
            "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1,{deletions} +1,{additions} @@\n"
        );
        for _ in 0..deletions {
            text.push_str("-old\n");
        }
        for _ in 0..additions {
            text.push_str("+new\n");
        }
        text
    }

    #[derive(Default)]
    struct FakeSource {
        event_pages: Vec<Vec<Event>>,
        pull_pages: Vec<Vec<PullRequest>>,
        diffs: HashMap<String, String>,
        event_requests: Mutex<usize>,
        failing_event_cursor: Mutex<Option<String>>,
        pull_requests: Mutex<Vec<Option<String>>>,
        diff_requests: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn page<T: Clone>(pages: &[Vec<T>], cursor: Option<&PageCursor>) -> Result<Page<T>> {
            let index = match cursor {
                Some(PageCursor(raw)) => raw
                    .parse::<usize>()
                    .map_err(|_| PulseError::Transport(format!("bad cursor {raw}")))?,
                None => 0,
            };
            let items = pages.get(index).cloned().unwrap_or_default();
            let next = (index + 1 < pages.len()).then(|| PageCursor((index + 1).to_string()));
            Ok(Page { items, next })
        }

        fn pull_page_count(&self) -> usize {
            self.pull_requests.lock().expect("pull requests").len()
        }
    }

    impl ActivitySource for FakeSource {
        fn list_events_page<'a>(
            &'a self,
            _user: &'a str,
            cursor: Option<&'a PageCursor>,
        ) -> SourceFuture<'a, Page<Event>> {
            Box::pin(async move {
                *self.event_requests.lock().expect("event requests") += 1;
                let mut failing = self.failing_event_cursor.lock().expect("failing cursor");
                if cursor.is_some_and(|cursor| failing.as_deref() == Some(cursor.0.as_str())) {
                    failing.take();
                    return Err(PulseError::Api {
                        status: 401,
                        body: "Bad credentials".to_string(),
                    });
                }
                drop(failing);
                Self::page(&self.event_pages, cursor)
            })
        }

        fn list_closed_pulls_page<'a>(
            &'a self,
            _repo: &'a RepoRef,
            _base: &'a str,
            _per_page: u32,
            cursor: Option<&'a PageCursor>,
        ) -> SourceFuture<'a, Page<PullRequest>> {
            Box::pin(async move {
                self.pull_requests
                    .lock()
                    .expect("pull requests")
                    .push(cursor.map(|cursor| cursor.0.clone()));
                Self::page(&self.pull_pages, cursor)
            })
        }

        fn fetch_diff_text<'a>(&'a self, url: &'a str) -> SourceFuture<'a, String> {
            Box::pin(async move {
                self.diff_requests
                    .lock()
                    .expect("diff requests")
                    .push(url.to_string());
                self.diffs
                    .get(url)
                    .cloned()
                    .ok_or_else(|| PulseError::Api {
                        status: 404,
                        body: format!("no diff at {url}"),
                    })
            })
        }
    }

    fn repo() -> RepoRef {
        RepoRef::new("octo", "widgets")
    }

    fn with_diffs(mut source: FakeSource, prs: &[(u64, &str, usize, usize)]) -> FakeSource {
        for (number, path, additions, deletions) in prs {
            source.diffs.insert(
                format!("https://github.com/octo/widgets/pull/{number}.diff"),
                diff_for(path, *additions, *deletions),
            );
        }
        source
    }

    #[tokio::test]
    async fn events_exhaust_all_pages_then_filter_to_window() {
        let source = FakeSource {
            event_pages: vec![
                vec![
                    event("1", EventKind::PushEvent, "octo/widgets", None, 1),
                    event("2", EventKind::IssuesEvent, "octo/widgets", Some("closed"), 9),
                ],
                vec![event("3", EventKind::IssuesEvent, "octo/widgets", Some("closed"), 2)],
            ],
            ..FakeSource::default()
        };
        let activity = GitHubActivity::with_clock(source, clock());

        let events = activity.events_in_window("mona", 7).await.expect("events");

        let ids: Vec<&str> = events.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(*activity.source().event_requests.lock().expect("count"), 2);
    }

    #[tokio::test]
    async fn events_are_memoized_per_user_and_window() {
        let source = FakeSource {
            event_pages: vec![vec![event("1", EventKind::PushEvent, "octo/widgets", None, 1)]],
            ..FakeSource::default()
        };
        let activity = GitHubActivity::with_clock(source, clock());

        let first = activity.events_in_window("mona", 7).await.expect("first");
        let second = activity.events_in_window("mona", 7).await.expect("second");
        activity.events_in_window("mona", 14).await.expect("other window");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*activity.source().event_requests.lock().expect("count"), 2);
    }

    #[tokio::test]
    async fn event_feed_errors_surface_unchanged_and_are_retried() {
        let source = FakeSource {
            event_pages: vec![
                vec![event("1", EventKind::PushEvent, "octo/widgets", None, 1)],
                vec![event("2", EventKind::PushEvent, "octo/widgets", None, 2)],
            ],
            failing_event_cursor: Mutex::new(Some("1".to_string())),
            ..FakeSource::default()
        };
        let activity = GitHubActivity::with_clock(source, clock());

        let err = activity.events_in_window("mona", 7).await.unwrap_err();
        match err {
            PulseError::Api { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Bad credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*activity.source().event_requests.lock().expect("count"), 2);

        let events = activity.events_in_window("mona", 7).await.expect("retry");
        assert_eq!(events.len(), 2);
        assert_eq!(*activity.source().event_requests.lock().expect("count"), 4);
    }

    #[tokio::test]
    async fn closed_issues_match_kind_action_and_repo() {
        let source = FakeSource {
            event_pages: vec![vec![
                event("11", EventKind::IssuesEvent, "octo/widgets", Some("closed"), 1),
                event("12", EventKind::IssuesEvent, "octo/widgets", Some("opened"), 1),
                event("13", EventKind::IssuesEvent, "octo/gadgets", Some("closed"), 1),
                event("14", EventKind::IssueCommentEvent, "octo/widgets", Some("closed"), 1),
                event("15", EventKind::IssuesEvent, "octo/widgets", Some("closed"), 30),
            ]],
            ..FakeSource::default()
        };
        let activity = GitHubActivity::with_clock(source, clock());

        let issues = activity
            .closed_issues("mona", &repo(), 7)
            .await
            .expect("issues");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 11);
    }

    #[tokio::test]
    async fn merged_pull_requests_filter_author_and_merge_window() {
        let source = with_diffs(
            FakeSource {
                pull_pages: vec![vec![
                    pr(1, "mona", 1, Some(1)),
                    pr(2, "hubot", 1, Some(1)),
                    pr(3, "mona", 2, None),
                    pr(4, "mona", 3, Some(20)),
                    pr(5, "mona", 4, Some(4)),
                ]],
                ..FakeSource::default()
            },
            &[(1, "a.ts", 10, 2), (5, "b.ts", 1, 0)],
        );
        let activity = GitHubActivity::with_clock(source, clock());

        let merged = activity
            .merged_pull_requests("mona", &repo(), 7, DEFAULT_BASE_BRANCH)
            .await
            .expect("merged");

        let numbers: Vec<u64> = merged.iter().map(|pr| pr.pull_request.number).collect();
        assert_eq!(numbers, vec![1, 5]);
        assert_eq!(merged[0].changes.additions, 10);
        assert_eq!(merged[0].changes.files["a.ts"], FileChange::new(10, 2));
        assert_eq!(
            activity.source().diff_requests.lock().expect("diffs").len(),
            2
        );
    }

    #[tokio::test]
    async fn pagination_stops_after_page_with_past_window_merge() {
        let source = with_diffs(
            FakeSource {
                pull_pages: vec![
                    vec![
                        pr(1, "mona", 1, Some(1)),
                        pr(2, "mona", 2, Some(2)),
                        pr(3, "hubot", 3, Some(3)),
                        pr(4, "mona", 4, Some(4)),
                        pr(5, "mona", 10, Some(10)),
                        // Same page as the stop signal, still processed.
                        pr(6, "mona", 5, Some(5)),
                    ],
                    vec![pr(7, "mona", 1, Some(1))],
                ],
                ..FakeSource::default()
            },
            &[
                (1, "a.rs", 1, 0),
                (2, "a.rs", 1, 0),
                (4, "a.rs", 1, 0),
                (6, "a.rs", 1, 0),
                (7, "a.rs", 1, 0),
            ],
        );
        let activity = GitHubActivity::with_clock(source, clock());

        let merged = activity
            .merged_pull_requests("mona", &repo(), 7, "main")
            .await
            .expect("merged");

        let numbers: Vec<u64> = merged.iter().map(|pr| pr.pull_request.number).collect();
        assert_eq!(numbers, vec![1, 2, 4, 6]);
        assert_eq!(activity.source().pull_page_count(), 1);
    }

    #[tokio::test]
    async fn closed_unmerged_pull_requests_do_not_stop_pagination() {
        let stale = pr(2, "mona", 30, None);
        let source = with_diffs(
            FakeSource {
                pull_pages: vec![
                    vec![pr(1, "mona", 1, Some(1)), stale],
                    vec![pr(3, "mona", 2, Some(2))],
                ],
                ..FakeSource::default()
            },
            &[(1, "a.rs", 1, 0), (3, "b.rs", 2, 0)],
        );
        let activity = GitHubActivity::with_clock(source, clock());

        let merged = activity
            .merged_pull_requests("mona", &repo(), 7, "main")
            .await
            .expect("merged");

        assert_eq!(merged.len(), 2);
        assert_eq!(
            *activity.source().pull_requests.lock().expect("pages"),
            vec![None, Some("1".to_string())]
        );
    }

    #[tokio::test]
    async fn unsorted_listing_hides_in_window_pull_requests_behind_cutoff() {
        // Known limitation: the cutoff trusts the host's update-time ordering.
        let source = with_diffs(
            FakeSource {
                pull_pages: vec![
                    vec![pr(1, "mona", 40, Some(40))],
                    vec![pr(2, "mona", 1, Some(1))],
                ],
                ..FakeSource::default()
            },
            &[(2, "a.rs", 1, 0)],
        );
        let activity = GitHubActivity::with_clock(source, clock());

        let merged = activity
            .merged_pull_requests("mona", &repo(), 7, "main")
            .await
            .expect("merged");

        assert!(merged.is_empty());
        assert_eq!(activity.source().pull_page_count(), 1);
    }

    #[tokio::test]
    async fn merged_pull_requests_are_memoized() {
        let source = with_diffs(
            FakeSource {
                pull_pages: vec![vec![pr(1, "mona", 1, Some(1))]],
                ..FakeSource::default()
            },
            &[(1, "a.rs", 3, 1)],
        );
        let activity = GitHubActivity::with_clock(source, clock());

        let first = activity
            .merged_pull_requests("mona", &repo(), 7, "main")
            .await
            .expect("first");
        let second = activity
            .merged_pull_requests("mona", &repo(), 7, "main")
            .await
            .expect("second");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(activity.source().pull_page_count(), 1);
        assert_eq!(
            activity.source().diff_requests.lock().expect("diffs").len(),
            1
        );
    }

    #[tokio::test]
    async fn malformed_diff_aborts_collection() {
        let mut source = FakeSource {
            pull_pages: vec![vec![pr(1, "mona", 1, Some(1))]],
            ..FakeSource::default()
        };
        source.diffs.insert(
            "https://github.com/octo/widgets/pull/1.diff".to_string(),
            "--- a/a.rs\n+++ b/a.rs\n@@ nonsense @@\n".to_string(),
        );
        let activity = GitHubActivity::with_clock(source, clock());

        let err = activity
            .merged_pull_requests("mona", &repo(), 7, "main")
            .await
            .unwrap_err();

        assert!(matches!(err, PulseError::DiffParse(_)));
        assert!(err.to_string().contains("pull request #1"));
    }

    #[tokio::test]
    async fn source_errors_propagate_unchanged() {
        let source = FakeSource {
            pull_pages: vec![vec![pr(9, "mona", 1, Some(1))]],
            ..FakeSource::default()
        };
        let activity = GitHubActivity::with_clock(source, clock());

        let err = activity
            .merged_pull_requests("mona", &repo(), 7, "main")
            .await
            .unwrap_err();

        match err {
            PulseError::Api { status, .. } => assert_eq!(status, 404),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn page_size_is_at_least_one() {
        let activity = GitHubActivity::with_clock(FakeSource::default(), clock()).with_page_size(0);
        assert_eq!(activity.per_page, 1);
    }
}
