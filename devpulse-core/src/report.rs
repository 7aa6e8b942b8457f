//! Report composition and rendering for devpulse outputs.

use serde::{Deserialize, Serialize};

use crate::changes::{Changes, EnrichedPr, total_changes};
use crate::domain::{CompletedTask, GoalTask, Issue};
use crate::error::Result;
use crate::markdown::{
    Column, TableRow, block_quote, h1, h2, h3, h4, link, table, truncate, unordered_list,
};

/// Title used for the rendered document.
pub const REPORT_TITLE: &str = "Weekly Activity Report";
/// Maximum characters kept from task notes and issue bodies.
pub const NOTES_LIMIT: usize = 255;

/// Everything collected for one reporting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    /// Length of the window in days.
    pub period_days: u32,
    /// Latest stated goal, if one was found.
    pub goal: Option<GoalTask>,
    /// Tasks completed in the window.
    pub completed_tasks: Vec<CompletedTask>,
    /// Issues closed in the window.
    pub closed_issues: Vec<Issue>,
    /// Pull requests merged in the window with their diff statistics.
    pub merged_prs: Vec<EnrichedPr>,
    /// Aggregate of every merged pull request's changes.
    pub totals: Changes,
}

impl ActivityReport {
    /// Assemble a report, computing the aggregate changes.
    pub fn new(
        period_days: u32,
        goal: Option<GoalTask>,
        completed_tasks: Vec<CompletedTask>,
        closed_issues: Vec<Issue>,
        merged_prs: Vec<EnrichedPr>,
    ) -> Self {
        let totals = total_changes(merged_prs.iter().map(|pr| &pr.changes));
        Self {
            period_days,
            goal,
            completed_tasks,
            closed_issues,
            merged_prs,
            totals,
        }
    }
}

impl TableRow for EnrichedPr {
    fn field(&self, name: &str) -> Option<String> {
        let pr = &self.pull_request;
        match name {
            "number" => Some(pr.number.to_string()),
            "title" => Some(pr.title.clone()),
            "html_url" => Some(pr.html_url.clone()),
            "author" => Some(pr.author().unwrap_or_default().to_string()),
            "additions" => Some(self.changes.additions.to_string()),
            "deletions" => Some(self.changes.deletions.to_string()),
            "files" => Some(self.changes.file_count().to_string()),
            _ => None,
        }
    }
}

struct FileRow<'a> {
    path: &'a str,
    additions: u64,
    deletions: u64,
}

impl TableRow for FileRow<'_> {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "filePath" => Some(self.path.to_string()),
            "additions" => Some(self.additions.to_string()),
            "deletions" => Some(self.deletions.to_string()),
            _ => None,
        }
    }
}

/// Render the report as a markdown document.
pub fn render_report_markdown(report: &ActivityReport) -> String {
    h1(
        REPORT_TITLE,
        [
            h2(
                "Asana",
                [
                    h3("Stated Goals", [stated_goal(report.goal.as_ref())]),
                    h3("Closed Tasks", [closed_tasks(&report.completed_tasks)]),
                ],
            ),
            h2(
                "Github",
                [
                    h3("Issues Closed", closed_issues(&report.closed_issues)),
                    h3(
                        "PRs Merged",
                        [
                            merged_table(&report.merged_prs),
                            total_changes_section(&report.totals),
                        ],
                    ),
                ],
            ),
        ],
    )
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(payload)?)
}

fn stated_goal(goal: Option<&GoalTask>) -> String {
    match goal {
        Some(goal) => block_quote([goal.notes.as_str()]),
        None => "No stated goals.".to_string(),
    }
}

fn closed_tasks(tasks: &[CompletedTask]) -> String {
    if tasks.is_empty() {
        return "No tasks completed.".to_string();
    }
    unordered_list(tasks.iter().map(|task| {
        h4(
            &link(&task.permalink_url, Some(task.name.as_str())),
            [block_quote([truncate(&task.notes, NOTES_LIMIT)])],
        )
    }))
}

fn closed_issues(issues: &[Issue]) -> Vec<String> {
    if issues.is_empty() {
        return vec!["No issues closed.".to_string()];
    }
    issues
        .iter()
        .map(|issue| {
            let body = issue.body.as_deref().unwrap_or_default();
            h4(
                &link(&issue.html_url, Some(issue.title.as_str())),
                [block_quote([truncate(body, NOTES_LIMIT)])],
            )
        })
        .collect()
}

fn merged_table(prs: &[EnrichedPr]) -> String {
    let columns = [
        Column::mapped("PR", |pr: &EnrichedPr| {
            let title = format!("{} (#{})", pr.pull_request.title, pr.pull_request.number);
            link(&pr.pull_request.html_url, Some(title.as_str()))
        }),
        Column::mapped("Merged On", |pr: &EnrichedPr| {
            pr.pull_request
                .merged_at
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_default()
        }),
        Column::mapped("Files", |pr: &EnrichedPr| pr.changes.file_count().to_string()),
        Column::renamed("Additions", "additions"),
        Column::renamed("Deletions", "deletions"),
    ];
    table(&columns, prs)
}

fn total_changes_section(totals: &Changes) -> String {
    let rows: Vec<FileRow<'_>> = totals
        .files
        .iter()
        .map(|(path, change)| FileRow {
            path,
            additions: change.additions,
            deletions: change.deletions,
        })
        .collect();
    let columns = [
        Column::renamed("File", "filePath"),
        Column::mapped("Additions", |row: &FileRow<'_>| row.additions.to_string()),
        Column::mapped("Deletions", |row: &FileRow<'_>| row.deletions.to_string()),
    ];
    h4(
        "Total Changes",
        [
            format!("Files Changed: {}", totals.file_count()),
            format!("\\+ {}", totals.additions),
            format!("\\- {}", totals.deletions),
            table(&columns, &rows),
        ],
    )
}
