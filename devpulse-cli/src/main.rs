#![deny(missing_docs)]
//! devpulse command-line interface.
//!
//! Collects a user's recent Asana and GitHub activity and writes it out as a
//! markdown or JSON report.

mod asana;
mod github;
mod http;

use std::path::{Path, PathBuf};

use asana::{AsanaClient, DEFAULT_ASANA_API_URL};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, ValueEnum};
use devpulse_core::{
    ActivityReport, ActivitySource, Clock, DEFAULT_BASE_BRANCH, DEFAULT_PAGE_SIZE,
    GitHubActivity, PulseError, RepoRef, Result, SystemClock, TaskContext, TaskSource, Window,
    render_json, render_report_markdown,
};
use github::{DEFAULT_GITHUB_API_URL, GitHubApiClient};
use log::info;

pub(crate) type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(
    name = "devpulse",
    version,
    about = "Weekly activity report from Asana and GitHub"
)]
struct Cli {
    /// Number of trailing days to report on.
    #[arg(long, env = "STATS_PERIOD", default_value_t = 7)]
    period: u32,
    /// Repository to report on, as owner/name.
    #[arg(long, env = "GITHUB_TARGET_REPO")]
    repo: String,
    /// GitHub login whose activity is reported.
    #[arg(long, env = "GITHUB_TARGET_USER")]
    user: String,
    /// GitHub personal access token.
    #[arg(long, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    github_token: String,
    /// GitHub API root.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    github_api_url: String,
    /// Base branch merged pull requests must target.
    #[arg(long, env = "GITHUB_BASE_BRANCH", default_value = DEFAULT_BASE_BRANCH)]
    base: String,
    /// Page size for the pull request listing.
    #[arg(long, env = "GITHUB_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
    /// Asana personal access token.
    #[arg(long, env = "ASANA_PERSONAL_ACCESS_TOKEN", hide_env_values = true)]
    asana_token: String,
    /// Name of the Asana workspace to search.
    #[arg(long, env = "ASANA_WORKSPACE")]
    asana_workspace: String,
    /// Asana project holding goal tasks.
    #[arg(long, env = "ASANA_GOALS_PROJECT")]
    goals_project: Option<String>,
    /// Asana API root.
    #[arg(long, env = "ASANA_API_URL", default_value = DEFAULT_ASANA_API_URL)]
    asana_api_url: String,
    /// File the report is written to.
    #[arg(short, long, default_value = "report.md")]
    output: PathBuf,
    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Markdown,
    Json,
}

/// Validated run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReportConfig {
    period: u32,
    repo: RepoRef,
    user: String,
    github_token: String,
    github_api_url: String,
    base: String,
    page_size: u32,
    asana_token: String,
    asana_workspace: String,
    goals_project: Option<String>,
    asana_api_url: String,
    output: PathBuf,
    format: OutputFormat,
}

impl TryFrom<Cli> for ReportConfig {
    type Error = PulseError;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.period == 0 {
            return Err(PulseError::Config("period must be at least one day".to_string()));
        }
        search_starts(Utc::now(), cli.period)?;
        if cli.page_size == 0 {
            return Err(PulseError::Config("page size must be positive".to_string()));
        }
        Ok(Self {
            period: cli.period,
            repo: required(&cli.repo, "repository")?.parse()?,
            user: required(&cli.user, "github user")?,
            github_token: required(&cli.github_token, "github access token")?,
            github_api_url: required(&cli.github_api_url, "github api url")?,
            base: required(&cli.base, "base branch")?,
            page_size: cli.page_size,
            asana_token: required(&cli.asana_token, "asana access token")?,
            asana_workspace: required(&cli.asana_workspace, "asana workspace")?,
            goals_project: cli
                .goals_project
                .map(|project| project.trim().to_string())
                .filter(|project| !project.is_empty()),
            asana_api_url: required(&cli.asana_api_url, "asana api url")?,
            output: cli.output,
            format: cli.format,
        })
    }
}

fn required(value: &str, name: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PulseError::Config(format!("{name} is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ReportConfig::try_from(cli)?;
    if let Err(err) = run(&config).await {
        log::error!("report generation failed: {err}");
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
fn main() {}

async fn run(config: &ReportConfig) -> CliResult<()> {
    let github = GitHubApiClient::new(&config.github_api_url, &config.github_token)?;
    let activity = GitHubActivity::new(github).with_page_size(config.page_size);
    let asana = AsanaClient::new(
        &config.asana_api_url,
        &config.asana_token,
        config.goals_project.clone(),
    )?;
    let context = asana.resolve_context(&config.asana_workspace).await?;

    let report = collect_report(config, &activity, &asana, &context, SystemClock.now()).await?;
    let contents = render(&report, config.format)?;
    write_report(&config.output, &contents).await?;
    info!(
        "wrote {} merged pull requests and {} closed issues to {}",
        report.merged_prs.len(),
        report.closed_issues.len(),
        config.output.display()
    );
    Ok(())
}

/// Start of the completed-task search and of the one day wider goal search.
fn search_starts(now: DateTime<Utc>, period: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let completed_since = Window::trailing_days(now, period)?.start();
    let goal_since = completed_since
        .checked_sub_signed(Duration::days(1))
        .ok_or_else(|| PulseError::Config(format!("period of {period} days is out of range")))?;
    Ok((completed_since, goal_since))
}

/// Gather the Asana and GitHub sections concurrently.
async fn collect_report<S, C, T>(
    config: &ReportConfig,
    activity: &GitHubActivity<S, C>,
    tasks: &T,
    context: &TaskContext,
    now: DateTime<Utc>,
) -> Result<ActivityReport>
where
    S: ActivitySource,
    C: Clock,
    T: TaskSource,
{
    let (completed_since, goal_since) = search_starts(now, config.period)?;

    let task_section = async {
        tokio::try_join!(
            tasks.find_goal(context, goal_since),
            tasks.find_completed_tasks(context, completed_since)
        )
    };
    let github_section = async {
        tokio::try_join!(
            activity.closed_issues(&config.user, &config.repo, config.period),
            activity.merged_pull_requests(&config.user, &config.repo, config.period, &config.base)
        )
    };
    let ((goal, completed), (issues, merged)) = tokio::try_join!(task_section, github_section)?;

    Ok(ActivityReport::new(
        config.period,
        goal,
        completed,
        issues,
        merged.as_ref().clone(),
    ))
}

fn render(report: &ActivityReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(render_report_markdown(report)),
        OutputFormat::Json => render_json(report),
    }
}

async fn write_report(path: &Path, contents: &str) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}
