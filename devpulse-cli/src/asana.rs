//! Asana REST client backing the task sections of the report.

use chrono::{DateTime, Utc};
use devpulse_core::{
    CompletedTask, GoalTask, PulseError, Result, SourceFuture, TaskContext, TaskSource,
    latest_goal,
};
use log::debug;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::http::{build_client, check_status, decode_error, normalize_base_url, transport_error};

/// Default Asana API root.
pub const DEFAULT_ASANA_API_URL: &str = "https://app.asana.com/api/1.0";

const DISABLE_HEADER: &str = "Asana-Disable";
const DISABLED_FEATURES: &str = "new_memberships";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct AsanaUser {
    gid: String,
}

#[derive(Debug, Deserialize)]
struct AsanaWorkspace {
    gid: String,
    name: String,
}

/// Asana API client implementation.
#[derive(Debug, Clone)]
pub struct AsanaClient {
    base_url: String,
    token: String,
    goals_project: Option<String>,
    client: Client,
}

impl AsanaClient {
    /// Build a client; goals are only searched when `goals_project` is set.
    pub fn new(base_url: &str, token: &str, goals_project: Option<String>) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            token: token.to_string(),
            goals_project,
            client: build_client()?,
        })
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .header(DISABLE_HEADER, DISABLED_FEATURES)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        let envelope = check_status(response)
            .await?
            .json::<Envelope<T>>()
            .await
            .map_err(decode_error)?;
        Ok(envelope.data)
    }

    /// Id of the user owning the access token.
    pub async fn current_user_id(&self) -> Result<String> {
        let user: AsanaUser = self.get_data("/users/me", &[]).await?;
        Ok(user.gid)
    }

    /// Id of the workspace called `name`.
    pub async fn workspace_id(&self, name: &str) -> Result<String> {
        let workspaces: Vec<AsanaWorkspace> = self.get_data("/workspaces", &[]).await?;
        workspaces
            .into_iter()
            .find(|workspace| workspace.name == name)
            .map(|workspace| workspace.gid)
            .ok_or_else(|| PulseError::NotFound(format!("asana workspace {name}")))
    }

    /// Resolve the user and workspace ids the searches run under.
    pub async fn resolve_context(&self, workspace_name: &str) -> Result<TaskContext> {
        let (user_id, workspace_id) =
            tokio::try_join!(self.current_user_id(), self.workspace_id(workspace_name))?;
        debug!("asana user {user_id} in workspace {workspace_id}");
        Ok(TaskContext {
            user_id,
            workspace_id,
        })
    }

    async fn search_tasks<T: DeserializeOwned>(
        &self,
        context: &TaskContext,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let path = format!("/workspaces/{}/tasks/search", context.workspace_id);
        self.get_data(&path, query).await
    }

    async fn goal(&self, context: &TaskContext, since: DateTime<Utc>) -> Result<Option<GoalTask>> {
        let Some(project) = self.goals_project.as_deref() else {
            debug!("no goals project configured, skipping goal search");
            return Ok(None);
        };
        let since = since.format("%Y-%m-%d").to_string();
        let tasks: Vec<GoalTask> = self
            .search_tasks(
                context,
                &[
                    ("opt_fields", "notes,created_at"),
                    ("created_by.any", context.user_id.as_str()),
                    ("created_on.after", since.as_str()),
                    ("projects.any", project),
                ],
            )
            .await?;
        Ok(latest_goal(tasks))
    }

    async fn completed_tasks(
        &self,
        context: &TaskContext,
        since: DateTime<Utc>,
    ) -> Result<Vec<CompletedTask>> {
        let since = since.format("%Y-%m-%d").to_string();
        self.search_tasks(
            context,
            &[
                ("opt_fields", "notes,name,permalink_url"),
                ("assignee.any", context.user_id.as_str()),
                ("completed_on.after", since.as_str()),
                ("completed", "true"),
            ],
        )
        .await
    }
}

impl TaskSource for AsanaClient {
    fn find_goal<'a>(
        &'a self,
        context: &'a TaskContext,
        since: DateTime<Utc>,
    ) -> SourceFuture<'a, Option<GoalTask>> {
        Box::pin(self.goal(context, since))
    }

    fn find_completed_tasks<'a>(
        &'a self,
        context: &'a TaskContext,
        since: DateTime<Utc>,
    ) -> SourceFuture<'a, Vec<CompletedTask>> {
        Box::pin(self.completed_tasks(context, since))
    }
}
