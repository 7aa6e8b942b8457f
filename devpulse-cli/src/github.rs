//! GitHub REST client backing the activity collectors.

use devpulse_core::{
    ActivitySource, Event, Page, PageCursor, PullRequest, RepoRef, Result, SourceFuture,
};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::http::{
    build_client, check_status, decode_error, next_page_cursor, normalize_base_url,
    transport_error,
};

/// Default GitHub API root.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";
const EVENTS_PAGE_SIZE: &str = "100";

/// GitHub API client implementation.
#[derive(Debug, Clone)]
pub struct GitHubApiClient {
    base_url: String,
    token: String,
    client: Client,
}

impl GitHubApiClient {
    /// Build a client for `base_url` authenticating with `token`.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            token: token.to_string(),
            client: build_client()?,
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.token)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Page<T>> {
        let response = request
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let next = next_page_cursor(response.headers());
        let items = response.json::<Vec<T>>().await.map_err(decode_error)?;
        Ok(Page { items, next })
    }

    async fn events_page(&self, user: &str, cursor: Option<&PageCursor>) -> Result<Page<Event>> {
        let request = match cursor {
            Some(PageCursor(url)) => self.get(url),
            None => self
                .get(&format!("{}/users/{user}/events", self.base_url))
                .query(&[("per_page", EVENTS_PAGE_SIZE)]),
        };
        self.fetch_page(request).await
    }

    async fn closed_pulls_page(
        &self,
        repo: &RepoRef,
        base: &str,
        per_page: u32,
        cursor: Option<&PageCursor>,
    ) -> Result<Page<PullRequest>> {
        let request = match cursor {
            Some(PageCursor(url)) => self.get(url),
            None => {
                let per_page = per_page.to_string();
                self.get(&format!(
                    "{}/repos/{}/{}/pulls",
                    self.base_url, repo.owner, repo.name
                ))
                .query(&[
                    ("state", "closed"),
                    ("base", base),
                    ("sort", "updated"),
                    ("direction", "desc"),
                    ("per_page", per_page.as_str()),
                ])
            }
        };
        self.fetch_page(request).await
    }

    async fn diff_text(&self, url: &str) -> Result<String> {
        let response = self
            .get(url)
            .header(ACCEPT, DIFF_MEDIA_TYPE)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response)
            .await?
            .text()
            .await
            .map_err(decode_error)
    }
}

impl ActivitySource for GitHubApiClient {
    fn list_events_page<'a>(
        &'a self,
        user: &'a str,
        cursor: Option<&'a PageCursor>,
    ) -> SourceFuture<'a, Page<Event>> {
        Box::pin(self.events_page(user, cursor))
    }

    fn list_closed_pulls_page<'a>(
        &'a self,
        repo: &'a RepoRef,
        base: &'a str,
        per_page: u32,
        cursor: Option<&'a PageCursor>,
    ) -> SourceFuture<'a, Page<PullRequest>> {
        Box::pin(self.closed_pulls_page(repo, base, per_page, cursor))
    }

    fn fetch_diff_text<'a>(&'a self, url: &'a str) -> SourceFuture<'a, String> {
        Box::pin(self.diff_text(url))
    }
}
