//! Shared reqwest plumbing for the GitHub and Asana clients.

use devpulse_core::{PageCursor, PulseError, Result};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Response};

/// User agent sent with every request.
pub(crate) const USER_AGENT: &str = "devpulse-cli";

/// Build the reqwest client used by both services.
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(transport_error)
}

/// Map a reqwest failure that produced no usable response.
pub(crate) fn transport_error(err: reqwest::Error) -> PulseError {
    PulseError::Transport(err.to_string())
}

/// Map a body decoding failure.
pub(crate) fn decode_error(err: reqwest::Error) -> PulseError {
    PulseError::Decode(err.to_string())
}

/// Turn non-success statuses into [`PulseError::Api`], keeping the body.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = error_body(response.text().await);
    Err(PulseError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Body of an error response, or a note saying why it could not be read.
fn error_body<E: std::fmt::Display>(body: std::result::Result<String, E>) -> String {
    body.unwrap_or_else(|err| format!("<unreadable body: {err}>"))
}

/// Extract the `rel="next"` target from a `Link` header.
pub(crate) fn next_page_cursor(headers: &HeaderMap) -> Option<PageCursor> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim().replace(' ', "") == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(PageCursor(url.to_string()))
    })
}

/// Trim trailing slashes so paths can be appended with `/`.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(PulseError::Config("api url is required".to_string()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
