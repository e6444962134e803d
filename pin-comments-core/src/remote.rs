//! REST client for the remote comment table.
//!
//! Talks to a PostgREST-style endpoint at `<base-url>/rest/v1/<table>`:
//! equality filters as `?id=eq.<id>`, ordering as `?order=created_at.asc`.
//! No retries, no timeouts; a request in flight runs to completion.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::types::{BackendConfig, Comment, Reply, DEFAULT_PAGE};

/// Default remote table name.
pub const DEFAULT_TABLE: &str = "pin_comments";

const REST_ROOT: &str = "rest/v1";

/// Fields a partial update may carry. `None` fields are left out of the patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<Reply>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `Some(None)` clears the author remotely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Option<String>>,
}

impl CommentPatch {
    pub fn replies(replies: Vec<Reply>) -> Self {
        Self { replies: Some(replies), ..Self::default() }
    }
}

/// Diagnostic outcome of a connection probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub ok: bool,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn reachable() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { ok: false, error: Some(message.into()) }
    }
}

/// Storage operations the state model needs from a backend.
///
/// The futures are `Send` so a backend can be driven from a spawned sync
/// worker task.
pub trait RemoteStore: Send + Sync + 'static {
    /// Every record, ordered by server creation time ascending.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Comment>, RemoteError>> + Send;

    /// Inserts a full record and returns the server's version of it.
    fn add(&self, comment: &Comment) -> impl Future<Output = Result<Comment, RemoteError>> + Send;

    /// Applies a partial patch to the record with identity `id`.
    fn update(
        &self,
        id: &str,
        patch: &CommentPatch,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Removes the record with identity `id`.
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Probes the table and classifies the outcome. Never fails.
    fn test_connection(&self) -> impl Future<Output = ProbeResult> + Send;
}

/// Row shape as stored remotely. Missing columns are tolerated.
#[derive(Debug, Deserialize)]
struct Row {
    id: String,
    x: f64,
    y: f64,
    text: String,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    replies: Option<Vec<Reply>>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<Row> for Comment {
    fn from(row: Row) -> Self {
        let page = row
            .page
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PAGE.to_owned());
        let timestamp = row
            .timestamp
            .or_else(|| row.created_at.clone())
            .unwrap_or_default();
        Comment {
            id: row.id,
            x: row.x,
            y: row.y,
            text: row.text,
            timestamp,
            page,
            author: row.author,
            replies: row.replies.unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

/// Insert payload. The client timestamp becomes the server's `created_at`.
#[derive(Debug, Serialize)]
struct NewRow<'a> {
    id: &'a str,
    x: f64,
    y: f64,
    text: &'a str,
    page: &'a str,
    author: Option<&'a str>,
    replies: &'a [Reply],
    created_at: &'a str,
}

impl<'a> From<&'a Comment> for NewRow<'a> {
    fn from(c: &'a Comment) -> Self {
        NewRow {
            id: &c.id,
            x: c.x,
            y: c.y,
            text: &c.text,
            page: &c.page,
            author: c.author.as_deref(),
            replies: &c.replies,
            created_at: &c.timestamp,
        }
    }
}

/// HTTP client bound to one backend and table.
#[derive(Clone)]
pub struct RestClient {
    config: BackendConfig,
    table: String,
    http: Client,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("url", &self.config.url)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Builds a client that sends the access token on every request.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` if the token is not a valid header
    /// value or the HTTP client cannot be constructed.
    pub fn new(config: BackendConfig, table: &str) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .default_headers(default_headers(&config.token))
            .build()?;
        Ok(Self { config, table: table.to_owned(), http })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn collection_url(&self) -> String {
        format!("{}/{}/{}", self.config.url, REST_ROOT, self.table)
    }

    fn id_filter(id: &str) -> [(&'static str, String); 1] {
        [("id", format!("eq.{id}"))]
    }
}

/// Credential and content headers attached to every request.
///
/// A token that cannot be a header value is dropped; the server then answers
/// 401, which the probe reports as a credential problem.
fn default_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let (Ok(key), Ok(bearer)) = (
        HeaderValue::from_str(token),
        HeaderValue::from_str(&format!("Bearer {token}")),
    ) {
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// Turns a non-success response into `RemoteError::Status`, keeping the body.
async fn ensure_success(op: &'static str, resp: Response) -> Result<Response, RemoteError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::Status { op, status, body })
}

impl RemoteStore for RestClient {
    async fn fetch_all(&self) -> Result<Vec<Comment>, RemoteError> {
        let resp = self
            .http
            .get(self.collection_url())
            .query(&[("order", "created_at.asc")])
            .send()
            .await?;
        let resp = ensure_success("fetch", resp).await?;
        let rows: Option<Vec<Row>> = resp.json().await?;
        Ok(rows.unwrap_or_default().into_iter().map(Comment::from).collect())
    }

    async fn add(&self, comment: &Comment) -> Result<Comment, RemoteError> {
        let resp = self
            .http
            .post(self.collection_url())
            .json(&NewRow::from(comment))
            .send()
            .await?;
        let resp = ensure_success("add", resp).await?;
        let body = resp.text().await?;
        let created = serde_json::from_str::<Vec<Row>>(&body)
            .ok()
            .and_then(|rows| rows.into_iter().next())
            .map(Comment::from);
        Ok(created.unwrap_or_else(|| comment.clone()))
    }

    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), RemoteError> {
        let resp = self
            .http
            .patch(self.collection_url())
            .query(&Self::id_filter(id))
            .json(patch)
            .send()
            .await?;
        ensure_success("update", resp).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .http
            .delete(self.collection_url())
            .query(&Self::id_filter(id))
            .send()
            .await?;
        ensure_success("delete", resp).await?;
        Ok(())
    }

    async fn test_connection(&self) -> ProbeResult {
        let resp = match self
            .http
            .get(self.collection_url())
            .query(&[("limit", "1")])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return ProbeResult::failed(format!("Could not reach backend: {e}")),
        };
        if resp.status().is_success() {
            return ProbeResult::reachable();
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        ProbeResult::failed(classify_probe_failure(status, &body))
    }
}

/// Maps a failed probe response to an actionable message.
///
/// A missing table is checked before credentials: PostgREST reports an unknown
/// relation with 404, or with another status and a "relation ... does not
/// exist" body.
pub fn classify_probe_failure(status: u16, body: &str) -> String {
    if status == 404 || (body.contains("relation") && body.contains("does not exist")) {
        return "Table not found. Run the setup SQL against your database.".to_owned();
    }
    if status == 401 {
        return "Authentication failed. Check your access token.".to_owned();
    }
    format!("Connection failed: {status} {body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_wins_over_other_statuses() {
        let msg = classify_probe_failure(404, "");
        assert!(msg.contains("setup SQL"), "{msg}");
        let msg = classify_probe_failure(
            400,
            r#"{"message":"relation \"public.pin_comments\" does not exist"}"#,
        );
        assert!(msg.contains("setup SQL"), "{msg}");
    }

    #[test]
    fn unauthorized_asks_for_credentials() {
        let msg = classify_probe_failure(401, "Invalid API key");
        assert!(msg.contains("Check your access token"), "{msg}");
    }

    #[test]
    fn other_failures_carry_status_and_body() {
        assert_eq!(classify_probe_failure(500, "boom"), "Connection failed: 500 boom");
    }

    #[test]
    fn row_normalizes_missing_fields() {
        let row: Row = serde_json::from_str(
            r#"{"id":"1","x":3.5,"y":4,"text":"hi","page":null,"replies":null,
                "created_at":"2025-01-01T00:00:00+00:00"}"#,
        )
        .unwrap();
        let comment = Comment::from(row);
        assert_eq!(comment.page, "/");
        assert!(comment.replies.is_empty());
        assert_eq!(comment.timestamp, "2025-01-01T00:00:00+00:00");
        assert_eq!(comment.created_at.as_deref(), Some("2025-01-01T00:00:00+00:00"));
    }

    #[test]
    fn patch_serializes_only_supplied_fields() {
        let patch = CommentPatch::replies(Vec::new());
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"replies":[]}"#);

        let patch = CommentPatch { author: Some(None), ..CommentPatch::default() };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"author":null}"#);
    }

    #[test]
    fn insert_payload_maps_timestamp_to_created_at() {
        let comment = Comment {
            id: "c1".into(),
            x: 1.0,
            y: 2.0,
            text: "t".into(),
            timestamp: "2025-06-01T10:00:00.000Z".into(),
            page: "/a".into(),
            author: None,
            replies: Vec::new(),
            created_at: None,
        };
        let json = serde_json::to_value(NewRow::from(&comment)).unwrap();
        assert_eq!(json["created_at"], "2025-06-01T10:00:00.000Z");
        assert_eq!(json["author"], serde_json::Value::Null);
        assert_eq!(json["replies"], serde_json::json!([]));
        assert!(json.get("timestamp").is_none());
    }
}
