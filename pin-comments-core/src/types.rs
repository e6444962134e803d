use serde::{Deserialize, Serialize};

/// Page path assigned to comments whose record carries no page.
pub const DEFAULT_PAGE: &str = "/";

/// A pinned comment placed at a page-absolute position.
///
/// Comments are keyed by UUID v4 text. `timestamp` is the client-side creation
/// time (ISO-8601); `created_at` is the server-assigned time and is only present
/// on records that came back from the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub timestamp: String,
    #[serde(default = "default_page")]
    pub page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Display order equals insertion order.
    #[serde(default)]
    pub replies: Vec<Reply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A reply in a comment thread. Has no lifecycle apart from its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub timestamp: String,
}

/// A page-absolute pixel position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Location and credential of the remote comment table.
///
/// Serialized as-is into the local cache under the `backend-config` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, without a trailing slash.
    pub url: String,
    /// Access token sent as both `apikey` and bearer credential.
    pub token: String,
}

impl BackendConfig {
    /// Builds a config, stripping one trailing `/` from the URL.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        let url = url.into();
        let url = url.strip_suffix('/').map(str::to_owned).unwrap_or(url);
        Self { url, token: token.into() }
    }
}

/// Where comments are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Local cache only; no backend configured.
    #[default]
    Local,
    /// Local cache plus the remote table.
    Remote,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Remote => "remote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Mode::Local),
            "remote" => Some(Mode::Remote),
            _ => None,
        }
    }
}

/// Screen corner hosting the floating comment button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ButtonCorner {
    #[default]
    BottomRight,
    BottomLeft,
}

impl ButtonCorner {
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonCorner::BottomRight => "bottom-right",
            ButtonCorner::BottomLeft => "bottom-left",
        }
    }
}

/// Fresh collision-resistant identity for a comment or reply.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time as ISO-8601 UTC with millisecond precision.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn default_page() -> String {
    DEFAULT_PAGE.to_owned()
}
