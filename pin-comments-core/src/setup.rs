//! First-run setup flow: choose local-only storage, or connect a backend.
//!
//! ```text
//! Choose ──► LocalOnly
//!   │
//!   └─► Credentials ──► SqlInstructions ──► Testing ──► Connected
//!                              ▲               │
//!                              └──── Failed ◄──┘
//! ```
//!
//! `LocalOnly` and `Connected` are terminal and commit their choice to the
//! local cache. Testing only happens on request; a failed probe waits for the
//! user to retry or go back.

use std::time::Duration;

use crate::cache::LocalCache;
use crate::error::SetupError;
use crate::remote::RemoteStore;
use crate::schema::setup_sql;
use crate::types::{BackendConfig, Mode};

/// Pause between a successful probe and completion, so the success state is
/// visible before the flow closes.
pub const COMPLETION_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupStep {
    Choose,
    Credentials,
    SqlInstructions,
    Testing,
    /// Probe failed; carries the diagnostic message.
    Failed(String),
    Connected(BackendConfig),
    LocalOnly,
}

impl SetupStep {
    pub fn name(&self) -> &'static str {
        match self {
            SetupStep::Choose => "choose",
            SetupStep::Credentials => "credentials",
            SetupStep::SqlInstructions => "sql-instructions",
            SetupStep::Testing => "testing",
            SetupStep::Failed(_) => "failed",
            SetupStep::Connected(_) => "connected",
            SetupStep::LocalOnly => "local-only",
        }
    }
}

/// What the flow committed when it finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Local,
    Remote(BackendConfig),
}

pub struct SetupFlow {
    step: SetupStep,
    url: String,
    token: String,
    table: String,
    completion_delay: Duration,
}

impl SetupFlow {
    pub fn new(table: &str) -> Self {
        Self {
            step: SetupStep::Choose,
            url: String::new(),
            token: String::new(),
            table: table.to_owned(),
            completion_delay: COMPLETION_DELAY,
        }
    }

    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    pub fn step(&self) -> &SetupStep {
        &self.step
    }

    fn invalid(&self, action: &'static str) -> SetupError {
        SetupError::InvalidTransition { from: self.step.name(), action }
    }

    /// Commits local-only mode.
    pub async fn choose_local(&mut self, cache: &LocalCache) -> Result<SetupOutcome, SetupError> {
        if self.step != SetupStep::Choose {
            return Err(self.invalid("choose local storage"));
        }
        cache.save_mode(Mode::Local).await?;
        self.step = SetupStep::LocalOnly;
        Ok(SetupOutcome::Local)
    }

    pub fn choose_remote(&mut self) -> Result<(), SetupError> {
        if self.step != SetupStep::Choose {
            return Err(self.invalid("choose a backend"));
        }
        self.step = SetupStep::Credentials;
        Ok(())
    }

    /// Records the entered credentials. Whitespace around both is dropped.
    pub fn set_credentials(&mut self, url: &str, token: &str) {
        self.url = url.trim().to_owned();
        self.token = token.trim().to_owned();
    }

    /// Moves on to the SQL instructions once both fields are filled in.
    pub fn submit_credentials(&mut self) -> Result<(), SetupError> {
        if self.step != SetupStep::Credentials {
            return Err(self.invalid("submit credentials"));
        }
        if self.url.is_empty() || self.token.is_empty() {
            return Err(SetupError::MissingCredentials);
        }
        self.step = SetupStep::SqlInstructions;
        Ok(())
    }

    /// One step back: Credentials→Choose, SqlInstructions→Credentials,
    /// Failed→SqlInstructions.
    pub fn back(&mut self) -> Result<(), SetupError> {
        self.step = match self.step {
            SetupStep::Credentials => SetupStep::Choose,
            SetupStep::SqlInstructions => SetupStep::Credentials,
            SetupStep::Failed(_) => SetupStep::SqlInstructions,
            _ => return Err(self.invalid("go back")),
        };
        Ok(())
    }

    /// DDL the operator must run against the backend for the configured table.
    pub fn sql(&self) -> String {
        setup_sql(&self.table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Config built from the entered credentials.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(self.url.as_str(), self.token.as_str())
    }

    /// Probes `remote`, which the caller builds from [`Self::backend_config`].
    ///
    /// On success the config and `mode=remote` are persisted and, after the
    /// completion delay, `Some(SetupOutcome::Remote)` is returned. On failure
    /// the flow moves to `Failed` with the probe's message and returns `None`.
    ///
    /// # Errors
    ///
    /// `SetupError::InvalidTransition` outside `SqlInstructions` / `Failed`,
    /// `SetupError::Cache` if the config cannot be persisted.
    pub async fn test_connection<R: RemoteStore>(
        &mut self,
        remote: &R,
        cache: &LocalCache,
    ) -> Result<Option<SetupOutcome>, SetupError> {
        if !matches!(self.step, SetupStep::SqlInstructions | SetupStep::Failed(_)) {
            return Err(self.invalid("test the connection"));
        }
        self.step = SetupStep::Testing;

        let probe = remote.test_connection().await;
        if !probe.ok {
            let message = probe.error.unwrap_or_else(|| "Connection failed".to_owned());
            tracing::info!(%message, "connection probe failed");
            self.step = SetupStep::Failed(message);
            return Ok(None);
        }

        let config = self.backend_config();
        if let Err(e) = persist_remote(cache, &config).await {
            self.step = SetupStep::SqlInstructions;
            return Err(e.into());
        }
        self.step = SetupStep::Connected(config.clone());
        tokio::time::sleep(self.completion_delay).await;
        Ok(Some(SetupOutcome::Remote(config)))
    }
}

async fn persist_remote(
    cache: &LocalCache,
    config: &BackendConfig,
) -> Result<(), crate::error::CacheError> {
    cache.save_backend_config(config).await?;
    cache.save_mode(Mode::Remote).await
}
