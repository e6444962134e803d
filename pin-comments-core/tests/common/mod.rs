//! In-memory stand-in for the remote comment table.

#![allow(dead_code)]

use std::future::{ready, Future};
use std::sync::{Arc, Mutex, MutexGuard};

use pin_comments_core::cache::LocalCache;
use pin_comments_core::remote::{CommentPatch, ProbeResult, RemoteStore};
use pin_comments_core::{Comment, CommentStore, RemoteError};

#[derive(Default)]
struct FakeState {
    rows: Vec<Comment>,
    fail_writes: bool,
    fail_fetch: bool,
    probe: Option<ProbeResult>,
    calls: Vec<String>,
}

/// Shared handle; clones see the same table.
#[derive(Clone, Default)]
pub struct FakeRemote {
    inner: Arc<Mutex<FakeState>>,
}

fn refused(op: &'static str) -> RemoteError {
    RemoteError::Status { op, status: 503, body: "unavailable".into() }
}

impl FakeRemote {
    pub fn with_rows(rows: Vec<Comment>) -> Self {
        let fake = Self::default();
        fake.state().rows = rows;
        fake
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state().fail_fetch = fail;
    }

    pub fn set_probe(&self, probe: ProbeResult) {
        self.state().probe = Some(probe);
    }

    pub fn rows(&self) -> Vec<Comment> {
        self.state().rows.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn do_fetch(&self) -> Result<Vec<Comment>, RemoteError> {
        let mut s = self.state();
        s.calls.push("fetch".into());
        if s.fail_fetch {
            return Err(refused("fetch"));
        }
        Ok(s.rows.clone())
    }

    fn do_add(&self, comment: &Comment) -> Result<Comment, RemoteError> {
        let mut s = self.state();
        s.calls.push(format!("add {}", comment.id));
        if s.fail_writes {
            return Err(refused("add"));
        }
        let mut row = comment.clone();
        row.created_at = Some(comment.timestamp.clone());
        s.rows.push(row.clone());
        Ok(row)
    }

    fn do_update(&self, id: &str, patch: &CommentPatch) -> Result<(), RemoteError> {
        let mut s = self.state();
        s.calls.push(format!("update {id}"));
        if s.fail_writes {
            return Err(refused("update"));
        }
        if let Some(row) = s.rows.iter_mut().find(|r| r.id == id) {
            if let Some(replies) = &patch.replies {
                row.replies = replies.clone();
            }
            if let Some(text) = &patch.text {
                row.text = text.clone();
            }
            if let Some(author) = &patch.author {
                row.author = author.clone();
            }
        }
        Ok(())
    }

    fn do_delete(&self, id: &str) -> Result<(), RemoteError> {
        let mut s = self.state();
        s.calls.push(format!("delete {id}"));
        if s.fail_writes {
            return Err(refused("delete"));
        }
        s.rows.retain(|r| r.id != id);
        Ok(())
    }
}

impl RemoteStore for FakeRemote {
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Comment>, RemoteError>> + Send {
        ready(self.do_fetch())
    }

    fn add(&self, comment: &Comment) -> impl Future<Output = Result<Comment, RemoteError>> + Send {
        ready(self.do_add(comment))
    }

    fn update(
        &self,
        id: &str,
        patch: &CommentPatch,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        ready(self.do_update(id, patch))
    }

    fn delete(&self, id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send {
        ready(self.do_delete(id))
    }

    fn test_connection(&self) -> impl Future<Output = ProbeResult> + Send {
        let probe = self.state().probe.clone().unwrap_or_else(ProbeResult::reachable);
        ready(probe)
    }
}

pub fn comment(id: &str, page: &str, text: &str) -> Comment {
    Comment {
        id: id.into(),
        x: 10.0,
        y: 20.0,
        text: text.into(),
        timestamp: "2025-01-01T00:00:00.000Z".into(),
        page: page.into(),
        author: None,
        replies: Vec::new(),
        created_at: None,
    }
}

/// Store on `page` with setup done, a display name, and comment mode on.
pub async fn active_store(
    cache: LocalCache,
    page: &str,
    remote: Option<FakeRemote>,
) -> CommentStore<FakeRemote> {
    let mut store = CommentStore::open(cache, page, true, remote).await.unwrap();
    store.set_user_name("Ada").await.unwrap();
    store.activate();
    store
}

pub async fn memory_cache() -> LocalCache {
    LocalCache::open_in_memory("test:").await.unwrap()
}
