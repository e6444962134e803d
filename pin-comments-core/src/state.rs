//! Authoritative in-memory comment set for one session.
//!
//! `CommentStore` is hydrated from the local cache, optionally merged with one
//! remote fetch, and flushed back on teardown. Every mutation is applied to
//! memory first, then mirrored into the cache, then pushed to the remote
//! store. Remote failures are logged and leave local state alone, except a
//! failed comment delete, which puts the comment back.
//!
//! Mutations come in two flavours:
//! - `add_comment`, `delete_comment`, `add_reply`, `delete_reply` apply the
//!   change and await the remote write inline;
//! - the `apply_*` variants apply the change and return the [`SyncOp`] for a
//!   [`crate::sync::SyncHandle`]; its outcomes come back through
//!   [`CommentStore::apply_outcome`].

use std::collections::HashSet;

use crate::cache::LocalCache;
use crate::error::{CacheError, Rejected};
use crate::page::{comments_on_page, Interaction, PageScope};
use crate::remote::{RemoteStore, RestClient};
use crate::sync::{propagate, SyncLedger, SyncOp, SyncOutcome, SyncStatus};
use crate::types::{new_id, now_iso, Comment, Position, Reply};

/// Result of asking to enter comment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Storage has not been chosen yet; run the setup flow first.
    NeedsSetup,
    /// No display name yet; prompt for one first.
    NeedsName,
    /// Comment mode is on and the panel is open.
    Active,
}

/// Merges a remote fetch into the current set.
///
/// Fetched entries come first, in fetch order, and replace local entries with
/// the same identity. Entries only known locally follow in their existing
/// relative order, so a comment added while the fetch was in flight survives.
pub fn merge_fetched(current: &[Comment], fetched: Vec<Comment>) -> Vec<Comment> {
    let fetched_ids: HashSet<&str> = fetched.iter().map(|c| c.id.as_str()).collect();
    let local_only: Vec<Comment> = current
        .iter()
        .filter(|c| !fetched_ids.contains(c.id.as_str()))
        .cloned()
        .collect();
    let mut merged = fetched;
    merged.extend(local_only);
    merged
}

/// Session-wide comment state. Owned by the embedding; pass it by reference.
pub struct CommentStore<R = RestClient> {
    comments: Vec<Comment>,
    scope: PageScope,
    user_name: Option<String>,
    setup_complete: bool,
    cache: LocalCache,
    remote: Option<R>,
    sync: SyncLedger,
    /// Identities deleted this session; a late fetch must not bring them back.
    deleted: HashSet<String>,
}

impl<R: RemoteStore> CommentStore<R> {
    /// Hydrates a store from `cache`, starting on `page`.
    ///
    /// `remote` is `None` in local-only mode. Nothing is fetched here; call
    /// [`CommentStore::load_remote`] once the store is up.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cached comment set cannot be read.
    pub async fn open(
        cache: LocalCache,
        page: &str,
        setup_complete: bool,
        remote: Option<R>,
    ) -> Result<Self, CacheError> {
        let comments = cache.load_comments().await?;
        let user_name = cache.load_user_name().await?;
        Ok(Self {
            comments,
            scope: PageScope::new(page),
            user_name,
            setup_complete,
            cache,
            remote,
            sync: SyncLedger::default(),
            deleted: HashSet::new(),
        })
    }

    /// All comments across all pages, in set order.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Comments on the current page.
    pub fn page_comments(&self) -> Vec<&Comment> {
        comments_on_page(&self.comments, self.scope.current())
    }

    /// Pins to draw on the current page: the page's comments, or none while
    /// pins are hidden.
    pub fn visible_pins(&self) -> Vec<&Comment> {
        if self.scope.pins_visible() {
            self.page_comments()
        } else {
            Vec::new()
        }
    }

    pub fn pins_visible(&self) -> bool {
        self.scope.pins_visible()
    }

    /// Shows or hides pins without touching the comment set.
    pub fn set_pins_visible(&mut self, visible: bool) {
        self.scope.set_pins_visible(visible);
    }

    pub fn comment(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn current_page(&self) -> &str {
        self.scope.current()
    }

    pub fn interaction(&self) -> &Interaction {
        self.scope.interaction()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn setup_complete(&self) -> bool {
        self.setup_complete
    }

    pub fn remote(&self) -> Option<&R> {
        self.remote.as_ref()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Sync state of a comment relative to its last local change. `None` in
    /// local-only mode or for comments never touched by a remote write.
    pub fn sync_status(&self, id: &str) -> Option<SyncStatus> {
        self.sync.status(id)
    }

    // Interaction

    /// Host notification that the location changed. See
    /// [`PageScope::location_changed`].
    pub fn location_changed(&mut self, path: &str) -> bool {
        self.scope.location_changed(path)
    }

    /// Enters comment mode if storage and a display name are in place.
    pub fn activate(&mut self) -> Activation {
        if !self.setup_complete {
            return Activation::NeedsSetup;
        }
        if self.user_name.is_none() {
            return Activation::NeedsName;
        }
        let i = self.scope.interaction_mut();
        i.active = true;
        i.panel_open = true;
        Activation::Active
    }

    pub fn deactivate(&mut self) {
        self.scope.interaction_mut().deactivate();
    }

    /// Places a pending pin. Ignored outside comment mode.
    pub fn place_pin(&mut self, x: f64, y: f64) -> bool {
        let i = self.scope.interaction_mut();
        if !i.active {
            return false;
        }
        i.pending = Some(Position { x, y });
        true
    }

    /// Opens the thread of comment `id`, or closes it with `None`.
    pub fn select(&mut self, id: Option<&str>) {
        self.scope.interaction_mut().selected = id.map(str::to_owned);
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.scope.interaction_mut().panel_open = open;
    }

    // Identity and setup

    /// Stores the display name used for all later comments and replies.
    pub async fn set_user_name(&mut self, name: &str) -> Result<(), Rejected> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejected::EmptyName);
        }
        if let Err(e) = self.cache.save_user_name(name).await {
            tracing::warn!(error = %e, "failed to persist display name");
        }
        self.user_name = Some(name.to_owned());
        Ok(())
    }

    pub async fn reset_user_name(&mut self) {
        if let Err(e) = self.cache.clear_user_name().await {
            tracing::warn!(error = %e, "failed to clear display name");
        }
        self.user_name = None;
    }

    /// Marks setup as finished, with `remote` for a connected backend or `None`
    /// for local-only mode.
    pub fn complete_setup(&mut self, remote: Option<R>) {
        self.setup_complete = true;
        self.remote = remote;
    }

    /// Forgets the backend and mode so setup runs again. Comments stay.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the persisted setup cannot be cleared; the store
    /// is unchanged in that case.
    pub async fn reset_setup(&mut self) -> Result<(), CacheError> {
        self.cache.clear_setup().await?;
        self.remote = None;
        self.setup_complete = false;
        self.sync.clear();
        self.scope.interaction_mut().deactivate();
        Ok(())
    }

    // Loading

    /// Fetches the remote set once and merges it in.
    ///
    /// Returns the number of fetched records, or `None` in local-only mode or
    /// when the fetch failed (the failure is logged and local state is kept).
    pub async fn load_remote(&mut self) -> Option<usize> {
        let remote = self.remote.as_ref()?;
        let fetched = remote.fetch_all().await;
        match fetched {
            Ok(fetched) => {
                let n = fetched.len();
                self.apply_fetched(fetched).await;
                Some(n)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch comments");
                None
            }
        }
    }

    /// Merges an already fetched remote set. See [`merge_fetched`].
    pub async fn apply_fetched(&mut self, fetched: Vec<Comment>) {
        let fetched: Vec<Comment> = fetched
            .into_iter()
            .filter(|c| !self.deleted.contains(&c.id))
            .collect();
        for c in &fetched {
            self.sync.fetched(&c.id);
        }
        let merged = merge_fetched(&self.comments, fetched);
        if merged != self.comments {
            self.comments = merged;
            self.persist().await;
        }
    }

    /// Writes the full set to the cache.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.cache.save_comments(&self.comments).await
    }

    async fn persist(&self) {
        if let Err(e) = self.flush().await {
            tracing::warn!(error = %e, "failed to write comment cache");
        }
    }

    fn mark_pending(&mut self, id: &str) {
        if self.remote.is_some() {
            self.sync.issued(id);
        }
    }

    // Optimistic mutations

    /// Creates a comment at the pending pin with the trimmed `text`.
    ///
    /// # Errors
    ///
    /// `Rejected::NoPendingPosition` without a placed pin,
    /// `Rejected::EmptyText` for blank text. Nothing changes in either case.
    pub async fn apply_add_comment(&mut self, text: &str) -> Result<SyncOp, Rejected> {
        self.insert_comment(text).await.map(SyncOp::Insert)
    }

    async fn insert_comment(&mut self, text: &str) -> Result<Comment, Rejected> {
        let pos = self
            .scope
            .interaction()
            .pending
            .ok_or(Rejected::NoPendingPosition)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Rejected::EmptyText);
        }

        let comment = Comment {
            id: new_id(),
            x: pos.x,
            y: pos.y,
            text: text.to_owned(),
            timestamp: now_iso(),
            page: self.scope.current().to_owned(),
            author: self.user_name.clone(),
            replies: Vec::new(),
            created_at: None,
        };
        self.comments.push(comment.clone());
        let i = self.scope.interaction_mut();
        i.pending = None;
        i.panel_open = true;

        self.mark_pending(&comment.id);
        self.persist().await;
        Ok(comment)
    }

    /// Removes comment `id`. `None` if there is no such comment.
    pub async fn apply_delete_comment(&mut self, id: &str) -> Option<SyncOp> {
        let index = self.comments.iter().position(|c| c.id == id)?;
        let comment = self.comments.remove(index);
        let i = self.scope.interaction_mut();
        if i.selected.as_deref() == Some(id) {
            i.selected = None;
        }
        self.deleted.insert(comment.id.clone());

        self.mark_pending(id);
        self.persist().await;
        Some(SyncOp::Remove { comment, index })
    }

    /// Appends a reply with the trimmed `text` to comment `comment_id`.
    ///
    /// # Errors
    ///
    /// `Rejected::EmptyText` for blank text, `Rejected::UnknownComment` if the
    /// parent does not exist.
    pub async fn apply_add_reply(
        &mut self,
        comment_id: &str,
        text: &str,
    ) -> Result<SyncOp, Rejected> {
        let (_, replies) = self.insert_reply(comment_id, text).await?;
        Ok(SyncOp::ReplaceReplies { comment_id: comment_id.to_owned(), replies })
    }

    /// Returns the new reply and the parent's full reply list after the append.
    async fn insert_reply(
        &mut self,
        comment_id: &str,
        text: &str,
    ) -> Result<(Reply, Vec<Reply>), Rejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Rejected::EmptyText);
        }
        let reply = Reply {
            id: new_id(),
            text: text.to_owned(),
            author: self.user_name.clone(),
            timestamp: now_iso(),
        };
        let comment = self
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| Rejected::UnknownComment(comment_id.to_owned()))?;
        comment.replies.push(reply.clone());
        let replies = comment.replies.clone();

        self.mark_pending(comment_id);
        self.persist().await;
        Ok((reply, replies))
    }

    /// Removes reply `reply_id` from comment `comment_id`, keeping the order
    /// of the others. `None` if either does not exist.
    pub async fn apply_delete_reply(&mut self, comment_id: &str, reply_id: &str) -> Option<SyncOp> {
        let comment = self.comments.iter_mut().find(|c| c.id == comment_id)?;
        let index = comment.replies.iter().position(|r| r.id == reply_id)?;
        comment.replies.remove(index);
        let replies = comment.replies.clone();

        self.mark_pending(comment_id);
        self.persist().await;
        Some(SyncOp::ReplaceReplies { comment_id: comment_id.to_owned(), replies })
    }

    /// Folds a finished remote write back into local state.
    ///
    /// A failed delete reinserts the comment at its former index (clamped),
    /// unless it has reappeared in the meantime.
    pub async fn apply_outcome(&mut self, outcome: SyncOutcome) {
        let SyncOutcome { op, result } = outcome;
        self.sync.finished(&op, result.is_ok());
        if let (SyncOp::Remove { comment, index }, Err(_)) = (op, result) {
            tracing::warn!(id = %comment.id, "restoring comment after failed delete");
            self.deleted.remove(&comment.id);
            if self.comment(&comment.id).is_none() {
                let index = index.min(self.comments.len());
                self.comments.insert(index, comment);
                self.persist().await;
            }
        }
    }

    /// Pushes `op` to the remote store and applies the outcome. No-op in
    /// local-only mode.
    pub async fn sync(&mut self, op: SyncOp) {
        let outcome = match &self.remote {
            Some(remote) => propagate(remote, op).await,
            None => return,
        };
        self.apply_outcome(outcome).await;
    }

    /// Adds a comment at the pending pin and saves it remotely.
    ///
    /// The comment stays even if the remote write fails.
    pub async fn add_comment(&mut self, text: &str) -> Result<Comment, Rejected> {
        let comment = self.insert_comment(text).await?;
        self.sync(SyncOp::Insert(comment.clone())).await;
        Ok(comment)
    }

    /// Deletes a comment locally and remotely; rolled back if the remote
    /// delete fails. Returns whether the comment existed.
    pub async fn delete_comment(&mut self, id: &str) -> bool {
        match self.apply_delete_comment(id).await {
            Some(op) => {
                self.sync(op).await;
                true
            }
            None => false,
        }
    }

    /// Adds a reply and replaces the parent's replies remotely.
    pub async fn add_reply(&mut self, comment_id: &str, text: &str) -> Result<Reply, Rejected> {
        let (reply, replies) = self.insert_reply(comment_id, text).await?;
        let op = SyncOp::ReplaceReplies { comment_id: comment_id.to_owned(), replies };
        self.sync(op).await;
        Ok(reply)
    }

    /// Deletes a reply and replaces the parent's replies remotely. Returns
    /// whether the reply existed.
    pub async fn delete_reply(&mut self, comment_id: &str, reply_id: &str) -> bool {
        match self.apply_delete_reply(comment_id, reply_id).await {
            Some(op) => {
                self.sync(op).await;
                true
            }
            None => false,
        }
    }
}
