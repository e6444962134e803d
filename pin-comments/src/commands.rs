//! Subcommand handlers. Each one drives the core through the same entry points
//! an embedded UI would use.

use anyhow::{anyhow, bail, Context, Result};
use pin_comments_core::cache::LocalCache;
use pin_comments_core::config::{resolve, Options, Persisted, Resolved};
use pin_comments_core::schema::setup_sql;
use pin_comments_core::setup::{SetupFlow, SetupOutcome, SetupStep};
use pin_comments_core::sync::SyncStatus;
use pin_comments_core::{Activation, Comment, CommentStore, RestClient};

use crate::cli::{Command, SetupCommand};

/// Everything a command needs, assembled once at startup.
pub struct Session {
    pub cache: LocalCache,
    pub resolved: Resolved,
    pub page: String,
}

impl Session {
    pub async fn new(cache: LocalCache, options: &Options, page: String) -> Result<Self> {
        let persisted = Persisted::load(&cache).await.context("reading saved setup")?;
        let resolved = resolve(options, &persisted);
        tracing::debug!(
            mode = resolved.mode.as_str(),
            setup_complete = resolved.setup_complete,
            table = %resolved.table,
            "resolved options"
        );
        Ok(Self { cache, resolved, page })
    }

    /// Hydrates the store and merges in the remote set once.
    async fn store(&self) -> Result<CommentStore> {
        let remote = self
            .resolved
            .backend
            .clone()
            .map(|config| RestClient::new(config, &self.resolved.table))
            .transpose()
            .context("building backend client")?;
        let mut store = CommentStore::open(
            self.cache.clone(),
            &self.page,
            self.resolved.setup_complete,
            remote,
        )
        .await
        .context("reading comment cache")?;
        if let Some(n) = store.load_remote().await {
            tracing::debug!(fetched = n, "loaded remote comments");
        }
        Ok(store)
    }
}

pub async fn run(session: &Session, command: Command) -> Result<()> {
    let command = match command {
        Command::Setup(setup) => return run_setup(session, setup).await,
        Command::Sql => {
            println!("{}", setup_sql(&session.resolved.table));
            return Ok(());
        }
        other => other,
    };

    let mut store = session.store().await?;
    let result = match command {
        Command::Status => {
            print_status(session, &store);
            Ok(())
        }
        Command::ResetSetup => {
            store.reset_setup().await.context("clearing saved setup")?;
            println!("Setup cleared. Run `pin-comments setup` to choose storage again.");
            Ok(())
        }
        Command::Name { name, reset } => set_or_show_name(&mut store, name, reset).await,
        Command::List { all } => {
            list(&store, all);
            Ok(())
        }
        Command::Add { x, y, text } => add(&mut store, x, y, &text).await,
        Command::Reply { comment, text } => {
            let id = comment_target(&store, &comment)?;
            let reply = store.add_reply(&id, &text).await?;
            println!("Replied {} ({})", reply.id, sync_label(store.sync_status(&id)));
            Ok(())
        }
        Command::Delete { comment } => {
            let id = comment_target(&store, &comment)?;
            store.delete_comment(&id).await;
            if store.comment(&id).is_some() {
                bail!("backend refused the delete; comment {id} was kept");
            }
            println!("Deleted {id}");
            Ok(())
        }
        Command::DeleteReply { comment, reply } => {
            let id = comment_target(&store, &comment)?;
            let reply_id = reply_target(&store, &id, &reply)?;
            store.delete_reply(&id, &reply_id).await;
            println!("Deleted reply {reply_id} ({})", sync_label(store.sync_status(&id)));
            Ok(())
        }
        Command::Setup(_) | Command::Sql => Ok(()),
    };

    store.flush().await.context("writing comment cache")?;
    result
}

async fn run_setup(session: &Session, setup: SetupCommand) -> Result<()> {
    let mut flow = SetupFlow::new(&session.resolved.table);
    match setup {
        SetupCommand::Local => {
            flow.choose_local(&session.cache).await?;
            println!("Comments will be kept in the local cache only.");
        }
        SetupCommand::Remote { url, token } => {
            flow.choose_remote()?;
            flow.set_credentials(&url, &token);
            flow.submit_credentials()?;
            println!("Run this SQL against your database if you have not already:\n");
            println!("{}", flow.sql());

            let client = RestClient::new(flow.backend_config(), flow.table())?;
            match flow.test_connection(&client, &session.cache).await? {
                Some(SetupOutcome::Remote(config)) => println!("Connected to {}", config.url),
                Some(SetupOutcome::Local) => {}
                None => {
                    let message = match flow.step() {
                        SetupStep::Failed(message) => message.clone(),
                        other => format!("setup stopped at {}", other.name()),
                    };
                    bail!(message);
                }
            }
        }
    }
    Ok(())
}

fn print_status(session: &Session, store: &CommentStore) {
    let r = &session.resolved;
    println!("mode:      {}", r.mode.as_str());
    match &r.backend {
        Some(config) => println!("backend:   {} (table {})", config.url, r.table),
        None if r.setup_complete => println!("backend:   none"),
        None => println!("backend:   not set up"),
    }
    println!("prefix:    {}", r.prefix);
    println!("button:    {}", r.position.as_str());
    println!("name:      {}", store.user_name().unwrap_or("(not set)"));
    println!("page:      {}", store.current_page());
    println!(
        "comments:  {} on this page, {} total",
        store.page_comments().len(),
        store.comments().len()
    );
}

async fn set_or_show_name(store: &mut CommentStore, name: Option<String>, reset: bool) -> Result<()> {
    if reset {
        store.reset_user_name().await;
        println!("Display name cleared.");
        return Ok(());
    }
    match name {
        Some(name) => {
            store.set_user_name(&name).await?;
            println!("Display name set to {}", store.user_name().unwrap_or_default());
        }
        None => match store.user_name() {
            Some(name) => println!("{name}"),
            None => println!("(not set)"),
        },
    }
    Ok(())
}

fn list(store: &CommentStore, all: bool) {
    if all {
        for comment in store.comments() {
            print_comment(store, None, comment);
        }
        return;
    }
    let page = store.page_comments();
    if page.is_empty() {
        println!("No comments on {}", store.current_page());
    }
    for (i, comment) in page.into_iter().enumerate() {
        print_comment(store, Some(i + 1), comment);
    }
}

fn print_comment(store: &CommentStore, number: Option<usize>, comment: &Comment) {
    let label = match number {
        Some(n) => format!("#{n}"),
        None => comment.page.clone(),
    };
    println!(
        "{label} ({:.0}, {:.0}) {} [{}] {}",
        comment.x,
        comment.y,
        comment.author.as_deref().unwrap_or("anonymous"),
        sync_label(store.sync_status(&comment.id)),
        comment.id
    );
    println!("    {}", comment.text);
    for (i, reply) in comment.replies.iter().enumerate() {
        println!(
            "    {}. {}: {}",
            i + 1,
            reply.author.as_deref().unwrap_or("anonymous"),
            reply.text
        );
    }
}

async fn add(store: &mut CommentStore, x: f64, y: f64, text: &str) -> Result<()> {
    match store.activate() {
        Activation::Active => {}
        Activation::NeedsSetup => bail!("storage is not set up; run `pin-comments setup local` or `setup remote`"),
        Activation::NeedsName => bail!("no display name; run `pin-comments name <NAME>` first"),
    }
    store.place_pin(x, y);
    let comment = store.add_comment(text).await?;
    let number = store
        .page_comments()
        .iter()
        .position(|c| c.id == comment.id)
        .map_or(0, |i| i + 1);
    println!(
        "Added #{number} on {} ({})",
        comment.page,
        sync_label(store.sync_status(&comment.id))
    );
    Ok(())
}

fn sync_label(status: Option<SyncStatus>) -> &'static str {
    match status {
        None => "local",
        Some(SyncStatus::Pending) => "pending",
        Some(SyncStatus::Confirmed) => "saved",
        Some(SyncStatus::Failed) => "not saved remotely",
    }
}

/// Resolves a pin number on the current page, or a comment id anywhere.
fn comment_target(store: &CommentStore, target: &str) -> Result<String> {
    if let Ok(n) = target.parse::<usize>() {
        if let Some(c) = n.checked_sub(1).and_then(|i| store.page_comments().get(i).copied()) {
            return Ok(c.id.clone());
        }
    }
    store
        .comment(target)
        .map(|c| c.id.clone())
        .ok_or_else(|| anyhow!("no comment {target} on {}", store.current_page()))
}

/// Resolves a reply number within the thread, or a reply id.
fn reply_target(store: &CommentStore, comment_id: &str, target: &str) -> Result<String> {
    let replies = store
        .comment(comment_id)
        .map(|c| c.replies.as_slice())
        .unwrap_or_default();
    if let Ok(n) = target.parse::<usize>() {
        if let Some(r) = n.checked_sub(1).and_then(|i| replies.get(i)) {
            return Ok(r.id.clone());
        }
    }
    replies
        .iter()
        .find(|r| r.id == target)
        .map(|r| r.id.clone())
        .ok_or_else(|| anyhow!("no reply {target} in comment {comment_id}"))
}
