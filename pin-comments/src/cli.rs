//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pin_comments_core::config::Options;

#[derive(Parser)]
#[command(name = "pin-comments")]
#[command(about = "Pin comments to page positions and sync them with a REST backend")]
pub struct Cli {
    /// Local cache database (default: $XDG_DATA_HOME/pin-comments/cache.db)
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Backend base URL; together with --token this skips setup
    #[arg(long)]
    pub url: Option<String>,

    /// Backend access token
    #[arg(long)]
    pub token: Option<String>,

    /// Remote table name
    #[arg(long)]
    pub table: Option<String>,

    /// Namespace prefix for local cache keys
    #[arg(long)]
    pub prefix: Option<String>,

    /// Page path the command acts on
    #[arg(long, default_value = "/")]
    pub page: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Flag values as host options, to be merged over the config file.
    pub fn options(&self) -> Options {
        Options {
            url: self.url.clone(),
            token: self.token.clone(),
            table: self.table.clone(),
            prefix: self.prefix.clone(),
            position: None,
            db_path: self.db.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Show storage mode, backend and identity
    Status,

    /// Choose where comments are stored
    #[command(subcommand)]
    Setup(SetupCommand),

    /// Print the SQL that creates the remote table
    Sql,

    /// Forget the stored backend so setup runs again
    ResetSetup,

    /// Show or set the display name
    Name {
        /// New display name
        name: Option<String>,
        /// Forget the stored name
        #[arg(long, conflicts_with = "name")]
        reset: bool,
    },

    /// List pins on the page
    List {
        /// List pins on every page
        #[arg(long)]
        all: bool,
    },

    /// Pin a comment at a page position
    Add {
        x: f64,
        y: f64,
        text: String,
    },

    /// Reply to a comment
    Reply {
        /// Pin number on the page, or comment id
        comment: String,
        text: String,
    },

    /// Delete a comment and its replies
    Delete {
        /// Pin number on the page, or comment id
        comment: String,
    },

    /// Delete one reply
    DeleteReply {
        /// Pin number on the page, or comment id
        comment: String,
        /// Reply number in the thread, or reply id
        reply: String,
    },
}

#[derive(Subcommand)]
pub enum SetupCommand {
    /// Keep comments in the local cache only
    Local,

    /// Connect a backend: prints the table SQL, then tests the connection
    Remote {
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: String,
    },
}
