use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Overrides INKTHREAD_TARGET_ID.
    #[arg(long, global = true)]
    pub target: Option<i64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the thread.
    Show {
        /// Pages of top-level comments to load.
        #[arg(long, default_value_t = 1)]
        pages: usize,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Post a comment, or a reply with --parent.
    Post {
        body: String,
        #[arg(long)]
        parent: Option<i64>,
    },
    Edit {
        id: i64,
        body: String,
    },
    Delete {
        id: i64,
    },
    /// Run a scripted session against an in-memory service.
    Demo,
}
