//! Command line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mailsync", version, about = "IMAP sync daemon and cache inspector")]
pub struct Cli {
    /// Configuration file. Falls back to `MAILSYNC_CONFIG`, then the user
    /// config directory.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restore logged-in accounts and keep them synced until interrupted.
    Run,
    /// Add or refresh an account with a password.
    Login {
        /// Email address, also the IMAP user name.
        #[arg(long)]
        email: String,
        /// Password or app password.
        #[arg(long)]
        password: String,
        /// IMAP server as `host:port`. Known providers are filled in.
        #[arg(long, default_value = "")]
        server: String,
    },
    /// Add an account through the browser `OAuth2` flow.
    Oauth {
        /// Email address of the account.
        #[arg(long)]
        email: String,
    },
    /// Sign an account out. Cached mail is kept.
    Logout {
        /// Account id.
        account: i64,
    },
    /// List stored accounts.
    Accounts,
    /// List an account's mailboxes.
    Mailboxes {
        /// Account id.
        account: i64,
    },
    /// Show a page of cached messages, newest first.
    Emails {
        /// Account id.
        account: i64,
        /// Mailbox name.
        mailbox: String,
        /// Rows to skip.
        #[arg(long, default_value_t = 0)]
        start: u32,
        /// Page size. Uses the configured default when unset.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print one message body.
    Body {
        /// Account id.
        account: i64,
        /// Mailbox name.
        mailbox: String,
        /// Message UID.
        uid: u32,
    },
    /// Page through the server's copy of a mailbox without caching.
    Browse {
        /// Account id.
        account: i64,
        /// Mailbox name.
        mailbox: String,
        /// Messages to skip, newest first.
        #[arg(long, default_value_t = 0)]
        start: u32,
        /// Page size. Uses the configured default when unset.
        #[arg(long)]
        limit: Option<u32>,
    },
}
