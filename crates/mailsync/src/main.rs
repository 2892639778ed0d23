//! `mailsync` - keeps a local IMAP cache current.
//!
//! Without a subcommand the daemon restores every logged-in account, runs
//! its update loops and logs engine events until interrupted. The other
//! subcommands manage accounts and read from the cache.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod callback;
mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mailsync_core::{AccountId, BroadcastNotifier, Engine, EngineConfig, SyncEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsync=info,mailsync_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load_from_env(cli.config).context("failed to load config")?;

    let notifier = Arc::new(BroadcastNotifier::default());
    let event_log = tokio::spawn(log_events(notifier.subscribe()));

    let engine = Engine::open(config, notifier)
        .await
        .context("failed to open the mail cache")?;

    let result = dispatch(&engine, cli.command.unwrap_or(Command::Run)).await;

    engine.shutdown();
    event_log.abort();
    result
}

async fn dispatch(engine: &Engine, command: Command) -> Result<()> {
    match command {
        Command::Run => run(engine).await,
        Command::Login {
            email,
            password,
            server,
        } => {
            let id = engine
                .login_password(&server, &email, &password)
                .await
                .with_context(|| format!("login failed for {email}"))?;
            println!("{id}");
            Ok(())
        }
        Command::Oauth { email } => oauth_login(engine, &email).await,
        Command::Logout { account } => {
            engine.logout(AccountId(account)).await?;
            Ok(())
        }
        Command::Accounts => {
            for account in engine.accounts().await? {
                let state = if account.is_logged_in() {
                    "logged in"
                } else {
                    "logged out"
                };
                println!("{}\t{}\t{}\t{state}", account.id, account.email, account.imap_url);
            }
            Ok(())
        }
        Command::Mailboxes { account } => {
            for name in engine.get_mailboxes(AccountId(account)).await? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Emails {
            account,
            mailbox,
            start,
            limit,
        } => {
            let page = engine
                .get_emails(AccountId(account), &mailbox, start, limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(())
        }
        Command::Body {
            account,
            mailbox,
            uid,
        } => {
            println!("{}", engine.get_body(AccountId(account), &mailbox, uid).await?);
            Ok(())
        }
        Command::Browse {
            account,
            mailbox,
            start,
            limit,
        } => {
            for message in engine
                .browse_remote(AccountId(account), &mailbox, start, limit)
                .await?
            {
                let subject = message.envelope.subject.unwrap_or_default();
                println!("{}\t{subject}", message.uid);
            }
            Ok(())
        }
    }
}

async fn run(engine: &Engine) -> Result<()> {
    let restored = engine.restore().await.context("failed to restore accounts")?;
    if restored.is_empty() {
        warn!("no logged-in accounts; use `mailsync login` or `mailsync oauth` first");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for interrupt")?;
    info!("interrupted, shutting down");
    Ok(())
}

async fn oauth_login(engine: &Engine, email: &str) -> Result<()> {
    let redirect_uri = engine
        .config()
        .oauth
        .as_ref()
        .map(|oauth| oauth.redirect_uri.clone())
        .context("OAuth is not configured")?;
    callback::ensure_loopback(&redirect_uri)?;

    let listener = callback::bind(&redirect_uri).await?;
    let (login, sender) = engine.begin_oauth(email)?;
    println!("Open this URL to sign in:\n\n{}\n", login.authorization_url());

    let capture = tokio::spawn(callback::capture(listener, sender));
    let result = engine.complete_oauth(login).await;
    capture.abort();

    let id = result.with_context(|| format!("OAuth login failed for {email}"))?;
    println!("{id}");
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<SyncEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => info!(event = %line, "engine event"),
                Err(e) => warn!(error = %e, "unprintable event"),
            },
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
