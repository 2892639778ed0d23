//! The engine facade: logins, logout, cached reads and the update loops.

use std::sync::Arc;

use mailsync_oauth::{AuthorizationCodeFlow, CodeSender, PendingAuthorization};
use tracing::{info, warn};

use crate::account::{
    Account, AccountId, AuthMaterial, Credential, CredentialProvider, OAuthCredential,
    parse_endpoint, provider_imap_url,
};
use crate::config::{EngineConfig, OAuthSettings};
use crate::notify::EventNotifier;
use crate::protocol::{ImapProtocol, MailProtocol};
use crate::scheduler::UpdateScheduler;
use crate::session::SessionTarget;
use crate::store::{CacheStore, ConsistencyPolicy, MessageSummary, RemoteMessage};
use crate::sync::{SyncContext, SyncOutcome};
use crate::{Error, Result};

/// IMAP host assumed for OAuth logins whose domain has no preset.
const OAUTH_FALLBACK_HOST: &str = "outlook.office365.com";

/// An OAuth login waiting for the user to authorize in a browser.
///
/// Hand the [`CodeSender`] returned next to it to the redirect listener,
/// then pass this to [`Engine::complete_oauth`].
#[derive(Debug)]
pub struct OAuthLogin {
    email: String,
    imap_url: String,
    pending: PendingAuthorization,
}

impl OAuthLogin {
    /// URL to open in the browser.
    #[must_use]
    pub fn authorization_url(&self) -> &str {
        self.pending.url().as_str()
    }

    /// `state` the redirect must echo.
    #[must_use]
    pub fn state(&self) -> &str {
        self.pending.state()
    }

    /// Address being logged in.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// IMAP server the account will use.
    #[must_use]
    pub fn imap_url(&self) -> &str {
        &self.imap_url
    }
}

/// Mail sync engine for any number of accounts.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    ctx: SyncContext,
    scheduler: UpdateScheduler,
    oauth: Option<AuthorizationCodeFlow>,
}

impl Engine {
    /// Opens the database under the configured data directory and wires
    /// the IMAP protocol.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or database cannot be
    /// created, or the OAuth settings are invalid.
    pub async fn open(config: EngineConfig, notifier: Arc<dyn EventNotifier>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let store = CacheStore::new(&config.database_path()).await?;
        info!(path = %config.database_path().display(), "cache opened");
        Self::with_parts(config, store, Arc::new(ImapProtocol::new()), notifier)
    }

    /// Builds an engine from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the OAuth settings are invalid.
    pub fn with_parts(
        config: EngineConfig,
        store: CacheStore,
        protocol: Arc<dyn MailProtocol>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Result<Self> {
        let client = config.oauth.as_ref().map(OAuthSettings::client).transpose()?;
        let credentials = CredentialProvider::new(store.clone(), client.clone());

        let ctx = SyncContext::new(store, protocol, credentials, notifier)
            .with_imap_port(config.imap_port)
            .with_mailbox_policy(ConsistencyPolicy::Ttl(config.mailbox_ttl()));
        let scheduler = UpdateScheduler::new(
            ctx.clone(),
            config.mailbox_interval(),
            config.message_interval(),
        );

        Ok(Self {
            config,
            ctx,
            scheduler,
            oauth: client.map(AuthorizationCodeFlow::new),
        })
    }

    /// Settings the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The sync context, for on-demand syncs.
    #[must_use]
    pub const fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// The update loops.
    #[must_use]
    pub const fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    /// Starts the update loops of every account that still has credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the accounts cannot be read.
    pub async fn restore(&self) -> Result<Vec<AccountId>> {
        let ids: Vec<AccountId> = self
            .ctx
            .store()
            .accounts()
            .await?
            .into_iter()
            .filter(Account::is_logged_in)
            .map(|account| account.id)
            .collect();

        for id in &ids {
            self.scheduler.start(*id);
        }
        info!(accounts = ids.len(), "sessions restored");
        Ok(ids)
    }

    /// Logs in with a password after proving it works against the server.
    ///
    /// An empty `imap_url` is filled from the provider presets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no server is known, and the session
    /// error if the server rejects the login. Nothing is stored then.
    pub async fn login_password(
        &self,
        imap_url: &str,
        email: &str,
        password: &str,
    ) -> Result<AccountId> {
        let imap_url = if imap_url.trim().is_empty() {
            provider_imap_url(email, self.config.imap_port)
                .ok_or_else(|| Error::Config(format!("no IMAP server known for {email}")))?
        } else {
            imap_url.trim().to_string()
        };

        let auth = AuthMaterial::Login {
            user: email.to_string(),
            password: password.to_string(),
        };
        self.verify(&imap_url, auth).await?;

        let credential = Credential::Password(password.to_string());
        self.finish_login(email, &imap_url, &credential).await
    }

    /// Starts an OAuth login for `email`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when OAuth is not configured.
    pub fn begin_oauth(&self, email: &str) -> Result<(OAuthLogin, CodeSender)> {
        let flow = self.oauth_flow()?;
        let scopes = self
            .config
            .oauth
            .as_ref()
            .and_then(OAuthSettings::requested_scopes);
        let (pending, sender) = flow.begin(scopes)?;

        let imap_url = provider_imap_url(email, self.config.imap_port)
            .unwrap_or_else(|| format!("{OAUTH_FALLBACK_HOST}:{}", self.config.imap_port));
        info!(email, "OAuth login started");

        Ok((
            OAuthLogin {
                email: email.to_string(),
                imap_url,
                pending,
            },
            sender,
        ))
    }

    /// Waits for the redirect, exchanges the code, proves the token with an
    /// XOAUTH2 session and stores the account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] for a denied, mismatched or timed
    /// out authorization, and the session error if the server rejects the
    /// token.
    pub async fn complete_oauth(&self, login: OAuthLogin) -> Result<AccountId> {
        let flow = self.oauth_flow()?;
        let token = login
            .pending
            .complete(flow.client(), self.config.oauth_timeout())
            .await
            .map_err(|e| {
                warn!(email = %login.email, error = %e, "authorization failed");
                Error::from(e)
            })?;

        let auth = AuthMaterial::XOAuth2 {
            user: login.email.clone(),
            access_token: token.access_token.clone(),
        };
        self.verify(&login.imap_url, auth).await?;

        let credential = Credential::OAuth(OAuthCredential {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone().unwrap_or_default(),
            expiry: token.expiry_unix(),
        });
        self.finish_login(&login.email, &login.imap_url, &credential).await
    }

    /// Clears the account's credentials, stops its loops and announces the
    /// logout. The cached mail stays.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] for an unknown account.
    pub async fn logout(&self, id: AccountId) -> Result<()> {
        self.ctx.store().require_account(id).await?;
        self.scheduler.stop(id);
        self.ctx.sign_out(id).await
    }

    /// Every stored account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.ctx.store().accounts().await
    }

    /// Ids of the accounts that are logged in.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn account_ids(&self) -> Result<Vec<AccountId>> {
        Ok(self
            .accounts()
            .await?
            .into_iter()
            .filter(Account::is_logged_in)
            .map(|account| account.id)
            .collect())
    }

    /// True when the account exists and has credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_logged_in(&self, id: AccountId) -> Result<bool> {
        Ok(self.ctx.logged_in_account(id).await?.is_some())
    }

    /// Mailbox names, from cache while fresh.
    ///
    /// # Errors
    ///
    /// See [`SyncContext::get_mailboxes`].
    pub async fn get_mailboxes(&self, id: AccountId) -> Result<Vec<String>> {
        let result = self.ctx.get_mailboxes(id).await;
        self.stop_if_signed_out(id, result)
    }

    /// A page of cached messages, newest first. An empty mailbox cache is
    /// synced once first. `limit` defaults to the configured page size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the account is not logged in,
    /// the sync error when nothing is cached, or a database error.
    pub async fn get_emails(
        &self,
        id: AccountId,
        mailbox: &str,
        start: u32,
        limit: Option<u32>,
    ) -> Result<Vec<MessageSummary>> {
        if self.ctx.store().message_count(id, mailbox).await? == 0 {
            let outcome = self.ctx.sync_messages(id, mailbox).await;
            if let SyncOutcome::LoggedOut = self.stop_if_signed_out(id, outcome)? {
                return Err(Error::Authentication(format!("account {id} is not logged in")));
            }
        }

        let limit = limit.unwrap_or(self.config.page_size);
        self.ctx.store().messages(id, mailbox, start, limit).await
    }

    /// The message body, HTML preferred.
    ///
    /// # Errors
    ///
    /// See [`SyncContext::get_body`].
    pub async fn get_body(&self, id: AccountId, mailbox: &str, uid: u32) -> Result<String> {
        let result = self.ctx.get_body(id, mailbox, uid).await;
        self.stop_if_signed_out(id, result)
    }

    /// A page of the server's undeleted messages, newest first. Nothing is
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the account is not logged in
    /// (rejected credentials also sign it out), and transport or protocol
    /// failures otherwise.
    pub async fn browse_remote(
        &self,
        id: AccountId,
        mailbox: &str,
        start: u32,
        limit: Option<u32>,
    ) -> Result<Vec<RemoteMessage>> {
        let Some(account) = self.ctx.logged_in_account(id).await? else {
            return Err(Error::Authentication(format!("account {id} is not logged in")));
        };
        let limit = limit.unwrap_or(self.config.page_size);

        let result = match self.ctx.target(&account).await {
            Ok(target) => self.ctx.protocol().browse(&target, mailbox, start, limit).await,
            Err(e) => Err(e),
        };
        if result.as_ref().is_err_and(Error::is_authentication) {
            self.ctx.sign_out(id).await?;
        }
        self.stop_if_signed_out(id, result)
    }

    /// Stops every update loop.
    pub fn shutdown(&self) {
        self.scheduler.stop_all();
        info!("engine stopped");
    }

    fn oauth_flow(&self) -> Result<&AuthorizationCodeFlow> {
        self.oauth
            .as_ref()
            .ok_or_else(|| Error::Config("OAuth is not configured".to_string()))
    }

    async fn verify(&self, imap_url: &str, auth: AuthMaterial) -> Result<()> {
        let (host, port) = parse_endpoint(imap_url, self.config.imap_port)?;
        let target = SessionTarget {
            host,
            port,
            tls: true,
            auth,
        };
        self.ctx
            .protocol()
            .verify(&target)
            .await
            .inspect_err(|e| warn!(user = target.auth.user(), error = %e, "login rejected"))
    }

    async fn finish_login(
        &self,
        email: &str,
        imap_url: &str,
        credential: &Credential,
    ) -> Result<AccountId> {
        let id = self
            .ctx
            .store()
            .upsert_account(email, imap_url, credential)
            .await?;
        info!(account = %id, email, "logged in");
        self.scheduler.start(id);
        Ok(id)
    }

    fn stop_if_signed_out<T>(&self, id: AccountId, result: Result<T>) -> Result<T> {
        if result.as_ref().is_err_and(Error::is_authentication) {
            self.scheduler.stop(id);
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailsync_oauth::AuthorizationCallback;
    use tokio::sync::broadcast;

    use super::*;
    use crate::config::DEFAULT_REDIRECT_URI;
    use crate::notify::{BroadcastNotifier, SyncEvent};
    use crate::protocol::mock::{Failure, MockProtocol};
    use crate::sync::testing::token_endpoint;

    struct Harness {
        engine: Engine,
        remote: MockProtocol,
        events: broadcast::Receiver<SyncEvent>,
    }

    async fn harness(config: EngineConfig) -> Harness {
        let store = CacheStore::in_memory().await.unwrap();
        let remote = MockProtocol::new();
        let notifier = BroadcastNotifier::default();
        let events = notifier.subscribe();
        let engine =
            Engine::with_parts(config, store, Arc::new(remote.clone()), Arc::new(notifier)).unwrap();
        Harness {
            engine,
            remote,
            events,
        }
    }

    fn oauth_config() -> EngineConfig {
        EngineConfig {
            oauth: Some(OAuthSettings {
                client_id: "client".into(),
                client_secret: None,
                redirect_uri: DEFAULT_REDIRECT_URI.into(),
                scopes: Vec::new(),
                auth_url: None,
                token_url: None,
            }),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_password_login_and_logout() {
        let mut h = harness(EngineConfig::default()).await;

        let id = h
            .engine
            .login_password("imap.example.com:993", "user@example.com", "pw")
            .await
            .unwrap();

        assert!(h.engine.is_logged_in(id).await.unwrap());
        assert_eq!(h.engine.account_ids().await.unwrap(), [id]);
        assert!(h.engine.scheduler().is_running(id));

        h.engine.logout(id).await.unwrap();

        assert!(!h.engine.is_logged_in(id).await.unwrap());
        assert!(!h.engine.scheduler().is_running(id));
        let account = h.engine.context().store().require_account(id).await.unwrap();
        assert_eq!(account.credential, Credential::LoggedOut);
        assert_eq!(account.email, "user@example.com");

        let mut saw_logout = false;
        while let Ok(event) = h.events.try_recv() {
            saw_logout |= event == SyncEvent::UserLoggedOut { account: id };
        }
        assert!(saw_logout);
    }

    #[tokio::test]
    async fn test_rejected_password_stores_nothing() {
        let h = harness(EngineConfig::default()).await;
        h.remote.fail_with(Some(Failure::Authentication));

        let err = h
            .engine
            .login_password("imap.example.com", "user@example.com", "wrong")
            .await
            .unwrap_err();

        assert!(err.is_authentication());
        assert!(h.engine.accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_password_login_uses_preset_server() {
        let h = harness(EngineConfig::default()).await;

        let id = h
            .engine
            .login_password("", "someone@gmail.com", "app-password")
            .await
            .unwrap();
        let account = h.engine.context().store().require_account(id).await.unwrap();
        assert_eq!(account.imap_url, "imap.gmail.com:993");

        let err = h
            .engine
            .login_password("", "someone@unknown.example", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_logout_unknown_account() {
        let h = harness(EngineConfig::default()).await;
        let err = h.engine.logout(AccountId(42)).await.unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_emails_syncs_empty_mailbox_first() {
        let h = harness(EngineConfig::default()).await;
        let id = h
            .engine
            .login_password("imap.example.com", "user@example.com", "pw")
            .await
            .unwrap();
        h.engine.scheduler().stop(id);
        for uid in 1..=12 {
            h.remote.add_message("Archive", uid, &format!("m{uid}"));
        }

        let page = h.engine.get_emails(id, "Archive", 0, None).await.unwrap();

        assert_eq!(page.len(), 10);
        assert_eq!(page[0].uid, 12);
        assert_eq!(page[9].uid, 3);
        let rest = h.engine.get_emails(id, "Archive", 10, None).await.unwrap();
        assert_eq!(rest.iter().map(|m| m.uid).collect::<Vec<_>>(), [2, 1]);
    }

    #[tokio::test]
    async fn test_get_emails_for_logged_out_account() {
        let h = harness(EngineConfig::default()).await;
        let id = h
            .engine
            .login_password("imap.example.com", "user@example.com", "pw")
            .await
            .unwrap();
        h.engine.logout(id).await.unwrap();

        let err = h.engine.get_emails(id, "INBOX", 0, None).await.unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_browse_remote_is_read_only() {
        let h = harness(EngineConfig::default()).await;
        let id = h
            .engine
            .login_password("imap.example.com", "user@example.com", "pw")
            .await
            .unwrap();
        h.engine.scheduler().stop(id);
        for uid in [3, 10, 7, 1] {
            h.remote.add_message("INBOX", uid, "x");
        }

        let page = h.engine.browse_remote(id, "INBOX", 1, Some(2)).await.unwrap();
        assert_eq!(page.iter().map(|m| m.uid).collect::<Vec<_>>(), [7, 3]);
        assert!(h.engine.browse_remote(id, "INBOX", 4, Some(2)).await.unwrap().is_empty());
        assert_eq!(
            h.engine.context().store().message_count(id, "INBOX").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_restore_starts_logged_in_accounts_only() {
        let h = harness(EngineConfig::default()).await;
        let store = h.engine.context().store();
        let active = store
            .upsert_account("a@example.com", "h:993", &Credential::Password("pw".into()))
            .await
            .unwrap();
        store
            .upsert_account("b@example.com", "h:993", &Credential::LoggedOut)
            .await
            .unwrap();

        let restored = h.engine.restore().await.unwrap();

        assert_eq!(restored, [active]);
        assert_eq!(h.engine.scheduler().running(), [active]);
        h.engine.shutdown();
        assert!(h.engine.scheduler().running().is_empty());
    }

    #[tokio::test]
    async fn test_oauth_requires_configuration() {
        let h = harness(EngineConfig::default()).await;
        assert!(matches!(
            h.engine.begin_oauth("user@outlook.com"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_begin_oauth_builds_pkce_url() {
        let h = harness(oauth_config()).await;

        let (login, sender) = h.engine.begin_oauth("user@gmail.com").unwrap();

        assert_eq!(login.state(), sender.state());
        assert_eq!(login.imap_url(), "imap.gmail.com:993");
        let url = login.authorization_url();
        assert!(url.starts_with("https://login.microsoftonline.com/"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", login.state())));

        let (other, _) = h.engine.begin_oauth("someone@example.org").unwrap();
        assert_eq!(other.imap_url(), "outlook.office365.com:993");
        assert_ne!(other.state(), login.state());
    }

    #[tokio::test]
    async fn test_complete_oauth_exchanges_code_and_stores_token() {
        let (token_url, server) = token_endpoint(
            r#"{"access_token":"AT1","refresh_token":"RT1","token_type":"Bearer","expires_in":3600}"#,
        )
        .await;
        let mut config = oauth_config();
        if let Some(oauth) = config.oauth.as_mut() {
            oauth.auth_url = Some("http://127.0.0.1/authorize".into());
            oauth.token_url = Some(token_url);
        }
        let h = harness(config).await;

        let (login, sender) = h.engine.begin_oauth("user@outlook.com").unwrap();
        let query = format!("code=abc&state={}", login.state());
        sender
            .deliver(AuthorizationCallback::from_query(&query))
            .unwrap();

        let id = h.engine.complete_oauth(login).await.unwrap();
        h.engine.scheduler().stop(id);
        let form = server.await.unwrap();

        assert!(form.contains("grant_type=authorization_code"));
        assert!(form.contains("code=abc"));
        assert!(form.contains("code_verifier="));
        assert!(form.contains("client_id=client"));

        let account = h.engine.context().store().require_account(id).await.unwrap();
        assert_eq!(account.imap_url, "outlook.office365.com:993");
        let Credential::OAuth(token) = account.credential else {
            panic!("expected an OAuth credential");
        };
        assert_eq!(token.access_token, "AT1");
        assert_eq!(token.refresh_token, "RT1");
        assert!(token.expiry > chrono::Utc::now().timestamp());
        assert!(h.remote.sessions() >= 1);
    }

    #[tokio::test]
    async fn test_denied_oauth_stores_nothing() {
        let h = harness(oauth_config()).await;
        let (login, sender) = h.engine.begin_oauth("user@outlook.com").unwrap();
        let query = format!("error=access_denied&state={}", login.state());
        sender
            .deliver(AuthorizationCallback::from_query(&query))
            .unwrap();

        let err = h.engine.complete_oauth(login).await.unwrap_err();

        assert!(err.is_authentication());
        assert!(h.engine.accounts().await.unwrap().is_empty());
        assert_eq!(h.remote.sessions(), 0);
    }

    #[tokio::test]
    async fn test_oauth_state_mismatch_is_rejected() {
        let h = harness(oauth_config()).await;
        let (login, sender) = h.engine.begin_oauth("user@outlook.com").unwrap();
        sender
            .deliver(AuthorizationCallback::from_query("code=abc&state=forged"))
            .unwrap();

        let err = h.engine.complete_oauth(login).await.unwrap_err();
        assert!(err.is_authentication());
    }
}
