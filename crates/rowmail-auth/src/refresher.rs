//! Background token refresh.
//!
//! A single scheduled task per session keeps the token valid: each tick
//! renews the token when it is expired (or when a force refresh was
//! requested), with bounded exponential backoff on failure. Exhausting
//! the attempts invalidates the session and stops the schedule; the
//! failure then surfaces through `AccessSession::token` instead of
//! killing the host process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::flow::TokenExchanger;
use crate::session::AccessSession;

/// Retry policy for a single refresh cycle.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Initial backoff after a failed attempt.
    pub initial_backoff: Duration,
    /// Cap on the backoff delay.
    pub max_backoff: Duration,
    /// Backoff multiplier between attempts.
    pub backoff_multiplier: f64,
    /// Attempts per cycle before the session is invalidated.
    pub max_attempts: u32,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl RefresherConfig {
    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Builder: set the attempt budget.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Backoff delay before the attempt following `failed_attempts`.
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_backoff.as_secs_f64();
        let multiplier = self.backoff_multiplier.powi(failed_attempts as i32 - 1);
        let delay = base * multiplier;
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// Commands accepted by a running refresher.
#[derive(Debug, Clone)]
pub enum RefresherCommand {
    /// Run a refresh cycle now. With `force`, renew even if the token
    /// has not reached its expiry margin.
    RefreshNow { force: bool },
}

/// Outcome of one refresh cycle.
enum TickOutcome {
    /// Keep the schedule running.
    Continue,
    /// Stop the schedule (cancelled or session invalidated).
    Stop,
}

/// The background refresh task.
pub struct TokenRefresher {
    session: Arc<AccessSession>,
    exchanger: Arc<dyn TokenExchanger>,
    config: RefresherConfig,
}

impl TokenRefresher {
    /// Creates a refresher for the given session.
    pub fn new(
        session: Arc<AccessSession>,
        exchanger: Arc<dyn TokenExchanger>,
        config: RefresherConfig,
    ) -> Self {
        Self {
            session,
            exchanger,
            config,
        }
    }

    /// Spawns the refresh task and returns its handle.
    ///
    /// The tick period is the session's refresh interval. The task stops
    /// when [`RefresherHandle::stop`] is called, when the handle is
    /// dropped, or when the session is invalidated.
    pub fn spawn(self) -> RefresherHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(command_rx, shutdown_rx));

        RefresherHandle {
            command_tx,
            shutdown_tx,
            task,
        }
    }

    async fn run(
        self,
        mut command_rx: mpsc::Receiver<RefresherCommand>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let interval = self.session.refresh_interval();
        info!(
            interval_secs = interval.as_secs(),
            "token refresher started"
        );

        // Ticks race the in-flight exchange against their own view of the
        // shutdown channel; the watch version makes a clone see a stop
        // signalled at any earlier point.
        let mut tick_shutdown = shutdown_rx.clone();

        // Catch-up tick: a token loaded from cache may already be stale.
        if let TickOutcome::Stop = self.tick(false, &mut tick_shutdown).await {
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("token refresher stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let TickOutcome::Stop = self.tick(false, &mut tick_shutdown).await {
                        break;
                    }
                }
                cmd = command_rx.recv() => match cmd {
                    Some(RefresherCommand::RefreshNow { force }) => {
                        debug!(force, "refresh requested");
                        if let TickOutcome::Stop = self.tick(force, &mut tick_shutdown).await {
                            break;
                        }
                    }
                    None => {
                        info!("refresher handle dropped; stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One refresh cycle with bounded backoff.
    async fn tick(&self, force: bool, shutdown_rx: &mut watch::Receiver<bool>) -> TickOutcome {
        if !force && !self.session.is_expired() {
            debug!("token still valid; skipping refresh");
            return TickOutcome::Continue;
        }

        for attempt in 1..=self.config.max_attempts {
            let current = match self.session.token() {
                Ok(token) => token,
                // Invalidated elsewhere; nothing left to refresh.
                Err(_) => return TickOutcome::Stop,
            };

            let result = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    debug!("cancelled; discarding in-flight refresh");
                    return TickOutcome::Stop;
                }
                result = self.exchanger.refresh(current) => result,
            };

            match result {
                Ok(renewed) => {
                    if self.session.set_token(renewed) {
                        info!(attempt, "access token refreshed");
                    } else {
                        debug!("refreshed token lost the replacement race; discarded");
                    }
                    return TickOutcome::Continue;
                }
                Err(err) => {
                    warn!(
                        attempt,
                        max = self.config.max_attempts,
                        error = %err,
                        "token refresh failed"
                    );
                    if attempt < self.config.max_attempts {
                        let delay = self.config.backoff_delay(attempt);
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.changed() => return TickOutcome::Stop,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        error!(
            attempts = self.config.max_attempts,
            "refresh attempts exhausted; invalidating session"
        );
        self.session.invalidate();
        TickOutcome::Stop
    }
}

/// Handle to a running refresher.
#[derive(Debug)]
pub struct RefresherHandle {
    command_tx: mpsc::Sender<RefresherCommand>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl RefresherHandle {
    /// Requests a refresh cycle outside the schedule.
    pub async fn refresh_now(
        &self,
        force: bool,
    ) -> Result<(), mpsc::error::SendError<RefresherCommand>> {
        self.command_tx
            .send(RefresherCommand::RefreshNow { force })
            .await
    }

    /// Signals the task to stop.
    ///
    /// No further ticks fire after this returns; an in-flight refresh is
    /// discarded rather than applied.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for the task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;

    use crate::config::AuthConfig;
    use crate::error::{CredentialError, CredentialResult};
    use crate::flow::BoxFuture;
    use crate::secret::ClientSecret;
    use crate::token::Token;

    fn test_secret() -> ClientSecret {
        ClientSecret {
            client_id: "test-id.apps.googleusercontent.com".to_string(),
            client_secret: "test-secret".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
        }
    }

    fn token_expiring_in(secs: i64, access: &str) -> Token {
        Token::new(
            access,
            "refresh",
            "Bearer",
            Utc::now() + chrono::Duration::seconds(secs),
            vec!["scope-a".to_string()],
        )
    }

    fn session_with(
        dir: &tempfile::TempDir,
        token: Token,
        interval: Duration,
    ) -> Arc<AccessSession> {
        let config = AuthConfig::new(dir.path().join("client_secret.json"))
            .with_token_path(dir.path().join("tokens.json"))
            .with_refresh_interval(interval);
        AccessSession::with_token(test_secret(), token, &config)
    }

    /// Exchanger that renews with a fixed lifetime, or fails per a script.
    struct FakeExchanger {
        calls: AtomicU32,
        failures: Mutex<u32>,
        renew_lifetime_secs: i64,
        delay: Option<Duration>,
    }

    impl FakeExchanger {
        fn succeeding(lifetime_secs: i64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures: Mutex::new(0),
                renew_lifetime_secs: lifetime_secs,
                delay: None,
            })
        }

        fn failing(times: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures: Mutex::new(times),
                renew_lifetime_secs: 3600,
                delay: None,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures: Mutex::new(0),
                renew_lifetime_secs: 3600,
                delay: Some(delay),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenExchanger for FakeExchanger {
        fn refresh(&self, current: Token) -> BoxFuture<'_, CredentialResult<Token>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let fail = {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    true
                } else {
                    false
                }
            };
            let lifetime = self.renew_lifetime_secs;
            let delay = self.delay;

            Box::pin(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if fail {
                    return Err(CredentialError::auth("invalid_grant"));
                }
                let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);
                Ok(current.renewed(format!("renewed-{call}"), expires_at, None))
            })
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..10_000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_is_refreshed_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            &dir,
            token_expiring_in(-10, "stale"),
            Duration::from_secs(60),
        );
        assert!(session.is_expired());

        let exchanger = FakeExchanger::succeeding(3600);
        let handle =
            TokenRefresher::new(session.clone(), exchanger.clone(), RefresherConfig::default())
                .spawn();

        wait_until(|| !session.is_expired()).await;
        assert_eq!(session.token().unwrap().access_token, "renewed-1");

        // The persisted cache advanced with the in-memory token.
        let persisted = session.store().load().unwrap().unwrap();
        assert!(persisted.expires_at > Utc::now());

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn valid_token_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            &dir,
            token_expiring_in(7200, "fresh"),
            Duration::from_secs(60),
        );

        let exchanger = FakeExchanger::succeeding(3600);
        let handle =
            TokenRefresher::new(session.clone(), exchanger.clone(), RefresherConfig::default())
                .spawn();

        // Let several ticks elapse.
        tokio::time::sleep(Duration::from_secs(150)).await;

        assert_eq!(exchanger.calls(), 0);
        assert_eq!(session.token().unwrap().access_token, "fresh");

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_ignores_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            &dir,
            token_expiring_in(3600, "fresh"),
            Duration::from_secs(3600),
        );

        let exchanger = FakeExchanger::succeeding(7200);
        let handle =
            TokenRefresher::new(session.clone(), exchanger.clone(), RefresherConfig::default())
                .spawn();

        handle.refresh_now(true).await.unwrap();
        wait_until(|| exchanger.calls() == 1).await;
        wait_until(|| session.token().unwrap().access_token == "renewed-1").await;

        // Without force, a valid token is not renewed.
        handle.refresh_now(false).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(exchanger.calls(), 1);

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_invalidate_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            &dir,
            token_expiring_in(-10, "stale"),
            Duration::from_secs(60),
        );

        // Every attempt is rejected, as with a revoked refresh credential.
        let exchanger = FakeExchanger::failing(u32::MAX);
        let handle = TokenRefresher::new(
            session.clone(),
            exchanger.clone(),
            RefresherConfig::default().with_max_attempts(5),
        )
        .spawn();

        wait_until(|| session.is_invalidated()).await;
        assert_eq!(exchanger.calls(), 5);

        // Readers now get a typed error instead of blocking.
        assert!(matches!(
            session.token(),
            Err(CredentialError::InvalidCredential)
        ));

        // The task stopped on its own.
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_then_recover() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            &dir,
            token_expiring_in(-10, "stale"),
            Duration::from_secs(3600),
        );

        let exchanger = FakeExchanger::failing(2);
        let handle = TokenRefresher::new(
            session.clone(),
            exchanger.clone(),
            RefresherConfig::default().with_backoff(
                Duration::from_secs(1),
                Duration::from_secs(8),
                2.0,
            ),
        )
        .spawn();

        wait_until(|| !session.is_expired()).await;
        assert_eq!(exchanger.calls(), 3);
        assert!(!session.is_invalidated());

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_ticks_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let interval = Duration::from_secs(60);
        let session = session_with(&dir, token_expiring_in(30, "soon-stale"), interval);

        let exchanger = FakeExchanger::succeeding(3600);
        let handle =
            TokenRefresher::new(session.clone(), exchanger.clone(), RefresherConfig::default())
                .spawn();

        // The catch-up tick renews the nearly expired token once.
        wait_until(|| exchanger.calls() == 1).await;
        let cache_after_stop = std::fs::read(session.store().path()).unwrap();

        handle.stop();
        handle.join().await;

        // A full interval later: no tick fired, no file write happened.
        tokio::time::sleep(interval * 2).await;
        assert_eq!(exchanger.calls(), 1);
        assert_eq!(
            std::fs::read(session.store().path()).unwrap(),
            cache_after_stop
        );
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_refresh_is_discarded_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            &dir,
            token_expiring_in(-10, "stale"),
            Duration::from_secs(3600),
        );

        let exchanger = FakeExchanger::slow(Duration::from_secs(1000));
        let handle =
            TokenRefresher::new(session.clone(), exchanger.clone(), RefresherConfig::default())
                .spawn();

        wait_until(|| exchanger.calls() == 1).await;
        handle.stop();
        handle.join().await;

        // The exchange never completed into the session.
        assert_eq!(session.token().unwrap().access_token, "stale");
        assert!(!session.is_invalidated());
    }

    #[tokio::test(start_paused = true)]
    async fn replacement_race_loser_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            &dir,
            token_expiring_in(3600, "fresh"),
            Duration::from_secs(3600),
        );

        // The renewal would expire before the current token does.
        let exchanger = FakeExchanger::succeeding(60);
        let handle =
            TokenRefresher::new(session.clone(), exchanger.clone(), RefresherConfig::default())
                .spawn();

        handle.refresh_now(true).await.unwrap();
        wait_until(|| exchanger.calls() == 1).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(session.token().unwrap().access_token, "fresh");

        handle.stop();
        handle.join().await;
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        let config = RefresherConfig::default().with_backoff(
            Duration::from_secs(5),
            Duration::from_secs(300),
            2.0,
        );

        assert_eq!(config.backoff_delay(0), Duration::ZERO);
        assert_eq!(config.backoff_delay(1), Duration::from_secs(5));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(10));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(20));
        assert_eq!(config.backoff_delay(10), Duration::from_secs(300));
    }
}
