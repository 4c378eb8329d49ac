use super::ssh::{SshDialer, SshSettings};
use super::{CommandChannel, LocalChannel};
use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Hands out a command channel for a host.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    async fn channel_for(&self, ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>>;

    /// Tears down every session this provider opened.
    async fn close(&self, _ctx: &Context) {}
}

/// Establishes a new session to a host.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>>;
}

type Session = Arc<OnceCell<Result<Arc<dyn CommandChannel>>>>;

/// Per-host session cache in front of a [`Dialer`].
///
/// Each host is dialed at most once for the cache's lifetime, even when many
/// tasks ask for it at the same time. A failed dial is remembered too.
pub struct SessionCache<D> {
    dialer: D,
    sessions: Mutex<HashMap<String, Session>>,
}

impl<D: Dialer> SessionCache<D> {
    pub fn new(dialer: D) -> Self {
        Self {
            dialer,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    fn session(&self, host: &str) -> Session {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(host.to_string()).or_default())
    }

    pub async fn get(&self, ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>> {
        let session = self.session(host);
        session
            .get_or_init(|| async {
                let result = self.dialer.dial(ctx, host).await;
                if let Err(err) = &result {
                    tracing::warn!(host, error = %err, "Could not open session");
                }
                result
            })
            .await
            .clone()
    }

    pub async fn close_all(&self, ctx: &Context) {
        let sessions: Vec<(String, Session)> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            sessions.drain().collect()
        };

        for (host, session) in sessions {
            if let Some(Ok(channel)) = session.get() {
                if let Err(err) = channel.close(ctx).await {
                    tracing::debug!(host, error = %err, "Could not close session");
                }
            }
        }
    }
}

/// The channel factory used by the fleet: local channels when no hosts are
/// configured, cached SSH sessions otherwise.
pub enum ChannelFactory {
    Local { trace: bool },
    Remote(SessionCache<SshDialer>),
}

impl ChannelFactory {
    pub fn local(trace: bool) -> Self {
        ChannelFactory::Local { trace }
    }

    pub fn remote(settings: SshSettings) -> Result<Self> {
        Ok(ChannelFactory::Remote(SessionCache::new(SshDialer::new(settings)?)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ChannelFactory::Remote(_))
    }
}

#[async_trait]
impl ChannelProvider for ChannelFactory {
    async fn channel_for(&self, ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>> {
        match self {
            ChannelFactory::Local { trace } => Ok(Arc::new(LocalChannel::new(*trace))),
            ChannelFactory::Remote(cache) => cache.get(ctx, host).await,
        }
    }

    async fn close(&self, ctx: &Context) {
        if let ChannelFactory::Remote(cache) = self {
            cache.close_all(ctx).await;
        }
    }
}

#[async_trait]
impl<D: Dialer> ChannelProvider for SessionCache<D> {
    async fn channel_for(&self, ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>> {
        self.get(ctx, host).await
    }

    async fn close(&self, ctx: &Context) {
        self.close_all(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::ScriptedChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingDialer {
        dials: AtomicUsize,
    }

    #[async_trait]
    impl Dialer for CountingDialer {
        async fn dial(&self, _ctx: &Context, host: &str) -> Result<Arc<dyn CommandChannel>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if host.starts_with("down") {
                return Err(Error::Connection {
                    host: host.to_string(),
                    user: "root".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(Arc::new(ScriptedChannel::new()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_use_dials_once() {
        let cache = SessionCache::new(CountingDialer::default());
        let ctx = Context::new();

        let (a, b, c) = tokio::join!(
            cache.get(&ctx, "db1"),
            cache.get(&ctx, "db1"),
            cache.get(&ctx, "db1"),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert_eq!(cache.dialer().dials.load(Ordering::SeqCst), 1);

        cache.get(&ctx, "db2").await.unwrap();
        assert_eq!(cache.dialer().dials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_dial_is_reported_to_every_caller() {
        let cache = SessionCache::new(CountingDialer::default());
        let ctx = Context::new();

        let (a, b) = tokio::join!(cache.get(&ctx, "down1"), cache.get(&ctx, "down1"));
        assert!(matches!(a, Err(Error::Connection { .. })));
        assert!(matches!(b, Err(Error::Connection { .. })));
        assert_eq!(cache.dialer().dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_factory_always_succeeds() {
        let factory = ChannelFactory::local(false);
        assert!(!factory.is_remote());
        let channel = factory.channel_for(&Context::new(), "10.0.0.1").await.unwrap();
        let output = channel.output(&Context::new(), "echo ok").await.unwrap();
        assert_eq!(output.trim(), "ok");
    }
}
