//! Process-lifetime cache for the credential pair produced by `connect`.

use crate::{
    chained_token_credential::FailureReport,
    cloud::AzureCloud,
    connect::{ChainConnector, ConnectOptions, Connector, CredentialPair},
    error::AuthError,
};
use async_lock::Mutex;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Caches the credential pair until its token expires or a different cloud
/// is requested.
///
/// The expiry and cloud checks and any refresh happen under one lock, so
/// concurrent callers never observe a half-refreshed cache. Refresh is lazy:
/// nothing happens between calls.
pub struct CachedConnect<K = ChainConnector, C = SystemClock> {
    connector: K,
    clock: C,
    cached: Mutex<Option<Arc<CredentialPair>>>,
}

impl<K> CachedConnect<K, SystemClock>
where
    K: Connector,
{
    pub fn new(connector: K) -> Self {
        Self::with_clock(connector, SystemClock)
    }
}

impl<K, C> CachedConnect<K, C>
where
    K: Connector,
    C: Clock,
{
    pub fn with_clock(connector: K, clock: C) -> Self {
        Self {
            connector,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached pair, running the connector first when there is no
    /// pair, its token has expired, or `options` asks for another cloud.
    pub async fn connect(&self, options: &ConnectOptions) -> Result<Arc<CredentialPair>, AuthError> {
        let mut cached = self.cached.lock().await;
        let requested = self.connector.resolve_cloud(options)?;

        if let Some(pair) = cached.as_ref() {
            // the refresh below reports failures the way this call asked for
            pair.reporter
                .set_policy(FailureReport::from_silent(options.silent))
                .await;
            if pair.cloud != requested {
                debug!(from = %pair.cloud, to = %requested, "cloud changed, reconnecting");
            } else if self.expired(pair).await {
                debug!(cloud = %pair.cloud, "cached token expired, reconnecting");
            } else {
                debug!(cloud = %pair.cloud, "using cached credentials");
                return Ok(Arc::clone(pair));
            }
        }

        *cached = None;
        let pair = Arc::new(self.connector.connect(options).await?);
        *cached = Some(Arc::clone(&pair));
        Ok(pair)
    }

    /// Cloud of the cached pair, if any.
    pub async fn cloud(&self) -> Option<AzureCloud> {
        self.cached.lock().await.as_ref().map(|pair| pair.cloud)
    }

    /// Forget the cached pair.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn expired(&self, pair: &CredentialPair) -> bool {
        let scope = pair.cloud.token_scope();
        match pair.modern.get_token(&[scope.as_str()], None).await {
            Ok(token) => token.expires_on <= self.clock.now(),
            Err(err) => {
                debug!(%err, "unable to refresh cached token");
                true
            }
        }
    }
}
