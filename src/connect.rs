//! Authenticate against Azure using an ordered chain of credential sources.

use crate::{
    chained_token_credential::{ChainedTokenCredential, FailureReport, FailureReporter},
    cloud::{AzureCloud, CloudConfig},
    config::AzureSettings,
    error::AuthError,
    legacy_credential::LegacyCredential,
    sources::{CredentialSources, SourceContext},
};
use azure_core::credentials::TokenCredential;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};

/// Arguments to a single `connect` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Auth methods to try; configuration supplies them when absent.
    pub auth_methods: Option<Vec<String>>,
    /// Cloud name or alias; configuration supplies it when absent.
    pub cloud: Option<String>,
    pub tenant_id: Option<String>,
    /// Suppress per-source failure messages.
    pub silent: bool,
}

impl ConnectOptions {
    #[must_use]
    pub fn with_auth_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_cloud<S: Into<String>>(mut self, cloud: S) -> Self {
        self.cloud = Some(cloud.into());
        self
    }

    #[must_use]
    pub fn with_tenant_id<S: Into<String>>(mut self, tenant_id: S) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Two views of one authenticated identity.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    /// Fixed-scope credential for clients that do not pass scopes.
    pub legacy: Arc<LegacyCredential>,
    /// Scope-aware credential.
    pub modern: Arc<dyn TokenCredential>,
    /// Cloud the pair was produced for.
    pub cloud: AzureCloud,
    /// Expiry of the token acquired while validating the pair.
    pub expires_on: OffsetDateTime,
    /// Report policy of the chain behind `modern`.
    pub reporter: Arc<FailureReporter>,
}

/// Produces a fresh [`CredentialPair`].
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<CredentialPair, AuthError>;

    /// Cloud a call with `options` would connect to.
    fn resolve_cloud(&self, options: &ConnectOptions) -> Result<AzureCloud, AuthError>;
}

/// Builds a [`ChainedTokenCredential`] from configured sources.
#[derive(Debug, Clone, Default)]
pub struct ChainConnector {
    settings: AzureSettings,
    sources: CredentialSources,
}

impl ChainConnector {
    #[must_use]
    pub fn new(settings: AzureSettings, sources: CredentialSources) -> Self {
        Self { settings, sources }
    }

    #[must_use]
    pub fn settings(&self) -> &AzureSettings {
        &self.settings
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl Connector for ChainConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<CredentialPair, AuthError> {
        let config = CloudConfig::new(
            options.cloud.as_deref(),
            options.tenant_id.as_deref(),
            &self.settings,
        )?;
        let methods = match &options.auth_methods {
            Some(methods) if !methods.is_empty() => methods.clone(),
            _ => config.auth_methods.clone(),
        };
        let selected = self.sources.select(&methods);
        let attempted = selected
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect::<Vec<_>>();
        debug!(cloud = %config.cloud, ?attempted, "resolving credential chain");

        let context = SourceContext {
            cloud: config.cloud,
            tenant_id: config.tenant_id.clone(),
        };
        let chain = Arc::new(ChainedTokenCredential::from_sources(
            selected,
            &context,
            FailureReport::from_silent(options.silent),
        ));

        let scope = config.cloud.token_scope();
        let token = chain
            .get_token(&[scope.as_str()], None)
            .await
            .map_err(|err| AuthError::ChainExhausted {
                attempted: attempted.clone(),
                message: err.to_string(),
            })?;
        info!(cloud = %config.cloud, expires_on = %token.expires_on, "connected");

        let reporter = chain.reporter();
        let modern: Arc<dyn TokenCredential> = chain;
        Ok(CredentialPair {
            legacy: Arc::new(LegacyCredential::new(Arc::clone(&modern), scope)),
            modern,
            cloud: config.cloud,
            expires_on: token.expires_on,
            reporter,
        })
    }

    fn resolve_cloud(&self, options: &ConnectOptions) -> Result<AzureCloud, AuthError> {
        let requested = options
            .cloud
            .as_deref()
            .unwrap_or_else(|| self.settings.cloud());
        AzureCloud::resolve(requested).ok_or_else(|| AuthError::UnknownCloud(requested.to_string()))
    }
}

/// Authenticate once, without caching.
pub async fn connect_core(
    settings: &AzureSettings,
    sources: &CredentialSources,
    options: &ConnectOptions,
) -> Result<CredentialPair, AuthError> {
    ChainConnector::new(settings.clone(), sources.clone())
        .connect(options)
        .await
}
