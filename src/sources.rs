//! Named credential sources that can take part in a credential chain.

use crate::cloud::AzureCloud;
use azure_core::{
    credentials::{Secret, TokenCredential},
    error::{Error, ErrorKind},
};
use azure_identity::{
    AzureCliCredential, AzureCliCredentialOptions, AzureDeveloperCliCredential,
    AzureDeveloperCliCredentialOptions, ClientSecretCredential, ClientSecretCredentialOptions,
    ManagedIdentityCredential, ManagedIdentityCredentialOptions,
};
use std::{fmt::Debug, sync::Arc};
use tracing::warn;

pub const AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";

/// What a source needs to know to build its credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub cloud: AzureCloud,
    pub tenant_id: Option<String>,
}

/// A way of producing a [`TokenCredential`].
///
/// Creating the credential may fail (for instance when environment
/// variables are absent); the chain treats that the same as the credential
/// failing to return a token.
pub trait CredentialSource: Send + Sync + Debug {
    /// Name of the credential type, used as the prefix of failure
    /// diagnostics.
    fn type_name(&self) -> &str;

    fn credential(&self, context: &SourceContext) -> azure_core::Result<Arc<dyn TokenCredential>>;
}

/// Client secret credentials read from `AZURE_*` environment variables.
#[derive(Debug, Default)]
pub struct EnvironmentSource;

impl EnvironmentSource {
    fn read<F>(lookup: F) -> Result<(String, String, String), Vec<&'static str>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tenant_id = lookup(AZURE_TENANT_ID);
        let client_id = lookup(AZURE_CLIENT_ID);
        let secret = lookup(AZURE_CLIENT_SECRET);
        match (tenant_id, client_id, secret) {
            (Some(t), Some(c), Some(s)) => Ok((t, c, s)),
            (t, c, s) => Err([
                (AZURE_TENANT_ID, t.is_none()),
                (AZURE_CLIENT_ID, c.is_none()),
                (AZURE_CLIENT_SECRET, s.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect()),
        }
    }
}

impl CredentialSource for EnvironmentSource {
    fn type_name(&self) -> &str {
        "EnvironmentCredential"
    }

    fn credential(&self, context: &SourceContext) -> azure_core::Result<Arc<dyn TokenCredential>> {
        Self::build(
            |name: &str| {
                std::env::var(name)
                    .ok()
                    .filter(|value| !value.trim().is_empty())
            },
            context,
        )
    }
}

impl EnvironmentSource {
    fn build<F>(lookup: F, context: &SourceContext) -> azure_core::Result<Arc<dyn TokenCredential>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (tenant_id, client_id, secret) = Self::read(lookup).map_err(|missing| {
            Error::with_message(
                ErrorKind::Credential,
                format!("environment variables not set: {}", missing.join(", ")),
            )
        })?;
        // an explicitly requested tenant overrides the environment
        let tenant_id = context.tenant_id.clone().unwrap_or(tenant_id);
        let options = ClientSecretCredentialOptions {
            client_options: context.cloud.client_options(),
        };
        let credential: Arc<dyn TokenCredential> =
            ClientSecretCredential::new(&tenant_id, client_id, Secret::new(secret), Some(options))?;
        Ok(credential)
    }
}

/// The signed-in Azure CLI session.
#[derive(Debug, Default)]
pub struct AzureCliSource;

impl CredentialSource for AzureCliSource {
    fn type_name(&self) -> &str {
        "AzureCliCredential"
    }

    fn credential(&self, context: &SourceContext) -> azure_core::Result<Arc<dyn TokenCredential>> {
        // the CLI authenticates against the cloud selected with `az cloud set`
        let options = AzureCliCredentialOptions {
            tenant_id: context.tenant_id.clone(),
            ..AzureCliCredentialOptions::default()
        };
        let credential: Arc<dyn TokenCredential> = AzureCliCredential::new(Some(options))?;
        Ok(credential)
    }
}

/// Managed identity of the host.
#[derive(Debug, Default)]
pub struct ManagedIdentitySource;

impl CredentialSource for ManagedIdentitySource {
    fn type_name(&self) -> &str {
        "ManagedIdentityCredential"
    }

    fn credential(&self, context: &SourceContext) -> azure_core::Result<Arc<dyn TokenCredential>> {
        let options = ManagedIdentityCredentialOptions {
            client_options: context.cloud.client_options(),
            ..ManagedIdentityCredentialOptions::default()
        };
        let credential: Arc<dyn TokenCredential> = ManagedIdentityCredential::new(Some(options))?;
        Ok(credential)
    }
}

/// The signed-in Azure Developer CLI session.
#[derive(Debug, Default)]
pub struct AzureDeveloperCliSource;

impl CredentialSource for AzureDeveloperCliSource {
    fn type_name(&self) -> &str {
        "AzureDeveloperCliCredential"
    }

    fn credential(&self, context: &SourceContext) -> azure_core::Result<Arc<dyn TokenCredential>> {
        let options = AzureDeveloperCliCredentialOptions {
            tenant_id: context.tenant_id.clone(),
            ..AzureDeveloperCliCredentialOptions::default()
        };
        let credential: Arc<dyn TokenCredential> =
            AzureDeveloperCliCredential::new(Some(options))?;
        Ok(credential)
    }
}

/// Ordered registry of credential sources, keyed by auth-method name.
///
/// The registry order is the order the chain tries sources in,
/// regardless of the order auth methods are requested in.
#[derive(Debug, Clone)]
pub struct CredentialSources {
    sources: Vec<(String, Arc<dyn CredentialSource>)>,
}

impl Default for CredentialSources {
    fn default() -> Self {
        Self::empty()
            .register("env", Arc::new(EnvironmentSource))
            .register("msi", Arc::new(ManagedIdentitySource))
            .register("cli", Arc::new(AzureCliSource))
            .register("azd", Arc::new(AzureDeveloperCliSource))
    }
}

impl CredentialSources {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a source, or replace the source already registered under `name`
    /// while keeping its position.
    #[must_use]
    pub fn register<N>(mut self, name: N, source: Arc<dyn CredentialSource>) -> Self
    where
        N: Into<String>,
    {
        let name = name.into();
        if let Some(entry) = self.sources.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = source;
        } else {
            self.sources.push((name, source));
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|(name, _)| name.as_str())
    }

    /// Sources whose names appear in `methods`, in registry order.
    ///
    /// Requested names without a registered source are skipped.
    #[must_use]
    pub fn select(&self, methods: &[String]) -> Vec<(&str, Arc<dyn CredentialSource>)> {
        for method in methods {
            if !self.sources.iter().any(|(name, _)| name == method) {
                warn!(method = method.as_str(), "no credential source registered for auth method");
            }
        }
        self.sources
            .iter()
            .filter(|(name, _)| methods.iter().any(|m| m == name))
            .map(|(name, source)| (name.as_str(), Arc::clone(source)))
            .collect()
    }
}
