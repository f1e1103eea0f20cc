//! Azure cloud names, aliases and endpoints.

use crate::{config::AzureSettings, error::AuthError};
use azure_core::{
    cloud::{CloudConfiguration, CustomConfiguration},
    http::ClientOptions,
};
use std::{fmt, sync::Arc};

/// A supported Azure cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AzureCloud {
    Global,
    UsGov,
    Germany,
    China,
}

/// Service endpoints for a cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudEndpoints {
    /// Resource manager audience.
    pub resource_manager: &'static str,
}

/// DNS suffixes for a cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudSuffixes {
    pub storage_endpoint: &'static str,
    pub keyvault_dns: &'static str,
}

const ALIASES: &[(&str, AzureCloud)] = &[
    ("public", AzureCloud::Global),
    ("global", AzureCloud::Global),
    ("gov", AzureCloud::UsGov),
    ("usgov", AzureCloud::UsGov),
    ("germany", AzureCloud::Germany),
    ("de", AzureCloud::Germany),
    ("china", AzureCloud::China),
    ("cn", AzureCloud::China),
];

impl AzureCloud {
    pub const ALL: [Self; 4] = [Self::Global, Self::UsGov, Self::Germany, Self::China];

    /// Resolve a cloud name or alias, ignoring case.
    #[must_use]
    pub fn resolve(alias: &str) -> Option<Self> {
        let alias = alias.trim().to_lowercase();
        ALIASES
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, cloud)| *cloud)
    }

    /// Canonical short name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::UsGov => "usgov",
            Self::Germany => "de",
            Self::China => "cn",
        }
    }

    /// Name used by the Azure management SDKs.
    #[must_use]
    pub fn sdk_name(self) -> &'static str {
        match self {
            Self::Global => "AzureCloud",
            Self::UsGov => "AzureUSGovernment",
            Self::Germany => "AzureGermanCloud",
            Self::China => "AzureChinaCloud",
        }
    }

    /// The cloud as `azure_core` describes it; credentials built with it
    /// authenticate against the cloud's authority host.
    #[must_use]
    pub fn cloud_configuration(self) -> CloudConfiguration {
        match self {
            Self::Global => CloudConfiguration::AzurePublic,
            Self::UsGov => CloudConfiguration::AzureGovernment,
            Self::China => CloudConfiguration::AzureChina,
            Self::Germany => {
                let mut custom = CustomConfiguration::default();
                custom.authority_host = "https://login.microsoftonline.de".to_string();
                custom.into()
            }
        }
    }

    /// Pipeline options targeting this cloud.
    #[must_use]
    pub fn client_options(self) -> ClientOptions {
        ClientOptions {
            cloud: Some(Arc::new(self.cloud_configuration())),
            ..ClientOptions::default()
        }
    }

    #[must_use]
    pub fn endpoints(self) -> CloudEndpoints {
        let resource_manager = match self {
            Self::Global => "https://management.azure.com/",
            Self::UsGov => "https://management.usgovcloudapi.net/",
            Self::Germany => "https://management.microsoftazure.de/",
            Self::China => "https://management.chinacloudapi.cn/",
        };
        CloudEndpoints { resource_manager }
    }

    #[must_use]
    pub fn suffixes(self) -> CloudSuffixes {
        match self {
            Self::Global => CloudSuffixes {
                storage_endpoint: "core.windows.net",
                keyvault_dns: ".vault.azure.net",
            },
            Self::UsGov => CloudSuffixes {
                storage_endpoint: "core.usgovcloudapi.net",
                keyvault_dns: ".vault.usgovcloudapi.net",
            },
            Self::Germany => CloudSuffixes {
                storage_endpoint: "core.cloudapi.de",
                keyvault_dns: ".vault.microsoftazure.de",
            },
            Self::China => CloudSuffixes {
                storage_endpoint: "core.chinacloudapi.cn",
                keyvault_dns: ".vault.azure.cn",
            },
        }
    }

    /// The resource manager scope requested when validating credentials.
    #[must_use]
    pub fn token_scope(self) -> String {
        format!("{}.default", self.endpoints().resource_manager)
    }
}

impl fmt::Display for AzureCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical names of every supported cloud.
#[must_use]
pub fn cloud_names() -> Vec<&'static str> {
    AzureCloud::ALL.iter().map(|c| c.name()).collect()
}

/// Cloud, tenant and auth-method selection for one `connect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    pub cloud: AzureCloud,
    pub tenant_id: Option<String>,
    pub auth_methods: Vec<String>,
}

impl CloudConfig {
    /// Explicit values win over configuration.
    pub fn new(
        cloud: Option<&str>,
        tenant_id: Option<&str>,
        settings: &AzureSettings,
    ) -> Result<Self, AuthError> {
        let requested = cloud.unwrap_or_else(|| settings.cloud());
        let cloud = AzureCloud::resolve(requested)
            .ok_or_else(|| AuthError::UnknownCloud(requested.to_string()))?;
        Ok(Self {
            cloud,
            tenant_id: tenant_id
                .map(ToString::to_string)
                .or_else(|| settings.tenant_id.clone()),
            auth_methods: settings.auth_methods(),
        })
    }
}
