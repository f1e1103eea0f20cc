use azure_core::credentials::{AccessToken, TokenCredential, TokenRequestOptions};
use std::sync::Arc;

/// Adapts a modern credential for clients that do not pass scopes.
///
/// Every token is requested for the single resource scope the wrapper was
/// created with, whatever scopes the caller asks for.
#[derive(Debug, Clone)]
pub struct LegacyCredential {
    inner: Arc<dyn TokenCredential>,
    resource_scope: String,
}

impl LegacyCredential {
    pub fn new<S>(inner: Arc<dyn TokenCredential>, resource_scope: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            inner,
            resource_scope: resource_scope.into(),
        }
    }

    #[must_use]
    pub fn resource_scope(&self) -> &str {
        &self.resource_scope
    }

    /// Token for the wrapped resource scope.
    pub async fn token(&self) -> azure_core::Result<AccessToken> {
        self.inner.get_token(&[self.resource_scope.as_str()], None).await
    }

    /// Value for an `Authorization` header.
    pub async fn authorization_header(&self) -> azure_core::Result<String> {
        let token = self.token().await?;
        Ok(format!("Bearer {}", token.token.secret()))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl TokenCredential for LegacyCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        self.inner
            .get_token(&[self.resource_scope.as_str()], options)
            .await
    }
}
