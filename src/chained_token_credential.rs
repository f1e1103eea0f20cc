use crate::sources::{CredentialSource, SourceContext};
use async_lock::Mutex;
use azure_core::{
    credentials::{AccessToken, TokenCredential, TokenRequestOptions},
    error::{Error, ErrorKind},
};
use std::sync::Arc;
use tracing::{debug, info};

/// How failing sources are reported while a chain is resolving a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureReport {
    /// Report nothing beyond debug-level tracing.
    Silent,
    /// Print one short line per recognised failing source to stderr.
    #[default]
    Summary,
}

impl FailureReport {
    #[must_use]
    pub fn from_silent(silent: bool) -> Self {
        if silent { Self::Silent } else { Self::Summary }
    }
}

/// The report policy of a chain and the summaries shown under it.
///
/// Shared between a chain and whoever holds it, so the policy can follow
/// each `connect` call rather than the call that built the chain.
#[derive(Debug, Default)]
pub struct FailureReporter {
    policy: Mutex<FailureReport>,
    shown: Mutex<Vec<&'static str>>,
}

impl FailureReporter {
    #[must_use]
    pub fn new(policy: FailureReport) -> Self {
        Self {
            policy: Mutex::new(policy),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub async fn policy(&self) -> FailureReport {
        *self.policy.lock().await
    }

    pub async fn set_policy(&self, policy: FailureReport) {
        *self.policy.lock().await = policy;
    }

    /// Summaries printed so far, oldest first.
    pub async fn shown(&self) -> Vec<&'static str> {
        self.shown.lock().await.clone()
    }

    /// Print the summary for `diagnostic` when the policy allows it. The
    /// diagnostic itself only reaches tracing.
    async fn report(&self, source: &str, diagnostic: &str) {
        debug!(source, "{diagnostic}");
        if self.policy().await == FailureReport::Silent {
            return;
        }
        if let Some(summary) = friendly_failure(diagnostic) {
            eprintln!("{summary}");
            self.shown.lock().await.push(summary);
        }
    }
}

/// Map a source failure diagnostic to the short message shown to users.
///
/// Only environment, Azure CLI and managed identity failures have a
/// summary; anything else is left to tracing.
#[must_use]
pub fn friendly_failure(diagnostic: &str) -> Option<&'static str> {
    if !diagnostic.contains(".get_token") {
        return None;
    }
    if diagnostic.starts_with("EnvironmentCredential") {
        Some("Unable to sign-in with environment variable credentials.")
    } else if diagnostic.starts_with("AzureCliCredential") {
        Some("Unable to sign-in with Azure CLI credentials.")
    } else if diagnostic.starts_with("ManagedIdentityCredential") {
        Some("Unable to sign-in with Managed Instance credentials.")
    } else {
        None
    }
}

#[derive(Debug)]
struct Link {
    name: String,
    type_name: String,
    credential: Result<Arc<dyn TokenCredential>, String>,
}

/// Tries a sequence of credentials until one of them returns a token.
///
/// The credential that last succeeded is tried first on later calls.
#[derive(Debug)]
pub struct ChainedTokenCredential {
    links: Vec<Link>,
    reporter: Arc<FailureReporter>,
    successful: Mutex<Option<usize>>,
}

impl ChainedTokenCredential {
    /// Build the chain from named sources. Sources that fail to create a
    /// credential stay in the chain and report that failure when asked
    /// for a token.
    #[must_use]
    pub fn from_sources(
        sources: Vec<(&str, Arc<dyn CredentialSource>)>,
        context: &SourceContext,
        report: FailureReport,
    ) -> Self {
        let links = sources
            .into_iter()
            .map(|(name, source)| Link {
                name: name.to_string(),
                type_name: source.type_name().to_string(),
                credential: source.credential(context).map_err(|e| e.to_string()),
            })
            .collect();
        Self {
            links,
            reporter: Arc::new(FailureReporter::new(report)),
            successful: Mutex::new(None),
        }
    }

    /// Handle on the chain's report policy.
    #[must_use]
    pub fn reporter(&self) -> Arc<FailureReporter> {
        Arc::clone(&self.reporter)
    }

    /// Names of the sources in the chain, in the order they are tried.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|link| link.name.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    async fn report_failure(&self, link: &Link, message: &str) -> String {
        let diagnostic = format!("{}.get_token failed: {message}", link.type_name);
        self.reporter.report(&link.name, &diagnostic).await;
        diagnostic
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl TokenCredential for ChainedTokenCredential {
    async fn get_token(
        &self,
        scopes: &[&str],
        options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        let preferred = *self.successful.lock().await;
        let order = preferred
            .into_iter()
            .chain((0..self.links.len()).filter(move |i| Some(*i) != preferred));

        let mut failures = Vec::new();
        for index in order {
            let Some(link) = self.links.get(index) else {
                continue;
            };
            let outcome = match &link.credential {
                Ok(credential) => credential.get_token(scopes, options.clone()).await,
                Err(message) => Err(Error::with_message(ErrorKind::Credential, message.clone())),
            };
            match outcome {
                Ok(token) => {
                    info!(source = link.name.as_str(), "acquired token");
                    *self.successful.lock().await = Some(index);
                    return Ok(token);
                }
                Err(err) => failures.push(self.report_failure(link, &err.to_string()).await),
            }
        }

        Err(Error::with_message(
            ErrorKind::Credential,
            if failures.is_empty() {
                "no credential sources were available".to_string()
            } else {
                format!(
                    "no credential in the chain returned a token: {}",
                    failures.join("; ")
                )
            },
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cloud::AzureCloud;
    use azure_core::credentials::Secret;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::{Duration, OffsetDateTime};

    #[derive(Debug)]
    struct Fixed {
        token: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
    impl TokenCredential for Fixed {
        async fn get_token(
            &self,
            _scopes: &[&str],
            _options: Option<TokenRequestOptions<'_>>,
        ) -> azure_core::Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.token {
                Some(token) => Ok(AccessToken {
                    token: Secret::new(token),
                    expires_on: OffsetDateTime::now_utc() + Duration::hours(1),
                }),
                None => Err(Error::with_message(ErrorKind::Credential, "no session")),
            }
        }
    }

    #[derive(Debug)]
    struct FixedSource {
        type_name: &'static str,
        credential: Arc<Fixed>,
    }

    impl CredentialSource for FixedSource {
        fn type_name(&self) -> &str {
            self.type_name
        }

        fn credential(
            &self,
            _context: &SourceContext,
        ) -> azure_core::Result<Arc<dyn TokenCredential>> {
            let credential: Arc<dyn TokenCredential> = self.credential.clone();
            Ok(credential)
        }
    }

    #[derive(Debug)]
    struct Unavailable;

    impl CredentialSource for Unavailable {
        fn type_name(&self) -> &str {
            "EnvironmentCredential"
        }

        fn credential(
            &self,
            _context: &SourceContext,
        ) -> azure_core::Result<Arc<dyn TokenCredential>> {
            Err(Error::with_message(ErrorKind::Credential, "variables not set"))
        }
    }

    fn context() -> SourceContext {
        SourceContext {
            cloud: AzureCloud::Global,
            tenant_id: None,
        }
    }

    fn fixed(token: Option<&'static str>) -> Arc<Fixed> {
        Arc::new(Fixed {
            token,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn friendly_failures() {
        assert_eq!(
            friendly_failure("AzureCliCredential.get_token failed: az not found"),
            Some("Unable to sign-in with Azure CLI credentials.")
        );
        assert_eq!(
            friendly_failure("EnvironmentCredential.get_token failed: x"),
            Some("Unable to sign-in with environment variable credentials.")
        );
        assert_eq!(
            friendly_failure("ManagedIdentityCredential.get_token failed: x"),
            Some("Unable to sign-in with Managed Instance credentials.")
        );
        assert_eq!(
            friendly_failure("AzureDeveloperCliCredential.get_token failed: x"),
            None
        );
        assert_eq!(friendly_failure("AzureCliCredential: other"), None);
    }

    fn source(type_name: &'static str, credential: Arc<Fixed>) -> Arc<dyn CredentialSource> {
        Arc::new(FixedSource {
            type_name,
            credential,
        })
    }

    fn unavailable() -> Arc<dyn CredentialSource> {
        Arc::new(Unavailable)
    }

    #[tokio::test]
    async fn falls_through_to_first_working_source() {
        let failing = fixed(None);
        let working = fixed(Some("token"));
        let chain = ChainedTokenCredential::from_sources(
            vec![
                ("env", unavailable()),
                ("cli", source("AzureCliCredential", failing.clone())),
                ("msi", source("ManagedIdentityCredential", working.clone())),
            ],
            &context(),
            FailureReport::Silent,
        );
        assert_eq!(chain.names().collect::<Vec<_>>(), ["env", "cli", "msi"]);

        let token = chain.get_token(&["scope"], None).await.unwrap();
        assert_eq!(token.token.secret(), "token");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        // the working source is remembered and tried first
        chain.get_token(&["scope"], None).await.unwrap();
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(working.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_chain_lists_every_failure() {
        let chain = ChainedTokenCredential::from_sources(
            vec![
                ("env", unavailable()),
                ("cli", source("AzureCliCredential", fixed(None))),
            ],
            &context(),
            FailureReport::Summary,
        );
        let err = chain.get_token(&["scope"], None).await.err().unwrap();
        let message = err.to_string();
        assert!(message.contains("EnvironmentCredential.get_token failed"));
        assert!(message.contains("AzureCliCredential.get_token failed"));
    }

    #[tokio::test]
    async fn summary_shows_friendly_reasons_only() {
        let chain = ChainedTokenCredential::from_sources(
            vec![
                ("env", unavailable()),
                ("cli", source("AzureCliCredential", fixed(None))),
                ("azd", source("AzureDeveloperCliCredential", fixed(None))),
            ],
            &context(),
            FailureReport::Summary,
        );
        assert!(chain.get_token(&["scope"], None).await.is_err());

        let shown = chain.reporter().shown().await;
        assert_eq!(
            shown,
            [
                "Unable to sign-in with environment variable credentials.",
                "Unable to sign-in with Azure CLI credentials."
            ]
        );
        for line in shown {
            assert!(!line.contains("no session"));
            assert!(!line.contains("variables not set"));
        }
    }

    #[tokio::test]
    async fn silent_shows_nothing_until_policy_changes() {
        let chain = ChainedTokenCredential::from_sources(
            vec![("cli", source("AzureCliCredential", fixed(None)))],
            &context(),
            FailureReport::Silent,
        );
        let reporter = chain.reporter();
        assert!(chain.get_token(&["scope"], None).await.is_err());
        assert!(reporter.shown().await.is_empty());

        reporter.set_policy(FailureReport::Summary).await;
        assert_eq!(reporter.policy().await, FailureReport::Summary);
        assert!(chain.get_token(&["scope"], None).await.is_err());
        assert_eq!(
            reporter.shown().await,
            ["Unable to sign-in with Azure CLI credentials."]
        );
    }

    #[tokio::test]
    async fn empty_chain_fails() {
        let chain = ChainedTokenCredential::from_sources(vec![], &context(), FailureReport::Silent);
        assert!(chain.is_empty());
        assert!(chain.get_token(&["scope"], None).await.is_err());
    }
}
