//! Base for threat-intelligence providers queried over HTTP.
//!
//! A provider is declared as a base URL plus one [`RequestTemplate`] per
//! observable type (optionally per query sub-type). [`HttpProvider`] turns a
//! lookup into a single `GET`, classifies the response and hands successful
//! JSON bodies to the provider's [`ResultParser`].
//!
//! Lookups never fail: anything that prevents forming or completing the
//! request is recorded in the returned [`LookupResult`]. Only building the
//! provider can fail, with a [`ConfigurationError`].

use crate::{
    config::{ProviderConfig, Settings},
    error::{ConfigurationError, LookupError},
    ioc_type::{DefaultIocTypeCheck, IocTypeCheck},
    lookup_cache::{LookupCache, LookupKey},
    lookup_result::{LookupResult, LookupStatus, ParsedResult, ResultSeverity},
    request::{API_ID, API_KEY, HttpVerb, QueryTemplates, RequestTemplate},
    template::SubstitutionContext,
    transport::{HttpTransport, ReqwestTransport, reason_phrase},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, BTreeSet},
    error::Error as _,
    sync::Arc,
    time::Duration,
};
use tracing::{debug, warn};

/// Interprets a successful (HTTP 200, valid JSON) response.
///
/// `response.raw_result` holds the decoded body and `response.status` is
/// still `Http(200)` while this runs.
pub trait ResultParser: Send + Sync {
    fn parse_results(&self, response: &LookupResult) -> Result<ParsedResult, LookupError>;
}

impl<F> ResultParser for F
where
    F: Fn(&LookupResult) -> Result<ParsedResult, LookupError> + Send + Sync,
{
    fn parse_results(&self, response: &LookupResult) -> Result<ParsedResult, LookupError> {
        self(response)
    }
}

/// Configuration values a provider may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ProviderParam {
    #[serde(rename = "API_ID", alias = "ApiID")]
    ApiId,
    #[serde(rename = "API_KEY", alias = "AuthKey")]
    ApiKey,
}

impl ProviderParam {
    /// Placeholder name the value is available under.
    #[must_use]
    pub fn context_key(self) -> &'static str {
        match self {
            Self::ApiId => API_ID,
            Self::ApiKey => API_KEY,
        }
    }
}

/// Declarative description of a provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderDefinition {
    pub name: String,
    pub base_url: String,
    pub required_params: Vec<ProviderParam>,
    /// Keyed by `"{type}"` or `"{type}-{query type}"`.
    pub queries: BTreeMap<String, RequestTemplate>,
}

impl ProviderDefinition {
    pub fn new<N, U>(name: N, base_url: U) -> Self
    where
        N: Into<String>,
        U: Into<String>,
    {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn require(mut self, param: ProviderParam) -> Self {
        self.required_params.push(param);
        self
    }

    #[must_use]
    pub fn query<K: Into<String>>(mut self, key: K, template: RequestTemplate) -> Self {
        self.queries.insert(key.into(), template);
        self
    }
}

/// Per-call options. They are part of the memo key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LookupOptions {
    /// Name recorded as the result's provider.
    pub provider_name: Option<String>,
    /// Overrides the provider's HTTP timeout.
    pub timeout: Option<Duration>,
}

pub struct HttpProvider<P> {
    name: String,
    base_url: String,
    templates: QueryTemplates,
    request_params: SubstitutionContext,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    type_check: Arc<dyn IocTypeCheck>,
    cache: LookupCache,
    parser: P,
}

impl<P> HttpProvider<P>
where
    P: ResultParser,
{
    pub fn new(
        definition: ProviderDefinition,
        config: &ProviderConfig,
        parser: P,
    ) -> Result<Self, ConfigurationError> {
        Self::with_settings(definition, config, &Settings::default(), parser)
    }

    /// Like [`HttpProvider::new`], falling back to `settings` for options the
    /// provider configuration leaves out.
    pub fn with_settings(
        definition: ProviderDefinition,
        config: &ProviderConfig,
        settings: &Settings,
        parser: P,
    ) -> Result<Self, ConfigurationError> {
        let ProviderDefinition {
            name,
            base_url,
            required_params,
            queries,
        } = definition;

        let mut request_params = SubstitutionContext::new();
        if let Some(api_id) = config.api_id() {
            request_params.insert(API_ID.to_string(), api_id.to_string());
        }
        if let Some(auth_key) = config.auth_key() {
            request_params.insert(API_KEY.to_string(), auth_key.to_string());
        }

        let missing = required_params
            .iter()
            .map(|param| param.context_key())
            .filter(|key| !request_params.contains_key(*key))
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingParameters {
                provider: name,
                missing,
            });
        }

        let mut templates = QueryTemplates::default();
        for (key, template) in &queries {
            templates
                .register(key.as_str(), template)
                .map_err(|source| ConfigurationError::InvalidTemplate {
                    provider: name.clone(),
                    key: key.clone(),
                    source,
                })?;
        }

        Ok(Self {
            timeout: config.http_timeout(settings),
            transport: Arc::new(ReqwestTransport::new()?),
            type_check: Arc::new(DefaultIocTypeCheck),
            cache: LookupCache::default(),
            name,
            base_url,
            templates,
            request_params,
            parser,
        })
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_type_check(mut self, type_check: Arc<dyn IocTypeCheck>) -> Self {
        self.type_check = type_check;
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = LookupCache::new(capacity);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn templates(&self) -> &QueryTemplates {
        &self.templates
    }

    /// Observable types this provider can look up, without query sub-types.
    #[must_use]
    pub fn supported_types(&self) -> Vec<String> {
        self.templates
            .keys()
            .map(|key| key.split_once('-').map_or(key, |(ioc_type, _)| ioc_type))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Every registered template key, `"{type}"` or `"{type}-{query type}"`.
    #[must_use]
    pub fn supported_queries(&self) -> Vec<String> {
        self.templates.keys().map(ToString::to_string).collect()
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Look up a single observable.
    ///
    /// `ioc_type` is inferred when `None`. `query_type` selects a
    /// `"{type}-{query type}"` template instead of the type's default.
    /// Results are memoized; repeating a call returns the same result
    /// without another request.
    pub async fn lookup_ioc(
        &self,
        ioc: &str,
        ioc_type: Option<&str>,
        query_type: Option<&str>,
    ) -> Arc<LookupResult> {
        self.lookup_ioc_with(ioc, ioc_type, query_type, &LookupOptions::default())
            .await
    }

    pub async fn lookup_ioc_with(
        &self,
        ioc: &str,
        ioc_type: Option<&str>,
        query_type: Option<&str>,
        options: &LookupOptions,
    ) -> Arc<LookupResult> {
        let key = LookupKey {
            ioc: ioc.to_string(),
            ioc_type: ioc_type.map(ToString::to_string),
            query_type: query_type.map(ToString::to_string),
            provider_name: options.provider_name.clone(),
            timeout: options.timeout,
        };
        if let Some(cached) = self.cache.get(&key).await {
            debug!(provider = self.name.as_str(), ioc, "using memoized lookup result");
            return cached;
        }

        let result = self.lookup_uncached(ioc, ioc_type, query_type, options).await;
        self.cache.insert(key, Arc::new(result)).await
    }

    async fn lookup_uncached(
        &self,
        ioc: &str,
        ioc_type: Option<&str>,
        query_type: Option<&str>,
        options: &LookupOptions,
    ) -> LookupResult {
        let mut result = self
            .type_check
            .check(ioc, ioc_type, query_type, &self.templates);
        result.provider = options
            .provider_name
            .clone()
            .unwrap_or_else(|| self.name.clone());
        if !result.status.is_ok() {
            debug!(
                provider = result.provider.as_str(),
                ioc,
                status = result.status.code(),
                "observable rejected before lookup"
            );
            return result;
        }

        let timeout = options.timeout.unwrap_or(self.timeout);
        if let Err(err) = self.execute(&mut result, query_type, timeout).await {
            warn!(provider = result.provider.as_str(), ioc, %err, "lookup failed");
            record_error(&mut result, &err);
        }
        result
    }

    async fn execute(
        &self,
        result: &mut LookupResult,
        query_type: Option<&str>,
        timeout: Duration,
    ) -> Result<(), LookupError> {
        let request = self.templates.substitute(
            &self.base_url,
            &result.safe_ioc,
            &result.ioc_type,
            query_type,
            &self.request_params,
        )?;
        result.reference = Some(request.url.to_string());
        if request.verb != HttpVerb::Get {
            return Err(LookupError::UnsupportedVerb(request.verb.to_string()));
        }

        let response = self.transport.get(&request, timeout).await?;
        result.status = LookupStatus::Http(response.status);

        if response.status != 200 {
            result.raw_result = json!(response.to_string());
            result.result = false;
            result.details = json!(response_message(response.status));
            return Ok(());
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(body) => {
                result.raw_result = body;
                let parsed = self.parser.parse_results(result)?;
                result.result = parsed.hit;
                result.details = parsed.details;
                result.set_severity(parsed.severity);
            }
            Err(err) => {
                debug!(provider = self.name.as_str(), %err, "response body is not JSON");
                result.raw_result = json!(format!(
                    "There was a problem parsing results from this lookup: {}",
                    response.body
                ));
                result.result = false;
                result.details = json!({});
                result.set_severity(ResultSeverity::Information);
            }
        }
        result.status = LookupStatus::Ok;
        Ok(())
    }
}

/// Human-readable explanation for a non-200 status.
#[must_use]
pub fn response_message(status: u16) -> &'static str {
    match status {
        404 => "Not found.",
        401 => "Authorization failed. Check account and key details.",
        403 => "Request forbidden. Allowed query rate may have been exceeded.",
        other => reason_phrase(other).unwrap_or("Unknown HTTP status code."),
    }
}

fn record_error(result: &mut LookupResult, err: &LookupError) {
    result.status = match err {
        LookupError::UnsupportedType(_) => LookupStatus::NotSupported,
        _ => LookupStatus::QueryFailed,
    };
    result.result = false;
    result.details = json!([err.to_string()]);

    let mut trace = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push(cause.to_string());
        source = cause.source();
    }
    result.raw_result = json!(format!(
        "{}\n{}\n{}",
        err.kind_name(),
        err,
        trace.join("\n")
    ));
}
