#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde_json::{Value, json};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use threat_intel_helpers::{
    config::ProviderConfig,
    error::{ConfigurationError, LookupError},
    http_provider::{HttpProvider, LookupOptions, ProviderDefinition, ProviderParam},
    lookup_result::{LookupResult, LookupStatus, ParsedResult, ResultSeverity},
    request::{HttpVerb, LookupRequest, RequestTemplate},
    transport::{HttpResponse, HttpTransport},
};

#[derive(Debug)]
enum Reply {
    Respond(u16, &'static str),
    Refuse,
}

#[derive(Debug)]
struct FakeTransport {
    reply: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<(LookupRequest, Duration)>>,
}

impl FakeTransport {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> (LookupRequest, Duration) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl HttpTransport for FakeTransport {
    async fn get(
        &self,
        request: &LookupRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), timeout));
        match self.reply {
            Reply::Respond(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::Refuse => Err(LookupError::Transport(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))),
        }
    }
}

fn parse(response: &LookupResult) -> Result<ParsedResult, LookupError> {
    assert_eq!(response.status, LookupStatus::Http(200));
    let score = response.raw_result["score"].as_u64().unwrap_or_default();
    Ok(ParsedResult {
        hit: score > 0,
        severity: if score > 50 {
            ResultSeverity::High
        } else {
            ResultSeverity::Information
        },
        details: json!({"score": score}),
    })
}

type Parser = fn(&LookupResult) -> Result<ParsedResult, LookupError>;

fn definition() -> ProviderDefinition {
    ProviderDefinition::new("ExampleTI", "https://api.example/")
        .require(ProviderParam::ApiKey)
        .query(
            "ipv4",
            RequestTemplate::get("/ip/{observable}").header("X-Api-Key", "{API_KEY}"),
        )
        .query("ipv4-geo", RequestTemplate::get("/geo/{observable}"))
        .query(
            "dns",
            RequestTemplate::get("/dns/{observable}").verb(HttpVerb::Post),
        )
        .query(
            "url",
            RequestTemplate::get("/url/{observable}").auth("Digest".into(), ["{API_KEY}"]),
        )
        .query("md5_hash", RequestTemplate::get("/file/{API_ID}/{observable}"))
}

fn config() -> ProviderConfig {
    ProviderConfig {
        auth_key: Some(" secret ".to_string()),
        http_timeout: Some(7.0),
        ..ProviderConfig::default()
    }
}

fn provider(reply: Reply) -> (HttpProvider<Parser>, Arc<FakeTransport>) {
    let transport = FakeTransport::new(reply);
    let provider = HttpProvider::new(definition(), &config(), parse as Parser)
        .unwrap()
        .with_transport(transport.clone());
    (provider, transport)
}

#[tokio::test]
async fn positive_hit_is_parsed() {
    let (provider, transport) = provider(Reply::Respond(200, r#"{"score": 90}"#));
    let result = provider.lookup_ioc("1.2.3.4", None, None).await;

    assert_eq!(result.status, LookupStatus::Ok);
    assert!(result.result);
    assert_eq!(result.severity, ResultSeverity::High);
    assert_eq!(result.details, json!({"score": 90}));
    assert_eq!(result.raw_result, json!({"score": 90}));
    assert_eq!(result.provider, "ExampleTI");
    assert_eq!(result.ioc_type, "ipv4");
    assert_eq!(
        result.reference.as_deref(),
        Some("https://api.example/ip/1.2.3.4")
    );

    let (request, timeout) = transport.last_request();
    assert_eq!(request.url.as_str(), "https://api.example/ip/1.2.3.4");
    assert_eq!(request.headers.get("X-Api-Key").unwrap(), "secret");
    assert!(request.headers.contains_key("User-Agent"));
    assert_eq!(timeout, Duration::from_secs(7));
}

#[tokio::test]
async fn not_found_is_a_negative_result() {
    let (provider, _) = provider(Reply::Respond(404, "missing"));
    let result = provider.lookup_ioc("1.2.3.4", Some("ipv4"), None).await;

    assert!(!result.result);
    assert_eq!(result.details, json!("Not found."));
    assert_eq!(result.status, LookupStatus::Http(404));
    assert_eq!(result.status.code(), 404);
    assert_eq!(result.raw_result, json!("<Response [404 Not Found]>"));
    assert!(result.reference.is_some());
}

#[tokio::test]
async fn other_statuses_get_reason_text() {
    let (p, _) = provider(Reply::Respond(403, ""));
    let result = p.lookup_ioc("1.2.3.4", None, None).await;
    assert_eq!(result.status, LookupStatus::Http(403));
    assert_eq!(
        result.details,
        json!("Request forbidden. Allowed query rate may have been exceeded.")
    );

    let (p, _) = provider(Reply::Respond(401, ""));
    let result = p.lookup_ioc("1.2.3.4", None, None).await;
    assert_eq!(
        result.details,
        json!("Authorization failed. Check account and key details.")
    );

    let (p, _) = provider(Reply::Respond(503, ""));
    let result = p.lookup_ioc("1.2.3.4", None, None).await;
    assert_eq!(result.details, json!("Service Unavailable"));
    assert!(!result.result);
}

#[tokio::test]
async fn invalid_json_degrades_gracefully() {
    let (provider, _) = provider(Reply::Respond(200, "<html>oops</html>"));
    let result = provider.lookup_ioc("1.2.3.4", None, None).await;

    assert!(!result.result);
    assert_eq!(result.severity, ResultSeverity::Information);
    assert_eq!(result.details, json!({}));
    assert_eq!(result.status, LookupStatus::Ok);
    let raw = result.raw_result.as_str().unwrap();
    assert!(raw.contains("problem parsing results"));
    assert!(raw.contains("<html>oops</html>"));
}

#[tokio::test]
async fn repeated_lookups_are_memoized() {
    let (provider, transport) = provider(Reply::Respond(200, r#"{"score": 1}"#));
    let first = provider.lookup_ioc("1.2.3.4", None, None).await;
    let second = provider.lookup_ioc("1.2.3.4", None, None).await;
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(transport.calls(), 1);

    let options = LookupOptions {
        provider_name: Some("Renamed".to_string()),
        timeout: Some(Duration::from_secs(2)),
    };
    let third = provider
        .lookup_ioc_with("1.2.3.4", None, None, &options)
        .await;
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.provider, "Renamed");
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.last_request().1, Duration::from_secs(2));

    provider.clear_cache().await;
    provider.lookup_ioc("1.2.3.4", None, None).await;
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn cache_is_bounded() {
    let (provider, transport) = provider(Reply::Respond(200, r#"{"score": 1}"#));
    let provider = provider.with_cache_capacity(1);
    provider.lookup_ioc("1.1.1.1", None, None).await;
    provider.lookup_ioc("2.2.2.2", None, None).await;
    provider.lookup_ioc("1.1.1.1", None, None).await;
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn connection_failure_is_captured() {
    let (provider, _) = provider(Reply::Refuse);
    let result = provider.lookup_ioc("1.2.3.4", None, None).await;

    assert_eq!(result.status, LookupStatus::QueryFailed);
    assert!(!result.result);
    assert_eq!(
        result.reference.as_deref(),
        Some("https://api.example/ip/1.2.3.4")
    );
    let raw = result.raw_result.as_str().unwrap();
    assert!(raw.starts_with("NetworkError\n"));
    assert!(raw.contains("connection refused"));
    assert_eq!(
        result.details,
        json!(["request failed: connection refused"])
    );
}

#[tokio::test]
async fn missing_template_is_not_supported() {
    let (provider, transport) = provider(Reply::Respond(200, "{}"));
    let result = provider.lookup_ioc("1.2.3.4", None, Some("whois")).await;

    assert_eq!(result.status, LookupStatus::NotSupported);
    assert_eq!(result.reference, None);
    assert_eq!(
        result.details,
        json!(["Provider does not support this type ipv4-whois."])
    );
    assert_eq!(transport.calls(), 0);

    let result = provider.lookup_ioc("1.2.3.4", None, Some("geo")).await;
    assert_eq!(result.status, LookupStatus::Ok);
    assert_eq!(
        result.reference.as_deref(),
        Some("https://api.example/geo/1.2.3.4")
    );
}

#[tokio::test]
async fn invalid_observables_never_reach_the_network() {
    let (provider, transport) = provider(Reply::Respond(200, "{}"));

    let result = provider.lookup_ioc("300.1.1.1", Some("ipv4"), None).await;
    assert_eq!(result.status, LookupStatus::BadFormat);

    let result = provider.lookup_ioc("someone@example.com", None, None).await;
    assert_eq!(result.status, LookupStatus::NotSupported);

    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn unsupported_verb_is_captured() {
    let (provider, transport) = provider(Reply::Respond(200, "{}"));
    let result = provider.lookup_ioc("a.example", Some("dns"), None).await;

    assert_eq!(result.status, LookupStatus::QueryFailed);
    assert_eq!(
        result.reference.as_deref(),
        Some("https://api.example/dns/a.example")
    );
    assert!(
        result
            .raw_result
            .as_str()
            .unwrap()
            .starts_with("UnsupportedVerbError\n")
    );
    assert_eq!(result.details, json!(["Unsupported verb POST"]));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn unsupported_auth_is_captured() {
    let (provider, transport) = provider(Reply::Respond(200, "{}"));
    let result = provider
        .lookup_ioc("https://evil.example/x", None, None)
        .await;

    assert_eq!(result.ioc_type, "url");
    assert_eq!(result.status, LookupStatus::QueryFailed);
    assert_eq!(result.details, json!(["Unknown auth type Digest"]));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn missing_substitution_value_is_captured() {
    // md5_hash needs API_ID, which this provider was not configured with
    let (provider, transport) = provider(Reply::Respond(200, "{}"));
    let result = provider
        .lookup_ioc("d41d8cd98f00b204e9800998ecf8427e", None, None)
        .await;

    assert_eq!(result.status, LookupStatus::QueryFailed);
    assert!(
        result
            .raw_result
            .as_str()
            .unwrap()
            .starts_with("TemplateSubstitutionError\n")
    );
    assert_eq!(
        result.details,
        json!(["no value supplied for placeholder {API_ID}"])
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn parser_errors_are_captured() {
    let failing: Parser = |response| {
        let score: Vec<String> = serde_json::from_value(response.raw_result.clone())?;
        Ok(ParsedResult {
            hit: !score.is_empty(),
            severity: ResultSeverity::Warning,
            details: Value::Null,
        })
    };
    let transport = FakeTransport::new(Reply::Respond(200, r#"{"score": 3}"#));
    let provider = HttpProvider::new(definition(), &config(), failing)
        .unwrap()
        .with_transport(transport);
    let result = provider.lookup_ioc("1.2.3.4", None, None).await;

    assert_eq!(result.status, LookupStatus::QueryFailed);
    assert!(!result.result);
    assert!(
        result
            .raw_result
            .as_str()
            .unwrap()
            .starts_with("JSONDecodeError\n")
    );
}

#[test]
fn missing_required_parameters_fail_construction() {
    let definition = definition().require(ProviderParam::ApiId);
    let err = HttpProvider::new(definition, &ProviderConfig::default(), parse as Parser)
        .err()
        .unwrap();
    match err {
        ConfigurationError::MissingParameters { provider, missing } => {
            assert_eq!(provider, "ExampleTI");
            assert_eq!(missing, ["API_KEY", "API_ID"]);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn invalid_templates_fail_construction() {
    let definition =
        definition().query("sha1_hash", RequestTemplate::get("/{observable}/{PASSWORD}"));
    let err = HttpProvider::new(definition, &config(), parse as Parser)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ConfigurationError::InvalidTemplate { ref key, .. } if key == "sha1_hash"
    ));
}

#[test]
fn query_sub_types_are_not_separate_types() {
    let (provider, _) = provider(Reply::Refuse);
    assert_eq!(
        provider.supported_types(),
        ["dns", "ipv4", "md5_hash", "url"]
    );
    assert_eq!(
        provider.supported_queries(),
        ["dns", "ipv4", "ipv4-geo", "md5_hash", "url"]
    );
}

#[test]
fn definitions_load_from_json() {
    let definition: ProviderDefinition = serde_json::from_value(json!({
        "name": "Declared",
        "base_url": "https://declared.example/api",
        "required_params": ["AuthKey"],
        "queries": {
            "dns": {"path": "/domain/{observable}", "params": {"key": "{API_KEY}"}},
            "ipv4": {"path": "https://other.example/{observable}", "full_url": true,
                     "auth_type": "HTTPBasic", "auth_str": ["user", "{API_KEY}"]}
        }
    }))
    .unwrap();
    let provider = HttpProvider::new(definition, &config(), parse as Parser).unwrap();
    assert_eq!(provider.name(), "Declared");
    assert_eq!(provider.supported_types(), ["dns", "ipv4"]);
    assert_eq!(provider.supported_queries(), ["dns", "ipv4"]);
    assert_eq!(provider.timeout(), Duration::from_secs(7));
    assert_eq!(provider.base_url(), "https://declared.example/api");
    assert!(
        provider
            .templates()
            .get("ipv4")
            .is_some_and(|t| t.verb() == HttpVerb::Get)
    );
}
