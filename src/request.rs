//! Declarative request templates and the builder that turns one of them
//! into a concrete HTTP request for an observable.

use crate::{
    error::{LookupError, TemplateError},
    template::{FormatString, OBSERVABLE, SubstitutionContext},
};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt};
use url::Url;

/// Context key holding the provider's API identifier.
pub const API_ID: &str = "API_ID";
/// Context key holding the provider's API key.
pub const API_KEY: &str = "API_KEY";

/// Every placeholder a request template may use.
pub const CONTEXT_KEYS: &[&str] = &[OBSERVABLE, API_ID, API_KEY];

/// Value of the identifying header added to every request that does not
/// set its own.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    #[default]
    Get,
    Post,
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// Authentication attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AuthType {
    #[default]
    None,
    Basic,
    /// Not supported; requests using it fail to build.
    Other(String),
}

impl From<String> for AuthType {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::None
        } else if trimmed.eq_ignore_ascii_case("HTTPBasic") || trimmed.eq_ignore_ascii_case("basic")
        {
            Self::Basic
        } else {
            Self::Other(value)
        }
    }
}

impl From<&str> for AuthType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// How to build the request for one observable type.
///
/// Every string except `sub_type` may contain `{observable}`, `{API_ID}`
/// and `{API_KEY}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestTemplate {
    pub path: String,
    pub verb: HttpVerb,
    /// `path` is a complete URL rather than a suffix of the provider's base
    /// URL. Only `{observable}` may be used in it.
    pub full_url: bool,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
    pub auth_type: AuthType,
    #[serde(alias = "auth_fields")]
    pub auth_str: Vec<String>,
    pub sub_type: String,
}

impl RequestTemplate {
    /// A `GET` template for `path`.
    #[must_use]
    pub fn get<P: Into<String>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn verb(mut self, verb: HttpVerb) -> Self {
        self.verb = verb;
        self
    }

    #[must_use]
    pub fn full_url(mut self) -> Self {
        self.full_url = true;
        self
    }

    #[must_use]
    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn data<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn auth<I, S>(mut self, auth_type: AuthType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_type = auth_type;
        self.auth_str = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn sub_type<S: Into<String>>(mut self, sub_type: S) -> Self {
        self.sub_type = sub_type.into();
        self
    }
}

/// A [`RequestTemplate`] whose strings have been parsed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    verb: HttpVerb,
    full_url: bool,
    path: FormatString,
    headers: Vec<(String, FormatString)>,
    params: Vec<(String, FormatString)>,
    data: Vec<(String, FormatString)>,
    auth_type: AuthType,
    auth_fields: Vec<FormatString>,
    sub_type: String,
}

fn compile_map(map: &BTreeMap<String, String>) -> Result<Vec<(String, FormatString)>, TemplateError> {
    map.iter()
        .map(|(key, value)| {
            let template = FormatString::parse(value)?;
            template.check_placeholders(CONTEXT_KEYS)?;
            Ok((key.clone(), template))
        })
        .collect()
}

fn render_map(
    map: &[(String, FormatString)],
    context: &SubstitutionContext,
) -> Result<BTreeMap<String, String>, TemplateError> {
    map.iter()
        .map(|(key, template)| Ok((key.clone(), template.render(context)?)))
        .collect()
}

impl CompiledTemplate {
    /// Parse every string in `template` and reject placeholders that can
    /// never be supplied.
    pub fn compile(template: &RequestTemplate) -> Result<Self, TemplateError> {
        let path = FormatString::parse(&template.path)?;
        if template.full_url {
            path.check_placeholders(&[OBSERVABLE])?;
        } else {
            path.check_placeholders(CONTEXT_KEYS)?;
        }

        let auth_fields = template
            .auth_str
            .iter()
            .map(|field| {
                let field = FormatString::parse(field)?;
                field.check_placeholders(CONTEXT_KEYS)?;
                Ok(field)
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;
        if template.auth_type == AuthType::Basic && auth_fields.len() > 2 {
            return Err(TemplateError::InvalidAuthFields(auth_fields.len()));
        }

        Ok(Self {
            verb: template.verb,
            full_url: template.full_url,
            path,
            headers: compile_map(&template.headers)?,
            params: compile_map(&template.params)?,
            data: compile_map(&template.data)?,
            auth_type: template.auth_type.clone(),
            auth_fields,
            sub_type: template.sub_type.clone(),
        })
    }

    #[must_use]
    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// Placeholders used anywhere in the template.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        std::iter::once(&self.path)
            .chain(self.headers.iter().map(|(_, t)| t))
            .chain(self.params.iter().map(|(_, t)| t))
            .chain(self.data.iter().map(|(_, t)| t))
            .chain(self.auth_fields.iter())
            .flat_map(FormatString::placeholders)
    }

    /// Build the request for `value`.
    pub fn build(
        &self,
        base_url: &str,
        value: &str,
        request_params: &SubstitutionContext,
    ) -> Result<LookupRequest, LookupError> {
        let mut context = request_params.clone();
        context.insert(OBSERVABLE.to_string(), value.to_string());

        let url = if self.full_url {
            let observable_only =
                SubstitutionContext::from([(OBSERVABLE.to_string(), value.to_string())]);
            self.path.render(&observable_only)?
        } else {
            join_url(base_url, &self.path.render(&context)?)
        };
        let url = Url::parse(&url)?;

        let mut headers = render_map(&self.headers, &context)?;
        if !headers.keys().any(|k| k.eq_ignore_ascii_case("user-agent")) {
            headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        }
        let query = render_map(&self.params, &context)?;
        let body = render_map(&self.data, &context)?;

        let basic_auth = match (&self.auth_type, self.auth_fields.as_slice()) {
            (_, []) | (AuthType::None, _) => None,
            (AuthType::Basic, fields) => {
                let mut fields = fields.iter().map(|field| field.render(&context));
                let username = fields.next().transpose()?.unwrap_or_default();
                let password = fields.next().transpose()?;
                Some(BasicAuth { username, password })
            }
            (AuthType::Other(name), _) => return Err(LookupError::UnsupportedAuth(name.clone())),
        };

        Ok(LookupRequest {
            verb: self.verb,
            url,
            headers,
            query,
            body,
            basic_auth,
        })
    }
}

/// Join a base URL and a path with exactly one `/` between them.
#[must_use]
pub fn join_url(base_url: &str, path: &str) -> String {
    if base_url.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// A fully formed request, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub verb: HttpVerb,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: BTreeMap<String, String>,
    pub basic_auth: Option<BasicAuth>,
}

/// Compiled templates keyed by `"{type}"` or `"{type}-{query type}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplates {
    templates: BTreeMap<String, CompiledTemplate>,
}

impl QueryTemplates {
    /// Compile and register `template`. The templates are immutable once
    /// registered; registering a key again replaces the earlier template.
    pub fn register<K: Into<String>>(
        &mut self,
        key: K,
        template: &RequestTemplate,
    ) -> Result<(), TemplateError> {
        let compiled = CompiledTemplate::compile(template)?;
        self.templates.insert(key.into(), compiled);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CompiledTemplate> {
        self.templates.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// True if any template handles `ioc_type`, with or without a query type.
    #[must_use]
    pub fn supports_type(&self, ioc_type: &str) -> bool {
        self.templates.keys().any(|key| {
            key == ioc_type
                || key
                    .strip_prefix(ioc_type)
                    .is_some_and(|rest| rest.starts_with('-'))
        })
    }

    /// Template lookup key for a type and optional query type.
    #[must_use]
    pub fn key_for(value_type: &str, query_type: Option<&str>) -> String {
        match query_type {
            Some(query_type) => format!("{value_type}-{query_type}"),
            None => value_type.to_string(),
        }
    }

    /// Build the request for `value` from the template registered for its
    /// type and query type.
    pub fn substitute(
        &self,
        base_url: &str,
        value: &str,
        value_type: &str,
        query_type: Option<&str>,
        request_params: &SubstitutionContext,
    ) -> Result<LookupRequest, LookupError> {
        let key = Self::key_for(value_type, query_type);
        let template = self
            .templates
            .get(&key)
            .ok_or(LookupError::UnsupportedType(key))?;
        template.build(base_url, value, request_params)
    }
}
