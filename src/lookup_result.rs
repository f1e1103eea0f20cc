//! The normalized outcome of a single observable lookup.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Outcome code of a lookup.
///
/// Lookups that reach the provider and receive a non-200 response carry the
/// raw HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupStatus {
    Ok,
    NotSupported,
    BadFormat,
    QueryFailed,
    Other,
    Http(u16),
}

impl LookupStatus {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::NotSupported => 1,
            Self::BadFormat => 2,
            Self::QueryFailed => 3,
            Self::Other => 10,
            Self::Http(code) => i32::from(code),
        }
    }

    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl Serialize for LookupStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

/// How concerning a positive hit is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSeverity {
    #[default]
    Information,
    Warning,
    High,
}

impl fmt::Display for ResultSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Information => "information",
            Self::Warning => "warning",
            Self::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    pub ioc: String,
    /// `ioc` after trimming and de-fanging; this is what gets sent.
    pub safe_ioc: String,
    pub ioc_type: String,
    pub query_subtype: Option<String>,
    pub provider: String,
    pub status: LookupStatus,
    /// Positive (`true`) or negative hit.
    pub result: bool,
    pub severity: ResultSeverity,
    pub details: Value,
    pub raw_result: Value,
    /// URL of the request that produced this result.
    pub reference: Option<String>,
}

impl LookupResult {
    #[must_use]
    pub fn new<I, T>(ioc: I, ioc_type: T) -> Self
    where
        I: Into<String>,
        T: Into<String>,
    {
        let ioc = ioc.into();
        Self {
            safe_ioc: ioc.clone(),
            ioc,
            ioc_type: ioc_type.into(),
            query_subtype: None,
            provider: String::new(),
            status: LookupStatus::Ok,
            result: false,
            severity: ResultSeverity::Information,
            details: Value::Null,
            raw_result: Value::Null,
            reference: None,
        }
    }

    pub fn set_severity(&mut self, severity: ResultSeverity) {
        self.severity = severity;
    }

    /// True if the provider response cannot carry a hit: the HTTP status was
    /// not 200, or the body was not a non-empty JSON object.
    #[must_use]
    pub fn failed_response(&self) -> bool {
        self.status != LookupStatus::Http(200)
            || !self
                .raw_result
                .as_object()
                .is_some_and(|body| !body.is_empty())
    }
}

/// What a provider makes of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResult {
    pub hit: bool,
    pub severity: ResultSeverity,
    pub details: Value,
}
