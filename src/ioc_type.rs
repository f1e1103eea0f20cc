//! Observable type inference and validation run before any request is made.

use crate::{
    lookup_result::{LookupResult, LookupStatus},
    request::QueryTemplates,
};
use regex::Regex;
use serde_json::json;
use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::LazyLock,
};

pub const IPV4: &str = "ipv4";
pub const IPV6: &str = "ipv6";
pub const DNS: &str = "dns";
pub const URL: &str = "url";
pub const EMAIL: &str = "email";
pub const MD5_HASH: &str = "md5_hash";
pub const SHA1_HASH: &str = "sha1_hash";
pub const SHA256_HASH: &str = "sha256_hash";
pub const FILE_HASH: &str = "file_hash";

static URL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(https?|ftp)://[^\s/$.?#][^\s]*$").ok());
static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").ok());
static DNS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\.?$").ok()
});
static MD5_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{32}$").ok());
static SHA1_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{40}$").ok());
static SHA256_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{64}$").ok());

fn matches(re: &LazyLock<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

/// Whether `value` is a valid instance of `ioc_type`.
///
/// Returns `None` for types with no known pattern; those are accepted as
/// given.
#[must_use]
pub fn validate(ioc_type: &str, value: &str) -> Option<bool> {
    let valid = match ioc_type {
        IPV4 => value.parse::<Ipv4Addr>().is_ok(),
        IPV6 => value.parse::<Ipv6Addr>().is_ok(),
        URL => matches(&URL_RE, value),
        EMAIL => matches(&EMAIL_RE, value),
        DNS => matches(&DNS_RE, value),
        MD5_HASH => matches(&MD5_RE, value),
        SHA1_HASH => matches(&SHA1_RE, value),
        SHA256_HASH => matches(&SHA256_RE, value),
        FILE_HASH => [&MD5_RE, &SHA1_RE, &SHA256_RE]
            .into_iter()
            .any(|re| matches(re, value)),
        _ => return None,
    };
    Some(valid)
}

/// Guess the type of an observable.
#[must_use]
pub fn infer(value: &str) -> Option<&'static str> {
    [IPV4, IPV6, URL, EMAIL, MD5_HASH, SHA1_HASH, SHA256_HASH, DNS]
        .into_iter()
        .find(|ioc_type| validate(ioc_type, value) == Some(true))
}

/// Undo common de-fanging (`1[.]2[.]3[.]4`, `hxxp://`).
#[must_use]
pub fn refang(value: &str) -> String {
    let mut out = value
        .trim()
        .replace("[.]", ".")
        .replace("(.)", ".")
        .replace("{.}", ".")
        .replace("[:]", ":");
    for (fanged, plain) in [("hxxps://", "https://"), ("hxxp://", "http://")] {
        if out
            .get(..fanged.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(fanged))
        {
            out = format!("{plain}{}", out.get(fanged.len()..).unwrap_or_default());
        }
    }
    out
}

/// The type check that gates every lookup.
///
/// The returned result has status [`LookupStatus::Ok`] when the lookup may
/// proceed; any other status ends the lookup without a network call.
pub trait IocTypeCheck: Send + Sync {
    fn check(
        &self,
        ioc: &str,
        ioc_type: Option<&str>,
        query_type: Option<&str>,
        templates: &QueryTemplates,
    ) -> LookupResult;
}

/// Type check built on [`infer`], [`validate`] and [`refang`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultIocTypeCheck;

impl IocTypeCheck for DefaultIocTypeCheck {
    fn check(
        &self,
        ioc: &str,
        ioc_type: Option<&str>,
        query_type: Option<&str>,
        templates: &QueryTemplates,
    ) -> LookupResult {
        let safe_ioc = refang(ioc);
        let resolved = ioc_type.map(str::trim).filter(|t| !t.is_empty()).map(ToString::to_string);
        let mut result = LookupResult::new(ioc, resolved.clone().unwrap_or_default());
        result.safe_ioc.clone_from(&safe_ioc);
        result.query_subtype = query_type.map(ToString::to_string);

        if safe_ioc.is_empty() {
            result.status = LookupStatus::BadFormat;
            result.details = json!("Observable value is empty.");
            return result;
        }

        let Some(ioc_type) = resolved.or_else(|| infer(&safe_ioc).map(ToString::to_string))
        else {
            result.status = LookupStatus::NotSupported;
            result.details = json!("Could not determine the type of the observable.");
            return result;
        };
        result.ioc_type.clone_from(&ioc_type);

        if !templates.supports_type(&ioc_type) {
            result.status = LookupStatus::NotSupported;
            result.details = json!(format!("IoC type {ioc_type} not supported."));
            return result;
        }
        if validate(&ioc_type, &safe_ioc) == Some(false) {
            result.status = LookupStatus::BadFormat;
            result.details = json!(format!("Observable does not match the format for {ioc_type}."));
            return result;
        }
        result
    }
}
