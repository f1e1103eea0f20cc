//! Check whether the Azure CLI holds a usable sign-in.

use serde_json::Value;
use std::{io::ErrorKind, process::Command};
use time::OffsetDateTime;
use tracing::debug;

const EXPIRED_MESSAGE: &str = "Azure CLI was detected but the token has expired. \
     For Azure CLI single sign-on, please sign in using 'az login'.";
const SIGN_IN_MESSAGE: &str = "Azure CLI was detected but no token is available. \
     For Azure CLI single sign-on, please sign in using 'az login'.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzureCliStatus {
    Ok,
    NotInstalled,
    NeedsSignIn,
    TokenExpired,
    UnknownError,
}

/// Run `az account get-access-token` and classify the outcome.
#[must_use]
pub fn check_cli_credentials() -> (AzureCliStatus, Option<String>) {
    let program = if cfg!(windows) { "az.cmd" } else { "az" };
    let output = Command::new(program)
        .args(["account", "get-access-token", "--output", "json"])
        .output();
    match output {
        Ok(output) => classify_cli_output(
            output.status.success(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            OffsetDateTime::now_utc(),
        ),
        Err(err) if err.kind() == ErrorKind::NotFound => (AzureCliStatus::NotInstalled, None),
        Err(err) => {
            debug!(%err, "unable to run the Azure CLI");
            (AzureCliStatus::UnknownError, None)
        }
    }
}

/// Classify the output of `az account get-access-token`.
#[must_use]
pub fn classify_cli_output(
    success: bool,
    stdout: &str,
    stderr: &str,
    now: OffsetDateTime,
) -> (AzureCliStatus, Option<String>) {
    if !success {
        if stderr.contains("AADSTS70043") {
            return (AzureCliStatus::TokenExpired, Some(EXPIRED_MESSAGE.to_string()));
        }
        if stderr.contains("az login") {
            return (AzureCliStatus::NeedsSignIn, Some(SIGN_IN_MESSAGE.to_string()));
        }
        debug!(stderr, "unrecognised Azure CLI failure");
        return (AzureCliStatus::UnknownError, None);
    }

    let expires_on = serde_json::from_str::<Value>(stdout)
        .ok()
        .and_then(|token| token.get("expires_on").and_then(expiry_timestamp))
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());
    match expires_on {
        Some(expiry) if expiry < now => {
            (AzureCliStatus::TokenExpired, Some(EXPIRED_MESSAGE.to_string()))
        }
        _ => (
            AzureCliStatus::Ok,
            Some("Azure CLI credentials available.".to_string()),
        ),
    }
}

fn expiry_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
