//! # Threat Intel Helpers
//!
//! `threat-intel-helpers` provides unofficial convenience layers for security
//! analysts working against Azure and HTTP threat-intelligence services.
//!
//! ## Modules
//!
//! - `cache`: Caches the credential pair produced by `connect`, refreshing it lazily when its token expires or another cloud is requested.
//! - `chained_token_credential`: Tries multiple credential sources in order until one returns a token.
//! - `cli_status`: Checks whether the Azure CLI holds a usable sign-in.
//! - `cloud`: Azure cloud names, aliases and endpoints.
//! - `config`: Settings and per-provider options.
//! - `connect`: Builds and validates a credential chain, producing legacy and modern credential handles.
//! - `error`: Error types.
//! - `http_provider`: Base for threat-intelligence providers queried over HTTP.
//! - `ioc_type`: Observable type inference and validation.
//! - `legacy_credential`: Fixed-scope credential for clients that do not pass scopes.
//! - `lookup_cache`: Bounded memo of lookup results.
//! - `lookup_result`: The normalized result of a lookup.
//! - `request`: Declarative request templates and the request builder.
//! - `sources`: Named credential sources (environment, Azure CLI, managed identity, Azure Developer CLI).
//! - `template`: `{name}` placeholder strings.
//! - `transport`: HTTP transport used by providers.
//!

#![forbid(unsafe_code)]
#![deny(
    clippy::indexing_slicing,
    clippy::manual_assert,
    clippy::panic,
    clippy::expect_used,
    clippy::unwrap_used
)]

pub mod cache;
pub mod chained_token_credential;
pub mod cli_status;
pub mod cloud;
pub mod config;
pub mod connect;
pub mod error;
pub mod http_provider;
pub mod ioc_type;
pub mod legacy_credential;
pub mod lookup_cache;
pub mod lookup_result;
pub mod request;
pub mod sources;
pub mod template;
pub mod transport;
