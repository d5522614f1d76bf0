//! Decides whether a connection URL should use TLS.
//!
//! TLS here is encryption only: `PgSslMode::Require` never verifies the server
//! certificate. Plain connections are accepted for hosts the heuristic does not match.

use sqlx::postgres::PgSslMode;
use url::Url;

/// Whether `url` should be dialled over TLS.
///
/// An explicit `sslmode` query parameter wins: anything but `disable` means TLS.
/// Otherwise the host is matched against `host_suffixes`.
pub fn should_use_tls(url: &Url, host_suffixes: &[String]) -> bool {
    if let Some((_, mode)) = url.query_pairs().find(|(key, _)| key == "sslmode") {
        return !mode.eq_ignore_ascii_case("disable");
    }

    let host = match url.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return false,
    };
    host_suffixes
        .iter()
        .any(|suffix| host.ends_with(&suffix.to_ascii_lowercase()))
}

/// The sqlx mode for [`should_use_tls`].
pub fn ssl_mode(url: &Url, host_suffixes: &[String]) -> PgSslMode {
    if should_use_tls(url, host_suffixes) {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    }
}
