//! SQL transport: sends a SQL string to the backend's HTTP query
//! interface and returns the raw response body.
//!
//! Out of scope per spec.md §1 ("the SQL transport itself ... assumed
//! to be a function that sends a SQL string and returns the raw
//! response body"); this module is the minimal concrete realization of
//! that contract over `reqwest`, grounded the same way the teacher
//! reaches external HTTP services (its OIDC token exchange uses
//! `reqwest::Client::post`).

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::error::GatewayError;

/// Sends `sql` as the request body to `url` and returns the raw
/// response bytes, enforcing `timeout` and honoring cancellation of the
/// calling future (dropping the future aborts the in-flight request,
/// which is how spec.md §5's per-request cancellation token is realized
/// here).
pub async fn query(
    client: &reqwest::Client,
    url: &str,
    sql: &str,
    timeout: Duration,
) -> Result<Bytes, GatewayError> {
    let send = client.post(url).body(sql.to_string()).send();

    let response = tokio::time::timeout(timeout, send)
        .await
        .map_err(|_| GatewayError::BackendTimeout)?
        .map_err(|e| GatewayError::BackendUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(GatewayError::BackendUnavailable(format!(
            "backend returned status {}",
            response.status()
        )));
    }

    let body = tokio::time::timeout(timeout, response.bytes())
        .await
        .map_err(|_| GatewayError::BackendTimeout)?
        .map_err(|e| GatewayError::BackendUnavailable(e.to_string()))?;

    debug!(bytes = body.len(), "backend query returned");
    Ok(body)
}
