use ensemble_skills::fault;
use serde_json::Value;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 500;

pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send a prepared request and decode a JSON body. Transport failures,
/// non-success statuses and undecodable bodies all come back as faults.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<Value, Value> {
    let response = request
        .send()
        .await
        .map_err(|e| fault(format!("{what} request failed"), e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        return Err(fault(
            format!("{what} returned HTTP {}", status.as_u16()),
            body,
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| fault(format!("{what} returned an unreadable body"), e.to_string()))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
