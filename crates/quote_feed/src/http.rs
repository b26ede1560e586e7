use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "prop-sync/0.1";

pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to create reqwest client")
}

/// Send, check status, decode. Non-2xx becomes an error carrying a body snippet.
pub async fn get_json<T: DeserializeOwned>(req: reqwest::RequestBuilder, what: &str) -> Result<T> {
    let resp = req
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("{what} request failed"))?;
    let status = resp.status();
    let raw = resp
        .text()
        .await
        .with_context(|| format!("{what} body read failed"))?;

    if !status.is_success() {
        bail!("{what} status {status}: {}", snippet(&raw, 200));
    }
    debug!("{what} raw (first 300): {}", snippet(&raw, 300));

    serde_json::from_str(&raw).with_context(|| format!("{what} JSON parse failed"))
}

fn snippet(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((i, _)) => &raw[..i],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_respects_char_boundaries() {
        assert_eq!(snippet("abc", 10), "abc");
        assert_eq!(snippet("žluťoučký", 3), "žlu");
    }
}
