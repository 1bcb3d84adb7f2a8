use reqwest::Client;
use tokio::time::Duration;

pub const PUBLIC_IP_URL: &str = "http://myip.ipip.net";

/// Ask an echo service for this host's public address and location.
///
/// Purely informational: any failure yields `None`.
pub async fn fetch_public_ip(url: &str) -> Option<String> {
    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .ok()?;
    let resp = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!(url, error = %e, "public ip lookup failed");
            return None;
        }
    };
    let text = resp.text().await.ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
