//! HTTP client for the collector's query and ingest surfaces

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Timeout for one-shot requests; streams are unbounded
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// API client for one collector surface
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid collector URL")?;

        Ok(Self { client, base_url })
    }

    /// GET a path and return the raw body
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let response = self.send_get(path, Some(REQUEST_TIMEOUT)).await?;
        response.text().await.context("Failed to read response")
    }

    /// GET a path and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_get(path, Some(REQUEST_TIMEOUT)).await?;
        response.json().await.context("Failed to parse response")
    }

    /// GET a path whose body is consumed incrementally
    pub async fn open_stream(&self, path: &str) -> Result<Response> {
        self.send_get(path, None).await
    }

    /// POST a JSON body; the collector acknowledges with an empty reply
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        check_status(response).await.map(|_| ())
    }

    async fn send_get(&self, path: &str, timeout: Option<Duration>) -> Result<Response> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.context("Failed to send request")?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        anyhow::bail!("API error ({}): {}", status, message);
    }
    Ok(response)
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: String,
    pub cpu_percent: f64,
    pub mem_used_mb: u64,
    pub mem_total_mb: u64,
    pub swap_used_mb: u64,
    pub swap_total_mb: u64,
    pub pswpin: u64,
    pub pswpout: u64,
    pub pgfault: u64,
    pub pgmajfault: u64,
    pub pgpgin: u64,
    pub pgpgout: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_get_decodes_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/history?scope=events")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"type":"oom","ts":"2024-05-01T12:00:00Z"}]"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let events: Vec<Value> = client.get("history?scope=events").await.unwrap();

        assert_eq!(events[0]["type"], "oom");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_body_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/history?scope=nodes")
            .with_status(400)
            .with_body(r#"{"error":"unknown scope 'nodes'"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .get::<Vec<Value>>("history?scope=nodes")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("unknown scope 'nodes'"));
    }

    #[tokio::test]
    async fn test_post_accepts_no_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .match_body(mockito::Matcher::Json(json!({"type": "oom_kill"})))
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        client
            .post("events", &json!({"type": "oom_kill"}))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
