use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::SentimentSource;
use crate::error::FetchError;
use crate::indicators::SentimentReading;

/// alternative.me Crypto Fear & Greed index
#[derive(Clone)]
pub struct FearGreedClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: Option<String>,
}

impl FearGreedClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SentimentSource for FearGreedClient {
    async fn fetch_sentiment(&self) -> Result<SentimentReading, FetchError> {
        let url = format!("{}/fng/", self.base_url);

        let response: FngResponse = self
            .client
            .get(&url)
            .query(&[("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let entry = response.data.into_iter().next().ok_or(FetchError::Empty)?;
        let value: f64 = entry
            .value
            .parse()
            .map_err(|e| FetchError::Malformed(format!("fear & greed value '{}': {}", entry.value, e)))?;

        let mut reading = SentimentReading::new(value);
        if let Some(label) = entry.value_classification {
            reading.classification = label;
        }
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_fetch_sentiment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fng/")
            .match_query(Matcher::UrlEncoded("limit".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"{"name":"Fear and Greed Index","data":[{"value":"25","value_classification":"Extreme Fear","timestamp":"1704067200"}]}"#,
            )
            .create_async()
            .await;

        let client = FearGreedClient::new(&server.url(), 5).unwrap();
        let reading = client.fetch_sentiment().await.unwrap();

        mock.assert_async().await;
        assert_eq!(reading.value, 25.0);
        assert_eq!(reading.classification, "Extreme Fear");
    }

    #[tokio::test]
    async fn test_empty_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fng/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let client = FearGreedClient::new(&server.url(), 5).unwrap();
        assert!(matches!(client.fetch_sentiment().await, Err(FetchError::Empty)));
    }
}
