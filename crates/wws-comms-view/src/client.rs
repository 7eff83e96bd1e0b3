//! HTTP implementation of [`CommsBackend`] against the kernel's comms API.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::header::ACCEPT;
use url::Url;

use wws_comms_protocol::{
    CommsEvent, CommsSendRequest, CommsTaskRequest, Topology, EVENTS_PATH, EVENT_STREAM_PATH,
    SEND_PATH, STREAM_TOKEN_PARAM, TASK_PATH, TOPOLOGY_PATH,
};

use crate::backend::{CommsBackend, MessageStream};
use crate::sse::SseDecoder;
use crate::{ViewConfig, ViewError};

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &ViewConfig) -> Result<Self, ViewError> {
        // Only connecting is bounded at the client level; a total timeout
        // would cut the long-lived stream.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;
        Ok(Self {
            client,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ViewError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Stream URL with the access token, if any, as a URL-encoded query
    /// parameter.
    pub fn stream_url(&self) -> Result<Url, ViewError> {
        let mut url = self.endpoint(EVENT_STREAM_PATH)?;
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair(STREAM_TOKEN_PARAM, token);
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ViewError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        check_status(resp).await
    }

    async fn post<T: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), ViewError> {
        let resp = self
            .client
            .post(self.endpoint(path)?)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

/// Map non-2xx responses to [`ViewError::Status`], preferring the server's
/// `{"error": "..."}` message over the raw body.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ViewError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });
    Err(ViewError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CommsBackend for HttpBackend {
    async fn fetch_topology(&self) -> Result<Topology, ViewError> {
        let resp = self.get(self.endpoint(TOPOLOGY_PATH)?).await?;
        Ok(resp.json::<Topology>().await?)
    }

    async fn fetch_events(&self, limit: usize) -> Result<Vec<CommsEvent>, ViewError> {
        let mut url = self.endpoint(EVENTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let resp = self.get(url).await?;
        let raw: Vec<serde_json::Value> = resp.json().await?;

        // One bad record should not sink the whole page.
        let events = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<CommsEvent>(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed event in page");
                    None
                }
            })
            .take(limit)
            .collect();
        Ok(events)
    }

    async fn open_stream(&self) -> Result<MessageStream, ViewError> {
        let url = self.stream_url()?;
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let mut decoder = SseDecoder::new();
        let messages = resp
            .bytes_stream()
            .map(move |chunk| {
                let batch: Vec<Result<String, ViewError>> = match chunk {
                    Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(ViewError::from(e))],
                };
                stream::iter(batch)
            })
            .flatten()
            .boxed();
        Ok(messages)
    }

    async fn send_message(&self, request: CommsSendRequest) -> Result<(), ViewError> {
        self.post(SEND_PATH, &request).await
    }

    async fn post_task(&self, request: CommsTaskRequest) -> Result<(), ViewError> {
        self.post(TASK_PATH, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str, token: Option<&str>) -> HttpBackend {
        let config = ViewConfig {
            base_url: base_url.to_string(),
            token: token.map(String::from),
            ..Default::default()
        };
        HttpBackend::new(&config).unwrap()
    }

    #[test]
    fn stream_url_without_token() {
        let b = backend("http://127.0.0.1:4200/", None);
        assert_eq!(
            b.stream_url().unwrap().as_str(),
            "http://127.0.0.1:4200/api/comms/events/stream"
        );
    }

    #[test]
    fn stream_url_encodes_token() {
        let b = backend("http://127.0.0.1:4200", Some("a b&c=d"));
        assert_eq!(
            b.stream_url().unwrap().as_str(),
            "http://127.0.0.1:4200/api/comms/events/stream?token=a+b%26c%3Dd"
        );
    }

    #[test]
    fn empty_token_is_not_appended() {
        let b = backend("http://localhost:4200", Some(""));
        assert!(b.stream_url().unwrap().query().is_none());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = ViewConfig {
            base_url: "::nope".into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpBackend::new(&config),
            Err(ViewError::InvalidUrl(_))
        ));
    }
}
