//! REST and WebSocket client for the orchestration service
//!
//! REST requests carry the token as a bearer header; the log stream carries
//! it as a query parameter since WebSocket handshakes can't set headers from
//! every environment this runs in.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::common::{Error, Result};
use crate::watch::stream::StreamEvent;
use crate::watch::{LogStream, WatchTransport};

use super::instances::ConnectionConfig;
use super::types::{
    parse_suite_execution, ExecutionStatus, ScheduleRequest, SourceDetails, SuiteExecution,
    TargetDetails, TestExecutionDetails,
};

/// Client for one resolved orchestration instance
pub struct Connection {
    config: ConnectionConfig,
    http: reqwest::Client,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.config.api_url, path));
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path).send().await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        Self::decode(response).await
    }

    /// Decode a response, surfacing the `detail` field error bodies carry
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            Err(Error::Api(detail))
        }
    }

    pub async fn get_test(&self, id: &str) -> Result<TargetDetails> {
        self.get_json(&format!("/tests/{id}")).await
    }

    pub async fn get_suite(&self, id: &str) -> Result<TargetDetails> {
        self.get_json(&format!("/test-suites/{id}")).await
    }

    pub async fn get_source(&self, id: &str) -> Result<SourceDetails> {
        self.get_json(&format!("/test-sources/{id}")).await
    }

    pub async fn schedule_test(
        &self,
        id: &str,
        request: &ScheduleRequest,
    ) -> Result<TestExecutionDetails> {
        self.post_json(&format!("/tests/{id}/executions"), request)
            .await
    }

    pub async fn schedule_suite(
        &self,
        id: &str,
        request: &ScheduleRequest,
    ) -> Result<SuiteExecution> {
        let value: Value = self
            .post_json(&format!("/test-suites/{id}/executions"), request)
            .await?;
        parse_suite_execution(value)
    }

    pub async fn get_test_execution(&self, id: &str) -> Result<TestExecutionDetails> {
        self.get_json(&format!("/executions/{id}")).await
    }

    pub async fn get_suite_execution(&self, id: &str) -> Result<SuiteExecution> {
        let value: Value = self
            .get_json(&format!("/test-suite-executions/{id}"))
            .await?;
        parse_suite_execution(value)
    }

    fn stream_url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.config.ws_url, path))?;
        if let Some(token) = &self.config.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    /// Open the log stream for an execution
    ///
    /// Frames are pumped into a channel. The channel ending without a
    /// `Failed` event means the server closed the stream cleanly; dropping
    /// the receiver stops the pump and the socket with it.
    pub async fn open_logs_socket(&self, execution_id: &str) -> Result<LogStream> {
        let url = self.stream_url(&format!("/executions/{execution_id}/logs/stream"))?;
        let (mut socket, _) = connect_async(url.as_str()).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = socket.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => StreamEvent::Message(text),
                    Ok(Message::Binary(bytes)) => {
                        StreamEvent::Message(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(error) => {
                        let _ = tx.send(StreamEvent::Failed(error.to_string()));
                        break;
                    }
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl WatchTransport for Connection {
    async fn open_logs_socket(&self, execution_id: &str) -> Result<LogStream> {
        Connection::open_logs_socket(self, execution_id).await
    }

    async fn execution_status(&self, execution_id: &str) -> Result<ExecutionStatus> {
        let details = self.get_test_execution(execution_id).await?;
        Ok(details.execution_result.status)
    }

    async fn suite_execution(&self, execution_id: &str) -> Result<SuiteExecution> {
        self.get_suite_execution(execution_id).await
    }
}
