//! # OpenAI-compatible completion client
//!
//! HTTP implementation of [`CompletionService`] for services exposing the legacy
//! `POST /completions` endpoint. Non-success responses are mapped onto
//! [`CompletionError::Api`] with the provider's own error message when the body
//! carries one.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::{CompletionError, CompletionRequest, CompletionResponse, CompletionService};
use crate::config::ServiceConfig;

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Completion client over HTTP
#[derive(Clone)]
pub struct OpenAiCompletionClient {
    client: Client,
    endpoint: Url,
}

impl std::fmt::Debug for OpenAiCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletionClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl OpenAiCompletionClient {
    /// Create a client for the configured base URL and timeout
    pub fn new(config: &ServiceConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("fieldgen/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        debug!(endpoint = %self.endpoint, ?request, "Sending completion request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&request.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::api(
                status.as_u16(),
                api_error_message(status.as_u16(), &body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| CompletionError::MalformedResponse(e.to_string()))
    }

    fn service_name(&self) -> &'static str {
        "openai_completions"
    }
}

fn completions_endpoint(base_url: &str) -> Result<Url, CompletionError> {
    let normalized = format!("{}/completions", base_url.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| {
        CompletionError::Service(format!("Invalid completion service URL '{base_url}': {e}"))
    })
}

/// Provider message from an error body, or a generic status line
fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .ok()
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with status code {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionInvoker;
    use crate::config::RunConfiguration;
    use crate::models::CompletionOutcome;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer it with `status` and `body`, and hand back
    /// the raw request that was received
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (ServiceConfig, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..read]);
                if request_complete(&received) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });

        let config = ServiceConfig {
            base_url: format!("http://{address}/v1"),
            timeout_ms: 5_000,
        };
        (config, handle)
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= content_length
    }

    fn run_config() -> RunConfiguration {
        RunConfiguration::builder()
            .api_key("sk-test-123456")
            .fields("in", "out")
            .build()
    }

    fn invoker(config: &ServiceConfig) -> CompletionInvoker {
        CompletionInvoker::new(Arc::new(OpenAiCompletionClient::new(config).unwrap()))
    }

    #[tokio::test]
    async fn test_posts_bearer_request_and_trims_first_choice() {
        let (config, server) = serve_once(
            "200 OK",
            r#"{"choices": [{"text": "\n\n  Paris \n"}, {"text": "Lyon"}]}"#,
        )
        .await;

        let outcome = invoker(&config).invoke("Capital?".to_string(), &run_config()).await;
        assert_eq!(outcome, CompletionOutcome::Produced("Paris".to_string()));

        let request = server.await.unwrap();
        let (head, body) = request.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("POST /v1/completions HTTP/1.1"));
        assert!(head
            .lines()
            .any(|line| line.eq_ignore_ascii_case("authorization: Bearer sk-test-123456")));

        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert!(body.get("api_key").is_none());
        assert_eq!(body["prompt"], "Capital?");
        assert_eq!(body["model"], "text-davinci-003");
        assert_eq!(body["max_tokens"], 1504);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_provider_message() {
        let (config, server) = serve_once(
            "429 Too Many Requests",
            r#"{"error": {"message": "rate limited", "type": "requests"}}"#,
        )
        .await;

        let client = OpenAiCompletionClient::new(&config).unwrap();
        let request = CompletionRequest::from_config("hi".to_string(), &run_config()).unwrap();
        let err = client.complete(request).await.unwrap_err();
        server.await.unwrap();

        match &err {
            CompletionError::Api { status, message } => {
                assert_eq!(*status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_error_status_becomes_failed_outcome() {
        let (config, server) = serve_once(
            "429 Too Many Requests",
            r#"{"error": {"message": "rate limited"}}"#,
        )
        .await;

        let outcome = invoker(&config).invoke("hi".to_string(), &run_config()).await;
        server.await.unwrap();
        assert_eq!(outcome, CompletionOutcome::Failed("rate limited".to_string()));
    }

    #[tokio::test]
    async fn test_unparseable_success_body_is_malformed() {
        let (config, server) = serve_once("200 OK", "upstream proxy says hello").await;

        let client = OpenAiCompletionClient::new(&config).unwrap();
        let request = CompletionRequest::from_config("hi".to_string(), &run_config()).unwrap();
        let err = client.complete(request).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, CompletionError::MalformedResponse(_)));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let endpoint = completions_endpoint("https://api.openai.com/v1/").unwrap();
        assert_eq!(endpoint.as_str(), "https://api.openai.com/v1/completions");

        let local = completions_endpoint("http://localhost:8080").unwrap();
        assert_eq!(local.as_str(), "http://localhost:8080/completions");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(completions_endpoint("not a url").is_err());
    }

    #[test]
    fn test_api_error_message_prefers_provider_message() {
        let body = r#"{"error": {"message": "Rate limit reached for requests", "type": "requests"}}"#;
        assert_eq!(api_error_message(429, body), "Rate limit reached for requests");
    }

    #[test]
    fn test_api_error_message_falls_back_to_status_line() {
        assert_eq!(
            api_error_message(502, "<html>Bad Gateway</html>"),
            "Request failed with status code 502"
        );
        assert_eq!(
            api_error_message(401, r#"{"error": {"message": ""}}"#),
            "Request failed with status code 401"
        );
    }

    #[test]
    fn test_client_construction_uses_configured_endpoint() {
        let config = ServiceConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            timeout_ms: 500,
        };
        let client = OpenAiCompletionClient::new(&config).unwrap();
        assert_eq!(client.endpoint().as_str(), "http://127.0.0.1:9/v1/completions");
    }

    #[tokio::test]
    async fn test_unreachable_service_surfaces_http_error() {
        let config = ServiceConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            timeout_ms: 500,
        };
        let client = OpenAiCompletionClient::new(&config).unwrap();
        let request = CompletionRequest {
            model: "text-ada-001".to_string(),
            prompt: "hi".to_string(),
            max_tokens: 8,
            temperature: 0.0,
            api_key: "sk-test".to_string(),
        };
        let err = client.complete(request).await.unwrap_err();
        assert!(matches!(err, CompletionError::Http(_)));
    }
}
