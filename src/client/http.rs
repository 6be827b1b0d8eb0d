//! HTTP calls to the backend
//!
//! The submission call is one-shot: no retry, and any failure is surfaced
//! to the caller immediately.

use crate::client::protocol::{HealthResponse, QueryOutcome, QueryRequest, QueryResponse};
use crate::config::HttpConfig;
use crate::error::{ClientError, ProtocolError};
use url::Url;

/// Message shown for every submission failure that is not a backend-reported error
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to fetch response from the server.";

/// Build the shared HTTP client
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Submit a query and wait for its terminal outcome
///
/// The body is parsed whatever the HTTP status, since the backend reports
/// validation failures as `400 {"error": ...}`.
///
/// # Errors
/// * `ClientError::Http` if the request cannot be sent or the body cannot be read
/// * `ClientError::Protocol` if the body is not JSON
/// * `ClientError::UnexpectedResponse` if the JSON has neither `error` nor `final_answer`
pub async fn submit_query(
    client: &reqwest::Client,
    url: &Url,
    query: &str,
) -> Result<QueryOutcome, ClientError> {
    let request = QueryRequest {
        query: query.to_string(),
    };

    tracing::debug!(url = %url, query_len = query.len(), "Submitting query");

    let response = client.post(url.clone()).json(&request).send().await?;
    let status = response.status();
    let body = response.text().await?;

    let parsed: QueryResponse = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(
            status_code = status.as_u16(),
            body_len = body.len(),
            "Submission response is not JSON"
        );
        ClientError::Protocol(ProtocolError::Json(e))
    })?;

    let outcome = parsed.into_outcome().ok_or_else(|| {
        ClientError::UnexpectedResponse(format!(
            "HTTP {} response has neither error nor final_answer",
            status.as_u16()
        ))
    })?;

    tracing::debug!(
        status_code = status.as_u16(),
        rejected = matches!(outcome, QueryOutcome::Rejected(_)),
        "Submission resolved"
    );

    Ok(outcome)
}

/// Probe the backend health endpoint
pub async fn check_health(client: &reqwest::Client, url: &Url) -> Result<HealthResponse, ClientError> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.json::<HealthResponse>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use serial_test::serial;

    fn endpoint(server: &Server, path: &str) -> Url {
        Url::parse(&format!("{}{}", server.url(), path)).unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_submit_query_final_answer() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/process-query")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"query": "knee surgery claim"})))
            .with_status(200)
            .with_body(r#"{"final_answer": "Approved, $500"}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = endpoint(&server, "/api/v1/process-query");
        let outcome = submit_query(&client, &url, "knee surgery claim").await;

        mock.assert_async().await;
        assert_eq!(outcome.unwrap(), QueryOutcome::Answer("Approved, $500".to_string()));
    }

    #[tokio::test]
    #[serial]
    async fn test_submit_query_bad_request_error_is_verbatim() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/process-query")
            .with_status(400)
            .with_body(r#"{"error": "Query not provided"}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = endpoint(&server, "/api/v1/process-query");
        let outcome = submit_query(&client, &url, "").await;

        mock.assert_async().await;
        assert_eq!(
            outcome.unwrap(),
            QueryOutcome::Rejected("Query not provided".to_string())
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_submit_query_non_json_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/process-query")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = endpoint(&server, "/api/v1/process-query");
        let result = submit_query(&client, &url, "q").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ClientError::Protocol(ProtocolError::Json(_)))));
    }

    #[tokio::test]
    #[serial]
    async fn test_submit_query_unexpected_shape() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/process-query")
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = endpoint(&server, "/api/v1/process-query");
        let result = submit_query(&client, &url, "q").await;

        mock.assert_async().await;
        let error = result.unwrap_err();
        assert!(matches!(error, ClientError::UnexpectedResponse(_)));
        assert!(error.to_string().contains("neither error nor final_answer"));
    }

    #[tokio::test]
    async fn test_submit_query_connection_refused() {
        // Nothing listens on port 9 locally
        let client = reqwest::Client::new();
        let url = Url::parse("http://127.0.0.1:9/api/v1/process-query").unwrap();
        let result = submit_query(&client, &url, "q").await;
        assert!(matches!(result, Err(ClientError::Http(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_check_health() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/health")
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let health = check_health(&client, &endpoint(&server, "/api/v1/health")).await;

        mock.assert_async().await;
        assert!(health.unwrap().is_ok());
    }

    #[tokio::test]
    #[serial]
    async fn test_check_health_server_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/health")
            .with_status(500)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let health = check_health(&client, &endpoint(&server, "/api/v1/health")).await;

        mock.assert_async().await;
        assert!(matches!(health, Err(ClientError::Http(_))));
    }

    #[test]
    fn test_build_client_with_timeout() {
        let config = HttpConfig {
            request_timeout_secs: Some(5),
        };
        assert!(build_client(&config).is_ok());
        assert!(build_client(&HttpConfig::default()).is_ok());
    }
}
