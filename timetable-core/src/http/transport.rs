//! Transport seam between the client and the network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use super::request::{ApiRequest, ApiResponse, HttpMethod};

/// Network-level failure (connection refused, timeout, unreadable body).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self(format!("connection failed: {err}"))
        } else {
            Self(err.to_string())
        }
    }
}

/// Executes a fully-resolved request.
///
/// Implementations must not interpret status codes; a 401 is a normal
/// response at this layer.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest`, with a cookie store so the session
/// cookie set at login is sent on refresh.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Transport with an in-memory cookie store that lives as long as it does.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        Self::build(reqwest::Client::builder().cookie_store(true), timeout)
    }

    /// Transport whose cookies go through `cookies`, e.g. a
    /// [`PersistentCookieJar`](crate::auth::PersistentCookieJar) that
    /// outlives the process.
    pub fn with_cookie_provider<C>(timeout: Option<Duration>, cookies: Arc<C>) -> Result<Self, TransportError>
    where
        C: reqwest::cookie::CookieStore + 'static,
    {
        Self::build(reqwest::Client::builder().cookie_provider(cookies), timeout)
    }

    fn build(mut builder: reqwest::ClientBuilder, timeout: Option<Duration>) -> Result<Self, TransportError> {
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Use a preconfigured client. Cookie handling is up to the caller.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self.client.request(to_reqwest_method(request.method), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let body = response.bytes().await?;
        trace!(%url, status, bytes = body.len(), "Received response");

        let mut result = ApiResponse::new(status, body.to_vec());
        for (name, value) in headers {
            result = result.with_header(name, value);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sends_json_body_query_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/courses/admin/update-course/c1")
            .match_query(mockito::Matcher::UrlEncoded("dry".into(), "1".into()))
            .match_header("authorization", "Bearer T1")
            .match_body(mockito::Matcher::Json(json!({"title": "Compilers"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Course updated"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(None).unwrap();
        let request = ApiRequest::patch("/courses/admin/update-course/c1")
            .with_query([("dry", "1")])
            .with_header("Authorization", "Bearer T1")
            .with_json(json!({"title": "Compilers"}));
        let url = format!("{}{}", server.url(), request.path);

        let response = transport.execute(&url, &request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.message().as_deref(), Some("Course updated"));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_a_response_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/users/profile")
            .with_status(401)
            .with_body(r#"{"message":"jwt expired"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(None).unwrap();
        let request = ApiRequest::get("/users/profile");
        let response = transport
            .execute(&format!("{}/users/profile", server.url()), &request)
            .await
            .unwrap();

        assert!(response.is_unauthorized());
    }

    #[tokio::test]
    async fn test_session_cookie_is_sent_back() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", "/users/login")
            .with_status(200)
            .with_header("set-cookie", "refreshToken=r1; Path=/")
            .with_body("{}")
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/v1/users/refresh-token")
            .match_header("cookie", "refreshToken=r1")
            .with_status(200)
            .with_body(r#"{"accessToken":"T2"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(None).unwrap();
        transport
            .execute(
                &format!("{}/users/login", server.url()),
                &ApiRequest::post("/users/login").with_json(json!({})),
            )
            .await
            .unwrap();
        let response = transport
            .execute(
                &format!("{}/api/v1/users/refresh-token", server.url()),
                &ApiRequest::post("/api/v1/users/refresh-token").with_json(json!({})),
            )
            .await
            .unwrap();

        refresh.assert_async().await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let transport = ReqwestTransport::new(Some(Duration::from_secs(2))).unwrap();
        let result = transport
            .execute("http://127.0.0.1:9/users/profile", &ApiRequest::get("/users/profile"))
            .await;
        assert!(result.is_err());
    }
}
