//! HTTP client for the instance-management (Evolution) API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;

use crate::api::dto::SetWebhookRequest;
use crate::error::GatewayError;

/// Integration type requested for every new instance.
const INTEGRATION: &str = "WHATSAPP-BAILEYS";

/// Thin wrapper over [`reqwest::Client`] preconfigured with the API base
/// URL, the `apikey` header and a request timeout.
#[derive(Debug, Clone)]
pub struct EvolutionClient {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstanceBody<'a> {
    instance_name: &'a str,
    integration: &'a str,
}

#[derive(Debug, Serialize)]
struct SetWebhookBody<'a> {
    webhook: &'a SetWebhookRequest,
}

impl EvolutionClient {
    /// Builds a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL, `api_key` is
    /// not a valid header value, or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(format!("instance API URL cannot be a base: {base_url}").into());
        }

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(api_key)?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// `POST /instance/create`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] on a non-success status and
    /// [`GatewayError::UpstreamUnavailable`] on transport failures.
    pub async fn create_instance(
        &self,
        instance_name: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let body = CreateInstanceBody {
            instance_name,
            integration: INTEGRATION,
        };
        let request = self
            .request(Method::POST, &["instance", "create"])?
            .json(&body);
        self.send(request).await
    }

    /// `DELETE /instance/delete/{instance}`.
    ///
    /// # Errors
    ///
    /// See [`EvolutionClient::create_instance`].
    pub async fn delete_instance(
        &self,
        instance_name: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let request = self.request(Method::DELETE, &["instance", "delete", instance_name])?;
        self.send(request).await
    }

    /// `GET /instance/fetchInstances`.
    ///
    /// # Errors
    ///
    /// See [`EvolutionClient::create_instance`].
    pub async fn fetch_instances(&self) -> Result<serde_json::Value, GatewayError> {
        let request = self.request(Method::GET, &["instance", "fetchInstances"])?;
        self.send(request).await
    }

    /// `PUT /instance/restart/{instance}`.
    ///
    /// # Errors
    ///
    /// See [`EvolutionClient::create_instance`].
    pub async fn restart_instance(
        &self,
        instance_name: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let request = self.request(Method::PUT, &["instance", "restart", instance_name])?;
        self.send(request).await
    }

    /// `POST /webhook/set/{instance}`.
    ///
    /// # Errors
    ///
    /// See [`EvolutionClient::create_instance`].
    pub async fn set_webhook(
        &self,
        instance_name: &str,
        webhook: &SetWebhookRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let request = self
            .request(Method::POST, &["webhook", "set", instance_name])?
            .json(&SetWebhookBody { webhook });
        self.send(request).await
    }

    /// `GET /webhook/find/{instance}`.
    ///
    /// # Errors
    ///
    /// See [`EvolutionClient::create_instance`].
    pub async fn find_webhook(
        &self,
        instance_name: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let request = self.request(Method::GET, &["webhook", "find", instance_name])?;
        self.send(request).await
    }

    /// Starts a request for the given path segments (percent-encoded).
    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Internal("instance API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.http.request(method, url))
    }

    /// Sends the request and decodes the body as JSON, falling back to a
    /// JSON string for non-JSON bodies.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "instance API returned an error");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        if body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}
