//! Instance service: calls the instance API and announces the results.

use chrono::Utc;
use futures_util::future::join_all;

use super::EvolutionClient;
use crate::api::dto::{BatchFailure, BatchRestartResponse, SetWebhookRequest};
use crate::domain::{Audience, HubHandle, InstanceEvent};
use crate::error::GatewayError;

/// Orchestration layer for instance operations.
///
/// Every mutation follows the same pattern: validate → call the instance
/// API → publish an [`InstanceEvent`] through the hub → return the API's
/// answer. Publishing never fails the request; a broadcast problem is
/// logged and the upstream result still goes back to the caller.
#[derive(Debug, Clone)]
pub struct InstanceService {
    client: EvolutionClient,
    hub: HubHandle,
}

impl InstanceService {
    /// Creates a new `InstanceService`.
    #[must_use]
    pub const fn new(client: EvolutionClient, hub: HubHandle) -> Self {
        Self { client, hub }
    }

    /// Returns the hub events are published through.
    #[must_use]
    pub const fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Creates an instance and announces it on the global channel.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank name, or the
    /// upstream error if the API call fails.
    pub async fn create_instance(
        &self,
        instance_name: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let instance_name = validate_name(instance_name)?;
        let response = self.client.create_instance(instance_name).await?;

        tracing::info!(instance = instance_name, "instance created");
        self.publish(InstanceEvent::InstanceCreated {
            instance_name: instance_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(response)
    }

    /// Deletes an instance and announces it to its channel and the global
    /// channel.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank name, or the
    /// upstream error if the API call fails.
    pub async fn delete_instance(
        &self,
        instance_name: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let instance_name = validate_name(instance_name)?;
        let response = self.client.delete_instance(instance_name).await?;

        tracing::info!(instance = instance_name, "instance deleted");
        self.publish(InstanceEvent::InstanceDeleted {
            instance_name: instance_name.to_string(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(response)
    }

    /// Lists instances known to the API.
    ///
    /// # Errors
    ///
    /// Returns the upstream error if the API call fails.
    pub async fn fetch_instances(&self) -> Result<serde_json::Value, GatewayError> {
        self.client.fetch_instances().await
    }

    /// Configures an instance's webhook and announces it on the instance's
    /// channel.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank name or URL, or
    /// the upstream error if the API call fails.
    pub async fn set_webhook(
        &self,
        instance_name: &str,
        webhook: &SetWebhookRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let instance_name = validate_name(instance_name)?;
        if webhook.url.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "webhook url must not be empty".to_string(),
            ));
        }
        let response = self.client.set_webhook(instance_name, webhook).await?;

        tracing::info!(instance = instance_name, enabled = webhook.enabled, "webhook updated");
        self.publish(InstanceEvent::WebhookUpdated {
            instance_name: instance_name.to_string(),
            url: webhook.url.clone(),
            enabled: webhook.enabled,
            timestamp: Utc::now(),
        })
        .await;

        Ok(response)
    }

    /// Reads an instance's webhook configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank name, or the
    /// upstream error if the API call fails.
    pub async fn find_webhook(
        &self,
        instance_name: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let instance_name = validate_name(instance_name)?;
        self.client.find_webhook(instance_name).await
    }

    /// Restarts several instances concurrently and announces the outcome to
    /// every connected client.
    ///
    /// Individual failures are collected in the response rather than
    /// failing the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the list is empty or
    /// contains a blank name.
    pub async fn batch_restart(
        &self,
        instances: &[String],
    ) -> Result<BatchRestartResponse, GatewayError> {
        if instances.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "instances must not be empty".to_string(),
            ));
        }
        let names = instances
            .iter()
            .map(|name| validate_name(name))
            .collect::<Result<Vec<_>, _>>()?;

        let results = join_all(names.iter().map(|name| self.client.restart_instance(name))).await;

        let mut outcome = BatchRestartResponse::default();
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(_) => outcome.restarted.push((*name).to_string()),
                Err(err) => {
                    tracing::warn!(instance = name, error = %err, "instance restart failed");
                    outcome.failed.push(BatchFailure {
                        instance: (*name).to_string(),
                        error: err.detail(),
                    });
                }
            }
        }

        tracing::info!(
            restarted = outcome.restarted.len(),
            failed = outcome.failed.len(),
            "batch restart finished"
        );
        self.publish(InstanceEvent::InstancesRestarted {
            restarted: outcome.restarted.clone(),
            failed: outcome.failed.iter().map(|f| f.instance.clone()).collect(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(outcome)
    }

    /// Delivers an event to its audience. Failures are logged only.
    pub async fn publish(&self, event: InstanceEvent) {
        let name = event.name();
        match event.audience() {
            Audience::Everyone => match self.hub.broadcast_all(&event).await {
                Ok(report) => tracing::debug!(
                    event = name,
                    delivered = report.delivered,
                    evicted = report.evicted,
                    "event broadcast"
                ),
                Err(err) => tracing::warn!(event = name, error = %err, "event broadcast failed"),
            },
            Audience::Channels(tags) => {
                for tag in tags {
                    match self.hub.broadcast_to_channel(&tag, &event).await {
                        Ok(report) => tracing::debug!(
                            event = name,
                            %tag,
                            delivered = report.delivered,
                            failed = report.failed.len(),
                            "event sent to channel"
                        ),
                        Err(err) => {
                            tracing::warn!(event = name, %tag, error = %err, "channel send failed");
                        }
                    }
                }
            }
        }
    }
}

/// Trims `name` and rejects blank values.
fn validate_name(name: &str) -> Result<&str, GatewayError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "instance name must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
