//! Service layer: instance API client and orchestration.
//!
//! [`InstanceService`] is the entry point for all REST handlers. It calls
//! the instance API through [`EvolutionClient`] and publishes the resulting
//! [`crate::domain::InstanceEvent`]s through the hub.

pub mod evolution_client;
pub mod instance_service;

pub use evolution_client::EvolutionClient;
pub use instance_service::InstanceService;
