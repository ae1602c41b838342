//! Data Transfer Objects for REST request/response serialization.

pub mod batch_dto;
pub mod common_dto;
pub mod hub_dto;
pub mod instance_dto;
pub mod webhook_dto;

pub use batch_dto::*;
pub use common_dto::*;
pub use hub_dto::*;
pub use instance_dto::*;
pub use webhook_dto::*;
