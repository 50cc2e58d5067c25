//! Pluggable step handlers.
//!
//! Actions, conditions, and responses are looked up by their `type` tag in a
//! [`registry::HandlerRegistry`]. The built-in set covers remote device
//! objects, wall-clock gates, operator tasks, webhooks, and notifications;
//! deployments extend it by registering their own trait implementations.

pub mod actions;
pub mod conditions;
pub mod device;
pub mod error;
pub mod registry;
pub mod responses;

pub use device::DEFAULT_DEVICE_PORT;
pub use error::HandlerError;
pub use registry::{ActionHandler, ConditionHandler, HandlerRegistry, ResponseHandler};
