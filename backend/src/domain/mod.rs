//! Domain core: entity descriptors, error taxonomy, and collaborator ports.
//!
//! Nothing in this module touches a network or a database. Storage, logging,
//! and external services are reached exclusively through the traits in
//! [`ports`]; concrete adapters live under [`crate::outbound`].

pub mod directory;
pub mod entity;
pub mod error;
pub mod normalize;
pub mod ports;
pub mod request_id;

pub use entity::{EntityDescriptor, EntityName, EntityNameError, DEFAULT_PRIMARY_KEY_FIELD};
pub use error::{ClassifiedError, ErrorCategory, ErrorCode};
pub use normalize::{normalize, Failure, NormalizeContext, ValidationFailure};
pub use request_id::RequestId;
