//! `promostock-core`: domain building blocks shared by every aggregate crate.
//!
//! Nothing in here touches IO: identifiers, the error model and the
//! aggregate/entity/value-object traits.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use value_object::ValueObject;
