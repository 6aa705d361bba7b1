//! Object identity for the refsync reference core.
//!
//! Provides the [`ObjectId`] content-hash identifier that refs point at and
//! the matching engine passes around. Hash computation belongs to the
//! object store; this crate only carries the identity type and its hex
//! form.

mod error;
pub mod hex;
mod oid;

pub use error::HashError;
pub use oid::ObjectId;
