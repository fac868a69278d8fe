//! Identifiers, scope targets, user identity, and cached token models.

pub mod id;
pub mod scope;
pub mod token;
pub mod user;

pub use id::*;
pub use scope::*;
pub use token::{credential::*, secret::*};
pub use user::*;
