//! Database models split into domain-specific modules.
//!
//! Query functions live next to the types they return.

pub mod admin;
pub mod audit;
pub mod case;
pub mod client;
pub mod magic_link;
pub mod session;

pub use admin::*;
pub use audit::*;
pub use case::*;
pub use client::*;
pub use magic_link::*;
pub use session::*;
