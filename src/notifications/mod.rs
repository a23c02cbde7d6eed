//! Outbound email delivery.

mod email;

pub use email::SystemEmailService;
