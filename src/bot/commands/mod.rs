//! Discord command implementations organized by audience.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Admin commands behind the password guard
pub mod admin;

/// General commands: help, menu, status
pub mod general;

/// Customer ordering commands
pub mod order;

pub use admin::*;
pub use general::*;
pub use order::*;
