//! Core business logic, independent of Discord.

/// Admin order management
pub mod admin;
/// Admin login guard with lockout
pub mod auth;
/// In-memory cart
pub mod cart;
/// Cart submission
pub mod checkout;
/// Time source and local-day helpers
pub mod clock;
/// CSV export
pub mod export;
/// Best-effort leases
pub mod lease;
/// Currency rounding and formatting
pub mod money;
/// Order numbering and resequencing
pub mod numbering;
/// Weekly ordering window
pub mod ordering;
/// Line pricing and tax
pub mod pricing;
/// Purge and unpaid archival
pub mod retention;
/// Bounded retry policy
pub mod retry;
/// Persisted flags and day markers
pub mod state;
/// Credential verifiers
pub mod verifier;
