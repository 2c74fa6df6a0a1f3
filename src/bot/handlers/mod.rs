//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions such as autocomplete.

/// Autocomplete handlers for menu items, sizes and payment methods
pub mod autocomplete;
