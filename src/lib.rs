//! Submeter - credit-metered subtitle translation
//!
//! Parses SRT/VTT uploads, charges the caller's credit balance per batch of
//! entries, translates through an LLM provider and refunds the charge when
//! the provider fails.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pricing;
pub mod subtitle;
pub mod translate;
pub mod workflow;
