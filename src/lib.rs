//! NORTHSTAR — portfolio valuation and policy-gated execution core for
//! an autonomous financial agent.
//!
//! The library aggregates holdings across Solana and Base into a single
//! USD valuation with trailing-change history, and routes every outbound
//! swap through a two-phase (check, then commit) authorization gate
//! backed by an external policy authority. Signing and broadcasting are
//! deliberately out of scope: the swap pipeline ends at an unsigned
//! transaction.

pub mod chains;
pub mod config;
pub mod notify;
pub mod policy;
pub mod portfolio;
pub mod prices;
pub mod storage;
pub mod swap;
pub mod types;
