//! Data Destruction Gateway
//!
//! A single endpoint that deletes rows for a list of Connect_IDs, limited to
//! the tables named by an allow-list of protocols.

pub mod api;
pub mod config;
pub mod destruction;
pub mod error;
pub mod registry;
pub mod store;
