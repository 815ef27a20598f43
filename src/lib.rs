//! Relay for annual income statements from Financial Modeling Prep, plus a
//! pure filter/sort query engine usable from both the relay and its clients.

pub mod api;
pub mod client;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod fmp;
pub mod profiles;
pub mod query;
pub mod source;
