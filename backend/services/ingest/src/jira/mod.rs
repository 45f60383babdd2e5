pub mod adapter;
pub mod client;
pub mod models;
pub mod query;
