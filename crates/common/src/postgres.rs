mod client;
mod config;
mod record_store;

pub use client::*;
pub use config::*;
pub use record_store::*;
