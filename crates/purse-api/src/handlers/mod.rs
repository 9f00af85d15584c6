//! API Handlers
//!
//! Each module handles one resource.

pub mod health;
pub mod users;
pub mod wallets;

pub use health::*;
