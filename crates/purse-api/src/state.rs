//! Application state shared across handlers

use purse_auth::AuthService;
use purse_ledger::Ledger;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(ledger: Ledger, auth: Arc<AuthService>) -> Self {
        Self { ledger, auth }
    }
}
