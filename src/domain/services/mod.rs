pub mod access;
pub mod auth_service;
pub mod registration_ledger;
