pub mod file_store;
pub mod notifier;
pub mod quote_service;
