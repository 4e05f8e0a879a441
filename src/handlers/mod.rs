pub mod group_handlers;
pub mod health_handlers;
pub mod quote_handlers;
pub mod session;
