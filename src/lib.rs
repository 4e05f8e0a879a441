//! Quote request workflow service.
//!
//! Customers submit requests-for-quote with spreadsheet attachments, staff
//! route them to suppliers, suppliers upload priced responses, and staff
//! finalize the quote back to the customer. The crate exposes the domain
//! (models, lifecycle, permissions), the service layer, and the HTTP surface.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod services;
