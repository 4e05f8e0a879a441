//! Permission evaluator: pure decision functions over `(quote, actor)`.
//!
//! Every mutating operation consults one of these before touching the
//! document, and every read goes through [`project`] afterwards so each role
//! only sees the fields it is allowed to see. Both layers are required: the
//! projection is a redaction pass over an already-authorized read, not an
//! authorization mechanism by itself.
//!
//! All functions match exhaustively on [`Role`] and [`QuoteStatus`] so that a
//! new role or state forces a review of every table here.

use crate::models::quote::{FileEntry, FileKind, Quote, QuoteStatus};
use crate::models::user::{Actor, Role};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

fn is_own(quote: &Quote, kind: FileKind, actor: &Actor) -> bool {
    quote.is_party(kind, actor.id)
}

/// Who may see the quote at all.
///
/// Unassigned suppliers can discover quotes that are still pending, rejected,
/// or being worked on; customers see only their own.
pub fn can_view(quote: &Quote, actor: &Actor) -> bool {
    match actor.role {
        Role::Customer => is_own(quote, FileKind::Customer, actor),
        Role::Supplier => {
            is_own(quote, FileKind::Supplier, actor)
                || matches!(
                    quote.status,
                    QuoteStatus::Pending | QuoteStatus::Rejected | QuoteStatus::InProgress
                )
        }
        Role::Quoter | Role::Admin => true,
    }
}

/// General field mutation (title, messages, pricing), not file operations.
pub fn can_edit(quote: &Quote, actor: &Actor) -> bool {
    match actor.role {
        Role::Customer => is_own(quote, FileKind::Customer, actor),
        Role::Supplier => {
            is_own(quote, FileKind::Supplier, actor)
                && matches!(
                    quote.status,
                    QuoteStatus::InProgress | QuoteStatus::Rejected | QuoteStatus::SupplierQuoted
                )
        }
        Role::Quoter => matches!(
            quote.status,
            QuoteStatus::Pending | QuoteStatus::SupplierQuoted | QuoteStatus::InProgress
        ),
        Role::Admin => true,
    }
}

/// The urgent flag is mutable independently of the edit table: the owning
/// customer and staff may flip it in any state.
pub fn can_toggle_urgent(quote: &Quote, actor: &Actor) -> bool {
    match actor.role {
        Role::Customer => is_own(quote, FileKind::Customer, actor),
        Role::Supplier => false,
        Role::Quoter | Role::Admin => true,
    }
}

/// Deleting the whole quote (cascades attachment blobs).
pub fn can_delete_quote(quote: &Quote, actor: &Actor) -> bool {
    match actor.role {
        Role::Customer => is_own(quote, FileKind::Customer, actor),
        Role::Supplier | Role::Quoter => false,
        Role::Admin => true,
    }
}

/// Declining to quote. Suppliers may only reject quotes assigned to them;
/// staff may reject any (the state gate lives in the lifecycle).
pub fn can_reject(quote: &Quote, actor: &Actor) -> bool {
    match actor.role {
        Role::Customer => false,
        Role::Supplier => is_own(quote, FileKind::Supplier, actor),
        Role::Quoter | Role::Admin => true,
    }
}

/// Supplier routing (assign / remove / reassign) is staff-only.
pub fn can_assign_supplier(actor: &Actor) -> bool {
    match actor.role {
        Role::Customer | Role::Supplier => false,
        Role::Quoter | Role::Admin => true,
    }
}

/// Who may add files of `kind` in the quote's current state. Derived from the
/// upload rows of the transition table.
pub fn can_upload(quote: &Quote, actor: &Actor, kind: FileKind) -> bool {
    match actor.role {
        Role::Customer => {
            kind == FileKind::Customer
                && is_own(quote, FileKind::Customer, actor)
                && quote.status == QuoteStatus::Pending
        }
        Role::Supplier => {
            kind == FileKind::Supplier
                && (quote.supplier.is_none() || is_own(quote, FileKind::Supplier, actor))
                && matches!(
                    quote.status,
                    QuoteStatus::InProgress | QuoteStatus::Rejected | QuoteStatus::SupplierQuoted
                )
        }
        Role::Quoter | Role::Admin => {
            kind == FileKind::Quoter
                && matches!(
                    quote.status,
                    QuoteStatus::Pending | QuoteStatus::InProgress | QuoteStatus::SupplierQuoted
                )
        }
    }
}

/// Who may remove a single file of `kind`.
///
/// A supplier's confirmed report becomes immutable to everyone once the final
/// quote exists: the supplier is blocked as soon as a quoter file is present,
/// and even an admin cannot delete supplier files after `supplier_quoted`.
pub fn can_delete_file(quote: &Quote, actor: &Actor, kind: FileKind) -> bool {
    match actor.role {
        Role::Customer => {
            kind == FileKind::Customer
                && is_own(quote, FileKind::Customer, actor)
                && quote.status == QuoteStatus::Pending
        }
        Role::Supplier => {
            kind == FileKind::Supplier
                && is_own(quote, FileKind::Supplier, actor)
                && matches!(
                    quote.status,
                    QuoteStatus::InProgress | QuoteStatus::Rejected | QuoteStatus::SupplierQuoted
                )
                && quote.quoter_files.0.is_empty()
        }
        Role::Quoter => kind == FileKind::Quoter,
        Role::Admin => {
            !(kind == FileKind::Supplier
                && matches!(quote.status, QuoteStatus::SupplierQuoted | QuoteStatus::Quoted))
        }
    }
}

/// Who may download files of `kind`.
pub fn can_download(quote: &Quote, actor: &Actor, kind: FileKind) -> bool {
    match actor.role {
        Role::Customer => {
            if !is_own(quote, FileKind::Customer, actor) {
                return false;
            }
            match kind {
                FileKind::Customer => true,
                // the final quote is released only once confirmed
                FileKind::Quoter => quote.status == QuoteStatus::Quoted,
                FileKind::Supplier => false,
            }
        }
        Role::Supplier => match kind {
            // customer files are readable while the quote is up for grabs,
            // or by the assigned supplier
            FileKind::Customer => {
                quote.status == QuoteStatus::Pending || is_own(quote, FileKind::Supplier, actor)
            }
            FileKind::Supplier => is_own(quote, FileKind::Supplier, actor),
            FileKind::Quoter => false,
        },
        Role::Quoter | Role::Admin => true,
    }
}

/// Role-specific projection of a quote.
///
/// Redacted fields are `None` and skipped during serialization, so the keys
/// are absent from the JSON rather than null.
#[derive(Serialize, Clone, Debug)]
pub struct QuoteView {
    pub id: Uuid,
    pub quote_number: String,
    pub status: QuoteStatus,
    pub status_label: &'static str,
    pub title: String,
    pub description: String,
    pub customer_message: String,
    pub quoter_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    pub urgent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoter: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_files: Option<Vec<FileEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_files: Option<Vec<FileEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoter_files: Option<Vec<FileEntry>>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Strip the fields `role` must not see.
///
/// Customers never see the routing parties or the supplier's report, and see
/// the final quote files only once the quote is `quoted`. Suppliers never see
/// the customer's identity, the handling quoter, or the quoter's files.
pub fn project(quote: &Quote, role: Role) -> QuoteView {
    let (customer, quoter, supplier) = match role {
        Role::Customer => (Some(quote.customer), None, None),
        Role::Supplier => (None, None, quote.supplier),
        Role::Quoter | Role::Admin => (Some(quote.customer), quote.quoter, quote.supplier),
    };

    let (customer_files, supplier_files, quoter_files) = match role {
        Role::Customer => (
            Some(quote.customer_files.0.clone()),
            None,
            (quote.status == QuoteStatus::Quoted).then(|| quote.quoter_files.0.clone()),
        ),
        Role::Supplier => (
            Some(quote.customer_files.0.clone()),
            Some(quote.supplier_files.0.clone()),
            None,
        ),
        Role::Quoter | Role::Admin => (
            Some(quote.customer_files.0.clone()),
            Some(quote.supplier_files.0.clone()),
            Some(quote.quoter_files.0.clone()),
        ),
    };

    QuoteView {
        id: quote.id,
        quote_number: quote.quote_number.clone(),
        status: quote.status,
        status_label: quote.status.label(),
        title: quote.title.clone(),
        description: quote.description.clone(),
        customer_message: quote.customer_message.clone(),
        quoter_message: quote.quoter_message.clone(),
        reject_reason: quote.reject_reason.clone(),
        price: quote.price,
        currency: quote.currency.clone(),
        valid_until: quote.valid_until,
        urgent: quote.urgent,
        customer,
        quoter,
        supplier,
        customer_files,
        supplier_files,
        quoter_files,
        revision: quote.revision,
        created_at: quote.created_at,
        updated_at: quote.updated_at,
    }
}
