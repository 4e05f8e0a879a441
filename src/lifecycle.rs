//! Quote state machine: the legal transitions between lifecycle states and
//! the side effects each trigger carries.
//!
//! Every function here is a pure mutation over an in-memory [`Quote`]
//! snapshot: it validates the from-state (and any file-presence guard),
//! applies the data change, and leaves persistence to the service layer,
//! which commits data and status in one compare-and-swap update.
//!
//! Authorization is *not* checked here; callers consult
//! [`crate::permissions`] first. The guards in this module are about what the
//! document's state allows, independent of who asks.

use crate::models::quote::{FileEntry, FileKind, Quote, QuoteStatus};
use crate::models::user::{Actor, Role};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("cannot {action} while the quote is {from}")]
    InvalidTransition {
        from: QuoteStatus,
        action: &'static str,
    },
    #[error("at least one {0} file is required first")]
    NoFiles(FileKind),
    #[error("a rejection reason is required")]
    EmptyReason,
    #[error("{kind} file {index} does not exist")]
    FileIndexOutOfRange { kind: FileKind, index: usize },
}

fn invalid(from: QuoteStatus, action: &'static str) -> LifecycleError {
    LifecycleError::InvalidTransition { from, action }
}

/// Assign (or reassign) a supplier.
///
/// `pending` moves to `in_progress`; reassignment while `in_progress` keeps
/// the state. A `rejected` quote also accepts a fresh assignment — the status
/// and reason stay put, and the quote only re-enters the active flow when the
/// new supplier uploads, which clears the reason.
pub fn assign_supplier(quote: &mut Quote, supplier: Uuid) -> Result<(), LifecycleError> {
    match quote.status {
        QuoteStatus::Pending => {
            quote.supplier = Some(supplier);
            quote.status = QuoteStatus::InProgress;
            Ok(())
        }
        QuoteStatus::InProgress | QuoteStatus::Rejected => {
            quote.supplier = Some(supplier);
            Ok(())
        }
        from => Err(invalid(from, "assign a supplier")),
    }
}

/// Clear the supplier assignment; the quote returns to `pending`.
pub fn remove_supplier(quote: &mut Quote) -> Result<(), LifecycleError> {
    match quote.status {
        QuoteStatus::Pending | QuoteStatus::InProgress => {
            quote.supplier = None;
            quote.status = QuoteStatus::Pending;
            Ok(())
        }
        from => Err(invalid(from, "remove the supplier assignment")),
    }
}

/// Record uploaded files of `kind` on behalf of `actor`.
///
/// Uploads never advance the state on their own — confirmation is a separate
/// trigger — but a supplier upload to a `rejected` quote re-enters the active
/// flow at `in_progress` and clears the reject reason.
pub fn record_upload(
    quote: &mut Quote,
    actor: &Actor,
    kind: FileKind,
    entries: Vec<FileEntry>,
) -> Result<(), LifecycleError> {
    match kind {
        FileKind::Customer => {
            if quote.status != QuoteStatus::Pending {
                return Err(invalid(quote.status, "attach customer files"));
            }
        }
        FileKind::Supplier => {
            match quote.status {
                QuoteStatus::InProgress | QuoteStatus::SupplierQuoted => {}
                QuoteStatus::Rejected => {
                    quote.reject_reason = None;
                    quote.status = QuoteStatus::InProgress;
                }
                from => return Err(invalid(from, "upload supplier files")),
            }
            if quote.supplier.is_none() {
                quote.supplier = Some(actor.id);
            }
        }
        FileKind::Quoter => {
            match quote.status {
                QuoteStatus::Pending | QuoteStatus::InProgress | QuoteStatus::SupplierQuoted => {}
                from => return Err(invalid(from, "upload quoter files")),
            }
            if quote.quoter.is_none() {
                quote.quoter = Some(actor.id);
            }
        }
    }
    quote.files_mut(kind).extend(entries);
    Ok(())
}

/// Supplier commits the uploaded response as official: `in_progress` →
/// `supplier_quoted`. Requires at least one supplier file.
pub fn confirm_supplier_quote(quote: &mut Quote) -> Result<(), LifecycleError> {
    if quote.supplier_files.0.is_empty() {
        return Err(LifecycleError::NoFiles(FileKind::Supplier));
    }
    if quote.status != QuoteStatus::InProgress {
        return Err(invalid(quote.status, "confirm the supplier quote"));
    }
    quote.status = QuoteStatus::SupplierQuoted;
    Ok(())
}

/// Quoter commits the final quote back to the customer. Requires at least one
/// quoter file; legal from any active state.
pub fn confirm_final_quote(quote: &mut Quote) -> Result<(), LifecycleError> {
    if quote.quoter_files.0.is_empty() {
        return Err(LifecycleError::NoFiles(FileKind::Quoter));
    }
    if !quote.status.is_active() {
        return Err(invalid(quote.status, "confirm the final quote"));
    }
    quote.status = QuoteStatus::Quoted;
    Ok(())
}

/// Reject the quote with a reason. Legal from the three active states. The
/// rejecting actor is recorded on the matching party slot.
pub fn reject(quote: &mut Quote, actor: &Actor, reason: &str) -> Result<(), LifecycleError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LifecycleError::EmptyReason);
    }
    if !quote.status.is_active() {
        return Err(invalid(quote.status, "reject the quote"));
    }
    match actor.role {
        Role::Supplier => quote.supplier = Some(actor.id),
        Role::Quoter | Role::Admin => {
            if quote.quoter.is_none() {
                quote.quoter = Some(actor.id);
            }
        }
        Role::Customer => {}
    }
    quote.status = QuoteStatus::Rejected;
    quote.reject_reason = Some(reason.to_string());
    Ok(())
}

/// Remove one file entry and rewind the status to what the remaining
/// attachments imply.
///
/// The rewind only fires when the affected collection becomes empty;
/// deleting one of several files leaves the state alone. Removing the last
/// quoter file also clears the quoter assignment. Returns the removed entry
/// so the caller can delete the blob after the update commits.
pub fn remove_file(
    quote: &mut Quote,
    kind: FileKind,
    index: usize,
) -> Result<FileEntry, LifecycleError> {
    let files = quote.files_mut(kind);
    if index >= files.len() {
        return Err(LifecycleError::FileIndexOutOfRange { kind, index });
    }
    let removed = files.remove(index);

    match kind {
        FileKind::Customer => {}
        FileKind::Supplier => {
            if quote.supplier_files.0.is_empty() {
                quote.reject_reason = None;
                quote.status = if quote.quoter_files.0.is_empty() {
                    QuoteStatus::InProgress
                } else {
                    QuoteStatus::Quoted
                };
            }
        }
        FileKind::Quoter => {
            if quote.quoter_files.0.is_empty() {
                quote.quoter = None;
                quote.status = if quote.supplier_files.0.is_empty() {
                    QuoteStatus::Pending
                } else {
                    QuoteStatus::SupplierQuoted
                };
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            stored_name: format!("{name}.xlsx"),
            display_name: format!("{name}.xlsx"),
            size_bytes: 512,
            uploaded_at: Utc::now(),
        }
    }

    fn quote(status: QuoteStatus) -> Quote {
        Quote {
            id: Uuid::new_v4(),
            quote_number: "Q-20260823-001".into(),
            customer: Uuid::new_v4(),
            quoter: None,
            supplier: None,
            title: "fasteners".into(),
            description: String::new(),
            customer_message: String::new(),
            quoter_message: String::new(),
            reject_reason: if status == QuoteStatus::Rejected {
                Some("no capacity".into())
            } else {
                None
            },
            price: None,
            currency: None,
            valid_until: None,
            urgent: false,
            status,
            customer_files: Json(vec![entry("rfq")]),
            supplier_files: Json(Vec::new()),
            quoter_files: Json(Vec::new()),
            revision: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn supplier_actor() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Supplier)
    }

    fn quoter_actor() -> Actor {
        Actor::new(Uuid::new_v4(), Role::Quoter)
    }

    #[test]
    fn assigning_from_pending_moves_to_in_progress() {
        let mut q = quote(QuoteStatus::Pending);
        let supplier = Uuid::new_v4();
        assign_supplier(&mut q, supplier).unwrap();
        assert_eq!(q.status, QuoteStatus::InProgress);
        assert_eq!(q.supplier, Some(supplier));
    }

    #[test]
    fn reassigning_in_progress_keeps_state() {
        let mut q = quote(QuoteStatus::InProgress);
        q.supplier = Some(Uuid::new_v4());
        let replacement = Uuid::new_v4();
        assign_supplier(&mut q, replacement).unwrap();
        assert_eq!(q.status, QuoteStatus::InProgress);
        assert_eq!(q.supplier, Some(replacement));
    }

    #[test]
    fn assigning_a_rejected_quote_preserves_the_rejection() {
        let mut q = quote(QuoteStatus::Rejected);
        assign_supplier(&mut q, Uuid::new_v4()).unwrap();
        assert_eq!(q.status, QuoteStatus::Rejected);
        assert_eq!(q.reject_reason.as_deref(), Some("no capacity"));
    }

    #[test]
    fn assigning_terminal_quotes_fails() {
        for status in [QuoteStatus::Quoted, QuoteStatus::Cancelled, QuoteStatus::SupplierQuoted] {
            let mut q = quote(status);
            assert!(assign_supplier(&mut q, Uuid::new_v4()).is_err(), "{status}");
        }
    }

    #[test]
    fn removing_supplier_rewinds_to_pending() {
        let mut q = quote(QuoteStatus::InProgress);
        q.supplier = Some(Uuid::new_v4());
        remove_supplier(&mut q).unwrap();
        assert_eq!(q.status, QuoteStatus::Pending);
        assert_eq!(q.supplier, None);
    }

    #[test]
    fn supplier_upload_to_rejected_reenters_in_progress_without_confirming() {
        let mut q = quote(QuoteStatus::Rejected);
        let actor = supplier_actor();
        record_upload(&mut q, &actor, FileKind::Supplier, vec![entry("offer")]).unwrap();
        assert_eq!(q.status, QuoteStatus::InProgress);
        assert_eq!(q.reject_reason, None);
        assert_eq!(q.supplier, Some(actor.id));
        assert!(q.check_invariants().is_ok());
    }

    #[test]
    fn supplier_upload_does_not_steal_an_existing_assignment() {
        let mut q = quote(QuoteStatus::InProgress);
        let assigned = Uuid::new_v4();
        q.supplier = Some(assigned);
        record_upload(&mut q, &supplier_actor(), FileKind::Supplier, vec![entry("offer")])
            .unwrap();
        assert_eq!(q.supplier, Some(assigned));
    }

    #[test]
    fn customer_upload_is_pending_only() {
        let actor = Actor::new(Uuid::new_v4(), Role::Customer);
        let mut q = quote(QuoteStatus::Pending);
        record_upload(&mut q, &actor, FileKind::Customer, vec![entry("extra")]).unwrap();
        assert_eq!(q.customer_files.0.len(), 2);

        let mut q = quote(QuoteStatus::InProgress);
        assert!(record_upload(&mut q, &actor, FileKind::Customer, vec![entry("late")]).is_err());
    }

    #[test]
    fn quoter_upload_records_handler_but_keeps_state() {
        let actor = quoter_actor();
        let mut q = quote(QuoteStatus::SupplierQuoted);
        q.supplier_files.0.push(entry("offer"));
        record_upload(&mut q, &actor, FileKind::Quoter, vec![entry("final")]).unwrap();
        assert_eq!(q.status, QuoteStatus::SupplierQuoted);
        assert_eq!(q.quoter, Some(actor.id));
    }

    #[test]
    fn supplier_confirmation_requires_a_file_and_in_progress() {
        let mut q = quote(QuoteStatus::InProgress);
        assert_eq!(
            confirm_supplier_quote(&mut q),
            Err(LifecycleError::NoFiles(FileKind::Supplier))
        );

        q.supplier_files.0.push(entry("offer"));
        confirm_supplier_quote(&mut q).unwrap();
        assert_eq!(q.status, QuoteStatus::SupplierQuoted);

        // confirming twice is not a legal trigger
        assert!(confirm_supplier_quote(&mut q).is_err());
    }

    #[test]
    fn final_confirmation_requires_a_quoter_file() {
        let mut q = quote(QuoteStatus::SupplierQuoted);
        q.supplier_files.0.push(entry("offer"));
        assert_eq!(
            confirm_final_quote(&mut q),
            Err(LifecycleError::NoFiles(FileKind::Quoter))
        );

        q.quoter_files.0.push(entry("final"));
        confirm_final_quote(&mut q).unwrap();
        assert_eq!(q.status, QuoteStatus::Quoted);
        assert!(q.check_invariants().is_ok());
    }

    #[test]
    fn rejection_needs_a_reason_and_an_active_state() {
        let actor = quoter_actor();
        let mut q = quote(QuoteStatus::Pending);
        assert_eq!(reject(&mut q, &actor, "   "), Err(LifecycleError::EmptyReason));

        reject(&mut q, &actor, "no capacity").unwrap();
        assert_eq!(q.status, QuoteStatus::Rejected);
        assert_eq!(q.reject_reason.as_deref(), Some("no capacity"));
        assert_eq!(q.quoter, Some(actor.id));

        let mut q = quote(QuoteStatus::Quoted);
        q.quoter_files.0.push(entry("final"));
        assert!(reject(&mut q, &actor, "too late").is_err());
    }

    #[test]
    fn deleting_last_quoter_file_rewinds_by_remaining_attachments() {
        // supplier files present -> supplier_quoted
        let mut q = quote(QuoteStatus::Quoted);
        q.quoter = Some(Uuid::new_v4());
        q.supplier_files.0.push(entry("offer"));
        q.quoter_files.0.push(entry("final"));
        remove_file(&mut q, FileKind::Quoter, 0).unwrap();
        assert_eq!(q.status, QuoteStatus::SupplierQuoted);
        assert_eq!(q.quoter, None);

        // no supplier files -> pending
        let mut q = quote(QuoteStatus::Quoted);
        q.quoter = Some(Uuid::new_v4());
        q.quoter_files.0.push(entry("final"));
        remove_file(&mut q, FileKind::Quoter, 0).unwrap();
        assert_eq!(q.status, QuoteStatus::Pending);
    }

    #[test]
    fn deleting_one_of_several_files_does_not_rewind() {
        let mut q = quote(QuoteStatus::Quoted);
        let quoter = Uuid::new_v4();
        q.quoter = Some(quoter);
        q.quoter_files.0.push(entry("final-a"));
        q.quoter_files.0.push(entry("final-b"));
        remove_file(&mut q, FileKind::Quoter, 0).unwrap();
        assert_eq!(q.status, QuoteStatus::Quoted);
        assert_eq!(q.quoter, Some(quoter));
        assert_eq!(q.quoter_files.0.len(), 1);
    }

    #[test]
    fn deleting_last_supplier_file_clears_rejection_and_rewinds() {
        let mut q = quote(QuoteStatus::Rejected);
        q.supplier = Some(Uuid::new_v4());
        q.supplier_files.0.push(entry("offer"));
        let removed = remove_file(&mut q, FileKind::Supplier, 0).unwrap();
        assert_eq!(removed.display_name, "offer.xlsx");
        assert_eq!(q.status, QuoteStatus::InProgress);
        assert_eq!(q.reject_reason, None);
        // assignment is kept so the supplier can re-upload
        assert!(q.supplier.is_some());
    }

    #[test]
    fn file_index_is_bounds_checked() {
        let mut q = quote(QuoteStatus::Pending);
        assert_eq!(
            remove_file(&mut q, FileKind::Supplier, 0),
            Err(LifecycleError::FileIndexOutOfRange {
                kind: FileKind::Supplier,
                index: 0
            })
        );
    }
}
