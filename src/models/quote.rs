//! The quote document: the single entity the workflow revolves around.
//!
//! A quote is created by a customer with at least one attached spreadsheet,
//! routed to a supplier by a quoter, priced by the supplier, and finalized
//! back to the customer. The status column is the state-machine position;
//! transitions live in [`crate::lifecycle`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::fmt;
use uuid::Uuid;

/// Lifecycle states. `Pending` is initial; `Quoted` and `Cancelled` are
/// terminal; `Rejected` is re-entrant via a new supplier upload.
///
/// `Cancelled` is never produced by any current operation; it is kept so
/// historical rows still decode and every match stays exhaustive.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    InProgress,
    SupplierQuoted,
    Rejected,
    Quoted,
    Cancelled,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 6] = [
        QuoteStatus::Pending,
        QuoteStatus::InProgress,
        QuoteStatus::SupplierQuoted,
        QuoteStatus::Rejected,
        QuoteStatus::Quoted,
        QuoteStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::InProgress => "in_progress",
            QuoteStatus::SupplierQuoted => "supplier_quoted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Quoted => "quoted",
            QuoteStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for list and detail views.
    pub fn label(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "Pending",
            QuoteStatus::InProgress => "In Progress",
            QuoteStatus::SupplierQuoted => "Supplier Quoted",
            QuoteStatus::Rejected => "Rejected",
            QuoteStatus::Quoted => "Quoted",
            QuoteStatus::Cancelled => "Cancelled",
        }
    }

    /// Terminal for the normal flow; no trigger leaves these states.
    pub fn is_terminal(self) -> bool {
        matches!(self, QuoteStatus::Quoted | QuoteStatus::Cancelled)
    }

    /// States in which staff still have work to do on the quote.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            QuoteStatus::Pending | QuoteStatus::InProgress | QuoteStatus::SupplierQuoted
        )
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the three attachment collections a file belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Customer,
    Supplier,
    Quoter,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Customer, FileKind::Supplier, FileKind::Quoter];

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Customer => "customer",
            FileKind::Supplier => "supplier",
            FileKind::Quoter => "quoter",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileKind {
    type Err = UnknownFileKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(FileKind::Customer),
            "supplier" => Ok(FileKind::Supplier),
            "quoter" => Ok(FileKind::Quoter),
            other => Err(UnknownFileKind(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown file kind `{0}`, expected customer, supplier or quoter")]
pub struct UnknownFileKind(pub String);

/// One attachment entry. `stored_name` addresses the blob in the file store;
/// `display_name` is what the uploader called it and is metadata only.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileEntry {
    pub stored_name: String,
    pub display_name: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// A request-for-quote document.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Quote {
    /// Internal UUID used for addressing; `quote_number` is the business key.
    pub id: Uuid,

    /// `Q-YYYYMMDD-NNN`, unique, assigned at creation, immutable.
    pub quote_number: String,

    /// Owning customer, set once at creation.
    pub customer: Uuid,

    /// Internal handler, set on first quoter action or by admin assignment.
    pub quoter: Option<Uuid>,

    /// Assigned external responder; may be cleared and reassigned while the
    /// quote is in early states.
    pub supplier: Option<Uuid>,

    pub title: String,
    pub description: String,
    pub customer_message: String,
    pub quoter_message: String,

    /// Present if and only if `status` is `Rejected`.
    pub reject_reason: Option<String>,

    pub price: Option<f64>,
    pub currency: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub urgent: bool,

    pub status: QuoteStatus,

    pub customer_files: Json<Vec<FileEntry>>,
    pub supplier_files: Json<Vec<FileEntry>>,
    pub quoter_files: Json<Vec<FileEntry>>,

    /// Optimistic-concurrency token; every persisted update is guarded by a
    /// compare-and-swap on this counter.
    pub revision: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn files(&self, kind: FileKind) -> &Vec<FileEntry> {
        match kind {
            FileKind::Customer => &self.customer_files.0,
            FileKind::Supplier => &self.supplier_files.0,
            FileKind::Quoter => &self.quoter_files.0,
        }
    }

    pub fn files_mut(&mut self, kind: FileKind) -> &mut Vec<FileEntry> {
        match kind {
            FileKind::Customer => &mut self.customer_files.0,
            FileKind::Supplier => &mut self.supplier_files.0,
            FileKind::Quoter => &mut self.quoter_files.0,
        }
    }

    /// Normalizing party accessor: resolves the party that owns a file kind
    /// to a plain identifier. Every "is this actor that party" comparison
    /// goes through here.
    pub fn party(&self, kind: FileKind) -> Option<Uuid> {
        match kind {
            FileKind::Customer => Some(self.customer),
            FileKind::Supplier => self.supplier,
            FileKind::Quoter => self.quoter,
        }
    }

    /// True when `id` is the party assigned to `kind`.
    pub fn is_party(&self, kind: FileKind, id: Uuid) -> bool {
        self.party(kind) == Some(id)
    }

    /// Iterate all attachments for cascade deletion.
    pub fn all_files(&self) -> impl Iterator<Item = &FileEntry> {
        FileKind::ALL.into_iter().flat_map(|kind| self.files(kind).iter())
    }

    /// Document-level consistency checks, used by tests and debug assertions.
    pub fn check_invariants(&self) -> Result<(), String> {
        match (self.status, &self.reject_reason) {
            (QuoteStatus::Rejected, None) => {
                return Err("rejected quote without a reject reason".into());
            }
            (status, Some(_)) if status != QuoteStatus::Rejected => {
                return Err(format!("reject reason present while status is {status}"));
            }
            _ => {}
        }
        if self.status == QuoteStatus::SupplierQuoted && self.supplier_files.0.is_empty() {
            return Err("supplier_quoted without supplier files".into());
        }
        if self.status == QuoteStatus::Quoted && self.quoter_files.0.is_empty() {
            return Err("quoted without quoter files".into());
        }
        Ok(())
    }
}

/// Format the business key for a given day and per-day sequence.
pub fn quote_number(day: NaiveDate, sequence: u32) -> String {
    format!("Q-{}-{:03}", day.format("%Y%m%d"), sequence)
}

/// Prefix shared by all quote numbers of one day, used for the max-sequence
/// lookup at creation time.
pub fn quote_number_prefix(day: NaiveDate) -> String {
    format!("Q-{}-", day.format("%Y%m%d"))
}

/// Extract the numeric sequence from an existing quote number.
pub fn quote_number_sequence(number: &str) -> Option<u32> {
    number.rsplit('-').next()?.parse().ok()
}
