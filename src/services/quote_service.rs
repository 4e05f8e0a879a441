//! QuoteService — orchestration for every quote operation.
//!
//! The flow for each mutation is always the same: fetch a snapshot, ask the
//! permission evaluator, apply the state machine to the in-memory copy, and
//! commit data + status in one compare-and-swap UPDATE keyed on the revision
//! counter. A CAS miss means another actor won the race; it surfaces as a
//! retryable conflict instead of silently overwriting.
//!
//! Blob writes happen before the row commit (the row must never reference an
//! attachment that does not durably exist); blob deletes happen after it,
//! best-effort, with failures logged.

use crate::lifecycle;
use crate::models::group::{DEFAULT_GROUP_COLOR, SupplierGroup};
use crate::models::quote::{
    self, FileEntry, FileKind, Quote, QuoteStatus, quote_number_prefix, quote_number_sequence,
};
use crate::models::user::{Actor, Role};
use crate::permissions::{self, QuoteView};
use crate::services::file_store::{FileStore, MAX_FILES_PER_REQUEST, StoreError};
use crate::services::notifier::{NotificationEvent, Notifier, QuoteDigest, dispatch};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tracing::{info, warn};
use uuid::Uuid;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("quote `{0}` not found")]
    NotFound(Uuid),
    #[error("group `{0}` not found")]
    GroupNotFound(Uuid),
    #[error("{kind} file {index} does not exist")]
    FileNotFound { kind: FileKind, index: usize },
    #[error("quote number collision, please retry")]
    NumberConflict,
    #[error("the quote was modified concurrently, please retry")]
    RevisionConflict,
    #[error(transparent)]
    Lifecycle(#[from] lifecycle::LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type QuoteResult<T> = Result<T, QuoteError>;

fn forbidden(msg: &str) -> QuoteError {
    QuoteError::Forbidden(msg.to_string())
}

/// One uploaded file, buffered at the boundary (uploads are capped at 10 MB
/// each and ten per request).
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub display_name: String,
    pub data: Bytes,
}

/// Creation payload; the first file's name stands in for a missing title.
#[derive(Clone, Debug, Default)]
pub struct NewQuote {
    pub title: Option<String>,
    pub description: String,
    pub customer_message: String,
    pub urgent: bool,
}

/// Reference to a single entry in one of the attachment collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileRef {
    pub kind: FileKind,
    pub index: usize,
}

/// Everything a multipart update request can carry: field edits, fresh
/// uploads (routed to the collection matching the actor's role), and
/// deletion markers for existing entries.
#[derive(Debug, Default)]
pub struct QuoteUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub customer_message: Option<String>,
    pub quoter_message: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub urgent: Option<bool>,
    pub uploads: Vec<IncomingFile>,
    pub deletions: Vec<FileRef>,
}

impl QuoteUpdate {
    fn has_field_edits(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.customer_message.is_some()
            || self.quoter_message.is_some()
            || self.price.is_some()
            || self.currency.is_some()
            || self.valid_until.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_field_edits()
            && self.urgent.is_none()
            && self.uploads.is_empty()
            && self.deletions.is_empty()
    }
}

const QUOTE_COLUMNS: &str = "id, quote_number, customer, quoter, supplier, title, description, \
     customer_message, quoter_message, reject_reason, price, currency, valid_until, urgent, \
     status, customer_files, supplier_files, quoter_files, revision, created_at, updated_at";

/// Shared application service; cloned into every handler as router state.
#[derive(Clone)]
pub struct QuoteService {
    /// Shared SQLite pool for document metadata.
    pub db: Arc<SqlitePool>,

    /// Blob store for attachment payloads.
    pub files: FileStore,

    notifier: Arc<dyn Notifier>,
}

impl QuoteService {
    pub fn new(db: Arc<SqlitePool>, files: FileStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, files, notifier }
    }

    // ---- persistence -----------------------------------------------------

    async fn fetch(&self, id: Uuid) -> QuoteResult<Quote> {
        sqlx::query_as::<_, Quote>(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?"))
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => QuoteError::NotFound(id),
                other => QuoteError::Sqlx(other),
            })
    }

    async fn insert(&self, quote: &Quote) -> QuoteResult<()> {
        sqlx::query(&format!(
            "INSERT INTO quotes ({QUOTE_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(quote.id)
        .bind(&quote.quote_number)
        .bind(quote.customer)
        .bind(quote.quoter)
        .bind(quote.supplier)
        .bind(&quote.title)
        .bind(&quote.description)
        .bind(&quote.customer_message)
        .bind(&quote.quoter_message)
        .bind(&quote.reject_reason)
        .bind(quote.price)
        .bind(&quote.currency)
        .bind(quote.valid_until)
        .bind(quote.urgent)
        .bind(quote.status)
        .bind(&quote.customer_files)
        .bind(&quote.supplier_files)
        .bind(&quote.quoter_files)
        .bind(quote.revision)
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Commit an in-memory snapshot, guarded by the revision it was read at.
    ///
    /// Zero rows affected means a concurrent writer bumped the revision
    /// between our read and this write.
    async fn persist(&self, quote: &mut Quote) -> QuoteResult<()> {
        debug_assert!(quote.check_invariants().is_ok());
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE quotes SET quoter = ?, supplier = ?, title = ?, description = ?, \
             customer_message = ?, quoter_message = ?, reject_reason = ?, price = ?, \
             currency = ?, valid_until = ?, urgent = ?, status = ?, customer_files = ?, \
             supplier_files = ?, quoter_files = ?, revision = revision + 1, updated_at = ? \
             WHERE id = ? AND revision = ?",
        )
        .bind(quote.quoter)
        .bind(quote.supplier)
        .bind(&quote.title)
        .bind(&quote.description)
        .bind(&quote.customer_message)
        .bind(&quote.quoter_message)
        .bind(&quote.reject_reason)
        .bind(quote.price)
        .bind(&quote.currency)
        .bind(quote.valid_until)
        .bind(quote.urgent)
        .bind(quote.status)
        .bind(&quote.customer_files)
        .bind(&quote.supplier_files)
        .bind(&quote.quoter_files)
        .bind(now)
        .bind(quote.id)
        .bind(quote.revision)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QuoteError::RevisionConflict);
        }
        quote.revision += 1;
        quote.updated_at = now;
        Ok(())
    }

    /// Next business key for today: highest existing per-day sequence + 1.
    async fn next_quote_number(&self) -> QuoteResult<String> {
        let today = Utc::now().date_naive();
        let prefix = quote_number_prefix(today);
        let last: Option<String> = sqlx::query_scalar(
            "SELECT quote_number FROM quotes WHERE quote_number LIKE ? \
             ORDER BY quote_number DESC LIMIT 1",
        )
        .bind(format!("{prefix}%"))
        .fetch_optional(&*self.db)
        .await?;

        let sequence = last
            .as_deref()
            .and_then(quote_number_sequence)
            .map_or(1, |seq| seq + 1);
        Ok(quote::quote_number(today, sequence))
    }

    async fn remove_blobs(&self, entries: &[FileEntry]) {
        for entry in entries {
            if let Err(err) = self.files.delete(&entry.stored_name).await {
                warn!(stored_name = %entry.stored_name, "failed to remove blob: {err}");
            }
        }
    }

    // ---- quote operations ------------------------------------------------

    /// Customer creates a quote with at least one attached spreadsheet.
    pub async fn create_quote(
        &self,
        actor: &Actor,
        request: NewQuote,
        files: Vec<IncomingFile>,
    ) -> QuoteResult<QuoteView> {
        if actor.role != Role::Customer {
            return Err(forbidden("only customers can create quotes"));
        }
        if files.is_empty() {
            return Err(QuoteError::Validation(
                "at least one spreadsheet attachment is required".into(),
            ));
        }
        if files.len() > MAX_FILES_PER_REQUEST {
            return Err(QuoteError::Validation(format!(
                "at most {MAX_FILES_PER_REQUEST} files per request"
            )));
        }

        // fall back to the first file's name (sans extension) as title
        let title = match request.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => {
                let first = files[0].display_name.as_str();
                first
                    .rsplit_once('.')
                    .map(|(stem, _)| stem)
                    .unwrap_or(first)
                    .to_string()
            }
        };

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            match self.files.save_bytes(&file.display_name, file.data).await {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    self.remove_blobs(&entries).await;
                    return Err(err.into());
                }
            }
        }

        let now = Utc::now();
        let mut quote = Quote {
            id: Uuid::new_v4(),
            quote_number: String::new(),
            customer: actor.id,
            quoter: None,
            supplier: None,
            title,
            description: request.description.trim().to_string(),
            customer_message: request.customer_message.trim().to_string(),
            quoter_message: String::new(),
            reject_reason: None,
            price: None,
            currency: None,
            valid_until: None,
            urgent: request.urgent,
            status: QuoteStatus::Pending,
            customer_files: Json(entries),
            supplier_files: Json(Vec::new()),
            quoter_files: Json(Vec::new()),
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        // a racing creation can claim the same per-day sequence; retry once
        // before surfacing the collision as retryable
        let mut attempts = 0;
        loop {
            quote.quote_number = self.next_quote_number().await?;
            match self.insert(&quote).await {
                Ok(()) => break,
                Err(QuoteError::Sqlx(err)) if is_unique_violation(&err) => {
                    attempts += 1;
                    if attempts >= 2 {
                        self.remove_blobs(&quote.customer_files.0).await;
                        return Err(QuoteError::NumberConflict);
                    }
                }
                Err(err) => {
                    self.remove_blobs(&quote.customer_files.0).await;
                    return Err(err);
                }
            }
        }

        info!(quote = %quote.quote_number, customer = %actor.id, "quote created");
        dispatch(
            self.notifier.clone(),
            NotificationEvent::QuoteCreated {
                quote: QuoteDigest::sanitized(&quote),
            },
        );
        Ok(permissions::project(&quote, actor.role))
    }

    /// Role-filtered listing, newest first. Suppliers see their own quotes
    /// plus everything still discoverable.
    pub async fn list_quotes(&self, actor: &Actor) -> QuoteResult<Vec<QuoteView>> {
        let quotes: Vec<Quote> = match actor.role {
            Role::Customer => {
                sqlx::query_as(&format!(
                    "SELECT {QUOTE_COLUMNS} FROM quotes WHERE customer = ? \
                     ORDER BY created_at DESC"
                ))
                .bind(actor.id)
                .fetch_all(&*self.db)
                .await?
            }
            Role::Supplier => {
                sqlx::query_as(&format!(
                    "SELECT {QUOTE_COLUMNS} FROM quotes WHERE supplier = ? \
                     OR status IN ('pending', 'rejected', 'in_progress') \
                     ORDER BY created_at DESC"
                ))
                .bind(actor.id)
                .fetch_all(&*self.db)
                .await?
            }
            Role::Quoter | Role::Admin => {
                sqlx::query_as(&format!(
                    "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC"
                ))
                .fetch_all(&*self.db)
                .await?
            }
        };

        Ok(quotes
            .iter()
            .map(|quote| permissions::project(quote, actor.role))
            .collect())
    }

    pub async fn get_quote(&self, actor: &Actor, id: Uuid) -> QuoteResult<QuoteView> {
        let quote = self.fetch(id).await?;
        if !permissions::can_view(&quote, actor) {
            return Err(forbidden("you may not view this quote"));
        }
        Ok(permissions::project(&quote, actor.role))
    }

    /// Apply field edits, uploads, and deletion markers in one atomic commit.
    pub async fn update_quote(
        &self,
        actor: &Actor,
        id: Uuid,
        update: QuoteUpdate,
    ) -> QuoteResult<QuoteView> {
        if update.is_empty() {
            return Err(QuoteError::Validation("nothing to update".into()));
        }
        if update.uploads.len() > MAX_FILES_PER_REQUEST {
            return Err(QuoteError::Validation(format!(
                "at most {MAX_FILES_PER_REQUEST} files per request"
            )));
        }

        let mut quote = self.fetch(id).await?;

        if update.has_field_edits() && !permissions::can_edit(&quote, actor) {
            return Err(forbidden("you may not edit this quote"));
        }
        if update.urgent.is_some() && !permissions::can_toggle_urgent(&quote, actor) {
            return Err(forbidden("you may not change the urgent flag"));
        }

        // uploads land in the collection matching the actor's role
        let upload_kind = match actor.role {
            Role::Customer => FileKind::Customer,
            Role::Supplier => FileKind::Supplier,
            Role::Quoter | Role::Admin => FileKind::Quoter,
        };
        if !update.uploads.is_empty() && !permissions::can_upload(&quote, actor, upload_kind) {
            return Err(forbidden("you may not upload files to this quote"));
        }
        for file_ref in &update.deletions {
            if !permissions::can_delete_file(&quote, actor, file_ref.kind) {
                return Err(forbidden("you may not delete this file"));
            }
            if file_ref.index >= quote.files(file_ref.kind).len() {
                return Err(QuoteError::FileNotFound {
                    kind: file_ref.kind,
                    index: file_ref.index,
                });
            }
        }

        self.apply_field_edits(&mut quote, actor, &update)?;
        if let Some(urgent) = update.urgent {
            quote.urgent = urgent;
        }

        // highest index first so earlier removals do not shift later ones
        let mut deletions = update.deletions.clone();
        deletions.sort_by(|a, b| b.index.cmp(&a.index));
        let mut removed = Vec::with_capacity(deletions.len());
        for file_ref in deletions {
            removed.push(lifecycle::remove_file(&mut quote, file_ref.kind, file_ref.index)?);
        }

        // blobs are written before the row commit; the row must never point
        // at an attachment that does not durably exist
        let mut saved = Vec::with_capacity(update.uploads.len());
        for file in update.uploads {
            match self.files.save_bytes(&file.display_name, file.data).await {
                Ok(entry) => saved.push(entry),
                Err(err) => {
                    self.remove_blobs(&saved).await;
                    return Err(err.into());
                }
            }
        }
        if !saved.is_empty() {
            if let Err(err) = lifecycle::record_upload(&mut quote, actor, upload_kind, saved.clone())
            {
                self.remove_blobs(&saved).await;
                return Err(err.into());
            }
        }

        if let Err(err) = self.persist(&mut quote).await {
            self.remove_blobs(&saved).await;
            return Err(err);
        }
        self.remove_blobs(&removed).await;

        info!(quote = %quote.quote_number, actor = %actor.id, role = %actor.role,
              status = %quote.status, "quote updated");
        Ok(permissions::project(&quote, actor.role))
    }

    /// Which fields each role may touch through a general update.
    fn apply_field_edits(
        &self,
        quote: &mut Quote,
        actor: &Actor,
        update: &QuoteUpdate,
    ) -> QuoteResult<()> {
        let staff = actor.role.is_staff();
        let customer = actor.role == Role::Customer;

        if let Some(title) = &update.title {
            if !(customer || staff) {
                return Err(forbidden("you may not edit the title"));
            }
            let title = title.trim();
            if title.is_empty() {
                return Err(QuoteError::Validation("title cannot be empty".into()));
            }
            quote.title = title.to_string();
        }
        if let Some(description) = &update.description {
            if !(customer || staff) {
                return Err(forbidden("you may not edit the description"));
            }
            quote.description = description.trim().to_string();
        }
        if let Some(message) = &update.customer_message {
            if !customer {
                return Err(forbidden("only the customer edits the customer message"));
            }
            quote.customer_message = message.trim().to_string();
        }
        if let Some(message) = &update.quoter_message {
            if !staff {
                return Err(forbidden("only staff edit the quoter message"));
            }
            quote.quoter_message = message.trim().to_string();
        }
        if update.price.is_some() || update.currency.is_some() || update.valid_until.is_some() {
            if !staff {
                return Err(forbidden("only staff edit pricing fields"));
            }
            if let Some(price) = update.price {
                if !(price.is_finite() && price >= 0.0) {
                    return Err(QuoteError::Validation("price must be non-negative".into()));
                }
                quote.price = Some(price);
            }
            if let Some(currency) = &update.currency {
                quote.currency = Some(currency.trim().to_uppercase());
            }
            if let Some(valid_until) = update.valid_until {
                quote.valid_until = Some(valid_until);
            }
        }
        Ok(())
    }

    pub async fn reject_quote(&self, actor: &Actor, id: Uuid, reason: &str) -> QuoteResult<QuoteView> {
        let mut quote = self.fetch(id).await?;
        if !permissions::can_reject(&quote, actor) {
            return Err(forbidden("you may not reject this quote"));
        }
        lifecycle::reject(&mut quote, actor, reason)?;
        self.persist(&mut quote).await?;
        info!(quote = %quote.quote_number, actor = %actor.id, "quote rejected");
        Ok(permissions::project(&quote, actor.role))
    }

    pub async fn assign_supplier(
        &self,
        actor: &Actor,
        id: Uuid,
        supplier: Uuid,
    ) -> QuoteResult<QuoteView> {
        if !permissions::can_assign_supplier(actor) {
            return Err(forbidden("only staff assign suppliers"));
        }
        let mut quote = self.fetch(id).await?;
        lifecycle::assign_supplier(&mut quote, supplier)?;
        if quote.quoter.is_none() && actor.role == Role::Quoter {
            quote.quoter = Some(actor.id);
        }
        self.persist(&mut quote).await?;

        info!(quote = %quote.quote_number, %supplier, "supplier assigned");
        dispatch(
            self.notifier.clone(),
            NotificationEvent::SupplierAssigned {
                supplier,
                quote: QuoteDigest::sanitized(&quote),
            },
        );
        Ok(permissions::project(&quote, actor.role))
    }

    pub async fn remove_supplier(&self, actor: &Actor, id: Uuid) -> QuoteResult<QuoteView> {
        if !permissions::can_assign_supplier(actor) {
            return Err(forbidden("only staff remove supplier assignments"));
        }
        let mut quote = self.fetch(id).await?;
        lifecycle::remove_supplier(&mut quote)?;
        self.persist(&mut quote).await?;
        info!(quote = %quote.quote_number, "supplier assignment removed");
        Ok(permissions::project(&quote, actor.role))
    }

    /// Admin routes a quote to a specific internal handler. Does not move the
    /// state machine.
    pub async fn assign_quoter(
        &self,
        actor: &Actor,
        id: Uuid,
        quoter: Uuid,
    ) -> QuoteResult<QuoteView> {
        if actor.role != Role::Admin {
            return Err(forbidden("only admins assign quoters"));
        }
        let mut quote = self.fetch(id).await?;
        quote.quoter = Some(quoter);
        self.persist(&mut quote).await?;
        Ok(permissions::project(&quote, actor.role))
    }

    /// The assigned supplier commits their uploaded response as official.
    pub async fn confirm_supplier_quote(&self, actor: &Actor, id: Uuid) -> QuoteResult<QuoteView> {
        let mut quote = self.fetch(id).await?;
        if actor.role != Role::Supplier || !quote.is_party(FileKind::Supplier, actor.id) {
            return Err(forbidden("only the assigned supplier confirms their quote"));
        }
        lifecycle::confirm_supplier_quote(&mut quote)?;
        self.persist(&mut quote).await?;

        info!(quote = %quote.quote_number, supplier = %actor.id, "supplier quote confirmed");
        dispatch(
            self.notifier.clone(),
            NotificationEvent::SupplierQuoted {
                quote: QuoteDigest::full(&quote),
            },
        );
        Ok(permissions::project(&quote, actor.role))
    }

    /// Staff commits the final quote back to the customer.
    pub async fn confirm_final_quote(&self, actor: &Actor, id: Uuid) -> QuoteResult<QuoteView> {
        if !actor.role.is_staff() {
            return Err(forbidden("only staff confirm the final quote"));
        }
        let mut quote = self.fetch(id).await?;
        lifecycle::confirm_final_quote(&mut quote)?;
        if quote.quoter.is_none() {
            quote.quoter = Some(actor.id);
        }
        self.persist(&mut quote).await?;

        info!(quote = %quote.quote_number, "final quote confirmed");
        dispatch(
            self.notifier.clone(),
            NotificationEvent::QuoteFinalized {
                customer: quote.customer,
                quote: QuoteDigest::full(&quote),
            },
        );
        Ok(permissions::project(&quote, actor.role))
    }

    /// Remove the quote and cascade-delete every attachment blob.
    pub async fn delete_quote(&self, actor: &Actor, id: Uuid) -> QuoteResult<()> {
        let quote = self.fetch(id).await?;
        if !permissions::can_delete_quote(&quote, actor) {
            return Err(forbidden("you may not delete this quote"));
        }

        let result = sqlx::query("DELETE FROM quotes WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(QuoteError::NotFound(id));
        }

        let blobs: Vec<FileEntry> = quote.all_files().cloned().collect();
        self.remove_blobs(&blobs).await;
        info!(quote = %quote.quote_number, actor = %actor.id, "quote deleted");
        Ok(())
    }

    /// Open one attachment for a streaming download.
    pub async fn download(
        &self,
        actor: &Actor,
        id: Uuid,
        kind: FileKind,
        index: usize,
    ) -> QuoteResult<(FileEntry, File, i64)> {
        let quote = self.fetch(id).await?;
        if !permissions::can_view(&quote, actor) || !permissions::can_download(&quote, actor, kind)
        {
            return Err(forbidden("you may not download this file"));
        }
        let entry = quote
            .files(kind)
            .get(index)
            .cloned()
            .ok_or(QuoteError::FileNotFound { kind, index })?;
        let (file, len) = self.files.open(&entry.stored_name).await?;
        Ok((entry, file, len))
    }

    /// Bundle all files of one kind into a zip archive.
    pub async fn download_archive(
        &self,
        actor: &Actor,
        id: Uuid,
        kind: FileKind,
    ) -> QuoteResult<(String, Vec<u8>)> {
        let quote = self.fetch(id).await?;
        if !permissions::can_view(&quote, actor) || !permissions::can_download(&quote, actor, kind)
        {
            return Err(forbidden("you may not download these files"));
        }
        let entries = quote.files(kind);
        if entries.is_empty() {
            return Err(QuoteError::FileNotFound { kind, index: 0 });
        }

        let mut cursor = std::io::Cursor::new(Vec::new());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(&mut cursor);
        let mut used_names = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            // display names may repeat; disambiguate inside the archive
            let name = if used_names.insert(entry.display_name.clone()) {
                entry.display_name.clone()
            } else {
                format!("{:02}_{}", index + 1, entry.display_name)
            };
            let data = self.files.read(&entry.stored_name).await?;
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&data)?;
        }
        zip.finish()?;

        let archive_name = format!("{}_{}_files.zip", quote.quote_number, kind);
        Ok((archive_name, cursor.into_inner()))
    }

    // ---- supplier groups ---------------------------------------------------

    pub async fn list_groups(&self) -> QuoteResult<Vec<SupplierGroup>> {
        Ok(sqlx::query_as(
            "SELECT id, name, description, color, created_by, members, created_at \
             FROM groups ORDER BY created_at DESC",
        )
        .fetch_all(&*self.db)
        .await?)
    }

    pub async fn create_group(
        &self,
        actor: &Actor,
        name: &str,
        description: &str,
        color: Option<&str>,
    ) -> QuoteResult<SupplierGroup> {
        if !actor.role.is_staff() {
            return Err(forbidden("only staff manage supplier groups"));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(QuoteError::Validation("group name cannot be empty".into()));
        }

        let group = SupplierGroup {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.trim().to_string(),
            color: color.unwrap_or(DEFAULT_GROUP_COLOR).to_string(),
            created_by: actor.id,
            members: Json(Vec::new()),
            created_at: Utc::now(),
        };

        match sqlx::query(
            "INSERT INTO groups (id, name, description, color, created_by, members, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.color)
        .bind(group.created_by)
        .bind(&group.members)
        .bind(group.created_at)
        .execute(&*self.db)
        .await
        {
            Ok(_) => Ok(group),
            Err(err) if is_unique_violation(&err) => Err(QuoteError::Validation(format!(
                "group `{name}` already exists"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update_group(
        &self,
        actor: &Actor,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        color: Option<&str>,
        members: Option<Vec<Uuid>>,
    ) -> QuoteResult<SupplierGroup> {
        if !actor.role.is_staff() {
            return Err(forbidden("only staff manage supplier groups"));
        }
        let mut group: SupplierGroup = sqlx::query_as(
            "SELECT id, name, description, color, created_by, members, created_at \
             FROM groups WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => QuoteError::GroupNotFound(id),
            other => QuoteError::Sqlx(other),
        })?;

        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                return Err(QuoteError::Validation("group name cannot be empty".into()));
            }
            group.name = name.to_string();
        }
        if let Some(description) = description {
            group.description = description.trim().to_string();
        }
        if let Some(color) = color {
            group.color = color.to_string();
        }
        if let Some(members) = members {
            group.members = Json(members);
        }

        match sqlx::query(
            "UPDATE groups SET name = ?, description = ?, color = ?, members = ? WHERE id = ?",
        )
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.color)
        .bind(&group.members)
        .bind(group.id)
        .execute(&*self.db)
        .await
        {
            Ok(_) => Ok(group),
            Err(err) if is_unique_violation(&err) => Err(QuoteError::Validation(format!(
                "group `{}` already exists",
                group.name
            ))),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete_group(&self, actor: &Actor, id: Uuid) -> QuoteResult<()> {
        if !actor.role.is_staff() {
            return Err(forbidden("only staff manage supplier groups"));
        }
        let result = sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(QuoteError::GroupNotFound(id));
        }
        Ok(())
    }
}

/// Return true if a SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
