//! HTTP handlers for the quote workflow.
//!
//! Create and update accept multipart bodies so that field edits and
//! spreadsheet attachments travel in one request; the lifecycle actions are
//! small JSON PATCH endpoints. Every handler resolves the caller through the
//! [`Actor`] extractor and delegates decisions to `QuoteService`.

use crate::{
    errors::AppError,
    models::quote::FileKind,
    models::user::Actor,
    services::quote_service::{FileRef, IncomingFile, NewQuote, QuoteService, QuoteUpdate},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Collected multipart content: text fields plus uploaded files.
#[derive(Default)]
struct MultipartBody {
    fields: Vec<(String, String)>,
    files: Vec<IncomingFile>,
}

impl MultipartBody {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

async fn collect_multipart(mut multipart: Multipart) -> Result<MultipartBody, AppError> {
    let mut body = MultipartBody::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name() {
            let display_name = file_name.to_string();
            let data = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(format!("failed to read upload: {err}")))?;
            body.files.push(IncomingFile { display_name, data });
        } else {
            let value = field
                .text()
                .await
                .map_err(|err| AppError::bad_request(format!("failed to read field: {err}")))?;
            body.fields.push((name, value));
        }
    }
    Ok(body)
}

fn parse_bool(value: &str) -> Result<bool, AppError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(AppError::bad_request(format!("not a boolean: `{other}`"))),
    }
}

/// Deletion markers come as repeated `delete` fields of the form
/// `{kind}:{index}`, e.g. `supplier:0`.
fn parse_deletion(value: &str) -> Result<FileRef, AppError> {
    let (kind, index) = value
        .split_once(':')
        .ok_or_else(|| AppError::bad_request("delete marker must be `kind:index`"))?;
    let kind: FileKind = kind
        .parse()
        .map_err(|err: crate::models::quote::UnknownFileKind| AppError::bad_request(err.to_string()))?;
    let index: usize = index
        .parse()
        .map_err(|_| AppError::bad_request("delete marker index must be a number"))?;
    Ok(FileRef { kind, index })
}

/// POST `/quotes` — customer creates a quote (multipart: fields + files).
pub async fn create_quote(
    State(service): State<QuoteService>,
    actor: Actor,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let body = collect_multipart(multipart).await?;
    let request = NewQuote {
        title: body.field("title").map(str::to_string),
        description: body.field("description").unwrap_or_default().to_string(),
        customer_message: body
            .field("customer_message")
            .unwrap_or_default()
            .to_string(),
        urgent: body.field("urgent").map(parse_bool).transpose()?.unwrap_or(false),
    };

    let view = service.create_quote(&actor, request, body.files).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET `/quotes` — role-filtered listing.
pub async fn list_quotes(
    State(service): State<QuoteService>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let views = service.list_quotes(&actor).await?;
    Ok(Json(views))
}

/// GET `/quotes/{id}` — single quote, projected for the caller's role.
pub async fn get_quote(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = service.get_quote(&actor, id).await?;
    Ok(Json(view))
}

/// PUT `/quotes/{id}` — field edits, uploads and deletion markers in one
/// multipart request.
pub async fn update_quote(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let body = collect_multipart(multipart).await?;

    let valid_until = body
        .field("valid_until")
        .map(|raw| {
            raw.parse::<DateTime<Utc>>()
                .map_err(|_| AppError::bad_request("valid_until must be an RFC 3339 timestamp"))
        })
        .transpose()?;
    let price = body
        .field("price")
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| AppError::bad_request("price must be a number"))
        })
        .transpose()?;
    let deletions = body
        .fields_named("delete")
        .map(parse_deletion)
        .collect::<Result<Vec<_>, _>>()?;

    let update = QuoteUpdate {
        title: body.field("title").map(str::to_string),
        description: body.field("description").map(str::to_string),
        customer_message: body.field("customer_message").map(str::to_string),
        quoter_message: body.field("quoter_message").map(str::to_string),
        price,
        currency: body.field("currency").map(str::to_string),
        valid_until,
        urgent: body.field("urgent").map(parse_bool).transpose()?,
        uploads: body.files,
        deletions,
    };

    let view = service.update_quote(&actor, id, update).await?;
    Ok(Json(view))
}

/// DELETE `/quotes/{id}` — remove the quote and its attachments.
pub async fn delete_quote(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_quote(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

/// PATCH `/quotes/{id}/reject`
pub async fn reject_quote(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> Result<impl IntoResponse, AppError> {
    let view = service.reject_quote(&actor, id, &body.reason).await?;
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct AssignSupplierBody {
    pub supplier: Uuid,
}

/// PATCH `/quotes/{id}/assign-supplier`
pub async fn assign_supplier(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignSupplierBody>,
) -> Result<impl IntoResponse, AppError> {
    let view = service.assign_supplier(&actor, id, body.supplier).await?;
    Ok(Json(view))
}

/// PATCH `/quotes/{id}/remove-supplier`
pub async fn remove_supplier(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = service.remove_supplier(&actor, id).await?;
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct AssignQuoterBody {
    pub quoter: Uuid,
}

/// PATCH `/quotes/{id}/assign-quoter`
pub async fn assign_quoter(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignQuoterBody>,
) -> Result<impl IntoResponse, AppError> {
    let view = service.assign_quoter(&actor, id, body.quoter).await?;
    Ok(Json(view))
}

/// PATCH `/quotes/{id}/confirm-supplier-quote`
pub async fn confirm_supplier_quote(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = service.confirm_supplier_quote(&actor, id).await?;
    Ok(Json(view))
}

/// PATCH `/quotes/{id}/confirm`
pub async fn confirm_final_quote(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = service.confirm_final_quote(&actor, id).await?;
    Ok(Json(view))
}

fn parse_kind(raw: &str) -> Result<FileKind, AppError> {
    raw.parse()
        .map_err(|err: crate::models::quote::UnknownFileKind| AppError::bad_request(err.to_string()))
}

fn content_disposition(file_name: &str) -> HeaderValue {
    // display names are validated at upload; control bytes cannot occur
    let sanitized: String = file_name.replace('"', "'");
    HeaderValue::from_str(&format!("attachment; filename=\"{sanitized}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn spreadsheet_content_type(file_name: &str) -> HeaderValue {
    if file_name.to_ascii_lowercase().ends_with(".xlsx") {
        HeaderValue::from_static(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        )
    } else {
        HeaderValue::from_static("application/vnd.ms-excel")
    }
}

/// GET `/quotes/{id}/files/{kind}/{index}` — stream one attachment.
pub async fn download_file(
    State(service): State<QuoteService>,
    actor: Actor,
    Path((id, kind, index)): Path<(Uuid, String, usize)>,
) -> Result<Response, AppError> {
    let kind = parse_kind(&kind)?;
    let (entry, file, len) = service.download(&actor, id, kind, index).await?;

    let stream = ReaderStream::new(file);
    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        spreadsheet_content_type(&entry.display_name),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&len.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&entry.display_name),
    );
    Ok(response)
}

/// GET `/quotes/{id}/files/{kind}` — all attachments of one kind as a zip.
pub async fn download_archive(
    State(service): State<QuoteService>,
    actor: Actor,
    Path((id, kind)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let kind = parse_kind(&kind)?;
    let (archive_name, bytes) = service.download_archive(&actor, id, kind).await?;

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&archive_name),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_markers_parse_kind_and_index() {
        assert_eq!(
            parse_deletion("supplier:0").unwrap(),
            FileRef {
                kind: FileKind::Supplier,
                index: 0
            }
        );
        assert_eq!(
            parse_deletion("customer:12").unwrap(),
            FileRef {
                kind: FileKind::Customer,
                index: 12
            }
        );
        assert!(parse_deletion("supplier").is_err());
        assert!(parse_deletion("vendor:0").is_err());
        assert!(parse_deletion("quoter:first").is_err());
    }

    #[test]
    fn booleans_accept_both_spellings() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("yes").is_err());
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(
            spreadsheet_content_type("offer.XLSX"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(spreadsheet_content_type("legacy.xls"), "application/vnd.ms-excel");
    }
}
