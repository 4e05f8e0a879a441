//! End-to-end workflow scenarios driven through the service layer.

use bytes::Bytes;
use quote_desk::models::quote::{FileKind, QuoteStatus};
use quote_desk::models::user::{Actor, Role};
use quote_desk::services::file_store::FileStore;
use quote_desk::services::notifier::NoopNotifier;
use quote_desk::services::quote_service::{
    FileRef, IncomingFile, NewQuote, QuoteError, QuoteService, QuoteUpdate,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use uuid::Uuid;

async fn service() -> (QuoteService, tempfile::TempDir) {
    // a single connection keeps the in-memory database shared
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for statement in include_str!("../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    let dir = tempfile::tempdir().unwrap();
    let service = QuoteService::new(
        Arc::new(pool),
        FileStore::new(dir.path()),
        Arc::new(NoopNotifier),
    );
    (service, dir)
}

fn xlsx(name: &str) -> IncomingFile {
    IncomingFile {
        display_name: format!("{name}.xlsx"),
        data: Bytes::from_static(b"spreadsheet cells"),
    }
}

fn actors() -> (Actor, Actor, Actor, Actor) {
    (
        Actor::new(Uuid::new_v4(), Role::Customer),
        Actor::new(Uuid::new_v4(), Role::Supplier),
        Actor::new(Uuid::new_v4(), Role::Quoter),
        Actor::new(Uuid::new_v4(), Role::Admin),
    )
}

fn upload(files: Vec<IncomingFile>) -> QuoteUpdate {
    QuoteUpdate {
        uploads: files,
        ..QuoteUpdate::default()
    }
}

async fn create(service: &QuoteService, customer: &Actor, title: &str) -> Uuid {
    service
        .create_quote(
            customer,
            NewQuote {
                title: Some(title.into()),
                description: "500 units, anodized".into(),
                customer_message: "needed by end of month".into(),
                urgent: false,
            },
            vec![xlsx("rfq")],
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn happy_path_from_submission_to_final_quote() {
    let (service, _dir) = service().await;
    let (customer, supplier, quoter, _) = actors();
    let id = create(&service, &customer, "aluminium brackets").await;

    // quoter routes the request to a supplier
    let view = service.assign_supplier(&quoter, id, supplier.id).await.unwrap();
    assert_eq!(view.status, QuoteStatus::InProgress);

    // supplier uploads a priced response and confirms it
    service.update_quote(&supplier, id, upload(vec![xlsx("offer")])).await.unwrap();
    let view = service.confirm_supplier_quote(&supplier, id).await.unwrap();
    assert_eq!(view.status, QuoteStatus::SupplierQuoted);

    // quoter uploads the final document, sets pricing, confirms
    service.update_quote(&quoter, id, upload(vec![xlsx("final")])).await.unwrap();
    service
        .update_quote(
            &quoter,
            id,
            QuoteUpdate {
                price: Some(1480.0),
                currency: Some("eur".into()),
                ..QuoteUpdate::default()
            },
        )
        .await
        .unwrap();
    let view = service.confirm_final_quote(&quoter, id).await.unwrap();
    assert_eq!(view.status, QuoteStatus::Quoted);
    assert_eq!(view.currency.as_deref(), Some("EUR"));

    // the customer now sees the final quote files, but never the supplier's
    let customer_view = service.get_quote(&customer, id).await.unwrap();
    assert!(customer_view.quoter_files.is_some());
    assert!(customer_view.supplier_files.is_none());
    assert!(customer_view.supplier.is_none());
    assert_eq!(customer_view.price, Some(1480.0));

    // terminal: no further uploads
    assert!(matches!(
        service.update_quote(&supplier, id, upload(vec![xlsx("late")])).await,
        Err(QuoteError::Forbidden(_))
    ));
}

#[tokio::test]
async fn rejection_and_recovery_through_a_fresh_upload() {
    let (service, _dir) = service().await;
    let (customer, supplier, quoter, _) = actors();
    let id = create(&service, &customer, "gaskets").await;
    service.assign_supplier(&quoter, id, supplier.id).await.unwrap();

    let view = service
        .reject_quote(&supplier, id, "no capacity this month")
        .await
        .unwrap();
    assert_eq!(view.status, QuoteStatus::Rejected);
    assert_eq!(view.reject_reason.as_deref(), Some("no capacity this month"));

    // a new assignment while rejected keeps the rejection visible
    let replacement = Actor::new(Uuid::new_v4(), Role::Supplier);
    let view = service
        .assign_supplier(&quoter, id, replacement.id)
        .await
        .unwrap();
    assert_eq!(view.status, QuoteStatus::Rejected);

    // the replacement's upload re-enters the active flow
    let view = service
        .update_quote(&replacement, id, upload(vec![xlsx("second-offer")]))
        .await
        .unwrap();
    assert_eq!(view.status, QuoteStatus::InProgress);
    assert_eq!(view.reject_reason, None);

    let view = service.confirm_supplier_quote(&replacement, id).await.unwrap();
    assert_eq!(view.status, QuoteStatus::SupplierQuoted);

    // the original supplier is no longer a party
    assert!(matches!(
        service.confirm_supplier_quote(&supplier, id).await,
        Err(QuoteError::Forbidden(_))
    ));
}

#[tokio::test]
async fn deleting_the_last_supplier_file_rewinds_the_confirmation() {
    let (service, _dir) = service().await;
    let (customer, supplier, quoter, _) = actors();
    let id = create(&service, &customer, "shafts").await;
    service.assign_supplier(&quoter, id, supplier.id).await.unwrap();
    service.update_quote(&supplier, id, upload(vec![xlsx("offer")])).await.unwrap();
    service.confirm_supplier_quote(&supplier, id).await.unwrap();

    let view = service
        .update_quote(
            &supplier,
            id,
            QuoteUpdate {
                deletions: vec![FileRef {
                    kind: FileKind::Supplier,
                    index: 0,
                }],
                ..QuoteUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(view.status, QuoteStatus::InProgress);
    assert_eq!(view.supplier_files.map(|files| files.len()), Some(0));
}

#[tokio::test]
async fn supplier_files_lock_once_the_final_quote_exists() {
    let (service, _dir) = service().await;
    let (customer, supplier, quoter, _) = actors();
    let id = create(&service, &customer, "housings").await;
    service.assign_supplier(&quoter, id, supplier.id).await.unwrap();
    service.update_quote(&supplier, id, upload(vec![xlsx("offer")])).await.unwrap();
    service.confirm_supplier_quote(&supplier, id).await.unwrap();
    service.update_quote(&quoter, id, upload(vec![xlsx("final")])).await.unwrap();

    let attempt = service
        .update_quote(
            &supplier,
            id,
            QuoteUpdate {
                deletions: vec![FileRef {
                    kind: FileKind::Supplier,
                    index: 0,
                }],
                ..QuoteUpdate::default()
            },
        )
        .await;
    assert!(matches!(attempt, Err(QuoteError::Forbidden(_))));
}

#[tokio::test]
async fn listing_is_filtered_by_role() {
    let (service, _dir) = service().await;
    let (customer, supplier, quoter, admin) = actors();
    let other_customer = Actor::new(Uuid::new_v4(), Role::Customer);

    let mine = create(&service, &customer, "mine").await;
    let theirs = create(&service, &other_customer, "theirs").await;
    service.assign_supplier(&quoter, theirs, supplier.id).await.unwrap();

    let views = service.list_quotes(&customer).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, mine);

    // supplier sees the assigned quote plus the still-pending one
    let views = service.list_quotes(&supplier).await.unwrap();
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|v| v.customer.is_none()));

    for staff in [&quoter, &admin] {
        let views = service.list_quotes(staff).await.unwrap();
        assert_eq!(views.len(), 2);
    }
}

#[tokio::test]
async fn download_permissions_follow_the_lifecycle() {
    let (service, _dir) = service().await;
    let (customer, supplier, quoter, _) = actors();
    let id = create(&service, &customer, "plates").await;
    service.assign_supplier(&quoter, id, supplier.id).await.unwrap();
    service.update_quote(&supplier, id, upload(vec![xlsx("offer")])).await.unwrap();
    service.confirm_supplier_quote(&supplier, id).await.unwrap();
    service.update_quote(&quoter, id, upload(vec![xlsx("final")])).await.unwrap();

    // customer cannot fetch the final quote before confirmation
    assert!(matches!(
        service.download(&customer, id, FileKind::Quoter, 0).await,
        Err(QuoteError::Forbidden(_))
    ));
    // and never the supplier's report
    assert!(matches!(
        service.download(&customer, id, FileKind::Supplier, 0).await,
        Err(QuoteError::Forbidden(_))
    ));

    service.confirm_final_quote(&quoter, id).await.unwrap();
    let (entry, _file, len) = service
        .download(&customer, id, FileKind::Quoter, 0)
        .await
        .unwrap();
    assert_eq!(entry.display_name, "final.xlsx");
    assert!(len > 0);
}

#[tokio::test]
async fn urgent_toggle_and_edit_rights() {
    let (service, _dir) = service().await;
    let (customer, supplier, quoter, _) = actors();
    let id = create(&service, &customer, "pulleys").await;
    service.assign_supplier(&quoter, id, supplier.id).await.unwrap();

    let view = service
        .update_quote(
            &customer,
            id,
            QuoteUpdate {
                urgent: Some(true),
                ..QuoteUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(view.urgent);

    // suppliers cannot flip the flag or edit customer fields
    assert!(matches!(
        service
            .update_quote(
                &supplier,
                id,
                QuoteUpdate {
                    urgent: Some(false),
                    ..QuoteUpdate::default()
                }
            )
            .await,
        Err(QuoteError::Forbidden(_))
    ));
    assert!(matches!(
        service
            .update_quote(
                &supplier,
                id,
                QuoteUpdate {
                    customer_message: Some("hijack".into()),
                    ..QuoteUpdate::default()
                }
            )
            .await,
        Err(QuoteError::Forbidden(_))
    ));
}

#[tokio::test]
async fn group_management_is_staff_only() {
    let (service, _dir) = service().await;
    let (customer, _, quoter, _) = actors();

    assert!(matches!(
        service.create_group(&customer, "regional", "", None).await,
        Err(QuoteError::Forbidden(_))
    ));

    let group = service
        .create_group(&quoter, "regional", "eu suppliers", None)
        .await
        .unwrap();
    assert_eq!(group.color, "#007bff");

    // duplicate names are refused
    assert!(matches!(
        service.create_group(&quoter, "regional", "", None).await,
        Err(QuoteError::Validation(_))
    ));

    let member = Uuid::new_v4();
    let updated = service
        .update_group(&quoter, group.id, None, None, Some("#aa3377"), Some(vec![member]))
        .await
        .unwrap();
    assert_eq!(updated.color, "#aa3377");
    assert_eq!(updated.members.0, vec![member]);

    service.delete_group(&quoter, group.id).await.unwrap();
    assert!(matches!(
        service.delete_group(&quoter, group.id).await,
        Err(QuoteError::GroupNotFound(_))
    ));
}
