//! Persistence checks over invoice creation, run against in-memory
//! SQLite: the invoice row and its items commit together or not at all.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, EntityTrait, PaginatorTrait, Set,
};
use uuid::Uuid;

use backoffice_api::auth::AuthUser;
use backoffice_api::cache::{Cache, InMemoryCache};
use backoffice_api::config::SmtpConfig;
use backoffice_api::db::DbPool;
use backoffice_api::entities::profile::Role;
use backoffice_api::entities::{invoice, invoice_item, product, profile};
use backoffice_api::services::activity::ActivityLogger;
use backoffice_api::services::commission::CommissionResolver;
use backoffice_api::services::email::EmailService;
use backoffice_api::services::invoices::{CreateInvoiceInput, InvoiceItemInput, InvoiceService};
use backoffice_api::services::settings::SettingsProvider;

const SCHEMA: &str = r#"
CREATE TABLE profiles (
    id TEXT PRIMARY KEY,
    email TEXT,
    display_name TEXT NOT NULL,
    phone TEXT,
    role TEXT NOT NULL,
    status TEXT NOT NULL,
    referred_by TEXT,
    commission_rate REAL,
    lifetime_access INTEGER NOT NULL,
    trial_expiry TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    price REAL NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE invoices (
    id TEXT PRIMARY KEY,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    issue_date TEXT NOT NULL,
    due_date TEXT NOT NULL,
    total_amount REAL NOT NULL,
    tax_total REAL NOT NULL,
    status TEXT NOT NULL,
    notes TEXT,
    reseller_commission_percentage REAL,
    applied_offer_id TEXT,
    commission_calculated_at TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE invoice_items (
    id TEXT PRIMARY KEY,
    invoice_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL,
    tax_rate REAL NOT NULL,
    total_price REAL NOT NULL,
    UNIQUE (invoice_id, product_id)
);
CREATE TABLE offers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    commission_percentage REAL NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE app_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE user_product_access (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    granted_at TEXT NOT NULL
);
CREATE TABLE activity_logs (
    id TEXT PRIMARY KEY,
    actor_id TEXT,
    actor_role TEXT,
    action TEXT NOT NULL,
    entity_type TEXT,
    entity_id TEXT,
    detail TEXT,
    created_at TEXT NOT NULL
);
"#;

async fn setup_db() -> Arc<DbPool> {
    // A single connection keeps every statement on the same in-memory file
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("in-memory sqlite should connect");

    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        db.execute_unprepared(statement)
            .await
            .expect("schema statement should apply");
    }

    Arc::new(db)
}

fn invoice_service(db: Arc<DbPool>) -> InvoiceService {
    let cache = Cache::new(Arc::new(InMemoryCache::new()));
    let settings = SettingsProvider::new(Arc::clone(&db), cache.clone(), Duration::from_secs(60));
    let commission = CommissionResolver::new(Arc::clone(&db), settings.clone());
    let email = Arc::new(
        EmailService::new(&SmtpConfig::default()).expect("disabled transport should build"),
    );
    let activity = ActivityLogger::new(Arc::clone(&db));
    InvoiceService::new(
        db,
        settings,
        commission,
        email,
        activity,
        cache,
        Duration::from_secs(60),
    )
}

async fn seed_reseller_and_consumer(db: &DbPool) -> (AuthUser, Uuid) {
    let now = chrono::Utc::now();
    let reseller_id = Uuid::new_v4();
    let consumer_id = Uuid::new_v4();

    profile::ActiveModel {
        id: Set(reseller_id),
        email: Set(Some("robin@example.com".into())),
        display_name: Set("Robin".into()),
        phone: Set(None),
        role: Set(Role::Reseller.to_string()),
        status: Set("active".into()),
        referred_by: Set(None),
        commission_rate: Set(None),
        lifetime_access: Set(false),
        trial_expiry: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("reseller row should insert");

    profile::ActiveModel {
        id: Set(consumer_id),
        email: Set(Some("ada@example.com".into())),
        display_name: Set("Ada".into()),
        phone: Set(None),
        role: Set(Role::Consumer.to_string()),
        status: Set("active".into()),
        referred_by: Set(Some(reseller_id)),
        commission_rate: Set(None),
        lifetime_access: Set(false),
        trial_expiry: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("consumer row should insert");

    let actor = AuthUser {
        id: reseller_id,
        display_name: Some("Robin".into()),
        email: Some("robin@example.com".into()),
        role: Role::Reseller,
    };
    (actor, consumer_id)
}

async fn seed_product(db: &DbPool) -> Uuid {
    let product_id = Uuid::new_v4();
    product::ActiveModel {
        id: Set(product_id),
        name: Set("Widget".into()),
        description: Set(None),
        price: Set(dec!(50.00)),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .expect("product row should insert");
    product_id
}

fn line(product_id: Uuid) -> InvoiceItemInput {
    InvoiceItemInput {
        product_id,
        quantity: 1,
        unit_price: dec!(50.00),
        tax_rate: None,
    }
}

fn input(receiver_id: Uuid, items: Vec<InvoiceItemInput>) -> CreateInvoiceInput {
    CreateInvoiceInput {
        receiver_id,
        issue_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2024, 4, 4).unwrap(),
        tax_rate: None,
        notes: None,
        items,
    }
}

#[tokio::test]
async fn failed_item_insert_leaves_no_invoice_row() {
    let db = setup_db().await;
    let service = invoice_service(Arc::clone(&db));
    let (actor, consumer_id) = seed_reseller_and_consumer(&db).await;
    let product_id = seed_product(&db).await;

    // The second line hits the UNIQUE(invoice_id, product_id) constraint,
    // failing the item insert after the invoice row is already written
    let result = service
        .create_invoice(&actor, input(consumer_id, vec![line(product_id), line(product_id)]))
        .await;
    assert!(result.is_err(), "duplicate line should fail the insert");

    let invoices = invoice::Entity::find().count(&*db).await.unwrap();
    assert_eq!(invoices, 0, "the invoice row must roll back with its items");
    let items = invoice_item::Entity::find().count(&*db).await.unwrap();
    assert_eq!(items, 0);
}

#[tokio::test]
async fn successful_create_persists_invoice_and_items() {
    let db = setup_db().await;
    let service = invoice_service(Arc::clone(&db));
    let (actor, consumer_id) = seed_reseller_and_consumer(&db).await;
    let product_id = seed_product(&db).await;

    let view = service
        .create_invoice(&actor, input(consumer_id, vec![line(product_id)]))
        .await
        .expect("single-line invoice should commit");

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.invoice.total_amount, dec!(50.00));

    let invoices = invoice::Entity::find().count(&*db).await.unwrap();
    assert_eq!(invoices, 1);
    let items = invoice_item::Entity::find().count(&*db).await.unwrap();
    assert_eq!(items, 1);
}
