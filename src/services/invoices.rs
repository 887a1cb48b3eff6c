//! Invoice creation and the read/status operations around it.
//!
//! Creation is the one write that matters here: validate, price, total,
//! snapshot commission, commit invoice and items atomically, then fan out
//! the side effects (email, product access grants, activity log) off the
//! request path. Totals and commission are computed once at creation and
//! never recomputed afterwards.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::cache::Cache;
use crate::db::DbPool;
use crate::entities::invoice::InvoiceStatus;
use crate::entities::profile::Role;
use crate::entities::{invoice, invoice_item, product, profile, user_product_access};
use crate::errors::ServiceError;
use crate::services::activity::ActivityLogger;
use crate::services::commission::CommissionResolver;
use crate::services::email::{EmailService, EmailTemplate, InvoiceEmailLine};
use crate::services::pricing::resolve_unit_price;
use crate::services::settings::SettingsProvider;

const INVOICE_LIST_CACHE_PATTERN: &str = "invoices:*";
const MAX_PAGE_SIZE: u64 = 100;

fn email_line(item: &InvoiceItemView) -> InvoiceEmailLine {
    InvoiceEmailLine {
        product_name: item.product_name.clone(),
        quantity: item.quantity,
        unit_price: item.unit_price.to_string(),
        line_total: item.total_price.to_string(),
    }
}

fn issuer_name(actor: &AuthUser) -> String {
    actor
        .display_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| actor.role.to_string())
}

/// One requested line item, already shape-validated by the handler DTO.
#[derive(Debug, Clone)]
pub struct InvoiceItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct CreateInvoiceInput {
    pub receiver_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Invoice-level tax rate, used where an item does not carry its own
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemInput>,
}

/// A priced line item, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub line_subtotal: Decimal,
    pub line_tax: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedInvoice {
    pub items: Vec<StagedItem>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    /// Tax-inclusive grand total; becomes `invoices.total_amount`
    pub final_total: Decimal,
}

/// Price and total the requested items against the catalog.
///
/// Pure over already-fetched products so the arithmetic and the override
/// policy are testable without a database. Fails on the first invalid item.
pub fn stage_items(
    actor_role: Role,
    override_allowed: bool,
    invoice_tax_rate: Option<Decimal>,
    items: &[InvoiceItemInput],
    products: &HashMap<Uuid, product::Model>,
) -> Result<StagedInvoice, ServiceError> {
    let mut staged = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;

    for item in items {
        if item.quantity <= 0 {
            return Err(ServiceError::BadRequest(format!(
                "quantity must be positive for product {}",
                item.product_id
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(ServiceError::BadRequest(format!(
                "unit price must not be negative for product {}",
                item.product_id
            )));
        }

        let product = products.get(&item.product_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} not found", item.product_id))
        })?;

        let unit_price = resolve_unit_price(
            actor_role,
            override_allowed,
            product.price,
            item.unit_price,
        )?;

        let tax_rate = item
            .tax_rate
            .or(invoice_tax_rate)
            .unwrap_or(Decimal::ZERO);
        if tax_rate < Decimal::ZERO {
            return Err(ServiceError::BadRequest(format!(
                "tax rate must not be negative for product {}",
                item.product_id
            )));
        }

        let line_subtotal = unit_price * Decimal::from(item.quantity);
        let line_tax = line_subtotal * tax_rate / Decimal::ONE_HUNDRED;
        let total_price = line_subtotal + line_tax;

        subtotal += line_subtotal;
        tax_total += line_tax;

        staged.push(StagedItem {
            product_id: item.product_id,
            product_name: product.name.clone(),
            quantity: item.quantity,
            unit_price,
            tax_rate,
            line_subtotal,
            line_tax,
            total_price,
        });
    }

    Ok(StagedInvoice {
        items: staged,
        subtotal,
        tax_total,
        final_total: subtotal + tax_total,
    })
}

/// Line item as returned to clients, with the product name resolved.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct InvoiceItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct InvoiceView {
    #[schema(value_type = Object)]
    pub invoice: invoice::Model,
    pub invoice_number: String,
    pub items: Vec<InvoiceItemView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceListPage {
    pub invoices: Vec<invoice::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DbPool>,
    settings: SettingsProvider,
    commission: CommissionResolver,
    email: Arc<EmailService>,
    activity: ActivityLogger,
    cache: Cache,
    list_ttl: std::time::Duration,
}

impl InvoiceService {
    pub fn new(
        db: Arc<DbPool>,
        settings: SettingsProvider,
        commission: CommissionResolver,
        email: Arc<EmailService>,
        activity: ActivityLogger,
        cache: Cache,
        list_ttl: std::time::Duration,
    ) -> Self {
        Self {
            db,
            settings,
            commission,
            email,
            activity,
            cache,
            list_ttl,
        }
    }

    async fn load_receiver(
        &self,
        actor: &AuthUser,
        receiver_id: Uuid,
    ) -> Result<profile::Model, ServiceError> {
        let receiver = profile::Entity::find_by_id(receiver_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Consumer {} not found", receiver_id)))?;

        if !receiver.is_consumer() {
            return Err(ServiceError::BadRequest(
                "Invoices can only be issued to consumer accounts".to_string(),
            ));
        }

        if actor.role == Role::Reseller && receiver.referred_by != Some(actor.id) {
            return Err(ServiceError::Forbidden(
                "Consumers can only be invoiced by their referring reseller".to_string(),
            ));
        }

        Ok(receiver)
    }

    async fn load_products(
        &self,
        items: &[InvoiceItemInput],
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(ids.clone()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !products.contains_key(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Products not found: {}",
                missing.join(", ")
            )));
        }

        Ok(products)
    }

    fn invalidate_list_cache(&self) {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.delete_pattern(INVOICE_LIST_CACHE_PATTERN).await {
                warn!(error = %e, "invoice list cache invalidation failed");
            }
        });
    }

    fn grant_product_access(&self, user_id: Uuid, product_ids: Vec<Uuid>) {
        let db = Arc::clone(&self.db);
        tokio::spawn(async move {
            for product_id in product_ids {
                let grant = user_product_access::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    granted_at: Set(Utc::now()),
                };
                if let Err(e) = grant.insert(&*db).await {
                    // Duplicate grants are expected for repeat purchases
                    warn!(%user_id, %product_id, error = %e, "product access grant skipped");
                }
            }
        });
    }

    /// Create an invoice with its items and fan out the notifications.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.id, receiver_id = %input.receiver_id))]
    pub async fn create_invoice(
        &self,
        actor: &AuthUser,
        input: CreateInvoiceInput,
    ) -> Result<InvoiceView, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::BadRequest(
                "An invoice requires at least one item".to_string(),
            ));
        }

        let receiver = self.load_receiver(actor, input.receiver_id).await?;

        if input.tax_rate.is_some_and(|rate| rate < Decimal::ZERO) {
            return Err(ServiceError::BadRequest(
                "tax rate must not be negative".to_string(),
            ));
        }

        // Item shape errors outrank missing products
        for item in &input.items {
            if item.quantity <= 0 {
                return Err(ServiceError::BadRequest(format!(
                    "quantity must be positive for product {}",
                    item.product_id
                )));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::BadRequest(format!(
                    "unit price must not be negative for product {}",
                    item.product_id
                )));
            }
            if item.tax_rate.is_some_and(|rate| rate < Decimal::ZERO) {
                return Err(ServiceError::BadRequest(format!(
                    "tax rate must not be negative for product {}",
                    item.product_id
                )));
            }
        }

        let products = self.load_products(&input.items).await?;

        let override_allowed = self.settings.allow_reseller_price_override().await;
        let staged = stage_items(
            actor.role,
            override_allowed,
            input.tax_rate,
            &input.items,
            &products,
        )?;

        if let Some(min) = self.settings.min_invoice_amount().await {
            if staged.final_total < min {
                return Err(ServiceError::BadRequest(format!(
                    "Invoice total {} is below the minimum invoice amount {}",
                    staged.final_total, min
                )));
            }
        }

        let decision = self
            .commission
            .resolve(actor, input.issue_date, &receiver)
            .await;

        let now = Utc::now();
        let invoice_id = Uuid::new_v4();
        let invoice_model = invoice::ActiveModel {
            id: Set(invoice_id),
            sender_id: Set(actor.id),
            receiver_id: Set(receiver.id),
            issue_date: Set(input.issue_date),
            due_date: Set(input.due_date),
            total_amount: Set(staged.final_total),
            tax_total: Set(staged.tax_total),
            status: Set(InvoiceStatus::Unpaid.to_string()),
            notes: Set(input.notes.clone()),
            reseller_commission_percentage: Set(decision.percentage),
            applied_offer_id: Set(decision.applied_offer_id),
            commission_calculated_at: Set(decision.percentage.map(|_| now)),
            created_at: Set(now),
        };

        // Invoice and items commit together or not at all
        let txn = self.db.begin().await?;
        let invoice = invoice_model.insert(&txn).await?;
        let mut item_views = Vec::with_capacity(staged.items.len());
        for staged_item in &staged.items {
            let item = invoice_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                invoice_id: Set(invoice_id),
                product_id: Set(staged_item.product_id),
                quantity: Set(staged_item.quantity),
                unit_price: Set(staged_item.unit_price),
                tax_rate: Set(staged_item.tax_rate),
                total_price: Set(staged_item.total_price),
            }
            .insert(&txn)
            .await?;

            item_views.push(InvoiceItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: staged_item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                tax_rate: item.tax_rate,
                total_price: item.total_price,
            });
        }
        txn.commit().await?;

        let invoice_number = invoice.invoice_number();

        self.email.send_detached_opt(
            receiver.email.clone(),
            EmailTemplate::InvoiceCreated {
                recipient_name: receiver.display_name.clone(),
                invoice_number: invoice_number.clone(),
                items: item_views.iter().map(email_line).collect(),
                total_amount: invoice.total_amount.to_string(),
                due_date: invoice.due_date.to_string(),
                issued_by: issuer_name(actor),
                issuer_role: actor.role.to_string(),
            },
        );
        self.grant_product_access(
            receiver.id,
            staged.items.iter().map(|i| i.product_id).collect(),
        );
        self.activity.record(
            actor,
            "invoice.created",
            "invoice",
            Some(invoice.id),
            Some(serde_json::json!({
                "invoice_number": invoice_number,
                "receiver_id": receiver.id,
                "total_amount": invoice.total_amount,
                "commission_percentage": invoice.reseller_commission_percentage,
            })),
        );
        self.invalidate_list_cache();

        Ok(InvoiceView {
            invoice,
            invoice_number,
            items: item_views,
        })
    }

    /// Paginated admin listing, cached for a short TTL.
    pub async fn list(&self, page: u64, per_page: u64) -> Result<InvoiceListPage, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let cache_key = format!("invoices:list:{}:{}", page, per_page);

        match self.cache.get_json::<InvoiceListPage>(&cache_key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "invoice list cache read failed"),
        }

        let paginator = invoice::Entity::find()
            .order_by_desc(invoice::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let invoices = paginator.fetch_page(page - 1).await?;

        let result = InvoiceListPage {
            invoices,
            total,
            page,
            per_page,
        };
        if let Err(e) = self.cache.set_json(&cache_key, &result, self.list_ttl).await {
            warn!(error = %e, "invoice list cache write failed");
        }
        Ok(result)
    }

    /// Invoices issued by the calling actor.
    pub async fn my_invoices(&self, actor: &AuthUser) -> Result<Vec<invoice::Model>, ServiceError> {
        Ok(invoice::Entity::find()
            .filter(invoice::Column::SenderId.eq(actor.id))
            .order_by_desc(invoice::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Invoices billed to a consumer; resellers only for their own referrals.
    pub async fn consumer_invoices(
        &self,
        actor: &AuthUser,
        consumer_id: Uuid,
    ) -> Result<Vec<invoice::Model>, ServiceError> {
        let consumer = profile::Entity::find_by_id(consumer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Consumer {} not found", consumer_id)))?;

        if actor.role == Role::Reseller && consumer.referred_by != Some(actor.id) {
            return Err(ServiceError::Forbidden(
                "Consumers can only be viewed by their referring reseller".to_string(),
            ));
        }

        Ok(invoice::Entity::find()
            .filter(invoice::Column::ReceiverId.eq(consumer_id))
            .order_by_desc(invoice::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    async fn load_invoice_view(&self, invoice: invoice::Model) -> Result<InvoiceView, ServiceError> {
        let items = invoice_item::Entity::find()
            .filter(invoice_item::Column::InvoiceId.eq(invoice.id))
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let names: HashMap<Uuid, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let item_views = items
            .into_iter()
            .map(|item| InvoiceItemView {
                product_name: names
                    .get(&item.product_id)
                    .cloned()
                    .unwrap_or_else(|| "(removed product)".to_string()),
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                tax_rate: item.tax_rate,
                total_price: item.total_price,
            })
            .collect();

        Ok(InvoiceView {
            invoice_number: invoice.invoice_number(),
            invoice,
            items: item_views,
        })
    }

    /// One invoice with items; resellers only see invoices they issued or
    /// that bill one of their consumers.
    pub async fn get_invoice(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<InvoiceView, ServiceError> {
        let invoice = invoice::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", id)))?;

        if actor.role == Role::Reseller && invoice.sender_id != actor.id {
            let receiver = profile::Entity::find_by_id(invoice.receiver_id)
                .one(&*self.db)
                .await?;
            let owns_receiver =
                receiver.map_or(false, |r| r.referred_by == Some(actor.id));
            if !owns_receiver {
                return Err(ServiceError::Forbidden(
                    "Invoice belongs to another reseller".to_string(),
                ));
            }
        }

        self.load_invoice_view(invoice).await
    }

    /// Flip the payment status. Totals are never recomputed here.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, invoice_id = %id))]
    pub async fn update_status(
        &self,
        actor: &AuthUser,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<invoice::Model, ServiceError> {
        let invoice = invoice::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", id)))?;

        if actor.role == Role::Reseller && invoice.sender_id != actor.id {
            return Err(ServiceError::Forbidden(
                "Invoice belongs to another reseller".to_string(),
            ));
        }

        let mut active: invoice::ActiveModel = invoice.into();
        active.status = Set(status.to_string());
        let updated = active.update(&*self.db).await?;

        self.activity.record(
            actor,
            "invoice.status_changed",
            "invoice",
            Some(updated.id),
            Some(serde_json::json!({ "status": status })),
        );
        self.invalidate_list_cache();

        Ok(updated)
    }

    /// Re-send the creation notification for an existing invoice. Does not
    /// mutate the invoice; the derived invoice number is stable.
    pub async fn resend_notification(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<(), ServiceError> {
        let view = {
            let invoice = invoice::Entity::find_by_id(id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", id)))?;
            self.load_invoice_view(invoice).await?
        };

        let receiver = profile::Entity::find_by_id(view.invoice.receiver_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Consumer {} not found",
                    view.invoice.receiver_id
                ))
            })?;

        let email = match receiver.email.clone().filter(|e| !e.trim().is_empty()) {
            Some(email) => email,
            None => {
                return Err(ServiceError::BadRequest(
                    "The invoice receiver has no email address".to_string(),
                ))
            }
        };

        // Attribute the message to the original issuer, not the admin
        // resending it
        let sender = profile::Entity::find_by_id(view.invoice.sender_id)
            .one(&*self.db)
            .await?;
        let (issued_by, issuer_role) = match &sender {
            Some(s) => (s.display_name.clone(), s.role.clone()),
            None => (issuer_name(actor), actor.role.to_string()),
        };

        if let Err(e) = self
            .email
            .send(
                &email,
                &EmailTemplate::InvoiceCreated {
                    recipient_name: receiver.display_name.clone(),
                    invoice_number: view.invoice_number.clone(),
                    items: view.items.iter().map(email_line).collect(),
                    total_amount: view.invoice.total_amount.to_string(),
                    due_date: view.invoice.due_date.to_string(),
                    issued_by,
                    issuer_role,
                },
            )
            .await
        {
            error!(invoice_id = %id, error = %e, "invoice notification resend failed");
            return Err(e);
        }

        self.activity.record(
            actor,
            "invoice.notification_resent",
            "invoice",
            Some(id),
            Some(serde_json::json!({ "invoice_number": view.invoice_number })),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn catalog(entries: &[(Uuid, &str, Decimal)]) -> HashMap<Uuid, product::Model> {
        entries
            .iter()
            .map(|(id, name, price)| {
                (
                    *id,
                    product::Model {
                        id: *id,
                        name: (*name).to_string(),
                        description: None,
                        price: *price,
                        created_at: Utc::now(),
                    },
                )
            })
            .collect()
    }

    fn item(product_id: Uuid, quantity: i32, unit_price: Decimal, tax_rate: Option<Decimal>) -> InvoiceItemInput {
        InvoiceItemInput {
            product_id,
            quantity,
            unit_price,
            tax_rate,
        }
    }

    #[test]
    fn worked_scenario_totals() {
        // 2 x $50 at 10% tax plus 1 x $30 untaxed: 130 subtotal, 10 tax, 140 total
        let widget = Uuid::new_v4();
        let gadget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(50.00)), (gadget, "Gadget", dec!(30.00))]);

        let staged = stage_items(
            Role::Admin,
            true,
            None,
            &[
                item(widget, 2, dec!(50.00), Some(dec!(10.00))),
                item(gadget, 1, dec!(30.00), Some(dec!(0.00))),
            ],
            &products,
        )
        .unwrap();

        assert_eq!(staged.subtotal, dec!(130.00));
        assert_eq!(staged.tax_total, dec!(10.00));
        assert_eq!(staged.final_total, dec!(140.00));
        assert_eq!(staged.items[0].total_price, dec!(110.00));
        assert_eq!(staged.items[1].total_price, dec!(30.00));
    }

    #[test]
    fn invoice_level_tax_rate_is_the_fallback() {
        let widget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(100.00))]);

        // Item without its own rate inherits the invoice rate of 12%
        let staged = stage_items(
            Role::Admin,
            true,
            Some(dec!(12.00)),
            &[
                item(widget, 1, dec!(100.00), None),
                item(widget, 1, dec!(100.00), Some(dec!(5.00))),
            ],
            &products,
        )
        .unwrap();

        assert_eq!(staged.items[0].line_tax, dec!(12.00));
        assert_eq!(staged.items[1].line_tax, dec!(5.00));
        assert_eq!(staged.final_total, dec!(217.00));
    }

    #[test]
    fn missing_rate_everywhere_means_untaxed() {
        let widget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(40.00))]);

        let staged = stage_items(
            Role::Admin,
            true,
            None,
            &[item(widget, 3, dec!(40.00), None)],
            &products,
        )
        .unwrap();

        assert_eq!(staged.tax_total, dec!(0.00));
        assert_eq!(staged.final_total, dec!(120.00));
    }

    #[rstest]
    #[case(0)]
    #[case(-2)]
    fn non_positive_quantity_is_rejected(#[case] quantity: i32) {
        let widget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(10.00))]);

        let result = stage_items(
            Role::Admin,
            true,
            None,
            &[item(widget, quantity, dec!(10.00), None)],
            &products,
        );
        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn negative_unit_price_is_rejected() {
        let widget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(10.00))]);

        let result = stage_items(
            Role::Admin,
            true,
            None,
            &[item(widget, 1, dec!(-1.00), None)],
            &products,
        );
        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
    }

    #[rstest]
    #[case(Some(dec!(-5.00)), None)] // item-level rate
    #[case(None, Some(dec!(-12.00)))] // inherited invoice-level rate
    fn negative_tax_rate_is_rejected(
        #[case] item_rate: Option<Decimal>,
        #[case] invoice_rate: Option<Decimal>,
    ) {
        let widget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(10.00))]);

        // A negative rate would deflate the total below any configured minimum
        let result = stage_items(
            Role::Admin,
            true,
            invoice_rate,
            &[item(widget, 1, dec!(10.00), item_rate)],
            &products,
        );
        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn unknown_product_is_not_found() {
        let widget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(10.00))]);

        let result = stage_items(
            Role::Admin,
            true,
            None,
            &[item(Uuid::new_v4(), 1, dec!(10.00), None)],
            &products,
        );
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn reseller_discount_rejected_but_forced_to_catalog_when_disallowed() {
        let widget = Uuid::new_v4();
        let products = catalog(&[(widget, "Widget", dec!(50.00))]);
        let items = [item(widget, 1, dec!(40.00), None)];

        let rejected = stage_items(Role::Reseller, true, None, &items, &products);
        assert!(matches!(rejected, Err(ServiceError::BadRequest(_))));

        let forced = stage_items(Role::Reseller, false, None, &items, &products).unwrap();
        assert_eq!(forced.items[0].unit_price, dec!(50.00));
        assert_eq!(forced.final_total, dec!(50.00));
    }

    #[test]
    fn totals_identity_holds_across_mixed_rates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let products = catalog(&[(a, "A", dec!(19.99)), (b, "B", dec!(7.50))]);

        let staged = stage_items(
            Role::Admin,
            true,
            Some(dec!(21.00)),
            &[
                item(a, 3, dec!(19.99), None),
                item(b, 2, dec!(7.50), Some(dec!(10.00))),
            ],
            &products,
        )
        .unwrap();

        let line_total_sum: Decimal = staged.items.iter().map(|i| i.total_price).sum();
        assert_eq!(staged.final_total, line_total_sum);
        assert_eq!(staged.final_total, staged.subtotal + staged.tax_total);
    }
}
