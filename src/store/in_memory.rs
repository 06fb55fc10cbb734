use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{OrderStore, ProductCatalog, StoreError};
use crate::domain::order::{
    DayCounter, DayKey, NewOrder, OrderCreated, OrderId, OrderProductView, OrderStatus, OrderView,
    StampField, StatusChange, Ticket,
};
use crate::domain::product::{Product, ProductCategory, ProductForm, ProductId};

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// Process-local store used by tests and `ORDER_STORE=memory`. Every operation
// runs under one lock, so each call is atomic like a single-row SQL statement.
// Failure switches and an artificial latency let tests exercise error paths
// and interleavings.
//
// ============================================================================

#[derive(Default)]
struct OrderState {
    last_id: OrderId,
    orders: BTreeMap<OrderId, OrderView>,
    counters: HashMap<DayKey, i32>,
    issued: HashSet<Ticket>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    state: Mutex<OrderState>,
    catalog: Option<Arc<InMemoryProductCatalog>>,
    fail_counter_writes: AtomicBool,
    fail_order_writes: AtomicBool,
    latency_micros: AtomicU64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves product names and descriptions from `catalog` on reads.
    pub fn with_catalog(catalog: Arc<InMemoryProductCatalog>) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::default()
        }
    }

    pub fn fail_counter_writes(&self, fail: bool) {
        self.fail_counter_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay applied before every operation.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_micros
            .store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, OrderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        let micros = self.latency_micros.load(Ordering::SeqCst);
        if micros > 0 {
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("{what} rejected by in-memory store")))
        } else {
            Ok(())
        }
    }

    fn resolve(&self, mut order: OrderView) -> OrderView {
        if let Some(catalog) = &self.catalog {
            for line in &mut order.order_product {
                if let Some((name, description)) = catalog.describe(line.product_id) {
                    line.product_name = Some(name);
                    line.description = Some(description);
                }
            }
        }
        order
    }
}

fn stamp_slot(order: &mut OrderView, stamp: StampField) -> &mut Option<chrono::DateTime<Utc>> {
    match stamp {
        StampField::PreparingAt => &mut order.preparing_at,
        StampField::DoneAt => &mut order.done_at,
        StampField::DeliveredAt => &mut order.delivered_at,
        StampField::NotDeliveredAt => &mut order.not_delivered_at,
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(
        &self,
        order: &NewOrder,
        status: OrderStatus,
        ticket: Ticket,
    ) -> Result<OrderCreated, StoreError> {
        self.pause().await;
        Self::check(&self.fail_order_writes, "order insert")?;

        let mut state = self.state();
        if !state.issued.insert(ticket) {
            return Err(StoreError::Conflict(format!(
                "ticket {} already issued on {}",
                ticket.number, ticket.day
            )));
        }

        state.last_id += 1;
        let created = OrderCreated {
            id: state.last_id,
            created_at: Utc::now(),
            ticket_number: ticket.number,
        };
        let view = OrderView {
            order_id: created.id,
            order_date: created.created_at,
            ticket_number: ticket.number,
            order_status: status,
            preparing_at: None,
            done_at: None,
            delivered_at: None,
            not_delivered_at: None,
            total_price: order.total_price,
            payment_id: order.payment_id.clone(),
            national_id: order.national_id.clone(),
            order_product: order
                .order_product
                .iter()
                .map(|line| OrderProductView {
                    product_id: line.product_id,
                    product_name: None,
                    description: None,
                })
                .collect(),
            customer_name: None,
        };
        state.orders.insert(created.id, view);
        drop(state);

        if let Some(catalog) = &self.catalog {
            catalog.retain(order.order_product.iter().map(|line| line.product_id));
        }
        Ok(created)
    }

    async fn update_status(&self, order_id: OrderId, change: StatusChange) -> Result<bool, StoreError> {
        self.pause().await;
        Self::check(&self.fail_order_writes, "status update")?;

        let mut state = self.state();
        let Some(order) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if order.order_status != change.from || stamp_slot(order, change.stamp).is_some() {
            return Ok(false);
        }
        order.order_status = change.to;
        *stamp_slot(order, change.stamp) = Some(change.at);
        Ok(true)
    }

    async fn confirm_payment(&self, order_id: OrderId, payment_id: &str) -> Result<bool, StoreError> {
        self.pause().await;
        Self::check(&self.fail_order_writes, "payment update")?;

        let mut state = self.state();
        match state.orders.get_mut(&order_id) {
            Some(order) if order.order_status == OrderStatus::Paying => {
                order.order_status = OrderStatus::Created;
                order.payment_id = Some(payment_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<OrderView>, StoreError> {
        self.pause().await;
        let found = self.state().orders.get(&order_id).cloned();
        Ok(found.map(|order| self.resolve(order)))
    }

    async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderView>, StoreError> {
        self.pause().await;
        let matching: Vec<OrderView> = self
            .state()
            .orders
            .values()
            .filter(|o| statuses.contains(&o.order_status))
            .cloned()
            .collect();
        Ok(matching.into_iter().map(|o| self.resolve(o)).collect())
    }

    async fn get_or_create_day_counter(&self, day: DayKey) -> Result<DayCounter, StoreError> {
        self.pause().await;
        Self::check(&self.fail_counter_writes, "counter read")?;

        let mut state = self.state();
        match state.counters.get(&day).copied() {
            Some(value) => Ok(DayCounter {
                value,
                created: false,
            }),
            None => {
                state.counters.insert(day, 1);
                Ok(DayCounter {
                    value: 1,
                    created: true,
                })
            }
        }
    }

    async fn increment_day_counter(&self, day: DayKey) -> Result<i32, StoreError> {
        self.pause().await;
        Self::check(&self.fail_counter_writes, "counter increment")?;

        let mut state = self.state();
        let value = state
            .counters
            .get_mut(&day)
            .ok_or_else(|| StoreError::Corrupt(format!("no ticket counter for {day}")))?;
        *value += 1;
        Ok(*value)
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool, StoreError> {
        self.pause().await;
        Self::check(&self.fail_order_writes, "order delete")?;

        let removed = self.state().orders.remove(&order_id);
        if let (Some(order), Some(catalog)) = (&removed, &self.catalog) {
            catalog.release(order.order_product.iter().map(|line| line.product_id));
        }
        Ok(removed.is_some())
    }
}

// ============================================================================
// In-Memory Product Catalog
// ============================================================================

#[derive(Default)]
struct CatalogState {
    last_id: ProductId,
    products: BTreeMap<ProductId, ProductForm>,
    /// Live orders referencing each product; a referenced product cannot be deleted.
    referenced: HashMap<ProductId, usize>,
}

#[derive(Default)]
pub struct InMemoryProductCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retain(&self, ids: impl IntoIterator<Item = ProductId>) {
        let mut state = self.state();
        for id in ids {
            *state.referenced.entry(id).or_default() += 1;
        }
    }

    fn release(&self, ids: impl IntoIterator<Item = ProductId>) {
        let mut state = self.state();
        for id in ids {
            if let Some(count) = state.referenced.get_mut(&id) {
                *count -= 1;
                if *count == 0 {
                    state.referenced.remove(&id);
                }
            }
        }
    }

    fn describe(&self, id: ProductId) -> Option<(String, String)> {
        self.state()
            .products
            .get(&id)
            .map(|form| (form.name.clone(), form.description.clone()))
    }

    fn build(products: &BTreeMap<ProductId, ProductForm>, id: ProductId, form: &ProductForm) -> Product {
        let combo_products = (form.category == ProductCategory::Combo).then(|| {
            form.combo_member_ids()
                .iter()
                .filter_map(|member_id| {
                    products.get(member_id).map(|member| Product {
                        id: *member_id,
                        name: member.name.clone(),
                        description: member.description.clone(),
                        category: member.category,
                        price: member.price,
                        images: member.images.clone(),
                        combo_products: None,
                    })
                })
                .collect()
        });

        Product {
            id,
            name: form.name.clone(),
            description: form.description.clone(),
            category: form.category,
            price: form.price,
            images: form.images.clone(),
            combo_products,
        }
    }

    fn missing_members(state: &CatalogState, form: &ProductForm) -> Result<(), StoreError> {
        match form
            .combo_member_ids()
            .iter()
            .find(|id| !state.products.contains_key(*id))
        {
            Some(id) => Err(StoreError::Conflict(format!("combo member {id} does not exist"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_missing(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, StoreError> {
        let state = self.state();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| !state.products.contains_key(id))
            .collect())
    }

    async fn create_product(&self, form: &ProductForm) -> Result<ProductId, StoreError> {
        let mut state = self.state();
        Self::missing_members(&state, form)?;
        state.last_id += 1;
        let id = state.last_id;
        state.products.insert(id, form.clone());
        Ok(id)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.state();
        Ok(state
            .products
            .get(&id)
            .map(|form| Self::build(&state.products, id, form)))
    }

    async fn list_by_category(&self, category: ProductCategory) -> Result<Vec<Product>, StoreError> {
        let state = self.state();
        Ok(state
            .products
            .iter()
            .filter(|(_, form)| form.category == category)
            .map(|(id, form)| Self::build(&state.products, *id, form))
            .collect())
    }

    async fn update_product(&self, id: ProductId, form: &ProductForm) -> Result<bool, StoreError> {
        let mut state = self.state();
        Self::missing_members(&state, form)?;
        match state.products.get_mut(&id) {
            Some(existing) => {
                *existing = form.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let mut state = self.state();
        if state.referenced.contains_key(&id) {
            return Err(StoreError::Conflict(format!(
                "product {id} is referenced by an existing order"
            )));
        }
        Ok(state.products.remove(&id).is_some())
    }
}
