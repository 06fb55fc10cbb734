use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use super::errors::OrderError;
use super::guards::{GuardKind, OrderStatusGuard};
use super::sorting::sort_for_display;
use super::ticket::TicketSequencer;
use super::value_objects::{DayKey, InitialStatus, NewOrder, OrderId, OrderStatus, Transition};
use super::view::OrderView;
use crate::admission::AdmissionGate;
use crate::clock::{Clock, SystemClock};
use crate::domain::customer::{CustomerDirectory, NationalId};
use crate::metrics::Metrics;
use crate::store::{OrderStore, ProductCatalog};

/// Customer directory requests in flight for one listing.
const MAX_CONCURRENT_LOOKUPS: usize = 8;

// ============================================================================
// Order Lifecycle Service
// ============================================================================
//
// Creation:   validate lines -> admission gate -> ticket -> persist -> release
//             -> best-effort customer name
// Transition: guard (read) -> compare-and-set status + timestamp
// Listing:    store (creation order) -> stable display sort -> enrichment
//
// ============================================================================

pub struct OrderLifecycleService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    customers: Arc<dyn CustomerDirectory>,
    sequencer: TicketSequencer,
    gate: AdmissionGate,
    to_preparing: OrderStatusGuard,
    to_done: OrderStatusGuard,
    to_delivered_or_not: OrderStatusGuard,
    to_paid: OrderStatusGuard,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
}

impl OrderLifecycleService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        customers: Arc<dyn CustomerDirectory>,
        admission_timeout: Duration,
    ) -> Self {
        Self {
            sequencer: TicketSequencer::new(store.clone()),
            gate: AdmissionGate::new(admission_timeout),
            to_preparing: OrderStatusGuard::new(GuardKind::ToPreparing, store.clone()),
            to_done: OrderStatusGuard::new(GuardKind::ToDone, store.clone()),
            to_delivered_or_not: OrderStatusGuard::new(GuardKind::ToDeliveredOrNot, store.clone()),
            to_paid: OrderStatusGuard::new(GuardKind::ToPaid, store.clone()),
            store,
            catalog,
            customers,
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Creates an order in `Created`.
    pub async fn create_order(&self, order: NewOrder) -> Result<OrderView, OrderError> {
        self.create_order_with_cancel(order, InitialStatus::Direct, std::future::pending())
            .await
    }

    /// Creates an order in `Paying`, to be confirmed by `confirm_payment`.
    pub async fn create_paying_order(&self, order: NewOrder) -> Result<OrderView, OrderError> {
        self.create_order_with_cancel(order, InitialStatus::Paying, std::future::pending())
            .await
    }

    /// Creation with a caller-supplied cancel signal, honoured while queueing
    /// for the admission gate. Once the gate is held the creation completes.
    pub async fn create_order_with_cancel<C>(
        &self,
        order: NewOrder,
        initial: InitialStatus,
        cancel: C,
    ) -> Result<OrderView, OrderError>
    where
        C: Future<Output = ()> + Send,
    {
        let request_id = Uuid::new_v4();
        let status = initial.status();

        if let Err(e) = self.validate_lines(&order).await {
            tracing::info!(%request_id, error = %e, "Order rejected");
            self.on_metrics(|m| m.record_creation_failure("invalid"));
            return Err(e);
        }

        let permit = match self.gate.acquire_or_cancel(cancel).await {
            Ok(permit) => permit,
            Err(e) => {
                let err = OrderError::from(e);
                let reason = match &err {
                    OrderError::AdmissionCancelled => "cancelled",
                    _ => "timeout",
                };
                tracing::warn!(%request_id, error = %err, "Order not admitted");
                self.on_metrics(|m| m.record_admission_rejected(reason));
                return Err(err);
            }
        };
        self.on_metrics(|m| m.observe_admission_wait(permit.waited()));

        let day = DayKey::from_datetime(&self.clock.now());
        let ticket = match self.sequencer.next(day).await {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::error!(%request_id, %day, error = %e, "Ticket allocation failed");
                self.on_metrics(|m| m.record_creation_failure("ticket"));
                return Err(OrderError::TicketAllocation(e));
            }
        };
        self.on_metrics(|m| m.record_ticket(ticket.number));

        let persisted = self.store.create_order(&order, status, ticket).await;
        drop(permit);

        let created = match persisted {
            Ok(created) => created,
            Err(e) => {
                // The ticket stays consumed.
                tracing::error!(
                    %request_id,
                    ticket_number = ticket.number,
                    error = %e,
                    "Order persistence failed, ticket burned"
                );
                self.on_metrics(|m| m.record_creation_failure("store"));
                return Err(OrderError::Store(e));
            }
        };

        tracing::info!(
            %request_id,
            order_id = created.id,
            ticket_number = created.ticket_number,
            status = %status,
            item_count = order.order_product.len(),
            "✅ Order created"
        );
        self.on_metrics(|m| m.record_order_created(status));

        let mut view = OrderView::admitted(created, &order, status);
        self.enrich(&mut view).await;
        Ok(view)
    }

    async fn validate_lines(&self, order: &NewOrder) -> Result<(), OrderError> {
        if order.order_product.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        let missing = self.catalog.find_missing(&order.product_ids()).await?;
        if !missing.is_empty() {
            return Err(OrderError::UnknownProducts(missing));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    pub async fn advance_to_preparing(&self, order_id: OrderId) -> Result<(), OrderError> {
        self.advance(order_id, Transition::StartPreparing, &self.to_preparing)
            .await
    }

    pub async fn advance_to_done(&self, order_id: OrderId) -> Result<(), OrderError> {
        self.advance(order_id, Transition::Finish, &self.to_done).await
    }

    pub async fn advance_to_delivered(&self, order_id: OrderId) -> Result<(), OrderError> {
        self.advance(order_id, Transition::Deliver, &self.to_delivered_or_not)
            .await
    }

    pub async fn advance_to_not_delivered(&self, order_id: OrderId) -> Result<(), OrderError> {
        self.advance(order_id, Transition::MarkNotDelivered, &self.to_delivered_or_not)
            .await
    }

    async fn advance(
        &self,
        order_id: OrderId,
        transition: Transition,
        guard: &OrderStatusGuard,
    ) -> Result<(), OrderError> {
        debug_assert_eq!(guard.required(), transition.required());
        let target = transition.target();

        if let Err(e) = guard.validate(order_id).await {
            tracing::info!(order_id, guard = %guard.kind(), error = %e, "Transition rejected");
            self.on_metrics(|m| m.record_transition(target, "rejected"));
            return Err(e);
        }

        let change = transition.change_at(self.clock.now().with_timezone(&Utc));
        if !self.store.update_status(order_id, change).await? {
            let err = self.lost_race(order_id, transition.required()).await?;
            tracing::info!(order_id, error = %err, "Transition lost to a concurrent update");
            self.on_metrics(|m| m.record_transition(target, "rejected"));
            return Err(err);
        }

        tracing::info!(order_id, from = %change.from, to = %target, "Order status changed");
        self.on_metrics(|m| m.record_transition(target, "applied"));
        Ok(())
    }

    /// Error to report after a compare-and-set matched no row.
    async fn lost_race(&self, order_id: OrderId, required: OrderStatus) -> Result<OrderError, OrderError> {
        Ok(match self.store.get_by_id(order_id).await? {
            None => OrderError::NotFound { order_id },
            Some(order) => OrderError::PreconditionFailed {
                order_id,
                required,
                actual: order.order_status,
            },
        })
    }

    /// Records the payment reference of a `Paying` order and releases it to
    /// the kitchen queue (`Created`).
    pub async fn confirm_payment(&self, order_id: OrderId, payment_id: &str) -> Result<(), OrderError> {
        if let Err(e) = self.to_paid.validate(order_id).await {
            tracing::info!(order_id, guard = %self.to_paid.kind(), error = %e, "Payment confirmation rejected");
            self.on_metrics(|m| m.record_transition(OrderStatus::Created, "rejected"));
            return Err(e);
        }

        if !self.store.confirm_payment(order_id, payment_id).await? {
            let err = self.lost_race(order_id, OrderStatus::Paying).await?;
            self.on_metrics(|m| m.record_transition(OrderStatus::Created, "rejected"));
            return Err(err);
        }

        tracing::info!(order_id, payment_id, "Payment confirmed");
        self.on_metrics(|m| m.record_transition(OrderStatus::Created, "applied"));
        Ok(())
    }

    /// Administrative delete of an order and its line items.
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), OrderError> {
        if !self.store.delete_order(order_id).await? {
            return Err(OrderError::NotFound { order_id });
        }
        tracing::info!(order_id, "Order deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    pub async fn get_order_by_id(&self, order_id: OrderId) -> Result<OrderView, OrderError> {
        let mut order = self
            .store
            .get_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound { order_id })?;

        tracing::debug!(order_id, status = %order.order_status, "Order loaded");
        self.enrich(&mut order).await;
        Ok(order)
    }

    /// Orders waiting for the kitchen.
    pub async fn get_orders_to_prepare(&self) -> Result<Vec<OrderView>, OrderError> {
        self.list(&[OrderStatus::Created]).await
    }

    /// Orders a customer-facing board should show.
    pub async fn get_orders_to_follow(&self) -> Result<Vec<OrderView>, OrderError> {
        self.list(&[OrderStatus::Created, OrderStatus::Preparing, OrderStatus::Done])
            .await
    }

    pub async fn get_orders_waiting_payment(&self) -> Result<Vec<OrderView>, OrderError> {
        self.list(&[OrderStatus::Paying]).await
    }

    async fn list(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderView>, OrderError> {
        let mut orders = self.store.list_by_status(statuses).await?;
        sort_for_display(&mut orders);

        let national_ids: HashSet<String> = orders
            .iter()
            .filter_map(|order| order.national_id.clone())
            .collect();
        let lookups = national_ids.len();

        let names: HashMap<String, String> = stream::iter(national_ids)
            .map(|national_id| async move {
                let name = self.customer_name(&national_id).await;
                name.map(|name| (national_id, name))
            })
            .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
            .filter_map(future::ready)
            .collect()
            .await;

        for order in &mut orders {
            if let Some(national_id) = &order.national_id {
                order.customer_name = names.get(national_id).cloned();
            }
        }

        tracing::debug!(count = orders.len(), lookups, ?statuses, "Orders listed");
        Ok(orders)
    }

    /// Fills `customer_name` when the order carries a national ID.
    async fn enrich(&self, order: &mut OrderView) {
        if let Some(national_id) = &order.national_id {
            order.customer_name = self.customer_name(national_id).await;
        }
    }

    /// Lookup failures are logged and yield `None`.
    async fn customer_name(&self, national_id: &str) -> Option<String> {
        match self.customers.lookup_by_national_id(national_id).await {
            Ok(customer) => Some(customer.name),
            Err(e) => {
                tracing::warn!(
                    national_id = %NationalId(national_id),
                    error = %e,
                    "Customer lookup failed, returning orders without customer name"
                );
                self.on_metrics(|m| m.record_customer_lookup_failure());
                None
            }
        }
    }

    fn on_metrics(&self, f: impl FnOnce(&Metrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{ProductCategory, ProductForm};
    use crate::store::{InMemoryOrderStore, InMemoryProductCatalog, StoreError};
    use crate::testing::{seed_order, FixedClock, StubDirectory};
    use chrono::{Local, TimeZone};

    struct Fixture {
        service: Arc<OrderLifecycleService>,
        store: Arc<InMemoryOrderStore>,
        directory: Arc<StubDirectory>,
        clock: Arc<FixedClock>,
        burger: i64,
        soda: i64,
    }

    async fn fixture_with_timeout(timeout: Duration) -> Fixture {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let burger = catalog
            .create_product(&ProductForm::new("X-Burger", "Beef", ProductCategory::Lanche, 20.0))
            .await
            .unwrap();
        let soda = catalog
            .create_product(&ProductForm::new("Soda", "350ml", ProductCategory::Bebida, 6.0))
            .await
            .unwrap();

        let store = Arc::new(InMemoryOrderStore::with_catalog(catalog.clone()));
        let directory = Arc::new(StubDirectory::new());
        let clock = Arc::new(FixedClock::new(
            Local.with_ymd_and_hms(2024, 6, 10, 11, 0, 0).unwrap(),
        ));

        let service = OrderLifecycleService::new(store.clone(), catalog, directory.clone(), timeout)
            .with_clock(clock.clone())
            .with_metrics(Arc::new(Metrics::new().unwrap()));

        Fixture {
            service: Arc::new(service),
            store,
            directory,
            clock,
            burger,
            soda,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_timeout(Duration::from_secs(5)).await
    }

    #[tokio::test]
    async fn test_scenario_two_orders_and_guarded_transitions() {
        let f = fixture().await;

        let a = f.service.create_order(NewOrder::new(26.0, [f.burger, f.soda])).await.unwrap();
        let b = f.service.create_order(NewOrder::new(20.0, [f.burger])).await.unwrap();
        assert_eq!(a.ticket_number, 1);
        assert_eq!(b.ticket_number, 2);
        assert_eq!(a.order_status, OrderStatus::Created);

        f.service.advance_to_preparing(a.order_id).await.unwrap();
        let a_now = f.service.get_order_by_id(a.order_id).await.unwrap();
        assert_eq!(a_now.order_status, OrderStatus::Preparing);
        assert!(a_now.preparing_at.is_some());

        let again = f.service.advance_to_preparing(a.order_id).await.unwrap_err();
        assert!(matches!(
            again,
            OrderError::PreconditionFailed {
                required: OrderStatus::Created,
                actual: OrderStatus::Preparing,
                ..
            }
        ));
        let a_after = f.service.get_order_by_id(a.order_id).await.unwrap();
        assert_eq!(a_after.preparing_at, a_now.preparing_at);

        let skip = f.service.advance_to_done(b.order_id).await.unwrap_err();
        assert!(matches!(
            skip,
            OrderError::PreconditionFailed {
                required: OrderStatus::Preparing,
                actual: OrderStatus::Created,
                ..
            }
        ));
        let b_now = f.service.get_order_by_id(b.order_id).await.unwrap();
        assert_eq!(b_now.order_status, OrderStatus::Created);
        assert!(b_now.done_at.is_none());
    }

    #[tokio::test]
    async fn test_full_lifecycle_stamps_each_step() {
        let f = fixture().await;
        let id = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap().order_id;

        f.service.advance_to_preparing(id).await.unwrap();
        f.service.advance_to_done(id).await.unwrap();
        f.service.advance_to_delivered(id).await.unwrap();

        let order = f.service.get_order_by_id(id).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::Delivered);
        assert!(order.preparing_at.is_some());
        assert!(order.done_at.is_some());
        assert!(order.delivered_at.is_some());
        assert!(order.not_delivered_at.is_none());
        assert_eq!(order.order_product[0].product_name.as_deref(), Some("Soda"));
    }

    #[tokio::test]
    async fn test_delivered_and_not_delivered_are_exclusive() {
        let f = fixture().await;
        let id = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap().order_id;
        f.service.advance_to_preparing(id).await.unwrap();
        f.service.advance_to_done(id).await.unwrap();

        let (delivered, not_delivered) = tokio::join!(
            f.service.advance_to_delivered(id),
            f.service.advance_to_not_delivered(id)
        );
        assert!(delivered.is_ok() ^ not_delivered.is_ok());

        let order = f.service.get_order_by_id(id).await.unwrap();
        assert!(order.delivered_at.is_some() ^ order.not_delivered_at.is_some());
        assert!(order.order_status.is_terminal());

        assert!(f.service.advance_to_delivered(id).await.is_err());
        assert!(f.service.advance_to_not_delivered(id).await.is_err());
    }

    #[tokio::test]
    async fn test_transition_on_missing_order() {
        let f = fixture().await;
        assert!(matches!(
            f.service.advance_to_done(999).await,
            Err(OrderError::NotFound { order_id: 999 })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creations_get_distinct_tickets() {
        let f = fixture().await;
        f.store.set_latency(Duration::from_millis(1));

        let mut handles = Vec::new();
        for _ in 0..25 {
            let service = f.service.clone();
            let burger = f.burger;
            handles.push(tokio::spawn(async move {
                service.create_order(NewOrder::new(20.0, [burger])).await
            }));
        }

        let mut tickets = Vec::new();
        for handle in handles {
            tickets.push(handle.await.unwrap().unwrap().ticket_number);
        }
        tickets.sort_unstable();
        assert_eq!(tickets, (1..=25).collect::<Vec<i32>>());
    }

    #[tokio::test]
    async fn test_new_day_restarts_tickets() {
        let f = fixture().await;
        f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap();
        f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap();

        f.clock.advance(chrono::Duration::days(1));
        let next = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap();
        assert_eq!(next.ticket_number, 1);
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let f = fixture().await;

        assert!(matches!(
            f.service.create_order(NewOrder::new(0.0, [])).await,
            Err(OrderError::EmptyOrder)
        ));
        match f.service.create_order(NewOrder::new(1.0, [f.soda, 77, 78])).await {
            Err(OrderError::UnknownProducts(ids)) => assert_eq!(ids, vec![77, 78]),
            other => panic!("unexpected {other:?}"),
        }

        // Rejected requests do not consume tickets.
        let ok = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap();
        assert_eq!(ok.ticket_number, 1);
    }

    #[tokio::test]
    async fn test_counter_failure_is_an_error_not_a_sentinel() {
        let f = fixture().await;
        f.store.fail_counter_writes(true);

        let err = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap_err();
        assert!(matches!(err, OrderError::TicketAllocation(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert!(f.store.list_by_status(&OrderStatus::ALL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_burns_ticket() {
        let f = fixture().await;
        f.store.fail_order_writes(true);
        let err = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap_err();
        assert!(matches!(err, OrderError::Store(_)));

        f.store.fail_order_writes(false);
        let next = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap();
        assert_eq!(next.ticket_number, 2);
    }

    #[tokio::test]
    async fn test_admission_timeout_while_gate_held() {
        let f = fixture_with_timeout(Duration::from_millis(25)).await;
        let _held = f.service.gate.acquire().await.unwrap();

        let err = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap_err();
        assert!(matches!(err, OrderError::AdmissionTimeout(_)));
        assert!(err.is_retryable());
        assert!(f.store.list_by_status(&OrderStatus::ALL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_while_waiting() {
        let f = fixture().await;
        let _held = f.service.gate.acquire().await.unwrap();

        let err = f
            .service
            .create_order_with_cancel(
                NewOrder::new(6.0, [f.soda]),
                InitialStatus::Direct,
                tokio::time::sleep(Duration::from_millis(10)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::AdmissionCancelled));
    }

    #[tokio::test]
    async fn test_paying_order_and_payment_confirmation() {
        let f = fixture().await;
        let order = f
            .service
            .create_paying_order(NewOrder::new(20.0, [f.burger]))
            .await
            .unwrap();
        assert_eq!(order.order_status, OrderStatus::Paying);
        assert_eq!(f.service.get_orders_waiting_payment().await.unwrap().len(), 1);
        assert!(f.service.get_orders_to_prepare().await.unwrap().is_empty());

        let early = f.service.advance_to_preparing(order.order_id).await.unwrap_err();
        assert!(matches!(early, OrderError::PreconditionFailed { .. }));

        f.service.confirm_payment(order.order_id, "pay-123").await.unwrap();
        let confirmed = f.service.get_order_by_id(order.order_id).await.unwrap();
        assert_eq!(confirmed.order_status, OrderStatus::Created);
        assert_eq!(confirmed.payment_id.as_deref(), Some("pay-123"));

        let twice = f.service.confirm_payment(order.order_id, "pay-456").await.unwrap_err();
        assert!(matches!(
            twice,
            OrderError::PreconditionFailed {
                required: OrderStatus::Paying,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_order() {
        let f = fixture().await;
        let id = f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap().order_id;

        f.service.delete_order(id).await.unwrap();
        assert!(matches!(
            f.service.get_order_by_id(id).await,
            Err(OrderError::NotFound { .. })
        ));
        assert!(matches!(
            f.service.delete_order(id).await,
            Err(OrderError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_orders_to_follow_sorted_by_display_priority() {
        let f = fixture().await;
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(f.service.create_order(NewOrder::new(6.0, [f.soda])).await.unwrap().order_id);
        }
        // ids[0]: Done, ids[1]: Created, ids[2]: Preparing, ids[3]: Done
        for id in [ids[0], ids[2], ids[3]] {
            f.service.advance_to_preparing(id).await.unwrap();
        }
        f.service.advance_to_done(ids[0]).await.unwrap();
        f.service.advance_to_done(ids[3]).await.unwrap();

        let listed: Vec<OrderId> = f
            .service
            .get_orders_to_follow()
            .await
            .unwrap()
            .iter()
            .map(|o| o.order_id)
            .collect();
        assert_eq!(listed, vec![ids[0], ids[3], ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn test_customer_enrichment_is_best_effort() {
        let f = fixture().await;
        f.directory.insert("11111111111", "Ana");
        f.directory.fail_for("22222222222");

        let known = f
            .service
            .create_order(NewOrder::new(6.0, [f.soda]).with_national_id("11111111111"))
            .await
            .unwrap();
        assert_eq!(known.customer_name.as_deref(), Some("Ana"));

        let failing = f
            .service
            .create_order(NewOrder::new(6.0, [f.soda]).with_national_id("22222222222"))
            .await
            .unwrap();
        assert_eq!(failing.customer_name, None);

        let unknown = f
            .service
            .create_order(NewOrder::new(6.0, [f.soda]).with_national_id("33333333333"))
            .await
            .unwrap();
        assert_eq!(unknown.customer_name, None);

        let fetched = f.service.get_order_by_id(failing.order_id).await.unwrap();
        assert_eq!(fetched.customer_name, None);

        let listed = f.service.get_orders_to_prepare().await.unwrap();
        assert_eq!(listed.len(), 3);
        let names: Vec<Option<&str>> = listed.iter().map(|o| o.customer_name.as_deref()).collect();
        assert_eq!(names, vec![Some("Ana"), None, None]);
    }

    #[tokio::test]
    async fn test_listing_looks_up_each_customer_once_with_bounded_concurrency() {
        let f = fixture().await;
        f.directory.set_latency(Duration::from_millis(10));

        for i in 0..30 {
            let national_id = format!("{:011}", i % 20);
            f.directory.insert(&national_id, &format!("Customer {}", i % 20));
            seed_order(
                &f.store,
                &NewOrder::new(6.0, [f.soda]).with_national_id(national_id),
                OrderStatus::Created,
            )
            .await;
        }

        let listed = f.service.get_orders_to_prepare().await.unwrap();

        assert_eq!(listed.len(), 30);
        assert_eq!(f.directory.calls(), 20);
        assert!(f.directory.peak_in_flight() > 1);
        assert!(f.directory.peak_in_flight() <= MAX_CONCURRENT_LOOKUPS);
        for order in &listed {
            let suffix = order.national_id.as_deref().unwrap().parse::<u32>().unwrap();
            assert_eq!(
                order.customer_name.as_deref(),
                Some(format!("Customer {suffix}").as_str())
            );
        }
    }
}
