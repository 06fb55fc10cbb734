// Test doubles shared across module tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::clock::Clock;
use crate::domain::customer::{Customer, CustomerDirectory, CustomerLookupError};
use crate::domain::order::{DayKey, NewOrder, OrderId, OrderStatus, Ticket};
use crate::store::{InMemoryOrderStore, OrderStore};

pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct StubDirectory {
    names: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    latency_millis: AtomicU64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, national_id: &str, name: &str) {
        self.names
            .lock()
            .unwrap()
            .insert(national_id.to_string(), name.to_string());
    }

    pub fn fail_for(&self, national_id: &str) {
        self.failing.lock().unwrap().insert(national_id.to_string());
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_millis
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most lookups observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerDirectory for StubDirectory {
    async fn lookup_by_national_id(&self, national_id: &str) -> Result<Customer, CustomerLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let millis = self.latency_millis.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(national_id) {
            return Err(CustomerLookupError::Status(503));
        }
        let name = self.names.lock().unwrap().get(national_id).cloned();
        name.map(|name| Customer {
            id: None,
            name,
            cpf: Some(national_id.to_string()),
            email: None,
        })
        .ok_or(CustomerLookupError::NotFound)
    }
}

/// Inserts an order directly in `status`, bypassing the lifecycle service.
pub async fn seed_order(store: &Arc<InMemoryOrderStore>, order: &NewOrder, status: OrderStatus) -> OrderId {
    let day = DayKey::from_datetime(&Local::now());
    let counter = store.get_or_create_day_counter(day).await.unwrap();
    let number = if counter.created {
        counter.value
    } else {
        store.increment_day_counter(day).await.unwrap()
    };
    store
        .create_order(order, status, Ticket { day, number })
        .await
        .unwrap()
        .id
}
