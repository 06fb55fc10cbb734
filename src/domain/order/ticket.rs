use std::sync::Arc;

use super::value_objects::{DayKey, Ticket};
use crate::store::{OrderStore, StoreError};

/// Issues the next ticket number of a day: 1 for the first order, then +1.
///
/// Callers must hold the admission gate; the sequencer itself does not
/// serialise concurrent calls.
pub struct TicketSequencer {
    store: Arc<dyn OrderStore>,
}

impl TicketSequencer {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn next(&self, day: DayKey) -> Result<Ticket, StoreError> {
        let counter = self.store.get_or_create_day_counter(day).await?;

        let number = if counter.created {
            counter.value
        } else {
            self.store.increment_day_counter(day).await?
        };

        tracing::debug!(%day, ticket_number = number, "Ticket allocated");
        Ok(Ticket { day, number })
    }
}
