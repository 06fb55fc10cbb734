// ============================================================================
// Admission Gate
// ============================================================================
//
// Capacity-one lock taken by every order creation before a ticket number is
// drawn and held until the order row is persisted. Waiters are served in
// FIFO order (tokio's Mutex is fair). A wait ends early on timeout or when
// the caller's cancel future resolves; the gate itself is never bypassed.
//
// ============================================================================

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("admission gate not acquired within {0:?}")]
    TimedOut(Duration),

    #[error("admission wait cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub struct AdmissionGate {
    slot: Mutex<()>,
    timeout: Duration,
}

/// Proof of holding the gate. Released on drop.
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
    _slot: MutexGuard<'a, ()>,
    waited: Duration,
}

impl AdmissionPermit<'_> {
    /// Time spent queueing before the gate was granted.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl AdmissionGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn acquire(&self) -> Result<AdmissionPermit<'_>, AdmissionError> {
        self.acquire_or_cancel(std::future::pending()).await
    }

    /// Waits for the gate, giving up when `cancel` completes first.
    pub async fn acquire_or_cancel<C>(&self, cancel: C) -> Result<AdmissionPermit<'_>, AdmissionError>
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();

        tokio::select! {
            biased;

            _ = cancel => {
                tracing::debug!("Admission wait cancelled by caller");
                Err(AdmissionError::Cancelled)
            }
            acquired = tokio::time::timeout(self.timeout, self.slot.lock()) => match acquired {
                Ok(slot) => Ok(AdmissionPermit {
                    _slot: slot,
                    waited: started.elapsed(),
                }),
                Err(_) => {
                    tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Admission gate timed out");
                    Err(AdmissionError::TimedOut(self.timeout))
                }
            },
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
