//! Concurrency gate for connection attempts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Caps how many attempts run at once.
///
/// Waiters are admitted in no particular order. Clones share the same
/// capacity and counters.
#[derive(Debug, Clone)]
pub struct Gate {
    semaphore: Arc<Semaphore>,
    size: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gate {
    /// Create a gate admitting `size` holders at once (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Capacity of the gate.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for a slot. The slot is released when the permit is dropped.
    pub async fn enter(&self) -> Result<GatePermit, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(GatePermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Holders currently inside the gate.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Most holders ever inside the gate at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A slot in a [`Gate`].
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::task::JoinSet;

    #[test]
    fn test_zero_size_becomes_one() {
        assert_eq!(Gate::new(0).size(), 1);
    }

    #[tokio::test]
    async fn test_permit_release() {
        let gate = Gate::new(2);
        let a = gate.enter().await.unwrap();
        let _b = gate.enter().await.unwrap();
        assert_eq!(gate.in_flight(), 2);
        drop(a);
        assert_eq!(gate.in_flight(), 1);
        assert_eq!(gate.peak(), 2);
    }

    #[tokio::test]
    async fn test_peak_never_exceeds_size() {
        let gate = Gate::new(3);
        let mut tasks = JoinSet::new();
        for _ in 0..10 {
            let gate = gate.clone();
            tasks.spawn(async move {
                let _permit = gate.enter().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(gate.peak(), 3);
        assert_eq!(gate.in_flight(), 0);
    }
}
