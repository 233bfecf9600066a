use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 3;

/// Fixed-ceiling admission control over outstanding remote calls.
///
/// Admission is a synchronous yes/no: a caller that is refused never waits.
/// Clones share the same counter, so one gate can bound several sessions.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    in_flight: AtomicUsize,
    max: usize,
}

impl ConcurrencyGate {
    pub fn new(max: usize) -> Self {
        Self {
            inner: Arc::new(GateInner {
                in_flight: AtomicUsize::new(0),
                max: max.max(1),
            }),
        }
    }

    pub fn max(&self) -> usize {
        self.inner.max
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn is_saturated(&self) -> bool {
        self.in_flight() >= self.inner.max
    }

    /// Takes one slot, or returns false without touching the counter.
    pub fn try_acquire(&self) -> bool {
        let max = self.inner.max;
        self.inner
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max).then_some(current + 1)
            })
            .is_ok()
    }

    /// Gives one slot back. Never goes below zero.
    pub fn release(&self) {
        let _ = self
            .inner
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
    }

    /// Like [`try_acquire`](Self::try_acquire), but the slot is returned when
    /// the permit drops, whether the guarded work succeeded, failed or was
    /// abandoned.
    pub fn try_permit(&self) -> Option<GatePermit> {
        self.try_acquire().then(|| GatePermit { gate: self.clone() })
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

#[derive(Debug)]
pub struct GatePermit {
    gate: ConcurrencyGate,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
