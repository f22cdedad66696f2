// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing renewal flights and the requests waiting on them.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	released: AtomicU64,
	rejected: AtomicU64,
	cancelled: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of renewal calls started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that produced a credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that failed or timed out.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of waiters released for replay.
	pub fn released(&self) -> u64 {
		self.released.load(Ordering::Relaxed)
	}

	/// Returns the number of waiters rejected by a failed renewal.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Returns the number of waiters cancelled by their callers.
	pub fn cancelled(&self) -> u64 {
		self.cancelled.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_released(&self, count: usize) {
		self.released.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self, count: usize) {
		self.rejected.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub(crate) fn record_cancelled(&self) {
		self.cancelled.fetch_add(1, Ordering::Relaxed);
	}
}
