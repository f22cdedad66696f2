// crates.io
use tokio::sync::oneshot::{self, Receiver, Sender};
// self
use crate::error::RenewalError;

/// Outcome delivered to every waiter of a renewal flight.
pub(crate) type Settlement = Result<(), RenewalError>;

/// A request suspended until the in-flight renewal settles.
#[derive(Debug)]
pub(crate) struct PendingRequest {
	pub(crate) id: u64,
	pub(crate) description: String,
	completion: Sender<Settlement>,
}

/// Ordered arena of pending requests, indexed by insertion order.
#[derive(Debug, Default)]
pub(crate) struct WaiterQueue {
	entries: Vec<PendingRequest>,
	next_id: u64,
}
impl WaiterQueue {
	pub(crate) fn push(&mut self, description: String) -> (u64, Receiver<Settlement>) {
		let (completion, receiver) = oneshot::channel();
		let id = self.next_id;

		self.next_id += 1;
		self.entries.push(PendingRequest { id, description, completion });

		(id, receiver)
	}

	pub(crate) fn remove(&mut self, id: u64) -> Option<PendingRequest> {
		let index = self.entries.iter().position(|entry| entry.id == id)?;

		Some(self.entries.remove(index))
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	/// Settles and removes every entry in insertion order.
	///
	/// Returns how many waiters were still listening; entries whose caller already went away are
	/// dropped without effect.
	pub(crate) fn settle_all(&mut self, settlement: &Settlement) -> usize {
		self.entries
			.drain(..)
			.filter(|entry| !entry.completion.is_closed())
			.map(|entry| entry.completion.send(settlement.clone()))
			.filter(Result::is_ok)
			.count()
	}
}
