//! Single-flight credential renewal with suspended-request queueing.
//!
//! The [`RefreshCoordinator`] is an explicit two-state machine (`Idle`, `Renewing`). The first
//! authorization failure observed while idle enqueues its request and spawns exactly one renewal
//! flight; failures arriving while renewing only enqueue. When the flight settles, the new
//! credential (or its absence) is committed to the [`CredentialHolder`] first, then every queued
//! request is released for replay or rejected with the renewal error, all before the machine
//! returns to `Idle`.
//!
//! The flight runs on its own Tokio task so a caller that gives up on its request never cancels
//! the renewal the other waiters depend on. Outside a Tokio runtime no flight can start, and the
//! failure that would have started one is settled as [`RenewalError::Abandoned`].

mod metrics;
mod queue;

pub use metrics::RenewalMetrics;

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	runtime::Handle,
	sync::oneshot::{self, Receiver},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, CredentialHolder},
	error::RenewalError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	renewal::CredentialRenewer,
};
use queue::{Settlement, WaiterQueue};

/// Callback invoked once for every failed renewal.
pub type LogoutHook = Arc<dyn Fn(&RenewalError) + Send + Sync>;

/// Renewal state machine phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalPhase {
	/// No renewal in flight.
	Idle,
	/// A renewal call is in flight; authorization failures are queued.
	Renewing,
}

/// How the coordinator handled a rejected request.
pub(crate) enum Admission {
	/// The credential already changed since the request was sent; replay right away.
	Replay,
	/// The session ended since the request was sent.
	Reject(RenewalError),
	/// Suspended until the in-flight renewal settles.
	Wait(Waiter),
}

struct RenewalState {
	phase: RenewalPhase,
	waiters: WaiterQueue,
}

/// Owns the renewal flag and waiter queue and is the only writer of the credential holder during
/// renewal.
pub struct RefreshCoordinator {
	holder: Arc<CredentialHolder>,
	renewer: Arc<dyn CredentialRenewer>,
	renewal_timeout: StdDuration,
	state: Mutex<RenewalState>,
	metrics: RenewalMetrics,
	on_logout: RwLock<Option<LogoutHook>>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator renewing through `renewer` into `holder`.
	pub fn new(
		holder: Arc<CredentialHolder>,
		renewer: Arc<dyn CredentialRenewer>,
		renewal_timeout: StdDuration,
	) -> Self {
		Self {
			holder,
			renewer,
			renewal_timeout,
			state: Mutex::new(RenewalState {
				phase: RenewalPhase::Idle,
				waiters: WaiterQueue::default(),
			}),
			metrics: RenewalMetrics::default(),
			on_logout: RwLock::new(None),
		}
	}

	/// Installs the callback run after a failed renewal has cleared the credential.
	pub fn set_logout_hook(&self, hook: LogoutHook) {
		*self.on_logout.write() = Some(hook);
	}

	/// Credential holder written by this coordinator.
	pub fn holder(&self) -> &Arc<CredentialHolder> {
		&self.holder
	}

	/// Current phase.
	pub fn phase(&self) -> RenewalPhase {
		self.state.lock().phase
	}

	/// Number of requests currently waiting on a renewal.
	pub fn pending(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RenewalMetrics {
		&self.metrics
	}

	/// Joins the in-flight renewal, or starts one, and returns the resulting credential.
	pub async fn refresh(self: &Arc<Self>) -> Result<AccessCredential, RenewalError> {
		let waiter = {
			let mut state = self.state.lock();

			self.enqueue(&mut state, "manual refresh".into())
		};

		waiter.settled().await?;

		self.holder.get().ok_or(RenewalError::SessionEnded)
	}

	/// Decides what happens to a request rejected as unauthorized.
	///
	/// `sent_generation` is the holder generation attached to the rejected request. While idle, a
	/// request sent with a credential that has since been replaced is replayed (or rejected, if
	/// the credential was cleared) without starting a renewal.
	pub(crate) fn admit(self: &Arc<Self>, sent_generation: u64, description: String) -> Admission {
		let mut state = self.state.lock();

		if state.phase == RenewalPhase::Idle {
			let snapshot = self.holder.snapshot();

			if snapshot.generation != sent_generation {
				return match snapshot.credential {
					Some(_) => {
						obs::stale_credential_replay(&description);

						Admission::Replay
					},
					None => Admission::Reject(RenewalError::SessionEnded),
				};
			}
		}

		Admission::Wait(self.enqueue(&mut state, description))
	}

	fn enqueue(self: &Arc<Self>, state: &mut RenewalState, description: String) -> Waiter {
		if state.phase == RenewalPhase::Renewing {
			let (id, receiver) = state.waiters.push(description);

			return Waiter { id, receiver, coordinator: Arc::clone(self), settled: false };
		}

		// Without a runtime no flight can run; the machine must stay idle.
		let Ok(runtime) = Handle::try_current() else {
			obs::renewal_unavailable(&description);

			return Waiter::resolved(self, Err(RenewalError::Abandoned));
		};

		obs::renewal_started(&description);

		let (id, receiver) = state.waiters.push(description);
		let coordinator = Arc::clone(self);

		runtime.spawn(async move { coordinator.fly().await });
		state.phase = RenewalPhase::Renewing;

		Waiter { id, receiver, coordinator: Arc::clone(self), settled: false }
	}

	async fn fly(&self) {
		const KIND: FlowKind = FlowKind::Renewal;

		let mut guard = FlightGuard { coordinator: self, armed: true };
		let span = FlowSpan::new(KIND, "fly");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				match tokio::time::timeout(self.renewal_timeout, self.renewer.renew()).await {
					Ok(result) => result,
					Err(_) => Err(RenewalError::TimedOut { after: self.renewal_timeout }),
				}
			})
			.await;

		obs::record_flow_result(KIND, &result);
		guard.armed = false;
		self.settle(result);
	}

	/// Commits the flight's outcome to the holder, then drains the queue and returns to `Idle`.
	fn settle(&self, result: Result<AccessCredential, RenewalError>) {
		let (settlement, fingerprint) = match result {
			Ok(credential) => {
				let fingerprint = credential.fingerprint();

				self.metrics.record_success();
				self.holder.set(Some(credential));

				(Ok(()), Ok(fingerprint))
			},
			Err(err) => {
				self.metrics.record_failure();
				self.holder.clear();

				(Err(err.clone()), Err(err))
			},
		};
		let delivered = {
			let mut state = self.state.lock();
			let delivered = state.waiters.settle_all(&settlement);

			state.phase = RenewalPhase::Idle;

			delivered
		};

		match &settlement {
			Ok(()) => {
				self.metrics.record_released(delivered);
				obs::renewal_settled(&fingerprint, delivered, 0);
			},
			Err(err) => {
				self.metrics.record_rejected(delivered);
				obs::renewal_settled(&fingerprint, 0, delivered);

				let hook = self.on_logout.read().clone();

				if let Some(hook) = hook {
					hook(err);
				}
			},
		}
	}

	fn cancel(&self, id: u64) {
		let removed = self.state.lock().waiters.remove(id);

		if let Some(pending) = removed {
			self.metrics.record_cancelled();
			obs::waiter_cancelled(pending.id, &pending.description);
		}
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("phase", &state.phase)
			.field("pending", &state.waiters.len())
			.field("renewal_timeout", &self.renewal_timeout)
			.finish()
	}
}

/// Completion handle of a queued request.
///
/// Dropping the handle before the renewal settles removes the request from the queue, so a
/// cancelled caller is never replayed.
pub(crate) struct Waiter {
	id: u64,
	receiver: Receiver<Settlement>,
	coordinator: Arc<RefreshCoordinator>,
	settled: bool,
}
impl Waiter {
	/// Builds a handle that is already settled and was never queued.
	fn resolved(coordinator: &Arc<RefreshCoordinator>, settlement: Settlement) -> Self {
		let (completion, receiver) = oneshot::channel();
		let _ = completion.send(settlement);

		Self { id: u64::MAX, receiver, coordinator: Arc::clone(coordinator), settled: true }
	}

	/// Waits for the renewal flight to settle.
	pub(crate) async fn settled(mut self) -> Settlement {
		let settlement = (&mut self.receiver).await.unwrap_or(Err(RenewalError::Abandoned));

		self.settled = true;

		settlement
	}
}
impl Drop for Waiter {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.cancel(self.id);
		}
	}
}

/// Settles the flight as abandoned if the renewal future unwinds before settling.
struct FlightGuard<'a> {
	coordinator: &'a RefreshCoordinator,
	armed: bool,
}
impl Drop for FlightGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.coordinator.settle(Err(RenewalError::Abandoned));
		}
	}
}
