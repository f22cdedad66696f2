// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapping a dispatch or a renewal flight.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a span tagged with the flow kind and stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"auth_relay.flow",
				flow = kind.as_str(),
				stage,
				method = tracing::field::Empty,
				path = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Creates a dispatch span carrying the request method and path.
	pub fn dispatch(method: &str, path: &str) -> Self {
		let span = Self::new(FlowKind::Dispatch, "send");

		#[cfg(feature = "tracing")]
		{
			span.span.record("method", method);
			span.span.record("path", path);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (method, path);
		}

		span
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits the `Idle -> Renewing` transition.
pub(crate) fn renewal_started(trigger: &str) {
	#[cfg(feature = "tracing")]
	tracing::info!(trigger, "credential renewal started");
	#[cfg(not(feature = "tracing"))]
	let _ = trigger;
}

/// Emits a renewal that could not start because no Tokio runtime is running.
pub(crate) fn renewal_unavailable(trigger: &str) {
	#[cfg(feature = "tracing")]
	tracing::error!(trigger, "credential renewal requires a Tokio runtime");
	#[cfg(not(feature = "tracing"))]
	let _ = trigger;
}

/// Emits the `Renewing -> Idle` transition.
pub(crate) fn renewal_settled(
	result: &Result<String, crate::error::RenewalError>,
	released: usize,
	rejected: usize,
) {
	#[cfg(feature = "tracing")]
	{
		match result {
			Ok(fingerprint) =>
				tracing::info!(%fingerprint, released, "credential renewed; replaying waiters"),
			Err(error) =>
				tracing::warn!(%error, rejected, "credential renewal failed; session cleared"),
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (result, released, rejected);
}

/// Emits a waiter leaving the queue before settlement.
pub(crate) fn waiter_cancelled(id: u64, description: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(id, description, "pending request cancelled");
	#[cfg(not(feature = "tracing"))]
	let _ = (id, description);
}

/// Emits a replay that skipped renewal because the credential already changed.
pub(crate) fn stale_credential_replay(description: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(description, "credential changed while in flight; replaying");
	#[cfg(not(feature = "tracing"))]
	let _ = description;
}

/// Emits a second authorization failure for an already replayed request.
pub(crate) fn terminal_authorization_failure(description: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(description, "request rejected as unauthorized after renewal");
	#[cfg(not(feature = "tracing"))]
	let _ = description;
}
