//! Query execution span helpers.

use tracing::Span;
use uuid::Uuid;

use crate::model::{QueryState, WorkUnit};

/// Start a span covering one query from admission to its terminal state.
///
/// The `query.state` field is declared empty and filled by
/// [`record_state_transition`].
pub fn start_query_span(work: &WorkUnit, request_id: &Uuid) -> Span {
    tracing::info_span!(
        "query.execute",
        "query.id" = work.id,
        "query.request_id" = %request_id,
        "query.size" = work.size,
        "query.nominal_ms" = work.nominal_duration_ms,
        "query.state" = tracing::field::Empty,
    )
}

/// Record a state transition on the span and emit an event inside it.
pub fn record_state_transition(span: &Span, from: QueryState, to: QueryState) {
    debug_assert!(from.can_transition_to(to), "{from} -> {to}");
    span.record("query.state", tracing::field::display(to));
    span.in_scope(|| {
        tracing::debug!(%from, %to, "state_transition");
    });
}
