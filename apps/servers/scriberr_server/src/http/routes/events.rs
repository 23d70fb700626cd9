use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use serde::Deserialize;

use crate::http::AppState;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub fn routes() -> Router<AppState> {
	Router::new().route("/events", get(subscribe))
}

#[derive(Deserialize)]
struct EventsQuery {
	job_id: String,
}

/// SSE stream of one job's events. The subscription is dropped with the
/// stream when the client disconnects, which unsubscribes it; keepalives
/// go out as comment lines when the topic is quiet.
async fn subscribe(State(state): State<AppState>, Query(query): Query<EventsQuery>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
	let subscription = state.broadcaster.subscribe(&query.job_id);

	let stream = futures::stream::unfold(subscription, |mut subscription| async move {
		let event = subscription.recv().await?;
		let wire = event.wire_json().to_string();
		Some((Ok(Event::default().data(wire)), subscription))
	});

	Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEPALIVE_INTERVAL))
}
