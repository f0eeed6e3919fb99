//! Shared SSE response plumbing.
//!
//! Every stream opens with a `ping`, interleaves hub events with periodic
//! keep-alive `ping`s, and carries the hub registration guard inside the
//! stream so a closed connection unsubscribes as soon as the transport
//! notices.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, Sse};
use futures::Stream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};

use crate::realtime::{EVENT_PING, Subscription};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Wrap a hub subscription into an SSE response.
pub fn sse_response(
    subscription: Subscription,
    rx: UnboundedReceiver<Event>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hello = tokio_stream::once(ping("ok"));
    let events = UnboundedReceiverStream::new(rx);
    let keep_alive = IntervalStream::new(tokio::time::interval_at(
        tokio::time::Instant::now() + KEEP_ALIVE_INTERVAL,
        KEEP_ALIVE_INTERVAL,
    ))
    .map(|_| ping("keep"));

    let stream = hello.chain(events.merge(keep_alive)).map(move |event| {
        // The guard lives as long as the stream; dropping the response
        // (client disconnect) unsubscribes from the hub.
        let _ = &subscription;
        Ok::<_, Infallible>(event)
    });

    Sse::new(stream)
}

fn ping(data: &str) -> Event {
    Event::default().event(EVENT_PING).data(data)
}
