//! Event assertions for end-to-end tests

use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use zhihu_publish::Event;

/// Wait until an event accepted by `predicate` arrives
///
/// Returns every event seen up to and including the match, or `None` on
/// timeout or a closed channel.
pub async fn wait_for_event(
    events: &mut Receiver<Event>,
    timeout: Duration,
    predicate: impl Fn(&Event) -> bool,
) -> Option<Vec<Event>> {
    tokio::time::timeout(timeout, async {
        let mut seen = Vec::new();
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = predicate(&event);
                    seen.push(event);
                    if done {
                        return Some(seen);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Drain whatever is buffered on `events`
pub fn buffered(events: &mut Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
