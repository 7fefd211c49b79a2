//! Server-sent session change notifications.
//!
//! The header opens an `EventSource` on this endpoint and reloads when the
//! shopper signs in or out in any tab of the same browser.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tower_sessions::Session;

use crate::error::Result;
use crate::services::auth::SessionChange;
use crate::state::AppState;

fn to_event(change: &SessionChange) -> Event {
    Event::default()
        .event(change.name())
        .json_data(change)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to encode session event");
            Event::default().event(change.name())
        })
}

/// Stream session changes for this browser until the client disconnects.
///
/// # Errors
///
/// Returns `AppError::Auth` if the session store fails.
pub async fn session_events(
    State(state): State<AppState>,
    session: Session,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let changes = state.sessions().subscribe(&session).await?;
    tracing::debug!("Session event stream opened");

    let stream = changes.map(|change| Ok(to_event(&change)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use luxury_jewelry_core::UserId;

    use super::*;

    #[test]
    fn test_event_builds_for_each_change() {
        // Event has no accessors; building without panicking is the contract
        let _ = to_event(&SessionChange::SignedOut);
        let _ = to_event(&SessionChange::SignedIn {
            user_id: UserId::generate(),
        });
    }
}
