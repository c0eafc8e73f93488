use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::{
        live::SyncStatusView,
        sse::{
            EVENT_HANDSHAKE, EVENT_SYNC_STATUS, EVENT_SYSTEM_STATUS, Handshake, ServerEvent,
            SyncStatusEvent, SystemStatus,
        },
    },
    state::SharedState,
};

/// Subscribe to the live SSE stream, queuing the handshake for this subscriber only.
pub fn subscribe_live(state: &SharedState) -> (broadcast::Receiver<ServerEvent>, ServerEvent) {
    let receiver = state.live_sse().subscribe();
    let handshake = Handshake {
        stream: "live".into(),
        message: "live stream connected".into(),
        degraded: state.is_degraded(),
        game_id: state.engine().session().map(|session| session.game().id.clone()),
        last_sequence: state.live_sse().last_sequence(),
    };
    let first = ServerEvent::json(EVENT_HANDSHAKE, &handshake).unwrap_or(ServerEvent {
        name: EVENT_HANDSHAKE,
        data: "{}".into(),
        sequence: None,
    });
    (receiver, first)
}

/// Relay engine notifications, sync indicator changes and degraded-mode flips onto the live hub.
pub fn spawn_forwarders(state: SharedState) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(forward_notifications(state.clone())),
        tokio::spawn(forward_sync_status(state.clone())),
        tokio::spawn(forward_degraded(state)),
    ]
}

async fn forward_notifications(state: SharedState) {
    let mut notifications = state.engine().subscribe();
    loop {
        match notifications.recv().await {
            Ok(notification) => state
                .live_sse()
                .broadcast_json(notification.name(), &notification),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "SSE relay lagged behind engine notifications");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn forward_sync_status(state: SharedState) {
    let mut status = state.engine().sync_status();
    while status.changed().await.is_ok() {
        let view = SyncStatusView::from(&*status.borrow_and_update());
        state
            .live_sse()
            .broadcast_json(EVENT_SYNC_STATUS, &SyncStatusEvent(view));
    }
}

async fn forward_degraded(state: SharedState) {
    let mut degraded = state.degraded_watcher();
    while degraded.changed().await.is_ok() {
        let degraded = *degraded.borrow_and_update();
        state
            .live_sse()
            .broadcast_json(EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events until the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    first: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(first))).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Skip lagged messages but keep the stream alive.
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
        info!("live SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(frame: ServerEvent) -> Event {
    let event = Event::default().event(frame.name).data(frame.data);
    match frame.sequence {
        Some(sequence) => event.id(sequence.to_string()),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{Game, GameSchedule, LiveGameEngine, TrackingSettings},
        state::AppState,
    };

    #[tokio::test]
    async fn engine_notifications_reach_the_live_hub() {
        let state = AppState::new(LiveGameEngine::new(TrackingSettings::default()), 16);
        let tasks = spawn_forwarders(state.clone());
        let mut receiver = state.live_sse().subscribe();
        tokio::task::yield_now().await;

        let game = Game::new(
            "game-3",
            "home",
            "away",
            GameSchedule {
                periods: 3,
                period_minutes: 20,
                has_overtime: false,
            },
        );
        state.engine().initialize_live_game(game).unwrap();

        let mut names = Vec::new();
        while names.len() < 2 {
            let event = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(event.sequence.is_some());
            names.push(event.name);
        }
        assert!(names.contains(&"game.loaded"));
        assert!(names.contains(&EVENT_SYNC_STATUS));

        for task in tasks {
            task.abort();
        }
    }

    #[test]
    fn handshakes_report_degraded_mode() {
        let state = AppState::new(LiveGameEngine::new(TrackingSettings::default()), 4);
        let (_receiver, first) = subscribe_live(&state);
        assert_eq!(first.name, EVENT_HANDSHAKE);
        assert_eq!(first.sequence, None);
        assert!(first.data.contains("\"degraded\":true"));
    }
}
