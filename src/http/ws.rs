use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use crate::events::{EventBus, WsMessage};
use crate::http::runner::SharedRunner;

/// Ping cadence and how long an unanswered ping is tolerated.
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    pub ping_every: Duration,
    pub drop_after: Duration,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            ping_every: Duration::from_secs(30),
            drop_after: Duration::from_secs(60),
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<SharedRunner>) -> Response {
    upgrade(ws, &ctx.events, KeepAlive::default())
}

/// Subscribes before the handshake completes so no event published after the
/// greeting can be missed.
pub fn upgrade(ws: WebSocketUpgrade, events: &EventBus, keep_alive: KeepAlive) -> Response {
    let rx = events.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx, keep_alive))
        .into_response()
}

async fn stream_events(socket: WebSocket, mut rx: broadcast::Receiver<String>, keep_alive: KeepAlive) {
    let (mut sender, mut receiver) = socket.split();

    if let Some(greeting) = WsMessage::connection().to_json() {
        if sender.send(Message::Text(greeting.into())).await.is_err() {
            return;
        }
    }
    tracing::debug!("websocket client connected");

    let mut pings = tokio::time::interval_at(Instant::now() + keep_alive.ping_every, keep_alive.ping_every);
    // set by the first unanswered ping, cleared by any pong
    let mut silent_since: Option<Instant> = None;

    let reason = loop {
        tokio::select! {
            _ = pings.tick() => {
                if silent_since.is_some_and(|since| since.elapsed() >= keep_alive.drop_after) {
                    break "pong timeout";
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break "send failed";
                }
                silent_since.get_or_insert_with(Instant::now);
            }

            event = rx.recv() => match event {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break "send failed";
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket client lagging, events dropped");
                }
                Err(RecvError::Closed) => break "event bus closed",
            },

            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Pong(_))) => silent_since = None,
                Some(Ok(Message::Close(_))) | None => break "client closed",
                Some(Err(_)) => break "receive failed",
                Some(Ok(_)) => {}
            },
        }
    };

    let _ = sender.close().await;
    tracing::debug!(reason, "websocket client disconnected");
}

#[cfg(test)]
mod tests {
    use axum::{Router, routing::get};
    use serde_json::{Value, json};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    use super::*;
    use crate::events::RunEvent;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(events: EventBus, keep_alive: KeepAlive) -> String {
        let app = Router::new().route(
            "/ws",
            get(move |ws: WebSocketUpgrade| {
                let events = events.clone();
                async move { upgrade(ws, &events, keep_alive) }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{addr}/ws")
    }

    async fn next_json(client: &mut Client) -> Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("no message within 5s")
                .expect("socket closed")
                .unwrap();
            if message.is_text() {
                return serde_json::from_str(message.to_text().unwrap()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn greets_then_forwards_run_events() {
        let events = EventBus::new();
        let url = serve(events.clone(), KeepAlive::default()).await;
        let (mut client, _) = connect_async(url).await.unwrap();

        let greeting = next_json(&mut client).await;
        assert_eq!(greeting["type"], "connection");

        events.publish("run-1", RunEvent::TestExecutionStarted, json!({ "args": ["test"] }));
        let event = next_json(&mut client).await;
        assert_eq!(event["type"], "test-event");
        assert_eq!(event["runId"], "run-1");
        assert_eq!(event["event"], "test-execution-started");
        assert_eq!(event["data"]["args"][0], "test");
    }

    #[tokio::test]
    async fn answering_pings_keeps_the_connection() {
        let events = EventBus::new();
        let keep_alive = KeepAlive {
            ping_every: Duration::from_millis(50),
            drop_after: Duration::from_millis(300),
        };
        let url = serve(events.clone(), keep_alive).await;
        let (mut client, _) = connect_async(url).await.unwrap();
        next_json(&mut client).await;

        // reading lets the client answer pings
        let deadline = Instant::now() + Duration::from_millis(600);
        while let Ok(Some(Ok(_))) = tokio::time::timeout_at(deadline, client.next()).await {}

        events.publish("run-2", RunEvent::TestExecutionCompleted, json!({}));
        let event = next_json(&mut client).await;
        assert_eq!(event["runId"], "run-2");
    }

    #[tokio::test]
    async fn silent_client_is_dropped() {
        let keep_alive = KeepAlive {
            ping_every: Duration::from_millis(50),
            drop_after: Duration::from_millis(150),
        };
        let url = serve(EventBus::new(), keep_alive).await;
        let (mut client, _) = connect_async(url).await.unwrap();

        // not polling the socket means no pongs go out
        tokio::time::sleep(Duration::from_millis(500)).await;

        let ended = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(Ok(message)) = client.next().await {
                if message.is_close() {
                    break;
                }
            }
        })
        .await;
        assert!(ended.is_ok());
    }
}
