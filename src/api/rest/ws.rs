use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::OrderChange;
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FeedParams {
    pub token: String,
}

/// Pushed to the client whenever one of its orders changed. Clients
/// re-fetch; the message is a signal, not a delta.
#[derive(Debug, Serialize)]
pub struct FeedMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub order_id: Uuid,
}

impl FeedMessage {
    pub fn orders_changed(change: &OrderChange) -> Self {
        Self {
            kind: "orders_changed",
            order_id: change.order_id,
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let driver = state
        .identity
        .resolve(&params.token)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, driver)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, driver: Driver) {
    let (mut sender, mut receiver) = socket.split();
    let driver_id = driver.id;

    let mut changes = Box::pin(BroadcastStream::new(state.orders.subscribe()).filter_map(
        move |result| async move {
            match result {
                Ok(change) if change.concerns(driver_id) => Some(change),
                Ok(_) => None,
                Err(err) => {
                    // Dropped signals are covered by the next full re-fetch.
                    warn!(driver_id = %driver_id, error = %err, "change feed lagged");
                    None
                }
            }
        },
    ));

    info!(driver_id = %driver_id, "change feed client connected");

    let feed_state = state.clone();
    let send_task = tokio::spawn(async move {
        while let Some(change) = changes.next().await {
            let json = match serde_json::to_string(&FeedMessage::orders_changed(&change)) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize change for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            feed_state.metrics.feed_notifications_total.inc();
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(driver_id = %driver_id, "change feed client disconnected");
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::FeedMessage;
    use crate::backend::OrderChange;

    #[test]
    fn feed_message_names_the_changed_order() {
        let change = OrderChange {
            order_id: Uuid::nil(),
            pickup_driver_id: None,
            dropoff_driver_id: None,
        };
        let json = serde_json::to_value(FeedMessage::orders_changed(&change)).unwrap();
        assert_eq!(json["type"], "orders_changed");
        assert_eq!(json["order_id"], Uuid::nil().to_string());
    }
}
