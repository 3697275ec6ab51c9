use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::auth::AuthService;
use crate::game_manager::GameManager;
use game_types::{ClientMessage, ConnectionError, GameError, ServerMessage};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;


use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

/// Token bucket settings applied to every new socket.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub max_messages: u32,
    pub refill_interval: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_messages: 30,
            refill_interval: Duration::from_millis(500),
        }
    }
}

pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    game_manager: Arc<GameManager>,
    auth_service: Arc<AuthService>,
    rate_limit: RateLimit,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let mut rate_limiter = RateLimiter::new(rate_limit.max_messages, rate_limit.refill_interval);

    // Create connection and get receiver for outgoing messages
    let message_receiver = connection_manager.create_connection(connection_id);

    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        game_manager,
        auth_service,
    );

    // Handle incoming messages
    let incoming_handler = {
        let message_handler = message_handler.clone();
        let connection_manager = connection_manager.clone();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) if msg.is_close() => break,
                    Ok(msg) => {
                        if let Err(e) =
                            handle_message(msg, &mut rate_limiter, &message_handler, &connection_manager, connection_id)
                                .await
                        {
                            error!("Error handling message for {}: {}", connection_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Handle outgoing messages
    let outgoing_handler = async move {
        let mut receiver = message_receiver;

        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {:?}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(Message::text(json)).await {
                warn!("Failed to send message to {}: {:?}", connection_id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    };

    // Run both handlers concurrently
    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    connection_manager.remove_connection(connection_id);
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_manager: &ConnectionManager,
    connection_id: ConnectionId,
) -> Result<(), String> {
    if !rate_limiter.check_rate_limit() {
        warn!("Rate limit exceeded for connection {}", connection_id);
        let _ = connection_manager.send_to_connection(
            connection_id,
            ServerMessage::ConnectionFailed {
                error: ConnectionError::RateLimitExceeded,
            },
        );
        return Ok(());
    }

    // Only handle text messages
    let Ok(text) = msg.to_str() else {
        return Ok(());
    };

    let client_message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            return connection_manager.send_to_connection(
                connection_id,
                ServerMessage::Error {
                    error: GameError::invalid_input(format!("Invalid JSON message: {}", e)),
                },
            );
        }
    };

    message_handler.handle_message(client_message).await
}
