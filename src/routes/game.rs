use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Interval, MissedTickBehavior};

use crate::error::RelayError;
use crate::models::game::TeamAssignment;
use crate::models::message::Message as GameMessage;
use crate::services::game::handle_client_frame;
use crate::services::registry::Registration;
use crate::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Extension(app_state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info!(addr = %addr, user_agent, "Incoming WebSocket connection attempt");

    ws.on_failed_upgrade(move |error| {
        tracing::error!(addr = %addr, error = %error, "Failed to upgrade connection");
    })
    .on_upgrade(move |socket| handle_socket(socket, addr, app_state))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, app_state: Arc<AppState>) {
    let (mut sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel::<String>(app_state.config.outbound_buffer);

    let session = app_state.registry.register(addr, tx).await;
    tracing::info!(
        conn_id = %session.id,
        addr = %addr,
        side = %session.side,
        total_connections = session.total,
        "New connection established"
    );

    // Written straight to the socket so they precede anything queued by
    // broadcasts since registration.
    match send_greeting(&mut sink, &session, app_state.config.write_timeout).await {
        Ok(()) => {
            let mut writer = tokio::spawn(write_loop(
                sink,
                rx,
                session,
                app_state.config.write_timeout,
                app_state.config.ping_interval,
            ));
            let mut reader = tokio::spawn(read_loop(stream, app_state.clone(), session, addr));

            tokio::select! {
                res = &mut reader => {
                    writer.abort();
                    if let Err(e) = res {
                        if e.is_panic() {
                            tracing::error!(conn_id = %session.id, "Session reader panicked");
                        }
                    }
                }
                _ = &mut writer => {
                    reader.abort();
                }
            }
        }
        Err(error) => {
            tracing::error!(
                conn_id = %session.id,
                addr = %addr,
                error = %error,
                "Failed to send initial state"
            );
        }
    }

    let remaining = match app_state.registry.unregister(session.id).await {
        Some(remaining) => remaining,
        None => app_state.registry.connection_count().await,
    };
    let duration = Utc::now() - session.connected_at;
    tracing::info!(
        conn_id = %session.id,
        addr = %addr,
        remaining_connections = remaining,
        duration_ms = duration.num_milliseconds(),
        "Connection closed"
    );
}

async fn send_greeting(
    sink: &mut SplitSink<WebSocket, Message>,
    session: &Registration,
    write_timeout: Duration,
) -> Result<(), axum::Error> {
    let frames = [
        GameMessage::InitialState(session.snapshot),
        GameMessage::TeamAssign(TeamAssignment { team: session.side }),
    ];
    for frame in frames {
        let text = frame.encode().map_err(axum::Error::new)?;
        timeout(write_timeout, sink.send(Message::Text(text)))
            .await
            .map_err(axum::Error::new)??;
    }
    Ok(())
}

/// Owns the sink: drains the outbound queue and sends keepalive pings. Any
/// failed or timed-out write ends the loop, which drops the queue receiver
/// and lets the next broadcast reap this connection.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    session: Registration,
    write_timeout: Duration,
    ping_interval: Option<Duration>,
) {
    let mut ping = ping_interval.map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    if let Some(ticker) = ping.as_mut() {
        ticker.tick().await;
    }

    loop {
        let msg = tokio::select! {
            frame = rx.recv() => match frame {
                Some(text) => Message::Text(text),
                None => break,
            },
            _ = next_tick(&mut ping) => Message::Ping(Vec::new()),
        };

        match timeout(write_timeout, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(conn_id = %session.id, error = %e, "WebSocket write failed");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    conn_id = %session.id,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "WebSocket write timed out"
                );
                break;
            }
        }
    }

    let _ = sink.close().await;
}

async fn next_tick(ping: &mut Option<Interval>) {
    match ping {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    app_state: Arc<AppState>,
    session: Registration,
    addr: SocketAddr,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!(
                        conn_id = %session.id,
                        addr = %addr,
                        error = %RelayError::NotUtf8,
                        "Failed to parse message"
                    );
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                tracing::debug!(conn_id = %session.id, frame = ?frame, "Client sent close frame");
                break;
            }
            // Pings are answered by the transport.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                tracing::warn!(conn_id = %session.id, addr = %addr, error = %e, "WebSocket error");
                break;
            }
        };

        match handle_client_frame(
            &app_state.registry,
            app_state.config.side_policy,
            &session,
            &text,
        )
        .await
        {
            Ok(outcome) => {
                tracing::info!(
                    conn_id = %session.id,
                    side = %outcome.update.side,
                    y = outcome.update.y,
                    delivered = outcome.report.delivered,
                    reaped = outcome.report.reaped.len(),
                    "Paddle moved"
                );
            }
            Err(error @ (RelayError::OutOfBounds { .. } | RelayError::SideNotPermitted { .. })) => {
                tracing::warn!(
                    conn_id = %session.id,
                    addr = %addr,
                    error = %error,
                    "Invalid paddle position"
                );
            }
            Err(error) => {
                tracing::warn!(
                    conn_id = %session.id,
                    addr = %addr,
                    error = %error,
                    "Failed to parse message"
                );
            }
        }
    }
}
