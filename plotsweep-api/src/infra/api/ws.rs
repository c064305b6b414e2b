// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// C5 broadcast fanout (spec.md §4.5). Grounded on `original_source/paissadb/ws.py`'s
// `WebsocketClient`/`connect`/`ping`/`broadcast_listener` shape, transplanted onto
// axum's `WebSocketUpgrade` the way `ankurah-ankurah/connectors/websocket-server`
// splits a socket into sender/receiver halves and races them against a ping interval.

use super::{AppState, ViewerSender};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use log::{error, warn};
use plotsweep_common::domain::{PubSub, Queue, Storage, Sweeper, WS_MESSAGES_CHANNEL};
use serde::Deserialize;
use std::{sync::Arc, time::{Duration, Instant, SystemTime, UNIX_EPOCH}};
use tokio::{select, sync::mpsc};

const PING_PAYLOAD: &str = r#"{"type":"ping"}"#;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub jwt: Option<String>,
}

/// spec.md §4.5 step 1: accept the upgrade; an invalid query token closes with a
/// policy-violation code instead of refusing the upgrade outright.
pub async fn ws_upgrade<S, Q, P>(
    State(state): State<AppState<S, Q, P>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let sweeper_id = match query.jwt.as_deref() {
        None => None,
        Some(token) => match plotsweep_common::infra::jwt::verify(&state.jwt_config, token) {
            Ok(claims) => claims.cid.parse::<i64>().ok(),
            Err(_) => {
                return ws.on_upgrade(|mut socket| async move {
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame {
                            code: 1008,
                            reason: "invalid token".into(),
                        })))
                        .await;
                });
            }
        },
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, sweeper_id))
}

async fn handle_socket<S, Q, P>(socket: WebSocket, state: AppState<S, Q, P>, sweeper_id: Option<i64>)
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    if let Some(sweeper_id) = sweeper_id {
        touch_sweeper(&state, sweeper_id).await;
    }

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let viewer_id = state.next_viewer_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    state.viewers.insert(viewer_id, tx);

    let anonymous = sweeper_id.is_none();
    let connected_at = Instant::now();
    let anonymous_ttl = Duration::from_secs(state.application_config.anonymous_viewer_ttl_secs);
    let mut ticker = tokio::time::interval(Duration::from_secs(state.application_config.ws_ping_interval_secs));
    ticker.tick().await; // the first tick fires immediately; consume it before pinging

    loop {
        select! {
            _ = ticker.tick() => {
                // spec.md §4.5 step 4: anonymous viewers are disconnected after 24h.
                if anonymous && connected_at.elapsed() >= anonymous_ttl {
                    break;
                }
                if sender.send(Message::Text(PING_PAYLOAD.into())).await.is_err() {
                    break;
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.viewers.remove(&viewer_id);
}

async fn touch_sweeper<S, Q, P>(state: &AppState<S, Q, P>, sweeper_id: i64)
where
    S: Storage,
{
    let sweeper = match state.storage.get_sweeper(sweeper_id).await {
        Ok(Some(sweeper)) => sweeper,
        Ok(None) => return,
        Err(error) => {
            error!(error:?, sweeper_id; "failed to fetch sweeper for ws connect");
            return;
        }
    };

    let now_secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let sweeper = Sweeper { last_seen: now_secs, ..sweeper };

    let mut tx = match state.storage.create_tx().await {
        Ok(tx) => tx,
        Err(error) => {
            error!(error:?, sweeper_id; "failed to open transaction touching sweeper");
            return;
        }
    };
    if let Err(error) = state.storage.upsert_sweeper(&sweeper, &mut tx).await {
        error!(error:?, sweeper_id; "failed to touch sweeper last_seen");
        return;
    }
    if let Err(error) = tx.commit().await {
        error!(error:?, sweeper_id; "failed to commit sweeper touch");
    }
}

/// spec.md §4.5 step 3: one cooperative task per process, subscribed to `ws_messages`,
/// multicasting every message to every attached viewer and dropping failures silently —
/// `DashMap::retain` doubles as the reap of dead connections between ping cycles.
pub async fn broadcast_listener<P>(pub_sub: P, viewers: Arc<DashMap<u64, ViewerSender>>)
where
    P: PubSub,
{
    let mut stream = match pub_sub.subscribe(WS_MESSAGES_CHANNEL).await {
        Ok(stream) => stream,
        Err(error) => {
            error!(error:?; "failed to subscribe to broadcast channel");
            return;
        }
    };

    while let Some(payload) = stream.next().await {
        viewers.retain(|_, tx| tx.send(Message::Text(payload.clone().into())).is_ok());
    }

    warn!("broadcast channel subscription ended");
}
