// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::{error::Error as StdError, pin::Pin};

/// spec.md §6 Pub/sub channel: the one channel transitions are published/subscribed on.
pub const WS_MESSAGES_CHANNEL: &str = "ws_messages";

/// Abstraction over the `ws_messages` pub/sub channel (spec.md §4.5, §6).
#[trait_variant::make(Send)]
pub trait PubSub: Clone + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    /// Publishes a UTF-8 JSON payload on `channel`.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), Self::Error>;

    /// Subscribes to `channel`, returning a stream of payloads.
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<Pin<Box<dyn Stream<Item = String> + Send>>, Self::Error>;
}

/// The three broadcastable transition types (spec.md §4.3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "plot_open")]
    PlotOpen(crate::domain::estimate::OpenPlotDetail),
    #[serde(rename = "plot_sold")]
    PlotSold(crate::domain::estimate::SoldPlotDetail),
    #[serde(rename = "plot_update")]
    PlotUpdate(crate::domain::estimate::PlotUpdateDetail),
}

impl WsMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
