// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// `Api` is the HTTP process's serving contract, grounded on `spo-api/src/domain.rs`'s
// `#[trait_variant::make(Send)] trait Api { async fn serve(self, ...) }` shape. Dropped
// the teacher's `network_id`/`caught_up` parameters: plotsweep has no chain-sync state to
// gate readiness on, so `serve` takes only the application-level config (spec.md §4.1's
// admission skew, §4.5's fanout timing), and readiness is a plain DB/queue ping
// (`infra::api::ready`).

use crate::application::Config;
use std::error::Error as StdError;

#[trait_variant::make(Send)]
pub trait Api
where
    Self: 'static,
{
    type Error: StdError + Send + Sync + 'static;

    async fn serve(self, config: Config) -> Result<(), Self::Error>;
}
