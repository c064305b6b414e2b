// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod auth;
pub mod estimate;
pub mod reconcile;

mod event;
mod plot;
mod pub_sub;
mod queue;
mod storage;
mod world;

pub use event::*;
pub use plot::*;
pub use pub_sub::*;
pub use queue::*;
pub use storage::*;
pub use world::*;

/// Epoch seconds with sub-second precision, matching the source system's float timestamps.
pub type Timestamp = f64;
