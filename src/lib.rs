// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Live aircraft map annotations and background flight watching.
//!
//! A [`session::Session`] polls the feed, reconciles the results into map
//! markers that glide between positions, and switches to following a single
//! aircraft when one is selected. The [`watch`] module keeps checking a list
//! of flights after the map is gone and notifies when their status changes.

pub mod annotations;
pub mod config;
pub mod easing;
pub mod map;
pub mod scheduler;
pub mod session;
pub mod watch;
pub mod watchlist;

pub use config::AppConfig;
pub use session::{Session, SessionHandle, SessionSettings};
