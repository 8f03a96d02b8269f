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

//! Live marker state: the keyed store, position transitions and the
//! reconciler that ties them to the map surface.

pub mod reconciler;
pub mod store;
pub mod transition;

pub use reconciler::{AnnotationEvent, ReconcileSummary, Reconciler, ReconcilerSettings};
pub use store::{Marker, MarkerStore};
pub use transition::{FrameUpdate, Transition, TransitionSet, DEFAULT_TRANSITION};
