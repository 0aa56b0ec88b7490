// Copyright 2024 Saptak Santra
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

//! Archetype Assets - asset build/load pipeline
//!
//! Registry of content files, asynchronous CPU-side loading with an
//! owning-thread finalize step, dependency cascade, polling file watcher
//! and a versioned binary artifact cache.

pub mod assets;
pub mod cache;
pub mod config;
pub mod error;
pub mod prelude;
#[cfg(feature = "profiling")]
pub mod profiling;
pub mod scheduler;
pub mod utils;
pub mod watcher;

pub use assets::*;
pub use cache::*;
pub use config::*;
pub use error::*;
pub use scheduler::*;
pub use watcher::*;
