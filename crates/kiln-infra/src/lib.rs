// Copyright 2025 eraflo
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

//! # Kiln Infra
//!
//! Concrete [`GraphicsDevice`](kiln_core::GraphicsDevice) implementations for the Kiln
//! graphics context and the logger setup shared by hosts and tests.
//!
//! - [`graphics::headless`]: a software reference device, used by CI and the
//!   integration tests.
//! - [`graphics::glow`] (feature `gl`): drives a host-supplied `glow::Context` on
//!   desktop GL, GL ES and WebGL.

#![warn(missing_docs)]

pub mod graphics;
pub mod logging;

pub use graphics::headless::{HeadlessConfig, HeadlessDevice};
#[cfg(feature = "gl")]
pub use graphics::glow::GlowDevice;
pub use logging::init_logging;
