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

//! A software reference device.
//!
//! [`HeadlessDevice`] keeps every resource in memory: buffers as bytes, textures and the
//! default surface as CPU images, programs as the output of a small GLSL ES front end.
//! Clears, blits and pixel reads operate on those images; draws are recorded as
//! [`DrawRecord`]s instead of being rasterized.

mod device;
mod glsl;
mod raster;

pub use self::device::{
    DrawRecord, HeadlessBuffer, HeadlessDevice, HeadlessFramebuffer, HeadlessProgram,
    HeadlessTexture, HeadlessUniformLocation, HeadlessVertexArray, LiveObjects,
};

use kiln_core::math::Extent2D;
use kiln_core::renderer::api::ApiVersion;
use serde::{Deserialize, Serialize};

/// Settings of a [`HeadlessDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    /// The best API version the device offers.
    pub max_version: ApiVersion,
    /// Surface size until the context initializes the device with its own.
    pub surface_size: Extent2D,
    /// Version 1 only: expose a draw-buffers extension (4 color attachments, `gl_FragData[i]`).
    pub draw_buffers_extension: bool,
    /// Version 1 only: allow depth textures as framebuffer attachments.
    pub depth_texture_extension: bool,
    /// Bytes of texture storage the device may hold. Allocations past it fail the way a
    /// driver reports running out of memory. `None` is unlimited.
    pub texture_memory_budget: Option<usize>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            max_version: ApiVersion::V2,
            surface_size: Extent2D::new(1, 1),
            draw_buffers_extension: false,
            depth_texture_extension: true,
            texture_memory_budget: None,
        }
    }
}

impl HeadlessConfig {
    /// A device limited to version 1, without extensions.
    pub fn v1() -> Self {
        Self {
            max_version: ApiVersion::V1,
            depth_texture_extension: false,
            ..Self::default()
        }
    }

    /// A version 2 device.
    pub fn v2() -> Self {
        Self::default()
    }

    /// Toggles the version 1 draw-buffers extension.
    pub fn with_draw_buffers(mut self, enabled: bool) -> Self {
        self.draw_buffers_extension = enabled;
        self
    }

    /// Toggles the version 1 depth-texture extension.
    pub fn with_depth_textures(mut self, enabled: bool) -> Self {
        self.depth_texture_extension = enabled;
        self
    }

    /// Caps the texture storage the device may hold.
    pub fn with_texture_memory_budget(mut self, bytes: usize) -> Self {
        self.texture_memory_budget = Some(bytes);
        self
    }

    /// Sets the initial surface size.
    pub fn with_surface_size(mut self, width: u32, height: u32) -> Self {
        self.surface_size = Extent2D::new(width, height).at_least_one();
        self
    }
}
