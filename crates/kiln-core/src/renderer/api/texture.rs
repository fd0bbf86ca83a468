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

//! Defines data structures related to 2D textures and framebuffer attachments.

use crate::math::Extent2D;
use std::borrow::Cow;

/// The texel format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// Four 8-bit normalized channels.
    #[default]
    Rgba8,
    /// A 16-bit depth plane.
    Depth16,
    /// A 24-bit depth plane.
    Depth24,
}

impl TextureFormat {
    /// Returns `true` for depth formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth16 | TextureFormat::Depth24)
    }

    /// Bytes per texel as uploaded by the host.
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            TextureFormat::Rgba8 | TextureFormat::Depth24 => 4,
            TextureFormat::Depth16 => 2,
        }
    }
}

/// Defines the filtering mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Point sampling. Returns the value of the nearest texel.
    Nearest,
    /// Linear interpolation. Returns a weighted average of the four nearest texels.
    #[default]
    Linear,
}

/// A descriptor used to create a texture.
///
/// Textures never carry mipmaps and always clamp to the edge, so non-power-of-two
/// sizes work on version 1 contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width and height in texels.
    pub size: Extent2D,
    /// Texel format.
    pub format: TextureFormat,
    /// Minification and magnification filter.
    pub filter: FilterMode,
}

impl<'a> TextureDescriptor<'a> {
    /// A linear-filtered texture of the given size and format.
    pub fn new(size: Extent2D, format: TextureFormat) -> Self {
        Self {
            label: None,
            size,
            format,
            filter: FilterMode::Linear,
        }
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the sampling filter.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Number of bytes a full upload of this texture takes.
    pub fn byte_len(&self) -> usize {
        self.size.width as usize * self.size.height as usize * self.format.bytes_per_texel()
    }
}
