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

//! Defines the descriptor for offscreen framebuffers.

use crate::math::Extent2D;
use std::borrow::Cow;

/// A descriptor used to create a framebuffer.
///
/// Every attachment is a texture owned by the framebuffer and sized to it. At least one
/// attachment must be requested: a color-only, color plus depth, or depth-only target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Number of `Rgba8` color attachments.
    pub color_attachments: u32,
    /// Whether to allocate a depth attachment.
    pub depth_attachment: bool,
    /// Target size. `None` uses the current surface size.
    pub size: Option<Extent2D>,
}

impl Default for FramebufferDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            color_attachments: 1,
            depth_attachment: false,
            size: None,
        }
    }
}

impl<'a> FramebufferDescriptor<'a> {
    /// A framebuffer with `color_attachments` color outputs and an optional depth plane.
    pub fn new(color_attachments: u32, depth_attachment: bool) -> Self {
        Self {
            color_attachments,
            depth_attachment,
            ..Default::default()
        }
    }

    /// A depth-only framebuffer, e.g. for shadow maps.
    pub fn depth_only() -> Self {
        Self::new(0, true)
    }

    /// Sets an explicit size instead of following the surface.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some(Extent2D::new(width, height));
        self
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }
}
