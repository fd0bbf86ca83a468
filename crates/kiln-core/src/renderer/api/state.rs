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

//! Fixed-function state: clear masks, primitive kinds, scissor snapshots and blit filters.

use crate::math::Rect;

bitflags::bitflags! {
    /// The planes cleared by [`Context::clear`](crate::context::Context::clear).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        /// Every color attachment of the bound target.
        const COLOR = 1 << 0;
        /// The depth plane of the bound target.
        const DEPTH = 1 << 1;
    }
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Each vertex is a point.
    Points,
    /// Each pair of vertices is a segment.
    Lines,
    /// A connected polyline.
    LineStrip,
    /// A closed polyline.
    LineLoop,
    /// Each triple of vertices is a triangle.
    Triangles,
    /// Each vertex after the second forms a triangle with the two before it.
    TriangleStrip,
    /// Each vertex after the second forms a triangle with the first and the previous one.
    TriangleFan,
}

/// A snapshot of the scissor test: whether it is on and which rectangle it keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorState {
    /// Whether fragments outside `rect` are discarded.
    pub enabled: bool,
    /// The scissor rectangle in window coordinates.
    pub rect: Rect,
}

impl ScissorState {
    /// The rectangle fragments are restricted to, if the test is enabled.
    pub fn active_rect(&self) -> Option<Rect> {
        self.enabled.then_some(self.rect)
    }
}

/// The filter applied when a blit scales its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitFilter {
    /// Nearest texel, used for 1:1 copies.
    Nearest,
    /// Bilinear, used when source and destination sizes differ.
    Linear,
}

impl BlitFilter {
    /// Nearest for unscaled copies, linear otherwise.
    pub fn for_copy(src: Rect, dst: Rect) -> Self {
        if src.width == dst.width && src.height == dst.height {
            BlitFilter::Nearest
        } else {
            BlitFilter::Linear
        }
    }
}
