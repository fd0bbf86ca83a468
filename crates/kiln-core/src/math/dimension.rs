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

//! Integer extents and rectangles for surfaces, attachments, viewports and scissors.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, typically representing width and height.
///
/// This is used for texture, framebuffer and surface dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the extent with both dimensions raised to at least 1.
    #[inline]
    pub fn at_least_one(self) -> Self {
        Self::new(self.width.max(1), self.height.max(1))
    }

    /// Returns the full rectangle `(0, 0, width, height)` covered by this extent.
    #[inline]
    pub fn to_rect(self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }
}

/// A window-space rectangle with a lower-left origin, as used by viewports,
/// scissors and blits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge in pixels.
    pub x: i32,
    /// Bottom edge in pixels.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns `true` if the width and height are not negative.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.width >= 0 && self.height >= 0
    }

    /// Returns `true` if the far edges are representable as `i32`.
    #[inline]
    pub const fn fits(&self) -> bool {
        self.x.checked_add(self.width).is_some() && self.y.checked_add(self.height).is_some()
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive top edge, saturating at `i32::MAX`.
    #[inline]
    pub const fn top(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Returns `true` if the pixel at `(px, py)` lies inside the rectangle.
    #[inline]
    pub const fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.top()
    }
}

impl From<[i32; 4]> for Rect {
    fn from(r: [i32; 4]) -> Self {
        Self::new(r[0], r[1], r[2], r[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_clamps_to_one() {
        assert_eq!(Extent2D::new(0, 7).at_least_one(), Extent2D::new(1, 7));
        assert!(Extent2D::new(0, 7).is_empty());
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(10, 20, 5, 5);
        assert!(r.contains(10, 20));
        assert!(r.contains(14, 24));
        assert!(!r.contains(15, 24));
        assert!(!r.contains(14, 25));
        assert!(!Rect::new(0, 0, -1, 3).is_valid());
    }

    #[test]
    fn rect_edges_saturate_near_the_limit() {
        let r = Rect::new(i32::MAX - 2, 0, 5, 5);
        assert!(!r.fits());
        assert_eq!(r.right(), i32::MAX);
        assert_eq!(r.top(), 5);
        assert!(r.contains(i32::MAX - 1, 4));
        assert!(Rect::new(-5, -5, 10, 10).fits());
    }
}
