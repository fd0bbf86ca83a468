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

//! CPU-side images backing headless textures and the default surface.
//!
//! Row 0 is the bottom row, matching window coordinates.

use kiln_core::math::{Extent2D, Rect};
use kiln_core::renderer::api::{BlitFilter, TextureFormat};
use kiln_core::renderer::ResourceError;

/// The texels of an image.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Plane {
    Color(Vec<[u8; 4]>),
    Depth(Vec<f32>),
}

/// A 2D image in one of the texture formats.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Image {
    pub(crate) format: TextureFormat,
    pub(crate) size: Extent2D,
    pub(crate) plane: Plane,
}

/// The overlap of two rectangles, if any.
pub(crate) fn intersect(a: Rect, b: Rect) -> Option<Rect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = a.right().min(b.right());
    let y1 = a.top().min(b.top());
    (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Converts a normalized float color channel to 8 bits.
pub(crate) fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Image {
    /// A transparent black color image, or a depth image cleared to the far plane.
    pub(crate) fn new(format: TextureFormat, size: Extent2D) -> Self {
        let texels = size.width as usize * size.height as usize;
        let plane = if format.is_depth() {
            Plane::Depth(vec![1.0; texels])
        } else {
            Plane::Color(vec![[0; 4]; texels])
        };
        Self { format, size, plane }
    }

    /// Builds an image from host bytes laid out bottom row first.
    pub(crate) fn from_bytes(format: TextureFormat, size: Extent2D, data: &[u8]) -> Result<Self, ResourceError> {
        let texels = size.width as usize * size.height as usize;
        let expected = texels * format.bytes_per_texel();
        if data.len() != expected {
            return Err(ResourceError::OutOfBounds {
                offset: 0,
                len: data.len(),
                size: expected,
            });
        }
        let plane = match format {
            TextureFormat::Rgba8 => Plane::Color(
                data.chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect(),
            ),
            TextureFormat::Depth16 => Plane::Depth(
                data.chunks_exact(2)
                    .map(|c| u16::from_ne_bytes([c[0], c[1]]) as f32 / u16::MAX as f32)
                    .collect(),
            ),
            TextureFormat::Depth24 => Plane::Depth(
                data.chunks_exact(4)
                    .map(|c| {
                        let raw = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) & 0x00FF_FFFF;
                        raw as f32 / 0x00FF_FFFF as f32
                    })
                    .collect(),
            ),
        };
        Ok(Self { format, size, plane })
    }

    /// Bytes of storage the image accounts for.
    pub(crate) fn byte_len(&self) -> usize {
        self.size.width as usize * self.size.height as usize * self.format.bytes_per_texel()
    }

    /// The full extent as a rectangle.
    pub(crate) fn bounds(&self) -> Rect {
        self.size.to_rect()
    }

    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }

    /// Fills `rect` (clipped to the image) with a color. No-op on depth images.
    pub(crate) fn fill_color(&mut self, rect: Rect, color: [f32; 4]) {
        let texel = color.map(unorm8);
        let Some(area) = intersect(rect, self.bounds()) else {
            return;
        };
        let width = self.size.width as usize;
        if let Plane::Color(texels) = &mut self.plane {
            for y in area.y..area.top() {
                let row = y as usize * width;
                texels[row + area.x as usize..row + area.right() as usize].fill(texel);
            }
        }
    }

    /// Fills `rect` (clipped to the image) with a depth value. No-op on color images.
    pub(crate) fn fill_depth(&mut self, rect: Rect, depth: f32) {
        let Some(area) = intersect(rect, self.bounds()) else {
            return;
        };
        let width = self.size.width as usize;
        if let Plane::Depth(texels) = &mut self.plane {
            for y in area.y..area.top() {
                let row = y as usize * width;
                texels[row + area.x as usize..row + area.right() as usize].fill(depth.clamp(0.0, 1.0));
            }
        }
    }

    /// RGBA8 bytes of `rect`, bottom row first.
    pub(crate) fn read_rgba(&self, rect: Rect) -> Result<Vec<u8>, ResourceError> {
        let Plane::Color(texels) = &self.plane else {
            return Err(ResourceError::BackendError(
                "cannot read color from a depth image".into(),
            ));
        };
        let bounds = self.bounds();
        if !rect.is_valid() || intersect(rect, bounds) != Some(rect) {
            return Err(ResourceError::OutOfBounds {
                offset: (rect.y.max(0) as usize) * self.size.width as usize + rect.x.max(0) as usize,
                len: (rect.width.max(0) * rect.height.max(0)) as usize,
                size: self.size.width as usize * self.size.height as usize,
            });
        }
        let mut out = Vec::with_capacity(rect.width as usize * rect.height as usize * 4);
        for y in rect.y..rect.top() {
            for x in rect.x..rect.right() {
                out.extend_from_slice(&texels[self.index(x, y)]);
            }
        }
        Ok(out)
    }

    fn texel(&self, x: i32, y: i32) -> [f32; 4] {
        match &self.plane {
            Plane::Color(texels) => texels[self.index(x, y)].map(|c| c as f32 / 255.0),
            Plane::Depth(texels) => {
                let d = texels[self.index(x, y)];
                [d, d, d, 1.0]
            }
        }
    }

    /// Samples at continuous texel coordinates, clamped to `within`.
    fn sample(&self, u: f32, v: f32, within: Rect, filter: BlitFilter) -> [f32; 4] {
        let clamp_x = |x: i32| x.clamp(within.x, within.right() - 1);
        let clamp_y = |y: i32| y.clamp(within.y, within.top() - 1);
        match filter {
            BlitFilter::Nearest => self.texel(clamp_x(u.floor() as i32), clamp_y(v.floor() as i32)),
            BlitFilter::Linear => {
                let (fu, fv) = (u - 0.5, v - 0.5);
                let (x0, y0) = (fu.floor() as i32, fv.floor() as i32);
                let (tx, ty) = (fu - fu.floor(), fv - fv.floor());
                let t00 = self.texel(clamp_x(x0), clamp_y(y0));
                let t10 = self.texel(clamp_x(x0 + 1), clamp_y(y0));
                let t01 = self.texel(clamp_x(x0), clamp_y(y0 + 1));
                let t11 = self.texel(clamp_x(x0 + 1), clamp_y(y0 + 1));
                let mut out = [0.0; 4];
                for c in 0..4 {
                    let bottom = t00[c] + (t10[c] - t00[c]) * tx;
                    let top = t01[c] + (t11[c] - t01[c]) * tx;
                    out[c] = bottom + (top - bottom) * ty;
                }
                out
            }
        }
    }

    /// Copies `src_rect` of `source` scaled into `dst_rect` of `self`, writing only
    /// pixels inside `clip` when given.
    pub(crate) fn blit_from(
        &mut self,
        source: &Image,
        src_rect: Rect,
        dst_rect: Rect,
        filter: BlitFilter,
        clip: Option<Rect>,
    ) -> Result<(), ResourceError> {
        let Some(src_area) = intersect(src_rect, source.bounds()).filter(|a| *a == src_rect) else {
            return Err(ResourceError::BackendError(format!(
                "blit source {src_rect:?} lies outside the {}x{} source",
                source.size.width, source.size.height
            )));
        };
        let mut target = intersect(dst_rect, self.bounds());
        if let Some(clip) = clip {
            target = target.and_then(|t| intersect(t, clip));
        }
        let Some(target) = target else {
            return Ok(());
        };
        let scale_x = src_area.width as f32 / dst_rect.width as f32;
        let scale_y = src_area.height as f32 / dst_rect.height as f32;
        let width = self.size.width as usize;
        let Plane::Color(texels) = &mut self.plane else {
            return Err(ResourceError::BackendError("blit into a depth image".into()));
        };
        for y in target.y..target.top() {
            let v = src_area.y as f32 + (y - dst_rect.y) as f32 * scale_y + 0.5 * scale_y;
            for x in target.x..target.right() {
                let u = src_area.x as f32 + (x - dst_rect.x) as f32 * scale_x + 0.5 * scale_x;
                let color = source.sample(u, v, src_area, filter);
                texels[y as usize * width + x as usize] = color.map(unorm8);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Image {
        let data: Vec<u8> = [
            [255, 0, 0, 255],
            [0, 255, 0, 255],
            [0, 0, 255, 255],
            [255, 255, 255, 255],
        ]
        .concat();
        Image::from_bytes(TextureFormat::Rgba8, Extent2D::new(2, 2), &data).unwrap()
    }

    #[test]
    fn intersect_clips_and_rejects_disjoint() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(intersect(a, Rect::new(5, 5, 10, 10)), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(intersect(a, Rect::new(10, 0, 4, 4)), None);
        assert_eq!(intersect(a, Rect::new(i32::MAX - 2, 0, 5, 5)), None);
        assert_eq!(
            intersect(a, Rect::new(8, 8, i32::MAX, i32::MAX)),
            Some(Rect::new(8, 8, 2, 2))
        );
    }

    #[test]
    fn fill_respects_the_rectangle() {
        let mut image = Image::new(TextureFormat::Rgba8, Extent2D::new(4, 4));
        image.fill_color(Rect::new(2, 2, 8, 8), [1.0, 0.0, 0.0, 1.0]);
        let px = image.read_rgba(Rect::new(3, 3, 1, 1)).unwrap();
        assert_eq!(px, [255, 0, 0, 255]);
        let px = image.read_rgba(Rect::new(1, 1, 1, 1)).unwrap();
        assert_eq!(px, [0, 0, 0, 0]);
    }

    #[test]
    fn read_outside_fails() {
        let image = Image::new(TextureFormat::Rgba8, Extent2D::new(2, 2));
        assert!(matches!(
            image.read_rgba(Rect::new(1, 1, 2, 2)),
            Err(ResourceError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn nearest_blit_upscales_into_tiles() {
        let mut dst = Image::new(TextureFormat::Rgba8, Extent2D::new(4, 4));
        dst.blit_from(&checker(), Rect::new(0, 0, 2, 2), Rect::new(0, 0, 4, 4), BlitFilter::Nearest, None)
            .unwrap();
        assert_eq!(dst.read_rgba(Rect::new(1, 1, 1, 1)).unwrap(), [255, 0, 0, 255]);
        assert_eq!(dst.read_rgba(Rect::new(2, 0, 1, 1)).unwrap(), [0, 255, 0, 255]);
        assert_eq!(dst.read_rgba(Rect::new(0, 3, 1, 1)).unwrap(), [0, 0, 255, 255]);
        assert_eq!(dst.read_rgba(Rect::new(3, 3, 1, 1)).unwrap(), [255, 255, 255, 255]);
    }

    #[test]
    fn blit_honours_the_clip() {
        let mut dst = Image::new(TextureFormat::Rgba8, Extent2D::new(4, 4));
        dst.blit_from(
            &checker(),
            Rect::new(0, 0, 2, 2),
            Rect::new(0, 0, 4, 4),
            BlitFilter::Nearest,
            Some(Rect::new(0, 0, 1, 1)),
        )
        .unwrap();
        assert_eq!(dst.read_rgba(Rect::new(0, 0, 1, 1)).unwrap(), [255, 0, 0, 255]);
        assert_eq!(dst.read_rgba(Rect::new(1, 0, 1, 1)).unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn depth_images_start_at_the_far_plane() {
        let image = Image::new(TextureFormat::Depth24, Extent2D::new(2, 1));
        assert_eq!(image.plane, Plane::Depth(vec![1.0, 1.0]));
    }
}
