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

use kiln_core::renderer::api::{
    ApiVersion, BlitFilter, BufferKind, BufferUsage, ClearMask, FilterMode, GlslType, IndexFormat,
    PrimitiveKind, TextureFormat,
};

/// GLES2 status code, missing from the desktop enum set.
const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: u32 = 0x8CD9;

/// A local extension trait to convert kiln types into GL enums.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_gl()` syntax.
pub(crate) trait IntoGl<T> {
    /// Consumes self and converts it into a GL-compatible value.
    fn into_gl(self) -> T;
}

impl IntoGl<u32> for BufferKind {
    fn into_gl(self) -> u32 {
        match self {
            BufferKind::Vertex => glow::ARRAY_BUFFER,
            BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
            BufferKind::Uniform => glow::UNIFORM_BUFFER,
        }
    }
}

impl IntoGl<u32> for BufferUsage {
    fn into_gl(self) -> u32 {
        match self {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
            BufferUsage::Stream => glow::STREAM_DRAW,
        }
    }
}

impl IntoGl<u32> for IndexFormat {
    fn into_gl(self) -> u32 {
        match self {
            IndexFormat::U8 => glow::UNSIGNED_BYTE,
            IndexFormat::U16 => glow::UNSIGNED_SHORT,
            IndexFormat::U32 => glow::UNSIGNED_INT,
        }
    }
}

impl IntoGl<u32> for PrimitiveKind {
    fn into_gl(self) -> u32 {
        match self {
            PrimitiveKind::Points => glow::POINTS,
            PrimitiveKind::Lines => glow::LINES,
            PrimitiveKind::LineStrip => glow::LINE_STRIP,
            PrimitiveKind::LineLoop => glow::LINE_LOOP,
            PrimitiveKind::Triangles => glow::TRIANGLES,
            PrimitiveKind::TriangleStrip => glow::TRIANGLE_STRIP,
            PrimitiveKind::TriangleFan => glow::TRIANGLE_FAN,
        }
    }
}

impl IntoGl<u32> for FilterMode {
    fn into_gl(self) -> u32 {
        match self {
            FilterMode::Nearest => glow::NEAREST,
            FilterMode::Linear => glow::LINEAR,
        }
    }
}

impl IntoGl<u32> for BlitFilter {
    fn into_gl(self) -> u32 {
        match self {
            BlitFilter::Nearest => glow::NEAREST,
            BlitFilter::Linear => glow::LINEAR,
        }
    }
}

impl IntoGl<u32> for ClearMask {
    fn into_gl(self) -> u32 {
        let mut bits = 0;
        if self.contains(ClearMask::COLOR) {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if self.contains(ClearMask::DEPTH) {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        bits
    }
}

/// The `tex_image_2d` triple for a texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PixelFormat {
    pub(crate) internal: i32,
    pub(crate) format: u32,
    pub(crate) ty: u32,
}

/// Version 1 wants unsized internal formats equal to the pixel format.
pub(crate) fn pixel_format(format: TextureFormat, version: ApiVersion) -> PixelFormat {
    let (sized, format, ty) = match format {
        TextureFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Depth16 => (
            glow::DEPTH_COMPONENT16,
            glow::DEPTH_COMPONENT,
            glow::UNSIGNED_SHORT,
        ),
        TextureFormat::Depth24 => (
            glow::DEPTH_COMPONENT24,
            glow::DEPTH_COMPONENT,
            glow::UNSIGNED_INT,
        ),
    };
    let internal = match version {
        ApiVersion::V1 => format,
        ApiVersion::V2 => sized,
    };
    PixelFormat {
        internal: internal as i32,
        format,
        ty,
    }
}

/// Maps a reflected GL uniform or attribute type.
pub(crate) fn glsl_type(gl_type: u32) -> Option<GlslType> {
    Some(match gl_type {
        glow::FLOAT => GlslType::Float,
        glow::FLOAT_VEC2 => GlslType::Vec2,
        glow::FLOAT_VEC3 => GlslType::Vec3,
        glow::FLOAT_VEC4 => GlslType::Vec4,
        glow::INT => GlslType::Int,
        glow::INT_VEC2 => GlslType::IVec2,
        glow::INT_VEC3 => GlslType::IVec3,
        glow::INT_VEC4 => GlslType::IVec4,
        glow::BOOL => GlslType::Bool,
        glow::FLOAT_MAT2 => GlslType::Mat2,
        glow::FLOAT_MAT3 => GlslType::Mat3,
        glow::FLOAT_MAT4 => GlslType::Mat4,
        glow::SAMPLER_2D => GlslType::Sampler2D,
        glow::SAMPLER_CUBE => GlslType::SamplerCube,
        _ => return None,
    })
}

/// The symbolic name of a framebuffer status.
pub(crate) fn framebuffer_status_name(status: u32) -> String {
    match status {
        glow::FRAMEBUFFER_COMPLETE => "FRAMEBUFFER_COMPLETE".to_owned(),
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "FRAMEBUFFER_INCOMPLETE_ATTACHMENT".to_owned(),
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            "FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".to_owned()
        }
        FRAMEBUFFER_INCOMPLETE_DIMENSIONS => "FRAMEBUFFER_INCOMPLETE_DIMENSIONS".to_owned(),
        glow::FRAMEBUFFER_UNSUPPORTED => "FRAMEBUFFER_UNSUPPORTED".to_owned(),
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "FRAMEBUFFER_INCOMPLETE_MULTISAMPLE".to_owned(),
        other => format!("0x{other:04X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_1_uses_unsized_formats() {
        let v1 = pixel_format(TextureFormat::Depth16, ApiVersion::V1);
        assert_eq!(v1.internal, glow::DEPTH_COMPONENT as i32);
        let v2 = pixel_format(TextureFormat::Rgba8, ApiVersion::V2);
        assert_eq!(v2.internal, glow::RGBA8 as i32);
        assert_eq!(v2.ty, glow::UNSIGNED_BYTE);
    }

    #[test]
    fn clear_mask_bits() {
        let bits: u32 = (ClearMask::COLOR | ClearMask::DEPTH).into_gl();
        assert_eq!(bits, glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        let none: u32 = ClearMask::empty().into_gl();
        assert_eq!(none, 0);
    }

    #[test]
    fn status_names() {
        assert_eq!(
            framebuffer_status_name(0x8CD9),
            "FRAMEBUFFER_INCOMPLETE_DIMENSIONS"
        );
        assert_eq!(framebuffer_status_name(0x1234), "0x1234");
        assert_eq!(glsl_type(glow::FLOAT_MAT4), Some(GlslType::Mat4));
        assert_eq!(glsl_type(glow::SAMPLER_3D), None);
    }
}
