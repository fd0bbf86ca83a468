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

//! API versions, adapter information and per-version capability limits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The API generation a context runs against.
///
/// Serialized as the bare integers `1` and `2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum ApiVersion {
    /// GLES 2 / WebGL 1 class: legacy GLSL, no uniform buffers, no framebuffer blit.
    V1,
    /// GLES 3 / WebGL 2 class: `#version 300 es`, uniform blocks, blit.
    #[default]
    V2,
}

impl TryFrom<u8> for ApiVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ApiVersion::V1),
            2 => Ok(ApiVersion::V2),
            other => Err(format!("unknown API version {other}, expected 1 or 2")),
        }
    }
}

impl From<ApiVersion> for u8 {
    fn from(version: ApiVersion) -> Self {
        match version {
            ApiVersion::V1 => 1,
            ApiVersion::V2 => 2,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", u8::from(*self))
    }
}

/// Describes the driver behind a device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AdapterInfo {
    /// Driver vendor string.
    pub vendor: String,
    /// Renderer (GPU) string.
    pub renderer: String,
    /// Full version string reported by the driver.
    pub version: String,
}

/// What the negotiated API version allows on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Maximum color attachments per framebuffer (and fragment outputs).
    pub max_color_attachments: u32,
    /// Native uniform buffer objects and uniform blocks.
    pub uniform_buffer_objects: bool,
    /// Native vertex array objects.
    pub vertex_array_objects: bool,
    /// Native framebuffer blit.
    pub framebuffer_blit: bool,
    /// Depth textures usable as framebuffer attachments.
    pub depth_textures: bool,
    /// 32-bit index buffers.
    pub element_index_uint: bool,
    /// Combined texture image units.
    pub max_texture_units: u32,
    /// Vertex attribute locations.
    pub max_vertex_attribs: u32,
    /// Largest texture or framebuffer dimension.
    pub max_texture_size: u32,
    /// Uniform buffer binding points. `0` without uniform buffer objects.
    pub max_uniform_buffer_bindings: u32,
}

impl Capabilities {
    /// The guaranteed minimum of a version 1 implementation.
    pub const fn minimum_v1() -> Self {
        Self {
            max_color_attachments: 1,
            uniform_buffer_objects: false,
            vertex_array_objects: false,
            framebuffer_blit: false,
            depth_textures: false,
            element_index_uint: false,
            max_texture_units: 8,
            max_vertex_attribs: 8,
            max_texture_size: 2048,
            max_uniform_buffer_bindings: 0,
        }
    }

    /// The guaranteed minimum of a version 2 implementation.
    pub const fn minimum_v2() -> Self {
        Self {
            max_color_attachments: 4,
            uniform_buffer_objects: true,
            vertex_array_objects: true,
            framebuffer_blit: true,
            depth_textures: true,
            element_index_uint: true,
            max_texture_units: 16,
            max_vertex_attribs: 16,
            max_texture_size: 2048,
            max_uniform_buffer_bindings: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ordered_and_serialize_as_integers() {
        assert!(ApiVersion::V1 < ApiVersion::V2);
        assert_eq!(serde_json::to_string(&ApiVersion::V1).unwrap(), "1");
        let v: ApiVersion = serde_json::from_str("2").unwrap();
        assert_eq!(v, ApiVersion::V2);
        assert!(serde_json::from_str::<ApiVersion>("3").is_err());
    }

    #[test]
    fn capabilities_serialize_for_logging() {
        let json = serde_json::to_value(Capabilities::minimum_v1()).unwrap();
        assert_eq!(json["max_color_attachments"], 1);
        assert_eq!(json["framebuffer_blit"], false);
    }
}
