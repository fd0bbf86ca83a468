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

//! An OpenGL ES 2/3 (WebGL 1/2) device built on `glow`.
//!
//! Version 1 runs on GLES2-class drivers and picks up `EXT_draw_buffers`, `OES_depth_texture`,
//! `OES_element_index_uint` and `OES_vertex_array_object` when present. Vertex arrays are
//! emulated when the driver has none.

mod conversions;
mod device;

pub use self::device::{GlowDevice, GlowFramebuffer, GlowVertexArray};
