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

//! Helpers shared by the context integration tests.

#![allow(dead_code)]

use kiln_core::context::{Context, ContextConfig};
use kiln_core::math::Rect;
use kiln_core::renderer::api::*;
use kiln_infra::graphics::headless::{HeadlessConfig, HeadlessDevice};

/// Position and color, one mat4 transform and a float tint.
pub const COLOR_PROGRAM: &str = r#"
#ifdef VERTEX_SHADER
attribute vec3 aPosition;
attribute vec4 aColor;
uniform mat4 uModelViewProjectionMatrix;
varying vec4 vColor;
void main() {
    vColor = aColor;
    gl_Position = uModelViewProjectionMatrix * vec4(aPosition, 1.0);
}
#endif
#ifdef FRAGMENT_SHADER
precision mediump float;
uniform float uAlpha;
varying vec4 vColor;
void main() {
    gl_FragColor = vec4(vColor.rgb, vColor.a * uAlpha);
}
#endif
"#;

/// A GLSL ES 3.00 program reading a uniform block.
pub const BLOCK_PROGRAM: &str = r#"#version 300 es
#ifdef VERTEX_SHADER
in vec3 aPosition;
void main() {
    gl_Position = vec4(aPosition, 1.0);
}
#endif
#ifdef FRAGMENT_SHADER
precision mediump float;
uniform Material {
    vec4 baseColor;
};
out vec4 fragColor;
void main() {
    fragColor = baseColor;
}
#endif
"#;

/// Three vertices of `vec3 position, vec4 color`, interleaved.
pub const TRIANGLE: [f32; 21] = [
    0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, //
    1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0,
];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn context_with(device: HeadlessConfig, config: ContextConfig) -> Context<HeadlessDevice> {
    init_logger();
    Context::new(HeadlessDevice::new(device), &config).expect("context creation failed")
}

/// A version 2 context with an 8x8 surface.
pub fn context_v2() -> Context<HeadlessDevice> {
    context_with(
        HeadlessConfig::v2(),
        ContextConfig::default().with_surface_size(8, 8),
    )
}

/// A version 1 context with an 8x8 surface.
pub fn context_v1() -> Context<HeadlessDevice> {
    context_with(
        HeadlessConfig::v1(),
        ContextConfig::default()
            .with_version(ApiVersion::V1)
            .with_surface_size(8, 8),
    )
}

/// Creates the interleaved triangle and a vertex array reading it, optionally indexed.
pub fn triangle<I: IndexElement>(
    ctx: &mut Context<HeadlessDevice>,
    indices: Option<&[I]>,
) -> (BufferId, VertexArrayId) {
    let vertices = ctx
        .create_vertex_buffer(&TRIANGLE, BufferUsage::Static)
        .expect("vertex buffer");
    let mut descriptor =
        VertexArrayDescriptor::new(VertexAttributeDescriptor::interleaved(vertices, &[(0, 3), (1, 4)]));
    if let Some(indices) = indices {
        let index_buffer = ctx
            .create_index_buffer(indices, BufferUsage::Static)
            .expect("index buffer");
        descriptor = descriptor.with_index_buffer(index_buffer);
    }
    let vertex_array = ctx.create_vertex_array(&descriptor).expect("vertex array");
    (vertices, vertex_array)
}

/// Builds and binds [`COLOR_PROGRAM`] together with a non-indexed triangle.
pub fn ready_to_draw(ctx: &mut Context<HeadlessDevice>) -> (ProgramId, VertexArrayId) {
    let program = ctx
        .create_program(&ProgramDescriptor::new(COLOR_PROGRAM).with_label("color"))
        .expect("color program");
    let (_, vertex_array) = triangle::<u8>(ctx, None);
    ctx.bind_program(Some(program)).expect("bind program");
    ctx.bind_vertex_array(Some(vertex_array)).expect("bind vertex array");
    (program, vertex_array)
}

/// The RGBA bytes of one pixel of the bound target.
pub fn pixel(ctx: &mut Context<HeadlessDevice>, x: i32, y: i32) -> [u8; 4] {
    let bytes = ctx.read_pixels(Rect::new(x, y, 1, 1)).expect("read_pixels");
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}
