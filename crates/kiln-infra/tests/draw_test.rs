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

mod common;

use approx::assert_relative_eq;
use common::{context_v1, context_v2, ready_to_draw, triangle, COLOR_PROGRAM};
use kiln_core::math::{Mat4, Rect, Vec3, FRAC_PI_2};
use kiln_core::renderer::api::*;
use kiln_core::ContextError;

/// Declares four transform uniforms as mat4 and `uViewMatrix` with the wrong type.
const TRANSFORM_PROGRAM: &str = r#"
#ifdef VERTEX_SHADER
attribute vec3 aPosition;
uniform mat4 uProjectionMatrix;
uniform mat4 uModelMatrix;
uniform mat4 uModelViewMatrix;
uniform mat4 uModelViewProjectionMatrix;
uniform vec4 uViewMatrix;
void main() {
    vec4 p = vec4(aPosition, 1.0);
    gl_Position = uModelViewProjectionMatrix * p + uProjectionMatrix * uModelViewMatrix * p
        + uModelMatrix * p + uViewMatrix;
}
#endif
#ifdef FRAGMENT_SHADER
precision mediump float;
void main() { gl_FragColor = vec4(1.0); }
#endif
"#;

fn transform_ready(ctx: &mut kiln_core::Context<kiln_infra::HeadlessDevice>) -> ProgramId {
    let program = ctx
        .create_program(&ProgramDescriptor::new(TRANSFORM_PROGRAM).with_label("transforms"))
        .expect("valid transform program");
    let (_, vertex_array) = triangle::<u8>(ctx, None);
    ctx.bind_program(Some(program)).unwrap();
    ctx.bind_vertex_array(Some(vertex_array)).unwrap();
    program
}

fn recorded_matrix(ctx: &kiln_core::Context<kiln_infra::HeadlessDevice>, name: &str) -> Option<Mat4> {
    match ctx.device().last_draw()?.uniform(name)? {
        UniformValue::Mat4(m) => Some(*m),
        other => panic!("{name} was recorded as {other:?}"),
    }
}

#[test]
fn draws_require_a_program_and_a_vertex_array() {
    let mut ctx = context_v2();
    assert!(matches!(
        ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3),
        Err(ContextError::PreconditionViolation(_))
    ));

    let program = ctx
        .create_program(&ProgramDescriptor::new(COLOR_PROGRAM))
        .unwrap();
    ctx.bind_program(Some(program)).unwrap();
    assert!(matches!(
        ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3),
        Err(ContextError::PreconditionViolation(_))
    ));
    assert!(ctx.device().draws().is_empty(), "Rejected draws never reach the device");
}

#[test]
fn vertex_ranges_are_checked_against_buffer_capacity() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();
    ready_to_draw(&mut ctx);

    // --- 2. ACT ---
    let too_far = ctx.draw_arrays(PrimitiveKind::Triangles, 1, 3);
    let exact = ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3);

    // --- 3. ASSERT ---
    assert!(matches!(too_far, Err(ContextError::PreconditionViolation(_))));
    assert_eq!(exact, Ok(()));
    let draw = ctx.device().last_draw().unwrap();
    assert_eq!(draw.primitive, PrimitiveKind::Triangles);
    assert_eq!((draw.first, draw.count), (0, 3));
    assert_eq!(draw.index_format, None);
}

#[test]
fn packed_attributes_derive_their_stride() {
    let mut ctx = context_v2();
    let program = ctx
        .create_program(&ProgramDescriptor::new(COLOR_PROGRAM))
        .unwrap();
    let positions = ctx
        .create_vertex_buffer(&[0.0f32; 12], BufferUsage::Static)
        .unwrap();
    let colors = ctx
        .create_vertex_buffer(&[1.0f32; 16], BufferUsage::Static)
        .unwrap();
    let vertex_array = ctx
        .create_vertex_array(
            &VertexArrayDescriptor::new(vec![
                VertexAttributeDescriptor::new(0, positions, 3),
                VertexAttributeDescriptor::new(1, colors, 4),
            ])
            .with_label("split streams"),
        )
        .unwrap();
    ctx.bind_program(Some(program)).unwrap();
    ctx.bind_vertex_array(Some(vertex_array)).unwrap();

    assert_eq!(ctx.draw_arrays(PrimitiveKind::Points, 0, 4), Ok(()));
    assert!(ctx.draw_arrays(PrimitiveKind::Points, 0, 5).is_err());
}

#[test]
fn vertex_array_descriptions_are_validated() {
    let mut ctx = context_v2();
    let vertices = ctx
        .create_vertex_buffer(&[0.0f32; 12], BufferUsage::Static)
        .unwrap();
    let indices = ctx.create_index_buffer(&[0u8, 1, 2], BufferUsage::Static).unwrap();
    let max = ctx.capabilities().max_vertex_attribs;

    let invalid = [
        VertexArrayDescriptor::new(vec![VertexAttributeDescriptor::new(0, vertices, 5)]),
        VertexArrayDescriptor::new(vec![
            VertexAttributeDescriptor::new(0, vertices, 3),
            VertexAttributeDescriptor::new(0, vertices, 3),
        ]),
        VertexArrayDescriptor::new(vec![VertexAttributeDescriptor::new(max, vertices, 3)]),
    ];
    for descriptor in &invalid {
        assert!(matches!(
            ctx.create_vertex_array(descriptor),
            Err(ContextError::InvalidArgument(_))
        ));
    }
    assert!(matches!(
        ctx.create_vertex_array(&VertexArrayDescriptor::new(vec![
            VertexAttributeDescriptor::new(0, indices, 1)
        ])),
        Err(ContextError::TypeMismatch(_))
    ));
    assert!(matches!(
        ctx.create_vertex_array(
            &VertexArrayDescriptor::new(vec![VertexAttributeDescriptor::new(0, vertices, 3)])
                .with_index_buffer(vertices)
        ),
        Err(ContextError::TypeMismatch(_))
    ));
    assert_eq!(ctx.live_resources().vertex_arrays, 0);
}

#[test]
fn destroyed_attribute_buffers_make_draws_stale() {
    let mut ctx = context_v2();
    let program = ctx
        .create_program(&ProgramDescriptor::new(COLOR_PROGRAM))
        .unwrap();
    let (vertices, vertex_array) = triangle::<u8>(&mut ctx, None);
    ctx.bind_program(Some(program)).unwrap();
    ctx.bind_vertex_array(Some(vertex_array)).unwrap();

    ctx.destroy_buffer(vertices).unwrap();

    assert_eq!(
        ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3),
        Err(ContextError::StaleHandle {
            kind: ResourceType::Buffer
        })
    );
}

#[test]
fn indexed_draws_are_bounded_by_the_index_count() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();
    let program = ctx
        .create_program(&ProgramDescriptor::new(COLOR_PROGRAM))
        .unwrap();
    let (_, plain) = triangle::<u8>(&mut ctx, None);
    let (_, indexed) = triangle(&mut ctx, Some(&[0u32, 1, 2, 2, 1, 0]));
    ctx.bind_program(Some(program)).unwrap();

    // --- 2. ACT & 3. ASSERT ---
    ctx.bind_vertex_array(Some(plain)).unwrap();
    assert!(matches!(
        ctx.draw_elements(PrimitiveKind::Triangles, 3),
        Err(ContextError::PreconditionViolation(_))
    ));

    ctx.bind_vertex_array(Some(indexed)).unwrap();
    assert!(matches!(
        ctx.draw_elements(PrimitiveKind::Triangles, 7),
        Err(ContextError::PreconditionViolation(_))
    ));
    ctx.draw_elements(PrimitiveKind::Triangles, 6).unwrap();
    let draw = ctx.device().last_draw().unwrap();
    assert_eq!(draw.index_format, Some(IndexFormat::U8));
    assert_eq!(draw.count, 6);
    assert_eq!(draw.vertex_array, ctx.device().current_vertex_array());
}

#[test]
fn declared_transform_uniforms_are_fed_at_draw_time() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    transform_ready(&mut ctx);
    let projection = Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));

    // --- 2. ACT ---
    ctx.set_projection_matrix(projection);
    ctx.set_view_matrix(view);
    ctx.translate3(1.0, 2.0, 3.0);
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();

    // --- 3. ASSERT ---
    let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(recorded_matrix(&ctx, "uModelMatrix"), Some(model));
    assert_eq!(recorded_matrix(&ctx, "uProjectionMatrix"), Some(projection));
    assert_eq!(recorded_matrix(&ctx, "uModelViewMatrix"), Some(view * model));
    assert_eq!(
        recorded_matrix(&ctx, "uModelViewProjectionMatrix"),
        Some(projection * view * model)
    );
    assert_eq!(
        ctx.device().last_draw().unwrap().uniform("uViewMatrix"),
        None,
        "A transform name declared with another type is left alone"
    );
}

#[test]
fn transforms_are_only_uploaded_after_a_change() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();
    transform_ready(&mut ctx);
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();
    let marker = Mat4::from_scale(Vec3::splat(7.0));

    // --- 2. ACT ---
    ctx.set_program_uniform("uModelMatrix", marker).unwrap();
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();
    let untouched = recorded_matrix(&ctx, "uModelMatrix");
    ctx.scale1(3.0);
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();
    let refreshed = recorded_matrix(&ctx, "uModelMatrix");

    // --- 3. ASSERT ---
    assert_eq!(untouched, Some(marker), "No transform change, no upload");
    assert_eq!(refreshed, Some(Mat4::from_scale(Vec3::splat(3.0))));
}

#[test]
fn pushed_model_matrices_are_isolated() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    transform_ready(&mut ctx);

    // --- 2. ACT ---
    ctx.push_model_matrix();
    ctx.translate3(5.0, 0.0, 0.0);
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();
    let inside = recorded_matrix(&ctx, "uModelMatrix");
    ctx.pop_model_matrix().unwrap();
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();
    let after = recorded_matrix(&ctx, "uModelMatrix");

    // --- 3. ASSERT ---
    assert_eq!(inside, Some(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))));
    assert_eq!(after, Some(Mat4::IDENTITY));
    assert!(matches!(
        ctx.pop_model_matrix(),
        Err(ContextError::PreconditionViolation(_))
    ));
}

#[test]
fn rotations_compose_on_the_model_matrix() {
    let mut ctx = context_v2();

    ctx.rotate_z(FRAC_PI_2);
    let rotated = ctx.transform().matrix(kiln_core::context::TransformUniform::Model);
    let x_axis = rotated.transform_point3(Vec3::X);
    ctx.identity_model_matrix();
    ctx.rotate(FRAC_PI_2, Vec3::Z);
    let same = ctx.transform().matrix(kiln_core::context::TransformUniform::Model);

    assert_relative_eq!(x_axis.x, 0.0, epsilon = 1e-6);
    assert_relative_eq!(x_axis.y, 1.0, epsilon = 1e-6);
    for (a, b) in rotated.to_cols_array().iter().zip(same.to_cols_array()) {
        assert_relative_eq!(*a, b, epsilon = 1e-6);
    }
}

#[test]
fn draws_capture_the_tracked_state() {
    let mut ctx = context_v2();
    ready_to_draw(&mut ctx);
    ctx.set_viewport(Rect::new(1, 1, 4, 4)).unwrap();
    ctx.set_scissor4(2, 2, 2, 2).unwrap();
    ctx.set_depth_test(true);

    ctx.draw_arrays(PrimitiveKind::LineStrip, 0, 2).unwrap();

    let draw = ctx.device().last_draw().unwrap();
    assert_eq!(draw.viewport, Rect::new(1, 1, 4, 4));
    assert_eq!(draw.scissor, ctx.scissor_state());
    assert!(draw.depth_test);
    assert_eq!(draw.framebuffer, None);
}
