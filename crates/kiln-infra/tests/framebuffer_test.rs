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

use common::{context_v1, context_v2, context_with, pixel, triangle};
use kiln_core::context::ContextConfig;
use kiln_core::math::{Extent2D, Rect};
use kiln_core::renderer::api::*;
use kiln_core::renderer::error::ShaderError;
use kiln_core::ContextError;
use kiln_infra::graphics::headless::HeadlessConfig;

#[test]
fn a_framebuffer_needs_at_least_one_attachment() {
    let mut ctx = context_v2();

    let result = ctx.create_framebuffer(&FramebufferDescriptor::new(0, false));

    assert!(
        matches!(result, Err(ContextError::InvalidAttachmentRequest(_))),
        "Got {result:?}"
    );
    assert_eq!(ctx.device().live_objects().total(), 0);
}

#[test]
fn color_and_depth_attachments_are_distinct_textures() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();

    // --- 2. ACT ---
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(3, true).with_label("gbuffer"))
        .expect("three color attachments fit version 2");

    // --- 3. ASSERT ---
    let colors: Vec<TextureId> = (0..3)
        .map(|i| ctx.get_framebuffer_color_attachment(fb, i).unwrap())
        .collect();
    assert_ne!(colors[0], colors[1]);
    assert_ne!(colors[1], colors[2]);
    assert_ne!(colors[0], colors[2]);
    for &color in &colors {
        assert_eq!(ctx.texture_format(color).unwrap(), TextureFormat::Rgba8);
        assert_eq!(ctx.texture_size(color).unwrap(), Extent2D::new(8, 8));
    }
    let depth = ctx
        .get_framebuffer_depth_attachment(fb)
        .unwrap()
        .expect("a depth attachment was requested");
    assert_eq!(ctx.texture_format(depth).unwrap(), TextureFormat::Depth24);
    assert!(matches!(
        ctx.get_framebuffer_color_attachment(fb, 3),
        Err(ContextError::InvalidArgument(_))
    ));
    assert_eq!(ctx.framebuffer_size(fb).unwrap(), Extent2D::new(8, 8));
}

#[test]
fn version_1_limits_attachments() {
    let mut plain = context_v1();
    assert!(matches!(
        plain.create_framebuffer(&FramebufferDescriptor::new(2, false)),
        Err(ContextError::InvalidAttachmentRequest(_))
    ));
    assert!(matches!(
        plain.create_framebuffer(&FramebufferDescriptor::new(1, true)),
        Err(ContextError::InvalidAttachmentRequest(_))
    ));

    let mut extended = context_with(
        HeadlessConfig::v1()
            .with_draw_buffers(true)
            .with_depth_textures(true),
        ContextConfig::default().with_surface_size(8, 8),
    );
    let fb = extended
        .create_framebuffer(&FramebufferDescriptor::new(2, true))
        .expect("the extensions allow two colors and depth");
    let depth = extended.get_framebuffer_depth_attachment(fb).unwrap().unwrap();
    assert_eq!(extended.texture_format(depth).unwrap(), TextureFormat::Depth16);
}

#[test]
fn framebuffer_size_is_clamped_and_checked() {
    let mut ctx = context_v2();
    let max = ctx.capabilities().max_texture_size;

    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(1, false).with_size(0, 4))
        .unwrap();
    let oversized =
        ctx.create_framebuffer(&FramebufferDescriptor::new(1, false).with_size(max + 1, 4));

    assert_eq!(ctx.framebuffer_size(fb).unwrap(), Extent2D::new(1, 4));
    assert!(matches!(
        oversized,
        Err(ContextError::InvalidAttachmentRequest(_))
    ));
}

#[test]
fn resizing_a_framebuffer_resizes_every_attachment() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(2, true))
        .unwrap();

    // --- 2. ACT ---
    ctx.set_framebuffer_size(fb, 16, 0).unwrap();

    // --- 3. ASSERT ---
    let expected = Extent2D::new(16, 1);
    assert_eq!(ctx.framebuffer_size(fb).unwrap(), expected);
    for i in 0..2 {
        let color = ctx.get_framebuffer_color_attachment(fb, i).unwrap();
        assert_eq!(ctx.texture_size(color).unwrap(), expected);
    }
    let depth = ctx.get_framebuffer_depth_attachment(fb).unwrap().unwrap();
    assert_eq!(ctx.texture_size(depth).unwrap(), expected);

    ctx.bind_framebuffer(Some(fb)).unwrap();
    ctx.set_clear_color([0.0, 0.0, 1.0, 1.0]);
    ctx.clear(ClearMask::COLOR | ClearMask::DEPTH).unwrap();
    assert_eq!(pixel(&mut ctx, 15, 0), [0, 0, 255, 255]);
}

#[test]
fn a_failed_resize_leaves_every_attachment_at_the_old_size() {
    // --- 1. ARRANGE ---
    // Three 4x4 RGBA8 attachments hold 192 bytes. Growing the second to 8x8 exceeds 500.
    let mut ctx = context_with(
        HeadlessConfig::v2().with_texture_memory_budget(500),
        ContextConfig::default().with_surface_size(8, 8),
    );
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(3, false).with_size(4, 4))
        .unwrap();

    // --- 2. ACT ---
    let result = ctx.set_framebuffer_size(fb, 8, 8);

    // --- 3. ASSERT ---
    assert!(
        matches!(result, Err(ContextError::Resource(_))),
        "The out-of-memory error must surface, got {result:?}"
    );
    let old = Extent2D::new(4, 4);
    assert_eq!(ctx.framebuffer_size(fb).unwrap(), old);
    for i in 0..3 {
        let color = ctx.get_framebuffer_color_attachment(fb, i).unwrap();
        assert_eq!(ctx.texture_size(color).unwrap(), old);
        ctx.set_texture_2d(color, 0).unwrap();
        let native = ctx.device().texture_binding(0).unwrap();
        assert_eq!(
            ctx.device().texture_size(native),
            Some(old),
            "Attachment {i} storage must be rolled back"
        );
    }
    ctx.bind_framebuffer(Some(fb)).unwrap();
    ctx.set_clear_color([0.0, 0.0, 1.0, 1.0]);
    ctx.clear(ClearMask::COLOR).unwrap();
    assert_eq!(pixel(&mut ctx, 3, 3), [0, 0, 255, 255]);
    ctx.set_framebuffer_size(fb, 5, 5).unwrap();
    assert_eq!(ctx.framebuffer_size(fb).unwrap(), Extent2D::new(5, 5));
}

#[test]
fn clears_and_reads_target_the_bound_framebuffer() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(1, false).with_size(4, 4))
        .unwrap();
    ctx.set_clear_color([0.0, 1.0, 0.0, 1.0]);

    // --- 2. ACT ---
    ctx.bind_framebuffer(Some(fb)).unwrap();
    ctx.clear(ClearMask::COLOR).unwrap();
    let inside = pixel(&mut ctx, 3, 3);
    let outside = ctx.read_pixels(Rect::new(2, 2, 4, 4));
    ctx.bind_framebuffer(None).unwrap();
    let surface = pixel(&mut ctx, 3, 3);

    // --- 3. ASSERT ---
    assert_eq!(inside, [0, 255, 0, 255]);
    assert!(
        matches!(outside, Err(ContextError::InvalidArgument(_))),
        "Reads must stay inside the 4x4 framebuffer"
    );
    assert_ne!(surface, [0, 255, 0, 255], "Switching targets does not clear");
}

#[test]
fn depth_only_framebuffers_have_no_color_to_read() {
    let mut ctx = context_v2();
    let fb = ctx.create_framebuffer(&FramebufferDescriptor::depth_only()).unwrap();

    ctx.bind_framebuffer(Some(fb)).unwrap();
    ctx.clear(ClearMask::DEPTH).unwrap();

    assert!(ctx.get_framebuffer_depth_attachment(fb).unwrap().is_some());
    assert!(matches!(
        ctx.get_framebuffer_color_attachment(fb, 0),
        Err(ContextError::InvalidArgument(_))
    ));
    assert!(matches!(
        ctx.read_pixels(Rect::new(0, 0, 1, 1)),
        Err(ContextError::PreconditionViolation(_))
    ));
}

#[test]
fn attachments_live_and_die_with_their_framebuffer() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(1, true))
        .unwrap();
    let color = ctx.get_framebuffer_color_attachment(fb, 0).unwrap();
    ctx.set_texture_2d(color, 0).unwrap();

    // --- 2. ACT ---
    let early = ctx.destroy_texture(color);
    ctx.destroy_framebuffer(fb).unwrap();

    // --- 3. ASSERT ---
    assert!(matches!(early, Err(ContextError::PreconditionViolation(_))));
    assert!(!ctx.is_valid(color));
    assert_eq!(ctx.live_resources().textures, 0);
    assert_eq!(ctx.device().live_objects().total(), 0);
    assert_eq!(ctx.device().texture_binding(0), None);
}

#[test]
fn destroying_the_bound_framebuffer_is_reported_on_next_use() {
    let mut ctx = context_v1();
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(1, false))
        .unwrap();
    ctx.bind_framebuffer(Some(fb)).unwrap();

    ctx.destroy_framebuffer(fb).unwrap();

    assert_eq!(ctx.bound_framebuffer(), Some(fb));
    assert_eq!(ctx.device().current_framebuffer(), None);
    assert_eq!(
        ctx.clear(ClearMask::COLOR),
        Err(ContextError::StaleHandle {
            kind: ResourceType::Framebuffer
        })
    );
    ctx.bind_framebuffer(None).unwrap();
    assert_eq!(ctx.clear(ClearMask::COLOR), Ok(()));
}

#[test]
fn textures_are_validated_and_bound_to_units() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();
    let size = Extent2D::new(2, 2);
    let pixels = [255u8; 16];

    // --- 2. ACT ---
    let texture = ctx
        .create_texture(
            &TextureDescriptor::new(size, TextureFormat::Rgba8)
                .with_filter(FilterMode::Nearest)
                .with_label("white"),
            Some(&pixels),
        )
        .unwrap();

    // --- 3. ASSERT ---
    assert!(matches!(
        ctx.create_texture(&TextureDescriptor::new(Extent2D::new(0, 2), TextureFormat::Rgba8), None),
        Err(ContextError::InvalidArgument(_))
    ));
    assert!(matches!(
        ctx.create_texture(&TextureDescriptor::new(size, TextureFormat::Rgba8), Some(&pixels[..8])),
        Err(ContextError::InvalidArgument(_))
    ));
    assert!(matches!(
        ctx.create_texture(&TextureDescriptor::new(size, TextureFormat::Depth16), None),
        Err(ContextError::Unsupported(_))
    ));

    let units = ctx.capabilities().max_texture_units;
    assert!(matches!(
        ctx.set_texture_2d(texture, units),
        Err(ContextError::InvalidArgument(_))
    ));
    ctx.set_texture_2d(texture, 1).unwrap();
    assert!(ctx.device().texture_binding(1).is_some());
    ctx.set_texture_2d(None, 1).unwrap();
    assert_eq!(ctx.device().texture_binding(1), None);

    ctx.destroy_texture(texture).unwrap();
    assert_eq!(ctx.live_resources().textures, 0);
}

/// Writes three colors through `gl_FragData` under the draw-buffers extension.
const DRAW_BUFFERS_PROGRAM: &str = r#"
#ifdef VERTEX_SHADER
attribute vec3 aPosition;
void main() {
    gl_Position = vec4(aPosition, 1.0);
}
#endif
#ifdef FRAGMENT_SHADER
#extension GL_EXT_draw_buffers : require
precision mediump float;
void main() {
    gl_FragData[0] = vec4(1.0, 0.0, 0.0, 1.0);
    gl_FragData[1] = vec4(0.0, 1.0, 0.0, 1.0);
    gl_FragData[2] = vec4(0.0, 0.0, 1.0, 1.0);
}
#endif
"#;

/// Writes three located outputs from a varying color.
const LOCATED_OUTPUTS_PROGRAM: &str = r#"#version 300 es
#ifdef VERTEX_SHADER
in vec3 aPosition;
in vec4 aColor;
out vec4 vColor;
void main() {
    vColor = aColor;
    gl_Position = vec4(aPosition, 1.0);
}
#endif
#ifdef FRAGMENT_SHADER
precision mediump float;
in vec4 vColor;
layout(location = 0) out vec4 albedo;
layout(location = 1) out vec4 normal;
layout(location = 2) out vec4 emissive;
void main() {
    albedo = vColor;
    normal = vec4(0.5, 0.5, 1.0, 1.0);
    emissive = vec4(0.0);
}
#endif
"#;

#[test]
fn version_1_draws_into_several_attachments_with_draw_buffers() {
    // --- 1. ARRANGE ---
    let mut ctx = context_with(
        HeadlessConfig::v1().with_draw_buffers(true),
        ContextConfig::default()
            .with_version(ApiVersion::V1)
            .with_surface_size(8, 8),
    );
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(3, false).with_size(4, 4))
        .unwrap();
    let program = ctx
        .create_program(&ProgramDescriptor::new(DRAW_BUFFERS_PROGRAM))
        .unwrap();
    let (_, vertex_array) = triangle::<u8>(&mut ctx, None);

    // --- 2. ACT ---
    ctx.bind_framebuffer(Some(fb)).unwrap();
    ctx.bind_program(Some(program)).unwrap();
    ctx.bind_vertex_array(Some(vertex_array)).unwrap();
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();

    // --- 3. ASSERT ---
    let draw = ctx.device().last_draw().unwrap().clone();
    assert!(draw.framebuffer.is_some());
    assert_eq!(draw.framebuffer, ctx.device().current_framebuffer());
    assert_eq!(draw.program, ctx.device().current_program());
    assert_eq!(draw.viewport, ctx.viewport());
}

#[test]
fn version_1_rejects_extra_frag_data_without_the_extension() {
    let mut ctx = context_v1();
    let source = DRAW_BUFFERS_PROGRAM.replace("#extension GL_EXT_draw_buffers : require\n", "");

    let result = ctx.create_program(&ProgramDescriptor::new(source.as_str()));

    match result {
        Err(ContextError::Shader(ShaderError::Compile { stage, log })) => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(log.contains("'gl_FragData' : array index 1 out of range"), "{log}");
        }
        other => panic!("Expected a fragment compile error, got {other:?}"),
    }
}

#[test]
fn version_2_draws_located_outputs_from_planar_attributes() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let fb = ctx
        .create_framebuffer(&FramebufferDescriptor::new(3, true).with_size(4, 4))
        .unwrap();
    let program = ctx
        .create_program(&ProgramDescriptor::new(LOCATED_OUTPUTS_PROGRAM))
        .unwrap();
    // All positions first, then all colors, each block tightly packed.
    let planar: [f32; 21] = [
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
        1.0, 0.0, 0.0, 1.0, //
        0.0, 1.0, 0.0, 1.0, //
        0.0, 0.0, 1.0, 1.0,
    ];
    let vertices = ctx
        .create_vertex_buffer(&planar, BufferUsage::Static)
        .unwrap();
    let vertex_array = ctx
        .create_vertex_array(&VertexArrayDescriptor::new(vec![
            VertexAttributeDescriptor::new(0, vertices, 3),
            VertexAttributeDescriptor::new(1, vertices, 4).with_offset(36),
        ]))
        .unwrap();
    ctx.bind_framebuffer(Some(fb)).unwrap();
    ctx.bind_program(Some(program)).unwrap();
    ctx.bind_vertex_array(Some(vertex_array)).unwrap();

    // --- 2. ACT ---
    let drawn = ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3);
    let past_the_end = ctx.draw_arrays(PrimitiveKind::Triangles, 0, 4);

    // --- 3. ASSERT ---
    let reflection = ctx.program_reflection(program).unwrap();
    assert_eq!(reflection.attribute_location("aPosition"), Some(0));
    assert_eq!(reflection.attribute_location("aColor"), Some(1));
    assert_eq!(drawn, Ok(()));
    assert!(matches!(
        past_the_end,
        Err(ContextError::PreconditionViolation(_))
    ));
    assert_eq!(ctx.device().draws().len(), 1);
    assert_eq!(
        ctx.device().last_draw().unwrap().framebuffer,
        ctx.device().current_framebuffer()
    );

    // Every attachment is a separate target the blit can read back.
    ctx.set_clear_color([0.0, 1.0, 0.0, 1.0]);
    ctx.clear(ClearMask::COLOR).unwrap();
    ctx.bind_framebuffer(None).unwrap();
    ctx.set_clear_color([1.0, 0.0, 0.0, 1.0]);
    for index in 0..3 {
        ctx.clear(ClearMask::COLOR).unwrap();
        ctx.blit_framebuffer_to_screen(fb, Rect::new(0, 0, 4, 4), index)
            .unwrap();
        assert_eq!(pixel(&mut ctx, 1, 1), [0, 255, 0, 255]);
    }
}
