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

use common::{context_v1, context_v2, context_with};
use kiln_core::context::{Context, ContextConfig};
use kiln_core::math::{Extent2D, Rect};
use kiln_core::renderer::api::*;
use kiln_core::ContextError;
use kiln_infra::graphics::headless::{HeadlessConfig, HeadlessDevice};

#[test]
fn version_1_device_falls_back_when_version_2_is_requested() {
    // --- 1. ARRANGE ---
    let config = ContextConfig::default().with_surface_size(16, 16);

    // --- 2. ACT ---
    let ctx = context_with(HeadlessConfig::v1(), config);

    // --- 3. ASSERT ---
    assert_eq!(ctx.api_version(), ApiVersion::V1, "Should have fallen back to V1");
    assert_eq!(ctx.device().api_version(), ApiVersion::V1);
    let caps = ctx.capabilities();
    assert!(!caps.uniform_buffer_objects, "V1 has no uniform buffers");
    assert!(!caps.framebuffer_blit, "V1 has no native blit");
    assert_eq!(caps.max_color_attachments, 1);
}

#[test]
fn disabled_fallback_reports_the_unsupported_version() {
    // --- 1. ARRANGE ---
    common::init_logger();
    let config = ContextConfig::default().with_fallback(false);

    // --- 2. ACT ---
    let result = Context::new(HeadlessDevice::new(HeadlessConfig::v1()), &config);

    // --- 3. ASSERT ---
    match result {
        Err(ContextError::UnsupportedVersion {
            requested,
            available,
        }) => {
            assert_eq!(requested, ApiVersion::V2);
            assert_eq!(available, ApiVersion::V1);
        }
        other => panic!("Expected UnsupportedVersion, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn version_1_can_be_requested_from_a_version_2_device() {
    let ctx = context_with(
        HeadlessConfig::v2(),
        ContextConfig::default()
            .with_version(ApiVersion::V1)
            .with_fallback(false),
    );

    assert_eq!(ctx.api_version(), ApiVersion::V1);
    assert!(!ctx.capabilities().framebuffer_blit);
}

#[test]
fn configuration_from_json_drives_initial_state() {
    // --- 1. ARRANGE ---
    let config = ContextConfig::from_json(
        r#"{ "surface_size": { "width": 32, "height": 16 }, "clear_color": [1.0, 0.0, 0.0, 1.0], "depth_test": true }"#,
    )
    .expect("valid configuration");
    let device: HeadlessConfig =
        serde_json::from_str(r#"{ "max_version": 1 }"#).expect("valid device configuration");

    // --- 2. ACT ---
    let mut ctx = context_with(device, config);

    // --- 3. ASSERT ---
    assert_eq!(ctx.api_version(), ApiVersion::V1);
    assert_eq!(ctx.surface_size(), Extent2D::new(32, 16));
    assert_eq!(ctx.viewport(), Rect::new(0, 0, 32, 16));
    assert!(ctx.depth_test());
    assert!(ctx.device().depth_test());
    assert_eq!(ctx.clear_color(), [1.0, 0.0, 0.0, 1.0]);

    ctx.clear(ClearMask::COLOR).unwrap();
    assert_eq!(common::pixel(&mut ctx, 31, 15), [255, 0, 0, 255]);
}

#[test]
fn resizing_the_surface_clamps_to_one_pixel() {
    let mut ctx = context_v2();

    ctx.resize_surface(0, 0);

    assert_eq!(ctx.surface_size(), Extent2D::new(1, 1));
    assert_eq!(ctx.device().surface_size(), Extent2D::new(1, 1));
    assert!(ctx.read_pixels(Rect::new(0, 0, 2, 1)).is_err());
}

#[test]
fn destroyed_handles_are_stale() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let buffer = ctx
        .create_vertex_buffer(&[0.0f32; 6], BufferUsage::Static)
        .unwrap();

    // --- 2. ACT ---
    ctx.destroy(buffer).unwrap();
    let replacement = ctx
        .create_vertex_buffer(&[0.0f32; 6], BufferUsage::Static)
        .unwrap();

    // --- 3. ASSERT ---
    assert!(!ctx.is_valid(buffer), "The old handle must not be revived");
    assert!(ctx.is_valid(replacement));
    assert_ne!(buffer, replacement);
    assert_eq!(
        ctx.buffer_size(buffer),
        Err(ContextError::StaleHandle {
            kind: ResourceType::Buffer
        })
    );
    assert_eq!(
        ctx.destroy_buffer(buffer),
        Err(ContextError::StaleHandle {
            kind: ResourceType::Buffer
        }),
        "A double destroy must be reported"
    );
}

#[test]
fn handles_from_another_context_are_rejected() {
    // --- 1. ARRANGE ---
    let mut first = context_v2();
    let mut second = context_v2();
    let texture = first
        .create_texture(
            &TextureDescriptor::new(Extent2D::new(2, 2), TextureFormat::Rgba8),
            None,
        )
        .unwrap();

    // --- 2. ACT ---
    let size = second.texture_size(texture);
    let bind = second.set_texture_2d(texture, 0);

    // --- 3. ASSERT ---
    assert_ne!(first.owner_tag(), second.owner_tag());
    let foreign = ContextError::ForeignHandle {
        kind: ResourceType::Texture,
    };
    assert_eq!(size, Err(foreign.clone()));
    assert_eq!(bind, Err(foreign));
    assert!(!second.is_valid(texture));
    assert!(first.is_valid(texture));
}

#[test]
fn teardown_report_lists_leaks_and_unbalanced_pushes() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();
    let buffer = ctx
        .create_vertex_buffer(&[1.0f32, 2.0, 3.0], BufferUsage::Dynamic)
        .unwrap();
    ctx.create_framebuffer(&FramebufferDescriptor::new(1, false))
        .unwrap();
    assert!(ctx.teardown_report().leaked.total() > 0);

    // --- 2. ACT ---
    ctx.push_model_matrix();
    ctx.push_scissor();
    ctx.destroy(buffer).unwrap();
    let report = ctx.teardown_report();

    // --- 3. ASSERT ---
    assert!(!report.is_clean());
    assert_eq!(report.leaked.buffers, 0);
    assert_eq!(report.leaked.framebuffers, 1);
    assert_eq!(report.leaked.textures, 1, "The color attachment counts as a texture");
    assert_eq!(report.model_pushes, 1);
    assert_eq!(report.scissor_pushes, 1);
    assert_eq!(report.viewport_pushes, 0);
    let warnings = report.warnings();
    assert_eq!(warnings.len(), 4, "{warnings:?}");
    assert!(warnings.contains(&"1 framebuffer handle(s) leaked".to_string()));
    assert!(warnings.contains(&"1 unbalanced model matrix push(es)".to_string()));
}

#[test]
fn a_balanced_session_tears_down_clean() {
    let mut ctx = context_v2();
    let program = ctx
        .create_program(&ProgramDescriptor::new(common::COLOR_PROGRAM))
        .unwrap();
    let (vertices, vertex_array) = common::triangle::<u8>(&mut ctx, None);
    ctx.bind_program(Some(program)).unwrap();
    ctx.bind_vertex_array(Some(vertex_array)).unwrap();
    ctx.push_model_matrix();
    ctx.translate3(1.0, 0.0, 0.0);
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();
    ctx.pop_model_matrix().unwrap();

    for handle in [
        AnyHandle::from(vertex_array),
        AnyHandle::from(vertices),
        AnyHandle::from(program),
    ] {
        ctx.destroy(handle).unwrap();
    }

    let report = ctx.teardown_report();
    assert!(report.is_clean(), "{:?}", report.warnings());
    assert_eq!(ctx.live_resources().total(), 0);
    assert_eq!(
        ctx.device().live_objects().total(),
        0,
        "Every native object must be released"
    );
}
