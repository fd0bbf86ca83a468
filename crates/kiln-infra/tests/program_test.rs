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

use common::{context_v1, context_v2, BLOCK_PROGRAM, COLOR_PROGRAM};
use kiln_core::math::{Mat4, Vec3};
use kiln_core::renderer::api::*;
use kiln_core::renderer::error::ShaderError;
use kiln_core::ContextError;

#[test]
fn reflection_reports_reserved_locations_and_uniform_types() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();

    // --- 2. ACT ---
    let program = ctx
        .create_program(&ProgramDescriptor::new(COLOR_PROGRAM))
        .expect("the color program is valid GLSL ES 1.00");
    let reflection = ctx.program_reflection(program).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(reflection.attribute_location("aPosition"), Some(0));
    assert_eq!(reflection.attribute_location("aColor"), Some(1));
    assert_eq!(
        reflection.uniform("uModelViewProjectionMatrix").map(|u| u.ty),
        Some(GlslType::Mat4)
    );
    assert_eq!(reflection.uniform("uAlpha").map(|u| u.ty), Some(GlslType::Float));
    assert!(
        reflection.uniform("vColor").is_none(),
        "Varyings are not uniforms"
    );
    assert!(reflection.uniform_blocks.is_empty());
}

#[test]
fn compile_failures_carry_the_stage_and_the_verbatim_log() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let source = "#version 300 es\n\
                  #ifdef VERTEX_SHADER\n\
                  in vec4 aPosition;\n\
                  void main() { gl_Position = aPosition; }\n\
                  #endif\n\
                  #ifdef FRAGMENT_SHADER\n\
                  precision mediump float;\n\
                  void main() { gl_FragColor = vec4(1.0); }\n\
                  #endif\n";

    // --- 2. ACT ---
    let result = ctx.create_program(&ProgramDescriptor::new(source));

    // --- 3. ASSERT ---
    match result {
        Err(ContextError::Shader(ShaderError::Compile { stage, log })) => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(
                log.contains("'gl_FragColor' : undeclared identifier"),
                "Unexpected log: {log}"
            );
            assert!(
                log.ends_with("compilation errors.  No code generated.\n"),
                "Unexpected log: {log}"
            );
        }
        other => panic!("Expected a fragment compile error, got {other:?}"),
    }
    assert_eq!(ctx.live_resources().programs, 0);
    assert_eq!(ctx.device().live_objects().programs, 0);
}

#[test]
fn vertex_stage_errors_are_attributed_to_the_vertex_stage() {
    let mut ctx = context_v1();
    let source = "#ifdef VERTEX_SHADER\n#error vertex stage is broken\n#endif\n\
                  void main() { }\n";

    let result = ctx.create_program(&ProgramDescriptor::new(source));

    match result {
        Err(ContextError::Shader(ShaderError::Compile { stage, log })) => {
            assert_eq!(stage, ShaderStage::Vertex);
            assert!(log.contains("'#error' : vertex stage is broken"), "{log}");
        }
        other => panic!("Expected a vertex compile error, got {other:?}"),
    }
}

#[test]
fn unmatched_varyings_fail_at_link_time() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v1();
    let source = r#"
#ifdef VERTEX_SHADER
attribute vec4 aPosition;
void main() { gl_Position = aPosition; }
#endif
#ifdef FRAGMENT_SHADER
precision mediump float;
varying vec2 vTexCoord;
void main() { gl_FragColor = vec4(vTexCoord, 0.0, 1.0); }
#endif
"#;

    // --- 2. ACT ---
    let result = ctx.create_program(&ProgramDescriptor::new(source).with_label("broken"));

    // --- 3. ASSERT ---
    match result {
        Err(ContextError::Shader(ShaderError::Link { log })) => assert!(
            log.contains("Fragment input 'vTexCoord' is not written by the vertex shader"),
            "Unexpected log: {log}"
        ),
        other => panic!("Expected a link error, got {other:?}"),
    }
}

#[test]
fn glsl_es_300_is_rejected_by_version_1() {
    let mut ctx = context_v1();

    let result = ctx.create_program(&ProgramDescriptor::new(BLOCK_PROGRAM));

    assert!(
        matches!(
            result,
            Err(ContextError::Shader(ShaderError::UnsupportedDialect {
                version: ApiVersion::V1,
                ..
            }))
        ),
        "Got {result:?}"
    );
}

#[test]
fn unknown_version_directives_are_rejected() {
    let mut ctx = context_v2();
    let source = "#version 310 es\nvoid main() {}\n";

    let result = ctx.create_program(&ProgramDescriptor::new(source));

    assert!(
        matches!(
            result,
            Err(ContextError::Shader(ShaderError::UnsupportedDialect { .. }))
        ),
        "Got {result:?}"
    );
}

#[test]
fn uniform_blocks_are_bound_to_the_requested_points() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let descriptor = ProgramDescriptor::new(BLOCK_PROGRAM)
        .with_uniform_block("Material", 3)
        .with_uniform_block("Lights", 1);

    // --- 2. ACT ---
    let program = ctx.create_program(&descriptor).expect("valid ES 3.00 program");
    let reflection = ctx.program_reflection(program).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(reflection.block_binding("Material"), Some(3));
    assert_eq!(
        reflection.block_binding("Lights"),
        None,
        "A block the program lacks is skipped, not an error"
    );
    assert!(reflection.uniform("baseColor").is_none(), "Block members are not loose uniforms");
}

#[test]
fn uniform_block_requests_respect_the_version_and_limits() {
    let mut v1 = context_v1();
    let legacy = ProgramDescriptor::new(COLOR_PROGRAM).with_uniform_block("Material", 0);
    assert!(matches!(
        v1.create_program(&legacy),
        Err(ContextError::Unsupported(_))
    ));

    let mut v2 = context_v2();
    let limit = v2.capabilities().max_uniform_buffer_bindings;
    let beyond = ProgramDescriptor::new(BLOCK_PROGRAM).with_uniform_block("Material", limit);
    assert!(matches!(
        v2.create_program(&beyond),
        Err(ContextError::InvalidArgument(_))
    ));
}

#[test]
fn program_uniform_writes_are_validated() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let program = ctx
        .create_program(&ProgramDescriptor::new(COLOR_PROGRAM))
        .unwrap();

    // --- 2. ACT & 3. ASSERT ---
    assert!(
        matches!(
            ctx.set_program_uniform("uAlpha", 0.5f32),
            Err(ContextError::PreconditionViolation(_))
        ),
        "Writing without a bound program must fail"
    );

    ctx.bind_program(Some(program)).unwrap();
    assert_eq!(
        ctx.set_program_uniform("uMissing", 1.0f32),
        Err(ContextError::UnknownUniform {
            name: "uMissing".to_string()
        })
    );
    assert!(matches!(
        ctx.set_program_uniform("uAlpha", Vec3::new(1.0, 0.0, 0.0)),
        Err(ContextError::TypeMismatch(_))
    ));
    assert!(matches!(
        ctx.set_program_uniform("uModelViewProjectionMatrix", 1i32),
        Err(ContextError::TypeMismatch(_))
    ));
    ctx.set_program_uniform("uAlpha", 0.5f32)
        .expect("a float fits a float uniform");
    ctx.set_program_uniform("uModelViewProjectionMatrix", Mat4::IDENTITY)
        .expect("a matrix fits a mat4 uniform");
}

#[test]
fn uniform_values_reach_the_draw() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    common::ready_to_draw(&mut ctx);

    // --- 2. ACT ---
    ctx.set_program_uniform("uAlpha", 0.25f32).unwrap();
    ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3).unwrap();

    // --- 3. ASSERT ---
    let draw = ctx.device().last_draw().expect("one draw was issued");
    assert_eq!(draw.uniform("uAlpha"), Some(&UniformValue::Float(0.25)));
}

#[test]
fn destroying_the_bound_program_makes_the_next_draw_stale() {
    let mut ctx = context_v1();
    let (program, _) = common::ready_to_draw(&mut ctx);

    ctx.destroy_program(program).unwrap();

    assert_eq!(ctx.bound_program(), Some(program), "The record outlives the program");
    assert_eq!(ctx.device().current_program(), None);
    assert_eq!(
        ctx.draw_arrays(PrimitiveKind::Triangles, 0, 3),
        Err(ContextError::StaleHandle {
            kind: ResourceType::Program
        })
    );
    assert!(matches!(
        ctx.set_program_uniform("uAlpha", 1.0f32),
        Err(ContextError::StaleHandle { .. })
    ));
}

#[test]
fn the_same_source_compiles_into_independent_programs() {
    // --- 1. ARRANGE ---
    let mut ctx = context_v2();
    let descriptor = ProgramDescriptor::new(BLOCK_PROGRAM).with_uniform_block("Material", 5);

    // --- 2. ACT ---
    let first = ctx.create_program(&descriptor).unwrap();
    let second = ctx.create_program(&descriptor).unwrap();

    // --- 3. ASSERT ---
    assert_ne!(first, second);
    assert_eq!(
        ctx.program_reflection(first).unwrap(),
        ctx.program_reflection(second).unwrap()
    );
    ctx.destroy_program(first).unwrap();
    assert!(!ctx.is_valid(first));
    assert_eq!(
        ctx.program_reflection(second).unwrap().block_binding("Material"),
        Some(5),
        "Destroying one program leaves the other intact"
    );
}
