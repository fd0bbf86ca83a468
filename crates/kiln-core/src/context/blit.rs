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

//! Copying framebuffer color output to the default surface.

use super::state::check_rect;
use super::Context;
use crate::math::Rect;
use crate::renderer::api::*;
use crate::renderer::error::ContextResult;
use crate::renderer::traits::GraphicsDevice;

const BLIT_SOURCE: &str = r#"
#ifdef VERTEX_SHADER
attribute vec2 aPosition;
attribute vec2 aTexCoord;
varying vec2 vTexCoord;
void main() {
    vTexCoord = aTexCoord;
    gl_Position = vec4(aPosition, 0.0, 1.0);
}
#endif
#ifdef FRAGMENT_SHADER
precision mediump float;
uniform sampler2D uTexture;
varying vec2 vTexCoord;
void main() {
    gl_FragColor = texture2D(uTexture, vTexCoord);
}
#endif
"#;

/// Interleaved `aPosition.xy, aTexCoord.xy` for a full-viewport triangle strip.
const QUAD: [f32; 16] = [
    -1.0, -1.0, 0.0, 0.0, //
    1.0, -1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, 1.0, //
    1.0, 1.0, 1.0, 1.0,
];

/// Native objects used to emulate a blit with a textured quad on version 1.
///
/// They are owned directly rather than registered, so they never show up as leaks.
pub(crate) struct LegacyBlitter<D: GraphicsDevice> {
    program: D::Program,
    sampler: Option<D::UniformLocation>,
    quad: D::Buffer,
    vertex_array: D::VertexArray,
}

impl<D: GraphicsDevice> LegacyBlitter<D> {
    fn new(device: &mut D) -> ContextResult<Self> {
        let stages = StageSources::split(BLIT_SOURCE);
        let program = device.create_program(&stages, &RESERVED_ATTRIBUTE_LOCATIONS)?;
        let sampler = device.uniform_location(&program, "uTexture");
        let quad = match device.create_buffer(
            BufferKind::Vertex,
            bytemuck::cast_slice(&QUAD),
            BufferUsage::Static,
        ) {
            Ok(quad) => quad,
            Err(err) => {
                device.destroy_program(program);
                return Err(err.into());
            }
        };
        let stride = 4 * COMPONENT_SIZE;
        let attributes = [
            VertexBinding {
                location: 0,
                components: 2,
                offset: 0,
                stride,
                buffer: &quad,
            },
            VertexBinding {
                location: 2,
                components: 2,
                offset: 2 * COMPONENT_SIZE,
                stride,
                buffer: &quad,
            },
        ];
        let vertex_array = match device.create_vertex_array(&attributes, None) {
            Ok(vertex_array) => vertex_array,
            Err(err) => {
                device.destroy_buffer(quad);
                device.destroy_program(program);
                return Err(err.into());
            }
        };
        Ok(Self {
            program,
            sampler,
            quad,
            vertex_array,
        })
    }

    pub(crate) fn release(self, device: &mut D) {
        device.destroy_vertex_array(self.vertex_array);
        device.destroy_buffer(self.quad);
        device.destroy_program(self.program);
    }
}

impl<D: GraphicsDevice> Context<D> {
    /// Copies a color attachment of `framebuffer`, scaled into `dest` on the default surface.
    ///
    /// Depth is untouched and the scissor state applies. Version 2 uses the native blit
    /// (linear filtering when scaling). Version 1 draws a textured quad instead, then
    /// restores program, vertex array, texture unit 0, viewport, depth test and framebuffer.
    /// ## Errors
    /// * `ContextError::InvalidArgument` - For a negative or overflowing `dest`, or a missing
    ///   attachment index.
    /// * `ContextError::StaleHandle` - If the framebuffer was destroyed.
    pub fn blit_framebuffer_to_screen(
        &mut self,
        framebuffer: FramebufferId,
        dest: Rect,
        color_attachment: u32,
    ) -> ContextResult<()> {
        check_rect(dest, "blit destination")?;
        let texture = self.get_framebuffer_color_attachment(framebuffer, color_attachment)?;
        if self.capabilities().framebuffer_blit {
            let entry = self.framebuffers.get(framebuffer)?;
            let src = entry.size.to_rect();
            let filter = BlitFilter::for_copy(src, dest);
            let result =
                self.device
                    .blit_to_surface(&entry.native, color_attachment, src, dest, filter);
            self.restore_framebuffer_binding();
            result?;
        } else {
            self.blit_with_quad(texture, dest)?;
        }
        Ok(())
    }

    fn blit_with_quad(&mut self, texture: TextureId, dest: Rect) -> ContextResult<()> {
        if self.blitter.is_none() {
            self.blitter = Some(LegacyBlitter::new(&mut self.device)?);
            log::debug!("Context: Built the textured-quad blitter");
        }
        let source = &self.textures.get(texture)?.native;
        if let Some(blitter) = &self.blitter {
            let device = &mut self.device;
            device.bind_framebuffer(None);
            device.set_viewport(dest);
            device.set_depth_test(false);
            device.use_program(Some(&blitter.program));
            if let Some(sampler) = &blitter.sampler {
                device.set_uniform(sampler, &UniformValue::Int(0));
            }
            device.bind_vertex_array(Some(&blitter.vertex_array));
            device.bind_texture(0, Some(source));
            device.draw_arrays(PrimitiveKind::TriangleStrip, 0, 4);
        }
        self.restore_after_quad_blit();
        Ok(())
    }

    fn restore_after_quad_blit(&mut self) {
        let program = self
            .bindings
            .program
            .and_then(|id| self.programs.get(id).ok())
            .map(|entry| &entry.native);
        self.device.use_program(program);

        let vertex_array = self
            .bindings
            .vertex_array
            .and_then(|id| self.vertex_arrays.get(id).ok())
            .map(|entry| &entry.native);
        self.device.bind_vertex_array(vertex_array);

        let unit0 = self
            .bindings
            .textures
            .get(&0)
            .and_then(|id| self.textures.get(*id).ok())
            .map(|entry| &entry.native);
        self.device.bind_texture(0, unit0);

        self.device.set_viewport(self.viewport.current());
        self.device.set_depth_test(self.depth_test);
        self.restore_framebuffer_binding();
    }

    fn restore_framebuffer_binding(&mut self) {
        let framebuffer = self
            .bindings
            .framebuffer
            .and_then(|id| self.framebuffers.get(id).ok())
            .map(|entry| &entry.native);
        self.device.bind_framebuffer(framebuffer);
    }
}
