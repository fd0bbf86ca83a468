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

use crate::math::{Extent2D, Rect};
use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};
use std::fmt::Debug;

/// The native command surface a [`Context`](crate::context::Context) drives.
///
/// A device owns the native objects and executes commands that the context has already
/// validated: handles are live, kinds match, sizes are in range and the negotiated version
/// supports the operation. Devices keep GL-style bind state, so commands act on whatever was
/// last bound through the `bind_*`/`use_program` calls.
pub trait GraphicsDevice: Debug + 'static {
    /// Native buffer object.
    type Buffer: Debug;
    /// Native texture object.
    type Texture: Debug;
    /// Native linked program.
    type Program: Debug;
    /// Native uniform location inside a program.
    type UniformLocation: Debug + Clone;
    /// Native framebuffer object.
    type Framebuffer: Debug;
    /// Native vertex array, or its emulation where the API lacks one.
    type VertexArray: Debug;

    /// Describes the driver.
    fn adapter_info(&self) -> AdapterInfo;

    /// The highest API version the device can run.
    fn max_api_version(&self) -> ApiVersion;

    /// The limits of the device when running `version`.
    fn capabilities(&self, version: ApiVersion) -> Capabilities;

    /// Switches the device to the negotiated `version` and sets up default state.
    /// ## Arguments
    /// * `version` - The version negotiated by the context, never above [`Self::max_api_version`].
    /// * `surface_size` - The size of the default surface.
    /// ## Errors
    /// * `ResourceError` - If the device cannot be brought up at this version.
    fn initialize(&mut self, version: ApiVersion, surface_size: Extent2D) -> Result<(), ResourceError>;

    /// Informs the device that the default surface changed size.
    fn resize_surface(&mut self, size: Extent2D);

    /// Creates a buffer and uploads `data` to it.
    /// ## Arguments
    /// * `kind` - What the buffer will be bound as.
    /// * `data` - The initial contents; its length is the buffer size.
    /// * `usage` - Update frequency hint.
    /// ## Returns
    /// The native buffer.
    /// ## Errors
    /// * `ResourceError` - If the backend cannot allocate the buffer.
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<Self::Buffer, ResourceError>;

    /// Replaces the whole contents of a buffer, reallocating its storage to `data.len()`.
    fn set_buffer_data(
        &mut self,
        buffer: &Self::Buffer,
        kind: BufferKind,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<(), ResourceError>;

    /// Overwrites `data.len()` bytes starting at `offset`. The range is already bounds-checked.
    fn write_buffer(
        &mut self,
        buffer: &Self::Buffer,
        kind: BufferKind,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Releases a buffer.
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Binds a uniform buffer to a binding point, or clears the binding point.
    fn bind_uniform_buffer(&mut self, binding: u32, buffer: Option<&Self::Buffer>);

    /// Creates a 2D texture, optionally with initial contents of `descriptor.byte_len()` bytes.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<Self::Texture, ResourceError>;

    /// Reallocates a texture at a new size. The contents are undefined afterwards.
    fn resize_texture(
        &mut self,
        texture: &Self::Texture,
        format: TextureFormat,
        size: Extent2D,
    ) -> Result<(), ResourceError>;

    /// Releases a texture.
    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Binds a texture to a texture unit, or unbinds the unit.
    fn bind_texture(&mut self, unit: u32, texture: Option<&Self::Texture>);

    /// Compiles both stages and links them into a program.
    ///
    /// Every name in `attribute_locations` is bound to its location before linking.
    /// Nothing stays allocated when this fails.
    /// ## Errors
    /// * `ShaderError::Compile` - With the failing stage and its info log.
    /// * `ShaderError::Link` - With the link info log.
    fn create_program(
        &mut self,
        stages: &StageSources,
        attribute_locations: &[(&str, u32)],
    ) -> Result<Self::Program, ShaderError>;

    /// Active attributes and uniforms of a linked program. Uniform blocks are left empty.
    fn reflect_program(&mut self, program: &Self::Program) -> ProgramReflection;

    /// Binds the named uniform block to `binding`. Returns `false` if the program has no
    /// such active block.
    fn bind_uniform_block(&mut self, program: &Self::Program, name: &str, binding: u32) -> bool;

    /// Looks up the location of an active uniform.
    fn uniform_location(
        &mut self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;

    /// Writes a uniform of the program currently in use.
    fn set_uniform(&mut self, location: &Self::UniformLocation, value: &UniformValue);

    /// Releases a program.
    fn destroy_program(&mut self, program: Self::Program);

    /// Makes a program current, or clears the current program.
    fn use_program(&mut self, program: Option<&Self::Program>);

    /// Captures an attribute layout and an optional index buffer.
    fn create_vertex_array(
        &mut self,
        attributes: &[VertexBinding<'_, Self::Buffer>],
        index_buffer: Option<&Self::Buffer>,
    ) -> Result<Self::VertexArray, ResourceError>;

    /// Releases a vertex array. The buffers it references stay alive.
    fn destroy_vertex_array(&mut self, vertex_array: Self::VertexArray);

    /// Binds a vertex array, or unbinds the current one.
    fn bind_vertex_array(&mut self, vertex_array: Option<&Self::VertexArray>);

    /// Assembles a framebuffer from existing textures.
    /// ## Errors
    /// * `ResourceError::IncompleteFramebuffer` - If the attachments do not form a complete framebuffer.
    fn create_framebuffer(
        &mut self,
        color_attachments: &[&Self::Texture],
        depth_attachment: Option<&Self::Texture>,
    ) -> Result<Self::Framebuffer, ResourceError>;

    /// Releases a framebuffer object. Its attachment textures are released separately.
    fn destroy_framebuffer(&mut self, framebuffer: Self::Framebuffer);

    /// Binds a framebuffer as draw and read target. `None` selects the default surface.
    fn bind_framebuffer(&mut self, framebuffer: Option<&Self::Framebuffer>);

    /// Sets the viewport rectangle.
    fn set_viewport(&mut self, rect: Rect);

    /// Sets the scissor test and rectangle.
    fn set_scissor(&mut self, state: ScissorState);

    /// Enables or disables depth testing.
    fn set_depth_test(&mut self, enabled: bool);

    /// Sets the clear color.
    fn set_clear_color(&mut self, color: [f32; 4]);

    /// Clears the selected planes of the bound target, honouring the scissor.
    fn clear(&mut self, mask: ClearMask);

    /// Issues a non-indexed draw.
    fn draw_arrays(&mut self, primitive: PrimitiveKind, first: u32, count: u32);

    /// Issues an indexed draw of the first `count` indices of the bound vertex array.
    fn draw_elements(&mut self, primitive: PrimitiveKind, count: u32, format: IndexFormat);

    /// Copies `src_rect` of a color attachment into `dst_rect` of the default surface.
    ///
    /// Only called on devices whose capabilities report `framebuffer_blit`. Leaves the
    /// framebuffer binding unspecified; the caller restores it.
    fn blit_to_surface(
        &mut self,
        source: &Self::Framebuffer,
        color_attachment: u32,
        src_rect: Rect,
        dst_rect: Rect,
        filter: BlitFilter,
    ) -> Result<(), ResourceError>;

    /// Reads RGBA8 pixels of `rect` from color attachment 0 of the bound target.
    ///
    /// Rows are returned bottom to top.
    fn read_pixels(&mut self, rect: Rect) -> Result<Vec<u8>, ResourceError>;
}
