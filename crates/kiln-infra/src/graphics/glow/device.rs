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

use super::conversions::{framebuffer_status_name, glsl_type, pixel_format, IntoGl};
use glow::HasContext;
use kiln_core::math::{Extent2D, Rect};
use kiln_core::renderer::api::*;
use kiln_core::renderer::{GraphicsDevice, ResourceError, ShaderError};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

type GlBuffer = <glow::Context as HasContext>::Buffer;
type GlTexture = <glow::Context as HasContext>::Texture;
type GlProgram = <glow::Context as HasContext>::Program;
type GlFramebuffer = <glow::Context as HasContext>::Framebuffer;
type GlNativeVertexArray = <glow::Context as HasContext>::VertexArray;
type GlUniformLocation = <glow::Context as HasContext>::UniformLocation;

/// A framebuffer object and the number of color attachments it routes.
#[derive(Debug)]
pub struct GlowFramebuffer {
    raw: GlFramebuffer,
    color_attachments: u32,
}

#[derive(Debug, Clone, Copy)]
struct AttributeLayout {
    location: u32,
    components: i32,
    offset: i32,
    stride: i32,
    buffer: GlBuffer,
}

/// A vertex array object, or the recorded layout it stands for on drivers without one.
#[derive(Debug)]
pub struct GlowVertexArray {
    native: Option<GlNativeVertexArray>,
    attributes: Vec<AttributeLayout>,
    index_buffer: Option<GlBuffer>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Extensions {
    draw_buffers: bool,
    depth_texture: bool,
    element_index_uint: bool,
    vertex_array_object: bool,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_texture_units: u32,
    max_vertex_attribs: u32,
    max_texture_size: u32,
    max_color_attachments: u32,
    max_uniform_buffer_bindings: u32,
}

/// Shadow copy of the GL bindings, so creation can restore what was bound.
#[derive(Debug, Default)]
struct Bindings {
    program: Option<GlProgram>,
    vertex_array: Option<GlNativeVertexArray>,
    index_buffer: Option<GlBuffer>,
    enabled_attributes: BTreeSet<u32>,
    framebuffer: Option<GlFramebuffer>,
    active_unit: u32,
    textures: HashMap<u32, GlTexture>,
}

/// A [`GraphicsDevice`] on top of a `glow` context.
pub struct GlowDevice {
    gl: Arc<glow::Context>,
    info: AdapterInfo,
    max_version: ApiVersion,
    version: ApiVersion,
    extensions: Extensions,
    limits: Limits,
    native_vertex_arrays: bool,
    surface_size: Extent2D,
    bindings: Bindings,
}

impl fmt::Debug for GlowDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlowDevice")
            .field("info", &self.info)
            .field("version", &self.version)
            .field("extensions", &self.extensions)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn has_extension(extensions: &HashSet<String>, names: &[&str]) -> bool {
    names.iter().any(|name| extensions.contains(*name))
}

fn get_u32(gl: &glow::Context, parameter: u32) -> u32 {
    // SAFETY: plain integer query on the current context.
    unsafe { gl.get_parameter_i32(parameter) }.max(0) as u32
}

impl GlowDevice {
    /// Wraps a `glow` context and probes its version, extensions and limits.
    ///
    /// # Safety
    /// The GL context behind `gl` must be current on the calling thread whenever the device
    /// is used, and nothing else may change its bindings behind the device's back.
    pub unsafe fn new(gl: Arc<glow::Context>) -> anyhow::Result<Self> {
        let version = gl.version();
        let max_version = if version.is_embedded {
            match version.major {
                0 | 1 => anyhow::bail!(
                    "OpenGL ES {}.{} is older than 2.0",
                    version.major,
                    version.minor
                ),
                2 => ApiVersion::V1,
                _ => ApiVersion::V2,
            }
        } else if (version.major, version.minor) >= (4, 3) {
            ApiVersion::V2
        } else if version.major >= 2 {
            ApiVersion::V1
        } else {
            anyhow::bail!("OpenGL {}.{} is older than 2.0", version.major, version.minor);
        };

        let supported = gl.supported_extensions();
        let extensions = Extensions {
            draw_buffers: has_extension(supported, &["GL_EXT_draw_buffers", "WEBGL_draw_buffers"]),
            depth_texture: has_extension(
                supported,
                &["GL_OES_depth_texture", "WEBGL_depth_texture", "GL_ARB_depth_texture"],
            ),
            element_index_uint: has_extension(
                supported,
                &["GL_OES_element_index_uint", "OES_element_index_uint"],
            ),
            vertex_array_object: has_extension(
                supported,
                &["GL_OES_vertex_array_object", "OES_vertex_array_object", "GL_ARB_vertex_array_object"],
            ),
        };

        let mrt = max_version == ApiVersion::V2 || extensions.draw_buffers;
        let limits = Limits {
            max_texture_units: get_u32(&gl, glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
            max_vertex_attribs: get_u32(&gl, glow::MAX_VERTEX_ATTRIBS),
            max_texture_size: get_u32(&gl, glow::MAX_TEXTURE_SIZE),
            max_color_attachments: if mrt {
                get_u32(&gl, glow::MAX_COLOR_ATTACHMENTS).min(get_u32(&gl, glow::MAX_DRAW_BUFFERS))
            } else {
                1
            },
            max_uniform_buffer_bindings: if max_version == ApiVersion::V2 {
                get_u32(&gl, glow::MAX_UNIFORM_BUFFER_BINDINGS)
            } else {
                0
            },
        };

        let info = AdapterInfo {
            vendor: gl.get_parameter_string(glow::VENDOR),
            renderer: gl.get_parameter_string(glow::RENDERER),
            version: gl.get_parameter_string(glow::VERSION),
        };
        log::info!(
            "GlowDevice: {} on {} ({}), up to API {max_version}",
            info.renderer,
            info.vendor,
            info.version
        );
        log::debug!("GlowDevice: {extensions:?} {limits:?}");

        Ok(Self {
            gl,
            info,
            max_version,
            version: max_version,
            extensions,
            limits,
            native_vertex_arrays: max_version == ApiVersion::V2 || extensions.vertex_array_object,
            surface_size: Extent2D::new(1, 1),
            bindings: Bindings::default(),
        })
    }

    /// The wrapped `glow` context.
    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    /// Size of the default surface as last reported.
    pub fn surface_size(&self) -> Extent2D {
        self.surface_size
    }

    fn check_error(&self, what: &str) -> Result<(), ResourceError> {
        // SAFETY: the context is current per the constructor contract.
        let error = unsafe { self.gl.get_error() };
        if error == glow::NO_ERROR {
            Ok(())
        } else {
            Err(ResourceError::BackendError(format!(
                "{what} raised GL error 0x{error:04X}"
            )))
        }
    }

    /// Binds `buffer` to the target of `kind`, runs `f` and restores the previous bindings.
    /// Index buffers are element state of the bound vertex array, which is set aside first.
    unsafe fn with_buffer<R>(&self, kind: BufferKind, buffer: GlBuffer, f: impl FnOnce(&glow::Context, u32) -> R) -> R {
        let gl = &self.gl;
        let target = kind.into_gl();
        let suspend_vao = kind == BufferKind::Index && self.bindings.vertex_array.is_some();
        if suspend_vao {
            gl.bind_vertex_array(None);
        }
        gl.bind_buffer(target, Some(buffer));
        let result = f(gl, target);
        if suspend_vao {
            gl.bind_vertex_array(self.bindings.vertex_array);
        } else if kind == BufferKind::Index {
            gl.bind_buffer(target, self.bindings.index_buffer);
        } else {
            gl.bind_buffer(target, None);
        }
        result
    }

    /// Binds `texture` on the active unit, runs `f` and restores the unit's texture.
    unsafe fn with_texture<R>(&self, texture: GlTexture, f: impl FnOnce(&glow::Context) -> R) -> R {
        let gl = &self.gl;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        let result = f(gl);
        gl.bind_texture(
            glow::TEXTURE_2D,
            self.bindings.textures.get(&self.bindings.active_unit).copied(),
        );
        result
    }

    unsafe fn compile_stage(&self, stage: ShaderStage, source: &str) -> Result<<glow::Context as HasContext>::Shader, ShaderError> {
        let gl = &self.gl;
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let shader = gl
            .create_shader(kind)
            .map_err(|log| ShaderError::Compile { stage, log })?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(ShaderError::Compile { stage, log });
        }
        Ok(shader)
    }

    unsafe fn apply_emulated_layout(&mut self, vertex_array: Option<&GlowVertexArray>) {
        let gl = &self.gl;
        let wanted: BTreeSet<u32> = vertex_array
            .map(|va| va.attributes.iter().map(|a| a.location).collect())
            .unwrap_or_default();
        for location in self.bindings.enabled_attributes.difference(&wanted) {
            gl.disable_vertex_attrib_array(*location);
        }
        if let Some(va) = vertex_array {
            for attribute in &va.attributes {
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(attribute.buffer));
                gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.components,
                    glow::FLOAT,
                    false,
                    attribute.stride,
                    attribute.offset,
                );
                gl.enable_vertex_attrib_array(attribute.location);
            }
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        let index_buffer = vertex_array.and_then(|va| va.index_buffer);
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index_buffer);
        self.bindings.index_buffer = index_buffer;
        self.bindings.enabled_attributes = wanted;
    }
}

impl GraphicsDevice for GlowDevice {
    type Buffer = GlBuffer;
    type Texture = GlTexture;
    type Program = GlProgram;
    type UniformLocation = GlUniformLocation;
    type Framebuffer = GlowFramebuffer;
    type VertexArray = GlowVertexArray;

    fn adapter_info(&self) -> AdapterInfo {
        self.info.clone()
    }

    fn max_api_version(&self) -> ApiVersion {
        self.max_version
    }

    fn capabilities(&self, version: ApiVersion) -> Capabilities {
        let limits = self.limits;
        match version {
            ApiVersion::V1 => Capabilities {
                max_color_attachments: if self.extensions.draw_buffers {
                    limits.max_color_attachments
                } else {
                    1
                },
                uniform_buffer_objects: false,
                vertex_array_objects: self.extensions.vertex_array_object,
                framebuffer_blit: false,
                depth_textures: self.extensions.depth_texture,
                element_index_uint: self.extensions.element_index_uint,
                max_texture_units: limits.max_texture_units,
                max_vertex_attribs: limits.max_vertex_attribs,
                max_texture_size: limits.max_texture_size,
                max_uniform_buffer_bindings: 0,
            },
            ApiVersion::V2 => Capabilities {
                max_color_attachments: limits.max_color_attachments,
                uniform_buffer_objects: true,
                vertex_array_objects: true,
                framebuffer_blit: true,
                depth_textures: true,
                element_index_uint: true,
                max_texture_units: limits.max_texture_units,
                max_vertex_attribs: limits.max_vertex_attribs,
                max_texture_size: limits.max_texture_size,
                max_uniform_buffer_bindings: limits.max_uniform_buffer_bindings,
            },
        }
    }

    fn initialize(&mut self, version: ApiVersion, surface_size: Extent2D) -> Result<(), ResourceError> {
        if version > self.max_version {
            return Err(ResourceError::BackendError(format!(
                "API {version} is not available on {} (max {})",
                self.info.renderer, self.max_version
            )));
        }
        self.version = version;
        self.native_vertex_arrays = self.capabilities(version).vertex_array_objects;
        self.surface_size = surface_size.at_least_one();
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            let gl = &self.gl;
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.depth_func(glow::LESS);
            gl.clear_depth_f32(1.0);
        }
        log::info!(
            "GlowDevice: Initialized API {version} ({} vertex arrays)",
            if self.native_vertex_arrays { "native" } else { "emulated" }
        );
        self.check_error("initialization")
    }

    fn resize_surface(&mut self, size: Extent2D) {
        self.surface_size = size.at_least_one();
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8], usage: BufferUsage) -> Result<GlBuffer, ResourceError> {
        // SAFETY: the context is current per the constructor contract.
        let buffer = unsafe { self.gl.create_buffer() }.map_err(ResourceError::BackendError)?;
        unsafe {
            self.with_buffer(kind, buffer, |gl, target| {
                gl.buffer_data_u8_slice(target, data, usage.into_gl())
            });
        }
        if let Err(err) = self.check_error("buffer creation") {
            unsafe { self.gl.delete_buffer(buffer) };
            return Err(err);
        }
        log::trace!("GlowDevice: Created {kind} {buffer:?} ({} bytes)", data.len());
        Ok(buffer)
    }

    fn set_buffer_data(&mut self, buffer: &GlBuffer, kind: BufferKind, data: &[u8], usage: BufferUsage) -> Result<(), ResourceError> {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            self.with_buffer(kind, *buffer, |gl, target| {
                gl.buffer_data_u8_slice(target, data, usage.into_gl())
            });
        }
        self.check_error("buffer upload")
    }

    fn write_buffer(&mut self, buffer: &GlBuffer, kind: BufferKind, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        let offset = i32::try_from(offset).map_err(|_| ResourceError::OutOfBounds {
            offset,
            len: data.len(),
            size: i32::MAX as usize,
        })?;
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            self.with_buffer(kind, *buffer, |gl, target| {
                gl.buffer_sub_data_u8_slice(target, offset, data)
            });
        }
        self.check_error("buffer write")
    }

    fn destroy_buffer(&mut self, buffer: GlBuffer) {
        if self.bindings.index_buffer == Some(buffer) {
            self.bindings.index_buffer = None;
        }
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.delete_buffer(buffer) };
        log::trace!("GlowDevice: Destroyed buffer {buffer:?}");
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: Option<&GlBuffer>) {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            self.gl
                .bind_buffer_base(glow::UNIFORM_BUFFER, binding, buffer.copied())
        };
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor, data: Option<&[u8]>) -> Result<GlTexture, ResourceError> {
        let pixel = pixel_format(descriptor.format, self.version);
        let filter = descriptor.filter.into_gl() as i32;
        let size = descriptor.size;
        // SAFETY: the context is current per the constructor contract.
        let texture = unsafe { self.gl.create_texture() }.map_err(ResourceError::BackendError)?;
        unsafe {
            self.with_texture(texture, |gl| {
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    pixel.internal,
                    size.width as i32,
                    size.height as i32,
                    0,
                    pixel.format,
                    pixel.ty,
                    data,
                );
            });
        }
        if let Err(err) = self.check_error("texture creation") {
            unsafe { self.gl.delete_texture(texture) };
            return Err(err);
        }
        log::debug!(
            "GlowDevice: Created texture {texture:?} '{}' {}x{} {:?}",
            descriptor.label.as_deref().unwrap_or("unlabeled"),
            size.width,
            size.height,
            descriptor.format
        );
        Ok(texture)
    }

    fn resize_texture(&mut self, texture: &GlTexture, format: TextureFormat, size: Extent2D) -> Result<(), ResourceError> {
        let pixel = pixel_format(format, self.version);
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            self.with_texture(*texture, |gl| {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    pixel.internal,
                    size.width as i32,
                    size.height as i32,
                    0,
                    pixel.format,
                    pixel.ty,
                    None,
                );
            });
        }
        self.check_error("texture resize")
    }

    fn destroy_texture(&mut self, texture: GlTexture) {
        self.bindings.textures.retain(|_, bound| *bound != texture);
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.delete_texture(texture) };
        log::trace!("GlowDevice: Destroyed texture {texture:?}");
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&GlTexture>) {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            if unit != self.bindings.active_unit {
                self.gl.active_texture(glow::TEXTURE0 + unit);
                self.bindings.active_unit = unit;
            }
            self.gl.bind_texture(glow::TEXTURE_2D, texture.copied());
        }
        match texture {
            Some(texture) => self.bindings.textures.insert(unit, *texture),
            None => self.bindings.textures.remove(&unit),
        };
    }

    fn create_program(&mut self, stages: &StageSources, attribute_locations: &[(&str, u32)]) -> Result<GlProgram, ShaderError> {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            let vertex = self.compile_stage(ShaderStage::Vertex, &stages.vertex)?;
            let fragment = match self.compile_stage(ShaderStage::Fragment, &stages.fragment) {
                Ok(shader) => shader,
                Err(err) => {
                    self.gl.delete_shader(vertex);
                    return Err(err);
                }
            };
            let gl = &self.gl;
            let program = match gl.create_program() {
                Ok(program) => program,
                Err(log) => {
                    gl.delete_shader(vertex);
                    gl.delete_shader(fragment);
                    return Err(ShaderError::Link { log });
                }
            };
            for (name, location) in attribute_locations {
                gl.bind_attrib_location(program, *location, name);
            }
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);
            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(ShaderError::Link { log });
            }
            Ok(program)
        }
    }

    fn reflect_program(&mut self, program: &GlProgram) -> ProgramReflection {
        let gl = &self.gl;
        let mut reflection = ProgramReflection::default();
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            for index in 0..gl.get_active_attributes(*program) {
                let Some(active) = gl.get_active_attribute(*program, index) else {
                    continue;
                };
                if active.name.starts_with("gl_") {
                    continue;
                }
                let (Some(ty), Some(location)) = (
                    glsl_type(active.atype),
                    gl.get_attrib_location(*program, &active.name),
                ) else {
                    log::debug!("GlowDevice: Skipping attribute '{}'", active.name);
                    continue;
                };
                reflection.attributes.push(AttributeInfo {
                    name: active.name,
                    location,
                    ty,
                });
            }

            for index in 0..gl.get_active_uniforms(*program) {
                let Some(active) = gl.get_active_uniform(*program, index) else {
                    continue;
                };
                // Members of named uniform blocks have no location.
                if gl.get_uniform_location(*program, &active.name).is_none() {
                    continue;
                }
                let Some(ty) = glsl_type(active.utype) else {
                    log::debug!("GlowDevice: Skipping uniform '{}'", active.name);
                    continue;
                };
                let name = active
                    .name
                    .strip_suffix("[0]")
                    .unwrap_or(&active.name)
                    .to_owned();
                reflection.uniforms.push(UniformInfo {
                    name,
                    ty,
                    array_len: active.size.max(1) as u32,
                });
            }
        }
        reflection.attributes.sort_by_key(|a| a.location);
        reflection
    }

    fn bind_uniform_block(&mut self, program: &GlProgram, name: &str, binding: u32) -> bool {
        if self.version == ApiVersion::V1 {
            return false;
        }
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            match self.gl.get_uniform_block_index(*program, name) {
                Some(index) => {
                    self.gl.uniform_block_binding(*program, index, binding);
                    true
                }
                None => false,
            }
        }
    }

    fn uniform_location(&mut self, program: &GlProgram, name: &str) -> Option<GlUniformLocation> {
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.get_uniform_location(*program, name) }
    }

    fn set_uniform(&mut self, location: &GlUniformLocation, value: &UniformValue) {
        let gl = &self.gl;
        let loc = Some(location);
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            match *value {
                UniformValue::Int(v) => gl.uniform_1_i32(loc, v),
                UniformValue::IVec2([x, y]) => gl.uniform_2_i32(loc, x, y),
                UniformValue::IVec3([x, y, z]) => gl.uniform_3_i32(loc, x, y, z),
                UniformValue::IVec4([x, y, z, w]) => gl.uniform_4_i32(loc, x, y, z, w),
                UniformValue::Float(v) => gl.uniform_1_f32(loc, v),
                UniformValue::Vec2([x, y]) => gl.uniform_2_f32(loc, x, y),
                UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(loc, x, y, z),
                UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(loc, x, y, z, w),
                UniformValue::Mat2(m) => gl.uniform_matrix_2_f32_slice(loc, false, &m),
                UniformValue::Mat3(m) => gl.uniform_matrix_3_f32_slice(loc, false, &m),
                UniformValue::Mat4(m) => {
                    gl.uniform_matrix_4_f32_slice(loc, false, bytemuck::cast_slice(&m.cols))
                }
            }
        }
    }

    fn destroy_program(&mut self, program: GlProgram) {
        if self.bindings.program == Some(program) {
            self.bindings.program = None;
        }
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.delete_program(program) };
    }

    fn use_program(&mut self, program: Option<&GlProgram>) {
        self.bindings.program = program.copied();
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.use_program(program.copied()) };
    }

    fn create_vertex_array(&mut self, attributes: &[VertexBinding<'_, GlBuffer>], index_buffer: Option<&GlBuffer>) -> Result<GlowVertexArray, ResourceError> {
        let layout: Vec<AttributeLayout> = attributes
            .iter()
            .map(|a| AttributeLayout {
                location: a.location,
                components: i32::from(a.components),
                offset: a.offset as i32,
                stride: a.stride as i32,
                buffer: *a.buffer,
            })
            .collect();
        let index_buffer = index_buffer.copied();
        if !self.native_vertex_arrays {
            return Ok(GlowVertexArray {
                native: None,
                attributes: layout,
                index_buffer,
            });
        }
        // SAFETY: the context is current per the constructor contract.
        let native = unsafe {
            let gl = &self.gl;
            let native = gl.create_vertex_array().map_err(ResourceError::BackendError)?;
            gl.bind_vertex_array(Some(native));
            for attribute in &layout {
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(attribute.buffer));
                gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.components,
                    glow::FLOAT,
                    false,
                    attribute.stride,
                    attribute.offset,
                );
                gl.enable_vertex_attrib_array(attribute.location);
            }
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index_buffer);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_vertex_array(self.bindings.vertex_array);
            native
        };
        if let Err(err) = self.check_error("vertex array creation") {
            unsafe { self.gl.delete_vertex_array(native) };
            return Err(err);
        }
        Ok(GlowVertexArray {
            native: Some(native),
            attributes: layout,
            index_buffer,
        })
    }

    fn destroy_vertex_array(&mut self, vertex_array: GlowVertexArray) {
        if let Some(native) = vertex_array.native {
            if self.bindings.vertex_array == Some(native) {
                self.bindings.vertex_array = None;
                self.bindings.index_buffer = None;
            }
            // SAFETY: the context is current per the constructor contract.
            unsafe { self.gl.delete_vertex_array(native) };
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<&GlowVertexArray>) {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            if self.native_vertex_arrays {
                let native = vertex_array.and_then(|va| va.native);
                self.gl.bind_vertex_array(native);
                self.bindings.vertex_array = native;
                self.bindings.index_buffer = vertex_array.and_then(|va| va.index_buffer);
            } else {
                self.apply_emulated_layout(vertex_array);
            }
        }
    }

    fn create_framebuffer(&mut self, color_attachments: &[&GlTexture], depth_attachment: Option<&GlTexture>) -> Result<GlowFramebuffer, ResourceError> {
        let mrt = self.version == ApiVersion::V2 || self.extensions.draw_buffers;
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            let gl = &self.gl;
            let raw = gl.create_framebuffer().map_err(ResourceError::BackendError)?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(raw));
            for (i, texture) in color_attachments.iter().enumerate() {
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0 + i as u32,
                    glow::TEXTURE_2D,
                    Some(**texture),
                    0,
                );
            }
            if let Some(texture) = depth_attachment {
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_ATTACHMENT,
                    glow::TEXTURE_2D,
                    Some(*texture),
                    0,
                );
            }
            if mrt {
                let buffers: Vec<u32> = if color_attachments.is_empty() {
                    vec![glow::NONE]
                } else {
                    (0..color_attachments.len() as u32)
                        .map(|i| glow::COLOR_ATTACHMENT0 + i)
                        .collect()
                };
                gl.draw_buffers(&buffers);
                if self.version == ApiVersion::V2 && color_attachments.is_empty() {
                    gl.read_buffer(glow::NONE);
                }
            }
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, self.bindings.framebuffer);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(raw);
                let status = framebuffer_status_name(status);
                log::error!("GlowDevice: Framebuffer incomplete: {status}");
                return Err(ResourceError::IncompleteFramebuffer(status));
            }
            log::debug!(
                "GlowDevice: Created framebuffer {raw:?} with {} color attachment(s){}",
                color_attachments.len(),
                if depth_attachment.is_some() { " and depth" } else { "" }
            );
            Ok(GlowFramebuffer {
                raw,
                color_attachments: color_attachments.len() as u32,
            })
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: GlowFramebuffer) {
        if self.bindings.framebuffer == Some(framebuffer.raw) {
            self.bindings.framebuffer = None;
        }
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.delete_framebuffer(framebuffer.raw) };
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&GlowFramebuffer>) {
        let raw = framebuffer.map(|fb| fb.raw);
        self.bindings.framebuffer = raw;
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, raw) };
    }

    fn set_viewport(&mut self, rect: Rect) {
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.viewport(rect.x, rect.y, rect.width, rect.height) };
    }

    fn set_scissor(&mut self, state: ScissorState) {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            if state.enabled {
                self.gl.enable(glow::SCISSOR_TEST);
            } else {
                self.gl.disable(glow::SCISSOR_TEST);
            }
            let rect = state.rect;
            self.gl.scissor(rect.x, rect.y, rect.width, rect.height);
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    fn clear(&mut self, mask: ClearMask) {
        // SAFETY: the context is current per the constructor contract.
        unsafe { self.gl.clear(mask.into_gl()) };
    }

    fn draw_arrays(&mut self, primitive: PrimitiveKind, first: u32, count: u32) {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            self.gl
                .draw_arrays(primitive.into_gl(), first as i32, count as i32)
        };
    }

    fn draw_elements(&mut self, primitive: PrimitiveKind, count: u32, format: IndexFormat) {
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            self.gl
                .draw_elements(primitive.into_gl(), count as i32, format.into_gl(), 0)
        };
    }

    fn blit_to_surface(
        &mut self,
        source: &GlowFramebuffer,
        color_attachment: u32,
        src_rect: Rect,
        dst_rect: Rect,
        filter: BlitFilter,
    ) -> Result<(), ResourceError> {
        if !self.capabilities(self.version).framebuffer_blit {
            return Err(ResourceError::BackendError(format!(
                "framebuffer blit is not available on API {}",
                self.version
            )));
        }
        if color_attachment >= source.color_attachments {
            return Err(ResourceError::BackendError(format!(
                "framebuffer has no color attachment {color_attachment}"
            )));
        }
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            let gl = &self.gl;
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(source.raw));
            gl.read_buffer(glow::COLOR_ATTACHMENT0 + color_attachment);
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
            gl.blit_framebuffer(
                src_rect.x,
                src_rect.y,
                src_rect.right(),
                src_rect.top(),
                dst_rect.x,
                dst_rect.y,
                dst_rect.right(),
                dst_rect.top(),
                glow::COLOR_BUFFER_BIT,
                filter.into_gl(),
            );
            gl.read_buffer(glow::COLOR_ATTACHMENT0);
            gl.bind_framebuffer(glow::FRAMEBUFFER, self.bindings.framebuffer);
        }
        self.check_error("framebuffer blit")
    }

    fn read_pixels(&mut self, rect: Rect) -> Result<Vec<u8>, ResourceError> {
        let mut pixels = vec![0u8; rect.width.max(0) as usize * rect.height.max(0) as usize * 4];
        // SAFETY: the context is current per the constructor contract.
        unsafe {
            self.gl.read_pixels(
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(&mut pixels),
            );
        }
        self.check_error("pixel readback")?;
        Ok(pixels)
    }
}
