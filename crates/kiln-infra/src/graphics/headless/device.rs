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

//! The [`GraphicsDevice`] implementation of the headless device.

use super::glsl::{self, FrontEnd, LinkedProgram};
use super::raster::Image;
use super::HeadlessConfig;
use kiln_core::math::{Extent2D, Rect};
use kiln_core::renderer::api::*;
use kiln_core::renderer::{GraphicsDevice, ResourceError, ShaderError};
use std::collections::{BTreeMap, HashMap};

macro_rules! native_names {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u32);

            impl $name {
                /// The object name, unique across all kinds on one device.
                pub fn raw(self) -> u32 {
                    self.0
                }
            }
        )*
    };
}

native_names!(
    /// A headless buffer object.
    HeadlessBuffer,
    /// A headless texture object.
    HeadlessTexture,
    /// A linked headless program.
    HeadlessProgram,
    /// A headless framebuffer object.
    HeadlessFramebuffer,
    /// A headless vertex array object.
    HeadlessVertexArray,
);

/// A uniform of one headless program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessUniformLocation {
    program: HeadlessProgram,
    index: u32,
}

/// One draw call as the device received it, with the state it ran under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Primitive assembly mode.
    pub primitive: PrimitiveKind,
    /// First vertex (non-indexed draws only).
    pub first: u32,
    /// Number of vertices or indices.
    pub count: u32,
    /// Index element type for indexed draws.
    pub index_format: Option<IndexFormat>,
    /// The current program.
    pub program: Option<HeadlessProgram>,
    /// The bound vertex array.
    pub vertex_array: Option<HeadlessVertexArray>,
    /// The bound framebuffer, `None` for the default surface.
    pub framebuffer: Option<HeadlessFramebuffer>,
    /// The viewport.
    pub viewport: Rect,
    /// The scissor test.
    pub scissor: ScissorState,
    /// Whether depth testing was on.
    pub depth_test: bool,
    /// Texture bound per unit.
    pub textures: BTreeMap<u32, HeadlessTexture>,
    /// Uniform buffer bound per binding point.
    pub uniform_buffers: BTreeMap<u32, HeadlessBuffer>,
    /// Every uniform of the current program that has been written, by name.
    pub uniforms: Vec<(String, UniformValue)>,
}

impl DrawRecord {
    /// The value a uniform had at draw time.
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

/// Per-kind counts of native objects alive on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveObjects {
    /// Buffers.
    pub buffers: usize,
    /// Textures.
    pub textures: usize,
    /// Programs.
    pub programs: usize,
    /// Vertex arrays.
    pub vertex_arrays: usize,
    /// Framebuffers.
    pub framebuffers: usize,
}

impl LiveObjects {
    /// Sum over all kinds.
    pub fn total(&self) -> usize {
        self.buffers + self.textures + self.programs + self.vertex_arrays + self.framebuffers
    }
}

#[derive(Debug)]
struct BufferData {
    kind: BufferKind,
    usage: BufferUsage,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct TextureData {
    filter: FilterMode,
    image: Image,
}

#[derive(Debug)]
struct ProgramData {
    linked: LinkedProgram,
    block_bindings: BTreeMap<String, u32>,
    values: BTreeMap<u32, UniformValue>,
}

#[derive(Debug, Clone, Copy)]
struct AttributeBinding {
    location: u32,
    components: u8,
    offset: u32,
    stride: u32,
    buffer: HeadlessBuffer,
}

#[derive(Debug)]
struct VertexArrayData {
    attributes: Vec<AttributeBinding>,
    index_buffer: Option<HeadlessBuffer>,
}

#[derive(Debug)]
struct FramebufferData {
    colors: Vec<HeadlessTexture>,
    depth: Option<HeadlessTexture>,
}

#[derive(Debug, Default)]
struct BoundState {
    program: Option<HeadlessProgram>,
    vertex_array: Option<HeadlessVertexArray>,
    framebuffer: Option<HeadlessFramebuffer>,
    textures: BTreeMap<u32, HeadlessTexture>,
    uniform_buffers: BTreeMap<u32, HeadlessBuffer>,
    viewport: Rect,
    scissor: ScissorState,
    depth_test: bool,
    clear_color: [f32; 4],
}

fn unknown(kind: &str, name: u32) -> ResourceError {
    ResourceError::BackendError(format!("unknown {kind} object {name}"))
}

fn clear_image(image: &mut Image, mask: ClearMask, clip: Option<Rect>, color: [f32; 4]) {
    let rect = clip.unwrap_or_else(|| image.bounds());
    if image.format.is_depth() {
        if mask.contains(ClearMask::DEPTH) {
            image.fill_depth(rect, 1.0);
        }
    } else if mask.contains(ClearMask::COLOR) {
        image.fill_color(rect, color);
    }
}

/// A software device that keeps every object in memory.
///
/// Behaves like a conforming GL implementation at the level the context relies on:
/// deleting a bound object unbinds it, uniform writes go to the current program only,
/// creation never disturbs bindings, and framebuffer completeness is checked.
#[derive(Debug)]
pub struct HeadlessDevice {
    config: HeadlessConfig,
    version: ApiVersion,
    next_name: u32,
    buffers: HashMap<HeadlessBuffer, BufferData>,
    textures: HashMap<HeadlessTexture, TextureData>,
    programs: HashMap<HeadlessProgram, ProgramData>,
    vertex_arrays: HashMap<HeadlessVertexArray, VertexArrayData>,
    framebuffers: HashMap<HeadlessFramebuffer, FramebufferData>,
    surface_color: Image,
    surface_depth: Image,
    state: BoundState,
    draws: Vec<DrawRecord>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessDevice {
    /// Creates a device. It runs at `config.max_version` until a context initializes it.
    pub fn new(config: HeadlessConfig) -> Self {
        let size = config.surface_size.at_least_one();
        Self {
            version: config.max_version,
            config,
            next_name: 0,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            framebuffers: HashMap::new(),
            surface_color: Image::new(TextureFormat::Rgba8, size),
            surface_depth: Image::new(TextureFormat::Depth24, size),
            state: BoundState::default(),
            draws: Vec::new(),
        }
    }

    /// The configuration the device was created with.
    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// The version the device was initialized with.
    pub fn api_version(&self) -> ApiVersion {
        self.version
    }

    /// Size of the default surface.
    pub fn surface_size(&self) -> Extent2D {
        self.surface_color.size
    }

    /// Every draw issued so far, oldest first.
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// The most recent draw.
    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }

    /// Native objects currently alive.
    pub fn live_objects(&self) -> LiveObjects {
        LiveObjects {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            programs: self.programs.len(),
            vertex_arrays: self.vertex_arrays.len(),
            framebuffers: self.framebuffers.len(),
        }
    }

    /// The current program.
    pub fn current_program(&self) -> Option<HeadlessProgram> {
        self.state.program
    }

    /// The bound vertex array.
    pub fn current_vertex_array(&self) -> Option<HeadlessVertexArray> {
        self.state.vertex_array
    }

    /// The bound framebuffer.
    pub fn current_framebuffer(&self) -> Option<HeadlessFramebuffer> {
        self.state.framebuffer
    }

    /// The texture bound to `unit`.
    pub fn texture_binding(&self, unit: u32) -> Option<HeadlessTexture> {
        self.state.textures.get(&unit).copied()
    }

    /// The size of a texture's storage.
    pub fn texture_size(&self, texture: HeadlessTexture) -> Option<Extent2D> {
        self.textures.get(&texture).map(|data| data.image.size)
    }

    /// The viewport rectangle.
    pub fn viewport(&self) -> Rect {
        self.state.viewport
    }

    /// The scissor test state.
    pub fn scissor(&self) -> ScissorState {
        self.state.scissor
    }

    /// Whether depth testing is on.
    pub fn depth_test(&self) -> bool {
        self.state.depth_test
    }

    /// The bytes of a buffer.
    pub fn buffer_contents(&self, buffer: HeadlessBuffer) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|data| data.bytes.as_slice())
    }

    /// The usage hint a buffer was last filled with.
    pub fn buffer_usage(&self, buffer: HeadlessBuffer) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|data| data.usage)
    }

    /// The binding point assigned to a uniform block of a program.
    pub fn uniform_block_binding(&self, program: HeadlessProgram, block: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .block_bindings
            .get(block)
            .copied()
    }

    /// Fails if holding `bytes` more texture storage, with `replacing` released, would
    /// exceed the configured budget.
    fn reserve_texture_memory(&self, bytes: usize, replacing: Option<HeadlessTexture>) -> Result<(), ResourceError> {
        let Some(budget) = self.config.texture_memory_budget else {
            return Ok(());
        };
        let held: usize = self
            .textures
            .iter()
            .filter(|(name, _)| Some(**name) != replacing)
            .map(|(_, data)| data.image.byte_len())
            .sum();
        if held + bytes > budget {
            return Err(ResourceError::BackendError(format!(
                "out of texture memory: {bytes} bytes requested, {held} of {budget} in use"
            )));
        }
        Ok(())
    }

    fn next_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn front_end(&self) -> FrontEnd {
        let caps = self.capabilities(self.version);
        FrontEnd {
            version: self.version,
            draw_buffers: self.version == ApiVersion::V1 && self.config.draw_buffers_extension,
            max_draw_buffers: caps.max_color_attachments,
            max_vertex_attribs: caps.max_vertex_attribs,
        }
    }

    fn record_draw(&mut self, primitive: PrimitiveKind, first: u32, count: u32, index_format: Option<IndexFormat>) {
        if self.state.program.is_none() {
            log::error!("HeadlessDevice: Draw issued without a current program");
        }
        let uniforms = self
            .state
            .program
            .and_then(|p| self.programs.get(&p))
            .map(|data| {
                data.values
                    .iter()
                    .filter_map(|(index, value)| {
                        let info = data.linked.uniforms.get(*index as usize)?;
                        Some((info.name.clone(), *value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.draws.push(DrawRecord {
            primitive,
            first,
            count,
            index_format,
            program: self.state.program,
            vertex_array: self.state.vertex_array,
            framebuffer: self.state.framebuffer,
            viewport: self.state.viewport,
            scissor: self.state.scissor,
            depth_test: self.state.depth_test,
            textures: self.state.textures.clone(),
            uniform_buffers: self.state.uniform_buffers.clone(),
            uniforms,
        });
    }
}

impl GraphicsDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;
    type Program = HeadlessProgram;
    type UniformLocation = HeadlessUniformLocation;
    type Framebuffer = HeadlessFramebuffer;
    type VertexArray = HeadlessVertexArray;

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            vendor: "Kiln".to_owned(),
            renderer: "Headless reference device".to_owned(),
            version: format!("Headless {}", self.config.max_version),
        }
    }

    fn max_api_version(&self) -> ApiVersion {
        self.config.max_version
    }

    fn capabilities(&self, version: ApiVersion) -> Capabilities {
        match version {
            ApiVersion::V1 => Capabilities {
                max_color_attachments: if self.config.draw_buffers_extension { 4 } else { 1 },
                depth_textures: self.config.depth_texture_extension,
                max_texture_size: 4096,
                ..Capabilities::minimum_v1()
            },
            ApiVersion::V2 => Capabilities {
                max_color_attachments: 8,
                max_texture_size: 4096,
                ..Capabilities::minimum_v2()
            },
        }
    }

    fn initialize(&mut self, version: ApiVersion, surface_size: Extent2D) -> Result<(), ResourceError> {
        if version > self.config.max_version {
            return Err(ResourceError::BackendError(format!(
                "API {version} is not available on this device (max {})",
                self.config.max_version
            )));
        }
        self.version = version;
        self.resize_surface(surface_size);
        log::debug!(
            "HeadlessDevice: Initialized API {version} with a {}x{} surface",
            surface_size.width,
            surface_size.height
        );
        Ok(())
    }

    fn resize_surface(&mut self, size: Extent2D) {
        let size = size.at_least_one();
        self.surface_color = Image::new(TextureFormat::Rgba8, size);
        self.surface_depth = Image::new(TextureFormat::Depth24, size);
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8], usage: BufferUsage) -> Result<HeadlessBuffer, ResourceError> {
        if kind == BufferKind::Uniform && !self.capabilities(self.version).uniform_buffer_objects {
            return Err(ResourceError::BackendError(format!(
                "uniform buffers are not available on API {}",
                self.version
            )));
        }
        let buffer = HeadlessBuffer(self.next_name());
        self.buffers.insert(
            buffer,
            BufferData {
                kind,
                usage,
                bytes: data.to_vec(),
            },
        );
        log::trace!("HeadlessDevice: Created {kind} {buffer:?} ({} bytes)", data.len());
        Ok(buffer)
    }

    fn set_buffer_data(&mut self, buffer: &HeadlessBuffer, kind: BufferKind, data: &[u8], usage: BufferUsage) -> Result<(), ResourceError> {
        let entry = self.buffers.get_mut(buffer).ok_or_else(|| unknown("buffer", buffer.0))?;
        if entry.kind != kind {
            log::warn!(
                "HeadlessDevice: {buffer:?} was created as a {} but is filled as a {kind}",
                entry.kind
            );
        }
        entry.bytes = data.to_vec();
        entry.usage = usage;
        Ok(())
    }

    fn write_buffer(&mut self, buffer: &HeadlessBuffer, _kind: BufferKind, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        let entry = self.buffers.get_mut(buffer).ok_or_else(|| unknown("buffer", buffer.0))?;
        let size = entry.bytes.len();
        match offset.checked_add(data.len()) {
            Some(end) if end <= size => {
                entry.bytes[offset..end].copy_from_slice(data);
                Ok(())
            }
            _ => Err(ResourceError::OutOfBounds {
                offset,
                len: data.len(),
                size,
            }),
        }
    }

    fn destroy_buffer(&mut self, buffer: HeadlessBuffer) {
        if self.buffers.remove(&buffer).is_none() {
            log::warn!("HeadlessDevice: Destroying unknown {buffer:?}");
        }
        self.state.uniform_buffers.retain(|_, bound| *bound != buffer);
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: Option<&HeadlessBuffer>) {
        match buffer {
            Some(buffer) => self.state.uniform_buffers.insert(binding, *buffer),
            None => self.state.uniform_buffers.remove(&binding),
        };
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor, data: Option<&[u8]>) -> Result<HeadlessTexture, ResourceError> {
        let caps = self.capabilities(self.version);
        let size = descriptor.size;
        if size.is_empty() || size.width > caps.max_texture_size || size.height > caps.max_texture_size {
            return Err(ResourceError::BackendError(format!(
                "texture size {}x{} is outside 1..={}",
                size.width, size.height, caps.max_texture_size
            )));
        }
        if descriptor.format.is_depth() && !caps.depth_textures {
            return Err(ResourceError::BackendError(format!(
                "depth textures are not available on API {}",
                self.version
            )));
        }
        self.reserve_texture_memory(descriptor.byte_len(), None)?;
        let image = match data {
            Some(bytes) => Image::from_bytes(descriptor.format, size, bytes)?,
            None => Image::new(descriptor.format, size),
        };
        let texture = HeadlessTexture(self.next_name());
        self.textures.insert(
            texture,
            TextureData {
                filter: descriptor.filter,
                image,
            },
        );
        Ok(texture)
    }

    fn resize_texture(&mut self, texture: &HeadlessTexture, format: TextureFormat, size: Extent2D) -> Result<(), ResourceError> {
        if !self.textures.contains_key(texture) {
            return Err(unknown("texture", texture.0));
        }
        let image = Image::new(format, size.at_least_one());
        self.reserve_texture_memory(image.byte_len(), Some(*texture))?;
        if let Some(entry) = self.textures.get_mut(texture) {
            entry.image = image;
        }
        Ok(())
    }

    fn destroy_texture(&mut self, texture: HeadlessTexture) {
        if self.textures.remove(&texture).is_none() {
            log::warn!("HeadlessDevice: Destroying unknown {texture:?}");
        }
        self.state.textures.retain(|_, bound| *bound != texture);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&HeadlessTexture>) {
        match texture {
            Some(texture) => {
                if let Some(data) = self.textures.get(texture) {
                    log::trace!("HeadlessDevice: Unit {unit} samples {texture:?} ({:?})", data.filter);
                }
                self.state.textures.insert(unit, *texture)
            }
            None => self.state.textures.remove(&unit),
        };
    }

    fn create_program(&mut self, stages: &StageSources, attribute_locations: &[(&str, u32)]) -> Result<HeadlessProgram, ShaderError> {
        let front_end = self.front_end();
        let vertex = glsl::compile(ShaderStage::Vertex, &stages.vertex, &front_end)
            .map_err(|log| ShaderError::Compile {
                stage: ShaderStage::Vertex,
                log,
            })?;
        let fragment = glsl::compile(ShaderStage::Fragment, &stages.fragment, &front_end)
            .map_err(|log| ShaderError::Compile {
                stage: ShaderStage::Fragment,
                log,
            })?;
        for stage in [&vertex, &fragment] {
            if !stage.info_log.is_empty() {
                log::debug!("HeadlessDevice: {} stage log:\n{}", stage.stage, stage.info_log);
            }
        }
        let linked = glsl::link(&vertex, &fragment, attribute_locations, front_end.max_vertex_attribs)
            .map_err(|log| ShaderError::Link { log })?;
        let program = HeadlessProgram(self.next_name());
        self.programs.insert(
            program,
            ProgramData {
                linked,
                block_bindings: BTreeMap::new(),
                values: BTreeMap::new(),
            },
        );
        Ok(program)
    }

    fn reflect_program(&mut self, program: &HeadlessProgram) -> ProgramReflection {
        match self.programs.get(program) {
            Some(data) => ProgramReflection {
                attributes: data.linked.attributes.clone(),
                uniforms: data.linked.uniforms.clone(),
                uniform_blocks: Vec::new(),
            },
            None => ProgramReflection::default(),
        }
    }

    fn bind_uniform_block(&mut self, program: &HeadlessProgram, name: &str, binding: u32) -> bool {
        let Some(data) = self.programs.get_mut(program) else {
            return false;
        };
        if !data.linked.blocks.iter().any(|block| block == name) {
            return false;
        }
        data.block_bindings.insert(name.to_owned(), binding);
        true
    }

    fn uniform_location(&mut self, program: &HeadlessProgram, name: &str) -> Option<HeadlessUniformLocation> {
        let index = self
            .programs
            .get(program)?
            .linked
            .uniforms
            .iter()
            .position(|u| u.name == name)?;
        Some(HeadlessUniformLocation {
            program: *program,
            index: index as u32,
        })
    }

    fn set_uniform(&mut self, location: &HeadlessUniformLocation, value: &UniformValue) {
        if self.state.program != Some(location.program) {
            log::error!(
                "HeadlessDevice: Uniform write to {:?} while it is not the current program",
                location.program
            );
            return;
        }
        let Some(data) = self.programs.get_mut(&location.program) else {
            return;
        };
        let Some(info) = data.linked.uniforms.get(location.index as usize) else {
            return;
        };
        if !value.is_compatible_with(info.ty) {
            log::error!(
                "HeadlessDevice: Uniform '{}' is a {} but received a {}",
                info.name,
                info.ty,
                value.glsl_type()
            );
            return;
        }
        data.values.insert(location.index, *value);
    }

    fn destroy_program(&mut self, program: HeadlessProgram) {
        if self.programs.remove(&program).is_none() {
            log::warn!("HeadlessDevice: Destroying unknown {program:?}");
        }
        if self.state.program == Some(program) {
            self.state.program = None;
        }
    }

    fn use_program(&mut self, program: Option<&HeadlessProgram>) {
        self.state.program = program.copied();
    }

    fn create_vertex_array(&mut self, attributes: &[VertexBinding<'_, HeadlessBuffer>], index_buffer: Option<&HeadlessBuffer>) -> Result<HeadlessVertexArray, ResourceError> {
        for buffer in attributes.iter().map(|a| a.buffer).chain(index_buffer) {
            if !self.buffers.contains_key(buffer) {
                return Err(unknown("buffer", buffer.0));
            }
        }
        let attributes = attributes
            .iter()
            .map(|a| AttributeBinding {
                location: a.location,
                components: a.components,
                offset: a.offset,
                stride: a.stride,
                buffer: *a.buffer,
            })
            .collect::<Vec<_>>();
        let vertex_array = HeadlessVertexArray(self.next_name());
        log::trace!(
            "HeadlessDevice: Created {vertex_array:?} with locations {:?}",
            attributes
                .iter()
                .map(|a| (a.location, a.components, a.offset, a.stride, a.buffer))
                .collect::<Vec<_>>()
        );
        self.vertex_arrays.insert(
            vertex_array,
            VertexArrayData {
                attributes,
                index_buffer: index_buffer.copied(),
            },
        );
        Ok(vertex_array)
    }

    fn destroy_vertex_array(&mut self, vertex_array: HeadlessVertexArray) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            log::warn!("HeadlessDevice: Destroying unknown {vertex_array:?}");
        }
        if self.state.vertex_array == Some(vertex_array) {
            self.state.vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<&HeadlessVertexArray>) {
        self.state.vertex_array = vertex_array.copied();
    }

    fn create_framebuffer(&mut self, color_attachments: &[&HeadlessTexture], depth_attachment: Option<&HeadlessTexture>) -> Result<HeadlessFramebuffer, ResourceError> {
        if color_attachments.is_empty() && depth_attachment.is_none() {
            return Err(ResourceError::IncompleteFramebuffer(
                "FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".into(),
            ));
        }
        let max = self.capabilities(self.version).max_color_attachments as usize;
        if color_attachments.len() > max {
            return Err(ResourceError::BackendError(format!(
                "{} color attachments exceed the limit of {max}",
                color_attachments.len()
            )));
        }
        let mut sizes = Vec::with_capacity(color_attachments.len() + 1);
        for texture in color_attachments {
            match self.textures.get(*texture) {
                Some(data) if !data.image.format.is_depth() => sizes.push(data.image.size),
                _ => {
                    return Err(ResourceError::IncompleteFramebuffer(
                        "FRAMEBUFFER_INCOMPLETE_ATTACHMENT".into(),
                    ))
                }
            }
        }
        if let Some(texture) = depth_attachment {
            match self.textures.get(texture) {
                Some(data) if data.image.format.is_depth() => sizes.push(data.image.size),
                _ => {
                    return Err(ResourceError::IncompleteFramebuffer(
                        "FRAMEBUFFER_INCOMPLETE_ATTACHMENT".into(),
                    ))
                }
            }
        }
        if sizes.windows(2).any(|pair| pair[0] != pair[1]) {
            return Err(ResourceError::IncompleteFramebuffer(
                "FRAMEBUFFER_INCOMPLETE_DIMENSIONS".into(),
            ));
        }
        let framebuffer = HeadlessFramebuffer(self.next_name());
        self.framebuffers.insert(
            framebuffer,
            FramebufferData {
                colors: color_attachments.iter().map(|t| **t).collect(),
                depth: depth_attachment.copied(),
            },
        );
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&mut self, framebuffer: HeadlessFramebuffer) {
        if self.framebuffers.remove(&framebuffer).is_none() {
            log::warn!("HeadlessDevice: Destroying unknown {framebuffer:?}");
        }
        if self.state.framebuffer == Some(framebuffer) {
            self.state.framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&HeadlessFramebuffer>) {
        self.state.framebuffer = framebuffer.copied();
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.state.viewport = rect;
    }

    fn set_scissor(&mut self, state: ScissorState) {
        self.state.scissor = state;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.state.clear_color = color;
    }

    fn clear(&mut self, mask: ClearMask) {
        let clip = self.state.scissor.active_rect();
        let color = self.state.clear_color;
        match self.state.framebuffer {
            None => {
                clear_image(&mut self.surface_color, mask, clip, color);
                clear_image(&mut self.surface_depth, mask, clip, color);
            }
            Some(framebuffer) => {
                let Some(data) = self.framebuffers.get(&framebuffer) else {
                    log::error!("HeadlessDevice: Clear of unknown {framebuffer:?}");
                    return;
                };
                for texture in data.colors.iter().chain(data.depth.iter()) {
                    if let Some(entry) = self.textures.get_mut(texture) {
                        clear_image(&mut entry.image, mask, clip, color);
                    }
                }
            }
        }
    }

    fn draw_arrays(&mut self, primitive: PrimitiveKind, first: u32, count: u32) {
        self.record_draw(primitive, first, count, None);
    }

    fn draw_elements(&mut self, primitive: PrimitiveKind, count: u32, format: IndexFormat) {
        if format == IndexFormat::U32 && !self.capabilities(self.version).element_index_uint {
            log::error!("HeadlessDevice: 32-bit indices are not available on API {}", self.version);
        }
        let has_indices = self
            .state
            .vertex_array
            .and_then(|va| self.vertex_arrays.get(&va))
            .is_some_and(|va| va.index_buffer.is_some());
        if !has_indices {
            log::error!("HeadlessDevice: Indexed draw without an index buffer");
        }
        self.record_draw(primitive, 0, count, Some(format));
    }

    fn blit_to_surface(
        &mut self,
        source: &HeadlessFramebuffer,
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
        let data = self
            .framebuffers
            .get(source)
            .ok_or_else(|| unknown("framebuffer", source.0))?;
        let texture = data.colors.get(color_attachment as usize).ok_or_else(|| {
            ResourceError::BackendError(format!("{source:?} has no color attachment {color_attachment}"))
        })?;
        let image = &self
            .textures
            .get(texture)
            .ok_or_else(|| unknown("texture", texture.0))?
            .image;
        let clip = self.state.scissor.active_rect();
        self.surface_color.blit_from(image, src_rect, dst_rect, filter, clip)
    }

    fn read_pixels(&mut self, rect: Rect) -> Result<Vec<u8>, ResourceError> {
        match self.state.framebuffer {
            None => self.surface_color.read_rgba(rect),
            Some(framebuffer) => {
                let data = self
                    .framebuffers
                    .get(&framebuffer)
                    .ok_or_else(|| unknown("framebuffer", framebuffer.0))?;
                let texture = data.colors.first().ok_or_else(|| {
                    ResourceError::BackendError(format!("{framebuffer:?} has no color attachment"))
                })?;
                self.textures
                    .get(texture)
                    .ok_or_else(|| unknown("texture", texture.0))?
                    .image
                    .read_rgba(rect)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "#ifdef VERTEX_SHADER\nattribute vec4 aPosition;\nuniform mat4 uMVP;\nvoid main() { gl_Position = uMVP * aPosition; }\n#endif\n#ifdef FRAGMENT_SHADER\nprecision mediump float;\nuniform vec4 uTint;\nvoid main() { gl_FragColor = uTint; }\n#endif\n";

    fn texture(device: &mut HeadlessDevice, format: TextureFormat, w: u32, h: u32) -> HeadlessTexture {
        device
            .create_texture(&TextureDescriptor::new(Extent2D::new(w, h), format), None)
            .unwrap()
    }

    #[test]
    fn uniform_writes_require_the_program_to_be_current() {
        let mut device = HeadlessDevice::new(HeadlessConfig::v1());
        let program = device
            .create_program(&StageSources::split(PROGRAM), &RESERVED_ATTRIBUTE_LOCATIONS)
            .unwrap();
        let tint = device.uniform_location(&program, "uTint").unwrap();

        device.set_uniform(&tint, &UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        assert!(device.programs[&program].values.is_empty());

        device.use_program(Some(&program));
        device.set_uniform(&tint, &UniformValue::Float(1.0));
        assert!(device.programs[&program].values.is_empty());
        device.set_uniform(&tint, &UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        device.draw_arrays(PrimitiveKind::Points, 0, 1);
        assert_eq!(
            device.last_draw().unwrap().uniform("uTint"),
            Some(&UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
        );
    }

    #[test]
    fn reserved_attributes_get_fixed_locations() {
        let mut device = HeadlessDevice::default();
        let program = device
            .create_program(&StageSources::split(PROGRAM), &RESERVED_ATTRIBUTE_LOCATIONS)
            .unwrap();
        let reflection = device.reflect_program(&program);
        assert_eq!(reflection.attribute_location("aPosition"), Some(0));
        let names: Vec<_> = reflection.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["uMVP", "uTint"]);
    }

    #[test]
    fn framebuffer_completeness_is_checked() {
        let mut device = HeadlessDevice::default();
        let a = texture(&mut device, TextureFormat::Rgba8, 4, 4);
        let b = texture(&mut device, TextureFormat::Rgba8, 8, 8);
        let depth = texture(&mut device, TextureFormat::Depth24, 4, 4);

        assert_eq!(
            device.create_framebuffer(&[], None),
            Err(ResourceError::IncompleteFramebuffer(
                "FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".into()
            ))
        );
        assert_eq!(
            device.create_framebuffer(&[&a, &b], None),
            Err(ResourceError::IncompleteFramebuffer(
                "FRAMEBUFFER_INCOMPLETE_DIMENSIONS".into()
            ))
        );
        assert!(device.create_framebuffer(&[&depth], None).is_err());
        assert!(device.create_framebuffer(&[&a], Some(&depth)).is_ok());
    }

    #[test]
    fn deleting_bound_objects_unbinds_them() {
        let mut device = HeadlessDevice::default();
        let tex = texture(&mut device, TextureFormat::Rgba8, 2, 2);
        let fb = device.create_framebuffer(&[&tex], None).unwrap();
        device.bind_texture(3, Some(&tex));
        device.bind_framebuffer(Some(&fb));

        device.destroy_framebuffer(fb);
        device.destroy_texture(tex);

        assert_eq!(device.current_framebuffer(), None);
        assert_eq!(device.texture_binding(3), None);
        assert_eq!(device.live_objects().total(), 0);
    }

    #[test]
    fn scissored_clear_only_touches_the_rectangle() {
        let mut device = HeadlessDevice::default();
        device.initialize(ApiVersion::V2, Extent2D::new(4, 4)).unwrap();
        device.set_clear_color([0.0, 0.0, 1.0, 1.0]);
        device.set_scissor(ScissorState {
            enabled: true,
            rect: Rect::new(0, 0, 2, 2),
        });
        device.clear(ClearMask::COLOR | ClearMask::DEPTH);

        assert_eq!(device.read_pixels(Rect::new(1, 1, 1, 1)).unwrap(), [0, 0, 255, 255]);
        assert_eq!(device.read_pixels(Rect::new(2, 2, 1, 1)).unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn version_1_has_no_uniform_buffers_or_blit() {
        let mut device = HeadlessDevice::new(HeadlessConfig::v1());
        device.initialize(ApiVersion::V1, Extent2D::new(2, 2)).unwrap();
        assert!(device
            .create_buffer(BufferKind::Uniform, &[0; 16], BufferUsage::Dynamic)
            .is_err());
        let caps = device.capabilities(ApiVersion::V1);
        assert_eq!(caps.max_color_attachments, 1);
        assert!(!caps.framebuffer_blit);
        assert!(device.initialize(ApiVersion::V2, Extent2D::new(2, 2)).is_err());
    }
}
