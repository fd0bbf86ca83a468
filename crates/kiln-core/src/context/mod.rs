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

//! The graphics context: one owned object that validates every call, tracks resource
//! lifetimes and bind state, and forwards the resulting commands to a [`GraphicsDevice`].
//!
//! A context is created once per render loop with [`Context::new`], which negotiates the
//! API version against the device. All resources live in per-kind generational registries
//! that share one owner tag, so using a destroyed or foreign handle is always reported as
//! an error.

mod blit;
mod buffers;
mod config;
mod draw;
mod framebuffers;
mod programs;
mod registry;
mod state;
mod transform;
mod vertex_arrays;

pub use self::config::{negotiate_version, ContextConfig};
pub use self::state::StateStack;
pub use self::transform::{TransformStack, TransformUniform};

use self::blit::LegacyBlitter;
use self::registry::Registry;
use crate::math::{Extent2D, Rect};
use crate::renderer::api::*;
use crate::renderer::error::ContextResult;
use crate::renderer::traits::GraphicsDevice;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexMeta {
    pub(crate) format: IndexFormat,
    pub(crate) count: u32,
}

pub(crate) struct BufferEntry<B> {
    pub(crate) native: B,
    pub(crate) kind: BufferKind,
    pub(crate) usage: BufferUsage,
    pub(crate) size: usize,
    pub(crate) index: Option<IndexMeta>,
    pub(crate) mirror: Option<Vec<u32>>,
}

pub(crate) struct TextureEntry<T> {
    pub(crate) native: T,
    pub(crate) format: TextureFormat,
    pub(crate) size: Extent2D,
    pub(crate) attachment_of: Option<FramebufferId>,
}

pub(crate) struct ProgramEntry<P, L> {
    pub(crate) native: P,
    pub(crate) label: Option<String>,
    pub(crate) reflection: ProgramReflection,
    pub(crate) locations: HashMap<String, L>,
    pub(crate) transform_revision: Option<u64>,
}

pub(crate) struct VertexArrayEntry<V> {
    pub(crate) native: V,
    pub(crate) attributes: Vec<VertexAttributeDescriptor>,
    pub(crate) index_buffer: Option<BufferId>,
}

pub(crate) struct FramebufferEntry<F> {
    pub(crate) native: F,
    pub(crate) color_attachments: Vec<TextureId>,
    pub(crate) depth_attachment: Option<TextureId>,
    pub(crate) size: Extent2D,
}

impl<F> FramebufferEntry<F> {
    pub(crate) fn attachments(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.color_attachments
            .iter()
            .copied()
            .chain(self.depth_attachment)
    }
}

/// What the context believes is bound. A record may outlive the resource it names: that is
/// how draws after a destroy report `StaleHandle`.
#[derive(Debug, Default)]
pub(crate) struct Bindings {
    pub(crate) program: Option<ProgramId>,
    pub(crate) vertex_array: Option<VertexArrayId>,
    pub(crate) framebuffer: Option<FramebufferId>,
    pub(crate) textures: BTreeMap<u32, TextureId>,
    pub(crate) uniform_buffers: BTreeMap<u32, BufferId>,
    pub(crate) current_uniform_buffer: Option<BufferId>,
}

/// Per-kind counts of live resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveResources {
    /// Live buffers.
    pub buffers: usize,
    /// Live textures, framebuffer attachments included.
    pub textures: usize,
    /// Live programs.
    pub programs: usize,
    /// Live framebuffers.
    pub framebuffers: usize,
    /// Live vertex arrays.
    pub vertex_arrays: usize,
}

impl LiveResources {
    /// Sum over all kinds.
    pub fn total(&self) -> usize {
        self.buffers + self.textures + self.programs + self.framebuffers + self.vertex_arrays
    }
}

/// What the host left behind: live resources and unbalanced pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownReport {
    /// Resources not destroyed.
    pub leaked: LiveResources,
    /// Model matrix pushes without a matching pop.
    pub model_pushes: usize,
    /// Scissor pushes without a matching pop.
    pub scissor_pushes: usize,
    /// Viewport pushes without a matching pop.
    pub viewport_pushes: usize,
}

impl TeardownReport {
    /// `true` when nothing leaked and every push was popped.
    pub fn is_clean(&self) -> bool {
        self.leaked.total() == 0
            && self.model_pushes == 0
            && self.scissor_pushes == 0
            && self.viewport_pushes == 0
    }

    /// One human-readable line per problem.
    pub fn warnings(&self) -> Vec<String> {
        let leaked = [
            ("buffer", self.leaked.buffers),
            ("texture", self.leaked.textures),
            ("program", self.leaked.programs),
            ("framebuffer", self.leaked.framebuffers),
            ("vertex array", self.leaked.vertex_arrays),
        ];
        let pushes = [
            ("model matrix", self.model_pushes),
            ("scissor", self.scissor_pushes),
            ("viewport", self.viewport_pushes),
        ];
        leaked
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(kind, n)| format!("{n} {kind} handle(s) leaked"))
            .chain(
                pushes
                    .iter()
                    .filter(|(_, n)| *n > 0)
                    .map(|(kind, n)| format!("{n} unbalanced {kind} push(es)")),
            )
            .collect()
    }
}

/// The graphics context.
///
/// Owns the device, every resource record and all tracked state. Every mutating call takes
/// `&mut self`; the context is meant to live on the thread that runs the render loop.
pub struct Context<D: GraphicsDevice> {
    pub(crate) device: D,
    owner: u32,
    version: ApiVersion,
    capabilities: Capabilities,
    adapter: AdapterInfo,
    surface_size: Extent2D,
    pub(crate) buffers: Registry<marker::Buffer, BufferEntry<D::Buffer>>,
    pub(crate) textures: Registry<marker::Texture, TextureEntry<D::Texture>>,
    pub(crate) programs: Registry<marker::Program, ProgramEntry<D::Program, D::UniformLocation>>,
    pub(crate) framebuffers: Registry<marker::Framebuffer, FramebufferEntry<D::Framebuffer>>,
    pub(crate) vertex_arrays: Registry<marker::VertexArray, VertexArrayEntry<D::VertexArray>>,
    pub(crate) bindings: Bindings,
    pub(crate) transform: TransformStack,
    pub(crate) viewport: StateStack<Rect>,
    pub(crate) scissor: StateStack<ScissorState>,
    pub(crate) clear_color: [f32; 4],
    pub(crate) depth_test: bool,
    pub(crate) blitter: Option<LegacyBlitter<D>>,
}

impl<D: GraphicsDevice> Context<D> {
    /// Creates a context, negotiating the API version against the device.
    /// ## Arguments
    /// * `device` - The device to drive. The context takes ownership of it.
    /// * `config` - Requested version, fallback policy and initial state.
    /// ## Errors
    /// * `ContextError::UnsupportedVersion` - If the requested version is unavailable and
    ///   `config.fallback` is off.
    /// * `ContextError::Resource` - If the device fails to initialize.
    pub fn new(mut device: D, config: &ContextConfig) -> ContextResult<Self> {
        let available = device.max_api_version();
        let version = negotiate_version(config.version, available, config.fallback)?;
        let capabilities = device.capabilities(version);
        let adapter = device.adapter_info();
        let surface_size = config.surface_size.at_least_one();

        device.initialize(version, surface_size)?;
        let full = surface_size.to_rect();
        let scissor = ScissorState {
            enabled: false,
            rect: full,
        };
        device.set_viewport(full);
        device.set_scissor(scissor);
        device.set_clear_color(config.clear_color);
        device.set_depth_test(config.depth_test);

        let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Context: Created API {version} context (requested {}) on '{}' / '{}'",
            config.version,
            adapter.vendor,
            adapter.renderer
        );
        log::debug!("Context: Capabilities {capabilities:?}");

        Ok(Self {
            device,
            owner,
            version,
            capabilities,
            adapter,
            surface_size,
            buffers: Registry::new(owner),
            textures: Registry::new(owner),
            programs: Registry::new(owner),
            framebuffers: Registry::new(owner),
            vertex_arrays: Registry::new(owner),
            bindings: Bindings::default(),
            transform: TransformStack::new(),
            viewport: StateStack::new(full),
            scissor: StateStack::new(scissor),
            clear_color: config.clear_color,
            depth_test: config.depth_test,
            blitter: None,
        })
    }

    /// The negotiated API version.
    pub fn api_version(&self) -> ApiVersion {
        self.version
    }

    /// The limits of the negotiated version on this device.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Describes the driver.
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// Read access to the device, e.g. for backend-specific diagnostics.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The tag carried by every handle this context issues.
    pub fn owner_tag(&self) -> u32 {
        self.owner
    }

    /// The size of the default surface.
    pub fn surface_size(&self) -> Extent2D {
        self.surface_size
    }

    /// Records a new default surface size. Zero dimensions are clamped to 1.
    ///
    /// Viewport and framebuffer sizes are left alone; hosts follow up with
    /// [`set_viewport`](Self::set_viewport) and [`set_framebuffer_size`](Self::set_framebuffer_size).
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        let size = Extent2D::new(width, height).at_least_one();
        if size == self.surface_size {
            return;
        }
        self.surface_size = size;
        self.device.resize_surface(size);
        log::debug!("Context: Surface resized to {}x{}", size.width, size.height);
    }

    /// Whether `handle` refers to a live resource of this context.
    pub fn is_valid(&self, handle: impl Into<AnyHandle>) -> bool {
        match handle.into() {
            AnyHandle::Buffer(id) => self.buffers.contains(id),
            AnyHandle::Texture(id) => self.textures.contains(id),
            AnyHandle::Program(id) => self.programs.contains(id),
            AnyHandle::Framebuffer(id) => self.framebuffers.contains(id),
            AnyHandle::VertexArray(id) => self.vertex_arrays.contains(id),
        }
    }

    /// Destroys a resource of any kind.
    pub fn destroy(&mut self, handle: impl Into<AnyHandle>) -> ContextResult<()> {
        match handle.into() {
            AnyHandle::Buffer(id) => self.destroy_buffer(id),
            AnyHandle::Texture(id) => self.destroy_texture(id),
            AnyHandle::Program(id) => self.destroy_program(id),
            AnyHandle::Framebuffer(id) => self.destroy_framebuffer(id),
            AnyHandle::VertexArray(id) => self.destroy_vertex_array(id),
        }
    }

    /// Per-kind counts of live resources.
    pub fn live_resources(&self) -> LiveResources {
        LiveResources {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            programs: self.programs.len(),
            framebuffers: self.framebuffers.len(),
            vertex_arrays: self.vertex_arrays.len(),
        }
    }

    /// What dropping the context right now would warn about.
    pub fn teardown_report(&self) -> TeardownReport {
        TeardownReport {
            leaked: self.live_resources(),
            model_pushes: self.transform.depth(),
            scissor_pushes: self.scissor.depth(),
            viewport_pushes: self.viewport.depth(),
        }
    }

    fn release_all(&mut self) {
        self.device.use_program(None);
        self.device.bind_vertex_array(None);
        self.device.bind_framebuffer(None);
        if let Some(blitter) = self.blitter.take() {
            blitter.release(&mut self.device);
        }
        for (_, entry) in self.vertex_arrays.drain() {
            self.device.destroy_vertex_array(entry.native);
        }
        for (_, entry) in self.framebuffers.drain() {
            self.device.destroy_framebuffer(entry.native);
        }
        for (_, entry) in self.textures.drain() {
            self.device.destroy_texture(entry.native);
        }
        for (_, entry) in self.programs.drain() {
            self.device.destroy_program(entry.native);
        }
        for (_, entry) in self.buffers.drain() {
            self.device.destroy_buffer(entry.native);
        }
    }
}

impl<D: GraphicsDevice> Drop for Context<D> {
    fn drop(&mut self) {
        let report = self.teardown_report();
        for warning in report.warnings() {
            log::warn!("Context: {warning} at teardown");
        }
        self.release_all();
        log::debug!("Context: Released context {}", self.owner);
    }
}

impl<D: GraphicsDevice> fmt::Debug for Context<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("owner", &self.owner)
            .field("version", &self.version)
            .field("surface_size", &self.surface_size)
            .field("live", &self.live_resources())
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
