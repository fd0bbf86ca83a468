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

//! Generational, context-scoped resource handles.
//!
//! Every resource created through a [`Context`](crate::context::Context) is referred to by a
//! [`Handle`]. A handle is a triple of slot index, slot generation and owner tag:
//!
//! - the **generation** is bumped whenever the slot is released, so a handle to a destroyed
//!   resource never aliases a resource that later reuses the same slot;
//! - the **owner** identifies the context that issued the handle, so a handle from another
//!   context is rejected instead of silently addressing an unrelated resource.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// The kind of resource a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// A vertex, index or uniform buffer.
    Buffer,
    /// A 2D texture, including framebuffer attachments.
    Texture,
    /// A linked shader program.
    Program,
    /// An offscreen framebuffer.
    Framebuffer,
    /// A vertex array (attribute layout plus optional index buffer).
    VertexArray,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Buffer => "buffer",
            ResourceType::Texture => "texture",
            ResourceType::Program => "program",
            ResourceType::Framebuffer => "framebuffer",
            ResourceType::VertexArray => "vertex array",
        };
        f.write_str(name)
    }
}

/// Ties a marker type to the [`ResourceType`] it stands for.
pub trait HandleKind {
    /// The resource type of handles parameterized by this marker.
    const TYPE: ResourceType;
}

/// Uninhabited marker types used to parameterize [`Handle`].
pub mod marker {
    use super::{HandleKind, ResourceType};

    macro_rules! handle_markers {
        ($($(#[$meta:meta])* $name:ident => $ty:ident),* $(,)?) => {
            $(
                $(#[$meta])*
                #[derive(Debug)]
                pub enum $name {}

                impl HandleKind for $name {
                    const TYPE: ResourceType = ResourceType::$ty;
                }
            )*
        };
    }

    handle_markers! {
        /// Marker for buffer handles.
        Buffer => Buffer,
        /// Marker for texture handles.
        Texture => Texture,
        /// Marker for program handles.
        Program => Program,
        /// Marker for framebuffer handles.
        Framebuffer => Framebuffer,
        /// Marker for vertex array handles.
        VertexArray => VertexArray,
    }
}

/// An opaque, typed identifier for a resource owned by a context.
///
/// Handles are cheap to copy. They stay valid from creation until the resource is
/// destroyed; afterwards every use reports [`ContextError::StaleHandle`](crate::renderer::error::ContextError::StaleHandle).
pub struct Handle<K> {
    index: u32,
    generation: u32,
    owner: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub(crate) const fn new(index: u32, generation: u32, owner: u32) -> Self {
        Self {
            index,
            generation,
            owner,
            _kind: PhantomData,
        }
    }

    /// The slot index inside the issuing registry.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// The generation of the slot at the time the handle was issued.
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// The tag of the context that issued this handle.
    pub const fn owner(&self) -> u32 {
        self.owner
    }
}

impl<K: HandleKind> Handle<K> {
    /// The kind of resource this handle refers to.
    pub const fn resource_type(&self) -> ResourceType {
        K::TYPE
    }
}

// Manual impls: the derives would put bounds on the uninhabited marker.
impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.generation == other.generation
            && self.owner == other.owner
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
        self.owner.hash(state);
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({}v{}@{})",
            K::TYPE,
            self.index,
            self.generation,
            self.owner
        )
    }
}

/// A handle to a GPU buffer.
pub type BufferId = Handle<marker::Buffer>;
/// A handle to a 2D texture.
pub type TextureId = Handle<marker::Texture>;
/// A handle to a linked shader program.
pub type ProgramId = Handle<marker::Program>;
/// A handle to an offscreen framebuffer.
pub type FramebufferId = Handle<marker::Framebuffer>;
/// A handle to a vertex array.
pub type VertexArrayId = Handle<marker::VertexArray>;

/// A handle of any kind, for generic validity checks and destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    /// A buffer handle.
    Buffer(BufferId),
    /// A texture handle.
    Texture(TextureId),
    /// A program handle.
    Program(ProgramId),
    /// A framebuffer handle.
    Framebuffer(FramebufferId),
    /// A vertex array handle.
    VertexArray(VertexArrayId),
}

impl AnyHandle {
    /// The kind of resource the wrapped handle refers to.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            AnyHandle::Buffer(_) => ResourceType::Buffer,
            AnyHandle::Texture(_) => ResourceType::Texture,
            AnyHandle::Program(_) => ResourceType::Program,
            AnyHandle::Framebuffer(_) => ResourceType::Framebuffer,
            AnyHandle::VertexArray(_) => ResourceType::VertexArray,
        }
    }
}

macro_rules! impl_into_any_handle {
    ($($id:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for AnyHandle {
                fn from(id: $id) -> Self {
                    AnyHandle::$variant(id)
                }
            }
        )*
    };
}

impl_into_any_handle! {
    BufferId => Buffer,
    TextureId => Texture,
    ProgramId => Program,
    FramebufferId => Framebuffer,
    VertexArrayId => VertexArray,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn handles_compare_on_all_three_fields() {
        let a = BufferId::new(1, 0, 7);
        assert_eq!(a, BufferId::new(1, 0, 7));
        assert_ne!(a, BufferId::new(1, 1, 7));
        assert_ne!(a, BufferId::new(1, 0, 8));

        let set: HashSet<BufferId> = [a, BufferId::new(1, 1, 7), a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn any_handle_reports_its_kind() {
        let tex: AnyHandle = TextureId::new(0, 0, 1).into();
        assert_eq!(tex.resource_type(), ResourceType::Texture);
        assert_eq!(ProgramId::new(0, 0, 1).resource_type(), ResourceType::Program);
        assert_eq!(format!("{:?}", VertexArrayId::new(3, 2, 1)), "VertexArray(3v2@1)");
    }
}
