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

//! Vertex, index and uniform buffers: creation, full and partial updates, uniform mirrors.

use super::{BufferEntry, Context, IndexMeta};
use crate::renderer::api::*;
use crate::renderer::error::{ContextError, ContextResult, ResourceError};
use crate::renderer::traits::GraphicsDevice;
use bytemuck::Pod;

/// Copies bytes into a word-aligned mirror.
fn words_from_bytes(bytes: &[u8]) -> Vec<u32> {
    let mut words = vec![0u32; bytes.len() / 4];
    bytemuck::cast_slice_mut::<u32, u8>(&mut words).copy_from_slice(bytes);
    words
}

fn kind_mismatch(expected: BufferKind, found: BufferKind) -> ContextError {
    ContextError::TypeMismatch(format!("expected a {expected}, got a {found}"))
}

impl<D: GraphicsDevice> Context<D> {
    fn check_index_format(&self, format: IndexFormat) -> ContextResult<()> {
        if format == IndexFormat::U32 && !self.capabilities().element_index_uint {
            return Err(ContextError::Unsupported(
                "32-bit indices (element_index_uint)".into(),
            ));
        }
        Ok(())
    }

    /// Creates a vertex buffer holding `data`.
    pub fn create_vertex_buffer<T: Pod>(
        &mut self,
        data: &[T],
        usage: BufferUsage,
    ) -> ContextResult<BufferId> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let native = self.device.create_buffer(BufferKind::Vertex, bytes, usage)?;
        let id = self.buffers.insert(BufferEntry {
            native,
            kind: BufferKind::Vertex,
            usage,
            size: bytes.len(),
            index: None,
            mirror: None,
        });
        log::debug!("Context: Created vertex buffer {id:?} ({} bytes)", bytes.len());
        Ok(id)
    }

    /// Creates an index buffer, storing the indices at the narrowest width that fits the
    /// largest of them.
    /// ## Errors
    /// * `ContextError::Unsupported` - If 32-bit indices are needed but unavailable.
    pub fn create_index_buffer<I: IndexElement>(
        &mut self,
        indices: &[I],
        usage: BufferUsage,
    ) -> ContextResult<BufferId> {
        let packed = PackedIndices::pack(indices);
        self.check_index_format(packed.format)?;
        let native = self
            .device
            .create_buffer(BufferKind::Index, &packed.bytes, usage)?;
        let id = self.buffers.insert(BufferEntry {
            native,
            kind: BufferKind::Index,
            usage,
            size: packed.bytes.len(),
            index: Some(IndexMeta {
                format: packed.format,
                count: packed.count,
            }),
            mirror: None,
        });
        log::debug!(
            "Context: Created index buffer {id:?} ({} x {:?})",
            packed.count,
            packed.format
        );
        Ok(id)
    }

    /// Creates a uniform buffer initialized with `initial`.
    ///
    /// With `persistent_mirror`, the context keeps a CPU copy that can be edited through
    /// [`uniform_buffer_data`](Self::uniform_buffer_data) and flushed with
    /// [`update_uniform_buffer_data`](Self::update_uniform_buffer_data).
    /// ## Errors
    /// * `ContextError::Unsupported` - Without uniform buffer objects.
    /// * `ContextError::InvalidArgument` - If the byte length is not a multiple of four.
    pub fn create_uniform_buffer<T: Pod>(
        &mut self,
        initial: &[T],
        usage: BufferUsage,
        persistent_mirror: bool,
    ) -> ContextResult<BufferId> {
        if !self.capabilities().uniform_buffer_objects {
            return Err(ContextError::Unsupported("uniform buffer objects".into()));
        }
        let bytes: &[u8] = bytemuck::cast_slice(initial);
        if bytes.len() % 4 != 0 {
            return Err(ContextError::InvalidArgument(format!(
                "uniform buffer length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let native = self.device.create_buffer(BufferKind::Uniform, bytes, usage)?;
        let id = self.buffers.insert(BufferEntry {
            native,
            kind: BufferKind::Uniform,
            usage,
            size: bytes.len(),
            index: None,
            mirror: persistent_mirror.then(|| words_from_bytes(bytes)),
        });
        log::debug!(
            "Context: Created uniform buffer {id:?} ({} bytes, mirrored: {persistent_mirror})",
            bytes.len()
        );
        Ok(id)
    }

    /// Replaces the contents of a vertex or uniform buffer, reallocating its storage.
    ///
    /// Index buffers are replaced with [`set_index_buffer_data`](Self::set_index_buffer_data)
    /// so their element width can be recomputed.
    pub fn set_buffer_data<T: Pod>(&mut self, buffer: BufferId, data: &[T]) -> ContextResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let entry = self.buffers.get_mut(buffer)?;
        match entry.kind {
            BufferKind::Index => {
                return Err(ContextError::TypeMismatch(
                    "index buffers are replaced with set_index_buffer_data".into(),
                ))
            }
            BufferKind::Uniform if bytes.len() % 4 != 0 => {
                return Err(ContextError::InvalidArgument(format!(
                    "uniform buffer length {} is not a multiple of 4",
                    bytes.len()
                )))
            }
            _ => {}
        }
        self.device
            .set_buffer_data(&entry.native, entry.kind, bytes, entry.usage)?;
        entry.size = bytes.len();
        if entry.mirror.is_some() {
            entry.mirror = Some(words_from_bytes(bytes));
        }
        Ok(())
    }

    /// Replaces the contents of an index buffer, recomputing its width and count.
    pub fn set_index_buffer_data<I: IndexElement>(
        &mut self,
        buffer: BufferId,
        indices: &[I],
    ) -> ContextResult<()> {
        let packed = PackedIndices::pack(indices);
        self.check_index_format(packed.format)?;
        let entry = self.buffers.get_mut(buffer)?;
        if entry.kind != BufferKind::Index {
            return Err(kind_mismatch(BufferKind::Index, entry.kind));
        }
        self.device
            .set_buffer_data(&entry.native, BufferKind::Index, &packed.bytes, entry.usage)?;
        entry.size = packed.bytes.len();
        entry.index = Some(IndexMeta {
            format: packed.format,
            count: packed.count,
        });
        Ok(())
    }

    /// Overwrites part of a buffer without reallocating it.
    /// ## Arguments
    /// * `buffer` - The buffer to update.
    /// * `byte_offset` - Where the write starts.
    /// * `data` - The new contents. For index buffers the element type must match the
    ///   buffer's index width.
    /// ## Errors
    /// * `ContextError::Resource(ResourceError::OutOfBounds)` - If the write ends past the buffer.
    /// * `ContextError::TypeMismatch` - If index data has the wrong width.
    /// * `ContextError::InvalidArgument` - If the write is misaligned for the buffer kind.
    pub fn update_buffer_sub_data<T: Pod>(
        &mut self,
        buffer: BufferId,
        byte_offset: usize,
        data: &[T],
    ) -> ContextResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let entry = self.buffers.get_mut(buffer)?;
        let end = byte_offset.checked_add(bytes.len()).unwrap_or(usize::MAX);
        if end > entry.size {
            return Err(ResourceError::OutOfBounds {
                offset: byte_offset,
                len: bytes.len(),
                size: entry.size,
            }
            .into());
        }
        let alignment = match (entry.kind, entry.index) {
            (BufferKind::Index, Some(meta)) => {
                if std::mem::size_of::<T>() != meta.format.size() {
                    return Err(ContextError::TypeMismatch(format!(
                        "index buffer stores {:?} indices, got {}-byte elements",
                        meta.format,
                        std::mem::size_of::<T>()
                    )));
                }
                meta.format.size()
            }
            (BufferKind::Uniform, _) => 4,
            _ => 1,
        };
        if byte_offset % alignment != 0 || bytes.len() % alignment != 0 {
            return Err(ContextError::InvalidArgument(format!(
                "{} writes must be {alignment}-byte aligned",
                entry.kind
            )));
        }
        self.device
            .write_buffer(&entry.native, entry.kind, byte_offset, bytes)?;
        if let Some(mirror) = entry.mirror.as_mut() {
            bytemuck::cast_slice_mut::<u32, u8>(mirror)[byte_offset..end].copy_from_slice(bytes);
        }
        Ok(())
    }

    /// Size of a buffer in bytes.
    pub fn buffer_size(&self, buffer: BufferId) -> ContextResult<usize> {
        Ok(self.buffers.get(buffer)?.size)
    }

    /// The kind a buffer was created as.
    pub fn buffer_kind(&self, buffer: BufferId) -> ContextResult<BufferKind> {
        Ok(self.buffers.get(buffer)?.kind)
    }

    /// The element width an index buffer currently stores.
    pub fn index_format(&self, buffer: BufferId) -> ContextResult<IndexFormat> {
        let entry = self.buffers.get(buffer)?;
        entry
            .index
            .map(|meta| meta.format)
            .ok_or_else(|| kind_mismatch(BufferKind::Index, entry.kind))
    }

    /// Number of indices in the bound vertex array's index buffer.
    /// ## Errors
    /// * `ContextError::PreconditionViolation` - If no vertex array is bound or it has no
    ///   index buffer.
    /// * `ContextError::StaleHandle` - If the vertex array or its index buffer was destroyed.
    pub fn get_index_buffer_data_length(&self) -> ContextResult<u32> {
        let va = self.bindings.vertex_array.ok_or_else(|| {
            ContextError::PreconditionViolation("no vertex array is bound".into())
        })?;
        let index_buffer = self.vertex_arrays.get(va)?.index_buffer.ok_or_else(|| {
            ContextError::PreconditionViolation("the bound vertex array has no index buffer".into())
        })?;
        let entry = self.buffers.get(index_buffer)?;
        Ok(entry.index.map_or(0, |meta| meta.count))
    }

    /// Binds a uniform buffer to a binding point and makes it the current uniform buffer.
    /// ## Errors
    /// * `ContextError::TypeMismatch` - If `buffer` is not a uniform buffer.
    /// * `ContextError::InvalidArgument` - If `binding` is beyond the binding point limit.
    pub fn set_uniform_buffer(&mut self, buffer: BufferId, binding: u32) -> ContextResult<()> {
        let max = self.capabilities().max_uniform_buffer_bindings;
        if !self.capabilities().uniform_buffer_objects {
            return Err(ContextError::Unsupported("uniform buffer objects".into()));
        }
        if binding >= max {
            return Err(ContextError::InvalidArgument(format!(
                "uniform buffer binding {binding} is beyond the limit of {max}"
            )));
        }
        let entry = self.buffers.get(buffer)?;
        if entry.kind != BufferKind::Uniform {
            return Err(kind_mismatch(BufferKind::Uniform, entry.kind));
        }
        self.device.bind_uniform_buffer(binding, Some(&entry.native));
        self.bindings.uniform_buffers.insert(binding, buffer);
        self.bindings.current_uniform_buffer = Some(buffer);
        Ok(())
    }

    /// A mutable typed view of the current uniform buffer's CPU mirror.
    ///
    /// `T` must tile the mirror exactly and be at most 4-byte aligned (`f32`, `[f32; 4]`,
    /// [`Mat4`](crate::math::Mat4), ...).
    pub fn uniform_buffer_data<T: Pod>(&mut self) -> ContextResult<&mut [T]> {
        let buffer = self.bindings.current_uniform_buffer.ok_or_else(|| {
            ContextError::PreconditionViolation("no uniform buffer is current".into())
        })?;
        let mirror = self.buffers.get_mut(buffer)?.mirror.as_mut().ok_or_else(|| {
            ContextError::PreconditionViolation(
                "the current uniform buffer has no CPU mirror".into(),
            )
        })?;
        bytemuck::try_cast_slice_mut(mirror.as_mut_slice()).map_err(|err| {
            ContextError::TypeMismatch(format!(
                "cannot view the uniform mirror as [{}]: {err}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Uploads the whole CPU mirror of the current uniform buffer.
    pub fn update_uniform_buffer_data(&mut self) -> ContextResult<()> {
        let buffer = self.bindings.current_uniform_buffer.ok_or_else(|| {
            ContextError::PreconditionViolation("no uniform buffer is current".into())
        })?;
        let entry = self.buffers.get(buffer)?;
        let mirror = entry.mirror.as_deref().ok_or_else(|| {
            ContextError::PreconditionViolation(
                "the current uniform buffer has no CPU mirror".into(),
            )
        })?;
        self.device.write_buffer(
            &entry.native,
            BufferKind::Uniform,
            0,
            bytemuck::cast_slice(mirror),
        )?;
        Ok(())
    }

    /// Destroys a buffer. Binding points that still reference it are released natively,
    /// while vertex arrays reading from it report `StaleHandle` at their next draw.
    pub fn destroy_buffer(&mut self, buffer: BufferId) -> ContextResult<()> {
        let entry = self.buffers.remove(buffer)?;
        for (&binding, _) in self
            .bindings
            .uniform_buffers
            .iter()
            .filter(|(_, id)| **id == buffer)
        {
            self.device.bind_uniform_buffer(binding, None);
        }
        self.device.destroy_buffer(entry.native);
        log::debug!("Context: Destroyed {} {buffer:?}", entry.kind);
        Ok(())
    }
}
