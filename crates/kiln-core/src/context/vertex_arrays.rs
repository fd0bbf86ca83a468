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

//! Vertex array creation and binding.

use super::{Context, VertexArrayEntry};
use crate::renderer::api::*;
use crate::renderer::error::{ContextError, ContextResult};
use crate::renderer::traits::GraphicsDevice;
use std::collections::HashSet;

impl<D: GraphicsDevice> Context<D> {
    /// Creates a vertex array from an attribute layout and an optional index buffer.
    /// ## Errors
    /// * `ContextError::InvalidArgument` - For component counts outside `1..=4`, duplicate
    ///   locations, or locations beyond `max_vertex_attribs`.
    /// * `ContextError::TypeMismatch` - If an attribute reads from a non-vertex buffer or the
    ///   index buffer is not an index buffer.
    /// * `ContextError::StaleHandle` - If a referenced buffer was destroyed.
    pub fn create_vertex_array(
        &mut self,
        descriptor: &VertexArrayDescriptor,
    ) -> ContextResult<VertexArrayId> {
        let max_attribs = self.capabilities().max_vertex_attribs;
        let mut seen = HashSet::new();
        for attr in &descriptor.attributes {
            if !(1..=4).contains(&attr.components) {
                return Err(ContextError::InvalidArgument(format!(
                    "attribute {} has {} components, expected 1 to 4",
                    attr.location, attr.components
                )));
            }
            if attr.location >= max_attribs {
                return Err(ContextError::InvalidArgument(format!(
                    "attribute location {} is beyond the limit of {max_attribs}",
                    attr.location
                )));
            }
            if !seen.insert(attr.location) {
                return Err(ContextError::InvalidArgument(format!(
                    "attribute location {} is used twice",
                    attr.location
                )));
            }
            let kind = self.buffers.get(attr.buffer)?.kind;
            if kind != BufferKind::Vertex {
                return Err(ContextError::TypeMismatch(format!(
                    "attribute {} reads from a {kind}",
                    attr.location
                )));
            }
        }

        let index_native = match descriptor.index_buffer {
            Some(id) => {
                let entry = self.buffers.get(id)?;
                if entry.kind != BufferKind::Index {
                    return Err(ContextError::TypeMismatch(format!(
                        "index buffer slot holds a {}",
                        entry.kind
                    )));
                }
                Some(&entry.native)
            }
            None => None,
        };
        let bindings = descriptor
            .attributes
            .iter()
            .map(|attr| Ok(VertexBinding::new(attr, &self.buffers.get(attr.buffer)?.native)))
            .collect::<ContextResult<Vec<_>>>()?;

        let native = self.device.create_vertex_array(&bindings, index_native)?;
        let id = self.vertex_arrays.insert(VertexArrayEntry {
            native,
            attributes: descriptor.attributes.clone(),
            index_buffer: descriptor.index_buffer,
        });
        log::debug!(
            "Context: Created vertex array {id:?} ({} attributes, indexed: {})",
            descriptor.attributes.len(),
            descriptor.index_buffer.is_some()
        );
        Ok(id)
    }

    /// Binds a vertex array, or clears the binding.
    pub fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) -> ContextResult<()> {
        match vertex_array {
            Some(id) => {
                let entry = self.vertex_arrays.get(id)?;
                self.device.bind_vertex_array(Some(&entry.native));
            }
            None => self.device.bind_vertex_array(None),
        }
        self.bindings.vertex_array = vertex_array;
        Ok(())
    }

    /// The vertex array recorded as bound.
    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.bindings.vertex_array
    }

    /// Destroys a vertex array. The buffers it reads from are left alone.
    pub fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId) -> ContextResult<()> {
        let entry = self.vertex_arrays.remove(vertex_array)?;
        if self.bindings.vertex_array == Some(vertex_array) {
            self.device.bind_vertex_array(None);
        }
        self.device.destroy_vertex_array(entry.native);
        log::debug!("Context: Destroyed vertex array {vertex_array:?}");
        Ok(())
    }
}
