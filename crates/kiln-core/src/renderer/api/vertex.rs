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

//! Vertex attribute layouts and vertex array descriptors.

use super::handle::BufferId;
use std::borrow::Cow;

/// Size in bytes of one attribute component. Attributes are always 32-bit floats.
pub const COMPONENT_SIZE: u32 = 4;

/// Describes where one vertex attribute reads its data from.
///
/// Several descriptors may reference the same buffer at disjoint offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    /// Shader attribute location.
    pub location: u32,
    /// Vertex buffer the data lives in.
    pub buffer: BufferId,
    /// Number of float components, `1..=4`.
    pub components: u8,
    /// Byte offset of the first element.
    pub offset: u32,
    /// Byte distance between consecutive elements. `0` means tightly packed.
    pub stride: u32,
}

impl VertexAttributeDescriptor {
    /// A tightly packed attribute starting at the beginning of `buffer`.
    pub const fn new(location: u32, buffer: BufferId, components: u8) -> Self {
        Self {
            location,
            buffer,
            components,
            offset: 0,
            stride: 0,
        }
    }

    /// Sets the byte offset.
    pub const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the byte stride.
    pub const fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// The stride actually used when reading, resolving `0` to the packed element size.
    pub const fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.components as u32 * COMPONENT_SIZE
        } else {
            self.stride
        }
    }

    /// Describes an interleaved buffer from an ordered `(location, components)` list.
    ///
    /// Offsets follow declaration order and every attribute shares the total stride.
    ///
    /// ```
    /// use kiln_core::renderer::api::VertexAttributeDescriptor;
    /// # fn check(vbo: kiln_core::renderer::api::BufferId) {
    /// let attrs = VertexAttributeDescriptor::interleaved(vbo, &[(0, 3), (1, 4)]);
    /// assert_eq!(attrs[1].offset, 12);
    /// assert_eq!(attrs[0].stride, 28);
    /// # }
    /// ```
    pub fn interleaved(buffer: BufferId, layout: &[(u32, u8)]) -> Vec<Self> {
        let stride: u32 = layout
            .iter()
            .map(|&(_, components)| components as u32 * COMPONENT_SIZE)
            .sum();
        let mut offset = 0;
        layout
            .iter()
            .map(|&(location, components)| {
                let attr = Self {
                    location,
                    buffer,
                    components,
                    offset,
                    stride,
                };
                offset += components as u32 * COMPONENT_SIZE;
                attr
            })
            .collect()
    }
}

/// A descriptor used to create a vertex array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexArrayDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Attribute layout, in any order.
    pub attributes: Vec<VertexAttributeDescriptor>,
    /// Optional index buffer for indexed draws.
    pub index_buffer: Option<BufferId>,
}

impl<'a> VertexArrayDescriptor<'a> {
    /// A vertex array with the given attributes and no index buffer.
    pub fn new(attributes: Vec<VertexAttributeDescriptor>) -> Self {
        Self {
            label: None,
            attributes,
            index_buffer: None,
        }
    }

    /// Sets the index buffer.
    pub fn with_index_buffer(mut self, buffer: BufferId) -> Self {
        self.index_buffer = Some(buffer);
        self
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A validated attribute layout paired with the native buffer it reads from, as handed
/// to a device.
#[derive(Debug)]
pub struct VertexBinding<'a, B> {
    /// Shader attribute location.
    pub location: u32,
    /// Number of float components, `1..=4`.
    pub components: u8,
    /// Byte offset of the first element.
    pub offset: u32,
    /// Byte distance between consecutive elements, never `0`.
    pub stride: u32,
    /// The native buffer backing the attribute.
    pub buffer: &'a B,
}

impl<'a, B> VertexBinding<'a, B> {
    /// Resolves a descriptor against its native buffer.
    pub fn new(attribute: &VertexAttributeDescriptor, buffer: &'a B) -> Self {
        Self {
            location: attribute.location,
            components: attribute.components,
            offset: attribute.offset,
            stride: attribute.effective_stride(),
            buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_layout_offsets_and_stride() {
        let vbo = BufferId::new(0, 0, 1);
        let attrs = VertexAttributeDescriptor::interleaved(vbo, &[(0, 3), (2, 2), (3, 3)]);
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 20]);
        assert!(attrs.iter().all(|a| a.stride == 32 && a.buffer == vbo));
    }

    #[test]
    fn zero_stride_means_tightly_packed() {
        let vbo = BufferId::new(0, 0, 1);
        assert_eq!(VertexAttributeDescriptor::new(1, vbo, 4).effective_stride(), 16);
        assert_eq!(
            VertexAttributeDescriptor::new(1, vbo, 4)
                .with_stride(40)
                .effective_stride(),
            40
        );
    }
}
