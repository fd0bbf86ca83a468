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

//! Defines data structures related to GPU buffer resources.

use std::fmt;

/// What a buffer is bound as. A buffer keeps the kind it was created with for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data (`ARRAY_BUFFER`).
    Vertex,
    /// Unsigned indices for indexed draws (`ELEMENT_ARRAY_BUFFER`).
    Index,
    /// A uniform block backing store (`UNIFORM_BUFFER`).
    Uniform,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::Vertex => write!(f, "vertex buffer"),
            BufferKind::Index => write!(f, "index buffer"),
            BufferKind::Uniform => write!(f, "uniform buffer"),
        }
    }
}

/// A hint describing how often the buffer contents will change.
///
/// The hint only affects performance, never behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    #[default]
    Static,
    /// Rewritten repeatedly, drawn many times.
    Dynamic,
    /// Written once, drawn a few times.
    Stream,
}

/// The width of the elements stored in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 8-bit unsigned indices.
    U8,
    /// 16-bit unsigned indices.
    U16,
    /// 32-bit unsigned indices. Needs the `element_index_uint` capability.
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> usize {
        match self {
            IndexFormat::U8 => 1,
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }

    /// The narrowest format able to hold `max_index`.
    pub const fn for_max_index(max_index: u32) -> Self {
        if max_index <= u8::MAX as u32 {
            IndexFormat::U8
        } else if max_index <= u16::MAX as u32 {
            IndexFormat::U16
        } else {
            IndexFormat::U32
        }
    }
}

/// An unsigned integer type accepted as index data.
pub trait IndexElement: Copy + 'static {
    /// Widens the index to 32 bits.
    fn to_u32(self) -> u32;
}

impl IndexElement for u8 {
    fn to_u32(self) -> u32 {
        self as u32
    }
}

impl IndexElement for u16 {
    fn to_u32(self) -> u32 {
        self as u32
    }
}

impl IndexElement for u32 {
    fn to_u32(self) -> u32 {
        self
    }
}

/// Index data repacked into the narrowest format that fits its largest element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedIndices {
    /// The chosen element width.
    pub format: IndexFormat,
    /// Number of indices.
    pub count: u32,
    /// The indices in native byte order.
    pub bytes: Vec<u8>,
}

impl PackedIndices {
    /// Repacks `indices` into the narrowest format able to hold all of them.
    pub fn pack<I: IndexElement>(indices: &[I]) -> Self {
        let max = indices.iter().map(|i| i.to_u32()).max().unwrap_or(0);
        let format = IndexFormat::for_max_index(max);
        let bytes = match format {
            IndexFormat::U8 => indices.iter().map(|i| i.to_u32() as u8).collect(),
            IndexFormat::U16 => {
                let narrowed: Vec<u16> = indices.iter().map(|i| i.to_u32() as u16).collect();
                bytemuck::cast_slice(&narrowed).to_vec()
            }
            IndexFormat::U32 => {
                let widened: Vec<u32> = indices.iter().map(|i| i.to_u32()).collect();
                bytemuck::cast_slice(&widened).to_vec()
            }
        };
        Self {
            format,
            count: indices.len() as u32,
            bytes,
        }
    }
}
