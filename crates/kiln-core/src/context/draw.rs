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

//! Transform stack operations and draw dispatch.

use super::{Context, IndexMeta, TransformStack, TransformUniform};
use crate::math::{Mat4, Vec3};
use crate::renderer::api::*;
use crate::renderer::error::{ContextError, ContextResult};
use crate::renderer::traits::GraphicsDevice;

impl<D: GraphicsDevice> Context<D> {
    /// Overwrites the projection matrix.
    pub fn set_projection_matrix(&mut self, m: Mat4) {
        self.transform.set_projection(m);
    }

    /// Overwrites the view matrix.
    pub fn set_view_matrix(&mut self, m: Mat4) {
        self.transform.set_view(m);
    }

    /// Overwrites the model matrix.
    pub fn set_model_matrix(&mut self, m: Mat4) {
        self.transform.set_model(m);
    }

    /// Resets the model matrix to identity.
    pub fn identity_model_matrix(&mut self) {
        self.transform.set_model(Mat4::IDENTITY);
    }

    /// Post-multiplies the model matrix.
    pub fn multiply_model_matrix(&mut self, m: Mat4) {
        self.transform.multiply_model(m);
    }

    /// Saves the model matrix.
    pub fn push_model_matrix(&mut self) {
        self.transform.push();
    }

    /// Restores the model matrix saved by the matching push.
    pub fn pop_model_matrix(&mut self) -> ContextResult<()> {
        if self.transform.pop() {
            Ok(())
        } else {
            Err(ContextError::PreconditionViolation(
                "pop_model_matrix without a matching push".into(),
            ))
        }
    }

    /// Post-multiplies a translation.
    pub fn translate3(&mut self, x: f32, y: f32, z: f32) {
        self.transform.translate(Vec3::new(x, y, z));
    }

    /// Post-multiplies a uniform scale.
    pub fn scale1(&mut self, s: f32) {
        self.transform.scale(Vec3::splat(s));
    }

    /// Post-multiplies a per-axis scale.
    pub fn scale3(&mut self, x: f32, y: f32, z: f32) {
        self.transform.scale(Vec3::new(x, y, z));
    }

    /// Post-multiplies a rotation of `angle` radians about `axis`.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.transform.rotate(angle, axis);
    }

    /// Post-multiplies a rotation about the X axis.
    pub fn rotate_x(&mut self, angle: f32) {
        self.transform.multiply_model(Mat4::from_rotation_x(angle));
    }

    /// Post-multiplies a rotation about the Y axis.
    pub fn rotate_y(&mut self, angle: f32) {
        self.transform.multiply_model(Mat4::from_rotation_y(angle));
    }

    /// Post-multiplies a rotation about the Z axis.
    pub fn rotate_z(&mut self, angle: f32) {
        self.transform.multiply_model(Mat4::from_rotation_z(angle));
    }

    /// The transform stack.
    pub fn transform(&self) -> &TransformStack {
        &self.transform
    }

    /// Issues a non-indexed draw of `count` vertices starting at `first`.
    /// ## Errors
    /// * `ContextError::PreconditionViolation` - Without a bound program or vertex array,
    ///   or if the range reads past the end of an attribute buffer.
    /// * `ContextError::StaleHandle` - If anything the draw depends on was destroyed.
    pub fn draw_arrays(&mut self, primitive: PrimitiveKind, first: u32, count: u32) -> ContextResult<()> {
        let (program, _) = self.validate_draw()?;
        let available = self.vertex_capacity()?;
        let end = first as u64 + count as u64;
        if end > available as u64 {
            return Err(ContextError::PreconditionViolation(format!(
                "draw of vertices {first}..{end} exceeds the {available} the attribute buffers hold"
            )));
        }
        self.upload_transforms(program)?;
        self.device.draw_arrays(primitive, first, count);
        Ok(())
    }

    /// Draws the first `count` indices of the bound vertex array's index buffer.
    /// ## Errors
    /// * `ContextError::PreconditionViolation` - Without a bound program or vertex array, if
    ///   the vertex array has no index buffer, or if `count` exceeds its index count.
    /// * `ContextError::StaleHandle` - If anything the draw depends on was destroyed.
    pub fn draw_elements(&mut self, primitive: PrimitiveKind, count: u32) -> ContextResult<()> {
        let (program, index) = self.validate_draw()?;
        let index = index.ok_or_else(|| {
            ContextError::PreconditionViolation("the bound vertex array has no index buffer".into())
        })?;
        if count > index.count {
            return Err(ContextError::PreconditionViolation(format!(
                "draw of {count} indices exceeds the {} in the index buffer",
                index.count
            )));
        }
        self.upload_transforms(program)?;
        self.device.draw_elements(primitive, count, index.format);
        Ok(())
    }

    /// Checks bindings and liveness of everything a draw touches.
    fn validate_draw(&self) -> ContextResult<(ProgramId, Option<IndexMeta>)> {
        let program = self.bindings.program.ok_or_else(|| {
            ContextError::PreconditionViolation("no program is bound".into())
        })?;
        let vertex_array = self.bindings.vertex_array.ok_or_else(|| {
            ContextError::PreconditionViolation("no vertex array is bound".into())
        })?;
        self.programs.get(program)?;
        let va = self.vertex_arrays.get(vertex_array)?;
        for attr in &va.attributes {
            self.buffers.get(attr.buffer)?;
        }
        let index = match va.index_buffer {
            Some(id) => self.buffers.get(id)?.index,
            None => None,
        };
        self.bound_target_size()?;
        Ok((program, index))
    }

    /// Number of whole vertices every attribute of the bound vertex array can supply.
    fn vertex_capacity(&self) -> ContextResult<u32> {
        let Some(id) = self.bindings.vertex_array else {
            return Ok(0);
        };
        let va = self.vertex_arrays.get(id)?;
        let mut capacity = u32::MAX;
        for attr in &va.attributes {
            let size = self.buffers.get(attr.buffer)?.size as u64;
            let element = attr.components as u64 * COMPONENT_SIZE as u64;
            let start = attr.offset as u64;
            let vertices = if size < start + element {
                0
            } else {
                (size - start - element) / attr.effective_stride() as u64 + 1
            };
            capacity = capacity.min(vertices.min(u32::MAX as u64) as u32);
        }
        Ok(capacity)
    }

    /// Feeds the transform uniforms the program declares, unless it already has the
    /// current revision.
    fn upload_transforms(&mut self, program: ProgramId) -> ContextResult<()> {
        let revision = self.transform.revision();
        let entry = self.programs.get_mut(program)?;
        if entry.transform_revision == Some(revision) {
            return Ok(());
        }
        for uniform in TransformUniform::ALL {
            let declared_mat4 = entry
                .reflection
                .uniform(uniform.name())
                .is_some_and(|info| info.ty == GlslType::Mat4);
            if let (true, Some(location)) = (declared_mat4, entry.locations.get(uniform.name())) {
                let value = UniformValue::Mat4(self.transform.matrix(uniform));
                self.device.set_uniform(location, &value);
            }
        }
        entry.transform_revision = Some(revision);
        Ok(())
    }
}
