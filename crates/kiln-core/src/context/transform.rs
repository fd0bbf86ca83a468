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

//! The CPU-side projection/view/model matrix stack.

use crate::math::{Mat4, Vec3};

/// Transform uniforms fed automatically at draw time when a program declares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformUniform {
    /// `uProjectionMatrix`
    Projection,
    /// `uViewMatrix`
    View,
    /// `uModelMatrix`
    Model,
    /// `uModelViewMatrix`, view × model.
    ModelView,
    /// `uModelViewProjectionMatrix`, projection × view × model.
    ModelViewProjection,
}

impl TransformUniform {
    /// Every transform uniform.
    pub const ALL: [TransformUniform; 5] = [
        TransformUniform::Projection,
        TransformUniform::View,
        TransformUniform::Model,
        TransformUniform::ModelView,
        TransformUniform::ModelViewProjection,
    ];

    /// The uniform name a program must declare to receive this matrix.
    pub const fn name(self) -> &'static str {
        match self {
            TransformUniform::Projection => "uProjectionMatrix",
            TransformUniform::View => "uViewMatrix",
            TransformUniform::Model => "uModelMatrix",
            TransformUniform::ModelView => "uModelViewMatrix",
            TransformUniform::ModelViewProjection => "uModelViewProjectionMatrix",
        }
    }
}

/// Projection, view and model matrices, with an unbounded push/pop stack for the model.
///
/// Every mutation bumps [`revision`](Self::revision), which lets programs skip re-uploading
/// unchanged transforms.
#[derive(Debug, Clone)]
pub struct TransformStack {
    projection: Mat4,
    view: Mat4,
    model: Mat4,
    saved: Vec<Mat4>,
    revision: u64,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            saved: Vec::new(),
            revision: 0,
        }
    }
}

impl TransformStack {
    /// Creates a stack with identity matrices.
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// The projection matrix.
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// The view matrix.
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// The current model matrix.
    pub fn model(&self) -> Mat4 {
        self.model
    }

    /// Number of saved model matrices.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Monotonic change counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Overwrites the projection matrix.
    pub fn set_projection(&mut self, m: Mat4) {
        self.projection = m;
        self.touch();
    }

    /// Overwrites the view matrix.
    pub fn set_view(&mut self, m: Mat4) {
        self.view = m;
        self.touch();
    }

    /// Overwrites the model matrix.
    pub fn set_model(&mut self, m: Mat4) {
        self.model = m;
        self.touch();
    }

    /// Post-multiplies the model matrix by `m`.
    pub fn multiply_model(&mut self, m: Mat4) {
        self.model = self.model * m;
        self.touch();
    }

    /// Saves the current model matrix.
    pub fn push(&mut self) {
        self.saved.push(self.model);
    }

    /// Restores the last saved model matrix. Returns `false` if nothing was saved.
    pub fn pop(&mut self) -> bool {
        match self.saved.pop() {
            Some(m) => {
                self.set_model(m);
                true
            }
            None => false,
        }
    }

    /// Post-multiplies a translation.
    pub fn translate(&mut self, v: Vec3) {
        self.multiply_model(Mat4::from_translation(v));
    }

    /// Post-multiplies a scale.
    pub fn scale(&mut self, s: Vec3) {
        self.multiply_model(Mat4::from_scale(s));
    }

    /// Post-multiplies a rotation of `angle` radians about `axis`.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.multiply_model(Mat4::from_axis_angle(axis, angle));
    }

    /// The matrix fed to `uniform`.
    pub fn matrix(&self, uniform: TransformUniform) -> Mat4 {
        match uniform {
            TransformUniform::Projection => self.projection,
            TransformUniform::View => self.view,
            TransformUniform::Model => self.model,
            TransformUniform::ModelView => self.view * self.model,
            TransformUniform::ModelViewProjection => self.projection * self.view * self.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn push_translate_pop_restores_the_model() {
        let mut stack = TransformStack::new();
        stack.translate(Vec3::new(1.0, 0.0, 0.0));
        let before = stack.model();

        stack.push();
        stack.translate(Vec3::new(0.0, 5.0, 0.0));
        stack.scale(Vec3::splat(3.0));
        assert_ne!(stack.model(), before);
        assert!(stack.pop());

        assert_eq!(stack.model(), before);
        assert_eq!(stack.depth(), 0);
        assert!(!stack.pop());
    }

    #[test]
    fn composite_matrices_multiply_in_order() {
        let mut stack = TransformStack::new();
        stack.set_projection(Mat4::from_scale(Vec3::splat(2.0)));
        stack.set_view(Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
        stack.translate(Vec3::new(1.0, 0.0, 0.0));

        let mvp = stack.matrix(TransformUniform::ModelViewProjection);
        let p = mvp.transform_point3(Vec3::ZERO);
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.z, -10.0);

        let mv = stack.matrix(TransformUniform::ModelView);
        assert_relative_eq!(mv.transform_point3(Vec3::ZERO).z, -5.0);
    }

    #[test]
    fn every_mutation_bumps_the_revision() {
        let mut stack = TransformStack::new();
        let r0 = stack.revision();
        stack.push();
        assert_eq!(stack.revision(), r0);
        stack.rotate(0.5, Vec3::Z);
        let r1 = stack.revision();
        assert!(r1 > r0);
        stack.pop();
        assert!(stack.revision() > r1);
    }
}
