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

//! Viewport and scissor state, clears, depth testing and pixel read-back.

use super::Context;
use crate::math::{Extent2D, Rect};
use crate::renderer::api::{ClearMask, ScissorState};
use crate::renderer::error::{ContextError, ContextResult};
use crate::renderer::traits::GraphicsDevice;

/// A current value plus a stack of saved snapshots. Pop restores verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStack<T> {
    current: T,
    saved: Vec<T>,
}

impl<T: Copy> StateStack<T> {
    /// A stack holding `initial` and no snapshots.
    pub fn new(initial: T) -> Self {
        Self {
            current: initial,
            saved: Vec::new(),
        }
    }

    /// The current value.
    pub fn current(&self) -> T {
        self.current
    }

    /// Replaces the current value.
    pub fn set(&mut self, value: T) {
        self.current = value;
    }

    /// Saves a snapshot of the current value.
    pub fn push(&mut self) {
        self.saved.push(self.current);
    }

    /// Restores the last snapshot and returns it, or `None` if nothing was pushed.
    pub fn pop(&mut self) -> Option<T> {
        let restored = self.saved.pop()?;
        self.current = restored;
        Some(restored)
    }

    /// Number of saved snapshots.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}

pub(super) fn check_rect(rect: Rect, what: &str) -> ContextResult<()> {
    if !rect.is_valid() {
        return Err(ContextError::InvalidArgument(format!(
            "{what} {}x{} has a negative size",
            rect.width, rect.height
        )));
    }
    if !rect.fits() {
        return Err(ContextError::InvalidArgument(format!(
            "{what} {rect:?} extends past the coordinate range"
        )));
    }
    Ok(())
}

impl<D: GraphicsDevice> Context<D> {
    /// Sets the viewport. Setting the current viewport again is a no-op.
    pub fn set_viewport(&mut self, rect: Rect) -> ContextResult<()> {
        check_rect(rect, "viewport")?;
        if self.viewport.current() != rect {
            self.viewport.set(rect);
            self.device.set_viewport(rect);
        }
        Ok(())
    }

    /// The current viewport.
    pub fn viewport(&self) -> Rect {
        self.viewport.current()
    }

    /// Saves the current viewport.
    pub fn push_viewport(&mut self) {
        self.viewport.push();
    }

    /// Restores the viewport saved by the matching [`push_viewport`](Self::push_viewport).
    pub fn pop_viewport(&mut self) -> ContextResult<()> {
        let rect = self.viewport.pop().ok_or_else(|| {
            ContextError::PreconditionViolation("pop_viewport without a matching push".into())
        })?;
        self.device.set_viewport(rect);
        Ok(())
    }

    /// Saves the current scissor state.
    pub fn push_scissor(&mut self) {
        self.scissor.push();
    }

    /// Restores the scissor state saved by the matching [`push_scissor`](Self::push_scissor).
    pub fn pop_scissor(&mut self) -> ContextResult<()> {
        let state = self.scissor.pop().ok_or_else(|| {
            ContextError::PreconditionViolation("pop_scissor without a matching push".into())
        })?;
        self.device.set_scissor(state);
        Ok(())
    }

    /// Enables or disables the scissor test.
    pub fn set_scissor_test(&mut self, enabled: bool) {
        let state = ScissorState {
            enabled,
            ..self.scissor.current()
        };
        self.apply_scissor(state);
    }

    /// Sets the scissor rectangle.
    pub fn set_scissor4(&mut self, x: i32, y: i32, width: i32, height: i32) -> ContextResult<()> {
        let rect = Rect::new(x, y, width, height);
        check_rect(rect, "scissor")?;
        let state = ScissorState {
            rect,
            ..self.scissor.current()
        };
        self.apply_scissor(state);
        Ok(())
    }

    /// The current scissor state.
    pub fn scissor_state(&self) -> ScissorState {
        self.scissor.current()
    }

    fn apply_scissor(&mut self, state: ScissorState) {
        if self.scissor.current() != state {
            self.scissor.set(state);
            self.device.set_scissor(state);
        }
    }

    /// Sets the color used by [`clear`](Self::clear).
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
        self.device.set_clear_color(color);
    }

    /// The current clear color.
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Enables or disables depth testing.
    pub fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
        self.device.set_depth_test(enabled);
    }

    /// Whether depth testing is enabled.
    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    /// Clears the selected planes of the bound target, honouring the scissor.
    pub fn clear(&mut self, mask: ClearMask) -> ContextResult<()> {
        self.bound_target_size()?;
        self.device.clear(mask);
        Ok(())
    }

    /// Reads RGBA8 pixels of `rect` from color attachment 0 of the bound target, or from the
    /// default surface. Rows are returned bottom to top.
    /// ## Errors
    /// * `ContextError::InvalidArgument` - If `rect` is negative or leaves the target.
    /// * `ContextError::PreconditionViolation` - If the bound framebuffer has no color attachment.
    /// * `ContextError::StaleHandle` - If the bound framebuffer was destroyed.
    pub fn read_pixels(&mut self, rect: Rect) -> ContextResult<Vec<u8>> {
        check_rect(rect, "read rectangle")?;
        let size = self.bound_target_size()?;
        if let Some(fb) = self.bindings.framebuffer {
            if self.framebuffers.get(fb)?.color_attachments.is_empty() {
                return Err(ContextError::PreconditionViolation(
                    "the bound framebuffer has no color attachment to read".into(),
                ));
            }
        }
        if rect.x < 0
            || rect.y < 0
            || rect.right() > size.width as i32
            || rect.top() > size.height as i32
        {
            return Err(ContextError::InvalidArgument(format!(
                "read rectangle {rect:?} leaves the {}x{} target",
                size.width, size.height
            )));
        }
        Ok(self.device.read_pixels(rect)?)
    }

    /// Size of the bound target, failing if the bound framebuffer is gone.
    pub(crate) fn bound_target_size(&self) -> ContextResult<Extent2D> {
        match self.bindings.framebuffer {
            Some(fb) => Ok(self.framebuffers.get(fb)?.size),
            None => Ok(self.surface_size()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_set_set_pop_restores_the_exact_snapshot() {
        let initial = ScissorState {
            enabled: false,
            rect: Rect::new(0, 0, 64, 64),
        };
        let mut stack = StateStack::new(initial);
        stack.push();
        stack.set(ScissorState {
            enabled: true,
            ..initial
        });
        stack.set(ScissorState {
            enabled: true,
            rect: Rect::new(5, 5, 10, 10),
        });

        assert_eq!(stack.pop(), Some(initial));
        assert_eq!(stack.current(), initial);
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn nested_pushes_unwind_in_order() {
        let mut stack = StateStack::new(1);
        stack.push();
        stack.set(2);
        stack.push();
        stack.set(3);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.depth(), 0);
    }
}
