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

//! Textures and offscreen framebuffers with managed attachments.

use super::{Context, FramebufferEntry, TextureEntry};
use crate::math::Extent2D;
use crate::renderer::api::*;
use crate::renderer::error::{ContextError, ContextResult};
use crate::renderer::traits::GraphicsDevice;

impl<D: GraphicsDevice> Context<D> {
    fn depth_format(&self) -> TextureFormat {
        match self.api_version() {
            ApiVersion::V1 => TextureFormat::Depth16,
            ApiVersion::V2 => TextureFormat::Depth24,
        }
    }

    /// Clamps zero dimensions to 1 and rejects sizes beyond `max_texture_size`.
    fn attachment_size(&self, size: Extent2D) -> ContextResult<Extent2D> {
        let size = size.at_least_one();
        let max = self.capabilities().max_texture_size;
        if size.width > max || size.height > max {
            return Err(ContextError::InvalidAttachmentRequest(format!(
                "{}x{} exceeds the maximum texture size {max}",
                size.width, size.height
            )));
        }
        Ok(size)
    }

    /// Creates a caller-owned 2D texture.
    /// ## Arguments
    /// * `descriptor` - Size, format and filter.
    /// * `data` - Optional initial contents, exactly `descriptor.byte_len()` bytes, rows
    ///   bottom to top.
    /// ## Errors
    /// * `ContextError::InvalidArgument` - For empty or oversized textures, or a data length
    ///   that does not match.
    /// * `ContextError::Unsupported` - For depth formats without depth texture support.
    pub fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> ContextResult<TextureId> {
        let caps = self.capabilities();
        let size = descriptor.size;
        if size.is_empty() || size.width > caps.max_texture_size || size.height > caps.max_texture_size
        {
            return Err(ContextError::InvalidArgument(format!(
                "texture size {}x{} must be within 1..={}",
                size.width, size.height, caps.max_texture_size
            )));
        }
        if descriptor.format.is_depth() && !caps.depth_textures {
            return Err(ContextError::Unsupported("depth textures".into()));
        }
        if let Some(bytes) = data {
            if bytes.len() != descriptor.byte_len() {
                return Err(ContextError::InvalidArgument(format!(
                    "texture data is {} bytes, expected {}",
                    bytes.len(),
                    descriptor.byte_len()
                )));
            }
        }
        let native = self.device.create_texture(descriptor, data)?;
        let id = self.textures.insert(TextureEntry {
            native,
            format: descriptor.format,
            size,
            attachment_of: None,
        });
        log::debug!(
            "Context: Created texture {id:?} '{}' ({}x{} {:?})",
            descriptor.label.as_deref().unwrap_or("unnamed"),
            size.width,
            size.height,
            descriptor.format
        );
        Ok(id)
    }

    /// Size of a texture.
    pub fn texture_size(&self, texture: TextureId) -> ContextResult<Extent2D> {
        Ok(self.textures.get(texture)?.size)
    }

    /// Format of a texture.
    pub fn texture_format(&self, texture: TextureId) -> ContextResult<TextureFormat> {
        Ok(self.textures.get(texture)?.format)
    }

    /// Binds a texture to a sampler unit, or unbinds the unit with `None`.
    pub fn set_texture_2d(
        &mut self,
        texture: impl Into<Option<TextureId>>,
        unit: u32,
    ) -> ContextResult<()> {
        let max = self.capabilities().max_texture_units;
        if unit >= max {
            return Err(ContextError::InvalidArgument(format!(
                "texture unit {unit} is beyond the limit of {max}"
            )));
        }
        match texture.into() {
            Some(id) => {
                let entry = self.textures.get(id)?;
                self.device.bind_texture(unit, Some(&entry.native));
                self.bindings.textures.insert(unit, id);
            }
            None => {
                self.device.bind_texture(unit, None);
                self.bindings.textures.remove(&unit);
            }
        }
        Ok(())
    }

    /// Destroys a caller-owned texture. Attachments die with their framebuffer instead.
    pub fn destroy_texture(&mut self, texture: TextureId) -> ContextResult<()> {
        if let Some(fb) = self.textures.get(texture)?.attachment_of {
            return Err(ContextError::PreconditionViolation(format!(
                "texture {texture:?} is an attachment of {fb:?}; destroy the framebuffer instead"
            )));
        }
        self.release_texture(texture)
    }

    fn release_texture(&mut self, texture: TextureId) -> ContextResult<()> {
        let entry = self.textures.remove(texture)?;
        for (&unit, _) in self
            .bindings
            .textures
            .iter()
            .filter(|(_, id)| **id == texture)
        {
            self.device.bind_texture(unit, None);
        }
        self.device.destroy_texture(entry.native);
        log::debug!("Context: Destroyed texture {texture:?}");
        Ok(())
    }

    /// Creates a framebuffer with managed attachments.
    ///
    /// Color attachments are `Rgba8`; the depth attachment is `Depth16` on version 1 and
    /// `Depth24` on version 2. Zero dimensions are clamped to 1.
    /// ## Errors
    /// * `ContextError::InvalidAttachmentRequest` - For zero attachments, more color
    ///   attachments than supported, a depth attachment without depth textures, or a size
    ///   beyond `max_texture_size`.
    /// * `ContextError::Resource` - If the device reports the framebuffer incomplete.
    pub fn create_framebuffer(
        &mut self,
        descriptor: &FramebufferDescriptor,
    ) -> ContextResult<FramebufferId> {
        let caps = *self.capabilities();
        let colors = descriptor.color_attachments;
        if colors == 0 && !descriptor.depth_attachment {
            return Err(ContextError::InvalidAttachmentRequest(
                "a framebuffer needs at least one attachment".into(),
            ));
        }
        if colors > caps.max_color_attachments {
            return Err(ContextError::InvalidAttachmentRequest(format!(
                "{colors} color attachments requested, at most {} supported",
                caps.max_color_attachments
            )));
        }
        if descriptor.depth_attachment && !caps.depth_textures {
            return Err(ContextError::InvalidAttachmentRequest(
                "depth attachments need depth texture support".into(),
            ));
        }
        let size = self.attachment_size(descriptor.size.unwrap_or(self.surface_size()))?;

        let depth_format = self.depth_format();
        let mut color_natives = Vec::with_capacity(colors as usize);
        let mut depth_native = None;
        let created = (|| {
            for _ in 0..colors {
                let desc = TextureDescriptor::new(size, TextureFormat::Rgba8);
                color_natives.push(self.device.create_texture(&desc, None)?);
            }
            if descriptor.depth_attachment {
                let desc = TextureDescriptor::new(size, depth_format)
                    .with_filter(FilterMode::Nearest);
                depth_native = Some(self.device.create_texture(&desc, None)?);
            }
            let color_refs: Vec<&D::Texture> = color_natives.iter().collect();
            self.device
                .create_framebuffer(&color_refs, depth_native.as_ref())
        })();
        let native = match created {
            Ok(native) => native,
            Err(err) => {
                for texture in color_natives.into_iter().chain(depth_native) {
                    self.device.destroy_texture(texture);
                }
                return Err(err.into());
            }
        };

        let id = self.framebuffers.insert(FramebufferEntry {
            native,
            color_attachments: Vec::with_capacity(colors as usize),
            depth_attachment: None,
            size,
        });
        let color_ids: Vec<TextureId> = color_natives
            .into_iter()
            .map(|native| {
                self.textures.insert(TextureEntry {
                    native,
                    format: TextureFormat::Rgba8,
                    size,
                    attachment_of: Some(id),
                })
            })
            .collect();
        let depth_id = depth_native.map(|native| {
            self.textures.insert(TextureEntry {
                native,
                format: depth_format,
                size,
                attachment_of: Some(id),
            })
        });
        let entry = self.framebuffers.get_mut(id)?;
        entry.color_attachments = color_ids;
        entry.depth_attachment = depth_id;

        log::debug!(
            "Context: Created framebuffer '{}' {id:?} ({}x{}, {colors} color, depth: {})",
            descriptor.label.as_deref().unwrap_or("unnamed"),
            size.width,
            size.height,
            descriptor.depth_attachment
        );
        Ok(id)
    }

    /// Binds a framebuffer as the render target. `None` selects the default surface.
    ///
    /// Switching targets does not clear.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> ContextResult<()> {
        match framebuffer {
            Some(id) => {
                let entry = self.framebuffers.get(id)?;
                self.device.bind_framebuffer(Some(&entry.native));
            }
            None => self.device.bind_framebuffer(None),
        }
        self.bindings.framebuffer = framebuffer;
        Ok(())
    }

    /// The framebuffer recorded as bound, `None` for the default surface.
    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bindings.framebuffer
    }

    /// Resizes every attachment of a framebuffer. Zero dimensions are clamped to 1 and the
    /// current size is a no-op. Attachment contents are undefined afterwards.
    pub fn set_framebuffer_size(
        &mut self,
        framebuffer: FramebufferId,
        width: u32,
        height: u32,
    ) -> ContextResult<()> {
        let size = self.attachment_size(Extent2D::new(width, height))?;
        let entry = self.framebuffers.get(framebuffer)?;
        if entry.size == size {
            return Ok(());
        }
        let old_size = entry.size;
        let attachments: Vec<TextureId> = entry.attachments().collect();
        for (resized, &texture) in attachments.iter().enumerate() {
            if let Err(err) = self.resize_attachment(texture, size) {
                for &done in &attachments[..resized] {
                    if let Err(rollback) = self.resize_attachment(done, old_size) {
                        log::error!(
                            "Context: Could not restore attachment {done:?} of {framebuffer:?}: {rollback}"
                        );
                    }
                }
                return Err(err);
            }
        }
        self.framebuffers.get_mut(framebuffer)?.size = size;
        log::debug!(
            "Context: Resized framebuffer {framebuffer:?} to {}x{}",
            size.width,
            size.height
        );
        Ok(())
    }

    fn resize_attachment(&mut self, texture: TextureId, size: Extent2D) -> ContextResult<()> {
        let tex = self.textures.get_mut(texture)?;
        self.device.resize_texture(&tex.native, tex.format, size)?;
        tex.size = size;
        Ok(())
    }

    /// Current size of a framebuffer.
    pub fn framebuffer_size(&self, framebuffer: FramebufferId) -> ContextResult<Extent2D> {
        Ok(self.framebuffers.get(framebuffer)?.size)
    }

    /// The sampleable texture behind color attachment `index`.
    pub fn get_framebuffer_color_attachment(
        &self,
        framebuffer: FramebufferId,
        index: u32,
    ) -> ContextResult<TextureId> {
        let entry = self.framebuffers.get(framebuffer)?;
        entry
            .color_attachments
            .get(index as usize)
            .copied()
            .ok_or_else(|| {
                ContextError::InvalidArgument(format!(
                    "color attachment {index} requested, framebuffer has {}",
                    entry.color_attachments.len()
                ))
            })
    }

    /// The sampleable depth texture, if the framebuffer has one.
    pub fn get_framebuffer_depth_attachment(
        &self,
        framebuffer: FramebufferId,
    ) -> ContextResult<Option<TextureId>> {
        Ok(self.framebuffers.get(framebuffer)?.depth_attachment)
    }

    /// Destroys a framebuffer together with its attachments. If it is bound, the default
    /// surface is bound natively but the record stays, so the next draw reports `StaleHandle`.
    pub fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) -> ContextResult<()> {
        let entry = self.framebuffers.remove(framebuffer)?;
        if self.bindings.framebuffer == Some(framebuffer) {
            self.device.bind_framebuffer(None);
        }
        let attachments: Vec<TextureId> = entry.attachments().collect();
        self.device.destroy_framebuffer(entry.native);
        for texture in attachments {
            self.release_texture(texture)?;
        }
        log::debug!("Context: Destroyed framebuffer {framebuffer:?}");
        Ok(())
    }
}
