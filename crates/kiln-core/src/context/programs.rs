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

//! Program creation from dual-stage sources, reflection and uniform writes.

use super::{Context, ProgramEntry};
use crate::renderer::api::*;
use crate::renderer::error::{ContextError, ContextResult, ShaderError};
use crate::renderer::traits::GraphicsDevice;
use std::collections::HashMap;

impl<D: GraphicsDevice> Context<D> {
    /// Compiles and links a program from one source holding both stages.
    ///
    /// The source is split by injecting `VERTEX_SHADER` / `FRAGMENT_SHADER`, the reserved
    /// attribute names are bound to their fixed locations, and each requested uniform block
    /// is bound to its binding index. Blocks the linked program does not expose are skipped
    /// with a warning. On failure nothing is registered.
    /// ## Errors
    /// * `ContextError::Shader` - Compile or link failure with the verbatim log, or a
    ///   dialect the negotiated version does not accept.
    /// * `ContextError::Unsupported` - If uniform blocks are requested without uniform
    ///   buffer objects.
    /// * `ContextError::InvalidArgument` - If a block binding is beyond the limit.
    pub fn create_program(&mut self, descriptor: &ProgramDescriptor) -> ContextResult<ProgramId> {
        let version = self.api_version();
        let dialect = ShaderDialect::detect(&descriptor.source)
            .map_err(|dialect| ShaderError::UnsupportedDialect { dialect, version })?;
        if dialect == ShaderDialect::Es300 && version == ApiVersion::V1 {
            return Err(ShaderError::UnsupportedDialect {
                dialect: dialect.to_string(),
                version,
            }
            .into());
        }

        if !descriptor.uniform_blocks.is_empty() {
            let caps = self.capabilities();
            if !caps.uniform_buffer_objects {
                return Err(ContextError::Unsupported("uniform blocks".into()));
            }
            if let Some((name, binding)) = descriptor
                .uniform_blocks
                .iter()
                .find(|(_, binding)| *binding >= caps.max_uniform_buffer_bindings)
            {
                return Err(ContextError::InvalidArgument(format!(
                    "uniform block '{name}' binding {binding} is beyond the limit of {}",
                    caps.max_uniform_buffer_bindings
                )));
            }
        }

        let label = descriptor.label.as_deref().unwrap_or("unnamed").to_owned();
        let stages = StageSources::split(&descriptor.source);
        let native = self
            .device
            .create_program(&stages, &RESERVED_ATTRIBUTE_LOCATIONS)
            .map_err(|err| {
                log::debug!("Context: Program '{label}' failed: {err}");
                err
            })?;

        let mut reflection = self.device.reflect_program(&native);
        reflection.uniform_blocks.clear();
        for (name, binding) in &descriptor.uniform_blocks {
            if self.device.bind_uniform_block(&native, name, *binding) {
                reflection.uniform_blocks.push(UniformBlockBinding {
                    name: name.to_string(),
                    binding: *binding,
                });
            } else {
                log::warn!(
                    "Context: Program '{label}' has no active uniform block '{name}', binding {binding} skipped"
                );
            }
        }

        let mut locations = HashMap::with_capacity(reflection.uniforms.len());
        for uniform in &reflection.uniforms {
            if let Some(location) = self.device.uniform_location(&native, &uniform.name) {
                locations.insert(uniform.name.clone(), location);
            }
        }

        let id = self.programs.insert(ProgramEntry {
            native,
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            reflection,
            locations,
            transform_revision: None,
        });
        log::debug!("Context: Created program '{label}' as {id:?}");
        Ok(id)
    }

    /// Attribute locations, uniform types and block bindings of a program.
    pub fn program_reflection(&self, program: ProgramId) -> ContextResult<&ProgramReflection> {
        Ok(&self.programs.get(program)?.reflection)
    }

    /// Makes `program` current, or clears the current program.
    pub fn bind_program(&mut self, program: Option<ProgramId>) -> ContextResult<()> {
        match program {
            Some(id) => {
                let entry = self.programs.get(id)?;
                self.device.use_program(Some(&entry.native));
            }
            None => self.device.use_program(None),
        }
        self.bindings.program = program;
        Ok(())
    }

    /// The program recorded as current.
    pub fn bound_program(&self) -> Option<ProgramId> {
        self.bindings.program
    }

    /// Writes a uniform of the bound program.
    /// ## Errors
    /// * `ContextError::PreconditionViolation` - If no program is bound.
    /// * `ContextError::UnknownUniform` - If the program has no active uniform `name`.
    /// * `ContextError::TypeMismatch` - If the value does not fit the declared type.
    pub fn set_program_uniform(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> ContextResult<()> {
        let value = value.into();
        let program = self.bindings.program.ok_or_else(|| {
            ContextError::PreconditionViolation("no program is bound".into())
        })?;
        let entry = self.programs.get(program)?;
        let unknown = || ContextError::UnknownUniform {
            name: name.to_owned(),
        };
        let info = entry.reflection.uniform(name).ok_or_else(unknown)?;
        if !value.is_compatible_with(info.ty) {
            return Err(ContextError::TypeMismatch(format!(
                "uniform '{name}' is declared {} but a {} was supplied",
                info.ty,
                value.glsl_type()
            )));
        }
        let location = entry.locations.get(name).ok_or_else(unknown)?;
        self.device.set_uniform(location, &value);
        Ok(())
    }

    /// Destroys a program. If it is bound, the native binding is released but the record
    /// stays, so the next draw reports `StaleHandle`.
    pub fn destroy_program(&mut self, program: ProgramId) -> ContextResult<()> {
        let entry = self.programs.remove(program)?;
        if self.bindings.program == Some(program) {
            self.device.use_program(None);
        }
        self.device.destroy_program(entry.native);
        log::debug!(
            "Context: Destroyed program '{}' {program:?}",
            entry.label.as_deref().unwrap_or("unnamed")
        );
        Ok(())
    }
}
