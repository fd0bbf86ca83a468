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

//! Defines the hierarchy of error types for the context and its devices.

use crate::renderer::api::{ApiVersion, ResourceType, ShaderStage};
use std::fmt;

/// An error raised while turning a dual-stage source into a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// A stage failed to compile.
    Compile {
        /// The stage that failed.
        stage: ShaderStage,
        /// The compiler's info log, verbatim.
        log: String,
    },
    /// Both stages compiled but the program failed to link.
    Link {
        /// The linker's info log, verbatim.
        log: String,
    },
    /// The source dialect is not accepted by the negotiated API version.
    UnsupportedDialect {
        /// The `#version` directive or dialect name found in the source.
        dialect: String,
        /// The API version negotiated at context creation.
        version: ApiVersion,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Compile { stage, log } => {
                write!(f, "{stage} shader compilation failed: {log}")
            }
            ShaderError::Link { log } => write!(f, "Program link failed: {log}"),
            ShaderError::UnsupportedDialect { dialect, version } => {
                write!(
                    f,
                    "Shader dialect '{dialect}' is not supported by API version {version}"
                )
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error reported by a device while creating or using a native resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An access past the end of a buffer or texture.
    OutOfBounds {
        /// Byte offset (or pixel coordinate) of the access.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Size of the resource.
        size: usize,
    },
    /// The framebuffer attachments do not form a complete framebuffer.
    IncompleteFramebuffer(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds { offset, len, size } => write!(
                f,
                "Resource access out of bounds: {len} at offset {offset} exceeds size {size}"
            ),
            ResourceError::IncompleteFramebuffer(status) => {
                write!(f, "Framebuffer is incomplete: {status}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Every way a context operation can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// Program creation failed.
    Shader(ShaderError),
    /// The handle refers to a destroyed resource.
    StaleHandle {
        /// The kind of resource.
        kind: ResourceType,
    },
    /// The handle was issued by another context.
    ForeignHandle {
        /// The kind of resource.
        kind: ResourceType,
    },
    /// A resource or value of the wrong kind was supplied.
    TypeMismatch(String),
    /// The operation requires state that is not in place.
    PreconditionViolation(String),
    /// A framebuffer cannot be built with the requested attachments.
    InvalidAttachmentRequest(String),
    /// The requested API version is not available and fallback was disabled.
    UnsupportedVersion {
        /// The version asked for.
        requested: ApiVersion,
        /// The best version the device offers.
        available: ApiVersion,
    },
    /// The negotiated version lacks a capability the operation needs.
    Unsupported(String),
    /// An argument is out of range.
    InvalidArgument(String),
    /// The bound program has no uniform with this name.
    UnknownUniform {
        /// The name that was looked up.
        name: String,
    },
    /// The device failed to carry out the operation.
    Resource(ResourceError),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Shader(err) => write!(f, "Shader error: {err}"),
            ContextError::StaleHandle { kind } => {
                write!(f, "Use of a destroyed {kind} handle")
            }
            ContextError::ForeignHandle { kind } => {
                write!(f, "The {kind} handle belongs to another context")
            }
            ContextError::TypeMismatch(msg) => write!(f, "Type mismatch: {msg}"),
            ContextError::PreconditionViolation(msg) => {
                write!(f, "Precondition violated: {msg}")
            }
            ContextError::InvalidAttachmentRequest(msg) => {
                write!(f, "Invalid attachment request: {msg}")
            }
            ContextError::UnsupportedVersion {
                requested,
                available,
            } => write!(
                f,
                "API version {requested} is not available (device supports up to {available})"
            ),
            ContextError::Unsupported(feature) => {
                write!(f, "Not supported by the negotiated API version: {feature}")
            }
            ContextError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            ContextError::UnknownUniform { name } => {
                write!(f, "The bound program has no uniform named '{name}'")
            }
            ContextError::Resource(err) => write!(f, "Resource error: {err}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContextError::Shader(err) => Some(err),
            ContextError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ContextError {
    fn from(err: ShaderError) -> Self {
        ContextError::Shader(err)
    }
}

impl From<ResourceError> for ContextError {
    fn from(err: ResourceError) -> Self {
        ContextError::Resource(err)
    }
}

/// Shorthand for results of context operations.
pub type ContextResult<T> = Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::Compile {
            stage: ShaderStage::Fragment,
            log: "ERROR: 0:3: 'x' : undeclared identifier".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "fragment shader compilation failed: ERROR: 0:3: 'x' : undeclared identifier"
        );

        let err = ShaderError::UnsupportedDialect {
            dialect: "#version 300 es".to_string(),
            version: ApiVersion::V1,
        };
        assert_eq!(
            format!("{err}"),
            "Shader dialect '#version 300 es' is not supported by API version v1"
        );
    }

    #[test]
    fn context_error_wraps_shader_error() {
        let err: ContextError = ShaderError::Link {
            log: "missing main".to_string(),
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Shader error: Program link failed: missing main"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn context_error_wraps_resource_error() {
        let err: ContextError = ResourceError::OutOfBounds {
            offset: 8,
            len: 16,
            size: 12,
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Resource error: Resource access out of bounds: 16 at offset 8 exceeds size 12"
        );
        assert!(err.source().is_some());
        assert!(ContextError::StaleHandle {
            kind: ResourceType::Buffer
        }
        .source()
        .is_none());
    }
}
