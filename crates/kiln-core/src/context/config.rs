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

//! Context configuration and API version negotiation.

use crate::math::Extent2D;
use crate::renderer::api::ApiVersion;
use crate::renderer::error::{ContextError, ContextResult};
use serde::{Deserialize, Serialize};

/// Settings a [`Context`](super::Context) is created with.
///
/// Every field has a default, so a partial JSON document is a valid configuration:
///
/// ```
/// use kiln_core::context::ContextConfig;
/// use kiln_core::renderer::api::ApiVersion;
///
/// let config = ContextConfig::from_json(r#"{ "version": 1, "fallback": false }"#).unwrap();
/// assert_eq!(config.version, ApiVersion::V1);
/// assert!(!config.fallback);
/// assert!(!config.depth_test);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// The API version to request.
    pub version: ApiVersion,
    /// Accept the best available version when `version` is unavailable.
    pub fallback: bool,
    /// Initial size of the default surface.
    pub surface_size: Extent2D,
    /// Initial clear color.
    pub clear_color: [f32; 4],
    /// Whether depth testing starts enabled.
    pub depth_test: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            version: ApiVersion::V2,
            fallback: true,
            surface_size: Extent2D::new(1, 1),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: false,
        }
    }
}

impl ContextConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the requested version.
    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    /// Enables or disables version fallback.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sets the initial surface size.
    pub fn with_surface_size(mut self, width: u32, height: u32) -> Self {
        self.surface_size = Extent2D::new(width, height);
        self
    }
}

/// Picks the version a context runs at.
///
/// A request at or below `available` is honoured as is. Above it, fallback selects
/// `available` and logs a warning; without fallback the request fails.
pub fn negotiate_version(
    requested: ApiVersion,
    available: ApiVersion,
    fallback: bool,
) -> ContextResult<ApiVersion> {
    if requested <= available {
        return Ok(requested);
    }
    if !fallback {
        return Err(ContextError::UnsupportedVersion {
            requested,
            available,
        });
    }
    log::warn!("API version {requested} is unavailable, falling back to {available}");
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_honours_available_requests() {
        assert_eq!(
            negotiate_version(ApiVersion::V1, ApiVersion::V2, false),
            Ok(ApiVersion::V1)
        );
        assert_eq!(
            negotiate_version(ApiVersion::V2, ApiVersion::V2, false),
            Ok(ApiVersion::V2)
        );
    }

    #[test]
    fn negotiation_falls_back_only_when_allowed() {
        assert_eq!(
            negotiate_version(ApiVersion::V2, ApiVersion::V1, true),
            Ok(ApiVersion::V1)
        );
        assert_eq!(
            negotiate_version(ApiVersion::V2, ApiVersion::V1, false),
            Err(ContextError::UnsupportedVersion {
                requested: ApiVersion::V2,
                available: ApiVersion::V1,
            })
        );
    }

    #[test]
    fn config_defaults_and_json_round_trip() {
        let default = ContextConfig::default();
        assert_eq!(ContextConfig::from_json("{}").unwrap(), default);

        let config = ContextConfig::default()
            .with_version(ApiVersion::V1)
            .with_surface_size(640, 480);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"version\":1"));
        assert_eq!(ContextConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(ContextConfig::from_json(r#"{ "version": 3 }"#).is_err());
    }
}
