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

//! Logger initialization.

use env_logger::{Builder, Env};

/// The filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Installs an `env_logger` logger reading `RUST_LOG`, defaulting to [`DEFAULT_FILTER`].
///
/// Calling it again, or after another logger was installed, is a no-op.
pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Same as [`init_logging`] with a custom default filter, e.g. `"kiln_core=debug"`.
pub fn init_logging_with(default_filter: &str) {
    let result = Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
    if result.is_ok() {
        log::debug!("Logging initialized (default filter '{default_filter}')");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_logging();
        init_logging();
        init_logging_with("debug");
    }
}
