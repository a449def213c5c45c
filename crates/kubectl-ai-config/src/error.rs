// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Fatal configuration-loading failures.
///
/// Every variant is treated as fatal at startup: print to stderr, exit 1
/// (see the exit-code contract in the top-level binary).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("tool-config-path {0} does not exist")]
    MissingToolConfigPath(PathBuf),

    #[error("invalid value for {field}: {message}")]
    InvalidField { field: &'static str, message: String },
}
