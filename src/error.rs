// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Setup-time errors.
//!
//! Only session/asset setup can fail with an [`EngineError`]. Everything on
//! the streaming path resolves problems in place: out-of-range samples are
//! clamped, malformed inbound events are logged and dropped, and redundant
//! start/stop calls are silent no-ops.

use thiserror::Error;

/// Errors raised while setting up a session or loading the ambient asset.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The ambient asset could not be read. Fatal for session setup.
    #[error("failed to read ambient asset {path}")]
    AssetRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The ambient track holds no samples.
    #[error("ambient track contains no samples")]
    EmptyTrack,

    /// The session has no destination stream id to address outbound media.
    #[error("session has no destination stream id")]
    MissingDestination,
}
