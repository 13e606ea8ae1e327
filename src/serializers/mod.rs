// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Wire envelopes for the external collaborators.
//!
//! Only the fields this engine reads or writes are modeled; the transports
//! that carry these messages live outside the crate.

pub mod agent;
pub mod media_stream;
