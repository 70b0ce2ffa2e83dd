// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Getting buffered records back into the database.
//!
//! - [`health`]: consecutive-failure tracking for database probes
//! - [`reconciler`]: the periodic probe-and-drain loop

pub mod health;
pub mod reconciler;
