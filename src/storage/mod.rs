// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record storage backends.
//!
//! [`traits::RecordStore`] is the seam between the buffer's policy (capacity,
//! expiration, reconciliation bookkeeping) and the map that holds records.
//! [`memory::MemoryStore`] is the default implementation.

pub mod memory;
pub mod traits;
