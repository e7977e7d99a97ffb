/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Alignment-free storage form of an [`Instant`].
//!
//! An `Instant` wraps an `i64` and therefore needs 8-byte alignment.  Every
//! timer slot stores one trigger instant; keeping it as a plain byte array
//! lets the compiler place it next to smaller fields without padding.

use std::fmt;

use super::Instant;

/// An [`Instant`] stored as native-endian bytes with an alignment of 1.
///
/// `PackedInstant::pack(x).unpack() == x` for every representable `x`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PackedInstant([u8; 8]);

// Same footprint as the aligned form, without its alignment requirement.
const _: () = assert!(std::mem::size_of::<PackedInstant>() == std::mem::size_of::<Instant>());
const _: () = assert!(std::mem::align_of::<PackedInstant>() == 1);

impl PackedInstant {
    pub const fn pack(instant: Instant) -> Self {
        Self(instant.as_nanos().to_ne_bytes())
    }

    pub const fn unpack(self) -> Instant {
        Instant::from_nanos(i64::from_ne_bytes(self.0))
    }
}

impl Default for PackedInstant {
    fn default() -> Self {
        Self::pack(Instant::EPOCH)
    }
}

impl From<Instant> for PackedInstant {
    fn from(instant: Instant) -> Self {
        Self::pack(instant)
    }
}

impl From<PackedInstant> for Instant {
    fn from(packed: PackedInstant) -> Self {
        packed.unpack()
    }
}

impl fmt::Debug for PackedInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PackedInstant").field(&self.unpack()).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
