// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Region boundary table.
//!
//! The linker places privileged code, the syscall entry points, unprivileged
//! code and privileged data into four fixed address ranges. The MPU
//! configuration code and the privileged loader compare addresses against
//! those ranges, so the values published here must be exact.
//!
//! Every end address in this module is **inclusive**: it is the last valid
//! byte of the region, derived from the linker's exclusive end marker minus
//! one. Mixing the two conventions silently misconfigures the MPU by one
//! byte, so the conversion happens in exactly one place,
//! [`RegionBoundary::from_linker_range`] (and its pointer twin
//! [`BoundaryAddress::inclusive_end`]).
//!
//! Layout invariants (non-empty, ordered, aligned, non-overlapping) are
//! checked by [`BoundaryTable::validate`]. It is a `const fn` so that board
//! build scripts can reject a bad memory map before anything is linked.

use core::fmt;

/// The four address ranges with a uniform privilege classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// Code that only runs privileged (kernel/port code).
    PrivilegedFlash,
    /// Privileged code that unprivileged tasks may enter through system
    /// calls.
    SyscallsFlash,
    /// Code that unprivileged tasks execute.
    UnprivilegedFlash,
    /// Data only privileged code may access.
    PrivilegedRam,
}

impl RegionKind {
    /// All regions, in table order.
    pub const ALL: [RegionKind; 4] = [
        RegionKind::PrivilegedFlash,
        RegionKind::SyscallsFlash,
        RegionKind::UnprivilegedFlash,
        RegionKind::PrivilegedRam,
    ];

    const fn index(self) -> usize {
        match self {
            RegionKind::PrivilegedFlash => 0,
            RegionKind::SyscallsFlash => 1,
            RegionKind::UnprivilegedFlash => 2,
            RegionKind::PrivilegedRam => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RegionKind::PrivilegedFlash => "privileged flash",
            RegionKind::SyscallsFlash => "syscalls flash",
            RegionKind::UnprivilegedFlash => "unprivileged flash",
            RegionKind::PrivilegedRam => "privileged RAM",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a memory map is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// The region contains no bytes.
    Empty(RegionKind),
    /// The inclusive end lies below the start.
    Inverted(RegionKind),
    /// A region boundary does not sit on an MPU granule.
    Misaligned { region: RegionKind, address: usize },
    /// Two regions share at least one address.
    Overlap(RegionKind, RegionKind),
    /// The requested MPU alignment is not a power of two.
    InvalidAlignment(usize),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LayoutError::Empty(region) => write!(f, "{} is empty", region),
            LayoutError::Inverted(region) => write!(f, "{} ends before it starts", region),
            LayoutError::Misaligned { region, address } => {
                write!(f, "{} boundary {:#010x} is not MPU aligned", region, address)
            }
            LayoutError::Overlap(a, b) => write!(f, "{} overlaps {}", a, b),
            LayoutError::InvalidAlignment(alignment) => {
                write!(f, "alignment {:#x} is not a power of two", alignment)
            }
        }
    }
}

/// One contiguous address range, `start..=end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionBoundary {
    start: usize,
    end: usize,
}

impl RegionBoundary {
    /// Builds a region from the linker's start marker and its *exclusive*
    /// end marker (the first address past the region).
    ///
    /// The stored end is `end_exclusive - 1`. An empty range therefore has
    /// `end < start` and is rejected by [`BoundaryTable::validate`].
    pub const fn from_linker_range(start: usize, end_exclusive: usize) -> RegionBoundary {
        RegionBoundary {
            start,
            end: end_exclusive.wrapping_sub(1),
        }
    }

    /// Builds a region from an already inclusive end address.
    pub const fn new_inclusive(start: usize, end: usize) -> RegionBoundary {
        RegionBoundary { start, end }
    }

    /// First address of the region.
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Last valid address of the region (inclusive).
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Number of bytes in the region, or zero if `end < start`.
    pub const fn size(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub const fn contains(&self, address: usize) -> bool {
        self.start <= address && address <= self.end
    }

    pub const fn overlaps(&self, other: &RegionBoundary) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for RegionBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010X}, {:#010X}]", self.start, self.end)
    }
}

/// A boundary address as published to the port code.
///
/// The MPU port reads these as plain pointer variables, so the type is a
/// transparent pointer that may live in an immutable `static`.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct BoundaryAddress(*const u32);

// The pointer is only ever compared against, never dereferenced through this
// type, and it is fixed at link time.
unsafe impl Sync for BoundaryAddress {}

impl BoundaryAddress {
    /// Publishes a linker start marker as is.
    pub const fn start(symbol: *const u32) -> BoundaryAddress {
        BoundaryAddress(symbol)
    }

    /// Publishes the last valid address below a linker end marker.
    pub const fn inclusive_end(symbol: *const u32) -> BoundaryAddress {
        BoundaryAddress(symbol.cast::<u8>().wrapping_sub(1).cast::<u32>())
    }

    pub fn as_ptr(&self) -> *const u32 {
        self.0
    }

    pub fn address(&self) -> usize {
        self.0 as usize
    }
}

/// The four regions the privilege boundary is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryTable {
    regions: [RegionBoundary; 4],
}

impl BoundaryTable {
    pub const fn new(
        privileged_flash: RegionBoundary,
        syscalls_flash: RegionBoundary,
        unprivileged_flash: RegionBoundary,
        privileged_ram: RegionBoundary,
    ) -> BoundaryTable {
        BoundaryTable {
            regions: [
                privileged_flash,
                syscalls_flash,
                unprivileged_flash,
                privileged_ram,
            ],
        }
    }

    pub const fn region(&self, kind: RegionKind) -> RegionBoundary {
        self.regions[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionKind, RegionBoundary)> + '_ {
        RegionKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.region(kind)))
    }

    /// Checks the layout invariants for an MPU with `alignment`-byte
    /// granules.
    ///
    /// Every region must be non-empty, have `start <= end`, start on a
    /// granule and end right before one (the limit register has the same
    /// granularity as the base register), and no two regions may overlap.
    /// The first violation found is returned.
    pub const fn validate(&self, alignment: usize) -> Result<(), LayoutError> {
        if !alignment.is_power_of_two() {
            return Err(LayoutError::InvalidAlignment(alignment));
        }
        let mask = alignment - 1;

        let mut i = 0;
        while i < self.regions.len() {
            let kind = RegionKind::ALL[i];
            let region = self.regions[i];

            if region.end.wrapping_add(1) == region.start {
                return Err(LayoutError::Empty(kind));
            }
            if region.end < region.start {
                return Err(LayoutError::Inverted(kind));
            }
            if region.start & mask != 0 {
                return Err(LayoutError::Misaligned {
                    region: kind,
                    address: region.start,
                });
            }
            if region.end.wrapping_add(1) & mask != 0 {
                return Err(LayoutError::Misaligned {
                    region: kind,
                    address: region.end,
                });
            }

            let mut j = i + 1;
            while j < self.regions.len() {
                if region.overlaps(&self.regions[j]) {
                    return Err(LayoutError::Overlap(kind, RegionKind::ALL[j]));
                }
                j += 1;
            }
            i += 1;
        }
        Ok(())
    }
}

impl fmt::Display for BoundaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, region) in self.iter() {
            write!(
                f,
                "\r\n {:<18} {} {:>8} bytes",
                kind.name(),
                region,
                region.size()
            )?;
        }
        f.write_str("\r\n")
    }
}
