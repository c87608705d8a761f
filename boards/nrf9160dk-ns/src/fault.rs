// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

use partition::regions::RegionKind;

use crate::boundaries;

/// Target of the MemManage entry sequence. `faulting_stack` points at the
/// exception frame on the stack that was active when the fault hit.
#[no_mangle]
pub unsafe extern "C" fn memory_fault_diagnostic(faulting_stack: *mut u32) {
    let unprivileged_flash = boundaries::boundary_table().region(RegionKind::UnprivilegedFlash);
    cortexm::memory_fault::handle_memory_fault(faulting_stack, unprivileged_flash);
}
