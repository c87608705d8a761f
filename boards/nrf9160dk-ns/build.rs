// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Checks the board memory map and links the board with `layout.ld`.
//!
//! The region table in `src/memory_map.rs` is validated against the MPU
//! granule here, so a misaligned or overlapping map fails the build instead
//! of the first MPU configuration. The validated map is written to
//! `$OUT_DIR/memory.ld`, which `layout.ld` includes.

use std::fs;
use std::path::{Path, PathBuf};

use partition::regions::RegionBoundary;

#[allow(dead_code)]
#[path = "src/memory_map.rs"]
mod memory_map;

const LINKER_SCRIPT: &str = "layout.ld";
const MEMORY_SCRIPT: &str = "memory.ld";

fn main() {
    if !Path::new(LINKER_SCRIPT).exists() {
        panic!("Boards must provide a `layout.ld` link script file");
    }

    // The rustflags in .cargo/config.toml are easily overridden by the
    // RUSTFLAGS environment variable, which would still build but produce a
    // binary that was not linked as intended. The config sets a sentinel cfg
    // which is checked here.
    //
    // Only checked when cross compiling, so host tools like `cargo clippy`
    // keep working.
    if std::env::var("HOST") != std::env::var("TARGET") {
        let rust_flags = std::env::var("CARGO_ENCODED_RUSTFLAGS");
        if !rust_flags
            .iter()
            .any(|f| f.contains("cfg_partition_buildflagssentinel"))
        {
            panic!(
                "Incorrect build configuration. \
            Verify you have not unintentionally set the RUSTFLAGS environment variable."
            );
        }
    }

    validate_memory_map();

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    fs::write(out_dir.join(MEMORY_SCRIPT), memory_script())
        .unwrap_or_else(|err| panic!("failed to write {MEMORY_SCRIPT}: {err}"));

    // `layout.ld` is found in the board directory, `memory.ld` in OUT_DIR.
    println!("cargo:rustc-link-arg=-L{}", std::env!("CARGO_MANIFEST_DIR"));
    println!("cargo:rustc-link-arg=-L{}", out_dir.display());
    println!("cargo:rustc-link-arg=-T{}", LINKER_SCRIPT);

    println!("cargo:rerun-if-changed={}", LINKER_SCRIPT);
    println!("cargo:rerun-if-changed=src/memory_map.rs");
}

fn validate_memory_map() {
    use memory_map::*;

    if let Err(err) = MEMORY_MAP.validate(MPU_REGION_ALIGNMENT) {
        panic!("invalid memory map in src/memory_map.rs: {err}");
    }

    for (kind, region) in MEMORY_MAP.iter() {
        if region.overlaps(&UNPRIVILEGED_RAM) {
            panic!("invalid memory map in src/memory_map.rs: {kind} overlaps unprivileged RAM");
        }
    }

    if MAIN_STACK_BYTES % 8 != 0 || MAIN_STACK_BYTES >= PRIVILEGED_RAM.size() {
        panic!(
            "main stack of {MAIN_STACK_BYTES:#x} bytes does not fit privileged RAM ({})",
            PRIVILEGED_RAM
        );
    }
}

fn memory_line(name: &str, attributes: &str, region: RegionBoundary) -> String {
    format!(
        "  {:<20} ({}) : ORIGIN = {:#010X}, LENGTH = {:#X}\n",
        name,
        attributes,
        region.start(),
        region.size()
    )
}

fn memory_script() -> String {
    use memory_map::*;

    let mut script = String::from("/* Generated by build.rs from src/memory_map.rs */\n\nMEMORY\n{\n");
    script += &memory_line("privileged_flash", "rx", PRIVILEGED_FLASH);
    script += &memory_line("syscalls_flash", "rx", SYSCALLS_FLASH);
    script += &memory_line("unprivileged_flash", "rx", UNPRIVILEGED_FLASH);
    script += &memory_line("privileged_ram", "rwx", PRIVILEGED_RAM);
    script += &memory_line("ram", "rwx", UNPRIVILEGED_RAM);
    script += "}\n\n";
    script += &format!("MPU_REGION_ALIGNMENT = {MPU_REGION_ALIGNMENT};\n");
    script += &format!("MAIN_STACK_BYTES = {MAIN_STACK_BYTES:#X};\n");
    script
}
