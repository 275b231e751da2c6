//! Build script for the range finder firmware
//!
//! Handles:
//! - Linker scripts for the embedded binary (cortex-m-rt, defmt)
//! - Host builds (`std` feature) need nothing from here

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // memory.x comes from embassy-stm32's `memory-x` feature
    if std::env::var_os("CARGO_FEATURE_EMBEDDED").is_some() {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}
