//! Build script for lorashim-firmware
//!
//! memory.x comes from embassy-stm32 (`memory-x` feature); this only adds
//! the linker scripts.

fn main() {
    setup_linker();
}

/// Pass the cortex-m-rt and defmt linker scripts
fn setup_linker() {
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    if std::env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    println!("cargo:rerun-if-changed=build.rs");
}
