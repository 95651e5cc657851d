//! Integration Test: Unsafe Confinement
//!
//! **Policy**: Raw kernel access lives in exactly one place.
//! - `asm!` only in `bridge/core/src/syscall/native.rs`
//! - `unsafe` only there and in the Win32 pipe (`bridge/core/src/pipe/windows.rs`)

use architectural_enforcement::production_sources;

const ASM_HOME: &str = "bridge/core/src/syscall/native.rs";
const UNSAFE_HOMES: [&str; 2] = [ASM_HOME, "bridge/core/src/pipe/windows.rs"];

#[test]
fn test_inline_asm_only_in_syscall_gateway() {
    let violations: Vec<String> = production_sources()
        .iter()
        .filter(|file| file.relative != ASM_HOME)
        .flat_map(|file| file.find("asm!("))
        .collect();

    assert!(
        violations.is_empty(),
        "inline assembly outside {ASM_HOME}:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_unsafe_only_in_platform_modules() {
    let violations: Vec<String> = production_sources()
        .iter()
        .filter(|file| !UNSAFE_HOMES.contains(&file.relative.as_str()))
        .flat_map(|file| file.find("unsafe "))
        .collect();

    assert!(
        violations.is_empty(),
        "unsafe code outside the platform modules:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_gateway_module_exists() {
    assert!(
        production_sources().iter().any(|file| file.relative == ASM_HOME),
        "{ASM_HOME} not found; update this test if the gateway moved"
    );
}
