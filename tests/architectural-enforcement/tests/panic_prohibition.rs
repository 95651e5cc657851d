//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code propagates errors with `?` and typed errors.
//! `unwrap()` and `expect()` are for tests only.

use architectural_enforcement::production_sources;

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(|file| {
            let mut found = file.find(".unwrap()");
            found.extend(file.find(".expect("));
            found
        })
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ unwrap()/expect() found in production code:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!(
            "\nFound {} panic site(s) in production code.",
            violations.len()
        );
    }
}
