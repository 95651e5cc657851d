//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Both relay directions block
//! only inside read/write calls, and teardown wakes them by cancelling I/O,
//! never by waiting out a timer.
//! **Exceptions**: test code.

use architectural_enforcement::production_sources;

#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(|file| {
            let mut found = file.find("::sleep(");
            found.extend(file.find(".sleep("));
            found
        })
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Block on the endpoint instead, and cancel it from the other side.");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_no_polling_timeouts_in_relay() {
    let violations: Vec<String> = production_sources()
        .iter()
        .filter(|file| file.relative.ends_with("relay.rs") || file.relative.ends_with("socket.rs"))
        .flat_map(|file| {
            let mut found = file.find("set_read_timeout");
            found.extend(file.find("Duration::"));
            found
        })
        .collect();

    assert!(
        violations.is_empty(),
        "relay and socket must not use timeouts:\n{}",
        violations.join("\n")
    );
}
