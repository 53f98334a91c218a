// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn limits(memory: i64, swap: i64, cpu: i64) -> ResourceLimits {
    ResourceLimits {
        memory_limit: memory,
        swap,
        cpu_limit: cpu,
        ..Default::default()
    }
}

#[test]
fn memory_is_mebibytes() {
    assert_eq!(limits(512, 0, 0).memory_bytes(), 512 * 1024 * 1024);
}

#[parameterized(
    unlimited = { -1, -1 },
    disabled = { 0, 1024 * 1024 * 1024 },
    bounded = { 512, (512 + 1024) * 1024 * 1024 },
)]
fn swap_conversion(swap: i64, expected: i64) {
    assert_eq!(limits(1024, swap, 0).converted_swap(), expected);
}

#[parameterized(
    uncapped = { 0, -1 },
    one_core = { 100, 100_000 },
    one_and_a_half = { 150, 150_000 },
)]
fn cpu_quota_against_fixed_period(cpu: i64, expected: i64) {
    assert_eq!(limits(0, 0, cpu).cpu_quota(), expected);
    assert_eq!(CPU_PERIOD, 100_000);
}

#[test]
fn disk_space_is_mebibytes() {
    let l = ResourceLimits {
        disk_space: 100,
        ..Default::default()
    };
    assert_eq!(l.disk_bytes(), 100 * 1024 * 1024);
}

#[test]
fn allocations_default_membership() {
    let mut allocations = Allocations {
        default: DefaultAllocation {
            ip: "10.0.0.5".to_string(),
            port: 25565,
        },
        mappings: HashMap::new(),
    };
    assert!(!allocations.contains_default());

    allocations
        .mappings
        .insert("10.0.0.5".to_string(), vec![25565, 25566]);
    assert!(allocations.contains_default());
}

#[test]
fn allocations_iterate_every_pair() {
    let allocations = Allocations {
        default: DefaultAllocation {
            ip: "10.0.0.5".to_string(),
            port: 25565,
        },
        mappings: [
            ("10.0.0.5".to_string(), vec![25565]),
            ("10.0.0.6".to_string(), vec![19132, 19133]),
        ]
        .into_iter()
        .collect(),
    };
    let mut pairs: Vec<(String, u16)> = allocations
        .iter()
        .map(|(ip, port)| (ip.to_string(), port))
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("10.0.0.5".to_string(), 25565),
            ("10.0.0.6".to_string(), 19132),
            ("10.0.0.6".to_string(), 19133),
        ]
    );
}
