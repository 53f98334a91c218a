// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource caps, network allocations and mounts for a server container.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MIB: i64 = 1024 * 1024;

/// CFS scheduler period the CPU percentage is converted against.
pub const CPU_PERIOD: i64 = 100_000;

/// Resource caps applied to a server container.
///
/// Memory values are MiB; `cpu_limit` is a percentage where 100 equals one
/// full core. Zero means unlimited unless noted otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub memory_limit: i64,
    pub memory_reservation: i64,
    /// MiB of swap; -1 unlimited, 0 disabled.
    pub swap: i64,
    pub cpu_limit: i64,
    /// Relative block IO weight, 10..=1000.
    pub io_weight: u16,
    pub oom_disabled: bool,
    /// CPU affinity set, e.g. `"0,1"` or `"0-3"`. Empty means unrestricted.
    pub threads: String,
    /// MiB of disk the server may consume; 0 is unlimited.
    pub disk_space: i64,
}

impl ResourceLimits {
    pub fn memory_bytes(&self) -> i64 {
        self.memory_limit * MIB
    }

    pub fn memory_reservation_bytes(&self) -> i64 {
        self.memory_reservation * MIB
    }

    /// Combined memory+swap value the container runtime expects: -1 for
    /// unlimited, otherwise the memory cap plus the swap allowance.
    pub fn converted_swap(&self) -> i64 {
        if self.swap < 0 {
            -1
        } else {
            (self.swap + self.memory_limit) * MIB
        }
    }

    /// CFS quota in microseconds per [`CPU_PERIOD`], or -1 when uncapped.
    pub fn cpu_quota(&self) -> i64 {
        if self.cpu_limit > 0 {
            self.cpu_limit * 1000
        } else {
            -1
        }
    }

    pub fn disk_bytes(&self) -> i64 {
        self.disk_space * MIB
    }
}

/// A bind mount into the container.
///
/// The source must be on the daemon's allow-list; the target is a path
/// inside the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// The default (ip, port) pair a server is reached on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultAllocation {
    pub ip: String,
    pub port: u16,
}

/// Network allocations for a server: every (ip, port) the container
/// exposes, plus the designated default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allocations {
    pub default: DefaultAllocation,
    /// ip -> ports forwarded from the host into the container.
    pub mappings: HashMap<String, Vec<u16>>,
}

impl Allocations {
    /// The default pair must appear in the mappings.
    pub fn contains_default(&self) -> bool {
        self.mappings
            .get(&self.default.ip)
            .is_some_and(|ports| ports.contains(&self.default.port))
    }

    /// Every (ip, port) pair in the mapping, default included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.mappings
            .iter()
            .flat_map(|(ip, ports)| ports.iter().map(move |p| (ip.as_str(), *p)))
    }
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
