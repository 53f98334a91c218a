// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container and host configuration assembly.
//!
//! Pure mapping from an [`EnvironmentConfig`] to what the Docker daemon
//! consumes: one container per server, named by the server uuid, with the
//! allocation-derived port surface, the resource caps and a locked-down
//! security posture.

use crate::environment::EnvironmentConfig;
use bollard::container::Config;
use bollard::models::{HostConfig, HostConfigLogConfig, PortBinding};
use roost_core::limits::CPU_PERIOD;
use std::collections::HashMap;

/// Label identifying containers managed by this daemon.
pub const SERVICE_LABEL: (&str, &str) = ("Service", "Pterodactyl");
/// Label identifying the container's role.
pub const CONTAINER_TYPE_LABEL: (&str, &str) = ("ContainerType", "server_process");

/// Capabilities stripped from every server container.
const DROPPED_CAPABILITIES: [&str; 10] = [
    "setpcap",
    "mknod",
    "audit_write",
    "net_raw",
    "dac_override",
    "fowner",
    "fsetid",
    "net_bind_service",
    "sys_chroot",
    "setfcap",
];

/// Build the container-side configuration for a server.
pub fn container_config(id: &str, env: &EnvironmentConfig) -> Config<String> {
    Config {
        hostname: Some(id.to_string()),
        user: Some(format!("{}:{}", env.uid, env.gid)),
        tty: Some(true),
        open_stdin: Some(true),
        attach_stdin: Some(true),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        exposed_ports: Some(exposed_ports(env)),
        env: Some(env.environment.clone()),
        image: Some(env.image.clone()),
        labels: Some(
            [SERVICE_LABEL, CONTAINER_TYPE_LABEL]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        host_config: Some(host_config(env)),
        ..Default::default()
    }
}

/// Build the host-side configuration: port bindings, mounts, tmpfs,
/// resource limits and the security posture.
pub fn host_config(env: &EnvironmentConfig) -> HostConfig {
    let limits = &env.limits;
    HostConfig {
        port_bindings: Some(port_bindings(env)),
        binds: Some(
            env.mounts
                .iter()
                .map(|m| {
                    if m.read_only {
                        format!("{}:{}:ro", m.source, m.target)
                    } else {
                        format!("{}:{}", m.source, m.target)
                    }
                })
                .collect(),
        ),
        tmpfs: Some(
            [("/tmp".to_string(), "rw,exec,nosuid,size=50M".to_string())]
                .into_iter()
                .collect(),
        ),
        memory: Some(limits.memory_bytes()),
        memory_reservation: Some(limits.memory_reservation_bytes()),
        memory_swap: Some(limits.converted_swap()),
        cpu_quota: Some(limits.cpu_quota()),
        cpu_period: Some(CPU_PERIOD),
        cpu_shares: Some(1024),
        cpuset_cpus: (!limits.threads.is_empty()).then(|| limits.threads.clone()),
        blkio_weight: Some(limits.io_weight),
        oom_kill_disable: Some(limits.oom_disabled),
        readonly_rootfs: Some(true),
        cap_drop: Some(DROPPED_CAPABILITIES.iter().map(|c| c.to_string()).collect()),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        log_config: Some(HostConfigLogConfig {
            typ: Some("json-file".to_string()),
            config: Some(
                [
                    ("max-size".to_string(), "5m".to_string()),
                    ("max-file".to_string(), "1".to_string()),
                ]
                .into_iter()
                .collect(),
            ),
        }),
        network_mode: Some(env.network_mode.clone()),
        dns: Some(env.dns.clone()),
        ..Default::default()
    }
}

/// Exposed-port declarations for every allocated (ip, port), tcp and udp.
fn exposed_ports(env: &EnvironmentConfig) -> HashMap<String, HashMap<(), ()>> {
    let mut ports = HashMap::new();
    for (_, port) in env.allocations.iter() {
        ports.insert(format!("{port}/tcp"), HashMap::new());
        ports.insert(format!("{port}/udp"), HashMap::new());
    }
    ports
}

/// Host bindings forwarding each allocation into the container.
fn port_bindings(env: &EnvironmentConfig) -> HashMap<String, Option<Vec<PortBinding>>> {
    let mut bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for (ip, port) in env.allocations.iter() {
        let binding = PortBinding {
            host_ip: Some(ip.to_string()),
            host_port: Some(port.to_string()),
        };
        for proto in ["tcp", "udp"] {
            bindings
                .entry(format!("{port}/{proto}"))
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(binding.clone());
        }
    }
    bindings
}

#[cfg(test)]
#[path = "configure_tests.rs"]
mod tests;
