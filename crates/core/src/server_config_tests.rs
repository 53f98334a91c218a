// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn deserializes_permissively_with_defaults() {
    let config: ServerConfiguration = serde_json::from_str("{}").unwrap();
    assert_eq!(config.uuid, Uuid::nil());
    assert!(config.invocation.is_empty());
    assert_eq!(config.build, ResourceLimits::default());
    assert!(!config.crash_detection_enabled);
}

#[test]
fn deserializes_panel_payload() {
    let json = r#"{
        "uuid": "8a3e9b2c-7d41-4b6e-9f2a-1c5d8e7f6a90",
        "invocation": "java -Xms128M -jar server.jar",
        "environment": { "SERVER_JARFILE": "server.jar", "MAX_PLAYERS": 20, "EULA": true },
        "container": { "image": "ghcr.io/example/java:17" },
        "build": { "memory_limit": 1024, "disk_space": 100, "cpu_limit": 200 },
        "allocations": {
            "default": { "ip": "10.0.0.5", "port": 25565 },
            "mappings": { "10.0.0.5": [25565] }
        },
        "crash_detection_enabled": true
    }"#;
    let config: ServerConfiguration = serde_json::from_str(json).unwrap();
    assert_eq!(config.container.image, "ghcr.io/example/java:17");
    assert_eq!(config.build.memory_limit, 1024);
    assert!(config.allocations.contains_default());
    assert!(config.crash_detection_enabled);
}

#[test]
fn environment_variables_stringify_and_append_builtins() {
    let json = r#"{
        "invocation": "./start.sh",
        "environment": { "MAX_PLAYERS": 20, "NAME": "lobby" },
        "build": { "memory_limit": 2048 },
        "allocations": { "default": { "ip": "10.0.0.5", "port": 25565 } }
    }"#;
    let config: ServerConfiguration = serde_json::from_str(json).unwrap();
    let vars = config.environment_variables();
    assert!(vars.contains(&"MAX_PLAYERS=20".to_string()));
    assert!(vars.contains(&"NAME=lobby".to_string()));
    assert!(vars.contains(&"STARTUP=./start.sh".to_string()));
    assert!(vars.contains(&"SERVER_MEMORY=2048".to_string()));
    assert!(vars.contains(&"SERVER_IP=10.0.0.5".to_string()));
    assert!(vars.contains(&"SERVER_PORT=25565".to_string()));
}
