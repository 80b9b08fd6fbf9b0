//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个 node
//! - node name 非空且唯一
//! - heartbeat.interval_ms > 0
//! - heartbeat.timeout_sec > 0 且为有限值
//! - max_datagram_size 在 64..=65507 之间
//! - 不同 node 不得绑定同一地址+端口
//!
//! 非致命问题由 [`lint`] 以警告形式返回。

use std::collections::HashSet;
use std::ops::RangeInclusive;

use contracts::{BridgeBlueprint, ContractError};

/// UDP payload limits
pub const DATAGRAM_SIZE_RANGE: RangeInclusive<usize> = 64..=65507;

/// 校验 BridgeBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    validate_node_count(blueprint)?;
    validate_node_names(blueprint)?;
    validate_heartbeats(blueprint)?;
    validate_datagram_sizes(blueprint)?;
    validate_bind_addresses(blueprint)?;
    Ok(())
}

/// 非致命配置问题
pub fn lint(blueprint: &BridgeBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    for node in &blueprint.nodes {
        if node.sends_to_self() {
            warnings.push(format!(
                "nodes[{}]: peer address equals bind address {}, datagrams loop back to this node",
                node.name,
                node.bind_socket_addr()
            ));
        }
        if node.heartbeat.timeout_sec * 1000.0 < 2.0 * node.heartbeat.interval_ms as f64 {
            warnings.push(format!(
                "nodes[{}].heartbeat: timeout {}s is shorter than two intervals ({}ms), a single lost datagram drops the session",
                node.name, node.heartbeat.timeout_sec, node.heartbeat.interval_ms
            ));
        }
        if node.max_datagram_size > contracts::DEFAULT_MAX_DATAGRAM_SIZE {
            warnings.push(format!(
                "nodes[{}].max_datagram_size: {} exceeds the {}-byte receive buffer of AR devices",
                node.name,
                node.max_datagram_size,
                contracts::DEFAULT_MAX_DATAGRAM_SIZE
            ));
        }
    }
    warnings
}

fn validate_node_count(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    if blueprint.nodes.is_empty() {
        return Err(ContractError::config_validation(
            "nodes",
            "at least one node is required",
        ));
    }
    Ok(())
}

/// 校验 node name 唯一性
fn validate_node_names(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, node) in blueprint.nodes.iter().enumerate() {
        if node.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("nodes[{}].name", idx),
                "node name cannot be empty",
            ));
        }
        if !seen.insert(node.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("nodes[name={}]", node.name),
                "duplicate node name",
            ));
        }
    }
    Ok(())
}

/// 校验心跳参数
fn validate_heartbeats(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    for node in &blueprint.nodes {
        let heartbeat = &node.heartbeat;
        if heartbeat.interval_ms == 0 {
            return Err(ContractError::config_validation(
                format!("nodes[{}].heartbeat.interval_ms", node.name),
                "interval_ms must be > 0",
            ));
        }
        if !heartbeat.timeout_sec.is_finite() || heartbeat.timeout_sec <= 0.0 {
            return Err(ContractError::config_validation(
                format!("nodes[{}].heartbeat.timeout_sec", node.name),
                format!(
                    "timeout_sec must be a finite value > 0, got {}",
                    heartbeat.timeout_sec
                ),
            ));
        }
    }
    Ok(())
}

/// 校验数据报大小
fn validate_datagram_sizes(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    for node in &blueprint.nodes {
        if !DATAGRAM_SIZE_RANGE.contains(&node.max_datagram_size) {
            return Err(ContractError::config_validation(
                format!("nodes[{}].max_datagram_size", node.name),
                format!(
                    "max_datagram_size must be in {}..={}, got {}",
                    DATAGRAM_SIZE_RANGE.start(),
                    DATAGRAM_SIZE_RANGE.end(),
                    node.max_datagram_size
                ),
            ));
        }
    }
    Ok(())
}

/// 校验绑定地址冲突 (端口 0 由系统分配，不冲突)
fn validate_bind_addresses(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for node in blueprint.nodes.iter().filter(|n| n.listen_port != 0) {
        if !seen.insert(node.bind_socket_addr()) {
            return Err(ContractError::config_validation(
                format!("nodes[{}].listen_port", node.name),
                format!(
                    "bind address {} is used by another node",
                    node.bind_socket_addr()
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, HeartbeatConfig, NodeConfig, Role, SessionConfig};

    fn node(name: &str, port: u16) -> NodeConfig {
        NodeConfig {
            name: name.into(),
            role: Role::Driving,
            bind_address: "0.0.0.0".parse().unwrap(),
            listen_port: port,
            peer_address: Some("192.168.1.20".parse().unwrap()),
            peer_port: Some(38528),
            advertised_address: None,
            max_datagram_size: 1024,
            reply_to_heartbeats: false,
            follow_peer_heartbeat: false,
            heartbeat: HeartbeatConfig::default(),
            session: SessionConfig::default(),
            persistence: None,
        }
    }

    fn minimal_blueprint() -> BridgeBlueprint {
        BridgeBlueprint {
            version: ConfigVersion::V1,
            nodes: vec![node("controller", 48528)],
        }
    }

    fn assert_invalid(bp: &BridgeBlueprint, needle: &str) {
        let err = validate(bp).unwrap_err();
        assert!(
            matches!(err, ContractError::ConfigValidation { .. }),
            "unexpected error kind: {err}"
        );
        assert!(err.to_string().contains(needle), "'{err}' lacks '{needle}'");
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
        assert!(lint(&bp).is_empty());
    }

    #[test]
    fn test_empty_nodes() {
        let mut bp = minimal_blueprint();
        bp.nodes.clear();
        assert_invalid(&bp, "at least one node");
    }

    #[test]
    fn test_duplicate_node_name() {
        let mut bp = minimal_blueprint();
        bp.nodes.push(node("controller", 48529));
        assert_invalid(&bp, "duplicate");
    }

    #[test]
    fn test_empty_node_name() {
        let mut bp = minimal_blueprint();
        bp.nodes[0].name = "  ".into();
        assert_invalid(&bp, "cannot be empty");
    }

    #[test]
    fn test_zero_interval() {
        let mut bp = minimal_blueprint();
        bp.nodes[0].heartbeat.interval_ms = 0;
        assert_invalid(&bp, "interval_ms");
    }

    #[test]
    fn test_bad_timeouts() {
        for timeout in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut bp = minimal_blueprint();
            bp.nodes[0].heartbeat.timeout_sec = timeout;
            assert_invalid(&bp, "timeout_sec");
        }
    }

    #[test]
    fn test_datagram_size_bounds() {
        let mut bp = minimal_blueprint();
        bp.nodes[0].max_datagram_size = 63;
        assert_invalid(&bp, "max_datagram_size");

        bp.nodes[0].max_datagram_size = 65508;
        assert_invalid(&bp, "max_datagram_size");

        bp.nodes[0].max_datagram_size = 65507;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_bind_conflict() {
        let mut bp = minimal_blueprint();
        bp.nodes.push(node("second", 48528));
        assert_invalid(&bp, "used by another node");

        // Ephemeral ports never conflict
        bp.nodes[0].listen_port = 0;
        bp.nodes[1].listen_port = 0;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_lint_warnings() {
        let mut bp = minimal_blueprint();
        bp.nodes[0].peer_address = None;
        bp.nodes[0].peer_port = None;
        bp.nodes[0].heartbeat.timeout_sec = 1.5;
        bp.nodes[0].max_datagram_size = 4096;

        let warnings = lint(&bp);
        assert_eq!(warnings.len(), 3, "{warnings:?}");
        assert!(warnings[0].contains("loop back"));
        assert!(warnings[1].contains("two intervals"));
        assert!(warnings[2].contains("receive buffer"));
    }
}
