//! Worker node selection

use conduit_backend::JobBackend;

use crate::error::{EngineError, Result};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Pick the node a run is pinned to
///
/// Deterministic for a given run id and node list.
pub fn select_node(run_id: &str, nodes: &[String]) -> Result<String> {
    if nodes.is_empty() {
        return Err(EngineError::NoAvailableNode);
    }
    let index = fnv1a_32(run_id.as_bytes()) as usize % nodes.len();
    Ok(nodes[index].clone())
}

/// Query the backend's active nodes and pick one for `run_id`
pub async fn node_for_run(backend: &dyn JobBackend, run_id: &str) -> Result<String> {
    let nodes = backend.active_nodes().await.map_err(|e| {
        tracing::warn!("Failed to list worker nodes: {}", e);
        EngineError::NoAvailableNode
    })?;
    let node = select_node(run_id, &nodes)?;
    tracing::debug!("Run {} assigned to node {} of {}", run_id, node, nodes.len());
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn nodes(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_select_node_is_deterministic() {
        let pool = nodes(&["n1", "n2", "n3"]);
        let first = select_node("run-42", &pool).unwrap();
        for _ in 0..10 {
            assert_eq!(select_node("run-42", &pool).unwrap(), first);
        }
    }

    #[test]
    fn test_select_node_uses_hash_modulo() {
        let pool = nodes(&["n1", "n2", "n3"]);
        // 0xe40c292c % 3 == 1
        assert_eq!(select_node("a", &pool).unwrap(), "n2");
    }

    #[test]
    fn test_select_node_follows_list_order() {
        // The hash picks an index, so reordering the pool moves the run
        let pool = nodes(&["n1", "n2", "n3"]);
        let reordered = nodes(&["n2", "n3", "n1"]);
        assert_eq!(select_node("a", &pool).unwrap(), "n2");
        assert_eq!(select_node("a", &reordered).unwrap(), "n3");
    }

    #[test]
    fn test_select_node_empty_pool() {
        assert!(matches!(
            select_node("run-1", &[]),
            Err(EngineError::NoAvailableNode)
        ));
    }

    #[tokio::test]
    async fn test_node_for_run_unreachable_backend() {
        let backend = FakeBackend::new();
        backend.state().fail_nodes = true;

        let result = node_for_run(&backend, "run-1").await;
        assert!(matches!(result, Err(EngineError::NoAvailableNode)));
    }
}
