use std::collections::{BTreeMap, HashMap};
use wirecore::{Connection, NodeSpec, Value};

/// Build the inputs object for a node about to execute.
///
/// Connections targeting the node are processed in declaration order. For
/// each, the source node's stored result is consulted: when the result is an
/// object containing the connection's source port id, that member is
/// extracted; otherwise the whole result is routed. The input key is the
/// target node's declared port name for the target port id, falling back to
/// the raw port id when no declaration matches.
///
/// Resolved values are stored under both the resolved name and the raw port
/// id (dual-keying), so behaviors written against either convention find
/// their value. Two connections landing on the same key follow
/// last-write-wins in connection declaration order.
pub fn resolve_inputs(
    node: &NodeSpec,
    connections: &[Connection],
    results: &HashMap<String, Value>,
) -> BTreeMap<String, Value> {
    let mut inputs = BTreeMap::new();

    for conn in connections.iter().filter(|c| c.to_node == node.id) {
        let Some(result) = results.get(&conn.from_node) else {
            continue;
        };

        let value = result
            .get_member(&conn.from_port)
            .unwrap_or_else(|| result.clone());

        let input_name = node
            .inputs
            .iter()
            .find(|port| port.id == conn.to_port)
            .map(|port| port.name.clone())
            .unwrap_or_else(|| conn.to_port.clone());

        if input_name != conn.to_port {
            inputs.insert(conn.to_port.clone(), value.clone());
        }
        inputs.insert(input_name, value);
    }

    inputs
}
