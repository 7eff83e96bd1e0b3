use wws_comms_protocol::{Edge, EdgeKind, Node, NodeState, Topology};

fn node(id: &str) -> Node {
    Node::new(id, format!("agent-{id}"), NodeState::Running)
}

fn ids(nodes: Vec<&Node>) -> Vec<&str> {
    nodes.into_iter().map(|n| n.id.as_str()).collect()
}

fn sample() -> Topology {
    // orchestrator -> {coder, tester}; coder <-> reviewer; tester -> fuzzer
    Topology::new(
        vec![
            node("orchestrator"),
            node("coder"),
            node("tester"),
            node("reviewer"),
            node("fuzzer"),
        ],
        vec![
            Edge::parent_child("orchestrator", "coder"),
            Edge::parent_child("orchestrator", "tester"),
            Edge::peer("coder", "reviewer"),
            Edge::parent_child("tester", "fuzzer"),
        ],
    )
}

#[test]
fn test_roots_are_nodes_without_parent() {
    let topo = sample();
    assert_eq!(ids(topo.roots()), vec!["orchestrator", "reviewer"]);
}

#[test]
fn test_peer_edges_do_not_demote_roots() {
    let topo = Topology::new(vec![node("a"), node("b")], vec![Edge::peer("a", "b")]);
    assert_eq!(ids(topo.roots()), vec!["a", "b"]);
}

#[test]
fn test_children_follow_edge_direction() {
    let topo = sample();
    assert_eq!(ids(topo.children_of("orchestrator")), vec!["coder", "tester"]);
    assert_eq!(ids(topo.children_of("tester")), vec!["fuzzer"]);
    assert!(topo.children_of("fuzzer").is_empty());
    // The child end has no children through the same edge.
    assert!(topo.children_of("coder").is_empty());
}

#[test]
fn test_peers_are_symmetric() {
    let topo = sample();
    assert_eq!(ids(topo.peers_of("coder")), vec!["reviewer"]);
    assert_eq!(ids(topo.peers_of("reviewer")), vec!["coder"]);
    assert!(topo.peers_of("orchestrator").is_empty());
}

#[test]
fn test_peers_union_both_sides() {
    let topo = Topology::new(
        vec![node("hub"), node("left"), node("right")],
        vec![Edge::peer("left", "hub"), Edge::peer("hub", "right")],
    );
    assert_eq!(ids(topo.peers_of("hub")), vec!["left", "right"]);
}

#[test]
fn test_cycle_has_no_roots() {
    let topo = Topology::new(
        vec![node("a"), node("b"), node("c")],
        vec![
            Edge::parent_child("a", "b"),
            Edge::parent_child("b", "c"),
            Edge::parent_child("c", "a"),
        ],
    );
    assert!(topo.roots().is_empty());
    assert_eq!(ids(topo.children_of("c")), vec!["a"]);
}

#[test]
fn test_dangling_edges_are_tolerated() {
    let topo = Topology::new(
        vec![node("a"), node("b")],
        vec![
            Edge::parent_child("ghost", "a"),
            Edge::parent_child("b", "phantom"),
            Edge::peer("b", "nobody"),
        ],
    );
    // "a" has an incoming parent_child edge even though its parent is unknown.
    assert_eq!(ids(topo.roots()), vec!["b"]);
    assert!(topo.children_of("b").is_empty());
    assert!(topo.peers_of("b").is_empty());
    assert_eq!(ids(topo.children_of("ghost")), vec!["a"]);
}

#[test]
fn test_unknown_edges_are_ignored_by_queries() {
    let topo = Topology::new(
        vec![node("a"), node("b")],
        vec![Edge {
            from: "a".into(),
            to: "b".into(),
            kind: EdgeKind::Unknown,
        }],
    );
    assert_eq!(ids(topo.roots()), vec!["a", "b"]);
    assert!(topo.children_of("a").is_empty());
    assert!(topo.peers_of("a").is_empty());
}

#[test]
fn test_empty_topology() {
    let topo = Topology::default();
    assert!(topo.is_empty());
    assert!(topo.roots().is_empty());
    assert!(topo.children_of("x").is_empty());
}

#[test]
fn test_topology_from_kernel_json() {
    let raw = r#"{
        "nodes": [
            {"id": "a1", "name": "planner", "state": "Running", "model": "gpt-4"},
            {"id": "a2", "name": "worker", "state": "Crashed", "model": "llama"}
        ],
        "edges": [{"from": "a1", "to": "a2", "kind": "parent_child"}]
    }"#;
    let topo = Topology::from_json(raw).unwrap();
    assert_eq!(ids(topo.roots()), vec!["a1"]);
    assert_eq!(topo.nodes[1].state, NodeState::Crashed);
}
