// crates/pipenodes/tests/pipeline_test.rs

use pipecore::{
    Dataset, Edge, GraphDocument, GraphError, Node, NodeError, NodeId, OperationKind, Payload,
    PatternSelection, Readiness,
};
use pipenodes::{standard_registry, JoinConfig};
use piperuntime::{evaluate, topological_order, EngineConfig, GraphEngine};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn engine() -> GraphEngine {
    init_tracing();
    GraphEngine::new(Arc::new(standard_registry()))
}

/// Adds a configured Load node that already holds a dataset.
fn load(engine: &mut GraphEngine, columns: &[&str]) -> NodeId {
    let id = engine
        .add_node(
            OperationKind::Load,
            Some(json!({"path": "data.csv", "isAvailable": true})),
        )
        .unwrap();
    let dataset = Dataset::new(format!("load{}", id), columns.iter().copied());
    engine
        .set_output(id, vec![Some(Payload::Dataset(dataset))])
        .unwrap();
    id
}

fn suffixes(engine: &GraphEngine, id: NodeId) -> Vec<Option<String>> {
    let config = engine.graph().node(id).unwrap().config.clone().unwrap();
    serde_json::from_value::<JoinConfig>(config).unwrap().suffixes
}

#[test]
fn join_key_must_exist_upstream() {
    let mut engine = engine();
    let left = load(&mut engine, &["a", "b", "c"]);
    let right = load(&mut engine, &["a1", "b1", "c1"]);
    let join = engine
        .add_node(OperationKind::Join, Some(json!({"join": [["a", "a1"]]})))
        .unwrap();
    engine.connect(left, join, 0).unwrap();
    engine.connect(right, join, 1).unwrap();
    assert_eq!(engine.readiness(join), Some(Readiness::Ok));

    engine
        .set_config(join, Some(json!({"join": [["a", "zzz"]]})))
        .unwrap();
    assert_eq!(engine.readiness(join), Some(Readiness::Unready));
}

#[test]
fn deleting_a_source_cascades_readiness() {
    init_tracing();
    let dataset = |cols: &[&str]| Some(Payload::Dataset(Dataset::new("file", cols.iter().copied())));
    let load = |id: u32, cols: &[&str]| {
        let mut node = Node::new(NodeId(id), OperationKind::Load, 1)
            .with_config(Some(json!({"path": "in.csv", "isAvailable": true})));
        node.outputs[0] = dataset(cols);
        node
    };
    let join = |id: u32| {
        Node::new(NodeId(id), OperationKind::Join, 1)
            .with_config(Some(json!({"join": [["a", "a"]]})))
    };

    let document = GraphDocument {
        nodes: vec![load(10, &["a", "b"]), load(11, &["a", "c"]), join(12), join(13)],
        edges: vec![
            Edge::new(NodeId(10), 0, NodeId(12), 0),
            Edge::new(NodeId(11), 0, NodeId(12), 1),
            Edge::new(NodeId(12), 0, NodeId(13), 0),
            Edge::new(NodeId(11), 0, NodeId(13), 1),
        ],
        next_id: 14,
    };
    let mut engine =
        GraphEngine::restore(document, Arc::new(standard_registry()), EngineConfig::default())
            .unwrap();
    assert_eq!(engine.readiness(NodeId(12)), Some(Readiness::Ok));
    assert_eq!(engine.readiness(NodeId(13)), Some(Readiness::PredecessorNoOutput));

    engine.delete(vec![NodeId(10)], vec![]).unwrap();

    assert!(engine.graph().node(NodeId(10)).is_none());
    assert_eq!(engine.readiness(NodeId(12)), Some(Readiness::PredecessorMissing));
    assert_eq!(engine.readiness(NodeId(13)), Some(Readiness::PredecessorNoOutput));
    assert!(engine.graph().edges().iter().all(|e| !e.touches(NodeId(10))));
}

#[test]
fn deleting_the_first_load_of_a_join_chain() {
    init_tracing();
    let load = |id: u32| {
        let mut node = Node::new(NodeId(id), OperationKind::Load, 1)
            .with_config(Some(json!({"path": "in.csv", "isAvailable": true})));
        node.outputs[0] = Some(Payload::Dataset(Dataset::new("file", ["a", "b"])));
        node
    };
    let join = |id: u32| {
        Node::new(NodeId(id), OperationKind::Join, 1)
            .with_config(Some(json!({"join": [["a", "a"]]})))
    };

    let document = GraphDocument {
        nodes: vec![load(10), load(11), join(12), join(13)],
        edges: vec![
            Edge::new(NodeId(10), 0, NodeId(12), 0),
            Edge::new(NodeId(11), 0, NodeId(12), 1),
            Edge::new(NodeId(12), 0, NodeId(13), 0),
        ],
        next_id: 14,
    };
    let mut engine =
        GraphEngine::restore(document, Arc::new(standard_registry()), EngineConfig::default())
            .unwrap();
    assert_eq!(engine.readiness(NodeId(12)), Some(Readiness::Ok));
    assert_eq!(engine.readiness(NodeId(13)), Some(Readiness::PredecessorNoOutput));

    engine.delete(vec![NodeId(10)], vec![]).unwrap();

    assert_eq!(engine.graph().edges().len(), 2);
    assert_eq!(engine.readiness(NodeId(12)), Some(Readiness::PredecessorMissing));
    assert_eq!(engine.readiness(NodeId(13)), Some(Readiness::PredecessorNoOutput));
}

#[test]
fn schema_change_rebuilds_provisional_outputs() {
    let mut engine = engine();
    let source = load(&mut engine, &["a", "w"]);
    let cleanse = engine
        .add_node(OperationKind::Cleanse, Some(json!({})))
        .unwrap();
    let sample = engine
        .add_node(OperationKind::Sample, Some(json!({"size": 5, "weight": "w"})))
        .unwrap();
    let regression = engine
        .add_node(
            OperationKind::Regression,
            Some(json!({"target": "w", "predictors": ["a"]})),
        )
        .unwrap();
    engine.connect(source, cleanse, 0).unwrap();
    engine.connect(cleanse, sample, 0).unwrap();
    engine.connect(cleanse, regression, 0).unwrap();
    assert_eq!(engine.readiness(sample), Some(Readiness::Ok));
    assert_eq!(engine.readiness(regression), Some(Readiness::Ok));

    let narrowed = Dataset::new("narrowed", ["a"]);
    engine
        .set_output(source, vec![Some(Payload::Dataset(narrowed))])
        .unwrap();

    let Some(Payload::Dataset(preview)) = engine.graph().node(cleanse).unwrap().output(0) else {
        panic!("expected a provisional dataset");
    };
    assert_eq!(preview.columns, vec!["a"]);

    let graph = engine.graph();
    let weight = &graph.node(sample).unwrap().config.as_ref().unwrap()["weight"];
    assert!(weight.is_null());
    let target = &graph.node(regression).unwrap().config.as_ref().unwrap()["target"];
    assert!(target.is_null());
    assert_eq!(engine.readiness(regression), Some(Readiness::Unready));

    let registry = standard_registry();
    for id in [cleanse, sample, regression] {
        assert_eq!(engine.readiness(id), Some(evaluate(graph, &registry, id)));
    }
}

#[test]
fn pruned_config_readiness_matches_evaluation() {
    let mut engine = engine();
    let source = load(&mut engine, &["a", "b"]);
    let cleanse = engine
        .add_node(
            OperationKind::Cleanse,
            Some(json!({"transforms": [{"op": "fill", "attr": "b", "value": 0}]})),
        )
        .unwrap();
    engine.connect(source, cleanse, 0).unwrap();
    assert_eq!(engine.readiness(cleanse), Some(Readiness::Ok));

    let narrowed = Dataset::new("narrowed", ["a"]);
    engine
        .set_output(source, vec![Some(Payload::Dataset(narrowed))])
        .unwrap();

    let node = engine.graph().node(cleanse).unwrap();
    assert_eq!(node.config.as_ref().unwrap()["transforms"], json!([]));
    assert_eq!(
        engine.readiness(cleanse),
        Some(evaluate(engine.graph(), &standard_registry(), cleanse))
    );
    assert_eq!(engine.readiness(cleanse), Some(Readiness::Ok));
}

#[test]
fn pasted_load_matches_original() {
    let mut engine = engine();
    let original = load(&mut engine, &["a", "b"]);

    let pasted = engine.copy_paste(vec![original]).unwrap();
    assert_eq!(pasted.len(), 1);
    assert_ne!(pasted[0], original);

    let (a, b) = (
        engine.graph().node(original).unwrap(),
        engine.graph().node(pasted[0]).unwrap(),
    );
    assert_eq!(a.kind, b.kind);
    assert_eq!(a.config, b.config);
    assert_eq!(b.readiness, Readiness::Ok);
    assert!(engine.graph().incoming(pasted[0]).is_empty());
}

#[test]
fn chained_joins_keep_distinct_suffixes() {
    let mut engine = engine();
    let left = load(&mut engine, &["a", "b"]);
    let right = load(&mut engine, &["a", "c"]);
    let inner = engine
        .add_node(OperationKind::Join, Some(json!({"join": [["a", "a"]]})))
        .unwrap();
    engine.connect(left, inner, 0).unwrap();
    engine.connect(right, inner, 1).unwrap();

    let outer = engine
        .add_node(OperationKind::Join, Some(json!({"join": [["a", "a"]]})))
        .unwrap();
    engine.connect(inner, outer, 0).unwrap();
    engine.connect(left, outer, 1).unwrap();

    let expected_inner = vec![Some("_0".to_string()), Some("_1".to_string())];
    let expected_outer = vec![Some("_2".to_string()), Some("_03".to_string())];
    assert_eq!(suffixes(&engine, inner), expected_inner);
    assert_eq!(suffixes(&engine, outer), expected_outer);

    // Another propagation pass over the same nodes must not drift.
    let dataset = Dataset::new("again", ["a", "b"]);
    engine
        .set_output(left, vec![Some(Payload::Dataset(dataset))])
        .unwrap();
    assert_eq!(suffixes(&engine, inner), expected_inner);
    assert_eq!(suffixes(&engine, outer), expected_outer);
}

#[test]
fn join_inputs_on_sparse_ports() {
    let mut engine = engine();
    let left = load(&mut engine, &["a", "b"]);
    let right = load(&mut engine, &["a1", "b1"]);
    let join = engine
        .add_node(OperationKind::Join, Some(json!({"join": [["a", "a1"]]})))
        .unwrap();
    engine.connect(left, join, 0).unwrap();
    engine.connect(right, join, 2).unwrap();

    assert_eq!(engine.readiness(join), Some(Readiness::Ok));
    assert_eq!(
        suffixes(&engine, join),
        vec![Some(format!("_{}", left)), Some(format!("_{}", right))]
    );
}

#[test]
fn one_load_on_two_join_ports() {
    let mut engine = engine();
    let source = load(&mut engine, &["a", "b"]);
    let join = engine
        .add_node(OperationKind::Join, Some(json!({"join": [["a", "a"]]})))
        .unwrap();
    engine.connect(source, join, 0).unwrap();
    engine.connect(source, join, 1).unwrap();

    assert_eq!(engine.readiness(join), Some(Readiness::Ok));
    let suffixes = suffixes(&engine, join);
    assert_eq!(suffixes.len(), 2);
    assert_ne!(suffixes[0], suffixes[1]);
}

#[test]
fn browse_follows_a_rerun_of_mine() {
    let mut engine = engine();
    let data = load(&mut engine, &["age", "city", "y"]);
    let mine = engine
        .add_node(
            OperationKind::Mine,
            Some(json!({"targetAttrs": ["y"], "targetKind": "Numerical"})),
        )
        .unwrap();
    engine.connect(data, mine, 0).unwrap();
    assert_eq!(engine.readiness(mine), Some(Readiness::Ok));

    let browse = engine
        .add_node(
            OperationKind::Browse,
            Some(json!({
                "targetAttrs": ["y"],
                "targetKind": "Numerical",
                "groups": [{"name": "young", "patterns": [
                    {"id": 1, "constraints": {"age": {"lb": 20.0, "ub": 30.0}}, "quality": 0.2}
                ]}]
            })),
        )
        .unwrap();
    engine.connect(data, browse, 0).unwrap();
    engine.connect(mine, browse, 1).unwrap();

    let patterns = serde_json::from_value(json!({
        "targetAttrs": ["y"],
        "targetKind": "Numerical",
        "patterns": [
            {"id": 4, "constraints": {"city": {"in": ["x"]}}, "quality": 0.9},
            {"id": 5, "constraints": {"age": {"lb": 20.0, "ub": 30.0}}, "quality": 0.6}
        ]
    }))
    .unwrap();
    engine
        .set_output(mine, vec![Some(Payload::PatternSet(patterns))])
        .unwrap();

    let config = engine.graph().node(browse).unwrap().config.clone().unwrap();
    let selection: PatternSelection = serde_json::from_value(config).unwrap();
    assert_eq!(selection.groups.len(), 1);
    assert_eq!(selection.groups[0].patterns[0].id, 5);
    assert_eq!(selection.groups[0].patterns[0].quality, 0.6);
    assert_eq!(engine.readiness(browse), Some(Readiness::Ok));
}

#[test]
fn unchanged_config_and_isolated_delete_are_no_ops() {
    let mut engine = engine();
    let left = load(&mut engine, &["a"]);
    let right = load(&mut engine, &["a"]);
    let join = engine
        .add_node(OperationKind::Join, Some(json!({"join": [["a", "a"]]})))
        .unwrap();
    engine.connect(left, join, 0).unwrap();
    engine.connect(right, join, 1).unwrap();

    let before = engine.document();
    let current = engine.graph().node(join).unwrap().config.clone();
    engine.set_config(join, current).unwrap();
    assert_eq!(engine.document(), before);

    let lonely = engine.add_node(OperationKind::Export, None).unwrap();
    let with_lonely = engine.document();
    engine.delete(vec![lonely], vec![]).unwrap();
    let after = engine.document();
    assert_eq!(after.edges, with_lonely.edges);
    assert_eq!(after.nodes, before.nodes);
}

#[test]
fn bad_edges_are_rejected() {
    let mut engine = engine();
    let source = load(&mut engine, &["a"]);
    let cleanse = engine
        .add_node(OperationKind::Cleanse, Some(json!({})))
        .unwrap();
    let predict = engine.add_node(OperationKind::Predict, None).unwrap();
    engine.connect(source, cleanse, 0).unwrap();

    assert_eq!(
        engine.connect(cleanse, cleanse, 0),
        Err(GraphError::SelfLoop(cleanse))
    );
    assert!(matches!(
        engine.connect(source, predict, 0),
        Err(GraphError::IncompatiblePorts { .. })
    ));
    assert!(matches!(
        engine.connect(source, cleanse, 0),
        Err(GraphError::DuplicateEdge { .. })
    ));

    let second = load(&mut engine, &["b"]);
    assert_eq!(
        engine.connect(second, cleanse, 0),
        Err(GraphError::PortOccupied {
            node: cleanse,
            port: 0
        })
    );

    let export = engine.add_node(OperationKind::Export, None).unwrap();
    assert!(matches!(
        engine.add_edge(Edge::new(export, 0, cleanse, 0)),
        Err(GraphError::PortOutOfRange { .. })
    ));
}

#[test]
fn topological_order_follows_edges() {
    let mut engine = engine();
    let source = load(&mut engine, &["a"]);
    let cleanse = engine
        .add_node(OperationKind::Cleanse, Some(json!({})))
        .unwrap();
    let sample = engine
        .add_node(OperationKind::Sample, Some(json!({"size": 5})))
        .unwrap();
    engine.connect(sample, cleanse, 0).unwrap();
    engine.connect(source, sample, 0).unwrap();

    let all: BTreeSet<NodeId> = engine.graph().node_ids().collect();
    let order = topological_order(engine.graph(), &all).unwrap();
    let position = |id| order.iter().position(|n| *n == id).unwrap();
    assert!(position(source) < position(sample));
    assert!(position(sample) < position(cleanse));
}

#[test]
fn provisional_output_flows_through_cleanse() {
    let mut engine = engine();
    let source = load(&mut engine, &["a", "b"]);
    let cleanse = engine
        .add_node(OperationKind::Cleanse, Some(json!({})))
        .unwrap();
    let split = engine.add_node(OperationKind::Split, Some(json!({}))).unwrap();
    engine.connect(source, cleanse, 0).unwrap();
    engine.connect(cleanse, split, 0).unwrap();

    let node = engine.graph().node(cleanse).unwrap();
    assert_eq!(node.readiness, Readiness::Ok);
    let Some(Payload::Dataset(preview)) = node.output(0) else {
        panic!("expected a provisional dataset");
    };
    assert_eq!(preview.name, format!("Cleanse{}", cleanse));
    assert_eq!(preview.columns, vec!["a", "b"]);

    let split = engine.graph().node(split).unwrap();
    assert_eq!(split.readiness, Readiness::Ok);
    assert!(split.outputs.iter().all(Option::is_some));
}

#[test]
fn missing_file_marks_load_unavailable() {
    let mut engine = engine();
    let source = load(&mut engine, &["a"]);
    let cleanse = engine
        .add_node(OperationKind::Cleanse, Some(json!({})))
        .unwrap();
    engine.connect(source, cleanse, 0).unwrap();

    engine
        .handle_error(
            source,
            NodeError::FileNotFound {
                path: "data.csv".into(),
            },
        )
        .unwrap();

    let node = engine.graph().node(source).unwrap();
    assert_eq!(node.config.as_ref().unwrap()["isAvailable"], json!(false));
    assert_eq!(node.readiness, Readiness::Unready);
    assert!(node.output(0).is_none());
    assert_eq!(
        engine.readiness(cleanse),
        Some(Readiness::PredecessorUnready)
    );
}

#[test]
fn restore_round_trips_a_document() {
    let mut engine = engine();
    let source = load(&mut engine, &["a", "b"]);
    let sample = engine
        .add_node(OperationKind::Sample, Some(json!({"size": 10})))
        .unwrap();
    engine.connect(source, sample, 0).unwrap();

    let text = serde_json::to_string(&engine.document()).unwrap();
    let document: GraphDocument = serde_json::from_str(&text).unwrap();
    let restored =
        GraphEngine::restore(document, Arc::new(standard_registry()), EngineConfig::default())
            .unwrap();

    assert_eq!(restored.document(), engine.document());
    assert_eq!(restored.readiness(sample), Some(Readiness::Ok));
}
