//! End-to-end linker behavior: fixed-point resolution, diagnostics,
//! finalization, and environment propagation over whole module graphs.

use modlink_core::expr;
use modlink_core::{
    link, partition, Entity, EntityKind, LinkErrorKind, LinkFailure, LinkerConfig,
    ModuleDocument, ModuleGraph, PermissiveCatalog, Pragma, Resolver, StaticCatalog, Value,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/modules")
        .join(name)
}

fn load_fixture(name: &str) -> ModuleGraph {
    let path = fixture(name);
    let src = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    let doc: ModuleDocument = if name.ends_with(".yaml") {
        serde_yaml::from_str(&src).unwrap()
    } else {
        serde_json::from_str(&src).unwrap()
    };
    ModuleGraph::from_document(doc, &LinkerConfig::default()).unwrap()
}

fn value(name: &str, v: serde_json::Value) -> Entity {
    Entity::new(name, EntityKind::Value, Value::from_json(v))
}

fn resolve_value(graph: &ModuleGraph, name: &str) -> serde_json::Value {
    graph.get(name).unwrap().reference.to_json()
}

// ──────────────────────────────────────────────
// Fixed-point resolution
// ──────────────────────────────────────────────

#[test]
fn chained_references_resolve_in_two_iterations() {
    let graph = ModuleGraph::new("m")
        .with(value("A", json!("hello")))
        .with(value("B", json!({"Ref": "A"})))
        .with(value("C", json!({"Fn::Sub": "${B}-world"})));

    let linked = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap();
    assert_eq!(linked.stats.iterations, 2);
    assert_eq!(linked.stats.promoted, 2);
    assert_eq!(resolve_value(&linked.graph, "A"), json!("hello"));
    assert_eq!(resolve_value(&linked.graph, "B"), json!("hello"));
    assert_eq!(resolve_value(&linked.graph, "C"), json!("hello-world"));
}

#[test]
fn acyclic_chain_terminates_within_entity_count() {
    let n = 12;
    let mut graph = ModuleGraph::new("chain").with(value("E0", json!("root")));
    for i in 1..n {
        graph = graph.with(value(&format!("E{}", i), json!({"Ref": format!("E{}", i - 1)})));
    }

    let config = LinkerConfig::default();
    let mut resolver = Resolver::new(partition(graph).unwrap(), &config, &PermissiveCatalog);
    resolver.run().unwrap();

    assert!(resolver.bound().is_empty());
    assert!(resolver.stats().iterations <= n);
    let (graph, _) = resolver.finish().unwrap();
    assert_eq!(resolve_value(&graph, &format!("E{}", n - 1)), json!("root"));
}

#[test]
fn free_set_only_grows() {
    let graph = ModuleGraph::new("m")
        .with(value("A", json!({"Ref": "B"})))
        .with(value("B", json!({"Ref": "C"})))
        .with(value("C", json!({"Ref": "D"})))
        .with(value("D", json!(["x", "y"])))
        .with(value("Stuck", json!({"Ref": "Nowhere"})));

    let config = LinkerConfig::default();
    let mut resolver = Resolver::new(partition(graph).unwrap(), &config, &PermissiveCatalog);
    let mut previous: BTreeSet<String> = resolver.free().keys().cloned().collect();

    loop {
        let promoted = resolver.step().unwrap();
        let current: BTreeSet<String> = resolver.free().keys().cloned().collect();
        assert!(current.is_superset(&previous));
        assert_eq!(current.len(), previous.len() + promoted);
        previous = current;
        if promoted == 0 || resolver.bound().is_empty() {
            break;
        }
    }
    assert_eq!(resolver.bound().keys().collect::<Vec<_>>(), ["Stuck"]);
}

// ──────────────────────────────────────────────
// Diagnostics
// ──────────────────────────────────────────────

#[test]
fn mutual_references_report_one_cycle() {
    let graph = ModuleGraph::new("m")
        .with(value("A", json!({"Ref": "B"})))
        .with(value("B", json!({"Ref": "A"})));

    let config = LinkerConfig::default();
    let mut resolver = Resolver::new(partition(graph).unwrap(), &config, &PermissiveCatalog);
    resolver.run().unwrap();
    assert_eq!(resolver.stats().promoted, 0);
    assert_eq!(resolver.bound().len(), 2);

    let failure = resolver.finish().unwrap_err();
    let errors = failure.diagnostics();
    assert_eq!(errors.len(), 1);
    let cycle = &errors[0];
    assert_eq!(cycle.kind, LinkErrorKind::CircularDependency);
    assert_eq!(cycle.entity, "A");
    assert_eq!(cycle.related, ["B"]);
    assert!(cycle.message.contains("A -> B") && cycle.message.contains("B -> A"));
}

#[test]
fn dependents_of_a_cycle_are_blocked_not_members() {
    let graph = ModuleGraph::new("m")
        .with(value("A", json!({"Ref": "B"})))
        .with(value("B", json!({"Ref": "A"})))
        .with(value("C", json!({"Fn::Sub": "${A}!"})))
        .with(value("X", json!({"Ref": "Y"})))
        .with(value("Y", json!({"Ref": "X"})));

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    let errors = failure.diagnostics();
    let kinds: Vec<_> = errors.iter().map(|e| (e.kind, e.entity.as_str())).collect();
    assert_eq!(
        kinds,
        [
            (LinkErrorKind::CircularDependency, "A"),
            (LinkErrorKind::CircularDependency, "X"),
            (LinkErrorKind::BlockedDependency, "C"),
        ]
    );
    assert_eq!(errors[0].related, ["B"]);
    assert_eq!(errors[1].related, ["Y"]);
    assert_eq!(errors[2].reference.as_deref(), Some("A"));
}

#[test]
fn waiting_on_a_missing_reference_is_not_a_cycle() {
    let graph = ModuleGraph::new("m")
        .with(value("A", json!({"Ref": "Z"})))
        .with(value("B", json!({"Ref": "A"})));

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    let errors = failure.diagnostics();
    assert!(errors
        .iter()
        .all(|e| e.kind != LinkErrorKind::CircularDependency));
    let kinds: Vec<_> = errors.iter().map(|e| (e.kind, e.entity.as_str())).collect();
    assert_eq!(
        kinds,
        [
            (LinkErrorKind::MissingReference, "A"),
            (LinkErrorKind::BlockedDependency, "B"),
        ]
    );
}

#[test]
fn self_reference_is_a_cycle_of_one() {
    let graph = ModuleGraph::new("m").with(value("A", json!({"list": [{"Ref": "A"}]})));

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    let errors = failure.diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LinkErrorKind::CircularDependency);
    assert!(errors[0].related.is_empty());
    assert!(errors[0].message.contains("A -> A"));
}

#[test]
fn colliding_logical_ids_fail_before_resolution() {
    let graph = ModuleGraph::new("m")
        .with(
            Entity::new("A::BC", EntityKind::Resource, expr::reference("@ABC"))
                .with_type("AWS::SQS::Queue"),
        )
        .with(
            Entity::new("AB::C", EntityKind::Resource, expr::reference("@ABC"))
                .with_type("AWS::SNS::Topic"),
        );

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    let errors = failure.diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LinkErrorKind::DuplicateName);
    assert_eq!(errors[0].entity, "AB::C");
    assert_eq!(errors[0].related, ["A::BC"]);
}

#[test]
fn missing_reference_leaves_entry_bound() {
    let graph = ModuleGraph::new("m")
        .with(value("A", json!({"Ref": "Z"})))
        .with(value("B", json!("fine")));

    let config = LinkerConfig::default();
    let mut resolver = Resolver::new(partition(graph).unwrap(), &config, &PermissiveCatalog);
    resolver.run().unwrap();
    assert!(resolver.bound().contains_key("A"));
    assert!(resolver.free().contains_key("B"));

    let failure = resolver.finish().unwrap_err();
    let errors = failure.diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LinkErrorKind::MissingReference);
    assert_eq!(errors[0].entity, "A");
    assert_eq!(errors[0].reference.as_deref(), Some("Z"));
}

#[test]
fn every_missing_reference_is_reported_at_once() {
    let graph = ModuleGraph::new("m")
        .with(value("A", json!({"x": {"Ref": "Z1"}, "y": {"Fn::Sub": "${Z2}-${Z3.Arn}"}})))
        .with(value("B", json!({"Ref": "Z4"})));

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    let missing: Vec<_> = failure
        .diagnostics()
        .iter()
        .map(|e| (e.kind, e.reference.clone().unwrap_or_default()))
        .collect();
    assert_eq!(
        missing,
        [
            (LinkErrorKind::MissingReference, "Z1".to_owned()),
            (LinkErrorKind::MissingReference, "Z2".to_owned()),
            (LinkErrorKind::MissingReference, "Z3".to_owned()),
            (LinkErrorKind::MissingReference, "Z4".to_owned()),
        ]
    );
}

#[test]
fn unsupported_attribute_names_resource_and_attribute() {
    let graph = ModuleGraph::new("m")
        .with(Entity::new("R", EntityKind::Resource, expr::reference("@R")).with_type("Queue"))
        .with(Entity::new("F", EntityKind::Value, expr::attribute("R", "Arn")));
    let catalog = StaticCatalog::new().with_type("Queue", ["QueueName", "QueueUrl"]);

    let failure = link(graph, &LinkerConfig::default(), &catalog).unwrap_err();
    let errors = failure.diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LinkErrorKind::InvalidAttribute);
    assert_eq!(errors[0].reference.as_deref(), Some("R"));
    assert!(errors[0].message.contains("Arn"));
}

#[test]
fn attribute_of_plain_value_fails_despite_pragma() {
    let graph = ModuleGraph::new("m")
        .with(value("V", json!("v")).with_pragma(Pragma::NoTypeValidation))
        .with(value("F", json!({"Fn::GetAtt": ["V", "Arn"]})));

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    assert!(failure
        .diagnostics()
        .iter()
        .any(|e| e.kind == LinkErrorKind::InvalidAttribute && e.reference.as_deref() == Some("V")));
}

#[test]
fn pragma_skips_catalog_for_resources() {
    let graph = ModuleGraph::new("m")
        .with(
            Entity::new("R", EntityKind::Resource, expr::reference("@R"))
                .with_type("Custom::Thing")
                .with_pragma(Pragma::NoTypeValidation),
        )
        .with(Entity::new("F", EntityKind::Value, expr::attribute("R", "Anything")));

    let linked = link(graph, &LinkerConfig::default(), &StaticCatalog::new()).unwrap();
    assert_eq!(
        resolve_value(&linked.graph, "F"),
        json!({"Fn::GetAtt": ["R", "Anything"]})
    );
}

#[test]
fn null_value_aborts_with_structural_error() {
    let graph = ModuleGraph::new("m").with(value("A", json!({"Ref": "B"}))).with(Entity::new(
        "B",
        EntityKind::Value,
        Value::from_json(json!({"nested": null})),
    ));

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    assert!(matches!(failure, LinkFailure::Structural(_)));
}

// ──────────────────────────────────────────────
// Template substitution
// ──────────────────────────────────────────────

#[test]
fn scalar_targets_splice_into_literal_text() {
    let graph = ModuleGraph::new("m")
        .with(value("X", json!("abc")))
        .with(value("Y", json!({"Fn::Sub": "prefix-${X}-suffix"})));

    let linked = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap();
    assert_eq!(resolve_value(&linked.graph, "Y"), json!("prefix-abc-suffix"));
}

#[test]
fn list_targets_become_synthetic_arguments() {
    let graph = ModuleGraph::new("m")
        .with(value("X", json!(["a", "b"])))
        .with(value("Y", json!({"Fn::Sub": "prefix-${X}-suffix"})));

    let linked = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap();
    assert_eq!(
        resolve_value(&linked.graph, "Y"),
        json!({"Fn::Sub": ["prefix-${P0}-suffix", {"P0": ["a", "b"]}]})
    );
}

#[test]
fn reserved_placeholders_survive_resolution() {
    let graph = ModuleGraph::new("m")
        .with(value("Stage", json!("prod")))
        .with(value("Name", json!({"Fn::Sub": "${Stage}-${AWS::Region}-${!Literal}"})));

    let linked = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap();
    assert_eq!(
        resolve_value(&linked.graph, "Name"),
        json!({"Fn::Sub": "prod-${AWS::Region}-${!Literal}"})
    );
}

// ──────────────────────────────────────────────
// Finalization
// ──────────────────────────────────────────────

#[test]
fn finalize_twice_changes_nothing() {
    let config = LinkerConfig::default();
    let linked = link(load_fixture("hello.json"), &config, &PermissiveCatalog).unwrap();

    let mut again = linked.graph.clone();
    modlink_core::finalize(&mut again, &config).unwrap();
    assert_eq!(again, linked.graph);
}

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

#[test]
fn hello_fixture_links_end_to_end() {
    let config = LinkerConfig::default();
    let linked = link(load_fixture("hello.json"), &config, &PermissiveCatalog).unwrap();

    assert_eq!(linked.stats.iterations, 1);
    assert_eq!(resolve_value(&linked.graph, "Subject"), json!("hello-world"));
    assert_eq!(resolve_value(&linked.graph, "Token"), json!({"Ref": "Token"}));
    assert_eq!(resolve_value(&linked.graph, "Api::Timeout"), json!(30));

    let api = &linked.environments["Api"].variables;
    assert_eq!(
        api.keys().collect::<Vec<_>>(),
        ["STR_SUBJECT", "SEC_TOKEN", "STR_API_TIMEOUT"]
    );
    assert_eq!(api["STR_API_TIMEOUT"], Value::string("30"));

    let template = linked.template(&config);
    assert_eq!(
        template["Parameters"],
        json!({"Token": {"Type": "String", "NoEcho": true}})
    );
    assert_eq!(
        template["Resources"]["Bucket"]["Properties"]["BucketName"],
        json!({"Fn::Sub": "hello-world-${AWS::Region}"})
    );
    assert_eq!(
        template["Resources"]["Api"]["Properties"]["Environment"]["Variables"],
        json!({
            "BUCKET_ARN": {"Fn::GetAtt": ["Bucket", "Arn"]},
            "STR_SUBJECT": "hello-world",
            "SEC_TOKEN": {"Ref": "Token"},
            "STR_API_TIMEOUT": "30"
        })
    );
}

#[test]
fn queue_fixture_links_with_permissive_catalog() {
    let config = LinkerConfig::default();
    let linked = link(load_fixture("queue.yaml"), &config, &PermissiveCatalog).unwrap();

    assert_eq!(linked.stats.iterations, 2);
    let worker = &linked.environments["Worker"].variables;
    assert_eq!(
        worker["STR_QUEUEARN"].to_json(),
        json!({"Fn::GetAtt": ["Queue", "Arn"]})
    );
    assert_eq!(
        worker["STR_HOSTS"].to_json(),
        json!({"Fn::Join": [",", ["alpha", "beta"]]})
    );
    let template = linked.template(&config);
    assert_eq!(
        template["Resources"]["Worker"]["Properties"]["Description"],
        json!({"Fn::Sub": "drains ${Queue}"})
    );
}

#[test]
fn queue_fixture_fails_against_restrictive_catalog() {
    let src = std::fs::read_to_string(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/catalog.json"),
    )
    .unwrap();
    let catalog: StaticCatalog = serde_json::from_str(&src).unwrap();

    let failure = link(load_fixture("queue.yaml"), &LinkerConfig::default(), &catalog).unwrap_err();
    let errors = failure.diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].entity, "QueueArn");
    assert_eq!(errors[0].reference.as_deref(), Some("Queue"));
}

#[test]
fn unknown_scope_fails_after_resolution() {
    let graph = ModuleGraph::new("m")
        .with(Entity::new("F", EntityKind::Function, expr::reference("@F")))
        .with(value("V", json!("v")).with_scope(["G"]));

    let failure = link(graph, &LinkerConfig::default(), &PermissiveCatalog).unwrap_err();
    let errors = failure.diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LinkErrorKind::UnknownScope);
    assert_eq!(errors[0].pass, 4);
}
