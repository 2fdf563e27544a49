//! Integration tests for the inspector: object paths, labels, and store
//! snapshots, driven the way an interactive host would drive them.

use assert_matches::assert_matches;
use class_lang::{error::PathError, Machine};

fn load(source: &str) -> Machine {
    class_lang::load(source).unwrap()
}

const COUNTER: &str = "
    class Counter is begin
      var value;

      constructor(v) is value := v;

      method get() is return value;

      method set(v) is value := v;
    end;

    new Counter(seed)
    ";

#[test]
fn test_inspect_class_registry() {
    let machine = load(COUNTER);

    // The registry maps class names to class objects
    let objects = machine.inspect("i:c", 0).unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].state.len(), 1);
    assert_eq!(objects[0].state[0].0, "Counter");
    assert!(objects[0].behaviour.is_empty());

    // A class object holds its prototype and its constructor
    let class_objects = machine.inspect("i:c.Counter", 0).unwrap();
    assert_eq!(class_objects[0].state[0].0, "proto");
    assert_eq!(
        class_objects[0].behaviour,
        vec![("constructor".to_string(), vec!["v".to_string()])]
    );

    // The prototype carries nil members and the method table
    let protos = machine.inspect("i:c.Counter.proto", 0).unwrap();
    assert_eq!(
        protos[0].state,
        vec![("value".to_string(), "NIL".to_string())]
    );
    assert_eq!(
        protos[0].behaviour,
        vec![
            ("get".to_string(), vec![]),
            ("set".to_string(), vec!["v".to_string()]),
        ]
    );
}

#[test]
fn test_inspect_depth_walks_state_edges() {
    let machine = load(COUNTER);
    // Depth 0: just the initial frame. Depth 1 adds the registry behind
    // CLASS (PREV self-loops back to the frame). Depth 2 adds the class
    // object, depth 3 its prototype.
    assert_eq!(machine.inspect(".", 0).unwrap().len(), 1);
    assert_eq!(machine.inspect(".", 1).unwrap().len(), 2);
    assert_eq!(machine.inspect(".", 2).unwrap().len(), 3);
    assert_eq!(machine.inspect(".", 3).unwrap().len(), 4);
    // The graph is exhausted; deeper inspection collects nothing new
    assert_eq!(machine.inspect(".", 10).unwrap().len(), 4);
}

#[test]
fn test_inspect_constructor_frame() {
    let mut machine = load(
        "class C is begin constructor() is skip; end; new C()",
    );
    machine.execute_next().unwrap();

    // The constructor frame binds self, and carries the internalised keys
    let objects = machine.inspect(".", 0).unwrap();
    let keys: Vec<&str> =
        objects[0].state.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["int:CLASS", "int:PREV", "self"]);
}

#[test]
fn test_label_session() {
    let mut machine = load(COUNTER);
    machine.label("i:c.Counter", "counter").unwrap();
    machine.label("i:c.Counter.proto", "proto").unwrap();
    assert_eq!(
        machine.labels(),
        vec!["counter".to_string(), "proto".to_string()]
    );

    // Labelled objects show under their label name, and pointees prefer
    // label names too
    let objects = machine.inspect("l:counter", 0).unwrap();
    assert_eq!(objects[0].name, "counter");
    assert_eq!(objects[0].state, vec![("proto".to_string(), "proto".to_string())]);

    // Reference paths hit the same objects
    let reference = machine.resolve("l:counter").unwrap().unwrap();
    let via_reference = machine
        .inspect(&format!("reference:{}", reference), 0)
        .unwrap();
    assert_eq!(via_reference, objects);

    machine.unlabel("counter");
    assert_eq!(machine.labels(), vec!["proto".to_string()]);
}

#[test]
fn test_bad_paths_are_reported() {
    let machine = load(COUNTER);
    assert_matches!(
        machine.inspect("no.such", 0),
        Err(PathError::UnresolvedSegment(_))
    );
    assert_matches!(
        machine.inspect("l:ghost", 0),
        Err(PathError::UnknownLabel(_))
    );
    assert_matches!(
        machine.inspect("..", 0),
        Err(PathError::Malformed(_))
    );
    // Errors carry the failing segment
    assert_eq!(
        machine.inspect("i:c.Missing.proto", 0).unwrap_err().to_string(),
        "cannot resolve object path at segment `Missing`"
    );
}
