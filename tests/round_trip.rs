use proptest::prelude::*;
use scopemap::{
    Binding, BindingRange, Callsite, Codec, ErrorKind, GeneratedRange, OriginalScope, Position,
    ScopeInfo, SourceMap, Strategy as Layout,
};
use std::{collections::HashSet, rc::Rc};

const NAMES: [&str; 6] = ["x", "y", "tmp", "value", "a", "b"];
const KINDS: [&str; 3] = ["function", "block", "class"];

/// The shape of one node, positions are laid out afterwards.
#[derive(Debug, Clone)]
struct Shape {
    column: u32,
    gap: u32,
    end_column: u32,
    label: Option<usize>,
    flag: bool,
    pick: usize,
    children: Vec<Shape>,
}

fn attributes() -> impl Strategy<Value = Shape> {
    (
        0u32..40,
        1u32..4,
        0u32..40,
        prop::option::of(0usize..NAMES.len()),
        any::<bool>(),
        0usize..1000,
    )
        .prop_map(|(column, gap, end_column, label, flag, pick)| Shape {
            column,
            gap,
            end_column,
            label,
            flag,
            pick,
            children: vec![],
        })
}

fn shape() -> impl Strategy<Value = Shape> {
    attributes().prop_recursive(3, 24, 3, |inner| {
        (attributes(), prop::collection::vec(inner, 0..3)).prop_map(|(mut shape, children)| {
            shape.children = children;
            shape
        })
    })
}

fn layout_scope(shape: &Shape, line: &mut u32) -> OriginalScope {
    let start = Position::new(*line, shape.column);
    *line += shape.gap;
    let children = shape
        .children
        .iter()
        .map(|child| Rc::new(layout_scope(child, line)))
        .collect();
    let end = Position::new(*line, shape.end_column);
    *line += 1;

    OriginalScope {
        start,
        end,
        kind: shape.label.map(|label| KINDS[label % KINDS.len()].to_string()),
        name: shape.label.map(|label| NAMES[label].to_string()),
        is_stack_frame: shape.flag,
        variables: NAMES[..shape.pick % 3].iter().map(|name| name.to_string()).collect(),
        children,
    }
}

fn collect(scope: &Rc<OriginalScope>, into: &mut Vec<Rc<OriginalScope>>) {
    into.push(Rc::clone(scope));
    for child in &scope.children {
        collect(child, into);
    }
}

fn binding(choice: usize, variable: usize, start: Position, end: Position) -> Binding {
    match choice % 3 {
        0 => Binding::Unavailable,
        1 => Binding::Expression(format!("_{}", NAMES[variable])),
        _ => {
            let middle = Position::new(start.line + 1, 0);
            Binding::Ranges(vec![
                BindingRange::new(start, middle, Some(NAMES[variable])),
                BindingRange::new(middle, end, None),
            ])
        }
    }
}

fn layout_range(shape: &Shape, line: &mut u32, scopes: &[Rc<OriginalScope>]) -> GeneratedRange {
    let start = Position::new(*line, shape.column);
    *line += shape.gap;
    let children = shape
        .children
        .iter()
        .map(|child| layout_range(child, line, scopes))
        .collect();
    let end = Position::new(*line, shape.end_column);
    *line += 1;

    let original_scope = match shape.label {
        Some(_) if !scopes.is_empty() => Some(Rc::clone(&scopes[shape.pick % scopes.len()])),
        _ => None,
    };
    let values = match &original_scope {
        Some(scope) => (0..scope.variables.len())
            .map(|variable| match shape.flag {
                true => binding(shape.pick / 7 + variable, variable, start, end),
                false => Binding::Unavailable,
            })
            .collect(),
        None => vec![],
    };
    let callsite = (shape.pick % 5 == 0).then(|| {
        let pick = shape.pick as u32;
        Callsite::new(pick % 3, pick % 50, pick % 20)
    });

    GeneratedRange {
        start,
        end,
        original_scope,
        is_stack_frame: shape.flag,
        is_hidden: shape.pick % 4 == 1,
        callsite,
        values,
        children,
    }
}

fn build(originals: Vec<Shape>, generated: Vec<Shape>) -> ScopeInfo {
    let scopes: Vec<_> = originals
        .iter()
        .map(|shape| Rc::new(layout_scope(shape, &mut 0)))
        .collect();
    let mut all = vec![];
    for scope in &scopes {
        collect(scope, &mut all);
    }

    let mut line = 0;
    let ranges = generated
        .iter()
        .map(|shape| layout_range(shape, &mut line, &all))
        .collect();

    ScopeInfo::new(scopes, ranges)
}

fn info() -> impl Strategy<Value = ScopeInfo> {
    (
        prop::collection::vec(shape(), 0..3),
        prop::collection::vec(shape(), 0..3),
    )
        .prop_map(|(originals, generated)| build(originals, generated))
}

/// A global scope in each of two sources, with a range defined by the
/// second function of the second source.
fn two_sources() -> (ScopeInfo, Rc<OriginalScope>) {
    let first = Rc::new(
        OriginalScope::new((0, 0), (20, 0))
            .with_kind("global")
            .with_child(OriginalScope::new((2, 0), (8, 1)).with_name("main").stack_frame()),
    );
    let helper = Rc::new(
        OriginalScope::new((6, 0), (9, 1))
            .with_kind("function")
            .with_name("helper")
            .stack_frame()
            .with_variables(["x", "y"]),
    );
    let second = Rc::new(
        OriginalScope::new((0, 0), (12, 0))
            .with_kind("global")
            .with_child(OriginalScope::new((1, 0), (4, 1)).with_name("init"))
            .with_child(Rc::clone(&helper)),
    );
    let range = GeneratedRange::new((0, 0), (2, 10)).with_child(
        GeneratedRange::new((1, 4), (1, 60))
            .with_definition(&helper)
            .stack_frame()
            .with_callsite(Callsite::new(0, 5, 2))
            .with_values([
                Binding::Expression("a".to_string()),
                Binding::Ranges(vec![
                    BindingRange::new((1, 4), (1, 30), Some("b")),
                    BindingRange::new((1, 30), (1, 60), None),
                ]),
            ]),
    );

    (ScopeInfo::new(vec![first, second], vec![range]), helper)
}

proptest! {
    #[test]
    fn test_every_codec_round_trips(info in info()) {
        for codec in Codec::all() {
            let map = codec.encode(&info, &SourceMap::new()).unwrap();
            let decoded = codec.decode(&map).unwrap();

            prop_assert_eq!(&decoded, &info, "{}", codec);
        }
    }

    #[test]
    fn test_names_stay_unique(info in info()) {
        for codec in Codec::all() {
            let names = codec.encode(&info, &SourceMap::new()).unwrap().names.unwrap();
            let unique: HashSet<_> = names.iter().collect();

            prop_assert_eq!(unique.len(), names.len());
        }
    }
}

#[test]
fn test_reference_into_second_source() {
    let (info, helper) = two_sources();

    for codec in Codec::all() {
        let map = codec.verify(&info, &SourceMap::new()).unwrap();
        let decoded = codec.decode(&map).unwrap();
        let definition = decoded.ranges[0].children[0].original_scope.as_ref().unwrap();

        assert_eq!(**definition, *helper, "{codec}");
        assert!(Rc::ptr_eq(definition, &decoded.scopes[1].children[1]), "{codec}");
    }
}

#[test]
fn test_host_fields_survive_json() {
    let (info, _) = two_sources();
    let text = r#"{"version":3,"file":"out.js","sources":["a.js","b.js"],"names":["helper","z"],"mappings":"AAAA","x_google_ignoreList":[1]}"#;
    let map = SourceMap::from_json(text).unwrap();

    for codec in Codec::all() {
        let encoded = codec.encode(&info, &map).unwrap();
        let reparsed = SourceMap::from_json(&encoded.to_json().unwrap()).unwrap();

        assert_eq!(reparsed.extra, map.extra);
        assert_eq!(codec.decode(&reparsed).unwrap(), info, "{codec}");
    }
}

#[test]
fn test_existing_names_are_reused() {
    let (info, _) = two_sources();
    let map = SourceMap {
        names: Some(vec!["helper".to_string(), "unrelated".to_string()]),
        ..SourceMap::default()
    };

    for codec in Codec::all() {
        let names = codec.encode(&info, &map).unwrap().names.unwrap();

        // global, function, main, init, x, y, a, b
        assert_eq!(names.len(), 10, "{codec}");
        assert_eq!(names[..2], ["helper", "unrelated"]);
        assert_eq!(names.iter().filter(|name| *name == "helper").count(), 1);
        assert!(names.iter().any(|name| name == "main"));
    }
}

#[test]
fn test_strategies_write_their_own_fields() {
    let (info, _) = two_sources();

    for codec in Codec::all() {
        let map = codec.encode(&info, &SourceMap::new()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();
        let fields = codec.strategy().fields();

        for field in ["originalScopes", "generatedRanges", "scopes"] {
            assert_eq!(json.get(field).is_some(), fields.contains(&field), "{codec}: {field}");
        }
    }
}

#[test]
fn test_sizes_differ_between_layouts() {
    let (info, _) = two_sources();
    let size = |layout| {
        let map = Codec::new(layout).encode(&info, &SourceMap::new()).unwrap();
        map.original_scopes.unwrap_or_default().concat().len()
            + map.generated_ranges.unwrap_or_default().len()
            + map.scopes.unwrap_or_default().len()
    };

    assert!(size(Layout::InlineFlags) < size(Layout::LengthPrefixed));
    assert!(size(Layout::TagCombined) < size(Layout::TagSplit));
}

#[test]
fn test_truncated_stream_is_unbalanced() {
    let scope = Rc::new(OriginalScope::new((0, 0), (3, 0)));
    let info = ScopeInfo::new(
        vec![Rc::clone(&scope)],
        vec![GeneratedRange::new((0, 0), (0, 9)).with_definition(&scope)],
    );
    let codec = Codec::new(Layout::TagCombined);
    let mut map = codec.encode(&info, &SourceMap::new()).unwrap();
    let scopes = map.scopes.as_mut().unwrap();
    assert!(scopes.ends_with('A'));
    scopes.pop();

    assert_eq!(codec.decode(&map).unwrap_err().kind(), ErrorKind::UnbalancedRangeTree);
}

#[test]
fn test_decoding_with_another_strategy() {
    let (info, _) = two_sources();
    let map = Codec::new(Layout::TagSplit).encode(&info, &SourceMap::new()).unwrap();
    let error = Codec::new(Layout::InlineFlags).decode(&map).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MissingFields);
}

#[test]
fn test_invalid_info_is_rejected() {
    let outside = Rc::new(OriginalScope::new((0, 0), (1, 0)));
    let info = ScopeInfo::new(
        vec![Rc::new(OriginalScope::new((0, 0), (1, 0)))],
        vec![GeneratedRange::new((0, 0), (0, 5)).with_definition(&outside)],
    );

    for codec in Codec::all() {
        let error = codec.encode(&info, &SourceMap::new()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidDefinitionReference, "{codec}");
    }
}

#[test]
fn test_backwards_binding_segment_is_rejected() {
    let scope = Rc::new(OriginalScope::new((0, 0), (9, 0)).with_variables(["x", "y"]));
    let info = ScopeInfo::new(
        vec![Rc::clone(&scope)],
        vec![GeneratedRange::new((0, 0), (1, 0))
            .with_definition(&scope)
            .with_values([
                Binding::Unavailable,
                Binding::Ranges(vec![
                    BindingRange::new((0, 0), (5, 0), Some("a")),
                    BindingRange::new((5, 0), (1, 0), Some("b")),
                ]),
            ])],
    );

    for codec in Codec::all() {
        let error = codec.encode(&info, &SourceMap::new()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidScopeInfo, "{codec}");
    }
}

#[test]
fn test_missing_values_are_rejected() {
    let scope = Rc::new(OriginalScope::new((0, 0), (9, 0)).with_variables(["x", "y"]));
    let info = ScopeInfo::new(
        vec![Rc::clone(&scope)],
        vec![GeneratedRange::new((0, 0), (1, 0)).with_definition(&scope)],
    );

    for codec in Codec::all() {
        let error = codec.encode(&info, &SourceMap::new()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidScopeInfo, "{codec}");
    }
}
