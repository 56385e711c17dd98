/// Grammar loading integration tests.
use tag_grammar::{ContentItem, Datum, Engine, EngineError, Grammar, GrammarError, TagId};

#[test]
fn cats_grammar_loads() {
    let path = std::path::Path::new("tests/fixtures/cats.ron");
    let grammar = Grammar::load_from_ron(path).unwrap();
    assert_eq!(grammar.rules.len(), 2);

    let cats = grammar.rules.rules_for(&TagId::new("cats"));
    assert_eq!(cats.len(), 1);
    let lookups = cats[0]
        .output
        .iter()
        .filter(|item| matches!(item, ContentItem::Data(_)))
        .count();
    assert_eq!(lookups, 5);
}

#[test]
fn tavern_grammar_loads() {
    let path = std::path::Path::new("tests/fixtures/tavern.ron");
    let grammar = Grammar::load_from_ron(path).unwrap();

    let expected_tags = ["root", "greeting", "patron", "name", "drink", "farewell"];
    for tag in &expected_tags {
        assert!(
            grammar.rules.contains(&TagId::new(*tag)),
            "Missing tag: {}",
            tag
        );
    }
    assert!(grammar.rules.contains(&TagId::with_context("name", "tavern")));
    assert_eq!(grammar.data.get("coins"), Some(&Datum::Number(3.0)));

    let greeting = grammar.rules.rules_for(&TagId::new("greeting"));
    assert_eq!(greeting[0].priority(), 1);
    assert!(greeting[0].guard.is_some());
    assert_eq!(greeting[1].priority(), 0);
}

#[test]
fn broken_guard_reports_location() {
    let path = std::path::Path::new("tests/fixtures/broken_guard.ron");
    match Grammar::load_from_ron(path) {
        Err(GrammarError::Expression { location, .. }) => {
            assert!(location.contains("broken_guard.ron"), "{}", location);
            assert!(location.contains("root#0"), "{}", location);
        }
        other => panic!("expected guard error, got {:?}", other),
    }
}

#[test]
fn broken_guard_fails_engine_build() {
    let result = Engine::builder()
        .grammar_file("tests/fixtures/broken_guard.ron")
        .build();
    assert!(matches!(
        result,
        Err(EngineError::Grammar(GrammarError::Expression { .. }))
    ));
}

#[test]
fn files_merge_in_order() {
    let mut engine = Engine::builder()
        .grammar_file("tests/fixtures/cats.ron")
        .grammar_file("tests/fixtures/weighted.ron")
        .build()
        .unwrap();
    // Both files define "root"; the weighted file's rules rank after.
    assert_eq!(engine.rules().rules_for(&TagId::new("root")).len(), 3);
    assert!(engine.rules().contains(&TagId::new("cats")));

    let mut data = engine.namespace();
    let text = engine.run_named("cats", &mut data).unwrap();
    assert!(text.starts_with("two (2) cats"));
}
