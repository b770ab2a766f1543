//! Integration tests for survey-engine

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use example_surveys::{
    flat_block, health_check, nested_blocks, nested_survey_ends, page_sequence,
    without_survey_end,
};
use survey_engine::{
    BasicEvaluator, DeviceClass, EvalContext, Expression, ExpressionEvaluationError,
    ExpressionEvaluator, ExpressionValue, FixedClock, JsonSurveyItemResponse, RenderedItem,
    ResponseItem, Survey, SurveyContext, SurveyEngineCore, SurveyItemType, TypedValue,
};

fn child_keys(engine: &SurveyEngineCore, group: &str) -> Vec<String> {
    engine
        .render_tree()
        .find(group)
        .unwrap()
        .children()
        .iter()
        .map(|item| item.key().to_string())
        .collect()
}

fn page_keys(pages: &[Vec<&survey_engine::SurveyItem>]) -> Vec<Vec<String>> {
    pages
        .iter()
        .map(|page| {
            page.iter()
                .map(|item| item.key().item_key().to_string())
                .collect()
        })
        .collect()
}

// ---- render tree ----

#[test]
fn test_declared_order_without_shuffle() {
    for shuffle in [None, Some(false)] {
        let engine = SurveyEngineCore::new(nested_blocks(shuffle, shuffle).unwrap()).unwrap();
        assert_eq!(
            child_keys(&engine, "survey.outer"),
            [
                "survey.outer.a",
                "survey.outer.b",
                "survey.outer.c",
                "survey.outer.inner",
                "survey.outer.d"
            ]
        );
        assert_eq!(
            child_keys(&engine, "survey.outer.inner"),
            [
                "survey.outer.inner.x1",
                "survey.outer.inner.x2",
                "survey.outer.inner.x3",
                "survey.outer.inner.x4",
                "survey.outer.inner.x5"
            ]
        );
    }
}

#[test]
fn test_shuffle_is_a_permutation() {
    let survey = Arc::new(flat_block(6, Some(true)).unwrap());
    let expected: HashSet<String> = (1..=6).map(|i| format!("survey.block.q{i}")).collect();
    for _ in 0..20 {
        let engine = SurveyEngineCore::new(survey.clone()).unwrap();
        let keys = child_keys(&engine, "survey.block");
        assert_eq!(keys.len(), 6);
        assert_eq!(keys.into_iter().collect::<HashSet<_>>(), expected);
    }
}

#[test]
fn test_shuffle_varies_between_engines() {
    let survey = Arc::new(flat_block(6, Some(true)).unwrap());
    let orders: HashSet<Vec<String>> = (0..12)
        .map(|_| child_keys(&SurveyEngineCore::new(survey.clone()).unwrap(), "survey.block"))
        .collect();
    // 720 possible orders; twelve identical draws would be a broken shuffle.
    assert!(orders.len() > 1);
}

#[test]
fn test_seeded_engines_agree() {
    let survey = Arc::new(flat_block(8, Some(true)).unwrap());
    let a = SurveyEngineCore::builder(survey.clone()).seed(3).build().unwrap();
    let b = SurveyEngineCore::builder(survey).seed(3).build().unwrap();
    assert_eq!(a.render_tree(), b.render_tree());
}

#[test]
fn test_fixed_parent_shuffled_child() {
    let survey = Arc::new(nested_blocks(Some(false), Some(true)).unwrap());
    let inner: HashSet<String> = (1..=5).map(|i| format!("survey.outer.inner.x{i}")).collect();
    for _ in 0..10 {
        let engine = SurveyEngineCore::new(survey.clone()).unwrap();
        assert_eq!(
            child_keys(&engine, "survey.outer"),
            [
                "survey.outer.a",
                "survey.outer.b",
                "survey.outer.c",
                "survey.outer.inner",
                "survey.outer.d"
            ]
        );
        let keys: HashSet<String> = child_keys(&engine, "survey.outer.inner").into_iter().collect();
        assert_eq!(keys, inner);
    }
}

#[test]
fn test_shuffled_parent_fixed_child() {
    let survey = Arc::new(nested_blocks(Some(true), None).unwrap());
    for _ in 0..10 {
        let engine = SurveyEngineCore::new(survey.clone()).unwrap();
        assert_eq!(child_keys(&engine, "survey.outer").len(), 5);
        assert_eq!(
            child_keys(&engine, "survey.outer.inner"),
            [
                "survey.outer.inner.x1",
                "survey.outer.inner.x2",
                "survey.outer.inner.x3",
                "survey.outer.inner.x4",
                "survey.outer.inner.x5"
            ]
        );
    }
}

#[test]
fn test_rebuild_render_tree_keeps_key_set() {
    let mut engine = SurveyEngineCore::builder(flat_block(5, Some(true)).unwrap())
        .seed(11)
        .build()
        .unwrap();
    let before: HashSet<String> = child_keys(&engine, "survey.block").into_iter().collect();
    engine.rebuild_render_tree().unwrap();
    let after: HashSet<String> = child_keys(&engine, "survey.block").into_iter().collect();
    assert_eq!(before, after);
}

#[test]
fn test_render_tree_leaves_are_leaf_variants() {
    let engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    let leaves = engine.render_tree().leaves();
    assert_eq!(leaves.len(), 8);
    assert!(
        leaves
            .iter()
            .all(|leaf| matches!(leaf, RenderedItem::Leaf { .. }))
    );
}

// ---- survey end ----

#[test]
fn test_survey_end_is_first_in_structural_order() {
    // The subgroup holding the first end marker is shuffled; the answer must
    // not depend on render order.
    for _ in 0..5 {
        let engine = SurveyEngineCore::new(nested_survey_ends().unwrap()).unwrap();
        let end = engine.survey_end_item().unwrap();
        assert_eq!(end.key().full_key(), "survey.block.done");
        assert_eq!(end.item_type(), SurveyItemType::SurveyEnd);
    }
}

#[test]
fn test_survey_end_missing() {
    let engine = SurveyEngineCore::new(without_survey_end().unwrap()).unwrap();
    assert!(engine.survey_end_item().is_none());
}

// ---- pagination ----

#[test]
fn test_single_page_without_limits_or_breaks() {
    let engine = SurveyEngineCore::new(page_sequence(&["q1", "q2", "q3"], None).unwrap()).unwrap();
    let pages = engine.get_survey_pages(None);
    assert_eq!(page_keys(&pages), [vec!["q1", "q2", "q3"]]);
}

#[test]
fn test_device_class_limits() {
    let survey = page_sequence(&["q1", "q2", "q3", "q4", "q5"], Some((2, 3))).unwrap();
    let engine = SurveyEngineCore::new(survey).unwrap();

    let large: Vec<usize> = engine
        .get_survey_pages(Some(DeviceClass::Large))
        .iter()
        .map(Vec::len)
        .collect();
    assert_eq!(large, [2, 2, 1]);

    let small: Vec<usize> = engine
        .get_survey_pages(Some(DeviceClass::Small))
        .iter()
        .map(Vec::len)
        .collect();
    assert_eq!(small, [3, 2]);

    assert_eq!(engine.get_survey_pages(None).len(), 1);
}

#[test]
fn test_page_breaks_split_pages() {
    let survey = page_sequence(&["q1", "pb1", "q2", "pb2", "q3"], None).unwrap();
    let engine = SurveyEngineCore::new(survey).unwrap();
    assert_eq!(
        page_keys(&engine.get_survey_pages(None)),
        [vec!["q1"], vec!["q2"], vec!["q3"]]
    );
}

#[test]
fn test_page_breaks_and_limit_compose() {
    let survey = page_sequence(
        &["q1", "q2", "pb1", "q3", "q4", "q5", "q6", "q7", "q8"],
        Some((4, 4)),
    )
    .unwrap();
    let engine = SurveyEngineCore::new(survey).unwrap();
    let sizes: Vec<usize> = engine
        .get_survey_pages(Some(DeviceClass::Large))
        .iter()
        .map(Vec::len)
        .collect();
    assert_eq!(sizes, [2, 4, 2]);
}

#[test]
fn test_only_page_breaks() {
    let engine = SurveyEngineCore::new(page_sequence(&["pb1", "pb2"], None).unwrap()).unwrap();
    assert!(engine.get_survey_pages(None).is_empty());
    assert!(engine.get_survey_pages(Some(DeviceClass::Small)).is_empty());
}

#[test]
fn test_visible_pages_skip_hidden_items() {
    let mut engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();

    // cigarettes is hidden until the participant smokes; broken always fails.
    let pages = engine.get_visible_survey_pages(None);
    assert_eq!(
        page_keys(&pages),
        [
            vec!["smoker"],
            vec!["empty", "plain", "greeting", "end"]
        ]
    );

    engine
        .set_response("health.smoker", ResponseItem::with_value(vec!["yes"]))
        .unwrap();
    let pages = engine.get_visible_survey_pages(Some(DeviceClass::Large));
    assert_eq!(
        page_keys(&pages),
        [
            vec!["smoker", "cigarettes"],
            vec!["empty", "plain", "greeting"],
            vec!["end"]
        ]
    );

    // The unfiltered view never changes.
    assert_eq!(engine.get_survey_pages(None).concat().len(), 7);
}

// ---- conditional cache ----

#[test]
fn test_absent_conditions_are_none() {
    let engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    for key in ["health.plain", "health.empty"] {
        assert_eq!(engine.get_display_condition_value(key, None), None);
        assert_eq!(engine.get_display_condition_value(key, Some("text")), None);
        assert_eq!(engine.get_disabled_condition_value(key, "text"), None);
        assert_eq!(engine.get_validation_values(key), None);
        assert_eq!(engine.get_template_value(key, "anything"), None);
    }
}

#[test]
fn test_component_condition_is_separate_from_root() {
    let engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    assert_eq!(
        engine.get_display_condition_value("health.cigarettes", None),
        Some(false)
    );
    assert_eq!(
        engine.get_display_condition_value("health.cigarettes", Some("rg.light")),
        None
    );
    assert_eq!(
        engine.get_display_condition_value("health.cigarettes", Some("rg.heavy")),
        Some(false)
    );
}

#[test]
fn test_conditions_follow_responses() {
    let mut engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    assert_eq!(
        engine.get_disabled_condition_value("health.cigarettes", "rg.heavy"),
        Some(true)
    );

    engine
        .set_response("health.smoker", ResponseItem::with_value(vec!["yes"]))
        .unwrap();
    assert_eq!(
        engine.get_display_condition_value("health.cigarettes", None),
        Some(true)
    );
    assert_eq!(
        engine.get_disabled_condition_value("health.cigarettes", "rg.heavy"),
        Some(false)
    );

    engine
        .set_response("health.smoker", ResponseItem::with_value(vec!["no"]))
        .unwrap();
    assert_eq!(
        engine.get_display_condition_value("health.cigarettes", None),
        Some(false)
    );
}

#[test]
fn test_validations_are_evaluated_independently() {
    let mut engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    assert_eq!(
        engine.get_validation_values("health.cigarettes"),
        Some(BTreeMap::from([
            ("answered".to_string(), false),
            ("plausible".to_string(), false),
        ]))
    );

    engine
        .set_response(
            "health.cigarettes",
            ResponseItem::with_value(vec!["heavy"]).with_slot("count", 250.0),
        )
        .unwrap();
    assert_eq!(
        engine.get_validation_values("health.cigarettes"),
        Some(BTreeMap::from([
            ("answered".to_string(), true),
            ("plausible".to_string(), false),
        ]))
    );
}

#[test]
fn test_template_values() {
    let mut engine = SurveyEngineCore::builder(health_check().unwrap())
        .context(SurveyContext::new().with_locale("de"))
        .build()
        .unwrap();
    assert_eq!(engine.get_template_value("health.cigarettes", "since"), None);
    assert_eq!(engine.get_template_value("health.cigarettes", "count"), None);
    assert_eq!(engine.get_template_value("health.cigarettes", "sinceDefault"), None);

    engine
        .set_response(
            "health.cigarettes",
            ResponseItem::with_value(vec!["heavy"])
                .with_slot("count", 25.0)
                .with_slot("since", 1_709_802_000.0),
        )
        .unwrap();
    assert_eq!(
        engine.get_template_value("health.cigarettes", "since"),
        Some(TypedValue::new("07/03/2024".into()))
    );
    assert_eq!(
        engine.get_template_value("health.cigarettes", "sinceDefault"),
        Some(TypedValue::new("07/03/2024".into()))
    );
    assert_eq!(
        engine.get_template_value("health.cigarettes", "count"),
        Some(TypedValue::new("25".into()))
    );
    assert_eq!(
        engine.get_template_value("health.greeting", "locale"),
        Some(TypedValue::new("de".into()))
    );
    assert_eq!(
        engine.get_template_value("health.greeting", "launch"),
        Some(TypedValue::new("2024-05-01".into()))
    );
}

#[test]
fn test_evaluation_errors_degrade() {
    let engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    assert_eq!(
        engine.get_display_condition_value("health.broken", None),
        Some(false)
    );
    assert_eq!(engine.get_template_value("health.broken", "bad"), None);
}

#[derive(Clone, Default)]
struct CountingEvaluator {
    calls: Arc<AtomicUsize>,
}

impl ExpressionEvaluator for CountingEvaluator {
    fn evaluate(
        &self,
        expression: &Expression,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<ExpressionValue>, ExpressionEvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        BasicEvaluator.evaluate(expression, ctx)
    }
}

#[test]
fn test_cache_evaluates_once_until_response_changes() {
    let evaluator = CountingEvaluator::default();
    let calls = evaluator.calls.clone();
    let mut engine = SurveyEngineCore::builder(health_check().unwrap())
        .evaluator(evaluator)
        .build()
        .unwrap();

    for _ in 0..3 {
        assert_eq!(
            engine.get_display_condition_value("health.cigarettes", None),
            Some(false)
        );
    }
    let first = calls.load(Ordering::SeqCst);
    assert!(first > 0);

    engine
        .set_response("health.smoker", ResponseItem::with_value(vec!["yes"]))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), first);

    for _ in 0..3 {
        assert_eq!(
            engine.get_display_condition_value("health.cigarettes", None),
            Some(true)
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), first * 2);
}

#[test]
fn test_injected_evaluator_errors_degrade() {
    fn offline(
        _: &Expression,
        _: &EvalContext<'_>,
    ) -> Result<Option<ExpressionValue>, ExpressionEvaluationError> {
        Err(ExpressionEvaluationError::custom(anyhow::anyhow!(
            "evaluator offline"
        )))
    }

    let engine = SurveyEngineCore::builder(health_check().unwrap())
        .evaluator(offline)
        .build()
        .unwrap();
    assert_eq!(
        engine.get_display_condition_value("health.cigarettes", None),
        Some(false)
    );
    assert_eq!(
        engine.get_validation_values("health.cigarettes"),
        Some(BTreeMap::from([
            ("answered".to_string(), false),
            ("plausible".to_string(), false),
        ]))
    );
    assert_eq!(engine.get_template_value("health.cigarettes", "count"), None);
}

// ---- responses ----

#[test]
fn test_responses_keep_structural_order() {
    let engine = SurveyEngineCore::new(nested_blocks(Some(true), Some(true)).unwrap()).unwrap();
    let keys: Vec<&str> = engine
        .get_responses()
        .iter()
        .map(|r| r.key.item_key())
        .collect();
    assert_eq!(keys, ["a", "b", "c", "x1", "x2", "x3", "x4", "x5", "d"]);
}

#[test]
fn test_set_response_overwrites_prefill() {
    let clock = Arc::new(FixedClock::new(1_700_000_000));
    let mut engine = SurveyEngineCore::builder(health_check().unwrap())
        .clock(clock.clone())
        .prefills(vec![JsonSurveyItemResponse::new(
            "health.cigarettes",
            SurveyItemType::SingleChoiceQuestion,
            ResponseItem::with_value(vec!["light"]).with_slot("count", 3.0),
        )])
        .build()
        .unwrap();

    let prefilled = engine.get_response_item("health.cigarettes").unwrap();
    assert_eq!(prefilled.slot("count").and_then(|v| v.as_number()), Some(3.0));
    assert!(
        engine.get_responses()[1].meta.is_none(),
        "prefills do not record timestamps"
    );

    clock.advance(60);
    engine
        .set_response("health.cigarettes", ResponseItem::with_value(vec!["heavy"]))
        .unwrap();

    let response = engine.get_response_item("health.cigarettes").unwrap();
    assert_eq!(response, &ResponseItem::with_value(vec!["heavy"]));
    assert!(response.slot("count").is_none());

    let meta = engine.get_responses()[1].meta.as_ref().unwrap();
    assert_eq!(meta.responded, [1_700_000_060]);
}

#[test]
fn test_mismatched_prefill_is_skipped() {
    let engine = SurveyEngineCore::builder(health_check().unwrap())
        .prefills(vec![
            JsonSurveyItemResponse::new(
                "health.smoker",
                SurveyItemType::MultipleChoiceQuestion,
                ResponseItem::with_value(vec!["yes"]),
            ),
            JsonSurveyItemResponse::new(
                "health.unknown",
                SurveyItemType::SingleChoiceQuestion,
                ResponseItem::with_value(vec!["yes"]),
            ),
        ])
        .build()
        .unwrap();
    assert!(engine.get_response_item("health.smoker").is_none());
    assert!(engine.get_responses().iter().all(|r| r.response.is_none()));
}

#[test]
fn test_prefills_feed_conditions() {
    let engine = SurveyEngineCore::builder(health_check().unwrap())
        .prefills(vec![JsonSurveyItemResponse::new(
            "health.smoker",
            SurveyItemType::SingleChoiceQuestion,
            ResponseItem::with_value(vec!["yes"]),
        )])
        .build()
        .unwrap();
    assert_eq!(
        engine.get_display_condition_value("health.cigarettes", None),
        Some(true)
    );
}

#[test]
fn test_display_and_render_timestamps() {
    let clock = Arc::new(FixedClock::new(100));
    let mut engine = SurveyEngineCore::builder(page_sequence(&["q1", "q2"], None).unwrap())
        .clock(clock.clone())
        .context(SurveyContext::new().with_locale("en"))
        .max_timestamps(3)
        .build()
        .unwrap();

    engine.on_question_rendered("survey.q2").unwrap();
    for _ in 0..5 {
        clock.advance(1);
        engine.on_question_displayed("survey.q2").unwrap();
    }

    let meta = engine.get_responses()[1].meta.as_ref().unwrap();
    assert_eq!(meta.position, 1);
    assert_eq!(meta.locale_code.as_deref(), Some("en"));
    assert_eq!(meta.rendered, [100]);
    assert_eq!(meta.displayed, [103, 104, 105]);
    assert!(meta.responded.is_empty());
    assert!(engine.get_responses()[0].meta.is_none());
}

#[test]
fn test_unknown_item_mutations_fail() {
    let mut engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    assert!(
        engine
            .set_response("health.nope", ResponseItem::with_value("x"))
            .is_err()
    );
    assert!(engine.on_question_displayed("health.nope").is_err());
}

// ---- survey definitions ----

#[test]
fn test_json_round_trip_rebuilds_engine() {
    let survey = health_check().unwrap();
    let again = Survey::from_json(&survey.to_json()).unwrap();
    assert_eq!(again.len(), survey.len());
    for (a, b) in survey.items().zip(again.items()) {
        assert_eq!(a.key(), b.key());
        assert_eq!(a.item_type(), b.item_type());
    }
    assert_eq!(again, survey);

    let engine = SurveyEngineCore::new(again).unwrap();
    assert_eq!(engine.get_responses().len(), 8);
}

#[test]
fn test_engines_share_a_survey() {
    let survey = Arc::new(health_check().unwrap());
    let mut first = SurveyEngineCore::new(survey.clone()).unwrap();
    let second = SurveyEngineCore::new(survey.clone()).unwrap();

    first
        .set_response("health.smoker", ResponseItem::with_value(vec!["yes"]))
        .unwrap();
    assert_eq!(
        first.get_display_condition_value("health.cigarettes", None),
        Some(true)
    );
    assert_eq!(
        second.get_display_condition_value("health.cigarettes", None),
        Some(false)
    );
    assert_eq!(Arc::strong_count(&survey), 3);
}

#[test]
fn test_engine_can_move_between_threads() {
    let engine = SurveyEngineCore::new(health_check().unwrap()).unwrap();
    let handle = std::thread::spawn(move || engine.get_responses().len());
    assert_eq!(handle.join().unwrap(), 8);
}
