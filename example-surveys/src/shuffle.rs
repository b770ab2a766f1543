use survey_engine::{Survey, SurveyError, SurveyItem, SurveyItemKey, SurveyItemType};

/// Root `survey` holding one group `survey.block` with questions `q1..=qn`.
pub fn flat_block(n: usize, shuffle: Option<bool>) -> Result<Survey, SurveyError> {
    let mut survey = Survey::new("survey")?;
    let block = SurveyItemKey::new("block", Some("survey"))?;
    survey.add_item(SurveyItem::group(block.clone(), shuffle))?;
    for i in 1..=n {
        add_question(&mut survey, &block, &format!("q{i}"))?;
    }
    Ok(survey)
}

/// Two levels of groups with independent shuffle settings.
///
/// ```text
/// survey
/// └── survey.outer        (outer_shuffle)
///     ├── a, b, c
///     ├── survey.outer.inner  (inner_shuffle)
///     │   └── x1 .. x5
///     └── d
/// ```
pub fn nested_blocks(
    outer_shuffle: Option<bool>,
    inner_shuffle: Option<bool>,
) -> Result<Survey, SurveyError> {
    let mut survey = Survey::new("survey")?;
    let outer = SurveyItemKey::new("outer", Some("survey"))?;
    survey.add_item(SurveyItem::group(outer.clone(), outer_shuffle))?;
    for leaf in ["a", "b", "c"] {
        add_question(&mut survey, &outer, leaf)?;
    }
    let inner = outer.child("inner")?;
    survey.add_item(SurveyItem::group(inner.clone(), inner_shuffle))?;
    for leaf in ["x1", "x2", "x3", "x4", "x5"] {
        add_question(&mut survey, &inner, leaf)?;
    }
    add_question(&mut survey, &outer, "d")?;
    Ok(survey)
}

fn add_question(survey: &mut Survey, parent: &SurveyItemKey, leaf: &str) -> Result<(), SurveyError> {
    let key = parent.child(leaf)?;
    if let Some(item) = SurveyItem::content(key, SurveyItemType::SingleChoiceQuestion) {
        survey.add_item(item)?;
    }
    Ok(())
}
