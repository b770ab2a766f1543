use survey_engine::{ContentItem, Survey, SurveyError, SurveyItem, SurveyItemKey, SurveyItemKind};

/// A flat survey below the root group `survey`.
///
/// Entries starting with `pb` become page breaks, everything else a single
/// choice question. `max_items_per_page` is `(large, small)`.
pub fn page_sequence(
    entries: &[&str],
    max_items_per_page: Option<(usize, usize)>,
) -> Result<Survey, SurveyError> {
    let mut survey = Survey::new("survey")?;
    for entry in entries {
        let key = SurveyItemKey::new(*entry, Some("survey"))?;
        let item = if entry.starts_with("pb") {
            SurveyItem::page_break(key)
        } else {
            SurveyItem::new(key, SurveyItemKind::SingleChoiceQuestion(ContentItem::default()))
        };
        survey.add_item(item)?;
    }
    if let Some((large, small)) = max_items_per_page {
        survey = survey.with_max_items_per_page(large, small);
    }
    Ok(survey)
}
