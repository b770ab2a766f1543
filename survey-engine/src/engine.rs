use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use survey_engine_types::{
    DEFAULT_MAX_TIMESTAMPS, JsonSurveyItemResponse, ResponseItem, StructuralError, Survey,
    SurveyError, SurveyItem, SurveyItemResponse, SurveyItemType, TimestampKind, TypedValue,
};
use tracing::{debug, trace};

use crate::cache::Resolver;
use crate::{
    BasicEvaluator, CacheKey, CachedValue, Clock, ConditionalCache, DeviceClass,
    ExpressionEvaluator, RenderedSurveyTree, ResponseStore, SurveyContext, SystemClock, paginate,
};

/// Error type for engine construction and response mutation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Survey(#[from] SurveyError),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// One rendering session of a survey.
///
/// The engine owns the render tree, the responses and the conditional cache.
/// The survey itself is shared and never modified, so several engines can
/// run against the same [`Survey`].
///
/// Lookups take `&self`; only response changes and timestamp events need
/// `&mut self`. Every response change clears the conditional cache.
pub struct SurveyEngineCore {
    survey: Arc<Survey>,
    context: SurveyContext,
    evaluator: Box<dyn ExpressionEvaluator + Send>,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
    render_tree: RenderedSurveyTree,
    responses: ResponseStore,
    cache: RefCell<ConditionalCache>,
}

impl fmt::Debug for SurveyEngineCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurveyEngineCore")
            .field("context", &self.context)
            .field("clock", &self.clock)
            .field("render_tree", &self.render_tree)
            .field("responses", &self.responses)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl SurveyEngineCore {
    /// Create an engine with default settings.
    pub fn new(survey: impl Into<Arc<Survey>>) -> Result<Self, EngineError> {
        Self::builder(survey).build()
    }

    /// Create a builder for configuring an engine.
    pub fn builder(survey: impl Into<Arc<Survey>>) -> SurveyEngineBuilder {
        SurveyEngineBuilder::new(survey)
    }

    pub fn survey(&self) -> &Survey {
        &self.survey
    }

    pub fn context(&self) -> &SurveyContext {
        &self.context
    }

    /// The render tree built for this session.
    pub fn render_tree(&self) -> &RenderedSurveyTree {
        &self.render_tree
    }

    /// Build a new render tree, reshuffling with the engine's random source.
    ///
    /// Positions of metadata created afterwards follow the new order.
    pub fn rebuild_render_tree(&mut self) -> Result<&RenderedSurveyTree, EngineError> {
        self.render_tree = RenderedSurveyTree::build(&self.survey, &mut *self.rng)?;
        self.responses
            .set_positions(self.render_tree.leaves().iter().map(|leaf| leaf.key()));
        Ok(&self.render_tree)
    }

    /// The render tree without items whose display condition is false.
    pub fn visible_render_tree(&self) -> RenderedSurveyTree {
        self.render_tree
            .pruned(|item| self.get_display_condition_value(item.key(), None) != Some(false))
    }

    /// All responses in structural order.
    pub fn get_responses(&self) -> &[SurveyItemResponse] {
        self.responses.responses()
    }

    pub fn get_response_item(&self, item_key: &str) -> Option<&ResponseItem> {
        self.responses.response_item(item_key)
    }

    /// Replace the response of an item.
    pub fn set_response(&mut self, item_key: &str, response: ResponseItem) -> Result<(), EngineError> {
        let now = self.clock.now_secs();
        self.responses.set_response(item_key, response, now)?;
        self.cache.get_mut().invalidate();
        trace!(item = item_key, "Response set");
        Ok(())
    }

    /// Record that an item was shown to the participant.
    pub fn on_question_displayed(&mut self, item_key: &str) -> Result<(), EngineError> {
        self.record(item_key, TimestampKind::Displayed)
    }

    /// Record that an item was rendered.
    pub fn on_question_rendered(&mut self, item_key: &str) -> Result<(), EngineError> {
        self.record(item_key, TimestampKind::Rendered)
    }

    fn record(&mut self, item_key: &str, kind: TimestampKind) -> Result<(), EngineError> {
        let now = self.clock.now_secs();
        self.responses.record(item_key, kind, now)?;
        Ok(())
    }

    /// Evaluate a display condition.
    ///
    /// Without a component key this is the item's root condition; with one it
    /// is that component's own condition. `None` means no condition is declared.
    pub fn get_display_condition_value(
        &self,
        item_key: &str,
        component_key: Option<&str>,
    ) -> Option<bool> {
        let key = match component_key {
            Some(component) => CacheKey::DisplayComponent(component.to_string()),
            None => CacheKey::DisplayRoot,
        };
        self.lookup(item_key, key).as_flag()
    }

    /// Evaluate a component's disabled condition.
    pub fn get_disabled_condition_value(&self, item_key: &str, component_key: &str) -> Option<bool> {
        self.lookup(item_key, CacheKey::DisabledComponent(component_key.to_string()))
            .as_flag()
    }

    /// Evaluate every validation of an item. `None` if none are declared.
    pub fn get_validation_values(&self, item_key: &str) -> Option<BTreeMap<String, bool>> {
        self.lookup(item_key, CacheKey::Validations)
            .as_validations()
            .cloned()
    }

    /// Resolve a template value of an item.
    pub fn get_template_value(&self, item_key: &str, template_key: &str) -> Option<TypedValue> {
        self.lookup(item_key, CacheKey::Template(template_key.to_string()))
            .as_template()
            .cloned()
    }

    fn lookup(&self, item_key: &str, key: CacheKey) -> CachedValue {
        let resolver = Resolver {
            survey: &self.survey,
            evaluator: self.evaluator.as_ref(),
            responses: &self.responses,
            context: &self.context,
        };
        self.cache
            .borrow_mut()
            .get_or_insert_with(item_key, key.clone(), || resolver.resolve(item_key, &key))
            .clone()
    }

    /// Split the render order into pages.
    ///
    /// With a device class, pages are also limited to that class's
    /// `max_items_per_page`.
    pub fn get_survey_pages(&self, device: Option<DeviceClass>) -> Vec<Vec<&SurveyItem>> {
        self.pages(&self.render_tree, device)
    }

    /// Like [`get_survey_pages`](Self::get_survey_pages), skipping hidden items.
    pub fn get_visible_survey_pages(&self, device: Option<DeviceClass>) -> Vec<Vec<&SurveyItem>> {
        let visible = self.visible_render_tree();
        self.pages(&visible, device)
    }

    fn pages(&self, tree: &RenderedSurveyTree, device: Option<DeviceClass>) -> Vec<Vec<&SurveyItem>> {
        let limit = device
            .zip(self.survey.max_items_per_page.as_ref())
            .and_then(|(device, limits)| device.page_limit(limits));
        let items = tree
            .leaves()
            .into_iter()
            .filter_map(|leaf| self.survey.item(leaf.key()));
        paginate(
            items,
            |item| item.item_type() == SurveyItemType::PageBreak,
            limit,
        )
    }

    /// The first survey end item in structural order.
    pub fn survey_end_item(&self) -> Option<&SurveyItem> {
        self.survey.survey_end_item()
    }
}

/// Builder for [`SurveyEngineCore`].
pub struct SurveyEngineBuilder {
    survey: Arc<Survey>,
    context: SurveyContext,
    prefills: Vec<JsonSurveyItemResponse>,
    rng: Option<Box<dyn RngCore + Send>>,
    clock: Arc<dyn Clock>,
    evaluator: Box<dyn ExpressionEvaluator + Send>,
    max_timestamps: usize,
}

impl fmt::Debug for SurveyEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurveyEngineBuilder")
            .field("context", &self.context)
            .field("prefills", &self.prefills.len())
            .field("clock", &self.clock)
            .field("max_timestamps", &self.max_timestamps)
            .finish_non_exhaustive()
    }
}

impl SurveyEngineBuilder {
    /// Create a new builder with the basic evaluator, system clock and an
    /// entropy-seeded random source.
    pub fn new(survey: impl Into<Arc<Survey>>) -> Self {
        Self {
            survey: survey.into(),
            context: SurveyContext::default(),
            prefills: Vec::new(),
            rng: None,
            clock: Arc::new(SystemClock),
            evaluator: Box::new(BasicEvaluator),
            max_timestamps: DEFAULT_MAX_TIMESTAMPS,
        }
    }

    pub fn context(mut self, context: SurveyContext) -> Self {
        self.context = context;
        self
    }

    /// Responses applied at construction where the item type matches.
    pub fn prefills(mut self, prefills: Vec<JsonSurveyItemResponse>) -> Self {
        self.prefills = prefills;
        self
    }

    /// Use a specific random source for shuffling.
    pub fn rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    /// Shuffle with a seeded [`StdRng`], for reproducible orders.
    pub fn seed(self, seed: u64) -> Self {
        self.rng(StdRng::seed_from_u64(seed))
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn evaluator(mut self, evaluator: impl ExpressionEvaluator + Send + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Cap on each metadata timestamp list.
    pub fn max_timestamps(mut self, max_timestamps: usize) -> Self {
        self.max_timestamps = max_timestamps;
        self
    }

    /// Validate the survey, build the render tree and seed the responses.
    pub fn build(self) -> Result<SurveyEngineCore, EngineError> {
        self.survey.validate()?;
        let mut rng: Box<dyn RngCore + Send> = match self.rng {
            Some(rng) => rng,
            None => Box::new(StdRng::from_entropy()),
        };
        let render_tree = RenderedSurveyTree::build(&self.survey, &mut *rng)?;

        let mut responses = ResponseStore::from_survey(&self.survey)
            .with_locale(self.context.locale.clone())
            .with_max_timestamps(self.max_timestamps);
        responses.set_positions(render_tree.leaves().iter().map(|leaf| leaf.key()));
        let prefilled = responses.apply_prefills(&self.prefills);

        debug!(
            items = self.survey.len(),
            responses = responses.len(),
            prefilled,
            "Survey engine ready"
        );

        Ok(SurveyEngineCore {
            survey: self.survey,
            context: self.context,
            evaluator: self.evaluator,
            clock: self.clock,
            rng,
            render_tree,
            responses,
            cache: RefCell::new(ConditionalCache::new()),
        })
    }
}
