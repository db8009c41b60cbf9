//! Engine-side state behind the message protocol: which widgets are on which
//! page, which entities are active, and what the consumer last received.

use std::collections::BTreeMap;

use bindgraph_common::BindError;
use bindgraph_eval::{
    EngineConfig, EngineError, EntityConfig, EntityKind, EvaluationEngine, EventOutcome,
    PropertyPath, ValueStore, diff_error_tree, diff_forest,
};
use rustc_hash::FxHashSet;
use serde_json::{Map, Value as JsonValue};

use crate::error::SessionError;
use crate::protocol::{EntityMap, Response};

/// Trees most recently shipped to the consumer.
#[derive(Debug, Clone, PartialEq)]
struct Delivered {
    forest: JsonValue,
    evaluation_errors: JsonValue,
    validation_errors: JsonValue,
}

impl Default for Delivered {
    fn default() -> Self {
        let empty = JsonValue::Object(Map::new());
        Self {
            forest: empty.clone(),
            evaluation_errors: empty.clone(),
            validation_errors: empty,
        }
    }
}

/// Owns the engine. Queries and globals are always active; widgets are
/// active only while their page is current. Widgets of other pages are kept
/// as configs and loaded on `change_page`.
#[derive(Debug, Clone)]
pub struct Session {
    engine: EvaluationEngine,
    /// Widget configs per page. The current page's entry is stale while it is
    /// active; the engine holds the live copies.
    pages: BTreeMap<String, EntityMap>,
    current_page: String,
    delivered: Delivered,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: EvaluationEngine::new(config),
            pages: BTreeMap::new(),
            current_page: String::new(),
            delivered: Delivered::default(),
        }
    }

    pub fn engine(&self) -> &EvaluationEngine {
        &self.engine
    }

    pub fn current_page(&self) -> &str {
        &self.current_page
    }

    pub fn page_ids(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.engine.contains(id)
    }

    /// Replace everything with a fresh entity set.
    pub fn init(
        &mut self,
        current_page_id: String,
        queries: EntityMap,
        pages: BTreeMap<String, EntityMap>,
        globals: EntityMap,
    ) -> Result<(), SessionError> {
        let queries = keyed(queries)?;
        let globals = keyed(globals)?;
        let mut pages = pages
            .into_iter()
            .map(|(page, widgets)| Ok((page, keyed(widgets)?)))
            .collect::<Result<BTreeMap<_, _>, SessionError>>()?;
        let widgets = pages.entry(current_page_id.clone()).or_default().clone();

        let active = assemble(
            queries
                .into_values()
                .map(|c| (EntityKind::Query, c))
                .chain(globals.into_values().map(|c| (EntityKind::Global, c))),
            widgets,
        )?;
        self.engine.replace_entities(active)?;
        self.pages = pages;
        self.current_page = current_page_id;
        #[cfg(feature = "tracing")]
        tracing::info!(
            page = %self.current_page,
            pages = self.pages.len(),
            entities = self.engine.entities().count(),
            "session initialised"
        );
        Ok(())
    }

    /// Set one raw value. Inactive widgets only have their stored config
    /// updated. A cyclic edit is not an error here: it is stored and shows up
    /// as a `CycleError` in the next evaluation.
    pub fn update_entity(
        &mut self,
        id: &str,
        path: &PropertyPath,
        value: JsonValue,
    ) -> Result<(), SessionError> {
        if self.engine.contains(id) {
            return match self.engine.update_value(id, path, value) {
                Ok(()) => Ok(()),
                Err(EngineError::Manager(_rejected)) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(entity = id, path = %path, error = %_rejected, "cyclic edit stored");
                    Ok(())
                }
                Err(err) => Err(err.into()),
            };
        }
        let config = self
            .pages
            .values_mut()
            .find_map(|widgets| widgets.get_mut(id))
            .ok_or_else(|| unknown(id))?;
        if path.is_root() {
            if !value.is_object() {
                return Err(EngineError::ValuesNotObject(id.to_string()).into());
            }
            config.values = value;
            return Ok(());
        }
        path.set(&mut config.values, value).map_err(EngineError::from)?;
        Ok(())
    }

    /// Add (or replace) an entity. Widgets join the current page.
    pub fn add_entity(&mut self, kind: EntityKind, config: EntityConfig) -> Result<(), SessionError> {
        // Queries and globals must not shadow a widget parked on another page.
        if kind != EntityKind::Widget && self.page_holding(&config.id).is_some() {
            return Err(SessionError::DuplicateEntity(config.id));
        }
        self.engine.add_entity(kind, config)?;
        Ok(())
    }

    pub fn remove_entity(&mut self, id: &str) -> Result<(), SessionError> {
        if self.engine.contains(id) {
            self.engine.remove_entity(id)?;
            return Ok(());
        }
        match self.pages.values_mut().find(|widgets| widgets.contains_key(id)) {
            Some(widgets) => {
                widgets.remove(id);
                Ok(())
            }
            None => Err(unknown(id)),
        }
    }

    /// Swap the active widgets for those of another page and re-analyze.
    pub fn change_page(&mut self, page_id: &str) -> Result<(), SessionError> {
        let Some(incoming) = self.pages.get(page_id).cloned() else {
            return Err(SessionError::UnknownPage(page_id.to_string()));
        };
        let mut outgoing = EntityMap::new();
        let mut shared = Vec::new();
        for entity in self.engine.entities() {
            match entity.kind() {
                EntityKind::Widget => {
                    outgoing.insert(entity.id().to_string(), entity.to_config());
                }
                kind => shared.push((kind, entity.to_config())),
            }
        }
        let active = assemble(shared, incoming)?;
        self.engine.replace_entities(active)?;
        self.pages.insert(std::mem::take(&mut self.current_page), outgoing);
        self.current_page = page_id.to_string();
        Ok(())
    }

    /// Run an event handler of an active entity.
    pub fn execute_event(&mut self, id: &str, event_name: &str) -> Result<EventOutcome, SessionError> {
        let path = PropertyPath::parse(event_name).map_err(EngineError::from)?;
        Ok(self.engine.execute_event(id, &path)?)
    }

    /// Evaluate and diff against what the consumer last received.
    pub fn take_update(&mut self) -> Response {
        let output = self.engine.evaluate();
        let next = Delivered {
            forest: output.forest.clone(),
            evaluation_errors: output.errors.evaluation_tree(),
            validation_errors: output.errors.validation_tree(),
        };
        let response = Response::EvaluationUpdate {
            evaluation_updates: diff_forest(&self.delivered.forest, &next.forest),
            runtime_error_updates: diff_error_tree(
                &self.delivered.evaluation_errors,
                &next.evaluation_errors,
            ),
            validation_error_updates: diff_error_tree(
                &self.delivered.validation_errors,
                &next.validation_errors,
            ),
        };
        self.delivered = next;
        response
    }

    fn page_holding(&self, id: &str) -> Option<&str> {
        self.pages
            .iter()
            .find(|(page, widgets)| **page != self.current_page && widgets.contains_key(id))
            .map(|(page, _)| page.as_str())
    }
}

fn unknown(id: &str) -> SessionError {
    EngineError::UnknownEntity(id.to_string()).into()
}

/// Fill in ids omitted from configs keyed by id.
fn keyed(map: EntityMap) -> Result<EntityMap, SessionError> {
    map.into_iter()
        .map(|(key, mut config)| {
            if config.id.is_empty() {
                config.id = key.clone();
            } else if config.id != key {
                return Err(SessionError::IdMismatch { key, id: config.id });
            }
            Ok((key, config))
        })
        .collect()
}

/// The active set: shared entities plus one page of widgets, ids unique.
fn assemble(
    shared: impl IntoIterator<Item = (EntityKind, EntityConfig)>,
    widgets: EntityMap,
) -> Result<Vec<(EntityKind, EntityConfig)>, SessionError> {
    let mut seen = FxHashSet::default();
    let mut active = Vec::new();
    let all = shared
        .into_iter()
        .chain(widgets.into_values().map(|c| (EntityKind::Widget, c)));
    for (kind, config) in all {
        if !seen.insert(config.id.clone()) {
            return Err(SessionError::DuplicateEntity(config.id));
        }
        active.push((kind, config));
    }
    Ok(active)
}

/// `"<entity>.<path>: <error>"` for event failures shipped to the consumer.
pub(crate) fn describe(error: &BindError) -> String {
    match &error.context {
        Some(ctx) => match (&ctx.entity, &ctx.path) {
            (Some(entity), Some(path)) => format!("{entity}.{path}: {error}"),
            _ => error.to_string(),
        },
        None => error.to_string(),
    }
}
