use std::collections::BTreeMap;

use bindgraph_common::{BindError, BindErrorKind, EntityKind, PropertyPath, split_node_key};
use bindgraph_parse::{
    TemplatePart, find_bindings, parse_expression, parse_program, single_binding, split_template,
};
use rustc_hash::FxHashSet;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::manager::DependencyManager;
use super::references::EntityKeys;
use crate::config::EngineConfig;
use crate::entity::{Entity, EntityConfig, ValueStore};
use crate::error::{EngineError, ManagerError};
use crate::interpreter::{ActionExecution, Interpreter};
use crate::traits::{ActionIndex, EvaluationContext, ForestContext};

/// Errors recorded for one node during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeErrors {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evaluation_errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

/// `{ entityId: { path: NodeErrors } }`, rebuilt every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorRecord {
    entries: BTreeMap<String, BTreeMap<String, NodeErrors>>,
}

impl ErrorRecord {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, entity: &str, path: &str) -> Option<&NodeErrors> {
        self.entries.get(entity)?.get(path)
    }

    pub fn evaluation_errors(&self, entity: &str, path: &str) -> &[String] {
        self.get(entity, path)
            .map(|e| e.evaluation_errors.as_slice())
            .unwrap_or(&[])
    }

    pub fn validation_errors(&self, entity: &str, path: &str) -> &[String] {
        self.get(entity, path)
            .map(|e| e.validation_errors.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &NodeErrors)> {
        self.entries.iter().flat_map(|(entity, paths)| {
            paths
                .iter()
                .map(move |(path, errors)| (entity.as_str(), path.as_str(), errors))
        })
    }

    fn node(&mut self, entity: &str, path: &PropertyPath) -> &mut NodeErrors {
        self.entries
            .entry(entity.to_string())
            .or_default()
            .entry(path.to_string())
            .or_default()
    }

    fn push_evaluation(&mut self, entity: &str, path: &PropertyPath, error: &BindError) {
        self.node(entity, path).evaluation_errors.push(error.to_string());
    }

    fn push_validation(&mut self, entity: &str, path: &PropertyPath, message: String) {
        self.node(entity, path).validation_errors.push(message);
    }

    /// `{ entityId: { path: [message] } }` holding only evaluation errors.
    pub fn evaluation_tree(&self) -> JsonValue {
        self.tree(|e| &e.evaluation_errors)
    }

    /// `{ entityId: { path: [message] } }` holding only validation errors.
    pub fn validation_tree(&self) -> JsonValue {
        self.tree(|e| &e.validation_errors)
    }

    fn tree(&self, pick: impl Fn(&NodeErrors) -> &Vec<String>) -> JsonValue {
        let mut out = Map::new();
        for (entity, paths) in &self.entries {
            let per_path: Map<String, JsonValue> = paths
                .iter()
                .filter(|(_, errors)| !pick(errors).is_empty())
                .map(|(path, errors)| (path.clone(), JsonValue::from(pick(errors).clone())))
                .collect();
            if !per_path.is_empty() {
                out.insert(entity.clone(), JsonValue::Object(per_path));
            }
        }
        JsonValue::Object(out)
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalOutput {
    /// `{ entityId: evaluatedTree }`.
    pub forest: JsonValue,
    pub errors: ErrorRecord,
}

impl EvalOutput {
    pub fn value(&self, entity: &str, path: &PropertyPath) -> Option<&JsonValue> {
        path.get(self.forest.get(entity)?)
    }
}

/// Outcome of running an event handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOutcome {
    pub executions: Vec<ActionExecution>,
    pub errors: Vec<BindError>,
}

/// Owns the entities and their dependency manager, and recomputes the
/// evaluated forest on read when anything changed.
#[derive(Debug, Clone)]
pub struct EvaluationEngine {
    entities: BTreeMap<String, Entity>,
    manager: DependencyManager,
    config: EngineConfig,
    /// Bumped by every mutation; the cache is valid while stamps agree.
    generation: u64,
    cache: Option<(u64, EvalOutput)>,
}

impl Default for EvaluationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EvaluationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            entities: BTreeMap::new(),
            manager: DependencyManager::new(&config),
            config,
            generation: 0,
            cache: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn manager(&self) -> &DependencyManager {
        &self.manager
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    fn bump(&mut self) {
        self.generation += 1;
    }

    /// Add an entity, replacing any entity with the same id, and re-analyze
    /// paths elsewhere that mention it.
    pub fn add_entity(&mut self, kind: EntityKind, config: EntityConfig) -> Result<(), EngineError> {
        let entity = Entity::new(kind, config)?;
        let id = entity.id().to_string();
        if self.entities.contains_key(&id) {
            self.manager.remove_entity(&id);
        }
        self.manager.set_entity_keys(&id, EntityKeys::of(&entity));
        self.entities.insert(id.clone(), entity);
        self.bump();

        for path in self.manager.entity_keys(&id).map(|k| k.evaluable.clone()).unwrap_or_default() {
            let _ = self.reanalyze(&id, &path);
        }
        self.reanalyze_mentions(&id, Some(&id));
        Ok(())
    }

    /// Remove an entity and its graph nodes; bindings that read it lose
    /// those dependencies.
    pub fn remove_entity(&mut self, id: &str) -> Result<Entity, EngineError> {
        let entity = self
            .entities
            .remove(id)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))?;
        self.manager.remove_entity(id);
        self.bump();
        self.reanalyze_mentions(id, None);
        self.retry_rejected();
        Ok(entity)
    }

    /// Set one raw value and re-analyze only the evaluable paths it touches.
    ///
    /// The value is stored even when the new binding would close a cycle; in
    /// that case the path keeps its previous edges and the rejection is
    /// returned (and reported as a `CycleError` every pass until fixed).
    pub fn update_value(
        &mut self,
        id: &str,
        path: &PropertyPath,
        value: JsonValue,
    ) -> Result<(), EngineError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))?;
        entity.set_value(path, value)?;
        let after = EntityKeys::of(entity);
        let before = self.manager.entity_keys(id).cloned().unwrap_or_default();
        self.manager.set_entity_keys(id, after.clone());
        self.bump();

        for gone in before.evaluable.difference(&after.evaluable) {
            self.manager.remove_path(id, gone);
        }
        let mut rejected: Option<ManagerError> = None;
        for candidate in &after.evaluable {
            let touched = candidate.starts_with(path) || path.starts_with(candidate);
            if touched || !before.evaluable.contains(candidate) {
                if let Err(err) = self.reanalyze(id, candidate) {
                    rejected.get_or_insert(err);
                }
            }
        }
        if before != after {
            self.reanalyze_mentions(id, None);
        }
        self.retry_rejected();
        match rejected {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Drop everything and load a fresh entity set with a full re-analysis.
    pub fn replace_entities<I>(&mut self, entities: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = (EntityKind, EntityConfig)>,
    {
        let mut loaded = BTreeMap::new();
        for (kind, config) in entities {
            let entity = Entity::new(kind, config)?;
            loaded.insert(entity.id().to_string(), entity);
        }
        self.entities = loaded;
        self.manager.clear();
        for (id, entity) in &self.entities {
            self.manager.set_entity_keys(id, EntityKeys::of(entity));
        }
        self.bump();
        self.reanalyze_all();
        Ok(())
    }

    fn reanalyze_all(&mut self) {
        let targets: Vec<(String, PropertyPath)> = self
            .manager
            .keys()
            .iter()
            .flat_map(|(id, keys)| keys.evaluable.iter().map(move |p| (id.clone(), p.clone())))
            .collect();
        for (id, path) in targets {
            let _ = self.reanalyze(&id, &path);
        }
    }

    /// Give previously rejected paths another chance; an edit elsewhere may
    /// have broken the cycle.
    fn retry_rejected(&mut self) {
        let mut keys: Vec<String> = self.manager.rejected_nodes().map(str::to_string).collect();
        keys.sort_unstable();
        for key in keys {
            if let Some((id, path)) = split_node_key(&key) {
                let _ = self.reanalyze(id, &path);
            }
        }
    }

    fn reanalyze(&mut self, id: &str, path: &PropertyPath) -> Result<(), ManagerError> {
        let raw = self
            .entities
            .get(id)
            .and_then(|e| e.get(path))
            .cloned()
            .unwrap_or(JsonValue::Null);
        let extraction = self.manager.analyze(&raw, id, path);
        self.manager.replace_dependencies_for_path(id, path, &extraction)
    }

    /// Re-analyze every evaluable path whose raw text mentions `name`,
    /// skipping the entity `skip`.
    fn reanalyze_mentions(&mut self, name: &str, skip: Option<&str>) {
        let targets: Vec<(String, PropertyPath)> = self
            .entities
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != skip)
            .flat_map(|(id, entity)| {
                self.manager
                    .entity_keys(id)
                    .into_iter()
                    .flat_map(|k| k.evaluable.iter())
                    .filter(|p| entity.get(p).is_some_and(|raw| mentions(raw, name)))
                    .map(|p| (id.clone(), p.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (id, path) in targets {
            let _ = self.reanalyze(&id, &path);
        }
    }

    /// The evaluated forest and error tree, recomputed only when a mutation
    /// happened since the last read.
    pub fn evaluate(&mut self) -> &EvalOutput {
        self.refresh();
        match &self.cache {
            Some((_, output)) => output,
            None => unreachable!("refresh always fills the cache"),
        }
    }

    fn refresh(&mut self) {
        if matches!(&self.cache, Some((stamp, _)) if *stamp == self.generation) {
            return;
        }
        let previous = self.cache.take().map(|(_, output)| output);
        let output = self.run_pass(previous.as_ref());
        self.cache = Some((self.generation, output));
    }

    fn run_pass(&self, previous: Option<&EvalOutput>) -> EvalOutput {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "evaluate",
            generation = self.generation,
            nodes = self.manager.graph().len()
        )
        .entered();

        let forest: Map<String, JsonValue> = self
            .entities
            .iter()
            .map(|(id, e)| (id.clone(), e.uneval_values().clone()))
            .collect();
        let mut pass = Pass {
            engine: self,
            previous,
            forest: JsonValue::Object(forest),
            errors: ErrorRecord::default(),
            actions: self.action_index(),
            done: FxHashSet::default(),
        };

        // Entry nodes have nothing to wait for; plain values are already in
        // the forest and are never walked again.
        for key in self.manager.entry_nodes() {
            let (entity, path) = self.locate(&key);
            if self.is_evaluable_code(entity, &path) || self.manager.rejection(&key).is_some() {
                pass.evaluate_node(&key, entity, &path);
            }
            pass.done.insert(key);
        }
        for key in self.manager.topological_order() {
            if pass.done.contains(&key) {
                continue;
            }
            let (entity, path) = self.locate(&key);
            pass.evaluate_node(&key, entity, &path);
            pass.done.insert(key);
        }
        // A path rejected on its first analysis never entered the graph.
        let mut stranded: Vec<String> = self
            .manager
            .rejected_nodes()
            .filter(|key| !pass.done.contains(*key))
            .map(str::to_string)
            .collect();
        stranded.sort_unstable();
        for key in stranded {
            let (entity, path) = self.locate(&key);
            pass.evaluate_node(&key, entity, &path);
        }

        EvalOutput {
            forest: pass.forest,
            errors: pass.errors,
        }
    }

    /// Bindings count only on evaluable paths; elsewhere they are plain text,
    /// whoever reads them.
    fn is_evaluable_code(&self, entity: &Entity, path: &PropertyPath) -> bool {
        entity.is_code(path)
            && self
                .manager
                .entity_keys(entity.id())
                .is_some_and(|keys| keys.evaluable.contains(path))
    }

    /// # Panics
    /// When a graph node names an entity that no longer exists: removal must
    /// have pruned it.
    fn locate(&self, key: &str) -> (&Entity, PropertyPath) {
        let Some((id, path)) = split_node_key(key) else {
            panic!("malformed graph node key '{key}'");
        };
        match self.entities.get(id) {
            Some(entity) => (entity, path),
            None => panic!("graph node '{key}' refers to missing entity '{id}'"),
        }
    }

    /// Run the event handler stored at `id.path` in action mode against the
    /// current forest.
    pub fn execute_event(&mut self, id: &str, path: &PropertyPath) -> Result<EventOutcome, EngineError> {
        self.refresh();
        let entity = self
            .entities
            .get(id)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))?;
        let forest = match &self.cache {
            Some((_, output)) => &output.forest,
            None => unreachable!("refresh always fills the cache"),
        };
        let actions = self.action_index();
        let context = ForestContext::new(forest).with_actions(&actions);

        let mut outcome = EventOutcome::default();
        let handlers: Vec<&str> = match entity.get(path) {
            Some(JsonValue::String(s)) => vec![s.as_str()],
            Some(JsonValue::Array(items)) => items.iter().filter_map(JsonValue::as_str).collect(),
            _ => Vec::new(),
        };
        for handler in handlers {
            for span in find_bindings(handler) {
                let result = parse_program(span.inner(handler))
                    .map_err(BindError::from)
                    .and_then(|program| {
                        let mut interpreter = Interpreter::for_actions(&context, &self.config);
                        let result = interpreter.execute(&program);
                        outcome.executions.extend(interpreter.take_executions());
                        result
                    });
                if let Err(err) = result {
                    outcome
                        .errors
                        .push(err.with_location(id, path.to_string()));
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            entity = id,
            path = %path,
            executions = outcome.executions.len(),
            errors = outcome.errors.len(),
            "event executed"
        );
        Ok(outcome)
    }

    fn action_index(&self) -> ActionIndex {
        self.entities
            .iter()
            .filter(|(_, e)| !e.actions().is_empty())
            .map(|(id, e)| (id.clone(), e.actions().to_vec()))
            .collect()
    }
}

/// State of one evaluation pass.
struct Pass<'a> {
    engine: &'a EvaluationEngine,
    previous: Option<&'a EvalOutput>,
    forest: JsonValue,
    errors: ErrorRecord,
    actions: ActionIndex,
    done: FxHashSet<String>,
}

impl Pass<'_> {
    fn evaluate_node(&mut self, key: &str, entity: &Entity, path: &PropertyPath) {
        let id = entity.id();
        if let Some(rejection) = self.engine.manager.rejection(key) {
            // Keep whatever the node showed before the cyclic edit.
            let stale = self
                .previous
                .and_then(|p| p.value(id, path))
                .cloned()
                .unwrap_or(JsonValue::Null);
            self.write(id, path, stale);
            let error = BindError::new(BindErrorKind::Cycle).with_message(rejection.to_string());
            self.errors.push_evaluation(id, path, &error);
            return;
        }
        let Some(raw) = entity.get(path) else {
            return;
        };
        if !self.engine.is_evaluable_code(entity, path) {
            return;
        }

        let (value, failures) = {
            let context = ForestContext::new(&self.forest).with_actions(&self.actions);
            evaluate_raw(raw, &context, &self.engine.config)
        };
        for failure in &failures {
            self.errors.push_evaluation(id, path, failure);
        }

        let value = match entity.validator(path) {
            Some(schema) => match schema.validate(&value) {
                Ok(()) => value,
                Err(messages) => {
                    for message in messages {
                        self.errors.push_validation(id, path, message);
                    }
                    schema.default_value()
                }
            },
            None => value,
        };
        self.write(id, path, value);
    }

    fn write(&mut self, id: &str, path: &PropertyPath, value: JsonValue) {
        let target = PropertyPath::key(id).join(path);
        if let Err(_err) = target.set(&mut self.forest, value) {
            #[cfg(feature = "tracing")]
            tracing::warn!(entity = id, path = %path, error = %_err, "cannot write evaluated value");
        }
    }
}

/// Evaluate a raw value: a lone binding yields its value of any type, text
/// mixed with bindings is interpolated, arrays are evaluated per element.
pub fn evaluate_raw(
    raw: &JsonValue,
    context: &dyn EvaluationContext,
    config: &EngineConfig,
) -> (JsonValue, Vec<BindError>) {
    let mut errors = Vec::new();
    let value = evaluate_into(raw, context, config, &mut errors);
    (value, errors)
}

fn evaluate_into(
    raw: &JsonValue,
    context: &dyn EvaluationContext,
    config: &EngineConfig,
    errors: &mut Vec<BindError>,
) -> JsonValue {
    match raw {
        JsonValue::String(text) => evaluate_string(text, context, config, errors),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| evaluate_into(item, context, config, errors))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn evaluate_string(
    text: &str,
    context: &dyn EvaluationContext,
    config: &EngineConfig,
    errors: &mut Vec<BindError>,
) -> JsonValue {
    if let Some(source) = single_binding(text) {
        return match evaluate_binding(source, context, config) {
            Ok(value) => value.to_json(),
            Err(err) => {
                errors.push(err);
                JsonValue::Null
            }
        };
    }
    let mut out = String::new();
    for part in split_template(text) {
        match part {
            TemplatePart::Text(t) => out.push_str(t),
            TemplatePart::Binding { source, .. } => match evaluate_binding(source, context, config) {
                Ok(value) => out.push_str(&value.to_interpolated()),
                Err(err) => errors.push(err),
            },
        }
    }
    JsonValue::String(out)
}

/// Evaluate one binding's expression source.
pub fn evaluate_binding(
    source: &str,
    context: &dyn EvaluationContext,
    config: &EngineConfig,
) -> Result<crate::value::Value, BindError> {
    let ast = parse_expression(source).map_err(BindError::from)?;
    Interpreter::new(context, config).evaluate(&ast)
}

/// True when some binding in `raw` contains `name`.
fn mentions(raw: &JsonValue, name: &str) -> bool {
    match raw {
        JsonValue::String(text) => find_bindings(text)
            .iter()
            .any(|span| span.inner(text).contains(name)),
        JsonValue::Array(items) => items.iter().any(|item| mentions(item, name)),
        _ => false,
    }
}
