//! The record container of one loaded behavior.
//!
//! `Behavior` owns every top-level record together with the type registry and
//! the parts of the backing document that are not records (declaration, root
//! attributes, type declarations). Records are kept in document order and
//! indexed by id, type and name. Pointers between records are plain ids; the
//! container never follows or rewrites them on its own.

use std::collections::VecDeque;
use std::path::Path;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;

use crate::config::Config;
use crate::error::LookupKind;
use crate::graph::ReferenceGraph;
use crate::ids::IdAllocator;
use crate::path::{FieldPath, IntoFieldPath};
use crate::query::Query;
use crate::record::Record;
use crate::registry::{TypeId, TypeRegistry};
use crate::value::{Value, NULL_POINTER_ID};
use crate::xml::{parse_document, write_document, Declaration, Element, XmlDocument};
use crate::{BehaviorError, Result};

const DEFAULT_LOG_TARGET: &str = "hkb_behavior";

#[derive(Debug, Clone)]
pub struct Behavior {
    config: Config,
    log_target: String,
    decimal_comma: bool,

    declaration: Option<Declaration>,
    root_name: String,
    root_attrs: Vec<(String, String)>,
    /// Non-object root children before the first object (type declarations).
    head: Vec<Element>,
    /// Non-object root children after the first object.
    tail: Vec<Element>,

    registry: TypeRegistry,
    objects: IndexMap<String, Record>,
    by_type: HashMap<TypeId, Vec<String>>,
    by_name: HashMap<String, Vec<String>>,
    ids: IdAllocator,
}

impl Behavior {
    /// Empty behavior over an existing registry.
    pub fn new(registry: TypeRegistry, config: Config) -> Self {
        let log_target = config
            .log_target
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_TARGET.to_string());
        Behavior {
            decimal_comma: config.decimal_comma.unwrap_or(false),
            config,
            log_target,
            declaration: Some(Declaration::default()),
            root_name: "hktagfile".to_string(),
            root_attrs: Vec::new(),
            head: Vec::new(),
            tail: Vec::new(),
            registry,
            objects: IndexMap::new(),
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            ids: IdAllocator::new(),
        }
    }

    /// Parse a tagfile document.
    pub fn load(xml: &str, config: Config) -> Result<Self> {
        Self::from_document(parse_document(xml)?, config)
    }

    /// Read and parse a tagfile. Unless configured otherwise, log records are
    /// targeted at the file's stem.
    pub fn open(path: impl AsRef<Path>, mut config: Config) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        if config.log_target.is_none() {
            config.log_target = path
                .file_stem()
                .map(|stem| format!("{DEFAULT_LOG_TARGET}::{}", stem.to_string_lossy()));
        }
        Self::load(&text, config)
    }

    pub fn from_document(doc: XmlDocument, config: Config) -> Result<Self> {
        let XmlDocument { declaration, root } = doc;
        let registry = TypeRegistry::from_elements(root.children_named("type"))?;

        let mut behavior = Behavior::new(registry, config);
        behavior.declaration = declaration;
        behavior.root_name = root.name;
        behavior.root_attrs = root.attrs;

        let mut seen_object = false;
        let mut detected_comma = false;
        for child in root.children {
            if child.name != "object" {
                if seen_object {
                    behavior.tail.push(child);
                } else {
                    behavior.head.push(child);
                }
                continue;
            }
            seen_object = true;
            let id = child.require_attr("id")?.to_string();
            let type_id = child.require_attr("typeid")?.to_string();
            let record_el = child
                .child("record")
                .ok_or_else(|| BehaviorError::Xml(format!("object {id} has no <record>")))?;
            let record = Record::from_element(record_el, &type_id, &behavior.registry)?.with_id(id.clone());
            if behavior.registry.get(&type_id).is_none() {
                log::warn!(target: &behavior.log_target, "object {id} uses undeclared type {type_id}");
            }
            detected_comma = detected_comma || uses_decimal_comma(&record);
            behavior.insert_indexed(record, None)?;
        }

        behavior.decimal_comma = behavior.config.decimal_comma.unwrap_or(detected_comma);
        behavior.ids = IdAllocator::seeded(behavior.objects.keys().map(String::as_str));
        log::debug!(
            target: &behavior.log_target,
            "loaded {} types and {} objects",
            behavior.registry.len(),
            behavior.objects.len()
        );
        Ok(behavior)
    }

    /// Write the behavior back in canonical tagfile form.
    pub fn save(&self) -> String {
        write_document(&self.to_document())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.save())?;
        Ok(())
    }

    pub fn to_document(&self) -> XmlDocument {
        let mut root = Element::new(self.root_name.clone());
        root.attrs = self.root_attrs.clone();
        root.children.extend(self.head.iter().cloned());
        for (id, record) in &self.objects {
            root.children.push(
                Element::new("object")
                    .with_attr("id", id.as_str())
                    .with_attr("typeid", record.type_id.as_str())
                    .with_child(record.to_element(self.decimal_comma)),
            );
        }
        root.children.extend(self.tail.iter().cloned());
        XmlDocument {
            declaration: self.declaration.clone(),
            root,
        }
    }

    // --- Accessors ---

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    /// Whether reals are written with a decimal comma.
    pub fn decimal_comma(&self) -> bool {
        self.decimal_comma
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.objects.get(id)
    }

    /// Like [`Behavior::get`], reporting a recoverable lookup miss.
    pub fn require(&self, id: &str) -> Result<&Record> {
        self.get(id)
            .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, id))
    }

    /// All records in document order.
    pub fn objects(&self) -> impl Iterator<Item = &Record> {
        self.objects.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Document position of an object.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.objects.get_index_of(id)
    }

    // --- Ids ---

    /// Fresh id with the configured prefix.
    pub fn new_id(&mut self) -> Result<String> {
        let prefix = self.config.id_prefix.clone();
        self.new_id_with_prefix(&prefix)
    }

    /// `prefix + counter`. Never returns the null pointer id, an id that is in
    /// use or one that was handed out before.
    pub fn new_id_with_prefix(&mut self, prefix: &str) -> Result<String> {
        let objects = &self.objects;
        self.ids
            .alloc(prefix, |candidate| {
                candidate == NULL_POINTER_ID || objects.contains_key(candidate)
            })
            .ok_or_else(|| BehaviorError::IdsExhausted(prefix.to_string()))
    }

    // --- Structural edits ---

    /// Add a record at the end of the document. Records without an id get a fresh one.
    pub fn add(&mut self, record: Record) -> Result<String> {
        self.insert_at(record, None)
    }

    /// Add a record at a document position (`None` appends).
    pub fn insert_at(&mut self, mut record: Record, position: Option<usize>) -> Result<String> {
        let id = match record.object_id.clone() {
            Some(id) => id,
            None => {
                let id = self.new_id()?;
                record.object_id = Some(id.clone());
                id
            }
        };
        if self.objects.contains_key(&id) {
            return Err(BehaviorError::DuplicateId(id));
        }
        self.ids.observe(&id);
        self.insert_indexed(record, position)?;
        log::debug!(target: &self.log_target, "added object {id}");
        Ok(id)
    }

    /// Remove a record from every index. Pointers to it elsewhere are left dangling.
    /// Returns the former document position and the record.
    pub fn remove(&mut self, id: &str) -> Result<(usize, Record)> {
        let (position, _, record) = self
            .objects
            .shift_remove_full(id)
            .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, id))?;
        if let Some(ids) = self.by_type.get_mut(&record.type_id) {
            ids.retain(|other| other != id);
        }
        if let Some(name) = record.name() {
            self.unindex_name(name, id);
        }
        log::debug!(target: &self.log_target, "removed object {id}");
        Ok((position, record))
    }

    fn insert_indexed(&mut self, record: Record, position: Option<usize>) -> Result<()> {
        let id = record
            .object_id
            .clone()
            .ok_or_else(|| BehaviorError::Xml("top-level record without id".to_string()))?;
        if self.objects.contains_key(&id) {
            return Err(BehaviorError::DuplicateId(id));
        }
        self.by_type
            .entry(record.type_id.clone())
            .or_default()
            .push(id.clone());
        if let Some(name) = record.name() {
            let name = name.to_string();
            self.index_name(name, &id);
        }
        match position {
            Some(pos) if pos < self.objects.len() => {
                self.objects.shift_insert(pos, id, record);
            }
            _ => {
                self.objects.insert(id, record);
            }
        }
        Ok(())
    }

    fn index_name(&mut self, name: String, id: &str) {
        let entry = self.by_name.entry(name).or_default();
        if let Some(first) = entry.first() {
            log::warn!(
                target: &self.log_target,
                "duplicate name: {id} shares its name with {first}"
            );
        }
        entry.push(id.to_string());
    }

    fn unindex_name(&mut self, name: &str, id: &str) {
        if let Some(ids) = self.by_name.get_mut(name) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    // --- Value edits ---

    /// Set a field of an object, keeping the name index current.
    /// Returns the previous value.
    pub fn set_value(
        &mut self,
        id: &str,
        path: impl IntoFieldPath,
        value: impl Into<Value>,
    ) -> Result<Value> {
        let path = path.into_field_path()?;
        let record = self
            .objects
            .get_mut(id)
            .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, id))?;
        let old_name = record.name().map(str::to_string);
        let old = record.set(&path, value)?;
        let new_name = record.name().map(str::to_string);
        if old_name != new_name {
            if let Some(name) = old_name {
                self.unindex_name(&name, id);
            }
            if let Some(name) = new_name {
                self.index_name(name, id);
            }
        }
        Ok(old)
    }

    /// Insert into an array field of an object. Returns the index used.
    pub fn insert_array_item(
        &mut self,
        id: &str,
        path: impl IntoFieldPath,
        index: Option<usize>,
        value: impl Into<Value>,
    ) -> Result<usize> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, id))?
            .insert_item(path, index, value)
    }

    /// Remove from an array field of an object (`None` pops the last item).
    pub fn remove_array_item(
        &mut self,
        id: &str,
        path: impl IntoFieldPath,
        index: Option<usize>,
    ) -> Result<(usize, Value)> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, id))?
            .remove_item(path, index)
    }

    // --- Lookups ---

    /// Objects of `type_id` (and of derived types when `include_derived`), in document order.
    pub fn find_objects_by_type(&self, type_id: &str, include_derived: bool) -> Vec<&Record> {
        let types: Vec<&str> = if include_derived {
            self.registry.compatible_types(type_id)
        } else {
            vec![type_id]
        };
        let mut positions: Vec<usize> = types
            .iter()
            .filter_map(|t| self.by_type.get(*t))
            .flatten()
            .filter_map(|id| self.objects.get_index_of(id))
            .collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .filter_map(|pos| self.objects.get_index(pos).map(|(_, r)| r))
            .collect()
    }

    /// First object whose type is named `type_name`. `None` when the type is
    /// not declared or has no objects.
    pub fn find_first_by_type_name(&self, type_name: &str) -> Option<&Record> {
        let type_id = self.registry.find_first_type_by_name(type_name)?;
        self.find_objects_by_type(type_id, false).into_iter().next()
    }

    /// Objects named `name`, in the order they became known.
    pub fn objects_by_name(&self, name: &str) -> Vec<&Record> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.objects.get(id))
            .collect()
    }

    /// Names shared by more than one object.
    pub fn duplicate_names(&self) -> Vec<(&str, &[String])> {
        let mut dups: Vec<(&str, &[String])> = self
            .by_name
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
            .collect();
        dups.sort_by_key(|(_, ids)| ids.first().and_then(|id| self.position(id)));
        dups
    }

    /// Ids of the objects holding a pointer to each object.
    pub fn referrers(&self) -> HashMap<&str, Vec<&str>> {
        let mut out: HashMap<&str, Vec<&str>> = HashMap::new();
        for (id, record) in &self.objects {
            for (_, pointer) in record.pointers() {
                if let Some(target) = pointer.target() {
                    let sources = out.entry(target).or_default();
                    if sources.last() != Some(&id.as_str()) {
                        sources.push(id.as_str());
                    }
                }
            }
        }
        out
    }

    /// Ancestors of `object_id` (objects pointing at it, directly or through
    /// other objects) whose type is or derives from `parent_type_id`.
    pub fn find_parents_by_type(&self, object_id: &str, parent_type_id: &str) -> Vec<&Record> {
        let referrers = self.referrers();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut found = Vec::new();
        visited.insert(object_id);
        queue.push_back(object_id);

        while let Some(current) = queue.pop_front() {
            for &parent in referrers.get(current).into_iter().flatten() {
                if !visited.insert(parent) {
                    continue;
                }
                if let Some(record) = self.objects.get(parent) {
                    if self.registry.is_derived(&record.type_id, parent_type_id) {
                        found.push(record);
                    }
                }
                queue.push_back(parent);
            }
        }
        found
    }

    // --- Queries ---

    /// Lazily yield the objects matching `query`, in document order.
    /// An empty query yields every object.
    pub fn query<'a>(&'a self, query: &str) -> Result<impl Iterator<Item = &'a Record> + 'a> {
        self.query_filtered(query, |_| true)
    }

    /// Like [`Behavior::query`], skipping objects `filter` rejects before evaluating.
    pub fn query_filtered<'a, F>(
        &'a self,
        query: &str,
        filter: F,
    ) -> Result<impl Iterator<Item = &'a Record> + 'a>
    where
        F: Fn(&Record) -> bool + 'a,
    {
        let query = Query::parse(query)?;
        Ok(self
            .objects
            .values()
            .filter(move |record: &&'a Record| filter(record) && query.matches(self, record)))
    }

    /// Values addressed by `path` in an object, following pointers into other objects.
    pub fn resolve<'a>(&'a self, record: &'a Record, path: &FieldPath) -> Vec<&'a Value> {
        crate::query::resolve_across(self, record, path.segments())
    }

    // --- Graph ---

    /// Reference graph of everything reachable from `root_id`.
    pub fn build_reference_graph(&self, root_id: &str) -> Result<ReferenceGraph<'_>> {
        ReferenceGraph::build(self, root_id)
    }
}

fn uses_decimal_comma(record: &Record) -> bool {
    let mut found = false;
    record.walk(&mut |_, value| {
        if let Value::Float(real) = value {
            if real.loaded_text().is_some_and(|t| t.dec.contains(',')) {
                found = true;
            }
        }
    });
    found
}
