//! The Structure surface: one closed union over all adapter kinds.
//!
//! [`Adapter`] dispatches the merged-schema contract — presence, get,
//! set, list editing — over the three realizations (projection, template,
//! expansion) with exhaustive matching. The traversal algorithms that
//! must survive cyclic graphs (equality, hashing, rendering, deep copy)
//! live here too; each carries an explicit visited set keyed by storage
//! identity, never recursing unboundedly.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use compound_schema_core::{Cardinality, CompoundId, Value, EXPANSION_SLOT};

use crate::context::SchemaContext;
use crate::error::Result;
use crate::expansion::Expansion;
use crate::instance::RecordRef;
use crate::projection::Projection;
use crate::template::{StorageRef, Template};

/// One element for a set/push operation.
#[derive(Debug, Clone)]
pub enum Item {
    /// A scalar or enumeration value, in the merged kind.
    Value(Value),
    /// A nested original record.
    Record(RecordRef),
}

/// Any realization of a compound's Structure contract.
#[derive(Clone)]
pub enum Adapter<'a> {
    /// Zero-copy view over an original record.
    Projection(Projection<'a>),
    /// Independently-owned blank instance.
    Template(Template<'a>),
    /// Scalar standing in for a branch instance.
    Expansion(Expansion<'a>),
}

/// Result of reading one merged property.
#[derive(Clone)]
pub enum Field<'a> {
    /// No value (absent optional, or single never set).
    Absent,
    /// One value in the merged kind.
    Value(Value),
    /// One nested structure.
    Node(Adapter<'a>),
    /// List of values in the merged kind.
    Values(Vec<Value>),
    /// List of nested structures.
    Nodes(Vec<Adapter<'a>>),
}

/// Storage identity used by visited sets: a pointer plus a slot salt.
type Identity = (usize, u64);

impl<'a> Adapter<'a> {
    /// The compound this adapter realizes.
    pub fn compound(&self) -> CompoundId {
        match self {
            Adapter::Projection(p) => p.compound(),
            Adapter::Template(t) => t.compound(),
            Adapter::Expansion(e) => e.compound(),
        }
    }

    fn context(&self) -> SchemaContext<'a> {
        match self {
            Adapter::Projection(p) => p.context(),
            Adapter::Template(t) => t.context(),
            Adapter::Expansion(e) => e.context(),
        }
    }

    /// The cardinality realized by this instance for `name`.
    pub fn presence(&self, name: &str) -> Result<Cardinality> {
        match self {
            Adapter::Projection(p) => p.presence(name),
            Adapter::Template(t) => t.presence(name),
            Adapter::Expansion(e) => e.presence(name),
        }
    }

    /// Reads a property in the merged kind.
    pub fn get(&self, name: &str) -> Result<Field<'a>> {
        match self {
            Adapter::Projection(p) => p.get(name),
            Adapter::Template(t) => t.get(name),
            Adapter::Expansion(e) => e.get(name),
        }
    }

    /// Writes a property.
    pub fn set(&self, name: &str, item: Item) -> Result<()> {
        match self {
            Adapter::Projection(p) => p.set(name, item),
            Adapter::Template(t) => t.set(name, item),
            Adapter::Expansion(e) => e.set(name, item),
        }
    }

    /// Appends to a list property.
    pub fn push(&self, name: &str, item: Item) -> Result<()> {
        match self {
            Adapter::Projection(p) => p.push(name, item),
            Adapter::Template(t) => t.push(name, item),
            Adapter::Expansion(e) => e.push(name, item),
        }
    }

    /// Removes one element of a list property.
    pub fn remove_at(&self, name: &str, index: usize) -> Result<()> {
        match self {
            Adapter::Projection(p) => p.remove_at(name, index),
            Adapter::Template(t) => t.remove_at(name, index),
            Adapter::Expansion(e) => e.remove_at(name, index),
        }
    }

    /// Clears a property back to absent/empty.
    pub fn clear(&self, name: &str) -> Result<()> {
        match self {
            Adapter::Projection(p) => p.clear(name),
            Adapter::Template(t) => t.clear(name),
            Adapter::Expansion(e) => e.clear(name),
        }
    }

    fn identity(&self) -> Identity {
        match self {
            Adapter::Projection(p) => (std::rc::Rc::as_ptr(p.target()) as usize, 0),
            Adapter::Template(t) => (std::rc::Rc::as_ptr(t.storage()) as usize, 0),
            Adapter::Expansion(e) => e.identity(),
        }
    }

    /// Property names this adapter answers, traversal order.
    fn traversal_names(&self) -> Vec<String> {
        let mut names = self.context().property_names(self.compound());
        if matches!(self, Adapter::Expansion(_)) {
            names.insert(0, EXPANSION_SLOT.to_string());
        }
        names
    }

    /// Structural equality over the wrapped state.
    ///
    /// Two adapters over the same underlying storage are equal without
    /// traversal; otherwise properties compare pairwise, with a visited
    /// pair set so cyclic graphs terminate (a pair already under
    /// comparison is assumed equal).
    pub fn structural_eq(&self, other: &Adapter<'a>) -> bool {
        self.equals_with(other, &mut HashSet::new())
    }

    /// Equality step carrying the visited pair set.
    pub fn equals_with(
        &self,
        other: &Adapter<'a>,
        visited: &mut HashSet<(Identity, Identity)>,
    ) -> bool {
        let pair = (self.identity(), other.identity());
        if pair.0 == pair.1 {
            return true;
        }
        if !visited.insert(pair) {
            return true;
        }

        let mut names = self.traversal_names();
        for name in other.traversal_names() {
            if !names.iter().any(|n| *n == name) {
                names.push(name);
            }
        }

        for name in names {
            match (self.get(&name), other.get(&name)) {
                (Ok(left), Ok(right)) => {
                    if !field_eq(&left, &right, visited) {
                        return false;
                    }
                }
                (Err(_), Err(_)) => {}
                _ => return false,
            }
        }
        true
    }

    /// Structural hash consistent with [`Adapter::structural_eq`].
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_with(&mut hasher, &mut HashSet::new());
        hasher.finish()
    }

    /// Hash step carrying the visited set; a node already on the current
    /// path hashes as a cycle marker instead of recursing.
    pub fn hash_with<H: Hasher>(&self, hasher: &mut H, visited: &mut HashSet<Identity>) {
        let id = self.identity();
        if !visited.insert(id) {
            0x63_79_63_6cu32.hash(hasher);
            return;
        }
        for name in self.traversal_names() {
            match self.get(&name) {
                Ok(Field::Absent) => {}
                Ok(field) => {
                    name.hash(hasher);
                    hash_field(&field, hasher, visited);
                }
                Err(_) => {
                    name.hash(hasher);
                    u32::MAX.hash(hasher);
                }
            }
        }
        visited.remove(&id);
    }

    /// Cycle-safe rendering; a revisited node prints as `<cycle>`.
    pub fn render(&self) -> String {
        self.render_with(&mut HashSet::new())
    }

    /// Rendering step carrying the visited set.
    pub fn render_with(&self, visited: &mut HashSet<Identity>) -> String {
        let id = self.identity();
        if !visited.insert(id) {
            return "<cycle>".to_string();
        }
        let name = self.context().compound_name(self.compound());
        let mut parts: Vec<String> = Vec::new();
        for property in self.traversal_names() {
            let Ok(field) = self.get(&property) else {
                continue;
            };
            let rendered = match field {
                Field::Absent => continue,
                Field::Value(value) => value.render(),
                Field::Values(values) => {
                    let items: Vec<String> = values.iter().map(Value::render).collect();
                    format!("[{}]", items.join(", "))
                }
                Field::Node(node) => node.render_with(visited),
                Field::Nodes(nodes) => {
                    let items: Vec<String> =
                        nodes.iter().map(|node| node.render_with(visited)).collect();
                    format!("[{}]", items.join(", "))
                }
            };
            if property == EXPANSION_SLOT {
                parts.push(rendered);
            } else {
                parts.push(format!("{property}: {rendered}"));
            }
        }
        visited.remove(&id);
        if parts.is_empty() {
            format!("{name} {{}}")
        } else {
            format!("{name} {{ {} }}", parts.join(", "))
        }
    }

    /// Deep copy into independently-owned storage.
    ///
    /// Projections and templates copy into fresh templates; expansions
    /// copy into owned expansions. Shared and cyclic structure is
    /// preserved through a visited handle-to-copy map.
    pub fn deep_copy(&self) -> Result<Adapter<'a>> {
        self.copy_with(&mut HashMap::new())
    }

    fn copy_with(&self, copies: &mut HashMap<Identity, StorageRef>) -> Result<Adapter<'a>> {
        if let Adapter::Expansion(expansion) = self {
            return Ok(match expansion.raw_value()? {
                Some(value) => Adapter::Expansion(Expansion::wrap(
                    self.context(),
                    self.compound(),
                    value,
                )?),
                None => Adapter::Template(Template::new(self.context(), self.compound())),
            });
        }

        let id = self.identity();
        if let Some(existing) = copies.get(&id) {
            return Ok(Adapter::Template(Template::from_storage(
                self.context(),
                self.compound(),
                existing.clone(),
            )));
        }
        let template = Template::new(self.context(), self.compound());
        copies.insert(id, template.storage().clone());

        for name in self.traversal_names() {
            match self.get(&name)? {
                Field::Absent => {}
                Field::Value(value) => template.set(&name, Item::Value(value))?,
                Field::Values(values) => {
                    for value in values {
                        template.push(&name, Item::Value(value))?;
                    }
                }
                Field::Node(node) => match node {
                    Adapter::Expansion(expansion) => {
                        if let Some(value) = expansion.value()? {
                            template.set(&name, Item::Value(value))?;
                        }
                    }
                    nested => {
                        let child = nested.copy_with(copies)?;
                        if let Adapter::Template(child) = child {
                            template.attach_node(&name, child.storage().clone())?;
                        }
                    }
                },
                Field::Nodes(nodes) => {
                    for node in nodes {
                        match node {
                            Adapter::Expansion(expansion) => {
                                if let Some(value) = expansion.value()? {
                                    template.push(&name, Item::Value(value))?;
                                }
                            }
                            nested => {
                                let child = nested.copy_with(copies)?;
                                if let Adapter::Template(child) = child {
                                    template.attach_push_node(&name, child.storage().clone())?;
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(Adapter::Template(template))
    }
}

fn field_eq<'a>(
    left: &Field<'a>,
    right: &Field<'a>,
    visited: &mut HashSet<(Identity, Identity)>,
) -> bool {
    match (left, right) {
        (Field::Absent, Field::Absent) => true,
        (Field::Value(a), Field::Value(b)) => a == b,
        (Field::Values(a), Field::Values(b)) => a == b,
        (Field::Node(a), Field::Node(b)) => a.equals_with(b, visited),
        (Field::Nodes(a), Field::Nodes(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| x.equals_with(y, visited))
        }
        _ => false,
    }
}

fn hash_field<H: Hasher>(field: &Field<'_>, hasher: &mut H, visited: &mut HashSet<Identity>) {
    match field {
        Field::Absent => 0u8.hash(hasher),
        Field::Value(value) => value.render().hash(hasher),
        Field::Values(values) => {
            values.len().hash(hasher);
            for value in values {
                value.render().hash(hasher);
            }
        }
        Field::Node(node) => node.hash_with(hasher, visited),
        Field::Nodes(nodes) => {
            nodes.len().hash(hasher);
            for node in nodes {
                node.hash_with(hasher, visited);
            }
        }
    }
}

impl PartialEq for Adapter<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other)
    }
}

impl std::fmt::Display for Adapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}
