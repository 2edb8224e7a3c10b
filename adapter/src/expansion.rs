//! Expansion adapters: scalars standing in for branch instances.
//!
//! When a merge group mixes leaf and branch shapes, the branch compound
//! carries an expansion — a one-slot leaf schema for the scalar side. An
//! [`Expansion`] realizes that schema over a single value: the reserved
//! slot answers the value, and every regular branch property answers
//! `Missing`/absent (with the configured policy on writes), so an
//! expansion instance can be passed anywhere the branch type is
//! expected.
//!
//! The wrapped value may be owned, or live inside a record field, a list
//! element, or a template slot; in the hosted cases writes go through to
//! the underlying storage.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use compound_schema_core::{
    Cardinality, CompoundId, DeclaredLeaf, DescriptorId, MergedKind, MergedProperty, Value,
    EXPANSION_SLOT,
};
use compound_schema_engine::{resolve, MissingSetterPolicy};

use crate::context::SchemaContext;
use crate::error::{AdapterError, Result};
use crate::instance::{record_identity, RecordRef, Slot};
use crate::structure::{Field, Item};
use crate::template::{StorageRef, TemplateSlot};

/// A scalar value adapted to the shape of a branch compound.
#[derive(Clone)]
pub struct Expansion<'a> {
    cx: SchemaContext<'a>,
    compound: CompoundId,
    host: Host,
}

#[derive(Clone)]
enum Host {
    Owned(Rc<RefCell<Value>>),
    Field {
        target: RecordRef,
        property: String,
    },
    Element {
        target: RecordRef,
        property: String,
        index: usize,
    },
    TemplateField {
        storage: StorageRef,
        property: String,
    },
    TemplateElement {
        storage: StorageRef,
        property: String,
        index: usize,
    },
}

fn salt(parts: &impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    parts.hash(&mut hasher);
    hasher.finish()
}

impl Host {
    fn read(&self) -> Result<Option<Value>> {
        match self {
            Host::Owned(cell) => Ok(Some(cell.borrow().clone())),
            Host::Field { target, property } => match target.borrow().slot(property) {
                Slot::Empty => Ok(None),
                Slot::Value(value) => Ok(Some(value)),
                _ => Err(AdapterError::ValueShape {
                    property: property.clone(),
                    expected: "value",
                }),
            },
            Host::Element {
                target,
                property,
                index,
            } => match target.borrow().slot(property) {
                Slot::Values(values) => Ok(values.get(*index).cloned()),
                Slot::Empty => Ok(None),
                _ => Err(AdapterError::ValueShape {
                    property: property.clone(),
                    expected: "value list",
                }),
            },
            Host::TemplateField { storage, property } => {
                match storage.borrow().fields.get(property) {
                    Some(TemplateSlot::Value(value)) => Ok(Some(value.clone())),
                    Some(TemplateSlot::Empty) | None => Ok(None),
                    Some(_) => Err(AdapterError::ValueShape {
                        property: property.clone(),
                        expected: "value",
                    }),
                }
            }
            Host::TemplateElement {
                storage,
                property,
                index,
            } => match storage.borrow().fields.get(property) {
                Some(TemplateSlot::Values(values)) => Ok(values.get(*index).cloned()),
                Some(TemplateSlot::Empty) | None => Ok(None),
                Some(_) => Err(AdapterError::ValueShape {
                    property: property.clone(),
                    expected: "value list",
                }),
            },
        }
    }

    fn write(&self, value: Value) -> Result<()> {
        match self {
            Host::Owned(cell) => {
                *cell.borrow_mut() = value;
                Ok(())
            }
            Host::Field { target, property } => {
                target.borrow_mut().set_slot(property.clone(), Slot::Value(value));
                Ok(())
            }
            Host::Element {
                target,
                property,
                index,
            } => {
                let mut slot = target.borrow().slot(property);
                match &mut slot {
                    Slot::Values(values) if *index < values.len() => values[*index] = value,
                    Slot::Values(values) => {
                        return Err(AdapterError::IndexOutOfBounds {
                            property: property.clone(),
                            index: *index,
                            len: values.len(),
                        });
                    }
                    _ => {
                        return Err(AdapterError::ValueShape {
                            property: property.clone(),
                            expected: "value list",
                        });
                    }
                }
                target.borrow_mut().set_slot(property.clone(), slot);
                Ok(())
            }
            Host::TemplateField { storage, property } => {
                storage
                    .borrow_mut()
                    .fields
                    .insert(property.clone(), TemplateSlot::Value(value));
                Ok(())
            }
            Host::TemplateElement {
                storage,
                property,
                index,
            } => {
                let mut fields = storage.borrow_mut();
                match fields.fields.get_mut(property) {
                    Some(TemplateSlot::Values(values)) if *index < values.len() => {
                        values[*index] = value;
                        Ok(())
                    }
                    Some(TemplateSlot::Values(values)) => Err(AdapterError::IndexOutOfBounds {
                        property: property.clone(),
                        index: *index,
                        len: values.len(),
                    }),
                    _ => Err(AdapterError::ValueShape {
                        property: property.clone(),
                        expected: "value list",
                    }),
                }
            }
        }
    }

    fn descriptor(&self) -> Option<DescriptorId> {
        match self {
            Host::Field { target, .. } | Host::Element { target, .. } => {
                Some(target.borrow().descriptor)
            }
            _ => None,
        }
    }

    fn identity(&self) -> (usize, u64) {
        match self {
            Host::Owned(cell) => (Rc::as_ptr(cell) as usize, 0),
            Host::Field { target, property } => (record_identity(target), salt(property)),
            Host::Element {
                target,
                property,
                index,
            } => (record_identity(target), salt(&(property, index))),
            Host::TemplateField { storage, property } => {
                (Rc::as_ptr(storage) as usize, salt(property))
            }
            Host::TemplateElement {
                storage,
                property,
                index,
            } => (Rc::as_ptr(storage) as usize, salt(&(property, index))),
        }
    }
}

impl<'a> Expansion<'a> {
    /// Wraps an owned scalar as an instance of the branch compound.
    ///
    /// Fails when the compound carries no expansion.
    pub fn wrap(cx: SchemaContext<'a>, compound: CompoundId, value: Value) -> Result<Self> {
        if cx.compounds()[compound].expansion.is_none() {
            return Err(AdapterError::NoExpansion {
                compound: cx.compound_name(compound),
            });
        }
        Ok(Expansion {
            cx,
            compound,
            host: Host::Owned(Rc::new(RefCell::new(value))),
        })
    }

    /// Adapts a leaf-shaped original record to the branch compound its
    /// group merged into: the record's value slot becomes the expansion
    /// slot, and writes go through to the record.
    pub fn for_record(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        record: RecordRef,
    ) -> Result<Self> {
        if cx.compounds()[compound].expansion.is_none() {
            return Err(AdapterError::NoExpansion {
                compound: cx.compound_name(compound),
            });
        }
        Ok(Expansion::over_field(cx, compound, record, EXPANSION_SLOT))
    }

    pub(crate) fn over_field(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        target: RecordRef,
        property: &str,
    ) -> Self {
        Expansion {
            cx,
            compound,
            host: Host::Field {
                target,
                property: property.to_string(),
            },
        }
    }

    pub(crate) fn over_element(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        target: RecordRef,
        property: &str,
        index: usize,
    ) -> Self {
        Expansion {
            cx,
            compound,
            host: Host::Element {
                target,
                property: property.to_string(),
                index,
            },
        }
    }

    pub(crate) fn over_template_field(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        storage: StorageRef,
        property: &str,
    ) -> Self {
        Expansion {
            cx,
            compound,
            host: Host::TemplateField {
                storage,
                property: property.to_string(),
            },
        }
    }

    pub(crate) fn over_template_element(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        storage: StorageRef,
        property: &str,
        index: usize,
    ) -> Self {
        Expansion {
            cx,
            compound,
            host: Host::TemplateElement {
                storage,
                property: property.to_string(),
                index,
            },
        }
    }

    /// The branch compound this expansion instance stands in for.
    pub fn compound(&self) -> CompoundId {
        self.compound
    }

    pub(crate) fn context(&self) -> SchemaContext<'a> {
        self.cx
    }

    pub(crate) fn identity(&self) -> (usize, u64) {
        self.host.identity()
    }

    /// The wrapped value in its original kind, unconverted.
    pub(crate) fn raw_value(&self) -> Result<Option<Value>> {
        self.host.read()
    }

    /// The wrapped value, widened to the expansion slot's merged kind;
    /// `None` when the underlying storage was cleared.
    pub fn value(&self) -> Result<Option<Value>> {
        let Some(raw) = self.host.read()? else {
            return Ok(None);
        };
        Ok(Some(self.widen_slot_value(&raw)?))
    }

    /// Presence: the slot realizes SINGLE, every branch property MISSING.
    pub fn presence(&self, name: &str) -> Result<Cardinality> {
        if name == EXPANSION_SLOT {
            return Ok(Cardinality::Single);
        }
        self.find(name)?;
        Ok(Cardinality::Missing)
    }

    /// Reads the slot value, or the missing-default for branch properties.
    pub fn get(&self, name: &str) -> Result<Field<'a>> {
        if name == EXPANSION_SLOT {
            return Ok(match self.value()? {
                Some(value) => Field::Value(value),
                None => Field::Absent,
            });
        }
        let property = self.find(name)?;
        Ok(if property.cardinality.is_list() {
            match property.kind {
                MergedKind::Branch(_) => Field::Nodes(Vec::new()),
                _ => Field::Values(Vec::new()),
            }
        } else {
            Field::Absent
        })
    }

    /// Writes the slot value; branch properties obey the missing policy.
    pub fn set(&self, name: &str, item: Item) -> Result<()> {
        if name != EXPANSION_SLOT {
            self.find(name)?;
            return match self.cx.missing_setter {
                MissingSetterPolicy::Ignore => Ok(()),
                MissingSetterPolicy::Error => Err(AdapterError::UnsupportedSetter {
                    property: name.to_string(),
                }),
            };
        }
        let Item::Value(value) = item else {
            return Err(AdapterError::ValueShape {
                property: EXPANSION_SLOT.to_string(),
                expected: "value",
            });
        };
        let converted = self.convert_for_write(value)?;
        self.host.write(converted)
    }

    /// List editing: every branch property of an expansion is missing,
    /// so these follow the missing-setter policy; the slot itself is not
    /// a list.
    pub fn push(&self, name: &str, _item: Item) -> Result<()> {
        self.missing_list_write(name)
    }

    /// See [`Expansion::push`].
    pub fn remove_at(&self, name: &str, _index: usize) -> Result<()> {
        self.missing_list_write(name)
    }

    /// See [`Expansion::push`].
    pub fn clear(&self, name: &str) -> Result<()> {
        self.missing_list_write(name)
    }

    fn missing_list_write(&self, name: &str) -> Result<()> {
        if name == EXPANSION_SLOT {
            return Err(AdapterError::ValueShape {
                property: EXPANSION_SLOT.to_string(),
                expected: "list",
            });
        }
        self.find(name)?;
        match self.cx.missing_setter {
            MissingSetterPolicy::Ignore => Ok(()),
            MissingSetterPolicy::Error => Err(AdapterError::UnsupportedSetter {
                property: name.to_string(),
            }),
        }
    }

    fn expansion_id(&self) -> Result<CompoundId> {
        self.cx.compounds()[self.compound]
            .expansion
            .ok_or_else(|| AdapterError::NoExpansion {
                compound: self.cx.compound_name(self.compound),
            })
    }

    fn slot_property(&self) -> Result<&'a MergedProperty> {
        let expansion = self.expansion_id()?;
        self.cx.compounds()[expansion]
            .leaf_value()
            .ok_or_else(|| AdapterError::NoExpansion {
                compound: self.cx.compound_name(self.compound),
            })
    }

    fn widen_slot_value(&self, raw: &Value) -> Result<Value> {
        let slot = self.slot_property()?;
        match &slot.kind {
            MergedKind::Scalar(common) => Ok(resolve::widen(raw, *common)?),
            MergedKind::Enum(unified) => {
                let literal = raw.render();
                Ok(Value::Enum(
                    unified.value_of_name(&literal)?.display.clone(),
                ))
            }
            MergedKind::Branch(_) => Err(AdapterError::ValueShape {
                property: EXPANSION_SLOT.to_string(),
                expected: "value",
            }),
        }
    }

    fn convert_for_write(&self, value: Value) -> Result<Value> {
        let slot = self.slot_property()?;
        match &slot.kind {
            MergedKind::Scalar(_) => match self.host.read()? {
                // Keep the underlying storage kind stable when known.
                Some(current) => match current.kind() {
                    Some(kind) if !matches!(current, Value::Enum(_)) => {
                        Ok(resolve::narrow(&value, kind)?)
                    }
                    _ => Ok(value),
                },
                None => Ok(value),
            },
            MergedKind::Enum(unified) => {
                let raw = match &value {
                    Value::Enum(literal) => literal.clone(),
                    Value::Str(literal) => literal.clone(),
                    _ => {
                        return Err(AdapterError::ValueShape {
                            property: EXPANSION_SLOT.to_string(),
                            expected: "enumeration constant",
                        });
                    }
                };
                let constant = unified.value_of_name(&raw)?;
                // Map back into the host record's own enumeration when
                // the host is a record field.
                if let Some(descriptor) = self.host.descriptor() {
                    let source = slot
                        .origins
                        .iter()
                        .find(|origin| {
                            origin.singular == descriptor
                                || self
                                    .cx
                                    .descriptors
                                    .super_chain(descriptor)
                                    .contains(&origin.singular)
                        })
                        .and_then(|origin| match &origin.declared {
                            Some(DeclaredLeaf::Enum(source)) => Some(source.clone()),
                            _ => None,
                        });
                    if let Some(source) = source {
                        return match unified.unwrap(&constant.display, &source)? {
                            Some(literal) => Ok(Value::Enum(literal.to_string())),
                            None => Err(AdapterError::EnumUnmapped {
                                constant: constant.display.clone(),
                                enumeration: source,
                            }),
                        };
                    }
                }
                Ok(Value::Enum(constant.display.clone()))
            }
            MergedKind::Branch(_) => Err(AdapterError::ValueShape {
                property: EXPANSION_SLOT.to_string(),
                expected: "value",
            }),
        }
    }

    fn find(&self, name: &str) -> Result<&'a MergedProperty> {
        self.cx
            .find_property(self.compound, name)
            .ok_or_else(|| AdapterError::UnknownProperty {
                compound: self.cx.compound_name(self.compound),
                property: name.to_string(),
            })
    }
}
