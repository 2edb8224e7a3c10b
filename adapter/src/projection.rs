//! Projections: zero-copy views over original record instances.
//!
//! A [`Projection`] exposes one [`RecordRef`] through the merged schema of
//! a compound. Every accessor delegates to the wrapped instance's own
//! storage, applying the type resolver's conversions where the merged
//! kind differs from the original declaration. Nothing is copied: a
//! mutation through the projection is a mutation of the original, and
//! reads always see the original's current state.
//!
//! Presence reporting is per-instance: the projection answers with the
//! cardinality the *wrapped singular* declares, which may be stricter
//! than the merged schema (SINGLE where the merge says OPTIONAL) or
//! `Missing` where only other variants declare the property.

use compound_schema_core::{
    Cardinality, CompoundId, DeclaredLeaf, DescriptorId, EnumType, MergedKind, MergedProperty,
    PropertyOrigin, PropertyType, Value, normalize_constant_name,
};
use compound_schema_engine::{resolve, MissingSetterPolicy};

use crate::context::SchemaContext;
use crate::error::{AdapterError, Result};
use crate::expansion::Expansion;
use crate::instance::{RecordRef, Slot};
use crate::structure::{Adapter, Field, Item};

/// A zero-copy view of one original record through a merged compound.
#[derive(Clone)]
pub struct Projection<'a> {
    cx: SchemaContext<'a>,
    compound: CompoundId,
    target: RecordRef,
}

impl<'a> Projection<'a> {
    /// Wraps an original record, `None` mapping to `None`.
    ///
    /// Fails when the record's descriptor (or any of its ancestors) is
    /// not a contributor of the compound.
    pub fn wrap(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        target: Option<RecordRef>,
    ) -> Result<Option<Self>> {
        match target {
            None => Ok(None),
            Some(target) => Projection::over(cx, compound, target).map(Some),
        }
    }

    pub(crate) fn over(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        target: RecordRef,
    ) -> Result<Self> {
        let descriptor = target.borrow().descriptor;
        let compound_ref = &cx.compounds()[compound];
        let contributes = compound_ref.singulars.contains(&descriptor)
            || cx
                .descriptors
                .super_chain(descriptor)
                .iter()
                .any(|ancestor| compound_ref.singulars.contains(ancestor));
        if !contributes {
            return Err(AdapterError::ProjectionMismatch {
                expected: compound_ref.name.clone(),
                actual: cx.descriptors[descriptor].name.clone(),
            });
        }
        Ok(Projection {
            cx,
            compound,
            target,
        })
    }

    /// Recovers the wrapped original, checking the projecting type.
    pub fn unwrap(self, expected: DescriptorId) -> Result<RecordRef> {
        let actual = self.target.borrow().descriptor;
        if actual == expected {
            Ok(self.target)
        } else {
            Err(AdapterError::ProjectionMismatch {
                expected: self.cx.descriptors[expected].name.clone(),
                actual: self.cx.descriptors[actual].name.clone(),
            })
        }
    }

    /// The compound this projection realizes.
    pub fn compound(&self) -> CompoundId {
        self.compound
    }

    /// The wrapped original.
    pub fn target(&self) -> &RecordRef {
        &self.target
    }

    pub(crate) fn context(&self) -> SchemaContext<'a> {
        self.cx
    }

    /// The cardinality the wrapped singular realizes for `name`.
    pub fn presence(&self, name: &str) -> Result<Cardinality> {
        let property = self.find(name)?;
        Ok(self
            .origin_for(property)
            .map_or(Cardinality::Missing, |origin| origin.cardinality))
    }

    /// Reads a property, converted to the merged kind.
    pub fn get(&self, name: &str) -> Result<Field<'a>> {
        let property = self.find(name)?;
        let merged_list = property.cardinality.is_list();
        let empty = |kind: &MergedKind| {
            if merged_list {
                match kind {
                    MergedKind::Branch(_) => Field::Nodes(Vec::new()),
                    _ => Field::Values(Vec::new()),
                }
            } else {
                Field::Absent
            }
        };

        let Some(origin) = self.present_origin(property) else {
            return Ok(empty(&property.kind));
        };

        let slot = self.target.borrow().slot(name);
        match (&property.kind, slot) {
            (kind, Slot::Empty) => Ok(empty(kind)),
            (MergedKind::Branch(nested), Slot::Record(record)) => {
                let node = Adapter::Projection(Projection::over(self.cx, *nested, record)?);
                Ok(if merged_list {
                    Field::Nodes(vec![node])
                } else {
                    Field::Node(node)
                })
            }
            (MergedKind::Branch(nested), Slot::Records(records)) => {
                if !merged_list {
                    return Err(AdapterError::ValueShape {
                        property: name.to_string(),
                        expected: "single record",
                    });
                }
                let nodes = records
                    .into_iter()
                    .map(|record| {
                        Projection::over(self.cx, *nested, record).map(Adapter::Projection)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Field::Nodes(nodes))
            }
            // A scalar where the merge expects a branch: the original
            // models the concept as a leaf, so it surfaces through the
            // branch's expansion.
            (MergedKind::Branch(nested), Slot::Value(_)) => {
                let node = Adapter::Expansion(Expansion::over_field(
                    self.cx,
                    *nested,
                    self.target.clone(),
                    name,
                ));
                Ok(if merged_list {
                    Field::Nodes(vec![node])
                } else {
                    Field::Node(node)
                })
            }
            (MergedKind::Branch(nested), Slot::Values(values)) => {
                let nodes = (0..values.len())
                    .map(|index| {
                        Adapter::Expansion(Expansion::over_element(
                            self.cx,
                            *nested,
                            self.target.clone(),
                            name,
                            index,
                        ))
                    })
                    .collect();
                Ok(Field::Nodes(nodes))
            }
            (kind, Slot::Value(value)) => {
                let converted = self.read_value(origin, kind, &value, name)?;
                Ok(if merged_list {
                    Field::Values(vec![converted])
                } else {
                    Field::Value(converted)
                })
            }
            (kind, Slot::Values(values)) => {
                let converted = values
                    .iter()
                    .map(|value| self.read_value(origin, kind, value, name))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Field::Values(converted))
            }
            (_, Slot::Record(_) | Slot::Records(_)) => Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "value",
            }),
        }
    }

    /// Writes a property, converting from the merged kind back to the
    /// original declaration. On a missing property the configured
    /// policy decides between a no-op and a typed error.
    pub fn set(&self, name: &str, item: Item) -> Result<()> {
        let property = self.find(name)?;
        let Some(origin) = self.present_origin(property) else {
            return self.missing_write(name);
        };
        let mut slot = self.write_slot(property, origin, item, name)?;
        if origin.cardinality == Cardinality::List {
            // List-declared storage always holds a list.
            slot = match slot {
                Slot::Value(value) => Slot::Values(vec![value]),
                Slot::Record(record) => Slot::Records(vec![record]),
                other => other,
            };
        }
        self.target.borrow_mut().set_slot(name, slot);
        Ok(())
    }

    /// Appends to a merged list property.
    ///
    /// Over a single-valued origin this fills the empty field or fails
    /// with [`AdapterError::SingleBackedList`]; single storage cannot
    /// hold two elements.
    pub fn push(&self, name: &str, item: Item) -> Result<()> {
        let property = self.find(name)?;
        if !property.cardinality.is_list() {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "list",
            });
        }
        let Some(origin) = self.present_origin(property) else {
            return self.missing_write(name);
        };

        if origin.cardinality != Cardinality::List {
            let current = self.target.borrow().slot(name);
            if !matches!(current, Slot::Empty) {
                return Err(AdapterError::SingleBackedList {
                    property: name.to_string(),
                });
            }
            let slot = self.write_slot(property, origin, item, name)?;
            self.target.borrow_mut().set_slot(name, slot);
            return Ok(());
        }

        let mut slot = self.target.borrow().slot(name);
        match (&property.kind, item) {
            (MergedKind::Branch(_), Item::Record(record)) => {
                self.check_record(origin, &record, name)?;
                match &mut slot {
                    Slot::Empty => slot = Slot::Records(vec![record]),
                    Slot::Records(records) => records.push(record),
                    _ => {
                        return Err(AdapterError::ValueShape {
                            property: name.to_string(),
                            expected: "record list",
                        });
                    }
                }
            }
            (_, item) => {
                let Item::Value(value) = item else {
                    return Err(AdapterError::ValueShape {
                        property: name.to_string(),
                        expected: "value",
                    });
                };
                let converted = self.narrow_value(property, origin, &value, name)?;
                match &mut slot {
                    Slot::Empty => slot = Slot::Values(vec![converted]),
                    Slot::Values(values) => values.push(converted),
                    _ => {
                        return Err(AdapterError::ValueShape {
                            property: name.to_string(),
                            expected: "value list",
                        });
                    }
                }
            }
        }
        self.target.borrow_mut().set_slot(name, slot);
        Ok(())
    }

    /// Removes one element of a merged list property. Removing the sole
    /// element of a single-backed list clears the underlying field.
    pub fn remove_at(&self, name: &str, index: usize) -> Result<()> {
        let property = self.find(name)?;
        if !property.cardinality.is_list() {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "list",
            });
        }
        let Some(_origin) = self.present_origin(property) else {
            return self.missing_write(name);
        };

        let mut slot = self.target.borrow().slot(name);
        let out_of_bounds = |len: usize| AdapterError::IndexOutOfBounds {
            property: name.to_string(),
            index,
            len,
        };
        match &mut slot {
            Slot::Empty => return Err(out_of_bounds(0)),
            Slot::Value(_) | Slot::Record(_) => {
                if index != 0 {
                    return Err(out_of_bounds(1));
                }
                slot = Slot::Empty;
            }
            Slot::Values(values) => {
                if index >= values.len() {
                    return Err(out_of_bounds(values.len()));
                }
                values.remove(index);
            }
            Slot::Records(records) => {
                if index >= records.len() {
                    return Err(out_of_bounds(records.len()));
                }
                records.remove(index);
            }
        }
        self.target.borrow_mut().set_slot(name, slot);
        Ok(())
    }

    /// Clears a property back to absent/empty.
    pub fn clear(&self, name: &str) -> Result<()> {
        let property = self.find(name)?;
        let Some(_origin) = self.present_origin(property) else {
            return self.missing_write(name);
        };
        self.target.borrow_mut().set_slot(name, Slot::Empty);
        Ok(())
    }

    fn find(&self, name: &str) -> Result<&'a MergedProperty> {
        self.cx
            .find_property(self.compound, name)
            .ok_or_else(|| AdapterError::UnknownProperty {
                compound: self.cx.compound_name(self.compound),
                property: name.to_string(),
            })
    }

    /// The origin entry for the wrapped instance's descriptor lineage.
    fn origin_for(&self, property: &'a MergedProperty) -> Option<&'a PropertyOrigin> {
        let descriptor = self.target.borrow().descriptor;
        if let Some(origin) = property.origin(descriptor) {
            return Some(origin);
        }
        for ancestor in self.cx.descriptors.super_chain(descriptor) {
            if let Some(origin) = property.origin(ancestor) {
                return Some(origin);
            }
        }
        None
    }

    fn present_origin(&self, property: &'a MergedProperty) -> Option<&'a PropertyOrigin> {
        self.origin_for(property)
            .filter(|origin| origin.cardinality.is_present())
    }

    fn missing_write(&self, name: &str) -> Result<()> {
        match self.cx.missing_setter {
            MissingSetterPolicy::Ignore => Ok(()),
            MissingSetterPolicy::Error => Err(AdapterError::UnsupportedSetter {
                property: name.to_string(),
            }),
        }
    }

    fn read_value(
        &self,
        origin: &PropertyOrigin,
        kind: &MergedKind,
        raw: &Value,
        name: &str,
    ) -> Result<Value> {
        match kind {
            MergedKind::Scalar(common) => Ok(resolve::widen(raw, *common)?),
            MergedKind::Enum(unified) => {
                let source = self.origin_enum_name(origin, name)?;
                match raw {
                    Value::Enum(literal) => Ok(Value::Enum(
                        unified.wrap(&source, literal)?.display.clone(),
                    )),
                    _ => Err(AdapterError::ValueShape {
                        property: name.to_string(),
                        expected: "enumeration constant",
                    }),
                }
            }
            MergedKind::Branch(_) => Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "record",
            }),
        }
    }

    fn write_slot(
        &self,
        property: &MergedProperty,
        origin: &PropertyOrigin,
        item: Item,
        name: &str,
    ) -> Result<Slot> {
        match (&property.kind, item) {
            (MergedKind::Branch(_), Item::Record(record)) => {
                self.check_record(origin, &record, name)?;
                Ok(Slot::Record(record))
            }
            (_, Item::Record(_)) => Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "value",
            }),
            (_, Item::Value(value)) => Ok(Slot::Value(
                self.narrow_value(property, origin, &value, name)?,
            )),
        }
    }

    /// Converts a merged-kind value back to the origin's declaration.
    fn narrow_value(
        &self,
        property: &MergedProperty,
        origin: &PropertyOrigin,
        value: &Value,
        name: &str,
    ) -> Result<Value> {
        if let MergedKind::Enum(unified) = &property.kind {
            let display = match value {
                Value::Enum(display) => display.clone(),
                Value::Str(display) => display.clone(),
                _ => {
                    return Err(AdapterError::ValueShape {
                        property: name.to_string(),
                        expected: "enumeration constant",
                    });
                }
            };
            let source = self.origin_enum_name(origin, name)?;
            return match unified.unwrap(&display, &source)? {
                Some(literal) => Ok(Value::Enum(literal.to_string())),
                None => Err(AdapterError::EnumUnmapped {
                    constant: display,
                    enumeration: source,
                }),
            };
        }

        match &origin.declared {
            Some(DeclaredLeaf::Scalar(kind)) => Ok(resolve::narrow(value, *kind)?),
            Some(DeclaredLeaf::Enum(source)) => {
                // The merge widened this enum into the string fallback;
                // map the string back onto a constant of the original.
                let literal = match value {
                    Value::Str(s) => s.clone(),
                    Value::Enum(l) => l.clone(),
                    _ => {
                        return Err(AdapterError::ValueShape {
                            property: name.to_string(),
                            expected: "string or constant",
                        });
                    }
                };
                let enum_type = self.enum_type_of(origin.singular, source).ok_or_else(|| {
                    AdapterError::EnumUnmapped {
                        constant: literal.clone(),
                        enumeration: source.clone(),
                    }
                })?;
                if enum_type.has_constant(&literal) {
                    return Ok(Value::Enum(literal));
                }
                let normalized = normalize_constant_name(&literal);
                enum_type
                    .constants
                    .iter()
                    .find(|constant| normalize_constant_name(constant) == normalized)
                    .map(|constant| Value::Enum(constant.clone()))
                    .ok_or(AdapterError::EnumUnmapped {
                        constant: literal,
                        enumeration: source.clone(),
                    })
            }
            None => Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "record",
            }),
        }
    }

    fn check_record(&self, origin: &PropertyOrigin, record: &RecordRef, name: &str) -> Result<()> {
        let declared = self.declared_branch_target(origin, name)?;
        let actual = record.borrow().descriptor;
        let compatible = actual == declared
            || self.cx.descriptors.super_chain(actual).contains(&declared);
        if compatible {
            Ok(())
        } else {
            Err(AdapterError::ProjectionMismatch {
                expected: self.cx.descriptors[declared].name.clone(),
                actual: self.cx.descriptors[actual].name.clone(),
            })
        }
    }

    fn declared_branch_target(&self, origin: &PropertyOrigin, name: &str) -> Result<DescriptorId> {
        match self.cx.descriptors[origin.singular]
            .property(name)
            .map(|p| &p.ty)
        {
            Some(PropertyType::Branch(target)) => Ok(*target),
            _ => Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "record",
            }),
        }
    }

    fn origin_enum_name(&self, origin: &PropertyOrigin, name: &str) -> Result<String> {
        match &origin.declared {
            Some(DeclaredLeaf::Enum(source)) => Ok(source.clone()),
            _ => Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "enumeration constant",
            }),
        }
    }

    fn enum_type_of(&self, singular: DescriptorId, enum_name: &str) -> Option<&'a EnumType> {
        self.cx.descriptors[singular]
            .properties
            .values()
            .find_map(|property| match &property.ty {
                PropertyType::Enum(enum_type) if enum_type.name == enum_name => Some(enum_type),
                _ => None,
            })
    }
}
