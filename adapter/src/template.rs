//! Templates: blank, independently-owned instances of a merged schema.
//!
//! A [`Template`] owns field storage per merged property and is usable
//! without wrapping any original record. Values are stored directly in
//! the merged kind, list-valued properties materialize lazily on first
//! write, and nested branch properties spawn nested templates on demand
//! via [`Template::node`] / [`Template::push_node`].

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use compound_schema_core::{Cardinality, CompoundId, MergedKind, MergedProperty, Value};
use compound_schema_engine::resolve;

use crate::context::SchemaContext;
use crate::error::{AdapterError, Result};
use crate::expansion::Expansion;
use crate::structure::{Adapter, Field, Item};

/// Shared handle to template storage; nested nodes are stored by handle
/// so deep copies of cyclic graphs stay cyclic.
pub(crate) type StorageRef = Rc<RefCell<Storage>>;

#[derive(Debug, Default)]
pub(crate) struct Storage {
    pub(crate) fields: IndexMap<String, TemplateSlot>,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum TemplateSlot {
    #[default]
    Empty,
    Value(Value),
    Node(StorageRef),
    Values(Vec<Value>),
    Nodes(Vec<StorageRef>),
}

/// A blank, mutable instance of one merged compound.
#[derive(Clone)]
pub struct Template<'a> {
    cx: SchemaContext<'a>,
    compound: CompoundId,
    storage: StorageRef,
}

impl<'a> Template<'a> {
    /// Creates a blank template of the given compound.
    pub fn new(cx: SchemaContext<'a>, compound: CompoundId) -> Self {
        Template {
            cx,
            compound,
            storage: Rc::new(RefCell::new(Storage::default())),
        }
    }

    pub(crate) fn from_storage(
        cx: SchemaContext<'a>,
        compound: CompoundId,
        storage: StorageRef,
    ) -> Self {
        Template {
            cx,
            compound,
            storage,
        }
    }

    /// The compound this template instantiates.
    pub fn compound(&self) -> CompoundId {
        self.compound
    }

    pub(crate) fn context(&self) -> SchemaContext<'a> {
        self.cx
    }

    pub(crate) fn storage(&self) -> &StorageRef {
        &self.storage
    }

    /// A template has no underlying singular; it realizes the merged
    /// cardinality itself.
    pub fn presence(&self, name: &str) -> Result<Cardinality> {
        Ok(self.find(name)?.cardinality)
    }

    /// Reads a property. Lists read as empty before first write without
    /// materializing storage.
    pub fn get(&self, name: &str) -> Result<Field<'a>> {
        let property = self.find(name)?;
        let merged_list = property.cardinality.is_list();
        let slot = self
            .storage
            .borrow()
            .fields
            .get(name)
            .cloned()
            .unwrap_or_default();

        match (&property.kind, slot) {
            (kind, TemplateSlot::Empty) => Ok(if merged_list {
                match kind {
                    MergedKind::Branch(_) => Field::Nodes(Vec::new()),
                    _ => Field::Values(Vec::new()),
                }
            } else {
                Field::Absent
            }),
            (MergedKind::Branch(nested), TemplateSlot::Node(storage)) => {
                let node = Adapter::Template(Template::from_storage(self.cx, *nested, storage));
                Ok(if merged_list {
                    Field::Nodes(vec![node])
                } else {
                    Field::Node(node)
                })
            }
            (MergedKind::Branch(nested), TemplateSlot::Nodes(storages)) => Ok(Field::Nodes(
                storages
                    .into_iter()
                    .map(|storage| {
                        Adapter::Template(Template::from_storage(self.cx, *nested, storage))
                    })
                    .collect(),
            )),
            // A scalar stored under an expanded branch property surfaces
            // through the expansion, like a leaf-shaped original would.
            (MergedKind::Branch(nested), TemplateSlot::Value(_)) => {
                let node = Adapter::Expansion(Expansion::over_template_field(
                    self.cx,
                    *nested,
                    self.storage.clone(),
                    name,
                ));
                Ok(if merged_list {
                    Field::Nodes(vec![node])
                } else {
                    Field::Node(node)
                })
            }
            (MergedKind::Branch(nested), TemplateSlot::Values(values)) => Ok(Field::Nodes(
                (0..values.len())
                    .map(|index| {
                        Adapter::Expansion(Expansion::over_template_element(
                            self.cx,
                            *nested,
                            self.storage.clone(),
                            name,
                            index,
                        ))
                    })
                    .collect(),
            )),
            (_, TemplateSlot::Value(value)) => Ok(if merged_list {
                Field::Values(vec![value])
            } else {
                Field::Value(value)
            }),
            (_, TemplateSlot::Values(values)) => Ok(Field::Values(values)),
            (_, TemplateSlot::Node(_) | TemplateSlot::Nodes(_)) => Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "value",
            }),
        }
    }

    /// Writes a scalar/enum property, normalizing into the merged kind.
    pub fn set(&self, name: &str, item: Item) -> Result<()> {
        let property = self.find(name)?;
        let value = match item {
            Item::Value(value) => value,
            Item::Record(_) => {
                return Err(AdapterError::ValueShape {
                    property: name.to_string(),
                    expected: "value (templates nest via node())",
                });
            }
        };
        let stored = self.normalize(property, value, name)?;
        let slot = if property.cardinality.is_list() {
            TemplateSlot::Values(vec![stored])
        } else {
            TemplateSlot::Value(stored)
        };
        self.storage.borrow_mut().fields.insert(name.to_string(), slot);
        Ok(())
    }

    /// The nested template under a branch property, created on demand.
    pub fn node(&self, name: &str) -> Result<Template<'a>> {
        let property = self.find(name)?;
        let MergedKind::Branch(nested) = property.kind else {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "record",
            });
        };
        if property.cardinality.is_list() {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "single record (use push_node on lists)",
            });
        }

        let existing = match self.storage.borrow().fields.get(name) {
            Some(TemplateSlot::Node(storage)) => Some(storage.clone()),
            Some(TemplateSlot::Empty) | None => None,
            Some(_) => {
                return Err(AdapterError::ValueShape {
                    property: name.to_string(),
                    expected: "record",
                });
            }
        };
        let storage = match existing {
            Some(storage) => storage,
            None => {
                let storage: StorageRef = Rc::new(RefCell::new(Storage::default()));
                self.storage
                    .borrow_mut()
                    .fields
                    .insert(name.to_string(), TemplateSlot::Node(storage.clone()));
                storage
            }
        };
        Ok(Template::from_storage(self.cx, nested, storage))
    }

    /// Appends a blank nested template to a branch list and returns it.
    pub fn push_node(&self, name: &str) -> Result<Template<'a>> {
        let property = self.find(name)?;
        let MergedKind::Branch(nested) = property.kind else {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "record",
            });
        };
        if !property.cardinality.is_list() {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "list",
            });
        }

        let storage: StorageRef = Rc::new(RefCell::new(Storage::default()));
        let mut fields = self.storage.borrow_mut();
        match fields.fields.get_mut(name) {
            Some(TemplateSlot::Nodes(nodes)) => nodes.push(storage.clone()),
            Some(TemplateSlot::Empty) | None => {
                fields
                    .fields
                    .insert(name.to_string(), TemplateSlot::Nodes(vec![storage.clone()]));
            }
            Some(_) => {
                return Err(AdapterError::ValueShape {
                    property: name.to_string(),
                    expected: "record list",
                });
            }
        }
        drop(fields);
        Ok(Template::from_storage(self.cx, nested, storage))
    }

    /// Appends a value to a list property, materializing it lazily.
    pub fn push(&self, name: &str, item: Item) -> Result<()> {
        let property = self.find(name)?;
        if !property.cardinality.is_list() {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "list",
            });
        }
        let Item::Value(value) = item else {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "value (use push_node for records)",
            });
        };
        let stored = self.normalize(property, value, name)?;

        let mut storage = self.storage.borrow_mut();
        match storage.fields.get_mut(name) {
            Some(TemplateSlot::Values(values)) => values.push(stored),
            Some(TemplateSlot::Empty) | None => {
                storage
                    .fields
                    .insert(name.to_string(), TemplateSlot::Values(vec![stored]));
            }
            Some(_) => {
                return Err(AdapterError::ValueShape {
                    property: name.to_string(),
                    expected: "value list",
                });
            }
        }
        Ok(())
    }

    /// Removes one element of a list property.
    pub fn remove_at(&self, name: &str, index: usize) -> Result<()> {
        let property = self.find(name)?;
        if !property.cardinality.is_list() {
            return Err(AdapterError::ValueShape {
                property: name.to_string(),
                expected: "list",
            });
        }
        let mut storage = self.storage.borrow_mut();
        let len = match storage.fields.get_mut(name) {
            Some(TemplateSlot::Values(values)) if index < values.len() => {
                values.remove(index);
                return Ok(());
            }
            Some(TemplateSlot::Nodes(nodes)) if index < nodes.len() => {
                nodes.remove(index);
                return Ok(());
            }
            Some(TemplateSlot::Values(values)) => values.len(),
            Some(TemplateSlot::Nodes(nodes)) => nodes.len(),
            _ => 0,
        };
        Err(AdapterError::IndexOutOfBounds {
            property: name.to_string(),
            index,
            len,
        })
    }

    /// Clears a property back to absent/empty.
    pub fn clear(&self, name: &str) -> Result<()> {
        self.find(name)?;
        self.storage
            .borrow_mut()
            .fields
            .insert(name.to_string(), TemplateSlot::Empty);
        Ok(())
    }

    /// Attaches copied storage under a branch property (deep copy path).
    pub(crate) fn attach_node(&self, name: &str, node: StorageRef) -> Result<()> {
        self.find(name)?;
        self.storage
            .borrow_mut()
            .fields
            .insert(name.to_string(), TemplateSlot::Node(node));
        Ok(())
    }

    /// Appends copied storage to a branch list (deep copy path).
    pub(crate) fn attach_push_node(&self, name: &str, node: StorageRef) -> Result<()> {
        self.find(name)?;
        let mut storage = self.storage.borrow_mut();
        match storage.fields.get_mut(name) {
            Some(TemplateSlot::Nodes(nodes)) => nodes.push(node),
            Some(TemplateSlot::Empty) | None => {
                storage
                    .fields
                    .insert(name.to_string(), TemplateSlot::Nodes(vec![node]));
            }
            Some(_) => {
                return Err(AdapterError::ValueShape {
                    property: name.to_string(),
                    expected: "record list",
                });
            }
        }
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

    /// Normalizes an incoming value into the merged kind.
    fn normalize(&self, property: &MergedProperty, value: Value, name: &str) -> Result<Value> {
        match &property.kind {
            MergedKind::Scalar(common) => Ok(resolve::widen(&value, *common)?),
            MergedKind::Enum(unified) => {
                let raw = match &value {
                    Value::Enum(literal) => literal.clone(),
                    Value::Str(literal) => literal.clone(),
                    _ => {
                        return Err(AdapterError::ValueShape {
                            property: name.to_string(),
                            expected: "enumeration constant",
                        });
                    }
                };
                Ok(Value::Enum(unified.value_of_name(&raw)?.display.clone()))
            }
            MergedKind::Branch(nested) => {
                // Scalars are storable under a branch only through its
                // expansion.
                let compound = &self.cx.compounds()[*nested];
                let Some(expansion) = compound.expansion else {
                    return Err(AdapterError::NoExpansion {
                        compound: compound.name.clone(),
                    });
                };
                let slot_kind = self.cx.compounds()[expansion]
                    .leaf_value()
                    .map(|slot| slot.kind.clone());
                match slot_kind {
                    Some(MergedKind::Scalar(common)) => Ok(resolve::widen(&value, common)?),
                    Some(MergedKind::Enum(unified)) => {
                        let raw = value.render();
                        Ok(Value::Enum(unified.value_of_name(&raw)?.display.clone()))
                    }
                    _ => Err(AdapterError::NoExpansion {
                        compound: compound.name.clone(),
                    }),
                }
            }
        }
    }
}
