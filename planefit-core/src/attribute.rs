//! Named per-point attributes
//!
//! A [`PointCloud`](crate::PointCloud) owns an [`AttributeRegistry`] that maps
//! attribute names to typed [`Attribute`] arrays. Every attribute holds exactly
//! one slot per point; a slot is either defined or undefined, so a missing
//! value is never confused with a zero value.

use crate::error::{Error, Result};
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the per-point normal attribute (`Vector3f`).
pub const NORMAL_ATTRIBUTE: &str = "normal";

/// Name of the per-point color attribute (`[u8; 3]`).
pub const COLOR_ATTRIBUTE: &str = "color";

/// Name of the per-point surface variation attribute (`f32`).
pub const CURVATURE_ATTRIBUTE: &str = "curvature";

/// Marker for types that can be stored in an attribute.
pub trait AttributeValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> AttributeValue for T {}

/// A fixed-size array of optional values, indexed by point handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<T> {
    values: Vec<Option<T>>,
}

impl<T: AttributeValue> Attribute<T> {
    /// Create an attribute for `len` points with every slot undefined
    pub fn undefined(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    /// Create a fully defined attribute from one value per point
    pub fn from_values(values: Vec<T>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    /// Number of slots (always the point count of the owning cloud)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for `index`, or `None` if undefined or out of range
    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Define the value for `index`, overwriting any previous value
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.values.len();
        let slot = self.values.get_mut(index).ok_or_else(|| {
            Error::InvalidInput(format!("point handle {index} out of range for {len} points"))
        })?;
        *slot = Some(value);
        Ok(())
    }

    pub fn is_defined(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Number of defined slots
    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// True when every slot holds a value
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    /// Iterate over all slots in point order
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        self.values.iter().map(Option::as_ref)
    }

    /// All values in point order, or `None` if any slot is undefined
    pub fn to_vec(&self) -> Option<Vec<T>> {
        self.values.iter().cloned().collect()
    }

    /// Mark every slot undefined
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = None);
    }
}

trait ErasedAttribute: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn ErasedAttribute>;
    fn value_type(&self) -> &'static str;
}

impl<T: AttributeValue> ErasedAttribute for Attribute<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn ErasedAttribute> {
        Box::new(self.clone())
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Registry of typed attributes for a fixed number of points
#[derive(Default)]
pub struct AttributeRegistry {
    point_count: usize,
    attributes: BTreeMap<String, Box<dyn ErasedAttribute>>,
}

impl AttributeRegistry {
    /// Create an empty registry for `point_count` points
    pub fn new(point_count: usize) -> Self {
        Self {
            point_count,
            attributes: BTreeMap::new(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Get the attribute `name`, creating it with all slots undefined if absent.
    ///
    /// Fails if `name` is already stored with a different value type.
    pub fn add<T: AttributeValue>(&mut self, name: &str) -> Result<&mut Attribute<T>> {
        if !self.attributes.contains_key(name) {
            self.attributes.insert(
                name.to_string(),
                Box::new(Attribute::<T>::undefined(self.point_count)),
            );
        }
        self.get_mut::<T>(name).ok_or_else(|| Error::AttributeTypeMismatch {
            name: name.to_string(),
        })
    }

    /// Insert a prebuilt attribute, replacing any attribute of the same name
    pub fn insert<T: AttributeValue>(&mut self, name: &str, attribute: Attribute<T>) -> Result<()> {
        if attribute.len() != self.point_count {
            return Err(Error::InvalidInput(format!(
                "attribute '{}' has {} slots, cloud has {} points",
                name,
                attribute.len(),
                self.point_count
            )));
        }
        self.attributes.insert(name.to_string(), Box::new(attribute));
        Ok(())
    }

    /// Typed lookup; `None` if absent or stored with another value type
    pub fn get<T: AttributeValue>(&self, name: &str) -> Option<&Attribute<T>> {
        self.attributes
            .get(name)
            .and_then(|a| a.as_any().downcast_ref::<Attribute<T>>())
    }

    pub fn get_mut<T: AttributeValue>(&mut self, name: &str) -> Option<&mut Attribute<T>> {
        self.attributes
            .get_mut(name)
            .and_then(|a| a.as_any_mut().downcast_mut::<Attribute<T>>())
    }

    /// Existence check independent of value type
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Remove `name`; returns whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        self.attributes.remove(name).is_some()
    }

    /// Attribute names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl Clone for AttributeRegistry {
    fn clone(&self) -> Self {
        Self {
            point_count: self.point_count,
            attributes: self
                .attributes
                .iter()
                .map(|(name, attr)| (name.clone(), attr.clone_box()))
                .collect(),
        }
    }
}

impl fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRegistry")
            .field("point_count", &self.point_count)
            .field(
                "attributes",
                &self
                    .attributes
                    .iter()
                    .map(|(name, attr)| (name.as_str(), attr.value_type()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
