/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`FeatureStructure`], a typed record holding a mapping from feature names
//! to [`FeatureValue`]s, and the [`FeatureStructureBuilder`] used to construct one.

use sealed::sealed;
use std::collections::BTreeMap;
use std::fmt;

use crate::cas::Cas;
use crate::store::*;
use crate::typesystem::{FEATURE_BASE_NAME_BEGIN, FEATURE_BASE_NAME_END};
use crate::types::*;

/// The public identifier of a feature structure, unique within a [`Cas`] (not just within a view).
/// This is the identifier that ends up in the serialised output.
pub type FsId = u64;

/// Ordering key of a feature structure in a view index
pub(crate) type SortKey = (i64, i64);

/// The key assigned to structures without a span, they sort after all positional ones.
pub(crate) const SORTKEY_NONPOSITIONAL: SortKey = (i64::MAX, i64::MAX);

/// A value of a feature. A feature that is not set (or set to [`FeatureValue::Null`]) is considered absent.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    ///No value
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),

    /// An ordered sequence of primitive values
    List(Vec<FeatureValue>),

    /// Raw bytes, the payload of a byte array
    Bytes(Vec<u8>),

    /// A reference to another feature structure
    Reference(FeatureStructureHandle),

    /// An ordered sequence of references to other feature structures
    References(Vec<FeatureStructureHandle>),
}

impl FeatureValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<FeatureStructureHandle> {
        match self {
            Self::Reference(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_references(&self) -> Option<&[FeatureStructureHandle]> {
        match self {
            Self::References(handles) => Some(handles.as_slice()),
            _ => None,
        }
    }

    /// Returns all handles this value refers to
    pub(crate) fn references(&self) -> &[FeatureStructureHandle] {
        match self {
            Self::Reference(handle) => std::slice::from_ref(handle),
            Self::References(handles) => handles.as_slice(),
            _ => &[],
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, ""),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::List(v) => {
                let items: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "{}", items.join(", "))
            }
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Reference(handle) => write!(f, "-> {:?}", handle),
            Self::References(handles) => write!(f, "-> {:?}", handles),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(item: &str) -> Self {
        Self::String(item.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(item: String) -> Self {
        Self::String(item)
    }
}

impl From<bool> for FeatureValue {
    fn from(item: bool) -> Self {
        Self::Bool(item)
    }
}

impl From<f64> for FeatureValue {
    fn from(item: f64) -> Self {
        Self::Float(item)
    }
}

impl From<f32> for FeatureValue {
    fn from(item: f32) -> Self {
        Self::Float(item as f64)
    }
}

impl From<i64> for FeatureValue {
    fn from(item: i64) -> Self {
        Self::Int(item)
    }
}

impl From<i32> for FeatureValue {
    fn from(item: i32) -> Self {
        Self::Int(item as i64)
    }
}

impl From<usize> for FeatureValue {
    fn from(item: usize) -> Self {
        Self::Int(item as i64)
    }
}

impl From<u8> for FeatureValue {
    fn from(item: u8) -> Self {
        Self::Int(item as i64)
    }
}

impl From<Vec<u8>> for FeatureValue {
    fn from(item: Vec<u8>) -> Self {
        Self::Bytes(item)
    }
}

impl From<Vec<FeatureValue>> for FeatureValue {
    fn from(item: Vec<FeatureValue>) -> Self {
        Self::List(item)
    }
}

impl From<FeatureStructureHandle> for FeatureValue {
    fn from(item: FeatureStructureHandle) -> Self {
        Self::Reference(item)
    }
}

impl From<Vec<FeatureStructureHandle>> for FeatureValue {
    fn from(item: Vec<FeatureStructureHandle>) -> Self {
        Self::References(item)
    }
}

impl<T> From<Option<T>> for FeatureValue
where
    T: Into<FeatureValue>,
{
    fn from(item: Option<T>) -> Self {
        match item {
            Some(item) => item.into(),
            None => Self::Null,
        }
    }
}

impl PartialEq<str> for FeatureValue {
    fn eq(&self, other: &str) -> bool {
        matches!(self, Self::String(v) if v.as_str() == other)
    }
}

impl PartialEq<&str> for FeatureValue {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Self::String(v) if v.as_str() == *other)
    }
}

impl PartialEq<i64> for FeatureValue {
    fn eq(&self, other: &i64) -> bool {
        matches!(self, Self::Int(v) if v == other)
    }
}

impl PartialEq<bool> for FeatureValue {
    fn eq(&self, other: &bool) -> bool {
        matches!(self, Self::Bool(v) if v == other)
    }
}

impl PartialEq<f64> for FeatureValue {
    fn eq(&self, other: &f64) -> bool {
        matches!(self, Self::Float(v) if v == other)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureStructureHandle(u32);

#[sealed]
impl Handle for FeatureStructureHandle {
    fn new(intid: usize) -> Self {
        Self(intid as u32)
    }
    fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// A feature structure is a record of a certain type (by name, as declared in the type system),
/// with an identifier unique in the [`Cas`] and values for some of its features.
/// It is owned by the [`Cas`], and referenced from views and other feature structures by its [`FeatureStructureHandle`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStructure {
    ///Internal numeric ID, corresponds with the index in the Cas's store. May be unbound (None) only during creation.
    intid: Option<FeatureStructureHandle>,

    /// Public identifier
    pub(crate) id: FsId,

    pub(crate) typename: String,

    pub(crate) features: BTreeMap<String, FeatureValue>,
}

#[sealed]
impl TypeInfo for FeatureStructure {
    fn typeinfo() -> Type {
        Type::FeatureStructure
    }
}

#[sealed]
impl Storable for FeatureStructure {
    type HandleType = FeatureStructureHandle;
    type StoreType = Cas;

    fn handle(&self) -> Option<FeatureStructureHandle> {
        self.intid
    }
    fn set_handle(&mut self, handle: FeatureStructureHandle) {
        self.intid = Some(handle);
    }
}

impl FeatureStructure {
    pub(crate) fn new(
        id: FsId,
        typename: impl Into<String>,
        features: BTreeMap<String, FeatureValue>,
    ) -> Self {
        Self {
            intid: None,
            id,
            typename: typename.into(),
            features,
        }
    }

    /// Returns the public identifier
    pub fn id(&self) -> FsId {
        self.id
    }

    /// Returns the name of the type of this structure
    pub fn typename(&self) -> &str {
        self.typename.as_str()
    }

    /// Returns the value of a feature, or None if it is not set.
    pub fn get(&self, feature: &str) -> Option<&FeatureValue> {
        match self.features.get(feature) {
            Some(FeatureValue::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    /// Iterate over all features that are set, in alphabetical order.
    pub fn features(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.features
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn begin(&self) -> Option<i64> {
        self.get(FEATURE_BASE_NAME_BEGIN).and_then(|v| v.as_int())
    }

    pub fn end(&self) -> Option<i64> {
        self.get(FEATURE_BASE_NAME_END).and_then(|v| v.as_int())
    }

    /// Returns the `(begin, end)` span, only if both are set
    pub fn span(&self) -> Option<(i64, i64)> {
        Some((self.begin()?, self.end()?))
    }

    pub(crate) fn sort_key(&self) -> SortKey {
        self.span().unwrap_or(SORTKEY_NONPOSITIONAL)
    }

    pub(crate) fn set(&mut self, feature: impl Into<String>, value: FeatureValue) {
        self.features.insert(feature.into(), value);
    }
}

/// Builder for [`FeatureStructure`], pass it to [`Cas::add_annotation()`] or [`Cas::create_fs()`].
///
/// ```
/// # use cas::*;
/// let builder = FeatureStructureBuilder::new("uima.tcas.Annotation")
///     .with_span(0, 5)
///     .with_feature("label", "greeting");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStructureBuilder {
    pub(crate) typename: String,
    pub(crate) id: Option<FsId>,
    pub(crate) features: BTreeMap<String, FeatureValue>,
}

impl FeatureStructureBuilder {
    pub fn new(typename: impl Into<String>) -> Self {
        Self {
            typename: typename.into(),
            id: None,
            features: BTreeMap::new(),
        }
    }

    /// Request a specific public identifier. Only honoured by [`Cas::create_fs()`]; adding to an index assigns a fresh one.
    pub fn with_id(mut self, id: FsId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.features.insert(name.into(), value.into());
        self
    }

    /// Sets both `begin` and `end`
    pub fn with_span(self, begin: i64, end: i64) -> Self {
        self.with_feature(FEATURE_BASE_NAME_BEGIN, begin)
            .with_feature(FEATURE_BASE_NAME_END, end)
    }

    pub fn with_reference(self, name: impl Into<String>, handle: FeatureStructureHandle) -> Self {
        self.with_feature(name, FeatureValue::Reference(handle))
    }

    pub fn typename(&self) -> &str {
        self.typename.as_str()
    }
}
