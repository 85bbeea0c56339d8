/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`View`]: a named perspective on a [`Cas`], with its own Sofa and an
//! index of feature structures, bucketed per type and kept in position order.

use sealed::sealed;
use std::collections::{BTreeMap, HashSet};

use crate::cas::Cas;
use crate::featurestructure::{FeatureStructureHandle, SortKey};
use crate::store::*;
use crate::types::*;

/// The name of the view every [`Cas`] starts with
pub const INITIAL_VIEW: &str = "_InitialView";

/// An entry in a view index, the sort key is computed once when the entry is added.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct IndexEntry {
    pub(crate) key: SortKey,
    pub(crate) handle: FeatureStructureHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewHandle(u16);

#[sealed]
impl Handle for ViewHandle {
    fn new(intid: usize) -> Self {
        Self(intid as u16)
    }
    fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// A view owns a Sofa (by handle, the record itself lives in the [`Cas`]) and an index.
/// The index maps the exact type name of each member to the members of that type, ordered by `(begin, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    intid: Option<ViewHandle>,
    pub(crate) name: String,
    pub(crate) sofa: FeatureStructureHandle,
    pub(crate) index: BTreeMap<String, Vec<IndexEntry>>,
    members: HashSet<FeatureStructureHandle>,
}

#[sealed]
impl TypeInfo for View {
    fn typeinfo() -> Type {
        Type::View
    }
}

#[sealed]
impl Storable for View {
    type HandleType = ViewHandle;
    type StoreType = Cas;

    fn handle(&self) -> Option<ViewHandle> {
        self.intid
    }
    fn set_handle(&mut self, handle: ViewHandle) {
        self.intid = Some(handle);
    }
}

impl View {
    pub(crate) fn new(name: impl Into<String>, sofa: FeatureStructureHandle) -> Self {
        Self {
            intid: None,
            name: name.into(),
            sofa,
            index: BTreeMap::new(),
            members: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the handle of the Sofa record of this view
    pub fn sofa_handle(&self) -> FeatureStructureHandle {
        self.sofa
    }

    /// Adds a feature structure to the bucket of its type. Entries with an equal key keep their insertion order.
    /// Returns false if the structure was already indexed in this view.
    pub(crate) fn add(
        &mut self,
        typename: &str,
        key: SortKey,
        handle: FeatureStructureHandle,
    ) -> bool {
        if !self.members.insert(handle) {
            return false;
        }
        let bucket = self.index.entry(typename.to_string()).or_default();
        let pos = bucket.partition_point(|entry| entry.key <= key);
        bucket.insert(pos, IndexEntry { key, handle });
        true
    }

    /// Removes a feature structure from the bucket of its type, returns true if it was present.
    pub(crate) fn remove(&mut self, typename: &str, handle: FeatureStructureHandle) -> bool {
        if !self.members.remove(&handle) {
            return false;
        }
        if let Some(bucket) = self.index.get_mut(typename) {
            bucket.retain(|entry| entry.handle != handle);
            if bucket.is_empty() {
                self.index.remove(typename);
            }
        }
        true
    }

    /// Is the feature structure in this view's index?
    pub fn contains(&self, handle: FeatureStructureHandle) -> bool {
        self.members.contains(&handle)
    }

    pub(crate) fn bucket(&self, typename: &str) -> &[IndexEntry] {
        self.index
            .get(typename)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    /// Iterates over the handles of all indexed feature structures. Buckets are visited in alphabetical
    /// order of their type name, entries within a bucket in index order.
    pub fn all(&self) -> impl Iterator<Item = FeatureStructureHandle> + '_ {
        self.index
            .values()
            .flat_map(|bucket| bucket.iter().map(|entry| entry.handle))
    }

    /// Returns the names of all types that have at least one indexed feature structure
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(|name| name.as_str())
    }

    /// Returns the number of indexed feature structures
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
