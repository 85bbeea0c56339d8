/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains [`Sofa`], a read-only accessor for the Subject of Analysis of a view.
//! The Sofa record itself is an ordinary feature structure of type `uima.cas.Sofa` owned by the [`Cas`].

use crate::cas::Cas;
use crate::featurestructure::{FeatureStructure, FeatureStructureHandle, FsId};
use crate::store::*;
use crate::typesystem::{
    FEATURE_BASE_NAME_SOFAARRAY, FEATURE_BASE_NAME_SOFAID, FEATURE_BASE_NAME_SOFAMIME,
    FEATURE_BASE_NAME_SOFANUM, FEATURE_BASE_NAME_SOFASTRING, FEATURE_BASE_NAME_SOFAURI,
};

/// The Subject of Analysis of a view: the text (or other data) and its metadata.
#[derive(Clone, Copy, Debug)]
pub struct Sofa<'cas> {
    item: ResultItem<'cas, FeatureStructure>,
}

impl<'cas> Sofa<'cas> {
    pub(crate) fn new(item: ResultItem<'cas, FeatureStructure>) -> Self {
        Self { item }
    }

    /// The public identifier of the Sofa record
    pub fn id(&self) -> FsId {
        self.item.id()
    }

    pub fn handle(&self) -> FeatureStructureHandle {
        self.item.handle()
    }

    /// The sofa number, unique in the document
    pub fn sofanum(&self) -> i64 {
        self.item
            .get(FEATURE_BASE_NAME_SOFANUM)
            .and_then(|v| v.as_int())
            .unwrap_or(0)
    }

    /// The name of the Sofa, this equals the name of its view
    pub fn name(&self) -> &'cas str {
        self.str_feature(FEATURE_BASE_NAME_SOFAID).unwrap_or("")
    }

    /// The text of the view, if set
    pub fn string(&self) -> Option<&'cas str> {
        self.str_feature(FEATURE_BASE_NAME_SOFASTRING)
    }

    pub fn mime(&self) -> Option<&'cas str> {
        self.str_feature(FEATURE_BASE_NAME_SOFAMIME)
    }

    /// The URI of external data, if set
    pub fn uri(&self) -> Option<&'cas str> {
        self.str_feature(FEATURE_BASE_NAME_SOFAURI)
    }

    /// Returns the array feature structure that holds non-textual data, if set
    pub fn array(&self) -> Option<ResultItem<'cas, FeatureStructure>> {
        self.item
            .as_ref()
            .get(FEATURE_BASE_NAME_SOFAARRAY)
            .and_then(|v| v.as_reference())
            .and_then(|handle| self.item.store().featurestructure(handle).ok())
    }

    /// Returns the underlying feature structure
    pub fn as_featurestructure(&self) -> ResultItem<'cas, FeatureStructure> {
        self.item
    }

    pub fn cas(&self) -> &'cas Cas {
        self.item.store()
    }

    fn str_feature(&self, name: &str) -> Option<&'cas str> {
        self.item.as_ref().get(name).and_then(|v| v.as_str())
    }
}
