/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`Cas`], the root structure that owns all views and feature structures of a document,
//! and [`CasView`]/[`CasViewMut`], which give access to one view of it.

use sealed::sealed;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::{Config, Configurable};
use crate::error::CasError;
use crate::featurestructure::*;
use crate::idgen::IdGenerator;
use crate::sofa::Sofa;
use crate::store::*;
use crate::types::*;
use crate::typesystem::*;
use crate::view::{View, ViewHandle, INITIAL_VIEW};

/// A Common Analysis Structure: one document with one or more named views.
///
/// The `Cas` owns every feature structure, including the Sofa record of each view,
/// and hands out [`FeatureStructureHandle`]s to refer to them. All views share the
/// feature structures and the identifier generators; obtaining a view with
/// [`Cas::get_view()`] or [`Cas::get_view_mut()`] never copies any state.
///
/// Operations on the `Cas` itself act on the default view (`_InitialView`), the `*_in()` variants
/// take an explicit [`ViewHandle`].
pub struct Cas {
    typesystem: SharedTypeSystem,

    /// Views, the first one is always the initial view
    pub(crate) views: Store<View>,
    pub(crate) view_idmap: HashMap<String, ViewHandle>,

    /// All feature structures in the document, indexed or not
    pub(crate) featurestructures: Store<FeatureStructure>,
    /// Maps public identifiers to internal handles
    pub(crate) fs_idmap: HashMap<FsId, FeatureStructureHandle>,

    pub(crate) id_generator: IdGenerator,
    pub(crate) sofanum_generator: IdGenerator,

    pub(crate) current_view: ViewHandle,

    config: Config,
}

#[sealed]
impl TypeInfo for Cas {
    fn typeinfo() -> Type {
        Type::Cas
    }
}

impl Configurable for Cas {
    fn config(&self) -> &Config {
        &self.config
    }

    fn set_config(&mut self, config: Config) -> &mut Self {
        self.config = config;
        self
    }
}

#[sealed]
impl StoreFor<FeatureStructure> for Cas {
    fn store(&self) -> &Store<FeatureStructure> {
        &self.featurestructures
    }
    fn store_mut(&mut self) -> &mut Store<FeatureStructure> {
        &mut self.featurestructures
    }
    fn store_typeinfo() -> &'static str {
        "FeatureStructure in Cas"
    }

    fn preinsert(&self, item: &mut FeatureStructure) -> Result<(), CasError> {
        if self.fs_idmap.contains_key(&item.id) {
            return Err(CasError::DuplicateId(item.id, "when inserting feature structure"));
        }
        Ok(())
    }

    fn inserted(&mut self, handle: FeatureStructureHandle) -> Result<(), CasError> {
        let id = {
            let fs: &FeatureStructure = self.get(handle)?;
            fs.id
        };
        self.fs_idmap.insert(id, handle);
        Ok(())
    }
}

#[sealed]
impl StoreFor<View> for Cas {
    fn store(&self) -> &Store<View> {
        &self.views
    }
    fn store_mut(&mut self) -> &mut Store<View> {
        &mut self.views
    }
    fn store_typeinfo() -> &'static str {
        "View in Cas"
    }

    fn preinsert(&self, item: &mut View) -> Result<(), CasError> {
        if self.view_idmap.contains_key(item.name()) {
            return Err(CasError::DuplicateView(item.name().to_string()));
        }
        Ok(())
    }

    fn inserted(&mut self, handle: ViewHandle) -> Result<(), CasError> {
        let name = {
            let view: &View = self.get(handle)?;
            view.name.clone()
        };
        self.view_idmap.insert(name, handle);
        Ok(())
    }
}

impl Default for Cas {
    /// Creates an empty document with a type system holding only the builtin types
    fn default() -> Self {
        Self::new(Arc::new(TypeSystem::default()))
    }
}

const INITIAL_SOFA_ID: FsId = 1;
const INITIAL_SOFANUM: u64 = 1;

/// Builds the features of a Sofa record
fn sofa_features(name: &str, sofanum: i64) -> BTreeMap<String, FeatureValue> {
    let mut features = BTreeMap::new();
    features.insert(
        FEATURE_BASE_NAME_SOFANUM.to_string(),
        FeatureValue::Int(sofanum),
    );
    features.insert(FEATURE_BASE_NAME_SOFAID.to_string(), FeatureValue::from(name));
    features
}

impl Cas {
    /// Creates an empty document for the given type system, with only the initial view.
    pub fn new(typesystem: SharedTypeSystem) -> Self {
        let sofa_handle = FeatureStructureHandle::new(0);
        let mut sofa = FeatureStructure::new(
            INITIAL_SOFA_ID,
            TYPE_NAME_SOFA,
            sofa_features(INITIAL_VIEW, INITIAL_SOFANUM as i64),
        );
        sofa.set_handle(sofa_handle);

        let view_handle = ViewHandle::new(0);
        let mut view = View::new(INITIAL_VIEW, sofa_handle);
        view.set_handle(view_handle);

        let mut fs_idmap = HashMap::new();
        fs_idmap.insert(sofa.id, sofa_handle);
        let mut view_idmap = HashMap::new();
        view_idmap.insert(INITIAL_VIEW.to_string(), view_handle);

        Self {
            typesystem,
            views: vec![Some(view)],
            view_idmap,
            featurestructures: vec![Some(sofa)],
            fs_idmap,
            id_generator: IdGenerator::new(INITIAL_SOFA_ID + 1),
            sofanum_generator: IdGenerator::new(INITIAL_SOFANUM + 1),
            current_view: view_handle,
            config: Config::default(),
        }
    }

    /// Returns the type system this document uses
    pub fn typesystem(&self) -> &SharedTypeSystem {
        &self.typesystem
    }

    // ------------------------------------ VIEWS ------------------------------------------

    /// Registers a new view along with its Sofa. Identifier and sofa number are allocated if not given.
    pub(crate) fn add_view(
        &mut self,
        name: &str,
        id: Option<FsId>,
        sofanum: Option<i64>,
    ) -> Result<ViewHandle, CasError> {
        if self.view_idmap.contains_key(name) {
            return Err(CasError::DuplicateView(name.to_string()));
        }
        if let Some(id) = id {
            if self.fs_idmap.contains_key(&id) {
                return Err(CasError::DuplicateId(id, "Sofa of new view"));
            }
        }
        let id = match id {
            Some(id) => id,
            None => self.id_generator.generate_id()?,
        };
        let sofanum = match sofanum {
            Some(sofanum) => sofanum,
            None => self.sofanum_generator.generate_id()? as i64,
        };
        let sofa = self.insert(FeatureStructure::new(
            id,
            TYPE_NAME_SOFA,
            sofa_features(name, sofanum),
        ))?;
        let view = self.insert(View::new(name, sofa))?;
        debug(self.config(), || {
            format!(
                "Cas.add_view: {} (sofa id={}, sofanum={})",
                name, id, sofanum
            )
        });
        Ok(view)
    }

    /// Creates a new view with the given name, along with a new Sofa for it.
    /// Fails with [`CasError::DuplicateView`] if a view with this name already exists.
    pub fn create_view(&mut self, name: &str) -> Result<CasViewMut<'_>, CasError> {
        let view = self.add_view(name, None, None)?;
        Ok(CasViewMut { cas: self, view })
    }

    /// Returns the handle of the view with the given name
    pub fn view_handle(&self, name: &str) -> Result<ViewHandle, CasError> {
        self.view_idmap
            .get(name)
            .copied()
            .ok_or_else(|| CasError::ViewNotFound(name.to_string()))
    }

    /// Returns a read-only view on this document. This borrows the document, nothing is copied.
    pub fn get_view(&self, name: &str) -> Result<CasView<'_>, CasError> {
        let view = self.view_handle(name)?;
        Ok(CasView { cas: self, view })
    }

    /// Returns a view on this document through which it can be modified.
    /// All changes are made to the document itself.
    pub fn get_view_mut(&mut self, name: &str) -> Result<CasViewMut<'_>, CasError> {
        let view = self.view_handle(name)?;
        Ok(CasViewMut { cas: self, view })
    }

    /// Returns the handle of the view that operations without explicit view act upon (the initial view)
    pub fn current_view(&self) -> ViewHandle {
        self.current_view
    }

    pub fn view(&self, handle: ViewHandle) -> Result<ResultItem<'_, View>, CasError> {
        let view: &View = self.get(handle)?;
        Ok(view.as_resultitem(self))
    }

    /// Iterates over all views, starting with the initial one
    pub fn views(&self) -> StoreIter<'_, View> {
        <Self as StoreFor<View>>::iter(self)
    }

    /// Returns the number of views
    pub fn views_len(&self) -> usize {
        self.view_idmap.len()
    }

    // ------------------------------------ SOFAS ------------------------------------------

    /// Returns the Sofa of the initial view
    pub fn sofa(&self) -> Result<Sofa<'_>, CasError> {
        self.sofa_in(self.current_view)
    }

    pub fn sofa_in(&self, view: ViewHandle) -> Result<Sofa<'_>, CasError> {
        let view: &View = self.get(view)?;
        Ok(Sofa::new(self.featurestructure(view.sofa)?))
    }

    /// Iterates over the Sofas of all views
    pub fn sofas(&self) -> impl Iterator<Item = Sofa<'_>> {
        self.views()
            .filter_map(move |view| self.featurestructure(view.sofa).ok())
            .map(Sofa::new)
    }

    fn set_sofa_feature(
        &mut self,
        view: ViewHandle,
        name: &str,
        value: FeatureValue,
    ) -> Result<(), CasError> {
        let sofa = {
            let view: &View = self.get(view)?;
            view.sofa
        };
        debug(self.config(), || {
            format!("Cas.set_sofa_feature: {:?} {}={}", view, name, value)
        });
        let sofa: &mut FeatureStructure = self.get_mut(sofa)?;
        sofa.set(name, value);
        Ok(())
    }

    /// Sets the text of the initial view
    pub fn set_sofa_string(&mut self, text: impl Into<String>) -> Result<(), CasError> {
        self.set_sofa_string_in(self.current_view, text)
    }

    pub fn set_sofa_string_in(
        &mut self,
        view: ViewHandle,
        text: impl Into<String>,
    ) -> Result<(), CasError> {
        self.set_sofa_feature(view, FEATURE_BASE_NAME_SOFASTRING, FeatureValue::String(text.into()))
    }

    /// Sets the mime type of the initial view
    pub fn set_sofa_mime(&mut self, mime: impl Into<String>) -> Result<(), CasError> {
        self.set_sofa_mime_in(self.current_view, mime)
    }

    pub fn set_sofa_mime_in(
        &mut self,
        view: ViewHandle,
        mime: impl Into<String>,
    ) -> Result<(), CasError> {
        self.set_sofa_feature(view, FEATURE_BASE_NAME_SOFAMIME, FeatureValue::String(mime.into()))
    }

    /// Sets the URI of external data for the initial view
    pub fn set_sofa_uri(&mut self, uri: impl Into<String>) -> Result<(), CasError> {
        self.set_sofa_uri_in(self.current_view, uri)
    }

    pub fn set_sofa_uri_in(
        &mut self,
        view: ViewHandle,
        uri: impl Into<String>,
    ) -> Result<(), CasError> {
        self.set_sofa_feature(view, FEATURE_BASE_NAME_SOFAURI, FeatureValue::String(uri.into()))
    }

    /// Associates an array feature structure holding non-textual data with the Sofa of the initial view
    pub fn set_sofa_array(&mut self, array: FeatureStructureHandle) -> Result<(), CasError> {
        self.set_sofa_array_in(self.current_view, array)
    }

    pub fn set_sofa_array_in(
        &mut self,
        view: ViewHandle,
        array: FeatureStructureHandle,
    ) -> Result<(), CasError> {
        if !<Self as StoreFor<FeatureStructure>>::has(self, array) {
            return Err(CasError::HandleError("array passed to Cas::set_sofa_array"));
        }
        self.set_sofa_feature(view, FEATURE_BASE_NAME_SOFAARRAY, FeatureValue::Reference(array))
    }

    // ------------------------------------ FEATURE STRUCTURES ------------------------------------------

    fn check_type(&self, typename: &str) -> Result<(), CasError> {
        if self.typesystem.get_type(typename).is_none() {
            return Err(CasError::TypeNotFound(
                typename.to_string(),
                "when creating feature structure",
            ));
        }
        Ok(())
    }

    /// Creates a feature structure without adding it to any index. It gets a fresh identifier,
    /// unless the builder requests one explicitly.
    pub fn create_fs(
        &mut self,
        builder: FeatureStructureBuilder,
    ) -> Result<FeatureStructureHandle, CasError> {
        self.check_type(&builder.typename)?;
        let id = if let Some(id) = builder.id {
            if self.fs_idmap.contains_key(&id) {
                return Err(CasError::DuplicateId(id, "passed to Cas::create_fs"));
            }
            self.id_generator.skip_past(id)?;
            id
        } else {
            self.id_generator.generate_id()?
        };
        self.insert(FeatureStructure::new(id, builder.typename, builder.features))
    }

    /// Inserts an already constructed feature structure (used by the deserialiser, which assigns identifiers itself)
    pub(crate) fn insert_fs(
        &mut self,
        fs: FeatureStructure,
    ) -> Result<FeatureStructureHandle, CasError> {
        self.insert(fs)
    }

    /// Creates a feature structure with a fresh identifier and adds it to the index of the initial view.
    /// If its type has a `sofa` feature, it is set to the Sofa of the view, overriding any given value.
    pub fn add_annotation(
        &mut self,
        builder: FeatureStructureBuilder,
    ) -> Result<FeatureStructureHandle, CasError> {
        self.add_annotation_in(self.current_view, builder)
    }

    pub fn add_annotation_in(
        &mut self,
        view: ViewHandle,
        builder: FeatureStructureBuilder,
    ) -> Result<FeatureStructureHandle, CasError> {
        self.check_type(&builder.typename)?;
        //make sure the view exists before consuming an identifier
        let _: &View = self.get(view)?;
        let id = self.id_generator.generate_id()?;
        let handle = self.insert(FeatureStructure::new(id, builder.typename, builder.features))?;
        self.index_in(view, handle)?;
        Ok(handle)
    }

    /// Adds multiple annotations to the initial view, see [`Self::add_annotation()`]
    pub fn add_annotations(
        &mut self,
        builders: impl IntoIterator<Item = FeatureStructureBuilder>,
    ) -> Result<Vec<FeatureStructureHandle>, CasError> {
        self.add_annotations_in(self.current_view, builders)
    }

    pub fn add_annotations_in(
        &mut self,
        view: ViewHandle,
        builders: impl IntoIterator<Item = FeatureStructureBuilder>,
    ) -> Result<Vec<FeatureStructureHandle>, CasError> {
        builders
            .into_iter()
            .map(|builder| self.add_annotation_in(view, builder))
            .collect()
    }

    /// Adds an existing feature structure to the index of the initial view.
    /// Unless `keep_id` is set, the structure gets a fresh identifier.
    pub fn add_to_index(
        &mut self,
        handle: FeatureStructureHandle,
        keep_id: bool,
    ) -> Result<(), CasError> {
        self.add_to_index_in(self.current_view, handle, keep_id)
    }

    pub fn add_to_index_in(
        &mut self,
        view: ViewHandle,
        handle: FeatureStructureHandle,
        keep_id: bool,
    ) -> Result<(), CasError> {
        if !keep_id {
            let new_id = self.id_generator.generate_id()?;
            let fs: &mut FeatureStructure = self.get_mut(handle)?;
            let old_id = fs.id;
            fs.id = new_id;
            self.fs_idmap.remove(&old_id);
            self.fs_idmap.insert(new_id, handle);
        }
        self.index_in(view, handle)
    }

    /// Puts the feature structure in the view index and sets its `sofa` feature (if the type has one) to the Sofa of the view
    fn index_in(
        &mut self,
        view: ViewHandle,
        handle: FeatureStructureHandle,
    ) -> Result<(), CasError> {
        let sofa = {
            let view: &View = self.get(view)?;
            view.sofa
        };
        let (typename, key) = {
            let fs: &FeatureStructure = self.get(handle)?;
            (fs.typename.clone(), fs.sort_key())
        };
        let has_sofa_feature = self
            .typesystem
            .all_features(&typename)?
            .iter()
            .any(|feature| feature.name() == FEATURE_BASE_NAME_SOFA);
        if has_sofa_feature {
            //a structure belongs to the Sofa of the view it was last indexed in
            let fs: &mut FeatureStructure = self.get_mut(handle)?;
            fs.set(FEATURE_BASE_NAME_SOFA, FeatureValue::Reference(sofa));
        }
        let view_mut: &mut View = self.get_mut(view)?;
        let added = view_mut.add(&typename, key, handle);
        debug(self.config(), || {
            format!(
                "Cas.index_in: {:?} {:?} type={} key={:?} added={}",
                view, handle, typename, key, added
            )
        });
        Ok(())
    }

    /// Sets the value of a feature. Changing `begin` or `end` repositions the structure in every view that indexes it.
    pub fn set_feature(
        &mut self,
        handle: FeatureStructureHandle,
        name: &str,
        value: impl Into<FeatureValue>,
    ) -> Result<(), CasError> {
        let fs: &mut FeatureStructure = self.get_mut(handle)?;
        let old_key = fs.sort_key();
        fs.set(name, value.into());
        let new_key = fs.sort_key();
        if old_key != new_key {
            let typename = fs.typename.clone();
            for view in self.views.iter_mut().flatten() {
                if view.remove(&typename, handle) {
                    view.add(&typename, new_key, handle);
                }
            }
            debug(self.config(), || {
                format!(
                    "Cas.set_feature: {:?} moved from {:?} to {:?}",
                    handle, old_key, new_key
                )
            });
        }
        Ok(())
    }

    /// Returns a feature structure by handle
    pub fn featurestructure(
        &self,
        handle: FeatureStructureHandle,
    ) -> Result<ResultItem<'_, FeatureStructure>, CasError> {
        let fs: &FeatureStructure = self.get(handle)?;
        Ok(fs.as_resultitem(self))
    }

    /// Returns a feature structure by its public identifier
    pub fn featurestructure_by_id(
        &self,
        id: FsId,
    ) -> Result<ResultItem<'_, FeatureStructure>, CasError> {
        let handle = self
            .resolve_id(id)
            .ok_or(CasError::IdNotFound(id, "Cas::featurestructure_by_id"))?;
        self.featurestructure(handle)
    }

    /// Translates a public identifier to a handle
    pub fn resolve_id(&self, id: FsId) -> Option<FeatureStructureHandle> {
        self.fs_idmap.get(&id).copied()
    }

    /// Iterates over all feature structures in the document, indexed or not, including the Sofa records.
    pub fn featurestructures(&self) -> StoreIter<'_, FeatureStructure> {
        <Self as StoreFor<FeatureStructure>>::iter(self)
    }

    /// Returns the number of feature structures in the document, including the Sofa records.
    pub fn featurestructures_len(&self) -> usize {
        self.fs_idmap.len()
    }

    /// Returns the identifier that will be assigned to the next new feature structure
    pub fn next_id(&self) -> FsId {
        self.id_generator.peek()
    }
}

/// A read-only view on a [`Cas`]. It borrows the document and only differs from it in which view it acts upon.
#[derive(Clone, Copy)]
pub struct CasView<'cas> {
    cas: &'cas Cas,
    view: ViewHandle,
}

impl<'cas> CasView<'cas> {
    pub fn handle(&self) -> ViewHandle {
        self.view
    }

    pub fn cas(&self) -> &'cas Cas {
        self.cas
    }

    pub fn name(&self) -> &'cas str {
        self.cas
            .view(self.view)
            .map(|view| view.as_ref().name())
            .unwrap_or("")
    }

    pub fn sofa(&self) -> Result<Sofa<'cas>, CasError> {
        self.cas.sofa_in(self.view)
    }

    /// Returns the number of feature structures in the index of this view
    pub fn len(&self) -> usize {
        self.cas
            .view(self.view)
            .map(|view| view.as_ref().len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A view on a [`Cas`] that allows modification. Every change is a change to the document.
pub struct CasViewMut<'cas> {
    cas: &'cas mut Cas,
    view: ViewHandle,
}

impl<'cas> CasViewMut<'cas> {
    pub fn handle(&self) -> ViewHandle {
        self.view
    }

    /// Returns a read-only view for the same view
    pub fn as_view(&self) -> CasView<'_> {
        CasView {
            cas: &*self.cas,
            view: self.view,
        }
    }

    pub fn cas_mut(&mut self) -> &mut Cas {
        &mut *self.cas
    }

    pub fn name(&self) -> &str {
        self.as_view().name()
    }

    pub fn sofa(&self) -> Result<Sofa<'_>, CasError> {
        self.cas.sofa_in(self.view)
    }

    pub fn add_annotation(
        &mut self,
        builder: FeatureStructureBuilder,
    ) -> Result<FeatureStructureHandle, CasError> {
        self.cas.add_annotation_in(self.view, builder)
    }

    pub fn add_annotations(
        &mut self,
        builders: impl IntoIterator<Item = FeatureStructureBuilder>,
    ) -> Result<Vec<FeatureStructureHandle>, CasError> {
        self.cas.add_annotations_in(self.view, builders)
    }

    pub fn add_to_index(
        &mut self,
        handle: FeatureStructureHandle,
        keep_id: bool,
    ) -> Result<(), CasError> {
        self.cas.add_to_index_in(self.view, handle, keep_id)
    }

    pub fn set_sofa_string(&mut self, text: impl Into<String>) -> Result<(), CasError> {
        self.cas.set_sofa_string_in(self.view, text)
    }

    pub fn set_sofa_mime(&mut self, mime: impl Into<String>) -> Result<(), CasError> {
        self.cas.set_sofa_mime_in(self.view, mime)
    }

    pub fn set_sofa_uri(&mut self, uri: impl Into<String>) -> Result<(), CasError> {
        self.cas.set_sofa_uri_in(self.view, uri)
    }

    pub fn set_sofa_array(&mut self, array: FeatureStructureHandle) -> Result<(), CasError> {
        self.cas.set_sofa_array_in(self.view, array)
    }
}
