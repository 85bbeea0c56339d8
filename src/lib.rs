/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! ## Introduction
//!
//! A CAS (Common Analysis Structure) is the document model used by UIMA-based text analytics and NLP pipelines.
//! A document exposes one or more named *views*, each with its own Subject of Analysis (*Sofa*): a text,
//! its mime type or a URI to external data. Analysis results are stored as typed *feature structures*,
//! records whose type is declared in a type system. Annotations are feature structures anchored to a
//! `[begin, end)` span of the text of their view.
//!
//! **What can you do with this library?**
//!
//! * Build a document with multiple views and add feature structures to the index of a view
//! * Select feature structures by type (including subtypes), in position order
//! * Select the annotations covered by, or covering, another annotation
//! * Read and write the interoperable UIMA CAS JSON format, including forward references and byte arrays
//!
//! High-level API:
//! * [`Cas`]
//! * [`CasView`] and [`CasViewMut`]
//! * [`ResultItem<FeatureStructure>`](struct.ResultItem.html#impl-ResultItem<'store,+FeatureStructure>)
//! * [`Sofa`]
//! * [`FeatureStructuresIter`] - iterator
//! * [`load_cas_from_json()`]
//!
//! Low-level API:
//! * [`FeatureStructure`]
//! * [`FeatureValue`]
//! * [`View`]
//! * [`TypeSystem`] and [`TypeSystemView`]

mod cas;
mod config;
mod error;
mod featurestructure;
mod file;
mod idgen;
mod json;
mod query;
mod sofa;
mod store;
mod types;
mod typesystem;
mod view;

// Our internal crate structure is not very relevant to the outside world,
// expose all structs and traits in the root namespace, and be explicit about it:

pub use cas::{Cas, CasView, CasViewMut};
pub use config::{Config, Configurable};
pub use error::CasError;
pub use featurestructure::{
    FeatureStructure, FeatureStructureBuilder, FeatureStructureHandle, FeatureValue, FsId,
};
pub use idgen::IdGenerator;
pub use json::{load_cas_from_json, FromJson, JsonSource, ToJson};
pub use query::FeatureStructuresIter;
pub use sofa::Sofa;
pub use store::{Handle, ResultItem, Storable, Store, StoreFor, StoreIter};
pub use types::*;
pub use typesystem::{
    FeatureDescription, SharedTypeSystem, TypeDescription, TypeSystem, TypeSystemView,
};
pub use view::{View, ViewHandle, INITIAL_VIEW};

/// Names of the builtin types and features, and the reserved keys of the JSON format
pub mod constants {
    pub use crate::json::{
        ELEMENTS_FIELD, FEATURE_STRUCTURES_FIELD, ID_FIELD, REF_FEATURE_PREFIX, TYPES_FIELD,
        TYPE_FIELD, VIEWS_FIELD, VIEW_INDEX_FIELD, VIEW_SOFA_FIELD,
    };
    pub use crate::typesystem::{
        FEATURE_BASE_NAME_BEGIN, FEATURE_BASE_NAME_ELEMENTS, FEATURE_BASE_NAME_END,
        FEATURE_BASE_NAME_LANGUAGE, FEATURE_BASE_NAME_SOFA, FEATURE_BASE_NAME_SOFAARRAY,
        FEATURE_BASE_NAME_SOFAID, FEATURE_BASE_NAME_SOFAMIME, FEATURE_BASE_NAME_SOFANUM,
        FEATURE_BASE_NAME_SOFASTRING, FEATURE_BASE_NAME_SOFAURI, TYPE_NAME_ANNOTATION,
        TYPE_NAME_ANNOTATION_BASE, TYPE_NAME_ARRAY_BASE, TYPE_NAME_BOOLEAN,
        TYPE_NAME_BOOLEAN_ARRAY, TYPE_NAME_BYTE, TYPE_NAME_BYTE_ARRAY,
        TYPE_NAME_DOCUMENT_ANNOTATION, TYPE_NAME_DOUBLE, TYPE_NAME_DOUBLE_ARRAY, TYPE_NAME_FLOAT,
        TYPE_NAME_FLOAT_ARRAY, TYPE_NAME_FS_ARRAY, TYPE_NAME_INTEGER, TYPE_NAME_INTEGER_ARRAY,
        TYPE_NAME_LONG, TYPE_NAME_LONG_ARRAY, TYPE_NAME_SHORT, TYPE_NAME_SHORT_ARRAY,
        TYPE_NAME_SOFA, TYPE_NAME_STRING, TYPE_NAME_STRING_ARRAY, TYPE_NAME_TOP,
    };
}
