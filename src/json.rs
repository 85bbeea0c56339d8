/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`ToJson`] and [`FromJson`] traits and the (de)serialisation of a [`Cas`]
//! to and from the UIMA CAS JSON format.
//!
//! The format has three top-level sections: `%TYPES` (declarations of the non-builtin types in use),
//! `%VIEWS` (per view the identifier of its Sofa and the identifiers of its index members), and
//! `%FEATURE_STRUCTURES` (the records, either as an array or as a map keyed by identifier).
//! Features that refer to other feature structures are written with an `@` prefix and hold identifiers;
//! such references may point forward to records later in the stream.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::ser::{Error as SerError, SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;

use crate::cas::Cas;
use crate::config::{Config, Configurable};
use crate::error::CasError;
use crate::featurestructure::*;
use crate::file::*;
use crate::idgen::IdGenerator;
use crate::store::*;
use crate::types::*;
use crate::typesystem::*;
use crate::view::{ViewHandle, INITIAL_VIEW};

pub const RESERVED_FIELD_PREFIX: &str = "%";
pub const REF_FEATURE_PREFIX: &str = "@";
pub const TYPES_FIELD: &str = "%TYPES";
pub const VIEWS_FIELD: &str = "%VIEWS";
pub const FEATURE_STRUCTURES_FIELD: &str = "%FEATURE_STRUCTURES";
pub const VIEW_SOFA_FIELD: &str = "%SOFA";
pub const VIEW_INDEX_FIELD: &str = "%INDEX";
pub const ID_FIELD: &str = "%ID";
pub const TYPE_FIELD: &str = "%TYPE";
pub const ELEMENTS_FIELD: &str = "%ELEMENTS";
pub const NAME_FIELD: &str = "%NAME";
pub const SUPER_TYPE_FIELD: &str = "%SUPER_TYPE";
pub const RANGE_FIELD: &str = "%RANGE";
pub const ELEMENT_TYPE_FIELD: &str = "%ELEMENT_TYPE";
pub const MULTIPLE_REFERENCES_ALLOWED_FIELD: &str = "%MULTIPLE_REFERENCES_ALLOWED";

const FLOAT_NAN: &str = "NaN";
const FLOAT_POSITIVE_INFINITY: &str = "Infinity";
const FLOAT_NEGATIVE_INFINITY: &str = "-Infinity";

pub trait ToJson
where
    Self: TypeInfo + serde::Serialize,
{
    /// Writes a serialisation to any writer
    /// Lower-level function
    fn to_json_writer<W>(&self, writer: W, compact: bool) -> Result<(), CasError>
    where
        W: std::io::Write,
    {
        match compact {
            false => serde_json::to_writer_pretty(writer, &self).map_err(|e| {
                CasError::SerializationError(format!(
                    "Writing {} to file: {}",
                    Self::typeinfo(),
                    e
                ))
            }),
            true => serde_json::to_writer(writer, &self).map_err(|e| {
                CasError::SerializationError(format!(
                    "Writing {} to file: {}",
                    Self::typeinfo(),
                    e
                ))
            }),
        }
    }

    /// Writes this structure to a file, `-` writes to standard output
    fn to_json_file(&self, filename: &str, config: &Config) -> Result<(), CasError> {
        debug(config, || {
            format!("{}.to_json_file: filename={:?}", Self::typeinfo(), filename)
        });
        let mut writer = open_file_writer(filename, config)?;
        self.to_json_writer(&mut writer, config.compact())?;
        writer.flush().map_err(|e| {
            CasError::IOError(e, filename.to_string(), "Flushing output failed")
        })
    }

    /// Serializes this structure to one string.
    fn to_json_string(&self, config: &Config) -> Result<String, CasError> {
        match config.compact() {
            false => serde_json::to_string_pretty(&self).map_err(|e| {
                CasError::SerializationError(format!(
                    "Writing {} to string: {}",
                    Self::typeinfo(),
                    e
                ))
            }),
            true => serde_json::to_string(&self).map_err(|e| {
                CasError::SerializationError(format!(
                    "Writing {} to string: {}",
                    Self::typeinfo(),
                    e
                ))
            }),
        }
    }
}

pub trait FromJson
where
    Self: TypeInfo + Sized,
{
    fn from_json_file(
        filename: &str,
        typesystem: Option<SharedTypeSystem>,
        config: Config,
    ) -> Result<Self, CasError>;

    fn from_json_str(
        string: &str,
        typesystem: Option<SharedTypeSystem>,
        config: Config,
    ) -> Result<Self, CasError>;

    fn from_json_reader<R: Read>(
        reader: R,
        typesystem: Option<SharedTypeSystem>,
        config: Config,
    ) -> Result<Self, CasError>;
}

// ------------------------------------ SERIALISATION ------------------------------------------

impl ToJson for Cas {}

impl Serialize for Cas {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(Some(3))?;
        state.serialize_entry(TYPES_FIELD, &TypesSection { cas: self })?;
        state.serialize_entry(VIEWS_FIELD, &ViewsSection { cas: self })?;
        state.serialize_entry(
            FEATURE_STRUCTURES_FIELD,
            &FeatureStructuresSection { cas: self },
        )?;
        state.end()
    }
}

/// Declarations of all non-builtin types in use, and their non-builtin supertypes
struct TypesSection<'a> {
    cas: &'a Cas,
}

impl<'a> Serialize for TypesSection<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let typesystem = self.cas.typesystem();
        let mut types: BTreeMap<&str, &TypeDescription> = BTreeMap::new();
        for fs in self.cas.featurestructures() {
            let mut current = typesystem.get_type(fs.as_ref().typename());
            while let Some(typedescription) = current {
                if typesystem.is_builtin(typedescription.name())
                    || types
                        .insert(typedescription.name(), typedescription)
                        .is_some()
                {
                    break;
                }
                current = typedescription
                    .supertype()
                    .and_then(|supertype| typesystem.get_type(supertype));
            }
        }
        let mut state = serializer.serialize_map(Some(types.len()))?;
        for (name, typedescription) in types {
            state.serialize_entry(name, typedescription)?;
        }
        state.end()
    }
}

/// Summary of one view: the identifier of its Sofa and the sorted identifiers of its index members
#[derive(Serialize, Deserialize, Debug, Default)]
struct ViewJson {
    #[serde(
        rename = "%SOFA",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    sofa: Option<FsId>,

    #[serde(rename = "%INDEX", default)]
    index: Vec<FsId>,
}

struct ViewsSection<'a> {
    cas: &'a Cas,
}

impl<'a> Serialize for ViewsSection<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(Some(self.cas.views_len()))?;
        for view in self.cas.views() {
            let sofa = self
                .cas
                .featurestructure(view.sofa_handle())
                .map_err(|e| S::Error::custom(e))?;
            let mut index: Vec<FsId> = view
                .all()
                .filter_map(|handle| self.cas.featurestructure(handle).ok())
                .map(|fs| fs.id())
                .collect();
            index.sort_unstable();
            index.dedup();
            state.serialize_entry(
                view.name(),
                &ViewJson {
                    sofa: Some(sofa.id()),
                    index,
                },
            )?;
        }
        state.end()
    }
}

struct FeatureStructuresSection<'a> {
    cas: &'a Cas,
}

impl<'a> FeatureStructuresSection<'a> {
    /// Every view's Sofa (preceded by its array, if any) comes first, then all other structures sorted by identifier.
    fn order(&self) -> Vec<ResultItem<'a, FeatureStructure>> {
        let mut order = Vec::new();
        let mut emitted: HashSet<FeatureStructureHandle> = HashSet::new();
        for view in self.cas.views() {
            if let Ok(sofa) = self.cas.featurestructure(view.sofa_handle()) {
                if let Some(array) = sofa.reference(FEATURE_BASE_NAME_SOFAARRAY) {
                    if emitted.insert(array.handle()) {
                        order.push(array);
                    }
                }
                if emitted.insert(sofa.handle()) {
                    order.push(sofa);
                }
            }
        }
        let mut remainder: Vec<ResultItem<'a, FeatureStructure>> = self
            .cas
            .featurestructures()
            .filter(|fs| !emitted.contains(&fs.handle()))
            .collect();
        remainder.sort_unstable_by_key(|fs| fs.id());
        order.extend(remainder);
        order
    }
}

impl<'a> Serialize for FeatureStructuresSection<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let order = self.order();
        if self.cas.config().feature_structures_as_map() {
            let mut state = serializer.serialize_map(Some(order.len()))?;
            for fs in order {
                state.serialize_entry(
                    &fs.id().to_string(),
                    &FeatureStructureRecord { fs, with_id: false },
                )?;
            }
            state.end()
        } else {
            let mut state = serializer.serialize_seq(Some(order.len()))?;
            for fs in order {
                state.serialize_element(&FeatureStructureRecord { fs, with_id: true })?;
            }
            state.end()
        }
    }
}

/// A single feature structure as written in the `%FEATURE_STRUCTURES` section
struct FeatureStructureRecord<'a> {
    fs: ResultItem<'a, FeatureStructure>,
    with_id: bool,
}

impl<'a> FeatureStructureRecord<'a> {
    fn serialize_feature<M>(
        &self,
        state: &mut M,
        name: &str,
        range_type: Option<&str>,
        value: &FeatureValue,
    ) -> Result<(), M::Error>
    where
        M: SerializeMap,
    {
        let cas = self.fs.store();
        let typesystem = cas.typesystem();
        let typename = self.fs.as_ref().typename();
        if name == FEATURE_BASE_NAME_ELEMENTS && typesystem.is_array(typename) {
            match value {
                FeatureValue::Bytes(bytes) if typename == TYPE_NAME_BYTE_ARRAY => {
                    state.serialize_entry(ELEMENTS_FIELD, &STANDARD.encode(bytes))
                }
                _ => state.serialize_entry(ELEMENTS_FIELD, &WrappedValue { value, cas }),
            }
        } else {
            let is_reference = matches!(
                value,
                FeatureValue::Reference(_) | FeatureValue::References(_)
            ) && !range_type.is_some_and(|range_type| typesystem.is_primitive(range_type));
            if is_reference {
                state.serialize_entry(
                    &format!("{}{}", REF_FEATURE_PREFIX, name),
                    &WrappedValue { value, cas },
                )
            } else {
                state.serialize_entry(name, &WrappedValue { value, cas })
            }
        }
    }
}

impl<'a> Serialize for FeatureStructureRecord<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let fs = self.fs.as_ref();
        let typesystem = self.fs.store().typesystem();
        let mut state = serializer.serialize_map(None)?;
        if self.with_id {
            state.serialize_entry(ID_FIELD, &fs.id())?;
        }
        state.serialize_entry(TYPE_FIELD, fs.typename())?;
        //declared features come first, in declaration order (inherited ones first)
        let declared = typesystem.all_features(fs.typename()).unwrap_or_default();
        for feature in declared.iter() {
            if let Some(value) = fs.get(feature.name()) {
                self.serialize_feature(&mut state, feature.name(), Some(feature.range_type()), value)?;
            }
        }
        for (name, value) in fs.features() {
            if !declared.iter().any(|feature| feature.name() == name) {
                self.serialize_feature(&mut state, name, None, value)?;
            }
        }
        state.end()
    }
}

/// Serialises a [`FeatureValue`], references become identifiers
struct WrappedValue<'a> {
    value: &'a FeatureValue,
    cas: &'a Cas,
}

impl<'a> WrappedValue<'a> {
    fn id<E: SerError>(&self, handle: FeatureStructureHandle) -> Result<FsId, E> {
        self.cas
            .featurestructure(handle)
            .map(|fs| fs.id())
            .map_err(|e| E::custom(e))
    }
}

impl<'a> Serialize for WrappedValue<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.value {
            FeatureValue::Null => serializer.serialize_unit(),
            FeatureValue::Bool(value) => serializer.serialize_bool(*value),
            FeatureValue::Int(value) => serializer.serialize_i64(*value),
            FeatureValue::Float(value) => {
                if value.is_nan() {
                    serializer.serialize_str(FLOAT_NAN)
                } else if value.is_infinite() && value.is_sign_positive() {
                    serializer.serialize_str(FLOAT_POSITIVE_INFINITY)
                } else if value.is_infinite() {
                    serializer.serialize_str(FLOAT_NEGATIVE_INFINITY)
                } else {
                    serializer.serialize_f64(*value)
                }
            }
            FeatureValue::String(value) => serializer.serialize_str(value),
            FeatureValue::Bytes(value) => serializer.serialize_str(&STANDARD.encode(value)),
            FeatureValue::List(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values.iter() {
                    seq.serialize_element(&WrappedValue {
                        value,
                        cas: self.cas,
                    })?;
                }
                seq.end()
            }
            FeatureValue::Reference(handle) => {
                serializer.serialize_u64(self.id::<S::Error>(*handle)?)
            }
            FeatureValue::References(handles) => {
                let mut seq = serializer.serialize_seq(Some(handles.len()))?;
                for handle in handles.iter() {
                    seq.serialize_element(&self.id::<S::Error>(*handle)?)?;
                }
                seq.end()
            }
        }
    }
}

impl Cas {
    /// Serialises the document to JSON. If a destination is given the output is written there
    /// (`-` is standard output) and `None` is returned, otherwise the JSON is returned as a string.
    /// Remote URLs and empty destinations fail with [`CasError::InvalidDestination`].
    pub fn to_json(
        &self,
        destination: Option<&str>,
        pretty: bool,
    ) -> Result<Option<String>, CasError> {
        let config = self.config().clone().with_compact(!pretty);
        match destination {
            None => Ok(Some(self.to_json_string(&config)?)),
            Some(filename) => {
                self.to_json_file(filename, &config)?;
                Ok(None)
            }
        }
    }
}

// ------------------------------------ DESERIALISATION ------------------------------------------

/// Both forms of the `%FEATURE_STRUCTURES` section
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FeatureStructuresJson {
    List(Vec<serde_json::Map<String, serde_json::Value>>),
    Map(BTreeMap<String, serde_json::Map<String, serde_json::Value>>),
}

/// The raw top-level structure of a CAS JSON document
#[derive(Deserialize, Debug)]
struct CasJson {
    #[serde(rename = "%TYPES", default)]
    types: Option<serde_json::Value>,

    #[serde(rename = "%FEATURE_STRUCTURES", default)]
    feature_structures: Option<FeatureStructuresJson>,

    #[serde(rename = "%VIEWS", default)]
    views: Option<BTreeMap<String, ViewJson>>,
}

impl CasJson {
    fn from_str(string: &str) -> Result<Self, CasError> {
        let deserializer = &mut serde_json::Deserializer::from_str(string);
        let result: Result<Self, _> = serde_path_to_error::deserialize(deserializer);
        result.map_err(|e| CasError::JsonError(e, "string".to_string(), "Reading CAS from string"))
    }

    fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self, CasError> {
        let deserializer = &mut serde_json::Deserializer::from_reader(reader);
        let result: Result<Self, _> = serde_path_to_error::deserialize(deserializer);
        result.map_err(|e| CasError::JsonError(e, source.to_string(), "Reading CAS from reader"))
    }

    /// Returns the records in document order, each with its identifier
    fn records(
        &mut self,
    ) -> Result<Vec<(FsId, serde_json::Map<String, serde_json::Value>)>, CasError> {
        match self.feature_structures.take() {
            None => Ok(Vec::new()),
            Some(FeatureStructuresJson::List(records)) => records
                .into_iter()
                .map(|record| {
                    let id = record
                        .get(ID_FIELD)
                        .and_then(|id| id.as_u64())
                        .ok_or_else(|| {
                            CasError::DeserializationError(format!(
                                "Feature structure record has no valid {}",
                                ID_FIELD
                            ))
                        })?;
                    Ok((id, record))
                })
                .collect(),
            Some(FeatureStructuresJson::Map(records)) => {
                let mut result = records
                    .into_iter()
                    .map(|(key, record)| {
                        let id: FsId = key.parse().map_err(|_| {
                            CasError::DeserializationError(format!(
                                "Feature structure key is not a valid identifier: {}",
                                key
                            ))
                        })?;
                        Ok((id, record))
                    })
                    .collect::<Result<Vec<_>, CasError>>()?;
                result.sort_by_key(|(id, _)| *id);
                Ok(result)
            }
        }
    }
}

/// The target(s) of a reference that could not be resolved when its record was read
#[derive(Debug)]
enum PendingTarget {
    Single(FsId),
    Multiple(Vec<FsId>),
}

#[derive(Debug)]
struct PendingReference {
    source: FeatureStructureHandle,
    feature: String,
    target: PendingTarget,
}

/// Rebuilds a [`Cas`] from a parsed [`CasJson`]
struct CasDeserializer {
    cas: Cas,
    initial_sofa: FeatureStructureHandle,
    initial_sofa_seen: bool,
    max_id: FsId,
    pending: Vec<PendingReference>,
}

impl CasDeserializer {
    fn new(typesystem: SharedTypeSystem, config: Config) -> Result<Self, CasError> {
        let mut cas = Cas::new(typesystem).with_config(config);
        let initial_sofa = cas.sofa()?.handle();
        //the initial sofa keeps a provisional identifier until the input (or the allocator) provides the real one
        let provisional_id = cas.sofa()?.id();
        cas.fs_idmap.remove(&provisional_id);
        Ok(Self {
            cas,
            initial_sofa,
            initial_sofa_seen: false,
            max_id: 0,
            pending: Vec::new(),
        })
    }

    fn deserialize(mut self, mut json: CasJson) -> Result<Cas, CasError> {
        if json.types.is_some() {
            debug(self.cas.config(), || {
                format!("CasDeserializer: ignoring {} section", TYPES_FIELD)
            });
        }

        for (id, record) in json.records()? {
            self.max_id = self.max_id.max(id);
            let typename = record
                .get(TYPE_FIELD)
                .and_then(|t| t.as_str())
                .ok_or_else(|| {
                    CasError::DeserializationError(format!(
                        "Feature structure {} has no {}",
                        id, TYPE_FIELD
                    ))
                })?
                .to_string();
            if typename == TYPE_NAME_SOFA {
                self.parse_sofa(id, &record)?;
            } else {
                self.parse_featurestructure(id, &typename, &record)?;
            }
        }

        self.resolve_pending()?;
        self.seed_generators()?;

        if let Some(views) = json.views.take() {
            for (name, view) in views {
                self.parse_view(&name, view)?;
            }
        }

        debug(self.cas.config(), || {
            format!(
                "CasDeserializer: done, {} feature structures, {} views, next id {}",
                self.cas.featurestructures_len(),
                self.cas.views_len(),
                self.cas.next_id()
            )
        });
        Ok(self.cas)
    }

    fn parse_sofa(
        &mut self,
        id: FsId,
        record: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), CasError> {
        let name = record
            .get(FEATURE_BASE_NAME_SOFAID)
            .and_then(|name| name.as_str())
            .unwrap_or(INITIAL_VIEW);
        let sofanum = record
            .get(FEATURE_BASE_NAME_SOFANUM)
            .and_then(|sofanum| sofanum.as_i64());
        let handle = if name == INITIAL_VIEW {
            if self.initial_sofa_seen {
                return Err(CasError::DuplicateView(name.to_string()));
            }
            if self.cas.fs_idmap.contains_key(&id) {
                return Err(CasError::DuplicateId(id, "Sofa of the initial view"));
            }
            let sofa: &mut FeatureStructure = self.cas.get_mut(self.initial_sofa)?;
            sofa.id = id;
            self.cas.fs_idmap.insert(id, self.initial_sofa);
            self.initial_sofa_seen = true;
            self.initial_sofa
        } else {
            let view = self.cas.add_view(name, Some(id), sofanum)?;
            self.cas.view(view)?.sofa_handle()
        };
        debug(self.cas.config(), || {
            format!("CasDeserializer.parse_sofa: {} (id={})", name, id)
        });
        self.assign_features(handle, TYPE_NAME_SOFA, record)
    }

    fn parse_featurestructure(
        &mut self,
        id: FsId,
        typename: &str,
        record: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), CasError> {
        if self.cas.typesystem().get_type(typename).is_none() {
            return Err(CasError::TypeNotFound(
                typename.to_string(),
                "in feature structure record",
            ));
        }
        let handle = self
            .cas
            .insert_fs(FeatureStructure::new(id, typename, BTreeMap::new()))?;
        self.assign_features(handle, typename, record)
    }

    /// Assigns all features of a record, references are resolved now if possible and deferred otherwise
    fn assign_features(
        &mut self,
        handle: FeatureStructureHandle,
        typename: &str,
        record: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), CasError> {
        let typesystem = self.cas.typesystem().clone();
        let features = typesystem.all_features(typename)?;
        let range_of = |name: &str| {
            features
                .iter()
                .find(|feature| feature.name() == name)
                .copied()
        };
        for (key, value) in record.iter() {
            if key == ELEMENTS_FIELD {
                let element_type = range_of(FEATURE_BASE_NAME_ELEMENTS)
                    .and_then(|feature| feature.element_type());
                self.assign_elements(handle, typename, element_type, &typesystem, value)?;
            } else if key.starts_with(RESERVED_FIELD_PREFIX) {
                continue;
            } else if let Some(name) = key.strip_prefix(REF_FEATURE_PREFIX) {
                let target = match value {
                    serde_json::Value::Null => continue,
                    serde_json::Value::Array(ids) => {
                        PendingTarget::Multiple(ids.iter().map(json_id).collect::<Result<_, _>>()?)
                    }
                    id => PendingTarget::Single(json_id(id)?),
                };
                self.assign_reference(handle, name, target)?;
            } else {
                //collections are converted element by element
                let value_type = range_of(key).and_then(|feature| {
                    if typesystem.is_collection(typename, feature) {
                        typesystem.element_type_of(feature)
                    } else {
                        Some(feature.range_type())
                    }
                });
                let value = json_to_value(value, value_type)?;
                let fs: &mut FeatureStructure = self.cas.get_mut(handle)?;
                fs.set(key.as_str(), value);
            }
        }
        Ok(())
    }

    /// Decodes the `%ELEMENTS` of an array
    fn assign_elements(
        &mut self,
        handle: FeatureStructureHandle,
        typename: &str,
        element_type: Option<&str>,
        typesystem: &SharedTypeSystem,
        value: &serde_json::Value,
    ) -> Result<(), CasError> {
        let elements = if typename == TYPE_NAME_BYTE_ARRAY {
            match value {
                serde_json::Value::String(encoded) => {
                    FeatureValue::Bytes(STANDARD.decode(encoded).map_err(|e| {
                        CasError::DeserializationError(format!(
                            "Invalid base64 in byte array: {}",
                            e
                        ))
                    })?)
                }
                serde_json::Value::Array(values) => FeatureValue::Bytes(
                    values.iter().map(json_byte).collect::<Result<Vec<u8>, _>>()?,
                ),
                _ => {
                    return Err(CasError::DeserializationError(
                        "Byte array elements must be a base64 string".to_string(),
                    ))
                }
            }
        } else if element_type.is_some_and(|element_type| !typesystem.is_primitive(element_type)) {
            //arrays of feature structures hold identifiers
            let ids = match value {
                serde_json::Value::Array(ids) => {
                    ids.iter().map(json_id).collect::<Result<Vec<_>, _>>()?
                }
                _ => {
                    return Err(CasError::DeserializationError(format!(
                        "Elements of {} must be an array of identifiers",
                        typename
                    )))
                }
            };
            return self.assign_reference(
                handle,
                FEATURE_BASE_NAME_ELEMENTS,
                PendingTarget::Multiple(ids),
            );
        } else {
            json_to_value(value, element_type)?
        };
        let fs: &mut FeatureStructure = self.cas.get_mut(handle)?;
        fs.set(FEATURE_BASE_NAME_ELEMENTS, elements);
        Ok(())
    }

    /// Sets a reference feature if all targets are known already, defers it otherwise
    fn assign_reference(
        &mut self,
        handle: FeatureStructureHandle,
        feature: &str,
        target: PendingTarget,
    ) -> Result<(), CasError> {
        if let Some(value) = self.try_resolve(&target) {
            let fs: &mut FeatureStructure = self.cas.get_mut(handle)?;
            fs.set(feature, value);
        } else {
            self.pending.push(PendingReference {
                source: handle,
                feature: feature.to_string(),
                target,
            });
        }
        Ok(())
    }

    fn try_resolve(&self, target: &PendingTarget) -> Option<FeatureValue> {
        match target {
            PendingTarget::Single(id) => self.cas.resolve_id(*id).map(FeatureValue::Reference),
            PendingTarget::Multiple(ids) => ids
                .iter()
                .map(|id| self.cas.resolve_id(*id))
                .collect::<Option<Vec<_>>>()
                .map(FeatureValue::References),
        }
    }

    /// Second pass: resolves all forward references, any target still unknown is an error
    fn resolve_pending(&mut self) -> Result<(), CasError> {
        debug(self.cas.config(), || {
            format!(
                "CasDeserializer.resolve_pending: {} forward references",
                self.pending.len()
            )
        });
        let pending = std::mem::take(&mut self.pending);
        for reference in pending {
            let value = self.try_resolve(&reference.target).ok_or_else(|| {
                let missing = match &reference.target {
                    PendingTarget::Single(id) => *id,
                    PendingTarget::Multiple(ids) => ids
                        .iter()
                        .copied()
                        .find(|id| self.cas.resolve_id(*id).is_none())
                        .unwrap_or_default(),
                };
                CasError::IdNotFound(missing, "unresolved reference")
            })?;
            let fs: &mut FeatureStructure = self.cas.get_mut(reference.source)?;
            fs.set(reference.feature, value);
        }
        Ok(())
    }

    /// Seeds both generators past the highest identifier and sofa number, then gives the initial Sofa an identifier if the input did not.
    fn seed_generators(&mut self) -> Result<(), CasError> {
        let max_sofanum = self
            .cas
            .sofas()
            .map(|sofa| sofa.sofanum())
            .max()
            .unwrap_or(0)
            .max(0) as u64;
        let next_id = self.max_id.checked_add(1).ok_or_else(|| {
            CasError::DeserializationError(format!(
                "Feature structure identifier {} is out of range",
                self.max_id
            ))
        })?;
        self.cas.id_generator = IdGenerator::new(next_id);
        self.cas.sofanum_generator = IdGenerator::new(max_sofanum + 1);
        if !self.initial_sofa_seen {
            let id = self.cas.id_generator.generate_id()?;
            let sofa: &mut FeatureStructure = self.cas.get_mut(self.initial_sofa)?;
            sofa.id = id;
            self.cas.fs_idmap.insert(id, self.initial_sofa);
        }
        debug(self.cas.config(), || {
            format!(
                "CasDeserializer.seed_generators: next id {}, next sofanum {}",
                self.cas.id_generator.peek(),
                self.cas.sofanum_generator.peek()
            )
        });
        Ok(())
    }

    fn parse_view(&mut self, name: &str, view: ViewJson) -> Result<(), CasError> {
        let handle: ViewHandle = match self.cas.view_handle(name) {
            Ok(handle) => handle,
            Err(CasError::ViewNotFound(_)) => self.cas.add_view(name, None, None)?,
            Err(e) => return Err(e),
        };
        for id in view.index {
            let member = self
                .cas
                .resolve_id(id)
                .ok_or(CasError::IdNotFound(id, "in view index"))?;
            self.cas.add_to_index_in(handle, member, true)?;
        }
        Ok(())
    }
}

fn json_id(value: &serde_json::Value) -> Result<FsId, CasError> {
    value.as_u64().ok_or_else(|| {
        CasError::DeserializationError(format!("Expected an identifier, got {}", value))
    })
}

/// Reads one element of a numeric byte array, both signed (`-128..=-1`) and unsigned (`0..=255`) bytes are accepted
fn json_byte(value: &serde_json::Value) -> Result<u8, CasError> {
    match value.as_i64() {
        Some(byte @ 0..=255) => Ok(byte as u8),
        Some(byte @ -128..=-1) => Ok(byte as i8 as u8),
        _ => Err(CasError::DeserializationError(format!(
            "Byte array holds an element that is not a byte: {}",
            value
        ))),
    }
}

fn is_float_range(range_type: Option<&str>) -> bool {
    matches!(range_type, Some(TYPE_NAME_FLOAT) | Some(TYPE_NAME_DOUBLE))
}

/// Converts a literal JSON value, using the declared range (if known) to tell floats from integers
fn json_to_value(
    value: &serde_json::Value,
    range_type: Option<&str>,
) -> Result<FeatureValue, CasError> {
    match value {
        serde_json::Value::Null => Ok(FeatureValue::Null),
        serde_json::Value::Bool(value) => Ok(FeatureValue::Bool(*value)),
        serde_json::Value::Number(number) => {
            let value = if is_float_range(range_type) {
                number.as_f64().map(FeatureValue::Float)
            } else if let Some(value) = number.as_i64() {
                Some(FeatureValue::Int(value))
            } else {
                number.as_f64().map(FeatureValue::Float)
            };
            value.ok_or_else(|| {
                CasError::DeserializationError(format!("Number out of range: {}", number))
            })
        }
        serde_json::Value::String(value) => {
            if is_float_range(range_type) {
                match value.as_str() {
                    FLOAT_NAN => return Ok(FeatureValue::Float(f64::NAN)),
                    FLOAT_POSITIVE_INFINITY => return Ok(FeatureValue::Float(f64::INFINITY)),
                    FLOAT_NEGATIVE_INFINITY => {
                        return Ok(FeatureValue::Float(f64::NEG_INFINITY))
                    }
                    _ => {}
                }
            }
            Ok(FeatureValue::String(value.clone()))
        }
        serde_json::Value::Array(values) => Ok(FeatureValue::List(
            values
                .iter()
                .map(|value| json_to_value(value, range_type))
                .collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(_) => Err(CasError::DeserializationError(
            "Nested objects are not valid feature values".to_string(),
        )),
    }
}

impl FromJson for Cas {
    fn from_json_file(
        filename: &str,
        typesystem: Option<SharedTypeSystem>,
        config: Config,
    ) -> Result<Self, CasError> {
        debug(&config, || format!("Cas::from_json_file: {}", filename));
        let reader = open_file_reader(filename, &config)?;
        let json = CasJson::from_reader(reader, filename)?;
        CasDeserializer::new(typesystem.unwrap_or_else(default_typesystem), config)?
            .deserialize(json)
    }

    fn from_json_str(
        string: &str,
        typesystem: Option<SharedTypeSystem>,
        config: Config,
    ) -> Result<Self, CasError> {
        let json = CasJson::from_str(string)?;
        CasDeserializer::new(typesystem.unwrap_or_else(default_typesystem), config)?
            .deserialize(json)
    }

    fn from_json_reader<R: Read>(
        reader: R,
        typesystem: Option<SharedTypeSystem>,
        config: Config,
    ) -> Result<Self, CasError> {
        let json = CasJson::from_reader(reader, "reader")?;
        CasDeserializer::new(typesystem.unwrap_or_else(default_typesystem), config)?
            .deserialize(json)
    }
}

fn default_typesystem() -> SharedTypeSystem {
    Arc::new(TypeSystem::default())
}

/// Where to read CAS JSON from, see [`load_cas_from_json()`]
pub enum JsonSource<'a> {
    Str(&'a str),
    Reader(Box<dyn Read + 'a>),
}

impl<'a> JsonSource<'a> {
    pub fn from_reader(reader: impl Read + 'a) -> Self {
        Self::Reader(Box::new(reader))
    }
}

impl<'a> From<&'a str> for JsonSource<'a> {
    fn from(string: &'a str) -> Self {
        Self::Str(string)
    }
}

impl<'a> From<&'a String> for JsonSource<'a> {
    fn from(string: &'a String) -> Self {
        Self::Str(string.as_str())
    }
}

/// Loads a [`Cas`] from JSON, either a string or a reader. Without a type system only the builtin types are known.
///
/// ```
/// # use cas::*;
/// let cas = load_cas_from_json(r#"{"%VIEWS": {"_InitialView": {"%INDEX": []}}}"#, None)?;
/// assert_eq!(cas.views_len(), 1);
/// # Ok::<(), CasError>(())
/// ```
pub fn load_cas_from_json<'a>(
    source: impl Into<JsonSource<'a>>,
    typesystem: Option<SharedTypeSystem>,
) -> Result<Cas, CasError> {
    match source.into() {
        JsonSource::Str(string) => Cas::from_json_str(string, typesystem, Config::default()),
        JsonSource::Reader(reader) => Cas::from_json_reader(reader, typesystem, Config::default()),
    }
}
