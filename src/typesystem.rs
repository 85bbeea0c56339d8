/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the [`TypeSystemView`] trait, the interface through which a [`crate::Cas`]
//! learns about types, their supertypes, subtypes and features; and [`TypeSystem`], an
//! implementation that comes preloaded with the builtin UIMA types.

use sealed::sealed;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::error::CasError;
use crate::json::{
    ELEMENT_TYPE_FIELD, MULTIPLE_REFERENCES_ALLOWED_FIELD, NAME_FIELD, RANGE_FIELD,
    RESERVED_FIELD_PREFIX, SUPER_TYPE_FIELD,
};
use crate::types::*;

pub const TYPE_NAME_TOP: &str = "uima.cas.TOP";
pub const TYPE_NAME_BOOLEAN: &str = "uima.cas.Boolean";
pub const TYPE_NAME_BYTE: &str = "uima.cas.Byte";
pub const TYPE_NAME_SHORT: &str = "uima.cas.Short";
pub const TYPE_NAME_INTEGER: &str = "uima.cas.Integer";
pub const TYPE_NAME_LONG: &str = "uima.cas.Long";
pub const TYPE_NAME_FLOAT: &str = "uima.cas.Float";
pub const TYPE_NAME_DOUBLE: &str = "uima.cas.Double";
pub const TYPE_NAME_STRING: &str = "uima.cas.String";
pub const TYPE_NAME_ARRAY_BASE: &str = "uima.cas.ArrayBase";
pub const TYPE_NAME_BOOLEAN_ARRAY: &str = "uima.cas.BooleanArray";
pub const TYPE_NAME_BYTE_ARRAY: &str = "uima.cas.ByteArray";
pub const TYPE_NAME_SHORT_ARRAY: &str = "uima.cas.ShortArray";
pub const TYPE_NAME_INTEGER_ARRAY: &str = "uima.cas.IntegerArray";
pub const TYPE_NAME_LONG_ARRAY: &str = "uima.cas.LongArray";
pub const TYPE_NAME_FLOAT_ARRAY: &str = "uima.cas.FloatArray";
pub const TYPE_NAME_DOUBLE_ARRAY: &str = "uima.cas.DoubleArray";
pub const TYPE_NAME_STRING_ARRAY: &str = "uima.cas.StringArray";
pub const TYPE_NAME_FS_ARRAY: &str = "uima.cas.FSArray";
pub const TYPE_NAME_SOFA: &str = "uima.cas.Sofa";
pub const TYPE_NAME_ANNOTATION_BASE: &str = "uima.cas.AnnotationBase";
pub const TYPE_NAME_ANNOTATION: &str = "uima.tcas.Annotation";
pub const TYPE_NAME_DOCUMENT_ANNOTATION: &str = "uima.tcas.DocumentAnnotation";

pub const FEATURE_BASE_NAME_SOFA: &str = "sofa";
pub const FEATURE_BASE_NAME_BEGIN: &str = "begin";
pub const FEATURE_BASE_NAME_END: &str = "end";
pub const FEATURE_BASE_NAME_LANGUAGE: &str = "language";
pub const FEATURE_BASE_NAME_ELEMENTS: &str = "elements";
pub const FEATURE_BASE_NAME_SOFANUM: &str = "sofaNum";
pub const FEATURE_BASE_NAME_SOFAID: &str = "sofaID";
pub const FEATURE_BASE_NAME_SOFAMIME: &str = "mimeType";
pub const FEATURE_BASE_NAME_SOFAARRAY: &str = "sofaArray";
pub const FEATURE_BASE_NAME_SOFASTRING: &str = "sofaString";
pub const FEATURE_BASE_NAME_SOFAURI: &str = "sofaURI";

const PRIMITIVE_TYPES: &[&str; 8] = &[
    TYPE_NAME_BOOLEAN,
    TYPE_NAME_BYTE,
    TYPE_NAME_SHORT,
    TYPE_NAME_INTEGER,
    TYPE_NAME_LONG,
    TYPE_NAME_FLOAT,
    TYPE_NAME_DOUBLE,
    TYPE_NAME_STRING,
];

/// (array type, element type)
const ARRAY_TYPES: &[(&str, &str); 9] = &[
    (TYPE_NAME_BOOLEAN_ARRAY, TYPE_NAME_BOOLEAN),
    (TYPE_NAME_BYTE_ARRAY, TYPE_NAME_BYTE),
    (TYPE_NAME_SHORT_ARRAY, TYPE_NAME_SHORT),
    (TYPE_NAME_INTEGER_ARRAY, TYPE_NAME_INTEGER),
    (TYPE_NAME_LONG_ARRAY, TYPE_NAME_LONG),
    (TYPE_NAME_FLOAT_ARRAY, TYPE_NAME_FLOAT),
    (TYPE_NAME_DOUBLE_ARRAY, TYPE_NAME_DOUBLE),
    (TYPE_NAME_STRING_ARRAY, TYPE_NAME_STRING),
    (TYPE_NAME_FS_ARRAY, TYPE_NAME_TOP),
];

/// A type system that may be shared by many documents
pub type SharedTypeSystem = Arc<dyn TypeSystemView + Send + Sync>;

/// Describes a single feature of a type
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDescription {
    pub(crate) name: String,
    pub(crate) range_type: String,
    pub(crate) element_type: Option<String>,
    pub(crate) multiple_references_allowed: bool,
}

impl FeatureDescription {
    pub fn new(name: impl Into<String>, range_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range_type: range_type.into(),
            element_type: None,
            multiple_references_allowed: false,
        }
    }

    pub fn with_element_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn with_multiple_references_allowed(mut self, value: bool) -> Self {
        self.multiple_references_allowed = value;
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The name of the type of the values this feature takes
    pub fn range_type(&self) -> &str {
        self.range_type.as_str()
    }

    /// For features that take arrays or lists, the type of the elements
    pub fn element_type(&self) -> Option<&str> {
        self.element_type.as_deref()
    }

    pub fn multiple_references_allowed(&self) -> bool {
        self.multiple_references_allowed
    }
}

/// Describes a type: its name, its supertype and the features it declares itself (not the inherited ones).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescription {
    pub(crate) name: String,
    pub(crate) supertype: Option<String>,
    pub(crate) features: Vec<FeatureDescription>,
}

impl TypeDescription {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The name of the supertype, only the root type (`uima.cas.TOP`) has none
    pub fn supertype(&self) -> Option<&str> {
        self.supertype.as_deref()
    }

    /// The features declared by this type itself, not including inherited ones.
    pub fn features(&self) -> &[FeatureDescription] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureDescription> {
        self.features.iter().find(|f| f.name == name)
    }
}

impl Serialize for TypeDescription {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(None)?;
        state.serialize_entry(NAME_FIELD, &self.name)?;
        if let Some(supertype) = &self.supertype {
            state.serialize_entry(SUPER_TYPE_FIELD, supertype)?;
        }
        for feature in self.features.iter() {
            state.serialize_entry(&feature.name, feature)?;
        }
        state.end()
    }
}

impl Serialize for FeatureDescription {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(None)?;
        state.serialize_entry(NAME_FIELD, &self.name)?;
        state.serialize_entry(RANGE_FIELD, &self.range_type)?;
        if let Some(element_type) = &self.element_type {
            state.serialize_entry(ELEMENT_TYPE_FIELD, element_type)?;
        }
        if self.multiple_references_allowed {
            state.serialize_entry(MULTIPLE_REFERENCES_ALLOWED_FIELD, &true)?;
        }
        state.end()
    }
}

/// The interface through which a document consults its type system. Only type lookup
/// and subtype enumeration must be provided, everything else is derived from those.
pub trait TypeSystemView {
    /// Looks up a type by its fully qualified name
    fn get_type(&self, name: &str) -> Option<&TypeDescription>;

    /// Returns the names of all (transitive) subtypes of the type, not including the type itself
    fn subtypes(&self, name: &str) -> Vec<&str>;

    /// Like [`Self::get_type()`] but returns a [`CasError::TypeNotFound`] if the type does not exist
    fn get_type_or_err(&self, name: &str) -> Result<&TypeDescription, CasError> {
        self.get_type(name)
            .ok_or_else(|| CasError::TypeNotFound(name.to_string(), "TypeSystemView::get_type"))
    }

    /// Tests whether `name` is `supertype` or one of its descendants
    fn is_instance_of(&self, name: &str, supertype: &str) -> bool {
        let mut current = self.get_type(name);
        while let Some(t) = current {
            if t.name() == supertype {
                return true;
            }
            current = t.supertype().and_then(|s| self.get_type(s));
        }
        false
    }

    /// Returns all features of a type including the inherited ones, those of the supertypes come first.
    fn all_features(&self, name: &str) -> Result<Vec<&FeatureDescription>, CasError> {
        let mut chain = Vec::new();
        let mut current = Some(self.get_type_or_err(name)?);
        while let Some(t) = current {
            chain.push(t);
            current = t.supertype().and_then(|s| self.get_type(s));
        }
        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|t| t.features().iter())
            .collect())
    }

    /// Is the type a primitive type (or a subtype of a string)? Values of primitive ranges are encoded literally.
    fn is_primitive(&self, range_type: &str) -> bool {
        PRIMITIVE_TYPES.contains(&range_type) || self.is_instance_of(range_type, TYPE_NAME_STRING)
    }

    /// Is the type one of the array types?
    fn is_array(&self, name: &str) -> bool {
        name != TYPE_NAME_ARRAY_BASE && self.is_instance_of(name, TYPE_NAME_ARRAY_BASE)
    }

    /// Does the feature (of the owning type) hold a collection of values rather than a single one?
    #[allow(unused_variables)]
    fn is_collection(&self, owning_type: &str, feature: &FeatureDescription) -> bool {
        self.is_array(feature.range_type())
    }

    /// The type of the elements of a collection feature, as declared on the feature or else on its array type
    fn element_type_of<'a>(&'a self, feature: &'a FeatureDescription) -> Option<&'a str> {
        feature.element_type().or_else(|| {
            self.get_type(feature.range_type())?
                .feature(FEATURE_BASE_NAME_ELEMENTS)?
                .element_type()
        })
    }

    /// Builtin types are part of every type system and never need to be declared
    fn is_builtin(&self, name: &str) -> bool {
        name.starts_with("uima.")
    }
}

/// A type system, preloaded with the builtin UIMA types. Further types can be added via [`TypeSystem::create_type()`]
/// or loaded from JSON via [`TypeSystem::from_json_str()`].
#[derive(Debug, Clone)]
pub struct TypeSystem {
    types: BTreeMap<String, TypeDescription>,

    /// Maps a type to its direct subtypes
    children: BTreeMap<String, Vec<String>>,
}

impl Default for TypeSystem {
    fn default() -> Self {
        let mut typesystem = Self {
            types: BTreeMap::new(),
            children: BTreeMap::new(),
        };
        typesystem.add_builtin(TYPE_NAME_TOP, None, vec![]);
        for primitive in PRIMITIVE_TYPES.iter() {
            typesystem.add_builtin(primitive, Some(TYPE_NAME_TOP), vec![]);
        }
        typesystem.add_builtin(TYPE_NAME_ARRAY_BASE, Some(TYPE_NAME_TOP), vec![]);
        for (array_type, element_type) in ARRAY_TYPES.iter() {
            typesystem.add_builtin(
                array_type,
                Some(TYPE_NAME_ARRAY_BASE),
                vec![FeatureDescription::new(FEATURE_BASE_NAME_ELEMENTS, *array_type)
                    .with_element_type(*element_type)],
            );
        }
        typesystem.add_builtin(
            TYPE_NAME_SOFA,
            Some(TYPE_NAME_TOP),
            vec![
                FeatureDescription::new(FEATURE_BASE_NAME_SOFANUM, TYPE_NAME_INTEGER),
                FeatureDescription::new(FEATURE_BASE_NAME_SOFAID, TYPE_NAME_STRING),
                FeatureDescription::new(FEATURE_BASE_NAME_SOFAMIME, TYPE_NAME_STRING),
                FeatureDescription::new(FEATURE_BASE_NAME_SOFAARRAY, TYPE_NAME_TOP),
                FeatureDescription::new(FEATURE_BASE_NAME_SOFASTRING, TYPE_NAME_STRING),
                FeatureDescription::new(FEATURE_BASE_NAME_SOFAURI, TYPE_NAME_STRING),
            ],
        );
        typesystem.add_builtin(
            TYPE_NAME_ANNOTATION_BASE,
            Some(TYPE_NAME_TOP),
            vec![FeatureDescription::new(
                FEATURE_BASE_NAME_SOFA,
                TYPE_NAME_SOFA,
            )],
        );
        typesystem.add_builtin(
            TYPE_NAME_ANNOTATION,
            Some(TYPE_NAME_ANNOTATION_BASE),
            vec![
                FeatureDescription::new(FEATURE_BASE_NAME_BEGIN, TYPE_NAME_INTEGER),
                FeatureDescription::new(FEATURE_BASE_NAME_END, TYPE_NAME_INTEGER),
            ],
        );
        typesystem.add_builtin(
            TYPE_NAME_DOCUMENT_ANNOTATION,
            Some(TYPE_NAME_ANNOTATION),
            vec![FeatureDescription::new(
                FEATURE_BASE_NAME_LANGUAGE,
                TYPE_NAME_STRING,
            )],
        );
        typesystem
    }
}

impl TypeSystemView for TypeSystem {
    fn get_type(&self, name: &str) -> Option<&TypeDescription> {
        self.types.get(name)
    }

    fn subtypes(&self, name: &str) -> Vec<&str> {
        let mut result = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(name);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.children.get(current) {
                for child in children.iter() {
                    result.push(child.as_str());
                    queue.push_back(child.as_str());
                }
            }
        }
        result
    }
}

#[sealed]
impl TypeInfo for TypeSystem {
    fn typeinfo() -> Type {
        Type::TypeSystem
    }
}

impl TypeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_builtin(&mut self, name: &str, supertype: Option<&str>, features: Vec<FeatureDescription>) {
        self.register(TypeDescription {
            name: name.to_string(),
            supertype: supertype.map(|s| s.to_string()),
            features,
        });
    }

    fn register(&mut self, typedescription: TypeDescription) {
        if let Some(supertype) = &typedescription.supertype {
            self.children
                .entry(supertype.clone())
                .or_default()
                .push(typedescription.name.clone());
        }
        self.types
            .insert(typedescription.name.clone(), typedescription);
    }

    /// Declares a new type with the given supertype (defaults to `uima.cas.TOP`)
    pub fn create_type(
        &mut self,
        name: &str,
        supertype: Option<&str>,
    ) -> Result<&mut TypeDescription, CasError> {
        if self.types.contains_key(name) {
            return Err(CasError::DuplicateType(name.to_string()));
        }
        let supertype = supertype.unwrap_or(TYPE_NAME_TOP);
        if !self.types.contains_key(supertype) {
            return Err(CasError::TypeNotFound(
                supertype.to_string(),
                "supertype passed to TypeSystem::create_type",
            ));
        }
        self.register(TypeDescription {
            name: name.to_string(),
            supertype: Some(supertype.to_string()),
            features: Vec::new(),
        });
        self.types
            .get_mut(name)
            .ok_or_else(|| CasError::TypeNotFound(name.to_string(), "TypeSystem::create_type"))
    }

    /// Adds a feature to an existing type. A feature with the same name replaces an earlier declaration.
    pub fn add_feature(
        &mut self,
        typename: &str,
        feature: FeatureDescription,
    ) -> Result<(), CasError> {
        let typedescription = self
            .types
            .get_mut(typename)
            .ok_or_else(|| CasError::TypeNotFound(typename.to_string(), "TypeSystem::add_feature"))?;
        if let Some(existing) = typedescription
            .features
            .iter_mut()
            .find(|f| f.name == feature.name)
        {
            *existing = feature;
        } else {
            typedescription.features.push(feature);
        }
        Ok(())
    }

    /// Builder pattern variant of [`Self::create_type()`] and [`Self::add_feature()`]
    pub fn with_type(
        mut self,
        name: &str,
        supertype: Option<&str>,
        features: Vec<FeatureDescription>,
    ) -> Result<Self, CasError> {
        self.create_type(name, supertype)?;
        for feature in features {
            self.add_feature(name, feature)?;
        }
        Ok(self)
    }

    /// Returns an iterator over all types, in alphabetical order
    pub fn types(&self) -> impl Iterator<Item = &TypeDescription> {
        self.types.values()
    }

    /// Loads type declarations from a JSON object mapping type names to declarations, as found
    /// under the `%TYPES` key in a CAS JSON document. The builtin types are always present.
    ///
    /// ```json
    /// { "custom.Span": { "%NAME": "custom.Span", "%SUPER_TYPE": "uima.tcas.Annotation",
    ///                    "value": { "%NAME": "value", "%RANGE": "uima.cas.String" } } }
    /// ```
    pub fn from_json_str(string: &str) -> Result<Self, CasError> {
        let deserializer = &mut serde_json::Deserializer::from_str(string);
        let result: Result<BTreeMap<String, serde_json::Map<String, serde_json::Value>>, _> =
            serde_path_to_error::deserialize(deserializer);
        let declarations = result
            .map_err(|e| CasError::JsonError(e, "string".to_string(), "Reading type system"))?;
        let mut typesystem = Self::default();
        typesystem.merge_declarations(declarations)?;
        Ok(typesystem)
    }

    /// Adds parsed type declarations, supertypes may be declared after their subtypes.
    pub(crate) fn merge_declarations(
        &mut self,
        declarations: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
    ) -> Result<(), CasError> {
        let mut pending: Vec<TypeDescription> = Vec::with_capacity(declarations.len());
        for (name, declaration) in declarations {
            if self.is_builtin(&name) {
                continue;
            }
            pending.push(parse_type_declaration(name, declaration)?);
        }
        while !pending.is_empty() {
            let before = pending.len();
            let mut remaining = Vec::new();
            for typedescription in pending {
                let supertype = typedescription
                    .supertype
                    .clone()
                    .unwrap_or_else(|| TYPE_NAME_TOP.to_string());
                if self.types.contains_key(&supertype) {
                    self.create_type(&typedescription.name, Some(&supertype))?;
                    for feature in typedescription.features {
                        self.add_feature(&typedescription.name, feature)?;
                    }
                } else {
                    remaining.push(typedescription);
                }
            }
            if remaining.len() == before {
                let missing = remaining[0].supertype.clone().unwrap_or_default();
                return Err(CasError::TypeNotFound(
                    missing,
                    "supertype is never declared in type system JSON",
                ));
            }
            pending = remaining;
        }
        Ok(())
    }
}

fn json_string(
    map: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    map.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn parse_type_declaration(
    name: String,
    declaration: serde_json::Map<String, serde_json::Value>,
) -> Result<TypeDescription, CasError> {
    let mut features = Vec::new();
    for (key, value) in declaration.iter() {
        if key.starts_with(RESERVED_FIELD_PREFIX) {
            continue;
        }
        let feature = value.as_object().ok_or_else(|| {
            CasError::DeserializationError(format!(
                "Feature {} of type {} must be declared by an object",
                key, name
            ))
        })?;
        let range_type = json_string(feature, RANGE_FIELD).ok_or_else(|| {
            CasError::DeserializationError(format!(
                "Feature {} of type {} has no range",
                key, name
            ))
        })?;
        let mut description =
            FeatureDescription::new(json_string(feature, NAME_FIELD).unwrap_or(key.clone()), range_type);
        description.element_type = json_string(feature, ELEMENT_TYPE_FIELD);
        description.multiple_references_allowed = feature
            .get(MULTIPLE_REFERENCES_ALLOWED_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        features.push(description);
    }
    Ok(TypeDescription {
        name: json_string(&declaration, NAME_FIELD).unwrap_or(name),
        supertype: json_string(&declaration, SUPER_TYPE_FIELD),
        features,
    })
}
