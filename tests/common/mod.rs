#![allow(dead_code)]
use std::collections::BTreeMap;
use std::sync::Arc;

use cas::constants::*;
use cas::*;

pub const TEXT: &str = "The quick brown fox jumps over the lazy dog";

/// A small type system with a span type, a token hierarchy and a non-positional relation type
pub fn typesystem() -> Result<SharedTypeSystem, CasError> {
    let ts = TypeSystem::default()
        .with_type(
            "test.Span",
            Some(TYPE_NAME_ANNOTATION),
            vec![FeatureDescription::new("label", TYPE_NAME_STRING)],
        )?
        .with_type(
            "test.Token",
            Some(TYPE_NAME_ANNOTATION),
            vec![
                FeatureDescription::new("pos", TYPE_NAME_STRING),
                FeatureDescription::new("head", "test.Token"),
            ],
        )?
        .with_type(
            "test.NamedToken",
            Some("test.Token"),
            vec![FeatureDescription::new("entity", TYPE_NAME_STRING)],
        )?
        .with_type(
            "test.Relation",
            None,
            vec![
                FeatureDescription::new("governor", "test.Token"),
                FeatureDescription::new("dependent", "test.Token"),
                FeatureDescription::new("type", TYPE_NAME_STRING),
                FeatureDescription::new("self", TYPE_NAME_STRING),
                FeatureDescription::new("score", TYPE_NAME_DOUBLE),
            ],
        )?
        .with_type(
            "test.Chain",
            None,
            vec![
                FeatureDescription::new("links", TYPE_NAME_FS_ARRAY)
                    .with_element_type("test.Token")
                    .with_multiple_references_allowed(true),
                FeatureDescription::new("tags", TYPE_NAME_STRING_ARRAY)
                    .with_element_type(TYPE_NAME_STRING),
                FeatureDescription::new("weights", TYPE_NAME_DOUBLE_ARRAY),
            ],
        )?;
    Ok(Arc::new(ts))
}

/// Three spans A=[0,10), B=[2,5) and C=[2,11) in the initial view
pub fn setup_example_1() -> Result<(Cas, [FeatureStructureHandle; 3]), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.set_sofa_string(TEXT)?;
    let a = cas.add_annotation(
        FeatureStructureBuilder::new("test.Span")
            .with_span(0, 10)
            .with_feature("label", "A"),
    )?;
    let b = cas.add_annotation(
        FeatureStructureBuilder::new("test.Span")
            .with_span(2, 5)
            .with_feature("label", "B"),
    )?;
    let c = cas.add_annotation(
        FeatureStructureBuilder::new("test.Span")
            .with_span(2, 11)
            .with_feature("label", "C"),
    )?;
    Ok((cas, [a, b, c]))
}

/// A document exercising most of the model: two views, tokens, relations with references,
/// an FSArray, a string array, a byte array as Sofa data, and unindexed structures.
pub fn setup_example_2() -> Result<Cas, CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.set_sofa_string(TEXT)?;
    cas.set_sofa_mime("text/plain")?;

    let the = cas.add_annotation(
        FeatureStructureBuilder::new("test.Token")
            .with_span(0, 3)
            .with_feature("pos", "DET"),
    )?;
    let fox = cas.add_annotation(
        FeatureStructureBuilder::new("test.NamedToken")
            .with_span(16, 19)
            .with_feature("pos", "NOUN")
            .with_feature("entity", "ANIMAL"),
    )?;
    let jumps = cas.add_annotation(
        FeatureStructureBuilder::new("test.Token")
            .with_span(20, 25)
            .with_feature("pos", "VERB"),
    )?;
    cas.set_feature(the, "head", fox)?;
    cas.set_feature(fox, "head", jumps)?;
    cas.add_annotation(
        FeatureStructureBuilder::new("test.Relation")
            .with_reference("governor", jumps)
            .with_reference("dependent", fox)
            .with_feature("type", "nsubj")
            .with_feature("self", "rel1")
            .with_feature("score", f64::NAN),
    )?;
    //not indexed, only reachable by reference
    let links = cas.create_fs(
        FeatureStructureBuilder::new(TYPE_NAME_FS_ARRAY)
            .with_feature(FEATURE_BASE_NAME_ELEMENTS, vec![the, fox, jumps]),
    )?;
    cas.add_annotation(
        FeatureStructureBuilder::new("test.Chain")
            .with_reference("links", links)
            .with_feature(
                "tags",
                vec![FeatureValue::from("a"), FeatureValue::from("b")],
            ),
    )?;

    let bytes = cas.create_fs(
        FeatureStructureBuilder::new(TYPE_NAME_BYTE_ARRAY)
            .with_feature(FEATURE_BASE_NAME_ELEMENTS, vec![0u8, 1, 2, 250, 255]),
    )?;
    let mut audio = cas.create_view("audio")?;
    audio.set_sofa_mime("application/octet-stream")?;
    audio.set_sofa_array(bytes)?;
    audio.set_sofa_uri("file:///tmp/audio.raw")?;
    audio.add_annotation(FeatureStructureBuilder::new("test.Span").with_span(0, 2))?;
    Ok(cas)
}

/// A comparable rendering of all feature structures: identifier -> (type, features),
/// with references replaced by the identifiers of their targets.
pub fn snapshot(cas: &Cas) -> BTreeMap<FsId, (String, BTreeMap<String, String>)> {
    let render = |value: &FeatureValue| -> String {
        match value {
            FeatureValue::Reference(handle) => {
                format!("@{}", cas.featurestructure(*handle).unwrap().id())
            }
            FeatureValue::References(handles) => {
                let ids: Vec<String> = handles
                    .iter()
                    .map(|handle| cas.featurestructure(*handle).unwrap().id().to_string())
                    .collect();
                format!("@[{}]", ids.join(","))
            }
            FeatureValue::Bytes(bytes) => format!("{:?}", bytes),
            other => other.to_string(),
        }
    };
    cas.featurestructures()
        .map(|fs| {
            let features = fs
                .features()
                .map(|(name, value)| (name.to_string(), render(value)))
                .collect();
            (fs.id(), (fs.typename().to_string(), features))
        })
        .collect()
}

/// View name -> sorted identifiers of the index members
pub fn view_snapshot(cas: &Cas) -> BTreeMap<String, Vec<FsId>> {
    cas.views()
        .map(|view| {
            let mut ids: Vec<FsId> = view
                .all()
                .map(|handle| cas.featurestructure(handle).unwrap().id())
                .collect();
            ids.sort();
            (view.name().to_string(), ids)
        })
        .collect()
}
