mod common;
use crate::common::*;

use cas::constants::*;
use cas::*;

fn labels<'a>(iter: impl Iterator<Item = ResultItem<'a, FeatureStructure>>) -> Vec<String> {
    iter.map(|fs| fs.get("label").map(|v| v.to_string()).unwrap_or_default())
        .collect()
}

#[test]
fn instantiation() -> Result<(), CasError> {
    let cas = Cas::new(typesystem()?);
    assert_eq!(cas.views_len(), 1);
    assert_eq!(cas.featurestructures_len(), 1, "only the initial sofa");
    assert_eq!(cas.select_all()?.count(), 0);
    Ok(())
}

#[test]
fn create_view() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    let view = cas.create_view("other")?;
    assert_eq!(view.name(), "other");
    let sofa = view.sofa()?;
    assert_eq!(sofa.name(), "other");
    assert_eq!(sofa.sofanum(), 2);
    assert_eq!(sofa.id(), 2);
    assert_eq!(cas.views_len(), 2);
    let names: Vec<&str> = cas.views().map(|view| view.as_ref().name()).collect();
    assert_eq!(names, vec![INITIAL_VIEW, "other"]);
    assert_eq!(cas.sofas().count(), 2);
    Ok(())
}

#[test]
fn create_view_duplicate() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.create_view("other")?;
    let next_id = cas.next_id();
    assert!(matches!(
        cas.create_view("other"),
        Err(CasError::DuplicateView(name)) if name == "other"
    ));
    assert!(matches!(
        cas.create_view(INITIAL_VIEW),
        Err(CasError::DuplicateView(_))
    ));
    //state is unchanged
    assert_eq!(cas.views_len(), 2);
    assert_eq!(cas.next_id(), next_id);
    Ok(())
}

#[test]
fn get_view_missing() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    assert!(matches!(
        cas.get_view("nope"),
        Err(CasError::ViewNotFound(name)) if name == "nope"
    ));
    assert!(matches!(
        cas.get_view_mut("nope"),
        Err(CasError::ViewNotFound(_))
    ));
    assert_eq!(cas.views_len(), 1);
    Ok(())
}

#[test]
fn view_aliasing() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.create_view("X")?;

    //changes through a view are changes to the document
    let handle = cas
        .get_view_mut("X")?
        .add_annotation(FeatureStructureBuilder::new("test.Span").with_span(0, 1))?;
    assert_eq!(cas.get_view("X")?.select_all()?.count(), 1);
    assert_eq!(cas.select_all()?.count(), 0, "initial view is not affected");
    let x = cas.view_handle("X")?;
    assert!(cas.view(x)?.contains(handle));

    //and vice versa
    cas.add_annotation_in(x, FeatureStructureBuilder::new("test.Span").with_span(1, 2))?;
    let view = cas.get_view("X")?;
    assert_eq!(view.select("test.Span")?.count(), 2);
    assert_eq!(view.len(), 2);

    //identifiers are shared across views
    let id = cas.add_annotation(FeatureStructureBuilder::new("test.Span"))?;
    assert_eq!(cas.featurestructure(id)?.id(), 5);
    Ok(())
}

#[test]
fn sofa_accessors() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.set_sofa_string("Hello")?;
    cas.set_sofa_mime("text/plain")?;
    assert_eq!(cas.sofa()?.string(), Some("Hello"));
    assert_eq!(cas.sofa()?.mime(), Some("text/plain"));
    assert_eq!(cas.sofa()?.uri(), None);

    let array = cas.create_fs(
        FeatureStructureBuilder::new(TYPE_NAME_BYTE_ARRAY)
            .with_feature(FEATURE_BASE_NAME_ELEMENTS, vec![1u8, 2, 3]),
    )?;
    let mut view = cas.create_view("data")?;
    view.set_sofa_uri("file:///data.bin")?;
    view.set_sofa_array(array)?;
    let sofa = view.sofa()?;
    assert_eq!(sofa.uri(), Some("file:///data.bin"));
    assert_eq!(sofa.string(), None);
    let elements = sofa.array().unwrap();
    assert_eq!(
        elements.get(FEATURE_BASE_NAME_ELEMENTS).and_then(|v| v.as_bytes()),
        Some(&[1u8, 2, 3][..])
    );
    Ok(())
}

#[test]
fn add_annotation_assigns_ids_and_sofa() -> Result<(), CasError> {
    let (cas, [a, b, c]) = setup_example_1()?;
    let ids: Vec<FsId> = [a, b, c]
        .iter()
        .map(|handle| cas.featurestructure(*handle).map(|fs| fs.id()))
        .collect::<Result<_, _>>()?;
    assert_eq!(ids, vec![2, 3, 4]);
    let fs = cas.featurestructure(a)?;
    assert_eq!(fs.sofa().map(|sofa| sofa.name()), Some(INITIAL_VIEW));
    assert_eq!(cas.featurestructure_by_id(3)?.handle(), b);
    Ok(())
}

#[test]
fn add_annotation_unknown_type() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    let next_id = cas.next_id();
    assert!(matches!(
        cas.add_annotation(FeatureStructureBuilder::new("test.Unknown")),
        Err(CasError::TypeNotFound(name, _)) if name == "test.Unknown"
    ));
    assert_eq!(cas.next_id(), next_id);
    Ok(())
}

#[test]
fn featurestructure_by_id_missing() -> Result<(), CasError> {
    let (cas, _) = setup_example_1()?;
    assert!(matches!(
        cas.featurestructure_by_id(999),
        Err(CasError::IdNotFound(999, _))
    ));
    Ok(())
}

#[test]
fn select_position_order() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.add_annotations([
        FeatureStructureBuilder::new("test.Span").with_feature("label", "nospan"),
        FeatureStructureBuilder::new("test.Span")
            .with_span(5, 8)
            .with_feature("label", "5-8"),
        FeatureStructureBuilder::new("test.Span")
            .with_span(0, 3)
            .with_feature("label", "0-3"),
        FeatureStructureBuilder::new("test.Span")
            .with_span(5, 6)
            .with_feature("label", "5-6"),
        FeatureStructureBuilder::new("test.Span")
            .with_span(5, 8)
            .with_feature("label", "5-8b"),
    ])?;
    assert_eq!(
        labels(cas.select("test.Span")?),
        vec!["0-3", "5-6", "5-8", "5-8b", "nospan"]
    );
    Ok(())
}

#[test]
fn select_includes_subtypes() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.add_annotation(FeatureStructureBuilder::new("test.Token").with_span(4, 9))?;
    cas.add_annotation(FeatureStructureBuilder::new("test.NamedToken").with_span(0, 3))?;
    cas.add_annotation(FeatureStructureBuilder::new("test.Span").with_span(2, 5))?;
    cas.add_annotation(FeatureStructureBuilder::new("test.Relation"))?;

    let types: Vec<String> = cas
        .select("test.Token")?
        .map(|fs| fs.typename().to_string())
        .collect();
    assert_eq!(types, vec!["test.NamedToken", "test.Token"]);

    //merged in position order across types
    let spans: Vec<(i64, i64)> = cas
        .select(TYPE_NAME_ANNOTATION)?
        .filter_map(|fs| fs.span())
        .collect();
    assert_eq!(spans, vec![(0, 3), (2, 5), (4, 9)]);

    assert_eq!(cas.select("test.NamedToken")?.count(), 1);
    assert_eq!(cas.select(TYPE_NAME_TOP)?.count(), 4);
    assert_eq!(cas.select_all()?.count(), 4);
    Ok(())
}

#[test]
fn select_unknown_type() -> Result<(), CasError> {
    let (cas, _) = setup_example_1()?;
    assert!(matches!(
        cas.select("test.Unknown"),
        Err(CasError::TypeNotFound(..))
    ));
    Ok(())
}

#[test]
fn select_covered() -> Result<(), CasError> {
    let (cas, [a, b, _c]) = setup_example_1()?;
    let covered: Vec<FeatureStructureHandle> = cas.select_covered("test.Span", a)?.handles().collect();
    assert_eq!(covered, vec![b]);
    Ok(())
}

#[test]
fn select_covering() -> Result<(), CasError> {
    let (cas, [a, b, c]) = setup_example_1()?;
    let covering: Vec<FeatureStructureHandle> =
        cas.select_covering("test.Span", b)?.handles().collect();
    assert_eq!(covering, vec![a, c]);
    assert_eq!(labels(cas.select_covering("test.Span", c)?), Vec::<String>::new());
    Ok(())
}

#[test]
fn select_covered_boundaries() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    let anchor = cas.add_annotation(FeatureStructureBuilder::new("test.Token").with_span(5, 10))?;
    for (begin, end, label) in [
        (4, 10, "starts before"),
        (5, 11, "ends after"),
        (10, 10, "empty at end"),
        (5, 5, "empty at begin"),
        (9, 10, "tail"),
        (5, 10, "same span"),
        (10, 12, "adjacent"),
        (0, 5, "adjacent before"),
    ] {
        cas.add_annotation(
            FeatureStructureBuilder::new("test.Span")
                .with_span(begin, end)
                .with_feature("label", label),
        )?;
    }
    cas.add_annotation(FeatureStructureBuilder::new("test.Span").with_feature("label", "nospan"))?;
    assert_eq!(
        labels(cas.select_covered("test.Span", anchor)?),
        vec!["empty at begin", "same span", "tail", "empty at end"]
    );
    assert_eq!(
        labels(cas.select_covering("test.Span", anchor)?),
        vec!["starts before", "same span", "ends after"]
    );
    Ok(())
}

#[test]
fn select_covered_requires_span() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    let relation = cas.add_annotation(FeatureStructureBuilder::new("test.Relation"))?;
    assert!(matches!(
        cas.select_covered("test.Span", relation),
        Err(CasError::NotPositional(_))
    ));
    assert!(matches!(
        cas.select_covering("test.Span", relation),
        Err(CasError::NotPositional(_))
    ));
    Ok(())
}

#[test]
fn select_in_other_view() -> Result<(), CasError> {
    let (mut cas, [a, _, _]) = setup_example_1()?;
    let mut view = cas.create_view("other")?;
    view.add_annotation(FeatureStructureBuilder::new("test.Span").with_span(3, 4))?;
    let other = view.handle();
    assert_eq!(cas.select_covered_in(other, "test.Span", a)?.count(), 1);
    assert_eq!(cas.select_covered("test.Span", a)?.count(), 1);
    let view = cas.get_view("other")?;
    assert_eq!(view.select_covered("test.Span", a)?.count(), 1);
    assert_eq!(view.select_covering("test.Span", a)?.count(), 0);
    Ok(())
}

#[test]
fn set_feature_reindexes() -> Result<(), CasError> {
    let (mut cas, [a, b, c]) = setup_example_1()?;
    cas.set_feature(b, FEATURE_BASE_NAME_BEGIN, 12)?;
    cas.set_feature(b, FEATURE_BASE_NAME_END, 13)?;
    let order: Vec<FeatureStructureHandle> = cas.select("test.Span")?.handles().collect();
    assert_eq!(order, vec![a, c, b]);
    assert_eq!(cas.select_covered("test.Span", a)?.count(), 0);

    //non-positional changes keep the position
    cas.set_feature(a, "label", "changed")?;
    assert_eq!(labels(cas.select("test.Span")?), vec!["changed", "C", "B"]);
    Ok(())
}

#[test]
fn covered_text() -> Result<(), CasError> {
    let (cas, [a, b, _]) = setup_example_1()?;
    assert_eq!(cas.featurestructure(a)?.covered_text(), Some("The quick "));
    assert_eq!(cas.featurestructure(b)?.covered_text(), Some("e q"));

    let mut cas = Cas::new(typesystem()?);
    let mut view = cas.create_view("german")?;
    view.set_sofa_string("Grüße aus Köln")?;
    let handle = view.add_annotation(FeatureStructureBuilder::new("test.Span").with_span(10, 14))?;
    assert_eq!(cas.featurestructure(handle)?.covered_text(), Some("Köln"));
    Ok(())
}

#[test]
fn references() -> Result<(), CasError> {
    let cas = setup_example_2()?;
    let relation = cas.select("test.Relation")?.next().unwrap();
    let governor = relation.reference("governor").unwrap();
    assert_eq!(governor.get("pos").unwrap(), "VERB");
    assert_eq!(governor.covered_text(), Some("jumps"));
    let dependent = relation.reference("dependent").unwrap();
    assert_eq!(dependent.typename(), "test.NamedToken");
    assert_eq!(dependent.reference("head").unwrap().handle(), governor.handle());

    let chain = cas.select("test.Chain")?.next().unwrap();
    let links = chain.reference("links").unwrap();
    let texts: Vec<&str> = links
        .references(FEATURE_BASE_NAME_ELEMENTS)
        .filter_map(|token| token.covered_text())
        .collect();
    assert_eq!(texts, vec!["The", "fox", "jumps"]);
    let elements = links
        .get(FEATURE_BASE_NAME_ELEMENTS)
        .and_then(|value| value.as_references())
        .unwrap();
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[1], dependent.handle());
    Ok(())
}

#[test]
fn sofa_follows_last_indexed_view() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.set_sofa_string("AAAAAAAAAA")?;
    let mut view = cas.create_view("other")?;
    view.set_sofa_string("BBBBBBBBBB")?;
    let other = view.handle();
    let handle = cas.add_annotation(FeatureStructureBuilder::new("test.Span").with_span(0, 3))?;
    assert_eq!(cas.featurestructure(handle)?.covered_text(), Some("AAA"));

    cas.add_to_index_in(other, handle, true)?;
    let other_sofa = cas.get_view("other")?.sofa()?.handle();
    let fs = cas.featurestructure(handle)?;
    assert_eq!(fs.sofa().unwrap().handle(), other_sofa);
    assert_eq!(fs.covered_text(), Some("BBB"));
    //still indexed in both views
    assert_eq!(cas.select("test.Span")?.count(), 1);
    assert_eq!(cas.select_in(other, "test.Span")?.count(), 1);

    //a sofa given explicitly is replaced by that of the view as well
    let initial_sofa = cas.sofa()?.handle();
    let handle = cas.get_view_mut("other")?.add_annotation(
        FeatureStructureBuilder::new("test.Span")
            .with_span(0, 3)
            .with_feature(FEATURE_BASE_NAME_SOFA, initial_sofa),
    )?;
    assert_eq!(cas.featurestructure(handle)?.covered_text(), Some("BBB"));
    Ok(())
}

#[test]
fn create_fs_identifier_exhausted() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    assert!(matches!(
        cas.create_fs(FeatureStructureBuilder::new("test.Span").with_id(u64::MAX)),
        Err(CasError::IdOverflow(_))
    ));
    assert_eq!(cas.featurestructures_len(), 1, "nothing was added");
    let handle = cas.create_fs(FeatureStructureBuilder::new("test.Span").with_id(u64::MAX - 1))?;
    assert_eq!(cas.featurestructure(handle)?.id(), u64::MAX - 1);
    assert!(matches!(
        cas.add_annotation(FeatureStructureBuilder::new("test.Span").with_span(0, 1)),
        Err(CasError::IdOverflow(_))
    ));
    Ok(())
}

#[test]
fn select_through_mutable_view() -> Result<(), CasError> {
    let (mut cas, [a, b, c]) = setup_example_1()?;
    let view = cas.get_view_mut(INITIAL_VIEW)?;
    let covered: Vec<FeatureStructureHandle> = view.select_covered("test.Span", a)?.handles().collect();
    assert_eq!(covered, vec![b]);
    let covering: Vec<FeatureStructureHandle> = view.select_covering("test.Span", b)?.handles().collect();
    assert_eq!(covering, vec![a, c]);
    Ok(())
}

#[test]
fn create_fs_and_add_to_index() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    let handle = cas.create_fs(FeatureStructureBuilder::new("test.Span").with_span(0, 4))?;
    assert_eq!(cas.select_all()?.count(), 0, "created structures are not indexed");
    assert_eq!(cas.featurestructure(handle)?.id(), 2);

    cas.add_to_index(handle, false)?;
    assert_eq!(cas.featurestructure(handle)?.id(), 3, "a fresh identifier is assigned");
    assert!(matches!(cas.featurestructure_by_id(2), Err(CasError::IdNotFound(..))));
    assert_eq!(cas.featurestructure_by_id(3)?.handle(), handle);
    assert!(cas.featurestructure(handle)?.sofa().is_some());

    let kept = cas.create_fs(FeatureStructureBuilder::new("test.Span").with_id(100))?;
    cas.get_view_mut(INITIAL_VIEW)?.add_to_index(kept, true)?;
    assert_eq!(cas.featurestructure(kept)?.id(), 100);
    assert_eq!(cas.select_all()?.count(), 2);
    assert_eq!(cas.next_id(), 101);
    Ok(())
}

#[test]
fn create_fs_duplicate_id() -> Result<(), CasError> {
    let mut cas = Cas::new(typesystem()?);
    cas.create_fs(FeatureStructureBuilder::new("test.Span").with_id(10))?;
    assert!(matches!(
        cas.create_fs(FeatureStructureBuilder::new("test.Span").with_id(10)),
        Err(CasError::DuplicateId(10, _))
    ));
    assert!(matches!(
        cas.create_fs(FeatureStructureBuilder::new("test.Span").with_id(1)),
        Err(CasError::DuplicateId(1, _)),
    ));
    Ok(())
}
