/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module implements the selection of feature structures from a view: by type
//! (including subtypes), by containment in an anchor span, or by containing it.
//! It also contains the high-level API on [`ResultItem<FeatureStructure>`].

use smallvec::SmallVec;

use crate::cas::{Cas, CasView, CasViewMut};
use crate::error::CasError;
use crate::featurestructure::*;
use crate::sofa::Sofa;
use crate::store::*;
use crate::typesystem::FEATURE_BASE_NAME_SOFA;
use crate::view::{IndexEntry, View, ViewHandle};

/// Restricts which entries a [`FeatureStructuresIter`] yields
#[derive(Clone, Copy, Debug, PartialEq)]
enum SpanFilter {
    None,
    /// Only structures whose span lies within `begin..end`, the anchor itself excluded
    CoveredBy {
        begin: i64,
        end: i64,
        anchor: FeatureStructureHandle,
    },
    /// Only structures whose span contains `begin..end`, the anchor itself excluded
    Covering {
        begin: i64,
        end: i64,
        anchor: FeatureStructureHandle,
    },
}

impl SpanFilter {
    fn accepts(&self, handle: FeatureStructureHandle, fs: &FeatureStructure) -> bool {
        match *self {
            Self::None => true,
            Self::CoveredBy { begin, end, anchor } => {
                handle != anchor
                    && matches!(fs.span(), Some((b, e)) if b >= begin && e <= end)
            }
            Self::Covering { begin, end, anchor } => {
                handle != anchor
                    && matches!(fs.span(), Some((b, e)) if b <= begin && e >= end)
            }
        }
    }
}

/// Iterator over feature structures from one or more index buckets of a view.
/// Entries from different buckets are merged by their `(begin, end)` key, so the
/// result is in position order; ties are yielded bucket by bucket.
pub struct FeatureStructuresIter<'cas> {
    cas: &'cas Cas,
    buckets: SmallVec<[&'cas [IndexEntry]; 4]>,
    filter: SpanFilter,
}

impl<'cas> FeatureStructuresIter<'cas> {
    fn new(
        cas: &'cas Cas,
        buckets: SmallVec<[&'cas [IndexEntry]; 4]>,
        filter: SpanFilter,
    ) -> Self {
        Self {
            cas,
            buckets,
            filter,
        }
    }

    /// Returns the handles rather than the feature structures
    pub fn handles(self) -> impl Iterator<Item = FeatureStructureHandle> + 'cas {
        self.map(|fs| fs.handle())
    }
}

impl<'cas> Iterator for FeatureStructuresIter<'cas> {
    type Item = ResultItem<'cas, FeatureStructure>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut best: Option<usize> = None;
            for (i, bucket) in self.buckets.iter().enumerate() {
                if let Some(entry) = bucket.first() {
                    match best {
                        Some(b) if self.buckets[b][0].key <= entry.key => {}
                        _ => best = Some(i),
                    }
                }
            }
            let i = best?;
            let bucket = self.buckets[i];
            let entry = bucket[0];
            self.buckets[i] = &bucket[1..];
            if let Ok(fs) = self.cas.featurestructure(entry.handle) {
                if self.filter.accepts(entry.handle, &fs) {
                    return Some(fs);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.buckets.iter().map(|bucket| bucket.len()).sum();
        if self.filter == SpanFilter::None {
            (upper, Some(upper))
        } else {
            (0, Some(upper))
        }
    }
}

impl Cas {
    /// Collects the index buckets of the type and all its subtypes
    fn buckets<'cas>(
        &'cas self,
        view: ViewHandle,
        typename: &str,
    ) -> Result<SmallVec<[&'cas [IndexEntry]; 4]>, CasError> {
        let typesystem = self.typesystem();
        if typesystem.get_type(typename).is_none() {
            return Err(CasError::TypeNotFound(typename.to_string(), "in selection"));
        }
        let mut typenames: Vec<&str> = typesystem.subtypes(typename);
        typenames.push(typename);
        typenames.sort_unstable();
        typenames.dedup();
        let view: &'cas View = self.get(view)?;
        Ok(typenames
            .into_iter()
            .map(|typename| view.bucket(typename))
            .filter(|bucket| !bucket.is_empty())
            .collect())
    }

    /// Returns the span of the anchor of a covered/covering selection
    fn anchor_span(&self, anchor: FeatureStructureHandle) -> Result<(i64, i64), CasError> {
        let fs: &FeatureStructure = self.get(anchor)?;
        fs.span()
            .ok_or(CasError::NotPositional("anchor of covered/covering selection"))
    }

    /// Selects all feature structures of the type, or any of its subtypes, from the initial view
    pub fn select(&self, typename: &str) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.select_in(self.current_view, typename)
    }

    pub fn select_in(
        &self,
        view: ViewHandle,
        typename: &str,
    ) -> Result<FeatureStructuresIter<'_>, CasError> {
        let buckets = self.buckets(view, typename)?;
        Ok(FeatureStructuresIter::new(self, buckets, SpanFilter::None))
    }

    /// Selects the feature structures of the type (or subtypes) from the initial view whose span lies
    /// entirely within the span of the anchor. The anchor itself is never included.
    pub fn select_covered(
        &self,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.select_covered_in(self.current_view, typename, anchor)
    }

    pub fn select_covered_in(
        &self,
        view: ViewHandle,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'_>, CasError> {
        let (begin, end) = self.anchor_span(anchor)?;
        let buckets = self
            .buckets(view, typename)?
            .into_iter()
            .map(|bucket| {
                //candidates start at `begin` and start no later than `end`
                let lower = bucket.partition_point(|entry| entry.key < (begin, i64::MIN));
                let upper = bucket.partition_point(|entry| entry.key <= (end, i64::MAX));
                &bucket[lower..upper.max(lower)]
            })
            .collect();
        Ok(FeatureStructuresIter::new(
            self,
            buckets,
            SpanFilter::CoveredBy { begin, end, anchor },
        ))
    }

    /// Selects the feature structures of the type (or subtypes) from the initial view whose span
    /// entirely contains the span of the anchor. The anchor itself is never included.
    /// This scans all structures of the type and may be slow on large documents.
    pub fn select_covering(
        &self,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.select_covering_in(self.current_view, typename, anchor)
    }

    pub fn select_covering_in(
        &self,
        view: ViewHandle,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'_>, CasError> {
        let (begin, end) = self.anchor_span(anchor)?;
        let buckets = self.buckets(view, typename)?;
        Ok(FeatureStructuresIter::new(
            self,
            buckets,
            SpanFilter::Covering { begin, end, anchor },
        ))
    }

    /// Selects every feature structure in the index of the initial view
    pub fn select_all(&self) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.select_all_in(self.current_view)
    }

    pub fn select_all_in(&self, view: ViewHandle) -> Result<FeatureStructuresIter<'_>, CasError> {
        let view: &View = self.get(view)?;
        let buckets = view.index.values().map(|bucket| bucket.as_slice()).collect();
        Ok(FeatureStructuresIter::new(self, buckets, SpanFilter::None))
    }
}

impl<'cas> CasView<'cas> {
    pub fn select(&self, typename: &str) -> Result<FeatureStructuresIter<'cas>, CasError> {
        self.cas().select_in(self.handle(), typename)
    }

    pub fn select_covered(
        &self,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'cas>, CasError> {
        self.cas().select_covered_in(self.handle(), typename, anchor)
    }

    pub fn select_covering(
        &self,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'cas>, CasError> {
        self.cas().select_covering_in(self.handle(), typename, anchor)
    }

    pub fn select_all(&self) -> Result<FeatureStructuresIter<'cas>, CasError> {
        self.cas().select_all_in(self.handle())
    }
}

impl<'cas> CasViewMut<'cas> {
    pub fn select(&self, typename: &str) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.as_view().select(typename)
    }

    pub fn select_covered(
        &self,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.as_view().select_covered(typename, anchor)
    }

    pub fn select_covering(
        &self,
        typename: &str,
        anchor: FeatureStructureHandle,
    ) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.as_view().select_covering(typename, anchor)
    }

    pub fn select_all(&self) -> Result<FeatureStructuresIter<'_>, CasError> {
        self.as_view().select_all()
    }
}

/// Slices a text by unicode codepoint offsets
pub(crate) fn slice_codepoints(text: &str, begin: i64, end: i64) -> Option<&str> {
    if begin < 0 || end < begin {
        return None;
    }
    let mut offsets = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()));
    let bytebegin = offsets.nth(begin as usize)?;
    let byteend = if end == begin {
        bytebegin
    } else {
        offsets.nth((end - begin - 1) as usize)?
    };
    Some(&text[bytebegin..byteend])
}

impl<'store> ResultItem<'store, FeatureStructure> {
    /// Follows a reference feature
    pub fn reference(&self, feature: &str) -> Option<ResultItem<'store, FeatureStructure>> {
        let handle = self.as_ref().get(feature)?.as_reference()?;
        self.store().featurestructure(handle).ok()
    }

    /// Follows a multi-valued reference feature (such as the elements of an `FSArray`)
    pub fn references(
        &self,
        feature: &str,
    ) -> impl Iterator<Item = ResultItem<'store, FeatureStructure>> {
        let store = self.store();
        self.as_ref()
            .get(feature)
            .map(|value| value.references())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |handle| store.featurestructure(*handle).ok())
    }

    /// Returns the Sofa this structure is attached to, if any
    pub fn sofa(&self) -> Option<Sofa<'store>> {
        self.reference(FEATURE_BASE_NAME_SOFA).map(Sofa::new)
    }

    /// Returns the text covered by this annotation, offsets are interpreted as unicode codepoints.
    /// Returns None if the structure has no span, no Sofa with text, or if the span is out of bounds.
    pub fn covered_text(&self) -> Option<&'store str> {
        let (begin, end) = self.as_ref().span()?;
        let text = self.sofa()?.string()?;
        slice_codepoints(text, begin, end)
    }
}
