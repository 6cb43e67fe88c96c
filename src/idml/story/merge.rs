//! Coalescing of adjacent runs whose formatting differs only in ignored
//! attributes and properties.

use super::element::{StoryChildElement, StyledElement};
use super::style_range::StyleRanges;
use crate::idml::markup::{Element, Property};
use crate::idml::parameters::{StyleIgnorances, Thresholds};

pub struct StoryChildElementsMerger<'a> {
    ignorances: &'a StyleIgnorances,
}

impl<'a> StoryChildElementsMerger<'a> {
    pub fn new(ignorances: &'a StyleIgnorances) -> Self {
        Self { ignorances }
    }

    /// Single left-to-right pass over neighbouring pairs.
    ///
    /// Two `Content` runs with mergeable ranges become one run. Other
    /// neighbours with mergeable ranges both take the smaller ranges, so
    /// that no boundary is written between them.
    pub fn merge(&self, elements: Vec<StoryChildElement>) -> Vec<StoryChildElement> {
        if elements.len() < 2 || self.ignorances.is_empty() {
            return elements;
        }
        let mut merged = Vec::with_capacity(elements.len());
        let mut iter = elements.into_iter();
        let Some(mut current) = iter.next() else {
            return merged;
        };
        for next in iter {
            let ranges = match (current.style_ranges(), next.style_ranges()) {
                (Some(a), Some(b)) if self.can_style_ranges_be_merged(a, b) => Some(smaller(a, b).clone()),
                _ => None,
            };
            match ranges {
                Some(ranges) if current.is_content() && next.is_content() => {
                    current = merge_contents(&current, &next, ranges);
                },
                Some(ranges) => {
                    merged.push(current.with_style_ranges(ranges.clone()));
                    current = next.with_style_ranges(ranges);
                },
                None => {
                    merged.push(current);
                    current = next;
                },
            }
        }
        merged.push(current);
        merged
    }

    fn can_style_ranges_be_merged(&self, current: &StyleRanges, next: &StyleRanges) -> bool {
        self.can_attributes_be_merged(current, next) && self.can_properties_be_merged(current, next)
    }

    fn can_attributes_be_merged(&self, current: &StyleRanges, next: &StyleRanges) -> bool {
        let (current_exact, current_ignored) = self.split_attributes(current);
        let (next_exact, next_ignored) = self.split_attributes(next);
        current_exact == next_exact
            && windows_accept(&current_ignored, &next_ignored, |name| self.ignorances.attribute(name))
    }

    fn can_properties_be_merged(&self, current: &StyleRanges, next: &StyleRanges) -> bool {
        let (current_exact, current_ignored) = self.split_properties(current);
        let (next_exact, next_ignored) = self.split_properties(next);
        same_set(&current_exact, &next_exact)
            && windows_accept(&current_ignored, &next_ignored, |name| self.ignorances.property(name))
    }

    /// Exactly compared attributes, sorted, and ignored ones with their values.
    fn split_attributes(&self, ranges: &StyleRanges) -> (Vec<(String, String)>, Vec<(String, String)>) {
        let mut exact = Vec::new();
        let mut ignored = Vec::new();
        for (name, value) in ranges.combined_attributes() {
            let target = if self.ignorances.attribute(name).is_some() {
                &mut ignored
            } else {
                &mut exact
            };
            target.push((name.to_string(), value.to_string()));
        }
        exact.sort();
        exact.dedup();
        (exact, ignored)
    }

    fn split_properties<'r>(&self, ranges: &'r StyleRanges) -> (Vec<&'r Property>, Vec<(String, String)>) {
        let mut exact = Vec::new();
        let mut ignored = Vec::new();
        for property in ranges.combined_properties() {
            let name = property.name();
            if self.ignorances.property(&name).is_some() {
                ignored.push((name, property.value().to_string()));
            } else {
                exact.push(property);
            }
        }
        (exact, ignored)
    }
}

/// Common names must have both values inside the window; a name present
/// on one side only is accepted when its window is unbounded.
fn windows_accept<'t>(
    current: &[(String, String)],
    next: &[(String, String)],
    thresholds: impl Fn(&str) -> Option<&'t Thresholds>,
) -> bool {
    let lookup = |list: &'_ [(String, String)], name: &str| -> Option<String> {
        list.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    };
    let accepts = |name: &str, other: &[(String, String)], value: &str| match thresholds(name) {
        None => false,
        Some(window) => match lookup(other, name) {
            Some(other_value) => window.accepts(value, &other_value),
            None => window.is_empty(),
        },
    };
    current.iter().all(|(name, value)| accepts(name, next, value))
        && next.iter().all(|(name, value)| accepts(name, current, value))
}

fn same_set(a: &[&Property], b: &[&Property]) -> bool {
    a.iter().all(|p| b.contains(p)) && b.iter().all(|p| a.contains(p))
}

/// The ranges with fewer attributes and properties, the first on a tie.
fn smaller<'r>(current: &'r StyleRanges, next: &'r StyleRanges) -> &'r StyleRanges {
    if current.amount() <= next.amount() { current } else { next }
}

fn merge_contents(current: &StoryChildElement, next: &StoryChildElement, ranges: StyleRanges) -> StoryChildElement {
    let (StoryChildElement::Content(a), StoryChildElement::Content(b)) = (current, next) else {
        return current.clone();
    };
    let end = match &a.element.end {
        Some(end) => end.clone(),
        None => a.element.start.to_end().into_owned(),
    };
    let inner = a
        .element
        .inner
        .iter()
        .chain(b.element.inner.iter())
        .cloned()
        .collect::<Vec<_>>();
    let end = if inner.is_empty() && a.element.end.is_none() {
        None
    } else {
        Some(end)
    };
    StoryChildElement::Content(StyledElement::new(
        Element::new(a.element.start.clone(), inner, end),
        ranges,
    ))
}
