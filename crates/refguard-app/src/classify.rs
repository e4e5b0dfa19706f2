// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;

use crate::{MatchResult, ReferenceSet};

/// Classifies typed input against a reference set.
///
/// An empty reference set always yields [`MatchResult::NoReferenceData`], even
/// for blank input. Blank input against a populated set is
/// [`MatchResult::NoMatch`]; callers are expected to skip validation for blank
/// fields before classifying. Matching ignores case using Unicode lowercase
/// folding, and a partial match requires the input to appear inside the
/// candidate, not the other way around.
pub fn classify(input: &str, reference: &ReferenceSet) -> MatchResult {
    if reference.is_empty() {
        return MatchResult::NoReferenceData;
    }
    if is_blank(input) {
        return MatchResult::NoMatch;
    }

    let needle = fold(input);
    if let Some(exact) = reference.iter().find(|entry| fold(entry) == needle) {
        return MatchResult::Exact(exact.to_owned());
    }

    let mut candidates: Vec<String> = reference
        .iter()
        .filter(|entry| fold(entry).contains(&needle))
        .map(str::to_owned)
        .collect();
    if candidates.is_empty() {
        return MatchResult::NoMatch;
    }

    candidates.sort_by(|left, right| compare_alphabetical(left, right));
    candidates.dedup();
    MatchResult::Partial(candidates)
}

pub fn is_blank(input: &str) -> bool {
    input.trim().is_empty()
}

/// Culture-invariant case folding used for every comparison.
pub fn fold(value: &str) -> String {
    value.to_lowercase()
}

/// Alphabetical order on the folded value with an ordinal tie-break, so the
/// result never depends on the reference set's original order.
pub fn compare_alphabetical(left: &str, right: &str) -> Ordering {
    fold(left).cmp(&fold(right)).then_with(|| left.cmp(right))
}
