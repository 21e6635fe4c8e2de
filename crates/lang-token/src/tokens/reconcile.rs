use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FlatTokenMap, PATH_SEPARATOR};

/// Group prefix used for keys without a namespace segment.
pub const ROOT_PREFIX: &str = "root";

/// Keys sharing the same top-level namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGroup {
    pub prefix: String,
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Namespace a key belongs to: its first segment, or [`ROOT_PREFIX`] when the
/// key has no separator or starts with one.
pub fn group_prefix(key: &str) -> &str {
    match key.split_once(PATH_SEPARATOR) {
        Some((head, _)) if !head.is_empty() => head,
        _ => ROOT_PREFIX,
    }
}

/// Holds the reference and target token sets of one editing session and the
/// views derived from them.
///
/// Every mutation of token data bumps `revision`. The grouped view remembers
/// the revision it was built for and is only rebuilt when the two differ, so
/// repeated reads between mutations cost nothing.
#[derive(Debug, Clone)]
pub struct Reconciler {
    reference: FlatTokenMap,
    target: FlatTokenMap,
    missing: IndexSet<String>,
    missing_only: bool,
    pictures: BTreeMap<String, String>,
    groups: Vec<TokenGroup>,
    revision: u64,
    computed_revision: Option<u64>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            reference: FlatTokenMap::new(),
            target: FlatTokenMap::new(),
            missing: IndexSet::new(),
            missing_only: false,
            pictures: BTreeMap::new(),
            groups: Vec::new(),
            revision: 0,
            computed_revision: None,
        }
    }

    /// Replace the reference set wholesale and recompute derived views.
    pub fn load_reference(&mut self, reference: FlatTokenMap) {
        self.reference = reference;
        self.detect_missing();
    }

    /// Replace the target set wholesale and recompute derived views.
    pub fn load_target(&mut self, target: FlatTokenMap) {
        self.target = target;
        self.detect_missing();
    }

    /// Recompute the missing set from the current reference and target.
    ///
    /// Always counts as a mutation, even when the result is unchanged.
    pub fn detect_missing(&mut self) {
        self.missing = self
            .reference
            .keys()
            .filter(|key| self.target.get(key.as_str()).is_none_or(|value| value.trim().is_empty()))
            .cloned()
            .collect();
        self.revision += 1;
        debug!(
            reference = self.reference.len(),
            target = self.target.len(),
            missing = self.missing.len(),
            revision = self.revision,
            "missing tokens detected"
        );
        self.compute_groups();
    }

    /// Rebuild the grouped view unless it already matches the current revision.
    pub fn compute_groups(&mut self) {
        if self.computed_revision == Some(self.revision) {
            return;
        }
        self.computed_revision = Some(self.revision);

        let mut buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in self.tokens_to_show() {
            buckets.entry(group_prefix(&key).to_string()).or_default().push(key);
        }

        self.groups = buckets
            .into_iter()
            .map(|(prefix, tokens)| {
                let picture = self.pictures.get(&prefix).cloned();
                TokenGroup { prefix, tokens, picture }
            })
            .collect();
        debug!(groups = self.groups.len(), revision = self.revision, "token groups rebuilt");
    }

    /// Grouped view for the current revision, rebuilding it first if stale.
    pub fn groups(&mut self) -> &[TokenGroup] {
        self.compute_groups();
        &self.groups
    }

    /// Grouped view as of the last recomputation.
    pub fn cached_groups(&self) -> &[TokenGroup] {
        &self.groups
    }

    /// Keys the grouped view is built from.
    ///
    /// In missing-only mode this is the missing set in reference order;
    /// otherwise the sorted union of reference and target keys. Nothing is
    /// shown while the reference set is empty.
    pub fn tokens_to_show(&self) -> Vec<String> {
        if self.reference.is_empty() {
            return Vec::new();
        }
        if self.missing_only {
            return self.missing.iter().cloned().collect();
        }
        let union: BTreeSet<&String> = self.reference.keys().chain(self.target.keys()).collect();
        union.into_iter().cloned().collect()
    }

    pub fn missing_only(&self) -> bool {
        self.missing_only
    }

    /// Switch between the missing-only and full views.
    pub fn set_missing_only(&mut self, missing_only: bool) {
        self.missing_only = missing_only;
        self.revision += 1;
        self.compute_groups();
    }

    /// Edit a single target token.
    ///
    /// The missing set is left untouched until [`Reconciler::detect_missing`]
    /// runs again.
    pub fn set_token(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.target.insert(key.into(), value.into());
        self.revision += 1;
    }

    /// Drop a single target token, returning its previous value.
    pub fn remove_token(&mut self, key: &str) -> Option<String> {
        let removed = self.target.shift_remove(key);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Associate a picture with a namespace prefix.
    ///
    /// Pictures are metadata: the revision is not bumped, the cached group
    /// for `prefix` (if any) is updated in place.
    pub fn attach_picture(&mut self, prefix: impl Into<String>, picture: impl Into<String>) {
        let prefix = prefix.into();
        let picture = picture.into();
        if let Some(group) = self.groups.iter_mut().find(|group| group.prefix == prefix) {
            group.picture = Some(picture.clone());
        }
        self.pictures.insert(prefix, picture);
    }

    /// Replace all picture metadata at once.
    pub fn set_pictures(&mut self, pictures: BTreeMap<String, String>) {
        self.pictures = pictures;
        for group in &mut self.groups {
            group.picture = self.pictures.get(&group.prefix).cloned();
        }
    }

    pub fn pictures(&self) -> &BTreeMap<String, String> {
        &self.pictures
    }

    /// Missing keys in reference order.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.missing.iter().map(String::as_str)
    }

    pub fn is_missing(&self, key: &str) -> bool {
        self.missing.contains(key)
    }

    pub fn reference(&self) -> &FlatTokenMap {
        &self.reference
    }

    pub fn target(&self) -> &FlatTokenMap {
        &self.target
    }

    pub fn reference_count(&self) -> usize {
        self.reference.len()
    }

    pub fn target_count(&self) -> usize {
        self.target.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision the cached groups were built for, `None` before the first build.
    pub fn computed_revision(&self) -> Option<u64> {
        self.computed_revision
    }
}
