//! Per-source field mapping and category filtering.
//!
//! A [`FieldMapper`] is built once per adapter and never mutated. It renames
//! source attribute keys to [`CanonicalField`]s and holds the category
//! allow-list that decides which records are worth importing.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{CanonicalField, FieldMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapper {
    mapping: BTreeMap<String, CanonicalField>,
    categories: Option<BTreeSet<String>>,
}

impl FieldMapper {
    pub fn new<I, K, C>(mapping: I, categories: Option<C>) -> Self
    where
        I: IntoIterator<Item = (K, CanonicalField)>,
        K: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            mapping: mapping.into_iter().map(|(k, f)| (k.into(), f)).collect(),
            categories: categories.map(|c| c.into_iter().map(Into::into).collect()),
        }
    }

    pub fn canonical(&self, source_key: &str) -> Option<CanonicalField> {
        self.mapping.get(source_key).copied()
    }

    /// Source keys and the canonical field each maps to, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, CanonicalField)> {
        self.mapping.iter().map(|(k, f)| (k.as_str(), *f))
    }

    pub fn categories(&self) -> Option<&BTreeSet<String>> {
        self.categories.as_ref()
    }

    /// Rename recognized keys and drop the rest. A later pair with the same
    /// canonical field overwrites an earlier one.
    pub fn map_pairs<I, K, V>(&self, pairs: I) -> FieldMap
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut fields = FieldMap::new();
        for (key, value) in pairs {
            if let Some(field) = self.canonical(key.as_ref()) {
                fields.insert(field, value.into());
            }
        }
        fields
    }

    /// True iff an allow-list is configured and the record's category is on it.
    pub fn is_interesting(&self, fields: &FieldMap) -> bool {
        match (&self.categories, fields.get(&CanonicalField::Category)) {
            (Some(allowed), Some(category)) => allowed.contains(category),
            _ => false,
        }
    }

    /// Copy of this mapper with its tables replaced where `Some`.
    pub fn with_overrides(
        &self,
        mapping: Option<&BTreeMap<String, CanonicalField>>,
        categories: Option<&[String]>,
    ) -> Self {
        Self {
            mapping: mapping.cloned().unwrap_or_else(|| self.mapping.clone()),
            categories: categories
                .map(|c| c.iter().cloned().collect())
                .or_else(|| self.categories.clone()),
        }
    }
}
