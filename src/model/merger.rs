//! Combining metadata from several sources

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::builder::apply_comment_fallbacks;
use super::definitions::SchemaObject;
use super::schema_metadata::SchemaMetadata;
use crate::error::AnalyzerError;

/// What to do when two inputs define the same object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep every definition
    #[default]
    KeepAll,
    /// Keep the definition seen first
    KeepFirst,
    /// Keep the definition seen last
    KeepLast,
    /// Fail with [`AnalyzerError::DuplicateObject`]
    Error,
}

/// Concatenates metadata aggregates kind by kind
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaMerger {
    policy: DuplicatePolicy,
}

impl SchemaMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Merge `inputs` in order. Each kind keeps source order.
    ///
    /// `COMMENT ON` fallbacks are re-applied across the merged inputs.
    pub fn merge(&self, inputs: &[SchemaMetadata]) -> Result<SchemaMetadata, AnalyzerError> {
        let mut merged = SchemaMetadata::new();
        if let Some(latest) = inputs.iter().map(|m| m.analyzed_at).max() {
            merged.analyzed_at = latest;
        }

        merged.tables = self.combine(inputs, |m| &m.tables)?;
        merged.columns = self.combine(inputs, |m| &m.columns)?;
        merged.views = self.combine(inputs, |m| &m.views)?;
        merged.enum_types = self.combine(inputs, |m| &m.enum_types)?;
        merged.composite_types = self.combine(inputs, |m| &m.composite_types)?;
        merged.domain_types = self.combine(inputs, |m| &m.domain_types)?;
        merged.functions = self.combine(inputs, |m| &m.functions)?;
        merged.indexes = self.combine(inputs, |m| &m.indexes)?;
        merged.triggers = self.combine(inputs, |m| &m.triggers)?;
        merged.constraints = self.combine(inputs, |m| &m.constraints)?;
        merged.partitions = self.combine(inputs, |m| &m.partitions)?;
        merged.comments = self.combine(inputs, |m| &m.comments)?;

        for input in inputs {
            for path in &input.source_paths {
                merged.add_source_path(path);
            }
            merged.issues.extend(input.issues.iter().cloned());
        }

        // Comments may live in a different file than their target
        apply_comment_fallbacks(&mut merged);
        Ok(merged)
    }

    fn combine<T, F>(&self, inputs: &[SchemaMetadata], list: F) -> Result<Vec<T>, AnalyzerError>
    where
        T: SchemaObject + Clone,
        F: Fn(&SchemaMetadata) -> &Vec<T>,
    {
        let all = inputs.iter().flat_map(|m| list(m).iter());
        match self.policy {
            DuplicatePolicy::KeepAll => Ok(all.cloned().collect()),
            DuplicatePolicy::KeepFirst => {
                let mut seen = HashSet::new();
                Ok(all
                    .filter(|item| keep_unseen(&mut seen, *item))
                    .cloned()
                    .collect())
            }
            DuplicatePolicy::KeepLast => {
                let items: Vec<&T> = all.collect();
                let mut seen = HashSet::new();
                let mut kept: Vec<T> = items
                    .into_iter()
                    .rev()
                    .filter(|item| keep_unseen(&mut seen, *item))
                    .cloned()
                    .collect();
                kept.reverse();
                Ok(kept)
            }
            DuplicatePolicy::Error => {
                let mut seen = HashSet::new();
                let mut kept = Vec::new();
                for item in all {
                    let key = item.identity_key();
                    if !seen.insert(key.clone()) {
                        return Err(AnalyzerError::DuplicateObject {
                            kind: T::KIND.to_string(),
                            key,
                        });
                    }
                    kept.push(item.clone());
                }
                Ok(kept)
            }
        }
    }
}

fn keep_unseen<T: SchemaObject>(seen: &mut HashSet<String>, item: &T) -> bool {
    let key = item.identity_key();
    if seen.insert(key) {
        true
    } else {
        debug!(kind = T::KIND, key = %item.identity_key(), "Dropping duplicate definition");
        false
    }
}
