//! Stage ratio table.
//!
//! Maps each secondary stage to the multiplier applied to the primary's
//! target. Built once from configuration text and immutable afterwards.

use std::collections::HashSet;

use ss_core::{Real, StageId};

use crate::error::ConfigFault;

/// Smallest accepted ratio.
pub const RATIO_MIN: Real = 0.0;
/// Largest accepted ratio.
pub const RATIO_MAX: Real = 2.0;

/// One secondary stage and its temperature ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioEntry {
    pub stage_id: StageId,
    pub ratio: Real,
}

/// Ordered, validated stage → ratio mapping.
///
/// # Example
///
/// ```
/// use ss_controls::RatioTable;
///
/// let table = RatioTable::parse_lists("stage_a, stage_b", "0.5, 1.0").unwrap();
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.ratio_for("stage_a"), Some(0.5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RatioTable {
    entries: Vec<RatioEntry>,
}

impl RatioTable {
    /// Build the table from positionally matched stage ids and ratio strings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigFault`] if the lists differ in length, a stage id is
    /// blank or repeated, a ratio does not parse, or a ratio lies outside
    /// `[RATIO_MIN, RATIO_MAX]`. Out-of-range ratios are never clamped.
    pub fn build<S, R>(stage_ids: &[S], ratios: &[R]) -> Result<Self, ConfigFault>
    where
        S: AsRef<str>,
        R: AsRef<str>,
    {
        if stage_ids.len() != ratios.len() {
            return Err(ConfigFault::ArityMismatch {
                stages: stage_ids.len(),
                ratios: ratios.len(),
            });
        }
        if stage_ids.is_empty() {
            return Err(ConfigFault::NoStages);
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(stage_ids.len());
        for (index, (raw_id, raw_ratio)) in stage_ids.iter().zip(ratios).enumerate() {
            let stage_id = StageId::new(raw_id);
            if stage_id.is_empty() {
                return Err(ConfigFault::EmptyStageId { index });
            }
            if !seen.insert(stage_id.clone()) {
                return Err(ConfigFault::DuplicateStage { stage_id });
            }
            let ratio = parse_ratio(&stage_id, raw_ratio.as_ref())?;
            tracing::info!("StageSync stage: {} with temp_ratio: {}", stage_id, ratio);
            entries.push(RatioEntry { stage_id, ratio });
        }

        Ok(Self { entries })
    }

    /// Build the table from comma-separated option values
    /// (`stages: a, b` / `temp_ratio: 0.5, 1.0`).
    pub fn parse_lists(stages: &str, ratios: &str) -> Result<Self, ConfigFault> {
        let stage_ids: Vec<&str> = stages.split(',').collect();
        let ratio_texts: Vec<&str> = ratios.split(',').collect();
        Self::build(&stage_ids, &ratio_texts)
    }

    pub fn entries(&self) -> &[RatioEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &RatioEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = &StageId> {
        self.entries.iter().map(|e| &e.stage_id)
    }

    pub fn contains(&self, stage_id: &str) -> bool {
        self.ratio_for(stage_id).is_some()
    }

    pub fn ratio_for(&self, stage_id: &str) -> Option<Real> {
        self.entries
            .iter()
            .find(|e| e.stage_id.as_str() == stage_id)
            .map(|e| e.ratio)
    }
}

impl<'a> IntoIterator for &'a RatioTable {
    type Item = &'a RatioEntry;
    type IntoIter = std::slice::Iter<'a, RatioEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Parse and bound-check one ratio value.
pub fn parse_ratio(stage_id: &StageId, raw: &str) -> Result<Real, ConfigFault> {
    let raw = raw.trim();
    let ratio: Real = raw.parse().map_err(|_| ConfigFault::MalformedRatio {
        stage_id: stage_id.clone(),
        raw: raw.to_string(),
    })?;
    validate_ratio(stage_id, ratio)
}

/// Check `RATIO_MIN <= ratio <= RATIO_MAX`; NaN fails.
pub fn validate_ratio(stage_id: &StageId, ratio: Real) -> Result<Real, ConfigFault> {
    if (RATIO_MIN..=RATIO_MAX).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(ConfigFault::RatioOutOfBounds {
            stage_id: stage_id.clone(),
            ratio,
        })
    }
}
