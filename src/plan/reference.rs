//! Reference image choice for subject transfer.

use super::types::ReferenceCursor;
use crate::config::SelectionMode;
use crate::error::{GenError, Result};
use crate::resource::{ResourcePool, SelectionRule, covered_groups};
use rand::Rng;
use rand::seq::SliceRandom;

/// Picks exactly one reference per group.
///
/// Order of precedence for group `i`: the i-th pair when both pools list
/// specified items, then specified references within coverage, then the
/// exhaustion cycle (every reference once before any is reused). When
/// coverage applies, the cycle leaves the specified references out.
#[derive(Debug, Clone)]
pub struct ReferencePicker {
    rule: SelectionRule,
    pairs: Vec<String>,
    covered: usize,
    /// Coverage (not pairing) governs the specified references.
    by_coverage: bool,
    cursor: ReferenceCursor,
    last: Option<String>,
}

impl ReferencePicker {
    /// `product_specified` is the resolved product specified list; pairing is
    /// active when it and the reference specified list are both non-empty.
    pub fn new(rule: SelectionRule, product_specified: &[String], group_count: usize) -> Self {
        let pairs: Vec<String> = if product_specified.is_empty() {
            Vec::new()
        } else {
            rule.specified
                .iter()
                .take(product_specified.len())
                .cloned()
                .collect()
        };
        let by_coverage = pairs.is_empty() && !rule.specified.is_empty();
        let covered = if by_coverage {
            covered_groups(rule.coverage_percent, group_count)
        } else {
            0
        };

        Self {
            rule,
            pairs,
            covered,
            by_coverage,
            cursor: ReferenceCursor::default(),
            last: None,
        }
    }

    /// Number of leading groups built from positional pairs.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn cursor(&self) -> &ReferenceCursor {
        &self.cursor
    }

    pub fn pick<R: Rng + ?Sized>(
        &mut self,
        pool: &ResourcePool,
        index: usize,
        rng: &mut R,
    ) -> Result<String> {
        let picked = if let Some(paired) = self.pairs.get(index) {
            paired.clone()
        } else if index < self.covered {
            self.rule.specified[index % self.rule.specified.len()].clone()
        } else {
            self.next_in_cycle(pool, rng)?
        };
        self.last = Some(picked.clone());
        Ok(picked)
    }

    fn next_in_cycle<R: Rng + ?Sized>(&mut self, pool: &ResourcePool, rng: &mut R) -> Result<String> {
        if self.cursor.remaining.is_empty() {
            if pool.is_empty() {
                return Err(GenError::Resource(format!(
                    "reference pool '{}' is empty",
                    pool.root().display()
                )));
            }
            // Groups outside the coverage window never see the specified items.
            let mut order: Vec<String> = pool
                .items()
                .iter()
                .filter(|item| !self.by_coverage || !self.rule.specified.contains(item))
                .cloned()
                .collect();
            if order.is_empty() {
                return Err(GenError::Config(format!(
                    "reference_images: groups beyond specified_coverage need a reference \
                     other than the specified ones, but '{}' has none",
                    pool.root().display()
                )));
            }
            if self.rule.mode != SelectionMode::Sequential {
                order.shuffle(rng);
                // Keep the cycle boundary from repeating the previous group.
                if order.len() > 1 && self.last.as_deref() == order.first().map(String::as_str) {
                    order.swap(0, 1);
                }
            }
            self.cursor.cycles += 1;
            self.cursor.remaining = order;
        }
        Ok(self.cursor.remaining.remove(0))
    }
}
