//! Selection primitives over a [`ResourcePool`].

use super::pool::ResourcePool;
use crate::config::{CountSpec, ImageSelection, SelectionMode};
use crate::error::{GenError, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Number of leading groups that receive the specified items:
/// `round(p / 100 * N)`, halves rounded away from zero.
pub fn covered_groups(coverage_percent: u8, group_count: usize) -> usize {
    let percent = usize::from(coverage_percent.min(100));
    (percent * group_count + 50) / 100
}

/// Draw `count` distinct items uniformly from `pool \ exclude`.
pub fn select_random<R: Rng + ?Sized>(
    pool: &ResourcePool,
    count: usize,
    exclude: &[String],
    rng: &mut R,
) -> Result<Vec<String>> {
    let candidates: Vec<&String> = pool
        .items()
        .iter()
        .filter(|item| !exclude.contains(item))
        .collect();

    if count > candidates.len() {
        return Err(GenError::Config(format!(
            "cannot draw {} distinct item(s) from '{}': only {} available",
            count,
            pool.root().display(),
            candidates.len()
        )));
    }

    Ok(candidates
        .choose_multiple(rng, count)
        .map(|item| (*item).clone())
        .collect())
}

/// Position in stable pool order for `sequential` selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialCursor {
    pub position: usize,
    /// Number of times the cursor ran past the end of the pool.
    pub wraps: usize,
}

impl SequentialCursor {
    /// Take the next `count` items not in `exclude`, wrapping at the end.
    pub fn take(
        &mut self,
        pool: &ResourcePool,
        count: usize,
        exclude: &[String],
    ) -> Result<Vec<String>> {
        let items = pool.items();
        let available = items.iter().filter(|i| !exclude.contains(i)).count();
        if count > available {
            return Err(GenError::Config(format!(
                "cannot take {} distinct item(s) from '{}': only {} available",
                count,
                pool.root().display(),
                available
            )));
        }

        let mut taken = Vec::with_capacity(count);
        while taken.len() < count {
            if self.position >= items.len() {
                self.position = 0;
                self.wraps += 1;
            }
            let item = &items[self.position];
            self.position += 1;
            if !exclude.contains(item) && !taken.contains(item) {
                taken.push(item.clone());
            }
        }
        Ok(taken)
    }
}

/// A pool selection rule with every identifier resolved against its pool.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRule {
    pub mode: SelectionMode,
    pub count: CountSpec,
    pub specified: Vec<String>,
    pub must_include: Option<String>,
    pub coverage_percent: u8,
}

impl SelectionRule {
    /// Resolve `selection` against `pool`, checking counts against its size.
    pub fn resolve(
        field: &str,
        selection: &ImageSelection,
        pool: &ResourcePool,
        warnings: &mut Vec<String>,
    ) -> Result<Self> {
        let specified = pool.resolve_all(
            &format!("{}.specified_images", field),
            &selection.specified_images,
            selection.strict,
            warnings,
        )?;

        let must_include = match &selection.must_include {
            None => None,
            Some(name) => match pool.resolve(name)? {
                Some(id) => Some(id),
                None if selection.strict => {
                    return Err(GenError::Config(format!(
                        "{}.must_include: '{}' not found in '{}'",
                        field,
                        name,
                        pool.root().display()
                    )));
                }
                None => {
                    warnings.push(format!("{}.must_include: '{}' not found, skipped", field, name));
                    None
                }
            },
        };

        let max = selection.count_per_group.max() as usize;
        if max > pool.len() {
            return Err(GenError::Config(format!(
                "{}.count_per_group {} exceeds the {} image(s) in '{}'",
                field,
                selection.count_per_group,
                pool.len(),
                pool.root().display()
            )));
        }

        if selection.selection_mode == SelectionMode::Specified && specified.is_empty() {
            return Err(GenError::Config(format!(
                "{}: none of the specified images were found",
                field
            )));
        }

        Ok(Self {
            mode: selection.selection_mode,
            count: selection.count_per_group,
            specified,
            must_include,
            coverage_percent: selection.specified_coverage,
        })
    }

    /// Items forced into a group: `must_include` always, specified items only
    /// when the group is covered.
    pub fn mandatory(&self, covered: bool) -> Vec<String> {
        let mut items = Vec::new();
        if let Some(item) = &self.must_include {
            items.push(item.clone());
        }
        if covered {
            for item in &self.specified {
                if !items.contains(item) {
                    items.push(item.clone());
                }
            }
        }
        items
    }
}

/// Stateful product selector used by the planner, one call per group.
#[derive(Debug, Clone)]
pub struct GroupSelector {
    rule: SelectionRule,
    covered: usize,
    cursor: SequentialCursor,
}

impl GroupSelector {
    pub fn new(rule: SelectionRule, group_count: usize) -> Self {
        let covered = if rule.specified.is_empty() {
            0
        } else {
            covered_groups(rule.coverage_percent, group_count)
        };
        Self {
            rule,
            covered,
            cursor: SequentialCursor::default(),
        }
    }

    pub fn cursor(&self) -> SequentialCursor {
        self.cursor
    }

    /// Whether group `index` receives the specified items.
    pub fn is_covered(&self, index: usize) -> bool {
        index < self.covered
    }

    /// Select the product items of group `index`, mandatory items first.
    pub fn select<R: Rng + ?Sized>(
        &mut self,
        pool: &ResourcePool,
        index: usize,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let covered = self.is_covered(index);
        let items = self.rule.mandatory(covered);

        if covered && self.rule.mode == SelectionMode::Specified {
            return Ok(items);
        }

        // Uncovered groups never receive specified items, not even by chance.
        let mut exclude = items.clone();
        if !covered {
            exclude.extend(self.rule.specified.iter().cloned());
        }
        self.fill(pool, items, &exclude, rng)
    }

    /// Select a group anchored on `paired`, one specified item zipped with a
    /// specified reference. Coverage does not apply.
    pub fn select_paired<R: Rng + ?Sized>(
        &mut self,
        pool: &ResourcePool,
        paired: &str,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let mut items = self.rule.mandatory(false);
        if !items.iter().any(|i| i == paired) {
            items.push(paired.to_string());
        }
        let exclude = items.clone();
        self.fill(pool, items, &exclude, rng)
    }

    /// Select by the fallback rule alone: `must_include` plus fill.
    pub fn select_fallback<R: Rng + ?Sized>(
        &mut self,
        pool: &ResourcePool,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let items = self.rule.mandatory(false);
        let exclude = items.clone();
        self.fill(pool, items, &exclude, rng)
    }

    fn fill<R: Rng + ?Sized>(
        &mut self,
        pool: &ResourcePool,
        mut items: Vec<String>,
        exclude: &[String],
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let count = self.rule.count.sample(rng).max(items.len());
        let fill = count - items.len();

        let extra = match self.rule.mode {
            SelectionMode::Sequential => self.cursor.take(pool, fill, exclude)?,
            SelectionMode::Random | SelectionMode::Specified => {
                select_random(pool, fill, exclude, rng)?
            }
        };
        items.extend(extra);
        Ok(items)
    }
}
