//! SeriesMerger: fold a newly loaded batch into an existing sorted dataset

use std::collections::HashMap;

use super::record::{Point, Series, Variable, VariableId};
use crate::constants::merge::CHUNK_SIZE;

/// Linear two-pointer merge of two ascending point slices.
///
/// On equal timestamps points from `existing` come first.
pub fn merge(existing: &[Point], incoming: &[Point]) -> Vec<Point> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let (mut i, mut j) = (0, 0);

    while i < existing.len() && j < incoming.len() {
        if existing[i].timestamp <= incoming[j].timestamp {
            merged.push(existing[i]);
            i += 1;
        } else {
            merged.push(incoming[j]);
            j += 1;
        }
    }

    merged.extend_from_slice(&existing[i..]);
    merged.extend_from_slice(&incoming[j..]);
    merged
}

/// Pairwise reduction over sorted chunks, one merge per [`step`](Self::step).
///
/// Adjacent chunks are merged left-with-right, so a chunk list ordered
/// "existing chunks, then incoming chunks" keeps the same tie-breaking as
/// [`merge`]. Callers on an interactive thread can run a few steps per
/// frame instead of blocking on one huge merge.
#[derive(Debug, Default)]
pub struct PairwiseMerge {
    level: Vec<Vec<Point>>,
    next: Vec<Vec<Point>>,
    cursor: usize,
    merges_done: usize,
}

impl PairwiseMerge {
    pub fn new(chunks: Vec<Vec<Point>>) -> Self {
        Self {
            level: chunks.into_iter().filter(|c| !c.is_empty()).collect(),
            ..Default::default()
        }
    }

    /// Split two sorted sequences into `chunk_size` chunks, existing first
    pub fn from_sequences(existing: &[Point], incoming: &[Point], chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let chunks = existing
            .chunks(chunk_size)
            .chain(incoming.chunks(chunk_size))
            .map(<[Point]>::to_vec)
            .collect();
        Self::new(chunks)
    }

    pub fn is_done(&self) -> bool {
        self.next.is_empty() && self.cursor == 0 && self.level.len() <= 1
    }

    /// Number of pair merges performed so far
    pub fn merges_done(&self) -> usize {
        self.merges_done
    }

    /// Perform one unit of work. Returns `true` once everything is merged.
    pub fn step(&mut self) -> bool {
        if self.is_done() {
            return true;
        }

        if self.cursor >= self.level.len() {
            self.level = std::mem::take(&mut self.next);
            self.cursor = 0;
            return self.is_done();
        }

        if self.cursor + 1 < self.level.len() {
            let left = std::mem::take(&mut self.level[self.cursor]);
            let right = std::mem::take(&mut self.level[self.cursor + 1]);
            self.next.push(merge(&left, &right));
            self.cursor += 2;
            self.merges_done += 1;
        } else {
            // Odd chunk out is carried to the next level unchanged
            let carry = std::mem::take(&mut self.level[self.cursor]);
            self.next.push(carry);
            self.cursor += 1;
        }
        false
    }

    /// Run to completion
    pub fn finish(mut self) -> Vec<Point> {
        while !self.step() {}
        self.level.pop().unwrap_or_default()
    }
}

/// Merge two series of the same variable into a new series
pub fn merge_series(existing: &Series, incoming: &Series) -> Series {
    profiling::scope!("merge_series");
    Series::new(existing.variable.clone(), merge(&existing.points, &incoming.points))
}

/// [`merge_datasets`] in bounded steps.
///
/// Pairs whose combined length exceeds the chunk size become a
/// [`PairwiseMerge`] job; smaller pairs are merged on construction.
#[derive(Debug)]
pub struct DatasetMerge {
    series: Vec<Series>,
    jobs: Vec<(usize, PairwiseMerge)>,
    appended: usize,
}

impl DatasetMerge {
    pub fn new(existing: &[Series], incoming: &[Series], chunk_size: usize) -> Self {
        let mut series: Vec<Series> = existing.to_vec();
        let mut index: HashMap<VariableId, usize> = series
            .iter()
            .enumerate()
            .map(|(i, s)| (s.variable.clone(), i))
            .collect();
        let mut jobs: Vec<(usize, PairwiseMerge)> = Vec::new();
        let mut appended = 0usize;

        for batch in incoming {
            let Some(&slot) = index.get(&batch.variable) else {
                index.insert(batch.variable.clone(), series.len());
                series.push(batch.clone());
                appended += 1;
                continue;
            };

            // A variable repeated in `incoming` merges against the finished result
            if let Some(pos) = jobs.iter().position(|(s, _)| *s == slot) {
                let (_, job) = jobs.swap_remove(pos);
                series[slot] = Series::new(batch.variable.clone(), job.finish());
            }

            let current = &series[slot];
            if current.len() + batch.len() > chunk_size {
                let job = PairwiseMerge::from_sequences(&current.points, &batch.points, chunk_size);
                jobs.push((slot, job));
            } else {
                series[slot] = merge_series(current, batch);
            }
        }

        Self {
            series,
            jobs,
            appended,
        }
    }

    pub fn is_done(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run up to `steps` merge steps. Returns `true` once every series is merged.
    pub fn step(&mut self, steps: usize) -> bool {
        let mut budget = steps.max(1);
        while budget > 0 {
            let Some((_, job)) = self.jobs.last_mut() else {
                break;
            };
            let finished = job.step();
            budget -= 1;

            if finished {
                if let Some((slot, job)) = self.jobs.pop() {
                    let variable = self.series[slot].variable.clone();
                    self.series[slot] = Series::new(variable, job.finish());
                }
            }
        }
        self.is_done()
    }

    pub fn finish(mut self) -> Vec<Series> {
        self.step(usize::MAX);
        tracing::debug!(
            series = self.series.len(),
            appended = self.appended,
            "merged datasets"
        );
        self.series
    }
}

/// Merge an incoming batch into an existing dataset.
///
/// Existing variables keep their position; variables seen only in
/// `incoming` are appended in the order they appear there. Neither input is
/// modified.
pub fn merge_datasets(existing: &[Series], incoming: &[Series]) -> Vec<Series> {
    profiling::scope!("merge_datasets");
    DatasetMerge::new(existing, incoming, CHUNK_SIZE).finish()
}

/// Union of variable lists; existing entries keep position and selection
pub fn merge_variables(existing: &[Variable], incoming: &[Variable]) -> Vec<Variable> {
    let mut result = existing.to_vec();
    for variable in incoming {
        if !result.iter().any(|v| v.id == variable.id) {
            result.push(variable.clone());
        }
    }
    result
}
