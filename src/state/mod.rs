//! Application state
//!
//! State is held in immutable snapshots. Appending a file or changing the
//! selection builds a new [`AppContext`]; anything still holding the old one
//! (a render pass, a worker request) keeps seeing a consistent dataset.

pub mod interaction;
pub mod schedule;
pub mod ui;
pub mod viewport;

pub use interaction::{InteractionAdapter, InteractionMode, PointerInput};
pub use schedule::ScheduledTask;
pub use ui::{StatusLevel, StatusMessage, UiState};
pub use viewport::{
    BrushSelection, DomainChange, DomainEvent, DomainOrigin, Subscription, ViewportAction,
    ViewportController, ViewportState,
};

use std::sync::Arc;

use crate::data::merge::{merge_variables, DatasetMerge};
use crate::data::normalize::IngestOutcome;
use crate::data::record::{Domain, Series, Variable, VariableId};

/// One version of the loaded data
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Bumped by every load or append
    pub version: u64,
    pub variables: Arc<[Variable]>,
    pub series: Arc<[Series]>,
    /// Records dropped during normalization, over all batches
    pub dropped_count: usize,
}

impl Dataset {
    pub fn from_ingest(outcome: IngestOutcome) -> Self {
        Self {
            version: 1,
            variables: outcome.variables.into(),
            series: outcome.series.into(),
            dropped_count: outcome.dropped_count,
        }
    }

    /// Start merging `outcome` into a new snapshot; `self` is left untouched.
    ///
    /// Series pairs longer than `chunk_size` are merged as the returned job
    /// is stepped.
    pub fn begin_append(&self, outcome: IngestOutcome, chunk_size: usize) -> PendingAppend {
        profiling::scope!("Dataset::begin_append");

        PendingAppend {
            version: self.version + 1,
            variables: merge_variables(&self.variables, &outcome.variables).into(),
            dropped_count: self.dropped_count + outcome.dropped_count,
            merge: DatasetMerge::new(&self.series, &outcome.series, chunk_size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(Series::is_empty)
    }

    pub fn total_points(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    pub fn series_for(&self, id: &VariableId) -> Option<&Series> {
        self.series.iter().find(|s| &s.variable == id)
    }

    pub fn full_extent(&self) -> Option<Domain> {
        Domain::extent_of(self.series.iter())
    }
}

/// An append whose series are still being merged
#[derive(Debug)]
pub struct PendingAppend {
    version: u64,
    variables: Arc<[Variable]>,
    dropped_count: usize,
    merge: DatasetMerge,
}

impl PendingAppend {
    /// Advance by up to `steps` merge steps; `true` once complete
    pub fn step(&mut self, steps: usize) -> bool {
        profiling::scope!("PendingAppend::step");
        self.merge.step(steps)
    }

    pub fn is_done(&self) -> bool {
        self.merge.is_done()
    }

    /// The merged snapshot, completing any remaining steps
    pub fn finish(self) -> Dataset {
        Dataset {
            version: self.version,
            variables: self.variables,
            series: self.merge.finish().into(),
            dropped_count: self.dropped_count,
        }
    }
}

/// `{dataset version, domain, selection}` passed explicitly to the UI and core
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    pub dataset: Arc<Dataset>,
    pub domain: Option<Domain>,
    /// Selected variables in the order they were selected
    pub selection: Arc<[VariableId]>,
}

impl AppContext {
    pub fn dataset_version(&self) -> u64 {
        self.dataset.version
    }

    /// Swap in a new dataset; selected variables that no longer exist are dropped
    pub fn with_dataset(&self, dataset: Dataset) -> Self {
        let selection: Vec<VariableId> = self
            .selection
            .iter()
            .filter(|id| dataset.variables.iter().any(|v| &v.id == *id))
            .cloned()
            .collect();
        Self {
            dataset: Arc::new(dataset),
            domain: self.domain,
            selection: selection.into(),
        }
    }

    pub fn with_domain(&self, domain: Option<Domain>) -> Self {
        Self {
            domain,
            ..self.clone()
        }
    }

    /// Select `id` at the end of the order, or deselect it if already selected
    pub fn with_toggled(&self, id: &VariableId) -> Self {
        let mut selection: Vec<VariableId> = self.selection.to_vec();
        match selection.iter().position(|s| s == id) {
            Some(index) => {
                selection.remove(index);
            }
            None => selection.push(id.clone()),
        }
        Self {
            selection: selection.into(),
            ..self.clone()
        }
    }

    pub fn with_selection(&self, selection: Vec<VariableId>) -> Self {
        Self {
            selection: selection.into(),
            ..self.clone()
        }
    }

    pub fn is_selected(&self, id: &VariableId) -> bool {
        self.selection.contains(id)
    }

    /// Position in the selection order; drives palette colors
    pub fn selection_index(&self, id: &VariableId) -> Option<usize> {
        self.selection.iter().position(|s| s == id)
    }

    /// Series of the selected variables, in selection order
    pub fn selected_series(&self) -> Arc<[Series]> {
        self.selection
            .iter()
            .filter_map(|id| self.dataset.series_for(id).cloned())
            .collect()
    }

    /// Variables with their `selected` flag filled in from the selection
    pub fn variables(&self) -> Vec<Variable> {
        self.dataset
            .variables
            .iter()
            .map(|v| Variable {
                selected: self.is_selected(&v.id),
                ..v.clone()
            })
            .collect()
    }
}
