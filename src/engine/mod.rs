//! Execution engine: drives planned groups through the external services.
//!
//! Groups run on a bounded pool of scoped worker threads pulling indices
//! from a shared queue. Each worker runs one group at a time, start to
//! finish, and persists its terminal result before taking the next one.
//!
//! Service failures are isolated to their group and recorded as `failed`.
//! A persistence failure stops every worker and is returned to the caller.
//! When the cancel flag is raised, workers finish the group they are on and
//! stop taking new ones; the rest stay `pending` for a later resume.

mod group;
mod text;


use crate::context::RunContext;
use crate::error::{GenError, Result};
use crate::events::EventLog;
use crate::plan::Plan;
use crate::services::{FewShotExample, Services};
use crate::state::{GroupStatus, StateStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

pub use text::{
    finish_body, load_examples, sample_examples, strip_trailing_hashtags, text_file_contents,
};

/// What happened to the groups handed to [`Engine::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Groups never started because the run was cancelled.
    pub not_started: usize,
    pub cancelled: bool,
}

pub struct Engine<'a> {
    ctx: &'a RunContext,
    plan: &'a Plan,
    store: &'a StateStore,
    events: &'a EventLog,
    services: &'a Services,
    examples: Vec<FewShotExample>,
    cancel: Arc<AtomicBool>,
}

impl<'a> Engine<'a> {
    pub fn new(
        ctx: &'a RunContext,
        plan: &'a Plan,
        store: &'a StateStore,
        events: &'a EventLog,
        services: &'a Services,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self> {
        let template = &plan.template;
        let mut engine = Self {
            ctx,
            plan,
            store,
            events,
            services,
            examples: Vec::new(),
            cancel,
        };

        if template.generation_target.wants_text() && template.text_generation.enabled {
            if services.text.is_none() {
                tracing::warn!("no text_service configured; groups will be produced without copy");
            } else if let Some(path) = template.text_examples_path() {
                engine.examples = load_examples(&path)?;
                tracing::debug!(count = engine.examples.len(), "loaded text examples");
            }
        }

        Ok(engine)
    }

    /// Whether this run produces marketing copy.
    fn text_active(&self) -> bool {
        let template = &self.plan.template;
        template.generation_target.wants_text()
            && template.text_generation.enabled
            && self.services.text.is_some()
    }

    /// Execute `indices` (pending groups) and persist every outcome.
    pub fn execute(&self, indices: &[usize]) -> Result<ExecutionSummary> {
        let workers = self
            .plan
            .template
            .output
            .max_concurrent_groups
            .clamp(1, indices.len().max(1));
        tracing::info!(groups = indices.len(), workers, "executing groups");

        let queue = Mutex::new(indices.iter().copied().collect::<VecDeque<_>>());
        let tally = Mutex::new(ExecutionSummary {
            scheduled: indices.len(),
            ..ExecutionSummary::default()
        });
        let fatal: Mutex<Option<GenError>> = Mutex::new(None);
        let halted = AtomicBool::new(false);

        thread::scope(|scope| {
            for worker in 1..=workers {
                let (queue, tally, fatal, halted) = (&queue, &tally, &fatal, &halted);
                scope.spawn(move || {
                    let span = tracing::debug_span!("worker", id = worker);
                    let _enter = span.enter();
                    loop {
                        if self.cancel.load(Ordering::SeqCst) || halted.load(Ordering::SeqCst) {
                            break;
                        }
                        let next = match queue.lock() {
                            Ok(mut q) => q.pop_front(),
                            Err(_) => None,
                        };
                        let Some(index) = next else {
                            break;
                        };

                        match self.run_group(index) {
                            Ok(status) => {
                                if let Ok(mut t) = tally.lock() {
                                    match status {
                                        GroupStatus::Succeeded => t.succeeded += 1,
                                        _ => t.failed += 1,
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!(group = index + 1, error = %e, "stopping run");
                                halted.store(true, Ordering::SeqCst);
                                if let Ok(mut slot) = fatal.lock()
                                    && slot.is_none()
                                {
                                    *slot = Some(e);
                                }
                                break;
                            }
                        }
                    }
                });
            }
        });

        if let Some(e) = fatal
            .into_inner()
            .map_err(|_| GenError::Persistence("worker state poisoned".to_string()))?
        {
            return Err(e);
        }

        let mut summary = tally
            .into_inner()
            .map_err(|_| GenError::Persistence("worker state poisoned".to_string()))?;
        summary.not_started = queue
            .into_inner()
            .map(|q| q.len())
            .map_err(|_| GenError::Persistence("worker state poisoned".to_string()))?;
        summary.cancelled = summary.not_started > 0 && self.cancel.load(Ordering::SeqCst);
        Ok(summary)
    }
}
