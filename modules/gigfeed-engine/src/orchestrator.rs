use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use gigfeed_common::{ResolvedLocation, Tuning};

use crate::adapter::{EventSource, FetchConstraints};
use crate::curate::{curate, is_generic_title, CurationPolicy};
use crate::dedup::DedupAccumulator;
use crate::protocol::{ScraperErrorReason, StreamMessage};

/// One (source, city) dispatch unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    pub source: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    TimedOut,
}

impl AdapterStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AdapterStatus::Pending | AdapterStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Starting,
    Collecting,
    Completed,
    Deadlined,
}

/// State of one fan-out execution. The orchestrating task is the only
/// writer; both terminal phases yield a final canonical set.
pub struct OrchestrationRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub phase: RunPhase,
    statuses: HashMap<TaskId, AdapterStatus>,
}

impl OrchestrationRun {
    pub fn new(tasks: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            phase: RunPhase::Starting,
            statuses: tasks
                .into_iter()
                .map(|t| (t, AdapterStatus::Pending))
                .collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.statuses.len()
    }

    pub fn completed(&self) -> usize {
        self.statuses.values().filter(|s| s.is_terminal()).count()
    }

    pub fn status(&self, task: &TaskId) -> Option<&AdapterStatus> {
        self.statuses.get(task)
    }

    pub fn mark_all_running(&mut self) {
        for status in self.statuses.values_mut() {
            *status = AdapterStatus::Running;
        }
        self.phase = RunPhase::Collecting;
    }

    pub fn resolve(&mut self, task: &TaskId, status: AdapterStatus) {
        if let Some(s) = self.statuses.get_mut(task) {
            *s = status;
        }
    }

    /// Best-effort cancellation at the global deadline: every adapter still
    /// in flight is marked timed out. Returns the abandoned tasks.
    pub fn abandon_outstanding(&mut self) -> Vec<TaskId> {
        let mut abandoned = Vec::new();
        for (task, status) in self.statuses.iter_mut() {
            if !status.is_terminal() {
                *status = AdapterStatus::TimedOut;
                abandoned.push(task.clone());
            }
        }
        self.phase = RunPhase::Deadlined;
        abandoned
    }
}

/// Runs every applicable adapter concurrently against a query, enforces
/// per-adapter and global budgets, and streams typed progress and partial
/// results. Adapter failure is never a run failure.
pub struct Orchestrator {
    tuning: Tuning,
}

impl Orchestrator {
    pub fn new(tuning: Tuning) -> Self {
        Self { tuning }
    }

    /// Dispatch every (city, source) pair and return the ordered message
    /// stream. The returned receiver yields `start` first and exactly one
    /// `complete` last.
    pub fn run(
        &self,
        cities: Vec<ResolvedLocation>,
        sources: Vec<Arc<dyn EventSource>>,
        policy: CurationPolicy,
    ) -> mpsc::Receiver<StreamMessage> {
        let (tx, rx) = mpsc::channel(64);
        let tuning = self.tuning.clone();
        tokio::spawn(run_inner(cities, sources, policy, tuning, tx));
        rx
    }
}

type FetchOutcome = Result<anyhow::Result<Vec<gigfeed_common::RawEventRecord>>, tokio::time::error::Elapsed>;

async fn run_inner(
    cities: Vec<ResolvedLocation>,
    sources: Vec<Arc<dyn EventSource>>,
    policy: CurationPolicy,
    tuning: Tuning,
    tx: mpsc::Sender<StreamMessage>,
) {
    let primary = match cities.first() {
        Some(c) => c.clone(),
        None => {
            let _ = tx
                .send(StreamMessage::Error {
                    kind: crate::protocol::ErrorKind::Internal,
                    message: "no cities to query".to_string(),
                })
                .await;
            return;
        }
    };

    let tasks: Vec<(TaskId, ResolvedLocation, Arc<dyn EventSource>)> = cities
        .iter()
        .flat_map(|city| {
            sources.iter().map(move |source| {
                (
                    TaskId {
                        source: source.id().to_string(),
                        city: city.city_key(),
                    },
                    city.clone(),
                    Arc::clone(source),
                )
            })
        })
        .collect();

    let mut run = OrchestrationRun::new(tasks.iter().map(|(t, _, _)| t.clone()));
    let total = run.total();
    let mut accumulator = DedupAccumulator::new(tuning.title_similarity_threshold);

    // Dropped sends mean the client went away; the run keeps its own state
    // and message order either way.
    let _ = tx
        .send(StreamMessage::Start {
            run_id: run.run_id,
            location: primary,
        })
        .await;
    let _ = tx
        .send(StreamMessage::Info {
            message: format!(
                "querying {} source(s) across {} city(ies)",
                sources.len(),
                cities.len()
            ),
        })
        .await;

    let adapter_budget = tuning.effective_adapter_timeout();
    let constraints = FetchConstraints {
        radius_km: tuning.radius_km,
        limit: tuning.result_limit,
        deadline: adapter_budget,
    };

    let mut in_flight: FuturesUnordered<_> = tasks
        .into_iter()
        .map(|(task, city, source)| {
            let constraints = constraints.clone();
            async move {
                let outcome: FetchOutcome =
                    timeout(adapter_budget, source.fetch(&city, &constraints)).await;
                (task, outcome)
            }
        })
        .collect();

    run.mark_all_running();
    let deadline = Instant::now() + tuning.global_deadline;

    while !in_flight.is_empty() {
        tokio::select! {
            completion = in_flight.next() => {
                let Some((task, outcome)) = completion else { break };
                handle_completion(&mut run, &mut accumulator, &tx, task, outcome).await;
                let completed = run.completed();
                let _ = tx
                    .send(StreamMessage::Progress {
                        completed,
                        total,
                        percent: completed as f32 / total.max(1) as f32 * 100.0,
                    })
                    .await;
            }
            _ = sleep_until(deadline) => {
                let abandoned = run.abandon_outstanding();
                warn!(abandoned = abandoned.len(), "Global deadline hit, abandoning outstanding adapters");
                for task in abandoned {
                    let _ = tx
                        .send(StreamMessage::ScraperError {
                            source: task.source,
                            city: task.city,
                            reason: ScraperErrorReason::Timeout,
                            detail: Some("abandoned at global deadline".to_string()),
                        })
                        .await;
                }
                break;
            }
        }
    }

    // Dropping the future set abandons any in-flight calls; records that
    // would have arrived after termination are discarded with them.
    drop(in_flight);

    if run.phase != RunPhase::Deadlined {
        run.phase = RunPhase::Completed;
    }
    let deadline_hit = run.phase == RunPhase::Deadlined;

    let curated = curate(accumulator.into_events(), policy, &tuning, Utc::now());
    info!(
        run_id = %run.run_id,
        events = curated.len(),
        deadline_hit,
        "Run complete"
    );
    let _ = tx
        .send(StreamMessage::Complete {
            total_events: curated.len(),
            deadline_hit,
            events: curated,
        })
        .await;
}

async fn handle_completion(
    run: &mut OrchestrationRun,
    accumulator: &mut DedupAccumulator,
    tx: &mpsc::Sender<StreamMessage>,
    task: TaskId,
    outcome: FetchOutcome,
) {
    match outcome {
        Ok(Ok(records)) => {
            let mut batch_ids = Vec::new();
            for record in records {
                if let Some(id) = accumulator.ingest(record, &task.city).event_id() {
                    if !batch_ids.contains(&id) {
                        batch_ids.push(id);
                    }
                }
            }
            run.resolve(&task, AdapterStatus::Succeeded);

            // Deny-listed titles never reach the client, not even in an
            // interim batch; the final curation pass would drop them anyway.
            let events = batch_ids
                .iter()
                .filter_map(|id| accumulator.get(*id).cloned())
                .filter(|e| !is_generic_title(&e.title))
                .collect::<Vec<_>>();

            if events.is_empty() {
                let _ = tx
                    .send(StreamMessage::NoEvents {
                        source: task.source,
                        city: task.city,
                    })
                    .await;
            } else {
                info!(
                    source = task.source.as_str(),
                    city = task.city.as_str(),
                    count = events.len(),
                    "Adapter contributed events"
                );
                let _ = tx
                    .send(StreamMessage::Events {
                        source: task.source,
                        city: task.city,
                        events,
                    })
                    .await;
            }
        }
        Ok(Err(e)) => {
            warn!(source = task.source.as_str(), city = task.city.as_str(), error = %e, "Adapter failed");
            run.resolve(&task, AdapterStatus::Failed(e.to_string()));
            let _ = tx
                .send(StreamMessage::ScraperError {
                    source: task.source,
                    city: task.city,
                    reason: ScraperErrorReason::Failure,
                    detail: Some(e.to_string()),
                })
                .await;
        }
        Err(_) => {
            warn!(source = task.source.as_str(), city = task.city.as_str(), "Adapter exceeded its timeout");
            run.resolve(&task, AdapterStatus::TimedOut);
            let _ = tx
                .send(StreamMessage::ScraperError {
                    source: task.source,
                    city: task.city,
                    reason: ScraperErrorReason::Timeout,
                    detail: None,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(source: &str, city: &str) -> TaskId {
        TaskId {
            source: source.to_string(),
            city: city.to_string(),
        }
    }

    #[test]
    fn run_tracks_per_adapter_lifecycle() {
        let a = task("ticketapi", "springfield");
        let b = task("venue-scraper", "springfield");
        let mut run = OrchestrationRun::new([a.clone(), b.clone()]);

        assert_eq!(run.phase, RunPhase::Starting);
        assert_eq!(run.status(&a), Some(&AdapterStatus::Pending));

        run.mark_all_running();
        assert_eq!(run.phase, RunPhase::Collecting);
        assert_eq!(run.completed(), 0);

        run.resolve(&a, AdapterStatus::Succeeded);
        assert_eq!(run.completed(), 1);

        run.resolve(&b, AdapterStatus::Failed("boom".to_string()));
        assert_eq!(run.completed(), 2);
    }

    #[test]
    fn abandon_marks_only_outstanding_tasks() {
        let a = task("ticketapi", "springfield");
        let b = task("venue-scraper", "springfield");
        let mut run = OrchestrationRun::new([a.clone(), b.clone()]);
        run.mark_all_running();
        run.resolve(&a, AdapterStatus::Succeeded);

        let abandoned = run.abandon_outstanding();
        assert_eq!(abandoned, vec![b.clone()]);
        assert_eq!(run.phase, RunPhase::Deadlined);
        assert_eq!(run.status(&a), Some(&AdapterStatus::Succeeded));
        assert_eq!(run.status(&b), Some(&AdapterStatus::TimedOut));
    }
}
