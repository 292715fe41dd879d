//! Multi-city search expansion: resolve the query's location, fan the full
//! pipeline out across the primary city and up to four nearby cities under
//! one shared deadline, and merge the streams with per-city provenance.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use gigfeed_common::{GigfeedError, LocationSignal, ResolvedLocation, Tuning};

use crate::adapter::EventSource;
use crate::curate::CurationPolicy;
use crate::location::LocationResolver;
use crate::orchestrator::Orchestrator;
use crate::protocol::{ErrorKind, StreamMessage};

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Primary city plus at most `max_cities - 1` nearby cities.
    pub max_cities: usize,
    pub policy: CurationPolicy,
    pub tuning: Tuning,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_cities: 5,
            policy: CurationPolicy::default(),
            tuning: Tuning::default(),
        }
    }
}

/// Entry point for one query. Resolution failure is the only fatal outcome:
/// it emits a single `error` message and nothing else. Nearby-city
/// enrichment failures degrade to a single-city search.
pub fn search(
    resolver: Arc<LocationResolver>,
    sources: Vec<Arc<dyn EventSource>>,
    signal: LocationSignal,
    options: SearchOptions,
) -> mpsc::Receiver<StreamMessage> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let primary = match resolver.resolve(&signal).await {
            Ok(loc) => loc,
            Err(e) => {
                let kind = match e {
                    GigfeedError::Unresolvable(_) => ErrorKind::ResolutionUnresolvable,
                    _ => ErrorKind::Internal,
                };
                let _ = tx
                    .send(StreamMessage::Error {
                        kind,
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        let cities = expand_cities(&resolver, primary, options.max_cities).await;
        info!(cities = cities.len(), "Search expansion resolved");

        let orchestrator = Orchestrator::new(options.tuning);
        let mut inner = orchestrator.run(cities, sources, options.policy);
        while let Some(msg) = inner.recv().await {
            if tx.send(msg).await.is_err() {
                // Client disconnected; drop at the transport boundary.
                return;
            }
        }
    });
    rx
}

/// The primary city plus its resolved nearby cities, each geocoded to its
/// own location tagged `derived`. A nearby city that fails to geocode is
/// skipped, not fatal.
async fn expand_cities(
    resolver: &LocationResolver,
    primary: ResolvedLocation,
    max_cities: usize,
) -> Vec<ResolvedLocation> {
    let mut cities = Vec::with_capacity(max_cities.max(1));
    let nearby = primary.nearby.clone();
    cities.push(primary);

    for candidate in nearby {
        if cities.len() >= max_cities.max(1) {
            break;
        }
        match resolver.resolve_derived(&candidate.name).await {
            Ok(loc) => cities.push(loc),
            Err(e) => {
                warn!(city = candidate.name.as_str(), error = %e, "Skipping nearby city");
            }
        }
    }
    cities
}
