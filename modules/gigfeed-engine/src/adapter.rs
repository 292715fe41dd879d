use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use gigfeed_common::{fold_city, Config, RawEventRecord, ResolvedLocation, SourceKind};

/// Per-call constraints the orchestrator hands every adapter. Adapters must
/// respect the deadline: abort and return what was gathered, or nothing.
#[derive(Debug, Clone)]
pub struct FetchConstraints {
    pub radius_km: f64,
    pub limit: usize,
    pub deadline: Duration,
}

/// The uniform capability every producer implements, whether it is a typed
/// API client, an HTML scraper, or an AI-derived listing file. "No results"
/// is `Ok(vec![])`, never an error; a hard `Err` is reserved for conditions
/// the adapter cannot recover from (auth failure, wholly unparseable
/// response).
#[async_trait]
pub trait EventSource: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> SourceKind;
    async fn fetch(
        &self,
        location: &ResolvedLocation,
        constraints: &FetchConstraints,
    ) -> Result<Vec<RawEventRecord>>;
}

// --- AI-derived listing files ---

/// Serves pre-curated, AI-generated listing files from a directory. Files
/// are named by folded city key (`<city_key>.json`) and contain a JSON array
/// of raw records. This is the registered form of the offline curation
/// output; absence of a file for a city means zero results, not an error.
pub struct ListingFileSource {
    id: String,
    dir: PathBuf,
}

impl ListingFileSource {
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
        }
    }

    pub fn from_config(id: impl Into<String>, config: &Config) -> Self {
        Self::new(id, &config.listings_dir)
    }

    fn path_for(&self, location: &ResolvedLocation) -> PathBuf {
        let key = fold_city(&location.city).replace(' ', "_");
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl EventSource for ListingFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::AiDerived
    }

    async fn fetch(
        &self,
        location: &ResolvedLocation,
        constraints: &FetchConstraints,
    ) -> Result<Vec<RawEventRecord>> {
        let path = self.path_for(location);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(source = self.id.as_str(), city = location.city.as_str(), "No listing file");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        let mut records: Vec<RawEventRecord> = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;

        let before = records.len();
        records.retain(RawEventRecord::is_well_formed);
        if records.len() < before {
            warn!(
                source = self.id.as_str(),
                dropped = before - records.len(),
                "Malformed listing records dropped"
            );
        }

        // Listing files are produced offline, so the kind and source id on
        // disk may be stale; stamp them with this adapter's identity.
        for r in &mut records {
            r.source = self.id.clone();
            r.source_kind = SourceKind::AiDerived;
        }

        records.truncate(constraints.limit);
        info!(
            source = self.id.as_str(),
            city = location.city.as_str(),
            count = records.len(),
            "Listing file loaded"
        );
        Ok(records)
    }
}
