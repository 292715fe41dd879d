use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use gigfeed_common::{
    normalize_title, title_similarity, CanonicalEvent, Category, Contribution, RawEventRecord,
};

/// What happened to a record on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First record for this fingerprint; a new canonical event exists.
    Created(Uuid),
    /// Matched an existing canonical event, which was enriched.
    Merged(Uuid),
    /// Missing title or source id. Silently dropped.
    RejectedMalformed,
}

impl IngestOutcome {
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            IngestOutcome::Created(id) | IngestOutcome::Merged(id) => Some(*id),
            IngestOutcome::RejectedMalformed => None,
        }
    }
}

/// Run-scoped, exclusively-owned accumulator of canonical events. The
/// orchestrator's collector task is the single writer; fingerprint matching
/// requires that consistent view.
pub struct DedupAccumulator {
    similarity_threshold: f64,
    events: Vec<CanonicalEvent>,
    by_fingerprint: HashMap<String, usize>,
}

impl DedupAccumulator {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
            events: Vec::new(),
            by_fingerprint: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&CanonicalEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn into_events(self) -> Vec<CanonicalEvent> {
        self.events
    }

    /// Ingest one raw record for a city. Idempotent per fingerprint: the
    /// same record twice yields one canonical event, and a source is listed
    /// once no matter how often it contributes.
    pub fn ingest(&mut self, record: RawEventRecord, city_key: &str) -> IngestOutcome {
        if !record.is_well_formed() {
            return IngestOutcome::RejectedMalformed;
        }

        let fingerprint = fingerprint(&record, city_key);

        if let Some(&idx) = self.by_fingerprint.get(&fingerprint) {
            let id = self.events[idx].id;
            merge(&mut self.events[idx], record);
            return IngestOutcome::Merged(id);
        }

        // Fuzzy pass: same city and date, similar-enough title.
        if let Some(idx) = self.find_similar(&record, city_key) {
            let id = self.events[idx].id;
            info!(
                title = record.title.as_str(),
                matched = self.events[idx].title.as_str(),
                "Near-duplicate title merged"
            );
            merge(&mut self.events[idx], record);
            return IngestOutcome::Merged(id);
        }

        let event = canonicalize(record, city_key, fingerprint.clone());
        let id = event.id;
        self.by_fingerprint.insert(fingerprint, self.events.len());
        self.events.push(event);
        IngestOutcome::Created(id)
    }

    fn find_similar(&self, record: &RawEventRecord, city_key: &str) -> Option<usize> {
        let date = record.start_date();
        self.events.iter().position(|e| {
            e.city == city_key
                && e.start_date() == date
                && title_similarity(&e.title, &record.title) >= self.similarity_threshold
        })
    }
}

/// Fingerprint: normalized title, folded city, calendar date at day
/// granularity (`undated` when no start time parsed).
pub fn fingerprint(record: &RawEventRecord, city_key: &str) -> String {
    let date = record
        .start_date()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "undated".to_string());
    format!("{}|{}|{}", normalize_title(&record.title), city_key, date)
}

fn canonicalize(record: RawEventRecord, city_key: &str, fingerprint: String) -> CanonicalEvent {
    CanonicalEvent {
        id: Uuid::new_v4(),
        title: record.title.trim().to_string(),
        description: record.description,
        starts_at: record.starts_at,
        venue_name: record.venue_name,
        venue_address: record.venue_address,
        category: record
            .category
            .as_deref()
            .map(Category::from_free_text)
            .unwrap_or(Category::Other),
        price: record.price,
        external_id: record.external_id,
        point: record.point,
        city: city_key.to_string(),
        fingerprint,
        sources: vec![Contribution {
            source: record.source,
            kind: record.source_kind,
        }],
        quality: 0.0,
    }
}

/// Merge a later record into an existing canonical event. A
/// higher-priority source overwrites fields it provides; lower- or
/// equal-priority sources only fill gaps. The contributing-sources list
/// accumulates without duplicates.
fn merge(event: &mut CanonicalEvent, record: RawEventRecord) {
    let incoming_wins = record.source_kind.priority() < event.best_priority();

    if incoming_wins && !record.title.trim().is_empty() {
        event.title = record.title.trim().to_string();
    }
    merge_field(&mut event.description, record.description, incoming_wins);
    merge_field(&mut event.starts_at, record.starts_at, incoming_wins);
    merge_field(&mut event.venue_name, record.venue_name, incoming_wins);
    merge_field(&mut event.venue_address, record.venue_address, incoming_wins);
    merge_field(&mut event.price, record.price, incoming_wins);
    merge_field(&mut event.external_id, record.external_id, incoming_wins);
    merge_field(&mut event.point, record.point, incoming_wins);

    if let Some(cat) = record.category.as_deref() {
        let mapped = Category::from_free_text(cat);
        if event.category == Category::Other || incoming_wins {
            event.category = mapped;
        }
    }

    let contribution = Contribution {
        source: record.source,
        kind: record.source_kind,
    };
    if !event.sources.contains(&contribution) {
        event.sources.push(contribution);
    }
}

fn merge_field<T>(existing: &mut Option<T>, incoming: Option<T>, incoming_wins: bool) {
    if incoming.is_some() && (existing.is_none() || incoming_wins) {
        *existing = incoming;
    }
}
