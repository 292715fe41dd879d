//! The filtering and scoring pass applied once a run's canonical set is
//! final. Shared verbatim by the offline listing-curation CLI.

use chrono::{DateTime, Utc};
use tracing::info;

use gigfeed_common::{normalize_title, CanonicalEvent, Tuning};

/// Generic placeholder titles that indicate an unspecific or hallucinated
/// entry: a bare category word with no proper noun.
const DENY_LIST: &[&str] = &[
    "concert",
    "concerts",
    "event",
    "events",
    "show",
    "shows",
    "live music",
    "music",
    "party",
    "meetup",
    "festival",
    "dj set",
    "theater",
    "theatre",
    "comedy night",
    "untitled",
    "untitled event",
    "tbd",
    "tba",
];

#[derive(Debug, Clone, Copy)]
pub struct CurationPolicy {
    /// Date-constrained queries drop undated records entirely;
    /// location-only browsing keeps them, ranked lowest.
    pub require_date: bool,
}

impl Default for CurationPolicy {
    fn default() -> Self {
        Self { require_date: true }
    }
}

/// Filter, score, and order a finalized canonical set.
pub fn curate(
    mut events: Vec<CanonicalEvent>,
    policy: CurationPolicy,
    tuning: &Tuning,
    now: DateTime<Utc>,
) -> Vec<CanonicalEvent> {
    let before = events.len();
    events.retain(|e| !is_generic_title(&e.title));
    if policy.require_date {
        events.retain(|e| e.starts_at.is_some());
    }
    let rejected = before - events.len();
    if rejected > 0 {
        info!(rejected, kept = events.len(), "Curation rejected low-quality events");
    }

    for event in &mut events {
        event.quality = quality_score(event, tuning, now);
    }

    // Descending quality; undated records sink to the bottom; non-AI
    // contributions break remaining ties. Stable sort preserves arrival
    // order beyond that.
    events.sort_by(|a, b| {
        b.starts_at
            .is_some()
            .cmp(&a.starts_at.is_some())
            .then(b.quality.total_cmp(&a.quality))
            .then(a.best_priority().cmp(&b.best_priority()))
    });

    events
}

/// True when a title is nothing but a deny-listed placeholder.
pub fn is_generic_title(title: &str) -> bool {
    let normalized = normalize_title(title);
    normalized.is_empty() || DENY_LIST.contains(&normalized.as_str())
}

/// Weighted quality score in [0, 1]: specific venue, parseable date,
/// corroboration across sources, and date recency (near future beats far
/// future and past).
pub fn quality_score(event: &CanonicalEvent, tuning: &Tuning, now: DateTime<Utc>) -> f32 {
    let venue = if event.venue_name.is_some() { 1.0 } else { 0.0 };
    let dated = if event.starts_at.is_some() { 1.0 } else { 0.0 };

    // One source is no corroboration; saturate at four.
    let corroboration = ((event.sources.len().saturating_sub(1)) as f32 / 3.0).min(1.0);

    let recency = match event.starts_at {
        Some(start) => {
            let days_ahead = (start - now).num_days();
            if days_ahead < 0 {
                0.0
            } else if days_ahead <= tuning.recency_horizon_days {
                1.0 - days_ahead as f32 / tuning.recency_horizon_days as f32
            } else {
                0.1
            }
        }
        None => 0.0,
    };

    let score = venue * tuning.venue_weight
        + dated * tuning.date_weight
        + corroboration * tuning.corroboration_weight
        + recency * tuning.recency_weight;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gigfeed_common::{Contribution, SourceKind};
    use uuid::Uuid;

    fn event(title: &str, days_ahead: Option<i64>, now: DateTime<Utc>) -> CanonicalEvent {
        CanonicalEvent {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            starts_at: days_ahead.map(|d| now + Duration::days(d)),
            venue_name: Some("The Venue".to_string()),
            venue_address: None,
            category: gigfeed_common::Category::Music,
            price: None,
            external_id: None,
            point: None,
            city: "springfield".to_string(),
            fingerprint: String::new(),
            sources: vec![Contribution {
                source: "ticketapi".to_string(),
                kind: SourceKind::OfficialApi,
            }],
            quality: 0.0,
        }
    }

    #[test]
    fn generic_titles_are_rejected() {
        assert!(is_generic_title("Live Music"));
        assert!(is_generic_title("  CONCERT!"));
        assert!(is_generic_title("Théâtre"));
        assert!(!is_generic_title("Jazz Night at Blue Note"));
    }

    #[test]
    fn undated_events_are_dropped_when_date_required() {
        let now = Utc::now();
        let events = vec![event("Jazz Night", Some(3), now), event("Standing Exhibit", None, now)];
        let curated = curate(events, CurationPolicy { require_date: true }, &Tuning::default(), now);
        assert_eq!(curated.len(), 1);
        assert_eq!(curated[0].title, "Jazz Night");
    }

    #[test]
    fn undated_events_rank_lowest_when_browsing() {
        let now = Utc::now();
        let mut undated = event("Standing Exhibit", None, now);
        // Even heavy corroboration must not lift an undated record above a
        // dated one.
        undated.sources = vec![
            Contribution { source: "a".into(), kind: SourceKind::OfficialApi },
            Contribution { source: "b".into(), kind: SourceKind::Scraper },
            Contribution { source: "c".into(), kind: SourceKind::AiDerived },
        ];
        let events = vec![undated, event("Jazz Night", Some(3), now)];
        let curated = curate(events, CurationPolicy { require_date: false }, &Tuning::default(), now);
        assert_eq!(curated.len(), 2);
        assert_eq!(curated[0].title, "Jazz Night");
        assert_eq!(curated[1].title, "Standing Exhibit");
    }

    #[test]
    fn near_future_beats_far_future_and_past() {
        let now = Utc::now();
        let tuning = Tuning::default();
        let soon = quality_score(&event("A", Some(2), now), &tuning, now);
        let far = quality_score(&event("B", Some(120), now), &tuning, now);
        let past = quality_score(&event("C", Some(-5), now), &tuning, now);
        assert!(soon > far, "soon={soon} far={far}");
        assert!(far > past, "far={far} past={past}");
    }

    #[test]
    fn corroboration_raises_score() {
        let now = Utc::now();
        let tuning = Tuning::default();
        let single = event("A", Some(5), now);
        let mut multi = event("A", Some(5), now);
        multi.sources.push(Contribution {
            source: "venue-scraper".to_string(),
            kind: SourceKind::Scraper,
        });
        assert!(quality_score(&multi, &tuning, now) > quality_score(&single, &tuning, now));
    }

    #[test]
    fn non_ai_source_breaks_quality_ties() {
        let now = Utc::now();
        let mut ai = event("Same Score A", Some(5), now);
        ai.sources = vec![Contribution {
            source: "ai-listings".to_string(),
            kind: SourceKind::AiDerived,
        }];
        let api = event("Same Score B", Some(5), now);

        let curated = curate(
            vec![ai, api],
            CurationPolicy { require_date: true },
            &Tuning::default(),
            now,
        );
        assert_eq!(curated[0].title, "Same Score B");
    }
}
