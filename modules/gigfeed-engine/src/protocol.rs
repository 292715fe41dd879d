//! The typed message sequence a query produces. The orchestrator is the
//! single producer; any incremental transport (SSE, websocket, long poll)
//! can carry these as long as it does not reorder them. `start` is always
//! first; `complete` or `error` is always last and unique. Reconnecting
//! clients start a fresh run; there is no resumable offset.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gigfeed_common::{CanonicalEvent, ResolvedLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScraperErrorReason {
    Timeout,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResolutionUnresolvable,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Run begun; echoes the resolved primary location.
    Start {
        run_id: Uuid,
        location: ResolvedLocation,
    },
    /// Human-readable status line.
    Info { message: String },
    /// A batch of newly-available canonical events and the adapter that
    /// contributed them. Events carry their originating city tag.
    Events {
        source: String,
        city: String,
        events: Vec<CanonicalEvent>,
    },
    /// An adapter failed or timed out. Non-fatal: the run continues.
    ScraperError {
        source: String,
        city: String,
        reason: ScraperErrorReason,
        detail: Option<String>,
    },
    /// Fan-out progress after each adapter completion.
    Progress {
        completed: usize,
        total: usize,
        percent: f32,
    },
    /// An adapter completed with zero results.
    NoEvents { source: String, city: String },
    /// Terminal. Carries the final curated set and whether the global
    /// deadline cut the run short.
    Complete {
        total_events: usize,
        deadline_hit: bool,
        events: Vec<CanonicalEvent>,
    },
    /// Terminal, fatal. Reserved for conditions preventing any result.
    Error { kind: ErrorKind, message: String },
}

impl StreamMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamMessage::Complete { .. } | StreamMessage::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_snake_case_tags() {
        let msg = StreamMessage::NoEvents {
            source: "ticketapi".to_string(),
            city: "springfield".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "no_events");

        let msg = StreamMessage::ScraperError {
            source: "venue-scraper".to_string(),
            city: "springfield".to_string(),
            reason: ScraperErrorReason::Timeout,
            detail: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "scraper_error");
        assert_eq!(json["reason"], "timeout");

        let msg = StreamMessage::Error {
            kind: ErrorKind::ResolutionUnresolvable,
            message: "no signal".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "resolution_unresolvable");
    }

    #[test]
    fn terminal_detection() {
        assert!(StreamMessage::Complete {
            total_events: 0,
            deadline_hit: false,
            events: vec![],
        }
        .is_terminal());
        assert!(!StreamMessage::Info { message: "x".into() }.is_terminal());
    }
}
