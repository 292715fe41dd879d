//! Batch curation for AI-generated listing files. Applies the same dedup
//! and quality filters as the request path, so a listing file is clean
//! before it is ever registered as a source.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;

use gigfeed_common::{fold_city, RawEventRecord, Tuning};
use gigfeed_engine::{curate, CurationPolicy, DedupAccumulator};

#[derive(Parser, Debug)]
#[command(name = "gigfeed-curate", about = "Curate an AI-generated listing file")]
struct Args {
    /// JSON file containing an array of raw event records.
    input: PathBuf,

    /// Where to write the curated canonical events (JSON array).
    #[arg(short, long)]
    output: PathBuf,

    /// City the listings belong to; folded into the dedup fingerprint.
    #[arg(short, long)]
    city: String,

    /// Drop records without a parseable start date.
    #[arg(long)]
    require_date: bool,

    /// Override the token-overlap similarity threshold for near-duplicate
    /// titles.
    #[arg(long)]
    similarity_threshold: Option<f64>,
}

async fn run(args: Args) -> Result<()> {
    let mut tuning = Tuning::default();
    if let Some(threshold) = args.similarity_threshold {
        tuning.title_similarity_threshold = threshold;
    }

    let text = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    let records: Vec<RawEventRecord> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", args.input.display()))?;
    let total = records.len();

    let city_key = fold_city(&args.city);
    let mut accumulator = DedupAccumulator::new(tuning.title_similarity_threshold);
    for record in records {
        accumulator.ingest(record, &city_key);
    }
    let merged = accumulator.len();

    let curated = curate(
        accumulator.into_events(),
        CurationPolicy {
            require_date: args.require_date,
        },
        &tuning,
        Utc::now(),
    );

    let json = serde_json::to_vec_pretty(&curated).context("serializing curated events")?;
    tokio::fs::write(&args.output, json)
        .await
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        input = total,
        deduplicated = merged,
        kept = curated.len(),
        output = %args.output.display(),
        "Curation complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    run(Args::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use gigfeed_common::{CanonicalEvent, SourceKind};

    fn record(
        title: &str,
        source: &str,
        kind: SourceKind,
        starts_at: Option<DateTime<Utc>>,
    ) -> RawEventRecord {
        let mut r = RawEventRecord::new(title, source, kind);
        r.starts_at = starts_at;
        r.venue_name = Some("Blue Note".to_string());
        r
    }

    async fn workdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gigfeed-curate-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        dir
    }

    async fn curate_file(records: &[RawEventRecord], args: impl FnOnce(PathBuf, PathBuf) -> Args) -> Vec<CanonicalEvent> {
        let dir = workdir().await;
        let input = dir.join("input.json");
        let output = dir.join("curated.json");
        tokio::fs::write(&input, serde_json::to_vec(records).unwrap())
            .await
            .unwrap();

        run(args(input, output.clone())).await.unwrap();

        let text = tokio::fs::read_to_string(&output).await.unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn listing_file_round_trip_merges_and_filters() {
        let base = Utc::now() + Duration::days(3);
        let records = vec![
            record("Jazz Night @ Blue Note", "venue-scraper", SourceKind::Scraper, Some(base)),
            record("Jazz Night at Blue Note", "ticketapi", SourceKind::OfficialApi, Some(base)),
            record("Live Music", "ai-listings", SourceKind::AiDerived, Some(base)),
            record("Standing Exhibit", "ai-listings", SourceKind::AiDerived, None),
        ];

        let curated = curate_file(&records, |input, output| Args {
            input,
            output,
            city: "Springfield".to_string(),
            require_date: true,
            similarity_threshold: None,
        })
        .await;

        // The @/at variants merged, the generic title and the undated
        // record were dropped.
        assert_eq!(curated.len(), 1);
        assert_eq!(curated[0].sources.len(), 2);
        assert_eq!(curated[0].city, "springfield");
    }

    #[tokio::test]
    async fn similarity_threshold_flag_changes_merge_behavior() {
        let base = Utc::now() + Duration::days(3);
        let records = vec![
            record("Jazz Night at Blue Note", "venue-scraper", SourceKind::Scraper, Some(base)),
            record("Jazz Evening at Blue Note", "ticketapi", SourceKind::OfficialApi, Some(base)),
        ];

        // 3 of 5 significant tokens overlap: distinct under the default
        // threshold, merged under a lax one.
        let strict = curate_file(&records, |input, output| Args {
            input,
            output,
            city: "Springfield".to_string(),
            require_date: true,
            similarity_threshold: None,
        })
        .await;
        assert_eq!(strict.len(), 2);

        let lax = curate_file(&records, |input, output| Args {
            input,
            output,
            city: "Springfield".to_string(),
            require_date: true,
            similarity_threshold: Some(0.5),
        })
        .await;
        assert_eq!(lax.len(), 1);
    }

    #[tokio::test]
    async fn browsing_policy_keeps_undated_records_last() {
        let records = vec![
            record("Standing Exhibit", "ai-listings", SourceKind::AiDerived, None),
            record(
                "Jazz Night at Blue Note",
                "ticketapi",
                SourceKind::OfficialApi,
                Some(Utc::now() + Duration::days(3)),
            ),
        ];

        let curated = curate_file(&records, |input, output| Args {
            input,
            output,
            city: "Springfield".to_string(),
            require_date: false,
            similarity_threshold: None,
        })
        .await;

        assert_eq!(curated.len(), 2);
        assert_eq!(curated[0].title, "Jazz Night at Blue Note");
        assert_eq!(curated[1].title, "Standing Exhibit");
    }
}
