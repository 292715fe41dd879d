//! Scripted providers and sources for exercising the pipeline without any
//! network. Compiled only for tests (`test-support` feature).

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gigfeed_common::{fold_city, GeoPoint, RawEventRecord, ResolvedLocation, SourceKind};

use crate::adapter::{EventSource, FetchConstraints};
use crate::location::{GeocodeHit, Geocoder, IpLocator};

// --- Geocoding stubs ---

/// Geocoder that always answers with one configured city. Forward lookups
/// match any query whose folded form matches the city, which is enough to
/// exercise the resolver's fallback and accent-folding behavior.
pub struct StaticGeocoder {
    city: Option<(String, GeoPoint)>,
    nearby: Vec<(String, GeoPoint)>,
    fail_nearby: bool,
}

impl StaticGeocoder {
    pub fn with_city(name: &str, lat: f64, lng: f64) -> Self {
        Self {
            city: Some((name.to_string(), GeoPoint { lat, lng })),
            nearby: Vec::new(),
            fail_nearby: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            city: None,
            nearby: Vec::new(),
            fail_nearby: false,
        }
    }

    pub fn with_nearby(mut self, nearby: Vec<(&str, f64, f64)>) -> Self {
        self.nearby = nearby
            .into_iter()
            .map(|(name, lat, lng)| (name.to_string(), GeoPoint { lat, lng }))
            .collect();
        self
    }

    pub fn failing_nearby(mut self) -> Self {
        self.fail_nearby = true;
        self
    }

    fn hit(&self) -> Option<GeocodeHit> {
        self.city.as_ref().map(|(name, point)| GeocodeHit {
            city: name.clone(),
            country: None,
            point: *point,
        })
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeHit>> {
        match &self.city {
            Some((name, _)) if fold_city(name) == fold_city(query) => Ok(self.hit()),
            // Nearby-city names geocode to their stored points.
            Some(_) => Ok(self
                .nearby
                .iter()
                .find(|(n, _)| fold_city(n) == fold_city(query))
                .map(|(n, p)| GeocodeHit {
                    city: n.clone(),
                    country: None,
                    point: *p,
                })),
            None => Ok(None),
        }
    }

    async fn reverse(&self, _point: GeoPoint) -> Result<Option<GeocodeHit>> {
        Ok(self.hit())
    }

    async fn nearby(&self, _point: GeoPoint, limit: usize) -> Result<Vec<GeocodeHit>> {
        if self.fail_nearby {
            return Err(anyhow!("nearby lookup unavailable"));
        }
        Ok(self
            .nearby
            .iter()
            .take(limit + 2)
            .map(|(name, point)| GeocodeHit {
                city: name.clone(),
                country: None,
                point: *point,
            })
            .collect())
    }
}

/// IP locator that always fails, for exercising fallback.
pub struct FailingIpLocator;

#[async_trait]
impl IpLocator for FailingIpLocator {
    async fn locate(&self, _ip: &str) -> Result<Option<GeocodeHit>> {
        Err(anyhow!("ip lookup unavailable"))
    }
}

/// IP locator answering with one fixed city.
pub struct StaticIpLocator {
    pub city: String,
    pub point: GeoPoint,
}

#[async_trait]
impl IpLocator for StaticIpLocator {
    async fn locate(&self, _ip: &str) -> Result<Option<GeocodeHit>> {
        Ok(Some(GeocodeHit {
            city: self.city.clone(),
            country: None,
            point: self.point,
        }))
    }
}

// --- Scripted event sources ---

enum Script {
    Records(Vec<RawEventRecord>),
    Fail(String),
    /// Never returns; stands in for a wedged producer.
    Hang,
}

/// An adapter with a scripted outcome and artificial latency.
pub struct ScriptedSource {
    id: String,
    kind: SourceKind,
    delay: Duration,
    script: Script,
}

impl ScriptedSource {
    pub fn returning(id: &str, kind: SourceKind, records: Vec<RawEventRecord>) -> Self {
        Self {
            id: id.to_string(),
            kind,
            delay: Duration::ZERO,
            script: Script::Records(records),
        }
    }

    pub fn failing(id: &str, kind: SourceKind, message: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            delay: Duration::ZERO,
            script: Script::Fail(message.to_string()),
        }
    }

    pub fn hanging(id: &str, kind: SourceKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            delay: Duration::ZERO,
            script: Script::Hang,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(
        &self,
        _location: &ResolvedLocation,
        _constraints: &FetchConstraints,
    ) -> Result<Vec<RawEventRecord>> {
        match &self.script {
            Script::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            _ => {}
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Records(records) => Ok(records.clone()),
            Script::Fail(message) => Err(anyhow!("{message}")),
            Script::Hang => unreachable!(),
        }
    }
}

/// A dated raw record with a venue, the common case in tests.
pub fn dated_record(
    title: &str,
    source: &str,
    kind: SourceKind,
    starts_at: DateTime<Utc>,
) -> RawEventRecord {
    let mut r = RawEventRecord::new(title, source, kind);
    r.starts_at = Some(starts_at);
    r.venue_name = Some("Test Hall".to_string());
    r
}
