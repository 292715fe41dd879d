use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// A point is valid only within the lat/lng domain.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// --- Location resolution ---

/// How a location was determined. Set exactly once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Gps,
    Ip,
    Manual,
    Derived,
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionMethod::Gps => write!(f, "gps"),
            ResolutionMethod::Ip => write!(f, "ip"),
            ResolutionMethod::Manual => write!(f, "manual"),
            ResolutionMethod::Derived => write!(f, "derived"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyCity {
    pub name: String,
    pub distance_km: f64,
    /// Always `Derived`; a nearby entry only exists because the primary
    /// city's coordinates produced it.
    pub method: ResolutionMethod,
}

/// Canonical city identity produced by the location resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub city: String,
    pub country: Option<String>,
    pub point: Option<GeoPoint>,
    pub method: ResolutionMethod,
    /// Closest first, at most four entries.
    pub nearby: Vec<NearbyCity>,
}

impl ResolvedLocation {
    pub fn new(
        city: impl Into<String>,
        country: Option<String>,
        point: Option<GeoPoint>,
        method: ResolutionMethod,
    ) -> Self {
        Self {
            city: city.into(),
            country,
            point: point.filter(|p| p.is_valid()),
            method,
            nearby: Vec::new(),
        }
    }

    /// Accent- and case-insensitive key used for city comparison and
    /// fingerprinting.
    pub fn city_key(&self) -> String {
        crate::normalize::fold_city(&self.city)
    }
}

/// Ambiguous location input. The resolver tries GPS, then IP, then free
/// text, in that order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationSignal {
    pub coordinates: Option<GeoPoint>,
    pub ip_address: Option<String>,
    pub free_text: Option<String>,
}

impl LocationSignal {
    pub fn from_coordinates(lat: f64, lng: f64) -> Self {
        Self {
            coordinates: Some(GeoPoint { lat, lng }),
            ..Default::default()
        }
    }

    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip.into()),
            ..Default::default()
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            free_text: Some(text.into()),
            ..Default::default()
        }
    }
}

// --- Sources ---

/// What kind of producer a source is. Ordering is merge priority:
/// official APIs beat scrapers, scrapers beat AI-derived listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    OfficialApi,
    Scraper,
    AiDerived,
}

impl SourceKind {
    /// Lower rank wins a merge tie.
    pub fn priority(&self) -> u8 {
        match self {
            SourceKind::OfficialApi => 0,
            SourceKind::Scraper => 1,
            SourceKind::AiDerived => 2,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::OfficialApi => write!(f, "official_api"),
            SourceKind::Scraper => write!(f, "scraper"),
            SourceKind::AiDerived => write!(f, "ai_derived"),
        }
    }
}

// --- Event records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Price {
    Free,
    Paid { amount: f64, currency: String },
}

/// Fixed category taxonomy for canonical events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Music,
    Theater,
    Comedy,
    Sports,
    Arts,
    Food,
    Nightlife,
    Community,
    Other,
}

impl Category {
    /// Map free-text producer categories onto the fixed taxonomy.
    pub fn from_free_text(text: &str) -> Self {
        let t = text.trim().to_lowercase();
        match t.as_str() {
            s if s.contains("concert") || s.contains("music") || s.contains("gig") => {
                Category::Music
            }
            s if s.contains("theater") || s.contains("theatre") || s.contains("opera") => {
                Category::Theater
            }
            s if s.contains("comedy") || s.contains("stand-up") || s.contains("standup") => {
                Category::Comedy
            }
            s if s.contains("sport") || s.contains("match") || s.contains("race") => {
                Category::Sports
            }
            s if s.contains("art") || s.contains("exhibit") || s.contains("gallery") => {
                Category::Arts
            }
            s if s.contains("food") || s.contains("market") || s.contains("tasting") => {
                Category::Food
            }
            s if s.contains("club") || s.contains("party") || s.contains("dj") => {
                Category::Nightlife
            }
            s if s.contains("meetup") || s.contains("community") || s.contains("workshop") => {
                Category::Community
            }
            _ => Category::Other,
        }
    }
}

/// Producer-specific, minimally-normalized output of one adapter call.
/// Only `title` and `source` are guaranteed; everything else is best effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventRecord {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub category: Option<String>,
    pub price: Option<Price>,
    pub external_id: Option<String>,
    pub source: String,
    pub source_kind: SourceKind,
    pub point: Option<GeoPoint>,
}

impl RawEventRecord {
    pub fn new(title: impl Into<String>, source: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            title: title.into(),
            description: None,
            starts_at: None,
            venue_name: None,
            venue_address: None,
            category: None,
            price: None,
            external_id: None,
            source: source.into(),
            source_kind: kind,
            point: None,
        }
    }

    /// A record without a title or source identifier is unusable.
    pub fn is_well_formed(&self) -> bool {
        !self.title.trim().is_empty() && !self.source.trim().is_empty()
    }

    /// Calendar date (day granularity) of the start, if any.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.starts_at.map(|t| t.date_naive())
    }
}

/// One source's contribution to a canonical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub source: String,
    pub kind: SourceKind,
}

/// The deduplicated, display-ready unit. Created and mutated only by the
/// dedup engine; never deleted within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub category: Category,
    pub price: Option<Price>,
    pub external_id: Option<String>,
    pub point: Option<GeoPoint>,
    /// Originating city tag (folded key form).
    pub city: String,
    pub fingerprint: String,
    /// All sources that contributed, accumulated across merges.
    pub sources: Vec<Contribution>,
    pub quality: f32,
}

impl CanonicalEvent {
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.starts_at.map(|t| t.date_naive())
    }

    /// True when every contribution came from an AI-derived listing.
    pub fn ai_derived_only(&self) -> bool {
        !self.sources.is_empty()
            && self.sources.iter().all(|c| c.kind == SourceKind::AiDerived)
    }

    /// Best (lowest) priority rank among contributing sources.
    pub fn best_priority(&self) -> u8 {
        self.sources
            .iter()
            .map(|c| c.kind.priority())
            .min()
            .unwrap_or(u8::MAX)
    }
}
