use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use gigfeed_common::{
    fold_city, haversine_km, Config, GeoPoint, GigfeedError, LocationSignal, NearbyCity,
    ResolutionMethod, ResolvedLocation,
};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// One geocoding hit: a named place with coordinates.
#[derive(Debug, Clone)]
pub struct GeocodeHit {
    pub city: String,
    pub country: Option<String>,
    pub point: GeoPoint,
}

// --- Provider traits ---

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Forward-geocode a free-text place name.
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeHit>>;
    /// Reverse-geocode coordinates to a human-readable city.
    async fn reverse(&self, point: GeoPoint) -> Result<Option<GeocodeHit>>;
    /// Settlements near a point, excluding the point's own city.
    async fn nearby(&self, point: GeoPoint, limit: usize) -> Result<Vec<GeocodeHit>>;
}

#[async_trait]
pub trait IpLocator: Send + Sync {
    /// Coarse geolocation of an IP address.
    async fn locate(&self, ip: &str) -> Result<Option<GeocodeHit>>;
}

// --- Nominatim (OpenStreetMap) ---

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    town: Option<String>,
    #[serde(default)]
    village: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl NominatimPlace {
    fn city_name(&self) -> Option<String> {
        if let Some(addr) = &self.address {
            if let Some(c) = addr.city.clone().or_else(|| addr.town.clone()).or_else(|| addr.village.clone()) {
                return Some(c);
            }
        }
        if let Some(name) = &self.name {
            if !name.is_empty() {
                return Some(name.clone());
            }
        }
        // display_name is comma-separated, most specific first
        self.display_name
            .split(',')
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn to_hit(&self) -> Option<GeocodeHit> {
        let lat: f64 = self.lat.parse().ok()?;
        let lng: f64 = self.lon.parse().ok()?;
        let point = GeoPoint { lat, lng };
        if !point.is_valid() {
            return None;
        }
        Some(GeocodeHit {
            city: self.city_name()?,
            country: self.address.as_ref().and_then(|a| a.country.clone()),
            point,
        })
    }
}

pub struct NominatimGeocoder {
    base_url: String,
    user_agent: String,
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.nominatim_base_url, &config.geocoder_user_agent)
    }

    async fn get_places(&self, url: &str) -> Result<Vec<NominatimPlace>> {
        self.client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await
            .context("Nominatim request failed")?
            .json()
            .await
            .context("Failed to parse Nominatim response")
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeHit>> {
        let url = format!(
            "{}/search?q={}&format=json&addressdetails=1&limit=1",
            self.base_url,
            urlencode(query)
        );
        let places = self.get_places(&url).await?;
        Ok(places.first().and_then(NominatimPlace::to_hit))
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<GeocodeHit>> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1&zoom=10",
            self.base_url, point.lat, point.lng
        );
        let resp = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await
            .context("Nominatim reverse request failed")?;
        let place: NominatimPlace = resp
            .json()
            .await
            .context("Failed to parse Nominatim reverse response")?;
        Ok(place.to_hit())
    }

    async fn nearby(&self, point: GeoPoint, limit: usize) -> Result<Vec<GeocodeHit>> {
        // Bounded settlement search in a ~0.5 degree box around the point.
        let url = format!(
            "{}/search?q=city&format=json&addressdetails=1&featureType=city&bounded=1&viewbox={},{},{},{}&limit={}",
            self.base_url,
            point.lng - 0.5,
            point.lat + 0.5,
            point.lng + 0.5,
            point.lat - 0.5,
            // Over-fetch so the primary city can be filtered out afterwards.
            limit + 2
        );
        let places = self.get_places(&url).await?;
        Ok(places.iter().filter_map(NominatimPlace::to_hit).collect())
    }
}

// --- ip-api.com style IP geolocation ---

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

pub struct IpApiLocator {
    base_url: String,
    client: reqwest::Client,
}

impl IpApiLocator {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.ip_lookup_base_url)
    }
}

#[async_trait]
impl IpLocator for IpApiLocator {
    async fn locate(&self, ip: &str) -> Result<Option<GeocodeHit>> {
        let url = format!("{}/{}", self.base_url, ip);
        let resp: IpApiResponse = self
            .client
            .get(&url)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await
            .context("IP lookup request failed")?
            .json()
            .await
            .context("Failed to parse IP lookup response")?;

        if resp.status != "success" {
            return Ok(None);
        }
        let (Some(city), Some(lat), Some(lon)) = (resp.city, resp.lat, resp.lon) else {
            return Ok(None);
        };
        let point = GeoPoint { lat, lng: lon };
        if !point.is_valid() {
            return Ok(None);
        }
        Ok(Some(GeocodeHit {
            city,
            country: resp.country,
            point,
        }))
    }
}

// --- Resolver ---

/// Turns an ambiguous location signal into a canonical city plus nearby
/// cities. Resolution order: GPS, then IP, then free-text geocoding. Each
/// failing step falls through to the next; only total failure is an error.
pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
    ip_locator: Arc<dyn IpLocator>,
    max_nearby: usize,
}

impl LocationResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        ip_locator: Arc<dyn IpLocator>,
        max_nearby: usize,
    ) -> Self {
        Self {
            geocoder,
            ip_locator,
            max_nearby,
        }
    }

    pub async fn resolve(&self, signal: &LocationSignal) -> Result<ResolvedLocation, GigfeedError> {
        let mut location = self.resolve_base(signal).await?;
        self.enrich_nearby(&mut location).await;
        Ok(location)
    }

    /// Resolve a nearby-city name to its own location, tagged `derived`.
    pub async fn resolve_derived(&self, city: &str) -> Result<ResolvedLocation, GigfeedError> {
        match self.geocoder.geocode(&fold_city(city)).await {
            Ok(Some(hit)) => Ok(ResolvedLocation::new(
                hit.city,
                hit.country,
                Some(hit.point),
                ResolutionMethod::Derived,
            )),
            Ok(None) => Err(GigfeedError::Unresolvable(city.to_string())),
            Err(e) => Err(GigfeedError::Provider(e.to_string())),
        }
    }

    async fn resolve_base(&self, signal: &LocationSignal) -> Result<ResolvedLocation, GigfeedError> {
        // 1. Device coordinates
        if let Some(point) = signal.coordinates.filter(GeoPoint::is_valid) {
            match self.geocoder.reverse(point).await {
                Ok(Some(hit)) => {
                    info!(city = hit.city.as_str(), method = "gps", "Location resolved");
                    return Ok(ResolvedLocation::new(
                        hit.city,
                        hit.country,
                        Some(point),
                        ResolutionMethod::Gps,
                    ));
                }
                Ok(None) => warn!("Reverse geocoding found no city, falling through"),
                Err(e) => warn!(error = %e, "Reverse geocoding failed, falling through"),
            }
        }

        // 2. IP geolocation
        if let Some(ip) = signal.ip_address.as_deref() {
            match self.ip_locator.locate(ip).await {
                Ok(Some(hit)) => {
                    info!(city = hit.city.as_str(), method = "ip", "Location resolved");
                    return Ok(ResolvedLocation::new(
                        hit.city,
                        hit.country,
                        Some(hit.point),
                        ResolutionMethod::Ip,
                    ));
                }
                Ok(None) => warn!(ip, "IP geolocation found nothing, falling through"),
                Err(e) => warn!(ip, error = %e, "IP geolocation failed, falling through"),
            }
        }

        // 3. Free-text geocoding, accent-insensitive
        if let Some(text) = signal.free_text.as_deref().filter(|t| !t.trim().is_empty()) {
            match self.geocoder.geocode(&fold_city(text)).await {
                Ok(Some(hit)) => {
                    info!(city = hit.city.as_str(), method = "manual", "Location resolved");
                    return Ok(ResolvedLocation::new(
                        hit.city,
                        hit.country,
                        Some(hit.point),
                        ResolutionMethod::Manual,
                    ));
                }
                Ok(None) => warn!(query = text, "Geocoding found nothing"),
                Err(e) => warn!(query = text, error = %e, "Geocoding failed"),
            }
        }

        Err(GigfeedError::Unresolvable(
            "no location signal could be resolved".to_string(),
        ))
    }

    /// Nearby-city enrichment. Failure degrades to a single-city result,
    /// never fails resolution.
    async fn enrich_nearby(&self, location: &mut ResolvedLocation) {
        let Some(point) = location.point else {
            return;
        };
        let own_key = location.city_key();

        let hits = match self.geocoder.nearby(point, self.max_nearby).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(city = location.city.as_str(), error = %e, "Nearby-city lookup failed, degrading to single city");
                return;
            }
        };

        let mut nearby: Vec<NearbyCity> = hits
            .into_iter()
            .filter(|h| fold_city(&h.city) != own_key)
            .map(|h| NearbyCity {
                distance_km: haversine_km(point, h.point),
                name: h.city,
                method: ResolutionMethod::Derived,
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby.dedup_by(|a, b| fold_city(&a.name) == fold_city(&b.name));
        nearby.truncate(self.max_nearby);

        info!(
            city = location.city.as_str(),
            nearby = nearby.len(),
            "Nearby cities resolved"
        );
        location.nearby = nearby;
    }
}

/// Percent-encode the characters that matter for a query parameter.
fn urlencode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}
