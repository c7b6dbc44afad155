//! Place lookup for "doctors near me".
//!
//! Patients type a town, a well-known landmark or `lat,lng` coordinates.
//! Provider locations are free text resolved through the same tables, so a
//! provider whose location names no known place has no distance.

use clinic_integrity::{Provider, ProviderStore};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tujali_shared::HealthResult;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Where unresolved searches are measured from
pub const DEFAULT_TOWN: &str = "Nairobi";

/// The first entry is [`DEFAULT_TOWN`]
const TOWNS: [(&str, f64, f64); 15] = [
    ("Nairobi", -1.286389, 36.817223),
    ("Mombasa", -4.043740, 39.668207),
    ("Kisumu", -0.091702, 34.767956),
    ("Nakuru", -0.303099, 36.080025),
    ("Eldoret", 0.520240, 35.269779),
    ("Meru", 0.046900, 37.649200),
    ("Kikuyu", -1.246667, 36.662500),
    ("Malindi", -3.219167, 40.116944),
    ("Garissa", -0.453611, 39.646389),
    ("Kitale", 1.015556, 35.006111),
    ("Thika", -1.033611, 37.069444),
    ("Machakos", -1.516667, 37.266667),
    ("Kericho", -0.370278, 35.283889),
    ("Nyeri", -0.416667, 36.950000),
    ("Embu", -0.533333, 37.450000),
];

/// Landmark to the town it sits in
const LANDMARKS: [(&str, &str); 13] = [
    ("cbd", "Nairobi"),
    ("city center", "Nairobi"),
    ("downtown", "Nairobi"),
    ("westgate", "Nairobi"),
    ("karen", "Nairobi"),
    ("westlands", "Nairobi"),
    ("kasarani", "Nairobi"),
    ("kondele", "Kisumu"),
    ("nyalenda", "Kisumu"),
    ("stadium", "Nakuru"),
    ("pipeline", "Nakuru"),
    ("langas", "Eldoret"),
    ("moi university", "Eldoret"),
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceSource {
    Gps,
    Town,
    Landmark,
    /// Nothing matched; measured from [`DEFAULT_TOWN`]
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Place {
    pub point: GeoPoint,
    /// Known town the place is in, `None` for raw coordinates
    pub town: Option<&'static str>,
    pub source: PlaceSource,
}

fn town(name: &str) -> Option<(&'static str, GeoPoint)> {
    TOWNS
        .iter()
        .find(|(town, _, _)| town.eq_ignore_ascii_case(name))
        .map(|&(town, lat, lng)| (town, GeoPoint { lat, lng }))
}

fn parse_coordinates(text: &str) -> Option<GeoPoint> {
    let (lat, lng) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)).then_some(GeoPoint { lat, lng })
}

/// Resolve free text to a known place: coordinates, then a town name
/// anywhere in the text, then a landmark
pub fn locate(text: &str) -> Option<Place> {
    if let Some(point) = parse_coordinates(text) {
        return Some(Place {
            point,
            town: None,
            source: PlaceSource::Gps,
        });
    }

    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    if let Some(&(name, lat, lng)) = TOWNS.iter().find(|(name, _, _)| lowered.contains(&name.to_lowercase())) {
        return Some(Place {
            point: GeoPoint { lat, lng },
            town: Some(name),
            source: PlaceSource::Town,
        });
    }
    LANDMARKS
        .iter()
        .find(|(landmark, _)| lowered.contains(landmark))
        .and_then(|(_, town_name)| town(town_name))
        .map(|(name, point)| Place {
            point,
            town: Some(name),
            source: PlaceSource::Landmark,
        })
}

/// Like [`locate`], falling back to [`DEFAULT_TOWN`]
pub fn resolve_place(text: &str) -> Place {
    locate(text).unwrap_or(Place {
        point: GeoPoint {
            lat: TOWNS[0].1,
            lng: TOWNS[0].2,
        },
        town: Some(DEFAULT_TOWN),
        source: PlaceSource::Fallback,
    })
}

/// Great-circle distance rounded to 0.1 km
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let km = EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    (km * 10.0).round() / 10.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NearbyProvider {
    pub provider: Provider,
    /// `None` when the provider's location names no known place
    pub distance_km: Option<f64>,
}

/// Providers nearest to `near` first; providers without a known place
/// follow in registration order
pub fn providers_near<S>(store: &S, near: &str, limit: usize) -> HealthResult<(Place, Vec<NearbyProvider>)>
where
    S: ProviderStore + ?Sized,
{
    let origin = resolve_place(near);
    let mut nearby: Vec<NearbyProvider> = store
        .list_providers()?
        .into_iter()
        .map(|provider| {
            let distance_km = provider
                .location
                .as_deref()
                .and_then(locate)
                .map(|place| distance_km(origin.point, place.point));
            NearbyProvider { provider, distance_km }
        })
        .collect();

    nearby.sort_by(|a, b| {
        let by_distance = match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_distance.then(a.provider.id.cmp(&b.provider.id))
    });
    nearby.truncate(limit);
    Ok((origin, nearby))
}
