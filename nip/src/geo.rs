use hoppipolla_core::error::UpstreamError;

pub const GEOLOCATION: &str = "geolocation";

/// Reverse geocoding backend used to tag hops with the country they operate in.
#[async_trait::async_trait]
pub trait Geolocator: Send + Sync {
    /// Country codes (ISO 3166-1 alpha-2) of the location, most specific result first.
    async fn reverse_geocode(&self, latitude: f32, longitude: f32)
        -> Result<Vec<String>, UpstreamError>;
}
