//! Reverse geocoding
//!
//! Resolves a coordinate pair to a human-readable address via a
//! Nominatim-compatible service. Resolution is strictly best-effort:
//! every failure mode (network, non-2xx, malformed body, timeout)
//! collapses to the `UNKNOWN_LOCATION` sentinel and the caller
//! proceeds unaffected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::data::GeoPoint;
use crate::metrics::GEOCODE_LOOKUPS_TOTAL;

/// Address substituted whenever resolution fails or times out
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// Reverse-geocoding capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a point to an address string. Never fails upward.
    async fn resolve(&self, point: GeoPoint) -> String;
}

/// Nominatim `/reverse` response body (only the field we use)
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Production geocoder backed by a shared reqwest client
pub struct NominatimGeocoder {
    http_client: Arc<reqwest::Client>,
    base_url: url::Url,
    timeout: Duration,
}

impl NominatimGeocoder {
    /// # Errors
    /// Returns error if `base_url` is not a valid URL
    pub fn new(
        http_client: Arc<reqwest::Client>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, crate::error::AppError> {
        let base_url = url::Url::parse(base_url).map_err(|e| {
            crate::error::AppError::Config(format!("invalid geocoder base URL: {}", e))
        })?;

        Ok(Self {
            http_client,
            base_url,
            timeout,
        })
    }

    async fn lookup(&self, point: GeoPoint) -> Result<String, anyhow::Error> {
        let mut url = self.base_url.join("reverse")?;
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("lat", &point.lat.to_string())
            .append_pair("lon", &point.lng.to_string());

        let response = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        let body: ReverseResponse = response.json().await?;
        body.display_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow::anyhow!("reverse response has no display_name"))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, point: GeoPoint) -> String {
        match tokio::time::timeout(self.timeout, self.lookup(point)).await {
            Ok(Ok(address)) => {
                GEOCODE_LOOKUPS_TOTAL.with_label_values(&["ok"]).inc();
                address
            }
            Ok(Err(e)) => {
                GEOCODE_LOOKUPS_TOTAL.with_label_values(&["fallback"]).inc();
                tracing::warn!(lat = point.lat, lng = point.lng, error = %e, "Reverse geocode failed");
                UNKNOWN_LOCATION.to_string()
            }
            Err(_) => {
                GEOCODE_LOOKUPS_TOTAL.with_label_values(&["fallback"]).inc();
                tracing::warn!(
                    lat = point.lat,
                    lng = point.lng,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Reverse geocode timed out"
                );
                UNKNOWN_LOCATION.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> Arc<reqwest::Client> {
        Arc::new(reqwest::Client::new())
    }

    /// Serve exactly one canned HTTP response on a loopback listener.
    async fn stub_http(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn resolve_returns_display_name_on_success() {
        let base = stub_http(
            "HTTP/1.1 200 OK",
            r#"{"display_name":"Jl. Merdeka No.1, Jakarta"}"#,
        )
        .await;
        let geocoder =
            NominatimGeocoder::new(client(), &base, Duration::from_secs(3)).unwrap();

        let address = geocoder.resolve(GeoPoint::new(-6.2, 106.8166)).await;
        assert_eq!(address, "Jl. Merdeka No.1, Jakarta");
    }

    #[tokio::test]
    async fn resolve_falls_back_when_service_is_unreachable() {
        // Port 9 (discard) is closed; connection is refused immediately.
        let geocoder = NominatimGeocoder::new(
            client(),
            "http://127.0.0.1:9/",
            Duration::from_secs(3),
        )
        .unwrap();

        let address = geocoder.resolve(GeoPoint::new(-6.2, 106.8166)).await;
        assert_eq!(address, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn resolve_falls_back_on_non_success_status() {
        let base = stub_http("HTTP/1.1 500 Internal Server Error", "{}").await;
        let geocoder =
            NominatimGeocoder::new(client(), &base, Duration::from_secs(3)).unwrap();

        let address = geocoder.resolve(GeoPoint::new(-6.2, 106.8166)).await;
        assert_eq!(address, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn resolve_falls_back_on_malformed_body() {
        let base = stub_http("HTTP/1.1 200 OK", "not json at all").await;
        let geocoder =
            NominatimGeocoder::new(client(), &base, Duration::from_secs(3)).unwrap();

        let address = geocoder.resolve(GeoPoint::new(-6.2, 106.8166)).await;
        assert_eq!(address, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn resolve_falls_back_on_missing_display_name() {
        let base = stub_http("HTTP/1.1 200 OK", r#"{"place_id": 42}"#).await;
        let geocoder =
            NominatimGeocoder::new(client(), &base, Duration::from_secs(3)).unwrap();

        let address = geocoder.resolve(GeoPoint::new(-6.2, 106.8166)).await;
        assert_eq!(address, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn resolve_falls_back_on_timeout() {
        // Accept the connection but never respond.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(stream);
            }
        });

        let geocoder = NominatimGeocoder::new(
            client(),
            &format!("http://{}/", addr),
            Duration::from_millis(200),
        )
        .unwrap();

        let address = geocoder.resolve(GeoPoint::new(-6.2, 106.8166)).await;
        assert_eq!(address, UNKNOWN_LOCATION);
    }
}
