//! Reverse geocoding over a Nominatim-compatible HTTP API.

use std::time::Duration;

use pointage_core::{
  context::{EnrichmentError, Geocoder, NoGeocoder},
  punch::Coordinates,
};
use reqwest::Client;
use serde::Deserialize;

use crate::{ServerConfig, error::Result};

/// `GET {base_url}/reverse?format=json&lat=…&lon=…`
#[derive(Clone)]
pub struct NominatimGeocoder {
  client:   Client,
  base_url: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
  display_name: Option<String>,
  error:        Option<String>,
}

impl NominatimGeocoder {
  /// Nominatim's usage policy asks for an identifying `User-Agent`.
  pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .user_agent(user_agent)
      .timeout(timeout)
      .build()?;
    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
  }

  fn url(&self) -> String { format!("{}/reverse", self.base_url) }
}

impl Geocoder for NominatimGeocoder {
  async fn reverse(&self, at: Coordinates) -> Result<String, EnrichmentError> {
    let resp = self
      .client
      .get(self.url())
      .query(&[
        ("format", "json".to_owned()),
        ("lat", at.latitude.to_string()),
        ("lon", at.longitude.to_string()),
        ("zoom", "18".to_owned()),
        ("addressdetails", "1".to_owned()),
      ])
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(geocoding)?;

    let body: ReverseResponse = resp.json().await.map_err(geocoding)?;
    display_name(body)
  }
}

fn display_name(body: ReverseResponse) -> Result<String, EnrichmentError> {
  match body {
    ReverseResponse { display_name: Some(name), .. } if !name.trim().is_empty() => {
      Ok(name)
    }
    ReverseResponse { error: Some(e), .. } => Err(EnrichmentError::Geocoding(e)),
    _ => Err(EnrichmentError::Geocoding("response carried no address".into())),
  }
}

fn geocoding(err: reqwest::Error) -> EnrichmentError {
  if err.is_timeout() {
    EnrichmentError::Geocoding("request timed out".into())
  } else {
    EnrichmentError::Geocoding(err.to_string())
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// The geocoder the server was configured with.
#[derive(Clone)]
pub enum ConfiguredGeocoder {
  Nominatim(NominatimGeocoder),
  Disabled(NoGeocoder),
}

impl ConfiguredGeocoder {
  pub fn from_config(config: &ServerConfig) -> Result<Self> {
    if !config.geocoder_enabled {
      return Ok(Self::Disabled(NoGeocoder));
    }
    let geocoder = NominatimGeocoder::new(
      &config.geocoder_url,
      &config.geocoder_user_agent,
      config.geolocation_timeout(),
    )?;
    Ok(Self::Nominatim(geocoder))
  }
}

impl Geocoder for ConfiguredGeocoder {
  async fn reverse(&self, at: Coordinates) -> Result<String, EnrichmentError> {
    match self {
      Self::Nominatim(g) => g.reverse(at).await,
      Self::Disabled(g) => g.reverse(at).await,
    }
  }
}
