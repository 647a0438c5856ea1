//! Best-effort punch context: where the agent stood and what address that is.
//!
//! Nothing in here can fail a punch. Every source returns an explicit
//! `Result`, and [`capture`] logs and drops the error branch, leaving the
//! corresponding field empty.

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::punch::{ADDRESS_UNAVAILABLE, Coordinates};

#[derive(Debug, Error)]
pub enum EnrichmentError {
  #[error("location permission denied")]
  PermissionDenied,

  #[error("no location reported")]
  Unavailable,

  #[error("gave up after {0:?}")]
  TimedOut(Duration),

  #[error("reverse geocoding is disabled")]
  Disabled,

  #[error("reverse geocoding failed: {0}")]
  Geocoding(String),
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Somewhere a position can be obtained from.
pub trait LocationSource: Send + Sync {
  fn locate(
    &self,
  ) -> impl Future<Output = Result<Coordinates, EnrichmentError>> + Send + '_;
}

/// Turns coordinates into a display address.
pub trait Geocoder: Send + Sync {
  fn reverse(
    &self,
    at: Coordinates,
  ) -> impl Future<Output = Result<String, EnrichmentError>> + Send + '_;
}

/// A position reported by the punching client alongside the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportedLocation {
  At(Coordinates),
  Denied,
  Missing,
}

impl ReportedLocation {
  /// Both halves must be present and in range; anything else is `Missing`.
  pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Self {
    match (latitude, longitude) {
      (Some(lat), Some(lon)) => {
        Coordinates::new(lat, lon).map_or(Self::Missing, Self::At)
      }
      _ => Self::Missing,
    }
  }
}

impl LocationSource for ReportedLocation {
  async fn locate(&self) -> Result<Coordinates, EnrichmentError> {
    match self {
      Self::At(at) => Ok(*at),
      Self::Denied => Err(EnrichmentError::PermissionDenied),
      Self::Missing => Err(EnrichmentError::Unavailable),
    }
  }
}

/// A geocoder that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
  async fn reverse(&self, _at: Coordinates) -> Result<String, EnrichmentError> {
    Err(EnrichmentError::Disabled)
  }
}

// ─── Capture ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedContext {
  pub location: Option<Coordinates>,
  pub address:  Option<String>,
}

impl CapturedContext {
  pub fn address_or_sentinel(&self) -> String {
    self
      .address
      .clone()
      .unwrap_or_else(|| ADDRESS_UNAVAILABLE.to_owned())
  }
}

/// Locate, then reverse-geocode if a position was obtained.
///
/// Each step is bounded by `timeout`. On any failure the field stays `None`.
pub async fn capture<L, G>(
  source: &L,
  geocoder: &G,
  timeout: Duration,
) -> CapturedContext
where
  L: LocationSource,
  G: Geocoder,
{
  let location = bounded(timeout, source.locate()).await.map_err(discard).ok();

  let address = match location {
    Some(at) => bounded(timeout, geocoder.reverse(at))
      .await
      .map_err(discard)
      .ok()
      .filter(|a| !a.trim().is_empty()),
    None => None,
  };

  CapturedContext { location, address }
}

async fn bounded<T>(
  timeout: Duration,
  fut: impl Future<Output = Result<T, EnrichmentError>>,
) -> Result<T, EnrichmentError> {
  tokio::time::timeout(timeout, fut)
    .await
    .unwrap_or(Err(EnrichmentError::TimedOut(timeout)))
}

fn discard(err: EnrichmentError) {
  match err {
    EnrichmentError::PermissionDenied
    | EnrichmentError::Unavailable
    | EnrichmentError::Disabled => {
      tracing::debug!(error = %err, "punch context not captured")
    }
    _ => tracing::warn!(error = %err, "punch context enrichment failed"),
  }
}
