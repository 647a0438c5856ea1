//! `GET /admin/export.csv`: the punch listing as a spreadsheet-friendly CSV.
//!
//! Accepts the same filters as `/admin/punches`. Dates and times are in the
//! server's local time zone.

use std::{io, sync::Arc};

use axum::{
  extract::{Query, State},
  http::header,
  response::IntoResponse,
};
use chrono::{DateTime, Local, TimeZone};
use pointage_core::{agent::AgentIndex, punch::PunchEvent};

use crate::{
  Backend,
  error::ApiError,
  punches::{ListParams, fetch},
};

pub const HEADER: [&str; 8] = [
  "Date",
  "Heure",
  "Type",
  "Agent",
  "Code",
  "IP",
  "Adresse",
  "Coordonnées GPS",
];

const NOT_AVAILABLE: &str = "Non disponible";

/// `GET /admin/export.csv`
pub async fn csv<S: Backend>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
  let (punches, index) = fetch(store.as_ref(), params).await?;
  let body = render(&punches, &index, &Local)
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let filename = format!(
    "attachment; filename=\"pointages_{}.csv\"",
    Local::now().format("%Y-%m-%d")
  );
  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
      (header::CONTENT_DISPOSITION, filename),
    ],
    body,
  ))
}

/// Write `punches` as CSV, one row each, in the given order, with
/// timestamps shown in `tz`.
pub fn render<Tz: TimeZone>(
  punches: &[PunchEvent],
  index: &AgentIndex,
  tz: &Tz,
) -> Result<String, csv::Error>
where
  Tz::Offset: std::fmt::Display,
{
  let mut wtr = csv::Writer::from_writer(Vec::new());
  wtr.write_record(HEADER)?;

  for punch in punches {
    let at: DateTime<Tz> = punch.captured_at.with_timezone(tz);
    let coords = punch
      .location
      .map_or_else(|| NOT_AVAILABLE.to_owned(), |at| at.to_string());
    wtr.write_record([
      at.format("%d/%m/%Y").to_string(),
      at.format("%H:%M:%S").to_string(),
      punch.direction.label().to_owned(),
      index.display_name(punch),
      punch.personal_code.to_string(),
      punch.source_ip.clone().unwrap_or_default(),
      punch.resolved_address.clone(),
      coords,
    ])?;
  }

  let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
  String::from_utf8(bytes)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}
