//! The daily QR token: `QR-YYYY-MM-DD`.
//!
//! The token carries only the punch day. Direction travels next to it (a
//! query parameter on the scanned URL) and is parsed by
//! [`Direction::parse`](crate::punch::Direction::parse).

use chrono::NaiveDate;

use crate::{Error, Result};

pub const TOKEN_PREFIX: &str = "QR-";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Decode a scanned token into the calendar date it encodes.
///
/// The string must be the literal prefix followed by exactly ten characters
/// shaped `dddd-dd-dd`, and those must name a real calendar day:
/// `QR-2024-13-01` has the right shape but is rejected.
pub fn decode(token: &str) -> Result<NaiveDate> {
  let invalid = || Error::InvalidTokenFormat(token.to_owned());

  let date = token.strip_prefix(TOKEN_PREFIX).ok_or_else(invalid)?;
  if !has_date_shape(date) {
    return Err(invalid());
  }

  NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| invalid())
}

/// Build the token printed into the QR code for `date`.
pub fn encode(date: NaiveDate) -> String {
  format!("{TOKEN_PREFIX}{}", date.format(DATE_FORMAT))
}

fn has_date_shape(s: &str) -> bool {
  let bytes = s.as_bytes();
  bytes.len() == 10
    && bytes.iter().enumerate().all(|(i, b)| match i {
      4 | 7 => *b == b'-',
      _ => b.is_ascii_digit(),
    })
}
