//! Personal codes: the 4-digit identifier an agent types to punch.

use std::{collections::HashSet, fmt, str::FromStr};

use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lowest code handed out by [`generate_unique`].
pub const GENERATED_MIN: u32 = 1000;

/// Number of codes in the generated range `1000..=9999`.
pub const GENERATED_SPAN: u32 = 9000;

/// Random draws attempted before falling back to a linear scan.
pub const MAX_RANDOM_DRAWS: usize = 64;

/// Exactly four ASCII digits. Any such string is a valid code, including
/// ones below 1000 that an administrator typed by hand.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct PersonalCode(String);

impl PersonalCode {
  pub fn parse(input: &str) -> Result<Self> {
    if is_valid_format(input) {
      Ok(Self(input.to_owned()))
    } else {
      Err(Error::InvalidCodeFormat(input.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }

  fn from_number(n: u32) -> Self { Self(format!("{n:04}")) }
}

/// `^[0-9]{4}$`, without pulling in a regex engine.
pub fn is_valid_format(input: &str) -> bool {
  input.len() == 4 && input.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for PersonalCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for PersonalCode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for PersonalCode {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<PersonalCode> for String {
  fn from(code: PersonalCode) -> Self { code.0 }
}

/// Pick a code in `1000..=9999` that is not in `taken`.
///
/// Uniform random draws first; with a small directory the first draw almost
/// always succeeds. After [`MAX_RANDOM_DRAWS`] collisions the remaining space
/// is scanned from a random offset, so the call always terminates and fails
/// only when the whole range is assigned.
pub fn generate_unique<R>(
  taken: &HashSet<PersonalCode>,
  rng: &mut R,
) -> Result<PersonalCode>
where
  R: RngCore + ?Sized,
{
  for _ in 0..MAX_RANDOM_DRAWS {
    let candidate =
      PersonalCode::from_number(GENERATED_MIN + rng.next_u32() % GENERATED_SPAN);
    if !taken.contains(&candidate) {
      return Ok(candidate);
    }
  }

  let start = rng.next_u32() % GENERATED_SPAN;
  (0..GENERATED_SPAN)
    .map(|i| {
      PersonalCode::from_number(GENERATED_MIN + (start + i) % GENERATED_SPAN)
    })
    .find(|candidate| !taken.contains(candidate))
    .ok_or(Error::CodeSpaceExhausted)
}

#[cfg(test)]
mod tests {
  use rand_core::OsRng;

  use super::*;

  /// Always yields the same value, forcing every random draw to collide.
  struct Stuck(u32);

  impl RngCore for Stuck {
    fn next_u32(&mut self) -> u32 { self.0 }

    fn next_u64(&mut self) -> u64 { u64::from(self.0) }

    fn fill_bytes(&mut self, dest: &mut [u8]) { dest.fill(0) }

    fn try_fill_bytes(
      &mut self,
      dest: &mut [u8],
    ) -> std::result::Result<(), rand_core::Error> {
      dest.fill(0);
      Ok(())
    }
  }

  fn codes(range: impl Iterator<Item = u32>) -> HashSet<PersonalCode> {
    range.map(PersonalCode::from_number).collect()
  }

  #[test]
  fn accepts_exactly_four_digits() {
    assert!(PersonalCode::parse("4821").is_ok());
    assert!(PersonalCode::parse("0007").is_ok());
    for bad in ["", "123", "12345", "12a4", " 123", "１２３４", "-123"] {
      assert!(
        matches!(PersonalCode::parse(bad), Err(Error::InvalidCodeFormat(_))),
        "{bad:?} should be rejected"
      );
    }
  }

  #[test]
  fn serde_rejects_malformed_codes() {
    let ok: PersonalCode = serde_json::from_str("\"4821\"").unwrap();
    assert_eq!(ok.as_str(), "4821");
    assert!(serde_json::from_str::<PersonalCode>("\"48\"").is_err());
  }

  #[test]
  fn generated_code_avoids_taken_codes() {
    let taken = codes((1000..9999).step_by(3));
    for _ in 0..200 {
      let code = generate_unique(&taken, &mut OsRng).unwrap();
      assert!(!taken.contains(&code), "{code} was already taken");
      let n: u32 = code.as_str().parse().unwrap();
      assert!((1000..=9999).contains(&n));
    }
  }

  #[test]
  fn falls_back_to_scan_when_draws_keep_colliding() {
    let taken = codes(1000..1010);
    let code = generate_unique(&taken, &mut Stuck(0)).unwrap();
    assert_eq!(code.as_str(), "1010");
  }

  #[test]
  fn finds_the_last_free_code() {
    let taken = codes((1000..=9999).filter(|n| *n != 5555));
    let code = generate_unique(&taken, &mut OsRng).unwrap();
    assert_eq!(code.as_str(), "5555");
  }

  #[test]
  fn exhausted_space_is_an_error() {
    let taken = codes(1000..=9999);
    assert!(matches!(
      generate_unique(&taken, &mut OsRng),
      Err(Error::CodeSpaceExhausted)
    ));
  }
}
