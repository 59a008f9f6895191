use std::fmt;
use std::sync::LazyLock;
use std::{ops::Deref, str::FromStr};

use compact_str::CompactString;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, de::Error};

use crate::error::AtStrError;
use crate::{CowStr, IntoStatic};
use regex::Regex;

const SPEC: &str = "tid";

/// base32-sortable alphabet
const S32_CHAR: &[u8] = b"234567abcdefghijklmnopqrstuvwxyz";

fn s32_encode(mut i: u64) -> CowStr<'static> {
    let mut s = CompactString::with_capacity(13);
    for _ in 0..13 {
        let c = i & 0x1F;
        s.push(S32_CHAR[c as usize] as char);

        i >>= 5;
    }

    // Reverse the string to convert it to big-endian format.
    CowStr::Owned(s.chars().rev().collect())
}

fn s32_decode(s: &str) -> u64 {
    s.bytes().fold(0u64, |acc, b| {
        let digit = match b {
            b'2'..=b'7' => b - b'2',
            b'a'..=b'z' => b - b'a' + 6,
            _ => 0,
        };
        (acc << 5) | u64::from(digit)
    })
}

static TID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[234567abcdefghij][234567abcdefghijklmnopqrstuvwxyz]{12}$").unwrap()
});

/// A [Timestamp Identifier].
///
/// Thirteen base32-sortable characters packing a 53-bit microsecond timestamp
/// and a 10-bit clock id, with the top bit always zero. Lexicographic order
/// of TID strings equals chronological order of their timestamps.
///
/// [Timestamp Identifier]: https://atproto.com/specs/tid
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Hash)]
#[serde(transparent)]
pub struct Tid<'t>(CowStr<'t>);

fn check(tid: &str) -> Result<(), AtStrError> {
    if tid.len() != 13 {
        return Err(AtStrError::char_class(SPEC, tid, "TID must be 13 characters"));
    }
    if !TID_REGEX.is_match(tid) {
        return Err(AtStrError::char_class(
            SPEC,
            tid,
            "TID must be base32-sortable with a zero high bit",
        ));
    }
    Ok(())
}

impl<'t> Tid<'t> {
    /// Parses a TID from the given string, borrowing from input.
    pub fn new(tid: &'t str) -> Result<Self, AtStrError> {
        check(tid)?;
        Ok(Self(CowStr::Borrowed(tid)))
    }

    /// Parses a TID from the given string, taking ownership.
    pub fn new_owned(tid: impl AsRef<str>) -> Result<Tid<'static>, AtStrError> {
        let tid = tid.as_ref();
        check(tid)?;
        Ok(Tid(CowStr::copy_from_str(tid)))
    }

    /// Infallible constructor for when you *know* the string is a valid TID.
    /// Will panic on invalid TIDs.
    pub fn raw(tid: &'t str) -> Self {
        match Self::new(tid) {
            Ok(tid) => tid,
            Err(e) => panic!("invalid TID: {e}"),
        }
    }

    /// Construct a TID from a microsecond timestamp and a clock id.
    ///
    /// The timestamp is truncated to 53 bits and the clock id to 10, keeping
    /// the packed value's high bit zero.
    pub fn from_parts(timestamp_us: u64, clkid: u16) -> Tid<'static> {
        // 0TTTTTTTTTTTTTTT TTTTTTTTTTTTTTTT TTTTTTTTTTTTTTTT TTTTTTCCCCCCCCCC
        let tid = (timestamp_us << 10) & 0x7FFF_FFFF_FFFF_FC00 | (u64::from(clkid) & 0x3FF);
        Tid(s32_encode(tid))
    }

    /// Construct a TID for the current time with the given clock id.
    ///
    /// If you have multiple clock sources, `clkid` distinguishes them; with a
    /// single source just pass `0`.
    ///
    /// _Warning:_ two calls within the same microsecond return the same TID.
    /// Callers that need unique values must re-draw until the value changes.
    pub fn now(clkid: u16) -> Tid<'static> {
        let now = chrono::Utc::now().timestamp_micros() as u64;
        Self::from_parts(now, clkid)
    }

    /// Construct a TID for the current time with a random 10-bit clock id.
    ///
    /// The random clock id makes collisions between concurrent writers
    /// improbable, not impossible.
    pub fn now_random() -> Tid<'static> {
        Self::now(rand::thread_rng().gen_range(0..1024))
    }

    /// The microsecond timestamp packed into this TID.
    pub fn timestamp_us(&self) -> u64 {
        s32_decode(&self.0) >> 10
    }

    /// The 10-bit clock id packed into this TID.
    pub fn clock_id(&self) -> u16 {
        (s32_decode(&self.0) & 0x3FF) as u16
    }

    /// Returns the TID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Tid<'_> {
    type Err = AtStrError;

    /// Has to take ownership due to the lifetime constraints of the FromStr
    /// trait. Prefer [`Tid::new`] if you want to borrow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s)?)
    }
}

impl IntoStatic for Tid<'_> {
    type Output = Tid<'static>;

    fn into_static(self) -> Self::Output {
        Tid(self.0.into_static())
    }
}

impl<'de, 'a> Deserialize<'de> for Tid<'a>
where
    'de: 'a,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Deserialize::deserialize(deserializer)?;
        Self::new(value).map_err(D::Error::custom)
    }
}

impl fmt::Display for Tid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'t> From<Tid<'t>> for String {
    fn from(value: Tid<'t>) -> Self {
        value.0.to_string()
    }
}

impl<'t> From<Tid<'t>> for CowStr<'t> {
    fn from(value: Tid<'t>) -> Self {
        value.0
    }
}

impl TryFrom<String> for Tid<'static> {
    type Error = AtStrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new_owned(&value)
    }
}

impl AsRef<str> for Tid<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Tid<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar() {
        assert!(Tid::new("3jwdwj2ctlk26").is_ok());
        assert!(Tid::new("3jwdwj2ctlk2").is_err()); // 12 chars
        assert!(Tid::new("3jwdwj2ctlk260").is_err()); // 14 chars
        assert!(Tid::new("zjwdwj2ctlk26").is_err()); // high bit set
        assert!(Tid::new("3jwdwj2ctlk2!").is_err());
    }

    #[test]
    fn now_is_valid() {
        let tid = Tid::now_random();
        assert_eq!(tid.as_str().len(), 13);
        assert!(Tid::new(tid.as_str()).is_ok());
    }

    #[test]
    fn parts_roundtrip() {
        for (t, c) in [
            (0u64, 0u16),
            (1_000_000, 1),
            (1_700_000_000_000_000, 1023),
            ((1 << 53) - 1, 512),
        ] {
            let tid = Tid::from_parts(t, c);
            assert_eq!(tid.timestamp_us(), t);
            assert_eq!(tid.clock_id(), c);
        }
    }

    #[test]
    fn ordering_follows_time() {
        let older = Tid::from_parts(1_700_000_000_000_000, 0);
        let newer = Tid::from_parts(1_700_000_000_000_001, 0);
        assert!(older < newer);
        assert!(older.as_str() < newer.as_str());
    }

    #[test]
    fn clock_id_orders_within_same_microsecond() {
        let a = Tid::from_parts(1_700_000_000_000_000, 1);
        let b = Tid::from_parts(1_700_000_000_000_000, 2);
        assert!(a < b);
        assert_eq!(a.timestamp_us(), b.timestamp_us());
    }
}
