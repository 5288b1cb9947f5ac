//! Dump flags selecting which parts of a transaction get logged

use crate::error::FlagsParseError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

/// Set of independent dump options.
///
/// Any non-empty set turns logging on and always includes the headers. The
/// body bits decide whether message bodies are buffered and dumped too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DumpFlags(u8);

impl DumpFlags {
    /// Dump just the HTTP headers
    pub const HEADERS: DumpFlags = DumpFlags(1 << 0);
    /// Dump the request and response bodies as well
    pub const BODIES: DumpFlags = DumpFlags(1 << 1);
    /// Dump headers and request bodies but not response bodies
    pub const REQUESTS: DumpFlags = DumpFlags(1 << 2);
    /// Dump headers and response bodies but not request bodies
    pub const RESPONSES: DumpFlags = DumpFlags(1 << 3);
    /// Log authorization headers instead of redacting them
    pub const AUTH: DumpFlags = DumpFlags(1 << 4);

    const NAMES: [(&'static str, DumpFlags); 5] = [
        ("headers", Self::HEADERS),
        ("bodies", Self::BODIES),
        ("requests", Self::REQUESTS),
        ("responses", Self::RESPONSES),
        ("auth", Self::AUTH),
    ];

    /// The empty set: nothing is logged
    pub const fn empty() -> Self {
        DumpFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(self, other: DumpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set in `self`
    pub const fn intersects(self, other: DumpFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the round trip is logged at all
    pub const fn logging_enabled(self) -> bool {
        !self.is_empty()
    }

    /// Whether the request dump includes the body
    pub const fn dump_request_body(self) -> bool {
        self.intersects(DumpFlags(Self::BODIES.0 | Self::REQUESTS.0))
    }

    /// Whether the response dump includes the body
    pub const fn dump_response_body(self) -> bool {
        self.intersects(DumpFlags(Self::BODIES.0 | Self::RESPONSES.0))
    }

    /// Whether auth headers are left unredacted
    pub const fn reveal_auth(self) -> bool {
        self.contains(Self::AUTH)
    }
}

impl BitOr for DumpFlags {
    type Output = DumpFlags;

    fn bitor(self, rhs: DumpFlags) -> DumpFlags {
        DumpFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for DumpFlags {
    fn bitor_assign(&mut self, rhs: DumpFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DumpFlags {
    type Output = DumpFlags;

    fn bitand(self, rhs: DumpFlags) -> DumpFlags {
        DumpFlags(self.0 & rhs.0)
    }
}

/// Parses a comma separated list such as `headers,auth`.
///
/// Names are case-insensitive and blank entries are skipped, so an empty
/// string parses to the empty set.
impl FromStr for DumpFlags {
    type Err = FlagsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = DumpFlags::empty();
        for name in s.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            let flag = Self::NAMES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(name))
                .map(|(_, flag)| *flag)
                .ok_or_else(|| FlagsParseError {
                    name: name.to_string(),
                })?;
            flags |= flag;
        }
        Ok(flags)
    }
}

impl fmt::Display for DumpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, flag) in Self::NAMES.iter() {
            if self.contains(*flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl Serialize for DumpFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DumpFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_selection() {
        assert!(!DumpFlags::HEADERS.dump_request_body());
        assert!(!DumpFlags::HEADERS.dump_response_body());

        assert!(DumpFlags::BODIES.dump_request_body());
        assert!(DumpFlags::BODIES.dump_response_body());

        assert!(DumpFlags::REQUESTS.dump_request_body());
        assert!(!DumpFlags::REQUESTS.dump_response_body());

        assert!(!DumpFlags::RESPONSES.dump_request_body());
        assert!(DumpFlags::RESPONSES.dump_response_body());
    }

    #[test]
    fn test_any_flag_enables_logging() {
        assert!(!DumpFlags::empty().logging_enabled());
        for (_, flag) in DumpFlags::NAMES.iter() {
            assert!(flag.logging_enabled());
        }
        // Auth alone still dumps headers
        assert!(DumpFlags::AUTH.logging_enabled());
        assert!(DumpFlags::AUTH.reveal_auth());
        assert!(!DumpFlags::HEADERS.reveal_auth());
    }

    #[test]
    fn test_set_operations() {
        let flags = DumpFlags::BODIES | DumpFlags::AUTH;
        assert_eq!(flags.bits(), 0b1_0010);
        assert_eq!(flags & DumpFlags::AUTH, DumpFlags::AUTH);
        assert!((flags & DumpFlags::HEADERS).is_empty());

        let mut all = DumpFlags::empty();
        for (_, flag) in DumpFlags::NAMES.iter() {
            all |= *flag;
        }
        assert_eq!(all.bits(), 0b1_1111);
        assert!(all.contains(flags));
        assert!(!flags.contains(all));
    }

    #[test]
    fn test_parse_and_display() {
        let flags: DumpFlags = "Headers, auth".parse().unwrap();
        assert_eq!(flags, DumpFlags::HEADERS | DumpFlags::AUTH);
        assert_eq!(flags.to_string(), "headers,auth");

        assert_eq!("".parse::<DumpFlags>().unwrap(), DumpFlags::empty());
        assert_eq!(DumpFlags::empty().to_string(), "");

        let err = "headers,potato".parse::<DumpFlags>().unwrap_err();
        assert_eq!(err.name, "potato");
    }

    #[test]
    fn test_serde_as_string() {
        let flags = DumpFlags::REQUESTS | DumpFlags::AUTH;
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, "\"requests,auth\"");

        let back: DumpFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);

        assert!(serde_json::from_str::<DumpFlags>("\"everything\"").is_err());
    }
}
