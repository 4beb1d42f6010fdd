//! Room settings as requested by a host and as canonically stored.
//!
//! A client sends a [`SettingsRequest`] where every field is optional.
//! The room layer merges it over the defaults exactly once, producing a
//! [`RoomSettings`] that is the only settings value the engine ever reads.

use std::collections::BTreeSet;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::Difficulty;

// ---------------------------------------------------------------------------
// GenreFilter
// ---------------------------------------------------------------------------

/// Which genre tags a room draws from.
///
/// On the wire this is either the string `"all"` or a list of tags. A
/// single tag string (the legacy `category` form) means a one-tag set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenreFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl GenreFilter {
    /// Whether a question with this genre tag is eligible. Untagged
    /// questions are always eligible.
    pub fn matches(&self, genre: Option<&str>) -> bool {
        match (self, genre) {
            (Self::All, _) | (_, None) => true,
            (Self::Only(tags), Some(tag)) => tags.contains(tag),
        }
    }
}

impl Serialize for GenreFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Only(tags) => tags.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for GenreFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Word(String),
            List(BTreeSet<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Word(word) if word == "all" => Self::All,
            Raw::Word(word) => Self::Only(BTreeSet::from([word])),
            Raw::List(tags) => Self::Only(tags),
        })
    }
}

// ---------------------------------------------------------------------------
// RoundCap
// ---------------------------------------------------------------------------

/// How many rounds a match may last.
///
/// On the wire: a positive integer, or the string `"infinite"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundCap {
    Finite(u32),
    Infinite,
}

impl RoundCap {
    /// Whether `round` has reached the cap.
    pub fn reached(&self, round: u32) -> bool {
        match self {
            Self::Finite(cap) => round >= *cap,
            Self::Infinite => false,
        }
    }
}

impl Serialize for RoundCap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Finite(n) => serializer.serialize_u32(*n),
            Self::Infinite => serializer.serialize_str("infinite"),
        }
    }
}

impl<'de> Deserialize<'de> for RoundCap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u32),
            Word(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(n) => Ok(Self::Finite(n)),
            Raw::Word(word) if word.eq_ignore_ascii_case("infinite") => Ok(Self::Infinite),
            Raw::Word(word) => Err(de::Error::custom(format!(
                "round cap must be a number or \"infinite\", got {word:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Canonical, validated settings of one room. Fixed for the room's life.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub genres: GenreFilter,
    pub difficulties: BTreeSet<Difficulty>,
    pub round_cap: RoundCap,
    pub time_limit_secs: u32,
    /// Seat count; always 2 or 3.
    pub max_players: usize,
}

/// Settings as sent by the room creator. Anything missing falls back to
/// the defaults; anything out of range is coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsRequest {
    pub genres: Option<GenreFilter>,
    pub difficulties: Option<BTreeSet<Difficulty>>,
    pub round_cap: Option<RoundCap>,
    pub time_limit_secs: Option<u32>,
    pub max_players: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_filter_all_round_trips_as_string() {
        let json = serde_json::to_string(&GenreFilter::All).unwrap();
        assert_eq!(json, "\"all\"");
        let back: GenreFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, GenreFilter::All);
    }

    #[test]
    fn test_genre_filter_accepts_list_and_single_tag() {
        let list: GenreFilter = serde_json::from_str(r#"["history","anime"]"#).unwrap();
        assert!(list.matches(Some("anime")));
        assert!(!list.matches(Some("science")));

        let single: GenreFilter = serde_json::from_str("\"geography\"").unwrap();
        assert_eq!(single, GenreFilter::Only(BTreeSet::from(["geography".to_string()])));
    }

    #[test]
    fn test_genre_filter_untagged_question_always_matches() {
        let filter = GenreFilter::Only(BTreeSet::from(["history".to_string()]));
        assert!(filter.matches(None));
    }

    #[test]
    fn test_round_cap_wire_forms() {
        assert_eq!(serde_json::to_string(&RoundCap::Finite(10)).unwrap(), "10");
        assert_eq!(serde_json::to_string(&RoundCap::Infinite).unwrap(), "\"infinite\"");
        assert_eq!(serde_json::from_str::<RoundCap>("5").unwrap(), RoundCap::Finite(5));
        assert_eq!(
            serde_json::from_str::<RoundCap>("\"infinite\"").unwrap(),
            RoundCap::Infinite
        );
        assert!(serde_json::from_str::<RoundCap>("\"forever\"").is_err());
    }

    #[test]
    fn test_round_cap_reached() {
        assert!(!RoundCap::Finite(3).reached(2));
        assert!(RoundCap::Finite(3).reached(3));
        assert!(!RoundCap::Infinite.reached(u32::MAX));
    }

    #[test]
    fn test_settings_request_all_fields_optional() {
        let req: SettingsRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, SettingsRequest::default());

        let req: SettingsRequest =
            serde_json::from_str(r#"{"max_players":3,"round_cap":"infinite"}"#).unwrap();
        assert_eq!(req.max_players, Some(3));
        assert_eq!(req.round_cap, Some(RoundCap::Infinite));
    }
}
