use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of route endpoints the service operates between.
///
/// Offers and trips only ever reference these stops; free-form place names
/// are rejected at the edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Shimla,
    Manali,
    Kullu,
    Mandi,
    Dharamshala,
    Palampur,
    Chamba,
    Solan,
    Bilaspur,
    Hamirpur,
    Rampur,
    Kaza,
    Keylong,
    ReckongPeo,
}

impl Location {
    pub const ALL: [Location; 14] = [
        Location::Shimla,
        Location::Manali,
        Location::Kullu,
        Location::Mandi,
        Location::Dharamshala,
        Location::Palampur,
        Location::Chamba,
        Location::Solan,
        Location::Bilaspur,
        Location::Hamirpur,
        Location::Rampur,
        Location::Kaza,
        Location::Keylong,
        Location::ReckongPeo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Shimla => "SHIMLA",
            Location::Manali => "MANALI",
            Location::Kullu => "KULLU",
            Location::Mandi => "MANDI",
            Location::Dharamshala => "DHARAMSHALA",
            Location::Palampur => "PALAMPUR",
            Location::Chamba => "CHAMBA",
            Location::Solan => "SOLAN",
            Location::Bilaspur => "BILASPUR",
            Location::Hamirpur => "HAMIRPUR",
            Location::Rampur => "RAMPUR",
            Location::Kaza => "KAZA",
            Location::Keylong => "KEYLONG",
            Location::ReckongPeo => "RECKONG_PEO",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::ALL
            .iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownLocation(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLocation(pub String);

impl fmt::Display for UnknownLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown location: {}", self.0)
    }
}

impl std::error::Error for UnknownLocation {}
