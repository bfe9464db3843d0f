use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geographic service bucket a property falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceZone {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ServiceZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceZone::A => "A",
            ServiceZone::B => "B",
            ServiceZone::C => "C",
            ServiceZone::D => "D",
            ServiceZone::E => "E",
            ServiceZone::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ServiceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(ServiceZone::A),
            "B" => Ok(ServiceZone::B),
            "C" => Ok(ServiceZone::C),
            "D" => Ok(ServiceZone::D),
            "E" => Ok(ServiceZone::E),
            "UNKNOWN" => Ok(ServiceZone::Unknown),
            other => Err(format!("unknown service zone '{}'", other)),
        }
    }
}

impl TryFrom<String> for ServiceZone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single postal-code membership rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostalRule {
    Exact(String),
    Range { from: u32, to: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub zone: ServiceZone,
    pub name: String,
    pub rules: Vec<PostalRule>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TravelEdge {
    pub from: ServiceZone,
    pub to: ServiceZone,
    pub minutes: u32,
}

/// On-disk shape of the zone configuration (`ZONES_FILE`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub zones: Vec<ZoneDefinition>,
    pub travel: Vec<TravelEdge>,
    pub fallback_minutes: u32,
}
