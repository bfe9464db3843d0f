use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::domain::models::zone::{PostalRule, ServiceZone, TravelEdge, ZoneConfig, ZoneDefinition};
use crate::error::AppError;

static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{5})(?:-[0-9]{4})?(?:[^0-9]|$)").expect("postal code pattern is valid")
});

/// Pulls a 5-digit postal code (optionally `+4`) out of a free-text address.
/// The last candidate wins since street numbers come first.
pub fn extract_postal_code(address: &str) -> Option<String> {
    let mut found = None;
    let mut offset = 0;
    while offset < address.len() {
        let Some(caps) = POSTAL_CODE.captures_at(address, offset) else { break };
        let Some(code) = caps.get(1) else { break };
        found = Some(code.as_str().to_string());
        // Resume right after the digits so the delimiter can prefix the next code.
        offset = code.end();
    }
    found
}

/// Complete `(from, to) -> minutes` function with a conservative fallback.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    minutes: HashMap<(ServiceZone, ServiceZone), u32>,
    fallback_minutes: u32,
}

impl TravelMatrix {
    pub fn new(edges: &[TravelEdge], fallback_minutes: u32) -> Self {
        let minutes = edges.iter().map(|e| ((e.from, e.to), e.minutes)).collect();
        Self { minutes, fallback_minutes }
    }

    pub fn travel_time(&self, from: ServiceZone, to: ServiceZone) -> u32 {
        if from == ServiceZone::Unknown || to == ServiceZone::Unknown {
            return self.fallback_minutes;
        }
        self.minutes.get(&(from, to)).copied().unwrap_or(self.fallback_minutes)
    }
}

pub struct ZoneClassifier {
    zones: Vec<ZoneDefinition>,
    matrix: TravelMatrix,
}

impl ZoneClassifier {
    pub fn new(config: ZoneConfig) -> Self {
        let matrix = TravelMatrix::new(&config.travel, config.fallback_minutes);
        Self { zones: config.zones, matrix }
    }

    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::InternalWithMsg(format!("Cannot read zones file {}: {}", path, e)))?;
        let config: ZoneConfig = serde_json::from_str(&raw)
            .map_err(|e| AppError::InternalWithMsg(format!("Invalid zones file {}: {}", path, e)))?;
        Ok(Self::new(config))
    }

    pub fn classify(&self, code: Option<&str>) -> ServiceZone {
        let Some(code) = code.map(str::trim) else { return ServiceZone::Unknown };
        let Ok(numeric) = code.parse::<u32>() else { return ServiceZone::Unknown };
        if code.len() != 5 {
            return ServiceZone::Unknown;
        }

        self.zones.iter()
            .find(|def| def.rules.iter().any(|rule| match rule {
                PostalRule::Exact(exact) => exact == code,
                PostalRule::Range { from, to } => (*from..=*to).contains(&numeric),
            }))
            .map(|def| def.zone)
            .unwrap_or(ServiceZone::Unknown)
    }

    pub fn classify_address(&self, address: &str) -> (Option<String>, ServiceZone) {
        let code = extract_postal_code(address);
        let zone = self.classify(code.as_deref());
        (code, zone)
    }

    pub fn travel_time(&self, from: ServiceZone, to: ServiceZone) -> u32 {
        self.matrix.travel_time(from, to)
    }

    pub fn matrix(&self) -> &TravelMatrix {
        &self.matrix
    }

    pub fn display_name(&self, zone: ServiceZone) -> String {
        self.zones.iter()
            .find(|def| def.zone == zone)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| "Outside service area".to_string())
    }
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self::new(default_zone_config())
    }
}

pub fn default_zone_config() -> ZoneConfig {
    use ServiceZone::*;

    let zones = vec![
        ZoneDefinition { zone: A, name: "Downtown".into(), rules: vec![PostalRule::Range { from: 94102, to: 94112 }] },
        ZoneDefinition { zone: B, name: "North Side".into(), rules: vec![PostalRule::Range { from: 94113, to: 94129 }] },
        ZoneDefinition { zone: C, name: "South Side".into(), rules: vec![PostalRule::Range { from: 94130, to: 94139 }, PostalRule::Exact("94158".into())] },
        ZoneDefinition { zone: D, name: "East Bay".into(), rules: vec![PostalRule::Range { from: 94500, to: 94699 }] },
        ZoneDefinition { zone: E, name: "Peninsula".into(), rules: vec![PostalRule::Range { from: 94000, to: 94099 }, PostalRule::Range { from: 94400, to: 94499 }] },
    ];

    // (from, to, minutes), mirrored below.
    let pairs = [
        (A, A, 15), (B, B, 15), (C, C, 15), (D, D, 20), (E, E, 20),
        (A, B, 25), (A, C, 25), (A, D, 40), (A, E, 40),
        (B, C, 35), (B, D, 45), (B, E, 50),
        (C, D, 45), (C, E, 35),
        (D, E, 60),
    ];

    let mut travel = Vec::new();
    for (from, to, minutes) in pairs {
        travel.push(TravelEdge { from, to, minutes });
        if from != to {
            travel.push(TravelEdge { from: to, to: from, minutes });
        }
    }

    ZoneConfig { zones, travel, fallback_minutes: 75 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_postal_code_variants() {
        assert_eq!(extract_postal_code("12 Elm St, Springfield, CA 94110").as_deref(), Some("94110"));
        assert_eq!(extract_postal_code("12 Elm St, CA 94110-1234").as_deref(), Some("94110"));
        assert_eq!(extract_postal_code("12345 Long Rd, Town 94501").as_deref(), Some("94501"));
        assert_eq!(extract_postal_code("94103").as_deref(), Some("94103"));
        assert_eq!(extract_postal_code("Unit 7, Phone 5551234567"), None);
        assert_eq!(extract_postal_code("no code here"), None);
        assert_eq!(extract_postal_code(""), None);
    }

    #[test]
    fn test_classify_falls_back_to_unknown() {
        let classifier = ZoneClassifier::default();
        assert_eq!(classifier.classify(Some("94105")), ServiceZone::A);
        assert_eq!(classifier.classify(Some("94120")), ServiceZone::B);
        assert_eq!(classifier.classify(Some("94158")), ServiceZone::C);
        assert_eq!(classifier.classify(Some("10001")), ServiceZone::Unknown);
        assert_eq!(classifier.classify(Some("9410")), ServiceZone::Unknown);
        assert_eq!(classifier.classify(Some("abcde")), ServiceZone::Unknown);
        assert_eq!(classifier.classify(None), ServiceZone::Unknown);
    }

    #[test]
    fn test_first_matching_zone_wins() {
        let config = ZoneConfig {
            zones: vec![
                ZoneDefinition { zone: ServiceZone::B, name: "B".into(), rules: vec![PostalRule::Range { from: 10000, to: 10010 }] },
                ZoneDefinition { zone: ServiceZone::A, name: "A".into(), rules: vec![PostalRule::Exact("10005".into())] },
            ],
            travel: vec![],
            fallback_minutes: 60,
        };
        let classifier = ZoneClassifier::new(config);
        assert_eq!(classifier.classify(Some("10005")), ServiceZone::B);
    }

    #[test]
    fn test_travel_time_is_total() {
        let classifier = ZoneClassifier::default();
        assert_eq!(classifier.travel_time(ServiceZone::A, ServiceZone::B), 25);
        assert_eq!(classifier.travel_time(ServiceZone::B, ServiceZone::A), 25);
        assert_eq!(classifier.travel_time(ServiceZone::A, ServiceZone::Unknown), 75);
        assert_eq!(classifier.travel_time(ServiceZone::Unknown, ServiceZone::Unknown), 75);

        let sparse = TravelMatrix::new(&[TravelEdge { from: ServiceZone::A, to: ServiceZone::B, minutes: 10 }], 90);
        assert_eq!(sparse.travel_time(ServiceZone::A, ServiceZone::B), 10);
        assert_eq!(sparse.travel_time(ServiceZone::B, ServiceZone::A), 90);
    }
}
