//! Charging connector types and the alias table used to normalise station
//! directory labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Physical plug standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectorType {
    Ccs2,
    Ccs1,
    Type2,
    Type1,
    Chademo,
    Tesla,
}

/// Electrical current delivered by a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrentType {
    Ac,
    Dc,
}

impl ConnectorType {
    pub const ALL: [ConnectorType; 6] = [
        ConnectorType::Ccs2,
        ConnectorType::Ccs1,
        ConnectorType::Type2,
        ConnectorType::Type1,
        ConnectorType::Chademo,
        ConnectorType::Tesla,
    ];

    /// Canonical display label.
    pub fn label(self) -> &'static str {
        match self {
            ConnectorType::Ccs2 => "CCS2",
            ConnectorType::Ccs1 => "CCS1",
            ConnectorType::Type2 => "Type 2",
            ConnectorType::Type1 => "Type 1",
            ConnectorType::Chademo => "CHAdeMO",
            ConnectorType::Tesla => "Tesla",
        }
    }

    /// Current the plug normally carries when the directory does not say.
    pub fn default_current(self) -> CurrentType {
        match self {
            ConnectorType::Type2 | ConnectorType::Type1 => CurrentType::Ac,
            _ => CurrentType::Dc,
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            ConnectorType::Ccs2 => &["ccs2", "ccs", "ccstype2", "combo2", "ccscombo2", "combotype2"],
            ConnectorType::Ccs1 => &["ccs1", "ccstype1", "combo1", "ccscombo1", "combotype1"],
            ConnectorType::Type2 => &["type2", "mennekes", "iec62196", "iec621962", "type2socket"],
            ConnectorType::Type1 => &["type1", "j1772", "saej1772"],
            ConnectorType::Chademo => &["chademo"],
            ConnectorType::Tesla => &["tesla", "teslasupercharger", "supercharger", "nacs"],
        }
    }
}

fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Returned when a connector label matches no known alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConnector(pub String);

impl fmt::Display for UnknownConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown connector type '{}'", self.0)
    }
}

impl std::error::Error for UnknownConnector {}

impl FromStr for ConnectorType {
    type Err = UnknownConnector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_label(s);
        // "CCS (Type 2)" normalises to "ccstype2".
        for connector in ConnectorType::ALL {
            if connector.aliases().iter().any(|alias| *alias == key) {
                return Ok(connector);
            }
        }
        Err(UnknownConnector(s.to_string()))
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_labels_map_to_connectors() {
        let cases = [
            ("CCS (Type 2)", ConnectorType::Ccs2),
            ("Combo 2", ConnectorType::Ccs2),
            ("Mennekes", ConnectorType::Type2),
            ("IEC 62196", ConnectorType::Type2),
            ("SAE J1772", ConnectorType::Type1),
            ("Tesla Supercharger", ConnectorType::Tesla),
            ("CHAdeMO", ConnectorType::Chademo),
        ];
        for (label, expected) in cases {
            assert_eq!(label.parse::<ConnectorType>().unwrap(), expected, "{label}");
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!("Schuko".parse::<ConnectorType>().is_err());
    }
}
