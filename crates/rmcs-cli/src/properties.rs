//! Car properties – the feature keywords this vehicle announces.
//!
//! | Keyword | Meaning |
//! |---|---|
//! | `camera` | camera gimbal fitted |
//! | `lights` | head/back/dynamic lights fitted |
//! | `winkers` | turn signals fitted |
//! | `uSSen` | front distance sensor |
//! | `lISen` | left distance sensor |
//! | `rISen` | right distance sensor |
//! | `hSen` | wheel speed sensor |

use std::fmt;

use rmcs_types::{RmcsError, SensorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Camera,
    Lights,
    Winkers,
    Sensor(SensorKind),
}

impl Property {
    pub fn keyword(self) -> &'static str {
        match self {
            Property::Camera => "camera",
            Property::Lights => "lights",
            Property::Winkers => "winkers",
            Property::Sensor(kind) => kind.keyword(),
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "camera" => Some(Property::Camera),
            "lights" => Some(Property::Lights),
            "winkers" => Some(Property::Winkers),
            other => SensorKind::from_keyword(other).map(Property::Sensor),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Insertion-ordered set of properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    items: Vec<Property>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configured keywords. Unknown keywords are a configuration
    /// error.
    pub fn parse<S: AsRef<str>>(keywords: &[S]) -> Result<Self, RmcsError> {
        let mut set = Self::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim();
            let property = Property::from_keyword(keyword)
                .ok_or_else(|| RmcsError::Config(format!("unknown car property '{keyword}'")))?;
            set.insert(property);
        }
        Ok(set)
    }

    /// Returns `false` when `property` was already present.
    pub fn insert(&mut self, property: Property) -> bool {
        if self.items.contains(&property) {
            return false;
        }
        self.items.push(property);
        true
    }

    pub fn keywords(&self) -> Vec<String> {
        self.items.iter().map(|p| p.keyword().to_string()).collect()
    }

    /// Sensor kinds in announcement order.
    pub fn sensors(&self) -> Vec<SensorKind> {
        self.items
            .iter()
            .filter_map(|p| match p {
                Property::Sensor(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Any sensor property means the sensor board has to run.
    pub fn has_sensors(&self) -> bool {
        self.items.iter().any(|p| matches!(p, Property::Sensor(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keywords: Vec<&str> = self.items.iter().map(|p| p.keyword()).collect();
        f.write_str(&keywords.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_position() {
        let mut set = PropertySet::new();
        assert!(set.insert(Property::Lights));
        assert!(set.insert(Property::Sensor(SensorKind::WheelSpeed)));
        assert!(!set.insert(Property::Lights));
        assert!(set.insert(Property::Camera));
        assert_eq!(set.keywords(), vec!["lights", "hSen", "camera"]);
        assert_eq!(set.to_string(), "lights hSen camera");
    }

    #[test]
    fn parse_accepts_sensor_keywords() {
        let set = PropertySet::parse(&["uSSen", "camera", " rISen ", "uSSen"]).unwrap();
        assert_eq!(set.keywords().len(), 3);
        assert_eq!(set.sensors(), vec![SensorKind::FrontDistance, SensorKind::RightDistance]);
        assert!(set.has_sensors());
    }

    #[test]
    fn parse_rejects_unknown_keyword() {
        let err = PropertySet::parse(&["camera", "jetpack"]).unwrap_err();
        assert_eq!(err, RmcsError::Config("unknown car property 'jetpack'".to_string()));
    }

    #[test]
    fn no_sensor_properties_means_no_board() {
        let set = PropertySet::parse(&["camera", "lights", "winkers"]).unwrap();
        assert!(!set.has_sensors());
        assert!(set.sensors().is_empty());
    }

    #[test]
    fn keywords_round_trip() {
        for kind in SensorKind::ALL {
            let p = Property::Sensor(kind);
            assert_eq!(Property::from_keyword(p.keyword()), Some(p));
        }
        assert_eq!(Property::from_keyword("winkers"), Some(Property::Winkers));
        assert_eq!(Property::from_keyword("Camera"), None);
    }
}
