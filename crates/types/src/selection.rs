//! What a query asks for: the device selector and the requested fields

use crate::field::Field;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single requested token: a field or one of the meta requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Report the number of devices
    Count,
    /// Every registered field
    All,
    Field(Field),
}

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches("--").to_ascii_lowercase().as_str() {
            "count" => Ok(Flag::Count),
            "all" => Ok(Flag::All),
            _ => s.parse().map(Flag::Field),
        }
    }
}

/// The set of flags a query was made with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    count: bool,
    all: bool,
    fields: BTreeSet<Field>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection requesting every field
    pub fn all_fields() -> Self {
        Self::new().with(Flag::All)
    }

    /// Build a selection from textual tokens, ignoring unrecognized ones
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter_map(|token| match token.as_ref().parse::<Flag>() {
                Ok(flag) => Some(flag),
                Err(e) => {
                    log::debug!("Ignoring token: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn with(mut self, flag: Flag) -> Self {
        self.insert(flag);
        self
    }

    pub fn insert(&mut self, flag: Flag) {
        match flag {
            Flag::Count => self.count = true,
            Flag::All => self.all = true,
            Flag::Field(field) => {
                self.fields.insert(field);
            }
        }
    }

    pub fn wants_count(&self) -> bool {
        self.count
    }

    pub fn wants_all(&self) -> bool {
        self.all
    }

    /// True if anything beyond the device count was requested
    pub fn wants_devices(&self) -> bool {
        self.all || !self.fields.is_empty()
    }

    /// Explicitly requested fields (does not expand `all`)
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.iter().copied()
    }

    pub fn includes(&self, field: Field) -> bool {
        self.all || self.fields.contains(&field)
    }
}

impl FromIterator<Flag> for Selection {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut selection = Selection::new();
        for flag in iter {
            selection.insert(flag);
        }
        selection
    }
}

/// Which devices a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    #[default]
    All,
    Index(u32),
}

impl TryFrom<i64> for DeviceSelector {
    type Error = String;

    /// Negative values are the "all devices" sentinel
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Ok(DeviceSelector::All);
        }
        u32::try_from(value)
            .map(DeviceSelector::Index)
            .map_err(|_| format!("Invalid GPU index: {}", value))
    }
}

impl FromStr for DeviceSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(DeviceSelector::All);
        }
        s.parse::<i64>()
            .map_err(|e| format!("Invalid GPU index '{}': {}", s, e))
            .and_then(DeviceSelector::try_from)
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::All => f.write_str("all"),
            DeviceSelector::Index(index) => write!(f, "{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tokens_ignores_unknown() {
        let selection = Selection::from_tokens(["--count", "temp", "bogus", "clocks"]);
        assert!(selection.wants_count());
        assert!(!selection.wants_all());
        assert_eq!(
            selection.fields().collect::<Vec<_>>(),
            vec![Field::Temperature, Field::Clocks]
        );
    }

    #[test]
    fn test_count_only_wants_no_devices() {
        let selection = Selection::new().with(Flag::Count);
        assert!(!selection.wants_devices());
        assert!(Selection::all_fields().wants_devices());
        assert!(!Selection::from_tokens(["nonsense"]).wants_devices());
    }

    #[test]
    fn test_includes_expands_all() {
        let selection = Selection::all_fields();
        assert!(Field::ALL.iter().all(|f| selection.includes(*f)));
        assert_eq!(selection.fields().count(), 0);
    }

    #[test]
    fn test_device_selector_parsing() {
        assert_eq!("all".parse::<DeviceSelector>().unwrap(), DeviceSelector::All);
        assert_eq!("-1".parse::<DeviceSelector>().unwrap(), DeviceSelector::All);
        assert_eq!("2".parse::<DeviceSelector>().unwrap(), DeviceSelector::Index(2));
        assert!("two".parse::<DeviceSelector>().is_err());
        assert_eq!(DeviceSelector::try_from(-5), Ok(DeviceSelector::All));
    }

    #[test]
    fn test_index_beyond_u32_keeps_user_value() {
        assert_eq!(
            DeviceSelector::try_from(4_294_967_296),
            Err("Invalid GPU index: 4294967296".to_string())
        );
        assert_eq!(
            "4294967296".parse::<DeviceSelector>().unwrap_err(),
            "Invalid GPU index: 4294967296"
        );
        assert_eq!(
            "4294967295".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::Index(u32::MAX)
        );
    }
}
