//! Instrument settings that are either automatic or a fixed integer

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// `auto` or a fixed integer value (RBW in kHz, attenuation in dB, AGC level)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutoValue {
    /// Let the instrument choose
    #[default]
    Auto,
    /// Fixed value
    Fixed(u32),
}

impl AutoValue {
    /// Returns whether the instrument chooses the value
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl fmt::Display for AutoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for AutoValue {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<u32>()
            .map(Self::Fixed)
            .map_err(|_| ParseError::InvalidSetting(s.to_string()))
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use serde::de::{self, Deserializer, Visitor};
    use serde::{Deserialize, Serialize, Serializer};

    use super::AutoValue;

    // Settings files carry either the string "auto" or a bare number
    impl Serialize for AutoValue {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                AutoValue::Auto => serializer.serialize_str("auto"),
                AutoValue::Fixed(value) => serializer.serialize_u32(*value),
            }
        }
    }

    impl<'de> Deserialize<'de> for AutoValue {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct AutoValueVisitor;

            impl Visitor<'_> for AutoValueVisitor {
                type Value = AutoValue;

                fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    f.write_str("\"auto\" or a non-negative integer")
                }

                fn visit_u64<E: de::Error>(self, v: u64) -> Result<AutoValue, E> {
                    u32::try_from(v)
                        .map(AutoValue::Fixed)
                        .map_err(|_| E::custom(format!("setting out of range: {}", v)))
                }

                fn visit_i64<E: de::Error>(self, v: i64) -> Result<AutoValue, E> {
                    u32::try_from(v)
                        .map(AutoValue::Fixed)
                        .map_err(|_| E::custom(format!("setting out of range: {}", v)))
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<AutoValue, E> {
                    v.parse().map_err(E::custom)
                }
            }

            deserializer.deserialize_any(AutoValueVisitor)
        }
    }
}
