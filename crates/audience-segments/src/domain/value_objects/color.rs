//! Tag color value object

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// `#rrggbb` display color, stored lower-case
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagColor(String);

impl TagColor {
    pub fn new(value: impl AsRef<str>) -> Result<Self, ColorError> {
        let value = value.as_ref().trim().to_ascii_lowercase();
        let hex = value.strip_prefix('#').ok_or(ColorError::MissingHash)?;

        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(value));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TagColor {
    fn default() -> Self {
        Self("#6b7280".into())
    }
}

impl fmt::Display for TagColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TagColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TagColor> for String {
    fn from(color: TagColor) -> Self {
        color.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("color must start with '#'")]
    MissingHash,
    #[error("invalid hex color: {0}")]
    InvalidHex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_color_normalized() {
        assert_eq!(TagColor::new(" #FF00aa ").unwrap().as_str(), "#ff00aa");
    }

    #[test]
    fn test_invalid_colors() {
        assert_eq!(TagColor::new("ff00aa"), Err(ColorError::MissingHash));
        assert!(matches!(TagColor::new("#ff00a"), Err(ColorError::InvalidHex(_))));
        assert!(matches!(TagColor::new("#gg0000"), Err(ColorError::InvalidHex(_))));
    }
}
