use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GeoError, GeoResult};

/// Approximate geography of a client address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Continent name, empty if unknown.
    pub continent: String,
    /// Country name, empty if unknown.
    pub country: String,
    /// City name, empty if unknown.
    pub city: String,
}

impl GeoLocation {
    /// Create a location from its parts
    pub fn new(
        continent: impl Into<String>,
        country: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            continent: continent.into(),
            country: country.into(),
            city: city.into(),
        }
    }

    /// Parse a provider response body.
    ///
    /// The body must be a JSON object containing `continent`, `country` and
    /// `city`. Each may be a string or `null` (providers omit the city for
    /// many addresses); `null` becomes an empty string. Any other shape is an
    /// [`GeoError::InvalidResponse`].
    pub fn from_value(value: &Value) -> GeoResult<Self> {
        let object = value.as_object().ok_or_else(|| GeoError::InvalidResponse {
            message: "expected a JSON object".to_string(),
        })?;

        Ok(Self {
            continent: required_field(object, "continent")?,
            country: required_field(object, "country")?,
            city: required_field(object, "city")?,
        })
    }

    /// True when no field carries data
    pub fn is_empty(&self) -> bool {
        self.continent.is_empty() && self.country.is_empty() && self.city.is_empty()
    }
}

fn required_field(object: &Map<String, Value>, name: &str) -> GeoResult<String> {
    match object.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(other) => Err(GeoError::InvalidResponse {
            message: format!("field '{}' is not a string: {}", name, other),
        }),
        None => Err(GeoError::InvalidResponse {
            message: format!("missing field '{}'", name),
        }),
    }
}
