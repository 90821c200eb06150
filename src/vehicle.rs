//! Vehicle identity and attribute names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The four attributes the engine resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    /// Curb weight (continuous, pounds).
    CurbWeight,
    /// Whether the engine block is aluminum.
    AluminumEngine,
    /// Whether the wheels are aluminum alloy.
    AluminumRims,
    /// Number of catalytic converters.
    CatalyticConverters,
}

impl FieldName {
    /// All fields in report order.
    pub const ALL: [Self; 4] = [
        Self::CurbWeight,
        Self::AluminumEngine,
        Self::AluminumRims,
        Self::CatalyticConverters,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CurbWeight => "curb_weight",
            Self::AluminumEngine => "aluminum_engine",
            Self::AluminumRims => "aluminum_rims",
            Self::CatalyticConverters => "catalytic_converters",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownField {
                name: s.to_string(),
            })
    }
}

/// Identity of a vehicle: model year, make and model.
///
/// # Examples
///
/// ```
/// use vehicle_resolver::VehicleKey;
///
/// let key = VehicleKey::new(2019, " Toyota ", "Camry  LE").unwrap();
/// assert_eq!(key.key(), "2019|toyota|camry le");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "VehicleKeyParts")]
pub struct VehicleKey {
    year: u16,
    make: String,
    model: String,
}

/// Unvalidated wire form of [`VehicleKey`].
#[derive(Deserialize)]
struct VehicleKeyParts {
    year: u16,
    make: String,
    model: String,
}

impl TryFrom<VehicleKeyParts> for VehicleKey {
    type Error = ValidationError;

    fn try_from(parts: VehicleKeyParts) -> Result<Self, Self::Error> {
        Self::new(parts.year, parts.make, parts.model)
    }
}

impl VehicleKey {
    /// Earliest accepted model year.
    pub const MIN_YEAR: u16 = 1886;
    /// Latest accepted model year.
    pub const MAX_YEAR: u16 = 2100;
    /// Separator between the parts of [`VehicleKey::key`].
    pub const SEPARATOR: char = '|';

    /// Creates a validated vehicle key.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if make or model is blank or contains
    /// [`Self::SEPARATOR`], or if the year is outside
    /// [`Self::MIN_YEAR`, `Self::MAX_YEAR`].
    pub fn new(
        year: u16,
        make: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(ValidationError::YearOutOfRange { year });
        }
        let make = checked_part("make", &make.into())?;
        let model = checked_part("model", &model.into())?;
        Ok(Self { year, make, model })
    }

    /// Model year.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Make as supplied (whitespace collapsed).
    #[must_use]
    pub fn make(&self) -> &str {
        &self.make
    }

    /// Model as supplied (whitespace collapsed).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Normalized cache/storage key.
    #[must_use]
    pub fn key(&self) -> String {
        let sep = Self::SEPARATOR;
        format!(
            "{}{sep}{}{sep}{}",
            self.year,
            self.make.to_lowercase(),
            self.model.to_lowercase()
        )
    }
}

impl fmt::Display for VehicleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.make, self.model)
    }
}

fn checked_part(field: &str, raw: &str) -> Result<String, ValidationError> {
    let part = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if part.is_empty() {
        return Err(ValidationError::EmptyVehicleField {
            field: field.to_string(),
        });
    }
    if part.contains(VehicleKey::SEPARATOR) {
        return Err(ValidationError::ReservedSeparator {
            field: field.to_string(),
            separator: VehicleKey::SEPARATOR,
        });
    }
    Ok(part)
}
