use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Peak,
    Settlement,
    WaterBody,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Peak, Category::Settlement, Category::WaterBody];

    /// Two-character id prefix that tags records of this category.
    pub const fn prefix(self) -> &'static str {
        match self {
            Category::Peak => "C:",
            Category::Settlement => "P:",
            Category::WaterBody => "A:",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Category::Peak => "peak",
            Category::Settlement => "settlement",
            Category::WaterBody => "water_body",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category encoded in an id prefix; `None` for ids outside the prefix table.
pub fn category_of(id: &str) -> Option<Category> {
    Category::ALL
        .into_iter()
        .find(|c| id.starts_with(c.prefix()))
}

/// Stable point identifier. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointId(Arc<str>);

impl PointId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PointId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Immutable catalog record.
///
/// Construction validates the record, so a `Point` always has a known
/// category that agrees with its id prefix and in-range coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    id: PointId,
    category: Category,
    name: String,
    position: GeoPoint,
}

impl Point {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        lat_deg: f64,
        lon_deg: f64,
    ) -> Result<Self, RecordError> {
        let id = id.into();
        let name = name.into();
        let category = category_of(&id).ok_or_else(|| RecordError::UnknownPrefix(id.clone()))?;

        let position = GeoPoint::new(lat_deg, lon_deg);
        if !position.is_valid() {
            return Err(RecordError::InvalidCoordinates {
                id,
                lat: lat_deg,
                lon: lon_deg,
            });
        }

        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RecordError::EmptyName(id));
        }

        Ok(Self {
            id: PointId::new(id),
            category,
            name: trimmed.to_string(),
            position,
        })
    }

    pub fn id(&self) -> &PointId {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> GeoPoint {
        self.position
    }

    /// `geo:` URI with six-decimal coordinates, used as the entity description.
    pub fn geo_uri(&self) -> String {
        format!(
            "geo:{:.6},{:.6}",
            self.position.lat_deg, self.position.lon_deg
        )
    }
}
