// THEORY:
// The classifier is a pure decision table over three numbers: the contour's
// enclosed area and its bounding-box width and height. There is no learning
// and no state. Every table follows the same shape:
//
// 1.  **Degenerate guard**: a zero-height box has no aspect ratio. It is
//     answered `Unknown` instead of dividing by zero.
// 2.  **Oversize guard** (household table only): very large regions are noise
//     or lighting artifacts and are rejected before any shape test.
// 3.  **Wide branch**: width / height above the split point suggests a
//     quadruped or a person lying down.
// 4.  **Tall branch**: upright silhouettes, split into children and adults by
//     ordered thresholds, narrowest first.
//
// The two tables disagree on thresholds and on branch structure for the same
// labels. They are kept as separate profiles and are never merged
// into one threshold set.

use crate::core_modules::blob::ShapeDescriptor;
use crate::error::{CensusError, Result};
use serde::Deserialize;

/// The closed set of labels a contour can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// An upright adult. The household table reports it as "Adult".
    StandingHuman,
    LyingHuman,
    Child,
    Animal,
    Unknown,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::StandingHuman,
        Category::LyingHuman,
        Category::Child,
        Category::Animal,
        Category::Unknown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::StandingHuman => "Standing human",
            Category::LyingHuman => "Lying human",
            Category::Child => "Child",
            Category::Animal => "Animal",
            Category::Unknown => "Unknown",
        }
    }
}

const HOUSEHOLD_LABELS: [Category; 4] = [
    Category::StandingHuman,
    Category::Child,
    Category::Animal,
    Category::Unknown,
];

/// Thresholds of the household table (labels: Adult, Child, Animal, Unknown).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HouseholdThresholds {
    /// Width / height above this value takes the wide branch.
    pub aspect_split: f64,
    /// Anything larger is `Unknown` regardless of shape.
    pub oversized_area: f64,
    pub animal_max_area: f64,
    pub child_max_area: f64,
    pub adult_max_area: f64,
}

impl Default for HouseholdThresholds {
    fn default() -> Self {
        Self {
            aspect_split: 1.5,
            oversized_area: 5000.0,
            animal_max_area: 1200.0,
            child_max_area: 800.0,
            adult_max_area: 1500.0,
        }
    }
}

/// Thresholds of the posture table (labels: Standing human, Lying human, Child, Animal, Unknown).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostureThresholds {
    pub aspect_split: f64,
    /// Wide regions must be strictly larger than this to count as an animal;
    /// smaller wide regions are read as a person lying down.
    pub animal_min_area: f64,
    /// Tall regions above this area are `Unknown`.
    pub upright_max_area: f64,
    /// Tall regions strictly taller than this many pixels are adults; shorter ones are children.
    pub standing_min_height: u32,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            aspect_split: 1.5,
            animal_min_area: 5000.0,
            upright_max_area: 20000.0,
            standing_min_height: 150,
        }
    }
}

/// Which decision table to apply. Chosen once when the pipeline is built.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "profile", rename_all = "kebab-case")]
pub enum ClassifierProfile {
    Household(HouseholdThresholds),
    Posture(PostureThresholds),
}

impl ClassifierProfile {
    pub fn household() -> Self {
        ClassifierProfile::Household(HouseholdThresholds::default())
    }

    pub fn posture() -> Self {
        ClassifierProfile::Posture(PostureThresholds::default())
    }

    /// Maps one contour's descriptors to exactly one label.
    pub fn classify(&self, shape: &ShapeDescriptor) -> Category {
        let Some(aspect_ratio) = aspect_ratio(shape) else {
            return Category::Unknown;
        };

        match self {
            ClassifierProfile::Household(t) => {
                if shape.area > t.oversized_area {
                    return Category::Unknown;
                }
                if aspect_ratio > t.aspect_split {
                    if shape.area <= t.animal_max_area {
                        Category::Animal
                    } else {
                        Category::Unknown
                    }
                } else if shape.area <= t.child_max_area {
                    Category::Child
                } else if shape.area <= t.adult_max_area {
                    Category::StandingHuman
                } else {
                    Category::Unknown
                }
            }
            ClassifierProfile::Posture(t) => {
                if aspect_ratio > t.aspect_split {
                    if shape.area > t.animal_min_area {
                        Category::Animal
                    } else {
                        Category::LyingHuman
                    }
                } else if shape.area > t.upright_max_area {
                    Category::Unknown
                } else if shape.height > t.standing_min_height {
                    Category::StandingHuman
                } else {
                    Category::Child
                }
            }
        }
    }

    /// The labels this table can emit, in display order.
    pub fn labels(&self) -> &'static [Category] {
        match self {
            ClassifierProfile::Household(_) => &HOUSEHOLD_LABELS,
            ClassifierProfile::Posture(_) => &Category::ALL,
        }
    }

    pub fn display_name(&self, category: Category) -> &'static str {
        match (self, category) {
            (ClassifierProfile::Household(_), Category::StandingHuman) => "Adult",
            _ => category.name(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ClassifierProfile::Household(t) => {
                check_positive("household aspect_split", t.aspect_split)?;
                check_positive("household animal_max_area", t.animal_max_area)?;
                check_positive("household child_max_area", t.child_max_area)?;
                if t.child_max_area > t.adult_max_area {
                    return Err(CensusError::InvalidConfig(format!(
                        "household child_max_area ({}) exceeds adult_max_area ({})",
                        t.child_max_area, t.adult_max_area
                    )));
                }
                if t.adult_max_area > t.oversized_area || t.animal_max_area > t.oversized_area {
                    return Err(CensusError::InvalidConfig(format!(
                        "household oversized_area ({}) must not be below the adult or animal ceilings",
                        t.oversized_area
                    )));
                }
            }
            ClassifierProfile::Posture(t) => {
                check_positive("posture aspect_split", t.aspect_split)?;
                check_positive("posture animal_min_area", t.animal_min_area)?;
                check_positive("posture upright_max_area", t.upright_max_area)?;
            }
        }
        Ok(())
    }
}

/// Width over height, or `None` for a degenerate zero-height box.
pub fn aspect_ratio(shape: &ShapeDescriptor) -> Option<f64> {
    if shape.height == 0 {
        return None;
    }
    Some(shape.width as f64 / shape.height as f64)
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CensusError::InvalidConfig(format!("{name} must be positive, got {value}")))
    }
}
