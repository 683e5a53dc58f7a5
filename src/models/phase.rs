//! Construction phases a file can be filed against.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionPhase {
    PrePlanning,
    PlanningApplication,
    Design,
    PreConstruction,
    Demolition,
    Groundworks,
    Foundations,
    Superstructure,
    Roofing,
    FirstFix,
    Plastering,
    SecondFix,
    Finishing,
    Handover,
    Maintenance,
}

impl ConstructionPhase {
    /// Phases in build order.
    pub const ALL: [ConstructionPhase; 15] = [
        ConstructionPhase::PrePlanning,
        ConstructionPhase::PlanningApplication,
        ConstructionPhase::Design,
        ConstructionPhase::PreConstruction,
        ConstructionPhase::Demolition,
        ConstructionPhase::Groundworks,
        ConstructionPhase::Foundations,
        ConstructionPhase::Superstructure,
        ConstructionPhase::Roofing,
        ConstructionPhase::FirstFix,
        ConstructionPhase::Plastering,
        ConstructionPhase::SecondFix,
        ConstructionPhase::Finishing,
        ConstructionPhase::Handover,
        ConstructionPhase::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructionPhase::PrePlanning => "pre_planning",
            ConstructionPhase::PlanningApplication => "planning_application",
            ConstructionPhase::Design => "design",
            ConstructionPhase::PreConstruction => "pre_construction",
            ConstructionPhase::Demolition => "demolition",
            ConstructionPhase::Groundworks => "groundworks",
            ConstructionPhase::Foundations => "foundations",
            ConstructionPhase::Superstructure => "superstructure",
            ConstructionPhase::Roofing => "roofing",
            ConstructionPhase::FirstFix => "first_fix",
            ConstructionPhase::Plastering => "plastering",
            ConstructionPhase::SecondFix => "second_fix",
            ConstructionPhase::Finishing => "finishing",
            ConstructionPhase::Handover => "handover",
            ConstructionPhase::Maintenance => "maintenance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConstructionPhase::PrePlanning => "Pre-Planning",
            ConstructionPhase::PlanningApplication => "Planning Application",
            ConstructionPhase::Design => "Design",
            ConstructionPhase::PreConstruction => "Pre-Construction",
            ConstructionPhase::Demolition => "Demolition",
            ConstructionPhase::Groundworks => "Groundworks",
            ConstructionPhase::Foundations => "Foundations",
            ConstructionPhase::Superstructure => "Superstructure",
            ConstructionPhase::Roofing => "Roofing",
            ConstructionPhase::FirstFix => "First Fix",
            ConstructionPhase::Plastering => "Plastering",
            ConstructionPhase::SecondFix => "Second Fix",
            ConstructionPhase::Finishing => "Finishing",
            ConstructionPhase::Handover => "Handover",
            ConstructionPhase::Maintenance => "Maintenance",
        }
    }
}

impl fmt::Display for ConstructionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown construction phase `{0}`")]
pub struct UnknownPhase(pub String);

impl FromStr for ConstructionPhase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}
