//! SI / IP display units.
//!
//! Values are always stored in SI. The chosen system only changes how
//! conductivity is shown, and travels with each render call.

use serde::{Deserialize, Serialize};

/// W/(m-K) to Btu/(hr-ft-°F)
pub const CONDUCTIVITY_SI_TO_IP: f64 = 0.577789236;

pub const UNIT_COOKIE: &str = "unit_system";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSystem {
    #[default]
    SI,
    IP,
}

impl UnitSystem {
    /// Parse a stored cookie value; anything unrecognised is SI.
    pub fn from_cookie(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("ip") {
            UnitSystem::IP
        } else {
            UnitSystem::SI
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::SI => "SI",
            UnitSystem::IP => "IP",
        }
    }

    pub fn is_ip(&self) -> bool {
        matches!(self, UnitSystem::IP)
    }

    pub fn conductivity(&self, si_value: f64) -> f64 {
        match self {
            UnitSystem::SI => si_value,
            UnitSystem::IP => si_value * CONDUCTIVITY_SI_TO_IP,
        }
    }

    pub fn conductivity_unit(&self) -> &'static str {
        match self {
            UnitSystem::SI => "W/(m-K)",
            UnitSystem::IP => "Btu/(hr-ft-°F)",
        }
    }
}
