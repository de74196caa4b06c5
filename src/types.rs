use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One row of the merged policy / incident / population table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityRecord {
    pub city: String,
    pub state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub population: u64,
    pub incidents: u64,
    // Indexed by PolicyFlag as usize, nulls already replaced by 0.
    pub flags: [i64; 8],
}

impl CityRecord {
    pub fn flag(&self, flag: PolicyFlag) -> i64 {
        self.flags[flag as usize]
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyFlag {
    RequiresDeEscalation,
    HasUseOfForceContinuum,
    BansChokeholdsAndStrangleholds,
    RequiresWarningBeforeShooting,
    RestrictsShootingAtMovingVehicles,
    RequiresExhaustAllOtherMeansBeforeShooting,
    DutyToIntervene,
    RequiresComprehensiveReporting,
}

impl PolicyFlag {
    /// Column order of the source table.
    pub const ALL: [PolicyFlag; 8] = [
        PolicyFlag::RequiresDeEscalation,
        PolicyFlag::HasUseOfForceContinuum,
        PolicyFlag::BansChokeholdsAndStrangleholds,
        PolicyFlag::RequiresWarningBeforeShooting,
        PolicyFlag::RestrictsShootingAtMovingVehicles,
        PolicyFlag::RequiresExhaustAllOtherMeansBeforeShooting,
        PolicyFlag::DutyToIntervene,
        PolicyFlag::RequiresComprehensiveReporting,
    ];

    /// Bar order of the policy chart (alphabetical by column name).
    pub const CHART_ORDER: [PolicyFlag; 8] = [
        PolicyFlag::BansChokeholdsAndStrangleholds,
        PolicyFlag::DutyToIntervene,
        PolicyFlag::HasUseOfForceContinuum,
        PolicyFlag::RequiresComprehensiveReporting,
        PolicyFlag::RequiresDeEscalation,
        PolicyFlag::RequiresExhaustAllOtherMeansBeforeShooting,
        PolicyFlag::RequiresWarningBeforeShooting,
        PolicyFlag::RestrictsShootingAtMovingVehicles,
    ];

    pub fn column(self) -> &'static str {
        match self {
            PolicyFlag::RequiresDeEscalation => "Requires_De_Escalation",
            PolicyFlag::HasUseOfForceContinuum => "Has_Use_of_Force_Continuum",
            PolicyFlag::BansChokeholdsAndStrangleholds => "Bans_Chokeholds_and_Strangleholds",
            PolicyFlag::RequiresWarningBeforeShooting => "Requires_Warning_Before_Shooting",
            PolicyFlag::RestrictsShootingAtMovingVehicles => "Restricts_Shooting_at_Moving_Vehicles",
            PolicyFlag::RequiresExhaustAllOtherMeansBeforeShooting => {
                "Requires_Exhaust_All_Other_Means_Before_Shooting"
            }
            PolicyFlag::DutyToIntervene => "Duty_to_Intervene",
            PolicyFlag::RequiresComprehensiveReporting => "Requires_Comprehensive_Reporting",
        }
    }

    /// Human wording used by the heatmap variable selector.
    pub fn selector_label(self) -> &'static str {
        match self {
            PolicyFlag::RequiresDeEscalation => "Requires De-Escalation",
            PolicyFlag::HasUseOfForceContinuum => "Has Use of Force Continuum",
            PolicyFlag::BansChokeholdsAndStrangleholds => "Bans Chokeholds/Strangleholds",
            PolicyFlag::RequiresWarningBeforeShooting => "Requires Warning Before Shooting",
            PolicyFlag::RestrictsShootingAtMovingVehicles => "Restricts Shooting at Moving Vehicles",
            PolicyFlag::RequiresExhaustAllOtherMeansBeforeShooting => {
                "Exhaust All Other Means Before Shooting"
            }
            PolicyFlag::DutyToIntervene => "Duty to Intervene",
            PolicyFlag::RequiresComprehensiveReporting => "Requires Comprehensive Reporting",
        }
    }
}

impl fmt::Display for PolicyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for PolicyFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyFlag::ALL
            .into_iter()
            .find(|flag| flag.column() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStatus {
    Implemented,
    NotImplemented,
}

impl PolicyStatus {
    /// Zero is the only value that counts as not implemented.
    pub fn from_value(value: i64) -> Self {
        if value == 0 {
            PolicyStatus::NotImplemented
        } else {
            PolicyStatus::Implemented
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PolicyStatus::Implemented => "Implemented",
            PolicyStatus::NotImplemented => "Not Implemented",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            PolicyStatus::Implemented => "Green",
            PolicyStatus::NotImplemented => "Red",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_columns_round_trip_through_from_str() {
        for flag in PolicyFlag::ALL {
            assert_eq!(flag.column().parse::<PolicyFlag>(), Ok(flag));
        }
        assert!("Requires_Body_Cameras".parse::<PolicyFlag>().is_err());
    }

    #[test]
    fn chart_order_is_alphabetical_by_column() {
        let columns: Vec<&str> = PolicyFlag::CHART_ORDER.iter().map(|f| f.column()).collect();
        let mut sorted = columns.clone();
        sorted.sort();
        assert_eq!(columns, sorted);
    }

    #[test]
    fn status_thresholds_at_zero() {
        assert_eq!(PolicyStatus::from_value(0), PolicyStatus::NotImplemented);
        assert_eq!(PolicyStatus::from_value(1), PolicyStatus::Implemented);
        assert_eq!(PolicyStatus::from_value(3), PolicyStatus::Implemented);
        assert_eq!(PolicyStatus::from_value(-1), PolicyStatus::Implemented);
    }
}
