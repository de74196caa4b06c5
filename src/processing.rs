use crate::data::Dataset;
use crate::types::{CityRecord, PolicyFlag, PolicyStatus};

/// Which output the city dashboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Table,
    Chart,
}

impl View {
    /// Maps the "Switch View" checkbox.
    pub fn from_switch(switched: bool) -> Self {
        let initial = View::default();
        if switched { initial.toggle() } else { initial }
    }

    pub fn toggle(self) -> Self {
        match self {
            View::Table => View::Chart,
            View::Chart => View::Table,
        }
    }

    pub fn is_switched(self) -> bool {
        self == View::Chart
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyScore {
    pub policy: String,
    pub implementation_adjusted: f64,
}

/// One map point: a city with the status of the selected flag.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub city: String,
    pub state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub population: u64,
    pub incidents: u64,
    pub value: i64,
    pub status: PolicyStatus,
}

/// Underscores to spaces, then title case: first letter of every word
/// upper, the rest lower.
pub fn title_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    let mut in_word = false;
    for c in name.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if in_word {
                label.extend(c.to_lowercase());
            } else {
                label.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            label.push(c);
            in_word = false;
        }
    }
    label
}

pub fn yes_no(value: i64) -> &'static str {
    if value == 0 { "No" } else { "Yes" }
}

pub fn format_table(record: &CityRecord) -> Vec<TableRow> {
    let row = |name: &str, value: String| TableRow {
        property: title_label(name),
        value,
    };

    let mut rows = Vec::with_capacity(11);
    rows.push(row("State", record.state.clone()));
    rows.push(row("Number_of_Incidents", record.incidents.to_string()));
    for flag in PolicyFlag::ALL {
        rows.push(row(flag.column(), yes_no(record.flag(flag)).to_string()));
    }
    rows.push(row("City Population", record.population.to_string()));
    rows
}

/// Implemented maps to +0.5, not implemented to -0.5.
pub fn diverging_score(value: i64) -> f64 {
    if value == 0 { -0.5 } else { 0.5 }
}

pub fn diverging_scores(record: &CityRecord) -> Vec<PolicyScore> {
    PolicyFlag::CHART_ORDER
        .iter()
        .map(|&flag| PolicyScore {
            policy: title_label(flag.column()),
            implementation_adjusted: diverging_score(record.flag(flag)),
        })
        .collect()
}

pub fn label_policy_status(dataset: &Dataset, flag: PolicyFlag) -> Vec<StatusRow> {
    dataset
        .records()
        .iter()
        .map(|record| {
            let value = record.flag(flag);
            StatusRow {
                city: record.city.clone(),
                state: record.state.clone(),
                latitude: record.latitude,
                longitude: record.longitude,
                population: record.population,
                incidents: record.incidents,
                value,
                status: PolicyStatus::from_value(value),
            }
        })
        .collect()
}
