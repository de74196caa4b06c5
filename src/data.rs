use crate::error::{DashboardError, DashboardResult};
use crate::types::{CityRecord, PolicyFlag};
use anyhow::{Context, Result, anyhow, bail};
use csv::{ReaderBuilder, StringRecord};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const CITY: &str = "City";
const STATE: &str = "State";
const LATITUDE: &str = "Latitude";
const LONGITUDE: &str = "Longitude";
const POPULATION: &str = "City Population";
const INCIDENTS: &str = "Number_of_Incidents";

/// The full record set, loaded once and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<CityRecord>,
}

impl Dataset {
    pub fn new(records: Vec<CityRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record whose city name matches exactly.
    pub fn find_city(&self, name: &str) -> DashboardResult<&CityRecord> {
        self.records
            .iter()
            .find(|r| r.city == name)
            .ok_or_else(|| DashboardError::CityNotFound(name.to_string()))
    }

    /// Sorted, de-duplicated city names for the selector.
    pub fn cities(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.city.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    info!("Loading city data from {:?}", path);
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let dataset = read_dataset(file)
        .with_context(|| format!("Failed to load CSV file: {:?}", path))?;
    info!("Loaded {} city records", dataset.len());
    Ok(dataset)
}

pub fn read_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();

    // Map column names to indices for faster lookup
    let col_indices: HashMap<&str, usize> = headers.iter().enumerate()
        .map(|(i, h)| (h, i))
        .collect();
    let column = |name: &str| -> Result<usize> {
        col_indices.get(name).copied()
            .ok_or_else(|| anyhow!("Column '{}' not found in CSV", name))
    };

    let columns = Columns {
        city: column(CITY)?,
        state: column(STATE)?,
        latitude: column(LATITUDE)?,
        longitude: column(LONGITUDE)?,
        population: column(POPULATION)?,
        incidents: column(INCIDENTS)?,
    };
    let mut flag_indices = [0usize; 8];
    for (slot, flag) in flag_indices.iter_mut().zip(PolicyFlag::ALL) {
        *slot = column(flag.column())?;
    }

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let city = parse_record(&record, &columns, &flag_indices)
            .with_context(|| format!("Malformed row at line {}", line))?;
        if city.city.is_empty() {
            debug!("Skipping row without a city name at line {}", line);
            continue;
        }
        records.push(city);
    }

    Ok(Dataset::new(records))
}

struct Columns {
    city: usize,
    state: usize,
    latitude: usize,
    longitude: usize,
    population: usize,
    incidents: usize,
}

fn parse_record(record: &StringRecord, columns: &Columns, flags: &[usize; 8]) -> Result<CityRecord> {
    let field = |idx: usize| record.get(idx).unwrap_or("").trim();

    let mut values = [0i64; 8];
    for ((value, &idx), flag) in values.iter_mut().zip(flags).zip(PolicyFlag::ALL) {
        *value = parse_integer(field(idx), flag.column())?;
    }

    Ok(CityRecord {
        city: field(columns.city).to_string(),
        state: field(columns.state).to_string(),
        latitude: parse_number(field(columns.latitude), LATITUDE)?,
        longitude: parse_number(field(columns.longitude), LONGITUDE)?,
        population: parse_count(field(columns.population), POPULATION)?,
        incidents: parse_count(field(columns.incidents), INCIDENTS)?,
        flags: values,
    })
}

/// Empty cells and NaN are nulls.
fn parse_number(raw: &str, column: &str) -> Result<Option<f64>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value: f64 = raw.parse()
        .with_context(|| format!("Column '{}' is not numeric: {:?}", column, raw))?;
    if !value.is_finite() {
        bail!("Column '{}' is not finite: {:?}", column, raw);
    }
    Ok(Some(value))
}

/// Nulls become 0; integral floats such as "12.0" are accepted.
fn parse_integer(raw: &str, column: &str) -> Result<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    match parse_number(raw, column)? {
        None => Ok(0),
        Some(value) if value.fract() != 0.0 => {
            bail!("Column '{}' must hold an integer: {:?}", column, raw)
        }
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
        Some(value) if value < i64::MIN as f64 || value >= i64::MAX as f64 => {
            bail!("Column '{}' is out of range: {:?}", column, raw)
        }
        Some(value) => Ok(value as i64),
    }
}

fn parse_count(raw: &str, column: &str) -> Result<u64> {
    let value = parse_integer(raw, column)?;
    u64::try_from(value)
        .map_err(|_| anyhow!("Column '{}' must not be negative: {}", column, value))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const HEADER: &str = "City,State,Latitude,Longitude,City Population,Number_of_Incidents,\
Requires_De_Escalation,Has_Use_of_Force_Continuum,Bans_Chokeholds_and_Strangleholds,\
Requires_Warning_Before_Shooting,Restricts_Shooting_at_Moving_Vehicles,\
Requires_Exhaust_All_Other_Means_Before_Shooting,Duty_to_Intervene,Requires_Comprehensive_Reporting";

    pub(crate) fn sample_csv() -> String {
        format!(
            "{HEADER}\n\
Springfield,IL,39.78,-89.65,114000,12,1,0,1,0,1,0,1,0\n\
Austin,TX,30.27,-97.74,961855.0,,1.0,1.0,,1,1,1,1,1\n\
Boise,ID,,,235684,3,0,0,0,0,0,0,0,0\n"
        )
    }

    pub(crate) fn sample_dataset() -> Dataset {
        read_dataset(sample_csv().as_bytes()).unwrap()
    }

    #[test]
    fn reads_all_rows() {
        let dataset = sample_dataset();
        assert_eq!(dataset.len(), 3);
        let springfield = dataset.find_city("Springfield").unwrap();
        assert_eq!(springfield.state, "IL");
        assert_eq!(springfield.population, 114000);
        assert_eq!(springfield.incidents, 12);
        assert_eq!(springfield.flag(PolicyFlag::RequiresDeEscalation), 1);
        assert_eq!(springfield.flag(PolicyFlag::HasUseOfForceContinuum), 0);
    }

    #[test]
    fn nulls_default_to_zero() {
        let dataset = sample_dataset();
        let austin = dataset.find_city("Austin").unwrap();
        assert_eq!(austin.incidents, 0);
        assert_eq!(austin.population, 961855);
        assert_eq!(austin.flag(PolicyFlag::RequiresDeEscalation), 1);
        assert_eq!(austin.flag(PolicyFlag::BansChokeholdsAndStrangleholds), 0);
    }

    #[test]
    fn missing_coordinates_are_kept() {
        let dataset = sample_dataset();
        let boise = dataset.find_city("Boise").unwrap();
        assert_eq!(boise.coordinates(), None);
        assert_eq!(
            dataset.find_city("Springfield").unwrap().coordinates(),
            Some((39.78, -89.65))
        );
    }

    #[test]
    fn unknown_city_is_reported() {
        let dataset = sample_dataset();
        assert_eq!(
            dataset.find_city("Atlantis"),
            Err(DashboardError::CityNotFound("Atlantis".to_string()))
        );
    }

    #[test]
    fn duplicate_city_takes_first_row() {
        let csv = format!("{HEADER}\nSpringfield,IL,1,1,10,1,1,1,1,1,1,1,1,1\nSpringfield,MO,2,2,20,2,0,0,0,0,0,0,0,0\n");
        let dataset = read_dataset(csv.as_bytes()).unwrap();
        assert_eq!(dataset.find_city("Springfield").unwrap().state, "IL");
        assert_eq!(dataset.cities(), vec!["Springfield".to_string()]);
    }

    #[test]
    fn cities_are_sorted() {
        assert_eq!(sample_dataset().cities(), vec!["Austin", "Boise", "Springfield"]);
    }

    #[test]
    fn missing_column_is_fatal() {
        let csv = "City,State\nSpringfield,IL\n";
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("not found in CSV"));
    }

    #[test]
    fn negative_count_is_fatal() {
        let csv = format!("{HEADER}\nSpringfield,IL,1,1,10,-4,1,1,1,1,1,1,1,1\n");
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("must not be negative"));
    }

    #[test]
    fn out_of_range_count_is_fatal() {
        let csv = format!("{HEADER}\nSpringfield,IL,1,1,1e30,1e30,1,1,1,1,1,1,1,1\n");
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("out of range"));
        assert!(message.contains("City Population"));
    }

    #[test]
    fn out_of_range_flag_is_fatal() {
        let csv = format!("{HEADER}\nSpringfield,IL,1,1,10,4,-1e19,1,1,1,1,1,1,1\n");
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("Requires_De_Escalation"));
    }

    #[test]
    fn fractional_flag_is_fatal() {
        let csv = format!("{HEADER}\nSpringfield,IL,1,1,10,4,0.5,1,1,1,1,1,1,1\n");
        assert!(read_dataset(csv.as_bytes()).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_csv().as_bytes()).unwrap();
        let dataset = load_dataset(file.path()).unwrap();
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn missing_file_names_path() {
        let err = load_dataset(Path::new("/nonexistent/cities.csv")).unwrap_err();
        assert!(err.to_string().contains("cities.csv"));
    }
}
