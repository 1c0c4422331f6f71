use std::collections::HashMap;
use std::ops::RangeInclusive;

use super::DataUnavailable;
use crate::models::chart::Series;

/// Country column as named by the source CSVs.
pub const SOURCE_COUNTRY_COLUMN: &str = "Country/Region";

/// One dataset as it arrives: one row per region, observations per date.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub dates: Vec<String>,
    pub rows: Vec<(String, Vec<i64>)>,
}

/// Per-country rows, one per distinct country, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryTable {
    pub dates: Vec<String>,
    pub countries: Vec<String>,
    pub rows: Vec<Vec<i64>>,
}

/// Date-indexed table: row `i` holds every country's value on `dates[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    dates: Vec<String>,
    countries: Vec<String>,
    index: HashMap<String, usize>,
    values: Vec<Vec<i64>>,
}

fn malformed(dataset: Series, reason: impl Into<String>) -> DataUnavailable {
    DataUnavailable::Malformed { dataset, reason: reason.into() }
}

fn parse_cell(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(v) = cell.parse::<i64>() {
        return Some(v);
    }
    // Some exports write counts as "12.0".
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}

/// Reads a time-series CSV whose first `metadata_columns` columns describe
/// the region and every later column is one date.
pub fn parse_csv(
    dataset: Series,
    text: &str,
    metadata_columns: usize
) -> Result<RawTable, DataUnavailable> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes());

    let header = reader
        .headers()
        .map_err(|e| malformed(dataset, format!("unreadable header: {}", e)))?
        .clone();

    if header.len() <= metadata_columns {
        return Err(
            malformed(
                dataset,
                format!(
                    "expected date columns after {} metadata columns, found {} columns",
                    metadata_columns,
                    header.len()
                )
            )
        );
    }

    let country_idx = header
        .iter()
        .take(metadata_columns)
        .position(|h| h.trim() == SOURCE_COUNTRY_COLUMN)
        .ok_or_else(|| malformed(dataset, format!("missing '{}' column", SOURCE_COUNTRY_COLUMN)))?;

    let dates: Vec<String> = header
        .iter()
        .skip(metadata_columns)
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| malformed(dataset, e.to_string()))?;
        let country = record
            .get(country_idx)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| malformed(dataset, format!("row {} has no country", line + 1)))?;

        let values = record
            .iter()
            .skip(metadata_columns)
            .zip(&dates)
            .map(|(cell, date)| {
                parse_cell(cell).ok_or_else(||
                    malformed(
                        dataset,
                        format!("row {} ({}): bad value '{}' for {}", line + 1, country, cell, date)
                    )
                )
            })
            .collect::<Result<Vec<i64>, _>>()?;

        rows.push((country, values));
    }

    Ok(RawTable { dates, rows })
}

/// Sums every row sharing a country name into one row. Countries keep the
/// order in which they first appear. A sum that overflows is malformed.
pub fn aggregate_by_country(dataset: Series, raw: &RawTable) -> Result<CountryTable, DataUnavailable> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut countries: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<i64>> = Vec::new();

    for (country, values) in &raw.rows {
        let idx = *positions.entry(country.as_str()).or_insert_with(|| {
            countries.push(country.clone());
            rows.push(vec![0; raw.dates.len()]);
            rows.len() - 1
        });
        for ((total, value), date) in rows[idx].iter_mut().zip(values).zip(&raw.dates) {
            *total = total
                .checked_add(*value)
                .ok_or_else(|| malformed(dataset, format!("{} total overflows on {}", country, date)))?;
        }
    }

    Ok(CountryTable { dates: raw.dates.clone(), countries, rows })
}

impl CountryTable {
    /// Back to one row per country, e.g. to aggregate again.
    pub fn to_raw(&self) -> RawTable {
        RawTable {
            dates: self.dates.clone(),
            rows: self.countries.iter().cloned().zip(self.rows.iter().cloned()).collect(),
        }
    }

    /// Transposes so dates index the rows and countries the columns.
    pub fn pivot(&self) -> TimeSeriesTable {
        let values = (0..self.dates.len())
            .map(|d| self.rows.iter().map(|row| row[d]).collect())
            .collect();
        TimeSeriesTable::new(self.dates.clone(), self.countries.clone(), values)
    }

    /// Lays the rows out along `countries`. Countries this table lacks get a
    /// row of zeros. Returns the table plus the missing and the dropped names.
    pub fn align_to(&self, countries: &[String]) -> (CountryTable, Vec<String>, Vec<String>) {
        let own: HashMap<&str, usize> = self.countries
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut missing = Vec::new();
        let rows = countries
            .iter()
            .map(|country| match own.get(country.as_str()) {
                Some(&i) => self.rows[i].clone(),
                None => {
                    missing.push(country.clone());
                    vec![0; self.dates.len()]
                }
            })
            .collect();

        let wanted: HashMap<&str, ()> = countries.iter().map(|c| (c.as_str(), ())).collect();
        let dropped = self.countries
            .iter()
            .filter(|c| !wanted.contains_key(c.as_str()))
            .cloned()
            .collect();

        (CountryTable { dates: self.dates.clone(), countries: countries.to_vec(), rows }, missing, dropped)
    }
}

impl TimeSeriesTable {
    pub fn new(dates: Vec<String>, countries: Vec<String>, values: Vec<Vec<i64>>) -> Self {
        let index = countries
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self { dates, countries, index, values }
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn contains(&self, country: &str) -> bool {
        self.index.contains_key(country)
    }

    pub fn value(&self, date_idx: usize, country: &str) -> Option<i64> {
        let col = *self.index.get(country)?;
        self.values.get(date_idx).map(|row| row[col])
    }

    /// Values of one country over a range of date rows, in date order.
    pub fn column(&self, country: &str, rows: RangeInclusive<usize>) -> Option<Vec<i64>> {
        let col = *self.index.get(country)?;
        let slice = self.values.get(rows)?;
        Some(slice.iter().map(|row| row[col]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIRMED: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Czechia,49.8,15.5,0,1,3
Bavaria,Germany,48.8,11.5,0,0,1
Berlin,Germany,52.5,13.4,0,0,0
";

    fn table() -> CountryTable {
        aggregate_by_country(Series::Confirmed, &parse_csv(Series::Confirmed, CONFIRMED, 4).unwrap()).unwrap()
    }

    #[test]
    fn parses_dates_after_metadata_columns() {
        let raw = parse_csv(Series::Confirmed, CONFIRMED, 4).unwrap();
        assert_eq!(raw.dates, vec!["1/22/20", "1/23/20", "1/24/20"]);
        assert_eq!(raw.rows.len(), 3);
        assert_eq!(raw.rows[1], ("Germany".to_string(), vec![0, 0, 1]));
    }

    #[test]
    fn sums_regions_into_countries_in_source_order() {
        let table = table();
        assert_eq!(table.countries, vec!["Czechia", "Germany"]);
        assert_eq!(table.rows, vec![vec![0, 1, 3], vec![0, 0, 1]]);
    }

    #[test]
    fn keeps_first_seen_order_not_alphabetical() {
        let csv = "\
Province/State,Country/Region,Lat,Long,1/22/20
,Zimbabwe,0,0,1
,Albania,0,0,2
a,Zimbabwe,0,0,3
";
        let table = aggregate_by_country(Series::Deaths, &parse_csv(Series::Deaths, csv, 4).unwrap()).unwrap();
        assert_eq!(table.countries, vec!["Zimbabwe", "Albania"]);
        assert_eq!(table.rows, vec![vec![4], vec![2]]);
    }

    #[test]
    fn aggregating_twice_changes_nothing() {
        let once = table();
        let twice = aggregate_by_country(Series::Confirmed, &once.to_raw()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn pivot_puts_dates_on_rows() {
        let pivoted = table().pivot();
        assert_eq!(pivoted.dates(), &["1/22/20", "1/23/20", "1/24/20"]);
        assert_eq!(pivoted.countries(), &["Czechia", "Germany"]);
        assert_eq!(pivoted.value(2, "Czechia"), Some(3));
        assert_eq!(pivoted.column("Czechia", 0..=2), Some(vec![0, 1, 3]));
        assert_eq!(pivoted.column("Germany", 1..=2), Some(vec![0, 1]));
        assert_eq!(pivoted.column("France", 0..=2), None);
    }

    #[test]
    fn align_fills_missing_and_reports_dropped() {
        let wanted = vec!["Germany".to_string(), "France".to_string()];
        let (aligned, missing, dropped) = table().align_to(&wanted);
        assert_eq!(aligned.countries, wanted);
        assert_eq!(aligned.rows, vec![vec![0, 0, 1], vec![0, 0, 0]]);
        assert_eq!(missing, vec!["France"]);
        assert_eq!(dropped, vec!["Czechia"]);
    }

    #[test]
    fn non_numeric_cell_is_malformed() {
        let csv = "Province/State,Country/Region,Lat,Long,1/22/20\n,Czechia,0,0,n/a\n";
        let err = parse_csv(Series::Confirmed, csv, 4).unwrap_err();
        assert!(matches!(err, DataUnavailable::Malformed { dataset: Series::Confirmed, .. }));
    }

    #[test]
    fn accepts_integral_floats() {
        let csv = "Province/State,Country/Region,Lat,Long,1/22/20\n,Czechia,0,0,12.0\n";
        let raw = parse_csv(Series::Confirmed, csv, 4).unwrap();
        assert_eq!(raw.rows[0].1, vec![12]);
    }

    #[test]
    fn header_without_dates_is_malformed() {
        let csv = "Province/State,Country/Region,Lat,Long\n,Czechia,0,0\n";
        assert!(parse_csv(Series::Recovered, csv, 4).is_err());
    }

    #[test]
    fn ragged_row_is_malformed() {
        let csv = "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n,Czechia,0,0,1\n";
        assert!(parse_csv(Series::Confirmed, csv, 4).is_err());
    }

    #[test]
    fn overflowing_country_total_is_malformed() {
        let csv = format!(
            "Province/State,Country/Region,Lat,Long,1/22/20\na,Czechia,0,0,{}\nb,Czechia,0,0,1\n",
            i64::MAX
        );
        let raw = parse_csv(Series::Confirmed, &csv, 4).unwrap();
        let err = aggregate_by_country(Series::Confirmed, &raw).unwrap_err();
        assert!(matches!(err, DataUnavailable::Malformed { dataset: Series::Confirmed, .. }));
    }
}
