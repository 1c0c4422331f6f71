//! Daily pull of the confirmed / deaths / recovered time series, reshaped into
//! per-country, date-indexed tables.

pub mod source;
pub mod table;

use chrono::NaiveDate;
use log::{ info, warn };
use std::sync::Arc;
use thiserror::Error;

use self::source::{ DatasetSource, DatasetUrls, HttpDatasetSource };
use self::table::{ aggregate_by_country, parse_csv, CountryTable, TimeSeriesTable };
use crate::cache::{ CacheKey, DailyCache };
use crate::chart::{ build_figure, FigureMemo };
use crate::cli::Args;
use crate::models::chart::{ ChartRequest, Figure, Series };

/// Format of the date column headers, e.g. `1/22/20`.
pub const DATE_LABEL_FORMAT: &str = "%m/%d/%y";

#[derive(Debug, Error)]
pub enum DataUnavailable {
    #[error("failed to fetch {dataset} data from {url}: {source}")]
    Fetch {
        dataset: Series,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{dataset} data from {url} returned HTTP {status}")]
    Status {
        dataset: Series,
        url: String,
        status: u16,
    },
    #[error("malformed {dataset} data: {reason}")]
    Malformed {
        dataset: Series,
        reason: String,
    },
}

/// The three pivoted tables of one daily pull. They share the same date axis
/// and the same country columns, in the same order.
pub struct Dataset {
    countries: Vec<String>,
    dates: Vec<String>,
    date_axis: Vec<NaiveDate>,
    confirmed: TimeSeriesTable,
    deaths: TimeSeriesTable,
    recovered: TimeSeriesTable,
    figures: FigureMemo,
}

fn parse_date_axis(labels: &[String]) -> Result<Vec<NaiveDate>, DataUnavailable> {
    let mut axis: Vec<NaiveDate> = Vec::with_capacity(labels.len());
    for label in labels {
        let date = NaiveDate::parse_from_str(label, DATE_LABEL_FORMAT).map_err(|e| DataUnavailable::Malformed {
            dataset: Series::Confirmed,
            reason: format!("date column '{}': {}", label, e),
        })?;
        if let Some(prev) = axis.last() {
            if *prev >= date {
                return Err(DataUnavailable::Malformed {
                    dataset: Series::Confirmed,
                    reason: format!("date columns not ascending at '{}'", label),
                });
            }
        }
        axis.push(date);
    }
    Ok(axis)
}

/// Forces `table` onto the date and country axes of `reference`.
fn conform(
    dataset: Series,
    table: CountryTable,
    reference: &CountryTable
) -> Result<CountryTable, DataUnavailable> {
    if table.dates != reference.dates {
        return Err(DataUnavailable::Malformed {
            dataset,
            reason: format!(
                "date columns differ from confirmed ({} vs {})",
                table.dates.len(),
                reference.dates.len()
            ),
        });
    }

    let (aligned, missing, dropped) = table.align_to(&reference.countries);
    if !missing.is_empty() {
        warn!("{} data lacks {} countries, filled with zeros: {:?}", dataset, missing.len(), missing);
    }
    if !dropped.is_empty() {
        warn!("{} data has {} countries unknown to confirmed, dropped: {:?}", dataset, dropped.len(), dropped);
    }
    Ok(aligned)
}

impl Dataset {
    /// Parses, aggregates and pivots the three raw CSV bodies.
    pub fn from_csv(
        confirmed: &str,
        deaths: &str,
        recovered: &str,
        metadata_columns: usize
    ) -> Result<Self, DataUnavailable> {
        let confirmed = aggregate_by_country(
            Series::Confirmed,
            &parse_csv(Series::Confirmed, confirmed, metadata_columns)?
        )?;
        let date_axis = parse_date_axis(&confirmed.dates)?;
        let deaths = conform(
            Series::Deaths,
            aggregate_by_country(Series::Deaths, &parse_csv(Series::Deaths, deaths, metadata_columns)?)?,
            &confirmed
        )?;
        let recovered = conform(
            Series::Recovered,
            aggregate_by_country(Series::Recovered, &parse_csv(Series::Recovered, recovered, metadata_columns)?)?,
            &confirmed
        )?;

        info!(
            "Dataset ready: {} countries, {} dates ({} .. {})",
            confirmed.countries.len(),
            confirmed.dates.len(),
            confirmed.dates.first().map(String::as_str).unwrap_or("-"),
            confirmed.dates.last().map(String::as_str).unwrap_or("-")
        );

        Ok(Self {
            countries: confirmed.countries.clone(),
            dates: confirmed.dates.clone(),
            date_axis,
            confirmed: confirmed.pivot(),
            deaths: deaths.pivot(),
            recovered: recovered.pivot(),
            figures: FigureMemo::new(),
        })
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn date_axis(&self) -> &[NaiveDate] {
        &self.date_axis
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.date_axis.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.date_axis.last().copied()
    }

    pub fn has_country(&self, country: &str) -> bool {
        self.confirmed.contains(country)
    }

    pub fn table(&self, series: Series) -> &TimeSeriesTable {
        match series {
            Series::Confirmed => &self.confirmed,
            Series::Deaths => &self.deaths,
            Series::Recovered => &self.recovered,
        }
    }

    /// Memoized figure for `request` against these tables.
    pub fn figure(&self, request: &ChartRequest) -> Arc<Figure> {
        self.figures.get_or_build(request, || build_figure(self, request))
    }
}

/// Loads the dataset at most once per cache key.
pub struct DataService {
    source: Arc<dyn DatasetSource>,
    metadata_columns: usize,
    cache: DailyCache<Arc<Dataset>>,
}

impl DataService {
    pub fn new(source: Arc<dyn DatasetSource>, metadata_columns: usize) -> Self {
        Self { source, metadata_columns, cache: DailyCache::new() }
    }

    pub fn from_args(args: &Args) -> Self {
        let source = HttpDatasetSource::new(DatasetUrls::from_args(args));
        Self::new(Arc::new(source), args.metadata_columns)
    }

    pub async fn load(&self, key: CacheKey) -> Result<Arc<Dataset>, DataUnavailable> {
        self.cache.get_or_try_load(key, || async { self.fetch_all().await.map(Arc::new) }).await
    }

    pub async fn load_today(&self) -> Result<Arc<Dataset>, DataUnavailable> {
        self.load(CacheKey::today()).await
    }

    async fn fetch_all(&self) -> Result<Dataset, DataUnavailable> {
        let confirmed = self.source.fetch(Series::Confirmed).await?;
        let deaths = self.source.fetch(Series::Deaths).await?;
        let recovered = self.source.fetch(Series::Recovered).await?;
        Dataset::from_csv(&confirmed, &deaths, &recovered, self.metadata_columns)
    }
}
