use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{ Arc, Mutex };

use crate::data::Dataset;
use crate::models::chart::{ Axis, AxisType, ChartRequest, Figure, Layout, Series, Trace };

pub const CHART_TITLE: &str = "Number of COVID19 confirmed cases, deaths and recovered";

/// Figures kept per dataset before the memo starts over.
const MEMO_CAPACITY: usize = 256;

/// Rows of `axis` (ascending) that fall within `[from, to]`. `None` when the
/// range is inverted or selects nothing.
pub fn date_range(axis: &[NaiveDate], from: NaiveDate, to: NaiveDate) -> Option<RangeInclusive<usize>> {
    if from > to {
        return None;
    }
    let start = axis.partition_point(|d| *d < from);
    let end = axis.partition_point(|d| *d <= to);
    if start >= end {
        return None;
    }
    Some(start..=end - 1)
}

pub fn layout(request: &ChartRequest) -> Layout {
    let (axis_type, y_title) = if request.log_scale {
        (AxisType::Log, "Cases (logarithmic scale)")
    } else {
        (AxisType::Linear, "Cases")
    };
    Layout {
        title: CHART_TITLE.into(),
        xaxis: Axis { title: "Date".into(), axis_type: None },
        yaxis: Axis { title: y_title.into(), axis_type: Some(axis_type) },
        hovermode: "x".to_string(),
        showlegend: request.show_legend,
    }
}

/// One trace per selected country and enabled series, confirmed, deaths,
/// recovered in that order. Unknown countries are skipped. Zero values are
/// passed through even on a log axis.
pub fn build_figure(dataset: &Dataset, request: &ChartRequest) -> Figure {
    let mut data = Vec::new();

    if let Some(rows) = date_range(dataset.date_axis(), request.date_from, request.date_to) {
        let x: Vec<String> = dataset.dates()[rows.clone()].to_vec();
        for country in &request.countries {
            if !dataset.has_country(country) {
                debug!("Ignoring unknown country '{}'", country);
                continue;
            }
            for series in Series::ALL {
                if !request.series.is_enabled(series) {
                    continue;
                }
                if let Some(y) = dataset.table(series).column(country, rows.clone()) {
                    data.push(Trace::line(format!("{} {}", country, series), x.clone(), y));
                }
            }
        }
    } else {
        debug!("Empty date range {} .. {}", request.date_from, request.date_to);
    }

    Figure { data, layout: layout(request) }
}

/// Figures already built for one dataset, keyed on the full request.
pub struct FigureMemo {
    figures: Mutex<HashMap<ChartRequest, Arc<Figure>>>,
}

impl FigureMemo {
    pub fn new() -> Self {
        Self { figures: Mutex::new(HashMap::new()) }
    }

    pub fn get_or_build<F>(&self, request: &ChartRequest, build: F) -> Arc<Figure>
        where F: FnOnce() -> Figure
    {
        let mut figures = match self.figures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(figure) = figures.get(request) {
            return Arc::clone(figure);
        }
        if figures.len() >= MEMO_CAPACITY {
            figures.clear();
        }
        let figure = Arc::new(build());
        figures.insert(request.clone(), Arc::clone(&figure));
        figure
    }
}

impl Default for FigureMemo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::sample_dataset;
    use crate::models::chart::SeriesToggles;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn request(countries: &[&str], from: NaiveDate, to: NaiveDate, series: SeriesToggles) -> ChartRequest {
        ChartRequest {
            countries: countries.iter().map(|c| c.to_string()).collect(),
            date_from: from,
            date_to: to,
            series,
            show_legend: true,
            log_scale: true,
        }
    }

    fn confirmed_only() -> SeriesToggles {
        SeriesToggles { confirmed: true, deaths: false, recovered: false }
    }

    #[test]
    fn single_country_confirmed_over_full_axis() {
        let ds = sample_dataset();
        let fig = build_figure(&ds, &request(&["Czechia"], date(1, 22), date(1, 24), confirmed_only()));

        assert_eq!(fig.data.len(), 1);
        let trace = &fig.data[0];
        assert_eq!(trace.name, "Czechia confirmed");
        assert_eq!(trace.x, vec!["1/22/20", "1/23/20", "1/24/20"]);
        assert_eq!(trace.y, vec![0, 1, 3]);
    }

    #[test]
    fn unknown_country_yields_no_traces() {
        let ds = sample_dataset();
        let fig = build_figure(&ds, &request(&["France"], date(1, 22), date(1, 24), confirmed_only()));
        assert!(fig.data.is_empty());
    }

    #[test]
    fn inverted_range_yields_no_traces() {
        let ds = sample_dataset();
        let fig = build_figure(
            &ds,
            &request(&["Czechia", "Germany"], date(1, 24), date(1, 22), SeriesToggles::default())
        );
        assert!(fig.data.is_empty());
    }

    #[test]
    fn trace_lengths_match_dates_in_range() {
        let ds = sample_dataset();
        let axis = ds.date_axis().to_vec();
        for (i, from) in axis.iter().enumerate() {
            for to in &axis[i..] {
                let fig = build_figure(
                    &ds,
                    &request(&["Czechia", "Germany"], *from, *to, SeriesToggles::default())
                );
                let expected = axis.iter().filter(|d| *d >= from && *d <= to).count();
                assert_eq!(fig.data.len(), 6);
                for trace in &fig.data {
                    assert_eq!(trace.x.len(), expected);
                    assert_eq!(trace.y.len(), expected);
                }
            }
        }
    }

    #[test]
    fn bounds_outside_axis_are_clamped() {
        let ds = sample_dataset();
        let fig = build_figure(&ds, &request(&["Germany"], date(1, 1), date(1, 23), confirmed_only()));
        assert_eq!(fig.data[0].x, vec!["1/22/20", "1/23/20"]);
        assert_eq!(fig.data[0].y, vec![0, 0]);
    }

    #[test]
    fn traces_follow_country_then_series_order() {
        let ds = sample_dataset();
        let fig = build_figure(
            &ds,
            &request(&["Germany", "Czechia"], date(1, 22), date(1, 24), SeriesToggles::default())
        );
        let names: Vec<&str> = fig.data.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Germany confirmed",
                "Germany deaths",
                "Germany recovered",
                "Czechia confirmed",
                "Czechia deaths",
                "Czechia recovered"
            ]
        );
    }

    #[test]
    fn no_series_enabled_is_an_empty_figure() {
        let ds = sample_dataset();
        let none = SeriesToggles { confirmed: false, deaths: false, recovered: false };
        let fig = build_figure(&ds, &request(&["Czechia"], date(1, 22), date(1, 24), none));
        assert!(fig.data.is_empty());
        assert_eq!(fig.layout.title.text, CHART_TITLE);
    }

    #[test]
    fn layout_reflects_toggles() {
        let mut req = request(&[], date(1, 22), date(1, 24), SeriesToggles::default());
        req.log_scale = false;
        req.show_legend = false;
        let layout = layout(&req);
        assert_eq!(layout.yaxis.axis_type, Some(AxisType::Linear));
        assert!(!layout.showlegend);
        assert_eq!(layout.hovermode, "x");

        req.log_scale = true;
        assert_eq!(super::layout(&req).yaxis.axis_type, Some(AxisType::Log));
    }

    #[test]
    fn identical_requests_build_identical_figures() {
        let ds = sample_dataset();
        let req = request(&["Czechia", "Germany"], date(1, 23), date(1, 24), SeriesToggles::default());
        assert_eq!(build_figure(&ds, &req), build_figure(&ds, &req));

        let first = ds.figure(&req);
        let second = ds.figure(&req);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, build_figure(&ds, &req));
    }

    #[test]
    fn date_range_handles_gaps_and_empty_windows() {
        let axis = vec![date(1, 22), date(1, 23), date(1, 24)];
        assert_eq!(date_range(&axis, date(1, 22), date(1, 24)), Some(0..=2));
        assert_eq!(date_range(&axis, date(1, 23), date(1, 23)), Some(1..=1));
        assert_eq!(date_range(&axis, date(2, 1), date(2, 5)), None);
        assert_eq!(date_range(&axis, date(1, 24), date(1, 22)), None);
    }
}
