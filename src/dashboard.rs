//! Per-session dashboard widgets. Every widget change is an event; handling
//! it yields the next state plus the figure to draw. Nothing here touches the
//! network.

use chrono::NaiveDate;
use serde::{ Deserialize, Serialize };

use crate::data::Dataset;
use crate::models::chart::{ ChartRequest, Figure, Series, SeriesToggles };

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardState {
    pub selected_countries: Vec<String>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub series: SeriesToggles,
    pub show_legend: bool,
    pub log_scale: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    SelectCountries { countries: Vec<String> },
    SetDateFrom { date: NaiveDate },
    SetDateTo { date: NaiveDate },
    ToggleSeries { series: Series, enabled: bool },
    ShowLegend { enabled: bool },
    LogScale { enabled: bool },
}

/// What the surface draws after an event.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardView {
    pub state: DashboardState,
    pub figure: Figure,
}

impl DashboardState {
    /// Fresh widgets: `default_country` pre-selected when it exists, the full
    /// date axis, every toggle on.
    pub fn initial(dataset: &Dataset, default_country: &str) -> Self {
        let selected_countries = if dataset.has_country(default_country) {
            vec![default_country.to_string()]
        } else {
            Vec::new()
        };
        let first = dataset.first_date().unwrap_or_default();
        let last = dataset.last_date().unwrap_or(first);
        Self {
            selected_countries,
            date_from: first,
            date_to: last,
            series: SeriesToggles::default(),
            show_legend: true,
            log_scale: true,
        }
    }

    pub fn apply(mut self, event: DashboardEvent) -> Self {
        match event {
            DashboardEvent::SelectCountries { countries } => self.selected_countries = countries,
            DashboardEvent::SetDateFrom { date } => self.date_from = date,
            DashboardEvent::SetDateTo { date } => self.date_to = date,
            DashboardEvent::ToggleSeries { series, enabled } => self.series.set(series, enabled),
            DashboardEvent::ShowLegend { enabled } => self.show_legend = enabled,
            DashboardEvent::LogScale { enabled } => self.log_scale = enabled,
        }
        self
    }

    pub fn request(&self) -> ChartRequest {
        ChartRequest {
            countries: self.selected_countries.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            series: self.series,
            show_legend: self.show_legend,
            log_scale: self.log_scale,
        }
    }

    pub fn render(&self, dataset: &Dataset) -> DashboardView {
        DashboardView {
            state: self.clone(),
            figure: dataset.figure(&self.request()).as_ref().clone(),
        }
    }
}

pub fn handle(dataset: &Dataset, state: DashboardState, event: DashboardEvent) -> DashboardView {
    state.apply(event).render(dataset)
}
