use chrono::NaiveDate;
use serde::{ Deserialize, Serialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Series {
    Confirmed,
    Deaths,
    Recovered,
}

impl Series {
    /// Trace order within one country.
    pub const ALL: [Series; 3] = [Series::Confirmed, Series::Deaths, Series::Recovered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Series::Confirmed => "confirmed",
            Series::Deaths => "deaths",
            Series::Recovered => "recovered",
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesToggles {
    pub confirmed: bool,
    pub deaths: bool,
    pub recovered: bool,
}

impl SeriesToggles {
    pub fn is_enabled(&self, series: Series) -> bool {
        match series {
            Series::Confirmed => self.confirmed,
            Series::Deaths => self.deaths,
            Series::Recovered => self.recovered,
        }
    }

    pub fn set(&mut self, series: Series, enabled: bool) {
        match series {
            Series::Confirmed => self.confirmed = enabled,
            Series::Deaths => self.deaths = enabled,
            Series::Recovered => self.recovered = enabled,
        }
    }
}

impl Default for SeriesToggles {
    fn default() -> Self {
        Self { confirmed: true, deaths: true, recovered: true }
    }
}

/// Everything a figure depends on besides the tables themselves. Used as the
/// memoization key, so it must stay `Hash + Eq`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChartRequest {
    pub countries: Vec<String>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    #[serde(default)]
    pub series: SeriesToggles,
    #[serde(default = "default_true")]
    pub show_legend: bool,
    #[serde(default = "default_true")]
    pub log_scale: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: String,
    pub mode: String,
    pub name: String,
    pub x: Vec<String>,
    pub y: Vec<i64>,
}

impl Trace {
    pub fn line(name: String, x: Vec<String>, y: Vec<i64>) -> Self {
        Self { kind: "scatter".into(), mode: "lines".into(), name, x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    Linear,
    Log,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub text: String,
}

impl From<&str> for Title {
    fn from(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    pub title: Title,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<AxisType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    /// Always "x": hovering compares all traces at the same date.
    pub hovermode: String,
    pub showlegend: bool,
}

/// Plotly-shaped figure description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}
