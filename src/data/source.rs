use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;

use super::DataUnavailable;
use crate::cli::Args;
use crate::models::chart::Series;

/// Where the three raw CSV resources come from.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch(&self, dataset: Series) -> Result<String, DataUnavailable>;
}

#[derive(Debug, Clone)]
pub struct DatasetUrls {
    pub confirmed: String,
    pub deaths: String,
    pub recovered: String,
}

impl DatasetUrls {
    pub fn from_args(args: &Args) -> Self {
        Self {
            confirmed: args.confirmed_url.clone(),
            deaths: args.deaths_url.clone(),
            recovered: args.recovered_url.clone(),
        }
    }

    pub fn url(&self, dataset: Series) -> &str {
        match dataset {
            Series::Confirmed => &self.confirmed,
            Series::Deaths => &self.deaths,
            Series::Recovered => &self.recovered,
        }
    }
}

/// Plain GET per dataset, one attempt each.
pub struct HttpDatasetSource {
    http: HttpClient,
    urls: DatasetUrls,
}

impl HttpDatasetSource {
    pub fn new(urls: DatasetUrls) -> Self {
        Self { http: HttpClient::new(), urls }
    }
}

#[async_trait]
impl DatasetSource for HttpDatasetSource {
    async fn fetch(&self, dataset: Series) -> Result<String, DataUnavailable> {
        let url = self.urls.url(dataset);
        info!("Fetching {} time series from {}", dataset, url);

        let resp = self.http
            .get(url)
            .send()
            .await
            .map_err(|source| DataUnavailable::Fetch { dataset, url: url.to_string(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataUnavailable::Status { dataset, url: url.to_string(), status: status.as_u16() });
        }

        resp.text()
            .await
            .map_err(|source| DataUnavailable::Fetch { dataset, url: url.to_string(), source })
    }
}
