//! Reqwest client for the Octopus v1 REST API
//!
//! The agile tariff code is derived from the product code and the
//! grid-supply-point letter resolved from the configured postcode. All
//! requests share one client with a bounded timeout so a stalled upstream
//! fails the cycle fast instead of blocking the tick driver.

use super::types::{ConsumptionReading, GridSupplyPoint, Paged, StandingCharge, UnitRate};
use super::{MeterPoint, RateSource};
use crate::config::OctopusConfig;
use crate::consumption::{ConsumptionRecord, MeterKind};
use crate::error::{AurigaError, Result};
use crate::logging::get_logger;
use crate::tariff::{DayRateTable, RatePeriod};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

/// HTTP client bound to one agile tariff region.
pub struct OctopusClient {
    http: reqwest::Client,
    base_url: String,
    product_code: String,
    tariff_code: String,
    api_key: Option<String>,
    logger: crate::logging::StructuredLogger,
}

impl OctopusClient {
    /// Build a client for the given region letter.
    pub fn new(config: &OctopusConfig, gsp: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(
                config.request_timeout_secs,
            ))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            product_code: config.product_code.clone(),
            tariff_code: format!("E-1R-{}-{}", config.product_code, gsp),
            api_key: config.api_key.clone(),
            logger: get_logger("octopus"),
        })
    }

    /// Resolve a postcode without a region-bound client (used during
    /// configuration validation).
    pub async fn resolve_region_for(config: &OctopusConfig, postcode: &str) -> Result<String> {
        let client = Self::new(config, "?")?;
        client.resolve_region(postcode).await
    }

    fn unit_rates_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/products/{}/electricity-tariffs/{}/standard-unit-rates/?period_from={}T00:00&period_to={}T23:59",
            self.base_url, self.product_code, self.tariff_code, date, date
        )
    }

    fn standing_charges_url(&self) -> String {
        format!(
            "{}/products/{}/electricity-tariffs/{}/standing-charges/",
            self.base_url, self.product_code, self.tariff_code
        )
    }

    fn consumption_url(&self, meter: &MeterPoint, from: DateTime<Utc>, to: DateTime<Utc>) -> String {
        let endpoint = match meter.kind {
            MeterKind::Electricity => "electricity-meter-points",
            MeterKind::Gas => "gas-meter-points",
        };
        format!(
            "{}/{}/{}/meters/{}/consumption/?period_from={}&period_to={}",
            self.base_url,
            endpoint,
            meter.point,
            meter.serial,
            from.format("%Y-%m-%dT%H:%M:%SZ"),
            to.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }

    fn region_url(&self, postcode: &str) -> String {
        format!(
            "{}/industry/grid-supply-points/?postcode={}",
            self.base_url, postcode
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, authenticated: bool) -> Result<T> {
        let mut request = self.http.get(url).header(ACCEPT, "application/json");
        if authenticated {
            match self.api_key.as_deref() {
                // The API key is the basic-auth username with empty password
                Some(key) if !key.trim().is_empty() => {
                    request = request.basic_auth(key.trim(), Some(""));
                }
                _ => {
                    return Err(AurigaError::config(
                        "API key required for consumption endpoints",
                    ));
                }
            }
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            self.logger
                .error(&format!("Octopus API error {} for {}", status, url));
            return Err(AurigaError::http(status.as_u16(), url.to_string()));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RateSource for OctopusClient {
    async fn fetch_rates(&self, date: NaiveDate) -> Result<DayRateTable> {
        let url = self.unit_rates_url(date);
        self.logger.debug(&format!("Fetching unit rates: {}", url));
        let page: Paged<UnitRate> = self.get_json(&url, false).await?;
        self.logger
            .debug(&format!("Got {} rate records for {}", page.count, date));
        // The API reports newest-first; the table wants ascending starts
        let mut rates = page.results;
        rates.sort_by_key(|r| r.valid_from);
        let periods = rates
            .into_iter()
            .map(|r| RatePeriod {
                valid_from: r.valid_from,
                value_inc_vat: r.value_inc_vat,
            })
            .collect();
        DayRateTable::new(date, periods)
    }

    async fn fetch_standing_charge(&self) -> Result<f64> {
        let page: Paged<StandingCharge> = self
            .get_json(&self.standing_charges_url(), false)
            .await?;
        page.results
            .first()
            .map(|c| c.value_inc_vat)
            .ok_or_else(|| AurigaError::generic("standing charge results empty"))
    }

    async fn fetch_consumption(
        &self,
        meter: &MeterPoint,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConsumptionRecord>> {
        let url = self.consumption_url(meter, from, to);
        self.logger.debug(&format!("Fetching consumption: {}", url));
        let page: Paged<ConsumptionReading> = self.get_json(&url, true).await?;
        let mut readings = page.results;
        readings.sort_by_key(|r| r.interval_start);
        Ok(readings
            .into_iter()
            .map(|r| ConsumptionRecord {
                interval_start: r.interval_start,
                quantity: r.consumption,
            })
            .collect())
    }

    async fn resolve_region(&self, postcode: &str) -> Result<String> {
        let page: Paged<GridSupplyPoint> = self.get_json(&self.region_url(postcode), false).await?;
        let Some(gsp) = page.results.first() else {
            return Err(AurigaError::validation(
                "postcode".to_string(),
                format!("no grid supply point returned for {}", postcode),
            ));
        };
        // Group ids come back in the form "_C"; the tariff code wants "C"
        let letter: String = gsp.group_id.trim_start_matches('_').to_string();
        if letter.is_empty() {
            return Err(AurigaError::validation(
                "postcode",
                "empty grid supply point group id",
            ));
        }
        Ok(letter)
    }
}
