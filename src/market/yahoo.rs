use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{MarketData, MarketError};
use crate::config::{MarketConfig, YAHOO_CHART_URL, YAHOO_SEARCH_URL};
use crate::types::{HistoricalData, PriceBar, StockInfo, StockSearchResult};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stockwatch/0.1";
const SEARCH_LIMIT: &str = "10";

/// Stateless Yahoo Finance endpoints (search + chart).
#[derive(Clone)]
pub struct YahooFinance {
    http: reqwest::Client,
    search_url: Url,
    chart_url: Url,
}

impl YahooFinance {
    pub fn new(cfg: &MarketConfig) -> Result<Self, MarketError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15));
        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        Ok(Self {
            http: builder.build()?,
            search_url: Url::parse(YAHOO_SEARCH_URL)?,
            chart_url: Url::parse(YAHOO_CHART_URL)?,
        })
    }

    /// Point the provider at other hosts (mirrors, test servers).
    pub fn with_endpoints(mut self, search_url: Url, chart_url: Url) -> Self {
        self.search_url = search_url;
        self.chart_url = chart_url;
        self
    }

    fn chart_endpoint(&self, symbol: &str) -> Result<Url, MarketError> {
        let mut url = self.chart_url.clone();
        url.path_segments_mut()
            .map_err(|_| MarketError::UrlParse(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(symbol);
        Ok(url)
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Option<ChartResult>, MarketError> {
        let resp = self
            .http
            .get(self.chart_endpoint(symbol)?)
            .query(&[("range", range), ("interval", interval)])
            .header("Accept", "application/json")
            .send()
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => return Err(MarketError::RateLimited),
            s if !s.is_success() => return Err(MarketError::UpstreamStatus(s)),
            _ => {}
        }
        let body: ChartEnvelope = resp.json().await?;
        Ok(body.chart.result.and_then(|r| r.into_iter().next()))
    }
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>, MarketError> {
        let resp = self
            .http
            .get(self.search_url.clone())
            .query(&[("q", query), ("quotesCount", SEARCH_LIMIT), ("newsCount", "0")])
            .header("Accept", "application/json")
            .send()
            .await?;
        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(MarketError::RateLimited),
            s if !s.is_success() => return Err(MarketError::UpstreamStatus(s)),
            _ => {}
        }
        let body: SearchEnvelope = resp.json().await?;
        let results: Vec<StockSearchResult> =
            body.quotes.into_iter().filter_map(SearchQuote::into_result).collect();
        debug!(query, count = results.len(), "yahoo search done");
        Ok(results)
    }

    async fn info(&self, symbol: &str) -> Result<Option<StockInfo>, MarketError> {
        let Some(chart) = self.fetch_chart(symbol, "1d", "1d").await? else {
            return Ok(None);
        };
        info!(symbol, "fetched quote snapshot");
        Ok(Some(chart.meta.into_info(symbol)))
    }

    async fn historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<HistoricalData>, MarketError> {
        let Some(chart) = self.fetch_chart(symbol, period, interval).await? else {
            return Ok(None);
        };
        let data = chart.bars();
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(HistoricalData {
            symbol: symbol.to_string(),
            period: period.to_string(),
            interval: interval.to_string(),
            data,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuote {
    symbol: Option<String>,
    #[serde(rename = "longname")]
    long_name: Option<String>,
    #[serde(rename = "shortname")]
    short_name: Option<String>,
    exch_disp: Option<String>,
    exchange: Option<String>,
    quote_type: Option<String>,
}

impl SearchQuote {
    fn into_result(self) -> Option<StockSearchResult> {
        let symbol = self.symbol?;
        Some(StockSearchResult {
            name: self.long_name.or(self.short_name).unwrap_or_else(|| symbol.clone()),
            exchange: self.exch_disp.or(self.exchange).unwrap_or_default(),
            kind: self.quote_type.unwrap_or_else(|| "EQUITY".to_string()),
            symbol,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    long_name: Option<String>,
    short_name: Option<String>,
    exchange_name: Option<String>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<u64>,
}

impl ChartMeta {
    fn into_info(self, symbol: &str) -> StockInfo {
        StockInfo {
            symbol: symbol.to_string(),
            name: self
                .long_name
                .or(self.short_name)
                .unwrap_or_else(|| "N/A".to_string()),
            exchange: self.exchange_name.unwrap_or_else(|| "NSE".to_string()),
            sector: "N/A".to_string(),
            industry: "N/A".to_string(),
            market_cap: 0.0,
            current_price: self.regular_market_price.unwrap_or_default(),
            previous_close: self
                .previous_close
                .or(self.chart_previous_close)
                .unwrap_or_default(),
            day_high: self.regular_market_day_high.unwrap_or_default(),
            day_low: self.regular_market_day_low.unwrap_or_default(),
            volume: self.regular_market_volume.unwrap_or_default(),
            average_volume: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartResult {
    /// Zip the columnar series into bars, skipping slots with no close.
    fn bars(&self) -> Vec<PriceBar> {
        let Some(q) = self.indicators.quote.first() else {
            return Vec::new();
        };
        let at = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();
        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let close = at(&q.close, i)?;
                let date = DateTime::<Utc>::from_timestamp(*ts, 0)?;
                Some(PriceBar {
                    date,
                    open: at(&q.open, i).unwrap_or(close),
                    high: at(&q.high, i).unwrap_or(close),
                    low: at(&q.low, i).unwrap_or(close),
                    close,
                    volume: q.volume.get(i).copied().flatten().unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_payload_maps_to_bars_and_info() {
        let raw = r#"{"chart":{"result":[{
            "meta":{"symbol":"TCS.NS","longName":"Tata Consultancy Services Limited",
                    "exchangeName":"NSI","regularMarketPrice":4100.5,
                    "chartPreviousClose":4050.0,"regularMarketDayHigh":4120.0,
                    "regularMarketDayLow":4010.0,"regularMarketVolume":123456},
            "timestamp":[1700000000,1700086400,1700172800],
            "indicators":{"quote":[{"open":[1.0,null,3.0],"high":[1.5,2.5,3.5],
                "low":[0.5,1.5,2.5],"close":[1.2,null,3.2],"volume":[10,20,null]}]}
        }],"error":null}}"#;
        let env: ChartEnvelope = serde_json::from_str(raw).unwrap();
        let chart = env.chart.result.unwrap().into_iter().next().unwrap();

        let bars = chart.bars();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 3.2);
        assert_eq!(bars[1].volume, 0);

        let info = chart.meta.into_info("TCS.NS");
        assert_eq!(info.name, "Tata Consultancy Services Limited");
        assert_eq!(info.previous_close, 4050.0);
        assert_eq!(info.sector, "N/A");
    }

    #[tokio::test]
    async fn chart_statuses_map_to_outcomes() {
        use axum::{Json, Router, extract::Path, http::StatusCode as AxumStatus, routing::get};

        async fn chart(Path(symbol): Path<String>) -> Result<Json<serde_json::Value>, AxumStatus> {
            match symbol.as_str() {
                "GONE.NS" => Err(AxumStatus::NOT_FOUND),
                "BUSY.NS" => Err(AxumStatus::TOO_MANY_REQUESTS),
                _ => Ok(Json(serde_json::json!({"chart": {"result": [{
                    "meta": {"shortName": symbol, "regularMarketPrice": 10.0}
                }]}}))),
            }
        }

        let app = Router::new().route("/chart/{symbol}", get(chart));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.ok() });

        let base = Url::parse(&format!("http://{addr}/")).unwrap();
        let yahoo = YahooFinance::new(&MarketConfig::default())
            .unwrap()
            .with_endpoints(base.join("search").unwrap(), base.join("chart").unwrap());

        let info = yahoo.info("TCS.NS").await.unwrap().unwrap();
        assert_eq!(info.name, "TCS.NS");
        assert_eq!(info.current_price, 10.0);
        assert!(yahoo.info("GONE.NS").await.unwrap().is_none());
        assert!(matches!(yahoo.info("BUSY.NS").await, Err(MarketError::RateLimited)));
        // a quote-only chart has no bars
        assert!(yahoo.historical("TCS.NS", "1mo", "1d").await.unwrap().is_none());
    }

    #[test]
    fn search_quote_prefers_long_name_and_display_exchange() {
        let raw = r#"{"quotes":[
            {"symbol":"INFY.NS","shortname":"INFOSYS","longname":"Infosys Limited",
             "exchange":"NSI","exchDisp":"NSE","quoteType":"EQUITY"},
            {"shortname":"no symbol"}
        ]}"#;
        let env: SearchEnvelope = serde_json::from_str(raw).unwrap();
        let results: Vec<_> = env.quotes.into_iter().filter_map(SearchQuote::into_result).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Infosys Limited");
        assert_eq!(results[0].exchange, "NSE");
    }
}
