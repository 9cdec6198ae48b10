use crate::error::ChartError;
use crate::market::types::{Candle, Interval, RestKlineWire};
use reqwest::Client;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

const BINANCE_STREAM_BASE_URL: &str = "wss://fstream.binance.com";
const BINANCE_REST_BASE_URL: &str = "https://fapi.binance.com";

pub type KlineWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn ws_endpoint(symbol: &str, interval: Interval) -> String {
    format!(
        "{BINANCE_STREAM_BASE_URL}/ws/{}@kline_{}",
        symbol.to_ascii_lowercase(),
        interval.as_str()
    )
}

fn klines_endpoint(base_url: &str, symbol: &str, interval: Interval, limit: u16) -> String {
    format!(
        "{base_url}/fapi/v1/klines?symbol={}&interval={}&limit={limit}",
        symbol.to_ascii_uppercase(),
        interval.as_str()
    )
}

pub async fn connect_kline_stream(
    symbol: &str,
    interval: Interval,
) -> Result<KlineWsStream, ChartError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(64 << 20),
        max_frame_size: Some(16 << 20),
        ..Default::default()
    };

    let request = ws_endpoint(symbol, interval);
    let (stream, _) = connect_async_with_config(request, Some(ws_config), true).await?;
    Ok(stream)
}

/// Historical backfill collaborator. One call per bootstrap; retry policy, if
/// any, belongs to the caller.
pub trait HistoryProvider {
    fn fetch_history(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u16,
    ) -> impl std::future::Future<Output = Result<Vec<Candle>, ChartError>> + Send;
}

/// Backfill over the Binance futures klines endpoint. Constructed explicitly
/// and passed into the controller rather than shared as a module singleton.
#[derive(Debug, Clone)]
pub struct BinanceHistory {
    client: Client,
    base_url: String,
}

impl BinanceHistory {
    pub fn new() -> Self {
        Self::with_base_url(BINANCE_REST_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

impl Default for BinanceHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryProvider for BinanceHistory {
    async fn fetch_history(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u16,
    ) -> Result<Vec<Candle>, ChartError> {
        let endpoint = klines_endpoint(&self.base_url, symbol, interval, limit);
        let response = self.client.get(endpoint).send().await?.error_for_status()?;
        let payload = response.json::<Vec<RestKlineWire>>().await?;

        let mut candles = Vec::with_capacity(payload.len());
        for row in payload {
            candles.push(row.try_into()?);
        }
        Ok(candles)
    }
}
