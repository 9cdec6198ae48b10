use crate::error::ChartError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_INTERVAL: Interval = Interval::M1;
pub const MAX_CANDLES: usize = 500;
pub const WS_RECONNECT_DELAY_MS: u64 = 3_000;
pub const WS_RECONNECT_MAX_ATTEMPTS: u32 = 10;
pub const MIN_HISTORY_LIMIT: u16 = 10;
pub const MAX_HISTORY_LIMIT: u16 = 1_000;
pub const MIN_RECONNECT_DELAY_MS: u64 = 100;
pub const MAX_RECONNECT_DELAY_MS: u64 = 60_000;

/// Pixel band next to the price axis within which a click counts as a
/// strike-placement gesture rather than an ordinary chart interaction.
pub const STRIKE_AXIS_PROXIMITY_PX: f64 = 40.0;
/// Pointer-derived prices are not bit-exact to stored strike prices, so
/// removal matches within this band.
pub const STRIKE_PRICE_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Errored,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }
}

/// One OHLC bar keyed by its open time in whole seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// A streamed mutation of the bar at `candle.time`. `closed = false` is an
/// in-progress bar still accumulating trades; `closed = true` is its final
/// state and the last update the stream sends for that bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamUpdate {
    pub candle: Candle,
    pub closed: bool,
}

#[derive(Debug, Deserialize)]
pub struct KlineEnvelopeWire {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: KlineWire,
}

#[derive(Debug, Deserialize)]
pub struct KlineWire {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "x")]
    pub is_closed: bool,
}

impl TryFrom<KlineEnvelopeWire> for StreamUpdate {
    type Error = ChartError;

    fn try_from(value: KlineEnvelopeWire) -> Result<Self, Self::Error> {
        if value.event_type != "kline" {
            return Err(ChartError::InvalidArgument(format!(
                "unexpected event type '{}' for kline stream",
                value.event_type
            )));
        }

        let open = value.kline.open.parse::<f64>()?;
        let high = value.kline.high.parse::<f64>()?;
        let low = value.kline.low.parse::<f64>()?;
        let close = value.kline.close.parse::<f64>()?;
        let volume = value.kline.volume.parse::<f64>()?;

        if !open.is_finite()
            || !high.is_finite()
            || !low.is_finite()
            || !close.is_finite()
            || !volume.is_finite()
        {
            return Err(ChartError::InvalidArgument(
                "kline values must be finite".to_string(),
            ));
        }

        Ok(Self {
            candle: Candle {
                time: value.kline.open_time / 1_000,
                open,
                high,
                low,
                close,
            },
            closed: value.kline.is_closed,
        })
    }
}

/// Total decode of an inbound stream frame. `None` is the drop signal for
/// malformed or unrecognized payloads; the merge pipeline never sees them.
pub fn parse_kline_payload(payload: &mut [u8]) -> Option<StreamUpdate> {
    let wire: KlineEnvelopeWire = match simd_json::serde::from_slice(payload) {
        Ok(wire) => wire,
        Err(error) => {
            tracing::debug!("dropping undecodable stream payload: {error}");
            return None;
        }
    };
    match StreamUpdate::try_from(wire) {
        Ok(update) => Some(update),
        Err(error) => {
            tracing::debug!("dropping invalid kline payload: {error}");
            None
        }
    }
}

/// Binance REST kline row: 12-column array, string-encoded prices.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct RestKlineWire(
    pub i64,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub i64,
    pub String,
    pub u64,
    pub String,
    pub String,
    pub String,
);

impl TryFrom<RestKlineWire> for Candle {
    type Error = ChartError;

    fn try_from(value: RestKlineWire) -> Result<Self, Self::Error> {
        let open = value.1.parse::<f64>()?;
        let high = value.2.parse::<f64>()?;
        let low = value.3.parse::<f64>()?;
        let close = value.4.parse::<f64>()?;
        let volume = value.5.parse::<f64>()?;

        if !open.is_finite()
            || !high.is_finite()
            || !low.is_finite()
            || !close.is_finite()
            || !volume.is_finite()
        {
            return Err(ChartError::InvalidArgument(
                "kline values must be finite".to_string(),
            ));
        }

        Ok(Self {
            time: value.0 / 1_000,
            open,
            high,
            low,
            close,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartStreamArgs {
    pub symbol: Option<String>,
    pub interval: Option<Interval>,
    pub history_limit: Option<u16>,
    pub max_candles: Option<usize>,
    pub reconnect_delay_ms: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub symbol: String,
    pub interval: Interval,
    pub history_limit: u16,
    pub max_candles: usize,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl ChartStreamArgs {
    pub fn normalize(self) -> Result<ChartConfig, ChartError> {
        let symbol = self
            .symbol
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string())
            .trim()
            .to_ascii_uppercase();

        if symbol.is_empty() || !symbol.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(ChartError::InvalidArgument(
                "symbol must be non-empty alphanumeric ASCII".to_string(),
            ));
        }

        let interval = self.interval.unwrap_or(DEFAULT_INTERVAL);

        let history_limit = self.history_limit.unwrap_or(MAX_CANDLES as u16);
        if !(MIN_HISTORY_LIMIT..=MAX_HISTORY_LIMIT).contains(&history_limit) {
            return Err(ChartError::InvalidArgument(format!(
                "historyLimit must be between {MIN_HISTORY_LIMIT} and {MAX_HISTORY_LIMIT}"
            )));
        }

        let max_candles = self.max_candles.unwrap_or(MAX_CANDLES);
        if max_candles == 0 {
            return Err(ChartError::InvalidArgument(
                "maxCandles must be positive".to_string(),
            ));
        }

        let reconnect_delay_ms = self.reconnect_delay_ms.unwrap_or(WS_RECONNECT_DELAY_MS);
        if !(MIN_RECONNECT_DELAY_MS..=MAX_RECONNECT_DELAY_MS).contains(&reconnect_delay_ms) {
            return Err(ChartError::InvalidArgument(format!(
                "reconnectDelayMs must be between {MIN_RECONNECT_DELAY_MS} and {MAX_RECONNECT_DELAY_MS}"
            )));
        }

        let max_reconnect_attempts = self
            .max_reconnect_attempts
            .unwrap_or(WS_RECONNECT_MAX_ATTEMPTS);

        Ok(ChartConfig {
            symbol,
            interval,
            history_limit,
            max_candles,
            reconnect_delay_ms,
            max_reconnect_attempts,
        })
    }
}
