pub mod chart;
pub mod error;
pub mod market;

pub use chart::annotations::{AnnotationRegistry, StrikeRow};
pub use chart::controller::ChartController;
pub use chart::store::{ChartStore, ChartWatchers};
pub use chart::surface::{
    LineStyle, MarkerPosition, MarkerSpec, PointerEvent, PriceLineSpec, RenderSurface,
};
pub use error::ChartError;
pub use market::binance::{BinanceHistory, HistoryProvider};
pub use market::buffer::{MergeOutcome, SeriesBuffer};
pub use market::socket::{
    KlineSocketClient, ReconnectHandle, ReconnectPolicy, RetryDecision, SocketEvent,
};
pub use market::types::{
    Candle, ChartConfig, ChartStreamArgs, ConnectionState, Interval, StreamUpdate,
};
