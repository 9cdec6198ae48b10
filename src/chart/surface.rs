use crate::market::types::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dotted,
    Dashed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceLineSpec {
    pub id: String,
    pub price: f64,
    pub color: String,
    pub line_width: u8,
    pub style: LineStyle,
    pub title: String,
}

impl PriceLineSpec {
    pub fn new(id: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            price,
            color: "#2563eb".to_string(),
            line_width: 1,
            style: LineStyle::Solid,
            title: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MarkerPosition {
    AboveBar,
    BelowBar,
    InBar,
    AtPriceTop,
    AtPriceBottom,
    AtPriceMiddle,
}

impl MarkerPosition {
    /// At-price positions anchor to an explicit price; the bar-relative ones
    /// ignore it.
    pub fn is_at_price(self) -> bool {
        matches!(
            self,
            Self::AtPriceTop | Self::AtPriceBottom | Self::AtPriceMiddle
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkerSpec {
    pub id: String,
    pub time: i64,
    pub price: Option<f64>,
    pub text: String,
    pub color: String,
    pub position: MarkerPosition,
}

/// Pointer and layout events the rendering surface emits. Coordinates are in
/// surface pixels; `Move` carries `None` when the pointer leaves the pane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Click { x: f64, y: f64 },
    SecondaryClick,
    Move { point: Option<(f64, f64)> },
    Resize { width: f64, height: f64 },
}

/// The rendering surface as the chart core sees it: series mutation, price
/// line and marker primitives, and the current price-scale mapping. All calls
/// are assumed reliable and synchronous.
pub trait RenderSurface {
    fn set_series(&mut self, candles: &[Candle]);
    fn update_last(&mut self, candle: Candle);
    fn append(&mut self, candle: Candle);
    fn create_price_line(&mut self, line: &PriceLineSpec);
    fn remove_price_line(&mut self, id: &str);
    fn set_markers(&mut self, markers: &[MarkerSpec]);
    /// `None` when the surface cannot currently resolve a coordinate (e.g.
    /// not yet laid out).
    fn price_to_coordinate(&self, price: f64) -> Option<f64>;
    fn coordinate_to_price(&self, y: f64) -> Option<f64>;
    fn width(&self) -> f64;
    fn price_axis_width(&self) -> f64;
    fn apply_size(&mut self, width: f64, height: f64);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every primitive call and models the price scale as the linear
    /// map `y = top_price - price`.
    pub struct RecordingSurface {
        pub series: Vec<Candle>,
        pub set_series_calls: usize,
        pub appended: Vec<Candle>,
        pub updated: Vec<Candle>,
        pub price_lines: Vec<PriceLineSpec>,
        pub markers: Vec<MarkerSpec>,
        pub marker_pushes: usize,
        pub width: f64,
        pub height: f64,
        pub axis_width: f64,
        pub top_price: f64,
        pub laid_out: bool,
    }

    impl Default for RecordingSurface {
        fn default() -> Self {
            Self {
                series: Vec::new(),
                set_series_calls: 0,
                appended: Vec::new(),
                updated: Vec::new(),
                price_lines: Vec::new(),
                markers: Vec::new(),
                marker_pushes: 0,
                width: 800.0,
                height: 600.0,
                axis_width: 60.0,
                top_price: 100_000.0,
                laid_out: true,
            }
        }
    }

    impl RenderSurface for RecordingSurface {
        fn set_series(&mut self, candles: &[Candle]) {
            self.series = candles.to_vec();
            self.set_series_calls += 1;
        }

        fn update_last(&mut self, candle: Candle) {
            self.updated.push(candle);
            if let Some(last) = self.series.last_mut() {
                *last = candle;
            }
        }

        fn append(&mut self, candle: Candle) {
            self.appended.push(candle);
            self.series.push(candle);
        }

        fn create_price_line(&mut self, line: &PriceLineSpec) {
            self.price_lines.push(line.clone());
        }

        fn remove_price_line(&mut self, id: &str) {
            self.price_lines.retain(|line| line.id != id);
        }

        fn set_markers(&mut self, markers: &[MarkerSpec]) {
            self.markers = markers.to_vec();
            self.marker_pushes += 1;
        }

        fn price_to_coordinate(&self, price: f64) -> Option<f64> {
            self.laid_out.then(|| self.top_price - price)
        }

        fn coordinate_to_price(&self, y: f64) -> Option<f64> {
            self.laid_out.then(|| self.top_price - y)
        }

        fn width(&self) -> f64 {
            self.width
        }

        fn price_axis_width(&self) -> f64 {
            self.axis_width
        }

        fn apply_size(&mut self, width: f64, height: f64) {
            self.width = width;
            self.height = height;
        }
    }
}
