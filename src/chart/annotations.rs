use crate::chart::surface::{LineStyle, MarkerSpec, PriceLineSpec, RenderSurface};
use crate::market::types::STRIKE_PRICE_TOLERANCE;
use std::collections::HashMap;

const STRIKE_LINE_COLOR: &str = "#3b82f6";

/// A strike projected onto the surface's current price scale, consumed by
/// overlay renderers (premium readouts and the like).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeRow {
    pub price: f64,
    pub y: f64,
}

/// Owns every price line, marker, and strike attached to the rendering
/// surface. The surface itself is owned by the controller and passed in per
/// call, so the registry carries no shared interior mutability.
#[derive(Debug, Default)]
pub struct AnnotationRegistry {
    price_lines: HashMap<String, PriceLineSpec>,
    markers: HashMap<String, MarkerSpec>,
    strikes: Vec<f64>,
    strike_seq: u64,
}

impl AnnotationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent per id; reusing an id replaces the existing line.
    pub fn add_price_line<S: RenderSurface>(&mut self, surface: &mut S, line: PriceLineSpec) {
        if self.price_lines.contains_key(&line.id) {
            surface.remove_price_line(&line.id);
        }
        surface.create_price_line(&line);
        self.price_lines.insert(line.id.clone(), line);
    }

    /// No-op when the id is already absent.
    pub fn remove_price_line<S: RenderSurface>(&mut self, surface: &mut S, id: &str) {
        if self.price_lines.remove(id).is_some() {
            surface.remove_price_line(id);
        }
    }

    /// Derives a strike from a pointer-derived price: rounds to two decimals,
    /// creates the backing line labeled with the rounded integer price, and
    /// appends it to the strike list. Returns the stored strike price.
    pub fn add_strike<S: RenderSurface>(&mut self, surface: &mut S, pointer_price: f64) -> f64 {
        let strike = (pointer_price * 100.0).round() / 100.0;
        self.strike_seq += 1;
        let id = format!("strike-{}", self.strike_seq);

        self.add_price_line(
            surface,
            PriceLineSpec {
                id,
                price: strike,
                color: STRIKE_LINE_COLOR.to_string(),
                line_width: 1,
                style: LineStyle::Solid,
                title: format!("{}", strike.round() as i64),
            },
        );
        self.strikes.push(strike);
        strike
    }

    /// Removes every strike, and every price line, whose stored price lies
    /// within the tolerance band of `target_price` (remove-all policy).
    /// Returns whether anything changed.
    pub fn remove_strikes_near<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        target_price: f64,
    ) -> bool {
        let matched: Vec<String> = self
            .price_lines
            .iter()
            .filter(|(_, line)| (line.price - target_price).abs() <= STRIKE_PRICE_TOLERANCE)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &matched {
            self.price_lines.remove(id);
            surface.remove_price_line(id);
        }

        let strikes_before = self.strikes.len();
        self.strikes
            .retain(|price| (price - target_price).abs() > STRIKE_PRICE_TOLERANCE);

        !matched.is_empty() || self.strikes.len() != strikes_before
    }

    pub fn add_or_update_marker<S: RenderSurface>(&mut self, surface: &mut S, marker: MarkerSpec) {
        let marker = if marker.position.is_at_price() {
            marker
        } else {
            MarkerSpec {
                price: None,
                ..marker
            }
        };
        self.markers.insert(marker.id.clone(), marker);
        self.push_markers(surface);
    }

    pub fn remove_marker<S: RenderSurface>(&mut self, surface: &mut S, id: &str) {
        self.markers.remove(id);
        self.push_markers(surface);
    }

    /// Replace-all: the full current marker set, ordered by bar time, is
    /// pushed on every mutation.
    fn push_markers<S: RenderSurface>(&self, surface: &mut S) {
        let mut markers: Vec<MarkerSpec> = self.markers.values().cloned().collect();
        markers.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        surface.set_markers(&markers);
    }

    pub fn price_to_coordinate<S: RenderSurface>(&self, surface: &S, price: f64) -> Option<f64> {
        surface.price_to_coordinate(price)
    }

    /// Current screen position of every strike that resolves on the price
    /// scale, in placement order.
    pub fn strike_rows<S: RenderSurface>(&self, surface: &S) -> Vec<StrikeRow> {
        self.strikes
            .iter()
            .filter_map(|&price| {
                surface
                    .price_to_coordinate(price)
                    .map(|y| StrikeRow { price, y })
            })
            .collect()
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn price_line_count(&self) -> usize {
        self.price_lines.len()
    }

    /// Teardown: removes every registry-owned artifact from the surface and
    /// discards all local state.
    pub fn clear<S: RenderSurface>(&mut self, surface: &mut S) {
        for id in self.price_lines.keys() {
            surface.remove_price_line(id);
        }
        self.price_lines.clear();
        self.markers.clear();
        surface.set_markers(&[]);
        self.strikes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::surface::testing::RecordingSurface;
    use crate::chart::surface::MarkerPosition;

    fn marker(id: &str, time: i64, position: MarkerPosition) -> MarkerSpec {
        MarkerSpec {
            id: id.to_string(),
            time,
            price: Some(50.0),
            text: "entry".to_string(),
            color: "#3b82f6".to_string(),
            position,
        }
    }

    #[test]
    fn add_price_line_is_idempotent_per_id() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        registry.add_price_line(&mut surface, PriceLineSpec::new("sl", 95.0));
        registry.add_price_line(&mut surface, PriceLineSpec::new("sl", 97.5));

        assert_eq!(registry.price_line_count(), 1);
        assert_eq!(surface.price_lines.len(), 1);
        assert_eq!(surface.price_lines[0].price, 97.5);
    }

    #[test]
    fn remove_price_line_of_absent_id_is_a_no_op() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        registry.remove_price_line(&mut surface, "missing");
        assert_eq!(registry.price_line_count(), 0);
    }

    #[test]
    fn add_strike_rounds_and_labels_with_integer_price() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        let strike = registry.add_strike(&mut surface, 50_000.004_9);
        assert_eq!(strike, 50_000.0);
        assert_eq!(registry.strikes(), &[50_000.0]);
        assert_eq!(surface.price_lines.len(), 1);
        assert_eq!(surface.price_lines[0].title, "50000");
        assert_eq!(surface.price_lines[0].color, "#3b82f6");
    }

    #[test]
    fn strike_ids_stay_unique_across_placements() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        registry.add_strike(&mut surface, 50_000.0);
        registry.add_strike(&mut surface, 50_010.0);
        assert_eq!(registry.price_line_count(), 2);
        assert_eq!(registry.strikes(), &[50_000.0, 50_010.0]);
    }

    #[test]
    fn removes_strike_within_tolerance_of_crosshair_price() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        let strike = registry.add_strike(&mut surface, 50_000.0);
        assert_eq!(strike, 50_000.0);

        let changed = registry.remove_strikes_near(&mut surface, 50_000.3);
        assert!(changed);
        assert!(registry.strikes().is_empty());
        assert_eq!(registry.price_line_count(), 0);
        assert!(surface.price_lines.is_empty());
    }

    #[test]
    fn leaves_strikes_outside_tolerance_untouched() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        registry.add_strike(&mut surface, 50_000.0);
        let changed = registry.remove_strikes_near(&mut surface, 50_001.0);

        assert!(!changed);
        assert_eq!(registry.strikes(), &[50_000.0]);
        assert_eq!(surface.price_lines.len(), 1);
    }

    #[test]
    fn remove_all_policy_clears_clustered_strikes() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        registry.add_strike(&mut surface, 50_000.0);
        registry.add_strike(&mut surface, 50_000.4);
        registry.add_strike(&mut surface, 50_002.0);

        let changed = registry.remove_strikes_near(&mut surface, 50_000.2);
        assert!(changed);
        assert_eq!(registry.strikes(), &[50_002.0]);
        assert_eq!(registry.price_line_count(), 1);
    }

    #[test]
    fn marker_mutations_push_the_full_set_each_time() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        registry.add_or_update_marker(&mut surface, marker("b", 200, MarkerPosition::AboveBar));
        registry.add_or_update_marker(&mut surface, marker("a", 100, MarkerPosition::AtPriceTop));
        assert_eq!(surface.marker_pushes, 2);
        assert_eq!(surface.markers.len(), 2);
        // Ordered by time for the surface.
        assert_eq!(surface.markers[0].id, "a");
        // At-price markers keep their price, bar-relative ones drop it.
        assert_eq!(surface.markers[0].price, Some(50.0));
        assert_eq!(surface.markers[1].price, None);

        registry.remove_marker(&mut surface, "b");
        assert_eq!(surface.marker_pushes, 3);
        assert_eq!(surface.markers.len(), 1);
    }

    #[test]
    fn strike_rows_project_onto_the_current_scale() {
        let mut surface = RecordingSurface::default();
        surface.top_price = 50_100.0;
        let mut registry = AnnotationRegistry::new();

        registry.add_strike(&mut surface, 50_000.0);
        let rows = registry.strike_rows(&surface);
        assert_eq!(rows, vec![StrikeRow {
            price: 50_000.0,
            y: 100.0,
        }]);

        surface.laid_out = false;
        assert!(registry.strike_rows(&surface).is_empty());
        assert!(registry.price_to_coordinate(&surface, 50_000.0).is_none());
    }

    #[test]
    fn clear_detaches_every_registry_owned_artifact() {
        let mut surface = RecordingSurface::default();
        let mut registry = AnnotationRegistry::new();

        registry.add_strike(&mut surface, 50_000.0);
        registry.add_price_line(&mut surface, PriceLineSpec::new("tp", 51_000.0));
        registry.add_or_update_marker(&mut surface, marker("m", 100, MarkerPosition::BelowBar));

        registry.clear(&mut surface);
        assert!(surface.price_lines.is_empty());
        assert!(surface.markers.is_empty());
        assert!(registry.strikes().is_empty());
        assert_eq!(registry.price_line_count(), 0);
    }
}
