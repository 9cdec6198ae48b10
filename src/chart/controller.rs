use crate::chart::annotations::{AnnotationRegistry, StrikeRow};
use crate::chart::store::{ChartStore, ChartWatchers};
use crate::chart::surface::{MarkerSpec, PointerEvent, PriceLineSpec, RenderSurface};
use crate::error::ChartError;
use crate::market::binance::HistoryProvider;
use crate::market::buffer::{MergeOutcome, SeriesBuffer};
use crate::market::socket::{KlineSocketClient, ReconnectHandle, SocketCommand, SocketEvent};
use crate::market::types::{ChartConfig, ConnectionState, StreamUpdate, STRIKE_AXIS_PROXIMITY_PX};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Composition root for one mounted chart: wires the backfill into the
/// series buffer, splices stream updates onto it, keeps the rendering
/// surface in step, and relays pointer gestures to the annotation registry.
/// Every owned resource is exclusive to this instance and torn down with it.
pub struct ChartController<S: RenderSurface, H: HistoryProvider> {
    surface: S,
    history: H,
    config: ChartConfig,
    buffer: SeriesBuffer,
    registry: AnnotationRegistry,
    store: ChartStore,
    cancel_token: CancellationToken,
    crosshair_price: Option<f64>,
    socket: Option<KlineSocketClient>,
    socket_rx: Option<mpsc::UnboundedReceiver<SocketEvent>>,
    socket_control_tx: mpsc::UnboundedSender<SocketCommand>,
    socket_control_rx: Option<mpsc::UnboundedReceiver<SocketCommand>>,
}

impl<S: RenderSurface, H: HistoryProvider> ChartController<S, H> {
    pub fn new(surface: S, history: H, config: ChartConfig) -> (Self, ChartWatchers) {
        let (store, watchers) = ChartStore::new();
        let buffer = SeriesBuffer::new(config.max_candles);
        // The socket control channel is controller-owned so reconnect handles
        // created before the stream opened (or before `run` consumed the
        // controller) stay usable for the lifetime of the chart.
        let (socket_control_tx, socket_control_rx) = mpsc::unbounded_channel();

        (
            Self {
                surface,
                history,
                config,
                buffer,
                registry: AnnotationRegistry::new(),
                store,
                cancel_token: CancellationToken::new(),
                crosshair_price: None,
                socket: None,
                socket_rx: None,
                socket_control_tx,
                socket_control_rx: Some(socket_control_rx),
            },
            watchers,
        )
    }

    /// Token the embedding layer can cancel to tear the chart down, including
    /// a backfill still in flight.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// One backfill call: seed the buffer, paint the full series, record the
    /// last known bar. A response arriving after teardown is ignored; a
    /// backfill failure is surfaced to the caller without retry.
    pub async fn bootstrap(&mut self) -> Result<(), ChartError> {
        let result = self
            .history
            .fetch_history(
                &self.config.symbol,
                self.config.interval,
                self.config.history_limit,
            )
            .await;

        if self.cancel_token.is_cancelled() {
            return Ok(());
        }

        let candles = match result {
            Ok(candles) => candles,
            Err(error) => {
                self.store.set_last_error(Some(error.to_string()));
                self.store.set_status(ConnectionState::Errored);
                return Err(error);
            }
        };

        self.buffer.seed(candles);
        self.surface.set_series(self.buffer.as_slice());
        self.store.set_last_bar(self.buffer.last().copied());
        Ok(())
    }

    fn spawn_socket(&mut self) -> mpsc::UnboundedReceiver<SocketEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let control_rx = match self.socket_control_rx.take() {
            Some(control_rx) => control_rx,
            // The previous receiver went down with a torn-down socket; start a
            // fresh channel (earlier handles are dead along with that chart
            // session).
            None => {
                let (control_tx, control_rx) = mpsc::unbounded_channel();
                self.socket_control_tx = control_tx;
                control_rx
            }
        };
        self.socket = Some(KlineSocketClient::spawn_with_control(
            &self.config,
            event_tx,
            self.socket_control_tx.clone(),
            control_rx,
        ));
        event_rx
    }

    /// Open the stream client ahead of `run`. Safe to skip; `run` opens one
    /// if none exists.
    pub fn start_stream(&mut self) {
        if self.socket.is_none() {
            let event_rx = self.spawn_socket();
            self.socket_rx = Some(event_rx);
        }
    }

    /// Event loop: drains socket and pointer events one at a time until
    /// cancelled or either source ends, then tears down. Consumes the
    /// controller; keep a [`reconnect_handle`](Self::reconnect_handle) and the
    /// cancellation token around for external control.
    pub async fn run(mut self, mut pointer_rx: mpsc::UnboundedReceiver<PointerEvent>) {
        let mut socket_rx = match self.socket_rx.take() {
            Some(event_rx) => event_rx,
            None => self.spawn_socket(),
        };

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                event = socket_rx.recv() => match event {
                    Some(event) => self.handle_socket_event(event),
                    None => break,
                },
                event = pointer_rx.recv() => match event {
                    Some(event) => self.handle_pointer(event),
                    None => break,
                },
            }
        }

        self.teardown();
    }

    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connecting { attempt: 0 } => {
                self.store.set_status(ConnectionState::Connecting);
            }
            SocketEvent::Connecting { .. } => {
                self.store.set_status(ConnectionState::Reconnecting);
            }
            SocketEvent::Opened => {
                self.store.set_status(ConnectionState::Connected);
                // A live connection invalidates whatever error a failed
                // attempt left behind.
                self.store.set_last_error(None);
            }
            SocketEvent::Closed => {
                self.store.set_status(ConnectionState::Idle);
            }
            SocketEvent::Errored(reason) => {
                self.store.set_status(ConnectionState::Errored);
                self.store.set_last_error(Some(reason));
            }
            SocketEvent::Update(update) => self.apply_update(update),
        }
    }

    fn apply_update(&mut self, update: StreamUpdate) {
        let was_full = self.buffer.len() == self.config.max_candles;

        match self.buffer.merge_update(&update) {
            MergeOutcome::Appended => {
                // Appending at capacity dropped the oldest bar, so the
                // surface needs the full window again.
                if was_full {
                    self.surface.set_series(self.buffer.as_slice());
                } else {
                    self.surface.append(update.candle);
                }
            }
            MergeOutcome::Replaced => {
                self.surface.update_last(update.candle);
            }
            MergeOutcome::Stale | MergeOutcome::Empty => return,
        }

        self.store.set_last_bar(self.buffer.last().copied());
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Click { x, y } => self.handle_click(x, y),
            PointerEvent::Move { point } => {
                self.crosshair_price =
                    point.and_then(|(_, y)| self.surface.coordinate_to_price(y));
            }
            PointerEvent::SecondaryClick => {
                if let Some(target_price) = self.crosshair_price {
                    if self.registry.remove_strikes_near(&mut self.surface, target_price) {
                        self.store.set_strikes(self.registry.strikes().to_vec());
                    }
                }
            }
            PointerEvent::Resize { width, height } => {
                self.surface.apply_size(width, height);
            }
        }
    }

    fn handle_click(&mut self, x: f64, y: f64) {
        if !self.near_price_axis(x) {
            return;
        }
        let Some(pointer_price) = self.surface.coordinate_to_price(y) else {
            return;
        };

        self.registry.add_strike(&mut self.surface, pointer_price);
        self.store.set_strikes(self.registry.strikes().to_vec());
    }

    /// Strike placement is an edge gesture: only clicks inside the proximity
    /// band next to the price axis count. A surface without layout yet (zero
    /// widths) accepts the click, matching the permissive fallback of the
    /// pointer-to-price path.
    fn near_price_axis(&self, x: f64) -> bool {
        let axis_width = self.surface.price_axis_width();
        let width = self.surface.width();
        if axis_width <= 0.0 || width <= 0.0 {
            return true;
        }
        let pane_right = (width - axis_width).max(0.0);
        x >= pane_right - STRIKE_AXIS_PROXIMITY_PX
    }

    pub fn add_price_line(&mut self, line: PriceLineSpec) {
        self.registry.add_price_line(&mut self.surface, line);
    }

    pub fn remove_price_line(&mut self, id: &str) {
        self.registry.remove_price_line(&mut self.surface, id);
    }

    pub fn add_or_update_marker(&mut self, marker: MarkerSpec) {
        self.registry.add_or_update_marker(&mut self.surface, marker);
    }

    pub fn remove_marker(&mut self, id: &str) {
        self.registry.remove_marker(&mut self.surface, id);
    }

    pub fn price_to_coordinate(&self, price: f64) -> Option<f64> {
        self.registry.price_to_coordinate(&self.surface, price)
    }

    pub fn strike_rows(&self) -> Vec<StrikeRow> {
        self.registry.strike_rows(&self.surface)
    }

    pub fn strikes(&self) -> &[f64] {
        self.registry.strikes()
    }

    /// Requests a fresh connection, resetting the retry budget; recovers a
    /// stream that gave up after exhausting its scheduled attempts. Queued if
    /// the socket has not been spawned yet.
    pub fn manual_reconnect(&self) {
        let _ = self.socket_control_tx.send(SocketCommand::Reconnect);
    }

    /// Cloneable handle for manual reconnects; obtain one before handing the
    /// controller to [`run`](Self::run), it stays valid for the chart's
    /// lifetime.
    pub fn reconnect_handle(&self) -> ReconnectHandle {
        ReconnectHandle::new(self.socket_control_tx.clone())
    }

    /// Close the stream, detach every registry-owned artifact from the
    /// surface, and discard the buffer and published state.
    pub fn teardown(&mut self) {
        self.cancel_token.cancel();
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
        self.socket_rx = None;
        self.registry.clear(&mut self.surface);
        self.buffer.clear();
        self.crosshair_price = None;
        self.store.reset();
    }
}
