use crate::market::binance::connect_kline_stream;
use crate::market::types::{parse_kline_payload, ChartConfig, Interval, StreamUpdate};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Lifecycle and data events the socket task delivers to its owner, in
/// strict arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connecting { attempt: u32 },
    Opened,
    Closed,
    Errored(String),
    Update(StreamUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketCommand {
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Bounded-retry reconnection state machine. The delay is constant, the
/// attempt count capped; the counter resets on a successful open and on an
/// explicit manual reconnect.
#[derive(Debug)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            delay,
        }
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Called on an unexpected close. Consumes one retry slot if any remain.
    pub fn on_close(&mut self) -> RetryDecision {
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            RetryDecision::RetryAfter(self.delay)
        } else {
            RetryDecision::GiveUp
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Cheap cloneable handle that requests a manual reconnect from outside the
/// socket task. Stays valid while the task lives, including after the stream
/// exhausted its retry budget and parked.
#[derive(Debug, Clone)]
pub struct ReconnectHandle {
    control_tx: mpsc::UnboundedSender<SocketCommand>,
}

impl ReconnectHandle {
    pub(crate) fn new(control_tx: mpsc::UnboundedSender<SocketCommand>) -> Self {
        Self { control_tx }
    }

    pub fn reconnect(&self) {
        let _ = self.control_tx.send(SocketCommand::Reconnect);
    }
}

/// Owns one live kline stream connection for a (symbol, interval) pair.
/// Parsing, retry scheduling, and delivery run on a spawned task; the handle
/// exposes explicit close and manual reconnect.
pub struct KlineSocketClient {
    cancel_token: CancellationToken,
    control_tx: mpsc::UnboundedSender<SocketCommand>,
    join_handle: tokio::task::JoinHandle<()>,
}

impl KlineSocketClient {
    pub fn spawn(config: &ChartConfig, event_tx: mpsc::UnboundedSender<SocketEvent>) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self::spawn_with_control(config, event_tx, control_tx, control_rx)
    }

    /// Like `spawn`, but over a caller-owned control channel, so reconnect
    /// requests can be issued through handles created before the socket
    /// existed.
    pub fn spawn_with_control(
        config: &ChartConfig,
        event_tx: mpsc::UnboundedSender<SocketEvent>,
        control_tx: mpsc::UnboundedSender<SocketCommand>,
        control_rx: mpsc::UnboundedReceiver<SocketCommand>,
    ) -> Self {
        let cancel_token = CancellationToken::new();

        let policy = ReconnectPolicy::new(
            config.max_reconnect_attempts,
            Duration::from_millis(config.reconnect_delay_ms),
        );
        let task_token = cancel_token.clone();
        let symbol = config.symbol.clone();
        let interval = config.interval;
        let join_handle = tokio::spawn(async move {
            run_kline_socket(symbol, interval, policy, event_tx, control_rx, task_token).await;
        });

        Self {
            cancel_token,
            control_tx,
            join_handle,
        }
    }

    /// Terminal. Cancels any pending scheduled retry and closes the active
    /// connection; no further reconnection attempts occur afterwards.
    pub fn close(&self) {
        self.cancel_token.cancel();
    }

    /// Tears down any active connection, resets the retry counter, and
    /// immediately attempts a fresh connection, bypassing the retry delay.
    pub fn reconnect(&self) {
        let _ = self.control_tx.send(SocketCommand::Reconnect);
    }

    pub fn reconnect_handle(&self) -> ReconnectHandle {
        ReconnectHandle::new(self.control_tx.clone())
    }

    /// Close and wait for the socket task to finish.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        let _ = self.join_handle.await;
    }
}

enum RetryWait {
    Cancelled,
    Reconnect,
    Elapsed,
}

enum ParkOutcome {
    Cancelled,
    Reconnect,
}

/// Blocks a stream that gave up its retry budget until a manual reconnect
/// arrives or the task is cancelled.
async fn wait_while_parked(
    cancel_token: &CancellationToken,
    control_rx: &mut mpsc::UnboundedReceiver<SocketCommand>,
) -> ParkOutcome {
    tokio::select! {
        _ = cancel_token.cancelled() => ParkOutcome::Cancelled,
        command = control_rx.recv() => match command {
            Some(SocketCommand::Reconnect) => ParkOutcome::Reconnect,
            None => ParkOutcome::Cancelled,
        },
    }
}

async fn wait_for_retry(
    cancel_token: &CancellationToken,
    control_rx: &mut mpsc::UnboundedReceiver<SocketCommand>,
    delay: Duration,
) -> RetryWait {
    tokio::select! {
        _ = cancel_token.cancelled() => RetryWait::Cancelled,
        command = control_rx.recv() => match command {
            Some(SocketCommand::Reconnect) => RetryWait::Reconnect,
            None => RetryWait::Cancelled,
        },
        _ = tokio::time::sleep(delay) => RetryWait::Elapsed,
    }
}

async fn run_kline_socket(
    symbol: String,
    interval: Interval,
    mut policy: ReconnectPolicy,
    event_tx: mpsc::UnboundedSender<SocketEvent>,
    mut control_rx: mpsc::UnboundedReceiver<SocketCommand>,
    cancel_token: CancellationToken,
) {
    'session: loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let _ = event_tx.send(SocketEvent::Connecting {
            attempt: policy.attempts(),
        });

        let connect_result = tokio::select! {
            _ = cancel_token.cancelled() => break,
            result = connect_kline_stream(&symbol, interval) => result,
        };

        match connect_result {
            Ok(mut stream) => {
                policy.on_open();
                let _ = event_tx.send(SocketEvent::Opened);

                loop {
                    tokio::select! {
                        _ = cancel_token.cancelled() => break 'session,
                        command = control_rx.recv() => match command {
                            Some(SocketCommand::Reconnect) => {
                                policy.reset();
                                let _ = event_tx.send(SocketEvent::Closed);
                                continue 'session;
                            }
                            None => break 'session,
                        },
                        frame = stream.next() => match frame {
                            Some(Ok(Message::Text(text_payload))) => {
                                let mut payload = text_payload.into_bytes();
                                if let Some(update) = parse_kline_payload(&mut payload) {
                                    let _ = event_tx.send(SocketEvent::Update(update));
                                }
                            }
                            Some(Ok(Message::Binary(mut payload))) => {
                                if let Some(update) = parse_kline_payload(&mut payload) {
                                    let _ = event_tx.send(SocketEvent::Update(update));
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(error)) => {
                                // Transport errors surface a status signal only;
                                // the close transition drives reconnection.
                                let _ = event_tx.send(SocketEvent::Errored(error.to_string()));
                            }
                        },
                    }
                }
            }
            Err(error) => {
                let _ = event_tx.send(SocketEvent::Errored(error.to_string()));
            }
        }

        if cancel_token.is_cancelled() {
            break;
        }

        let _ = event_tx.send(SocketEvent::Closed);

        match policy.on_close() {
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(
                    "scheduling reconnect attempt {} for {symbol} in {}ms",
                    policy.attempts(),
                    delay.as_millis()
                );
                match wait_for_retry(&cancel_token, &mut control_rx, delay).await {
                    RetryWait::Cancelled => break,
                    RetryWait::Reconnect => policy.reset(),
                    RetryWait::Elapsed => {}
                }
            }
            RetryDecision::GiveUp => {
                tracing::warn!("retry ceiling reached for {symbol}; stream parked");
                match wait_while_parked(&cancel_token, &mut control_rx).await {
                    ParkOutcome::Cancelled => break,
                    ParkOutcome::Reconnect => policy.reset(),
                }
            }
        }
    }
}
