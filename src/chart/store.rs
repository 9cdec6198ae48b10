use crate::market::types::{Candle, ConnectionState};
use tokio::sync::watch;

/// Observable outputs of one mounted chart: connection status, last error
/// string, last known bar, and the current strike list. Each is pushed on
/// change over a watch channel; the presentation layer holds the receivers.
#[derive(Debug)]
pub struct ChartStore {
    status_tx: watch::Sender<ConnectionState>,
    last_error_tx: watch::Sender<Option<String>>,
    last_bar_tx: watch::Sender<Option<Candle>>,
    strikes_tx: watch::Sender<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct ChartWatchers {
    pub status: watch::Receiver<ConnectionState>,
    pub last_error: watch::Receiver<Option<String>>,
    pub last_bar: watch::Receiver<Option<Candle>>,
    pub strikes: watch::Receiver<Vec<f64>>,
}

impl ChartStore {
    pub fn new() -> (Self, ChartWatchers) {
        let (status_tx, status) = watch::channel(ConnectionState::Idle);
        let (last_error_tx, last_error) = watch::channel(None);
        let (last_bar_tx, last_bar) = watch::channel(None);
        let (strikes_tx, strikes) = watch::channel(Vec::new());

        (
            Self {
                status_tx,
                last_error_tx,
                last_bar_tx,
                strikes_tx,
            },
            ChartWatchers {
                status,
                last_error,
                last_bar,
                strikes,
            },
        )
    }

    pub fn set_status(&self, status: ConnectionState) {
        self.status_tx.send_replace(status);
    }

    pub fn set_last_error(&self, error: Option<String>) {
        self.last_error_tx.send_replace(error);
    }

    pub fn set_last_bar(&self, bar: Option<Candle>) {
        self.last_bar_tx.send_replace(bar);
    }

    pub fn set_strikes(&self, strikes: Vec<f64>) {
        self.strikes_tx.send_replace(strikes);
    }

    pub fn status(&self) -> ConnectionState {
        *self.status_tx.borrow()
    }

    pub fn reset(&self) {
        self.status_tx.send_replace(ConnectionState::Idle);
        self.last_error_tx.send_replace(None);
        self.last_bar_tx.send_replace(None);
        self.strikes_tx.send_replace(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_values_to_watchers_on_change() {
        let (store, watchers) = ChartStore::new();

        store.set_status(ConnectionState::Connected);
        store.set_strikes(vec![50_000.0]);
        store.set_last_bar(Some(Candle {
            time: 100,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
        }));

        assert_eq!(*watchers.status.borrow(), ConnectionState::Connected);
        assert_eq!(*watchers.strikes.borrow(), vec![50_000.0]);
        assert_eq!(watchers.last_bar.borrow().unwrap().time, 100);
    }

    #[test]
    fn reset_restores_initial_state() {
        let (store, watchers) = ChartStore::new();

        store.set_status(ConnectionState::Errored);
        store.set_last_error(Some("socket error".to_string()));
        store.reset();

        assert_eq!(*watchers.status.borrow(), ConnectionState::Idle);
        assert!(watchers.last_error.borrow().is_none());
    }
}
