use crate::market::types::{Candle, StreamUpdate};

/// What `merge_update` did with an inbound stream update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Update opened a new bar; it was appended (and the oldest entry dropped
    /// if the buffer was at capacity).
    Appended,
    /// Update targeted the current last bar; its OHLC was replaced in place.
    Replaced,
    /// Update's bar time precedes the last bar; late delivery, discarded.
    Stale,
    /// Buffer has no backfilled history yet; nothing to merge onto.
    Empty,
}

/// Ordered, time-indexed OHLC window capped at `max_len` entries. Invariants:
/// bar times strictly increase, no duplicate times, only the oldest entries
/// are ever dropped.
#[derive(Debug)]
pub struct SeriesBuffer {
    candles: Vec<Candle>,
    max_len: usize,
}

impl SeriesBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            candles: Vec::with_capacity(max_len.min(4_096)),
            max_len,
        }
    }

    /// Wholesale replace. Keeps only the most recent `max_len` entries when
    /// the input is longer, preserving relative order.
    pub fn seed(&mut self, mut candles: Vec<Candle>) {
        if candles.len() > self.max_len {
            let overflow = candles.len() - self.max_len;
            candles.drain(0..overflow);
        }
        self.candles = candles;
    }

    /// Splices one stream update onto the window. Exactly one row per bar
    /// time; the last row always reflects the most recent known state of the
    /// in-progress or newly closed bar.
    pub fn merge_update(&mut self, update: &StreamUpdate) -> MergeOutcome {
        let Some(last) = self.candles.last_mut() else {
            return MergeOutcome::Empty;
        };

        if update.candle.time == last.time {
            *last = update.candle;
            return MergeOutcome::Replaced;
        }

        if update.candle.time < last.time {
            return MergeOutcome::Stale;
        }

        self.candles.push(update.candle);
        if self.candles.len() > self.max_len {
            let overflow = self.candles.len() - self.max_len;
            self.candles.drain(0..overflow);
        }
        MergeOutcome::Appended
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn clear(&mut self) {
        self.candles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
        }
    }

    fn update(time: i64, close: f64, closed: bool) -> StreamUpdate {
        StreamUpdate {
            candle: candle(time, close),
            closed,
        }
    }

    #[test]
    fn seed_keeps_only_most_recent_entries() {
        let mut buffer = SeriesBuffer::new(3);
        buffer.seed(vec![
            candle(100, 1.0),
            candle(160, 2.0),
            candle(220, 3.0),
            candle(280, 4.0),
            candle(340, 5.0),
        ]);

        assert_eq!(buffer.len(), 3);
        let times: Vec<i64> = buffer.as_slice().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![220, 280, 340]);
    }

    #[test]
    fn seed_with_empty_input_yields_empty_buffer() {
        let mut buffer = SeriesBuffer::new(3);
        buffer.seed(vec![candle(100, 1.0)]);
        buffer.seed(Vec::new());
        assert!(buffer.is_empty());
    }

    #[test]
    fn merge_on_empty_buffer_is_a_no_op() {
        let mut buffer = SeriesBuffer::new(3);
        let outcome = buffer.merge_update(&update(100, 1.0, false));
        assert_eq!(outcome, MergeOutcome::Empty);
        assert!(buffer.is_empty());
    }

    #[test]
    fn equal_time_replaces_last_entry_in_place() {
        let mut buffer = SeriesBuffer::new(5);
        buffer.seed(vec![candle(100, 1.0), candle(160, 2.0)]);

        let outcome = buffer.merge_update(&update(160, 2.5, false));
        assert_eq!(outcome, MergeOutcome::Replaced);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.last().unwrap().close, 2.5);

        // The final closed update for the same bar also replaces in place.
        let outcome = buffer.merge_update(&update(160, 2.75, true));
        assert_eq!(outcome, MergeOutcome::Replaced);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.last().unwrap().close, 2.75);
    }

    #[test]
    fn greater_time_appends_and_trims_to_capacity() {
        let mut buffer = SeriesBuffer::new(2);
        buffer.seed(vec![candle(100, 1.0), candle(160, 2.0)]);

        let outcome = buffer.merge_update(&update(220, 3.0, true));
        assert_eq!(outcome, MergeOutcome::Appended);
        let times: Vec<i64> = buffer.as_slice().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![160, 220]);
    }

    #[test]
    fn lesser_time_is_discarded_unchanged() {
        let mut buffer = SeriesBuffer::new(5);
        buffer.seed(vec![candle(100, 1.0), candle(160, 2.0)]);
        let before: Vec<Candle> = buffer.as_slice().to_vec();

        let outcome = buffer.merge_update(&update(100, 9.0, true));
        assert_eq!(outcome, MergeOutcome::Stale);
        assert_eq!(buffer.as_slice(), before.as_slice());
    }

    #[test]
    fn in_progress_then_close_then_next_bar() {
        let mut buffer = SeriesBuffer::new(10);
        buffer.seed(vec![candle(100, 1.0), candle(160, 2.0), candle(220, 3.0)]);

        let outcome = buffer.merge_update(&update(220, 3.4, false));
        assert_eq!(outcome, MergeOutcome::Replaced);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.last().unwrap().close, 3.4);

        let outcome = buffer.merge_update(&update(280, 4.0, true));
        assert_eq!(outcome, MergeOutcome::Appended);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.last().unwrap().time, 280);
    }

    #[test]
    fn non_decreasing_sequence_never_exceeds_capacity() {
        let mut buffer = SeriesBuffer::new(4);
        buffer.seed(vec![candle(0, 1.0)]);

        for step in 1..50 {
            let time = (step / 2) * 60;
            let outcome = buffer.merge_update(&update(time, step as f64, step % 2 == 1));
            assert_ne!(outcome, MergeOutcome::Stale);
            assert!(buffer.len() <= 4);
            assert_eq!(buffer.last().unwrap().close, step as f64);
            assert_eq!(buffer.last().unwrap().time, time);
        }

        let times: Vec<i64> = buffer.as_slice().iter().map(|c| c.time).collect();
        let mut sorted = times.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(times, sorted);
    }
}
