//! Position Poller
//!
//! Owns the periodic poll cycle and turns raw position samples into
//! notifications. The poller never talks to the player itself: the engine
//! task awaits [`PositionPoller::tick`], queries the position, and hands the
//! sample to [`PositionPoller::evaluate`]. Keeping both on one task is what
//! guarantees a periodic poll and an on-demand check never overlap.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::events::PlayerEvent;
use super::PlayerResult;
use crate::core::{is_end_of_stream, normalize_position, TimeSec, END_OF_STREAM};

/// One position reading, already classified.
#[derive(Clone, Debug, PartialEq)]
pub enum PositionSample {
    /// A valid position in seconds (≥ 0)
    At(TimeSec),
    /// The player reported the sentinel or an unparseable answer
    End,
    /// The pipe failed: EOF, broken pipe or a missed read deadline
    Lost(String),
}

impl PositionSample {
    /// Classifies the result of a position query.
    pub fn from_query(result: PlayerResult<f64>) -> Self {
        match result {
            Ok(value) if is_end_of_stream(value) => PositionSample::End,
            Ok(value) => PositionSample::At(normalize_position(value)),
            Err(e) if e.is_transport_failure() => PositionSample::Lost(e.to_string()),
            Err(e) => {
                debug!("Treating unusable position answer as end of stream: {}", e);
                PositionSample::End
            }
        }
    }

    /// The sample as a raw position, with `-1` for anything that is not a
    /// valid position.
    pub fn as_raw(&self) -> TimeSec {
        match self {
            PositionSample::At(position) => *position,
            PositionSample::End | PositionSample::Lost(_) => END_OF_STREAM,
        }
    }
}

/// What caused a poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollTrigger {
    /// The periodic cycle fired
    Tick,
    /// The check that follows a seek
    Seek,
    /// An explicit on-demand check
    Check,
}

/// Periodic poll cycle plus end-of-stream bookkeeping.
pub struct PositionPoller {
    interval: Duration,
    ticker: Option<Interval>,
    end_reached: bool,
    last_position: Option<TimeSec>,
}

impl PositionPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticker: None,
            end_reached: false,
            last_position: None,
        }
    }

    /// Starts a fresh cycle, replacing any running one.
    ///
    /// The first tick fires one interval from now.
    pub fn start(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.end_reached = false;
        debug!("Position polling started ({:?})", self.interval);
    }

    /// Cancels the cycle. Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            debug!("Position polling stopped");
        }
    }

    /// Stops the cycle and forgets everything published so far.
    pub fn reset(&mut self) {
        self.stop();
        self.end_reached = false;
        self.last_position = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn end_reached(&self) -> bool {
        self.end_reached
    }

    /// Whether an on-demand check should query the player.
    ///
    /// While the cycle runs the next tick already covers it.
    pub fn wants_check(&self) -> bool {
        !self.is_running()
    }

    /// Resolves at the next tick; never resolves while stopped.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Turns a sample into the notifications to publish.
    ///
    /// An end sample stops the cycle and reports the stream length as the
    /// final position; `EndReached` is reported once until a position inside
    /// the stream is seen again. An explicit check that reads back the
    /// position last published stays silent; ticks and seeks always publish.
    pub fn evaluate(
        &mut self,
        sample: PositionSample,
        length: TimeSec,
        trigger: PollTrigger,
    ) -> Vec<PlayerEvent> {
        let mut events = self.classify(sample, length);
        if trigger == PollTrigger::Check {
            let last = self.last_position;
            events.retain(|event| match event {
                PlayerEvent::PositionChanged { position } => Some(*position) != last,
                _ => true,
            });
        }
        for event in &events {
            if let PlayerEvent::PositionChanged { position } = event {
                self.last_position = Some(*position);
            }
        }
        events
    }

    fn classify(&mut self, sample: PositionSample, length: TimeSec) -> Vec<PlayerEvent> {
        match sample {
            PositionSample::At(position) => {
                if self.end_reached && position < length {
                    debug!("Position {:.3} is back inside the stream", position);
                    self.end_reached = false;
                }
                vec![PlayerEvent::PositionChanged { position }]
            }
            PositionSample::End | PositionSample::Lost(_) => {
                self.stop();
                let mut events = Vec::with_capacity(3);
                if !self.end_reached {
                    self.end_reached = true;
                    if let PositionSample::Lost(reason) = sample {
                        info!("Player lost: {}", reason);
                        events.push(PlayerEvent::EngineLost { reason });
                    } else {
                        info!("End of stream reached");
                    }
                    events.push(PlayerEvent::EndReached);
                }
                events.push(PlayerEvent::PositionChanged {
                    position: length.max(0.0),
                });
                events
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::player::PlayerError;

    #[test]
    fn test_sample_classification() {
        assert_eq!(PositionSample::from_query(Ok(4.2)), PositionSample::At(4.2));
        assert_eq!(PositionSample::from_query(Ok(-1.0)), PositionSample::End);
        assert_eq!(PositionSample::from_query(Ok(-0.2)), PositionSample::At(0.0));
        assert_eq!(
            PositionSample::from_query(Err(PlayerError::InvalidResponse {
                command: "get_time_pos".to_string(),
                response: String::new(),
            })),
            PositionSample::End
        );
        assert!(matches!(
            PositionSample::from_query(Err(PlayerError::ProtocolRead("eof".to_string()))),
            PositionSample::Lost(_)
        ));
        assert_eq!(PositionSample::Lost("x".to_string()).as_raw(), END_OF_STREAM);
    }

    #[tokio::test]
    async fn test_end_sample_stops_cycle_and_reports_length() {
        let mut poller = PositionPoller::new(Duration::from_millis(100));
        poller.start();
        assert!(poller.is_running());

        let events = poller.evaluate(PositionSample::End, 120.0, PollTrigger::Tick);
        assert_eq!(
            events,
            vec![
                PlayerEvent::EndReached,
                PlayerEvent::PositionChanged { position: 120.0 }
            ]
        );
        assert!(!poller.is_running());
        assert!(poller.end_reached());
    }

    #[tokio::test]
    async fn test_end_reached_is_reported_once() {
        let mut poller = PositionPoller::new(Duration::from_millis(100));
        poller.start();
        poller.evaluate(PositionSample::End, 60.0, PollTrigger::Tick);

        let again = poller.evaluate(PositionSample::End, 60.0, PollTrigger::Tick);
        assert_eq!(again, vec![PlayerEvent::PositionChanged { position: 60.0 }]);

        // Back inside the stream clears the flag.
        poller.evaluate(PositionSample::At(10.0), 60.0, PollTrigger::Tick);
        assert!(!poller.end_reached());
        let events = poller.evaluate(PositionSample::End, 60.0, PollTrigger::Tick);
        assert_eq!(events[0], PlayerEvent::EndReached);
    }

    #[test]
    fn test_position_at_length_keeps_end_flag() {
        let mut poller = PositionPoller::new(Duration::from_millis(100));
        poller.evaluate(PositionSample::End, 60.0, PollTrigger::Tick);
        poller.evaluate(PositionSample::At(60.0), 60.0, PollTrigger::Tick);
        assert!(poller.end_reached());
    }

    #[test]
    fn test_lost_sample_precedes_end_with_engine_lost() {
        let mut poller = PositionPoller::new(Duration::from_millis(100));
        let events = poller.evaluate(
            PositionSample::Lost("pipe closed".to_string()),
            30.0,
            PollTrigger::Tick,
        );
        assert_eq!(
            events,
            vec![
                PlayerEvent::EngineLost {
                    reason: "pipe closed".to_string()
                },
                PlayerEvent::EndReached,
                PlayerEvent::PositionChanged { position: 30.0 }
            ]
        );
    }

    #[tokio::test]
    async fn test_start_resets_end_flag_and_stop_is_idempotent() {
        let mut poller = PositionPoller::new(Duration::from_millis(100));
        poller.evaluate(PositionSample::End, 10.0, PollTrigger::Tick);
        assert!(poller.end_reached());

        poller.start();
        assert!(!poller.end_reached());
        assert!(!poller.wants_check());

        poller.stop();
        poller.stop();
        assert!(!poller.is_running());
        assert!(poller.wants_check());
    }

    #[test]
    fn test_check_repeating_last_position_is_silent() {
        let mut poller = PositionPoller::new(Duration::from_millis(100));
        let first = poller.evaluate(PositionSample::At(42.0), 120.0, PollTrigger::Check);
        assert_eq!(first, vec![PlayerEvent::PositionChanged { position: 42.0 }]);

        let repeat = poller.evaluate(PositionSample::At(42.0), 120.0, PollTrigger::Check);
        assert!(repeat.is_empty());

        let seek = poller.evaluate(PositionSample::At(42.0), 120.0, PollTrigger::Seek);
        assert_eq!(seek, vec![PlayerEvent::PositionChanged { position: 42.0 }]);

        let tick = poller.evaluate(PositionSample::At(42.0), 120.0, PollTrigger::Tick);
        assert_eq!(tick.len(), 1);

        poller.reset();
        let after_reset = poller.evaluate(PositionSample::At(42.0), 120.0, PollTrigger::Check);
        assert_eq!(after_reset.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let mut poller = PositionPoller::new(Duration::from_millis(100));
        poller.start();
        let started = Instant::now();
        poller.tick().await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
