//! Player notifications and the listener seam collaborators implement.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::TimeSec;

/// Notification published by the engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Playback position moved (seconds, never negative)
    PositionChanged { position: TimeSec },
    /// The stream ended, or the player stopped answering
    EndReached,
    /// The player process failed (exited, closed its pipes or hung).
    /// Always followed by [`PlayerEvent::EndReached`].
    EngineLost { reason: String },
}

/// Receives engine notifications.
///
/// Called on the engine task, in emission order, and never after
/// `PlaybackEngine::close` has returned. Implementations must not block.
pub trait PlayerListener: Send + Sync {
    fn on_position_changed(&self, position: TimeSec);

    fn on_end_reached(&self);

    fn on_engine_lost(&self, _reason: &str) {}
}

/// Routes an event to the matching listener callback.
pub(crate) fn dispatch(listener: &dyn PlayerListener, event: &PlayerEvent) {
    match event {
        PlayerEvent::PositionChanged { position } => listener.on_position_changed(*position),
        PlayerEvent::EndReached => listener.on_end_reached(),
        PlayerEvent::EngineLost { reason } => listener.on_engine_lost(reason),
    }
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl ChannelListener {
    /// Creates a listener and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PlayerEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl PlayerListener for ChannelListener {
    fn on_position_changed(&self, position: TimeSec) {
        self.send(PlayerEvent::PositionChanged { position });
    }

    fn on_end_reached(&self) {
        self.send(PlayerEvent::EndReached);
    }

    fn on_engine_lost(&self, reason: &str) {
        self.send(PlayerEvent::EngineLost {
            reason: reason.to_string(),
        });
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl PlayerListener for NullListener {
    fn on_position_changed(&self, _position: TimeSec) {}

    fn on_end_reached(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_listener_preserves_order() {
        let (listener, mut rx) = ChannelListener::new();
        dispatch(&listener, &PlayerEvent::EngineLost { reason: "eof".to_string() });
        dispatch(&listener, &PlayerEvent::EndReached);
        dispatch(&listener, &PlayerEvent::PositionChanged { position: 90.0 });

        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::EngineLost { reason: "eof".to_string() }
        );
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::EndReached);
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::PositionChanged { position: 90.0 }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(PlayerEvent::PositionChanged { position: 1.5 }).unwrap();
        assert_eq!(json["type"], "positionChanged");
        assert_eq!(json["position"], 1.5);

        let json = serde_json::to_value(PlayerEvent::EndReached).unwrap();
        assert_eq!(json["type"], "endReached");
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (listener, rx) = ChannelListener::new();
        drop(rx);
        listener.on_end_reached();
        NullListener.on_position_changed(3.0);
    }
}
