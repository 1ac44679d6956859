//! Command Channel
//!
//! The request/response half of the slave protocol: one line out, and for
//! queries exactly one line back.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::protocol::{SlaveCommand, FULLSCREEN_MARKER};
use super::session::{PlayerTransport, ShutdownOutcome};
use super::{PlayerError, PlayerResult};

/// Returns the payload of a response line: everything after the last `=`.
///
/// Lines without `=` yield an empty payload. A value that itself contains
/// `=` is cut at its last `=`; players seen so far never emit one.
pub fn extract_payload(line: &str) -> &str {
    match line.rfind('=') {
        Some(index) => &line[index + 1..],
        None => "",
    }
}

/// Typed command access over a [`PlayerTransport`].
pub struct CommandChannel {
    transport: Box<dyn PlayerTransport>,
    query_timeout: Duration,
}

impl CommandChannel {
    pub fn new(transport: Box<dyn PlayerTransport>, query_timeout: Duration) -> Self {
        Self {
            transport,
            query_timeout,
        }
    }

    /// Sends a fire-and-forget command.
    pub async fn exec(&mut self, command: &SlaveCommand) -> PlayerResult<()> {
        let line = command.to_line();
        debug!("Executing command: {}", line);
        self.transport.send_line(&line).await
    }

    /// Sends a query and returns the payload of its one-line answer.
    pub async fn query(&mut self, command: &SlaveCommand) -> PlayerResult<String> {
        self.exec(command).await?;
        let line = self.transport.recv_line(self.query_timeout).await?;
        debug!("Response was: {}", line);
        Ok(extract_payload(&line).to_string())
    }

    /// Sends a query whose answer is an integer.
    pub async fn query_int(&mut self, command: &SlaveCommand) -> PlayerResult<i64> {
        let payload = self.query(command).await?;
        payload
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid_response(command, &payload))
    }

    /// Sends a query whose answer is a floating point number.
    pub async fn query_float(&mut self, command: &SlaveCommand) -> PlayerResult<f64> {
        let payload = self.query(command).await?;
        match payload.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(invalid_response(command, &payload)),
        }
    }

    /// Discards buffered startup output.
    ///
    /// Sends `get_vo_fullscreen` and drops every line up to and including its
    /// answer, so the next query reads its own response rather than banner
    /// text. Gives up once `deadline` has elapsed in total.
    pub async fn drain_until_marker(&mut self, deadline: Duration) -> PlayerResult<usize> {
        self.exec(&SlaveCommand::VoFullscreen).await?;

        let give_up_at = Instant::now() + deadline;
        let mut discarded = 0usize;
        loop {
            let remaining = give_up_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PlayerError::StartupTimeout(deadline));
            }

            let line = match self.transport.recv_line(remaining).await {
                Ok(line) => line,
                Err(PlayerError::ReadTimeout(_)) => {
                    return Err(PlayerError::StartupTimeout(deadline))
                }
                Err(e) => return Err(e),
            };

            if line.starts_with(FULLSCREEN_MARKER) {
                debug!("Drained {} line(s) of startup output", discarded);
                return Ok(discarded);
            }
            debug!("Discarding startup output: {}", line);
            discarded += 1;
        }
    }

    /// Shuts the underlying player down.
    pub async fn terminate(&mut self, grace: Duration) -> ShutdownOutcome {
        self.transport.terminate(grace).await
    }
}

fn invalid_response(command: &SlaveCommand, payload: &str) -> PlayerError {
    PlayerError::InvalidResponse {
        command: command.to_line(),
        response: payload.to_string(),
    }
}
