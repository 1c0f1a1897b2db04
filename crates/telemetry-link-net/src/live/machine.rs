//! Connection state machine.
//!
//! The transition table is a pure function of `(status, input)`. The client
//! feeds it transport lifecycle events plus `start`/`stop`/timer inputs and
//! carries out the returned effects in order.
//!
//! | From | Input | To | Effects |
//! |------|-------|----|---------|
//! | any | `Stop` | Disconnected | cancel retry, close transport |
//! | any | `Start` | Connecting | cancel retry, close transport, open transport |
//! | Connecting | `Opened` | Connected | reset attempts |
//! | Connecting, Connected | `TransportError` | Error | schedule retry |
//! | Connecting, Connected, Error | `TransportClosed` | Disconnected | close transport, schedule retry |
//! | Connecting | `ConnectFailed` | Error | close transport, schedule retry |
//! | Error, Disconnected | `RetryElapsed` | Connecting | close transport, open transport |
//!
//! Any other pair is ignored.

use super::config::RetryCause;
use super::status::ConnectionStatus;

/// Inputs that drive the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    /// `start()` was called for a new or idle endpoint.
    Start,
    /// The current transport opened.
    Opened,
    /// The current transport reported an error.
    TransportError,
    /// The current transport closed.
    TransportClosed,
    /// The connector could not create a transport.
    ConnectFailed,
    /// The pending reconnect delay elapsed.
    RetryElapsed,
    /// `stop()` was called.
    Stop,
}

/// Side effects the client performs after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Drop the current transport, asking it to close.
    CloseTransport,
    /// Cancel the pending reconnect timer, if any.
    CancelRetry,
    /// Open a new transport under a fresh generation.
    OpenTransport,
    /// Clear the consecutive failed-attempt counter.
    ResetAttempts,
    /// Arm the reconnect timer unless one is already pending.
    ScheduleRetry(RetryCause),
}

/// The outcome of feeding one input to the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Status after the transition.
    pub next: ConnectionStatus,
    /// Effects to perform, in order.
    pub effects: &'static [Effect],
}

/// Look up the transition for `input` in state `from`.
///
/// Returns `None` when the input has no meaning in that state.
pub fn transition(from: ConnectionStatus, input: Input) -> Option<Transition> {
    use ConnectionStatus::{Connected, Connecting, Disconnected, Error};
    use Effect::*;

    let (next, effects): (ConnectionStatus, &'static [Effect]) = match (from, input) {
        (_, Input::Stop) => (Disconnected, &[CancelRetry, CloseTransport]),
        (_, Input::Start) => (Connecting, &[CancelRetry, CloseTransport, OpenTransport]),
        (Connecting, Input::Opened) => (Connected, &[ResetAttempts]),
        (Connecting | Connected, Input::TransportError) => {
            (Error, &[ScheduleRetry(RetryCause::ConnectionLost)])
        }
        (Connecting | Connected | Error, Input::TransportClosed) => (
            Disconnected,
            &[CloseTransport, ScheduleRetry(RetryCause::ConnectionLost)],
        ),
        (Connecting, Input::ConnectFailed) => (
            Error,
            &[CloseTransport, ScheduleRetry(RetryCause::ConnectFailed)],
        ),
        (Error | Disconnected, Input::RetryElapsed) => {
            (Connecting, &[CloseTransport, OpenTransport])
        }
        _ => return None,
    };

    Some(Transition { next, effects })
}
