use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::hooking::Hookable;
use crate::time::VTimeInSec;

use super::{Msg, Port, PortAddr};

/// A medium routing messages between the ports plugged into it.
///
/// Ports must be plugged with [`Connection::register()`] before they can
/// send or receive messages. A message is routed to the port designated by
/// its destination address or, if it has none, to the only other plugged
/// port.
pub trait Connection<M: Msg>: Hookable + Send + Sync {
    /// Returns the name of the connection.
    fn name(&self) -> &str;

    /// Plugs a port into the connection.
    ///
    /// # Panics
    ///
    /// This will panic if a port with the same address is already plugged.
    fn register(&self, port: &Arc<Port<M>>);

    /// Unplugs the port with the specified address, if any.
    fn unregister(&self, addr: &PortAddr);

    /// Checks whether the message would currently be accepted.
    ///
    /// A destination that cannot accept the message right now yields a
    /// recoverable error, while a message that can never be routed yields a
    /// fatal one. The destination of the message is filled in if it can be
    /// inferred.
    fn can_send(&self, msg: &mut M) -> Result<(), ConnError>;

    /// Transfers a message to its destination.
    ///
    /// On failure the message is handed back within the error.
    fn send(&self, msg: M) -> Result<(), SendError<M>>;

    /// Notifies all plugged ports except `addr` that `addr` can accept
    /// messages again.
    fn notify_available(&self, now: VTimeInSec, addr: &PortAddr);
}

/// Error returned when a connection cannot transfer a message.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnError {
    message: String,
    recoverable: bool,
    earliest_retry: Option<VTimeInSec>,
}

impl ConnError {
    /// Creates an error for a transfer that may be retried at or after
    /// `earliest_retry`.
    pub fn recoverable(earliest_retry: VTimeInSec) -> Self {
        Self {
            message: "destination busy".to_owned(),
            recoverable: true,
            earliest_retry: Some(earliest_retry),
        }
    }

    /// Creates an error for a transfer that will never succeed.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recoverable: false,
            earliest_retry: None,
        }
    }

    /// Returns the error description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the transfer may be retried.
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Returns the earliest time at which a retry may succeed, if the error
    /// is recoverable.
    pub fn earliest_retry(&self) -> Option<VTimeInSec> {
        self.earliest_retry
    }
}

impl fmt::Display for ConnError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.earliest_retry {
            Some(time) => write!(fmt, "{} (retry at t>={}s)", self.message, time),
            None => fmt.write_str(&self.message),
        }
    }
}

impl Error for ConnError {}

/// Error returned when a message could not be sent.
///
/// The unsent message can be recovered with [`SendError::into_inner()`].
pub struct SendError<M> {
    msg: M,
    error: ConnError,
}

impl<M> SendError<M> {
    /// Creates an error returning `msg` to the sender.
    pub fn new(msg: M, error: ConnError) -> Self {
        Self { msg, error }
    }

    /// Returns the reason of the failure.
    pub fn error(&self) -> &ConnError {
        &self.error
    }

    /// Returns a reference to the unsent message.
    pub fn msg(&self) -> &M {
        &self.msg
    }

    /// Returns the unsent message.
    pub fn into_inner(self) -> M {
        self.msg
    }

    /// Returns the unsent message and the reason of the failure.
    pub fn into_parts(self) -> (M, ConnError) {
        (self.msg, self.error)
    }
}

impl<M> fmt::Debug for SendError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<M> fmt::Display for SendError<M> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "message could not be sent: {}", self.error)
    }
}

impl<M> Error for SendError<M> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}
