use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::time::VTimeInSec;

/// The address of a port, derived from its name.
///
/// Addresses are cheap to clone and are compared by name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortAddr(Arc<str>);

impl PortAddr {
    /// Creates an address from a port name.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Returns the port name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PortAddr {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortAddr({:?})", &*self.0)
    }
}

/// Information shared by all messages.
#[derive(Clone, Debug, PartialEq)]
pub struct MsgMeta {
    /// A unique identifier, typically obtained from an
    /// [`IdGenerator`](crate::id::IdGenerator).
    pub id: u64,
    /// The address of the sending port.
    pub src: PortAddr,
    /// The address of the receiving port, if known.
    ///
    /// A connection with exactly two plugged ports fills it in when absent.
    pub dst: Option<PortAddr>,
    /// The time at which the message was sent.
    pub send_time: VTimeInSec,
    /// The time at which the message was received, set by the connection.
    pub recv_time: VTimeInSec,
    /// The number of bytes the message accounts for in traffic statistics.
    pub traffic_bytes: u64,
    /// A user-defined traffic category.
    pub traffic_class: u32,
}

impl MsgMeta {
    /// Creates the metadata of a message sent from `src` at `send_time`,
    /// without explicit destination.
    pub fn new(id: u64, src: PortAddr, send_time: VTimeInSec) -> Self {
        Self {
            id,
            src,
            dst: None,
            send_time,
            recv_time: 0.0,
            traffic_bytes: 0,
            traffic_class: 0,
        }
    }

    /// Sets the destination.
    pub fn with_dst(mut self, dst: PortAddr) -> Self {
        self.dst = Some(dst);

        self
    }

    /// Sets the traffic accounting information.
    pub fn with_traffic(mut self, bytes: u64, class: u32) -> Self {
        self.traffic_bytes = bytes;
        self.traffic_class = class;

        self
    }

    /// Exchanges source and destination, e.g. to reuse the metadata of a
    /// request for its response.
    ///
    /// # Panics
    ///
    /// This will panic if the destination is unknown.
    pub fn swap_src_and_dst(&mut self) {
        let dst = self
            .dst
            .take()
            .expect("the destination of the message is unknown");
        self.dst = Some(mem::replace(&mut self.src, dst));
    }
}

/// A message exchanged between ports.
pub trait Msg: Send + 'static {
    /// Returns the metadata of the message.
    fn meta(&self) -> &MsgMeta;

    /// Returns a mutable reference to the metadata of the message.
    fn meta_mut(&mut self) -> &mut MsgMeta;
}
