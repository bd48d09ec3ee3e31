//! Flow-controlled communication between components.
//!
//! Components exchange [`Msg`]s through [`Port`]s. Each port belongs to a
//! single [`Component`] and stores incoming messages in a bounded
//! [`Buffer`]. Ports are plugged into a [`Connection`], which routes each
//! message from its source port to its destination port.
//!
//! Every transfer is subject to admission control: a message is only
//! accepted if the incoming buffer of its destination has room for it.
//! Otherwise [`Port::send()`] fails with a recoverable [`ConnError`] and hands
//! the message back within a [`SendError`], so that the sender can retry no
//! earlier than [`ConnError::earliest_retry()`]. No message is ever lost or
//! duplicated by a refused transfer.
//!
//! A port that had to refuse a message remembers it. As soon as its owner
//! retrieves an incoming message, the port asks its connection to notify the
//! other plugged ports, which in turn forward the notification to their owner
//! through [`Component::notify_port_free()`]. The owner of a port is likewise
//! notified of each message arrival with [`Component::notify_recv()`].
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Weak};
//!
//! use cyclesim::ports::{
//!     Component, Connection, DirectConnection, Msg, MsgMeta, Port, PortAddr,
//! };
//! use cyclesim::time::VTimeInSec;
//!
//! struct Ping {
//!     meta: MsgMeta,
//! }
//!
//! impl Msg for Ping {
//!     fn meta(&self) -> &MsgMeta {
//!         &self.meta
//!     }
//!     fn meta_mut(&mut self) -> &mut MsgMeta {
//!         &mut self.meta
//!     }
//! }
//!
//! struct Node {
//!     name: String,
//!     port: Arc<Port<Ping>>,
//! }
//!
//! impl Node {
//!     fn new(name: &str) -> Arc<Self> {
//!         Arc::new_cyclic(|me: &Weak<Self>| Self {
//!             name: name.to_owned(),
//!             port: Port::new(me.clone(), 1, format!("{}.port", name)),
//!         })
//!     }
//! }
//!
//! impl Component for Node {
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//!     fn notify_recv(&self, _now: VTimeInSec, _port: &PortAddr) {}
//!     fn notify_port_free(&self, _now: VTimeInSec, _port: &PortAddr) {}
//! }
//!
//! let a = Node::new("a");
//! let b = Node::new("b");
//! let conn = DirectConnection::new("conn");
//! conn.register(&a.port);
//! conn.register(&b.port);
//!
//! // The destination is inferred since only two ports are plugged.
//! let ping = Ping { meta: MsgMeta::new(0, a.port.as_remote(), 1.0) };
//! a.port.send(ping).unwrap();
//!
//! // The buffer of `b` is full.
//! let ping = Ping { meta: MsgMeta::new(1, a.port.as_remote(), 1.0) };
//! let err = a.port.send(ping).unwrap_err();
//! assert!(err.error().is_recoverable());
//!
//! let received = b.port.retrieve_incoming(1.0).unwrap();
//! assert_eq!(received.meta().id, 0);
//! assert_eq!(received.meta().recv_time, 1.0);
//!
//! // The message was handed back and can now be sent.
//! a.port.send(err.into_inner()).unwrap();
//! ```

mod buffer;
mod connection;
mod direct;
mod msg;
mod port;

pub use buffer::Buffer;
pub use connection::{ConnError, Connection, SendError};
pub use direct::DirectConnection;
pub use msg::{Msg, MsgMeta, PortAddr};
pub use port::Port;

use crate::time::VTimeInSec;

/// A simulated entity owning ports.
///
/// Ports call back their owner when something happens that may let the
/// owner make progress.
pub trait Component: Send + Sync {
    /// Returns the name of the component.
    fn name(&self) -> &str;

    /// Notifies the component that a message arrived at one of its ports.
    fn notify_recv(&self, now: VTimeInSec, port: &PortAddr);

    /// Notifies the component that a port it previously failed to send to
    /// can accept messages again.
    fn notify_port_free(&self, now: VTimeInSec, port: &PortAddr);
}
