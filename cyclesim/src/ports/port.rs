use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::hooking::{Hook, HookCtx, HookPos, Hookable, HookableBase};
use crate::time::VTimeInSec;

use super::{Buffer, Component, ConnError, Connection, Msg, PortAddr, SendError};

/// An endpoint through which a component sends and receives messages.
///
/// A port holds a weak reference to its owner, so that a component can own
/// its ports without creating a reference cycle. Incoming messages are
/// stored in a bounded [`Buffer`] until the owner retrieves them.
///
/// Hooks are invoked at [`HookPos::PortMsgSend`] with the [`MsgMeta`] of the
/// sent message as item, and at [`HookPos::PortMsgRecvd`] and
/// [`HookPos::PortMsgRetrieve`] with the message itself as item. Hooks of
/// the latter two positions run while the port is locked and must not call
/// back into it.
///
/// [`MsgMeta`]: super::MsgMeta
pub struct Port<M: Msg> {
    addr: PortAddr,
    owner: Weak<dyn Component>,
    conn: RwLock<Option<Arc<dyn Connection<M>>>>,
    state: Mutex<PortState<M>>,
    hooks: HookableBase,
}

struct PortState<M> {
    buf: Buffer<M>,
    // Set when a message was refused; cleared by the next retrieval.
    busy: bool,
}

impl<M: Msg> Port<M> {
    /// Creates an unplugged port owned by `owner`, whose incoming buffer can
    /// hold `capacity` messages.
    pub fn new(owner: Weak<dyn Component>, capacity: usize, name: impl Into<String>) -> Arc<Self> {
        let name = name.into();

        Arc::new(Self {
            addr: PortAddr::new(&name),
            owner,
            conn: RwLock::new(None),
            state: Mutex::new(PortState {
                buf: Buffer::new(format!("{}.buf", name), capacity),
                busy: false,
            }),
            hooks: HookableBase::new(),
        })
    }

    /// Returns the name of the port.
    pub fn name(&self) -> &str {
        self.addr.as_str()
    }

    /// Returns the address other ports use to designate this port.
    pub fn as_remote(&self) -> PortAddr {
        self.addr.clone()
    }

    /// Returns the connection the port is plugged into, if any.
    pub fn connection(&self) -> Option<Arc<dyn Connection<M>>> {
        self.conn.read().unwrap().clone()
    }

    /// Sets the connection the port is plugged into.
    ///
    /// This is called by [`Connection::register()`] and should not be needed
    /// otherwise.
    pub fn set_connection(&self, conn: Arc<dyn Connection<M>>) {
        *self.conn.write().unwrap() = Some(conn);
    }

    /// Clears the connection the port is plugged into.
    pub fn clear_connection(&self) {
        *self.conn.write().unwrap() = None;
    }

    /// Checks whether the message would currently be accepted by its
    /// destination.
    ///
    /// See [`Connection::can_send()`]. An unplugged port yields a fatal
    /// error.
    pub fn can_send(&self, msg: &mut M) -> Result<(), ConnError> {
        match self.connection() {
            Some(conn) => conn.can_send(msg),
            None => Err(self.unplugged_error()),
        }
    }

    /// Sends a message through the connection.
    ///
    /// If the destination cannot accept the message, a recoverable error is
    /// returned together with the message.
    pub fn send(&self, msg: M) -> Result<(), SendError<M>> {
        let Some(conn) = self.connection() else {
            return Err(SendError::new(msg, self.unplugged_error()));
        };

        let meta = (self.hooks.num_hooks() != 0).then(|| msg.meta().clone());
        conn.send(msg)?;

        if let Some(meta) = meta {
            self.hooks.invoke_hook(&HookCtx {
                domain: self,
                now: meta.send_time,
                pos: HookPos::PortMsgSend,
                item: &meta,
                detail: None,
            });
        }

        Ok(())
    }

    /// Returns `true` if an incoming message can be accepted.
    pub fn can_recv(&self) -> bool {
        self.state.lock().unwrap().buf.can_push()
    }

    /// Accepts an incoming message arriving at `now`, or hands it back if the
    /// incoming buffer is full.
    ///
    /// This is called by connections. An accepted message is stamped with
    /// `now` as its receive time and the owner is notified.
    pub fn recv(&self, mut msg: M, now: VTimeInSec) -> Result<(), M> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.buf.can_push() {
                state.busy = true;

                return Err(msg);
            }

            msg.meta_mut().recv_time = now;
            state.buf.set_time(now);
            state.buf.push(msg);

            if self.hooks.num_hooks() != 0 {
                if let Some(msg) = state.buf.peek_back() {
                    self.invoke_msg_hook(now, HookPos::PortMsgRecvd, msg);
                }
            }
        }

        if let Some(owner) = self.owner.upgrade() {
            owner.notify_recv(now, &self.addr);
        }

        Ok(())
    }

    /// Returns a copy of the oldest incoming message, if any.
    pub fn peek_incoming(&self) -> Option<M>
    where
        M: Clone,
    {
        self.state.lock().unwrap().buf.peek().cloned()
    }

    /// Removes and returns the oldest incoming message, if any.
    ///
    /// If a message was refused since the last retrieval, the other ports of
    /// the connection are notified that this port can accept messages again.
    pub fn retrieve_incoming(&self, now: VTimeInSec) -> Option<M> {
        let (msg, was_busy) = {
            let mut state = self.state.lock().unwrap();
            state.buf.set_time(now);
            let msg = state.buf.pop()?;

            if self.hooks.num_hooks() != 0 {
                self.invoke_msg_hook(now, HookPos::PortMsgRetrieve, &msg);
            }

            (msg, std::mem::replace(&mut state.busy, false))
        };

        if was_busy {
            if let Some(conn) = self.connection() {
                conn.notify_available(now, &self.addr);
            }
        }

        Some(msg)
    }

    /// Returns the number of incoming messages waiting to be retrieved.
    pub fn num_incoming(&self) -> usize {
        self.state.lock().unwrap().buf.size()
    }

    /// Notifies the owner that the port it failed to send to can accept
    /// messages again.
    ///
    /// This is called by connections.
    pub fn notify_available(&self, now: VTimeInSec) {
        if let Some(owner) = self.owner.upgrade() {
            owner.notify_port_free(now, &self.addr);
        }
    }

    /// Registers a hook on the incoming buffer.
    pub fn accept_buffer_hook(&self, hook: Arc<dyn Hook>) {
        self.state.lock().unwrap().buf.accept_hook(hook);
    }

    fn unplugged_error(&self) -> ConnError {
        ConnError::fatal(format!("port '{}' is not connected", self.addr))
    }

    fn invoke_msg_hook(&self, now: VTimeInSec, pos: HookPos, msg: &M) {
        self.hooks.invoke_hook(&HookCtx {
            domain: self,
            now,
            pos,
            item: msg,
            detail: None,
        });
    }
}

impl<M: Msg> Hookable for Port<M> {
    fn accept_hook(&self, hook: Arc<dyn Hook>) {
        self.hooks.accept_hook(hook);
    }

    fn num_hooks(&self) -> usize {
        self.hooks.num_hooks()
    }

    fn invoke_hook(&self, ctx: &HookCtx<'_>) {
        self.hooks.invoke_hook(ctx);
    }
}

impl<M: Msg> fmt::Debug for Port<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();

        f.debug_struct("Port")
            .field("addr", &self.addr)
            .field("buf", &state.buf)
            .field("busy", &state.busy)
            .finish_non_exhaustive()
    }
}
