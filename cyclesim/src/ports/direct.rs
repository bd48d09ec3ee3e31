use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use slab::Slab;

use crate::hooking::{Hook, HookCtx, HookPos, Hookable, HookableBase};
use crate::time::{Freq, VTimeInSec};

use super::{ConnError, Connection, Msg, MsgMeta, Port, PortAddr, SendError};

const DEFAULT_FREQ_HZ: f64 = Freq::GHZ;

/// A connection that delivers messages instantly.
///
/// A delivered message is received at its send time. A message refused by a
/// full destination buffer may be retried from the next edge of the
/// connection clock, or as soon as the sender is notified with
/// [`Component::notify_port_free()`](super::Component::notify_port_free).
///
/// Hooks are invoked at [`HookPos::ConnStartSend`] with the message as item
/// for every routed transfer attempt, and at [`HookPos::ConnDeliver`] with
/// the [`MsgMeta`] of the delivered message as item once the destination
/// accepted it.
pub struct DirectConnection<M: Msg> {
    name: String,
    freq: Freq,
    me: Weak<Self>,
    registry: Mutex<Registry<M>>,
    hooks: HookableBase,
}

struct Registry<M: Msg> {
    ports: Slab<(PortAddr, Weak<Port<M>>)>,
    keys: HashMap<PortAddr, usize>,
}

impl<M: Msg> Registry<M> {
    fn get(&self, addr: &PortAddr) -> Option<Arc<Port<M>>> {
        let key = *self.keys.get(addr)?;

        self.ports[key].1.upgrade()
    }

    /// Determines the destination port of a message, filling in its
    /// destination address when it can be inferred.
    fn resolve(&self, msg: &mut M, conn_name: &str) -> Result<Arc<Port<M>>, ConnError> {
        let meta = msg.meta();
        if !self.keys.contains_key(&meta.src) {
            return Err(ConnError::fatal(format!(
                "source port '{}' is not plugged into connection '{}'",
                meta.src, conn_name
            )));
        }

        if let Some(dst) = &meta.dst {
            return self.get(dst).ok_or_else(|| {
                ConnError::fatal(format!(
                    "destination port '{}' is not plugged into connection '{}'",
                    dst, conn_name
                ))
            });
        }

        assert!(
            self.ports.len() <= 2,
            "connection '{}' has {} ports plugged and cannot infer the destination of a message from '{}'",
            conn_name,
            self.ports.len(),
            meta.src
        );

        let (dst, port) = self
            .ports
            .iter()
            .map(|(_, entry)| entry)
            .find(|(addr, _)| *addr != meta.src)
            .ok_or_else(|| {
                ConnError::fatal(format!(
                    "connection '{}' has no destination for a message from '{}'",
                    conn_name, meta.src
                ))
            })?;
        let port = port.upgrade().ok_or_else(|| {
            ConnError::fatal(format!("destination port '{}' was dropped", dst))
        })?;

        msg.meta_mut().dst = Some(dst.clone());

        Ok(port)
    }
}

impl<M: Msg> DirectConnection<M> {
    /// Creates a connection without plugged ports, clocked at 1 GHz.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_freq(name, Freq::new(DEFAULT_FREQ_HZ))
    }

    /// Creates a connection without plugged ports whose refused transfers
    /// may be retried on the next edge of a clock of frequency `freq`.
    pub fn with_freq(name: impl Into<String>, freq: Freq) -> Arc<Self> {
        let name = name.into();

        Arc::new_cyclic(|me| Self {
            name,
            freq,
            me: me.clone(),
            registry: Mutex::new(Registry {
                ports: Slab::new(),
                keys: HashMap::new(),
            }),
            hooks: HookableBase::new(),
        })
    }

    /// Returns the addresses of all plugged ports, in registration order.
    pub fn plugged_ports(&self) -> Vec<PortAddr> {
        let registry = self.registry.lock().unwrap();
        let mut ports: Vec<_> = registry
            .ports
            .iter()
            .map(|(key, (addr, _))| (key, addr.clone()))
            .collect();
        ports.sort_by_key(|(key, _)| *key);

        ports.into_iter().map(|(_, addr)| addr).collect()
    }

    /// Returns the clock frequency of the connection.
    pub fn freq(&self) -> Freq {
        self.freq
    }

    fn resolve(&self, msg: &mut M) -> Result<Arc<Port<M>>, ConnError> {
        self.registry.lock().unwrap().resolve(msg, &self.name)
    }

    /// The error of a transfer refused at `now`, retryable from the next
    /// clock edge.
    fn busy_error(&self, now: VTimeInSec) -> ConnError {
        ConnError::recoverable(self.freq.next_tick(now))
    }

    fn invoke(&self, now: VTimeInSec, pos: HookPos, item: &dyn std::any::Any) {
        self.hooks.invoke_hook(&HookCtx {
            domain: self,
            now,
            pos,
            item,
            detail: None,
        });
    }
}

impl<M: Msg> Connection<M> for DirectConnection<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, port: &Arc<Port<M>>) {
        let addr = port.as_remote();
        {
            let mut registry = self.registry.lock().unwrap();
            assert!(
                !registry.keys.contains_key(&addr),
                "port '{}' is already plugged into connection '{}'",
                addr,
                self.name
            );
            let key = registry.ports.insert((addr.clone(), Arc::downgrade(port)));
            registry.keys.insert(addr, key);
        }

        // `self` is necessarily owned by an `Arc` since it is borrowed.
        if let Some(me) = self.me.upgrade() {
            port.set_connection(me);
        }
    }

    fn unregister(&self, addr: &PortAddr) {
        let port = {
            let mut registry = self.registry.lock().unwrap();
            let Some(key) = registry.keys.remove(addr) else {
                return;
            };
            registry.ports.remove(key).1
        };

        if let Some(port) = port.upgrade() {
            port.clear_connection();
        }
    }

    fn can_send(&self, msg: &mut M) -> Result<(), ConnError> {
        let dst = self.resolve(msg)?;
        if !dst.can_recv() {
            return Err(self.busy_error(msg.meta().send_time));
        }

        Ok(())
    }

    fn send(&self, mut msg: M) -> Result<(), SendError<M>> {
        let dst = match self.resolve(&mut msg) {
            Ok(dst) => dst,
            Err(err) => return Err(SendError::new(msg, err)),
        };

        let send_time = msg.meta().send_time;
        if self.hooks.num_hooks() != 0 {
            self.invoke(send_time, HookPos::ConnStartSend, &msg);
        }

        // The destination stamps the receive time of the message itself.
        let meta: Option<MsgMeta> = (self.hooks.num_hooks() != 0).then(|| {
            let mut meta = msg.meta().clone();
            meta.recv_time = send_time;
            meta
        });

        match dst.recv(msg, send_time) {
            Ok(()) => {
                if let Some(meta) = meta {
                    self.invoke(send_time, HookPos::ConnDeliver, &meta);
                }

                Ok(())
            }
            Err(msg) => Err(SendError::new(msg, self.busy_error(send_time))),
        }
    }

    fn notify_available(&self, now: VTimeInSec, addr: &PortAddr) {
        let others: Vec<_> = {
            let registry = self.registry.lock().unwrap();
            registry
                .ports
                .iter()
                .filter(|(_, (other, _))| other != addr)
                .filter_map(|(_, (_, port))| port.upgrade())
                .collect()
        };

        for port in others {
            port.notify_available(now);
        }
    }
}

impl<M: Msg> Hookable for DirectConnection<M> {
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

impl<M: Msg> fmt::Debug for DirectConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectConnection")
            .field("name", &self.name)
            .field("freq", &self.freq)
            .field("ports", &self.plugged_ports())
            .finish_non_exhaustive()
    }
}
