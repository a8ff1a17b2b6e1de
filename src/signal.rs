use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use glam::Vec2;

/// Input sources the visualization listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    PointerMove,
    Scroll,
    Resize,
    Frame,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::PointerMove,
        SignalKind::Scroll,
        SignalKind::Resize,
        SignalKind::Frame,
    ];
}

/// Event delivered by the host environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostSignal {
    /// Pointer position in client pixels.
    PointerMove { client: Vec2 },
    /// Page scroll offset in pixels.
    Scroll { offset: f32 },
    /// The viewport changed size; read the new size from the host.
    Resize,
    /// Display refresh tick with a monotonic timestamp in milliseconds.
    Frame { timestamp_ms: f64 },
}

impl HostSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            HostSignal::PointerMove { .. } => SignalKind::PointerMove,
            HostSignal::Scroll { .. } => SignalKind::Scroll,
            HostSignal::Resize => SignalKind::Resize,
            HostSignal::Frame { .. } => SignalKind::Frame,
        }
    }
}

type Handler = Rc<RefCell<dyn FnMut(HostSignal)>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    slots: Vec<(u64, SignalKind, Handler)>,
}

/// Single-threaded publish/subscribe hub used by hosts that dispatch
/// signals themselves (native window loop, headless driver).
#[derive(Clone, Default)]
pub struct SignalBus {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for signals of `kind` until the returned
    /// subscription is dropped.
    pub fn subscribe(
        &self,
        kind: SignalKind,
        handler: impl FnMut(HostSignal) + 'static,
    ) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .slots
            .push((id, kind, Rc::new(RefCell::new(handler))));
        Subscription {
            registry: Rc::downgrade(&self.registry),
            id,
        }
    }

    /// Delivers `signal` to every matching handler and returns how many
    /// handlers ran.
    pub fn emit(&self, signal: HostSignal) -> usize {
        let kind = signal.kind();
        let handlers: Vec<Handler> = self
            .registry
            .borrow()
            .slots
            .iter()
            .filter(|(_, slot_kind, _)| *slot_kind == kind)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();

        let mut delivered = 0;
        for handler in handlers {
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    (*handler)(signal);
                    delivered += 1;
                }
                Err(_) => log::warn!("dropping re-entrant {kind:?} signal"),
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().slots.len()
    }

    pub fn listeners_for(&self, kind: SignalKind) -> usize {
        self.registry
            .borrow()
            .slots
            .iter()
            .filter(|(_, slot_kind, _)| *slot_kind == kind)
            .count()
    }
}

/// Registration handle; dropping it removes the handler.
#[must_use = "dropping a subscription unregisters its handler"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .slots
                .retain(|(id, _, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn handlers_receive_matching_signals_only() {
        let bus = SignalBus::new();
        let scrolls = Rc::new(Cell::new(0.0));
        let sink = Rc::clone(&scrolls);
        let _scroll = bus.subscribe(SignalKind::Scroll, move |signal| {
            if let HostSignal::Scroll { offset } = signal {
                sink.set(offset);
            }
        });

        assert_eq!(bus.emit(HostSignal::Scroll { offset: 42.0 }), 1);
        assert_eq!(bus.emit(HostSignal::Resize), 0);
        assert_eq!(scrolls.get(), 42.0);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let bus = SignalBus::new();
        let first = bus.subscribe(SignalKind::Frame, |_| {});
        let second = bus.subscribe(SignalKind::Resize, |_| {});
        assert_eq!(bus.listener_count(), 2);
        assert_eq!(bus.listeners_for(SignalKind::Frame), 1);
        drop(first);
        assert_eq!(bus.listeners_for(SignalKind::Frame), 0);
        drop(second);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = SignalBus::new();
        let subscription = bus.subscribe(SignalKind::Scroll, |_| {});
        drop(bus);
        drop(subscription);
    }

    #[test]
    fn handler_may_unsubscribe_during_emit() {
        let bus = SignalBus::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let inner = Rc::clone(&slot);
        let subscription = bus.subscribe(SignalKind::Resize, move |_| {
            inner.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(subscription);
        assert_eq!(bus.emit(HostSignal::Resize), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
