//! Minimal observer fan-out (spec §9, "Property-change fan-out"): replaces a
//! framework property-change event with a plain subscriber list, invoked
//! after the caller has released whatever lock produced the event.

pub struct Signal<T> {
    subscribers: Vec<Box<dyn Fn(&T) + Send + Sync>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, cb: impl Fn(&T) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(cb));
    }

    pub fn emit(&self, event: &T) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emits_to_all_subscribers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut signal: Signal<u32> = Signal::new();
        for _ in 0..3 {
            let calls = calls.clone();
            signal.connect(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        signal.emit(&7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
