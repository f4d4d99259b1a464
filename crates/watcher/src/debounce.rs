//! Per-key settle timers
//!
//! A burst of events for the same key within the settle window yields one
//! callback, fired once the key has been quiet for the full delay.
//!
//! The scheduler has no lock of its own. Its owner keeps it behind the same
//! mutex as the rest of its state, and a firing timer must `claim` its ticket
//! under that mutex before doing any work. A ticket whose timer was replaced
//! or cancelled in the meantime fails the claim, so cancellation under the
//! owner's lock is final even if the timer task already woke up.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handed to the fire callback; proves which timer fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    key: K,
    generation: u64,
}

impl<K> Ticket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

/// What `schedule` did with the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Zero delay: no timer was installed, the caller dispatches now
    Immediate,
    /// A timer was installed and will fire after the delay
    Deferred,
}

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Map of key → pending timer
pub struct SettleScheduler<K> {
    timers: HashMap<K, Pending>,
    next_generation: u64,
}

impl<K> Default for SettleScheduler<K> {
    fn default() -> Self {
        Self {
            timers: HashMap::new(),
            next_generation: 0,
        }
    }
}

impl<K> SettleScheduler<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any timer for `key` with one firing `on_fire` after `delay`
    ///
    /// With a zero delay the existing timer is still cancelled but `on_fire`
    /// is dropped unused and `Immediate` is returned. Must be called inside a
    /// tokio runtime.
    pub fn schedule<F, Fut>(&mut self, key: K, delay: Duration, on_fire: F) -> ScheduleOutcome
    where
        F: FnOnce(Ticket<K>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(&key);
        if delay.is_zero() {
            return ScheduleOutcome::Immediate;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let ticket = Ticket {
            key: key.clone(),
            generation,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(ticket).await;
        });
        self.timers.insert(key, Pending { generation, handle });
        ScheduleOutcome::Deferred
    }

    /// Take ownership of a fired timer
    ///
    /// True only for the timer currently installed for the ticket's key;
    /// that entry is removed.
    pub fn claim(&mut self, ticket: &Ticket<K>) -> bool {
        match self.timers.get(&ticket.key) {
            Some(pending) if pending.generation == ticket.generation => {
                self.timers.remove(&ticket.key);
                true
            }
            _ => false,
        }
    }

    /// Cancel the timer for `key`; true if one was pending
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.timers.remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer whose key satisfies `predicate`
    pub fn cancel_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let mut cancelled = 0;
        self.timers.retain(|key, pending| {
            if predicate(key) {
                pending.handle.abort();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    /// Number of timers not yet fired or cancelled
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }
}

impl<K> Drop for SettleScheduler<K> {
    fn drop(&mut self) {
        for (_, pending) in self.timers.drain() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Shared = Arc<Mutex<SettleScheduler<&'static str>>>;

    /// Schedule `key` with a callback that claims then bumps `fired`
    fn schedule(
        sched: &Shared,
        fired: &Arc<AtomicUsize>,
        key: &'static str,
        delay: Duration,
    ) -> ScheduleOutcome {
        let owner = Arc::clone(sched);
        let fired = Arc::clone(fired);
        sched.lock().unwrap().schedule(key, delay, move |ticket| async move {
            if owner.lock().unwrap().claim(&ticket) {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    fn setup() -> (Shared, Arc<AtomicUsize>) {
        (
            Arc::new(Mutex::new(SettleScheduler::new())),
            Arc::new(AtomicUsize::new(0)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once() {
        let (sched, fired) = setup();

        for _ in 0..5 {
            let outcome = schedule(&sched, &fired, "a.pdf", Duration::from_millis(500));
            assert_eq!(outcome, ScheduleOutcome::Deferred);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(sched.lock().unwrap().pending(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(sched.lock().unwrap().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let (sched, fired) = setup();
        schedule(&sched, &fired, "a.pdf", Duration::from_millis(500));

        assert!(sched.lock().unwrap().cancel(&"a.pdf"));
        assert!(!sched.lock().unwrap().cancel(&"a.pdf"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let (sched, fired) = setup();
        schedule(&sched, &fired, "a.pdf", Duration::from_millis(500));
        schedule(&sched, &fired, "b.pdf", Duration::from_millis(500));
        sched.lock().unwrap().cancel(&"a.pdf");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_is_immediate_and_cancels_pending() {
        let (sched, fired) = setup();
        schedule(&sched, &fired, "a.pdf", Duration::from_millis(500));

        let outcome = schedule(&sched, &fired, "a.pdf", Duration::ZERO);
        assert_eq!(outcome, ScheduleOutcome::Immediate);
        assert_eq!(sched.lock().unwrap().pending(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_where() {
        let (sched, fired) = setup();
        for key in ["in/a", "in/b", "out/c"] {
            schedule(&sched, &fired, key, Duration::from_millis(200));
        }

        let cancelled = sched.lock().unwrap().cancel_where(|k| k.starts_with("in/"));
        assert_eq!(cancelled, 2);
        assert!(sched.lock().unwrap().is_pending(&"out/c"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_ticket_claim_fails() {
        let mut sched: SettleScheduler<&str> = SettleScheduler::new();
        let stale = Ticket {
            key: "a.pdf",
            generation: 1,
        };
        sched.schedule("a.pdf", Duration::from_secs(60), |_| async {});
        sched.schedule("a.pdf", Duration::from_secs(60), |_| async {});

        assert!(!sched.claim(&stale));
        assert_eq!(sched.pending(), 1);

        let current = Ticket {
            key: "a.pdf",
            generation: 2,
        };
        assert!(sched.claim(&current));
        assert!(!sched.claim(&current));
    }
}
