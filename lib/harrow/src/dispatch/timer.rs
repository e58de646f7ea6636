use crate::dispatch::dispatcher::{Ctx, DispatcherHandle};
use crate::framework::Framework;
use hashbrown::HashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Caller-chosen discriminator passed back in [`TimerEvent`], so one
/// listener can own several timers.
pub type TimerId = u32;

/// Groups timers under the entity that owns them (a room, a session), so
/// teardown can cancel everything at once.
pub type OwnerKey = u64;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy)]
pub struct TimerEvent {
    pub timer_id: TimerId,
    pub handle: TimerHandle,
}

/// Returned by interval callbacks. `Stop` self-cancels the timer, which is
/// how a callback whose target no longer exists winds itself down.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimerFire {
    Continue,
    Stop,
}

pub type TimerCallback<A> = Box<dyn FnMut(&mut Ctx<'_, A>, TimerEvent) -> TimerFire + Send>;

pub enum TimerCmd<A> {
    Register {
        handle: TimerHandle,
        timer_id: TimerId,
        owner: OwnerKey,
        deadline: Instant,
        interval: Option<Duration>,
        callback: TimerCallback<A>,
    },
    Cancel(TimerHandle),
    CancelOwner(OwnerKey),
}

static NEXT_TIMER_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Registration surface for timers. Commands travel through the dispatcher
/// queue, so a cancel issued before a pending fire is always observed first
/// by the logic thread: canceled timers never fire after the cancel is
/// observed.
pub struct TimerApi<A> {
    dispatcher: DispatcherHandle<A>,
}

impl<A> Clone for TimerApi<A> {
    fn clone(&self) -> Self {
        TimerApi {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<A: 'static> TimerApi<A> {
    pub fn new(dispatcher: DispatcherHandle<A>) -> TimerApi<A> {
        TimerApi { dispatcher }
    }

    /// One-shot timer. The callback's return value is ignored for one-shots.
    pub fn set_timer<F>(&self, timer_id: TimerId, delay: Duration, owner: OwnerKey, callback: F) -> TimerHandle
    where
        F: FnMut(&mut Ctx<'_, A>, TimerEvent) -> TimerFire + Send + 'static,
    {
        self.register(timer_id, delay, None, owner, Box::new(callback))
    }

    /// Repeating timer. Fires every `every` until canceled or the callback
    /// returns [`TimerFire::Stop`].
    pub fn set_interval<F>(&self, timer_id: TimerId, every: Duration, owner: OwnerKey, callback: F) -> TimerHandle
    where
        F: FnMut(&mut Ctx<'_, A>, TimerEvent) -> TimerFire + Send + 'static,
    {
        self.register(timer_id, every, Some(every), owner, Box::new(callback))
    }

    fn register(
        &self,
        timer_id: TimerId,
        delay: Duration,
        interval: Option<Duration>,
        owner: OwnerKey,
        callback: TimerCallback<A>,
    ) -> TimerHandle {
        let handle = TimerHandle(NEXT_TIMER_HANDLE.fetch_add(1, Ordering::Relaxed));

        self.dispatcher.timer_cmd(TimerCmd::Register {
            handle,
            timer_id,
            owner,
            deadline: Instant::now() + delay,
            interval,
            callback,
        });

        handle
    }

    /// Idempotent; canceling an expired or unknown handle is a no-op.
    pub fn cancel(&self, handle: TimerHandle) {
        self.dispatcher.timer_cmd(TimerCmd::Cancel(handle));
    }

    /// Cancels every timer registered under `owner`. Used on session and
    /// room destruction.
    pub fn cancel_owner(&self, owner: OwnerKey) {
        self.dispatcher.timer_cmd(TimerCmd::CancelOwner(owner));
    }
}

struct Entry<A> {
    timer_id: TimerId,
    owner: OwnerKey,
    deadline: Instant,
    interval: Option<Duration>,
    callback: TimerCallback<A>,
}

/// Deadline-ordered timer store, owned by the dispatcher loop. Heap nodes
/// are lazily invalidated: a node fires only when its deadline matches the
/// live entry.
pub(crate) struct TimerWheel<A> {
    entries: HashMap<u64, Entry<A>>,
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
}

impl<A> TimerWheel<A> {
    pub(crate) fn new() -> TimerWheel<A> {
        TimerWheel {
            entries: HashMap::new(),
            queue: BinaryHeap::new(),
        }
    }

    pub(crate) fn apply(&mut self, cmd: TimerCmd<A>) {
        match cmd {
            TimerCmd::Register {
                handle,
                timer_id,
                owner,
                deadline,
                interval,
                callback,
            } => {
                self.queue.push(Reverse((deadline, handle.0)));
                self.entries.insert(
                    handle.0,
                    Entry {
                        timer_id,
                        owner,
                        deadline,
                        interval,
                        callback,
                    },
                );
            }
            TimerCmd::Cancel(handle) => {
                self.entries.remove(&handle.0);
            }
            TimerCmd::CancelOwner(owner) => {
                self.entries.retain(|_, entry| entry.owner != owner);
            }
        }
    }

    /// Time until the earliest armed deadline, discarding stale heap nodes.
    pub(crate) fn until_next(&mut self) -> Option<Duration> {
        loop {
            let &Reverse((deadline, handle)) = self.queue.peek()?;

            let live = self
                .entries
                .get(&handle)
                .map_or(false, |entry| entry.deadline == deadline);
            if live {
                return Some(deadline.saturating_duration_since(Instant::now()));
            }

            self.queue.pop();
        }
    }

    pub(crate) fn run_due(&mut self, app: &mut A, fw: &Framework<A>) {
        let now = Instant::now();

        loop {
            match self.queue.peek() {
                Some(&Reverse((deadline, _))) if deadline <= now => {}
                _ => break,
            }
            let Some(Reverse((deadline, handle))) = self.queue.pop() else {
                break;
            };

            let live = self
                .entries
                .get(&handle)
                .map_or(false, |entry| entry.deadline == deadline);
            if !live {
                continue;
            }

            // Taken out of the table while the callback runs; re-armed after
            // for intervals that keep going.
            let Some(mut entry) = self.entries.remove(&handle) else {
                continue;
            };

            let event = TimerEvent {
                timer_id: entry.timer_id,
                handle: TimerHandle(handle),
            };
            let mut ctx = Ctx { app: &mut *app, fw };
            let fire = (entry.callback)(&mut ctx, event);

            if let (Some(every), TimerFire::Continue) = (entry.interval, fire) {
                // Re-arm relative to now rather than the missed deadline so
                // a stalled loop does not burst-fire to catch up.
                entry.deadline = now + every;
                self.queue.push(Reverse((entry.deadline, handle)));
                self.entries.insert(handle, entry);
            }
        }
    }

    #[cfg(test)]
    fn armed(&self) -> usize {
        self.entries.len()
    }
}
