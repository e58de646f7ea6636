use crate::dispatch::dispatcher::{Ctx, Task};
use crate::framework::Framework;
use hashbrown::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STRAND_KEY: AtomicU64 = AtomicU64::new(1);

/// Names a serial execution lane on the dispatcher. Tasks submitted under
/// the same key never run concurrently and run in submission order.
///
/// With a single logic thread every task is already serialized, so a strand
/// degenerates to an ordered queue. It stays in the model as the boundary a
/// multi-threaded dispatcher would need; rooms own one each.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct StrandKey(u64);

impl StrandKey {
    pub fn next() -> StrandKey {
        StrandKey(NEXT_STRAND_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-key FIFO queues drained by the dispatcher. The `active` guard makes
/// the one-task-at-a-time rule structural instead of incidental.
pub(crate) struct StrandSet<A> {
    queues: HashMap<StrandKey, VecDeque<Task<A>>>,
    active: Option<StrandKey>,
}

impl<A> StrandSet<A> {
    pub(crate) fn new() -> StrandSet<A> {
        StrandSet {
            queues: HashMap::new(),
            active: None,
        }
    }

    pub(crate) fn run(&mut self, key: StrandKey, task: Task<A>, app: &mut A, fw: &Framework<A>) {
        self.queues.entry(key).or_default().push_back(task);

        if self.active == Some(key) {
            // A task of this strand is already draining the queue.
            return;
        }

        self.active = Some(key);
        while let Some(task) = self.queues.get_mut(&key).and_then(VecDeque::pop_front) {
            let mut ctx = Ctx { app: &mut *app, fw };
            task(&mut ctx);
        }
        self.active = None;
        self.queues.remove(&key);
    }
}
