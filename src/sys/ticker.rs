//! Frame-batched task queue.
//!
//! Every animating subsystem registers its per-frame work here instead of
//! touching the host directly. Work is grouped in lanes; the engine uses a
//! read lane and a write lane so that all measurements of a frame happen
//! before any mutation. A lane holds at most one task per id, and a later
//! registration under the same id replaces the pending one and moves it to
//! the back of the lane.
//!
//! The ticker is single threaded and never runs tasks on its own. The host
//! calls [`Ticker::take_frame`] (or [`Ticker::run_frame`]) once per animation
//! frame; tasks registered while a frame executes land in the next frame.

use std::fmt;
use std::hash::Hash;

use tracing::{trace, warn};

use crate::common::collections::HashMap;

pub const READ_LANE: usize = 0;
pub const WRITE_LANE: usize = 1;

struct Lane<K, T> {
    queue: Vec<Option<(K, T)>>,
    indices: HashMap<K, usize>,
}

impl<K: Hash + Eq + Copy, T> Lane<K, T> {
    fn new() -> Self {
        Lane {
            queue: Vec::new(),
            indices: HashMap::default(),
        }
    }

    fn add(&mut self, id: K, task: T) -> bool {
        let replaced = match self.indices.get(&id) {
            Some(&index) => {
                self.queue[index] = None;
                true
            }
            None => false,
        };
        self.queue.push(Some((id, task)));
        self.indices.insert(id, self.queue.len() - 1);
        replaced
    }

    fn remove(&mut self, id: &K) -> bool {
        match self.indices.remove(id) {
            Some(index) => {
                self.queue[index] = None;
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: &K) -> bool { self.indices.contains_key(id) }

    fn len(&self) -> usize { self.indices.len() }

    fn drain_into(&mut self, out: &mut Vec<T>) {
        self.indices.clear();
        out.extend(self.queue.drain(..).flatten().map(|(_, task)| task));
    }
}

pub struct Ticker<K, T> {
    lanes: Vec<Lane<K, T>>,
    frame_pending: bool,
    frames: u64,
    on_request: Option<Box<dyn FnMut()>>,
}

impl<K: Hash + Eq + Copy + fmt::Debug, T> Ticker<K, T> {
    pub fn new(lane_count: usize) -> Self {
        Ticker {
            lanes: (0..lane_count.max(1)).map(|_| Lane::new()).collect(),
            frame_pending: false,
            frames: 0,
            on_request: None,
        }
    }

    /// Hook invoked whenever the ticker goes from idle to having work. The
    /// host uses it to request exactly one animation frame.
    pub fn set_frame_request(&mut self, on_request: impl FnMut() + 'static) {
        self.on_request = Some(Box::new(on_request));
    }

    pub fn schedule(&mut self, lane: usize, id: K, task: T) {
        let Some(target) = self.lanes.get_mut(lane) else {
            warn!(lane, ?id, "Dropping task scheduled on a lane that does not exist");
            return;
        };
        if target.add(id, task) {
            trace!(lane, ?id, "Replaced pending tick task");
        }
        self.request_frame();
    }

    pub fn schedule_read_write(&mut self, id: K, read: T, write: T) {
        self.schedule(READ_LANE, id, read);
        self.schedule(WRITE_LANE, id, write);
    }

    /// Removes a pending task. Unknown ids are ignored.
    pub fn cancel(&mut self, lane: usize, id: K) {
        if let Some(target) = self.lanes.get_mut(lane) {
            target.remove(&id);
        }
    }

    pub fn cancel_read_write(&mut self, id: K) {
        self.cancel(READ_LANE, id);
        self.cancel(WRITE_LANE, id);
    }

    pub fn is_scheduled(&self, lane: usize, id: K) -> bool {
        self.lanes.get(lane).is_some_and(|l| l.contains(&id))
    }

    pub fn is_pending(&self) -> bool { self.frame_pending }

    pub fn pending_tasks(&self) -> usize { self.lanes.iter().map(Lane::len).sum() }

    pub fn frames(&self) -> u64 { self.frames }

    /// Collects every pending task, lane by lane in registration order, and
    /// resets the ticker for the next frame.
    pub fn take_frame(&mut self) -> Vec<T> {
        self.frame_pending = false;
        self.frames += 1;
        let mut tasks = Vec::with_capacity(self.pending_tasks());
        for lane in &mut self.lanes {
            lane.drain_into(&mut tasks);
        }
        trace!(frame = self.frames, tasks = tasks.len(), "Flushing tick frame");
        tasks
    }

    fn request_frame(&mut self) {
        if self.frame_pending {
            return;
        }
        self.frame_pending = true;
        if let Some(on_request) = self.on_request.as_mut() {
            on_request();
        }
    }
}

impl<K: Hash + Eq + Copy + fmt::Debug> Ticker<K, Box<dyn FnOnce()>> {
    /// Runs one frame of plain callbacks and returns how many ran.
    pub fn run_frame(&mut self) -> usize {
        let tasks = self.take_frame();
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }
}

impl<K, T> fmt::Debug for Ticker<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker")
            .field("lanes", &self.lanes.len())
            .field("frame_pending", &self.frame_pending)
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn push(log: &Log, tag: &'static str) -> Box<dyn FnOnce()> {
        let log = log.clone();
        Box::new(move || log.borrow_mut().push(tag))
    }

    #[test]
    fn same_id_runs_once_with_latest_callback() {
        let log = Log::default();
        let mut ticker: Ticker<&str, Box<dyn FnOnce()>> = Ticker::new(2);
        ticker.schedule(0, "a", push(&log, "first"));
        ticker.schedule(0, "a", push(&log, "second"));

        assert_eq!(ticker.run_frame(), 1);
        assert_eq!(*log.borrow(), vec!["second"]);
    }

    #[test]
    fn replaced_task_moves_to_the_back() {
        let log = Log::default();
        let mut ticker: Ticker<&str, Box<dyn FnOnce()>> = Ticker::new(1);
        ticker.schedule(0, "a", push(&log, "a1"));
        ticker.schedule(0, "b", push(&log, "b"));
        ticker.schedule(0, "a", push(&log, "a2"));
        ticker.run_frame();
        assert_eq!(*log.borrow(), vec!["b", "a2"]);
    }

    #[test]
    fn lanes_flush_in_lane_order() {
        let log = Log::default();
        let mut ticker: Ticker<u32, Box<dyn FnOnce()>> = Ticker::new(2);
        ticker.schedule(WRITE_LANE, 1, push(&log, "write-1"));
        ticker.schedule(READ_LANE, 1, push(&log, "read-1"));
        ticker.schedule_read_write(2, push(&log, "read-2"), push(&log, "write-2"));
        ticker.run_frame();
        assert_eq!(*log.borrow(), vec!["read-1", "read-2", "write-1", "write-2"]);
    }

    #[test]
    fn cancel_removes_pending_task_and_ignores_unknown_ids() {
        let log = Log::default();
        let mut ticker: Ticker<u32, Box<dyn FnOnce()>> = Ticker::new(2);
        ticker.schedule_read_write(7, push(&log, "read"), push(&log, "write"));
        ticker.cancel(READ_LANE, 7);
        ticker.cancel(READ_LANE, 99);
        ticker.cancel(5, 7);
        assert!(!ticker.is_scheduled(READ_LANE, 7));
        assert!(ticker.is_scheduled(WRITE_LANE, 7));
        ticker.run_frame();
        assert_eq!(*log.borrow(), vec!["write"]);
    }

    #[test]
    fn frame_is_requested_lazily_and_once() {
        let requests = Rc::new(Cell::new(0));
        let mut ticker: Ticker<u32, Box<dyn FnOnce()>> = Ticker::new(2);
        let counter = requests.clone();
        ticker.set_frame_request(move || counter.set(counter.get() + 1));

        assert!(!ticker.is_pending());
        assert_eq!(requests.get(), 0);

        ticker.schedule(0, 1, Box::new(|| {}));
        ticker.schedule(1, 1, Box::new(|| {}));
        ticker.schedule(0, 2, Box::new(|| {}));
        assert!(ticker.is_pending());
        assert_eq!(requests.get(), 1);

        ticker.run_frame();
        assert!(!ticker.is_pending());
        assert_eq!(ticker.run_frame(), 0);
        assert_eq!(requests.get(), 1);
    }

    #[test]
    fn tasks_scheduled_while_flushing_wait_for_next_frame() {
        let log = Log::default();
        let ticker: Rc<RefCell<Ticker<u32, Box<dyn FnOnce()>>>> =
            Rc::new(RefCell::new(Ticker::new(1)));

        let inner_log = log.clone();
        let inner_ticker = ticker.clone();
        ticker.borrow_mut().schedule(
            0,
            1,
            Box::new(move || {
                inner_log.borrow_mut().push("outer");
                let nested_log = inner_log.clone();
                inner_ticker
                    .borrow_mut()
                    .schedule(0, 1, Box::new(move || nested_log.borrow_mut().push("nested")));
            }),
        );

        let tasks = ticker.borrow_mut().take_frame();
        for task in tasks {
            task();
        }
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert!(ticker.borrow().is_pending());

        let tasks = ticker.borrow_mut().take_frame();
        for task in tasks {
            task();
        }
        assert_eq!(*log.borrow(), vec!["outer", "nested"]);
    }

    #[test]
    fn unknown_lane_is_ignored() {
        let mut ticker: Ticker<u32, Box<dyn FnOnce()>> = Ticker::new(2);
        ticker.schedule(9, 1, Box::new(|| {}));
        assert_eq!(ticker.pending_tasks(), 0);
        assert!(!ticker.is_pending());
    }
}
