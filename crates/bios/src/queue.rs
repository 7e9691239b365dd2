use types::ThreadStatus;

use crate::bios::Bios;
use crate::control_block::{EVENT_FLAGS, MAX_THREAD, SEMAPHORES};
use crate::thread::Thread;

/// The intrusive thread lists. Each list threads through
/// [`Thread::next_thread_id`]; its head lives in the control block or in
/// the semaphore / event flag being waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadQueue {
    /// Runnable threads, sorted by priority, FIFO within a level.
    Ready,
    Sleep,
    VBlankStart,
    VBlankEnd,
    Semaphore(u32),
    EventFlag(u32),
}

impl ThreadQueue {
    /// The queue a thread in this state must be linked into.
    pub fn for_thread(thread: &Thread) -> Option<Self> {
        match thread.status() {
            ThreadStatus::Running => Some(Self::Ready),
            ThreadStatus::Sleeping => Some(Self::Sleep),
            ThreadStatus::WaitingSemaphore => Some(Self::Semaphore(thread.wait_semaphore)),
            ThreadStatus::WaitingEventFlag => Some(Self::EventFlag(thread.wait_event_flag)),
            ThreadStatus::WaitingVBlankStart => Some(Self::VBlankStart),
            ThreadStatus::WaitingVBlankEnd => Some(Self::VBlankEnd),
            ThreadStatus::Created | ThreadStatus::Zombie => None,
        }
    }
}

impl Bios {
    fn queue_head(&self, queue: ThreadQueue) -> u32 {
        let cb = self.cb();
        match queue {
            ThreadQueue::Ready => cb.ready_head,
            ThreadQueue::Sleep => cb.sleep_head,
            ThreadQueue::VBlankStart => cb.vblank_start_head,
            ThreadQueue::VBlankEnd => cb.vblank_end_head,
            ThreadQueue::Semaphore(id) => SEMAPHORES
                .get(&self.memory, id)
                .unwrap_or_else(|| panic!("wait queue of invalid semaphore {}", id))
                .wait_head,
            ThreadQueue::EventFlag(id) => EVENT_FLAGS
                .get(&self.memory, id)
                .unwrap_or_else(|| panic!("wait queue of invalid event flag {}", id))
                .wait_head,
        }
    }

    fn set_queue_head(&mut self, queue: ThreadQueue, head: u32) {
        match queue {
            ThreadQueue::Ready => self.cb_mut().ready_head = head,
            ThreadQueue::Sleep => self.cb_mut().sleep_head = head,
            ThreadQueue::VBlankStart => self.cb_mut().vblank_start_head = head,
            ThreadQueue::VBlankEnd => self.cb_mut().vblank_end_head = head,
            ThreadQueue::Semaphore(id) => {
                SEMAPHORES
                    .get_mut(&mut self.memory, id)
                    .unwrap_or_else(|| panic!("wait queue of invalid semaphore {}", id))
                    .wait_head = head
            }
            ThreadQueue::EventFlag(id) => {
                EVENT_FLAGS
                    .get_mut(&mut self.memory, id)
                    .unwrap_or_else(|| panic!("wait queue of invalid event flag {}", id))
                    .wait_head = head
            }
        }
    }

    /// Thread ids in queue order.
    pub fn queue_ids(&self, queue: ThreadQueue) -> Vec<u32> {
        let mut ids = Vec::new();
        let mut id = self.queue_head(queue);
        while id != 0 {
            ids.push(id);
            assert!(
                ids.len() <= MAX_THREAD as usize,
                "cycle in {:?} queue",
                queue
            );
            id = self.thread(id).next_thread_id;
        }
        ids
    }

    pub(crate) fn link_back(&mut self, queue: ThreadQueue, id: u32) {
        debug_assert!(!self.queue_ids(queue).contains(&id), "thread {} linked twice", id);
        self.thread_mut(id).next_thread_id = 0;
        match self.queue_ids(queue).last() {
            Some(&tail) => self.thread_mut(tail).next_thread_id = id,
            None => self.set_queue_head(queue, id),
        }
    }

    /// Inserts behind every thread of equal or better priority, or in
    /// front of the equal ones when `at_front` is set.
    pub(crate) fn link_by_priority(&mut self, queue: ThreadQueue, id: u32, at_front: bool) {
        debug_assert!(!self.queue_ids(queue).contains(&id), "thread {} linked twice", id);
        let priority = self.thread(id).priority;
        let mut prev = 0;
        let mut cur = self.queue_head(queue);
        while cur != 0 {
            let other = self.thread(cur);
            if other.priority > priority || (at_front && other.priority == priority) {
                break;
            }
            prev = cur;
            cur = other.next_thread_id;
        }
        self.thread_mut(id).next_thread_id = cur;
        if prev == 0 {
            self.set_queue_head(queue, id);
        } else {
            self.thread_mut(prev).next_thread_id = id;
        }
    }

    /// Removes `id` from `queue`; false when it was not linked there.
    pub(crate) fn unlink(&mut self, queue: ThreadQueue, id: u32) -> bool {
        let mut prev = 0;
        let mut cur = self.queue_head(queue);
        while cur != 0 && cur != id {
            prev = cur;
            cur = self.thread(cur).next_thread_id;
        }
        if cur == 0 {
            return false;
        }
        let next = self.thread(id).next_thread_id;
        if prev == 0 {
            self.set_queue_head(queue, next);
        } else {
            self.thread_mut(prev).next_thread_id = next;
        }
        self.thread_mut(id).next_thread_id = 0;
        true
    }

    pub(crate) fn pop_front(&mut self, queue: ThreadQueue) -> Option<u32> {
        let head = self.queue_head(queue);
        if head == 0 {
            return None;
        }
        self.unlink(queue, head);
        Some(head)
    }
}
