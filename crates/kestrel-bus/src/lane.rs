// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A FIFO queue paired with a FIFO of parked consumers.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

struct LaneState<T> {
    queue: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<T>>,
}

/// One direction of the bus.
///
/// A pushed item goes straight to the oldest parked consumer when there is
/// one, otherwise to the back of the queue. An item is therefore never both
/// queued and handed out, and delivery order equals push order.
pub struct Lane<T> {
    state: Mutex<LaneState<T>>,
}

impl<T> Default for Lane<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Lane<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LaneState {
                queue: VecDeque::new(),
                waiters: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LaneState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, item: T) {
        let mut state = self.lock();
        if let Some(item) = hand_off(&mut state.waiters, item) {
            state.queue.push_back(item);
        }
    }

    /// Returns the oldest item, parking until one is pushed if the queue is empty.
    ///
    /// Dropping the returned future before it completes loses nothing: an
    /// item already handed to it is put back at the front of the lane.
    pub async fn pop(&self) -> T {
        loop {
            let rx = {
                let mut state = self.lock();
                if let Some(item) = state.queue.pop_front() {
                    return item;
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };

            let mut parked = Parked {
                lane: self,
                rx: Some(rx),
            };
            let received = match parked.rx.as_mut() {
                Some(rx) => rx.await,
                None => continue,
            };
            parked.rx = None;
            if let Ok(item) = received {
                return item;
            }
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of consumers currently parked.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.iter().filter(|tx| !tx.is_closed()).count()
    }

    fn restore(&self, item: T) {
        let mut state = self.lock();
        if let Some(item) = hand_off(&mut state.waiters, item) {
            state.queue.push_front(item);
        }
    }
}

/// Gives `item` to the oldest live waiter. Returns it if nobody took it.
fn hand_off<T>(waiters: &mut VecDeque<oneshot::Sender<T>>, mut item: T) -> Option<T> {
    while let Some(waiter) = waiters.pop_front() {
        match waiter.send(item) {
            Ok(()) => return None,
            // That consumer went away; try the next one.
            Err(returned) => item = returned,
        }
    }
    Some(item)
}

struct Parked<'a, T> {
    lane: &'a Lane<T>,
    rx: Option<oneshot::Receiver<T>>,
}

impl<T> Drop for Parked<'_, T> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if let Ok(item) = rx.try_recv() {
                self.lane.restore(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn pop_returns_queued_item_immediately() {
        let lane = Lane::new();
        lane.push(1);
        lane.push(2);
        let mut pop = task::spawn(lane.pop());
        assert_ready_eq!(pop.poll(), 1);
        assert_eq!(lane.len(), 1);
    }

    #[test]
    fn parked_consumer_receives_next_push_without_queueing() {
        let lane = Lane::new();
        let mut pop = task::spawn(lane.pop());
        assert_pending!(pop.poll());
        assert_eq!(lane.waiting(), 1);

        lane.push(7);
        assert!(pop.is_woken());
        assert_eq!(lane.len(), 0);
        assert_ready_eq!(pop.poll(), 7);
    }

    #[test]
    fn parked_consumers_are_served_oldest_first() {
        let lane = Lane::new();
        let mut first = task::spawn(lane.pop());
        let mut second = task::spawn(lane.pop());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        lane.push("a");
        lane.push("b");
        assert_ready_eq!(first.poll(), "a");
        assert_ready_eq!(second.poll(), "b");
    }

    #[test]
    fn dropped_consumer_is_skipped() {
        let lane = Lane::new();
        let mut gone = task::spawn(lane.pop());
        assert_pending!(gone.poll());
        drop(gone);

        let mut live = task::spawn(lane.pop());
        assert_pending!(live.poll());
        lane.push(3);
        assert_ready_eq!(live.poll(), 3);
        assert_eq!(lane.len(), 0);
    }

    #[test]
    fn item_handed_to_dropped_consumer_is_restored() {
        let lane = Lane::new();
        let mut pop = task::spawn(lane.pop());
        assert_pending!(pop.poll());

        lane.push(9);
        // Consumer is dropped after the hand-off but before it observed the item.
        drop(pop);
        assert_eq!(lane.len(), 1);

        let mut again = task::spawn(lane.pop());
        assert_ready_eq!(again.poll(), 9);
    }
}
