/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fixed-capacity slot arena plus an indexed binary min-heap over the armed
//! slots.
//!
//! ```text
//!   slots:  [ s0 | s1 | s2 | s3 | ... ]      one per live timer, fixed at bind time
//!              ▲         ▲
//!   heap:   [ 2, 0, ... ]                    armed slots, min-heap on (trigger, sequence)
//!   slot.heap_index ──► position in `heap`   O(log n) removal without searching
//! ```
//!
//! Every vector is sized once in [`Registry::with_capacity`]; later operations
//! only move indices around, so they never allocate.
//!
//! Ordering key is `(trigger, sequence)`.  `sequence` increases with every
//! registration, so timers sharing a trigger instant leave the heap in the
//! order they were registered.
//!
//! Methods that overwrite or clear a stored [`Action`] hand the old one back
//! to the caller instead of dropping it.  An action may own the last handle to
//! a timer, and that timer's `Drop` re-enters the service, so it must run after
//! the registry borrow has ended.

use crate::time::{Instant, PackedInstant};
use crate::timer::{Action, JumpPolicy, TimerKind};

const NOT_QUEUED: u32 = u32::MAX;

/// Index of a slot in the arena.  Owned by exactly one live timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(u32);

impl SlotId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

struct Slot {
    trigger: PackedInstant,
    sequence: u64,
    heap_index: u32,
    in_use: bool,
    kind: TimerKind,
    jump_policy: JumpPolicy,
    action: Option<Action>,
}

impl Slot {
    fn vacant() -> Self {
        Self {
            trigger: PackedInstant::default(),
            sequence: 0,
            heap_index: NOT_QUEUED,
            in_use: false,
            kind: TimerKind::SingleShot,
            jump_policy: JumpPolicy::KeepAbsolute,
            action: None,
        }
    }
}

pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<SlotId>,
    heap: Vec<SlotId>,
    next_sequence: u64,
}

impl Registry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        // NOT_QUEUED must stay out of range of any heap position.
        let capacity = capacity.min(NOT_QUEUED as usize);
        Self {
            slots: (0..capacity).map(|_| Slot::vacant()).collect(),
            // reversed so slot 0 is handed out first
            free: (0..capacity as u32).rev().map(SlotId).collect(),
            heap: Vec::with_capacity(capacity),
            next_sequence: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of armed slots.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Number of slots owned by live timers, armed or not.
    pub(crate) fn allocated(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    // ── Slot ownership ────────────────────────────────────────────────────────

    pub(crate) fn allocate(&mut self, kind: TimerKind, jump_policy: JumpPolicy) -> Option<SlotId> {
        let id = self.free.pop()?;
        let slot = &mut self.slots[id.index()];
        slot.in_use = true;
        slot.kind = kind;
        slot.jump_policy = jump_policy;
        Some(id)
    }

    /// Unlinks the slot and returns it to the free list.
    pub(crate) fn release(&mut self, id: SlotId) -> Option<Action> {
        self.unschedule(id);
        let slot = &mut self.slots[id.index()];
        if !slot.in_use {
            return None;
        }
        let action = slot.action.take();
        *slot = Slot::vacant();
        self.free.push(id);
        action
    }

    // ── Ordered collection ────────────────────────────────────────────────────

    /// Links `id` at `at` behind every slot already registered for the same
    /// instant.  Any earlier registration of `id` is removed first.
    pub(crate) fn schedule(&mut self, id: SlotId, at: Instant, action: Action) -> Option<Action> {
        self.unschedule(id);

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let pos = self.heap.len();
        let slot = &mut self.slots[id.index()];
        slot.trigger = PackedInstant::pack(at);
        slot.sequence = sequence;
        slot.heap_index = pos as u32;
        let previous = slot.action.replace(action);

        self.heap.push(id);
        self.sift_up(pos);
        previous
    }

    /// Unlinks `id`, keeping its action.  Returns `false` if it was not linked.
    pub(crate) fn unschedule(&mut self, id: SlotId) -> bool {
        let pos = self.slots[id.index()].heap_index;
        if pos == NOT_QUEUED {
            return false;
        }
        self.remove_at(pos as usize);
        true
    }

    pub(crate) fn is_queued(&self, id: SlotId) -> bool {
        self.slots[id.index()].heap_index != NOT_QUEUED
    }

    /// Trigger instant of `id` while it is linked.
    pub(crate) fn trigger(&self, id: SlotId) -> Option<Instant> {
        let slot = &self.slots[id.index()];
        (slot.heap_index != NOT_QUEUED).then(|| slot.trigger.unpack())
    }

    pub(crate) fn earliest(&self) -> Option<Instant> {
        self.heap
            .first()
            .map(|id| self.slots[id.index()].trigger.unpack())
    }

    /// Unlinks and returns the earliest slot if its trigger is `<= now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<(SlotId, Instant)> {
        let first = *self.heap.first()?;
        let at = self.slots[first.index()].trigger.unpack();
        if at > now {
            return None;
        }
        self.remove_at(0);
        Some((first, at))
    }

    /// Applies every linked slot's jump policy, then restores heap order.
    /// Returns the number of triggers that moved.
    pub(crate) fn apply_jump(&mut self, from: Instant, to: Instant) -> usize {
        let mut moved = 0;
        for id in &self.heap {
            let slot = &mut self.slots[id.index()];
            let old = slot.trigger.unpack();
            let new = slot.jump_policy.jumped(old, from, to);
            if new != old {
                slot.trigger = PackedInstant::pack(new);
                moved += 1;
            }
        }
        if moved > 0 {
            for pos in (0..self.heap.len() / 2).rev() {
                self.sift_down(pos);
            }
        }
        moved
    }

    // ── Per-slot attributes ───────────────────────────────────────────────────

    pub(crate) fn kind(&self, id: SlotId) -> TimerKind {
        self.slots[id.index()].kind
    }

    pub(crate) fn set_kind(&mut self, id: SlotId, kind: TimerKind) {
        self.slots[id.index()].kind = kind;
    }

    pub(crate) fn jump_policy(&self, id: SlotId) -> JumpPolicy {
        self.slots[id.index()].jump_policy
    }

    pub(crate) fn set_jump_policy(&mut self, id: SlotId, policy: JumpPolicy) {
        self.slots[id.index()].jump_policy = policy;
    }

    pub(crate) fn take_action(&mut self, id: SlotId) -> Option<Action> {
        self.slots[id.index()].action.take()
    }

    // ── Heap maintenance ──────────────────────────────────────────────────────

    fn key(&self, pos: usize) -> (Instant, u64) {
        let slot = &self.slots[self.heap[pos].index()];
        (slot.trigger.unpack(), slot.sequence)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots[self.heap[a].index()].heap_index = a as u32;
        self.slots[self.heap[b].index()].heap_index = b as u32;
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.key(pos) >= self.key(parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.key(right) < self.key(left) {
                right
            } else {
                left
            };
            if self.key(child) >= self.key(pos) {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }

    fn remove_at(&mut self, pos: usize) -> SlotId {
        let removed = self.heap.swap_remove(pos);
        self.slots[removed.index()].heap_index = NOT_QUEUED;
        if pos < self.heap.len() {
            self.slots[self.heap[pos].index()].heap_index = pos as u32;
            self.sift_down(pos);
            self.sift_up(pos);
        }
        removed
    }

    /// Linked slots in firing order.  Allocates; for inspection only.
    #[cfg(test)]
    pub(crate) fn firing_order(&self) -> Vec<(SlotId, Instant)> {
        let mut v: Vec<_> = self
            .heap
            .iter()
            .map(|id| {
                let slot = &self.slots[id.index()];
                (*id, slot.trigger.unpack(), slot.sequence)
            })
            .collect();
        v.sort_by_key(|&(_, at, seq)| (at, seq));
        v.into_iter().map(|(id, at, _)| (id, at)).collect()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (pos, id) in self.heap.iter().enumerate() {
            assert_eq!(self.slots[id.index()].heap_index as usize, pos);
            if pos > 0 {
                assert!(self.key((pos - 1) / 2) <= self.key(pos), "heap order broken at {pos}");
            }
        }
        let linked = self
            .slots
            .iter()
            .filter(|s| s.heap_index != NOT_QUEUED)
            .count();
        assert_eq!(linked, self.heap.len());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Duration;
    use std::rc::Rc;

    fn noop() -> Action {
        Rc::new(|| {})
    }

    fn registry_with(n: usize) -> (Registry, Vec<SlotId>) {
        let mut r = Registry::with_capacity(n);
        let ids = (0..n)
            .map(|_| r.allocate(TimerKind::SingleShot, JumpPolicy::KeepAbsolute).unwrap())
            .collect();
        (r, ids)
    }

    #[test]
    fn allocation_is_bounded_by_capacity() {
        let mut r = Registry::with_capacity(2);
        let a = r.allocate(TimerKind::SingleShot, JumpPolicy::KeepAbsolute);
        let b = r.allocate(TimerKind::SingleShot, JumpPolicy::KeepAbsolute);
        assert!(a.is_some() && b.is_some());
        assert!(r.allocate(TimerKind::SingleShot, JumpPolicy::KeepAbsolute).is_none());
        assert_eq!(r.allocated(), 2);

        r.release(a.unwrap());
        assert_eq!(r.allocated(), 1);
        assert!(r.allocate(TimerKind::SingleShot, JumpPolicy::KeepAbsolute).is_some());
    }

    #[test]
    fn pops_in_ascending_trigger_order() {
        let (mut r, ids) = registry_with(5);
        let triggers = [50, 10, 40, 20, 30];
        for (id, ms) in ids.iter().zip(triggers) {
            r.schedule(*id, Instant::from_millis(ms), noop());
            r.assert_consistent();
        }

        let mut popped = Vec::new();
        while let Some((_, at)) = r.pop_due(Instant::MAX) {
            popped.push(at.as_nanos() / 1_000_000);
            r.assert_consistent();
        }
        assert_eq!(popped, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn equal_triggers_pop_in_registration_order() {
        let (mut r, ids) = registry_with(4);
        let at = Instant::from_millis(7);
        // register in order 2, 0, 3, 1
        for i in [2, 0, 3, 1] {
            r.schedule(ids[i], at, noop());
        }
        let order: Vec<SlotId> = std::iter::from_fn(|| r.pop_due(at).map(|(id, _)| id)).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[3], ids[1]]);
    }

    #[test]
    fn pop_due_stops_at_future_triggers() {
        let (mut r, ids) = registry_with(2);
        r.schedule(ids[0], Instant::from_millis(5), noop());
        r.schedule(ids[1], Instant::from_millis(15), noop());

        assert!(r.pop_due(Instant::from_millis(4)).is_none());
        assert_eq!(r.pop_due(Instant::from_millis(10)).map(|(id, _)| id), Some(ids[0]));
        assert!(r.pop_due(Instant::from_millis(10)).is_none());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn unschedule_from_the_middle_keeps_order() {
        let (mut r, ids) = registry_with(6);
        for (i, id) in ids.iter().enumerate() {
            r.schedule(*id, Instant::from_millis(i as i64 * 10), noop());
        }
        assert!(r.unschedule(ids[3]));
        assert!(!r.unschedule(ids[3]));
        r.assert_consistent();

        let order: Vec<_> = r.firing_order().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![ids[0], ids[1], ids[2], ids[4], ids[5]]);
    }

    #[test]
    fn reschedule_moves_behind_equal_triggers() {
        let (mut r, ids) = registry_with(2);
        let at = Instant::from_millis(1);
        r.schedule(ids[0], at, noop());
        r.schedule(ids[1], at, noop());
        // re-registering ids[0] gives it a fresh sequence number
        r.schedule(ids[0], at, noop());

        let order: Vec<_> = r.firing_order().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![ids[1], ids[0]]);
    }

    #[test]
    fn schedule_hands_back_the_replaced_action() {
        let (mut r, ids) = registry_with(1);
        let first = noop();
        assert!(r.schedule(ids[0], Instant::EPOCH, first.clone()).is_none());
        let replaced = r.schedule(ids[0], Instant::EPOCH, noop()).unwrap();
        assert!(Rc::ptr_eq(&replaced, &first));
    }

    #[test]
    fn release_unlinks_and_returns_action() {
        let (mut r, ids) = registry_with(1);
        r.schedule(ids[0], Instant::EPOCH, noop());
        assert!(r.release(ids[0]).is_some());
        assert_eq!(r.len(), 0);
        assert!(!r.is_queued(ids[0]));
        // releasing twice is harmless
        assert!(r.release(ids[0]).is_none());
        assert_eq!(r.allocated(), 0);
    }

    #[test]
    fn jump_reorders_rebased_slots() {
        let (mut r, ids) = registry_with(3);
        r.set_jump_policy(ids[0], JumpPolicy::Rebase);
        r.schedule(ids[0], Instant::from_millis(10), noop());
        r.schedule(ids[1], Instant::from_millis(20), noop());
        r.schedule(ids[2], Instant::from_millis(30), noop());

        // forward 15 ms: ids[0] 10 → 25, others keep their absolute trigger
        let moved = r.apply_jump(Instant::EPOCH, Instant::EPOCH + Duration::from_millis(15));
        assert_eq!(moved, 1);
        r.assert_consistent();

        let order: Vec<_> = r.firing_order();
        assert_eq!(
            order,
            vec![
                (ids[1], Instant::from_millis(20)),
                (ids[0], Instant::from_millis(25)),
                (ids[2], Instant::from_millis(30)),
            ]
        );
        assert_eq!(r.earliest(), Some(Instant::from_millis(20)));
    }

    #[test]
    fn heap_survives_mixed_churn() {
        let (mut r, ids) = registry_with(16);
        for round in 0..8i64 {
            for (i, id) in ids.iter().enumerate() {
                let ms = (i as i64 * 7 + round * 3) % 23;
                if (i as i64 + round) % 3 == 0 {
                    r.unschedule(*id);
                } else {
                    r.schedule(*id, Instant::from_millis(ms), noop());
                }
                r.assert_consistent();
            }
            r.pop_due(Instant::from_millis(round * 2));
            r.assert_consistent();
        }
    }
}
