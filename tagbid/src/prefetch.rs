//! State machine of the single active prefetch cycle.
//!
//! The controller tracks which correlator is current, which of its slots are
//! still awaiting the cycle's fetch, which slots deferred callers have
//! claimed, and the queue of deferred callers to replay at completion.

use std::collections::{HashMap, HashSet, VecDeque};

use tagbid_core::{Correlator, PrefetchState, SlotId};
use tokio::sync::oneshot;

use crate::reconcile::Draw;

/// Identifies one `resolve` invocation for claims and reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    /// Raw ticket number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Identifies one prefetch cycle; a new one is issued by every `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(u64);

/// A suspended `resolve`, replayed once its prefetch cycle settles.
#[derive(Debug)]
pub struct DeferredCall {
    ticket: Ticket,
    correlator: Correlator,
    slots: Vec<SlotId>,
    reply: oneshot::Sender<Draw>,
}

impl DeferredCall {
    /// Capture a call's arguments; the receiver yields its cache draw.
    #[must_use]
    pub fn new(
        ticket: Ticket,
        correlator: Correlator,
        slots: Vec<SlotId>,
    ) -> (Self, oneshot::Receiver<Draw>) {
        let (reply, rx) = oneshot::channel();
        let call = Self {
            ticket,
            correlator,
            slots,
            reply,
        };
        (call, rx)
    }

    /// Ticket of the originating call.
    #[must_use]
    pub const fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Correlator supplied by the caller.
    #[must_use]
    pub const fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Requested slots, without duplicates.
    #[must_use]
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    /// True once the caller stopped waiting for its answer.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    /// Deliver the draw to the waiting caller. A caller that went away is ignored.
    pub fn answer(self, draw: Draw) {
        let _ = self.reply.send(draw);
    }
}

/// Result of [`PrefetchController::start`].
#[derive(Debug)]
pub struct Started {
    /// The new cycle.
    pub cycle: CycleId,
    /// Whether an in-progress cycle was superseded.
    pub superseded: bool,
    /// Deferred calls of the superseded cycle, to replay against the new one.
    pub requeue: VecDeque<DeferredCall>,
}

/// Owns the prefetch lifecycle `New → InProgress → Ready → Used`.
#[derive(Debug, Default)]
pub struct PrefetchController {
    state: PrefetchState,
    cycle: u64,
    next_ticket: u64,
    correlator: Option<Correlator>,
    pending: HashSet<SlotId>,
    reserved: HashMap<SlotId, Ticket>,
    deferred: VecDeque<DeferredCall>,
}

impl PrefetchController {
    /// Controller in the `New` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PrefetchState {
        self.state
    }

    /// Correlator of the current cycle.
    #[must_use]
    pub const fn correlator(&self) -> Option<&Correlator> {
        self.correlator.as_ref()
    }

    /// Whether `correlator` is the current one.
    #[must_use]
    pub fn is_current(&self, correlator: &Correlator) -> bool {
        self.correlator.as_ref() == Some(correlator)
    }

    /// Whether `slot` is still awaiting the cycle's fetch and unclaimed.
    #[must_use]
    pub fn is_pending(&self, slot: &SlotId) -> bool {
        self.pending.contains(slot)
    }

    /// Slots awaiting the cycle's fetch, in no particular order.
    pub fn pending(&self) -> impl Iterator<Item = &SlotId> {
        self.pending.iter()
    }

    /// Number of queued deferred calls.
    #[must_use]
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Issue a fresh ticket for an incoming call.
    pub fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    /// Begin a cycle for `correlator` covering `slots`.
    ///
    /// Replaces the correlator and pending set and drops all reservations.
    /// When a cycle was in progress its deferred calls are handed back for
    /// immediate replay.
    pub fn start(&mut self, correlator: Correlator, slots: &[SlotId]) -> Started {
        let superseded = self.state == PrefetchState::InProgress;
        self.cycle += 1;
        self.state = PrefetchState::InProgress;
        self.correlator = Some(correlator);
        self.pending = slots.iter().cloned().collect();
        self.reserved.clear();
        Started {
            cycle: CycleId(self.cycle),
            superseded,
            requeue: std::mem::take(&mut self.deferred),
        }
    }

    /// Claim every requested slot that is still pending for `ticket`.
    ///
    /// Returns `true` when at least one slot was claimed, in which case the
    /// call must be deferred. Claimed slots leave the pending set and stay
    /// reserved for `ticket` until [`release`](Self::release).
    pub fn claim(&mut self, ticket: Ticket, correlator: &Correlator, slots: &[SlotId]) -> bool {
        if self.state != PrefetchState::InProgress || !self.is_current(correlator) {
            return false;
        }
        let mut claimed = false;
        for slot in slots {
            if self.pending.remove(slot) {
                self.reserved.insert(slot.clone(), ticket);
                claimed = true;
            }
        }
        claimed
    }

    /// Queue a call that claimed slots.
    pub fn defer(&mut self, call: DeferredCall) {
        self.deferred.push_back(call);
    }

    /// Settle `cycle`.
    ///
    /// Returns the deferred queue, in arrival order, when `cycle` is the
    /// current in-progress cycle. A superseded cycle yields `None` and leaves
    /// the state untouched.
    pub fn complete(&mut self, cycle: CycleId) -> Option<VecDeque<DeferredCall>> {
        if cycle.0 != self.cycle || self.state != PrefetchState::InProgress {
            return None;
        }
        self.state = PrefetchState::Ready;
        self.pending.clear();
        Some(std::mem::take(&mut self.deferred))
    }

    /// Ticket holding a reservation on `slot`, if any.
    #[must_use]
    pub fn reserved_by(&self, slot: &SlotId) -> Option<Ticket> {
        self.reserved.get(slot).copied()
    }

    /// Drop every reservation held by `ticket`.
    pub fn release(&mut self, ticket: Ticket) {
        self.reserved.retain(|_, t| *t != ticket);
    }

    /// Record that the current cycle's demand has been fully consumed.
    pub fn mark_used(&mut self) {
        if self.state == PrefetchState::Ready {
            self.state = PrefetchState::Used;
        }
    }
}
