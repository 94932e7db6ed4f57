//! Card - per-slot state machine with its own lock and condition variable.
//!
//! Every mutation happens under the card's mutex. `flip_up_as_first` is the
//! only operation that can park a thread; every transition out of
//! `Controlled` broadcasts the condition variable so parked first-flippers
//! re-check the state. Transitions that change what a viewer can observe
//! publish to the board's watch channel after the card lock is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::core::watch::WatchChannel;
use crate::types::{CardState, GameError};

#[derive(Debug)]
pub(crate) struct CardInner {
    pub(crate) value: String,
    pub(crate) state: CardState,
    // Present while `Controlled`; retained on `Up` as residue so the next
    // flip by the same player can retire the failed pair. Cleared on
    // `Down` and `Gone`.
    pub(crate) owner: Option<String>,
}

impl CardInner {
    pub(crate) fn is_controlled_by(&self, player: &str) -> bool {
        self.state == CardState::Controlled && self.owner.as_deref() == Some(player)
    }

    pub(crate) fn was_controlled_by(&self, player: &str) -> bool {
        self.state == CardState::Up && self.owner.as_deref() == Some(player)
    }
}

/// Point-in-time copy of a card's observable fields, for tests and
/// diagnostics. Not synchronized with later changes to the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub value: String,
    pub state: CardState,
    pub owner: Option<String>,
}

pub struct Card {
    inner: Mutex<CardInner>,
    cond: Condvar,
    cancelled: AtomicBool,
    watch: Option<Arc<WatchChannel>>,
}

impl Card {
    /// Create a face-down card. `watch` is the board's change channel; pass
    /// `None` for a standalone card (unit tests).
    pub fn new(value: impl Into<String>, watch: Option<Arc<WatchChannel>>) -> Self {
        Self {
            inner: Mutex::new(CardInner {
                value: value.into(),
                state: CardState::Down,
                owner: None,
            }),
            cond: Condvar::new(),
            cancelled: AtomicBool::new(false),
            watch,
        }
    }

    /// Take the card as the first of a matching pair.
    ///
    /// Re-flipping a card the player already controls is a no-op. If another
    /// player controls the card, blocks until the card leaves `Controlled`,
    /// then proceeds against whatever state it finds: `Gone` fails with
    /// `CardRemoved`, `Down`/`Up` are taken over.
    pub fn flip_up_as_first(&self, player: &str) -> Result<(), GameError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.is_controlled_by(player) {
            return Ok(());
        }
        while inner.state == CardState::Controlled {
            if self.cancelled.load(Ordering::Acquire) {
                return Err(GameError::Cancelled);
            }
            inner = self.cond.wait(inner).unwrap();
        }
        if inner.state == CardState::Gone {
            return Err(GameError::CardRemoved);
        }
        inner.state = CardState::Controlled;
        inner.owner = Some(player.to_string());
        drop(inner);
        self.publish();
        Ok(())
    }

    /// Take the card as the second of a matching pair. Never blocks: a
    /// controlled or removed card fails with `RestrictedAccess`.
    pub fn flip_up_as_second(&self, player: &str) -> Result<(), GameError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CardState::Controlled || inner.state == CardState::Gone {
            return Err(GameError::RestrictedAccess);
        }
        inner.state = CardState::Controlled;
        inner.owner = Some(player.to_string());
        drop(inner);
        self.publish();
        Ok(())
    }

    /// Turn an unowned face-up card back down. Controlled and removed cards
    /// are left untouched.
    pub fn flip_down(&self) {
        let mut inner = self.inner.lock().unwrap();
        let mut changed = false;
        if inner.state != CardState::Controlled && inner.state != CardState::Gone {
            changed = inner.state != CardState::Down;
            inner.state = CardState::Down;
            inner.owner = None;
        }
        self.cond.notify_all();
        drop(inner);
        if changed {
            self.publish();
        }
    }

    /// Release control, leaving the card face up.
    ///
    /// The owner field is kept as residue (see `CardInner`). Does not publish
    /// a change: the flip protocol always publishes on the board's behalf
    /// after both cards of the pair have been released.
    pub fn relinquish_control(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CardState::Up;
        self.cond.notify_all();
    }

    /// Remove a matched card from play.
    pub fn remove(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CardState::Gone {
            return;
        }
        inner.state = CardState::Gone;
        inner.owner = None;
        self.cond.notify_all();
        drop(inner);
        self.publish();
    }

    /// Return the card to its initial face-down, unowned state. The value is
    /// untouched.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        let changed = inner.state != CardState::Down;
        inner.state = CardState::Down;
        inner.owner = None;
        self.cond.notify_all();
        drop(inner);
        if changed {
            self.publish();
        }
    }

    /// Fail any parked first-flip wait with `Cancelled`, now and in the
    /// future. Card state is never altered.
    pub fn cancel_waiters(&self) {
        self.cancelled.store(true, Ordering::Release);
        let _guard = self.inner.lock().unwrap();
        self.cond.notify_all();
    }

    /// Current value, read under the card lock.
    pub fn value(&self) -> String {
        self.inner.lock().unwrap().value.clone()
    }

    /// Whether the two cards carry bytewise-equal values. Each value is read
    /// under its own card's lock, one at a time.
    pub fn matches(&self, other: &Card) -> bool {
        self.value() == other.value()
    }

    pub fn is_controlled_by(&self, player: &str) -> bool {
        self.inner.lock().unwrap().is_controlled_by(player)
    }

    pub fn was_controlled_by(&self, player: &str) -> bool {
        self.inner.lock().unwrap().was_controlled_by(player)
    }

    /// Display token for the given viewer, e.g. `"down"` or `"my A"`.
    pub fn render(&self, viewer: &str) -> String {
        let inner = self.inner.lock().unwrap();
        inner.state.render(inner.is_controlled_by(viewer), &inner.value)
    }

    pub fn view(&self) -> CardView {
        let inner = self.inner.lock().unwrap();
        CardView {
            value: inner.value.clone(),
            state: inner.state,
            owner: inner.owner.clone(),
        }
    }

    // Used by the board's ordered-acquisition operations (map, reset), which
    // must hold every card's lock at once and therefore cannot go through
    // the self-locking methods above.
    pub(crate) fn raw_lock(&self) -> MutexGuard<'_, CardInner> {
        self.inner.lock().unwrap()
    }

    pub(crate) fn notify_waiters(&self) {
        self.cond.notify_all();
    }

    fn publish(&self) {
        if let Some(watch) = &self.watch {
            watch.notify();
        }
    }
}
