//! Board - ordered card grid and the player flip protocol.
//!
//! The board holds no lock of its own around the flip protocol; every
//! sub-step synchronizes on a single card at a time. This is sound because a
//! player's set of controlled cards is only ever mutated by that player's
//! own thread: other players cannot remove or release cards they do not
//! control. The two global operations, `map` and `reset`, instead acquire
//! every card's lock in index order, which makes deadlock against each other
//! and against single-card operations impossible.

use std::path::Path;
use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::core::card::{Card, CardView};
use crate::core::config::{BoardFile, BoardFileError};
use crate::core::watch::WatchChannel;
use crate::types::{CardState, GameError};

pub struct Board {
    rows: usize,
    columns: usize,
    cards: Vec<Card>,
    watch: Arc<WatchChannel>,
}

impl Board {
    /// Build a board from a parsed configuration. Cards are created once and
    /// wired to the board's watch channel; they are never added or removed
    /// afterwards.
    pub fn new(file: BoardFile) -> Self {
        let watch = Arc::new(WatchChannel::new());
        let cards = file
            .values
            .into_iter()
            .map(|value| Card::new(value, Some(Arc::clone(&watch))))
            .collect();
        Self {
            rows: file.rows,
            columns: file.columns,
            cards,
            watch,
        }
    }

    /// Load a board from a configuration file (see [`BoardFile`]).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoardFileError> {
        Ok(Self::new(BoardFile::load(path)?))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Linear index of `(row, column)` in row-major order, or `None` when
    /// the coordinates fall outside the grid.
    pub fn index(&self, row: usize, column: usize) -> Option<usize> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        Some(row * self.columns + column)
    }

    /// Flip the card at `index` for `player`, running the full protocol:
    ///
    /// 1. flip down the player's face-up residue from a failed match,
    /// 2. remove the player's previously matched pair,
    /// 3. take the card as the first or second of a new pair.
    ///
    /// A first flip may block while another player controls the card. On a
    /// mismatch both cards are released face up; on `RestrictedAccess` the
    /// player's first card is released before the error is returned.
    ///
    /// `index` must be a valid position (the facade bounds-checks).
    pub fn flip(&self, player: &str, index: usize) -> Result<(), GameError> {
        assert!(index < self.cards.len(), "card index {} out of range", index);

        self.flip_down_unmatched(player);
        self.remove_matched(player);

        let selected = &self.cards[index];
        let result = match self.controlled_card(player) {
            None => selected.flip_up_as_first(player),
            // Re-flipping the card the player already holds is a no-op.
            Some(prev) if prev == index => Ok(()),
            Some(prev) => self.flip_second(player, selected, &self.cards[prev]),
        };
        self.check_rep(player);
        result
    }

    /// Player-scoped snapshot: a `RxC` header, then one render line per card
    /// in row-major order. Each line is consistent under its card's lock but
    /// the snapshot as a whole is not a single point in time.
    pub fn look(&self, player: &str) -> String {
        let mut out = format!("{}x{}", self.rows, self.columns);
        for card in &self.cards {
            out.push('\n');
            out.push_str(&card.render(player));
        }
        out
    }

    /// Apply `f` to every card's value atomically: all card locks are taken
    /// in index order, held across the whole rewrite, and released before
    /// watchers are woken once. States and owners are untouched.
    pub fn map<F>(&self, f: F)
    where
        F: Fn(&str) -> String,
    {
        let mut guards: Vec<_> = self.cards.iter().map(|card| card.raw_lock()).collect();
        for guard in guards.iter_mut() {
            let next = f(&guard.value);
            guard.value = next;
        }
        drop(guards);
        self.watch.notify();
    }

    /// Replace every card valued `from` with `to` (the facade's spelling of
    /// [`map`](Self::map)).
    pub fn replace(&self, from: &str, to: &str) {
        self.map(|value| {
            if value == from {
                to.to_string()
            } else {
                value.to_string()
            }
        });
    }

    /// Return every card to face-down and unowned, keeping values. Uses the
    /// same ordered full-lock acquisition as [`map`](Self::map); parked
    /// first-flip waiters are woken so they re-check and find `Down`.
    pub fn reset(&self) {
        let mut guards: Vec<_> = self.cards.iter().map(|card| card.raw_lock()).collect();
        for guard in guards.iter_mut() {
            guard.state = CardState::Down;
            guard.owner = None;
        }
        for card in &self.cards {
            card.notify_waiters();
        }
        drop(guards);
        self.watch.notify();
    }

    /// Block until any observable change: a card state change, or completion
    /// of `map` or `reset`. Callers must re-read state afterwards; spurious
    /// wakes are possible.
    pub fn watch(&self) -> Result<(), GameError> {
        self.watch.wait()
    }

    /// Cancel every parked wait (first flips and watchers) with `Cancelled`.
    /// Card state is not altered.
    pub fn shutdown(&self) {
        for card in &self.cards {
            card.cancel_waiters();
        }
        self.watch.cancel();
    }

    /// Snapshot copy of the card at `index` (0-based, row-major).
    pub fn card(&self, index: usize) -> CardView {
        self.cards[index].view()
    }

    fn flip_second(&self, player: &str, selected: &Card, prev: &Card) -> Result<(), GameError> {
        if let Err(err) = selected.flip_up_as_second(player) {
            prev.relinquish_control();
            self.watch.notify();
            return Err(err);
        }
        if !selected.matches(prev) {
            selected.relinquish_control();
            prev.relinquish_control();
            self.watch.notify();
        }
        Ok(())
    }

    fn flip_down_unmatched(&self, player: &str) {
        for card in &self.cards {
            if card.was_controlled_by(player) {
                card.flip_down();
            }
        }
    }

    fn remove_matched(&self, player: &str) {
        // At most two cards can be controlled by one player; a third is a
        // protocol bug and the overflow panic is deliberate.
        let mut pair = ArrayVec::<usize, 2>::new();
        for (i, card) in self.cards.iter().enumerate() {
            if card.is_controlled_by(player) {
                pair.push(i);
            }
        }
        if pair.len() == 2 {
            for i in pair {
                self.cards[i].remove();
            }
        }
    }

    fn controlled_card(&self, player: &str) -> Option<usize> {
        self.cards.iter().position(|card| card.is_controlled_by(player))
    }

    #[cfg(debug_assertions)]
    fn check_rep(&self, player: &str) {
        let controlled = self
            .cards
            .iter()
            .filter(|card| card.is_controlled_by(player))
            .count();
        debug_assert!(
            controlled <= 2,
            "{} controls {} cards after a flip",
            player,
            controlled
        );
    }

    #[cfg(not(debug_assertions))]
    fn check_rep(&self, _player: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_board() -> Board {
        Board::new(BoardFile::parse("2x2\nA\nB\nA\nB").unwrap())
    }

    #[test]
    fn index_maps_row_major_and_rejects_out_of_grid() {
        let board = demo_board();
        assert_eq!(board.index(0, 0), Some(0));
        assert_eq!(board.index(0, 1), Some(1));
        assert_eq!(board.index(1, 0), Some(2));
        assert_eq!(board.index(1, 1), Some(3));
        assert_eq!(board.index(2, 0), None);
        assert_eq!(board.index(0, 2), None);
    }

    #[test]
    fn look_starts_all_down() {
        let board = demo_board();
        assert_eq!(board.look("p1"), "2x2\ndown\ndown\ndown\ndown");
    }

    #[test]
    fn replace_rewrites_only_matching_values() {
        let board = demo_board();
        board.replace("A", "Z");
        assert_eq!(board.card(0).value, "Z");
        assert_eq!(board.card(1).value, "B");
        assert_eq!(board.card(2).value, "Z");
        assert_eq!(board.card(3).value, "B");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn flip_panics_on_out_of_range_index() {
        let board = demo_board();
        let _ = board.flip("p1", 4);
    }
}
