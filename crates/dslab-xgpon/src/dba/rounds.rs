//! Walk over T-CONTs grouped by class, used by the class-based engines.
//!
//! A cycle is a fixed sequence of rounds, each visiting every T-CONT of one class once. A class may
//! appear in several rounds. Every round keeps its own round-robin cursor: the next cycle starts
//! with the T-CONT after the last one visited, so a cycle cut short by a full frame resumes where
//! it stopped.

use crate::dba::per_burst_info::TcontOltRef;
use crate::qos::TcontType;

/// Index of the class of `tcont_type` in [`ClassRounds`].
pub fn class_of(tcont_type: TcontType) -> usize {
    match tcont_type {
        TcontType::T1 => 0,
        TcontType::T2 => 1,
        TcontType::T3 => 2,
        TcontType::T4 => 3,
    }
}

pub struct ClassRounds {
    classes: [Vec<TcontOltRef>; 4],
    rounds: Vec<usize>,
    cursors: Vec<usize>,
    last_visited: Vec<Option<usize>>,
    round: usize,
    visited: usize,
}

impl ClassRounds {
    /// Creates a walk whose rounds visit the given classes in order.
    pub fn new(rounds: &[usize]) -> Self {
        Self {
            classes: Default::default(),
            rounds: rounds.to_vec(),
            cursors: vec![0; rounds.len()],
            last_visited: vec![None; rounds.len()],
            round: rounds.len(),
            visited: 0,
        }
    }

    pub fn push(&mut self, tcont: TcontOltRef, class: usize) {
        self.classes[class].push(tcont);
    }

    pub fn class(&self, class: usize) -> &[TcontOltRef] {
        &self.classes[class]
    }

    /// All T-CONTs with their class.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TcontOltRef)> {
        self.classes
            .iter()
            .enumerate()
            .flat_map(|(class, tconts)| tconts.iter().map(move |t| (class, t)))
    }

    fn round_len(&self, round: usize) -> usize {
        self.classes[self.rounds[round]].len()
    }

    fn skip_empty_rounds(&mut self) {
        while self.round < self.rounds.len() && self.visited >= self.round_len(self.round) {
            self.round += 1;
            self.visited = 0;
        }
    }

    fn current(&mut self) -> Option<TcontOltRef> {
        let index = self.index()?;
        self.last_visited[self.round] = Some(index);
        Some(self.classes[self.rounds[self.round]][index].clone())
    }

    /// Moves every cursor past the T-CONT visited last in the previous cycle.
    pub fn prepare(&mut self) {
        for round in 0..self.rounds.len() {
            if let Some(index) = self.last_visited[round].take() {
                self.cursors[round] = (index + 1) % self.round_len(round);
            }
        }
        self.round = 0;
        self.visited = 0;
    }

    /// Makes the next cycle start `round` one T-CONT later than it would otherwise.
    pub fn rotate(&mut self, round: usize) {
        let len = self.round_len(round);
        if len > 0 {
            let next = match self.last_visited[round] {
                Some(index) => index + 1,
                None => self.cursors[round],
            };
            self.last_visited[round] = Some(next % len);
        }
    }

    pub fn first(&mut self) -> Option<TcontOltRef> {
        self.round = 0;
        self.visited = 0;
        self.skip_empty_rounds();
        self.current()
    }

    pub fn next(&mut self) -> Option<TcontOltRef> {
        if self.round >= self.rounds.len() {
            return None;
        }
        self.visited += 1;
        self.skip_empty_rounds();
        self.current()
    }

    /// Whether the T-CONT returned last is the final one of the cycle.
    pub fn is_last(&self) -> bool {
        if self.round >= self.rounds.len() {
            return true;
        }
        self.visited + 1 >= self.round_len(self.round)
            && (self.round + 1..self.rounds.len()).all(|r| self.round_len(r) == 0)
    }

    /// Round of the T-CONT returned last, `None` once the cycle is over.
    pub fn round(&self) -> Option<usize> {
        if self.round < self.rounds.len() {
            Some(self.round)
        } else {
            None
        }
    }

    /// Position of the T-CONT returned last within its class.
    pub fn index(&self) -> Option<usize> {
        let len = self.round_len(*self.rounds.get(self.round)?);
        if len == 0 {
            return None;
        }
        Some((self.cursors[self.round] + self.visited) % len)
    }

    /// T-CONTs of the current round not visited yet, including the current one.
    pub fn remaining_in_round(&self) -> usize {
        match self.round() {
            Some(round) => self.round_len(round).saturating_sub(self.visited),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use sugars::{rc, refcell};

    use super::*;
    use crate::qos::QosParameters;
    use crate::tcont::XgponTcontOlt;

    fn rounds(classes: &[(u16, TcontType)], order: &[usize]) -> ClassRounds {
        let mut rounds = ClassRounds::new(order);
        for &(alloc_id, tcont_type) in classes {
            let t = rc!(refcell!(XgponTcontOlt::new(alloc_id, 1, QosParameters::new(tcont_type))));
            rounds.push(t, class_of(tcont_type));
        }
        rounds
    }

    fn cycle(rounds: &mut ClassRounds) -> Vec<u16> {
        rounds.prepare();
        let mut order = Vec::new();
        let mut next = rounds.first();
        while let Some(t) = next {
            order.push(t.borrow().alloc_id());
            if rounds.is_last() {
                break;
            }
            next = rounds.next();
        }
        order
    }

    #[test]
    fn repeated_class() {
        let mut r = rounds(&[(1, TcontType::T3), (2, TcontType::T2), (3, TcontType::T3)], &[1, 2, 2]);
        assert_eq!(cycle(&mut r), vec![2, 1, 3, 1, 3]);
        assert_eq!(r.remaining_in_round(), 1);
        assert!(r.is_last());
    }

    #[test]
    fn rotation() {
        let mut r = rounds(&[(1, TcontType::T4), (2, TcontType::T4), (3, TcontType::T4)], &[3]);
        assert_eq!(cycle(&mut r), vec![1, 2, 3]);
        assert_eq!(cycle(&mut r), vec![1, 2, 3]);
        r.rotate(0);
        assert_eq!(cycle(&mut r), vec![2, 3, 1]);
    }

    #[test]
    fn remaining_counts_current() {
        let mut r = rounds(&[(1, TcontType::T4), (2, TcontType::T4), (3, TcontType::T4)], &[3]);
        r.prepare();
        r.first();
        assert_eq!(r.remaining_in_round(), 3);
        r.next();
        assert_eq!(r.remaining_in_round(), 2);
        assert_eq!(r.index(), Some(1));
    }
}
