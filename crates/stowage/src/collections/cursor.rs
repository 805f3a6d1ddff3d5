//! Shared lazy-cursor state.
//!
//! Iteration over any collection is an explicit cursor: captured length and
//! generation, a front and back position, and a fuse. Each step first
//! revalidates the captured generation against the live header; a mismatch
//! (including a header that vanished) fails fast with
//! [`Error::Invalidated`] and fuses the cursor. Restarting means creating a
//! new iterator.

use crate::error::Error;

///
/// Cursor
///

#[derive(Clone, Copy, Debug)]
pub(in crate::collections) struct Cursor {
    front: u64,
    back: u64,
    captured: u64,
    done: bool,
}

impl Cursor {
    /// Capture the collection's length and generation at creation time.
    pub(in crate::collections) const fn new(len: u64, generation: u64) -> Self {
        Self::with_range(0, len, generation)
    }

    /// Cursor over the half-open slot range `[front, back)`. An inverted
    /// range collapses to empty rather than erroring.
    pub(in crate::collections) const fn with_range(front: u64, back: u64, generation: u64) -> Self {
        Self {
            front,
            back: if back < front { front } else { back },
            captured: generation,
            done: false,
        }
    }

    pub(in crate::collections) const fn is_exhausted(&self) -> bool {
        self.done || self.front >= self.back
    }

    pub(in crate::collections) const fn remaining(&self) -> u64 {
        if self.is_exhausted() {
            0
        } else {
            self.back - self.front
        }
    }

    /// Burn the fuse after any error.
    pub(in crate::collections) const fn fuse(&mut self) {
        self.done = true;
    }

    /// Compare the captured generation against the live one. On any
    /// disagreement the cursor is fused and the error to yield is returned.
    pub(in crate::collections) fn verify(
        &mut self,
        current: Result<u64, Error>,
    ) -> Option<Error> {
        match current {
            Err(err) => {
                self.fuse();
                Some(err)
            }
            Ok(current) if current != self.captured => {
                self.fuse();
                Some(Error::Invalidated {
                    captured: self.captured,
                    current,
                })
            }
            Ok(_) => None,
        }
    }

    /// Claim the next front slot. Callers must check exhaustion first.
    pub(in crate::collections) const fn take_front(&mut self) -> u64 {
        let index = self.front;
        self.front += 1;
        index
    }

    /// Claim the next back slot. Callers must check exhaustion first.
    pub(in crate::collections) const fn take_back(&mut self) -> u64 {
        self.back -= 1;
        self.back
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_fuses_on_generation_move() {
        let mut cursor = Cursor::new(3, 7);

        assert!(cursor.verify(Ok(7)).is_none());

        let err = cursor.verify(Ok(8)).expect("generation move must fail");
        assert!(matches!(
            err,
            Error::Invalidated { captured: 7, current: 8 }
        ));
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn front_and_back_meet_exactly_once() {
        let mut cursor = Cursor::new(3, 0);

        assert_eq!(cursor.take_front(), 0);
        assert_eq!(cursor.take_back(), 2);
        assert_eq!(cursor.take_front(), 1);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.remaining(), 0);
    }
}
