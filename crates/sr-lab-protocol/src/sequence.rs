//! Arithmetic over the circular sequence-number space `[0, modulus)`.

/// `true` iff `candidate` lies in the half-open circular range
/// `[window_start, window_start + window_size)` taken modulo `modulus`.
///
/// Values outside `[0, modulus)` belong to no window.
pub fn in_window(candidate: u32, window_start: u32, window_size: u32, modulus: u32) -> bool {
    if candidate >= modulus || window_start >= modulus {
        return false;
    }
    SequenceSpace::new(modulus).distance(window_start, candidate) < window_size
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSpace {
    modulus: u32,
}

impl SequenceSpace {
    pub fn new(modulus: u32) -> Self {
        assert!(modulus > 0, "sequence space must not be empty");
        Self { modulus }
    }

    /// Reduce a value computed in `u64` back into `[0, modulus)`.
    fn wrap(&self, value: u64) -> u32 {
        // The result is below `modulus`, so it always fits.
        (value % u64::from(self.modulus)) as u32
    }

    pub fn next(&self, seq: u32) -> u32 {
        self.wrap(u64::from(seq) + 1)
    }

    /// Step `seq` back by `by` positions.
    pub fn retreat(&self, seq: u32, by: u32) -> u32 {
        let m = u64::from(self.modulus);
        self.wrap(u64::from(seq) % m + m - u64::from(by) % m)
    }

    /// Forward distance from `from` to `to`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        let m = u64::from(self.modulus);
        self.wrap(u64::from(to) % m + m - u64::from(from) % m)
    }

    /// Buffer slot for `seq`.
    pub fn index(&self, seq: u32) -> usize {
        (seq % self.modulus) as usize
    }

    pub fn contains(&self, candidate: u32, start: u32, size: u32) -> bool {
        in_window(candidate, start, size, self.modulus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_without_wraparound() {
        assert!(in_window(3, 2, 6, 20));
        assert!(in_window(2, 2, 6, 20));
        assert!(in_window(7, 2, 6, 20));
        assert!(!in_window(8, 2, 6, 20));
        assert!(!in_window(1, 2, 6, 20));
    }

    #[test]
    fn window_wrapping_past_modulus() {
        // [17, 18, 19, 0, 1, 2]
        for seq in [17, 18, 19, 0, 1, 2] {
            assert!(in_window(seq, 17, 6, 20), "{seq} should be inside");
        }
        for seq in [3, 10, 16] {
            assert!(!in_window(seq, 17, 6, 20), "{seq} should be outside");
        }
    }

    #[test]
    fn window_ending_exactly_at_modulus() {
        assert!(in_window(19, 14, 6, 20));
        assert!(!in_window(0, 14, 6, 20));
    }

    #[test]
    fn empty_and_full_windows() {
        assert!(!in_window(5, 5, 0, 20));
        for seq in 0..20 {
            assert!(in_window(seq, 9, 20, 20));
        }
    }

    #[test]
    fn unreduced_candidates_are_outside() {
        assert!(!in_window(20, 17, 6, 20));
        assert!(!in_window(999_999, 0, 6, 20));
    }

    #[test]
    fn next_and_retreat_wrap() {
        let space = SequenceSpace::new(20);
        assert_eq!(space.next(19), 0);
        assert_eq!(space.next(4), 5);
        assert_eq!(space.retreat(2, 6), 16);
        assert_eq!(space.retreat(10, 6), 4);
        assert_eq!(space.distance(18, 2), 4);
        assert_eq!(space.distance(5, 5), 0);
        assert_eq!(space.index(23), 3);
    }

    #[test]
    fn arithmetic_near_the_top_of_a_large_space() {
        let modulus = 4_000_000_000;
        assert!(in_window(3_999_999_999, 3_999_999_998, 6, modulus));
        assert!(in_window(3, 3_999_999_998, 6, modulus));
        assert!(!in_window(4, 3_999_999_998, 6, modulus));

        let space = SequenceSpace::new(u32::MAX);
        assert_eq!(space.next(u32::MAX - 1), 0);
        assert_eq!(space.retreat(1, 3), u32::MAX - 2);
        assert_eq!(space.distance(u32::MAX - 1, 2), 3);
    }
}
