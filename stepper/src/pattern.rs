/// Starting coil code: three adjacent bits, coil0 energized alone.
const INITIAL: u8 = 0b0000_0111;

/// Coil levels for each of the eight half-step phases.
///
/// ```text
/// phase  coil0 coil1 coil2 coil3
///   0      1     0     0     0
///   1      1     1     0     0
///   2      0     1     0     0
///   3      0     1     1     0
///   4      0     0     1     0
///   5      0     0     1     1
///   6      0     0     0     1
///   7      1     0     0     1
/// ```
pub const HALF_STEP_TABLE: [[bool; 4]; 8] = [
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
    [true, false, false, true],
];

/// The 8-bit rotating code selecting which coils are energized.
///
/// Values only come from rotating [`WindingPattern::default`], so every
/// instance is one of the eight codes of the half-step cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindingPattern(u8);

impl Default for WindingPattern {
    fn default() -> Self {
        WindingPattern(INITIAL)
    }
}

impl WindingPattern {
    /// One half-step upward. The top bit wraps into bit 0.
    pub fn advance_up(&mut self) {
        self.0 = self.0.rotate_left(1);
    }

    /// One half-step downward. Bit 0 wraps into the top bit.
    pub fn advance_down(&mut self) {
        self.0 = self.0.rotate_right(1);
    }

    /// Raw code, for diagnostics.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Rotation distance (0..=7) from the initial code.
    pub fn phase(&self) -> usize {
        (0..8u32)
            .find(|k| INITIAL.rotate_left(*k) == self.0)
            .unwrap_or(0) as usize
    }

    pub fn coils(&self) -> [bool; 4] {
        HALF_STEP_TABLE[self.phase()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_rotations_return_to_start() {
        let mut up = WindingPattern::default();
        let mut down = WindingPattern::default();
        for _ in 0..8 {
            up.advance_up();
            down.advance_down();
        }
        assert_eq!(up, WindingPattern::default());
        assert_eq!(down, WindingPattern::default());
    }

    #[test]
    fn phase_follows_rotation() {
        let mut pattern = WindingPattern::default();
        for expected in 0..8 {
            assert_eq!(pattern.phase(), expected);
            pattern.advance_up();
        }

        let mut pattern = WindingPattern::default();
        pattern.advance_down();
        assert_eq!(pattern.bits(), 0b1000_0011);
        assert_eq!(pattern.phase(), 7);
    }

    #[test]
    fn coils_match_the_bit_positions_of_the_code() {
        // coil n is driven by bit 2n+1 of the code
        let mut pattern = WindingPattern::default();
        for _ in 0..8 {
            let from_bits: [bool; 4] =
                core::array::from_fn(|n| pattern.bits() & (1 << (2 * n + 1)) != 0);
            assert_eq!(pattern.coils(), from_bits);
            pattern.advance_up();
        }
    }

    #[test]
    fn neighbouring_phases_differ_in_one_coil() {
        for phase in 0..8 {
            let a = HALF_STEP_TABLE[phase];
            let b = HALF_STEP_TABLE[(phase + 1) % 8];
            let changed = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
            assert_eq!(changed, 1, "phase {phase} -> {}", (phase + 1) % 8);
        }
    }
}
