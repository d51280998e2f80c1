use core::sync::atomic::{AtomicI32, AtomicU8, Ordering};

/// Which way the lift is moving, as last observed by the driver.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Direction {
    Down,
    Up,
    Stable,
}

impl Direction {
    fn to_raw(self) -> u8 {
        match self {
            Direction::Down => 0,
            Direction::Up => 1,
            Direction::Stable => 2,
        }
    }

    fn from_raw(raw: u8) -> Direction {
        match raw {
            0 => Direction::Down,
            1 => Direction::Up,
            _ => Direction::Stable,
        }
    }
}

/// A positionable lift axis as seen by the print sequencer.
pub trait Axis {
    fn set_target(&self, position: i32);
    fn stop(&self);
    fn direction(&self) -> Direction;
    fn position(&self) -> i32;
    fn commanded_position(&self) -> i32;

    /// True once the driver has reached the commanded position and reported
    /// it. A target issued since the last step is not yet settled.
    fn is_settled(&self) -> bool {
        self.direction() == Direction::Stable && self.position() == self.commanded_position()
    }
}

/// Motor state shared between the microstep timer and the logic loop.
///
/// The command side (`set_target`, `move_relative`, `stop`) only writes the
/// commanded position. The current position and direction are written only by
/// the [`StepperDriver`](crate::StepperDriver) holding this link, which needs
/// `&mut` access to itself to do so. Everything is atomic so the link can be a
/// `static` read from both contexts.
#[derive(Debug)]
pub struct MotorLink {
    current: AtomicI32,
    commanded: AtomicI32,
    direction: AtomicU8,
}

impl Default for MotorLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorLink {
    pub const fn new() -> Self {
        MotorLink {
            current: AtomicI32::new(0),
            commanded: AtomicI32::new(0),
            direction: AtomicU8::new(2),
        }
    }

    /// Overwrite the commanded position. The caller owns the range.
    pub fn set_target(&self, position: i32) {
        self.commanded.store(position, Ordering::Release);
    }

    /// Shift the commanded position by `steps` in `direction`.
    pub fn move_relative(&self, direction: Direction, steps: i32) {
        match direction {
            Direction::Up => {
                self.commanded.fetch_add(steps, Ordering::AcqRel);
            }
            Direction::Down => {
                self.commanded.fetch_sub(steps, Ordering::AcqRel);
            }
            Direction::Stable => (),
        }
    }

    /// Shift the commanded position by a single step.
    pub fn move_one(&self, direction: Direction) {
        self.move_relative(direction, 1);
    }

    /// Halt where the motor is now. No deceleration.
    pub fn stop(&self) {
        self.commanded
            .store(self.current.load(Ordering::Acquire), Ordering::Release);
    }

    pub fn position(&self) -> i32 {
        self.current.load(Ordering::Acquire)
    }

    pub fn commanded_position(&self) -> i32 {
        self.commanded.load(Ordering::Acquire)
    }

    pub fn direction(&self) -> Direction {
        Direction::from_raw(self.direction.load(Ordering::Acquire))
    }

    // Driver side. Only reachable through `StepperDriver`.

    pub(crate) fn store_position(&self, position: i32) {
        self.current.store(position, Ordering::Release);
    }

    pub(crate) fn store_direction(&self, direction: Direction) {
        self.direction.store(direction.to_raw(), Ordering::Release);
    }

    pub(crate) fn reset(&self) {
        self.current.store(0, Ordering::Release);
        self.commanded.store(0, Ordering::Release);
    }
}

impl Axis for MotorLink {
    fn set_target(&self, position: i32) {
        MotorLink::set_target(self, position)
    }

    fn stop(&self) {
        MotorLink::stop(self)
    }

    fn direction(&self) -> Direction {
        MotorLink::direction(self)
    }

    fn position(&self) -> i32 {
        MotorLink::position(self)
    }

    fn commanded_position(&self) -> i32 {
        MotorLink::commanded_position(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_moves_accumulate() {
        let link = MotorLink::new();
        link.move_relative(Direction::Up, 1);
        link.move_relative(Direction::Up, 10);
        link.move_relative(Direction::Down, 4);
        link.move_relative(Direction::Stable, 100);
        assert_eq!(link.commanded_position(), 7);
        assert_eq!(link.position(), 0);
    }

    #[test]
    fn single_step_moves() {
        let link = MotorLink::new();
        link.move_one(Direction::Up);
        link.move_one(Direction::Up);
        link.move_one(Direction::Down);
        link.move_one(Direction::Stable);
        assert_eq!(link.commanded_position(), 1);
    }

    #[test]
    fn new_target_is_not_settled_until_observed() {
        let link = MotorLink::new();
        assert!(link.is_settled());
        link.set_target(5);
        // Direction is still the stale Stable reading from the driver.
        assert_eq!(link.direction(), Direction::Stable);
        assert!(!link.is_settled());
    }

    #[test]
    fn stop_drops_target_to_current() {
        let link = MotorLink::new();
        link.store_position(12);
        link.set_target(40);
        link.stop();
        assert_eq!(link.commanded_position(), 12);
    }
}
