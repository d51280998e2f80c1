use embedded_hal::digital::OutputPin;

use crate::link::{Direction, MotorLink};
use crate::pattern::WindingPattern;
use crate::StepperError;

/// Microstepping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperConfig {
    /// Timer ticks per physical half-step (U). Must be at least 1.
    pub micro_steps: u8,
    /// Ticks out of every U that the coils stay energized while holding.
    pub hold_torque: u8,
}

impl Default for StepperConfig {
    fn default() -> Self {
        StepperConfig {
            micro_steps: 4,
            hold_torque: 4,
        }
    }
}

fn set_output<P: OutputPin>(pin: &mut P, level: bool) {
    // Pin errors are not observable from the step loop.
    let _ = if level { pin.set_high() } else { pin.set_low() };
}

/// Half-step driver for a four-coil motor.
///
/// Owns the coil pins and is the only writer of the link's current position
/// and direction. Run [`micro_step`](Self::micro_step) from the high-rate
/// timer, or [`step`](Self::step) for coarse single steps.
pub struct StepperDriver<'a, P> {
    link: &'a MotorLink,
    coils: [P; 4],
    pattern: WindingPattern,
    microstep_counter: u8,
    micro_steps: u8,
    hold_torque: u8,
}

impl<'a, P: OutputPin> StepperDriver<'a, P> {
    pub fn new(
        link: &'a MotorLink,
        coils: [P; 4],
        config: StepperConfig,
    ) -> Result<Self, StepperError> {
        if config.micro_steps == 0 {
            return Err(StepperError::ZeroMicroSteps);
        }

        let hold_torque = if config.hold_torque > config.micro_steps {
            log::warn!(
                "Hold torque {} exceeds {} micro-steps, clamping to continuous hold",
                config.hold_torque,
                config.micro_steps
            );
            config.micro_steps
        } else {
            config.hold_torque
        };

        Ok(StepperDriver {
            link,
            coils,
            pattern: WindingPattern::default(),
            microstep_counter: 0,
            micro_steps: config.micro_steps,
            hold_torque,
        })
    }

    pub fn set_target(&self, position: i32) {
        self.link.set_target(position);
    }

    pub fn move_relative(&self, direction: Direction, steps: i32) {
        self.link.move_relative(direction, steps);
    }

    pub fn move_one(&self, direction: Direction) {
        self.link.move_one(direction);
    }

    pub fn stop(&self) {
        self.link.stop();
    }

    /// Declare the current location to be 0 and drop any pending move.
    pub fn zero(&mut self) {
        self.link.reset();
    }

    /// Coarse step: at most one half-step toward the commanded position.
    pub fn step(&mut self) {
        let current = self.link.position();
        let commanded = self.link.commanded_position();

        if current == commanded {
            self.link.store_direction(Direction::Stable);
        } else {
            self.advance(current, commanded);
        }
    }

    /// Timer tick. Commits a half-step once every `micro_steps` calls while
    /// moving; duty-cycles the coils while holding.
    pub fn micro_step(&mut self) {
        self.microstep_counter = (self.microstep_counter % self.micro_steps) + 1;

        let current = self.link.position();
        let commanded = self.link.commanded_position();

        if current == commanded {
            self.link.store_direction(Direction::Stable);
            if self.microstep_counter <= self.hold_torque {
                self.energize();
            } else {
                self.release_coils();
            }
        } else if self.microstep_counter == 1 {
            self.advance(current, commanded);
        }
    }

    fn advance(&mut self, current: i32, commanded: i32) {
        if current < commanded {
            self.link.store_direction(Direction::Up);
            self.link.store_position(current + 1);
            self.pattern.advance_up();
        } else {
            self.link.store_direction(Direction::Down);
            self.link.store_position(current - 1);
            self.pattern.advance_down();
        }
        self.energize();
    }

    fn energize(&mut self) {
        let levels = self.pattern.coils();
        for (pin, level) in self.coils.iter_mut().zip(levels) {
            set_output(pin, level);
        }
    }

    fn release_coils(&mut self) {
        for pin in self.coils.iter_mut() {
            set_output(pin, false);
        }
    }

    pub fn position(&self) -> i32 {
        self.link.position()
    }

    pub fn commanded_position(&self) -> i32 {
        self.link.commanded_position()
    }

    pub fn direction(&self) -> Direction {
        self.link.direction()
    }

    pub fn pattern(&self) -> WindingPattern {
        self.pattern
    }

    pub fn hold_torque(&self) -> u8 {
        self.hold_torque
    }

    pub fn link(&self) -> &'a MotorLink {
        self.link
    }

    pub fn into_inner(self) -> [P; 4] {
        self.coils
    }
}
