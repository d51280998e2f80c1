// Host-side simulation of a print, for checking a configuration without a
// board attached.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};
use flagger::Flagger;
use print_state::{PrintSequencer, PrintStatus};
use stepper::{MotorLink, StepperDriver};

use crate::config::{Config, MAX_LAYERS};

/// Give up on prints that never finish (e.g. a zero-length tick budget).
const MAX_TICKS: u64 = 50_000_000;

#[derive(Clone, Default)]
struct SimPin {
    level: Rc<Cell<bool>>,
    rises: Rc<Cell<u32>>,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.level.get() {
            self.rises.set(self.rises.get() + 1);
        }
        self.level.set(true);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub layer: usize,
    pub tick: u64,
    pub target_steps: i32,
}

#[derive(Debug, Clone)]
pub struct DryRunReport {
    pub ticks: u64,
    pub seconds: f64,
    pub status: PrintStatus,
    pub entries: Vec<LayerEntry>,
    pub captures: u32,
    pub triggers: u32,
    pub final_position: i32,
}

/// Run the configured print to completion against simulated pins. Layers
/// waiting on an external trigger are released on the tick after they finish.
pub fn run(config: &Config) -> anyhow::Result<DryRunReport> {
    let link = MotorLink::new();
    let camera = SimPin::default();
    let mut driver = StepperDriver::new(
        &link,
        [
            SimPin::default(),
            SimPin::default(),
            SimPin::default(),
            SimPin::default(),
        ],
        config.stepper_config(),
    )?;

    let mut flags = Flagger::<4>::new();
    let mut seq = PrintSequencer::<_, MAX_LAYERS>::new(camera.clone(), config.geometry(), &mut flags)?;
    config.load_layers(&mut seq)?;
    seq.start(&link)?;

    let microsteps = config.microsteps_per_tick();
    let mut entries = vec![LayerEntry {
        layer: 0,
        tick: 0,
        target_steps: link.commanded_position(),
    }];
    let mut triggers = 0;
    let mut ticks = 0u64;

    while seq.status() == PrintStatus::Printing || seq.capture_in_flight() {
        if ticks >= MAX_TICKS {
            anyhow::bail!("print did not finish within {} ticks", MAX_TICKS);
        }

        for _ in 0..microsteps {
            driver.micro_step();
        }

        let layer = seq.active_layer();
        let waiting = seq.layer(layer).is_some_and(|l| l.requires_external_trigger);
        if seq.is_finished() && waiting && !seq.external_triggered() {
            seq.on_external_trigger();
            triggers += 1;
        }

        flags.tick();
        seq.tick(&mut flags, &link);
        ticks += 1;

        if seq.active_layer() != layer {
            entries.push(LayerEntry {
                layer: seq.active_layer(),
                tick: ticks,
                target_steps: link.commanded_position(),
            });
        }
    }

    Ok(DryRunReport {
        ticks,
        seconds: ticks as f64 * config.timing.tick_seconds,
        status: seq.status(),
        entries,
        captures: camera.rises.get(),
        triggers,
        final_position: link.position(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_print_runs_to_completion() {
        let config = Config::from_toml(include_str!("../lifter.toml.example")).unwrap();
        let report = run(&config).unwrap();

        assert_eq!(report.status, PrintStatus::Complete);
        assert_eq!(report.entries.len(), config.layers.len());

        let expected_captures: u32 = config
            .layers
            .iter()
            .map(|l| l.photo_before as u32 + l.photo_during as u32 + l.photo_after as u32)
            .sum();
        assert_eq!(report.captures, expected_captures);

        let expected_triggers = config.layers.iter().filter(|l| l.external_trigger).count();
        assert_eq!(report.triggers as usize, expected_triggers);

        let last = report.entries.last().unwrap();
        assert_eq!(report.final_position, last.target_steps);
        assert!(report.entries.windows(2).all(|w| w[0].tick < w[1].tick));
    }

    #[test]
    fn layer_waits_at_least_its_dwell() {
        let config = Config::from_toml(include_str!("../lifter.toml.example")).unwrap();
        let report = run(&config).unwrap();

        for (entry, next) in report.entries.iter().zip(report.entries.iter().skip(1)) {
            let layer = &config.layers[entry.layer];
            let dwell = (layer.delay_seconds / config.timing.tick_seconds).floor() as u64;
            assert!(next.tick - entry.tick >= dwell, "layer {} left early", entry.layer);
        }
    }
}
