use print_state::{ConfigError, PrintGeometry, PrintSequencer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use stepper::StepperConfig;

/// Layer table size compiled into the firmware.
pub const MAX_LAYERS: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub stepper: StepperSection,
    pub timing: TimingConfig,
    pub geometry: GeometryConfig,
    pub camera: CameraConfig,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepperSection {
    pub micro_steps: u8,
    pub hold_torque: u8,
    /// Period of the microstep timer.
    pub microstep_period_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub tick_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub step_size_mm: f64,
    #[serde(default)]
    pub resin_reference_steps: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub short_ticks: u32,
    pub long_ticks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub delay_seconds: f64,
    pub height_from_resin_mm: f64,
    #[serde(default)]
    pub photo_before: bool,
    #[serde(default)]
    pub photo_during: bool,
    #[serde(default)]
    pub photo_after: bool,
    #[serde(default)]
    pub external_trigger: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // Try external file first
        if Path::new("lifter.toml").exists() {
            let config_content = fs::read_to_string("lifter.toml")?;
            let config = Self::from_toml(&config_content)?;
            log::info!("Loaded configuration from file");
            Ok(config)
        } else {
            // Fallback to embedded defaults
            let config = Self::from_toml(include_str!("../lifter.toml.example"))?;
            log::warn!("Using embedded default configuration");
            Ok(config)
        }
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.layers.len() > MAX_LAYERS {
            anyhow::bail!(
                "{} layers configured, the firmware holds at most {}",
                config.layers.len(),
                MAX_LAYERS
            );
        }
        Ok(config)
    }

    /// Fill the sequencer's layer table from the `[[layers]]` list.
    pub fn load_layers<C, const N: usize>(
        &self,
        sequencer: &mut PrintSequencer<C, N>,
    ) -> Result<(), ConfigError>
    where
        C: embedded_hal::digital::OutputPin,
    {
        for (index, layer) in self.layers.iter().enumerate() {
            sequencer.configure_layer(
                index,
                layer.delay_seconds,
                layer.height_from_resin_mm,
                layer.photo_before,
                layer.photo_during,
                layer.photo_after,
                layer.external_trigger,
            )?;
        }
        log::info!("Configured {} layers", self.layers.len());
        Ok(())
    }
}

// Helper functions for easy access
impl Config {
    pub fn stepper_config(&self) -> StepperConfig {
        StepperConfig {
            micro_steps: self.stepper.micro_steps,
            hold_torque: self.stepper.hold_torque,
        }
    }

    pub fn geometry(&self) -> PrintGeometry {
        PrintGeometry {
            tick_seconds: self.timing.tick_seconds,
            step_size_mm: self.geometry.step_size_mm,
            resin_reference_steps: self.geometry.resin_reference_steps,
            short_capture_ticks: self.camera.short_ticks,
            long_capture_ticks: self.camera.long_ticks,
        }
    }

    /// Microstep timer callbacks per logic tick, at least one.
    pub fn microsteps_per_tick(&self) -> u32 {
        let period_s = self.stepper.microstep_period_us.max(1) as f64 * 1e-6;
        (self.timing.tick_seconds / period_s).round().max(1.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagger::Flagger;

    const MINIMAL: &str = r#"
        [stepper]
        micro_steps = 4
        hold_torque = 2
        microstep_period_us = 500

        [timing]
        tick_seconds = 0.01

        [geometry]
        step_size_mm = 0.002

        [camera]
        short_ticks = 10
        long_ticks = 150

        [[layers]]
        delay_seconds = 2.0
        height_from_resin_mm = 0.05
        photo_after = true

        [[layers]]
        delay_seconds = 1.0
        height_from_resin_mm = 0.1
        external_trigger = true
    "#;

    struct NullPin;

    impl embedded_hal::digital::ErrorType for NullPin {
        type Error = core::convert::Infallible;
    }

    impl embedded_hal::digital::OutputPin for NullPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn embedded_example_parses() {
        let config = Config::from_toml(include_str!("../lifter.toml.example")).unwrap();
        assert!(!config.layers.is_empty());
        assert!(config.stepper.micro_steps > 0);
    }

    #[test]
    fn optional_fields_default() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.geometry.resin_reference_steps, 0);
        assert!(!config.layers[0].photo_before);
        assert!(config.layers[0].photo_after);
        assert!(config.layers[1].external_trigger);
        assert_eq!(config.microsteps_per_tick(), 20);
    }

    #[test]
    fn layers_reach_the_sequencer() {
        let config = Config::from_toml(MINIMAL).unwrap();
        let mut flags = Flagger::<2>::new();
        let mut seq =
            PrintSequencer::<_, MAX_LAYERS>::new(NullPin, config.geometry(), &mut flags).unwrap();
        config.load_layers(&mut seq).unwrap();

        assert_eq!(seq.layer_count(), 2);
        let first = seq.layer(0).unwrap();
        assert_eq!(first.delay_ticks, 200);
        assert_eq!(first.target_height_steps, 25);
        assert!(seq.layer(1).unwrap().requires_external_trigger);
    }

    #[test]
    fn missing_section_is_an_error() {
        assert!(Config::from_toml("[timing]\ntick_seconds = 0.01\n").is_err());
    }
}
