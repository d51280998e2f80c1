use embedded_hal::digital::OutputPin;
use flagger::{FlagError, FlagId, TimedFlags};
use heapless::Vec;
use stepper::Axis;

use crate::states::{Activation, CaptureLength, LayerState, PrintStatus};

/// Physical constants the sequencer converts layer settings with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintGeometry {
    /// Seconds per logic tick.
    pub tick_seconds: f64,
    /// Lift travel per motor step, in millimetres.
    pub step_size_mm: f64,
    /// Motor position of the resin surface.
    pub resin_reference_steps: i32,
    pub short_capture_ticks: u32,
    pub long_capture_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("layer {index} is beyond the layer table ({capacity} layers)")]
    LayerOutOfRange { index: usize, capacity: usize },
    #[error("layer {index} would leave a gap after {configured} configured layers")]
    LayerGap { index: usize, configured: usize },
    #[error("invalid layer delay: {0} s")]
    InvalidDelay(f64),
    #[error("invalid layer height: {0} mm")]
    InvalidHeight(f64),
    #[error("invalid print geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("no layers configured")]
    NoLayers,
    #[error("cannot change the print while it is running")]
    PrintInProgress,
    #[error(transparent)]
    Flags(#[from] FlagError),
}

const TICK_EPSILON: f64 = 1e-9;

fn set_output<P: OutputPin>(pin: &mut P, level: bool) {
    let _ = if level { pin.set_high() } else { pin.set_low() };
}

/// Walks the lift through the configured layers.
///
/// Each layer is entered by commanding its height, dwells once the axis has
/// settled, optionally photographs before/during/after the dwell and
/// optionally waits for an external trigger before the next layer is entered.
/// Nothing here blocks: [`tick`](Self::tick) does at most one step of work per
/// call.
pub struct PrintSequencer<C, const N: usize> {
    camera: C,
    geometry: PrintGeometry,
    layers: Vec<LayerState, N>,
    dwell_flag: FlagId,
    picture_flag: FlagId,

    status: PrintStatus,
    active_layer: usize,
    finished: bool,
    external_triggered: bool,
    capture_in_flight: bool,
    activation: Activation,
}

impl<C: OutputPin, const N: usize> PrintSequencer<C, N> {
    /// Registers one dwell flag and one picture flag with `flags`.
    pub fn new<F: TimedFlags>(
        mut camera: C,
        geometry: PrintGeometry,
        flags: &mut F,
    ) -> Result<Self, ConfigError> {
        if !(geometry.tick_seconds.is_finite() && geometry.tick_seconds > 0.0) {
            return Err(ConfigError::InvalidGeometry("tick duration must be positive"));
        }
        if !(geometry.step_size_mm.is_finite() && geometry.step_size_mm > 0.0) {
            return Err(ConfigError::InvalidGeometry("step size must be positive"));
        }

        let dwell_flag = flags.register(false)?;
        let picture_flag = flags.register(false)?;
        set_output(&mut camera, false);

        Ok(PrintSequencer {
            camera,
            geometry,
            layers: Vec::new(),
            dwell_flag,
            picture_flag,
            status: PrintStatus::Idle,
            active_layer: 0,
            finished: false,
            external_triggered: false,
            capture_in_flight: false,
            activation: Activation::default(),
        })
    }

    /// Store layer `index`, converting seconds to ticks and millimetres above
    /// the resin to absolute motor steps.
    #[allow(clippy::too_many_arguments)]
    pub fn configure_layer(
        &mut self,
        index: usize,
        delay_seconds: f64,
        height_from_resin_mm: f64,
        photo_before: bool,
        photo_during: bool,
        photo_after: bool,
        requires_external_trigger: bool,
    ) -> Result<(), ConfigError> {
        if !(delay_seconds.is_finite() && delay_seconds >= 0.0) {
            return Err(ConfigError::InvalidDelay(delay_seconds));
        }
        // Whole ticks only. The epsilon keeps 0.03 / 0.01 at 3 rather than 2.
        let ticks = (delay_seconds / self.geometry.tick_seconds + TICK_EPSILON).floor();
        if ticks > u32::MAX as f64 {
            return Err(ConfigError::InvalidDelay(delay_seconds));
        }

        let steps = (height_from_resin_mm / self.geometry.step_size_mm).round()
            + self.geometry.resin_reference_steps as f64;
        if !(steps.is_finite() && (i32::MIN as f64..=i32::MAX as f64).contains(&steps)) {
            return Err(ConfigError::InvalidHeight(height_from_resin_mm));
        }

        self.configure_layer_raw(
            index,
            LayerState {
                delay_ticks: ticks as u32,
                target_height_steps: steps as i32,
                photo_before,
                photo_during,
                photo_after,
                requires_external_trigger,
            },
        )
    }

    /// Store an already converted layer.
    pub fn configure_layer_raw(&mut self, index: usize, layer: LayerState) -> Result<(), ConfigError> {
        if self.status.is_active() {
            return Err(ConfigError::PrintInProgress);
        }
        if index >= N {
            return Err(ConfigError::LayerOutOfRange { index, capacity: N });
        }

        let configured = self.layers.len();
        if index < configured {
            self.layers[index] = layer;
        } else if index == configured {
            // capacity checked above
            let _ = self.layers.push(layer);
        } else {
            return Err(ConfigError::LayerGap { index, configured });
        }

        log::debug!("Layer {} configured: {:?}", index, layer);
        Ok(())
    }

    /// Enter layer 0 and command its height.
    pub fn start<A: Axis>(&mut self, axis: &A) -> Result<(), ConfigError> {
        if self.status.is_active() {
            return Err(ConfigError::PrintInProgress);
        }
        if self.layers.is_empty() {
            return Err(ConfigError::NoLayers);
        }

        log::info!("Starting print: {} layers", self.layers.len());
        self.status = PrintStatus::Printing;
        self.external_triggered = false;
        self.enter_layer(0, axis);
        Ok(())
    }

    /// Stop the lift where it is and end the print. A capture already in
    /// flight still runs to completion.
    pub fn abort<F: TimedFlags, A: Axis>(&mut self, flags: &mut F, axis: &A) {
        axis.stop();
        flags.disable(self.dwell_flag);
        flags.clear(self.dwell_flag);
        self.finished = false;
        if self.status.is_active() {
            log::warn!("Print aborted at layer {}", self.active_layer);
        }
        self.status = PrintStatus::Aborted;
    }

    /// Latch the external trigger. Only a trigger that arrives after the
    /// active layer has finished releases it.
    pub fn on_external_trigger(&mut self) {
        log::debug!("External trigger latched");
        self.external_triggered = true;
    }

    /// One logic tick. Call after the flag service has ticked.
    ///
    /// A tick that ends a capture does nothing else, so the camera pin rests
    /// low for at least one tick between two captures.
    pub fn tick<F: TimedFlags, A: Axis>(&mut self, flags: &mut F, axis: &A) {
        if self.resolve_picture(flags) {
            return;
        }

        if !self.status.is_active() || self.capture_in_flight {
            return;
        }
        self.check_dwell(flags);

        if self.capture_in_flight {
            return;
        }
        self.advance(flags, axis);
    }

    /// Lower the camera pin once the picture flag fires. True if it did.
    fn resolve_picture<F: TimedFlags>(&mut self, flags: &mut F) -> bool {
        if !flags.get(self.picture_flag) {
            return false;
        }
        set_output(&mut self.camera, false);
        self.capture_in_flight = false;
        flags.disable(self.picture_flag);
        flags.clear(self.picture_flag);
        true
    }

    fn check_dwell<F: TimedFlags>(&mut self, flags: &mut F) {
        if !flags.get(self.dwell_flag) {
            return;
        }

        let layer = self.layers[self.active_layer];
        if layer.photo_after && !self.activation.taken_after {
            self.activation.taken_after = true;
            self.capture(flags, CaptureLength::Short);
        } else {
            log::debug!("Layer {} finished", self.active_layer);
            self.finished = true;
            self.external_triggered = false;
            flags.clear(self.dwell_flag);
        }
    }

    fn advance<F: TimedFlags, A: Axis>(&mut self, flags: &mut F, axis: &A) {
        let layer = self.layers[self.active_layer];

        if self.finished {
            if layer.requires_external_trigger && !self.external_triggered {
                return;
            }
            self.finished = false;
            self.external_triggered = false;

            let next = self.active_layer + 1;
            if next < self.layers.len() {
                self.enter_layer(next, axis);
            } else {
                log::info!("Print complete after {} layers", self.layers.len());
                self.status = PrintStatus::Complete;
            }
        } else if axis.is_settled() {
            if !self.activation.dwell_armed {
                self.activation.dwell_armed = true;
                flags.arm(self.dwell_flag, layer.delay_ticks);
            } else if layer.photo_before && !self.activation.taken_before {
                self.activation.taken_before = true;
                self.capture(flags, CaptureLength::Short);
            } else if layer.photo_during && !self.activation.taken_during {
                self.activation.taken_during = true;
                self.capture(flags, CaptureLength::Long);
            }
        }
    }

    fn enter_layer<A: Axis>(&mut self, index: usize, axis: &A) {
        let target = self.layers[index].target_height_steps;
        self.active_layer = index;
        self.finished = false;
        self.activation = Activation::default();
        axis.set_target(target);
        log::info!("Layer {}: moving to {} steps", index, target);
    }

    fn capture<F: TimedFlags>(&mut self, flags: &mut F, length: CaptureLength) {
        let ticks = match length {
            CaptureLength::Short => self.geometry.short_capture_ticks,
            CaptureLength::Long => self.geometry.long_capture_ticks,
        };
        set_output(&mut self.camera, true);
        flags.arm(self.picture_flag, ticks);
        self.capture_in_flight = true;
        log::info!("Layer {}: {:?} capture for {} ticks", self.active_layer, length, ticks);
    }

    pub fn status(&self) -> PrintStatus {
        self.status
    }

    pub fn active_layer(&self) -> usize {
        self.active_layer
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn external_triggered(&self) -> bool {
        self.external_triggered
    }

    pub fn capture_in_flight(&self) -> bool {
        self.capture_in_flight
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn layer(&self, index: usize) -> Option<&LayerState> {
        self.layers.get(index)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn geometry(&self) -> &PrintGeometry {
        &self.geometry
    }
}
