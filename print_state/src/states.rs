// State types for the print sequencer.

/// One configured layer: where to go, how long to stay, what to photograph.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct LayerState {
    /// Dwell after arrival, in logic ticks.
    pub delay_ticks: u32,
    /// Absolute lift position, resin reference included.
    pub target_height_steps: i32,
    pub photo_before: bool,
    pub photo_during: bool,
    pub photo_after: bool,
    /// Hold the finished layer until an external trigger arrives.
    pub requires_external_trigger: bool,
}

/// - Idle: configured (or not), `start` not called yet
/// - Printing: a layer is active
/// - Complete: the last layer finished
/// - Aborted: stopped by the host
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum PrintStatus {
    Idle,
    Printing,
    Complete,
    Aborted,
}

impl PrintStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, PrintStatus::Printing)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, PrintStatus::Complete | PrintStatus::Aborted)
    }
}

/// Progress through one activation of a layer. Replaced wholesale whenever a
/// layer is entered.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Activation {
    pub dwell_armed: bool,
    pub taken_before: bool,
    pub taken_during: bool,
    pub taken_after: bool,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum CaptureLength {
    /// Quick snapshot.
    Short,
    /// Extended exposure taken while the layer dwells.
    Long,
}
