pub mod flagger {
    use heapless::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlagId(usize);

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum FlagError {
        #[error("flag table is full ({0} flags)")]
        Full(usize),
    }

    /// Countdown latches driven by the logic tick.
    ///
    /// A flag armed with `n` ticks raises after `n` ticks and stays raised
    /// until cleared.
    pub trait TimedFlags {
        fn register(&mut self, enabled: bool) -> Result<FlagId, FlagError>;
        /// Restart the countdown, lower the flag and enable counting.
        fn arm(&mut self, id: FlagId, ticks: u32);
        fn get(&self, id: FlagId) -> bool;
        fn clear(&mut self, id: FlagId);
        /// Stop counting without raising.
        fn disable(&mut self, id: FlagId);
    }

    #[derive(Debug, Default, Clone, Copy)]
    struct Slot {
        enabled: bool,
        raised: bool,
        remaining: u32,
    }

    /// Fixed-capacity [`TimedFlags`] service.
    #[derive(Debug, Default)]
    pub struct Flagger<const N: usize> {
        slots: Vec<Slot, N>,
    }

    impl<const N: usize> Flagger<N> {
        pub const fn new() -> Self {
            Flagger { slots: Vec::new() }
        }

        /// Advance every running countdown by one tick. Call once per logic
        /// tick, before anything reads the flags.
        pub fn tick(&mut self) {
            for slot in self.slots.iter_mut() {
                if !slot.enabled || slot.raised {
                    continue;
                }
                slot.remaining = slot.remaining.saturating_sub(1);
                if slot.remaining == 0 {
                    slot.raised = true;
                    slot.enabled = false;
                }
            }
        }

        pub fn is_enabled(&self, id: FlagId) -> bool {
            self.slots.get(id.0).is_some_and(|s| s.enabled)
        }

        pub fn remaining(&self, id: FlagId) -> Option<u32> {
            self.slots.get(id.0).map(|s| s.remaining)
        }
    }

    impl<const N: usize> TimedFlags for Flagger<N> {
        fn register(&mut self, enabled: bool) -> Result<FlagId, FlagError> {
            let id = FlagId(self.slots.len());
            self.slots
                .push(Slot {
                    enabled,
                    ..Slot::default()
                })
                .map_err(|_| FlagError::Full(N))?;
            log::debug!("Registered flag {:?} (enabled: {})", id, enabled);
            Ok(id)
        }

        fn arm(&mut self, id: FlagId, ticks: u32) {
            if let Some(slot) = self.slots.get_mut(id.0) {
                slot.remaining = ticks;
                slot.raised = false;
                slot.enabled = true;
            }
        }

        fn get(&self, id: FlagId) -> bool {
            self.slots.get(id.0).is_some_and(|s| s.raised)
        }

        fn clear(&mut self, id: FlagId) {
            if let Some(slot) = self.slots.get_mut(id.0) {
                slot.raised = false;
            }
        }

        fn disable(&mut self, id: FlagId) {
            if let Some(slot) = self.slots.get_mut(id.0) {
                slot.enabled = false;
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn raises_after_armed_ticks() {
            let mut flags = Flagger::<2>::new();
            let id = flags.register(false).unwrap();
            flags.arm(id, 3);

            flags.tick();
            flags.tick();
            assert!(!flags.get(id));
            flags.tick();
            assert!(flags.get(id));

            // Latched until cleared.
            flags.tick();
            assert!(flags.get(id));
            flags.clear(id);
            assert!(!flags.get(id));

            // One-shot: no re-raise without re-arming.
            flags.tick();
            assert!(!flags.get(id));
        }

        #[test]
        fn zero_ticks_raises_on_next_tick() {
            let mut flags = Flagger::<1>::new();
            let id = flags.register(false).unwrap();
            flags.arm(id, 0);
            assert!(!flags.get(id));
            flags.tick();
            assert!(flags.get(id));
        }

        #[test]
        fn disabled_flag_never_raises() {
            let mut flags = Flagger::<1>::new();
            let id = flags.register(false).unwrap();
            flags.arm(id, 2);
            flags.tick();
            flags.disable(id);
            for _ in 0..5 {
                flags.tick();
            }
            assert!(!flags.get(id));
            assert_eq!(flags.remaining(id), Some(1));
        }

        #[test]
        fn rearm_restarts_countdown() {
            let mut flags = Flagger::<1>::new();
            let id = flags.register(true).unwrap();
            flags.arm(id, 2);
            flags.tick();
            flags.arm(id, 2);
            flags.tick();
            assert!(!flags.get(id));
            flags.tick();
            assert!(flags.get(id));
        }

        #[test]
        fn flags_count_independently() {
            let mut flags = Flagger::<2>::new();
            let a = flags.register(false).unwrap();
            let b = flags.register(false).unwrap();
            flags.arm(a, 1);
            flags.arm(b, 4);
            flags.tick();
            assert!(flags.get(a));
            assert!(!flags.get(b));
            assert!(flags.is_enabled(b));
        }

        #[test]
        fn table_capacity_is_enforced() {
            let mut flags = Flagger::<1>::new();
            flags.register(false).unwrap();
            assert_eq!(flags.register(false), Err(FlagError::Full(1)));
        }
    }
}

pub use flagger::{FlagError, FlagId, Flagger, TimedFlags};
