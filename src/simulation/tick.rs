/// Tick counter resources and cadence run conditions.
use bevy::prelude::*;

/// Current simulation tick counter. Increments every tick, never resets
/// (except when a save is restored).
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct SimulationTick(pub u64);

impl SimulationTick {
    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn increment(&mut self) {
        self.0 += 1;
    }

    pub fn set(&mut self, tick: u64) {
        self.0 = tick;
    }
}

/// Global simulation state. Headless servers tick every frame; tests can
/// pause to inspect intermediate state.
#[derive(Resource, Debug, Clone)]
pub struct SimulationState {
    pub should_tick: bool,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self { should_tick: true }
    }
}

/// System that advances the tick counter. Must run before every phased set.
pub fn advance_tick(state: Res<SimulationState>, mut tick: ResMut<SimulationTick>) {
    if state.should_tick {
        tick.increment();
    }
}

// ============================================================================
// RUN CONDITIONS
// ============================================================================

/// Run condition: simulation is ticking this frame.
pub fn should_tick(state: Res<SimulationState>) -> bool {
    state.should_tick
}

/// Run condition: execute on ticks where `(tick + offset) % every == 0`.
///
/// Usage:
/// ```ignore
/// .add_systems(Update, status_snapshot.run_if(every_n_ticks(60, 0)))
/// ```
pub fn every_n_ticks(every: u64, offset: u64) -> impl Fn(Res<SimulationTick>) -> bool + Clone {
    move |tick: Res<SimulationTick>| every != 0 && (tick.0 + offset) % every == 0
}

/// Re-entry guard for handlers that may be scheduled more than once within
/// a tick. `mark` returns false when the tick was already processed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickStamp(Option<u64>);

impl TickStamp {
    pub fn mark(&mut self, tick: u64) -> bool {
        if self.0 == Some(tick) {
            return false;
        }
        self.0 = Some(tick);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_increment() {
        let mut tick = SimulationTick::default();
        assert_eq!(tick.get(), 0);
        tick.increment();
        tick.increment();
        assert_eq!(tick.get(), 2);
    }

    #[test]
    fn test_cadence_with_offset() {
        let cond = |every: u64, offset: u64, tick: u64| (tick + offset) % every == 0;
        assert!(cond(60, 0, 0));
        assert!(!cond(60, 0, 59));
        assert!(cond(60, 0, 120));
        assert!(cond(60, 30, 30));
        assert!(!cond(60, 30, 60));
    }

    #[test]
    fn test_tick_stamp_guards_reentry() {
        let mut stamp = TickStamp::default();
        assert!(stamp.mark(5));
        assert!(!stamp.mark(5));
        assert!(stamp.mark(6));
    }
}
