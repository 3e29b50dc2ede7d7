//! Simulation clock and per-component context.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::*;
use rand_pcg::Pcg64;

/// Shared simulation state: current time and the seeded random number generator.
///
/// Time is kept in nanoseconds because all XG-PON timing (frame slots, round trip times, service
/// intervals) is expressed in integer nanoseconds.
pub struct SimulationState {
    time: u64,
    rand: Pcg64,
}

impl SimulationState {
    /// Creates a state starting at time zero with the random generator seeded by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            time: 0,
            rand: Pcg64::seed_from_u64(seed),
        }
    }

    /// Returns the current simulation time in nanoseconds.
    pub fn time_nanos(&self) -> u64 {
        self.time
    }

    /// Moves the clock to `time` (nanoseconds).
    ///
    /// Panics if `time` is in the past.
    pub fn set_time(&mut self, time: u64) {
        assert!(
            time >= self.time,
            "Simulation time cannot go backwards: {} -> {}",
            self.time,
            time
        );
        self.time = time;
    }

    /// Returns a random float in the range _[0, 1)_.
    pub fn rand(&mut self) -> f64 {
        self.rand.gen_range(0.0..1.0)
    }

    /// Returns a random number in the specified range.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rand.gen_range(range)
    }

    /// Returns a random value from the specified distribution.
    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&mut self, dist: &Dist) -> T {
        dist.sample(&mut self.rand)
    }
}

/// A named handle to the shared simulation state held by every simulated component (OLT, ONUs).
///
/// Used by the logging macros, see [`log_debug!`](crate::log_debug!).
#[derive(Clone)]
pub struct SimulationContext {
    name: String,
    state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    /// Creates a context for component `name` bound to `state`.
    pub fn new(name: &str, state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            name: name.to_owned(),
            state,
        }
    }

    /// Returns the component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.state.borrow().time_nanos() as f64 / 1e9
    }

    /// Returns the current simulation time in nanoseconds.
    pub fn time_nanos(&self) -> u64 {
        self.state.borrow().time_nanos()
    }

    /// Returns a random float in the range _[0, 1)_.
    pub fn rand(&mut self) -> f64 {
        self.state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.state.borrow_mut().gen_range(range)
    }

    /// Returns a random value from the specified distribution.
    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&mut self, dist: &Dist) -> T {
        self.state.borrow_mut().sample_from_distribution(dist)
    }
}

#[cfg(test)]
mod tests {
    use sugars::{rc, refcell};

    use super::*;

    #[test]
    fn contexts_share_clock() {
        let state = rc!(refcell!(SimulationState::new(123)));
        let olt = SimulationContext::new("olt", state.clone());
        let onu = SimulationContext::new("onu-1", state.clone());
        state.borrow_mut().set_time(125_000);
        assert_eq!(olt.time_nanos(), 125_000);
        assert_eq!(onu.time(), 0.000125);
        assert_eq!(onu.name(), "onu-1");
    }

    #[test]
    fn same_seed_same_numbers() {
        let mut a = SimulationContext::new("a", rc!(refcell!(SimulationState::new(42))));
        let mut b = SimulationContext::new("b", rc!(refcell!(SimulationState::new(42))));
        for _ in 0..10 {
            assert_eq!(a.gen_range(0..1000), b.gen_range(0..1000));
        }
    }

    #[test]
    #[should_panic(expected = "backwards")]
    fn clock_is_monotonic() {
        let mut state = SimulationState::new(1);
        state.set_time(10);
        state.set_time(5);
    }
}
