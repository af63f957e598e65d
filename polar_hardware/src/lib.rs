//! Drivers for the cup: a deterministic simulation (default) and, behind the
//! `hardware` feature, the HX711 load cell, MLX90614 IR probe and cooling relay.
pub mod error;
pub mod util;

#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod mlx90614;
#[cfg(feature = "hardware")]
pub mod relay;

use polar_traits::{BoxError, Cooler, LoadCell, Thermometer};
use std::cell::RefCell;
use std::rc::Rc;

/// Physical parameters of the simulated cup.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub ambient_c: f32,
    pub initial_c: f32,
    /// °C removed per thermometer read while the cooler is engaged.
    pub cooling_per_read_c: f32,
    /// Fraction of the gap to ambient recovered per read while idle.
    pub warming_ratio: f32,
    /// Liquid mass on the scale (grams).
    pub mass: f32,
    /// Raw counts per gram reported by the simulated amplifier.
    pub counts_per_gram: f32,
    /// Raw reading with nothing on the scale.
    pub zero_counts: i32,
    /// Peak amplitude of the pseudo-random read noise (counts).
    pub noise_counts: i32,
    /// Inject a full-scale spike every N load-cell reads (0 disables).
    pub spike_every: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            ambient_c: 24.0,
            initial_c: 30.0,
            cooling_per_read_c: 0.5,
            warming_ratio: 0.02,
            mass: 350.0,
            counts_per_gram: 420.0,
            zero_counts: 8_400,
            noise_counts: 40,
            spike_every: 0,
        }
    }
}

#[derive(Debug)]
struct CupState {
    params: SimParams,
    temperature_c: f32,
    cooling: bool,
    reads: u32,
    rng: u32,
}

impl CupState {
    fn next_noise(&mut self) -> i32 {
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let amp = self.params.noise_counts;
        if amp <= 0 {
            return 0;
        }
        let span = u32::try_from(2 * amp + 1).unwrap_or(1);
        i32::try_from(x % span).unwrap_or(0) - amp
    }
}

/// Simulated cup. Handles returned by [`SimulatedCup::thermometer`],
/// [`SimulatedCup::load_cell`] and [`SimulatedCup::cooler`] share one state,
/// so engaging the cooler lowers subsequent temperature readings.
#[derive(Debug, Clone)]
pub struct SimulatedCup {
    state: Rc<RefCell<CupState>>,
}

impl Default for SimulatedCup {
    fn default() -> Self {
        Self::new(SimParams::default())
    }
}

impl SimulatedCup {
    pub fn new(params: SimParams) -> Self {
        let temperature_c = params.initial_c;
        Self {
            state: Rc::new(RefCell::new(CupState {
                params,
                temperature_c,
                cooling: false,
                reads: 0,
                rng: 0x1234_5678,
            })),
        }
    }

    pub fn thermometer(&self) -> SimulatedThermometer {
        SimulatedThermometer { cup: self.clone() }
    }

    pub fn load_cell(&self) -> SimulatedLoadCell {
        SimulatedLoadCell { cup: self.clone() }
    }

    pub fn cooler(&self) -> SimulatedCooler {
        SimulatedCooler { cup: self.clone() }
    }

    /// Change the mass on the scale (e.g. place a calibration weight).
    pub fn set_mass(&self, grams: f32) {
        self.state.borrow_mut().params.mass = grams;
    }

    pub fn is_cooling(&self) -> bool {
        self.state.borrow().cooling
    }

    pub fn temperature(&self) -> f32 {
        self.state.borrow().temperature_c
    }
}

pub struct SimulatedThermometer {
    cup: SimulatedCup,
}

impl Thermometer for SimulatedThermometer {
    fn read_celsius(&mut self) -> Result<f32, BoxError> {
        let mut s = self.cup.state.borrow_mut();
        let t = s.temperature_c;
        let next = if s.cooling {
            t - s.params.cooling_per_read_c
        } else {
            t + (s.params.ambient_c - t) * s.params.warming_ratio
        };
        s.temperature_c = next;
        tracing::trace!(temperature_c = t, cooling = s.cooling, "sim probe read");
        Ok(t)
    }
}

pub struct SimulatedLoadCell {
    cup: SimulatedCup,
}

impl LoadCell for SimulatedLoadCell {
    fn read(&mut self, _timeout: std::time::Duration) -> Result<i32, BoxError> {
        let mut s = self.cup.state.borrow_mut();
        s.reads = s.reads.wrapping_add(1);
        if s.params.spike_every > 0 && s.reads % s.params.spike_every == 0 {
            tracing::trace!(reads = s.reads, "sim load cell spike");
            return Ok(0x7F_FFFF);
        }
        let counts = s.params.mass * s.params.counts_per_gram;
        let noise = s.next_noise();
        let raw = s
            .params
            .zero_counts
            .saturating_add(counts.round() as i32)
            .saturating_add(noise);
        Ok(raw)
    }
}

pub struct SimulatedCooler {
    cup: SimulatedCup,
}

impl Cooler for SimulatedCooler {
    fn set_cooling(&mut self, on: bool) -> Result<(), BoxError> {
        let mut s = self.cup.state.borrow_mut();
        if s.cooling != on {
            tracing::debug!(on, "sim cooler switched");
        }
        s.cooling = on;
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub mod hardware {
    //! `polar_traits` implementations over the real peripherals.
    use super::*;
    use crate::error::HwError;
    use crate::hx711::Hx711;
    use crate::mlx90614::Mlx90614;
    use crate::relay::Relay;
    use std::time::Duration;

    pub struct HardwareLoadCell {
        hx711: Hx711,
        data_ready_timeout: Duration,
    }

    impl HardwareLoadCell {
        /// Open the HX711 on channel A, gain 128.
        pub fn try_new_with_timeout(
            dt_pin: u8,
            sck_pin: u8,
            data_ready_timeout_ms: u64,
        ) -> Result<Self, HwError> {
            let gpio = rppal::gpio::Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let dt = gpio
                .get(dt_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_input();
            let sck = gpio
                .get(sck_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output();
            Ok(Self {
                hx711: Hx711::new(dt, sck, 1)?,
                data_ready_timeout: Duration::from_millis(data_ready_timeout_ms),
            })
        }
    }

    impl LoadCell for HardwareLoadCell {
        fn read(&mut self, timeout: Duration) -> Result<i32, BoxError> {
            let timeout = timeout.min(self.data_ready_timeout).max(Duration::from_millis(1));
            let mut attempts = 0;
            let max_attempts = 3;
            loop {
                match self.hx711.read_with_timeout(timeout) {
                    Ok(raw) => {
                        tracing::debug!(raw, "hx711 sample");
                        return Ok(raw);
                    }
                    Err(HwError::DataReadyTimeout) if attempts < max_attempts => {
                        attempts += 1;
                        tracing::warn!(retries = attempts, "load cell timeout, retrying");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "load cell read error");
                        return Err(Box::new(e));
                    }
                }
            }
        }
    }

    pub struct HardwareThermometer {
        probe: Mlx90614,
    }

    impl HardwareThermometer {
        pub fn try_new(addr: u16) -> Result<Self, HwError> {
            Ok(Self {
                probe: Mlx90614::open(addr)?,
            })
        }
    }

    impl Thermometer for HardwareThermometer {
        fn read_celsius(&mut self) -> Result<f32, BoxError> {
            Ok(self.probe.object_celsius()?)
        }
    }

    pub struct RelayCooler {
        relay: Relay,
    }

    impl RelayCooler {
        pub fn try_new(pin: u8, aux_pin: Option<u8>) -> Result<Self, HwError> {
            Ok(Self {
                relay: Relay::open(pin, aux_pin)?,
            })
        }
    }

    impl Cooler for RelayCooler {
        fn set_cooling(&mut self, on: bool) -> Result<(), BoxError> {
            self.relay.set(on);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quiet() -> SimParams {
        SimParams {
            noise_counts: 0,
            ..SimParams::default()
        }
    }

    #[test]
    fn cooling_lowers_temperature() {
        let cup = SimulatedCup::new(quiet());
        let mut probe = cup.thermometer();
        let mut cooler = cup.cooler();
        let t0 = probe.read_celsius().unwrap();
        cooler.set_cooling(true).unwrap();
        let _ = probe.read_celsius().unwrap();
        let t2 = probe.read_celsius().unwrap();
        assert!(t2 < t0, "expected {t2} < {t0}");
        assert!(cup.is_cooling());
    }

    #[test]
    fn idle_cup_drifts_towards_ambient() {
        let cup = SimulatedCup::new(quiet());
        let mut probe = cup.thermometer();
        for _ in 0..200 {
            let _ = probe.read_celsius().unwrap();
        }
        assert!((cup.temperature() - 24.0).abs() < 0.2);
    }

    #[test]
    fn load_cell_reports_mass_in_counts() {
        let cup = SimulatedCup::new(quiet());
        let mut cell = cup.load_cell();
        let raw = cell.read(Duration::from_millis(10)).unwrap();
        assert_eq!(raw, 8_400 + 350 * 420);
        cup.set_mass(0.0);
        assert_eq!(cell.read(Duration::from_millis(10)).unwrap(), 8_400);
    }

    #[test]
    fn noise_stays_within_amplitude() {
        let cup = SimulatedCup::new(SimParams {
            mass: 0.0,
            ..SimParams::default()
        });
        let mut cell = cup.load_cell();
        for _ in 0..500 {
            let raw = cell.read(Duration::from_millis(10)).unwrap();
            assert!((raw - 8_400).abs() <= 40, "raw {raw} outside noise band");
        }
    }

    #[test]
    fn spikes_are_injected_periodically() {
        let cup = SimulatedCup::new(SimParams {
            spike_every: 3,
            ..quiet()
        });
        let mut cell = cup.load_cell();
        let reads: Vec<i32> = (0..6)
            .map(|_| cell.read(Duration::from_millis(10)).unwrap())
            .collect();
        assert_eq!(reads[2], 0x7F_FFFF);
        assert_eq!(reads[5], 0x7F_FFFF);
        assert_ne!(reads[0], 0x7F_FFFF);
    }
}
