//! Assembly of the sensor and actuator drivers from config.
//!
//! Without the `hardware` feature everything runs against a `SimulatedCup`.

use polar_traits::{Cooler, LoadCell, Thermometer};

pub struct Backend {
    pub thermometer: Box<dyn Thermometer>,
    pub load_cell: Box<dyn LoadCell>,
    pub cooler: Box<dyn Cooler>,
    pub scale: ScaleHandle,
}

/// Lets the simulator play the operator: emptying the scale, placing the
/// reference mass and putting the liquid back. No-ops on real hardware.
pub struct ScaleHandle {
    sim: Option<SimHandle>,
}

struct SimHandle {
    cup: polar_hardware::SimulatedCup,
    liquid_g: f32,
}

#[cfg_attr(feature = "hardware", allow(dead_code))]
fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Backend {
    #[cfg(not(feature = "hardware"))]
    pub fn open(_cfg: &polar_config::Config) -> eyre::Result<Self> {
        Ok(Self::simulated())
    }

    #[cfg(feature = "hardware")]
    pub fn open(cfg: &polar_config::Config) -> eyre::Result<Self> {
        use eyre::WrapErr;
        use polar_hardware::hardware::{HardwareLoadCell, HardwareThermometer, RelayCooler};

        let load_cell = HardwareLoadCell::try_new_with_timeout(
            cfg.pins.hx711_dt,
            cfg.pins.hx711_sck,
            cfg.hardware.sensor_read_timeout_ms,
        )
        .wrap_err("open hx711")?;
        let thermometer = HardwareThermometer::try_new(cfg.hardware.probe_i2c_addr)
            .wrap_err("open mlx90614 probe")?;
        let cooler =
            RelayCooler::try_new(cfg.pins.cooler, cfg.pins.cooler_aux).wrap_err("open cooler relay")?;
        tracing::info!(
            dt = cfg.pins.hx711_dt,
            sck = cfg.pins.hx711_sck,
            cooler = cfg.pins.cooler,
            "hardware backend ready"
        );
        Ok(Self {
            thermometer: Box::new(thermometer),
            load_cell: Box::new(load_cell),
            cooler: Box::new(cooler),
            scale: ScaleHandle { sim: None },
        })
    }

    /// Simulated cup; `POLAR_SIM_INITIAL_C` and `POLAR_SIM_MASS_G` override
    /// the starting temperature and liquid mass.
    #[cfg_attr(feature = "hardware", allow(dead_code))]
    pub fn simulated() -> Self {
        let mut params = polar_hardware::SimParams::default();
        if let Some(t) = env_f32("POLAR_SIM_INITIAL_C") {
            params.initial_c = t;
        }
        if let Some(m) = env_f32("POLAR_SIM_MASS_G") {
            params.mass = m;
        }
        let liquid_g = params.mass;
        let cup = polar_hardware::SimulatedCup::new(params);
        tracing::info!(
            initial_c = cup.temperature(),
            liquid_g,
            "simulation backend ready"
        );
        Self {
            thermometer: Box::new(cup.thermometer()),
            load_cell: Box::new(cup.load_cell()),
            cooler: Box::new(cup.cooler()),
            scale: ScaleHandle {
                sim: Some(SimHandle { cup, liquid_g }),
            },
        }
    }
}

impl ScaleHandle {
    pub fn is_simulated(&self) -> bool {
        self.sim.is_some()
    }

    /// Get the scale empty before a tare. The simulator empties itself; on
    /// hardware `confirm` must return Ok once the operator has cleared it.
    pub fn prepare_tare(&self, confirm: impl FnOnce() -> eyre::Result<()>) -> eyre::Result<()> {
        if self.is_simulated() {
            self.empty_scale();
            Ok(())
        } else {
            confirm()
        }
    }

    /// Take everything off the scale (simulation only).
    pub fn empty_scale(&self) {
        if let Some(sim) = &self.sim {
            sim.cup.set_mass(0.0);
        }
    }

    /// Put the reference mass on the scale (simulation only).
    pub fn place_reference(&self, grams: f32) {
        if let Some(sim) = &self.sim {
            sim.cup.set_mass(grams);
        }
    }

    /// Put the liquid back (simulation only).
    pub fn refill(&self) {
        if let Some(sim) = &self.sim {
            sim.cup.set_mass(sim.liquid_g);
        }
    }
}
