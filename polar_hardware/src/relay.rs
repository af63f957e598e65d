use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};

/// Cooling relay (active low) with an optional auxiliary line driven the
/// opposite way, e.g. a heat-sink fan that runs while the plate is on.
pub struct Relay {
    plate: OutputPin,
    aux: Option<OutputPin>,
}

impl Relay {
    pub fn open(pin: u8, aux_pin: Option<u8>) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut plate = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        plate.set_high(); // off at boot
        let aux = match aux_pin {
            Some(p) => {
                let mut out = gpio
                    .get(p)
                    .map_err(|e| HwError::Gpio(e.to_string()))?
                    .into_output();
                out.set_low();
                Some(out)
            }
            None => None,
        };
        Ok(Self { plate, aux })
    }

    pub fn set(&mut self, on: bool) {
        if on {
            self.plate.set_low();
        } else {
            self.plate.set_high();
        }
        if let Some(aux) = self.aux.as_mut() {
            if on {
                aux.set_high();
            } else {
                aux.set_low();
            }
        }
    }
}
