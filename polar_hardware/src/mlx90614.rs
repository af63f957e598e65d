use rppal::i2c::I2c;
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::mlx_word_to_celsius;

/// RAM register holding the object (liquid surface) temperature.
const REG_TOBJ1: u8 = 0x07;

/// MLX90614 infrared thermometer on the primary I2C bus (SMBus word reads).
pub struct Mlx90614 {
    i2c: I2c,
}

impl Mlx90614 {
    pub fn open(addr: u16) -> Result<Self> {
        let mut i2c = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(addr)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(Self { i2c })
    }

    pub fn object_celsius(&mut self) -> Result<f32> {
        let word = self
            .i2c
            .smbus_read_word(REG_TOBJ1)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        trace!(word, "mlx90614 object word");
        mlx_word_to_celsius(word)
    }
}
