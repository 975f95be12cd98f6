//! Linux i2c-dev 后端
//!
//! 打开 `/dev/i2c-N`，用 `I2C_SLAVE` ioctl 绑定从设备地址后，
//! 寄存器写入即为一次 `write(2)`：`[register, data...]`。

use crate::{BusError, RegisterBus};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use tracing::{debug, error};

/// `linux/i2c-dev.h` 中的 `I2C_SLAVE`
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// `/dev/i2c-N` 上的单个从设备
pub struct I2cDevBus {
    file: File,
    address: u16,
}

impl I2cDevBus {
    /// 打开总线 `bus` 并绑定从设备地址
    pub fn open(bus: u8, address: u16) -> Result<Self, BusError> {
        let path = format!("/dev/i2c-{}", bus);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // SAFETY: fd 在 file 生命周期内有效，I2C_SLAVE 只读取整数参数
        let ret = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                I2C_SLAVE as _,
                address as libc::c_ulong,
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            error!("Failed to bind {} to address {:#04x}: {}", path, address, err);
            return Err(BusError::Device {
                address,
                message: err.to_string(),
            });
        }

        debug!("Opened {} at address {:#04x}", path, address);
        Ok(Self { file, address })
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.file.write_all(bytes).map_err(|e| BusError::Device {
            address: self.address,
            message: e.to_string(),
        })
    }
}

impl RegisterBus for I2cDevBus {
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.write_all(&[register, value])
    }

    fn write_word(&mut self, register: u8, value: u16) -> Result<(), BusError> {
        let [low, high] = value.to_le_bytes();
        self.write_all(&[register, low, high])
    }
}
