use std::{
    io::{self, Read, Write},
    thread::sleep,
    time::Duration,
};

use log::debug;
use serialport::{ClearBuffer, SerialPort};

use crate::connection::Transport;

/// Time the DTR line is held low to reset the board hosting the programmer
const RESET_PULSE: Duration = Duration::from_millis(250);

/// Wrapper around SerialPort where platform-specific modifications can be implemented.
pub struct Interface {
    pub serial_port: Box<dyn SerialPort>,
}

impl Interface {
    pub fn new(serial: Box<dyn SerialPort>) -> Self {
        Self {
            serial_port: serial,
        }
    }

    /// Pulse DTR/RTS to reset the board running the programmer firmware, then
    /// give it `settle` to start up
    pub fn reset_board(&mut self, settle: Duration) -> Result<(), serialport::Error> {
        debug!("Resetting programmer board, settling for {}ms", settle.as_millis());

        self.serial_port.write_data_terminal_ready(false)?;
        self.serial_port.write_request_to_send(false)?;

        sleep(RESET_PULSE);

        self.serial_port.write_data_terminal_ready(true)?;
        self.serial_port.write_request_to_send(true)?;

        sleep(settle);

        self.serial_port.clear(ClearBuffer::All)
    }
}

// Note: this impl is necessary because using `dyn SerialPort` as `dyn Read`
// requires trait_upcasting which isn't stable yet.
impl Read for Interface {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.serial_port.read(buf)
    }
}

impl Write for Interface {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.serial_port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.serial_port.flush()
    }
}

impl Transport for Interface {
    fn clear_input(&mut self) -> io::Result<()> {
        self.serial_port
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}
