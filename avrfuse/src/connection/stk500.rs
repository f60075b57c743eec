//! STK500 version 1 protocol, as spoken by the ArduinoISP sketch
//!
//! Every command is terminated by [CRC_EOP]. The programmer answers with
//! [RESP_INSYNC], any response payload, and a final status byte which is
//! [RESP_OK] on success.

use std::{
    io::{self, Read, Write},
    thread::sleep,
    time::Duration,
};

use log::debug;

use super::Programmer;
use crate::error::{ConnectionError, Error};

const CMD_GET_SYNC: u8 = 0x30;
const CMD_ENTER_PROGMODE: u8 = 0x50;
const CMD_LEAVE_PROGMODE: u8 = 0x51;
const CMD_UNIVERSAL: u8 = 0x56;

const CRC_EOP: u8 = 0x20;

const RESP_OK: u8 = 0x10;
const RESP_INSYNC: u8 = 0x14;

const MAX_SYNC_ATTEMPTS: usize = 10;
/// Time to let stray bytes arrive before discarding them
const SYNC_RETRY_DELAY: Duration = Duration::from_millis(50);

/// A byte stream connected to the programmer
pub trait Transport: Read + Write {
    /// Discard any bytes which have been received but not read yet
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Programmer running the ArduinoISP sketch (or any other STK500v1 device)
pub struct ArduinoIsp<T> {
    transport: T,
}

impl<T: Transport> ArduinoIsp<T> {
    /// Wrap an already opened transport; no bytes are exchanged yet
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Establish sync with the programmer
    ///
    /// Any pending input (e.g. output of a bootloader) is discarded between
    /// attempts.
    pub fn sync(&mut self) -> Result<(), Error> {
        for attempt in 1..=MAX_SYNC_ATTEMPTS {
            self.transport.clear_input()?;

            match self.command(&[CMD_GET_SYNC], 0) {
                Ok(_) => {
                    debug!("In sync with programmer after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err(e) => {
                    debug!("Failed to sync, error {:?}, retrying", e);
                    sleep(SYNC_RETRY_DELAY);
                }
            }
        }

        Err(Error::Connection(ConnectionError::ConnectionFailed))
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Write a command and read its `response_len` byte payload
    fn command(&mut self, command: &[u8], response_len: usize) -> Result<Vec<u8>, Error> {
        debug!("Writing command: {:02x?}", command);

        self.transport.write_all(command)?;
        self.transport.write_all(&[CRC_EOP])?;
        self.transport.flush()?;

        let mut insync = [0u8];
        self.transport.read_exact(&mut insync)?;
        if insync[0] != RESP_INSYNC {
            return Err(ConnectionError::NotInSync(insync[0]).into());
        }

        let mut response = vec![0u8; response_len];
        self.transport.read_exact(&mut response)?;

        let mut status = [0u8];
        self.transport.read_exact(&mut status)?;
        if status[0] != RESP_OK {
            return Err(ConnectionError::Failed(status[0]).into());
        }

        Ok(response)
    }
}

impl<T: Transport> Programmer for ArduinoIsp<T> {
    fn enter_programming_mode(&mut self) -> Result<(), Error> {
        self.command(&[CMD_ENTER_PROGMODE], 0)?;
        Ok(())
    }

    fn leave_programming_mode(&mut self) -> Result<(), Error> {
        self.command(&[CMD_LEAVE_PROGMODE], 0)?;
        Ok(())
    }

    fn universal(&mut self, instruction: [u8; 4]) -> Result<u8, Error> {
        let mut command = [CMD_UNIVERSAL; 5];
        command[1..].copy_from_slice(&instruction);

        let response = self.command(&command, 1)?;
        Ok(response[0])
    }
}

#[cfg(feature = "serialport")]
mod serial {
    use std::time::Duration;

    use log::debug;
    use serialport::FlowControl;

    use super::ArduinoIsp;
    use crate::{error::Error, interface::Interface};

    const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    impl ArduinoIsp<Interface> {
        /// Open the serial port, reset the board hosting the programmer and
        /// wait `settle` for it to boot before syncing
        pub fn open(port_name: &str, baud: u32, settle: Duration) -> Result<Self, Error> {
            debug!("Opening {} at {} baud", port_name, baud);

            let serial = serialport::new(port_name, baud)
                .flow_control(FlowControl::None)
                .timeout(DEFAULT_TIMEOUT)
                .open()?;

            let mut interface = Interface::new(serial);
            interface.reset_board(settle)?;

            let mut programmer = Self::new(interface);
            programmer.sync()?;

            Ok(programmer)
        }
    }
}
