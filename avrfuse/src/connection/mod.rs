//! Establish a programming session with a target device
//!
//! A [Programmer] is anything able to put the target into serial programming
//! mode and exchange 4-byte serial programming instructions with it. The
//! [ProgrammingSession] guard keeps the target in programming mode for as
//! long as it is alive, and releases it again when dropped.

use log::{debug, warn};

pub use self::stk500::{ArduinoIsp, Transport};
use crate::{device::Signature, error::Error, fuse::FuseGroup};

mod stk500;

/// Access to a target's serial programming interface
pub trait Programmer {
    /// Hold the target in reset and enable serial programming
    fn enter_programming_mode(&mut self) -> Result<(), Error>;

    /// Release the target's reset line
    fn leave_programming_mode(&mut self) -> Result<(), Error>;

    /// Send a 4-byte serial programming instruction, returning the byte
    /// clocked out by the target during the last instruction byte
    fn universal(&mut self, instruction: [u8; 4]) -> Result<u8, Error>;
}

impl<P: Programmer + ?Sized> Programmer for Box<P> {
    fn enter_programming_mode(&mut self) -> Result<(), Error> {
        (**self).enter_programming_mode()
    }

    fn leave_programming_mode(&mut self) -> Result<(), Error> {
        (**self).leave_programming_mode()
    }

    fn universal(&mut self, instruction: [u8; 4]) -> Result<u8, Error> {
        (**self).universal(instruction)
    }
}

/// A target held in programming mode
///
/// Transactions are strictly sequential: every read completes before the
/// next instruction is sent.
pub struct ProgrammingSession<'a, P: Programmer + ?Sized> {
    programmer: &'a mut P,
    active: bool,
}

impl<'a, P: Programmer + ?Sized> ProgrammingSession<'a, P> {
    /// Enter programming mode
    ///
    /// If entering fails part way through, the target is released again
    /// before the error is returned.
    pub fn open(programmer: &'a mut P) -> Result<Self, Error> {
        debug!("Entering programming mode");

        if let Err(e) = programmer.enter_programming_mode() {
            if let Err(release) = programmer.leave_programming_mode() {
                debug!("Failed to release target after error: {:?}", release);
            }
            return Err(e);
        }

        Ok(Self {
            programmer,
            active: true,
        })
    }

    /// Read the three signature bytes
    pub fn read_signature(&mut self) -> Result<Signature, Error> {
        let mut signature = [0u8; 3];

        for (index, byte) in (0u8..).zip(signature.iter_mut()) {
            *byte = self.programmer.universal(Signature::read_instruction(index))?;
        }

        let signature = Signature(signature);
        debug!("Read signature {}", signature);

        Ok(signature)
    }

    /// Read the raw value of a fuse or lock bit register
    pub fn read_group(&mut self, group: FuseGroup) -> Result<u8, Error> {
        let value = self.programmer.universal(group.read_instruction())?;
        debug!("Read {} register: {:#04x}", group, value);

        Ok(value)
    }

    /// Leave programming mode, reporting any failure to do so
    pub fn close(mut self) -> Result<(), Error> {
        self.active = false;
        debug!("Leaving programming mode");

        self.programmer.leave_programming_mode()
    }
}

impl<P: Programmer + ?Sized> Drop for ProgrammingSession<'_, P> {
    fn drop(&mut self) {
        if self.active {
            debug!("Leaving programming mode");

            if let Err(e) = self.programmer.leave_programming_mode() {
                warn!("Failed to leave programming mode: {}", e);
            }
        }
    }
}
