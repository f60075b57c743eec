//! Read the fuse and lock bit registers of a target device
//!
//! The [FuseReader] ties a [ProgrammingSession] to the [Device] it was
//! identified as, and reads those registers the device actually implements.

use log::{debug, warn};
use strum::IntoEnumIterator;

use crate::{
    connection::{Programmer, ProgrammingSession},
    device::{Device, DeviceDatabase, Signature},
    error::Error,
    fuse::FuseGroup,
};

/// Raw value of one register, as read from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub group: FuseGroup,
    pub raw: u8,
}

/// Identified target held in programming mode
pub struct FuseReader<'a, P: Programmer + ?Sized> {
    session: ProgrammingSession<'a, P>,
    device: Device,
    signature: Signature,
}

impl<'a, P: Programmer + ?Sized> FuseReader<'a, P> {
    /// Enter programming mode and identify the target
    ///
    /// The device is looked up by its signature, unless `device` names one
    /// explicitly; a mismatching signature is then only warned about.
    pub fn connect(
        programmer: &'a mut P,
        database: &DeviceDatabase,
        device: Option<&str>,
    ) -> Result<Self, Error> {
        let mut session = ProgrammingSession::open(programmer)?;
        let signature = session.read_signature()?;

        let device = match device {
            Some(name) => {
                let device = database.device(name)?;
                if device.signature != signature {
                    warn!(
                        "Detected signature {} does not match {} ({}), continuing anyway",
                        signature, device.name, device.signature
                    );
                }
                device
            }
            None if signature.is_blank() => return Err(Error::NoTarget(signature)),
            None => database
                .find_by_signature(signature)
                .ok_or_else(|| Error::UnknownSignature {
                    signature,
                    known: database.names(),
                })?,
        };
        debug!("Using definition of {}", device.name);

        Ok(Self {
            session,
            device: device.clone(),
            signature,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Signature as read from the target
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Read one register, or `None` if the device does not implement it
    pub fn read(&mut self, group: FuseGroup) -> Result<Option<Register>, Error> {
        if self.device.table(group).is_empty() {
            debug!("{} has no {} register, skipping", self.device.name, group);
            return Ok(None);
        }

        let raw = self.session.read_group(group)?;
        Ok(Some(Register { group, raw }))
    }

    /// Read every implemented register in order (low, high and extended
    /// fuse, then the lock bits), handing each one to `f` as soon as it has
    /// been read
    ///
    /// Stops at the first failing read or callback.
    pub fn read_each<F, E>(&mut self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&Device, Register) -> Result<(), E>,
        E: From<Error>,
    {
        for group in FuseGroup::iter() {
            if let Some(register) = self.read(group)? {
                f(&self.device, register)?;
            }
        }

        Ok(())
    }

    /// Read every implemented register, see [Self::read_each]
    pub fn read_all(&mut self) -> Result<Vec<Register>, Error> {
        let mut registers = Vec::new();

        self.read_each(|_, register| {
            registers.push(register);
            Ok::<_, Error>(())
        })?;

        Ok(registers)
    }

    /// Leave programming mode
    pub fn close(self) -> Result<(), Error> {
        self.session.close()
    }
}
