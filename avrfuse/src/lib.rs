//! Read and decode the fuses and lock bits of AVR microcontrollers
//!
//! The [fuse] module holds the decoder, which turns a raw register byte into
//! named fields using a per-device [FieldTable]. It performs no I/O and can
//! be used on its own. The [device] module provides the field tables of
//! known devices, and [connection] and [reader] read the registers of a
//! target through an in-system programmer.
//!
//! ## Cargo Features
//!
//! - `cli`: the command-line interface, its configuration file, and the
//!   `avrfuse` binary (enabled by default)
//! - `serialport`: connecting to a programmer over a serial port (enabled by
//!   `cli`)

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use self::{
    device::{Device, DeviceDatabase, Signature},
    error::Error,
    fuse::{decode, Decoded, DecodedField, FieldSpec, FieldTable, FuseGroup, Warning},
};

#[cfg(feature = "cli")]
pub mod cli;
pub mod connection;
pub mod device;
pub mod error;
pub mod fuse;
#[cfg(feature = "serialport")]
pub mod interface;
#[cfg(feature = "cli")]
pub mod logging;
pub mod reader;
