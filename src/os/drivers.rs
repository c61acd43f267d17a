//! generic drivers module
//! This module defines the contract between the protocol engine and the
//! MAC driver pushing and popping frames on the wire.

// std
use std::io;

/// MacDriver Trait
///
/// One complete Ethernet frame per call, destination MAC through payload,
/// without the trailing CRC (stripped/appended by the MAC hardware).
pub trait MacDriver: Send + Sync {
    // get_frame() method
    // block until one complete frame has been copied into buf,
    // returning its length
    fn get_frame(&self, buf: &mut [u8]) -> io::Result<usize>;
    // put_frame() method
    // hand off a complete frame for transmission
    fn put_frame(&self, frame: &[u8]) -> io::Result<()>;
}

// pflag operation Enumerator
pub enum PflagOp {
    Set,
    Unset,
}
