//! The SWD transport this crate is layered on.
//!
//! Wire level details (AP/DP addressing, WAIT handling, retries) are the
//! business of the [`SwdTransport`] implementation.

/// An emulated Cortex-M core for tests and dry runs.
pub mod fake_probe;

/// Errors reported by a [`SwdTransport`].
///
/// They are passed through this crate untouched.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum DebugProbeError {
    /// The target did not acknowledge the SWD transaction.
    NoAcknowledge,
    /// The target answered the SWD transaction with a FAULT response.
    Fault,
    /// The operation timed out.
    Timeout,
    /// The core register index {0} is not supported by the probe.
    RegisterIndexOutOfRange(usize),
    /// {0}
    Other(#[from] anyhow::Error),
}

/// Blocking access to the registers of a single core through a debug probe.
///
/// Every call is exactly one round trip to the target.
pub trait SwdTransport {
    /// Read the core register with the given index.
    fn read_core_reg(&mut self, index: usize) -> Result<u32, DebugProbeError>;

    /// Write the core register with the given index.
    fn write_core_reg(&mut self, index: usize, value: u32) -> Result<(), DebugProbeError>;

    /// Read all core registers with a single bulk transfer, in index order.
    fn read_core_regs(&mut self) -> Result<Vec<u32>, DebugProbeError>;

    /// Read a 32 bit word from the memory mapped register at `address`.
    fn read_word_32(&mut self, address: u64) -> Result<u32, DebugProbeError>;

    /// Write a 32 bit word to the memory mapped register at `address`.
    fn write_word_32(&mut self, address: u64, value: u32) -> Result<(), DebugProbeError>;
}

impl<T: SwdTransport + ?Sized> SwdTransport for Box<T> {
    fn read_core_reg(&mut self, index: usize) -> Result<u32, DebugProbeError> {
        (**self).read_core_reg(index)
    }

    fn write_core_reg(&mut self, index: usize, value: u32) -> Result<(), DebugProbeError> {
        (**self).write_core_reg(index, value)
    }

    fn read_core_regs(&mut self) -> Result<Vec<u32>, DebugProbeError> {
        (**self).read_core_regs()
    }

    fn read_word_32(&mut self, address: u64) -> Result<u32, DebugProbeError> {
        (**self).read_word_32(address)
    }

    fn write_word_32(&mut self, address: u64, value: u32) -> Result<(), DebugProbeError> {
        (**self).write_word_32(address, value)
    }
}
