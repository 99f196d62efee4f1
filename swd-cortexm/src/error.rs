use crate::config::ConfigError;
use crate::fields::FieldError;
use crate::probe::DebugProbeError;

/// The overarching error type of this crate.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum Error {
    /// '{0}' is not a Cortex-M core register.
    UnknownRegister(String),
    /// Unknown MCU with CPUID: {raw_cpuid:#010x}
    DeviceNotDetected {
        /// The raw CPUID value which failed the identity check.
        raw_cpuid: u32,
    },
    /// The debug register '{0}' has not been registered.
    UnknownDebugRegister(String),
    /// The probe returned {actual} core register values, but {expected} were expected.
    IncompleteRegisterRead {
        /// Number of core registers.
        expected: usize,
        /// Number of values the probe returned.
        actual: usize,
    },
    /// An error with the usage of the probe occurred
    Probe(#[from] DebugProbeError),
    /// Invalid access to a register field
    Field(#[from] FieldError),
    /// Invalid configuration
    Config(#[from] ConfigError),
}
