//! Names of the Cortex-M core registers and their transport indices.

use crate::Error;
use once_cell::sync::Lazy;
use std::{collections::HashMap, fmt, str::FromStr};

/// Number of core registers which can be accessed by name.
pub const CORE_REGISTER_COUNT: usize = 19;

/// A core register of a Cortex-M core.
///
/// The position of a variant is the index used on the wire, so the order of
/// the variants must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)] // General purpose registers R0-R12.
pub enum RegisterName {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    /// Stack pointer, banked between `MSP` and `PSP`.
    Sp,
    /// Link register.
    Lr,
    /// Program counter.
    Pc,
    /// Combined program status register.
    Psr,
    /// Main stack pointer.
    Msp,
    /// Process stack pointer.
    Psp,
}

static BY_NAME: Lazy<HashMap<&'static str, RegisterName>> = Lazy::new(|| {
    RegisterName::ALL
        .iter()
        .map(|register| (register.name(), *register))
        .collect()
});

impl RegisterName {
    /// All core registers, in index order.
    pub const ALL: [RegisterName; CORE_REGISTER_COUNT] = [
        RegisterName::R0,
        RegisterName::R1,
        RegisterName::R2,
        RegisterName::R3,
        RegisterName::R4,
        RegisterName::R5,
        RegisterName::R6,
        RegisterName::R7,
        RegisterName::R8,
        RegisterName::R9,
        RegisterName::R10,
        RegisterName::R11,
        RegisterName::R12,
        RegisterName::Sp,
        RegisterName::Lr,
        RegisterName::Pc,
        RegisterName::Psr,
        RegisterName::Msp,
        RegisterName::Psp,
    ];

    /// The index of the register understood by the transport.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The register with the given transport index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The canonical, upper case name of the register.
    pub const fn name(self) -> &'static str {
        match self {
            RegisterName::R0 => "R0",
            RegisterName::R1 => "R1",
            RegisterName::R2 => "R2",
            RegisterName::R3 => "R3",
            RegisterName::R4 => "R4",
            RegisterName::R5 => "R5",
            RegisterName::R6 => "R6",
            RegisterName::R7 => "R7",
            RegisterName::R8 => "R8",
            RegisterName::R9 => "R9",
            RegisterName::R10 => "R10",
            RegisterName::R11 => "R11",
            RegisterName::R12 => "R12",
            RegisterName::Sp => "SP",
            RegisterName::Lr => "LR",
            RegisterName::Pc => "PC",
            RegisterName::Psr => "PSR",
            RegisterName::Msp => "MSP",
            RegisterName::Psp => "PSP",
        }
    }
}

impl FromStr for RegisterName {
    type Err = Error;

    /// Parse a register name, ignoring case.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        BY_NAME
            .get(name.to_ascii_uppercase().as_str())
            .copied()
            .ok_or_else(|| Error::UnknownRegister(name.to_owned()))
    }
}

impl fmt::Display for RegisterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a register name to its transport index.
pub fn index_of(name: &str) -> Result<usize, Error> {
    name.parse::<RegisterName>().map(RegisterName::index)
}
