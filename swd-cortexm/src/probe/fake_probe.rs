#![allow(missing_docs)] // Don't require docs for test code
use std::collections::{HashMap, HashSet};

use bitfield::bitfield;

use super::{DebugProbeError, SwdTransport};
use crate::core::{Aircr, Cpuid, Demcr, DhcsrWrite, CORE_REGISTER_COUNT};
use crate::fields::WriteKey;

/// CPUID of a Cortex-M4 r0p1.
pub const CORTEX_M4_CPUID: u32 = 0x410F_C241;

bitfield! {
    #[derive(Copy, Clone)]
    struct DhcsrBits(u32);
    impl Debug;
    dbgkey, _: 31, 16;
    _, set_s_halt: 17;
    _, set_s_regrdy: 16;
    c_step, _: 2;
    c_halt, _: 1;
    c_debugen, _: 0;
}

bitfield! {
    #[derive(Copy, Clone)]
    struct AircrBits(u32);
    impl Debug;
    vectkey, _: 31, 16;
    sysresetreq, _: 2;
}

/// A single transaction seen by the [`FakeProbe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ReadCoreReg(usize),
    WriteCoreReg(usize, u32),
    ReadCoreRegs,
    ReadWord32(u64),
    WriteWord32(u64, u32),
}

/// This is a mock probe which can be used for mocking things in tests or for dry runs.
///
/// It behaves like a Cortex-M core behind an SWD link: DHCSR and AIRCR writes
/// are only accepted with the correct key, a halt request halts the core, and
/// a system reset request halts the core again if reset vector catch is enabled.
#[derive(Debug)]
pub struct FakeProbe {
    memory: HashMap<u64, u32>,
    core_registers: Vec<u32>,
    dhcsr: DhcsrBits,
    halted: bool,
    resets: usize,
    operations: Vec<Operation>,
    failing_addresses: HashSet<u64>,
    fail_core_registers: bool,
}

impl FakeProbe {
    /// A running core which reports `cpuid`.
    pub fn new(cpuid: u32) -> Self {
        let mut memory = HashMap::new();
        memory.insert(Cpuid::ADDRESS, cpuid);

        Self {
            memory,
            core_registers: vec![0; CORE_REGISTER_COUNT],
            dhcsr: DhcsrBits(0),
            halted: false,
            resets: 0,
            operations: Vec::new(),
            failing_addresses: HashSet::new(),
            fail_core_registers: false,
        }
    }

    /// A running Cortex-M4.
    pub fn cortex_m4() -> Self {
        Self::new(CORTEX_M4_CPUID)
    }

    /// Replace the core register file. The bulk read returns exactly these values.
    pub fn with_core_registers(mut self, values: Vec<u32>) -> Self {
        self.core_registers = values;
        self
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of system resets requested through AIRCR.
    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }

    /// All values written to `address`, oldest first.
    pub fn writes_to(&self, address: u64) -> Vec<u32> {
        self.operations
            .iter()
            .filter_map(|operation| match operation {
                Operation::WriteWord32(a, value) if *a == address => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Current content of a memory mapped register.
    pub fn word(&self, address: u64) -> Option<u32> {
        self.memory.get(&address).copied()
    }

    /// Let every access to `address` fail with [`DebugProbeError::NoAcknowledge`].
    pub fn fail_address(&mut self, address: u64) {
        self.failing_addresses.insert(address);
    }

    /// Let every core register access fail with [`DebugProbeError::NoAcknowledge`].
    pub fn fail_core_registers(&mut self) {
        self.fail_core_registers = true;
    }

    fn check_address(&self, address: u64) -> Result<(), DebugProbeError> {
        if self.failing_addresses.contains(&address) {
            tracing::trace!("[fake] access to {:#010x} fails", address);
            Err(DebugProbeError::NoAcknowledge)
        } else {
            Ok(())
        }
    }

    fn check_core_registers(&self) -> Result<(), DebugProbeError> {
        if self.fail_core_registers {
            Err(DebugProbeError::NoAcknowledge)
        } else {
            Ok(())
        }
    }

    fn write_dhcsr(&mut self, value: u32) {
        let request = DhcsrBits(value);
        if request.dbgkey() != WriteKey::Debug.value() {
            tracing::debug!("[fake] DHCSR write {:#010x} without DBGKEY ignored", value);
            return;
        }

        self.dhcsr = DhcsrBits(value & 0xffff);
        self.halted = request.c_debugen() && (request.c_halt() || request.c_step());
    }

    fn write_aircr(&mut self, value: u32) {
        let request = AircrBits(value);
        if request.vectkey() != WriteKey::Vector.value() {
            tracing::debug!("[fake] AIRCR write {:#010x} without VECTKEY ignored", value);
            return;
        }

        if request.sysresetreq() {
            self.system_reset();
        }
    }

    fn system_reset(&mut self) {
        self.resets += 1;

        let demcr = self.word(Demcr::ADDRESS).unwrap_or(0);
        let vector_catch = demcr & 1 == 1;

        self.halted = vector_catch && self.dhcsr.c_debugen();
        tracing::debug!("[fake] system reset, halted: {}", self.halted);
    }
}

impl SwdTransport for FakeProbe {
    fn read_core_reg(&mut self, index: usize) -> Result<u32, DebugProbeError> {
        self.operations.push(Operation::ReadCoreReg(index));
        self.check_core_registers()?;

        self.core_registers
            .get(index)
            .copied()
            .ok_or(DebugProbeError::RegisterIndexOutOfRange(index))
    }

    fn write_core_reg(&mut self, index: usize, value: u32) -> Result<(), DebugProbeError> {
        self.operations.push(Operation::WriteCoreReg(index, value));
        self.check_core_registers()?;

        let register = self
            .core_registers
            .get_mut(index)
            .ok_or(DebugProbeError::RegisterIndexOutOfRange(index))?;
        *register = value;
        Ok(())
    }

    fn read_core_regs(&mut self) -> Result<Vec<u32>, DebugProbeError> {
        self.operations.push(Operation::ReadCoreRegs);
        self.check_core_registers()?;

        Ok(self.core_registers.clone())
    }

    fn read_word_32(&mut self, address: u64) -> Result<u32, DebugProbeError> {
        self.operations.push(Operation::ReadWord32(address));
        self.check_address(address)?;

        let value = match address {
            DhcsrWrite::ADDRESS => {
                let mut dhcsr = DhcsrBits(self.dhcsr.0);
                dhcsr.set_s_halt(self.halted);
                // Register transfers always complete immediately.
                dhcsr.set_s_regrdy(true);
                dhcsr.0
            }
            Aircr::ADDRESS => {
                // VECTKEYSTAT reads as the inverted key.
                0xFA05_0000 | (self.word(address).unwrap_or(0) & 0xffff)
            }
            _ => self.word(address).unwrap_or(0),
        };

        tracing::trace!("[fake] read_word_32 {:#010x} = {:#010x}", address, value);
        Ok(value)
    }

    fn write_word_32(&mut self, address: u64, value: u32) -> Result<(), DebugProbeError> {
        self.operations.push(Operation::WriteWord32(address, value));
        self.check_address(address)?;

        tracing::trace!("[fake] write_word_32 {:#010x} = {:#010x}", address, value);

        match address {
            Cpuid::ADDRESS => {}
            DhcsrWrite::ADDRESS => self.write_dhcsr(value),
            Aircr::ADDRESS => self.write_aircr(value),
            _ => {
                self.memory.insert(address, value);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn halt_requires_debug_key() {
        let mut probe = FakeProbe::cortex_m4();

        probe.write_word_32(DhcsrWrite::ADDRESS, 0b11).unwrap();
        assert!(!probe.is_halted());

        probe.write_word_32(DhcsrWrite::ADDRESS, 0xA05F_0003).unwrap();
        assert!(probe.is_halted());

        let dhcsr = probe.read_word_32(DhcsrWrite::ADDRESS).unwrap();
        assert_eq!(dhcsr & (1 << 17), 1 << 17);
    }

    #[test]
    fn reset_with_vector_catch_halts() {
        let mut probe = FakeProbe::cortex_m4();

        probe.write_word_32(DhcsrWrite::ADDRESS, 0xA05F_0003).unwrap();
        probe.write_word_32(Demcr::ADDRESS, 1).unwrap();
        probe.write_word_32(Aircr::ADDRESS, 0x05FA_0004).unwrap();

        assert_eq!(probe.resets(), 1);
        assert!(probe.is_halted());
    }

    #[test]
    fn failing_address() {
        let mut probe = FakeProbe::cortex_m4();
        probe.fail_address(Cpuid::ADDRESS);

        assert!(matches!(
            probe.read_word_32(Cpuid::ADDRESS),
            Err(DebugProbeError::NoAcknowledge)
        ));
    }
}
