use std::time::Duration;

use pretty_assertions::assert_eq;
use swd_cortexm::{
    probe::fake_probe::Operation, CortexM, CortexMConfig, DebugProbeError, Demcr, Error,
    FakeProbe, RegisterName, Swd, SwdTransport, DEMCR, DHCSR_R,
};

fn fast_config() -> CortexMConfig {
    CortexMConfig::default().with_reset_settle_delay(Duration::from_millis(1))
}

/// A transport which answers every memory read with the same word.
struct StuckBus(u32);

impl SwdTransport for StuckBus {
    fn read_core_reg(&mut self, _index: usize) -> Result<u32, DebugProbeError> {
        Err(DebugProbeError::Timeout)
    }

    fn write_core_reg(&mut self, _index: usize, _value: u32) -> Result<(), DebugProbeError> {
        Err(DebugProbeError::Timeout)
    }

    fn read_core_regs(&mut self) -> Result<Vec<u32>, DebugProbeError> {
        Err(anyhow::anyhow!("bulk transfers are not supported").into())
    }

    fn read_word_32(&mut self, _address: u64) -> Result<u32, DebugProbeError> {
        Ok(self.0)
    }

    fn write_word_32(&mut self, _address: u64, _value: u32) -> Result<(), DebugProbeError> {
        Ok(())
    }
}

#[test]
fn halt_step_and_resume_a_cortex_m4() {
    let mut swd = Swd::new(FakeProbe::cortex_m4());
    let mut core = CortexM::with_config(&mut swd, fast_config()).expect("Failed to attach");

    assert_eq!(core.info(), "ARM/Cortex-M4");
    assert!(!core.core_halted().unwrap());

    core.halt().unwrap();
    assert!(core.core_halted().unwrap());

    core.step().unwrap();
    assert!(core.core_halted().unwrap());

    core.run().unwrap();
    assert!(!core.core_halted().unwrap());

    core.halt().unwrap();
    core.nodebug().unwrap();
    assert!(!core.core_halted().unwrap());
}

#[test]
fn reset_and_halt_then_reset() {
    let mut swd = Swd::new(FakeProbe::cortex_m4());

    {
        let mut core = CortexM::with_config(&mut swd, fast_config()).unwrap();

        core.reset_and_halt().unwrap();
        assert!(core.core_halted().unwrap());

        core.reset().unwrap();
        assert!(!core.core_halted().unwrap());
    }

    let probe = swd.into_probe();
    assert_eq!(probe.resets(), 2);
    assert_eq!(probe.word(Demcr::ADDRESS), Some(0));
}

#[test]
fn inspect_registers_of_a_halted_core() {
    let values: Vec<u32> = (0..19).map(|i| 0x2000_0000 + i).collect();
    let mut swd = Swd::new(FakeProbe::cortex_m4().with_core_registers(values));
    let mut core = CortexM::with_config(&mut swd, fast_config()).unwrap();

    core.halt().unwrap();

    let registers = core.read_all_core_regs().unwrap();
    assert_eq!(registers[&RegisterName::R0], 0x2000_0000);
    assert_eq!(registers[&RegisterName::Sp], 0x2000_000D);
    assert_eq!(registers[&RegisterName::Psp], 0x2000_0012);

    core.write_core_reg("lr", 0xFFFF_FFF9).unwrap();
    assert_eq!(core.read_core_reg("LR").unwrap(), 0xFFFF_FFF9);
}

#[test]
fn debug_registers_stay_reachable_through_the_service() {
    let mut swd = Swd::new(FakeProbe::cortex_m4());
    let mut core = CortexM::with_config(&mut swd, fast_config()).unwrap();

    core.halt().unwrap();
    core.swd().probe_mut().clear_operations();

    let mut dhcsr = core.swd().reg(DHCSR_R).unwrap();
    assert_eq!(dhcsr.get("C_DEBUGEN").unwrap(), 1);
    assert_eq!(dhcsr.cached().get("S_HALT").unwrap(), 1);

    core.swd().reg(DEMCR).unwrap().set("TRCENA", true).unwrap();

    assert_eq!(
        core.swd().probe().operations(),
        &[
            Operation::ReadWord32(0xE000_EDF0),
            Operation::ReadWord32(Demcr::ADDRESS),
            Operation::WriteWord32(Demcr::ADDRESS, 1 << 24),
        ]
    );
}

#[test]
fn unknown_device_is_rejected() {
    let mut swd = Swd::new(StuckBus(0xFFFF_FFFF));

    let error = CortexM::new(&mut swd).err().unwrap();
    assert_eq!(error.to_string(), "Unknown MCU with CPUID: 0xffffffff");
}

#[test]
fn boxed_transport() {
    let transport: Box<dyn SwdTransport> = Box::new(StuckBus(0x410F_C241));
    let mut swd = Swd::new(transport);
    let mut core = CortexM::with_config(&mut swd, fast_config()).unwrap();

    assert_eq!(core.to_string(), "ARM/Cortex-M4");

    assert!(matches!(
        core.read_core_reg("r3"),
        Err(Error::Probe(DebugProbeError::Timeout))
    ));

    let error = core.read_all_core_regs().unwrap_err();
    assert!(matches!(error, Error::Probe(DebugProbeError::Other(_))));
    assert_eq!(
        error.to_string(),
        "An error with the usage of the probe occurred"
    );
}
