//! Halting debug control of a Cortex-M core.

use std::{collections::BTreeMap, fmt};

use super::{
    debug_registers::{register_debug_registers, AIRCR, CPUID, DEMCR, DHCSR_R, DHCSR_W},
    registers::{RegisterName, CORE_REGISTER_COUNT},
};
use crate::{
    config::CortexMConfig,
    fields::{Bitfield, FieldError, FieldValue},
    probe::SwdTransport,
    Error, Swd,
};

/// Extract implementer and core name from a CPUID value.
///
/// Returns `None` if the core is not a known ARM Cortex-M core.
fn identify(cpuid: &Bitfield) -> Result<Option<(&'static str, &'static str)>, FieldError> {
    let implementer = cpuid.get_named("IMPLEMENTER")?;
    let core = cpuid.get_named("PARTNO")?;

    Ok(match (implementer, core) {
        (Some(implementer @ "ARM"), Some(core)) => Some((implementer, core)),
        _ => None,
    })
}

/// A Cortex-M core attached through a [`Swd`] link.
///
/// The controller does not track the state of the core. Each operation writes
/// the debug registers for its target state, and [`CortexM::core_halted`]
/// always asks the core.
pub struct CortexM<'probe, T> {
    swd: &'probe mut Swd<T>,
    implementer: &'static str,
    core: &'static str,
    config: CortexMConfig,
}

impl<'probe, T: SwdTransport> CortexM<'probe, T> {
    /// Attach to the core behind `swd` with the default configuration.
    ///
    /// Fails with [`Error::DeviceNotDetected`] if CPUID does not identify a
    /// known ARM Cortex-M core.
    pub fn new(swd: &'probe mut Swd<T>) -> Result<Self, Error> {
        Self::with_config(swd, CortexMConfig::default())
    }

    /// Attach to the core behind `swd`, see [`CortexM::new`].
    pub fn with_config(swd: &'probe mut Swd<T>, config: CortexMConfig) -> Result<Self, Error> {
        register_debug_registers(swd);

        let mut cpuid = swd.reg(CPUID)?;
        let raw_cpuid = cpuid.read_cached()?;

        let Some((implementer, core)) = identify(cpuid.cached())? else {
            let implementer = cpuid.cached().get_named_or_value("IMPLEMENTER")?;
            let part = cpuid.cached().get_named_or_value("PARTNO")?;
            tracing::warn!(
                "Unknown MCU with CPUID: {:#010x} (implementer {}, part {})",
                raw_cpuid,
                implementer,
                part
            );
            return Err(Error::DeviceNotDetected { raw_cpuid });
        };

        tracing::info!("Found {}/{} (CPUID {:#010x})", implementer, core, raw_cpuid);

        Ok(Self {
            swd,
            implementer,
            core,
            config,
        })
    }

    /// The register access service this core is attached through.
    pub fn swd(&mut self) -> &mut Swd<T> {
        &mut *self.swd
    }

    /// The configuration the controller was built with.
    pub fn config(&self) -> &CortexMConfig {
        &self.config
    }

    /// The implementer decoded from CPUID, e.g. `ARM`.
    pub fn implementer(&self) -> &str {
        self.implementer
    }

    /// The core decoded from CPUID, e.g. `Cortex-M4`.
    pub fn core(&self) -> &str {
        self.core
    }

    /// `<implementer>/<core>`, e.g. `ARM/Cortex-M4`.
    pub fn info(&self) -> String {
        self.to_string()
    }

    /// Read a core register by name. The name is not case sensitive.
    pub fn read_core_reg(&mut self, name: &str) -> Result<u32, Error> {
        let register = name.parse::<RegisterName>()?;
        self.read_core_reg_by_name(register)
    }

    /// Write a core register by name. The name is not case sensitive.
    pub fn write_core_reg(&mut self, name: &str, value: u32) -> Result<(), Error> {
        let register = name.parse::<RegisterName>()?;
        self.write_core_reg_by_name(register, value)
    }

    /// Read a core register.
    pub fn read_core_reg_by_name(&mut self, register: RegisterName) -> Result<u32, Error> {
        self.swd.read_core_reg(register.index())
    }

    /// Write a core register.
    pub fn write_core_reg_by_name(&mut self, register: RegisterName, value: u32) -> Result<(), Error> {
        self.swd.write_core_reg(register.index(), value)
    }

    /// Read all core registers with a single transfer.
    pub fn read_all_core_regs(&mut self) -> Result<BTreeMap<RegisterName, u32>, Error> {
        let values = self.swd.read_core_regs()?;

        if values.len() < CORE_REGISTER_COUNT {
            return Err(Error::IncompleteRegisterRead {
                expected: CORE_REGISTER_COUNT,
                actual: values.len(),
            });
        }

        Ok(RegisterName::ALL.into_iter().zip(values).collect())
    }

    /// Request the core to halt.
    #[tracing::instrument(skip(self))]
    pub fn halt(&mut self) -> Result<(), Error> {
        self.write_dhcsr(&[("C_DEBUGEN", true.into()), ("C_HALT", true.into())])
    }

    /// Execute a single instruction.
    #[tracing::instrument(skip(self))]
    pub fn step(&mut self) -> Result<(), Error> {
        self.write_dhcsr(&[("C_DEBUGEN", true.into()), ("C_STEP", true.into())])
    }

    /// Let the core run with halting debug enabled.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<(), Error> {
        self.write_dhcsr(&[("C_DEBUGEN", true.into())])
    }

    /// Disable halting debug. The core runs freely afterwards.
    #[tracing::instrument(skip(self))]
    pub fn nodebug(&mut self) -> Result<(), Error> {
        self.write_dhcsr(&[("C_DEBUGEN", false.into())])
    }

    /// Reset the system and let the core run from the reset vector.
    #[tracing::instrument(skip(self))]
    pub fn reset(&mut self) -> Result<(), Error> {
        self.swd
            .reg(DEMCR)?
            .set_bits(&[("VC_CORERESET", false.into())])?;
        self.system_reset()
    }

    /// Reset the system and halt the core at the reset vector.
    #[tracing::instrument(skip(self))]
    pub fn reset_and_halt(&mut self) -> Result<(), Error> {
        // The halt request has to come before the vector catch is armed.
        self.halt()?;
        self.swd
            .reg(DEMCR)?
            .set_bits(&[("VC_CORERESET", true.into())])?;
        self.system_reset()
    }

    /// Check whether the core is halted, by reading DHCSR.
    pub fn core_halted(&mut self) -> Result<bool, Error> {
        Ok(self.swd.reg(DHCSR_R)?.get("S_HALT")? == 1)
    }

    fn write_dhcsr(&mut self, values: &[(&str, FieldValue)]) -> Result<(), Error> {
        let mut fields = Vec::with_capacity(values.len() + 1);
        fields.push(("DBGKEY", FieldValue::Key));
        fields.extend_from_slice(values);

        self.swd.reg(DHCSR_W)?.set_bits(&fields)
    }

    fn system_reset(&mut self) -> Result<(), Error> {
        self.swd
            .reg(AIRCR)?
            .set_bits(&[("VECTKEY", FieldValue::Key), ("SYSRESETREQ", true.into())])?;

        // The core does not respond to SWD transactions while resetting.
        let delay = self.config.reset_settle_delay();
        tracing::debug!("Waiting {:?} for the core to come out of reset", delay);
        std::thread::sleep(delay);

        Ok(())
    }
}

impl<T> fmt::Display for CortexM<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.implementer, self.core)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{Aircr, Demcr, DhcsrWrite};
    use crate::probe::{
        fake_probe::{FakeProbe, Operation, CORTEX_M4_CPUID},
        DebugProbeError,
    };
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};
    use test_case::test_case;

    const HALT: u32 = 0xA05F_0003;
    const STEP: u32 = 0xA05F_0005;
    const RUN: u32 = 0xA05F_0001;
    const NODEBUG: u32 = 0xA05F_0000;
    const SYSRESETREQ: u32 = 0x05FA_0004;

    fn attach(swd: &mut Swd<FakeProbe>) -> CortexM<'_, FakeProbe> {
        let mut core = CortexM::new(swd).unwrap();
        core.swd().probe_mut().clear_operations();
        core
    }

    #[test_case(0x410F_C241, "ARM/Cortex-M4")]
    #[test_case(0x410C_C200, "ARM/Cortex-M0")]
    #[test_case(0x410C_C601, "ARM/Cortex-M0+")]
    #[test_case(0x412F_C230, "ARM/Cortex-M3")]
    #[test_case(0x411F_C272, "ARM/Cortex-M7")]
    #[test_case(0x410C_D200, "ARM/Cortex-M23")]
    #[test_case(0x410F_D213, "ARM/Cortex-M33")]
    fn identify_known_cores(cpuid: u32, info: &str) {
        let mut swd = Swd::new(FakeProbe::new(cpuid));
        let core = CortexM::new(&mut swd).unwrap();

        assert_eq!(core.info(), info);
        assert_eq!(core.to_string(), info);
        assert_eq!(core.implementer(), "ARM");
    }

    #[test_case(0x000F_C241; "unknown implementer")]
    #[test_case(0x510F_C241; "other implementer")]
    #[test_case(0x410F_C250; "unknown part number")]
    #[test_case(0x0000_0000; "no response")]
    fn reject_unknown_cores(cpuid: u32) {
        let mut swd = Swd::new(FakeProbe::new(cpuid));

        let error = CortexM::new(&mut swd).err().unwrap();
        assert!(matches!(error, Error::DeviceNotDetected { raw_cpuid } if raw_cpuid == cpuid));
    }

    #[test]
    fn construction_registers_debug_registers() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        CortexM::new(&mut swd).unwrap();

        for name in [CPUID, AIRCR, DHCSR_W, DHCSR_R, DEMCR] {
            assert!(swd.has_register(name), "{name} missing");
        }
        assert_eq!(swd.reg(CPUID).unwrap().cached().raw(), Some(CORTEX_M4_CPUID));
    }

    #[test]
    fn construction_fails_on_transport_error() {
        let mut probe = FakeProbe::cortex_m4();
        probe.fail_address(crate::core::Cpuid::ADDRESS);
        let mut swd = Swd::new(probe);

        let error = CortexM::new(&mut swd).err().unwrap();
        assert!(matches!(error, Error::Probe(DebugProbeError::NoAcknowledge)));
    }

    #[test_case("halt", HALT)]
    #[test_case("step", STEP)]
    #[test_case("run", RUN)]
    #[test_case("nodebug", NODEBUG)]
    fn dhcsr_control(operation: &str, value: u32) {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let mut core = attach(&mut swd);

        match operation {
            "halt" => core.halt(),
            "step" => core.step(),
            "run" => core.run(),
            "nodebug" => core.nodebug(),
            _ => unreachable!(),
        }
        .unwrap();

        assert_eq!(
            core.swd().probe().operations(),
            &[Operation::WriteWord32(DhcsrWrite::ADDRESS, value)]
        );
    }

    #[test]
    fn reset_clears_vector_catch() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let mut core = attach(&mut swd);

        core.reset().unwrap();

        assert_eq!(
            core.swd().probe().operations(),
            &[
                Operation::WriteWord32(Demcr::ADDRESS, 0),
                Operation::WriteWord32(Aircr::ADDRESS, SYSRESETREQ),
            ]
        );
        assert_eq!(core.swd().probe().resets(), 1);
        assert!(!core.core_halted().unwrap());
    }

    #[test]
    fn reset_and_halt_order() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let mut core = attach(&mut swd);

        core.reset_and_halt().unwrap();

        assert_eq!(
            core.swd().probe().operations(),
            &[
                Operation::WriteWord32(DhcsrWrite::ADDRESS, HALT),
                Operation::WriteWord32(Demcr::ADDRESS, 1),
                Operation::WriteWord32(Aircr::ADDRESS, SYSRESETREQ),
            ]
        );
        assert!(core.core_halted().unwrap());
    }

    #[test]
    fn reset_blocks_for_settle_delay() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let config = CortexMConfig::default().with_reset_settle_delay(Duration::from_millis(30));
        let mut core = CortexM::with_config(&mut swd, config).unwrap();

        let start = Instant::now();
        core.reset_and_halt().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));

        let start = Instant::now();
        core.reset().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn sub_millisecond_settle_delay_still_blocks() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let delay = Duration::from_micros(900);
        let config = CortexMConfig::default().with_reset_settle_delay(delay);
        let mut core = CortexM::with_config(&mut swd, config).unwrap();

        let start = Instant::now();
        core.reset().unwrap();
        assert!(start.elapsed() >= delay);
    }

    #[test]
    fn core_halted_reads_fresh_value() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let mut core = attach(&mut swd);

        assert!(!core.core_halted().unwrap());

        core.swd().probe_mut().set_halted(true);
        assert!(core.core_halted().unwrap());

        core.swd().probe_mut().set_halted(false);
        assert!(!core.core_halted().unwrap());

        assert_eq!(
            core.swd().probe().operations(),
            vec![Operation::ReadWord32(DhcsrWrite::ADDRESS); 3]
        );
    }

    #[test]
    fn core_register_access() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let mut core = attach(&mut swd);

        core.write_core_reg("pc", 0x0800_0100).unwrap();
        assert_eq!(core.read_core_reg("PC").unwrap(), 0x0800_0100);
        assert_eq!(core.read_core_reg_by_name(RegisterName::Pc).unwrap(), 0x0800_0100);

        assert_eq!(
            core.swd().probe().operations(),
            &[
                Operation::WriteCoreReg(15, 0x0800_0100),
                Operation::ReadCoreReg(15),
                Operation::ReadCoreReg(15),
            ]
        );
    }

    #[test]
    fn unknown_register_does_not_reach_the_probe() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let mut core = attach(&mut swd);

        assert!(matches!(
            core.read_core_reg("R16"),
            Err(Error::UnknownRegister(name)) if name == "R16"
        ));
        assert!(matches!(
            core.write_core_reg("fp", 0),
            Err(Error::UnknownRegister(_))
        ));
        assert!(core.swd().probe().operations().is_empty());
    }

    #[test]
    fn read_all_registers_in_canonical_order() {
        let values: Vec<u32> = (0..CORE_REGISTER_COUNT as u32).map(|i| i * 0x10).collect();
        let mut swd = Swd::new(FakeProbe::cortex_m4().with_core_registers(values.clone()));
        let mut core = attach(&mut swd);

        let registers = core.read_all_core_regs().unwrap();

        assert_eq!(registers.len(), CORE_REGISTER_COUNT);
        assert_eq!(registers.keys().copied().collect::<Vec<_>>(), RegisterName::ALL.to_vec());
        assert_eq!(registers.values().copied().collect::<Vec<_>>(), values);
        assert_eq!(core.swd().probe().operations(), &[Operation::ReadCoreRegs]);
    }

    #[test]
    fn read_all_registers_ignores_extra_values() {
        let values: Vec<u32> = (0..25).collect();
        let mut swd = Swd::new(FakeProbe::cortex_m4().with_core_registers(values));
        let mut core = attach(&mut swd);

        let registers = core.read_all_core_regs().unwrap();
        assert_eq!(registers.len(), CORE_REGISTER_COUNT);
        assert_eq!(registers[&RegisterName::Psp], 18);
    }

    #[test]
    fn read_all_registers_short_read() {
        let mut swd = Swd::new(FakeProbe::cortex_m4().with_core_registers(vec![0; 16]));
        let mut core = attach(&mut swd);

        assert!(matches!(
            core.read_all_core_regs(),
            Err(Error::IncompleteRegisterRead {
                expected: 19,
                actual: 16
            })
        ));
    }

    #[test]
    fn transport_errors_propagate_from_control_operations() {
        let mut swd = Swd::new(FakeProbe::cortex_m4());
        let mut core = attach(&mut swd);
        core.swd().probe_mut().fail_address(Aircr::ADDRESS);

        assert!(matches!(
            core.reset(),
            Err(Error::Probe(DebugProbeError::NoAcknowledge))
        ));
        assert_eq!(core.swd().probe().resets(), 0);
    }
}
