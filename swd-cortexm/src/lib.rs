//! # Debug control of ARM Cortex-M cores
//!
//! This crate drives the halting debug registers of a Cortex-M core through
//! a Serial Wire Debug link. The link itself is provided by an implementation
//! of [`SwdTransport`].
//!
//! # Examples
//!
//! ## Halting the attached core
//! ```
//! # use swd_cortexm::Error;
//! use swd_cortexm::{CortexM, FakeProbe, Swd};
//!
//! let mut swd = Swd::new(FakeProbe::cortex_m4());
//!
//! // Attaching checks CPUID for a known core.
//! let mut core = CortexM::new(&mut swd)?;
//! assert_eq!(core.info(), "ARM/Cortex-M4");
//!
//! core.halt()?;
//! assert!(core.core_halted()?);
//!
//! // Core registers are addressed by name.
//! core.write_core_reg("r0", 0xdead_beef)?;
//! assert_eq!(core.read_core_reg("R0")?, 0xdead_beef);
//! # Ok::<(), Error>(())
//! ```
//!
//! The crate is built around the [`Swd`] register access service and the
//! [`CortexM`] controller which borrows it.

#[warn(missing_docs)]
mod config;
#[warn(missing_docs)]
mod core;
#[warn(missing_docs)]
mod error;
#[warn(missing_docs)]
pub mod fields;
#[warn(missing_docs)]
pub mod probe;
#[warn(missing_docs)]
mod swd;

pub use crate::config::{ConfigError, CortexMConfig, DEFAULT_RESET_SETTLE_DELAY_MS};
pub use crate::core::{
    index_of, register_debug_registers, Aircr, CortexM, Cpuid, DebugRegister, Demcr, DhcsrRead,
    DhcsrWrite, RegisterName, AIRCR, CORE_REGISTER_COUNT, CPUID, DEMCR, DHCSR_R, DHCSR_W,
};
pub use crate::error::Error;
pub use crate::probe::{fake_probe::FakeProbe, DebugProbeError, SwdTransport};
pub use crate::swd::{Reg, Swd};
