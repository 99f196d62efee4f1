//! The Cortex-M core: register names, debug control registers and the controller.

mod cortex_m;
mod debug_registers;
mod registers;

pub use cortex_m::CortexM;
pub use debug_registers::{
    register_debug_registers, Aircr, Cpuid, DebugRegister, Demcr, DhcsrRead, DhcsrWrite, AIRCR,
    CPUID, DEMCR, DHCSR_R, DHCSR_W,
};
pub use registers::{index_of, RegisterName, CORE_REGISTER_COUNT};
