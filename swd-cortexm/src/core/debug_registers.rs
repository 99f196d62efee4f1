//! The Cortex-M debug control registers in the System Control Space.

use crate::{
    fields::{Field, WriteKey},
    probe::SwdTransport,
    Swd,
};
use std::fmt;

/// Name of the CPUID register in the register table.
pub const CPUID: &str = "CPUID";
/// Name of the AIRCR register in the register table.
pub const AIRCR: &str = "AIRCR";
/// Name of the write view of DHCSR in the register table.
pub const DHCSR_W: &str = "DHCSR_W";
/// Name of the read view of DHCSR in the register table.
pub const DHCSR_R: &str = "DHCSR_R";
/// Name of the DEMCR register in the register table.
pub const DEMCR: &str = "DEMCR";

/// A memory mapped debug register with a named field layout.
pub trait DebugRegister: fmt::Debug {
    /// The register name as used in the architecture reference manual.
    fn name(&self) -> &'static str;

    /// The register's address in the target memory.
    fn address(&self) -> u64;

    /// The field layout of the register.
    fn fields(&self) -> &'static [Field];

    /// Width of the register in bits.
    fn bits(&self) -> u8 {
        32
    }

    /// Whether writes to the register are refused.
    fn read_only(&self) -> bool {
        false
    }
}

/// Defines a unit type for a debug register and implements [`DebugRegister`] for it.
macro_rules! debug_register {
    (
        $(#[$outer:meta])*
        name: $name:ident,
        register: $register:literal,
        address: $address:expr,
        $(read_only: $read_only:literal,)?
        fields: [$($field:expr),* $(,)?]
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name {
            /// The register's address in the target memory.
            pub const ADDRESS: u64 = $address;
            /// The field layout, least significant field first.
            pub const FIELDS: &'static [Field] = &[$($field),*];
        }

        impl DebugRegister for $name {
            fn name(&self) -> &'static str {
                $register
            }

            fn address(&self) -> u64 {
                Self::ADDRESS
            }

            fn fields(&self) -> &'static [Field] {
                Self::FIELDS
            }

            $(
                fn read_only(&self) -> bool {
                    $read_only
                }
            )?
        }
    };
}

const IMPLEMENTERS: &[(u32, &str)] = &[(0x41, "ARM")];

const PART_NUMBERS: &[(u32, &str)] = &[
    (0xC20, "Cortex-M0"),
    (0xC60, "Cortex-M0+"),
    (0xC23, "Cortex-M3"),
    (0xC24, "Cortex-M4"),
    (0xC27, "Cortex-M7"),
    (0xD20, "Cortex-M23"),
    (0xD21, "Cortex-M33"),
];

debug_register! {
    /// CPUID Base Register (see armv7-M Architecture Reference Manual B4.1.2)
    name: Cpuid,
    register: "CPUID",
    address: 0xE000_ED00,
    read_only: true,
    fields: [
        Field::new("REVISION", 0, 4),
        Field::new("PARTNO", 4, 12).with_values(PART_NUMBERS),
        Field::new("ARCHITECTURE", 16, 4),
        Field::new("VARIANT", 20, 4),
        Field::new("IMPLEMENTER", 24, 8).with_values(IMPLEMENTERS),
    ]
}

debug_register! {
    /// Application Interrupt and Reset Control Register, AIRCR (see armv7-M Architecture Reference Manual B3.2.6)
    ///
    /// Writes are ignored unless `VECTKEY` holds [`WriteKey::Vector`].
    name: Aircr,
    register: "AIRCR",
    address: 0xE000_ED0C,
    fields: [
        Field::flag("VECTRESET", 0),
        Field::flag("VECTCLRACTIVE", 1),
        Field::flag("SYSRESETREQ", 2),
        Field::new("PRIGROUP", 8, 3),
        Field::flag("ENDIANESS", 15),
        Field::new("VECTKEY", 16, 16).with_key(WriteKey::Vector),
    ]
}

debug_register! {
    /// Debug Halting Control and Status Register, DHCSR, as seen by writes
    /// (see armv7-M Architecture Reference Manual C1.6.2)
    ///
    /// Writes are ignored unless `DBGKEY` holds [`WriteKey::Debug`].
    name: DhcsrWrite,
    register: "DHCSR",
    address: 0xE000_EDF0,
    fields: [
        Field::flag("C_DEBUGEN", 0),
        Field::flag("C_HALT", 1),
        Field::flag("C_STEP", 2),
        Field::flag("C_MASKINTS", 3),
        Field::flag("C_SNAPSTALL", 5),
        Field::new("DBGKEY", 16, 16).with_key(WriteKey::Debug),
    ]
}

debug_register! {
    /// Debug Halting Control and Status Register, DHCSR, as seen by reads.
    ///
    /// The upper half word holds status bits instead of the key. `S_RESET_ST`
    /// and `S_RETIRE_ST` are sticky and clear on read.
    name: DhcsrRead,
    register: "DHCSR",
    address: 0xE000_EDF0,
    fields: [
        Field::flag("C_DEBUGEN", 0),
        Field::flag("C_HALT", 1),
        Field::flag("C_STEP", 2),
        Field::flag("C_MASKINTS", 3),
        Field::flag("C_SNAPSTALL", 5),
        Field::flag("S_REGRDY", 16),
        Field::flag("S_HALT", 17),
        Field::flag("S_SLEEP", 18),
        Field::flag("S_LOCKUP", 19),
        Field::flag("S_RETIRE_ST", 24),
        Field::flag("S_RESET_ST", 25),
    ]
}

debug_register! {
    /// Debug Exception and Monitor Control Register, DEMCR (see armv7-M Architecture Reference Manual C1.6.5)
    name: Demcr,
    register: "DEMCR",
    address: 0xE000_EDFC,
    fields: [
        Field::flag("VC_CORERESET", 0),
        Field::flag("VC_MMERR", 4),
        Field::flag("VC_NOCPERR", 5),
        Field::flag("VC_CHKERR", 6),
        Field::flag("VC_STATERR", 7),
        Field::flag("VC_BUSERR", 8),
        Field::flag("VC_INTERR", 9),
        Field::flag("VC_HARDERR", 10),
        Field::flag("MON_EN", 16),
        Field::flag("MON_PEND", 17),
        Field::flag("MON_STEP", 18),
        Field::flag("MON_REQ", 19),
        Field::flag("TRCENA", 24),
    ]
}

/// Add the debug control registers to the register table of `swd`.
///
/// Entries which already exist under one of the names are replaced.
pub fn register_debug_registers<T: SwdTransport>(swd: &mut Swd<T>) {
    let registers: [(&'static str, Box<dyn DebugRegister>); 5] = [
        (CPUID, Box::new(Cpuid)),
        (AIRCR, Box::new(Aircr)),
        (DHCSR_W, Box::new(DhcsrWrite)),
        (DHCSR_R, Box::new(DhcsrRead)),
        (DEMCR, Box::new(Demcr)),
    ];

    swd.append_registers(registers);
}
