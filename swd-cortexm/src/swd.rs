//! Register access service on top of a [`SwdTransport`].
//!
//! [`Swd`] owns the transport and a table of named debug registers. Each
//! table entry caches the last value read from the register.

use std::collections::HashMap;

use crate::{
    core::DebugRegister,
    fields::{compose, Bitfield, FieldError, FieldValue},
    probe::SwdTransport,
    Error,
};

struct RegisterEntry {
    name: &'static str,
    register: Box<dyn DebugRegister>,
    cached: Bitfield,
}

impl RegisterEntry {
    fn new(name: &'static str, register: Box<dyn DebugRegister>) -> Self {
        let cached = Bitfield::new(register.fields(), register.bits());
        Self {
            name,
            register,
            cached,
        }
    }
}

/// A debug link to a single core.
///
/// The service is usually borrowed by a [`CortexM`](crate::CortexM) for the
/// duration of a debug session. Only one session may drive it at a time.
pub struct Swd<T> {
    probe: T,
    registers: HashMap<&'static str, RegisterEntry>,
}

impl<T: SwdTransport> Swd<T> {
    /// A link with an empty register table.
    pub fn new(probe: T) -> Self {
        Self {
            probe,
            registers: HashMap::new(),
        }
    }

    /// The underlying transport.
    pub fn probe(&self) -> &T {
        &self.probe
    }

    /// The underlying transport, mutably.
    pub fn probe_mut(&mut self) -> &mut T {
        &mut self.probe
    }

    /// Release the transport.
    pub fn into_probe(self) -> T {
        self.probe
    }

    /// Read a core register by its transport index.
    pub fn read_core_reg(&mut self, index: usize) -> Result<u32, Error> {
        let value = self.probe.read_core_reg(index)?;
        tracing::trace!("read core register {} = {:#010x}", index, value);
        Ok(value)
    }

    /// Write a core register by its transport index.
    pub fn write_core_reg(&mut self, index: usize, value: u32) -> Result<(), Error> {
        tracing::trace!("write core register {} = {:#010x}", index, value);
        Ok(self.probe.write_core_reg(index, value)?)
    }

    /// Read all core registers with a single transfer.
    pub fn read_core_regs(&mut self) -> Result<Vec<u32>, Error> {
        Ok(self.probe.read_core_regs()?)
    }

    /// Add a named register to the register table.
    ///
    /// An existing entry with the same name is replaced and returned.
    pub fn append_register(
        &mut self,
        name: &'static str,
        register: Box<dyn DebugRegister>,
    ) -> Option<Box<dyn DebugRegister>> {
        let replaced = self
            .registers
            .insert(name, RegisterEntry::new(name, register))
            .map(|entry| entry.register);

        if replaced.is_some() {
            tracing::debug!("Replaced register table entry {}", name);
        } else {
            tracing::trace!("Added register table entry {}", name);
        }

        replaced
    }

    /// Add several named registers, see [`Swd::append_register`].
    pub fn append_registers(
        &mut self,
        registers: impl IntoIterator<Item = (&'static str, Box<dyn DebugRegister>)>,
    ) {
        for (name, register) in registers {
            self.append_register(name, register);
        }
    }

    /// Check whether `name` is in the register table.
    pub fn has_register(&self, name: &str) -> bool {
        self.registers.contains_key(name)
    }

    /// Names of all registers in the table, in no particular order.
    pub fn register_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registers.keys().copied()
    }

    /// Access a register from the register table.
    pub fn reg(&mut self, name: &str) -> Result<Reg<'_>, Error> {
        let entry = self
            .registers
            .get_mut(name)
            .ok_or_else(|| Error::UnknownDebugRegister(name.to_owned()))?;

        Ok(Reg {
            probe: &mut self.probe,
            entry,
        })
    }
}

/// A borrowed register table entry, see [`Swd::reg`].
pub struct Reg<'swd> {
    probe: &'swd mut dyn SwdTransport,
    entry: &'swd mut RegisterEntry,
}

impl Reg<'_> {
    /// The name of the table entry.
    pub fn name(&self) -> &'static str {
        self.entry.name
    }

    /// The register layout behind the table entry.
    pub fn register(&self) -> &dyn DebugRegister {
        &*self.entry.register
    }

    /// The value of the last explicit read. No transfer is done.
    pub fn cached(&self) -> &Bitfield {
        &self.entry.cached
    }

    /// Read the register from the target and update the cache.
    pub fn read_cached(&mut self) -> Result<u32, Error> {
        let address = self.entry.register.address();
        let raw = self.probe.read_word_32(address)?;

        tracing::trace!("read {} @ {:#010x} = {:#010x}", self.entry.name, address, raw);

        self.entry.cached.set_raw(raw);
        Ok(raw)
    }

    /// Read the register and decode a single field.
    pub fn get(&mut self, field: &str) -> Result<u32, Error> {
        self.read_cached()?;
        Ok(self.entry.cached.get(field)?)
    }

    /// Read the register and decode the name of a field value.
    pub fn get_named(&mut self, field: &str) -> Result<Option<&'static str>, Error> {
        self.read_cached()?;
        Ok(self.entry.cached.get_named(field)?)
    }

    /// Read-modify-write a single field.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), Error> {
        self.check_writable()?;
        self.read_cached()?;
        self.entry.cached.set(field, value)?;
        self.write_cache()
    }

    /// Write only the given fields, all other bits are written as zero.
    ///
    /// The cache is left untouched.
    pub fn set_bits(&mut self, values: &[(&str, FieldValue)]) -> Result<(), Error> {
        self.check_writable()?;

        let raw = compose(self.entry.register.fields(), values)?;
        self.write_raw(raw)
    }

    /// Write the cached value back to the target.
    pub fn write_cache(&mut self) -> Result<(), Error> {
        self.check_writable()?;

        let raw = self.entry.cached.raw().ok_or(FieldError::EmptyCache)?;
        self.write_raw(raw)
    }

    /// Forget the cached value.
    pub fn discard_cache(&mut self) {
        self.entry.cached.discard();
    }

    fn write_raw(&mut self, raw: u32) -> Result<(), Error> {
        let address = self.entry.register.address();

        tracing::debug!("write {} @ {:#010x} = {:#010x}", self.entry.name, address, raw);

        Ok(self.probe.write_word_32(address, raw)?)
    }

    fn check_writable(&self) -> Result<(), Error> {
        if self.entry.register.read_only() {
            Err(FieldError::ReadOnly(self.entry.register.name()).into())
        } else {
            Ok(())
        }
    }
}
