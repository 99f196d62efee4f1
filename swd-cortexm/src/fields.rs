//! Named bit-fields of memory mapped registers.
//!
//! A register layout is a list of [`Field`]s, each describing a range of bits
//! by name. A [`Bitfield`] combines such a layout with a cached raw value, which
//! is only ever updated by an explicit read or write.

use bitfield::{BitRange, BitRangeMut};
use std::fmt;

/// Magic values which have to accompany a write to a protected register.
///
/// The core silently ignores any write to DHCSR or AIRCR which does not carry
/// the matching key in the upper half word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKey {
    /// `DHCSR.DBGKEY`, see armv7-M Architecture Reference Manual C1.6.2.
    Debug,
    /// `AIRCR.VECTKEY`, see armv7-M Architecture Reference Manual B3.2.6.
    Vector,
}

impl WriteKey {
    /// The numeric value which has to be written into the key field.
    pub const fn value(self) -> u32 {
        match self {
            WriteKey::Debug => 0xA05F,
            WriteKey::Vector => 0x05FA,
        }
    }
}

/// A value to be written into a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// A single bit.
    Flag(bool),
    /// A raw value, masked to the width of the field.
    Value(u32),
    /// The [`WriteKey`] declared by the field.
    Key,
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Value(value)
    }
}

/// Errors which occur when accessing named fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub enum FieldError {
    /// The register has no field named '{0}'.
    UnknownField(String),
    /// The field '{0}' does not take a write key.
    NoWriteKey(&'static str),
    /// The register value has not been read yet, or the cached value was discarded.
    EmptyCache,
    /// The register '{0}' is read-only.
    ReadOnly(&'static str),
    /// The field '{field}' does not fit into a {bits} bit register.
    OutOfBounds {
        /// Name of the offending field.
        field: &'static str,
        /// Width of the register.
        bits: u8,
    },
    /// The fields '{0}' and '{1}' overlap.
    Overlapping(&'static str, &'static str),
}

/// A field value as read from the target, with its name if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedValue {
    /// A value listed in the field's value table.
    Named(&'static str),
    /// A value without a name.
    Raw(u32),
}

impl fmt::Display for NamedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedValue::Named(name) => f.write_str(name),
            NamedValue::Raw(value) => write!(f, "{value:#x}"),
        }
    }
}

/// A named range of bits inside a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    name: &'static str,
    offset: u8,
    width: u8,
    values: &'static [(u32, &'static str)],
    key: Option<WriteKey>,
}

impl Field {
    /// A field of `width` bits, starting at bit `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the field is empty or reaches beyond bit 31. For layouts
    /// declared as constants this is caught at compile time.
    pub const fn new(name: &'static str, offset: u8, width: u8) -> Self {
        assert!(
            width > 0 && offset as u32 + width as u32 <= 32,
            "a field must cover between 1 and 32 bits of a 32 bit word"
        );
        Field {
            name,
            offset,
            width,
            values: &[],
            key: None,
        }
    }

    /// A single bit field.
    pub const fn flag(name: &'static str, offset: u8) -> Self {
        Field::new(name, offset, 1)
    }

    /// Attach names to well known values of this field.
    pub const fn with_values(mut self, values: &'static [(u32, &'static str)]) -> Self {
        self.values = values;
        self
    }

    /// Declare the key which [`FieldValue::Key`] resolves to.
    pub const fn with_key(mut self, key: WriteKey) -> Self {
        self.key = Some(key);
        self
    }

    /// The field name as used in the architecture reference manual.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position of the least significant bit.
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Number of bits in the field.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// The key declared with [`Field::with_key`].
    pub fn key(&self) -> Option<WriteKey> {
        self.key
    }

    /// The field mask, not shifted to the field offset.
    pub fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    fn msb(&self) -> usize {
        self.offset as usize + self.width as usize - 1
    }

    /// Extract the value of this field from a raw register value.
    pub fn extract(&self, raw: u32) -> u32 {
        raw.bit_range(self.msb(), self.offset as usize)
    }

    /// Replace the bits of this field in `raw` with `value`.
    pub fn insert(&self, raw: u32, value: u32) -> u32 {
        let mut raw = raw;
        raw.set_bit_range(self.msb(), self.offset as usize, value & self.mask());
        raw
    }

    /// Look up the name of a field value, if it has one.
    pub fn value_name(&self, value: u32) -> Option<&'static str> {
        self.values
            .iter()
            .find(|(known, _)| *known == value)
            .map(|(_, name)| *name)
    }

    /// Turn a [`FieldValue`] into the number stored in the field.
    pub fn resolve(&self, value: FieldValue) -> Result<u32, FieldError> {
        match value {
            FieldValue::Flag(flag) => Ok(flag as u32),
            FieldValue::Value(value) => Ok(value & self.mask()),
            FieldValue::Key => self
                .key
                .map(WriteKey::value)
                .ok_or(FieldError::NoWriteKey(self.name)),
        }
    }

    fn overlaps(&self, other: &Field) -> bool {
        let start = self.offset as usize;
        let other_start = other.offset as usize;
        start <= other.msb() && other_start <= self.msb()
    }
}

/// Find a field in a layout by its name.
pub fn find_field(fields: &'static [Field], name: &str) -> Result<&'static Field, FieldError> {
    fields
        .iter()
        .find(|field| field.name == name)
        .ok_or_else(|| FieldError::UnknownField(name.to_owned()))
}

/// Compose a register value which only contains the given fields.
///
/// All bits not covered by `values` are zero.
pub fn compose(fields: &'static [Field], values: &[(&str, FieldValue)]) -> Result<u32, FieldError> {
    values.iter().try_fold(0, |raw, (name, value)| {
        let field = find_field(fields, name)?;
        Ok(field.insert(raw, field.resolve(*value)?))
    })
}

/// Check that all fields of a layout fit into `bits` and do not overlap.
pub fn validate_layout(fields: &'static [Field], bits: u8) -> Result<(), FieldError> {
    for (i, field) in fields.iter().enumerate() {
        if field.msb() >= bits as usize {
            return Err(FieldError::OutOfBounds {
                field: field.name,
                bits,
            });
        }

        if let Some(other) = fields[i + 1..].iter().find(|other| field.overlaps(other)) {
            return Err(FieldError::Overlapping(field.name, other.name));
        }
    }

    Ok(())
}

/// A register layout together with the last known raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    fields: &'static [Field],
    bits: u8,
    raw: Option<u32>,
}

impl Bitfield {
    /// An empty cache for a register of `bits` width.
    pub fn new(fields: &'static [Field], bits: u8) -> Self {
        Bitfield {
            fields,
            bits,
            raw: None,
        }
    }

    /// A cache holding `raw`.
    pub fn with_raw(fields: &'static [Field], bits: u8, raw: u32) -> Self {
        let mut bitfield = Bitfield::new(fields, bits);
        bitfield.set_raw(raw);
        bitfield
    }

    /// The register layout.
    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Width of the register in bits.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// The cached raw value, `None` if the register was never read.
    pub fn raw(&self) -> Option<u32> {
        self.raw
    }

    /// Replace the cached value. Bits above the register width are dropped.
    pub fn set_raw(&mut self, raw: u32) {
        let mask = if self.bits >= 32 {
            u32::MAX
        } else {
            (1 << self.bits) - 1
        };
        self.raw = Some(raw & mask);
    }

    /// Forget the cached value.
    pub fn discard(&mut self) {
        self.raw = None;
    }

    /// Look up a field of the layout by name.
    pub fn field(&self, name: &str) -> Result<&'static Field, FieldError> {
        find_field(self.fields, name)
    }

    /// Numeric value of a field in the cached raw value.
    pub fn get(&self, name: &str) -> Result<u32, FieldError> {
        let field = self.field(name)?;
        let raw = self.raw.ok_or(FieldError::EmptyCache)?;
        Ok(field.extract(raw))
    }

    /// Name of the value of a field in the cached raw value.
    ///
    /// Returns `Ok(None)` if the field holds a value without a name.
    pub fn get_named(&self, name: &str) -> Result<Option<&'static str>, FieldError> {
        let field = self.field(name)?;
        let raw = self.raw.ok_or(FieldError::EmptyCache)?;
        Ok(field.value_name(field.extract(raw)))
    }

    /// Like [`Bitfield::get_named`], but falls back to the numeric value.
    pub fn get_named_or_value(&self, name: &str) -> Result<NamedValue, FieldError> {
        let field = self.field(name)?;
        let raw = self.raw.ok_or(FieldError::EmptyCache)?;
        let value = field.extract(raw);

        Ok(field
            .value_name(value)
            .map_or(NamedValue::Raw(value), NamedValue::Named))
    }

    /// Update a single field of the cached raw value.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        let field = self.field(name)?;
        let raw = self.raw.ok_or(FieldError::EmptyCache)?;
        let value = field.resolve(value.into())?;
        self.raw = Some(field.insert(raw, value));
        Ok(())
    }

    /// Compose a raw value from the given fields, independent of the cache.
    pub fn get_bits(&self, values: &[(&str, FieldValue)]) -> Result<u32, FieldError> {
        compose(self.fields, values)
    }
}
