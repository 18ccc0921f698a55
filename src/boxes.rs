use std::any::Any;

use crate::codec::{FieldCodec, Marshaller, Unmarshaller};
use crate::error::Result;
use crate::field::{CustomFieldObject, FieldConfig};
use crate::stringify::{FieldValue, Stringifier};
use crate::types::BoxType;

/// A record whose fields the codec can walk in declaration order.
///
/// Implemented by the `box_fields!` macro; the three methods perform the
/// same walk against the marshaller, the unmarshaller and the stringifier.
pub trait FieldStruct: CustomFieldObject {
    fn marshal_fields(&self, m: &mut Marshaller<'_>) -> Result<()>;
    fn unmarshal_fields(&mut self, u: &mut Unmarshaller<'_>) -> Result<()>;
    fn stringify_fields(&self, s: &mut Stringifier) -> Result<()>;
}

/// A complete box value: a walkable record with a type and, for FullBox
/// extensions, version and flags accessors.
///
/// The defaults describe a plain box: version 0, no flags.
pub trait Mp4Box: FieldStruct {
    fn get_type(&self) -> BoxType;

    fn get_version(&self) -> u8 {
        0
    }

    fn set_version(&mut self, _version: u8) {}

    fn get_flags(&self) -> u32 {
        0
    }

    fn set_flags(&mut self, _flags: u32) {}
}

/// Object-safe handle for registry templates.
pub trait AnyBox: Mp4Box + Send + Sync {
    fn clone_box(&self) -> Box<dyn AnyBox>;
    fn as_any(&self) -> &dyn Any;
    fn as_box_mut(&mut self) -> &mut dyn Mp4Box;
}

impl<T: Mp4Box + Clone + Send + Sync + 'static> AnyBox for T {
    fn clone_box(&self) -> Box<dyn AnyBox> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_box_mut(&mut self) -> &mut dyn Mp4Box {
        self
    }
}

/// The version + 24-bit flags prefix shared by FullBox extensions.
///
/// Boxes embed this as their first field with an `extend` tag; decoding it
/// feeds the parsed version into the registry gate before any further field
/// is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullBox {
    pub version: u8,
    pub flags: [u8; 3],
}

impl FullBox {
    pub fn new(version: u8, flags: u32) -> Self {
        let mut fb = FullBox {
            version,
            flags: [0; 3],
        };
        fb.set_flags(flags);
        fb
    }

    pub fn get_flags(&self) -> u32 {
        (self.flags[0] as u32) << 16 | (self.flags[1] as u32) << 8 | self.flags[2] as u32
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.flags[0] = (flags >> 16) as u8;
        self.flags[1] = (flags >> 8) as u8;
        self.flags[2] = flags as u8;
    }

    pub fn check_flag(&self, flag: u32) -> bool {
        self.get_flags() & flag != 0
    }

    pub fn add_flag(&mut self, flag: u32) {
        self.set_flags(self.get_flags() | flag);
    }

    pub fn remove_flag(&mut self, flag: u32) {
        self.set_flags(self.get_flags() & !flag);
    }
}

impl CustomFieldObject for FullBox {}

impl FieldStruct for FullBox {
    fn marshal_fields(&self, m: &mut Marshaller<'_>) -> Result<()> {
        m.write_bits(self.version as u64, 8)?;
        for b in self.flags {
            m.write_bits(b as u64, 8)?;
        }
        Ok(())
    }

    fn unmarshal_fields(&mut self, u: &mut Unmarshaller<'_>) -> Result<()> {
        self.version = u.read_bits("version", 8)? as u8;
        for b in self.flags.iter_mut() {
            *b = u.read_bits("flags", 8)? as u8;
        }
        u.apply_fullbox(self.version, self.get_flags())
    }

    fn stringify_fields(&self, s: &mut Stringifier) -> Result<()> {
        s.push(
            "version",
            FieldValue::Uint {
                value: self.version as u64,
                hex: false,
            },
        );
        s.push(
            "flags",
            FieldValue::Custom(format!("0x{:06x}", self.get_flags())),
        );
        Ok(())
    }
}

impl FieldCodec for FullBox {
    fn write_field(
        &self,
        m: &mut Marshaller<'_>,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        cfg.require_extend()?;
        self.marshal_fields(m)
    }

    fn read_field(
        &mut self,
        u: &mut Unmarshaller<'_>,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        cfg.require_extend()?;
        self.unmarshal_fields(u)
    }

    fn field_value(
        &self,
        s: &Stringifier,
        _cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<FieldValue> {
        let mut sub = s.nested();
        self.stringify_fields(&mut sub)?;
        Ok(FieldValue::Record(sub.into_entries()))
    }
}
