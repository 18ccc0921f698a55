use std::io::{Read, Seek, SeekFrom, Write};

use crate::bitio::{self, BitRead, BitReadSeek, BitWrite};
use crate::boxes::{AnyBox, Mp4Box};
use crate::error::{Error, Result};
use crate::field::{CustomFieldObject, FieldConfig, Length, StringType};
use crate::registry;
use crate::stringify::{FieldValue, Stringifier};
use crate::types::BoxType;

/// Serialize a box payload.
///
/// Fields are written in declaration order; the trailing partial byte, if
/// any, is padded with zero bits. The outer box header (size + type) is the
/// caller's business.
///
/// # Parameters
/// - `w`: the byte sink
/// - `src`: the box value to encode
///
/// # Returns
/// The number of payload bytes written.
///
/// # Example
/// ```
/// use mp4codec::{box_fields, marshal, BoxType, CustomFieldObject, Mp4Box};
///
/// box_fields! {
///     #[derive(Debug, Clone, PartialEq, Default)]
///     pub struct PixelAspectRatio {
///         pub h_spacing: u32 => "size=32",
///         pub v_spacing: u32 => "size=32",
///     }
/// }
///
/// impl CustomFieldObject for PixelAspectRatio {}
///
/// impl Mp4Box for PixelAspectRatio {
///     fn get_type(&self) -> BoxType {
///         BoxType(*b"pasp")
///     }
/// }
///
/// let pasp = PixelAspectRatio { h_spacing: 4, v_spacing: 3 };
/// let mut payload = Vec::new();
/// let n = marshal(&mut payload, &pasp)?;
/// assert_eq!(n, 8);
/// assert_eq!(payload, [0, 0, 0, 4, 0, 0, 0, 3]);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn marshal<W: Write, B: Mp4Box + ?Sized>(w: &mut W, src: &B) -> Result<u64> {
    let mut writer = bitio::Writer::new(w);
    {
        let mut m = Marshaller::new(&mut writer, src.get_version(), src.get_flags());
        src.marshal_fields(&mut m)?;
    }
    writer.finish()?;
    Ok(writer.bits_written().div_ceil(8))
}

/// Parse a box payload into `dst`.
///
/// `box_size` is the box size *including* the 8-byte outer header that the
/// caller has already consumed; the payload is `box_size - 8` bytes starting
/// at the reader's current position. Returns the number of payload bytes
/// consumed.
pub fn unmarshal<R: Read + Seek, B: Mp4Box + ?Sized>(
    r: &mut R,
    box_size: u64,
    dst: &mut B,
) -> Result<u64> {
    let payload = box_size
        .checked_sub(8)
        .ok_or(Error::InvalidBoxSize(box_size))?;

    let pre = dst.before_unmarshal(&mut *r, payload)?;
    if pre.handled {
        return Ok(pre.consumed);
    }

    let mut reader = bitio::Reader::new(r);
    let mut u = Unmarshaller {
        reader: &mut reader,
        size: payload,
        rbits: pre.consumed * 8,
        version: dst.get_version(),
        flags: dst.get_flags(),
        typ: dst.get_type(),
    };
    dst.unmarshal_fields(&mut u)?;
    Ok(u.rbits.div_ceil(8))
}

/// Parse a box payload of a registered type into a fresh clone of its
/// template.
pub fn unmarshal_any<R: Read + Seek>(
    r: &mut R,
    typ: BoxType,
    box_size: u64,
) -> Result<(Box<dyn AnyBox>, u64)> {
    let def = registry::get_box_def(typ).ok_or(Error::UnknownBoxType(typ))?;
    let mut dst = def.new_box();
    let n = unmarshal(r, box_size, dst.as_box_mut())?;
    Ok((dst, n))
}

/// Encoding state for one `marshal` call.
pub struct Marshaller<'a> {
    writer: &'a mut dyn BitWrite,
    version: u8,
    flags: u32,
}

impl<'a> Marshaller<'a> {
    pub(crate) fn new(writer: &'a mut dyn BitWrite, version: u8, flags: u32) -> Self {
        Self {
            writer,
            version,
            flags,
        }
    }

    /// The underlying bit writer, as handed to `on_write_field`.
    pub fn writer(&mut self) -> &mut dyn BitWrite {
        &mut *self.writer
    }

    pub fn field_enabled(&self, cfg: &FieldConfig, cfo: &dyn CustomFieldObject) -> bool {
        cfg.enabled(self.version, self.flags, cfo)
    }

    pub fn write_bits(&mut self, value: u64, n: u32) -> Result<()> {
        Ok(self.writer.write_bits(value, n)?)
    }

    /// Emit a `const` field. Returns false when the field has no constant
    /// and default encoding should run.
    pub fn write_const(&mut self, cfg: &FieldConfig) -> Result<bool> {
        let Some(lit) = cfg.cnst else {
            return Ok(false);
        };
        let value = parse_const(lit).ok_or_else(|| Error::InvalidConst {
            field: cfg.name.to_string(),
            value: lit.to_string(),
        })?;
        self.write_bits(value, cfg.checked_size()?)?;
        Ok(true)
    }

    fn write_uvarint(&mut self, value: u64) -> Result<()> {
        let mut groups = [0u8; 10];
        let mut n = 0;
        let mut rest = value;
        loop {
            groups[n] = (rest & 0x7f) as u8;
            rest >>= 7;
            n += 1;
            if rest == 0 {
                break;
            }
        }
        for i in (0..n).rev() {
            let mut octet = groups[i];
            if i != 0 {
                octet |= 0x80;
            }
            self.write_bits(octet as u64, 8)?;
        }
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        self.writer.write_all(s.as_bytes())?;
        self.writer.write_all(&[0])?;
        Ok(())
    }

    fn write_iso639_2(&mut self, cfg: &FieldConfig, s: &str) -> Result<()> {
        if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(Error::InvalidLanguage {
                field: cfg.name.to_string(),
                value: s.to_string(),
            });
        }
        self.write_bits(0, 1)?;
        for b in s.bytes() {
            self.write_bits((b - 0x60) as u64, 5)?;
        }
        Ok(())
    }
}

/// Decoding state for one `unmarshal` call. Tracks consumed bits against the
/// payload size and carries the box version/flags once the FullBox prefix
/// has been parsed.
pub struct Unmarshaller<'a> {
    reader: &'a mut dyn BitReadSeek,
    // payload size in bytes
    size: u64,
    rbits: u64,
    version: u8,
    flags: u32,
    typ: BoxType,
}

impl<'a> Unmarshaller<'a> {
    /// The underlying bit reader, as handed to `on_read_field`.
    pub fn reader(&mut self) -> &mut dyn BitReadSeek {
        &mut *self.reader
    }

    /// Payload bits not yet consumed.
    pub fn left_bits(&self) -> u64 {
        self.size * 8 - self.rbits
    }

    pub fn field_enabled(&self, cfg: &FieldConfig, cfo: &dyn CustomFieldObject) -> bool {
        cfg.enabled(self.version, self.flags, cfo)
    }

    pub fn read_bits(&mut self, field: &str, n: u32) -> Result<u64> {
        if n as u64 > self.left_bits() {
            return Err(Error::TruncatedField {
                field: field.to_string(),
            });
        }
        let value = self.reader.read_bits(n)?;
        self.rbits += n as u64;
        Ok(value)
    }

    /// Account for bits a hook consumed on its own.
    pub fn note_bits(&mut self, field: &str, bits: u64) -> Result<()> {
        if bits > self.left_bits() {
            return Err(Error::TruncatedField {
                field: field.to_string(),
            });
        }
        self.rbits += bits;
        Ok(())
    }

    /// Skip a `const` field. Returns false when the field has no constant
    /// and default decoding should run.
    pub fn skip_const(&mut self, cfg: &FieldConfig) -> Result<bool> {
        if cfg.cnst.is_none() {
            return Ok(false);
        }
        self.read_bits(cfg.name, cfg.checked_size()?)?;
        Ok(true)
    }

    /// Record the parsed FullBox prefix and enforce the registered version
    /// set. Unregistered types are not gated.
    pub fn apply_fullbox(&mut self, version: u8, flags: u32) -> Result<()> {
        self.version = version;
        self.flags = flags;
        if let Some(def) = registry::get_box_def(self.typ) {
            if !def.is_supported_version(version) {
                return Err(Error::UnsupportedVersion {
                    typ: self.typ,
                    version,
                });
            }
        }
        Ok(())
    }

    fn read_uvarint(&mut self, field: &str) -> Result<u64> {
        let mut value = 0u64;
        loop {
            if self.left_bits() < 8 || value > u64::MAX >> 7 {
                return Err(Error::VarintOverrun);
            }
            let octet = self.read_bits(field, 8)?;
            value = (value << 7) | (octet & 0x7f);
            if octet & 0x80 == 0 {
                return Ok(value);
            }
        }
    }

    fn read_string_c(&mut self, cfg: &FieldConfig) -> Result<String> {
        let mut data = Vec::new();
        // strings may legitimately run to the end of the payload unterminated
        while self.left_bits() >= 8 {
            let b = self.read_bits(cfg.name, 8)? as u8;
            if b == 0 {
                break;
            }
            data.push(b);
        }
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    fn read_string_cp(&mut self, cfg: &FieldConfig, cfo: &dyn CustomFieldObject) -> Result<String> {
        if let Some(s) = self.try_read_pstring(cfg, cfo)? {
            return Ok(s);
        }
        self.read_string_c(cfg)
    }

    /// Attempt the length-prefixed reading of a `c_p` string. Backtracks and
    /// returns `None` when the prefix cannot fit the remaining payload or the
    /// box rejects the candidate.
    fn try_read_pstring(
        &mut self,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<Option<String>> {
        // the pre-read below backtracks by byte offset
        if self.rbits % 8 != 0 || self.left_bits() < 8 {
            return Ok(None);
        }
        let start = self.reader.seek(SeekFrom::Current(0))?;
        let plen = self.reader.read_bits(8)?;
        let remaining = self.left_bits() / 8 - 1;
        if plen > remaining {
            self.reader.seek(SeekFrom::Start(start))?;
            return Ok(None);
        }
        let mut buf = vec![0u8; plen as usize];
        self.reader.read_exact(&mut buf)?;
        if cfo.is_pstring(cfg.name, &buf, remaining - plen) {
            self.rbits += (plen + 1) * 8;
            Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
        } else {
            self.reader.seek(SeekFrom::Start(start))?;
            Ok(None)
        }
    }

    fn read_iso639_2(&mut self, cfg: &FieldConfig) -> Result<String> {
        self.read_bits(cfg.name, 1)?;
        let mut code = String::with_capacity(3);
        for _ in 0..3 {
            let c = self.read_bits(cfg.name, 5)? as u8;
            code.push((c + 0x60) as char);
        }
        Ok(code)
    }
}

fn parse_const(lit: &str) -> Option<u64> {
    if let Some(hex) = lit.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        lit.parse().ok()
    }
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Per-kind wire encoding of a single field value.
///
/// Implemented for the integer primitives, `bool`, byte arrays, `String`,
/// sequences, and (via `box_fields!`) embedded records. The `Default` bound
/// lets the decoder materialize sequence elements and lets the generated
/// field walk temporarily detach a field from its record.
pub trait FieldCodec: Default {
    fn write_field(
        &self,
        m: &mut Marshaller<'_>,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<()>;

    fn read_field(
        &mut self,
        u: &mut Unmarshaller<'_>,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<()>;

    fn field_value(
        &self,
        s: &Stringifier,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<FieldValue>;
}

macro_rules! impl_codec_for_uint {
    ($($t:ty),* $(,)?) => {$(
        impl FieldCodec for $t {
            fn write_field(
                &self,
                m: &mut Marshaller<'_>,
                cfg: &FieldConfig,
                _cfo: &dyn CustomFieldObject,
            ) -> Result<()> {
                if cfg.varint {
                    return m.write_uvarint(*self as u64);
                }
                m.write_bits(*self as u64, cfg.checked_size()?)
            }

            fn read_field(
                &mut self,
                u: &mut Unmarshaller<'_>,
                cfg: &FieldConfig,
                _cfo: &dyn CustomFieldObject,
            ) -> Result<()> {
                if cfg.varint {
                    *self = u.read_uvarint(cfg.name)? as $t;
                } else {
                    *self = u.read_bits(cfg.name, cfg.checked_size()?)? as $t;
                }
                Ok(())
            }

            fn field_value(
                &self,
                _s: &Stringifier,
                cfg: &FieldConfig,
                _cfo: &dyn CustomFieldObject,
            ) -> Result<FieldValue> {
                Ok(FieldValue::Uint { value: *self as u64, hex: cfg.hex })
            }
        }
    )*};
}

impl_codec_for_uint!(u8, u16, u32, u64);

macro_rules! impl_codec_for_int {
    ($($t:ty),* $(,)?) => {$(
        impl FieldCodec for $t {
            fn write_field(
                &self,
                m: &mut Marshaller<'_>,
                cfg: &FieldConfig,
                _cfo: &dyn CustomFieldObject,
            ) -> Result<()> {
                if cfg.varint {
                    return m.write_uvarint(*self as i64 as u64);
                }
                // two's complement, truncated to the declared width
                m.write_bits(*self as i64 as u64, cfg.checked_size()?)
            }

            fn read_field(
                &mut self,
                u: &mut Unmarshaller<'_>,
                cfg: &FieldConfig,
                _cfo: &dyn CustomFieldObject,
            ) -> Result<()> {
                if cfg.varint {
                    *self = u.read_uvarint(cfg.name)? as $t;
                } else {
                    let bits = cfg.checked_size()?;
                    let raw = u.read_bits(cfg.name, bits)?;
                    *self = sign_extend(raw, bits) as $t;
                }
                Ok(())
            }

            fn field_value(
                &self,
                _s: &Stringifier,
                _cfg: &FieldConfig,
                _cfo: &dyn CustomFieldObject,
            ) -> Result<FieldValue> {
                Ok(FieldValue::Int(*self as i64))
            }
        }
    )*};
}

impl_codec_for_int!(i8, i16, i32, i64);

impl FieldCodec for bool {
    fn write_field(
        &self,
        m: &mut Marshaller<'_>,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        m.write_bits(*self as u64, cfg.checked_size()?)
    }

    fn read_field(
        &mut self,
        u: &mut Unmarshaller<'_>,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        *self = u.read_bits(cfg.name, cfg.checked_size()?)? != 0;
        Ok(())
    }

    fn field_value(
        &self,
        _s: &Stringifier,
        _cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<FieldValue> {
        Ok(FieldValue::Bool(*self))
    }
}

impl<const N: usize> FieldCodec for [u8; N]
where
    [u8; N]: Default,
{
    fn write_field(
        &self,
        m: &mut Marshaller<'_>,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        let bits = cfg.checked_size()?;
        for b in self {
            m.write_bits(*b as u64, bits)?;
        }
        Ok(())
    }

    fn read_field(
        &mut self,
        u: &mut Unmarshaller<'_>,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        let bits = cfg.checked_size()?;
        for b in self.iter_mut() {
            *b = u.read_bits(cfg.name, bits)? as u8;
        }
        Ok(())
    }

    fn field_value(
        &self,
        _s: &Stringifier,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<FieldValue> {
        Ok(FieldValue::Bytes {
            data: self.to_vec(),
            text: cfg.str_type.is_some(),
        })
    }
}

impl FieldCodec for String {
    fn write_field(
        &self,
        m: &mut Marshaller<'_>,
        cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        if cfg.iso639_2 {
            return m.write_iso639_2(cfg, self);
        }
        match cfg.str_type {
            // c_p strings always marshal in C form
            Some(_) => m.write_string(self),
            None => Err(Error::InvalidFieldTag {
                field: cfg.name.to_string(),
                reason: "string fields require a `string` or `iso639-2` tag".to_string(),
            }),
        }
    }

    fn read_field(
        &mut self,
        u: &mut Unmarshaller<'_>,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        if cfg.iso639_2 {
            *self = u.read_iso639_2(cfg)?;
            return Ok(());
        }
        match cfg.str_type {
            Some(StringType::C) => *self = u.read_string_c(cfg)?,
            Some(StringType::CP) => *self = u.read_string_cp(cfg, cfo)?,
            None => {
                return Err(Error::InvalidFieldTag {
                    field: cfg.name.to_string(),
                    reason: "string fields require a `string` or `iso639-2` tag".to_string(),
                })
            }
        }
        Ok(())
    }

    fn field_value(
        &self,
        _s: &Stringifier,
        _cfg: &FieldConfig,
        _cfo: &dyn CustomFieldObject,
    ) -> Result<FieldValue> {
        Ok(FieldValue::Text(self.clone()))
    }
}

impl<T: FieldCodec> FieldCodec for Vec<T> {
    fn write_field(
        &self,
        m: &mut Marshaller<'_>,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        let elem = cfg.element();
        let count = match cfg.length {
            Length::Fixed(n) => n,
            // the element count of an unlimited sequence is the value's own
            Length::Unlimited => self.len() as u64,
        };
        if (self.len() as u64) < count {
            return Err(Error::SliceLength {
                field: cfg.name.to_string(),
                expect: count,
                actual: self.len() as u64,
            });
        }
        for item in self.iter().take(count as usize) {
            item.write_field(m, &elem, cfo)?;
        }
        Ok(())
    }

    fn read_field(
        &mut self,
        u: &mut Unmarshaller<'_>,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        self.clear();
        let elem = cfg.element();
        match cfg.length {
            Length::Fixed(count) => {
                for _ in 0..count {
                    let mut item = T::default();
                    item.read_field(u, &elem, cfo)?;
                    self.push(item);
                }
            }
            Length::Unlimited => {
                // until the remainder is gone or cannot fit one more element
                while u.left_bits() > 0 && (elem.size == 0 || u.left_bits() >= elem.size) {
                    let before = u.left_bits();
                    let mut item = T::default();
                    item.read_field(u, &elem, cfo)?;
                    // an element that consumes nothing would never drain the payload
                    if u.left_bits() == before {
                        break;
                    }
                    self.push(item);
                }
            }
        }
        Ok(())
    }

    fn field_value(
        &self,
        s: &Stringifier,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<FieldValue> {
        let elem = cfg.element();
        let mut items = Vec::with_capacity(self.len());
        for item in self {
            items.push(item.field_value(s, &elem, cfo)?);
        }
        Ok(FieldValue::List(items))
    }
}

impl<T: FieldCodec> FieldCodec for Box<T> {
    fn write_field(
        &self,
        m: &mut Marshaller<'_>,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        (**self).write_field(m, cfg, cfo)
    }

    fn read_field(
        &mut self,
        u: &mut Unmarshaller<'_>,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<()> {
        (**self).read_field(u, cfg, cfo)
    }

    fn field_value(
        &self,
        s: &Stringifier,
        cfg: &FieldConfig,
        cfo: &dyn CustomFieldObject,
    ) -> Result<FieldValue> {
        (**self).field_value(s, cfg, cfo)
    }
}
