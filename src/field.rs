use crate::bitio::{BitReadSeek, BitWrite, ReadSeek};
use crate::error::{Error, Result};

/// String encodings a field tag can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringType {
    /// NUL-terminated.
    C,
    /// Either NUL-terminated or length-prefixed, disambiguated at read time.
    CP,
}

/// Element count of a sequence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Fixed(u64),
    /// Runs to the end of the payload on read.
    Unlimited,
}

/// Resolved per-field metadata for one field of one box value.
///
/// Built from the field's tag string by [`read_field_config`]; dynamic sizes
/// and lengths are already resolved through the box callbacks by the time a
/// config is handed to the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConfig {
    pub name: &'static str,
    /// Bit width of one element; 0 for encodings that carry their own size.
    pub size: u64,
    pub length: Length,
    /// Present only when the box version equals this value.
    pub version: Option<u8>,
    /// Present only when the box version does NOT equal this value.
    pub n_version: Option<u8>,
    /// Present only when any of these flag bits are set.
    pub opt_flag: u32,
    /// Present only when none of these flag bits are set.
    pub n_opt_flag: u32,
    /// Presence resolved through `is_opt_field_enabled`.
    pub opt_dynamic: bool,
    /// Constant literal; written on marshal, read and discarded on unmarshal.
    pub cnst: Option<&'static str>,
    /// Recurse into the embedded record with no added framing.
    pub extend: bool,
    /// Uvarint-7 encoded integer.
    pub varint: bool,
    pub str_type: Option<StringType>,
    /// 3-letter language code packed as one zero bit plus 3x5 bits.
    pub iso639_2: bool,
    /// Presentation-only hint for stringification.
    pub hex: bool,
}

impl FieldConfig {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            size: 0,
            length: Length::Unlimited,
            version: None,
            n_version: None,
            opt_flag: 0,
            n_opt_flag: 0,
            opt_dynamic: false,
            cnst: None,
            extend: false,
            varint: false,
            str_type: None,
            iso639_2: false,
            hex: false,
        }
    }

    /// Bit width for fixed-size encodings; those require `0 < size <= 64`.
    pub(crate) fn checked_size(&self) -> Result<u32> {
        if self.size == 0 {
            return Err(invalid(self.name, "size must not be zero"));
        }
        if self.size > 64 {
            return Err(invalid(self.name, "size must not exceed 64 bits"));
        }
        Ok(self.size as u32)
    }

    pub fn require_extend(&self) -> Result<()> {
        if self.extend {
            Ok(())
        } else {
            Err(invalid(self.name, "embedded records require the `extend` tag"))
        }
    }

    /// Config applied to each element of a sequence field.
    pub(crate) fn element(&self) -> FieldConfig {
        FieldConfig {
            extend: true,
            cnst: None,
            ..self.clone()
        }
    }

    /// Presence predicates are AND-combined: the field takes part in the wire
    /// image only if every active predicate passes.
    pub(crate) fn enabled(&self, version: u8, flags: u32, cfo: &dyn CustomFieldObject) -> bool {
        if let Some(v) = self.version {
            if version != v {
                return false;
            }
        }
        if let Some(v) = self.n_version {
            if version == v {
                return false;
            }
        }
        if self.opt_flag != 0 && flags & self.opt_flag == 0 {
            return false;
        }
        if self.n_opt_flag != 0 && flags & self.n_opt_flag != 0 {
            return false;
        }
        if self.opt_dynamic && !cfo.is_opt_field_enabled(self.name) {
            return false;
        }
        true
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::InvalidFieldTag {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_flag_mask(field: &str, value: &str) -> Result<u32> {
    let parsed = if let Some(hex) = value.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    };
    parsed.ok_or_else(|| invalid(field, "unparsable flag mask"))
}

/// Resolve one field's tag string against the enclosing box value.
///
/// Dynamic sizes and lengths call back into `cfo` immediately, so the
/// returned config carries concrete numbers.
pub fn read_field_config(
    cfo: &dyn CustomFieldObject,
    name: &'static str,
    tag: &'static str,
) -> Result<FieldConfig> {
    let mut config = FieldConfig::new(name);
    for item in tag.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (key, value) = match item.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (item, None),
        };
        match (key, value) {
            ("size", Some("dynamic")) => config.size = cfo.get_field_size(name),
            ("size", Some(v)) => {
                config.size = v.parse().map_err(|_| invalid(name, "unparsable size"))?
            }
            ("len", Some("dynamic")) => config.length = Length::Fixed(cfo.get_field_length(name)),
            ("len", Some("unlimited")) => config.length = Length::Unlimited,
            ("len", Some(v)) => {
                config.length =
                    Length::Fixed(v.parse().map_err(|_| invalid(name, "unparsable length"))?)
            }
            ("ver", Some(v)) => {
                config.version = Some(v.parse().map_err(|_| invalid(name, "unparsable version"))?)
            }
            ("nver", Some(v)) => {
                config.n_version =
                    Some(v.parse().map_err(|_| invalid(name, "unparsable version"))?)
            }
            ("opt", Some("dynamic")) => config.opt_dynamic = true,
            ("opt", Some(v)) => config.opt_flag = parse_flag_mask(name, v)?,
            ("nopt", Some(v)) => config.n_opt_flag = parse_flag_mask(name, v)?,
            ("string", None) => config.str_type = Some(StringType::C),
            ("string", Some("c_p")) => config.str_type = Some(StringType::CP),
            ("string", Some(_)) => return Err(invalid(name, "unknown string type")),
            ("const", Some(_)) => config.cnst = value,
            ("extend", None) => config.extend = true,
            ("varint", None) => config.varint = true,
            ("hex", None) => config.hex = true,
            ("iso639-2", None) => config.iso639_2 = true,
            _ => return Err(invalid(name, "unknown tag item")),
        }
    }
    Ok(config)
}

/// Outcome of a custom field hook.
///
/// `consumed` counts bytes for `before_unmarshal` and bits for the per-field
/// hooks; `handled` tells the codec to skip its default handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookOutcome {
    pub consumed: u64,
    pub handled: bool,
}

impl HookOutcome {
    /// Default handling should proceed.
    pub fn pass() -> Self {
        Self::default()
    }

    /// The hook produced the field itself.
    pub fn handled(consumed: u64) -> Self {
        Self {
            consumed,
            handled: true,
        }
    }
}

/// Per-box customization points consulted by the codec.
///
/// Every method has a default: boxes override only what their wire format
/// needs. The two accessors for dynamic widths panic by default; calling one
/// without an override is a programming error, and the message names the
/// offending field.
pub trait CustomFieldObject {
    /// Bit width of a `size=dynamic` field.
    fn get_field_size(&self, name: &str) -> u64 {
        panic!("get_field_size is not implemented: field={name}");
    }

    /// Element count of a `len=dynamic` field.
    fn get_field_length(&self, name: &str) -> u64 {
        panic!("get_field_length is not implemented: field={name}");
    }

    /// Presence of an `opt=dynamic` field.
    fn is_opt_field_enabled(&self, _name: &str) -> bool {
        false
    }

    /// Custom text rendering for the stringifier.
    fn stringify_field(&self, _name: &str) -> Option<String> {
        None
    }

    /// Tie-breaker for `string=c_p` fields: `bytes` is the candidate Pascal
    /// content and `remaining` the payload bytes left after it.
    fn is_pstring(&self, _name: &str, _bytes: &[u8], _remaining: u64) -> bool {
        true
    }

    /// Pre-decode hook over the raw byte stream; runs before any field is
    /// read. `size` is the payload size in bytes.
    fn before_unmarshal(&mut self, _r: &mut dyn ReadSeek, _size: u64) -> Result<HookOutcome> {
        Ok(HookOutcome::pass())
    }

    /// Per-field custom decode.
    fn on_read_field(
        &mut self,
        _name: &str,
        _r: &mut dyn BitReadSeek,
        _left_bits: u64,
    ) -> Result<HookOutcome> {
        Ok(HookOutcome::pass())
    }

    /// Per-field custom encode.
    fn on_write_field(&self, _name: &str, _w: &mut dyn BitWrite) -> Result<HookOutcome> {
        Ok(HookOutcome::pass())
    }
}
