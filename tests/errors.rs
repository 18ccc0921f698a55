use mp4codec::{box_fields, marshal, unmarshal, BoxType, CustomFieldObject, Error, Mp4Box};
use std::io::Cursor;

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct WideBox {
        pub value: u32 => "size=32",
    }
}

impl CustomFieldObject for WideBox {}

impl Mp4Box for WideBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tew0")
    }
}

#[test]
fn test_truncated_field() {
    // two payload bytes cannot hold a 32-bit field
    let bin = [0x12, 0x34];
    let mut dst = WideBox::default();
    let result = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst);
    assert!(matches!(result, Err(Error::TruncatedField { field }) if field == "value"));
}

#[test]
fn test_box_size_below_header() {
    let empty: &[u8] = &[];
    let mut dst = WideBox::default();
    let result = unmarshal(&mut Cursor::new(empty), 7, &mut dst);
    assert!(matches!(result, Err(Error::InvalidBoxSize(7))));
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BadConstBox {
        pub reserved: u8 => "size=8,const=zero",
    }
}

impl CustomFieldObject for BadConstBox {}

impl Mp4Box for BadConstBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tew1")
    }
}

#[test]
fn test_invalid_const_literal() {
    let mut buf = Vec::new();
    let result = marshal(&mut buf, &BadConstBox::default());
    assert!(matches!(result, Err(Error::InvalidConst { value, .. }) if value == "zero"));
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CountedBox {
        pub entries: Vec<u32> => "size=32,len=3",
    }
}

impl CustomFieldObject for CountedBox {}

impl Mp4Box for CountedBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tew2")
    }
}

#[test]
fn test_short_sequence_fails_to_marshal() {
    let src = CountedBox {
        entries: vec![1, 2],
    };
    let mut buf = Vec::new();
    let result = marshal(&mut buf, &src);
    assert!(matches!(
        result,
        Err(Error::SliceLength { expect: 3, actual: 2, .. })
    ));
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct VarintBox {
        pub value: u64 => "varint",
    }
}

impl CustomFieldObject for VarintBox {}

impl Mp4Box for VarintBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tew3")
    }
}

#[test]
fn test_varint_overrun() {
    // continuation bit still set at the end of the payload
    let bin = [0xac, 0xd2, 0xef];
    let mut dst = VarintBox::default();
    let result = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst);
    assert!(matches!(result, Err(Error::VarintOverrun)));
}

#[test]
fn test_varint_roundtrip_through_box() {
    for value in [0u64, 0x6c, 0x1652, 0xb2943] {
        let src = VarintBox { value };
        let mut buf = Vec::new();
        let n = marshal(&mut buf, &src).unwrap();

        let mut dst = VarintBox::default();
        let m = unmarshal(&mut Cursor::new(&buf[..]), buf.len() as u64 + 8, &mut dst).unwrap();
        assert_eq!(n, m);
        assert_eq!(dst, src);
    }
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct ZeroSizeBox {
        pub value: u8 => "len=2",
    }
}

impl CustomFieldObject for ZeroSizeBox {}

impl Mp4Box for ZeroSizeBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tew4")
    }
}

#[test]
fn test_integer_field_requires_a_size() {
    let mut buf = Vec::new();
    let result = marshal(&mut buf, &ZeroSizeBox::default());
    assert!(matches!(result, Err(Error::InvalidFieldTag { .. })));
}
