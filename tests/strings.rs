use mp4codec::{box_fields, marshal, unmarshal, BoxType, CustomFieldObject, Error, Mp4Box};
use std::io::Cursor;

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct PascalBox {
        pub name: String => "string=c_p",
    }
}

// default `is_pstring` accepts every fitting candidate
impl CustomFieldObject for PascalBox {}

impl Mp4Box for PascalBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstp")
    }
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CRejectBox {
        pub name: String => "string=c_p",
    }
}

impl CustomFieldObject for CRejectBox {
    fn is_pstring(&self, _name: &str, _bytes: &[u8], _remaining: u64) -> bool {
        false
    }
}

impl Mp4Box for CRejectBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstc")
    }
}

#[test]
fn test_cp_string_pascal() {
    let bin = [5, b'H', b'e', b'l', b'l', b'o'];
    let mut dst = PascalBox::default();
    let n = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, bin.len() as u64);
    assert_eq!(dst.name, "Hello");
}

#[test]
fn test_cp_string_rejected_candidate_reads_as_c() {
    // the length prefix fits, but the box vetoes the pascal reading
    let bin = [5, b'H', b'e', b'l', b'l', b'o', 0];
    let mut dst = CRejectBox::default();
    let n = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, bin.len() as u64);
    assert_eq!(dst.name, "\u{5}Hello");
}

#[test]
fn test_cp_string_oversized_prefix_reads_as_c() {
    // prefix byte 9 cannot fit the remaining two bytes, so the C reading
    // wins; the payload also ends without a terminator
    let bin = [9, b'H', b'i'];
    let mut dst = PascalBox::default();
    let n = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, bin.len() as u64);
    assert_eq!(dst.name, "\u{9}Hi");
}

#[test]
fn test_cp_string_marshals_in_c_form() {
    let src = PascalBox {
        name: "Hi".to_string(),
    };
    let mut buf = Vec::new();
    let n = marshal(&mut buf, &src).unwrap();
    assert_eq!(n, 3);
    assert_eq!(buf, [b'H', b'i', 0]);
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct LanguageBox {
        pub language: String => "iso639-2",
    }
}

impl CustomFieldObject for LanguageBox {}

impl Mp4Box for LanguageBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstl")
    }
}

#[test]
fn test_iso639_2_roundtrip() {
    let src = LanguageBox {
        language: "und".to_string(),
    };
    let mut buf = Vec::new();
    let n = marshal(&mut buf, &src).unwrap();
    assert_eq!(n, 2);
    // 0 + 10101 + 01110 + 00100
    assert_eq!(buf, [0x55, 0xc4]);

    let mut dst = LanguageBox::default();
    let n = unmarshal(&mut Cursor::new(&buf[..]), buf.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, 2);
    assert_eq!(dst, src);
}

#[test]
fn test_iso639_2_rejects_bad_code() {
    for bad in ["en", "ENG", "en1", "engl"] {
        let src = LanguageBox {
            language: bad.to_string(),
        };
        let mut buf = Vec::new();
        assert!(
            matches!(marshal(&mut buf, &src), Err(Error::InvalidLanguage { .. })),
            "code {bad:?}"
        );
    }
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct NameBox {
        pub name: String => "string",
        pub value: u8 => "size=8",
    }
}

impl CustomFieldObject for NameBox {}

impl Mp4Box for NameBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstn")
    }
}

#[test]
fn test_c_string_consumes_terminator() {
    let bin = [b'a', b'b', 0, 0x7f];
    let mut dst = NameBox::default();
    let n = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, bin.len() as u64);
    assert_eq!(dst.name, "ab");
    assert_eq!(dst.value, 0x7f);
}
