use mp4codec::{box_fields, marshal, unmarshal, BoxType, CustomFieldObject, FullBox, Mp4Box};
use std::io::Cursor;

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct FlaggedBox {
        pub full_box: FullBox => "extend",
        pub opt1: u8 => "size=8,opt=0x0100",
        pub opt2: u8 => "size=8,opt=0x0200",
        pub nopt1: u8 => "size=8,nopt=0x0400",
        pub nopt2: u8 => "size=8,nopt=0x0800",
    }
}

impl CustomFieldObject for FlaggedBox {}

impl Mp4Box for FlaggedBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstf")
    }

    fn get_version(&self) -> u8 {
        self.full_box.version
    }

    fn get_flags(&self) -> u32 {
        self.full_box.get_flags()
    }

    fn set_flags(&mut self, flags: u32) {
        self.full_box.set_flags(flags);
    }
}

#[test]
fn test_flag_gated_fields() {
    // 0x000500 sets bits 0x0400 and 0x0100: opt1 and nopt2 take part in the
    // wire image, opt2 and nopt1 do not
    let src = FlaggedBox {
        full_box: FullBox::new(0, 0x000500),
        opt1: 0x11,
        opt2: 0x22,
        nopt1: 0x33,
        nopt2: 0x44,
    };

    let mut buf = Vec::new();
    let n = marshal(&mut buf, &src).unwrap();
    assert_eq!(n, 6);
    assert_eq!(buf, [0, 0x00, 0x05, 0x00, 0x11, 0x44]);

    // absent fields read back as zero
    let mut dst = FlaggedBox::default();
    unmarshal(&mut Cursor::new(&buf[..]), buf.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(
        dst,
        FlaggedBox {
            full_box: FullBox::new(0, 0x000500),
            opt1: 0x11,
            opt2: 0,
            nopt1: 0,
            nopt2: 0x44,
        }
    );
}

#[test]
fn test_zero_flags_flip_the_gates() {
    let src = FlaggedBox {
        full_box: FullBox::new(0, 0),
        opt1: 0x11,
        opt2: 0x22,
        nopt1: 0x33,
        nopt2: 0x44,
    };

    let mut buf = Vec::new();
    let n = marshal(&mut buf, &src).unwrap();
    assert_eq!(n, 6);
    assert_eq!(buf, [0, 0x00, 0x00, 0x00, 0x33, 0x44]);
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct DynOptBox {
        pub wanted: u8 => "size=8,opt=dynamic",
        pub unwanted: u8 => "size=8,opt=dynamic",
    }
}

impl CustomFieldObject for DynOptBox {
    fn is_opt_field_enabled(&self, name: &str) -> bool {
        name == "wanted"
    }
}

impl Mp4Box for DynOptBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstd")
    }
}

#[test]
fn test_dynamic_optional_fields() {
    let src = DynOptBox {
        wanted: 0xaa,
        unwanted: 0xbb,
    };
    let mut buf = Vec::new();
    let n = marshal(&mut buf, &src).unwrap();
    assert_eq!(n, 1);
    assert_eq!(buf, [0xaa]);

    let mut dst = DynOptBox::default();
    unmarshal(&mut Cursor::new(&buf[..]), buf.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(dst.wanted, 0xaa);
    assert_eq!(dst.unwanted, 0);
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Signed29Box {
        pub value: i32 => "size=29",
        pub padding: u8 => "size=3,const=0",
    }
}

impl CustomFieldObject for Signed29Box {}

impl Mp4Box for Signed29Box {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tsts")
    }
}

#[test]
fn test_signed_29bit_roundtrip() {
    // on-wire 0x1fedcbaa in the low 29 bits is -0x123456
    let bin = [0xff, 0x6e, 0x5d, 0x50];
    let mut dst = Signed29Box::default();
    unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(dst.value, -0x123456);

    let mut buf = Vec::new();
    let n = marshal(&mut buf, &dst).unwrap();
    assert_eq!(n, 4);
    assert_eq!(buf, bin);
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct TailBox {
        pub head: u16 => "size=16",
        pub tail: Vec<u32> => "size=32",
    }
}

impl CustomFieldObject for TailBox {}

impl Mp4Box for TailBox {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstt")
    }
}

#[test]
fn test_unlimited_sequence_runs_to_payload_end() {
    let bin = [
        0xbe, 0xef, // head
        0x00, 0x00, 0x00, 0x01, // tail[0]
        0x00, 0x00, 0x00, 0x02, // tail[1]
        0x00, 0x00, 0x00, 0x03, // tail[2]
    ];
    let mut dst = TailBox::default();
    let n = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, bin.len() as u64);
    assert_eq!(dst.head, 0xbeef);
    assert_eq!(dst.tail, vec![1, 2, 3]);

    let mut buf = Vec::new();
    let n = marshal(&mut buf, &dst).unwrap();
    assert_eq!(n, bin.len() as u64);
    assert_eq!(buf, bin);
}

#[test]
fn test_unlimited_sequence_stops_before_partial_element() {
    // six trailing bytes only fit one 32-bit element; the leftover two
    // stay unread
    let bin = [0xbe, 0xef, 0x00, 0x00, 0x00, 0x01, 0xff, 0xff];
    let mut dst = TailBox::default();
    let n = unmarshal(&mut Cursor::new(&bin[..]), bin.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, 6);
    assert_eq!(dst.tail, vec![1]);
}

box_fields! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct VersionedFields {
        pub full_box: FullBox => "extend",
        pub short_value: u32 => "size=32,ver=0",
        pub long_value: u64 => "size=64,nver=0",
    }
}

impl CustomFieldObject for VersionedFields {}

impl Mp4Box for VersionedFields {
    fn get_type(&self) -> BoxType {
        BoxType(*b"tstv")
    }

    fn get_version(&self) -> u8 {
        self.full_box.version
    }

    fn get_flags(&self) -> u32 {
        self.full_box.get_flags()
    }
}

#[test]
fn test_version_gated_fields() {
    let v0 = [0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2a];
    let mut dst = VersionedFields::default();
    let n = unmarshal(&mut Cursor::new(&v0[..]), v0.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, v0.len() as u64);
    assert_eq!(dst.short_value, 42);
    assert_eq!(dst.long_value, 0);

    let v1 = [
        1, 0x00, 0x00, 0x00, // version 1 selects the wide field
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2b,
    ];
    let mut dst = VersionedFields::default();
    let n = unmarshal(&mut Cursor::new(&v1[..]), v1.len() as u64 + 8, &mut dst).unwrap();
    assert_eq!(n, v1.len() as u64);
    assert_eq!(dst.short_value, 0);
    assert_eq!(dst.long_value, 43);
}
