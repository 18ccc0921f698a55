use crate::types::BoxType;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid field tag on `{field}`: {reason}")]
    InvalidFieldTag { field: String, reason: String },
    #[error("unsupported version {version} for box `{typ}`")]
    UnsupportedVersion { typ: BoxType, version: u8 },
    #[error("field `{field}` exceeds the remaining payload")]
    TruncatedField { field: String },
    #[error("varint continuation past the end of the payload")]
    VarintOverrun,
    #[error("invalid const literal `{value}` on field `{field}`")]
    InvalidConst { field: String, value: String },
    #[error("box type `{0}` is not registered")]
    UnknownBoxType(BoxType),
    #[error("box size {0} is smaller than an 8 byte header")]
    InvalidBoxSize(u64),
    #[error("field `{field}` holds {actual} elements, tag requires {expect}")]
    SliceLength {
        field: String,
        expect: u64,
        actual: u64,
    },
    #[error("invalid ISO 639-2 code `{value}` on field `{field}`")]
    InvalidLanguage { field: String, value: String },
    #[error("callback failed: {0}")]
    Callback(String),
}

pub type Result<T> = std::result::Result<T, Error>;
