pub mod bitio;
pub mod boxes;
pub mod codec;
pub mod error;
pub mod field;
mod macros;
pub mod registry;
pub mod stringify;
pub mod types;

pub use bitio::{BitRead, BitReadSeek, BitWrite, ReadSeek};
pub use boxes::{AnyBox, FieldStruct, FullBox, Mp4Box};
pub use codec::{marshal, unmarshal, unmarshal_any, FieldCodec, Marshaller, Unmarshaller};
pub use error::{Error, Result};
pub use field::{read_field_config, CustomFieldObject, FieldConfig, HookOutcome, Length, StringType};
pub use registry::{add_box_def, get_box_def, BoxDef};
pub use stringify::{dump, stringify, BoxDump, FieldDump, FieldEntry, FieldValue, Stringifier};
pub use types::BoxType;
