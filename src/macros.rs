/// Define a box record: the struct itself plus the ordered field walk that
/// drives marshalling, unmarshalling and stringification.
///
/// Each field pairs a type with the tag string describing its wire encoding;
/// declaration order is wire order. Field types must implement `Default`
/// (and, transitively, [`FieldCodec`](crate::FieldCodec)). The enclosing
/// record still needs its own [`CustomFieldObject`](crate::CustomFieldObject)
/// impl, which is usually empty:
///
/// ```
/// use mp4codec::{box_fields, CustomFieldObject, FullBox};
///
/// box_fields! {
///     #[derive(Debug, Clone, PartialEq, Default)]
///     pub struct MediaHeader {
///         pub full_box: FullBox => "extend",
///         pub timescale: u32 => "size=32",
///         pub duration: u64 => "size=32,nver=1",
///         pub language: String => "iso639-2",
///     }
/// }
///
/// impl CustomFieldObject for MediaHeader {}
/// ```
#[macro_export]
macro_rules! box_fields {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fattr:meta])*
                $fvis:vis $field:ident : $ty:ty => $tag:literal
            ),* $(,)?
        }
    ) => {
        $(#[$attr])*
        $vis struct $name {
            $(
                $(#[$fattr])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::FieldStruct for $name {
            fn marshal_fields(&self, m: &mut $crate::Marshaller<'_>) -> $crate::Result<()> {
                $(
                {
                    let cfg = $crate::read_field_config(self, stringify!($field), $tag)?;
                    if m.field_enabled(&cfg, self) {
                        let hook = $crate::CustomFieldObject::on_write_field(
                            self,
                            stringify!($field),
                            m.writer(),
                        )?;
                        if !hook.handled && !m.write_const(&cfg)? {
                            $crate::FieldCodec::write_field(&self.$field, m, &cfg, self)?;
                        }
                    }
                }
                )*
                Ok(())
            }

            fn unmarshal_fields(&mut self, u: &mut $crate::Unmarshaller<'_>) -> $crate::Result<()> {
                $(
                {
                    let cfg = $crate::read_field_config(&*self, stringify!($field), $tag)?;
                    if u.field_enabled(&cfg, &*self) {
                        let left = u.left_bits();
                        let hook = $crate::CustomFieldObject::on_read_field(
                            &mut *self,
                            stringify!($field),
                            u.reader(),
                            left,
                        )?;
                        if hook.handled {
                            u.note_bits(stringify!($field), hook.consumed)?;
                        } else if !u.skip_const(&cfg)? {
                            let mut value = ::std::mem::take(&mut self.$field);
                            let res = $crate::FieldCodec::read_field(&mut value, u, &cfg, &*self);
                            self.$field = value;
                            res?;
                        }
                    }
                }
                )*
                Ok(())
            }

            fn stringify_fields(&self, s: &mut $crate::Stringifier) -> $crate::Result<()> {
                $(
                {
                    let cfg = $crate::read_field_config(self, stringify!($field), $tag)?;
                    if s.field_enabled(&cfg, self) && cfg.cnst.is_none() {
                        match $crate::CustomFieldObject::stringify_field(self, stringify!($field)) {
                            Some(text) => s.push(stringify!($field), $crate::FieldValue::Custom(text)),
                            None => {
                                let value =
                                    $crate::FieldCodec::field_value(&self.$field, s, &cfg, self)?;
                                s.push(stringify!($field), value);
                            }
                        }
                    }
                }
                )*
                Ok(())
            }
        }

        impl $crate::FieldCodec for $name {
            fn write_field(
                &self,
                m: &mut $crate::Marshaller<'_>,
                cfg: &$crate::FieldConfig,
                _cfo: &dyn $crate::CustomFieldObject,
            ) -> $crate::Result<()> {
                cfg.require_extend()?;
                $crate::FieldStruct::marshal_fields(self, m)
            }

            fn read_field(
                &mut self,
                u: &mut $crate::Unmarshaller<'_>,
                cfg: &$crate::FieldConfig,
                _cfo: &dyn $crate::CustomFieldObject,
            ) -> $crate::Result<()> {
                cfg.require_extend()?;
                $crate::FieldStruct::unmarshal_fields(self, u)
            }

            fn field_value(
                &self,
                s: &$crate::Stringifier,
                _cfg: &$crate::FieldConfig,
                _cfo: &dyn $crate::CustomFieldObject,
            ) -> $crate::Result<$crate::FieldValue> {
                let mut sub = s.nested();
                $crate::FieldStruct::stringify_fields(self, &mut sub)?;
                Ok($crate::FieldValue::Record(sub.into_entries()))
            }
        }
    };
}
