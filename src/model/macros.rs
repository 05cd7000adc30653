/// Defines a closed enumeration whose members travel as fixed display strings
/// and generates:
/// - derives (Debug, Copy, Clone, PartialEq, Eq, Hash)
/// - `ALL`, `as_wire` and `from_wire`
/// - `WireEnum` and `Display` (the wire string)
/// - string-based `Serialize` / `Deserialize`
///
/// Usage:
///   wire_enum!(WeekNumber { Odd => "1 неделя", Even => "2 неделя" });
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every member, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Returns the string this member is encoded as.
            #[must_use]
            pub const fn as_wire(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Resolves a wire string back to a member.
            #[must_use]
            pub fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl $crate::model::WireEnum for $name {
            const NAME: &'static str = stringify!($name);

            fn as_wire(self) -> &'static str {
                Self::as_wire(self)
            }

            fn from_wire(value: &str) -> Option<Self> {
                Self::from_wire(value)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_wire())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_wire())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::from_wire(&raw).ok_or_else(|| {
                    ::serde::de::Error::custom(format!(
                        "unknown {} value: {raw:?}",
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

pub(crate) use wire_enum;
