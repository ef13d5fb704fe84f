/// Declares an enum whose variants are carried on the wire as restricted symbols
macro_rules! symbol_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $sym:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )*
        }

        impl $name {
            /// Symbolic value carried on the wire
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $sym, )*
                }
            }
        }

        impl From<&$name> for $crate::codec::primitives::Symbol {
            fn from(value: &$name) -> Self {
                $crate::codec::primitives::Symbol::from(value.as_str())
            }
        }

        impl From<$name> for $crate::codec::Value {
            fn from(value: $name) -> Self {
                $crate::codec::Value::Symbol((&value).into())
            }
        }

        impl<'a> TryFrom<&'a str> for $name {
            type Error = &'a str;

            fn try_from(value: &'a str) -> Result<Self, Self::Error> {
                match value {
                    $( $sym => Ok($name::$variant), )*
                    _ => Err(value),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serde::Serialize::serialize(&$crate::codec::primitives::Symbol::from(self), serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let symbol: $crate::codec::primitives::Symbol =
                    serde::Deserialize::deserialize(deserializer)?;
                Self::try_from(symbol.as_str()).map_err(|_| {
                    serde::de::Error::custom(concat!("Invalid value for ", stringify!($name)))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Implements [`serde::Serialize`], [`serde::Deserialize`] and `From<T> for Value` for enums
/// over described types that provide `From<&T> for Value` and `TryFrom<Value>`
macro_rules! described_enum_serde {
    ($($ty:ty),* $(,)?) => {
        $(
            impl serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serde::Serialize::serialize(&$crate::codec::Value::from(self), serializer)
                }
            }

            impl From<$ty> for $crate::codec::Value {
                fn from(value: $ty) -> Self {
                    Self::from(&value)
                }
            }

            impl<'de> serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    use serde::de::Error as _;
                    let value: $crate::codec::Value = serde::Deserialize::deserialize(deserializer)?;
                    Self::try_from(value).map_err(D::Error::custom)
                }
            }
        )*
    };
}
