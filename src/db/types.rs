use std::{fmt, str::FromStr};

use bytes::BytesMut;
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};


/// Our primary database ID type, which we call "key". In the database, it's a
/// `bigint` (`i64`). In the JSON API, it's a plain number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Key(pub(crate) i64);

impl ToSql for Key {
    fn to_sql(
        &self,
        ty: &postgres_types::Type,
        out: &mut BytesMut,
    ) -> Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        self.0.to_sql(ty, out)
    }

    fn accepts(ty: &postgres_types::Type) -> bool {
        <i64 as ToSql>::accepts(ty)
    }

    postgres_types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Key {
    fn from_sql(
        ty: &postgres_types::Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        i64::from_sql(ty, raw).map(Key)
    }

    fn accepts(ty: &postgres_types::Type) -> bool {
        <i64 as FromSql>::accepts(ty)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Key {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Key)
    }
}


/// Defines an enum that is stored as `smallint` in the DB and represented as
/// plain integer in the JSON API.
macro_rules! int_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i16", into = "i16")]
        pub(crate) enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        #[cfg(test)]
        impl $name {
            pub(crate) const ALL: &'static [Self] = &[$(Self::$variant),+];
        }

        impl From<$name> for i16 {
            fn from(v: $name) -> i16 {
                v as i16
            }
        }

        impl TryFrom<i16> for $name {
            type Error = String;
            fn try_from(v: i16) -> Result<Self, Self::Error> {
                match v {
                    $( $value => Ok(Self::$variant), )+
                    other => Err(format!(
                        "\"{other}\" is not a valid choice for {}",
                        stringify!($name).to_lowercase(),
                    )),
                }
            }
        }

        impl FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let v = s.trim().parse::<i16>()
                    .map_err(|_| format!("\"{s}\" is not a valid choice"))?;
                Self::try_from(v)
            }
        }

        impl ToSql for $name {
            fn to_sql(
                &self,
                ty: &postgres_types::Type,
                out: &mut BytesMut,
            ) -> Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
                i16::from(*self).to_sql(ty, out)
            }

            fn accepts(ty: &postgres_types::Type) -> bool {
                <i16 as ToSql>::accepts(ty)
            }

            postgres_types::to_sql_checked!();
        }

        impl<'a> FromSql<'a> for $name {
            fn from_sql(
                ty: &postgres_types::Type,
                raw: &'a [u8],
            ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
                Self::try_from(i16::from_sql(ty, raw)?).map_err(Into::into)
            }

            fn accepts(ty: &postgres_types::Type) -> bool {
                <i16 as FromSql>::accepts(ty)
            }
        }
    };
}

int_enum! {
    /// The role of a user on a board.
    Role {
        Owner = 1,
        Writer = 2,
        Reader = 3,
    }
}

impl Role {
    /// Roles that can be assigned when updating the participants of a board.
    /// The owner role is only given to the creator of a board.
    pub(crate) fn is_editable(self) -> bool {
        matches!(self, Self::Writer | Self::Reader)
    }

    /// Whether this role allows creating and changing categories, goals and
    /// comments on the board.
    pub(crate) fn can_write(self) -> bool {
        matches!(self, Self::Owner | Self::Writer)
    }

    /// Whether this role allows changing the board itself.
    pub(crate) fn can_manage(self) -> bool {
        self == Self::Owner
    }
}

int_enum! {
    Status {
        ToDo = 1,
        InProgress = 2,
        Done = 3,
        Archived = 4,
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ToDo
    }
}

int_enum! {
    Priority {
        Low = 1,
        Medium = 2,
        High = 3,
        Critical = 4,
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}
