//! Provides [`Encode`] for encoding values for the database.
use crate::{Value, error::EncodeError};

/// Encode a single value to be sent to the database.
pub trait Encode {
    /// Converts `self` into the [`Value`] bound to the database, consuming the value. Encoders
    /// are implemented for reference counted types where a shift in ownership is not wanted.
    #[must_use]
    fn encode(self) -> Result<Value, EncodeError>
    where
        Self: Sized;
}

impl<T> Encode for Option<T>
where
    T: Encode,
{
    fn encode(self) -> Result<Value, EncodeError> {
        if let Some(v) = self {
            v.encode()
        } else {
            Ok(Value::Null { type_info: None })
        }
    }
}
