use crate::{
    compatible,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
    sqlite::{SqliteDataType, Value},
};

impl Encode for bool {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Integer {
            value: self as i64,
            type_info: None,
        })
    }
}

impl<'r> Decode<'r> for bool {
    fn decode(value: &'r Value) -> Result<bool, DecodeError> {
        compatible!(
            value,
            SqliteDataType::Bool | SqliteDataType::Int | SqliteDataType::Int64
        );
        Ok(value.int()? != 0)
    }
}
