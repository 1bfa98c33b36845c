//! # 缓存值编解码
//!
//! 存储格式为 `PRESENT_TAG` + JSON。标记使得 `None`/`()` 这类“空”结果
//! 仍然以“存在”的记录落盘，与键不存在区分开。
//!
//! JSON 会把 `Some(None)` 与 `None` 都写成 `null`。顶层值为 k 层 `Some`
//! 包裹的空值时改用 `NESTED_NULL_TAG` + k，解码时按层数还原。

use serde::de::{self, Deserializer, Visitor, value};
use serde::ser::{self, Impossible, Serializer};
use serde::{Serialize, de::DeserializeOwned, forward_to_deserialize_any};

use crate::error::{MemoError, Result};

/// 已缓存记录的前缀标记
pub const PRESENT_TAG: &[u8] = b"$memo:";

/// 嵌套空值记录的前缀标记，后跟 `Some` 层数
pub const NESTED_NULL_TAG: &[u8] = b"$memo?";

/// 编码结果值
///
/// 序列化失败归入 `Operation` 类错误：结果来自被包装操作。
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    if let Ok(Some(depth)) = value.serialize(NullDepth)
        && depth > 0
    {
        let mut bytes = NESTED_NULL_TAG.to_vec();
        bytes.extend_from_slice(depth.to_string().as_bytes());
        return Ok(bytes);
    }

    let payload = serde_json::to_vec(value)
        .map_err(|e| MemoError::operation_with_message("操作结果无法序列化", e))?;

    let mut bytes = Vec::with_capacity(PRESENT_TAG.len() + payload.len());
    bytes.extend_from_slice(PRESENT_TAG);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// 解码存储中的字节
///
/// `key` 仅用于错误信息。
pub fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    if let Some(depth) = bytes.strip_prefix(NESTED_NULL_TAG) {
        let depth = std::str::from_utf8(depth)
            .ok()
            .and_then(|d| d.parse::<u32>().ok())
            .ok_or_else(|| MemoError::corrupt_record(key, "嵌套空值层数无效"))?;
        return T::deserialize(NestedNull { depth }).map_err(|e| {
            MemoError::corrupt_record_with_source(key, "记录内容无法反序列化", e)
        });
    }

    let payload = bytes
        .strip_prefix(PRESENT_TAG)
        .ok_or_else(|| MemoError::corrupt_record(key, "缺少记录标记"))?;

    serde_json::from_slice(payload).map_err(|e| {
        MemoError::corrupt_record_with_source(key, "记录内容无法反序列化", e)
    })
}

/// 计算顶层值外层 `Some` 的层数
///
/// 值为 `Some^k(None | ())` 时返回 `Some(k)`，其余返回 `None`。
/// 复合类型直接以错误结束遍历。
struct NullDepth;

type Depth = std::result::Result<Option<u32>, value::Error>;

impl Serializer for NullDepth {
    type Ok = Option<u32>;
    type Error = value::Error;
    type SerializeSeq = Impossible<Self::Ok, Self::Error>;
    type SerializeTuple = Impossible<Self::Ok, Self::Error>;
    type SerializeTupleStruct = Impossible<Self::Ok, Self::Error>;
    type SerializeTupleVariant = Impossible<Self::Ok, Self::Error>;
    type SerializeMap = Impossible<Self::Ok, Self::Error>;
    type SerializeStruct = Impossible<Self::Ok, Self::Error>;
    type SerializeStructVariant = Impossible<Self::Ok, Self::Error>;

    fn serialize_bool(self, _: bool) -> Depth {
        Ok(None)
    }

    fn serialize_i8(self, _: i8) -> Depth {
        Ok(None)
    }

    fn serialize_i16(self, _: i16) -> Depth {
        Ok(None)
    }

    fn serialize_i32(self, _: i32) -> Depth {
        Ok(None)
    }

    fn serialize_i64(self, _: i64) -> Depth {
        Ok(None)
    }

    fn serialize_i128(self, _: i128) -> Depth {
        Ok(None)
    }

    fn serialize_u8(self, _: u8) -> Depth {
        Ok(None)
    }

    fn serialize_u16(self, _: u16) -> Depth {
        Ok(None)
    }

    fn serialize_u32(self, _: u32) -> Depth {
        Ok(None)
    }

    fn serialize_u64(self, _: u64) -> Depth {
        Ok(None)
    }

    fn serialize_u128(self, _: u128) -> Depth {
        Ok(None)
    }

    fn serialize_f32(self, _: f32) -> Depth {
        Ok(None)
    }

    fn serialize_f64(self, _: f64) -> Depth {
        Ok(None)
    }

    fn serialize_char(self, _: char) -> Depth {
        Ok(None)
    }

    fn serialize_str(self, _: &str) -> Depth {
        Ok(None)
    }

    fn serialize_bytes(self, _: &[u8]) -> Depth {
        Ok(None)
    }

    fn serialize_none(self) -> Depth {
        Ok(Some(0))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Depth {
        Ok(value.serialize(self)?.and_then(|depth| depth.checked_add(1)))
    }

    fn serialize_unit(self) -> Depth {
        Ok(Some(0))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Depth {
        Ok(Some(0))
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Depth {
        Ok(None)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Depth {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Depth {
        Ok(None)
    }

    fn serialize_seq(
        self,
        _: Option<usize>,
    ) -> std::result::Result<Self::SerializeSeq, Self::Error> {
        Err(ser::Error::custom("compound value"))
    }

    fn serialize_tuple(self, _: usize) -> std::result::Result<Self::SerializeTuple, Self::Error> {
        Err(ser::Error::custom("compound value"))
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self::SerializeTupleStruct, Self::Error> {
        Err(ser::Error::custom("compound value"))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self::SerializeTupleVariant, Self::Error> {
        Err(ser::Error::custom("compound value"))
    }

    fn serialize_map(
        self,
        _: Option<usize>,
    ) -> std::result::Result<Self::SerializeMap, Self::Error> {
        Err(ser::Error::custom("compound value"))
    }

    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self::SerializeStruct, Self::Error> {
        Err(ser::Error::custom("compound value"))
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self::SerializeStructVariant, Self::Error> {
        Err(ser::Error::custom("compound value"))
    }
}

/// 按层数重建 `Some^depth(None)` 的反序列化器
struct NestedNull {
    depth: u32,
}

impl<'de> Deserializer<'de> for NestedNull {
    type Error = value::Error;

    fn deserialize_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        match self.depth.checked_sub(1) {
            Some(depth) => visitor.visit_some(Self { depth }),
            None => visitor.visit_unit(),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        match self.depth.checked_sub(1) {
            Some(depth) => visitor.visit_some(Self { depth }),
            None => visitor.visit_none(),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        if self.depth == 0 {
            visitor.visit_unit()
        } else {
            Err(de::Error::invalid_type(de::Unexpected::Option, &visitor))
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _: &'static str,
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _: &'static str,
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf seq tuple tuple_struct map struct enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u64,
        name: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_encoded_value_is_tagged() {
        let bytes = encode(&"R").unwrap();
        assert_eq!(bytes, b"$memo:\"R\"".to_vec());
    }

    #[test]
    fn test_struct_value() {
        let profile = Profile {
            id: 7,
            name: "alice".to_string(),
            tags: vec!["admin".to_string()],
        };
        let bytes = encode(&profile).unwrap();
        let decoded: Profile = decode("k", &bytes).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_absent_result_is_still_a_record() {
        let bytes = encode(&None::<String>).unwrap();
        assert_eq!(bytes, b"$memo:null".to_vec());

        let decoded: Option<String> = decode("k", &bytes).unwrap();
        assert_eq!(decoded, None);

        let unit_bytes = encode(&()).unwrap();
        let () = decode("k", &unit_bytes).unwrap();
    }

    #[test]
    fn test_absent_and_empty_are_distinct() {
        let none = encode(&None::<String>).unwrap();
        let empty = encode(&Some(String::new())).unwrap();
        assert_ne!(none, empty);

        let none: Option<String> = decode("k", &none).unwrap();
        let empty: Option<String> = decode("k", &empty).unwrap();
        assert_eq!(none, None);
        assert_eq!(empty, Some(String::new()));
    }

    #[test]
    fn test_nested_absent_results_stay_distinct() {
        let values = [None, Some(None), Some(Some(String::new()))];
        let encoded: Vec<Vec<u8>> = values.iter().map(|v| encode(v).unwrap()).collect();

        assert_eq!(encoded[0], b"$memo:null".to_vec());
        assert_eq!(encoded[1], b"$memo?1".to_vec());
        assert_eq!(encoded[2], b"$memo:\"\"".to_vec());

        for (value, bytes) in values.iter().zip(&encoded) {
            let decoded: Option<Option<String>> = decode("k", bytes).unwrap();
            assert_eq!(&decoded, value);
        }
    }

    #[test]
    fn test_deeply_nested_null() {
        let value: Option<Option<Option<()>>> = Some(Some(None));
        let bytes = encode(&value).unwrap();
        assert_eq!(bytes, b"$memo?2".to_vec());

        let decoded: Option<Option<Option<()>>> = decode("k", &bytes).unwrap();
        assert_eq!(decoded, value);

        let unit: Option<()> = decode("k", &encode(&Some(())).unwrap()).unwrap();
        assert_eq!(unit, Some(()));
    }

    #[test]
    fn test_nested_null_type_mismatch_is_corrupt() {
        let bytes = encode(&Some(None::<u32>)).unwrap();
        let err = decode::<String>("k", &bytes).unwrap_err();
        assert!(matches!(err, MemoError::CorruptRecord { .. }));

        let err = decode::<Option<u32>>("k", b"$memo?x").unwrap_err();
        assert!(matches!(err, MemoError::CorruptRecord { .. }));
    }

    #[test]
    fn test_missing_tag_is_corrupt() {
        let err = decode::<String>("memos:a:b", b"\"R\"").unwrap_err();
        assert!(matches!(err, MemoError::CorruptRecord { ref key, .. } if key == "memos:a:b"));
    }

    #[test]
    fn test_malformed_payload_is_corrupt() {
        let err = decode::<u32>("k", b"$memo:{not json").unwrap_err();
        assert!(matches!(err, MemoError::CorruptRecord { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_type_mismatch_is_corrupt() {
        let bytes = encode(&"text").unwrap();
        let err = decode::<u32>("k", &bytes).unwrap_err();
        assert!(matches!(err, MemoError::CorruptRecord { .. }));
    }

    #[test]
    fn test_unserializable_result_is_operation_failure() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(vec![1u8], 1u8);
        let err = encode(&map).unwrap_err();
        assert!(matches!(err, MemoError::Operation { .. }));
    }
}
