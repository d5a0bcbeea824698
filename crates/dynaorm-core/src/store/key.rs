//! Order-preserving key encoding.
//!
//! Each key component is a tag byte followed by a body whose byte order
//! matches the value order. Integers are sign-flipped big-endian; strings and
//! binary are escaped (`0x00` becomes `0x00 0xFF`) and terminated by
//! `0x00 0x00`, so a shorter prefix sorts first.

use dynaorm_proto::{Item, KeySchema, KeyValue};

use super::StoreError;

const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_STRING: u8 = 0x03;
const TAG_BYTES: u8 = 0x04;

/// Encode the key attributes of `item` under `schema`.
pub fn encode_key(collection: &str, schema: &KeySchema, item: &Item) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    for attribute in schema.attributes() {
        let value = item
            .get(attribute)
            .filter(|v| !v.is_null())
            .ok_or_else(|| StoreError::MissingKeyAttribute {
                collection: collection.to_string(),
                attribute: attribute.to_string(),
            })?;
        let key = value
            .to_key()
            .ok_or_else(|| StoreError::UnsupportedKey(attribute.to_string()))?;
        encode_component(&key, &mut out);
    }
    Ok(out)
}

fn encode_component(key: &KeyValue, out: &mut Vec<u8>) {
    match key {
        KeyValue::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        KeyValue::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&((*i as u64) ^ (1 << 63)).to_be_bytes());
        }
        KeyValue::String(s) => {
            out.push(TAG_STRING);
            escape(s.as_bytes(), out);
        }
        KeyValue::Bytes(b) => {
            out.push(TAG_BYTES);
            escape(b, out);
        }
    }
}

fn escape(bytes: &[u8], out: &mut Vec<u8>) {
    for &byte in bytes {
        out.push(byte);
        if byte == 0x00 {
            out.push(0xFF);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}
