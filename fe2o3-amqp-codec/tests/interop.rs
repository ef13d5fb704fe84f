//! Decoding of forms this crate never produces itself but peers may send

use fe2o3_amqp_codec::{
    composite::{descriptor_of, type_name},
    descriptor::Descriptor,
    from_slice,
    primitives::{Binary, OrderedMap, Symbol},
    to_vec, Value,
};

#[test]
fn list32_decodes_like_list8() {
    // list32 size=6 count=1 smalluint 7
    let wide = [0xd0, 0, 0, 0, 6, 0, 0, 0, 1, 0x52, 0x07];
    let value: Value = from_slice(&wide).unwrap();
    assert_eq!(value, Value::List(vec![Value::Uint(7)]));
    assert_eq!(to_vec(&value).unwrap(), [0xc0, 0x03, 0x01, 0x52, 0x07]);
}

#[test]
fn map32_decodes_like_map8() {
    // map32 size=8 count=2 sym8 "k" true
    let wide = [0xd1, 0, 0, 0, 8, 0, 0, 0, 2, 0xa3, 0x01, b'k', 0x41];
    let mut expected = OrderedMap::new();
    expected.insert(Value::Symbol(Symbol::from("k")), Value::Bool(true));
    assert_eq!(from_slice::<Value>(&wide).unwrap(), Value::Map(expected));
}

#[test]
fn wide_uint_and_boolean_forms() {
    assert_eq!(from_slice::<Value>(&[0x70, 0, 0, 0, 1]).unwrap(), Value::Uint(1));
    assert_eq!(from_slice::<Value>(&[0x56, 0x01]).unwrap(), Value::Bool(true));
    assert_eq!(from_slice::<Value>(&[0x56, 0x00]).unwrap(), Value::Bool(false));
}

#[test]
fn vbin32_decodes() {
    let buf = [0xb0, 0, 0, 0, 2, 0xca, 0xfe];
    let value: Value = from_slice(&buf).unwrap();
    assert_eq!(value, Value::Binary(Binary::from(vec![0xca, 0xfe])));
    assert_eq!(type_name(&value), "binary");
}

#[test]
fn symbolic_descriptor_is_kept() {
    // described, sym8 "a:b", list0
    let buf = [0x00, 0xa3, 0x03, b'a', b':', b'b', 0x45];
    let value: Value = from_slice(&buf).unwrap();
    assert_eq!(
        descriptor_of(&value),
        Some(&Descriptor::Name(Symbol::from("a:b")))
    );
    assert_eq!(to_vec(&value).unwrap(), buf);
}

#[test]
fn length_beyond_input_is_rejected() {
    assert!(from_slice::<Value>(&[0xa1, 0x05, b'a']).is_err());
}

#[test]
fn unknown_format_code_is_rejected() {
    assert!(from_slice::<Value>(&[0x01]).is_err());
}
