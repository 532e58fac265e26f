//! BER construction and parsing helpers.
//!
//! Thin wrappers over `lber` (the codec crate `ldap3` itself is built on)
//! used for control values and extended-request payloads.

use lber::common::TagClass;
use lber::parse::parse_tag;
use lber::structure::StructureTag;
use lber::structures::{ASNTag, Boolean, Enumerated, Integer, OctetString, Sequence, Set, Tag};
use lber::write as ber_write;

use crate::error::ClientError;

/// A universal SEQUENCE.
#[must_use]
pub fn seq(inner: Vec<Tag>) -> Tag {
    Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    })
}

/// A universal SET.
#[must_use]
pub fn set(inner: Vec<Tag>) -> Tag {
    Tag::Set(Set {
        inner,
        ..Default::default()
    })
}

/// A universal OCTET STRING.
#[must_use]
pub fn octet_string(bytes: impl Into<Vec<u8>>) -> Tag {
    Tag::OctetString(OctetString {
        inner: bytes.into(),
        ..Default::default()
    })
}

/// A universal INTEGER.
#[must_use]
pub fn integer(value: i64) -> Tag {
    Tag::Integer(Integer {
        inner: value,
        ..Default::default()
    })
}

/// A universal ENUMERATED.
#[must_use]
pub fn enumerated(value: i64) -> Tag {
    Tag::Enumerated(Enumerated {
        inner: value,
        ..Default::default()
    })
}

/// A universal BOOLEAN.
#[must_use]
pub fn boolean(value: bool) -> Tag {
    Tag::Boolean(Boolean {
        inner: value,
        ..Default::default()
    })
}

/// A context-specific primitive with the given tag number.
#[must_use]
pub fn ctx_prim(id: u64, bytes: impl Into<Vec<u8>>) -> Tag {
    Tag::OctetString(OctetString {
        id,
        class: TagClass::Context,
        inner: bytes.into(),
    })
}

/// A context-specific constructed tag (implicitly tagged SEQUENCE).
#[must_use]
pub fn ctx_seq(id: u64, inner: Vec<Tag>) -> Tag {
    Tag::Sequence(Sequence {
        id,
        class: TagClass::Context,
        inner,
    })
}

/// A context-specific ENUMERATED with the given tag number.
#[must_use]
pub fn ctx_enum(id: u64, value: i64) -> Tag {
    Tag::Enumerated(Enumerated {
        id,
        class: TagClass::Context,
        inner: value,
    })
}

/// A context-specific INTEGER with the given tag number.
#[must_use]
pub fn ctx_int(id: u64, value: i64) -> Tag {
    Tag::Integer(Integer {
        id,
        class: TagClass::Context,
        inner: value,
    })
}

/// An application-class constructed tag (LDAP protocol ops).
#[must_use]
pub fn app_seq(id: u64, inner: Vec<Tag>) -> Tag {
    Tag::Sequence(Sequence {
        id,
        class: TagClass::Application,
        inner,
    })
}

/// An application-class primitive tag (e.g. DelRequest).
#[must_use]
pub fn app_prim(id: u64, bytes: impl Into<Vec<u8>>) -> Tag {
    Tag::OctetString(OctetString {
        id,
        class: TagClass::Application,
        inner: bytes.into(),
    })
}

/// Serializes a tag to its BER byte representation.
pub fn encode(tag: Tag) -> Result<Vec<u8>, ClientError> {
    let mut out = bytes::BytesMut::new();
    ber_write::encode_into(&mut out, tag.into_structure())
        .map_err(|e| ClientError::encode("BER value", e.to_string()))?;
    Ok(out.to_vec())
}

/// Parses one complete BER tag from the given bytes.
pub fn decode(bytes: &[u8]) -> Result<StructureTag, ClientError> {
    match parse_tag(bytes) {
        Ok((_, tag)) => Ok(tag),
        Err(e) => Err(ClientError::decode("BER value", format!("{e:?}"))),
    }
}

/// Unwraps a universal SEQUENCE into its elements.
pub fn expect_sequence(tag: StructureTag) -> Result<Vec<StructureTag>, ClientError> {
    tag.match_class(TagClass::Universal)
        .and_then(|t| t.match_id(lber::universal::Types::Sequence as u64))
        .and_then(|t| t.expect_constructed())
        .ok_or_else(|| ClientError::decode("BER value", "expected a SEQUENCE"))
}

/// Unwraps a primitive tag into its bytes.
pub fn expect_bytes(tag: StructureTag) -> Result<Vec<u8>, ClientError> {
    tag.expect_primitive()
        .ok_or_else(|| ClientError::decode("BER value", "expected a primitive value"))
}

/// Decodes a BER-encoded unsigned integer payload.
#[must_use]
pub fn decode_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
