// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The self-describing binary format.
//!
//! A stream is a sequence of messages:
//!
//! ```text
//! len: u32 LE | kind: u8 | type id: u32 LE | body: len - 5 bytes
//! ```
//!
//! A `DEFINE` message binds a type id to a registered name and carries that
//! name as its body. A `VALUE` message carries the bincode encoding of a value
//! whose type id has already been defined on the same stream. Encoders assign
//! ids from 1 in the order they first meet each type.

use std::any::type_name;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::io::{
    self,
    BufRead,
    Read,
    Write,
};

use byteorder::{
    LittleEndian,
    ReadBytesExt,
    WriteBytesExt,
};
use serde::{
    de::DeserializeOwned,
    Serialize,
};

use super::{
    registry,
    Codec,
    Decoder,
    Encoder,
};
use crate::error::{
    DecodeError,
    EncodeError,
};

const DEFINE: u8 = 0x01;
const VALUE: u8 = 0x02;
const HEADER_LEN: usize = 5;

#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> BinaryCodec {
        BinaryCodec
    }
}

impl Codec for BinaryCodec {
    type Decoder = BinaryDecoder;
    type Encoder = BinaryEncoder;

    fn encoder(&self) -> BinaryEncoder {
        BinaryEncoder::default()
    }

    fn decoder(&self) -> BinaryDecoder {
        BinaryDecoder::default()
    }

    fn carries_type_metadata(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct BinaryEncoder {
    ids: HashMap<String, u32>,
}

impl Encoder for BinaryEncoder {
    fn encode<T>(&mut self, sink: &mut dyn Write, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized + 'static,
    {
        let name = registry::name_of::<T>().ok_or_else(|| EncodeError::Unregistered(type_name::<T>()))?;
        // Serialize first so a value that can't be encoded leaves no orphan definition behind.
        let body = bincode::serialize(value)?;

        let id = match self.ids.get(&name) {
            Some(id) => *id,
            None => {
                let id = next_id(self.ids.len())?;
                write_message(sink, DEFINE, id, name.as_bytes())?;
                self.ids.insert(name, id);
                id
            },
        };
        write_message(sink, VALUE, id, &body)?;
        Ok(())
    }

    fn known_types(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Default)]
pub struct BinaryDecoder {
    names: HashMap<u32, String>,
}

impl Decoder for BinaryDecoder {
    fn decode<T>(&mut self, source: &mut dyn BufRead) -> Result<T, DecodeError>
    where
        T: DeserializeOwned + 'static,
    {
        let expected = registry::name_of::<T>().ok_or_else(|| DecodeError::Unregistered(type_name::<T>()))?;

        loop {
            let (kind, id, body) = read_message(source)?;
            match kind {
                DEFINE => {
                    if self.names.contains_key(&id) {
                        return Err(DecodeError::DuplicateTypeId(id));
                    }
                    let name =
                        String::from_utf8(body).map_err(|_| DecodeError::InvalidMessage("type name is not UTF-8"))?;
                    self.names.insert(id, name);
                },
                VALUE => {
                    let actual = self.names.get(&id).ok_or(DecodeError::UnknownTypeId(id))?;
                    if *actual != expected {
                        if !registry::is_known_name(actual) {
                            return Err(DecodeError::UnknownType(actual.clone()));
                        }
                        return Err(DecodeError::TypeMismatch {
                            expected,
                            actual: actual.clone(),
                        });
                    }
                    return Ok(bincode::deserialize(&body)?);
                },
                _ => return Err(DecodeError::InvalidMessage("unknown message kind")),
            }
        }
    }

    fn known_types(&self) -> usize {
        self.names.len()
    }
}

fn next_id(known: usize) -> Result<u32, EncodeError> {
    u32::try_from(known + 1).map_err(|_| io::Error::new(io::ErrorKind::Other, "type ids exhausted").into())
}

fn write_message(sink: &mut dyn Write, kind: u8, id: u32, body: &[u8]) -> io::Result<()> {
    let len = u32::try_from(HEADER_LEN + body.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "message too large"))?;
    sink.write_u32::<LittleEndian>(len)?;
    sink.write_u8(kind)?;
    sink.write_u32::<LittleEndian>(id)?;
    sink.write_all(body)
}

fn read_message(source: &mut dyn BufRead) -> Result<(u8, u32, Vec<u8>), DecodeError> {
    let len = source.read_u32::<LittleEndian>()? as usize;
    if len < HEADER_LEN {
        return Err(DecodeError::InvalidMessage("message shorter than its header"));
    }
    let kind = source.read_u8()?;
    let id = source.read_u32::<LittleEndian>()?;

    let remaining = len - HEADER_LEN;
    let mut body = Vec::with_capacity(remaining.min(64 * 1024));
    (&mut *source).take(remaining as u64).read_to_end(&mut body)?;
    if body.len() != remaining {
        return Err(DecodeError::InvalidMessage("truncated message"));
    }
    Ok((kind, id, body))
}

#[cfg(test)]
mod tests {
    use serde_derive::{
        Deserialize,
        Serialize,
    };

    use super::*;
    use crate::codec::register_name;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Label(String);

    #[derive(Serialize)]
    struct Unregistered;

    fn setup() {
        register_name::<Point>("binary.Point").expect("registered");
        register_name::<Label>("binary.Label").expect("registered");
    }

    #[test]
    fn test_stream_defines_each_type_once() {
        setup();
        let codec = BinaryCodec::new();
        let mut stream = codec.new_encoder(Vec::new());
        stream.encode(&Point { x: 1, y: 2 }).expect("encoded");
        let first_len = stream.get_ref().len();
        stream.encode(&Point { x: 3, y: 4 }).expect("encoded");
        let (encoder, bytes) = stream.into_parts();
        assert_eq!(encoder.known_types(), 1);

        // The second message is a bare value: no definition precedes it.
        let value_len = HEADER_LEN + 8;
        assert_eq!(bytes.len() - first_len, 4 + value_len);
        assert_eq!(bytes[first_len + 4], VALUE);

        let mut decoder = codec.new_decoder(&bytes[..]);
        assert_eq!(decoder.decode::<Point>().expect("decoded"), Point { x: 1, y: 2 });
        assert_eq!(decoder.decode::<Point>().expect("decoded"), Point { x: 3, y: 4 });
    }

    #[test]
    fn test_first_message_layout() {
        setup();
        let mut bytes = Vec::new();
        BinaryCodec.encoder().encode(&mut bytes, &Label("hi".to_owned())).expect("encoded");

        let name = b"binary.Label";
        assert_eq!(&bytes[0..4], &((HEADER_LEN + name.len()) as u32).to_le_bytes());
        assert_eq!(bytes[4], DEFINE);
        assert_eq!(&bytes[5..9], &1u32.to_le_bytes());
        assert_eq!(&bytes[9..9 + name.len()], name);
        assert_eq!(bytes[9 + name.len() + 4], VALUE);
    }

    #[test]
    fn test_decoder_needs_definitions() {
        setup();
        let codec = BinaryCodec;
        let mut stream = codec.new_encoder(Vec::new());
        stream.encode(&Point { x: 1, y: 1 }).expect("encoded");
        let boundary = stream.get_ref().len();
        stream.encode(&Point { x: 2, y: 2 }).expect("encoded");
        let (_, bytes) = stream.into_parts();

        match codec.decoder().decode::<Point>(&mut &bytes[boundary..]) {
            Err(DecodeError::UnknownTypeId(1)) => {},
            other => panic!("expected UnknownTypeId, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_definition() {
        setup();
        let codec = BinaryCodec;
        let mut first = Vec::new();
        codec.encoder().encode(&mut first, &Point { x: 0, y: 0 }).expect("encoded");
        let mut bytes = first.clone();
        bytes.extend_from_slice(&first);

        let mut decoder = codec.new_decoder(&bytes[..]);
        decoder.decode::<Point>().expect("decoded");
        match decoder.decode::<Point>() {
            Err(DecodeError::DuplicateTypeId(1)) => {},
            other => panic!("expected DuplicateTypeId, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch() {
        setup();
        let mut bytes = Vec::new();
        BinaryCodec.encoder().encode(&mut bytes, &Point { x: 0, y: 0 }).expect("encoded");
        match BinaryCodec.decoder().decode::<Label>(&mut &bytes[..]) {
            Err(DecodeError::TypeMismatch {
                expected,
                actual,
            }) => {
                assert_eq!(expected, "binary.Label");
                assert_eq!(actual, "binary.Point");
            },
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_wire_name() {
        setup();
        let mut bytes = Vec::new();
        write_message(&mut bytes, DEFINE, 1, b"binary.NeverRegistered").expect("written");
        write_message(&mut bytes, VALUE, 1, &[0; 8]).expect("written");
        match BinaryCodec.decoder().decode::<Point>(&mut &bytes[..]) {
            Err(DecodeError::UnknownType(name)) => assert_eq!(name, "binary.NeverRegistered"),
            other => panic!("expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_types() {
        let mut bytes = Vec::new();
        match BinaryCodec.encoder().encode(&mut bytes, &Unregistered) {
            Err(EncodeError::Unregistered(_)) => {},
            other => panic!("expected Unregistered, got {:?}", other),
        }
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_truncated_stream() {
        setup();
        let mut bytes = Vec::new();
        BinaryCodec.encoder().encode(&mut bytes, &Point { x: 5, y: 6 }).expect("encoded");
        bytes.truncate(bytes.len() - 3);
        match BinaryCodec.decoder().decode::<Point>(&mut &bytes[..]) {
            Err(DecodeError::InvalidMessage(_)) => {},
            other => panic!("expected InvalidMessage, got {:?}", other),
        }
    }
}

