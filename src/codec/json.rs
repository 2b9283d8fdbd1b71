// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::io::{
    BufRead,
    Write,
};

use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};

use super::{
    Codec,
    Decoder,
    Encoder,
    Reusable,
};
use crate::error::{
    DecodeError,
    EncodeError,
};

/// Compact JSON, one document per line.
///
/// JSON carries no type metadata, so encoders and decoders are stateless and
/// any instance can serve any stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> JsonCodec {
        JsonCodec
    }
}

impl Codec for JsonCodec {
    type Decoder = JsonDecoder;
    type Encoder = JsonEncoder;

    fn encoder(&self) -> JsonEncoder {
        JsonEncoder
    }

    fn decoder(&self) -> JsonDecoder {
        JsonDecoder
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode<T>(&mut self, sink: &mut dyn Write, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized + 'static,
    {
        serde_json::to_writer(&mut *sink, value)?;
        sink.write_all(b"\n")?;
        Ok(())
    }
}

impl Reusable for JsonEncoder {}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode<T>(&mut self, source: &mut dyn BufRead) -> Result<T, DecodeError>
    where
        T: DeserializeOwned + 'static,
    {
        // Leading whitespace, including the previous document's newline, is skipped.
        let mut de = serde_json::Deserializer::from_reader(source);
        Ok(Deserialize::deserialize(&mut de)?)
    }
}

impl Reusable for JsonDecoder {}
