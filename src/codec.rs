// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Wire formats and the two wrappers that make stateful formats cheaper to use.
//!
//! A [`Codec`] is a factory of [`Encoder`]s and [`Decoder`]s. Encoders and
//! decoders may keep state between calls: the [`BinaryCodec`] remembers which
//! types it has already described on a stream and only writes their metadata
//! once. That state is what [`PrimedCodec`] front-loads and what [`PooledCodec`]
//! keeps alive between unrelated calls.
//!
//! ```text
//! PooledCodec<PrimedCodec<BinaryCodec>>   recycles primed instances
//! PrimedCodec<BinaryCodec>                every instance starts from the snapshot
//! BinaryCodec | JsonCodec | XmlCodec      the formats themselves
//! ```

mod binary;
mod json;
mod pooled;
mod primed;
pub(crate) mod registry;
mod xml;

use std::io::{
    BufRead,
    Write,
};

use serde::{
    de::DeserializeOwned,
    Serialize,
};
use uuid::Uuid;

use crate::error::{
    DecodeError,
    EncodeError,
};

pub use binary::{
    BinaryCodec,
    BinaryDecoder,
    BinaryEncoder,
};
pub use json::{
    JsonCodec,
    JsonDecoder,
    JsonEncoder,
};
pub use pooled::PooledCodec;
pub use primed::{
    PrimedCodec,
    PrimedCodecBuilder,
    PrimedDecoder,
    PrimedEncoder,
};
pub use registry::{
    register,
    register_name,
};
pub use xml::{
    XmlCodec,
    XmlDecoder,
    XmlEncoder,
};

pub trait Encoder {
    /// Write one value to `sink`, preceded by whatever metadata this instance
    /// hasn't written before.
    fn encode<T>(&mut self, sink: &mut dyn Write, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized + 'static;

    /// How many type descriptors this instance has accumulated.
    fn known_types(&self) -> usize {
        0
    }
}

pub trait Decoder {
    /// Read one value of type `T` from `source`, absorbing any metadata in front of it.
    fn decode<T>(&mut self, source: &mut dyn BufRead) -> Result<T, DecodeError>
    where
        T: DeserializeOwned + 'static;

    fn known_types(&self) -> usize {
        0
    }
}

/// Encoders and decoders whose state may be carried over to an unrelated
/// stream without changing what gets written or read.
///
/// Only instances of these types can go back into a [`PooledCodec`].
pub trait Reusable {
    fn is_reusable(&self) -> bool {
        true
    }
}

pub trait Codec {
    type Encoder: Encoder;
    type Decoder: Decoder;

    fn encoder(&self) -> Self::Encoder;

    fn decoder(&self) -> Self::Decoder;

    /// Hand an encoder back once the caller is done with it.
    fn put_encoder(&self, _encoder: Self::Encoder) {}

    /// Hand a decoder back once the caller is done with it.
    fn put_decoder(&self, _decoder: Self::Decoder) {}

    /// Identifies the metadata baseline every instance starts from, if the
    /// format writes different bytes depending on it.
    fn fingerprint(&self) -> Option<Uuid> {
        None
    }

    /// True for formats that embed type metadata in the stream.
    fn carries_type_metadata(&self) -> bool {
        false
    }

    fn new_encoder<W: Write>(&self, sink: W) -> StreamEncoder<Self::Encoder, W> {
        StreamEncoder::new(self.encoder(), sink)
    }

    fn new_decoder<R: BufRead>(&self, source: R) -> StreamDecoder<Self::Decoder, R> {
        StreamDecoder::new(self.decoder(), source)
    }
}

/// An encoder bound to its sink.
#[derive(Debug)]
pub struct StreamEncoder<E, W> {
    encoder: E,
    sink: W,
}

impl<E, W> StreamEncoder<E, W>
where
    E: Encoder,
    W: Write,
{
    pub fn new(encoder: E, sink: W) -> StreamEncoder<E, W> {
        StreamEncoder {
            encoder,
            sink,
        }
    }

    pub fn encode<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized + 'static,
    {
        self.encoder.encode(&mut self.sink, value)
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Split into the encoder, with its accumulated state, and the sink.
    pub fn into_parts(self) -> (E, W) {
        (self.encoder, self.sink)
    }
}

/// A decoder bound to its source.
#[derive(Debug)]
pub struct StreamDecoder<D, R> {
    decoder: D,
    source: R,
}

impl<D, R> StreamDecoder<D, R>
where
    D: Decoder,
    R: BufRead,
{
    pub fn new(decoder: D, source: R) -> StreamDecoder<D, R> {
        StreamDecoder {
            decoder,
            source,
        }
    }

    pub fn decode<T>(&mut self) -> Result<T, DecodeError>
    where
        T: DeserializeOwned + 'static,
    {
        self.decoder.decode(&mut self.source)
    }

    pub fn into_parts(self) -> (D, R) {
        (self.decoder, self.source)
    }
}
