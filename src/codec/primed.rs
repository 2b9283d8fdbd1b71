// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Codecs whose instances start out already knowing a fixed set of types.
//!
//! A format like [`BinaryCodec`](super::BinaryCodec) describes every type the
//! first time an encoder meets it. When a store writes one small record per
//! transaction, that description costs more than the record. Priming encodes a
//! list of sample values once, keeps the bytes, and has every new encoder and
//! decoder replay them before it is handed out, so the descriptions never reach
//! the stored records.

use std::any::type_name;
use std::fmt::{
    self,
    Debug,
    Formatter,
};
use std::io::{
    self,
    BufRead,
    Write,
};

use log::{
    debug,
    warn,
};
use serde::{
    de::DeserializeOwned,
    Serialize,
};
use uuid::Uuid;

use super::{
    registry,
    Codec,
    Decoder,
    Encoder,
    Reusable,
};
use crate::error::{
    DecodeError,
    EncodeError,
    PrimeError,
};

/// Namespace for the v5 UUIDs that identify primed snapshots.
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x8b1f_5c2e_47a3_4d0b_9c6e_1a2f_3d4e_5f60);

type EncodeSample<C> =
    Box<dyn Fn(&mut <C as Codec>::Encoder, &mut dyn Write) -> Result<(), EncodeError> + Send + Sync>;
type DecodeSample<C> =
    Box<dyn Fn(&mut <C as Codec>::Decoder, &mut dyn BufRead) -> Result<(), DecodeError> + Send + Sync>;

struct Sample<C: Codec> {
    type_name: &'static str,
    wire_name: fn() -> Option<String>,
    encode: EncodeSample<C>,
    decode: DecodeSample<C>,
}

pub struct PrimedCodecBuilder<C: Codec> {
    codec: C,
    samples: Vec<Sample<C>>,
}

impl<C: Codec> PrimedCodecBuilder<C> {
    /// Add a sample of a type the codec should know up front. Samples are
    /// replayed in the order they were added.
    pub fn sample<T>(mut self, value: T) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.samples.push(Sample {
            type_name: type_name::<T>(),
            wire_name: registry::name_of::<T>,
            encode: Box::new(move |encoder: &mut C::Encoder, sink: &mut dyn Write| encoder.encode(sink, &value)),
            decode: Box::new(|decoder: &mut C::Decoder, source: &mut dyn BufRead| {
                decoder.decode::<T>(source).map(|_| ())
            }),
        });
        self
    }

    /// Encode every sample, check that the result decodes back, and freeze the bytes.
    pub fn build(self) -> Result<PrimedCodec<C>, PrimeError> {
        let mut snapshot = Vec::new();
        let mut encoder = self.codec.encoder();
        for (index, sample) in self.samples.iter().enumerate() {
            (sample.encode)(&mut encoder, &mut snapshot).map_err(|source| PrimeError::Encode {
                index,
                source,
            })?;
        }

        let mut decoder = self.codec.decoder();
        let mut source = &snapshot[..];
        for (index, sample) in self.samples.iter().enumerate() {
            (sample.decode)(&mut decoder, &mut source).map_err(|source| PrimeError::Decode {
                index,
                source,
            })?;
        }

        let fingerprint = if self.codec.carries_type_metadata() {
            fingerprint_of(&self.samples)
        } else {
            None
        };
        debug!("primed codec with {} sample(s), {} byte snapshot", self.samples.len(), snapshot.len());

        Ok(PrimedCodec {
            codec: self.codec,
            samples: self.samples,
            snapshot,
            fingerprint,
        })
    }
}

/// Identifies the type definitions a primed instance starts from: the wire
/// names of the samples in the order an encoder first meets them. Sample
/// values don't take part, since they leave no state behind.
fn fingerprint_of<C: Codec>(samples: &[Sample<C>]) -> Option<Uuid> {
    let mut names: Vec<String> = Vec::new();
    for sample in samples {
        let name = (sample.wire_name)().unwrap_or_else(|| sample.type_name.to_owned());
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return None;
    }
    Some(Uuid::new_v5(&FINGERPRINT_NAMESPACE, names.join("\0").as_bytes()))
}

/// Hands out encoders and decoders that have already seen every sample type.
///
/// Data written by a primed encoder can only be read by a decoder primed with
/// the same samples in the same order. [`Codec::fingerprint`] identifies that
/// combination so stores can refuse to mix them.
pub struct PrimedCodec<C: Codec> {
    codec: C,
    samples: Vec<Sample<C>>,
    snapshot: Vec<u8>,
    fingerprint: Option<Uuid>,
}

impl<C: Codec> PrimedCodec<C> {
    pub fn builder(codec: C) -> PrimedCodecBuilder<C> {
        PrimedCodecBuilder {
            codec,
            samples: Vec::new(),
        }
    }

    /// The bytes every decoder replays before it is handed out.
    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }
}

impl<C: Codec> Codec for PrimedCodec<C> {
    type Decoder = PrimedDecoder<C::Decoder>;
    type Encoder = PrimedEncoder<C::Encoder>;

    fn encoder(&self) -> Self::Encoder {
        let mut inner = self.codec.encoder();
        let mut discard = io::sink();
        for (index, sample) in self.samples.iter().enumerate() {
            if let Err(e) = (sample.encode)(&mut inner, &mut discard) {
                warn!("replaying sample {} ({}) into an encoder failed: {}", index, sample.type_name, e);
            }
        }
        PrimedEncoder::new(inner)
    }

    fn decoder(&self) -> Self::Decoder {
        let mut inner = self.codec.decoder();
        let mut source = &self.snapshot[..];
        for (index, sample) in self.samples.iter().enumerate() {
            if let Err(e) = (sample.decode)(&mut inner, &mut source) {
                warn!("replaying sample {} ({}) into a decoder failed: {}", index, sample.type_name, e);
            }
        }
        PrimedDecoder::new(inner)
    }

    fn fingerprint(&self) -> Option<Uuid> {
        self.fingerprint
    }

    fn carries_type_metadata(&self) -> bool {
        self.codec.carries_type_metadata()
    }
}

impl<C: Codec> Debug for PrimedCodec<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self.samples.iter().map(|s| s.type_name).collect();
        f.debug_struct("PrimedCodec")
            .field("samples", &types)
            .field("snapshot_len", &self.snapshot.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// An encoder that started from the primed baseline.
///
/// It stays reusable for as long as it has only encoded primed types.
#[derive(Debug)]
pub struct PrimedEncoder<E> {
    inner: E,
    baseline: usize,
}

impl<E: Encoder> PrimedEncoder<E> {
    fn new(inner: E) -> PrimedEncoder<E> {
        PrimedEncoder {
            baseline: inner.known_types(),
            inner,
        }
    }
}

impl<E: Encoder> Encoder for PrimedEncoder<E> {
    fn encode<T>(&mut self, sink: &mut dyn Write, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized + 'static,
    {
        self.inner.encode(sink, value)
    }

    fn known_types(&self) -> usize {
        self.inner.known_types()
    }
}

impl<E: Encoder> Reusable for PrimedEncoder<E> {
    fn is_reusable(&self) -> bool {
        self.inner.known_types() == self.baseline
    }
}

#[derive(Debug)]
pub struct PrimedDecoder<D> {
    inner: D,
    baseline: usize,
}

impl<D: Decoder> PrimedDecoder<D> {
    fn new(inner: D) -> PrimedDecoder<D> {
        PrimedDecoder {
            baseline: inner.known_types(),
            inner,
        }
    }
}

impl<D: Decoder> Decoder for PrimedDecoder<D> {
    fn decode<T>(&mut self, source: &mut dyn BufRead) -> Result<T, DecodeError>
    where
        T: DeserializeOwned + 'static,
    {
        self.inner.decode(source)
    }

    fn known_types(&self) -> usize {
        self.inner.known_types()
    }
}

impl<D: Decoder> Reusable for PrimedDecoder<D> {
    fn is_reusable(&self) -> bool {
        self.inner.known_types() == self.baseline
    }
}

#[cfg(test)]
mod tests {
    use serde_derive::{
        Deserialize,
        Serialize,
    };

    use super::*;
    use crate::codec::{
        register_name,
        BinaryCodec,
        JsonCodec,
    };

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Other {
        id: u64,
    }

    fn setup() {
        register_name::<Person>("primed.Person").expect("registered");
        register_name::<Other>("primed.Other").expect("registered");
    }

    fn primed() -> PrimedCodec<BinaryCodec> {
        PrimedCodec::builder(BinaryCodec)
            .sample(Person {
                name: String::new(),
                age: 0,
            })
            .build()
            .expect("primed")
    }

    #[test]
    fn test_primed_output_omits_definitions() {
        setup();
        let codec = primed();
        let value = Person {
            name: "Ann".to_owned(),
            age: 30,
        };

        let mut primed_bytes = Vec::new();
        codec.encoder().encode(&mut primed_bytes, &value).expect("encoded");
        let mut plain_bytes = Vec::new();
        BinaryCodec.encoder().encode(&mut plain_bytes, &value).expect("encoded");
        assert!(primed_bytes.len() < plain_bytes.len());
        assert!(plain_bytes.ends_with(&primed_bytes));

        let decoded: Person = codec.decoder().decode(&mut &primed_bytes[..]).expect("decoded");
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_plain_decoder_rejects_primed_data() {
        setup();
        let mut bytes = Vec::new();
        primed()
            .encoder()
            .encode(
                &mut bytes,
                &Person {
                    name: "Ann".to_owned(),
                    age: 30,
                },
            )
            .expect("encoded");
        match BinaryCodec.decoder().decode::<Person>(&mut &bytes[..]) {
            Err(DecodeError::UnknownTypeId(1)) => {},
            other => panic!("expected UnknownTypeId, got {:?}", other),
        }
    }

    #[test]
    fn test_primed_decoder_rejects_plain_data() {
        setup();
        let mut bytes = Vec::new();
        BinaryCodec
            .encoder()
            .encode(
                &mut bytes,
                &Person {
                    name: "Ann".to_owned(),
                    age: 30,
                },
            )
            .expect("encoded");
        match primed().decoder().decode::<Person>(&mut &bytes[..]) {
            Err(DecodeError::DuplicateTypeId(1)) => {},
            other => panic!("expected DuplicateTypeId, got {:?}", other),
        }
    }

    #[test]
    fn test_unprimed_type_taints_instance() {
        setup();
        let codec = primed();
        let mut encoder = codec.encoder();
        assert!(encoder.is_reusable());
        encoder
            .encode(
                &mut io::sink(),
                &Person {
                    name: "Ann".to_owned(),
                    age: 30,
                },
            )
            .expect("encoded");
        assert!(encoder.is_reusable());
        encoder
            .encode(&mut io::sink(), &Other {
                id: 7,
            })
            .expect("encoded");
        assert!(!encoder.is_reusable());
    }

    #[test]
    fn test_fingerprint() {
        setup();
        let a = primed();
        let b = primed();
        assert!(a.fingerprint().is_some());
        assert_eq!(a.fingerprint(), b.fingerprint());

        let reordered = PrimedCodec::builder(BinaryCodec)
            .sample(Other {
                id: 0,
            })
            .sample(Person {
                name: String::new(),
                age: 0,
            })
            .build()
            .expect("primed");
        assert_ne!(a.fingerprint(), reordered.fingerprint());

        // Sample values leave no state behind, so they don't change the fingerprint.
        let other_values = PrimedCodec::builder(BinaryCodec)
            .sample(Person {
                name: "sample".to_owned(),
                age: 1,
            })
            .build()
            .expect("primed");
        assert_eq!(a.fingerprint(), other_values.fingerprint());

        let repeated = PrimedCodec::builder(BinaryCodec)
            .sample(Person {
                name: String::new(),
                age: 0,
            })
            .sample(Person {
                name: "again".to_owned(),
                age: 2,
            })
            .build()
            .expect("primed");
        assert_eq!(a.fingerprint(), repeated.fingerprint());

        let text = PrimedCodec::builder(JsonCodec).sample(1u32).build().expect("primed");
        assert_eq!(text.fingerprint(), None);
        assert_eq!(PrimedCodec::builder(BinaryCodec).build().expect("primed").fingerprint(), None);
    }

    #[test]
    fn test_build_fails_on_unregistered_sample() {
        #[derive(Serialize, Deserialize)]
        struct Stranger;

        match PrimedCodec::builder(BinaryCodec).sample(1u8).sample(Stranger).build() {
            Err(PrimeError::Encode {
                index: 1,
                source: EncodeError::Unregistered(_),
            }) => {},
            other => panic!("expected an encode failure, got {:?}", other.map(|_| ())),
        }
    }
}
