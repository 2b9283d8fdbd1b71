// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use crossbeam_channel::{
    Receiver,
    Sender,
};
use log::{
    debug,
    warn,
};
use uuid::Uuid;

use super::{
    Codec,
    Reusable,
};

/// Recycles the encoders and decoders of another codec.
///
/// Only worth it when creating an instance is expensive, as it is for a
/// [`PrimedCodec`](super::PrimedCodec) that replays its samples every time.
/// Only [`Reusable`] instances can be pooled: a plain binary encoder that has
/// described a type would silently omit that description on its next stream.
#[derive(Debug)]
pub struct PooledCodec<C: Codec> {
    codec: C,
    encoders_in: Sender<C::Encoder>,
    encoders_out: Receiver<C::Encoder>,
    decoders_in: Sender<C::Decoder>,
    decoders_out: Receiver<C::Decoder>,
}

impl<C> PooledCodec<C>
where
    C: Codec,
    C::Encoder: Reusable,
    C::Decoder: Reusable,
{
    pub fn new(codec: C) -> PooledCodec<C> {
        let (encoders_in, encoders_out) = crossbeam_channel::unbounded();
        let (decoders_in, decoders_out) = crossbeam_channel::unbounded();
        PooledCodec {
            codec,
            encoders_in,
            encoders_out,
            decoders_in,
            decoders_out,
        }
    }

    pub fn idle_encoders(&self) -> usize {
        self.encoders_out.len()
    }

    pub fn idle_decoders(&self) -> usize {
        self.decoders_out.len()
    }
}

impl<C> Codec for PooledCodec<C>
where
    C: Codec,
    C::Encoder: Reusable,
    C::Decoder: Reusable,
{
    type Decoder = C::Decoder;
    type Encoder = C::Encoder;

    fn encoder(&self) -> C::Encoder {
        self.encoders_out.try_recv().unwrap_or_else(|_| {
            debug!("encoder pool empty, creating an encoder");
            self.codec.encoder()
        })
    }

    fn decoder(&self) -> C::Decoder {
        self.decoders_out.try_recv().unwrap_or_else(|_| {
            debug!("decoder pool empty, creating a decoder");
            self.codec.decoder()
        })
    }

    fn put_encoder(&self, encoder: C::Encoder) {
        if !encoder.is_reusable() {
            warn!("dropping an encoder that learned types outside its baseline");
            return;
        }
        // The receiving end lives in `self`, so this can't fail.
        let _ = self.encoders_in.send(encoder);
    }

    fn put_decoder(&self, decoder: C::Decoder) {
        if !decoder.is_reusable() {
            warn!("dropping a decoder that learned types outside its baseline");
            return;
        }
        let _ = self.decoders_in.send(decoder);
    }

    fn fingerprint(&self) -> Option<Uuid> {
        self.codec.fingerprint()
    }

    fn carries_type_metadata(&self) -> bool {
        self.codec.carries_type_metadata()
    }
}
