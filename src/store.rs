// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

mod dispatch;
mod key;

use std::fmt::{
    self,
    Debug,
    Formatter,
};
use std::sync::Arc;

use log::debug;
use serde::{
    de::DeserializeOwned,
    Serialize,
};
use uuid::Uuid;

use crate::backend::{
    Bucket,
    BucketPath,
    Environment,
    RwTransaction,
};
use crate::codec::{
    BinaryCodec,
    Codec,
    Decoder,
    Encoder,
    JsonCodec,
    XmlCodec,
};
use crate::error::{
    DecodeError,
    EncodeError,
    StoreError,
};

use dispatch::Dispatcher;
pub use dispatch::{
    Shape,
    Visitor,
};
pub use key::{
    AsKey,
    Encoded,
    FromKey,
};

type EmptyResult = Result<(), StoreError>;

/// Child bucket holding the fingerprint of the codec that wrote a bucket.
const FINGERPRINT_BUCKET: &[u8] = b"\0stow.codec";
const FINGERPRINT_KEY: &[u8] = b"codec";

pub(crate) fn marshal<C, T>(codec: &C, value: &T) -> Result<Vec<u8>, EncodeError>
where
    C: Codec,
    T: Serialize + ?Sized + 'static,
{
    let mut encoder = codec.encoder();
    let mut data = Vec::new();
    let result = encoder.encode(&mut data, value);
    codec.put_encoder(encoder);
    result.map(|_| data)
}

pub(crate) fn unmarshal<C, T>(codec: &C, data: &[u8]) -> Result<T, DecodeError>
where
    C: Codec,
    T: DeserializeOwned + 'static,
{
    let mut decoder = codec.decoder();
    let result = decoder.decode(&mut &data[..]);
    codec.put_decoder(decoder);
    result
}

/// Typed records in one bucket of an environment.
///
/// Every operation runs in its own transaction. Values are marshalled before a
/// write transaction opens and unmarshalled after a read finishes, so the
/// codec never runs while the environment's writer lock is held.
pub struct Store<C = BinaryCodec> {
    env: Arc<Environment>,
    bucket: BucketPath,
    codec: Arc<C>,
}

impl Store<BinaryCodec> {
    /// A store using the self-describing binary format. Every type stored
    /// must be registered with [`register_name`](crate::register_name).
    pub fn new<N: AsRef<[u8]>>(env: Arc<Environment>, bucket: N) -> Store<BinaryCodec> {
        Store::with_codec(env, bucket, BinaryCodec)
    }
}

impl Store<JsonCodec> {
    pub fn json<N: AsRef<[u8]>>(env: Arc<Environment>, bucket: N) -> Store<JsonCodec> {
        Store::with_codec(env, bucket, JsonCodec)
    }
}

impl Store<XmlCodec> {
    pub fn xml<N: AsRef<[u8]>>(env: Arc<Environment>, bucket: N) -> Store<XmlCodec> {
        Store::with_codec(env, bucket, XmlCodec)
    }
}

impl<C: Codec> Store<C> {
    pub fn with_codec<N: AsRef<[u8]>>(env: Arc<Environment>, bucket: N, codec: C) -> Store<C> {
        Store::with_shared_codec(env, bucket, Arc::new(codec))
    }

    /// Like `with_codec`, for a codec other stores use too. Pooled codecs are
    /// most useful shared.
    pub fn with_shared_codec<N: AsRef<[u8]>>(env: Arc<Environment>, bucket: N, codec: Arc<C>) -> Store<C> {
        Store {
            env,
            bucket: BucketPath::new(bucket),
            codec,
        }
    }

    /// A store on a bucket nested inside this one, sharing the environment and codec.
    ///
    /// Every store keeps its codec fingerprint in a child bucket, so that
    /// child's name can't be used here.
    pub fn nested<N: AsRef<[u8]>>(&self, name: N) -> Result<Store<C>, StoreError> {
        let name = name.as_ref();
        if name == FINGERPRINT_BUCKET {
            return Err(StoreError::ReservedName(String::from_utf8_lossy(name).into_owned()));
        }
        Ok(Store {
            env: self.env.clone(),
            bucket: self.bucket.child(name),
            codec: self.codec.clone(),
        })
    }

    pub fn bucket_path(&self) -> &BucketPath {
        &self.bucket
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn put<K, V>(&self, key: &K, value: &V) -> EmptyResult
    where
        K: AsKey + ?Sized,
        V: Serialize + ?Sized + 'static,
    {
        let key = key.to_key(&*self.codec)?;
        let data = marshal(&*self.codec, value)?;

        let mut writer = self.env.write()?;
        self.stamp_or_verify(&mut writer)?;
        writer.create_bucket_if_not_exists(&self.bucket).put(&key, &data);
        writer.commit()?;
        Ok(())
    }

    /// Retrieve the value stored under `key`.
    pub fn get<V, K>(&self, key: &K) -> Result<V, StoreError>
    where
        V: DeserializeOwned + 'static,
        K: AsKey + ?Sized,
    {
        let key = key.to_key(&*self.codec)?;
        let data = {
            let reader = self.env.read()?;
            let bucket = reader.bucket(&self.bucket).ok_or(StoreError::NotFound)?;
            self.verify(bucket, reader.bucket(&self.fingerprint_path()))?;
            bucket.get(&key).ok_or(StoreError::NotFound)?.to_vec()
        };
        Ok(unmarshal(&*self.codec, &data)?)
    }

    /// Retrieve the value stored under `key` and remove it, atomically.
    pub fn pull<V, K>(&self, key: &K) -> Result<V, StoreError>
    where
        V: DeserializeOwned + 'static,
        K: AsKey + ?Sized,
    {
        let key = key.to_key(&*self.codec)?;

        let mut writer = self.env.write()?;
        {
            let bucket = writer.bucket(&self.bucket).ok_or(StoreError::NotFound)?;
            self.verify(bucket, writer.bucket(&self.fingerprint_path()))?;
        }
        let data = writer
            .bucket_mut(&self.bucket)
            .and_then(|bucket| bucket.delete(&key))
            .ok_or(StoreError::NotFound)?;
        writer.commit()?;

        Ok(unmarshal(&*self.codec, &data)?)
    }

    /// Remove the value stored under `key`. Removing an absent key is not an error.
    pub fn delete<K>(&self, key: &K) -> EmptyResult
    where
        K: AsKey + ?Sized,
    {
        let key = key.to_key(&*self.codec)?;

        let mut writer = self.env.write()?;
        let removed = writer.bucket_mut(&self.bucket).and_then(|bucket| bucket.delete(&key));
        if removed.is_some() {
            writer.commit()?;
        }
        Ok(())
    }

    /// Call `callback` with every record, in key order.
    ///
    /// The callback takes either the value, or the key and the value:
    ///
    /// ```no_run
    /// # fn demo(store: &stow::Store<stow::JsonCodec>) -> Result<(), stow::StoreError> {
    /// store.for_each(|value: u64| println!("{}", value))?;
    /// store.for_each(|key: String, value: Box<u64>| println!("{} = {}", key, value))?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// The scan runs on a snapshot, so the callback may use the store, but
    /// won't see its own writes. The first record that fails to decode ends
    /// the scan.
    pub fn for_each<F, Args>(&self, callback: F) -> EmptyResult
    where
        F: Visitor<Args>,
    {
        let mut dispatcher = Dispatcher::new(&*self.codec, callback)?;

        let reader = self.env.read()?;
        let bucket = match reader.bucket(&self.bucket) {
            Some(bucket) => bucket,
            None => return Ok(()),
        };
        self.verify(bucket, reader.bucket(&self.fingerprint_path()))?;

        debug!("visiting {} record(s) in {:?} with {:?}", bucket.len(), self.bucket, dispatcher.shape());
        for (key, value) in bucket.iter() {
            dispatcher.dispatch(key, value)?;
        }
        Ok(())
    }

    /// Remove every record, along with every nested store.
    pub fn delete_all(&self) -> EmptyResult {
        let mut writer = self.env.write()?;
        writer.delete_bucket(&self.bucket);
        writer.commit()?;
        Ok(())
    }

    fn fingerprint_path(&self) -> BucketPath {
        self.bucket.child(FINGERPRINT_BUCKET)
    }

    /// Refuse to touch records written by a codec with a different fingerprint.
    fn verify(&self, bucket: &Bucket, fingerprints: Option<&Bucket>) -> EmptyResult {
        if bucket.is_empty() {
            return Ok(());
        }
        let stored = fingerprints.and_then(|b| b.get(FINGERPRINT_KEY)).and_then(|bytes| Uuid::from_slice(bytes).ok());
        let current = self.codec.fingerprint();
        if stored == current {
            Ok(())
        } else {
            Err(StoreError::CodecMismatch {
                stored,
                current,
            })
        }
    }

    /// An empty bucket takes on the current codec's fingerprint. A bucket with
    /// records must already carry it.
    fn stamp_or_verify(&self, writer: &mut RwTransaction<'_>) -> EmptyResult {
        let path = self.fingerprint_path();
        if let Some(bucket) = writer.bucket(&self.bucket) {
            if !bucket.is_empty() {
                return self.verify(bucket, writer.bucket(&path));
            }
        }

        match self.codec.fingerprint() {
            Some(fingerprint) => {
                writer.create_bucket_if_not_exists(&path).put(FINGERPRINT_KEY, fingerprint.as_bytes());
            },
            None => {
                if let Some(bucket) = writer.bucket_mut(&path) {
                    bucket.delete(FINGERPRINT_KEY);
                }
            },
        }
        Ok(())
    }
}

impl<C> Clone for Store<C> {
    fn clone(&self) -> Store<C> {
        Store {
            env: self.env.clone(),
            bucket: self.bucket.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<C> Debug for Store<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("env", &self.env.path()).field("bucket", &self.bucket).finish()
    }
}
