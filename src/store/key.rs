// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::borrow::Cow;

use serde::{
    de::DeserializeOwned,
    Serialize,
};

use super::{
    marshal,
    unmarshal,
};
use crate::codec::Codec;
use crate::error::{
    DecodeError,
    EncodeError,
};

/// Something a record can be stored under.
///
/// Byte slices and strings are used as they are. Anything else goes through
/// the store's codec by wrapping it in [`Encoded`].
pub trait AsKey {
    fn to_key<C: Codec>(&self, codec: &C) -> Result<Cow<'_, [u8]>, EncodeError>;
}

/// Something a `for_each` callback can take as its key parameter.
pub trait FromKey: Sized {
    fn from_key<C: Codec>(bytes: &[u8], codec: &C) -> Result<Self, DecodeError>;
}

/// A key that is marshalled with the store's codec, like a value.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Encoded<K>(pub K);

impl<K> Encoded<K> {
    pub fn into_inner(self) -> K {
        self.0
    }
}

impl AsKey for [u8] {
    fn to_key<C: Codec>(&self, _codec: &C) -> Result<Cow<'_, [u8]>, EncodeError> {
        Ok(Cow::Borrowed(self))
    }
}

impl AsKey for Vec<u8> {
    fn to_key<C: Codec>(&self, _codec: &C) -> Result<Cow<'_, [u8]>, EncodeError> {
        Ok(Cow::Borrowed(self))
    }
}

impl<const N: usize> AsKey for [u8; N] {
    fn to_key<C: Codec>(&self, _codec: &C) -> Result<Cow<'_, [u8]>, EncodeError> {
        Ok(Cow::Borrowed(&self[..]))
    }
}

impl AsKey for str {
    fn to_key<C: Codec>(&self, _codec: &C) -> Result<Cow<'_, [u8]>, EncodeError> {
        Ok(Cow::Borrowed(self.as_bytes()))
    }
}

impl AsKey for String {
    fn to_key<C: Codec>(&self, _codec: &C) -> Result<Cow<'_, [u8]>, EncodeError> {
        Ok(Cow::Borrowed(self.as_bytes()))
    }
}

impl<T: AsKey + ?Sized> AsKey for &T {
    fn to_key<C: Codec>(&self, codec: &C) -> Result<Cow<'_, [u8]>, EncodeError> {
        (**self).to_key(codec)
    }
}

impl<K: Serialize + 'static> AsKey for Encoded<K> {
    fn to_key<C: Codec>(&self, codec: &C) -> Result<Cow<'_, [u8]>, EncodeError> {
        marshal(codec, &self.0).map(Cow::Owned)
    }
}

impl FromKey for Vec<u8> {
    fn from_key<C: Codec>(bytes: &[u8], _codec: &C) -> Result<Self, DecodeError> {
        Ok(bytes.to_vec())
    }
}

impl FromKey for Box<[u8]> {
    fn from_key<C: Codec>(bytes: &[u8], _codec: &C) -> Result<Self, DecodeError> {
        Ok(bytes.into())
    }
}

impl FromKey for String {
    fn from_key<C: Codec>(bytes: &[u8], _codec: &C) -> Result<Self, DecodeError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::KeyNotUtf8)
    }
}

impl<K: DeserializeOwned + 'static> FromKey for Encoded<K> {
    fn from_key<C: Codec>(bytes: &[u8], codec: &C) -> Result<Self, DecodeError> {
        unmarshal(codec, bytes).map(Encoded)
    }
}
