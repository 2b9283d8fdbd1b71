// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Driving `for_each` callbacks.
//!
//! A callback takes either the value of each record, or its key and its value.
//! [`Visitor`] is implemented for closures of both shapes, with `Args` naming
//! the parameter list, so the shape is fixed at compile time. It is also
//! implemented for closures without parameters, which are rejected before the
//! scan starts.

use std::any::type_name;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::{
    unmarshal,
    FromKey,
};
use crate::codec::Codec;
use crate::error::StoreError;

const NO_PARAMETERS: &str = "callback takes no parameters; expected (value) or (key, value)";

/// The parameter list of a callback, with type names for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Value {
        value: &'static str,
    },
    KeyValue {
        key: &'static str,
        value: &'static str,
    },
}

pub trait Visitor<Args> {
    fn shape(&self) -> Result<Shape, StoreError>;

    /// Decode one record and hand it to the callback.
    fn visit<C: Codec>(&mut self, codec: &C, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
}

impl<F> Visitor<()> for F
where
    F: FnMut(),
{
    fn shape(&self) -> Result<Shape, StoreError> {
        Err(StoreError::InvalidCallback(NO_PARAMETERS))
    }

    fn visit<C: Codec>(&mut self, _codec: &C, _key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::InvalidCallback(NO_PARAMETERS))
    }
}

impl<F, V> Visitor<(V,)> for F
where
    F: FnMut(V),
    V: DeserializeOwned + 'static,
{
    fn shape(&self) -> Result<Shape, StoreError> {
        Ok(Shape::Value {
            value: type_name::<V>(),
        })
    }

    fn visit<C: Codec>(&mut self, codec: &C, _key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let value: V = unmarshal(codec, value)?;
        (*self)(value);
        Ok(())
    }
}

impl<F, K, V> Visitor<(K, V)> for F
where
    F: FnMut(K, V),
    K: FromKey,
    V: DeserializeOwned + 'static,
{
    fn shape(&self) -> Result<Shape, StoreError> {
        Ok(Shape::KeyValue {
            key: type_name::<K>(),
            value: type_name::<V>(),
        })
    }

    fn visit<C: Codec>(&mut self, codec: &C, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let value: V = unmarshal(codec, value)?;
        let key = K::from_key(key, codec)?;
        (*self)(key, value);
        Ok(())
    }
}

/// A callback whose shape has been checked, bound to the codec records are decoded with.
pub(crate) struct Dispatcher<'c, C, F, Args> {
    codec: &'c C,
    callback: F,
    shape: Shape,
    _args: PhantomData<fn(Args)>,
}

impl<'c, C, F, Args> Dispatcher<'c, C, F, Args>
where
    C: Codec,
    F: Visitor<Args>,
{
    pub(crate) fn new(codec: &'c C, callback: F) -> Result<Self, StoreError> {
        let shape = callback.shape()?;
        Ok(Dispatcher {
            codec,
            callback,
            shape,
            _args: PhantomData,
        })
    }

    pub(crate) fn shape(&self) -> Shape {
        self.shape
    }

    pub(crate) fn dispatch(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.callback.visit(self.codec, key, value)
    }
}
