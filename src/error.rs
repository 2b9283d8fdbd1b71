// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::{
    io,
    path::PathBuf,
};

use thiserror::Error;
use uuid::Uuid;

/// Failure to turn a value into bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("type {0} is not registered; call stow::register_name first")]
    Unregistered(&'static str),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to turn bytes back into a value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown type id {0}: no definition seen on this stream")]
    UnknownTypeId(u32),

    #[error("type id {0} defined twice on the same stream")]
    DuplicateTypeId(u32),

    #[error("unknown type name {0:?}: not registered in this process")]
    UnknownType(String),

    #[error("type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        expected: String,
        actual: String,
    },

    #[error("type {0} is not registered; call stow::register_name first")]
    Unregistered(&'static str),

    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("key is not valid UTF-8")]
    KeyNotUtf8,

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to build a `PrimedCodec` from its samples.
#[derive(Debug, Error)]
pub enum PrimeError {
    #[error("couldn't encode sample {index}: {source}")]
    Encode {
        index: usize,
        source: EncodeError,
    },

    #[error("couldn't decode sample {index}: {source}")]
    Decode {
        index: usize,
        source: DecodeError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("wire name {name:?} is already registered for {existing}")]
    NameTaken {
        name: String,
        existing: &'static str,
    },

    #[error("type {rust_type} is already registered as {existing:?}")]
    TypeTaken {
        rust_type: &'static str,
        existing: String,
    },
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("directory does not exist or not a directory: {0:?}")]
    DirectoryDoesNotExist(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("couldn't (de)serialize environment: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("environment lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("marshal error: {0}")]
    MarshalError(#[from] EncodeError),

    #[error("unmarshal error: {0}")]
    UnmarshalError(#[from] DecodeError),

    #[error("invalid callback: {0}")]
    InvalidCallback(&'static str),

    #[error("storage error: {0}")]
    StorageError(#[from] BackendError),

    #[error("bucket name {0:?} is reserved")]
    ReservedName(String),

    #[error("bucket was written by a different codec: stored {stored:?}, current {current:?}")]
    CodecMismatch {
        stored: Option<Uuid>,
        current: Option<Uuid>,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}
