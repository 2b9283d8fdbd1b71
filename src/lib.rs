// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! A typed store layered over a small transactional bucket engine.
//!
//! A [`Store`] binds a [`Codec`] to one bucket of an [`Environment`], and turns
//! any `serde` value into bytes and back:
//!
//! ```
//! use std::fs;
//!
//! use serde_derive::{Deserialize, Serialize};
//! use stow::{Environment, Manager, Store};
//! use tempfile::Builder;
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! // Stored types need a stable name in the binary format.
//! stow::register_name::<Person>("demo.Person").unwrap();
//!
//! let root = Builder::new().prefix("simple").tempdir().unwrap();
//! fs::create_dir_all(root.path()).unwrap();
//!
//! // Open environments through the manager so each file has a single writer.
//! let mut manager = Manager::singleton().write().unwrap();
//! let env = manager.get_or_create(root.path(), Environment::new).unwrap();
//!
//! let people = Store::new(env, "people");
//! let ann = Person { name: "Ann".into(), age: 30 };
//! people.put("ann", &ann).unwrap();
//!
//! let back: Person = people.get("ann").unwrap();
//! assert_eq!(back, ann);
//!
//! let mut names = Vec::new();
//! people.for_each(|key: String, _: Person| names.push(key)).unwrap();
//! assert_eq!(names, vec!["ann"]);
//! ```
//!
//! The binary format describes each type the first time an encoder meets it.
//! A [`PrimedCodec`] moves those descriptions out of the stored records, and a
//! [`PooledCodec`] saves re-priming an encoder for every operation:
//!
//! ```
//! # use serde_derive::{Deserialize, Serialize};
//! # #[derive(Serialize, Deserialize)]
//! # struct Person { name: String, age: u32 }
//! # stow::register_name::<Person>("demo.Person").unwrap();
//! use stow::{BinaryCodec, PooledCodec, PrimedCodec};
//!
//! let primed = PrimedCodec::builder(BinaryCodec)
//!     .sample(Person { name: String::new(), age: 0 })
//!     .build()
//!     .unwrap();
//! let codec = PooledCodec::new(primed);
//! # let _ = codec;
//! ```

mod backend;
mod codec;
mod error;
mod manager;
mod store;

pub use backend::{
    Bucket,
    BucketPath,
    Environment,
    EnvironmentBuilder,
    RoTransaction,
    RwTransaction,
};
pub use codec::{
    register,
    register_name,
    BinaryCodec,
    BinaryDecoder,
    BinaryEncoder,
    Codec,
    Decoder,
    Encoder,
    JsonCodec,
    JsonDecoder,
    JsonEncoder,
    PooledCodec,
    PrimedCodec,
    PrimedCodecBuilder,
    PrimedDecoder,
    PrimedEncoder,
    Reusable,
    StreamDecoder,
    StreamEncoder,
    XmlCodec,
    XmlDecoder,
    XmlEncoder,
};
pub use error::{
    BackendError,
    DecodeError,
    EncodeError,
    PrimeError,
    RegistryError,
    StoreError,
};
pub use manager::Manager;
pub use store::{
    AsKey,
    Encoded,
    FromKey,
    Shape,
    Store,
    Visitor,
};
