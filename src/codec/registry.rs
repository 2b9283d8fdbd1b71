// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Process-wide mapping between Rust types and the names the binary format
//! writes for them.
//!
//! Names end up on disk, so they have to stay the same across builds. That rules
//! out `std::any::type_name` as an implicit default: every type the binary format
//! sees must be registered, except the builtins below.

use std::any::{
    type_name,
    TypeId,
};
use std::collections::HashMap;
use std::sync::{
    PoisonError,
    RwLock,
};

use lazy_static::lazy_static;

use crate::error::RegistryError;

lazy_static! {
    static ref REGISTRY: RwLock<Registry> = RwLock::new(Registry::with_builtins());
}

struct Registry {
    by_type: HashMap<TypeId, String>,
    by_name: HashMap<String, &'static str>,
}

macro_rules! builtin {
    ($registry:expr, $name:expr, $($t:ty),+) => {
        $( $registry.insert::<$t>($name); )+
    };
}

impl Registry {
    fn with_builtins() -> Registry {
        let mut registry = Registry {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
        };
        builtin!(registry, "unit", ());
        builtin!(registry, "bool", bool);
        builtin!(registry, "char", char);
        builtin!(registry, "i8", i8);
        builtin!(registry, "i16", i16);
        builtin!(registry, "i32", i32);
        builtin!(registry, "i64", i64);
        builtin!(registry, "i128", i128);
        builtin!(registry, "u8", u8);
        builtin!(registry, "u16", u16);
        builtin!(registry, "u32", u32);
        builtin!(registry, "u64", u64);
        builtin!(registry, "u128", u128);
        builtin!(registry, "f32", f32);
        builtin!(registry, "f64", f64);
        builtin!(registry, "string", String, str);
        builtin!(registry, "bytes", Vec<u8>, [u8]);
        registry
    }

    /// `Box<T>` encodes exactly like `T`, so it shares the name unless it already has one.
    fn insert<T: ?Sized + 'static>(&mut self, name: &str) {
        self.by_name.entry(name.to_owned()).or_insert(type_name::<T>());
        self.by_type.insert(TypeId::of::<T>(), name.to_owned());
        self.by_type.entry(TypeId::of::<Box<T>>()).or_insert_with(|| name.to_owned());
    }

    fn register<T: ?Sized + 'static>(&mut self, name: &str) -> Result<(), RegistryError> {
        if let Some(existing) = self.by_type.get(&TypeId::of::<T>()) {
            if existing == name {
                return Ok(());
            }
            return Err(RegistryError::TypeTaken {
                rust_type: type_name::<T>(),
                existing: existing.clone(),
            });
        }
        if let Some(existing) = self.by_name.get(name) {
            return Err(RegistryError::NameTaken {
                name: name.to_owned(),
                existing: *existing,
            });
        }
        self.insert::<T>(name);
        Ok(())
    }
}

/// Register `T` under `name`, the name the binary format will write for it.
///
/// Registering the same type under the same name twice is harmless. A name can
/// only belong to one type, and a type can only have one name.
pub fn register_name<T: ?Sized + 'static>(name: &str) -> Result<(), RegistryError> {
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner).register::<T>(name)
}

/// Register `T` under its Rust type name.
///
/// Only use this for data that never outlives the build that wrote it:
/// `std::any::type_name` output isn't guaranteed stable across compilers.
pub fn register<T: ?Sized + 'static>() -> Result<(), RegistryError> {
    register_name::<T>(type_name::<T>())
}

pub(crate) fn name_of<T: ?Sized + 'static>() -> Option<String> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry.by_type.get(&TypeId::of::<T>()).cloned()
}

pub(crate) fn is_known_name(name: &str) -> bool {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner).by_name.contains_key(name)
}
