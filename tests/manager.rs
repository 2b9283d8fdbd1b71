// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fs;
use std::sync::Arc;

use tempfile::Builder;

use stow::{
    BackendError,
    Environment,
    Manager,
    Store,
};

#[test]
// Identical to the same-named unit test, but this one confirms that it works
// via public Manager APIs.
fn test_same() {
    let root = Builder::new().prefix("test_same").tempdir().expect("tempdir");
    fs::create_dir_all(root.path()).expect("dir created");

    let mut manager = Manager::new();

    let p = root.path();
    assert!(manager.get(p).expect("success").is_none());

    let created_arc = manager.get_or_create(p, Environment::new).expect("created");
    let fetched_arc = manager.get(p).expect("success").expect("existed");
    assert!(Arc::ptr_eq(&created_arc, &fetched_arc));
}

#[test]
fn test_singleton_shares_data() {
    let root = Builder::new().prefix("test_singleton_shares_data").tempdir().expect("tempdir");
    let p = root.path();

    let first = Manager::singleton().write().expect("manager").get_or_create(p, Environment::new).expect("created");
    let second = Manager::singleton().write().expect("manager").get_or_create(p, Environment::new).expect("opened");
    assert!(Arc::ptr_eq(&first, &second));

    Store::json(first, "greetings").put("hello", "world").expect("put");
    let value: String = Store::json(second, "greetings").get("hello").expect("get");
    assert_eq!(value, "world");

    Manager::singleton().write().expect("manager").close(p).expect("closed");
}

#[test]
fn test_builder_makes_dir() {
    let root = Builder::new().prefix("test_builder_makes_dir").tempdir().expect("tempdir");
    let nested = root.path().join("a").join("b");

    let mut builder = Environment::builder();
    builder.set_make_dir_if_needed(true);
    let mut manager = Manager::new();
    let env = manager.get_or_create(nested.as_path(), |p| builder.open(p)).expect("created");
    assert!(nested.is_dir());

    let fetched = manager.get(nested.as_path()).expect("success").expect("existed");
    assert!(Arc::ptr_eq(&env, &fetched));
    let reopened = manager.get_or_create(nested.as_path(), Environment::new).expect("opened");
    assert!(Arc::ptr_eq(&env, &reopened));
}

#[test]
fn test_missing_dir_without_builder() {
    let root = Builder::new().prefix("test_missing_dir_without_builder").tempdir().expect("tempdir");
    let missing = root.path().join("missing");

    let mut manager = Manager::new();
    match manager.get_or_create(missing.as_path(), Environment::new) {
        Err(BackendError::DirectoryDoesNotExist(path)) => assert_eq!(path, missing),
        other => panic!("expected DirectoryDoesNotExist, got {:?}", other.map(|_| ())),
    }
    assert!(!missing.exists());
}
