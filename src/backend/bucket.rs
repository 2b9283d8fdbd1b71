// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_derive::{
    Deserialize,
    Serialize,
};

/// Name of a bucket, as the list of names from the root bucket down to it.
///
/// Paths order component by component, so every descendant of a bucket sorts
/// directly after it. Deleting a bucket relies on that to drop its children too.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketPath(Vec<Box<[u8]>>);

impl BucketPath {
    pub fn new<N: AsRef<[u8]>>(name: N) -> BucketPath {
        BucketPath(vec![Box::from(name.as_ref())])
    }

    pub fn child<N: AsRef<[u8]>>(&self, name: N) -> BucketPath {
        let mut components = self.0.clone();
        components.push(Box::from(name.as_ref()));
        BucketPath(components)
    }

    /// True if `self` is `other` or one of its descendants.
    pub fn starts_with(&self, other: &BucketPath) -> bool {
        self.0.starts_with(&other.0)
    }
}

/// An ordered key → bytes mapping.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Bucket {
    map: BTreeMap<Box<[u8]>, Box<[u8]>>,
}

impl Bucket {
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(|v| v.as_ref())
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.map.insert(Box::from(key), Box::from(value));
    }

    /// Removes `key`, returning its bytes if it was present.
    pub fn delete(&mut self, key: &[u8]) -> Option<Box<[u8]>> {
        self.map.remove(key)
    }

    /// Iterates over every record in byte order of the keys.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.map.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The full state of an environment at one point in time.
///
/// Buckets are shared between snapshots and only copied when a write
/// transaction touches them.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    buckets: BTreeMap<BucketPath, Arc<Bucket>>,
}

impl Snapshot {
    pub(crate) fn bucket(&self, path: &BucketPath) -> Option<&Bucket> {
        self.buckets.get(path).map(|b| b.as_ref())
    }

    pub(crate) fn bucket_mut(&mut self, path: &BucketPath) -> Option<&mut Bucket> {
        self.buckets.get_mut(path).map(Arc::make_mut)
    }

    pub(crate) fn create_bucket(&mut self, path: &BucketPath) -> &mut Bucket {
        Arc::make_mut(self.buckets.entry(path.clone()).or_insert_with(Default::default))
    }

    /// Drops `path` and every bucket nested under it. Returns how many buckets went away.
    pub(crate) fn delete_bucket(&mut self, path: &BucketPath) -> usize {
        let doomed: Vec<BucketPath> =
            self.buckets.range(path.clone()..).take_while(|(p, _)| p.starts_with(path)).map(|(p, _)| p.clone()).collect();
        for p in &doomed {
            self.buckets.remove(p);
        }
        doomed.len()
    }

    pub(crate) fn bucket_paths(&self) -> impl Iterator<Item = &BucketPath> {
        self.buckets.keys()
    }
}
