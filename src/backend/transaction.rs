// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fmt::{
    self,
    Debug,
    Formatter,
};
use std::sync::{
    Arc,
    MutexGuard,
};

use log::debug;

use super::{
    bucket::Snapshot,
    Bucket,
    BucketPath,
    Environment,
};
use crate::error::BackendError;

/// A read-only view of the environment as of the moment it began.
#[derive(Debug)]
pub struct RoTransaction {
    snapshot: Arc<Snapshot>,
}

impl RoTransaction {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> RoTransaction {
        RoTransaction {
            snapshot,
        }
    }

    /// The bucket at `path`, or `None` if it doesn't exist.
    pub fn bucket(&self, path: &BucketPath) -> Option<&Bucket> {
        self.snapshot.bucket(path)
    }
}

/// The single write transaction of an environment.
///
/// Changes become visible to new transactions on `commit`. Dropping the
/// transaction without committing discards them.
pub struct RwTransaction<'env> {
    env: &'env Environment,
    snapshot: Snapshot,
    _lock: MutexGuard<'env, ()>,
}

impl<'env> RwTransaction<'env> {
    pub(crate) fn new(env: &'env Environment, snapshot: Snapshot, lock: MutexGuard<'env, ()>) -> RwTransaction<'env> {
        RwTransaction {
            env,
            snapshot,
            _lock: lock,
        }
    }

    pub fn bucket(&self, path: &BucketPath) -> Option<&Bucket> {
        self.snapshot.bucket(path)
    }

    pub fn bucket_mut(&mut self, path: &BucketPath) -> Option<&mut Bucket> {
        self.snapshot.bucket_mut(path)
    }

    pub fn create_bucket_if_not_exists(&mut self, path: &BucketPath) -> &mut Bucket {
        self.snapshot.create_bucket(path)
    }

    /// Drop the bucket at `path` with everything nested under it. Dropping a
    /// bucket that doesn't exist is not an error.
    pub fn delete_bucket(&mut self, path: &BucketPath) {
        let dropped = self.snapshot.delete_bucket(path);
        debug!("dropped {} bucket(s) under {:?}", dropped, path);
    }

    pub fn commit(self) -> Result<(), BackendError> {
        debug!("committing write transaction on {:?}", self.env.path());
        self.env.publish(self.snapshot)
    }

    pub fn abort(self) {
        // noop
    }
}

impl<'env> Debug for RwTransaction<'env> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwTransaction").field("env", &self.env.path()).finish()
    }
}
