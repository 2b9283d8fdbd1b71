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
use std::path::{
    Path,
    PathBuf,
};
use std::sync::{
    Arc,
    Mutex,
    RwLock,
};

use log::{
    debug,
    warn,
};

use super::{
    bucket::Snapshot,
    BucketPath,
    RoTransaction,
    RwTransaction,
};
use crate::error::BackendError;

const DEFAULT_DB_FILENAME: &str = "data.stow.bin";
const TEMP_DB_FILENAME: &str = "data.stow.bin.tmp";

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct EnvironmentBuilder {
    make_dir_if_needed: bool,
}

impl EnvironmentBuilder {
    pub fn new() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    pub fn set_make_dir_if_needed(&mut self, make_dir_if_needed: bool) -> &mut Self {
        self.make_dir_if_needed = make_dir_if_needed;
        self
    }

    pub fn open(&self, path: &Path) -> Result<Environment, BackendError> {
        if !path.is_dir() {
            if !self.make_dir_if_needed {
                return Err(BackendError::DirectoryDoesNotExist(path.into()));
            }
            fs::create_dir_all(path)?;
        }
        let env = Environment {
            path: path.to_path_buf(),
            current: RwLock::new(Arc::new(Environment::read_from_disk(path)?)),
            writer: Mutex::new(()),
        };
        debug!("opened environment at {:?}", env.path);
        Ok(env)
    }
}

/// An embedded, single-writer, snapshot-isolated bucket store persisted to one file.
///
/// Readers see the state committed when they began. Only one write transaction
/// exists at a time; further `write()` calls block until it is committed or dropped.
#[derive(Debug)]
pub struct Environment {
    path: PathBuf,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl Environment {
    /// Open the environment in the existing directory `path`.
    pub fn new(path: &Path) -> Result<Environment, BackendError> {
        EnvironmentBuilder::new().open(path)
    }

    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<RoTransaction, BackendError> {
        Ok(RoTransaction::new(self.current()?))
    }

    pub fn write(&self) -> Result<RwTransaction, BackendError> {
        let lock = self.writer.lock().map_err(|_| BackendError::Poisoned)?;
        let snapshot = Snapshot::clone(&*self.current()?);
        Ok(RwTransaction::new(self, snapshot, lock))
    }

    /// Names of every bucket holding data, nested ones included.
    pub fn bucket_paths(&self) -> Result<Vec<BucketPath>, BackendError> {
        Ok(self.current()?.bucket_paths().cloned().collect())
    }

    fn current(&self) -> Result<Arc<Snapshot>, BackendError> {
        let current = self.current.read().map_err(|_| BackendError::Poisoned)?;
        Ok(Arc::clone(&current))
    }

    /// Persist `snapshot` and make it visible to new transactions. Nothing is
    /// published if writing to disk fails.
    pub(crate) fn publish(&self, snapshot: Snapshot) -> Result<(), BackendError> {
        self.write_to_disk(&snapshot)?;
        let mut current = self.current.write().map_err(|_| BackendError::Poisoned)?;
        *current = Arc::new(snapshot);
        Ok(())
    }

    fn read_from_disk(dir: &Path) -> Result<Snapshot, BackendError> {
        let path = dir.join(DEFAULT_DB_FILENAME);
        if fs::metadata(&path).is_err() {
            return Ok(Snapshot::default());
        }
        Ok(bincode::deserialize(&fs::read(&path)?)?)
    }

    fn write_to_disk(&self, snapshot: &Snapshot) -> Result<(), BackendError> {
        let temp = self.path.join(TEMP_DB_FILENAME);
        fs::write(&temp, bincode::serialize(snapshot)?)?;
        if let Err(e) = fs::rename(&temp, self.path.join(DEFAULT_DB_FILENAME)) {
            warn!("couldn't move {:?} into place: {}", temp, e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::Builder;

    use super::*;

    /// We can't open a directory that doesn't exist.
    #[test]
    fn test_open_fails() {
        let root = Builder::new().prefix("test_open_fails").tempdir().expect("tempdir");
        assert!(root.path().exists());

        let nope = root.path().join("nope/");
        assert!(!nope.exists());

        let pb = nope.to_path_buf();
        match Environment::new(nope.as_path()).err() {
            Some(BackendError::DirectoryDoesNotExist(p)) => {
                assert_eq!(pb, p);
            },
            _ => panic!("expected error"),
        };
    }

    #[test]
    fn test_open_makes_dir_if_needed() {
        let root = Builder::new().prefix("test_open_makes_dir").tempdir().expect("tempdir");
        let nested = root.path().join("a/b");

        let env = Environment::builder().set_make_dir_if_needed(true).open(&nested).expect("opened");
        assert!(nested.is_dir());
        assert_eq!(env.path(), nested.as_path());
    }

    #[test]
    fn test_round_trip_and_transactions() {
        let root = Builder::new().prefix("test_round_trip_and_transactions").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");
        let env = Environment::new(root.path()).expect("new succeeded");
        let sk = BucketPath::new("sk");

        {
            let mut writer = env.write().expect("writer");
            let bucket = writer.create_bucket_if_not_exists(&sk);
            bucket.put(b"foo", b"1234");
            bucket.put(b"bar", b"true");
            assert_eq!(writer.bucket(&sk).and_then(|b| b.get(b"foo")), Some(&b"1234"[..]));

            // Isolation. Reads won't see the bucket.
            let r = env.read().expect("reader");
            assert!(r.bucket(&sk).is_none());
        }

        // Dropped: tx rollback. Reads will still return nothing.
        {
            let r = env.read().expect("reader");
            assert!(r.bucket(&sk).is_none());
        }

        {
            let mut writer = env.write().expect("writer");
            writer.create_bucket_if_not_exists(&sk).put(b"foo", b"1234");
            writer.commit().expect("committed");
        }

        // Committed. Reads will succeed.
        {
            let r = env.read().expect("reader");
            assert_eq!(r.bucket(&sk).and_then(|b| b.get(b"foo")), Some(&b"1234"[..]));
        }

        {
            let mut writer = env.write().expect("writer");
            writer.delete_bucket(&sk);
            writer.delete_bucket(&sk);
            assert!(writer.bucket(&sk).is_none());
            writer.commit().expect("committed");
        }

        assert!(env.read().expect("reader").bucket(&sk).is_none());
    }

    #[test]
    fn test_isolation() {
        let root = Builder::new().prefix("test_isolation").tempdir().expect("tempdir");
        let env = Environment::new(root.path()).expect("new succeeded");
        let s = BucketPath::new("s");

        {
            let mut writer = env.write().expect("writer");
            writer.create_bucket_if_not_exists(&s).put(b"foo", b"1234");
            writer.commit().expect("committed");
        }

        // Establish a long-lived reader that outlasts a writer.
        let reader = env.read().expect("reader");

        let mut writer = env.write().expect("writer");
        writer.bucket_mut(&s).expect("bucket").put(b"foo", b"999");

        // The reader and writer are isolated.
        assert_eq!(reader.bucket(&s).and_then(|b| b.get(b"foo")), Some(&b"1234"[..]));
        assert_eq!(writer.bucket(&s).and_then(|b| b.get(b"foo")), Some(&b"999"[..]));

        // If we commit the writer, we still have isolation.
        writer.commit().expect("committed");
        assert_eq!(reader.bucket(&s).and_then(|b| b.get(b"foo")), Some(&b"1234"[..]));

        // A new reader sees the committed value.
        let reader = env.read().expect("reader");
        assert_eq!(reader.bucket(&s).and_then(|b| b.get(b"foo")), Some(&b"999"[..]));
    }

    #[test]
    fn test_persists_across_reopen() {
        let root = Builder::new().prefix("test_persists_across_reopen").tempdir().expect("tempdir");
        let s = BucketPath::new("s");
        let nested = s.child("inner");

        {
            let env = Environment::new(root.path()).expect("new succeeded");
            let mut writer = env.write().expect("writer");
            writer.create_bucket_if_not_exists(&s).put(b"foo", b"bar");
            writer.create_bucket_if_not_exists(&nested).put(b"baz", b"qux");
            writer.commit().expect("committed");
        }

        let env = Environment::new(root.path()).expect("reopened");
        let reader = env.read().expect("reader");
        assert_eq!(reader.bucket(&s).and_then(|b| b.get(b"foo")), Some(&b"bar"[..]));
        assert_eq!(reader.bucket(&nested).and_then(|b| b.get(b"baz")), Some(&b"qux"[..]));
        assert_eq!(env.bucket_paths().expect("paths"), vec![s, nested]);
    }
}
