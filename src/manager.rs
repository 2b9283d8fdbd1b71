// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::{
    Arc,
    RwLock,
};

use lazy_static::lazy_static;

use crate::backend::Environment;
use crate::error::BackendError;

lazy_static! {
    static ref MANAGER: RwLock<Manager> = RwLock::new(Manager::new());
}

/// A process is only permitted to have one open handle to each environment:
/// two handles would each believe they are the single writer of the same file.
/// This manager exists to enforce that constraint: don't open environments directly.
pub struct Manager {
    environments: BTreeMap<PathBuf, Arc<Environment>>,
}

impl Manager {
    pub fn new() -> Manager {
        Manager {
            environments: Default::default(),
        }
    }

    pub fn singleton() -> &'static RwLock<Manager> {
        &*MANAGER
    }

    /// Return the open environment at `path`, returning `None` if it has not already been opened.
    pub fn get<'p, P>(&self, path: P) -> Result<Option<Arc<Environment>>, io::Error>
    where
        P: Into<&'p Path>,
    {
        let canonical = path.into().canonicalize()?;
        Ok(self.environments.get(&canonical).cloned())
    }

    /// Return the open environment at `path`, or create it by calling `f`.
    ///
    /// A missing directory is handed to `f` as given, so a builder with
    /// `set_make_dir_if_needed(true)` can create it.
    pub fn get_or_create<'p, F, P>(&mut self, path: P, f: F) -> Result<Arc<Environment>, BackendError>
    where
        F: FnOnce(&Path) -> Result<Environment, BackendError>,
        P: Into<&'p Path>,
    {
        let path = path.into();
        let canonical = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let env = f(path)?;
                let canonical = path.canonicalize()?;
                return Ok(self.environments.entry(canonical).or_insert_with(|| Arc::new(env)).clone());
            },
            Err(e) => return Err(e.into()),
        };
        Ok(match self.environments.entry(canonical) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let env = Arc::new(f(e.key().as_path())?);
                e.insert(env).clone()
            },
        })
    }

    /// Forget the environment at `path`. It closes once the last store using it is dropped.
    pub fn close<'p, P>(&mut self, path: P) -> Result<Option<Arc<Environment>>, io::Error>
    where
        P: Into<&'p Path>,
    {
        let canonical = path.into().canonicalize()?;
        Ok(self.environments.remove(&canonical))
    }
}

impl Default for Manager {
    fn default() -> Manager {
        Manager::new()
    }
}
