// Any copyright is dedicated to the Public Domain.
// http://creativecommons.org/publicdomain/zero/1.0/

//! A simple stow demo that showcases the basic usage (put/get/pull/for_each) of stow.
//!
//! You can test this out by running:
//!
//!     cargo run --example simple-store

use std::fs;
use std::sync::Arc;

use serde_derive::{
    Deserialize,
    Serialize,
};
use stow::{
    BinaryCodec,
    Encoded,
    Environment,
    Manager,
    PooledCodec,
    PrimedCodec,
    Store,
};
use tempfile::Builder;

#[derive(Debug, Serialize, Deserialize)]
struct Person {
    name: String,
    age: u32,
}

fn main() {
    let root = Builder::new().prefix("simple-db").tempdir().unwrap();
    fs::create_dir_all(root.path()).unwrap();
    let p = root.path();

    // The manager enforces that each process opens the same environment at most once
    let env = Manager::singleton().write().unwrap().get_or_create(p, Environment::new).unwrap();

    // The binary format writes type names, so stored types need one
    stow::register_name::<Person>("demo.Person").unwrap();

    println!("Inserting data...");
    let people = Store::new(env.clone(), "people");
    people.put("ann", &Person { name: "Ann".into(), age: 30 }).unwrap();
    people.put("bob", &Person { name: "Bob".into(), age: 41 }).unwrap();

    // Anything serializable can be a key once it's wrapped
    let by_id = people.nested("by-id").unwrap();
    by_id.put(&Encoded(7u64), &Person { name: "Cat".into(), age: 25 }).unwrap();

    println!("Looking up keys...");
    let ann: Person = people.get("ann").unwrap();
    println!("Get ann {:?}", ann);
    let cat: Person = by_id.get(&Encoded(7u64)).unwrap();
    println!("Get 7 {:?}", cat);
    println!("Get nobody {:?}", people.get::<Person, _>("nobody").err());

    println!("Iterating...");
    people.for_each(|key: String, person: Person| println!("{} => {:?}", key, person)).unwrap();

    println!("Pulling...");
    let bob: Person = people.pull("bob").unwrap();
    println!("Pulled bob {:?}, now {:?}", bob, people.get::<Person, _>("bob").err());

    println!("Priming...");
    {
        // Primed instances already know Person, so records skip its description
        let primed = PrimedCodec::builder(BinaryCodec).sample(Person { name: String::new(), age: 0 }).build().unwrap();
        let codec = Arc::new(PooledCodec::new(primed));
        let compact = Store::with_shared_codec(env.clone(), "compact", codec);
        compact.put("ann", &ann).unwrap();
        compact.for_each(|person: Box<Person>| println!("Compact {:?}", person)).unwrap();
    }

    println!("Deleting everything...");
    people.delete_all().unwrap();
    println!("Get 7 after delete_all {:?}", by_id.get::<Person, _>(&Encoded(7u64)).err());
}
