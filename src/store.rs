//! The object store: opaque references, object records, and the mapping
//! between the two. Everything the program allocates lives here; the machine
//! and the inspector only ever hold [Reference]s into it.

use crate::{ast::Stmt, error::RuntimeError};
use serde::Serialize;
use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
};

/// An opaque identity for an object in the store. References are allocated
/// from a monotonically increasing counter, so they are stable and
/// reproducible across runs; they are compared by identity and support no
/// arithmetic.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
pub struct Reference(usize);

impl Reference {
    /// Rebuild a reference from a raw id, e.g. one written by a user in a
    /// `reference:` object-path segment. The result may dangle; callers must
    /// check the store.
    pub(crate) fn from_id(id: usize) -> Self {
        Self(id)
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// The value held in an object's state slot: a reference, or the nil sentinel
/// meaning "undefined reference".
pub type Value = Option<Reference>;

/// A key in an object's state. Ordinary member and local variables are
/// strings; PREV and CLASS are internalised keys that can never collide with
/// them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// An ordinary variable key
    Var(String),
    /// The internalised key linking a frame to the frame below it
    Prev,
    /// The internalised key linking a frame to the class registry
    Class,
}

impl StateKey {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }
}

/// A compiled method: its parameter names, in declaration order, and its body.
/// Behaviour entries are immutable once the owning object has been created;
/// the machine always clones the body before executing it.
#[derive(Clone, Debug, PartialEq)]
pub struct Method {
    pub params: Vec<String>,
    pub body: Stmt,
}

/// An object record: a *state* mapping variable keys to values, and a
/// *behaviour* mapping method names to methods. Frames, containers, class
/// objects, prototypes and instances are all ClassObjects; they differ only
/// in which keys they carry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassObject {
    state: HashMap<StateKey, Value>,
    behaviour: HashMap<String, Method>,
}

impl ClassObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a state slot. `None` means the key is absent entirely, which is
    /// distinct from a present slot holding nil.
    pub fn get(&self, key: &StateKey) -> Option<Value> {
        self.state.get(key).copied()
    }

    /// Shorthand for reading an ordinary variable slot.
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.state.get(&StateKey::Var(name.to_string())).copied()
    }

    /// Write a single state slot, creating it if absent.
    pub fn set(&mut self, key: StateKey, value: Value) {
        self.state.insert(key, value);
    }

    pub fn state(&self) -> &HashMap<StateKey, Value> {
        &self.state
    }

    /// The ordinary variable keys of this object, excluding PREV and CLASS.
    pub fn var_names(&self) -> impl Iterator<Item = &String> {
        self.state.keys().filter_map(|key| match key {
            StateKey::Var(name) => Some(name),
            StateKey::Prev | StateKey::Class => None,
        })
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.behaviour.get(name)
    }

    pub fn add_method(&mut self, name: impl Into<String>, method: Method) {
        self.behaviour.insert(name.into(), method);
    }

    pub fn behaviour(&self) -> &HashMap<String, Method> {
        &self.behaviour
    }
}

/// The mapping from references to object records. Entries are created by
/// [Store::put], updated through [Store::setv] or [Store::get_mut], and
/// removed only by [Store::sweep].
#[derive(Clone, Debug)]
pub struct Store {
    objects: HashMap<Reference, ClassObject>,
    next_id: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            // Start at 1 so reference ids are stable, human-friendly tags
            next_id: 1,
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh reference, store the object under it, and return the
    /// reference. The reference is never equal to any previously allocated
    /// one, even if that one has since been swept.
    pub fn put(&mut self, obj: ClassObject) -> Reference {
        let reference = Reference(self.next_id);
        self.next_id += 1;
        self.objects.insert(reference, obj);
        reference
    }

    pub fn get(
        &self,
        reference: Reference,
    ) -> Result<&ClassObject, RuntimeError> {
        self.objects
            .get(&reference)
            .ok_or(RuntimeError::MissingReference(Some(reference)))
    }

    pub fn get_mut(
        &mut self,
        reference: Reference,
    ) -> Result<&mut ClassObject, RuntimeError> {
        self.objects
            .get_mut(&reference)
            .ok_or(RuntimeError::MissingReference(Some(reference)))
    }

    pub fn contains(&self, reference: Reference) -> bool {
        self.objects.contains_key(&reference)
    }

    /// Merge the given partial state into the object's state. Keys present in
    /// the partial state overwrite existing slots; other slots are untouched.
    pub fn setv(
        &mut self,
        partial_state: impl IntoIterator<Item = (StateKey, Value)>,
        reference: Reference,
    ) -> Result<(), RuntimeError> {
        let obj = self.get_mut(reference)?;
        for (key, value) in partial_state {
            obj.set(key, value);
        }
        Ok(())
    }

    /// The number of live objects in the store.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All live references, in allocation order.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs: Vec<_> = self.objects.keys().copied().collect();
        refs.sort();
        refs
    }

    /// Delete every object not reachable from `root` by transitively
    /// following state references, including the internalised PREV and CLASS
    /// slots. Returns the number of objects removed. Behaviour entries hold
    /// no references, so they do not contribute edges.
    pub fn sweep(&mut self, root: Reference) -> usize {
        let mut reachable = Vec::new();
        let mut frontier = vec![root];
        while let Some(reference) = frontier.pop() {
            if reachable.contains(&reference) {
                continue;
            }
            if let Some(obj) = self.objects.get(&reference) {
                reachable.push(reference);
                frontier.extend(obj.state.values().flatten());
            }
        }

        let before = self.objects.len();
        self.objects
            .retain(|reference, _| reachable.contains(reference));
        before - self.objects.len()
    }
}
