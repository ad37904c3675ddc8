//! Variable scope shared by the code a user runs
//!
//! A [`Scope`] is a flat binding table: every declaration or assignment made
//! by executed code lands in its top layer, whatever the nesting depth of the
//! statement. An optional parent layer is consulted for reads only.
//!
//! [`Retention`] decides whether one Scope survives from invocation to
//! invocation or each invocation gets a fresh one, and [`ScopeGuard`]
//! removes an invocation's argument bindings again on every exit path.

use crate::executor::types::{Val, VarKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// Argument bindings injected into a Scope for one invocation
pub type Bindings = HashMap<String, Val>;

/* ===================== Scope ===================== */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    vars: HashMap<String, Val>,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    consts: HashSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new empty layer whose reads fall through to `parent`
    pub fn with_parent(parent: Scope) -> Self {
        Self {
            parent: Some(Box::new(parent)),
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.parent.as_deref()
    }

    /// Look a name up, falling through to the parent layer
    pub fn get(&self, name: &str) -> Option<&Val> {
        match self.vars.get(name) {
            Some(v) => Some(v),
            None => self.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Write a binding into the top layer
    pub fn set(&mut self, name: impl Into<String>, value: Val) {
        self.vars.insert(name.into(), value);
    }

    /// Declare a binding; a later `let` of the same name lifts the const mark
    pub fn declare(&mut self, name: impl Into<String>, value: Val, kind: VarKind) {
        let name = name.into();
        match kind {
            VarKind::Const => {
                self.consts.insert(name.clone());
            }
            VarKind::Let => {
                self.consts.remove(&name);
            }
        }
        self.vars.insert(name, value);
    }

    /// Whether assignment to `name` must be rejected
    pub fn is_const(&self, name: &str) -> bool {
        if self.vars.contains_key(name) {
            return self.consts.contains(name);
        }
        self.parent.as_ref().is_some_and(|p| p.is_const(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Val> {
        self.consts.remove(name);
        self.vars.remove(name)
    }

    /// Merge bindings into the top layer, overwriting on collision
    pub fn update(&mut self, bindings: impl IntoIterator<Item = (String, Val)>) {
        for (name, value) in bindings {
            self.consts.remove(&name);
            self.vars.insert(name, value);
        }
    }

    /// Remove every listed name from the top layer
    ///
    /// Names not present are ignored, so calling this twice is harmless.
    /// Parent layers are never touched.
    pub fn clear_intersection<K: AsRef<str>>(&mut self, names: impl IntoIterator<Item = K>) {
        for name in names {
            self.remove(name.as_ref());
        }
    }

    /// Number of bindings in the top layer
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Sorted names of the top layer
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Val)> {
        self.vars.iter()
    }
}

/* ===================== Retention ===================== */

/// Whether one Scope is kept across invocations
#[derive(Debug, Default)]
pub struct Retention {
    retained: Option<Scope>,
}

impl Retention {
    pub fn new(enabled: bool) -> Self {
        Self {
            retained: enabled.then(Scope::new),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.retained.is_some()
    }

    /// Turn retention on with a brand new empty Scope
    ///
    /// Any previously retained Scope is discarded, even if retention was
    /// already on.
    pub fn enable(&mut self) {
        debug!("scope retention enabled");
        self.retained = Some(Scope::new());
    }

    /// Turn retention off and drop the retained Scope
    pub fn disable(&mut self) {
        debug!("scope retention disabled");
        self.retained = None;
    }

    /// The retained Scope, if retention is on
    pub fn retained(&self) -> Option<&Scope> {
        self.retained.as_ref()
    }

    /// Scope for one invocation: the retained one, or a fresh throwaway
    pub fn lease(&mut self) -> Lease<'_> {
        match self.retained.as_mut() {
            Some(scope) => Lease::Retained(scope),
            None => Lease::Ephemeral(Scope::new()),
        }
    }
}

/// A Scope handed to one invocation
#[derive(Debug)]
pub enum Lease<'a> {
    Retained(&'a mut Scope),
    Ephemeral(Scope),
}

impl Lease<'_> {
    pub fn is_retained(&self) -> bool {
        matches!(self, Lease::Retained(_))
    }
}

impl Deref for Lease<'_> {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        match self {
            Lease::Retained(scope) => scope,
            Lease::Ephemeral(scope) => scope,
        }
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        match self {
            Lease::Retained(scope) => scope,
            Lease::Ephemeral(scope) => scope,
        }
    }
}

/* ===================== Scope Guard ===================== */

/// Injects argument bindings into a Scope and removes them again on drop
///
/// Dropping happens on completion, on error, on cancellation and when the
/// future holding the guard is dropped mid-flight.
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    scope: &'a mut Scope,
    names: Vec<String>,
}

impl<'a> ScopeGuard<'a> {
    pub fn new(scope: &'a mut Scope, bindings: Bindings) -> Self {
        let names = bindings.keys().cloned().collect();
        scope.update(bindings);
        Self { scope, names }
    }

    /// Also remove `name` when the guard drops
    pub fn track(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn tracked(&self) -> &[String] {
        &self.names
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        self.scope
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.clear_intersection(&self.names);
    }
}
