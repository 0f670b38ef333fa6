//! Signatures: the alphabet of node kinds a bigraph is built from.

use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::ids::IdGenerator;

/// A kind of node: a name, a number of ports and an activity flag.
///
/// Reactions may take place inside nodes with an active control, but never
/// inside a node with a passive one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Control {
    name: SmolStr,
    arity: usize,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl Control {
    /// Creates a new control.
    pub fn new(name: impl Into<SmolStr>, arity: usize, active: bool) -> Self {
        Self {
            name: name.into(),
            arity,
            active,
        }
    }

    /// Creates a new active control.
    pub fn active(name: impl Into<SmolStr>, arity: usize) -> Self {
        Self::new(name, arity, true)
    }

    /// Creates a new passive control.
    pub fn passive(name: impl Into<SmolStr>, arity: usize) -> Self {
        Self::new(name, arity, false)
    }

    /// The name of the control, unique within its signature.
    #[inline]
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// The number of ports of nodes with this control.
    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Whether reactions may take place inside nodes with this control.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.active { "active" } else { "passive" };
        write!(f, "{}:{}:{mode}", self.name, self.arity)
    }
}

/// An immutable set of uniquely named controls.
///
/// Two signatures are equal only if their identifiers and their sets of
/// controls are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    id: SmolStr,
    controls: IndexMap<SmolStr, Control>,
}

impl Signature {
    /// The identifier of the signature.
    #[inline]
    pub fn id(&self) -> &SmolStr {
        &self.id
    }

    /// Gets the control with the given name.
    pub fn get(&self, name: &str) -> Option<&Control> {
        self.controls.get(name)
    }

    /// Returns `true` if the signature has a control with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.controls.contains_key(name)
    }

    /// Iterates over the controls, in declaration order.
    pub fn controls(&self) -> impl ExactSizeIterator<Item = &Control> + '_ {
        self.controls.values()
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Returns `true` if the signature has no controls.
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.id)?;
        for (i, c) in self.controls.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{c}")?;
        }
        f.write_str("}")
    }
}

/// Errors raised while declaring a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SignatureError {
    /// A control with the same name has already been declared.
    #[error("Signature already has a control called {0}.")]
    DuplicateControl(SmolStr),
    /// Control names must not be empty.
    #[error("Control names must not be empty.")]
    EmptyName,
}

/// Accumulates control declarations and freezes them into a [`Signature`].
#[derive(Clone, Debug, Default)]
pub struct SignatureBuilder {
    controls: IndexMap<SmolStr, Control>,
}

impl SignatureBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a control.
    pub fn add(&mut self, control: Control) -> Result<&mut Self, SignatureError> {
        if control.name.is_empty() {
            return Err(SignatureError::EmptyName);
        }
        if self.controls.contains_key(&control.name) {
            return Err(SignatureError::DuplicateControl(control.name));
        }
        self.controls.insert(control.name.clone(), control);
        Ok(self)
    }

    /// Declares an active control.
    pub fn add_control(
        &mut self,
        name: impl Into<SmolStr>,
        arity: usize,
    ) -> Result<&mut Self, SignatureError> {
        self.add(Control::active(name, arity))
    }

    /// Declares a passive control.
    pub fn add_passive_control(
        &mut self,
        name: impl Into<SmolStr>,
        arity: usize,
    ) -> Result<&mut Self, SignatureError> {
        self.add(Control::passive(name, arity))
    }

    /// Gets a declared control.
    pub fn get(&self, name: &str) -> Option<&Control> {
        self.controls.get(name)
    }

    /// Returns `true` if a control with the given name has been declared.
    pub fn contains(&self, name: &str) -> bool {
        self.controls.contains_key(name)
    }

    /// Removes a declared control, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Control> {
        self.controls.shift_remove(name)
    }

    /// Removes every declared control.
    pub fn clear(&mut self) {
        self.controls.clear();
    }

    /// Freezes the declared controls into a signature.
    ///
    /// Without an explicit identifier a fresh one is generated, so the result
    /// differs from every other signature.
    pub fn make_signature(&self, id: Option<&str>) -> Signature {
        let id = match id {
            Some(id) => SmolStr::new(id),
            None => IdGenerator::new().fresh_name("sig"),
        };
        Signature {
            id,
            controls: self.controls.clone(),
        }
    }
}

impl TryFrom<Vec<Control>> for SignatureBuilder {
    type Error = SignatureError;

    fn try_from(controls: Vec<Control>) -> Result<Self, Self::Error> {
        let mut sb = Self::new();
        for control in controls {
            sb.add(control)?;
        }
        Ok(sb)
    }
}
