//! GEMS directives
//!
//! Directives are to ground equipment what commands are to a spacecraft: a
//! name plus a set of parameter values that change device configuration.

use std::fmt;
use std::sync::{Arc, Mutex};

use spslibgs::{lock, ArgumentMap, FlagMap, HandleRef, Parameter, SpsError, SpsResult, Value};

use crate::commands::ArgumentSet;
use crate::handle::HandleCore;

#[derive(Debug)]
pub struct Directive {
    name: String,
    arguments: ArgumentSet,
    owner: Mutex<Option<Arc<HandleCore>>>,
}

impl Directive {
    pub fn new(name: impl Into<String>, arguments: ArgumentSet) -> Self {
        Self {
            name: name.into(),
            arguments,
            owner: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &ArgumentSet {
        &self.arguments
    }

    pub fn lookup_argument(&self, name: &str) -> Option<Arc<Parameter>> {
        self.arguments.get(name).cloned()
    }

    /// Set parameter values from name/value pairs. Like commands, values
    /// applied before a failure are kept.
    pub fn set_values<I, K, V>(&self, values: I) -> SpsResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.arguments.apply(values, |name| {
            format!("GEMS Parameter {} not defined for {}", name, self.name)
        })
    }

    pub fn values(&self) -> ArgumentMap {
        self.arguments.values()
    }

    /// Device handle the directive is currently bound to
    pub fn device(&self) -> Option<HandleRef> {
        lock(&self.owner).as_ref().map(|owner| owner.reference().clone())
    }

    pub(crate) fn set_owner(&self, owner: Arc<HandleCore>) {
        *lock(&self.owner) = Some(owner);
    }

    pub fn send(&self) -> SpsResult<()> {
        let owner = lock(&self.owner).clone().ok_or_else(|| {
            SpsError::Gems(format!("Directive {} is not bound to a device", self.name))
        })?;
        owner.dispatch(&self.name, &self.values(), &FlagMap::new())
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Directive('{}')", self.name)
    }
}
