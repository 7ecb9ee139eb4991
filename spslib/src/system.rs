//! Space systems and GEMS devices as built from the catalog

use std::collections::BTreeMap;
use std::sync::Arc;

use spslibgs::{Parameter, Pattern, SpsResult};

use crate::commands::Command;
use crate::directives::Directive;
use crate::handle::HandleCore;

/// Names passing a start-anchored regular expression. An empty expression
/// passes everything.
pub fn filter_names<'a, I>(names: I, regexp: &str) -> SpsResult<Vec<String>>
where
    I: IntoIterator<Item = &'a String>,
{
    if regexp.is_empty() {
        return Ok(names.into_iter().cloned().collect());
    }
    let pattern = Pattern::new(regexp)?;
    Ok(names
        .into_iter()
        .filter(|name| pattern.matches(name))
        .cloned()
        .collect())
}

/// A spacecraft with its telemetry parameters and command catalog
#[derive(Debug)]
pub struct SpaceSystem {
    name: String,
    parameters: BTreeMap<String, Arc<Parameter>>,
    commands: BTreeMap<String, Arc<Command>>,
}

impl SpaceSystem {
    pub fn new(
        name: impl Into<String>,
        parameters: BTreeMap<String, Arc<Parameter>>,
        commands: BTreeMap<String, Arc<Command>>,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            commands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &BTreeMap<String, Arc<Parameter>> {
        &self.parameters
    }

    pub fn commands(&self) -> &BTreeMap<String, Arc<Command>> {
        &self.commands
    }

    pub fn lookup_parameter(&self, name: &str) -> Option<Arc<Parameter>> {
        self.parameters.get(name).cloned()
    }

    pub fn lookup_command(&self, name: &str) -> Option<Arc<Command>> {
        self.commands.get(name).cloned()
    }

    /// Point every parameter and command at `link`
    pub(crate) fn store_link(&self, link: &Arc<HandleCore>) {
        for parameter in self.parameters.values() {
            parameter.set_owner(link.reference().clone());
        }
        for command in self.commands.values() {
            command.set_owner(link.clone());
        }
    }
}

/// A piece of ground equipment with its parameters and directives
#[derive(Debug)]
pub struct Device {
    name: String,
    parameters: BTreeMap<String, Arc<Parameter>>,
    directives: BTreeMap<String, Arc<Directive>>,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        parameters: BTreeMap<String, Arc<Parameter>>,
        directives: BTreeMap<String, Arc<Directive>>,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            directives,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &BTreeMap<String, Arc<Parameter>> {
        &self.parameters
    }

    pub fn directives(&self) -> &BTreeMap<String, Arc<Directive>> {
        &self.directives
    }

    pub fn lookup_parameter(&self, name: &str) -> Option<Arc<Parameter>> {
        self.parameters.get(name).cloned()
    }

    pub fn lookup_directive(&self, name: &str) -> Option<Arc<Directive>> {
        self.directives.get(name).cloned()
    }

    /// Point every parameter and directive at `device`
    pub(crate) fn store_device(&self, device: &Arc<HandleCore>) {
        for parameter in self.parameters.values() {
            parameter.set_owner(device.reference().clone());
        }
        for directive in self.directives.values() {
            directive.set_owner(device.clone());
        }
    }
}
