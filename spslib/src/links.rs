//! Links and downlinks
//!
//! A `Link` is an uplink/downlink path to a space system. A `Downlink`
//! carries telemetry only and refuses anything that would command.

use std::fmt;
use std::sync::Arc;

use spslibgs::{ArgumentMap, FlagMap, HandleKind, HandleRef, LinkState, Parameter, SpsError, SpsResult};

use crate::catalog::Catalog;
use crate::commands::{Command, CommandRequest};
use crate::handle::HandleCore;
use crate::system::{filter_names, SpaceSystem};

fn attach(catalog: &Catalog, system: &Arc<SpaceSystem>, kind: HandleKind) -> Arc<HandleCore> {
    let core = catalog.new_handle(kind, system.name());
    system.store_link(&core);
    core
}

fn linked(catalog: &Catalog, name: &str) -> SpsResult<Arc<SpaceSystem>> {
    catalog
        .system(name)
        .ok_or_else(|| SpsError::IllegalLink(format!("SpaceSystem {} is not linked", name)))
}

/// Uplink/downlink path for a space system
#[derive(Debug, Clone)]
pub struct Link {
    core: Arc<HandleCore>,
    system: Arc<SpaceSystem>,
}

impl Link {
    /// Register `system` and bind its parameters and commands to a new link
    pub fn adopt(catalog: &Catalog, system: Arc<SpaceSystem>) -> Self {
        catalog.register_system(system.clone());
        let core = attach(catalog, &system, HandleKind::Link);
        Self { core, system }
    }

    /// Link to an already registered system. Its parameters and commands
    /// are rebound to the new link.
    pub fn open(catalog: &Catalog, name: &str) -> SpsResult<Self> {
        let system = linked(catalog, name)?;
        let core = attach(catalog, &system, HandleKind::Link);
        Ok(Self { core, system })
    }

    pub fn handle(&self) -> &HandleRef {
        self.core.reference()
    }

    pub fn system(&self) -> &Arc<SpaceSystem> {
        &self.system
    }

    /// Send a catalog command through the link it is bound to
    pub fn send(&self, command: &Command) -> SpsResult<()> {
        command.send()
    }

    pub fn send_request(&self, request: &CommandRequest) -> SpsResult<()> {
        request.send()
    }

    /// Send a command by name. Neither the name nor the arguments are
    /// checked against the catalog.
    pub fn send_named(&self, name: &str, arguments: &ArgumentMap, flags: &FlagMap) -> SpsResult<()> {
        self.core.dispatch(name, arguments, flags)
    }

    pub fn lookup_parameter(&self, name: &str) -> Option<Arc<Parameter>> {
        self.system.lookup_parameter(name)
    }

    /// Parameter names passing the start-anchored filter
    pub fn parameters(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(self.system.parameters().keys(), regexp)
    }

    pub fn lookup_command(&self, name: &str) -> Option<Arc<Command>> {
        self.system.lookup_command(name)
    }

    /// Command names passing the start-anchored filter
    pub fn commands(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(self.system.commands().keys(), regexp)
    }

    pub fn create_command_request(&self, command: Arc<Command>) -> CommandRequest {
        CommandRequest::new(command)
    }

    pub fn state(&self) -> LinkState {
        self.core.state()
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle())
    }
}

/// Telemetry-only path for a space system
#[derive(Debug, Clone)]
pub struct Downlink {
    core: Arc<HandleCore>,
    system: Arc<SpaceSystem>,
}

impl Downlink {
    pub fn adopt(catalog: &Catalog, system: Arc<SpaceSystem>) -> Self {
        catalog.register_system(system.clone());
        let core = attach(catalog, &system, HandleKind::Downlink);
        Self { core, system }
    }

    pub fn open(catalog: &Catalog, name: &str) -> SpsResult<Self> {
        let system = linked(catalog, name)?;
        let core = attach(catalog, &system, HandleKind::Downlink);
        Ok(Self { core, system })
    }

    pub fn handle(&self) -> &HandleRef {
        self.core.reference()
    }

    pub fn system(&self) -> &Arc<SpaceSystem> {
        &self.system
    }

    fn no_commanding(&self) -> SpsError {
        SpsError::IllegalLink(format!("{} does not support commanding", self.system.name()))
    }

    pub fn send(&self, _command: &Command) -> SpsResult<()> {
        Err(self.no_commanding())
    }

    pub fn send_named(&self, _name: &str, _arguments: &ArgumentMap, _flags: &FlagMap) -> SpsResult<()> {
        Err(self.no_commanding())
    }

    pub fn lookup_command(&self, _name: &str) -> SpsResult<Arc<Command>> {
        Err(self.no_commanding())
    }

    pub fn commands(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(self.system.commands().keys(), regexp)
    }

    pub fn lookup_parameter(&self, name: &str) -> Option<Arc<Parameter>> {
        self.system.lookup_parameter(name)
    }

    pub fn parameters(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(self.system.parameters().keys(), regexp)
    }

    pub fn state(&self) -> LinkState {
        self.core.state()
    }
}

impl fmt::Display for Downlink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle())
    }
}
