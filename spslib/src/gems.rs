//! Ground equipment (GEMS) devices

use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

use spslibgs::{ArgumentMap, FlagMap, HandleKind, HandleRef, Parameter, SpsError, SpsResult};

use crate::catalog::Catalog;
use crate::directives::Directive;
use crate::handle::HandleCore;
use crate::system::{filter_names, Device};

/// Connection to one piece of ground equipment
#[derive(Debug, Clone)]
pub struct GemsDevice {
    core: Arc<HandleCore>,
    device: Arc<Device>,
}

impl GemsDevice {
    /// Register `device` and bind its parameters and directives to a new
    /// handle
    pub fn adopt(catalog: &Catalog, device: Arc<Device>) -> Self {
        catalog.register_device(device.clone());
        Self::attach(catalog, device)
    }

    /// Connect to an already registered device
    pub fn open(catalog: &Catalog, name: &str) -> SpsResult<Self> {
        let device = catalog
            .device(name)
            .ok_or_else(|| SpsError::IllegalLink(format!("GemsDevice {} is not defined", name)))?;
        Ok(Self::attach(catalog, device))
    }

    fn attach(catalog: &Catalog, device: Arc<Device>) -> Self {
        let core = catalog.new_handle(HandleKind::GemsDevice, device.name());
        device.store_device(&core);
        Self { core, device }
    }

    pub fn handle(&self) -> &HandleRef {
        self.core.reference()
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Poll the device for the named parameters and store what it reports.
    /// Every valid reading is stored; the first rejected one is returned as
    /// the error.
    pub fn get(&self, names: &[&str]) -> SpsResult<()> {
        if names.is_empty() {
            return Err(SpsError::Gems("No Gems Parameters specified on get".to_string()));
        }
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        info!("Getting {} parameters: {}", self.device.name(), names.join(" "));

        let mut first_error = None;
        for (name, value) in self.core.get(&names)? {
            match self.device.lookup_parameter(&name) {
                Some(parameter) => {
                    if let Err(e) = parameter.set_reading(value) {
                        warn!("{} reading rejected: {}", self.device.name(), e);
                        first_error.get_or_insert(e);
                    }
                }
                None => debug!("{} reported unknown parameter {}", self.device.name(), name),
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Write parameter values to the device
    pub fn set(&self, values: &ArgumentMap) -> SpsResult<()> {
        if values.is_empty() {
            return Err(SpsError::Gems("No Gems Parameters specified on set".to_string()));
        }
        info!("Setting {} parameters: {}", self.device.name(), values.len());
        self.core.set(values)
    }

    pub fn lookup_directive(&self, name: &str) -> Option<Arc<Directive>> {
        self.device.lookup_directive(name)
    }

    pub fn directives(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(self.device.directives().keys(), regexp)
    }

    pub fn lookup_parameter(&self, name: &str) -> Option<Arc<Parameter>> {
        self.device.lookup_parameter(name)
    }

    pub fn parameters(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(self.device.parameters().keys(), regexp)
    }

    /// Send a catalog directive through the device it is bound to
    pub fn send(&self, directive: &Directive) -> SpsResult<()> {
        directive.send()
    }

    /// Send a directive by name without consulting the catalog
    pub fn send_named(&self, name: &str, arguments: &ArgumentMap) -> SpsResult<()> {
        self.core.dispatch(name, arguments, &FlagMap::new())
    }
}

impl fmt::Display for GemsDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle())
    }
}
