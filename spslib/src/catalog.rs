//! Registry of the space systems and GEMS devices known to a process

use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use spslibgs::{lock, HandleId, HandleKind, HandleRef, SpsResult};

use crate::gems::GemsDevice;
use crate::handle::HandleCore;
use crate::links::Link;
use crate::loader::{find_catalog, parse_catalog, CatalogDocument, CatalogEntry};
use crate::system::{filter_names, Device, SpaceSystem};
use crate::transport::Transport;

/// Name tables for systems and devices, plus the transport every handle
/// created against them dispatches through.
pub struct Catalog {
    transport: Arc<dyn Transport>,
    systems: Mutex<BTreeMap<String, Arc<SpaceSystem>>>,
    devices: Mutex<BTreeMap<String, Arc<Device>>>,
    next_handle: AtomicU64,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            systems: Mutex::new(BTreeMap::new()),
            devices: Mutex::new(BTreeMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Find, parse and install the catalog document. `path` is tried first,
    /// then the conventional locations.
    pub fn load(path: Option<&Path>, transport: Arc<dyn Transport>) -> SpsResult<Self> {
        let path = find_catalog(path)?;
        info!("Loading catalog from {}", path.display());
        let text = fs::read_to_string(&path)?;
        let document = parse_catalog(&text)?;
        Ok(Self::from_document(document, transport))
    }

    pub fn from_document(document: CatalogDocument, transport: Arc<dyn Transport>) -> Self {
        let catalog = Self::new(transport);
        catalog.install(document);
        catalog
    }

    /// Register every entry of `document`, adopting each through a fresh
    /// handle so its commands and directives are immediately sendable
    pub fn install(&self, document: CatalogDocument) {
        for entry in document.entries {
            match entry {
                CatalogEntry::System(system) => {
                    Link::adopt(self, Arc::new(system));
                }
                CatalogEntry::Device(device) => {
                    GemsDevice::adopt(self, Arc::new(device));
                }
            }
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn system(&self, name: &str) -> Option<Arc<SpaceSystem>> {
        lock(&self.systems).get(name).cloned()
    }

    pub fn device(&self, name: &str) -> Option<Arc<Device>> {
        lock(&self.devices).get(name).cloned()
    }

    pub(crate) fn register_system(&self, system: Arc<SpaceSystem>) {
        let name = system.name().to_string();
        if let Some(previous) = lock(&self.systems).insert(name, system.clone()) {
            if !Arc::ptr_eq(&previous, &system) {
                warn!("Replacing SpaceSystem {}", system.name());
            }
        }
    }

    pub(crate) fn register_device(&self, device: Arc<Device>) {
        let name = device.name().to_string();
        if let Some(previous) = lock(&self.devices).insert(name, device.clone()) {
            if !Arc::ptr_eq(&previous, &device) {
                warn!("Replacing GemsDevice {}", device.name());
            }
        }
    }

    /// Allocate a handle identity for `name`
    pub(crate) fn new_handle(&self, kind: HandleKind, name: &str) -> Arc<HandleCore> {
        let id = HandleId(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let reference = HandleRef {
            id,
            kind,
            name: name.to_string(),
        };
        Arc::new(HandleCore::new(reference, self.transport.clone()))
    }

    /// Names of the registered space systems
    pub fn links(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(lock(&self.systems).keys(), regexp)
    }

    pub fn active_links(&self) -> BTreeMap<String, Arc<SpaceSystem>> {
        lock(&self.systems).clone()
    }

    /// Names of the registered GEMS devices
    pub fn equipment(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(lock(&self.devices).keys(), regexp)
    }

    pub fn active_equipment(&self) -> BTreeMap<String, Arc<Device>> {
        lock(&self.devices).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DATASET: &str = r#"
- !SpaceSystem
  name: SAT1
  ParameterSet:
    - MomentumWheelSpeed: [int, {units: rpm}]
  CommandSet:
    - MomentumWheelOn: []
- !SpaceSystem
  name: SAT2
  ParameterSet:
    - BatteryVoltage: [double, {}]
  CommandSet:
    - Reset: []
- !GemsDevice
  name: FE1
  ParameterSet:
    - Syncword: [hexBitField, {}]
  DirectiveSet:
    - ChangeSync:
      - Syncword: [hexBitField, {}]
"#;

    #[test]
    fn test_load_registers_everything() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(DATASET.as_bytes()).unwrap();

        let catalog = Catalog::load(Some(file.path()), Arc::new(RecordingTransport::new())).unwrap();
        assert_eq!(catalog.links("").unwrap(), vec!["SAT1", "SAT2"]);
        assert_eq!(catalog.links("SAT2").unwrap(), vec!["SAT2"]);
        assert_eq!(catalog.equipment("").unwrap(), vec!["FE1"]);
        assert_eq!(catalog.active_links().len(), 2);
        assert!(catalog.active_equipment().contains_key("FE1"));
    }

    #[test]
    fn test_installed_commands_are_sendable() {
        let transport = Arc::new(RecordingTransport::new());
        let catalog = Catalog::from_document(parse_catalog(DATASET).unwrap(), transport.clone());

        let system = catalog.system("SAT1").unwrap();
        let command = system.lookup_command("MomentumWheelOn").unwrap();
        command.send().unwrap();
        assert_eq!(transport.sent()[0].0, "MomentumWheelOn");

        let device = catalog.device("FE1").unwrap();
        let directive = device.lookup_directive("ChangeSync").unwrap();
        assert_eq!(directive.device().map(|d| d.kind), Some(HandleKind::GemsDevice));
    }

    #[test]
    fn test_handle_ids_are_unique() {
        let catalog = Catalog::new(Arc::new(RecordingTransport::new()));
        let first = catalog.new_handle(HandleKind::Link, "SAT1");
        let second = catalog.new_handle(HandleKind::Link, "SAT1");
        assert_ne!(first.reference().id, second.reference().id);
    }

    #[test]
    fn test_readopting_same_system_keeps_one_object() {
        let catalog = Catalog::from_document(
            parse_catalog(DATASET).unwrap(),
            Arc::new(RecordingTransport::new()),
        );
        let system = catalog.system("SAT1").unwrap();

        let first = Link::adopt(&catalog, system.clone());
        let second = Link::open(&catalog, "SAT1").unwrap();
        assert!(Arc::ptr_eq(first.system(), second.system()));
        assert_eq!(catalog.active_links().len(), 2);

        let speed = system.lookup_parameter("MomentumWheelSpeed").unwrap();
        let command = system.lookup_command("MomentumWheelOn").unwrap();
        assert_eq!(speed.owner().as_ref(), Some(second.handle()));
        assert_eq!(command.link().as_ref(), Some(second.handle()));
        assert_ne!(speed.owner().as_ref(), Some(first.handle()));
    }
}
