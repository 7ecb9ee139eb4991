//! Shared core of Link, Downlink and GemsDevice handles

use log::info;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use spslibgs::{ArgumentMap, FlagMap, HandleRef, LinkState, SpsError, SpsResult, Value};

use crate::transport::Transport;

/// Identity of a handle plus the transport it dispatches through.
///
/// Commands and directives hold an `Arc` to the core of the handle that
/// last adopted their system or device, and send through it.
pub struct HandleCore {
    reference: HandleRef,
    transport: Arc<dyn Transport>,
}

impl HandleCore {
    pub(crate) fn new(reference: HandleRef, transport: Arc<dyn Transport>) -> Self {
        Self {
            reference,
            transport,
        }
    }

    pub fn reference(&self) -> &HandleRef {
        &self.reference
    }

    /// Forward a command or directive to the transport. Downlinks refuse.
    pub fn dispatch(&self, target: &str, arguments: &ArgumentMap, flags: &FlagMap) -> SpsResult<()> {
        if !self.reference.kind.can_command() {
            return Err(SpsError::IllegalLink(format!(
                "{} does not support commanding",
                self.reference.name
            )));
        }
        info!("Sending {} to {}", target, self.reference);
        self.transport.send(&self.reference, target, arguments, flags)
    }

    pub fn state(&self) -> LinkState {
        self.transport.state(&self.reference)
    }

    pub(crate) fn get(&self, parameters: &[String]) -> SpsResult<BTreeMap<String, Value>> {
        self.transport.get(&self.reference, parameters)
    }

    pub(crate) fn set(&self, values: &ArgumentMap) -> SpsResult<()> {
        self.transport.set(&self.reference, values)
    }
}

impl fmt::Debug for HandleCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCore")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use spslibgs::{HandleId, HandleKind};

    fn core(kind: HandleKind, transport: Arc<RecordingTransport>) -> HandleCore {
        HandleCore::new(
            HandleRef {
                id: HandleId(1),
                kind,
                name: "SAT1".to_string(),
            },
            transport,
        )
    }

    #[test]
    fn test_link_dispatches() {
        let transport = Arc::new(RecordingTransport::new());
        let link = core(HandleKind::Link, transport.clone());
        link.dispatch("MomentumWheelOn", &ArgumentMap::new(), &FlagMap::new())
            .unwrap();
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_downlink_refuses_dispatch() {
        let transport = Arc::new(RecordingTransport::new());
        let downlink = core(HandleKind::Downlink, transport.clone());
        let err = downlink
            .dispatch("MomentumWheelOn", &ArgumentMap::new(), &FlagMap::new())
            .unwrap_err();
        assert!(matches!(err, SpsError::IllegalLink(_)));
        assert!(transport.sent().is_empty());
    }
}
