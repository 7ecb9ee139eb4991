//! Dispatch boundary between the procedure API and the ground system

use log::info;
use std::collections::BTreeMap;
use std::sync::Mutex;

use spslibgs::{lock, ArgumentMap, FlagMap, HandleRef, LinkState, SpsResult, Value};

/// Connection from handles to the ground system.
///
/// Every command, directive and GEMS request leaves the API through one of
/// these calls. Nothing here defines a wire format.
pub trait Transport: Send + Sync {
    /// Dispatch a command or directive named `target` through `destination`
    fn send(
        &self,
        destination: &HandleRef,
        target: &str,
        arguments: &ArgumentMap,
        flags: &FlagMap,
    ) -> SpsResult<()>;

    /// Current state of the link behind `destination`
    fn state(&self, destination: &HandleRef) -> LinkState;

    /// Poll a device for fresh parameter values. Names the device does not
    /// report are left out of the result.
    fn get(&self, device: &HandleRef, parameters: &[String]) -> SpsResult<BTreeMap<String, Value>>;

    /// Write parameter values to a device
    fn set(&self, device: &HandleRef, values: &ArgumentMap) -> SpsResult<()>;
}

/// Transport that only logs what it is asked to do. Links are always up
/// and polls return nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn send(
        &self,
        destination: &HandleRef,
        target: &str,
        arguments: &ArgumentMap,
        flags: &FlagMap,
    ) -> SpsResult<()> {
        info!("Sending {} to {}", target, destination);
        if !arguments.is_empty() {
            info!("  arguments: {}", serde_json::to_string(arguments)?);
        }
        if !flags.is_empty() {
            info!("  flags: {}", serde_json::to_string(flags)?);
        }
        Ok(())
    }

    fn state(&self, _destination: &HandleRef) -> LinkState {
        LinkState::Up
    }

    fn get(&self, device: &HandleRef, parameters: &[String]) -> SpsResult<BTreeMap<String, Value>> {
        info!("Getting {} parameters: {}", device.name, parameters.join(" "));
        Ok(BTreeMap::new())
    }

    fn set(&self, device: &HandleRef, values: &ArgumentMap) -> SpsResult<()> {
        info!("Setting {} parameters: {}", device.name, serde_json::to_string(values)?);
        Ok(())
    }
}

/// One call seen by a `RecordingTransport`
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Send {
        destination: HandleRef,
        target: String,
        arguments: ArgumentMap,
        flags: FlagMap,
    },
    Get {
        device: HandleRef,
        parameters: Vec<String>,
    },
    Set {
        device: HandleRef,
        values: ArgumentMap,
    },
}

/// Transport that keeps every call for later inspection and answers polls
/// from a table of canned readings.
#[derive(Debug)]
pub struct RecordingTransport {
    dispatches: Mutex<Vec<Dispatch>>,
    readings: Mutex<BTreeMap<String, Value>>,
    state: Mutex<LinkState>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            dispatches: Mutex::new(Vec::new()),
            readings: Mutex::new(BTreeMap::new()),
            state: Mutex::new(LinkState::Up),
        }
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far, oldest first
    pub fn dispatches(&self) -> Vec<Dispatch> {
        lock(&self.dispatches).clone()
    }

    /// Only the `Send` calls, as (target, arguments, flags)
    pub fn sent(&self) -> Vec<(String, ArgumentMap, FlagMap)> {
        lock(&self.dispatches)
            .iter()
            .filter_map(|dispatch| match dispatch {
                Dispatch::Send {
                    target,
                    arguments,
                    flags,
                    ..
                } => Some((target.clone(), arguments.clone(), flags.clone())),
                _ => None,
            })
            .collect()
    }

    /// Value to report the next time `name` is polled
    pub fn set_reading(&self, name: impl Into<String>, value: impl Into<Value>) {
        lock(&self.readings).insert(name.into(), value.into());
    }

    pub fn set_state(&self, state: LinkState) {
        *lock(&self.state) = state;
    }
}

impl Transport for RecordingTransport {
    fn send(
        &self,
        destination: &HandleRef,
        target: &str,
        arguments: &ArgumentMap,
        flags: &FlagMap,
    ) -> SpsResult<()> {
        lock(&self.dispatches).push(Dispatch::Send {
            destination: destination.clone(),
            target: target.to_string(),
            arguments: arguments.clone(),
            flags: flags.clone(),
        });
        Ok(())
    }

    fn state(&self, _destination: &HandleRef) -> LinkState {
        *lock(&self.state)
    }

    fn get(&self, device: &HandleRef, parameters: &[String]) -> SpsResult<BTreeMap<String, Value>> {
        lock(&self.dispatches).push(Dispatch::Get {
            device: device.clone(),
            parameters: parameters.to_vec(),
        });
        let readings = lock(&self.readings);
        Ok(parameters
            .iter()
            .filter_map(|name| readings.get(name).map(|value| (name.clone(), value.clone())))
            .collect())
    }

    fn set(&self, device: &HandleRef, values: &ArgumentMap) -> SpsResult<()> {
        lock(&self.dispatches).push(Dispatch::Set {
            device: device.clone(),
            values: values.clone(),
        });
        Ok(())
    }
}
