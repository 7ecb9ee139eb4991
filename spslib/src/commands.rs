//! Commands and command requests
//!
//! A command is a named bundle of argument parameters. It is sent through
//! the handle that last adopted its space system.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use spslibgs::{
    lock, ArgumentMap, FlagMap, HandleRef, Parameter, SpecificTime, SpsError, SpsResult, Value,
};

use crate::handle::HandleCore;

/// Named argument parameters of a command or directive
#[derive(Debug, Default)]
pub struct ArgumentSet {
    arguments: BTreeMap<String, Arc<Parameter>>,
}

impl ArgumentSet {
    pub fn new(arguments: BTreeMap<String, Arc<Parameter>>) -> Self {
        Self { arguments }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Parameter>> {
        self.arguments.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.arguments.keys()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Apply values in the order given. Each value goes through the full
    /// restriction chain of its argument. The first unknown name or illegal
    /// value stops the call, but values applied before it stay applied.
    pub(crate) fn apply<I, K, V>(&self, values: I, unknown: impl Fn(&str) -> String) -> SpsResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in values {
            let name = name.as_ref();
            match self.arguments.get(name) {
                Some(argument) => argument.set_value(value)?,
                None => return Err(SpsError::UnknownParameter(unknown(name))),
            }
        }
        Ok(())
    }

    /// Current value of every argument
    pub fn values(&self) -> ArgumentMap {
        self.arguments
            .iter()
            .map(|(name, argument)| (name.clone(), argument.value()))
            .collect()
    }
}

/// Command from a space system's command catalog
#[derive(Debug)]
pub struct Command {
    name: String,
    arguments: ArgumentSet,
    owner: Mutex<Option<Arc<HandleCore>>>,
}

impl Command {
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

    /// Set argument values from name/value pairs.
    ///
    /// Not transactional: if a later pair fails, earlier pairs keep their
    /// new values.
    pub fn set_values<I, K, V>(&self, values: I) -> SpsResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.arguments.apply(values, |name| {
            format!("Specified command argument {} not defined for {}", name, self.name)
        })
    }

    pub fn values(&self) -> ArgumentMap {
        self.arguments.values()
    }

    /// Handle the command is currently bound to
    pub fn link(&self) -> Option<HandleRef> {
        lock(&self.owner).as_ref().map(|owner| owner.reference().clone())
    }

    pub(crate) fn set_owner(&self, owner: Arc<HandleCore>) {
        *lock(&self.owner) = Some(owner);
    }

    fn owner(&self) -> SpsResult<Arc<HandleCore>> {
        lock(&self.owner)
            .clone()
            .ok_or_else(|| SpsError::IllegalLink(format!("Command {} is not bound to a link", self.name)))
    }

    /// Send the command with its current argument values
    pub fn send(&self) -> SpsResult<()> {
        self.send_with_flags(&FlagMap::new())
    }

    pub fn send_with_flags(&self, flags: &FlagMap) -> SpsResult<()> {
        self.owner()?.dispatch(&self.name, &self.values(), flags)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command('{}')", self.name)
    }
}

/// A command plus the request flags that modify how it is released
#[derive(Debug, Clone)]
pub struct CommandRequest {
    command: Arc<Command>,
    pub release_at: Option<SpecificTime>,
    pub pre_authorized: bool,
    pub no_encryption: bool,
    pub ignore_constraints: bool,
    pub ignore_receipt: bool,
    pub ignore_verification: bool,
}

impl CommandRequest {
    pub fn new(command: Arc<Command>) -> Self {
        Self {
            command,
            release_at: None,
            pre_authorized: false,
            no_encryption: false,
            ignore_constraints: false,
            ignore_receipt: false,
            ignore_verification: false,
        }
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// Flags that differ from their defaults, under their catalog names
    pub fn flags(&self) -> FlagMap {
        let mut flags = FlagMap::new();
        if let Some(release_at) = self.release_at {
            flags.insert("releaseAt".to_string(), Value::Time(release_at));
        }
        let switches = [
            ("preAuthorized", self.pre_authorized),
            ("noEncryption", self.no_encryption),
            ("ignoreConstraints", self.ignore_constraints),
            ("ignoreReceipt", self.ignore_receipt),
            ("ignoreVerification", self.ignore_verification),
        ];
        for (name, set) in switches {
            if set {
                flags.insert(name.to_string(), Value::Boolean(true));
            }
        }
        flags
    }

    /// Send the command's current arguments together with the set flags
    pub fn send(&self) -> SpsResult<()> {
        self.command.send_with_flags(&self.flags())
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandRequest('{}')", self.command.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use spslibgs::{HandleId, HandleKind, Restriction};

    fn bounded(name: &str) -> Arc<Parameter> {
        Arc::new(Parameter::new(name, "int").unwrap().with_restrictions(vec![
            Restriction::MinInclusive(Value::from(-10000)),
            Restriction::MaxInclusive(Value::from(10000)),
        ]))
    }

    fn slew_command() -> Command {
        let mut arguments = BTreeMap::new();
        for name in ["Roll", "Pitch", "Yaw"] {
            arguments.insert(name.to_string(), bounded(name));
        }
        Command::new("Slew", ArgumentSet::new(arguments))
    }

    fn bind(command: &Command, transport: Arc<RecordingTransport>) {
        let core = HandleCore::new(
            HandleRef {
                id: HandleId(1),
                kind: HandleKind::Link,
                name: "SAT1".to_string(),
            },
            transport,
        );
        command.set_owner(Arc::new(core));
    }

    #[test]
    fn test_set_values_is_not_transactional() {
        let command = slew_command();
        let err = command
            .set_values([
                ("Roll", Value::from(10)),
                ("Heading", Value::from(20)),
                ("Yaw", Value::from(30)),
            ])
            .unwrap_err();

        match err {
            SpsError::UnknownParameter(message) => {
                assert_eq!(message, "Specified command argument Heading not defined for Slew")
            }
            other => panic!("unexpected error {:?}", other),
        }
        // Roll was applied before the failure, Yaw never was
        let values = command.values();
        assert_eq!(values["Roll"], Some(Value::Integer(10)));
        assert_eq!(values["Yaw"], None);
    }

    #[test]
    fn test_set_values_stops_at_illegal_value() {
        let command = slew_command();
        let err = command
            .set_values([("Pitch", 5), ("Roll", 20000), ("Yaw", 7)])
            .unwrap_err();
        assert!(matches!(err, SpsError::IllegalValue { .. }));
        let values = command.values();
        assert_eq!(values["Pitch"], Some(Value::Integer(5)));
        assert_eq!(values["Roll"], None);
        assert_eq!(values["Yaw"], None);
    }

    #[test]
    fn test_unbound_command_cannot_send() {
        let command = slew_command();
        assert_eq!(command.link(), None);
        assert!(matches!(command.send(), Err(SpsError::IllegalLink(_))));
    }

    #[test]
    fn test_send_gathers_argument_values() {
        let transport = Arc::new(RecordingTransport::new());
        let command = slew_command();
        bind(&command, transport.clone());
        command.set_values([("Roll", 1), ("Pitch", 2)]).unwrap();
        command.send().unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let (target, arguments, flags) = &sent[0];
        assert_eq!(target, "Slew");
        assert_eq!(arguments.len(), 3);
        assert_eq!(arguments["Pitch"], Some(Value::Integer(2)));
        assert_eq!(arguments["Yaw"], None);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_request_sends_only_set_flags() {
        let transport = Arc::new(RecordingTransport::new());
        let command = Arc::new(slew_command());
        bind(&command, transport.clone());

        let mut request = CommandRequest::new(command.clone());
        assert!(request.flags().is_empty());
        request.pre_authorized = true;
        request.ignore_receipt = true;
        let release = SpecificTime::new(2024, 4, 25, 12, 10, 0, 0).unwrap();
        request.release_at = Some(release);
        request.send().unwrap();

        let (_, _, flags) = &transport.sent()[0];
        assert_eq!(flags.len(), 3);
        assert_eq!(flags["preAuthorized"], Value::Boolean(true));
        assert_eq!(flags["ignoreReceipt"], Value::Boolean(true));
        assert_eq!(flags["releaseAt"], Value::Time(release));
        assert!(!flags.contains_key("noEncryption"));
        assert_eq!(request.to_string(), "CommandRequest('Slew')");
    }
}
