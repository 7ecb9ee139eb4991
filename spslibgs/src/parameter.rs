//! Parameters are telemetry items for spacecraft and ground equipment, or
//! items defined by the ground system itself.

use log::debug;
use std::fmt;
use std::sync::Mutex;

use crate::error::{SpsError, SpsResult};
use crate::kinds::DataKind;
use crate::restriction::Restriction;
use crate::time::SpecificTime;
use crate::types::{lock, HandleRef, Value};

/// Last reported value of a parameter
#[derive(Debug, Clone, Default)]
struct Sample {
    value: Option<Value>,
    raw: Option<Value>,
    time: Option<SpecificTime>,
}

/// A named, typed and restricted value cell.
///
/// The value and its timestamp are updated together under one lock, so a
/// reader never sees one without the other.
#[derive(Debug)]
pub struct Parameter {
    name: String,
    kind: DataKind,
    restrictions: Vec<Restriction>,
    description: Option<String>,
    units: Option<String>,
    multiplicity: Option<String>,
    writable: bool,
    sample: Mutex<Sample>,
    owner: Mutex<Option<HandleRef>>,
}

impl Parameter {
    /// Create a parameter of the named data kind. Fails with
    /// `UndefinedType` if the kind is not one of the registered kinds.
    pub fn new(name: impl Into<String>, kind: &str) -> SpsResult<Self> {
        let kind: DataKind = kind.parse()?;
        Ok(Self::with_kind(name, kind))
    }

    pub fn with_kind(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            kind,
            restrictions: Vec::new(),
            description: None,
            units: None,
            multiplicity: None,
            writable: true,
            sample: Mutex::new(Sample::default()),
            owner: Mutex::new(None),
        }
    }

    pub fn with_restrictions(mut self, restrictions: Vec<Restriction>) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_multiplicity(mut self, multiplicity: impl Into<String>) -> Self {
        self.multiplicity = Some(multiplicity.into());
        self
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn restrictions(&self) -> &[Restriction] {
        &self.restrictions
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn multiplicity(&self) -> Option<&str> {
        self.multiplicity.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Current value, or `None` if nothing has been reported
    pub fn value(&self) -> Option<Value> {
        lock(&self.sample).value.clone()
    }

    /// Current raw value, or `None` if nothing has been reported
    pub fn raw(&self) -> Option<Value> {
        lock(&self.sample).raw.clone()
    }

    /// Time of the last accepted value
    pub fn time(&self) -> Option<SpecificTime> {
        lock(&self.sample).time
    }

    /// The (value, timestamp) pair
    pub fn report(&self) -> (Option<Value>, Option<SpecificTime>) {
        let sample = lock(&self.sample);
        (sample.value.clone(), sample.time)
    }

    /// Set the value after coercing it to the parameter's kind and checking
    /// every restriction in order. The first failing restriction is named in
    /// the `IllegalValue` error and nothing is changed.
    pub fn set_value(&self, value: impl Into<Value>) -> SpsResult<()> {
        let value = self.checked(value.into())?;
        let mut sample = lock(&self.sample);
        sample.value = Some(value);
        sample.time = Some(SpecificTime::now());
        Ok(())
    }

    /// Accept a reading from the ground system. The reading is checked like
    /// `set_value`; only if it passes are the raw form, the converted value
    /// and the timestamp stored together.
    pub fn set_reading(&self, raw: Value) -> SpsResult<()> {
        let value = self.checked(raw.clone())?;
        let mut sample = lock(&self.sample);
        sample.raw = Some(raw);
        sample.value = Some(value);
        sample.time = Some(SpecificTime::now());
        Ok(())
    }

    fn checked(&self, value: Value) -> SpsResult<Value> {
        let value = self
            .kind
            .coerce(value)
            .map_err(|reason| SpsError::illegal_value(&self.name, reason))?;

        if let Some(failed) = self.restrictions.iter().find(|r| !r.validate(&value)) {
            debug!("{} rejected {}: {}", self.name, value, failed);
            return Err(SpsError::illegal_value(
                &self.name,
                format!("Violates restriction {}", failed),
            ));
        }
        Ok(value)
    }

    /// Handle through which this parameter was last adopted
    pub fn owner(&self) -> Option<HandleRef> {
        lock(&self.owner).clone()
    }

    pub fn set_owner(&self, owner: HandleRef) {
        *lock(&self.owner) = Some(owner);
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = self.value() {
            return write!(f, "{}", value);
        }
        write!(f, "Parameter({}, dType={}", self.name, self.kind)?;
        if let Some(description) = &self.description {
            write!(f, ", description=\"{}\"", description)?;
        }
        if let Some(multiplicity) = &self.multiplicity {
            write!(f, ", multiplicity={}", multiplicity)?;
        }
        write!(f, ")")
    }
}
