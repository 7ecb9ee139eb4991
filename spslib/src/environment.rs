//! Procedure environment
//!
//! Everything a running procedure reaches outside its own handles: the
//! catalog listings, ground-system parameters, other procedures, waits
//! bound to the environment's cancel token, and `verify`.

use log::info;
use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::{Arc, Mutex};

use spslibgs::{
    lock, Parameter, ProcedureStatus, SpecificTime, SpsError, SpsResult, TimeInterval, Value,
};

use crate::catalog::Catalog;
use crate::config::EnvironmentConfig;
use crate::gems::GemsDevice;
use crate::links::{Downlink, Link};
use crate::system::{filter_names, Device, SpaceSystem};
use crate::waits::{self, CancelToken, WaitOptions};

/// Arguments handed to a procedure, by name
pub type ProcedureArgs = BTreeMap<String, Value>;

/// Check a condition and log the caller's line. A false condition is a
/// `Verify` error the procedure may catch.
#[track_caller]
pub fn verify(condition: bool) -> SpsResult<()> {
    let line = Location::caller().line();
    info!("Verify at line {} is {}", line, condition);
    if condition {
        Ok(())
    } else {
        Err(SpsError::Verify(format!("Verify at line {} is False", line)))
    }
}

/// Current time
pub fn now() -> SpecificTime {
    SpecificTime::now()
}

/// First instant of the current day
pub fn today() -> SpecificTime {
    SpecificTime::today()
}

/// Descriptive metadata of a procedure
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Expected run time
    pub duration: Option<TimeInterval>,
    pub modified: Option<SpecificTime>,
}

impl ProcedureInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            duration: None,
            modified: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_duration(mut self, duration: TimeInterval) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_modified(mut self, modified: SpecificTime) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// An operations procedure that can be run by name
pub trait Procedure: Send + Sync {
    fn info(&self) -> ProcedureInfo;

    /// Declared arguments. Supplied values are validated against them
    /// before `invoke` is called.
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    fn invoke(&self, env: &ProcedureEnvironment, args: &ProcedureArgs) -> SpsResult<ProcedureStatus>;
}

/// Procedure implemented by the ground system itself. Invoking it only
/// logs the call.
#[derive(Debug, Clone)]
pub struct NativeProcedure {
    info: ProcedureInfo,
}

impl NativeProcedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ProcedureInfo::new(name, "1.0.0").with_description("Native Procedure"),
        }
    }
}

impl Procedure for NativeProcedure {
    fn info(&self) -> ProcedureInfo {
        self.info.clone()
    }

    fn invoke(&self, _env: &ProcedureEnvironment, args: &ProcedureArgs) -> SpsResult<ProcedureStatus> {
        info!("Invoking native procedure {}", self.info.name);
        if !args.is_empty() {
            let args: Vec<String> = args
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            info!("  with arguments ({})", args.join(", "));
        }
        Ok(ProcedureStatus::Successful)
    }
}

pub struct ProcedureEnvironment {
    catalog: Arc<Catalog>,
    wait_options: WaitOptions,
    cancel: CancelToken,
    ground_parameters: Mutex<BTreeMap<String, Arc<Parameter>>>,
    procedures: Mutex<BTreeMap<String, Arc<dyn Procedure>>>,
}

impl ProcedureEnvironment {
    pub fn new(catalog: Arc<Catalog>, config: &EnvironmentConfig) -> Self {
        Self {
            catalog,
            wait_options: config.wait_options(),
            cancel: CancelToken::new(),
            ground_parameters: Mutex::new(BTreeMap::new()),
            procedures: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Token that interrupts this environment's waits
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn link(&self, name: &str) -> SpsResult<Link> {
        Link::open(&self.catalog, name)
    }

    pub fn downlink(&self, name: &str) -> SpsResult<Downlink> {
        Downlink::open(&self.catalog, name)
    }

    pub fn gems_device(&self, name: &str) -> SpsResult<GemsDevice> {
        GemsDevice::open(&self.catalog, name)
    }

    pub fn links(&self, regexp: &str) -> SpsResult<Vec<String>> {
        self.catalog.links(regexp)
    }

    pub fn active_links(&self) -> BTreeMap<String, Arc<SpaceSystem>> {
        self.catalog.active_links()
    }

    pub fn equipment(&self, regexp: &str) -> SpsResult<Vec<String>> {
        self.catalog.equipment(regexp)
    }

    pub fn active_equipment(&self) -> BTreeMap<String, Arc<Device>> {
        self.catalog.active_equipment()
    }

    /// Add a parameter defined by the ground system itself
    pub fn register_parameter(&self, parameter: Parameter) -> Arc<Parameter> {
        let parameter = Arc::new(parameter);
        lock(&self.ground_parameters).insert(parameter.name().to_string(), parameter.clone());
        parameter
    }

    pub fn lookup_parameter(&self, name: &str) -> Option<Arc<Parameter>> {
        lock(&self.ground_parameters).get(name).cloned()
    }

    pub fn parameters(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(lock(&self.ground_parameters).keys(), regexp)
    }

    pub fn register_procedure(&self, procedure: Arc<dyn Procedure>) {
        let name = procedure.info().name;
        lock(&self.procedures).insert(name, procedure);
    }

    pub fn procedures(&self, regexp: &str) -> SpsResult<Vec<String>> {
        filter_names(lock(&self.procedures).keys(), regexp)
    }

    /// The registered procedure called `name`, or a native one
    pub fn load_procedure(&self, name: &str) -> Arc<dyn Procedure> {
        match lock(&self.procedures).get(name) {
            Some(procedure) => procedure.clone(),
            None => Arc::new(NativeProcedure::new(name)),
        }
    }

    /// Validate `supplied` against the procedure's declared arguments and
    /// invoke it
    pub fn run(&self, name: &str, supplied: &BTreeMap<String, String>) -> SpsResult<ProcedureStatus> {
        let procedure = self.load_procedure(name);
        let args = bind_arguments(procedure.as_ref(), supplied)?;
        let info = procedure.info();
        info!("Running {} version {}", info.name, info.version);
        let status = procedure.invoke(self, &args)?;
        info!("{} finished with status {}", info.name, status.code());
        Ok(status)
    }

    /// Block for `seconds`, unless the environment is cancelled
    pub fn wait(&self, seconds: f64) -> SpsResult<()> {
        let duration = std::time::Duration::try_from_secs_f64(seconds)
            .map_err(|_| SpsError::InvalidTime(format!("Wait of {} seconds is not a valid duration", seconds)))?;
        waits::wait_cancellable(duration, self.wait_options.poll_period, &self.cancel)
    }

    /// `waits::wait_for` with the configured budget and this environment's
    /// cancel token
    #[track_caller]
    pub fn wait_for<F>(&self, predicate: F) -> SpsResult<()>
    where
        F: FnMut() -> bool,
    {
        waits::wait_for_with(predicate, &self.wait_options, &self.cancel)
    }

    #[track_caller]
    pub fn wait_for_with<F>(&self, predicate: F, options: &WaitOptions) -> SpsResult<()>
    where
        F: FnMut() -> bool,
    {
        waits::wait_for_with(predicate, options, &self.cancel)
    }

    pub fn wait_until(&self, instant: SpecificTime) -> SpsResult<()> {
        waits::wait_until_cancellable(instant, self.wait_options.poll_period, &self.cancel)
    }
}

/// Convert operator-supplied strings to procedure arguments. Procedures
/// that declare no arguments receive the strings unchanged.
pub fn bind_arguments(
    procedure: &dyn Procedure,
    supplied: &BTreeMap<String, String>,
) -> SpsResult<ProcedureArgs> {
    let declared = procedure.parameters();
    if declared.is_empty() {
        return Ok(supplied
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
            .collect());
    }

    let mut args = ProcedureArgs::new();
    for (name, value) in supplied {
        let parameter = declared.iter().find(|p| p.name() == name).ok_or_else(|| {
            SpsError::UnknownParameter(format!(
                "Argument {} not defined for {}",
                name,
                procedure.info().name
            ))
        })?;
        parameter.set_value(value.as_str())?;
    }
    for parameter in &declared {
        if let Some(value) = parameter.value() {
            args.insert(parameter.name().to_string(), value);
        }
    }
    Ok(args)
}
