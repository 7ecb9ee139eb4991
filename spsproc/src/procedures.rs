//! Sample operations procedures

use log::{info, warn};
use std::sync::Arc;

use spslib::{
    verify, ArgumentMap, DataKind, FlagMap, LinkState, Parameter, Procedure, ProcedureArgs,
    ProcedureEnvironment, ProcedureInfo, ProcedureStatus, Restriction, SpecificTime, SpsError,
    SpsResult, TimeInterval, Value,
};

const VERSION: &str = "1.1.0";

fn last_modified() -> Option<SpecificTime> {
    SpecificTime::new(2024, 4, 25, 12, 10, 0, 0).ok()
}

fn info(name: &str, description: &str, duration: TimeInterval) -> ProcedureInfo {
    let mut info = ProcedureInfo::new(name, VERSION)
        .with_description(description)
        .with_duration(duration);
    info.modified = last_modified();
    info
}

fn missing(what: &str, name: &str, owner: &dyn std::fmt::Display) -> SpsError {
    SpsError::UnknownParameter(format!("{} {} not defined for {}", what, name, owner))
}

pub fn register_all(env: &ProcedureEnvironment) {
    env.register_procedure(Arc::new(SetMomentumWheelSpeed));
    env.register_procedure(Arc::new(PassSetup));
    env.register_procedure(Arc::new(ConfigureFEP));
}

/// Change the momentum wheel speed by `SpeedIncrement` rpm, turning the
/// wheel on first if it is off
pub struct SetMomentumWheelSpeed;

impl Procedure for SetMomentumWheelSpeed {
    fn info(&self) -> ProcedureInfo {
        info(
            "SetMomentumWheelSpeed",
            "Change the current momentum wheel speed by SpeedIncrement rpm",
            TimeInterval::new(0, 5, 0),
        )
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::with_kind("SpeedIncrement", DataKind::Int).with_restrictions(vec![
            Restriction::MinInclusive(Value::from(-10000)),
            Restriction::MaxInclusive(Value::from(10000)),
        ])]
    }

    fn invoke(&self, env: &ProcedureEnvironment, args: &ProcedureArgs) -> SpsResult<ProcedureStatus> {
        let sat1 = env.link("SAT1")?;
        let wheel_state = sat1
            .lookup_parameter("MomentumWheelState")
            .ok_or_else(|| missing("Parameter", "MomentumWheelState", &sat1))?;
        let wheel_speed = sat1
            .lookup_parameter("MomentumWheelSpeed")
            .ok_or_else(|| missing("Parameter", "MomentumWheelSpeed", &sat1))?;
        let set_wheel_speed = sat1
            .lookup_command("SetWheelSpeed")
            .ok_or_else(|| missing("Command", "SetWheelSpeed", &sat1))?;

        if wheel_state.value() == Some(Value::from("Off")) {
            sat1.send_named("MomentumWheelOn", &ArgumentMap::new(), &FlagMap::new())?;
        }

        let current = match wheel_speed.value().as_ref().and_then(Value::as_integer) {
            Some(current) => current,
            None => {
                warn!("MomentumWheelSpeed has no reported value");
                return Ok(ProcedureStatus::Failed);
            }
        };
        let increment = args
            .get("SpeedIncrement")
            .and_then(Value::as_integer)
            .unwrap_or(0);

        set_wheel_speed.set_values([("WheelSpeed", current + increment)])?;
        sat1.send(&set_wheel_speed)?;
        Ok(ProcedureStatus::Successful)
    }
}

/// Run the EstablishContact native procedure, then wait for SAT1 to come up
pub struct PassSetup;

impl Procedure for PassSetup {
    fn info(&self) -> ProcedureInfo {
        info(
            "PassSetup",
            "Setup for a pass and wait for Link to come up",
            TimeInterval::from_seconds(30),
        )
    }

    fn invoke(&self, env: &ProcedureEnvironment, _args: &ProcedureArgs) -> SpsResult<ProcedureStatus> {
        let mut selection = ProcedureArgs::new();
        selection.insert("string".to_string(), Value::from("1"));
        env.load_procedure("EstablishContact").invoke(env, &selection)?;

        let sat1 = env.link("SAT1")?;
        match env.wait_for(|| sat1.state() == LinkState::Up) {
            Ok(()) => Ok(ProcedureStatus::Successful),
            Err(SpsError::Timeout(_)) => {
                warn!("Timed out waiting for contact");
                Ok(ProcedureStatus::Failed)
            }
            Err(e) => Err(e),
        }
    }
}

/// Set the front-end sync pattern and verify the device reports it
#[allow(clippy::upper_case_acronyms)]
pub struct ConfigureFEP;

const NEW_PATTERN: i64 = 0xC744;

impl Procedure for ConfigureFEP {
    fn info(&self) -> ProcedureInfo {
        info(
            "ConfigureFEP",
            "Configure the Front-End Equipment for a pass",
            TimeInterval::from_seconds(3),
        )
    }

    fn invoke(&self, env: &ProcedureEnvironment, _args: &ProcedureArgs) -> SpsResult<ProcedureStatus> {
        let equipment = env.gems_device("FE1")?;
        let syncword = equipment
            .lookup_parameter("Syncword")
            .ok_or_else(|| missing("GEMS Parameter", "Syncword", &equipment))?;

        let mut arguments = ArgumentMap::new();
        arguments.insert("Syncword".to_string(), Some(Value::from(NEW_PATTERN)));
        equipment.send_named("ChangeSync", &arguments)?;
        env.wait(2.0)?;
        equipment.get(&["Syncword"])?;

        let reported = syncword.value().as_ref().and_then(Value::as_integer);
        match verify(reported == Some(NEW_PATTERN)) {
            Ok(()) => {
                info!("Sync pattern is {:#X}", NEW_PATTERN);
                Ok(ProcedureStatus::Successful)
            }
            Err(SpsError::Verify(_)) => {
                match reported {
                    Some(pattern) => info!("Sync pattern is {:#X} instead of {:#X}", pattern, NEW_PATTERN),
                    None => info!("Sync pattern is unknown instead of {:#X}", NEW_PATTERN),
                }
                Ok(ProcedureStatus::Failed)
            }
            Err(e) => Err(e),
        }
    }
}
