//! Catalog document loader
//!
//! A catalog is a YAML stream of `!SpaceSystem` and `!GemsDevice` nodes.
//! Parameter entries are single-key mappings of name to `[kind, options]`,
//! and restriction options are `!Restriction` token lists:
//!
//! ```yaml
//! - !SpaceSystem
//!   name: SAT1
//!   ParameterSet:
//!     - MomentumWheelSpeed: [int, {units: rpm}]
//!   CommandSet:
//!     - SetWheelSpeed:
//!       - WheelSpeed: [int, {restriction: !Restriction [MinInclusive, -6000, MaxInclusive, 6000]}]
//! ```

use log::{debug, warn};
use serde::Deserialize;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use spslibgs::{Parameter, Restriction, RestrictionArg, SpsError, SpsResult, Value};

use crate::commands::{ArgumentSet, Command};
use crate::config::constants::CATALOG_FILE_NAME;
use crate::directives::Directive;
use crate::system::{Device, SpaceSystem};

const SPACE_SYSTEM_TAG: &str = "SpaceSystem";
const GEMS_DEVICE_TAG: &str = "GemsDevice";
const RESTRICTION_TAG: &str = "Restriction";

/// One top-level catalog node
#[derive(Debug)]
pub enum CatalogEntry {
    System(SpaceSystem),
    Device(Device),
}

/// Parsed catalog plus the warnings raised while building it
#[derive(Debug, Default)]
pub struct CatalogDocument {
    pub entries: Vec<CatalogEntry>,
    pub warnings: Vec<String>,
}

/// Locations probed for the catalog, in order
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CATALOG_FILE_NAME)];
    if let Some(home) = env::var_os("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(CATALOG_FILE_NAME));
        paths.push(home.join(".local").join("data").join(CATALOG_FILE_NAME));
    }
    if let Some(prefix) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
    {
        paths.push(prefix.join("data").join(CATALOG_FILE_NAME));
    }
    paths
}

/// First existing catalog file, trying `explicit` before the conventional
/// locations
pub fn find_catalog(explicit: Option<&Path>) -> SpsResult<PathBuf> {
    search_catalog(explicit, candidate_paths())
}

fn search_catalog(explicit: Option<&Path>, candidates: Vec<PathBuf>) -> SpsResult<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        warn!("Catalog {} not found, searching default locations", path.display());
    }
    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| SpsError::catalog(format!("Could not find dataset {}", CATALOG_FILE_NAME)))
}

/// Parse a catalog document. Duplicate names are reported as warnings and
/// the later definition replaces the earlier one.
pub fn parse_catalog(text: &str) -> SpsResult<CatalogDocument> {
    let mut builder = Builder::default();
    for document in serde_yaml::Deserializer::from_str(text) {
        let node = YamlValue::deserialize(document).map_err(|e| SpsError::catalog(e.to_string()))?;
        builder.top_level(node)?;
    }
    Ok(CatalogDocument {
        entries: builder.entries,
        warnings: builder.warnings,
    })
}

#[derive(Default)]
struct Builder {
    entries: Vec<CatalogEntry>,
    warnings: Vec<String>,
}

impl Builder {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn top_level(&mut self, node: YamlValue) -> SpsResult<()> {
        match node {
            YamlValue::Null => Ok(()),
            YamlValue::Sequence(items) => {
                for item in items {
                    self.entry(item)?;
                }
                Ok(())
            }
            other => self.entry(other),
        }
    }

    fn entry(&mut self, node: YamlValue) -> SpsResult<()> {
        let TaggedValue { tag, value } = match node {
            YamlValue::Tagged(tagged) => *tagged,
            other => {
                return Err(SpsError::catalog(format!(
                    "Expected a !{} or !{} node, found {:?}",
                    SPACE_SYSTEM_TAG, GEMS_DEVICE_TAG, other
                )))
            }
        };
        let mapping = match value {
            YamlValue::Mapping(mapping) => mapping,
            _ => return Err(SpsError::catalog(format!("{} node is not a mapping", tag))),
        };

        if tag == SPACE_SYSTEM_TAG {
            let system = self.space_system(&mapping)?;
            self.entries.push(CatalogEntry::System(system));
        } else if tag == GEMS_DEVICE_TAG {
            let device = self.device(&mapping)?;
            self.entries.push(CatalogEntry::Device(device));
        } else {
            return Err(SpsError::catalog(format!("Unknown catalog tag {}", tag)));
        }
        Ok(())
    }

    fn space_system(&mut self, mapping: &Mapping) -> SpsResult<SpaceSystem> {
        let name = entity_name(mapping, SPACE_SYSTEM_TAG)?;

        let parameter_entries = entry_list(mapping, "ParameterSet")?;
        if parameter_entries.is_empty() {
            self.warn(format!("No ParameterSet mapping for {}", name));
        }
        let parameters = self.parameter_set(&parameter_entries, &name)?;

        let command_entries = entry_list(mapping, "CommandSet")?;
        if command_entries.is_empty() {
            self.warn(format!("No CommandSet mapping for {}", name));
        }
        let mut commands = BTreeMap::new();
        for entry in &command_entries {
            let (command_name, definition) = single_key(entry)?;
            let arguments = self.argument_set(definition, &format!("command {}", command_name))?;
            let command = Command::new(command_name.clone(), arguments);
            if commands.insert(command_name.clone(), Arc::new(command)).is_some() {
                self.warn(format!("Duplicate command name {} in {}", command_name, name));
            }
        }

        Ok(SpaceSystem::new(name, parameters, commands))
    }

    fn device(&mut self, mapping: &Mapping) -> SpsResult<Device> {
        let name = entity_name(mapping, GEMS_DEVICE_TAG)?;

        let parameter_entries = entry_list(mapping, "ParameterSet")?;
        if parameter_entries.is_empty() {
            self.warn(format!("No ParameterSet mapping for {}", name));
        }
        let parameters = self.parameter_set(&parameter_entries, &name)?;

        let directive_entries = entry_list(mapping, "DirectiveSet")?;
        if directive_entries.is_empty() {
            debug!("No DirectiveSet mapping for {}", name);
        }
        let mut directives = BTreeMap::new();
        for entry in &directive_entries {
            let (directive_name, definition) = single_key(entry)?;
            let arguments =
                self.argument_set(definition, &format!("directive {}", directive_name))?;
            let directive = Directive::new(directive_name.clone(), arguments);
            if directives.insert(directive_name.clone(), Arc::new(directive)).is_some() {
                self.warn(format!("Duplicate directive name {} in {}", directive_name, name));
            }
        }

        Ok(Device::new(name, parameters, directives))
    }

    fn parameter_set(
        &mut self,
        entries: &[YamlValue],
        owner: &str,
    ) -> SpsResult<BTreeMap<String, Arc<Parameter>>> {
        let mut parameters = BTreeMap::new();
        for entry in entries {
            let (name, definition) = single_key(entry)?;
            let parameter = build_parameter(&name, definition)?;
            if parameters.insert(name.clone(), Arc::new(parameter)).is_some() {
                self.warn(format!("Duplicate parameter name {} in {}", name, owner));
            }
        }
        Ok(parameters)
    }

    fn argument_set(&mut self, definition: &YamlValue, owner: &str) -> SpsResult<ArgumentSet> {
        let entries = match definition {
            YamlValue::Null => Vec::new(),
            YamlValue::Sequence(items) => items.clone(),
            _ => return Err(SpsError::catalog(format!("Arguments of {} are not a list", owner))),
        };
        Ok(ArgumentSet::new(self.parameter_set(&entries, owner)?))
    }
}

fn entity_name(mapping: &Mapping, tag: &str) -> SpsResult<String> {
    match mapping.get("name") {
        Some(YamlValue::String(name)) => Ok(name.clone()),
        Some(other) => scalar(other).map(|value| value.to_string()),
        None => Err(SpsError::catalog(format!("No mapping to {} name", tag))),
    }
}

/// The list under `key`, or an empty list if it is absent or null
fn entry_list(mapping: &Mapping, key: &str) -> SpsResult<Vec<YamlValue>> {
    match mapping.get(key) {
        None | Some(YamlValue::Null) => Ok(Vec::new()),
        Some(YamlValue::Sequence(items)) => Ok(items.clone()),
        Some(_) => Err(SpsError::catalog(format!("{} is not a list", key))),
    }
}

fn single_key(entry: &YamlValue) -> SpsResult<(String, &YamlValue)> {
    let mapping = entry
        .as_mapping()
        .ok_or_else(|| SpsError::catalog(format!("Expected a name mapping, found {:?}", entry)))?;
    let mut pairs = mapping.iter();
    match (pairs.next(), pairs.next()) {
        (Some((YamlValue::String(name), definition)), None) => Ok((name.clone(), definition)),
        _ => Err(SpsError::catalog(format!(
            "Expected a single-key name mapping, found {:?}",
            entry
        ))),
    }
}

/// Build a parameter from `[kind]` or `[kind, options]`
fn build_parameter(name: &str, definition: &YamlValue) -> SpsResult<Parameter> {
    let items = definition
        .as_sequence()
        .ok_or_else(|| SpsError::catalog(format!("Definition of {} is not a list", name)))?;
    let kind = items
        .first()
        .and_then(YamlValue::as_str)
        .ok_or_else(|| SpsError::catalog(format!("Definition of {} has no data type", name)))?;
    let mut parameter = Parameter::new(name, kind)?;

    let options = match items.get(1) {
        None | Some(YamlValue::Null) => return Ok(parameter),
        Some(YamlValue::Mapping(options)) => options,
        Some(_) => {
            return Err(SpsError::catalog(format!("Options of {} are not a mapping", name)))
        }
    };

    let mut initial = None;
    for (key, option) in options {
        let key = key
            .as_str()
            .ok_or_else(|| SpsError::catalog(format!("Option of {} has a non-string key", name)))?;
        match key {
            "description" => parameter = parameter.with_description(scalar(option)?.to_string()),
            "units" => parameter = parameter.with_units(scalar(option)?.to_string()),
            "multiplicity" => parameter = parameter.with_multiplicity(scalar(option)?.to_string()),
            "writable" => {
                let writable = option
                    .as_bool()
                    .ok_or_else(|| SpsError::catalog(format!("writable of {} is not a boolean", name)))?;
                parameter = parameter.with_writable(writable);
            }
            "restriction" => parameter = parameter.with_restrictions(restrictions(option)?),
            "value" => initial = Some(scalar(option)?),
            other => debug!("Ignoring option {} of parameter {}", other, name),
        }
    }

    if let Some(value) = initial {
        parameter.set_value(value)?;
    }
    Ok(parameter)
}

/// Resolve a `!Restriction` token list. Tokens that name no restriction are
/// skipped.
fn restrictions(node: &YamlValue) -> SpsResult<Vec<Restriction>> {
    let tokens = match node {
        YamlValue::Null => return Ok(Vec::new()),
        YamlValue::Tagged(tagged) if tagged.tag == RESTRICTION_TAG => &tagged.value,
        YamlValue::Tagged(tagged) => {
            return Err(SpsError::catalog(format!("Unexpected tag {} on restriction", tagged.tag)))
        }
        other => other,
    };
    let tokens = tokens
        .as_sequence()
        .ok_or_else(|| SpsError::catalog("Restriction is not a token list"))?;
    if tokens.len() % 2 != 0 {
        return Err(SpsError::catalog(format!(
            "Restriction token list has {} entries, expected pairs",
            tokens.len()
        )));
    }

    let mut restrictions = Vec::new();
    for pair in tokens.chunks(2) {
        let kind = pair[0]
            .as_str()
            .ok_or_else(|| SpsError::catalog(format!("Restriction name {:?} is not a string", pair[0])))?;
        let arg = match &pair[1] {
            YamlValue::Sequence(items) => {
                RestrictionArg::List(items.iter().map(scalar).collect::<SpsResult<_>>()?)
            }
            other => RestrictionArg::Scalar(scalar(other)?),
        };
        match Restriction::from_token(kind, &arg)? {
            Some(restriction) => restrictions.push(restriction),
            None => debug!("Skipping unknown restriction {}", kind),
        }
    }
    Ok(restrictions)
}

fn scalar(node: &YamlValue) -> SpsResult<Value> {
    match node {
        YamlValue::Bool(b) => Ok(Value::Boolean(*b)),
        YamlValue::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float))
            .ok_or_else(|| SpsError::catalog(format!("Unsupported number {}", n))),
        YamlValue::String(s) => Ok(Value::String(s.clone())),
        other => Err(SpsError::catalog(format!("Expected a scalar, found {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spslibgs::DataKind;
    use std::fs;
    use tempfile::tempdir;

    const SAT1: &str = r#"
- !SpaceSystem
  name: SAT1
  ParameterSet:
    - MomentumWheelState: [string, {restriction: !Restriction [Enumeration, [On, Off]], value: "Off"}]
    - MomentumWheelSpeed: [int, {units: rpm, description: Wheel speed}]
  CommandSet:
    - MomentumWheelOn: []
    - SetWheelSpeed:
      - WheelSpeed: [int, {restriction: !Restriction [MinInclusive, -6000, MaxInclusive, 6000]}]
"#;

    fn system(document: &CatalogDocument, index: usize) -> &SpaceSystem {
        match &document.entries[index] {
            CatalogEntry::System(system) => system,
            other => panic!("expected a system, found {:?}", other),
        }
    }

    #[test]
    fn test_parse_space_system() {
        let document = parse_catalog(SAT1).unwrap();
        assert!(document.warnings.is_empty());
        let sat1 = system(&document, 0);
        assert_eq!(sat1.name(), "SAT1");

        let state = sat1.lookup_parameter("MomentumWheelState").unwrap();
        assert_eq!(state.value(), Some(Value::from("Off")));
        assert!(state.set_value("Standby").is_err());

        let speed = sat1.lookup_parameter("MomentumWheelSpeed").unwrap();
        assert_eq!(speed.kind(), DataKind::Int);
        assert_eq!(speed.units(), Some("rpm"));
        assert_eq!(speed.description(), Some("Wheel speed"));

        let command = sat1.lookup_command("SetWheelSpeed").unwrap();
        let wheel_speed = command.lookup_argument("WheelSpeed").unwrap();
        assert_eq!(wheel_speed.restrictions().len(), 2);
        assert!(command.set_values([("WheelSpeed", 6001)]).is_err());
        assert!(sat1.lookup_command("MomentumWheelOn").unwrap().arguments().is_empty());
    }

    #[test]
    fn test_duplicate_parameter_later_wins() {
        let text = r#"
- !SpaceSystem
  name: SAT1
  ParameterSet:
    - BusVoltage: [int, {}]
    - BusVoltage: [double, {units: V}]
  CommandSet:
    - Reset: []
"#;
        let document = parse_catalog(text).unwrap();
        assert_eq!(document.warnings, vec!["Duplicate parameter name BusVoltage in SAT1"]);
        let voltage = system(&document, 0).lookup_parameter("BusVoltage").unwrap();
        assert_eq!(voltage.kind(), DataKind::Double);
        assert_eq!(voltage.units(), Some("V"));
    }

    #[test]
    fn test_duplicate_command_and_argument() {
        let text = r#"
- !SpaceSystem
  name: SAT1
  ParameterSet:
    - Mode: [string]
  CommandSet:
    - Slew:
      - Angle: [int]
      - Angle: [float]
    - Slew:
      - Rate: [double]
"#;
        let document = parse_catalog(text).unwrap();
        assert_eq!(
            document.warnings,
            vec![
                "Duplicate parameter name Angle in command Slew",
                "Duplicate command name Slew in SAT1"
            ]
        );
        let slew = system(&document, 0).lookup_command("Slew").unwrap();
        assert!(slew.lookup_argument("Rate").is_some());
        assert!(slew.lookup_argument("Angle").is_none());
    }

    #[test]
    fn test_unknown_restriction_token_is_skipped() {
        let text = r#"
- !SpaceSystem
  name: SAT1
  ParameterSet:
    - Speed: [int, {restriction: !Restriction [MinInclusiv, 0, MaxInclusive, 10]}]
  CommandSet:
    - Reset: []
"#;
        let document = parse_catalog(text).unwrap();
        let speed = system(&document, 0).lookup_parameter("Speed").unwrap();
        assert_eq!(speed.restrictions().len(), 1);
        assert!(speed.set_value(-5).is_ok());
        assert!(speed.set_value(11).is_err());
    }

    #[test]
    fn test_gems_device_and_missing_sets() {
        let text = r#"
--- !GemsDevice
name: FE1
ParameterSet:
  - Syncword: [hexBitField, {description: Frame sync pattern}]
DirectiveSet:
  - ChangeSync:
    - Syncword: [hexBitField, {}]
--- !SpaceSystem
name: SAT2
"#;
        let document = parse_catalog(text).unwrap();
        assert_eq!(document.entries.len(), 2);
        match &document.entries[0] {
            CatalogEntry::Device(device) => {
                assert_eq!(device.name(), "FE1");
                assert!(device.lookup_directive("ChangeSync").is_some());
            }
            other => panic!("expected a device, found {:?}", other),
        }
        assert_eq!(
            document.warnings,
            vec!["No ParameterSet mapping for SAT2", "No CommandSet mapping for SAT2"]
        );
    }

    #[test]
    fn test_undefined_data_type_fails_load() {
        let text = "- !SpaceSystem\n  name: SAT1\n  ParameterSet:\n    - Attitude: [quaternion, {}]\n";
        assert!(matches!(parse_catalog(text), Err(SpsError::UndefinedType(_))));
    }

    #[test]
    fn test_malformed_documents() {
        let odd = "- !SpaceSystem\n  name: SAT1\n  ParameterSet:\n    - Speed: [int, {restriction: !Restriction [MinInclusive]}]\n";
        assert!(matches!(parse_catalog(odd), Err(SpsError::Catalog(_))));

        let unnamed = "- !SpaceSystem\n  ParameterSet: []\n";
        assert!(matches!(parse_catalog(unnamed), Err(SpsError::Catalog(_))));

        let untagged = "- name: SAT1\n";
        assert!(matches!(parse_catalog(untagged), Err(SpsError::Catalog(_))));

        assert!(matches!(parse_catalog("- [unclosed"), Err(SpsError::Catalog(_))));
    }

    #[test]
    fn test_find_catalog_prefers_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Mission.yaml");
        fs::write(&path, SAT1).unwrap();
        assert_eq!(find_catalog(Some(path.as_path())).unwrap(), path);
    }

    #[test]
    fn test_missing_explicit_path_falls_back_to_search() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("Missing.yaml");
        let fallback = dir.path().join(CATALOG_FILE_NAME);
        fs::write(&fallback, SAT1).unwrap();

        let candidates = vec![dir.path().join("nowhere").join(CATALOG_FILE_NAME), fallback.clone()];
        assert_eq!(search_catalog(Some(missing.as_path()), candidates).unwrap(), fallback);
    }

    #[test]
    fn test_no_catalog_anywhere_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("Missing.yaml");
        let candidates = vec![dir.path().join(CATALOG_FILE_NAME)];

        match search_catalog(Some(missing.as_path()), candidates.clone()) {
            Err(SpsError::Catalog(message)) => {
                assert_eq!(message, format!("Could not find dataset {}", CATALOG_FILE_NAME))
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(search_catalog(None, candidates), Err(SpsError::Catalog(_))));
        assert!(matches!(search_catalog(None, Vec::new()), Err(SpsError::Catalog(_))));
    }

    #[test]
    fn test_candidate_paths_start_with_working_directory() {
        let paths = candidate_paths();
        assert_eq!(paths[0], PathBuf::from(CATALOG_FILE_NAME));
        assert!(paths.iter().all(|path| path.ends_with(CATALOG_FILE_NAME)));
    }
}
