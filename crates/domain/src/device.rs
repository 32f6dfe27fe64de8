//! Device — a bus-controlled outlet, strip, or bulb known to the hub.

use std::fmt;

use crate::error::{HubError, ValidationError};
use crate::state::DeviceState;
use crate::topic;

/// Maximum length of a device name, in bytes.
pub const MAX_NAME_LEN: usize = 64;
/// Maximum length of a topic stem, in bytes.
pub const MAX_TOPIC_LEN: usize = 64;
/// Maximum length of a comma-separated command list, in bytes.
pub const MAX_COMMANDS_LEN: usize = 256;

/// Kind of device, fixed at creation.
///
/// The type decides which commands SET accepts by default and which command
/// TOGGLE sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Outlet,
    PowerStrip,
    DimmableBulb,
    CctBulb,
    RgbBulb,
    RgbwBulb,
    RgbcctBulb,
    Custom,
}

/// What the ADD extra argument means for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extra {
    Ignored,
    OutletCount,
    CommandList,
}

struct Descriptor {
    code: u8,
    label: &'static str,
    commands: &'static str,
    toggle: &'static str,
    extra: Extra,
}

const DESCRIPTORS: [Descriptor; 8] = [
    Descriptor {
        code: 0,
        label: "outlet/toggleable",
        commands: "POWER",
        toggle: "POWER",
        extra: Extra::Ignored,
    },
    Descriptor {
        code: 1,
        label: "powerstrip",
        commands: "",
        toggle: "POWER0",
        extra: Extra::OutletCount,
    },
    Descriptor {
        code: 2,
        label: "dimmablebulb",
        commands: "POWER,DIMMER",
        toggle: "POWER",
        extra: Extra::Ignored,
    },
    Descriptor {
        code: 3,
        label: "cctbulb",
        commands: "POWER,DIMMER,COLOR,WHITE,CT",
        toggle: "POWER",
        extra: Extra::Ignored,
    },
    Descriptor {
        code: 4,
        label: "rgbbulb",
        commands: "POWER,DIMMER,COLOR,HSBCOLOR",
        toggle: "POWER",
        extra: Extra::Ignored,
    },
    Descriptor {
        code: 5,
        label: "rgbwbulb",
        commands: "POWER,DIMMER,COLOR,HSBCOLOR,WHITE",
        toggle: "POWER",
        extra: Extra::Ignored,
    },
    Descriptor {
        code: 6,
        label: "rgbcctbulb",
        commands: "POWER,DIMMER,COLOR,HSBCOLOR,WHITE,CT",
        toggle: "POWER",
        extra: Extra::Ignored,
    },
    Descriptor {
        code: 7,
        label: "custom",
        commands: "",
        toggle: "POWER",
        extra: Extra::CommandList,
    },
];

impl DeviceType {
    pub const ALL: [Self; 8] = [
        Self::Outlet,
        Self::PowerStrip,
        Self::DimmableBulb,
        Self::CctBulb,
        Self::RgbBulb,
        Self::RgbwBulb,
        Self::RgbcctBulb,
        Self::Custom,
    ];

    fn descriptor(self) -> &'static Descriptor {
        &DESCRIPTORS[self as usize]
    }

    /// Look a type up by its numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownDeviceType`] for codes outside `0..=7`.
    pub fn from_code(code: i64) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|kind| i64::from(kind.code()) == code)
            .ok_or_else(|| ValidationError::UnknownDeviceType(code.to_string()))
    }

    /// Numeric code as stored and as sent by clients.
    #[must_use]
    pub fn code(self) -> u8 {
        self.descriptor().code
    }

    /// Human-readable label used in LIST output.
    #[must_use]
    pub fn label(self) -> &'static str {
        self.descriptor().label
    }

    /// Command that TOGGLE publishes `TOGGLE` to.
    #[must_use]
    pub fn toggle_command(self) -> &'static str {
        self.descriptor().toggle
    }

    /// Whether ADD must carry an extra argument for this type.
    #[must_use]
    pub fn requires_extra(self) -> bool {
        self.descriptor().extra != Extra::Ignored
    }

    /// Commands a new device of this type accepts.
    ///
    /// Power strips take the outlet count as `extra` and get
    /// `POWER0..=POWERn`, `POWER0` addressing all outlets at once. Custom
    /// devices take the comma-separated command list verbatim. Other types
    /// ignore `extra`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required extra is missing or invalid.
    pub fn default_commands(self, extra: Option<&str>) -> Result<CommandSet, ValidationError> {
        let descriptor = self.descriptor();
        match descriptor.extra {
            Extra::Ignored => CommandSet::parse(descriptor.commands),
            Extra::OutletCount => {
                let raw = extra.ok_or(ValidationError::MissingExtra(descriptor.label))?;
                let count: u16 = raw
                    .trim()
                    .parse()
                    .ok()
                    .filter(|count| *count > 0)
                    .ok_or_else(|| ValidationError::InvalidOutletCount(raw.to_string()))?;
                let list = (0..=count)
                    .map(|outlet| format!("POWER{outlet}"))
                    .collect::<Vec<_>>()
                    .join(",");
                CommandSet::parse(&list)
            }
            Extra::CommandList => {
                let raw = extra.ok_or(ValidationError::MissingExtra(descriptor.label))?;
                CommandSet::parse(raw)
            }
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Comma-separated list of commands SET accepts for a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet(String);

impl CommandSet {
    /// Parse a comma-separated list, dropping blanks around each entry.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the list is empty or longer than
    /// [`MAX_COMMANDS_LEN`].
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let list = raw
            .split(',')
            .map(str::trim)
            .filter(|command| !command.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        if list.is_empty() {
            return Err(ValidationError::EmptyCommands);
        }
        check_len("commands", &list, MAX_COMMANDS_LEN)?;
        Ok(Self(list))
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn contains(&self, command: &str) -> bool {
        self.iter().any(|known| known.eq_ignore_ascii_case(command))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.split(',')
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A device registered with the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub topic: String,
    pub device_type: DeviceType,
    pub state: DeviceState,
    pub commands: CommandSet,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the name or topic is empty or
    /// too long.
    pub fn validate(&self) -> Result<(), HubError> {
        validate_name(&self.name)?;
        validate_topic(&self.topic)?;
        Ok(())
    }

    /// Topic the device reports its status on.
    #[must_use]
    pub fn status_topic(&self) -> String {
        topic::status_topic(&self.topic)
    }

    /// Topic to send `command` to.
    #[must_use]
    pub fn command_topic(&self, command: &str) -> String {
        topic::command_topic(&self.topic, command)
    }

    /// Case-insensitive name comparison used for every registry lookup.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Check a device name.
///
/// # Errors
///
/// Returns [`ValidationError`] if `name` is empty or longer than [`MAX_NAME_LEN`].
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    check_len("name", name, MAX_NAME_LEN)
}

/// Check a topic stem.
///
/// # Errors
///
/// Returns [`ValidationError`] if `topic` is empty or longer than [`MAX_TOPIC_LEN`].
pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    check_len("topic", topic, MAX_TOPIC_LEN)
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.len() > max {
        return Err(ValidationError::TooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    name: Option<String>,
    topic: Option<String>,
    device_type: Option<DeviceType>,
    extra: Option<String>,
    commands: Option<CommandSet>,
    state: Option<DeviceState>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    /// Extra ADD argument: outlet count or custom command list.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Explicit command list, bypassing the type defaults.
    #[must_use]
    pub fn commands(mut self, commands: CommandSet) -> Self {
        self.commands = Some(commands);
        self
    }

    #[must_use]
    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = Some(state);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// The type defaults to [`DeviceType::Outlet`] and the state to the
    /// status template.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the name or topic is invalid, or
    /// if the type's command list cannot be derived.
    pub fn build(self) -> Result<Device, HubError> {
        let device_type = self.device_type.unwrap_or(DeviceType::Outlet);
        let commands = match self.commands {
            Some(commands) => commands,
            None => device_type.default_commands(self.extra.as_deref())?,
        };
        let device = Device {
            name: self.name.unwrap_or_default(),
            topic: self.topic.unwrap_or_default(),
            device_type,
            state: self.state.unwrap_or_default(),
            commands,
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_outlet_with_power_command_by_default() {
        let device = Device::builder().name("lamp1").topic("lamp1").build().unwrap();
        assert_eq!(device.device_type, DeviceType::Outlet);
        assert_eq!(device.commands.as_str(), "POWER");
        assert_eq!(device.state.get("POWER"), Some("UKNOWN"));
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Device::builder().topic("lamp1").build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_topic_is_empty() {
        let result = Device::builder().name("lamp1").build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyTopic))
        ));
    }

    #[test]
    fn should_reject_name_longer_than_limit() {
        let result = Device::builder()
            .name("n".repeat(MAX_NAME_LEN + 1))
            .topic("t")
            .build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::TooLong { field: "name", .. }))
        ));
    }

    #[test]
    fn should_map_every_code_to_its_type() {
        for (code, kind) in DeviceType::ALL.into_iter().enumerate() {
            let code = i64::try_from(code).unwrap();
            assert_eq!(DeviceType::from_code(code).unwrap(), kind);
            assert_eq!(i64::from(kind.code()), code);
        }
        assert!(DeviceType::from_code(8).is_err());
        assert!(DeviceType::from_code(-1).is_err());
    }

    #[test]
    fn should_generate_outlet_commands_for_power_strip() {
        let commands = DeviceType::PowerStrip.default_commands(Some("3")).unwrap();
        assert_eq!(commands.as_str(), "POWER0,POWER1,POWER2,POWER3");
        assert_eq!(DeviceType::PowerStrip.toggle_command(), "POWER0");
    }

    #[test]
    fn should_reject_power_strip_without_valid_outlet_count() {
        assert_eq!(
            DeviceType::PowerStrip.default_commands(None),
            Err(ValidationError::MissingExtra("powerstrip"))
        );
        assert!(matches!(
            DeviceType::PowerStrip.default_commands(Some("0")),
            Err(ValidationError::InvalidOutletCount(_))
        ));
        assert!(matches!(
            DeviceType::PowerStrip.default_commands(Some("many")),
            Err(ValidationError::InvalidOutletCount(_))
        ));
    }

    #[test]
    fn should_take_custom_commands_verbatim() {
        let device = Device::builder()
            .name("fan")
            .topic("fan")
            .device_type(DeviceType::Custom)
            .extra("POWER,SPEED")
            .build()
            .unwrap();
        assert_eq!(device.commands.as_str(), "POWER,SPEED");
        assert!(device.device_type.requires_extra());
    }

    #[test]
    fn should_ignore_extra_for_fixed_types() {
        let commands = DeviceType::RgbcctBulb.default_commands(Some("junk")).unwrap();
        assert_eq!(commands.as_str(), "POWER,DIMMER,COLOR,HSBCOLOR,WHITE,CT");
        assert!(!DeviceType::RgbcctBulb.requires_extra());
    }

    #[test]
    fn should_match_commands_ignoring_case() {
        let commands = CommandSet::parse("POWER, Dimmer").unwrap();
        assert!(commands.contains("power"));
        assert!(commands.contains("DIMMER"));
        assert!(!commands.contains("COLOR"));
        assert_eq!(commands.iter().collect::<Vec<_>>(), vec!["POWER", "Dimmer"]);
    }

    #[test]
    fn should_reject_empty_or_oversized_command_list() {
        assert_eq!(CommandSet::parse(" , "), Err(ValidationError::EmptyCommands));
        let long = vec!["COMMAND"; 40].join(",");
        assert!(matches!(
            CommandSet::parse(&long),
            Err(ValidationError::TooLong { field: "commands", .. })
        ));
    }

    #[test]
    fn should_derive_topics_from_stem() {
        let device = Device::builder().name("Lamp").topic("lamp1").build().unwrap();
        assert_eq!(device.status_topic(), "stat/lamp1/RESULT");
        assert_eq!(device.command_topic("power"), "cmnd/lamp1/POWER");
        assert!(device.is_named("LAMP"));
    }
}
