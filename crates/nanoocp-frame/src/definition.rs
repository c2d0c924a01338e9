use crate::data::{data_from_ono_for_subscription, data_from_u32, DataType, SUBSCRIPTION_MANAGER_ONO};
use crate::message::CommandResponseRequired;
use crate::variant::Variant;

/// Definition level of the subscription manager class.
const SUBSCRIPTION_MANAGER_DEF_LEVEL: u16 = 3;
const ADD_SUBSCRIPTION_METHOD: u16 = 1;
const REMOVE_SUBSCRIPTION_METHOD: u16 = 2;
const ADD_SUBSCRIPTION_PARAM_COUNT: u8 = 5;
const REMOVE_SUBSCRIPTION_PARAM_COUNT: u8 = 2;

const GET_VALUE_METHOD: u16 = 1;
const SET_VALUE_METHOD: u16 = 2;
const GET_POSITION_NAMES_METHOD: u16 = 5;
const GET_POSITION_ENABLEDS_METHOD: u16 = 9;

const SCENE_APPLY_METHOD: u16 = 7;
const SCENE_PREVIOUS_METHOD: u16 = 8;
const SCENE_NEXT_METHOD: u16 = 9;

/// How a definition's getter and extra operations map to methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefinitionKind {
    /// Plain property: method 1 reads, method 2 writes.
    #[default]
    Default,
    /// Switch whose getter returns the list of position names.
    SwitchPositionNames,
    /// Switch whose getter returns the per-position enabled flags.
    SwitchPositionEnableds,
    /// Scene agent with apply, previous and next operations.
    SceneAgent,
}

/// Everything needed to address one property of one object, plus the
/// parameters of a pending method call on it.
///
/// Definitions are plain data: the builders below return new definitions
/// describing get, set and subscription calls, which become messages via
/// [`CommandDefinition::to_command`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandDefinition {
    pub target_ono: u32,
    pub property_type: DataType,
    pub def_level: u16,
    pub property_index: u16,
    pub param_count: u8,
    pub param_data: Vec<u8>,
    pub kind: DefinitionKind,
}

impl CommandDefinition {
    pub fn new(target_ono: u32, property_type: DataType, def_level: u16, property_index: u16) -> Self {
        Self {
            target_ono,
            property_type,
            def_level,
            property_index,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: DefinitionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn switch_position_names(target_ono: u32, def_level: u16, property_index: u16) -> Self {
        Self::new(target_ono, DataType::Blob, def_level, property_index)
            .with_kind(DefinitionKind::SwitchPositionNames)
    }

    pub fn switch_position_enableds(target_ono: u32, def_level: u16, property_index: u16) -> Self {
        Self::new(target_ono, DataType::Blob, def_level, property_index)
            .with_kind(DefinitionKind::SwitchPositionEnableds)
    }

    pub fn scene_agent(target_ono: u32, def_level: u16) -> Self {
        Self::new(target_ono, DataType::UInt32, def_level, 0).with_kind(DefinitionKind::SceneAgent)
    }

    pub fn data_type(&self) -> DataType {
        self.property_type
    }

    fn call(&self, method_index: u16, param_count: u8, param_data: Vec<u8>) -> Self {
        Self {
            target_ono: self.target_ono,
            property_type: self.property_type,
            def_level: self.def_level,
            property_index: method_index,
            param_count,
            param_data,
            kind: DefinitionKind::Default,
        }
    }

    /// Subscribe to PropertyChanged events of this object.
    pub fn add_subscription(&self) -> Self {
        Self {
            target_ono: SUBSCRIPTION_MANAGER_ONO,
            property_type: self.property_type,
            def_level: SUBSCRIPTION_MANAGER_DEF_LEVEL,
            property_index: ADD_SUBSCRIPTION_METHOD,
            param_count: ADD_SUBSCRIPTION_PARAM_COUNT,
            param_data: data_from_ono_for_subscription(self.target_ono, true),
            kind: DefinitionKind::Default,
        }
    }

    pub fn remove_subscription(&self) -> Self {
        Self {
            target_ono: SUBSCRIPTION_MANAGER_ONO,
            property_type: self.property_type,
            def_level: SUBSCRIPTION_MANAGER_DEF_LEVEL,
            property_index: REMOVE_SUBSCRIPTION_METHOD,
            param_count: REMOVE_SUBSCRIPTION_PARAM_COUNT,
            param_data: data_from_ono_for_subscription(self.target_ono, false),
            kind: DefinitionKind::Default,
        }
    }

    /// Read the current value of this property.
    pub fn get_value(&self) -> Self {
        let method = match self.kind {
            DefinitionKind::SwitchPositionNames => GET_POSITION_NAMES_METHOD,
            DefinitionKind::SwitchPositionEnableds => GET_POSITION_ENABLEDS_METHOD,
            DefinitionKind::Default | DefinitionKind::SceneAgent => GET_VALUE_METHOD,
        };
        self.call(method, 0, Vec::new())
    }

    /// Write `value`, converted to this property's type. Returns `None` if
    /// the value has no representation in that type.
    pub fn set_value(&self, value: &Variant) -> Option<Self> {
        let data = value.to_param_data(self.property_type)?;
        Some(self.call(SET_VALUE_METHOD, 1, data))
    }

    /// Apply scene `major.minor`. Only scene agents support this.
    pub fn scene_apply(&self, major: u16, minor: u16) -> Option<Self> {
        if self.kind != DefinitionKind::SceneAgent {
            return None;
        }
        let scene = u32::from(minor) + (u32::from(major) << 16);
        let mut def = self.call(SCENE_APPLY_METHOD, 1, data_from_u32(scene));
        def.property_type = DataType::UInt32;
        Some(def)
    }

    pub fn scene_previous(&self) -> Option<Self> {
        self.scene_step(SCENE_PREVIOUS_METHOD)
    }

    pub fn scene_next(&self) -> Option<Self> {
        self.scene_step(SCENE_NEXT_METHOD)
    }

    fn scene_step(&self, method_index: u16) -> Option<Self> {
        if self.kind != DefinitionKind::SceneAgent {
            return None;
        }
        let mut def = self.call(method_index, 0, Vec::new());
        def.property_type = DataType::None;
        Some(def)
    }

    /// Build the message for this definition with a new handle.
    pub fn to_command(&self) -> CommandResponseRequired {
        CommandResponseRequired::from_definition(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{data_from_f32, get_ono};

    fn gain() -> CommandDefinition {
        CommandDefinition::new(get_ono(0, 2, 0, 4097), DataType::Float32, 5, 2)
    }

    #[test]
    fn test_add_subscription() {
        let def = gain();
        let add = def.add_subscription();
        assert_eq!(add.target_ono, 4);
        assert_eq!(add.def_level, 3);
        assert_eq!(add.property_index, 1);
        assert_eq!(add.param_count, 5);
        assert_eq!(add.param_data, data_from_ono_for_subscription(def.target_ono, true));
    }

    #[test]
    fn test_remove_subscription() {
        let remove = gain().remove_subscription();
        assert_eq!(remove.target_ono, 4);
        assert_eq!(remove.def_level, 3);
        assert_eq!(remove.property_index, 2);
        assert_eq!(remove.param_count, 2);
        assert_eq!(remove.param_data.len(), 16);
    }

    #[test]
    fn test_get_value() {
        let get = gain().get_value();
        assert_eq!(get.target_ono, gain().target_ono);
        assert_eq!(get.def_level, 5);
        assert_eq!(get.property_index, 1);
        assert_eq!(get.param_count, 0);
        assert!(get.param_data.is_empty());
    }

    #[test]
    fn test_set_value_converts_to_property_type() {
        let set = gain().set_value(&Variant::Int32(-6)).unwrap();
        assert_eq!(set.property_index, 2);
        assert_eq!(set.param_count, 1);
        assert_eq!(set.param_data, data_from_f32(-6.0));

        let blob = CommandDefinition::new(0x100, DataType::Int64, 3, 1);
        assert!(blob.set_value(&Variant::Int32(1)).is_none());
    }

    #[test]
    fn test_switch_getters() {
        let names = CommandDefinition::switch_position_names(0x100, 4, 1);
        assert_eq!(names.get_value().property_index, 5);
        let enableds = CommandDefinition::switch_position_enableds(0x100, 4, 1);
        assert_eq!(enableds.get_value().property_index, 9);
        assert_eq!(names.data_type(), DataType::Blob);
    }

    #[test]
    fn test_scene_agent_operations() {
        let agent = CommandDefinition::scene_agent(0x1000_0100, 3);
        let apply = agent.scene_apply(2, 5).unwrap();
        assert_eq!(apply.property_index, 7);
        assert_eq!(apply.param_count, 1);
        assert_eq!(apply.param_data, vec![0x00, 0x02, 0x00, 0x05]);
        assert_eq!(apply.data_type(), DataType::UInt32);

        let previous = agent.scene_previous().unwrap();
        assert_eq!(previous.property_index, 8);
        assert_eq!(previous.param_count, 0);
        assert_eq!(previous.data_type(), DataType::None);
        assert_eq!(agent.scene_next().unwrap().property_index, 9);

        assert!(gain().scene_apply(1, 1).is_none());
        assert!(gain().scene_next().is_none());
    }

    #[test]
    fn test_to_command() {
        let command = gain().get_value().to_command();
        assert_eq!(command.target_ono(), gain().target_ono);
        assert_eq!(command.method_def_level(), 5);
        assert_eq!(command.method_index(), 1);
        assert!(command.handle() >= 2);
    }
}
