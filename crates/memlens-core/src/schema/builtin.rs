//! Built-in structure layouts for the supported target

use super::{DecodeKind, FieldDef, SchemaSet, StructSchema};

pub const BUILTIN_SCHEMAS_VERSION: &str = "builtin-1";

pub const UI_ELEMENT_BASE: &str = "UiElementBase";
pub const MAP_UI_ELEMENT: &str = "MapUiElement";
pub const GAME_STATE_STATIC: &str = "GameStateStatic";
pub const GAME_STATE: &str = "GameState";

/// Leading fields shared by every UI element
fn ui_element_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("self_ptr", 0x00, DecodeKind::Address),
        FieldDef::new("parent_ptr", 0x08, DecodeKind::Address),
        FieldDef::new("flags", 0x10, DecodeKind::U32),
        FieldDef::new("scale_index", 0x14, DecodeKind::U8),
        FieldDef::new("local_scale", 0x18, DecodeKind::F32),
        FieldDef::new("relative_x", 0x1C, DecodeKind::F32),
        FieldDef::new("relative_y", 0x20, DecodeKind::F32),
        FieldDef::new("unscaled_w", 0x24, DecodeKind::F32),
        FieldDef::new("unscaled_h", 0x28, DecodeKind::F32),
    ]
}

pub fn builtin_schemas() -> SchemaSet {
    let ui_element = StructSchema::new(UI_ELEMENT_BASE, 0x30, ui_element_fields())
        .with_self_field("self_ptr");

    let mut map_fields = ui_element_fields();
    map_fields.extend([
        FieldDef::new("shift_x", 0x30, DecodeKind::F32),
        FieldDef::new("shift_y", 0x34, DecodeKind::F32),
        FieldDef::new("default_shift_x", 0x38, DecodeKind::F32),
        FieldDef::new("default_shift_y", 0x3C, DecodeKind::F32),
        FieldDef::new("zoom", 0x40, DecodeKind::F32),
    ]);
    let map_element = StructSchema::new(MAP_UI_ELEMENT, 0x48, map_fields).with_self_field("self_ptr");

    let game_state_static = StructSchema::new(
        GAME_STATE_STATIC,
        0x08,
        vec![FieldDef::new("game_state", 0x00, DecodeKind::Address)],
    );

    let game_state = StructSchema::new(
        GAME_STATE,
        0x58,
        vec![
            FieldDef::new("states_head", 0x48, DecodeKind::Address),
            FieldDef::new("states_size", 0x50, DecodeKind::U64),
        ],
    );

    SchemaSet {
        version: BUILTIN_SCHEMAS_VERSION.to_string(),
        schemas: vec![ui_element, map_element, game_state_static, game_state],
    }
}
