//! UI element nodes

use serde::Serialize;

use super::{Parameters, Vec2};
use crate::overlay::Record;

/// Flag bit set when the element is visible on its own
pub const VISIBLE_FLAG: u32 = 1 << 11;

const DEFAULT_ZOOM: f32 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiElement {
    pub parent: u64,
    pub flags: u32,
    pub scale_index: u8,
    pub local_scale: f32,
    pub relative_position: Vec2,
    pub unscaled_size: Vec2,
    /// Position in window space: `relative_position * local_scale / window_scale`
    pub position: Vec2,
    pub size: Vec2,
    pub visible: bool,
}

impl UiElement {
    pub fn apply(&mut self, record: &Record, params: &Parameters) {
        self.parent = record.address("parent_ptr").unwrap_or_default();
        self.flags = record.u64("flags").unwrap_or_default() as u32;
        self.scale_index = record.u64("scale_index").unwrap_or_default() as u8;
        self.local_scale = record.f32("local_scale").unwrap_or_default();
        self.relative_position = Vec2::new(
            record.f32("relative_x").unwrap_or_default(),
            record.f32("relative_y").unwrap_or_default(),
        );
        self.unscaled_size = Vec2::new(
            record.f32("unscaled_w").unwrap_or_default(),
            record.f32("unscaled_h").unwrap_or_default(),
        );

        let factor = self.local_scale / params.window_scale();
        self.position = self.relative_position * factor;
        self.size = self.unscaled_size * factor;
        self.visible = self.flags & VISIBLE_FLAG != 0;
    }

    pub fn describe(&self) -> String {
        format!(
            "parent {:#X} flags {:#010X} visible {} pos {} size {} scale {}",
            self.parent, self.flags, self.visible, self.position, self.size, self.local_scale
        )
    }
}

/// The map UI element: a UI element plus pan and zoom state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapElement {
    pub element: UiElement,
    /// Current pan, divided by the window scale
    pub shift: Vec2,
    /// Pan at rest, divided by the window scale
    pub default_shift: Vec2,
    pub zoom: f32,
}

impl Default for MapElement {
    fn default() -> Self {
        Self {
            element: UiElement::default(),
            shift: Vec2::default(),
            default_shift: Vec2::default(),
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl MapElement {
    pub fn apply(&mut self, record: &Record, params: &Parameters) {
        self.element.apply(record, params);

        let scale = params.window_scale();
        self.shift = Vec2::new(
            record.f32("shift_x").unwrap_or_default(),
            record.f32("shift_y").unwrap_or_default(),
        ) / scale;
        self.default_shift = Vec2::new(
            record.f32("default_shift_x").unwrap_or_default(),
            record.f32("default_shift_y").unwrap_or_default(),
        ) / scale;
        self.zoom = record.f32("zoom").unwrap_or(DEFAULT_ZOOM);
    }

    pub fn describe(&self) -> String {
        format!(
            "{}\nshift {} default shift {} zoom {}",
            self.element.describe(),
            self.shift,
            self.default_shift,
            self.zoom
        )
    }
}
