//! Data records exchanged with sway
//!
//! These mirror the JSON shapes of sway-ipc(7). Every record tolerates
//! missing fields (`#[serde(default)]`) so that older or newer sway versions
//! that omit or add keys still decode.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Geometry of a node, workspace or output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// X11 properties of an Xwayland view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowProperties {
    pub title: Option<String>,
    pub class: Option<String>,
    pub instance: Option<String>,
    #[serde(rename = "window_role")]
    pub role: Option<String>,
    #[serde(rename = "window_type")]
    pub window_type: Option<String>,
    pub transient_for: Option<i64>,
}

/// Application and user idle inhibitor state of a view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleInhibitors {
    /// "enabled" or "none"
    pub application: String,
    /// "focus", "fullscreen", "open", "visible" or "none"
    pub user: String,
}

/// One element of the layout tree as sway sends it
///
/// Children are owned in two ordered lists: tiling (`nodes`) and floating
/// (`floating_nodes`). `null` entries in either list are dropped while
/// decoding. Use [`crate::Tree`] to search the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// Internal unique ID
    pub id: i64,

    /// Output name, workspace name or window title; `__i3_scratch` for the scratchpad
    pub name: Option<String>,

    /// "root", "output", "workspace", "con" or "floating_con"
    #[serde(rename = "type")]
    pub node_type: String,

    /// "normal", "none", "pixel" or "csd"
    pub border: String,

    pub current_border_width: i64,

    /// "splith", "splitv", "stacked", "tabbed" or "output"
    pub layout: String,

    /// "vertical", "horizontal" or "none"
    pub orientation: String,

    /// Fraction of the parent this node takes up; `None` for root and special nodes
    pub percent: Option<f64>,

    pub rect: Rect,
    pub window_rect: Rect,
    pub deco_rect: Rect,
    pub geometry: Rect,

    /// Whether the node or any descendant has the urgent hint set
    pub urgent: Option<bool>,

    pub sticky: bool,

    pub marks: Vec<String>,

    /// Whether the node is focused by the default seat
    pub focused: bool,

    /// Child IDs in focus order
    pub focus: Vec<i64>,

    /// Tiling children
    #[serde(deserialize_with = "nodes_skipping_null")]
    pub nodes: Vec<Node>,

    /// Floating children
    #[serde(deserialize_with = "nodes_skipping_null")]
    pub floating_nodes: Vec<Node>,

    /// (Workspaces) textual layout, e.g. `H[T[kitty] firefox]`
    pub representation: Option<String>,

    /// (Containers and views) 0 none, 1 workspace, 2 global
    pub fullscreen_mode: Option<i64>,

    /// (Views) xdg-shell application ID
    pub app_id: Option<String>,

    /// (Views) PID of the owning process
    pub pid: Option<u32>,

    /// (Views) whether the view is visible
    pub visible: Option<bool>,

    /// (Views) "xdg_shell" or "xwayland"
    pub shell: Option<String>,

    /// (Views) whether the view is inhibiting idle
    pub inhibit_idle: Option<bool>,

    pub idle_inhibitors: Option<IdleInhibitors>,

    /// (Xwayland views) X11 window ID
    pub window: Option<i64>,

    /// (Xwayland views) X11 window properties
    pub window_properties: Option<WindowProperties>,
}

impl Node {
    /// Wayland app_id, falling back to the X11 class for Xwayland views
    pub fn app_identifier(&self) -> Option<&str> {
        self.app_id.as_deref().or_else(|| self.window_class())
    }

    /// X11 class of an Xwayland view
    pub fn window_class(&self) -> Option<&str> {
        self.window_properties
            .as_ref()
            .and_then(|props| props.class.as_deref())
    }
}

fn nodes_skipping_null<'de, D>(deserializer: D) -> Result<Vec<Node>, D::Error>
where
    D: Deserializer<'de>,
{
    let nodes: Option<Vec<Option<Node>>> = Option::deserialize(deserializer)?;
    Ok(nodes.unwrap_or_default().into_iter().flatten().collect())
}

/// Per-statement result of RUN_COMMAND
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCommandReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the statement could not be parsed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub parse_error: bool,
}

/// Entry of GET_WORKSPACES
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub id: i64,
    /// Workspace number, or -1 if the name does not start with one
    pub num: i64,
    pub name: String,
    pub visible: bool,
    pub focused: bool,
    pub urgent: bool,
    pub rect: Rect,
    pub output: String,
}

/// Refresh rate, sent by sway as integer millihertz
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Refresh(pub f64);

impl Refresh {
    pub fn hz(self) -> f64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Refresh {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millihertz = f64::deserialize(deserializer)?;
        Ok(Refresh(millihertz / 1000.0))
    }
}

impl Serialize for Refresh {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64((self.0 * 1000.0).round() as i64)
    }
}

/// Output mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputMode {
    pub width: i64,
    pub height: i64,
    pub refresh: Refresh,
}

/// Entry of GET_OUTPUTS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    /// Connector name on DRM, e.g. `DP-1`
    pub name: String,
    pub make: String,
    pub model: String,
    pub serial: String,
    pub active: bool,
    pub dpms: bool,
    /// Always false under Wayland
    pub primary: bool,
    /// -1 for disabled outputs
    pub scale: f64,
    /// "rgb", "bgr", "vrgb", "vbgr" or "none"
    pub subpixel_hinting: String,
    /// "normal", "90", "180", "270", "flipped-90", "flipped-180" or "flipped-270"
    pub transform: String,
    pub current_workspace: Option<String>,
    pub modes: Vec<OutputMode>,
    pub current_mode: OutputMode,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfigGaps {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

/// Bar colors, all `#RRGGBBAA`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfigColors {
    pub background: String,
    pub statusline: String,
    pub separator: String,
    pub focused_background: String,
    pub focused_statusline: String,
    pub focused_separator: String,
    pub focused_workspace_text: String,
    pub focused_workspace_bg: String,
    pub focused_workspace_border: String,
    pub active_workspace_text: String,
    pub active_workspace_bg: String,
    pub active_workspace_border: String,
    pub inactive_workspace_text: String,
    pub inactive_workspace_bg: String,
    pub inactive_workspace_border: String,
    pub urgent_workspace_text: String,
    pub urgent_workspace_bg: String,
    pub urgent_workspace_border: String,
    pub binding_mode_text: String,
    pub binding_mode_bg: String,
    pub binding_mode_border: String,
}

/// Reply of GET_BAR_CONFIG with a bar ID, and payload of barconfig_update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    pub id: String,
    /// "dock", "hide" or "invisible"
    pub mode: String,
    /// "bottom" or "top"
    pub position: String,
    pub status_command: Option<String>,
    pub font: String,
    pub workspace_buttons: bool,
    pub workspace_min_width: i64,
    pub binding_mode_indicator: bool,
    pub verbose: bool,
    pub colors: BarConfigColors,
    pub gaps: BarConfigGaps,
    /// 0 sizes the bar from the font
    pub bar_height: i64,
    pub status_padding: i64,
    pub status_edge_padding: i64,
}

/// Reply of GET_VERSION
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Version {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    pub human_readable: String,
    pub loaded_config_file_name: String,
}

/// Reply of GET_CONFIG
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub config: String,
}

/// Reply of SEND_TICK
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickReply {
    pub success: bool,
}

/// libinput settings of a device; only supported properties are present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibInput {
    pub send_events: Option<String>,
    pub tap: Option<String>,
    pub tap_button_map: Option<String>,
    pub tap_drag: Option<String>,
    pub tap_drag_lock: Option<String>,
    pub accel_speed: Option<f64>,
    pub accel_profile: Option<String>,
    pub natural_scroll: Option<String>,
    pub left_handed: Option<String>,
    pub click_method: Option<String>,
    pub middle_emulation: Option<String>,
    pub scroll_method: Option<String>,
    pub scroll_button: Option<i64>,
    pub dwt: Option<String>,
    pub calibration_matrix: Option<[f64; 6]>,
}

/// Entry of GET_INPUTS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    pub identifier: String,
    pub name: String,
    pub vendor: i64,
    pub product: i64,
    /// "keyboard", "pointer", "touch", "tablet_tool", "tablet_pad" or "switch"
    #[serde(rename = "type")]
    pub input_type: String,
    pub xkb_active_layout_name: Option<String>,
    pub xkb_layout_names: Vec<String>,
    pub xkb_active_layout_index: Option<i64>,
    pub libinput: Option<LibInput>,
}

/// Entry of GET_SEATS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seat {
    pub name: String,
    pub capabilities: i64,
    /// ID of the focused node, 0 when a layer surface or unmanaged window has focus
    pub focus: i64,
    pub devices: Vec<Input>,
}

// =============================================================================
// Event payloads
// =============================================================================

/// A workspace was initialized, emptied, focused, moved, renamed, marked
/// urgent, or the config was reloaded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceEvent {
    pub change: String,
    /// The affected workspace; `None` for "reload"
    pub current: Option<Node>,
    /// For "focus", the workspace being switched away from
    pub old: Option<Node>,
}

/// The binding mode changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeEvent {
    /// Name of the mode that became active
    pub change: String,
    pub pango_markup: bool,
}

/// A view changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowEvent {
    /// "new", "close", "focus", "title", "fullscreen_mode", "move",
    /// "floating", "urgent" or "mark"
    pub change: String,
    pub container: Node,
}

impl WindowEvent {
    pub fn is_focus(&self) -> bool {
        self.change == "focus"
    }
}

/// Payload of barconfig_update; identical to GET_BAR_CONFIG with an ID
pub type BarConfigUpdateEvent = BarConfig;

/// Binding that was executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binding {
    pub command: String,
    pub event_state_mask: Vec<String>,
    /// Key code for bindcodes, X11 button for mouse bindings, else 0
    pub input_code: i64,
    /// Keysym for bindsyms
    pub symbol: Option<String>,
    /// "keyboard" or "mouse"
    pub input_type: String,
}

/// A binding was run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingEvent {
    /// Currently always "run"
    pub change: String,
    pub binding: Binding,
}

/// The IPC is shutting down
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownEvent {
    /// Currently always "exit"
    pub change: String,
}

/// Sent on subscription to ticks and for every SEND_TICK
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickEvent {
    /// True for the event sent right after subscribing
    pub first: bool,
    pub payload: String,
}

/// A bar's visibility changed because of a modifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarStateUpdateEvent {
    pub id: String,
    pub visible_by_modifier: bool,
}

/// An input device was added, removed or reconfigured
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputEvent {
    /// "added", "removed", "xkb_keymap", "xkb_layout" or "libinput_config"
    pub change: String,
    pub input: Input,
}
