//! Protocol constants for the interfaces the shim exposes.
//!
//! Foreign callers drive the layer surface and xdg-output objects with raw
//! `wl_proxy_marshal` calls, so they need the wire values of every enum and
//! the opcode of every request. The typed bindings from
//! `wayland-protocols-wlr` and `wayland-protocols` are re-exported for Rust
//! callers.

pub use wayland_protocols::xdg::xdg_output::zv1::client as xdg_output;
pub use wayland_protocols_wlr::layer_shell::v1::client as wlr_layer_shell;

pub use wlr_layer_shell::zwlr_layer_shell_v1::Layer;
pub use wlr_layer_shell::zwlr_layer_surface_v1::{Anchor, KeyboardInteractivity};

pub const LAYER_SHELL_INTERFACE_NAME: &str = "zwlr_layer_shell_v1";
pub const XDG_OUTPUT_MANAGER_INTERFACE_NAME: &str = "zxdg_output_manager_v1";

/// Version bound for `zwlr_layer_shell_v1`. Every layer-shell compositor
/// supports v1, and nothing used here needs a later one.
pub const LAYER_SHELL_VERSION: u32 = 1;
/// Version bound for `zxdg_output_manager_v1`. v2 added the name and
/// description events; v3 deprecates `zxdg_output_v1.done` in favour of
/// `wl_output.done`, so output info is complete without it.
pub const XDG_OUTPUT_VERSION: u32 = 3;

pub const LAYER_BACKGROUND: u32 = 0;
pub const LAYER_BOTTOM: u32 = 1;
pub const LAYER_TOP: u32 = 2;
pub const LAYER_OVERLAY: u32 = 3;

pub const ANCHOR_TOP: u32 = 1;
pub const ANCHOR_BOTTOM: u32 = 2;
pub const ANCHOR_LEFT: u32 = 4;
pub const ANCHOR_RIGHT: u32 = 8;

pub const KEYBOARD_INTERACTIVITY_NONE: u32 = 0;
pub const KEYBOARD_INTERACTIVITY_EXCLUSIVE: u32 = 1;
pub const KEYBOARD_INTERACTIVITY_ON_DEMAND: u32 = 2;

/// Request opcodes, in protocol XML order.
pub mod opcode {
    pub const WL_REGISTRY_BIND: u32 = 0;
    pub const WL_SHM_CREATE_POOL: u32 = 0;
    pub const WL_SHM_POOL_CREATE_BUFFER: u32 = 0;

    pub const ZWLR_LAYER_SHELL_V1_GET_LAYER_SURFACE: u32 = 0;
    pub const ZWLR_LAYER_SHELL_V1_DESTROY: u32 = 1;

    pub const ZWLR_LAYER_SURFACE_V1_SET_SIZE: u32 = 0;
    pub const ZWLR_LAYER_SURFACE_V1_SET_ANCHOR: u32 = 1;
    pub const ZWLR_LAYER_SURFACE_V1_SET_EXCLUSIVE_ZONE: u32 = 2;
    pub const ZWLR_LAYER_SURFACE_V1_SET_MARGIN: u32 = 3;
    pub const ZWLR_LAYER_SURFACE_V1_SET_KEYBOARD_INTERACTIVITY: u32 = 4;
    pub const ZWLR_LAYER_SURFACE_V1_GET_POPUP: u32 = 5;
    pub const ZWLR_LAYER_SURFACE_V1_ACK_CONFIGURE: u32 = 6;
    pub const ZWLR_LAYER_SURFACE_V1_DESTROY: u32 = 7;
    pub const ZWLR_LAYER_SURFACE_V1_SET_LAYER: u32 = 8;

    pub const ZXDG_OUTPUT_MANAGER_V1_DESTROY: u32 = 0;
    pub const ZXDG_OUTPUT_MANAGER_V1_GET_XDG_OUTPUT: u32 = 1;

    pub const ZXDG_OUTPUT_V1_DESTROY: u32 = 0;
}

/// Anchor bits for a full-width bar along the top or bottom edge.
pub fn bar_anchor(top: bool) -> u32 {
    let edge = if top { ANCHOR_TOP } else { ANCHOR_BOTTOM };
    edge | ANCHOR_LEFT | ANCHOR_RIGHT
}

/// Same as [`bar_anchor`], as the typed bitflags.
pub fn bar_anchor_flags(top: bool) -> Anchor {
    Anchor::from_bits_truncate(bar_anchor(top))
}
