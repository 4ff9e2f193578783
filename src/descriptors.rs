//! Interface descriptor accessors.
//!
//! libwayland-client only exports the `wl_interface` records of the core
//! protocol. The layer-shell and xdg-output records are generated by
//! `wayland-scanner` inside the protocol crates and are not reachable by
//! symbol name, so this module hands out their addresses through exported
//! functions. A foreign caller passes them to `wl_registry_bind` or
//! `wl_proxy_marshal_constructor` exactly like a C client would pass
//! `&zwlr_layer_shell_v1_interface`.

use once_cell::sync::Lazy;
use std::ptr;
use wayland_client::Proxy;
use wayland_sys::common::wl_interface;

use crate::protocol::wlr_layer_shell::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1, zwlr_layer_surface_v1::ZwlrLayerSurfaceV1,
};
use crate::protocol::xdg_output::{
    zxdg_output_manager_v1::ZxdgOutputManagerV1, zxdg_output_v1::ZxdgOutputV1,
};

/// Address of a static `wl_interface`, resolved once per process.
pub struct Descriptor(*const wl_interface);

// SAFETY: the record lives in static storage and is never written to.
unsafe impl Send for Descriptor {}
unsafe impl Sync for Descriptor {}

impl Descriptor {
    fn of<I: Proxy>() -> Self {
        Self(
            I::interface()
                .c_ptr
                .map_or(ptr::null(), |iface| iface as *const wl_interface),
        )
    }

    pub fn as_ptr(&self) -> *const wl_interface {
        self.0
    }
}

pub static LAYER_SHELL: Lazy<Descriptor> = Lazy::new(Descriptor::of::<ZwlrLayerShellV1>);
pub static LAYER_SURFACE: Lazy<Descriptor> = Lazy::new(Descriptor::of::<ZwlrLayerSurfaceV1>);
pub static XDG_OUTPUT_MANAGER: Lazy<Descriptor> = Lazy::new(Descriptor::of::<ZxdgOutputManagerV1>);
pub static XDG_OUTPUT: Lazy<Descriptor> = Lazy::new(Descriptor::of::<ZxdgOutputV1>);

#[no_mangle]
pub extern "C" fn get_zwlr_layer_shell_v1_interface() -> *const wl_interface {
    LAYER_SHELL.as_ptr()
}

#[no_mangle]
pub extern "C" fn get_zwlr_layer_surface_v1_interface() -> *const wl_interface {
    LAYER_SURFACE.as_ptr()
}

#[no_mangle]
pub extern "C" fn get_zxdg_output_manager_v1_interface() -> *const wl_interface {
    XDG_OUTPUT_MANAGER.as_ptr()
}

#[no_mangle]
pub extern "C" fn get_zxdg_output_v1_interface() -> *const wl_interface {
    XDG_OUTPUT.as_ptr()
}
