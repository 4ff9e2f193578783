//! C ABI shim for wlr-layer-shell and xdg-output clients.
//!
//! Built as a `cdylib`, this crate exports seven plain C symbols for
//! runtimes that load libwayland-client through a foreign-function layer
//! without varargs support:
//!
//! * `get_zwlr_layer_shell_v1_interface`, `get_zwlr_layer_surface_v1_interface`,
//!   `get_zxdg_output_manager_v1_interface`, `get_zxdg_output_v1_interface`
//!   return the static `wl_interface` records libwayland-client does not
//!   export itself.
//! * `create_layer_surface`, `create_shm_pool` and `create_buffer_from_pool`
//!   are fixed-arity versions of the corresponding constructor requests.
//!
//! Every export is a stateless pass-through. Handles go in and come out as
//! raw `wl_proxy` pointers, and ownership of anything created belongs to the
//! caller.
//!
//! The remaining modules are for Rust users: protocol constants, a helper
//! to create memory-backed files for shm pools, adoption of raw proxies into
//! `wayland-client`, and the probe behind the `wlr-interop-probe` binary.

pub mod adopt;
pub mod config;
pub mod descriptors;
pub mod marshal;
pub mod probe;
pub mod protocol;
pub mod shm;

#[cfg(test)]
mod test_util;

pub use descriptors::{
    get_zwlr_layer_shell_v1_interface, get_zwlr_layer_surface_v1_interface,
    get_zxdg_output_manager_v1_interface, get_zxdg_output_v1_interface,
};
pub use marshal::{create_buffer_from_pool, create_layer_surface, create_shm_pool};
