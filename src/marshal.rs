//! Fixed-arity constructors for requests that create new objects.
//!
//! libwayland's C helpers for these requests are `static inline` functions
//! built on the variadic `wl_proxy_marshal_flags`, which foreign callers
//! without varargs support cannot reach. Each wrapper here lays its
//! arguments out in a `wl_argument` array and goes through
//! `wl_proxy_marshal_array_constructor_versioned` instead, so every export
//! has a plain fixed C signature.
//!
//! Nothing here validates, logs or retains a handle. Whatever libwayland
//! returns (including null) is handed straight back to the caller, and
//! protocol errors surface later through the display connection.

use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use wayland_client::protocol::{wl_buffer::WlBuffer, wl_shm_pool::WlShmPool};
use wayland_client::Proxy;
use wayland_sys::client::{
    wl_proxy, wl_proxy_get_version, wl_proxy_marshal_array_constructor_versioned,
};
use wayland_sys::common::{wl_argument, wl_interface};

use crate::descriptors;
use crate::protocol::opcode;

/// Placeholder for the `new_id` slot; libwayland fills it in with the new
/// proxy while marshalling.
const NEW_ID: wl_argument = wl_argument { o: ptr::null::<c_void>() as _ };

fn interface_of<I: Proxy>() -> *const wl_interface {
    I::interface()
        .c_ptr
        .map_or(ptr::null(), |iface| iface as *const wl_interface)
}

/// Send `opcode` on `proxy` with `args`, creating an object of `interface`
/// at the parent's version.
///
/// # Safety
///
/// `proxy` must be a live `wl_proxy`, and `args` must match the request
/// signature exactly.
unsafe fn construct(
    proxy: *mut wl_proxy,
    opcode: u32,
    args: &mut [wl_argument],
    interface: *const wl_interface,
) -> *mut wl_proxy {
    let version = wl_proxy_get_version(proxy);
    wl_proxy_marshal_array_constructor_versioned(
        proxy,
        opcode,
        args.as_mut_ptr(),
        interface,
        version,
    )
}

/// Argument array for `zwlr_layer_shell_v1.get_layer_surface` (`nooun`).
pub(crate) fn layer_surface_args(
    surface: *mut wl_proxy,
    output: *mut wl_proxy,
    layer: u32,
    namespace: *const c_char,
) -> [wl_argument; 5] {
    [
        NEW_ID,
        wl_argument { o: surface as _ },
        wl_argument { o: output as _ },
        wl_argument { u: layer },
        wl_argument { s: namespace },
    ]
}

/// Argument array for `wl_shm.create_pool` (`nhi`).
pub(crate) fn shm_pool_args(fd: c_int, size: i32) -> [wl_argument; 3] {
    [NEW_ID, wl_argument { h: fd }, wl_argument { i: size }]
}

/// Argument array for `wl_shm_pool.create_buffer` (`niiiiu`).
pub(crate) fn buffer_args(
    offset: i32,
    width: i32,
    height: i32,
    stride: i32,
    format: u32,
) -> [wl_argument; 6] {
    [
        NEW_ID,
        wl_argument { i: offset },
        wl_argument { i: width },
        wl_argument { i: height },
        wl_argument { i: stride },
        wl_argument { u: format },
    ]
}

/// Create a `zwlr_layer_surface_v1` for `surface`.
///
/// `output` may be null to let the compositor pick one. The new object has
/// the layer shell's version and belongs to the caller.
///
/// # Safety
///
/// `layer_shell` and `surface` must be live proxies on the same display,
/// `output` must be null or a live `wl_output`, and `namespace` must point
/// to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn create_layer_surface(
    layer_shell: *mut wl_proxy,
    surface: *mut wl_proxy,
    output: *mut wl_proxy,
    layer: u32,
    namespace: *const c_char,
) -> *mut wl_proxy {
    let mut args = layer_surface_args(surface, output, layer, namespace);
    construct(
        layer_shell,
        opcode::ZWLR_LAYER_SHELL_V1_GET_LAYER_SURFACE,
        &mut args,
        descriptors::LAYER_SURFACE.as_ptr(),
    )
}

/// Create a `wl_shm_pool` over `size` bytes of `fd`.
///
/// libwayland sends a duplicate of `fd`; the caller still owns the original
/// and may close it once this returns.
///
/// # Safety
///
/// `shm` must be a live `wl_shm` proxy.
#[no_mangle]
pub unsafe extern "C" fn create_shm_pool(
    shm: *mut wl_proxy,
    fd: c_int,
    size: i32,
) -> *mut wl_proxy {
    let mut args = shm_pool_args(fd, size);
    construct(
        shm,
        opcode::WL_SHM_CREATE_POOL,
        &mut args,
        interface_of::<WlShmPool>(),
    )
}

/// Create a `wl_buffer` describing a region of `pool`.
///
/// The geometry is not checked against the pool size; the compositor
/// rejects an out-of-bounds buffer with a protocol error.
///
/// # Safety
///
/// `pool` must be a live `wl_shm_pool` proxy.
#[no_mangle]
pub unsafe extern "C" fn create_buffer_from_pool(
    pool: *mut wl_proxy,
    offset: i32,
    width: i32,
    height: i32,
    stride: i32,
    format: u32,
) -> *mut wl_proxy {
    let mut args = buffer_args(offset, width, height, stride, format);
    construct(
        pool,
        opcode::WL_SHM_POOL_CREATE_BUFFER,
        &mut args,
        interface_of::<WlBuffer>(),
    )
}

/// Bind global `name` from `registry` as `interface` at `version`.
///
/// This is `wl_registry_bind` for descriptors that only exist as raw
/// pointers, such as the ones returned by [`crate::descriptors`].
///
/// # Safety
///
/// `registry` must be a live `wl_registry` proxy and `interface` must point
/// to a valid `wl_interface` whose name the compositor advertised as `name`.
pub unsafe fn bind_global(
    registry: *mut wl_proxy,
    name: u32,
    interface: *const wl_interface,
    version: u32,
) -> *mut wl_proxy {
    let mut args = [
        wl_argument { u: name },
        wl_argument { s: (*interface).name },
        wl_argument { u: version },
        NEW_ID,
    ];
    wl_proxy_marshal_array_constructor_versioned(
        registry,
        opcode::WL_REGISTRY_BIND,
        args.as_mut_ptr(),
        interface,
        version,
    )
}
