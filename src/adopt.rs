//! Hand raw proxies created by the shim over to `wayland-client`.
//!
//! The exported constructors return bare `wl_proxy` pointers with no
//! listener attached. A Rust caller that wants typed requests and
//! [`Dispatch`]-based events registers them with its connection here.

use thiserror::Error;
use wayland_backend::client::InvalidId;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_sys::client::wl_proxy;

#[derive(Debug, Error)]
pub enum AdoptError {
    #[error("libwayland returned a null {0}")]
    Null(&'static str),

    #[error("adopted {interface} is not usable: {source}")]
    Invalid {
        interface: &'static str,
        #[source]
        source: InvalidId,
    },
}

/// Register `ptr` with `conn` so its events are delivered on `qh`.
///
/// # Safety
///
/// `ptr` must be a live proxy of interface `I` created on `conn`'s display,
/// with no listener or dispatcher attached yet. After this call the
/// returned object owns the proxy; destroy it through `I`'s destructor
/// request, never through libwayland directly.
pub unsafe fn adopt<I, U, D>(
    conn: &Connection,
    qh: &QueueHandle<D>,
    ptr: *mut wl_proxy,
    udata: U,
) -> Result<I, AdoptError>
where
    I: Proxy + 'static,
    U: Send + Sync + 'static,
    D: Dispatch<I, U> + 'static,
{
    if ptr.is_null() {
        return Err(AdoptError::Null(I::interface().name));
    }

    let data = qh.make_data::<I, U>(udata);
    let id = conn.backend().manage_object(I::interface(), ptr, data);
    I::from_id(conn, id).map_err(|source| AdoptError::Invalid {
        interface: I::interface().name,
        source,
    })
}

/// Raw pointer of a proxy owned by `wayland-client`, for passing to the
/// exported constructors.
pub fn raw<I: Proxy>(proxy: &I) -> *mut wl_proxy {
    proxy.id().as_ptr()
}
