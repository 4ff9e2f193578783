//! Scenarios that need a running compositor with wlr-layer-shell.
//!
//! Each test returns early when WAYLAND_DISPLAY is unset or the compositor
//! does not advertise the globals it needs.

use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use wayland_client::globals::{registry_queue_init, GlobalList, GlobalListContents};
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_compositor::WlCompositor, wl_registry::WlRegistry, wl_shm::WlShm,
    wl_shm_pool::WlShmPool, wl_surface::WlSurface,
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wlr_interop::adopt::{adopt, raw};
use wlr_interop::config::Config;
use wlr_interop::marshal::bind_global;
use wlr_interop::probe::Probe;
use wlr_interop::protocol::wlr_layer_shell::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1, zwlr_layer_surface_v1::ZwlrLayerSurfaceV1,
};
use wlr_interop::protocol::{Layer, LAYER_BOTTOM, LAYER_SHELL_INTERFACE_NAME};
use wlr_interop::shm::ShmFile;
use wlr_interop::{
    create_buffer_from_pool, create_layer_surface, create_shm_pool,
    get_zwlr_layer_shell_v1_interface,
};

#[derive(Default)]
struct TestState {
    configure: Option<(u32, u32)>,
}

impl Dispatch<WlRegistry, GlobalListContents> for TestState {
    fn event(
        _: &mut Self,
        _: &WlRegistry,
        _: <WlRegistry as Proxy>::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for TestState {
    fn event(
        state: &mut Self,
        layer_surface: &ZwlrLayerSurfaceV1,
        event: <ZwlrLayerSurfaceV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use wlr_interop::protocol::wlr_layer_shell::zwlr_layer_surface_v1::Event;
        if let Event::Configure { serial, width, height } = event {
            layer_surface.ack_configure(serial);
            state.configure = Some((width, height));
        }
    }
}

macro_rules! ignore_events {
    ($($iface:ty),*) => {
        $(
            impl Dispatch<$iface, ()> for TestState {
                fn event(
                    _: &mut Self,
                    _: &$iface,
                    _: <$iface as Proxy>::Event,
                    _: &(),
                    _: &Connection,
                    _: &QueueHandle<Self>,
                ) {
                }
            }
        )*
    };
}

ignore_events!(WlCompositor, WlSurface, WlShm, WlShmPool, WlBuffer, ZwlrLayerShellV1);

struct Session {
    conn: Connection,
    globals: GlobalList,
    queue: EventQueue<TestState>,
    state: TestState,
}

fn connect() -> Option<Session> {
    if std::env::var_os("WAYLAND_DISPLAY").is_none() {
        eprintln!("WAYLAND_DISPLAY not set, skipping");
        return None;
    }
    let conn = Connection::connect_to_env().ok()?;
    let (globals, queue) = registry_queue_init::<TestState>(&conn).ok()?;
    Some(Session {
        conn,
        globals,
        queue,
        state: TestState::default(),
    })
}

impl Session {
    fn layer_shell(&self) -> Option<ZwlrLayerShellV1> {
        let (name, _) = self.globals.contents().with_list(|list| {
            list.iter()
                .find(|g| g.interface == LAYER_SHELL_INTERFACE_NAME)
                .map(|g| (g.name, g.version))
        })?;
        let qh = self.queue.handle();
        let ptr = unsafe {
            bind_global(
                raw(self.globals.registry()),
                name,
                get_zwlr_layer_shell_v1_interface(),
                1,
            )
        };
        unsafe { adopt(&self.conn, &qh, ptr, ()) }.ok()
    }
}

#[test]
fn test_layer_surface_receives_configure() {
    let Some(mut session) = connect() else { return };
    let Some(layer_shell) = session.layer_shell() else {
        eprintln!("compositor lacks {}, skipping", LAYER_SHELL_INTERFACE_NAME);
        return;
    };
    let qh = session.queue.handle();
    let compositor: WlCompositor = session.globals.bind(&qh, 1..=4, ()).unwrap();
    let surface = compositor.create_surface(&qh, ());

    let namespace = std::ffi::CString::new("wlr-interop-test").unwrap();
    let ptr = unsafe {
        create_layer_surface(
            raw(&layer_shell),
            raw(&surface),
            ptr::null_mut(),
            LAYER_BOTTOM,
            namespace.as_ptr(),
        )
    };
    assert!(!ptr.is_null());

    let layer_surface: ZwlrLayerSurfaceV1 =
        unsafe { adopt(&session.conn, &qh, ptr, ()) }.unwrap();
    assert_eq!(layer_surface.version(), layer_shell.version());

    layer_surface.set_size(0, 32);
    layer_surface.set_anchor(wlr_interop::protocol::bar_anchor_flags(false));
    surface.commit();
    session.queue.roundtrip(&mut session.state).unwrap();

    let (width, height) = session.state.configure.expect("no configure event");
    assert!(width > 0);
    assert_eq!(height, 32);

    layer_surface.destroy();
    surface.destroy();
}

#[test]
fn test_shm_pool_and_buffer_within_bounds() {
    let Some(mut session) = connect() else { return };
    let qh = session.queue.handle();
    let shm: WlShm = session.globals.bind(&qh, 1..=1, ()).unwrap();

    let (width, height, stride) = (16, 16, 64);
    let file = ShmFile::create(stride as usize * height as usize).unwrap();
    let pool_ptr = unsafe { create_shm_pool(raw(&shm), file.raw_fd(), file.size() as i32) };
    assert!(!pool_ptr.is_null());
    let pool: WlShmPool = unsafe { adopt(&session.conn, &qh, pool_ptr, ()) }.unwrap();

    let buffer_ptr = unsafe { create_buffer_from_pool(raw(&pool), 0, width, height, stride, 0) };
    assert!(!buffer_ptr.is_null());
    let buffer: WlBuffer = unsafe { adopt(&session.conn, &qh, buffer_ptr, ()) }.unwrap();

    // Caller kept the descriptor; closing it does not affect the pool
    drop(file);
    session.queue.roundtrip(&mut session.state).unwrap();

    buffer.destroy();
    pool.destroy();
}

#[test]
fn test_oversized_buffer_fails_in_compositor_not_wrapper() {
    let Some(mut session) = connect() else { return };
    let qh = session.queue.handle();
    let shm: WlShm = session.globals.bind(&qh, 1..=1, ()).unwrap();

    let file = ShmFile::create(4096).unwrap();
    let pool_ptr = unsafe { create_shm_pool(raw(&shm), file.raw_fd(), 4096) };
    let pool: WlShmPool = unsafe { adopt(&session.conn, &qh, pool_ptr, ()) }.unwrap();

    // 64 rows of 256 bytes need 16 KiB
    let buffer_ptr = unsafe { create_buffer_from_pool(raw(&pool), 0, 64, 64, 256, 0) };
    assert!(!buffer_ptr.is_null());
    let _buffer: WlBuffer = unsafe { adopt(&session.conn, &qh, buffer_ptr, ()) }.unwrap();

    assert!(session.queue.roundtrip(&mut session.state).is_err());
    assert!(session.conn.protocol_error().is_some());
}

#[test]
fn test_probe_maps_bottom_layer_bar() {
    let Some(session) = connect() else { return };
    if session.layer_shell().is_none() {
        return;
    }
    drop(session);

    let config = Config {
        layer: Layer::Bottom,
        height: 24,
        ..Config::default()
    };
    let report = Probe::new(config, Arc::new(AtomicBool::new(true)))
        .run()
        .unwrap();
    assert!(report.width > 0);
    assert_eq!(report.height, 24);
}
