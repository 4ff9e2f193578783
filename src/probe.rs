//! End-to-end check of the exported symbols against a live compositor.
//!
//! The probe binds `zwlr_layer_shell_v1` through the exported descriptor,
//! creates a layer surface, a shm pool and a buffer through the exported
//! constructors, and maps a solid-colour bar. Everything the shim returns
//! is adopted into `wayland-client` so the rest of the session uses typed
//! requests and `Dispatch` impls.

use crate::adopt::{self, adopt, AdoptError};
use crate::config::{Config, Position};
use crate::descriptors::get_zwlr_layer_shell_v1_interface;
use crate::marshal::{
    bind_global, create_buffer_from_pool, create_layer_surface, create_shm_pool,
};
use crate::protocol::{
    self, KeyboardInteractivity, LAYER_SHELL_INTERFACE_NAME, XDG_OUTPUT_MANAGER_INTERFACE_NAME,
};
use crate::protocol::wlr_layer_shell::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1, zwlr_layer_surface_v1::ZwlrLayerSurfaceV1,
};
use crate::protocol::xdg_output::{
    zxdg_output_manager_v1::ZxdgOutputManagerV1, zxdg_output_v1::ZxdgOutputV1,
};
use crate::shm::ShmFile;
use anyhow::{Context, Result};
use memmap2::MmapMut;
use std::ffi::CString;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_compositor::WlCompositor, wl_output::WlOutput, wl_registry,
    wl_shm::{self, WlShm}, wl_shm_pool::WlShmPool, wl_surface::WlSurface,
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_sys::client::wl_proxy;

/// What the compositor told us about the mapped surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub width: u32,
    pub height: u32,
    pub outputs: Vec<String>,
}

pub struct Probe {
    config: Config,
    running: Arc<AtomicBool>,
}

pub struct OutputInfo {
    pub output: WlOutput,
    pub global_name: u32,
    pub name: Option<String>,
    pub xdg_output: Option<ZxdgOutputV1>,
    pub logical_size: Option<(i32, i32)>,
}

/// A buffer carved out of a shm pool through the exported constructors.
struct ShmBuffer {
    buffer: WlBuffer,
    // Keeps the backing memory alive while the compositor reads it.
    _file: ShmFile,
    _map: MmapMut,
}

pub struct ProbeState {
    compositor: Option<WlCompositor>,
    shm: Option<WlShm>,
    layer_shell_global: Option<(u32, u32)>,
    xdg_output_manager: Option<ZxdgOutputManagerV1>,
    pub outputs: Vec<OutputInfo>,

    surface: Option<WlSurface>,
    layer_surface: Option<ZwlrLayerSurfaceV1>,
    buffer: Option<ShmBuffer>,

    /// Size from the most recent configure, already acknowledged.
    pub configured: Option<(u32, u32)>,
    pub closed: bool,
    /// Size asked for with `set_size`, used where the compositor sends 0.
    requested: (u32, u32),
}

impl ProbeState {
    fn new(requested: (u32, u32)) -> Self {
        Self {
            compositor: None,
            shm: None,
            layer_shell_global: None,
            xdg_output_manager: None,
            outputs: Vec::new(),
            surface: None,
            layer_surface: None,
            buffer: None,
            configured: None,
            closed: false,
            requested,
        }
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs.iter().filter_map(|o| o.name.clone()).collect()
    }

    fn find_output(&self, name: &str) -> Option<&OutputInfo> {
        self.outputs.iter().find(|o| o.name.as_deref() == Some(name))
    }

    /// Fill a fresh buffer with `color`, attach it and commit.
    fn draw(&mut self, conn: &Connection, qh: &QueueHandle<Self>, color: u32) -> Result<()> {
        let (width, height) = self.configured.context("Surface not configured yet")?;
        let shm = self.shm.as_ref().context("No SHM available")?;
        let surface = self.surface.as_ref().context("No surface")?;

        let stride = width * 4; // ARGB8888
        let size = stride as usize * height as usize;
        let file = ShmFile::create(size).context("Failed to create shm file")?;
        let mut map = file.map().context("Failed to map shm file")?;
        for pixel in map.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color.to_le_bytes());
        }

        let pool_size = i32::try_from(size).context("Buffer too large for a shm pool")?;
        let pool_ptr = unsafe { create_shm_pool(adopt::raw(shm), file.raw_fd(), pool_size) };
        let pool: WlShmPool = unsafe { adopt(conn, qh, pool_ptr, ())? };

        let buffer_ptr = unsafe {
            create_buffer_from_pool(
                adopt::raw(&pool),
                0,
                width as i32,
                height as i32,
                stride as i32,
                wl_shm::Format::Argb8888.into(),
            )
        };
        let buffer = unsafe { release_pool(conn, qh, pool, buffer_ptr)? };

        surface.attach(Some(&buffer), 0, 0);
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        if let Some(old) = self.buffer.replace(ShmBuffer { buffer, _file: file, _map: map }) {
            old.buffer.destroy();
        }

        log::debug!("Attached {}x{} buffer (stride {}, {} bytes)", width, height, stride, size);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(layer_surface) = self.layer_surface.take() {
            layer_surface.destroy();
        }
        if let Some(buffer) = self.buffer.take() {
            buffer.buffer.destroy();
        }
        if let Some(surface) = self.surface.take() {
            surface.destroy();
        }
        for output in self.outputs.drain(..) {
            if let Some(xdg_output) = output.xdg_output {
                xdg_output.destroy();
            }
        }
        if let Some(manager) = self.xdg_output_manager.take() {
            manager.destroy();
        }
    }
}

/// Adopt a buffer carved out of `pool` and destroy the pool, whether or not
/// the buffer could be adopted. The buffer keeps the pool's memory
/// referenced.
///
/// # Safety
///
/// `buffer_ptr` must be null or a fresh `wl_buffer` proxy created from
/// `pool` on `conn`.
unsafe fn release_pool<D>(
    conn: &Connection,
    qh: &QueueHandle<D>,
    pool: WlShmPool,
    buffer_ptr: *mut wl_proxy,
) -> Result<WlBuffer, AdoptError>
where
    D: Dispatch<WlBuffer, ()> + 'static,
{
    let buffer = adopt(conn, qh, buffer_ptr, ());
    pool.destroy();
    buffer
}

impl Probe {
    pub fn new(config: Config, running: Arc<AtomicBool>) -> Self {
        Self { config, running }
    }

    pub fn run(&mut self) -> Result<ProbeReport> {
        log::info!("Connecting to Wayland...");

        let conn = Connection::connect_to_env()
            .context("Failed to connect to Wayland compositor")?;

        let display = conn.display();
        let mut event_queue: EventQueue<ProbeState> = conn.new_event_queue();
        let qh = event_queue.handle();
        let mut state = ProbeState::new((self.config.width, self.config.height));

        let registry = display.get_registry(&qh, ());

        event_queue
            .roundtrip(&mut state)
            .context("Failed initial roundtrip")?;

        // Output names arrive after binding
        if let Some(manager) = &state.xdg_output_manager {
            for output in &mut state.outputs {
                output.xdg_output = Some(manager.get_xdg_output(&output.output, &qh, ()));
            }
        }
        event_queue
            .roundtrip(&mut state)
            .context("Failed to query outputs")?;

        log::info!("Found {} outputs: {:?}", state.outputs.len(), state.output_names());

        if state.compositor.is_none() {
            anyhow::bail!("Compositor not available");
        }
        if state.shm.is_none() {
            anyhow::bail!("SHM not available");
        }
        let (shell_name, shell_version) = state.layer_shell_global.context(
            "Layer shell not available - your compositor doesn't support wlr-layer-shell",
        )?;

        // Bind through the exported descriptor, the way a foreign caller would
        let shell_ptr = unsafe {
            bind_global(
                adopt::raw(&registry),
                shell_name,
                get_zwlr_layer_shell_v1_interface(),
                shell_version.min(protocol::LAYER_SHELL_VERSION),
            )
        };
        let layer_shell: ZwlrLayerShellV1 = unsafe { adopt(&conn, &qh, shell_ptr, ())? };
        log::info!("Bound {} v{}", LAYER_SHELL_INTERFACE_NAME, layer_shell.version());

        let output_ptr = match &self.config.output {
            Some(name) => {
                let output = state
                    .find_output(name)
                    .with_context(|| format!("No output named {}", name))?;
                adopt::raw(&output.output)
            }
            None => ptr::null_mut(),
        };

        let compositor = state.compositor.as_ref().context("Compositor not available")?;
        let surface = compositor.create_surface(&qh, ());

        let namespace = CString::new(self.config.namespace.as_str())
            .context("Namespace contains a NUL byte")?;
        let layer_surface_ptr = unsafe {
            create_layer_surface(
                adopt::raw(&layer_shell),
                adopt::raw(&surface),
                output_ptr,
                self.config.layer.into(),
                namespace.as_ptr(),
            )
        };
        let layer_surface: ZwlrLayerSurfaceV1 =
            unsafe { adopt(&conn, &qh, layer_surface_ptr, ())? };

        layer_surface.set_size(self.config.width, self.config.height);
        layer_surface.set_anchor(protocol::bar_anchor_flags(self.config.position == Position::Top));
        layer_surface.set_exclusive_zone(-1);
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);
        surface.commit();

        log::info!(
            "Layer surface created on {:?} (namespace {:?})",
            self.config.layer,
            self.config.namespace
        );

        state.surface = Some(surface);
        state.layer_surface = Some(layer_surface);

        event_queue
            .roundtrip(&mut state)
            .context("Failed waiting for configure")?;

        if state.closed {
            anyhow::bail!("Compositor closed the layer surface");
        }
        let (width, height) = state
            .configured
            .context("Layer surface was not configured by compositor")?;
        log::info!("Layer surface configured at {}x{}", width, height);

        state.draw(&conn, &qh, self.config.color)?;
        conn.flush()?;
        event_queue
            .roundtrip(&mut state)
            .context("Compositor rejected the buffer")?;

        if self.config.duration_secs > 0 {
            self.event_loop(&conn, &mut event_queue, &mut state)?;
        }

        let report = ProbeReport {
            width,
            height,
            outputs: state.output_names(),
        };

        state.destroy();
        if layer_shell.version() >= 3 {
            layer_shell.destroy();
        }
        conn.flush()?;

        log::info!("Probe finished");
        Ok(report)
    }

    fn event_loop(
        &self,
        conn: &Connection,
        event_queue: &mut EventQueue<ProbeState>,
        state: &mut ProbeState,
    ) -> Result<()> {
        let qh = event_queue.handle();
        let deadline = Instant::now() + Duration::from_secs(self.config.duration_secs);
        let mut drawn = state.configured;

        log::info!("Keeping surface mapped for {}s", self.config.duration_secs);
        log::info!("Press Ctrl+C to exit");

        loop {
            if !self.running.load(Ordering::SeqCst) {
                log::info!("Shutting down...");
                break;
            }
            if Instant::now() >= deadline {
                break;
            }
            if state.closed {
                log::warn!("Compositor closed the layer surface");
                break;
            }

            event_queue
                .dispatch_pending(state)
                .context("Failed to dispatch events")?;

            // Reconfigured to a new size, redraw
            if state.configured != drawn {
                state.draw(conn, &qh, self.config.color)?;
                drawn = state.configured;
            }

            conn.flush().context("Failed to flush connection")?;

            if let Some(guard) = event_queue.prepare_read() {
                use nix::libc;
                use std::os::unix::io::AsRawFd;
                let fd = guard.connection_fd().as_raw_fd();

                // Poll with 100ms timeout
                let mut pollfd = libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                };

                let poll_result = unsafe { libc::poll(&mut pollfd, 1, 100) };

                if poll_result > 0 {
                    guard.read().context("Failed to read events")?;
                } else if poll_result < 0 {
                    let err = std::io::Error::last_os_error();
                    if err.kind() != std::io::ErrorKind::Interrupted {
                        return Err(err).context("Poll error");
                    }
                }
                // Timeout: dropping the guard cancels the read
            }
        }

        log::info!("Event loop terminated");
        Ok(())
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for ProbeState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                log::debug!("Global: {} v{} (name: {})", interface, version, name);

                match interface.as_str() {
                    "wl_compositor" => {
                        let compositor =
                            registry.bind::<WlCompositor, _, _>(name, version.min(4), qh, ());
                        state.compositor = Some(compositor);
                    }
                    "wl_shm" => {
                        let shm = registry.bind::<WlShm, _, _>(name, 1, qh, ());
                        state.shm = Some(shm);
                    }
                    "wl_output" => {
                        let output = registry.bind::<WlOutput, _, _>(name, version.min(4), qh, ());
                        state.outputs.push(OutputInfo {
                            output,
                            global_name: name,
                            name: None,
                            xdg_output: None,
                            logical_size: None,
                        });
                    }
                    XDG_OUTPUT_MANAGER_INTERFACE_NAME => {
                        let manager = registry.bind::<ZxdgOutputManagerV1, _, _>(
                            name,
                            version.min(protocol::XDG_OUTPUT_VERSION),
                            qh,
                            (),
                        );
                        state.xdg_output_manager = Some(manager);
                    }
                    LAYER_SHELL_INTERFACE_NAME => {
                        // Bound later through the exported descriptor
                        state.layer_shell_global = Some((name, version));
                        log::info!("Layer shell available");
                    }
                    _ => {}
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                if let Some(idx) = state.outputs.iter().position(|o| o.global_name == name) {
                    let output = state.outputs.remove(idx);
                    if let Some(xdg_output) = output.xdg_output {
                        xdg_output.destroy();
                    }
                    log::info!("Output {:?} removed", output.name);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlCompositor, ()> for ProbeState {
    fn event(
        _: &mut Self,
        _: &WlCompositor,
        _: <WlCompositor as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlShm, ()> for ProbeState {
    fn event(
        _: &mut Self,
        _: &WlShm,
        event: <WlShm as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            log::trace!("SHM format: {:?}", format);
        }
    }
}

impl Dispatch<WlShmPool, ()> for ProbeState {
    fn event(
        _: &mut Self,
        _: &WlShmPool,
        _: <WlShmPool as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlBuffer, ()> for ProbeState {
    fn event(
        _: &mut Self,
        _: &WlBuffer,
        event: <WlBuffer as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use wayland_client::protocol::wl_buffer::Event;
        if let Event::Release = event {
            // Single static frame, nothing to recycle
            log::trace!("Buffer released");
        }
    }
}

impl Dispatch<WlSurface, ()> for ProbeState {
    fn event(
        _: &mut Self,
        _: &WlSurface,
        event: <WlSurface as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        log::trace!("WlSurface event: {:?}", event);
    }
}

impl Dispatch<WlOutput, ()> for ProbeState {
    fn event(
        state: &mut Self,
        output: &WlOutput,
        event: <WlOutput as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use wayland_client::protocol::wl_output::Event;

        let Some(info) = state.outputs.iter_mut().find(|o| &o.output == output) else {
            return;
        };

        match event {
            Event::Name { name } => {
                log::debug!("Output {} name: {}", info.global_name, name);
                info.name.get_or_insert(name);
            }
            Event::Mode { width, height, refresh, .. } => {
                log::debug!(
                    "Output {} mode: {}x{} @ {}Hz",
                    info.global_name,
                    width,
                    height,
                    refresh / 1000
                );
            }
            _ => {}
        }
    }
}

impl Dispatch<ZxdgOutputManagerV1, ()> for ProbeState {
    fn event(
        _: &mut Self,
        _: &ZxdgOutputManagerV1,
        _: <ZxdgOutputManagerV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZxdgOutputV1, ()> for ProbeState {
    fn event(
        state: &mut Self,
        xdg_output: &ZxdgOutputV1,
        event: <ZxdgOutputV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use crate::protocol::xdg_output::zxdg_output_v1::Event;

        let Some(info) = state
            .outputs
            .iter_mut()
            .find(|o| o.xdg_output.as_ref() == Some(xdg_output))
        else {
            return;
        };

        match event {
            Event::Name { name } => {
                // xdg-output names win over wl_output v4 names
                info.name = Some(name);
            }
            Event::LogicalSize { width, height } => {
                info.logical_size = Some((width, height));
            }
            Event::Done => {
                log::debug!(
                    "Output {:?} logical size {:?}",
                    info.name,
                    info.logical_size
                );
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrLayerShellV1, ()> for ProbeState {
    fn event(
        _: &mut Self,
        _: &ZwlrLayerShellV1,
        _: <ZwlrLayerShellV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for ProbeState {
    fn event(
        state: &mut Self,
        layer_surface: &ZwlrLayerSurfaceV1,
        event: <ZwlrLayerSurfaceV1 as wayland_client::Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use crate::protocol::wlr_layer_shell::zwlr_layer_surface_v1::Event;
        match event {
            Event::Configure { serial, width, height } => {
                log::debug!("Layer surface configure: serial={} size={}x{}", serial, width, height);
                layer_surface.ack_configure(serial);
                // 0 means the client decides along that axis
                let width = if width == 0 { state.requested.0 } else { width };
                let height = if height == 0 { state.requested.1 } else { height };
                state.configured = Some((width, height));
            }
            Event::Closed => {
                log::warn!("Layer surface closed");
                state.closed = true;
            }
            _ => {}
        }
    }
}
