//! A client connection whose server end is a plain socket, so tests can read
//! exactly what the client puts on the wire without a compositor.

use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};
use std::io::IoSliceMut;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_compositor::WlCompositor, wl_registry::WlRegistry, wl_shm::WlShm,
    wl_shm_pool::WlShmPool, wl_surface::WlSurface,
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};

use crate::protocol::wlr_layer_shell::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1, zwlr_layer_surface_v1::ZwlrLayerSurfaceV1,
};

/// Queue state for loopback connections. No events ever arrive.
pub(crate) struct Sink;

macro_rules! ignore_events {
    ($($iface:ty),*) => {
        $(
            impl Dispatch<$iface, ()> for Sink {
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

ignore_events!(
    WlRegistry,
    WlCompositor,
    WlSurface,
    WlShm,
    WlShmPool,
    WlBuffer,
    ZwlrLayerShellV1,
    ZwlrLayerSurfaceV1
);

/// One request as written by libwayland.
pub(crate) struct Message {
    pub sender: u32,
    pub opcode: u16,
    body: Vec<u8>,
}

impl Message {
    pub fn args(&self) -> Args<'_> {
        Args { body: &self.body }
    }
}

/// Reads request arguments in order. Wayland uses host byte order.
pub(crate) struct Args<'a> {
    body: &'a [u8],
}

impl Args<'_> {
    pub fn uint(&mut self) -> u32 {
        let (word, rest) = self.body.split_at(4);
        self.body = rest;
        u32::from_ne_bytes([word[0], word[1], word[2], word[3]])
    }

    pub fn int(&mut self) -> i32 {
        self.uint() as i32
    }

    /// String contents without the trailing NUL.
    pub fn string(&mut self) -> Vec<u8> {
        let len = self.uint() as usize;
        let padded = (len + 3) & !3;
        let (bytes, rest) = self.body.split_at(padded);
        self.body = rest;
        assert_eq!(bytes[len - 1], 0, "string is not NUL-terminated");
        bytes[..len - 1].to_vec()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

pub(crate) struct Loopback {
    pub conn: Connection,
    pub queue: EventQueue<Sink>,
    pub registry: WlRegistry,
    server: UnixStream,
}

impl Loopback {
    pub fn new() -> Self {
        let (client, server) = UnixStream::pair().unwrap();
        let conn = Connection::from_socket(client).unwrap();
        let queue = conn.new_event_queue();
        let registry = conn.display().get_registry(&queue.handle(), ());
        Self {
            conn,
            queue,
            registry,
            server,
        }
    }

    pub fn handle(&self) -> QueueHandle<Sink> {
        self.queue.handle()
    }

    /// Bind global `name` without the server ever having announced it.
    pub fn bind<I>(&self, name: u32, version: u32) -> I
    where
        I: Proxy + 'static,
        Sink: Dispatch<I, ()>,
    {
        self.registry
            .bind::<I, (), Sink>(name, version, &self.handle(), ())
    }

    /// Flush the client and read back everything written since the last
    /// call, along with any descriptors that came with it.
    pub fn receive(&self) -> (Vec<Message>, Vec<OwnedFd>) {
        self.conn.flush().unwrap();

        let mut buf = vec![0u8; 4096];
        let mut cmsg = nix::cmsg_space!([RawFd; 8]);
        let (len, fds) = {
            let mut iov = [IoSliceMut::new(&mut buf)];
            let msg = recvmsg::<()>(
                self.server.as_raw_fd(),
                &mut iov,
                Some(&mut cmsg),
                MsgFlags::empty(),
            )
            .unwrap();
            let mut fds = Vec::new();
            for c in msg.cmsgs() {
                if let ControlMessageOwned::ScmRights(raw) = c {
                    fds.extend(raw.into_iter().map(|fd| unsafe { OwnedFd::from_raw_fd(fd) }));
                }
            }
            (msg.bytes, fds)
        };

        (parse(&buf[..len]), fds)
    }
}

fn parse(mut bytes: &[u8]) -> Vec<Message> {
    let mut messages = Vec::new();
    while bytes.len() >= 8 {
        let sender = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let header = u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let size = (header >> 16) as usize;
        messages.push(Message {
            sender,
            opcode: (header & 0xffff) as u16,
            body: bytes[8..size].to_vec(),
        });
        bytes = &bytes[size..];
    }
    messages
}
