//! Boundary between the combat core and the transport
//!
//! The core never talks to a socket. It hands packets to an [`Outbox`] and
//! forgets about them; the network layer drains the queue once per tick.

use crate::Packet;

/// Fire-and-forget send primitives offered by the transport.
pub trait Outbox {
    /// Client to server. Delivery is not guaranteed.
    fn send_to_server(&mut self, packet: Packet);

    /// Server to every connected client, optionally skipping one client id.
    fn broadcast(&mut self, packet: Packet, exclude: Option<u32>);
}

/// Plain queue implementation used by both network loops and by tests.
#[derive(Debug, Default)]
pub struct Outgoing {
    pub to_server: Vec<Packet>,
    pub broadcasts: Vec<(Packet, Option<u32>)>,
}

impl Outgoing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.to_server.is_empty() && self.broadcasts.is_empty()
    }

    pub fn take_to_server(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.to_server)
    }

    pub fn take_broadcasts(&mut self) -> Vec<(Packet, Option<u32>)> {
        std::mem::take(&mut self.broadcasts)
    }
}

impl Outbox for Outgoing {
    fn send_to_server(&mut self, packet: Packet) {
        self.to_server.push(packet);
    }

    fn broadcast(&mut self, packet: Packet, exclude: Option<u32>) {
        self.broadcasts.push((packet, exclude));
    }
}
