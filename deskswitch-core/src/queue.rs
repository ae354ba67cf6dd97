//! Bounded outgoing queues: HID reports for the host and packets for the peer.
//!
//! Both are `heapless::spsc` queues. Producers never block and drop the item
//! when the queue is full. Consumers peek, hand the item off, and only then
//! remove it (see [`crate::tasks`]).

use deskswitch_proto::{
    KeyboardReport, MouseReport, Packet, PacketType, CONSUMER_CONTROL_LENGTH, RAW_PACKET_LENGTH,
};
use heapless::spsc::{Consumer, Producer, Queue};

/// Slots in the HID queue (one is reserved by the ring implementation).
pub const HID_QUEUE_LENGTH: usize = 32;

/// Slots in the link queue (one is reserved by the ring implementation).
pub const LINK_QUEUE_LENGTH: usize = 32;

/// A report waiting to go to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
    Consumer([u8; CONSUMER_CONTROL_LENGTH]),
    System(u8),
    /// Framed link packet on the vendor interface (config replies).
    Vendor([u8; RAW_PACKET_LENGTH]),
}

pub type HidQueue = Queue<HidReport, HID_QUEUE_LENGTH>;
pub type HidProducer<'q> = Producer<'q, HidReport, HID_QUEUE_LENGTH>;
pub type HidConsumer<'q> = Consumer<'q, HidReport, HID_QUEUE_LENGTH>;

pub type LinkQueue = Queue<Packet, LINK_QUEUE_LENGTH>;
pub type LinkProducer<'q> = Producer<'q, Packet, LINK_QUEUE_LENGTH>;
pub type LinkConsumer<'q> = Consumer<'q, Packet, LINK_QUEUE_LENGTH>;

/// Producer ends of both outgoing queues.
pub struct Outbox<'q> {
    hid: HidProducer<'q>,
    link: LinkProducer<'q>,
}

impl<'q> Outbox<'q> {
    pub fn new(hid: HidProducer<'q>, link: LinkProducer<'q>) -> Self {
        Self { hid, link }
    }

    /// Queue a report for the host. Returns `false` if it was dropped.
    pub fn queue_hid(&mut self, report: HidReport) -> bool {
        match self.hid.enqueue(report) {
            Ok(()) => true,
            Err(_) => {
                warn!("HID queue full, report dropped");
                false
            }
        }
    }

    /// Queue a packet for the peer. Returns `false` if it was dropped.
    pub fn send_packet(&mut self, packet: Packet) -> bool {
        match self.link.enqueue(packet) {
            Ok(()) => true,
            Err(packet) => {
                warn!("link queue full, dropped tag {}", packet.tag);
                false
            }
        }
    }

    /// Queue a packet whose payload is `payload`, zero-padded.
    pub fn send(&mut self, kind: PacketType, payload: &[u8]) -> bool {
        self.send_packet(Packet::new(kind, payload))
    }

    /// Queue a packet carrying a single byte.
    pub fn send_value(&mut self, kind: PacketType, value: u8) -> bool {
        self.send(kind, &[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_drops_newest() {
        let mut hid = HidQueue::new();
        let mut link = LinkQueue::new();
        let (hp, _hc) = hid.split();
        let (lp, mut lc) = link.split();
        let mut outbox = Outbox::new(hp, lp);

        for i in 0..LINK_QUEUE_LENGTH - 1 {
            assert!(outbox.send_value(PacketType::OutputSelect, i as u8));
        }
        assert!(!outbox.send_value(PacketType::OutputSelect, 0xFF));

        assert_eq!(lc.dequeue().map(|p| p.data[0]), Some(0));
        assert_eq!(lc.len(), LINK_QUEUE_LENGTH - 2);
    }

    #[test]
    fn test_hid_queue_order() {
        let mut hid = HidQueue::new();
        let mut link = LinkQueue::new();
        let (hp, mut hc) = hid.split();
        let (lp, _lc) = link.split();
        let mut outbox = Outbox::new(hp, lp);

        assert!(outbox.queue_hid(HidReport::System(0x81)));
        assert!(outbox.queue_hid(HidReport::Consumer([0xE9, 0, 0, 0])));
        assert_eq!(hc.dequeue(), Some(HidReport::System(0x81)));
        assert_eq!(hc.dequeue(), Some(HidReport::Consumer([0xE9, 0, 0, 0])));
        assert_eq!(hc.dequeue(), None);
    }
}
