//! CDC-ACM transport over `usb-device` + `usbd-serial`, adapted to the
//! one-byte-at-a-time interface `rustboot_hal::Transport` wants. The USB
//! stack hands back whole packets; a small ring smooths that over.

use rustboot_hal::Transport;
use usb_device::bus::UsbBus;
use usb_device::device::{UsbDevice, UsbDeviceState};
use usbd_serial::SerialPort;

const RX_RING: usize = 128;

pub struct CdcAcm<'a, B: UsbBus> {
    dev: UsbDevice<'a, B>,
    port: SerialPort<'a, B>,
    rx: [u8; RX_RING],
    rx_head: usize,
    rx_tail: usize,
}

impl<'a, B: UsbBus> CdcAcm<'a, B> {
    pub fn new(dev: UsbDevice<'a, B>, port: SerialPort<'a, B>) -> Self {
        CdcAcm {
            dev,
            port,
            rx: [0; RX_RING],
            rx_head: 0,
            rx_tail: 0,
        }
    }

    /// Service the USB stack. Call from the main loop as often as possible;
    /// pulls any newly arrived bytes into the ring.
    pub fn poll(&mut self) {
        if !self.dev.poll(&mut [&mut self.port]) {
            return;
        }
        let mut buf = [0u8; 64];
        if let Ok(n) = self.port.read(&mut buf) {
            for &b in &buf[..n] {
                let next = (self.rx_head + 1) % RX_RING;
                if next != self.rx_tail {
                    self.rx[self.rx_head] = b;
                    self.rx_head = next;
                }
                // ring full: byte dropped, same as any transport overrun
                // (the protocol layer's CRC is what catches this).
            }
        }
    }
}

impl<'a, B: UsbBus> Transport for CdcAcm<'a, B> {
    fn read_byte(&mut self) -> Option<u8> {
        if self.rx_tail == self.rx_head {
            return None;
        }
        let b = self.rx[self.rx_tail];
        self.rx_tail = (self.rx_tail + 1) % RX_RING;
        Some(b)
    }

    fn write_all(&mut self, bytes: &[u8]) {
        let mut remaining = bytes;
        while !remaining.is_empty() {
            match self.port.write(remaining) {
                Ok(n) if n > 0 => remaining = &remaining[n..],
                _ => {
                    self.dev.poll(&mut [&mut self.port]);
                }
            }
        }
    }

    fn requested_baud(&self) -> Option<u32> {
        if self.dev.state() == UsbDeviceState::Configured {
            Some(self.port.line_coding().data_rate())
        } else {
            None
        }
    }
}
