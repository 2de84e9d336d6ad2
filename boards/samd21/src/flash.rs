//! `FlashHal` for the SAM D21's NVMCTRL peripheral: row erase and
//! page program, the usual MCU flash-controller sequence — configure
//! once, issue a command, spin on the ready flag.

use atsamd_hal::pac::NVMCTRL;
use rustboot_hal::FlashHal;

/// NVMCTRL command codes (CTRLA.CMD), issued with the `0xA5` key in the
/// high byte of the same write.
mod cmd {
    pub const ER: u8 = 0x02; // erase row
    pub const WP: u8 = 0x04; // write page
    pub const PBC: u8 = 0x44; // page buffer clear
}

const CMDEX_KEY: u16 = 0xA5;

pub struct Samd21Flash {
    nvmctrl: NVMCTRL,
}

impl Samd21Flash {
    pub fn new(nvmctrl: NVMCTRL) -> Self {
        Samd21Flash { nvmctrl }
    }

    fn wait_ready(&self) {
        while !self.nvmctrl.intflag.read().ready().bit_is_set() {}
    }

    fn issue(&mut self, command: u8) {
        self.wait_ready();
        self.nvmctrl.ctrla.write(|w| unsafe {
            w.cmdex().bits(CMDEX_KEY as u8);
            w.cmd().bits(command)
        });
        self.wait_ready();
    }
}

impl FlashHal for Samd21Flash {
    fn init(&mut self) {
        // Manual write mode: the page buffer is only flushed to flash on
        // an explicit WP command, never implicitly on the final word.
        self.nvmctrl.ctrlb.modify(|_, w| w.manw().set_bit());
    }

    fn erase_row(&mut self, row_addr: u32) {
        self.nvmctrl.addr.write(|w| unsafe { w.addr().bits(row_addr >> 1) });
        self.issue(cmd::ER);
    }

    fn program_page(&mut self, page_addr: u32, data: &[u8]) {
        self.issue(cmd::PBC);

        let mut addr = page_addr;
        for word in data.chunks(4) {
            let mut bytes = [0xFFu8; 4];
            bytes[..word.len()].copy_from_slice(word);
            let ptr = addr as *mut u32;
            unsafe { core::ptr::write_volatile(ptr, u32::from_le_bytes(bytes)) };
            addr += 4;
        }

        self.nvmctrl.addr.write(|w| unsafe { w.addr().bits(page_addr >> 1) });
        self.issue(cmd::WP);
    }

    fn read(&self, addr: u32, buf: &mut [u8]) {
        let src = addr as *const u8;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = unsafe { core::ptr::read_volatile(src.add(i)) };
        }
    }
}
