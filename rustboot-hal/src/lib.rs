#![no_std]
#![allow(non_snake_case)]

//! Traits a board crate implements so that `rustboot-core` can drive its
//! flash controller and USB transport without knowing which MCU it's on,
//! plus the launcher that hands control to the installed application.

/// Low-level NVM access. A board crate's flash driver implements this;
/// `rustboot-core`'s flash engine builds the page/row discipline on top.
///
/// Implementors need not validate addresses or alignment: the caller
/// (rustboot-core's flash engine) has already aligned every `addr` to the
/// erase/program granularity it was told about through `config`.
pub trait FlashHal {
    /// Put the controller into manual-write mode and set wait states.
    fn init(&mut self);

    /// Erase the row starting at `row_addr`. Blocks until the controller
    /// signals completion.
    fn erase_row(&mut self, row_addr: u32);

    /// Program one page's worth of bytes at `page_addr`. `data.len()` is
    /// exactly the page size the board was configured with. Blocks until
    /// the controller signals completion.
    fn program_page(&mut self, page_addr: u32, data: &[u8]);

    /// Read `buf.len()` bytes starting at `addr` directly out of flash.
    fn read(&self, addr: u32, buf: &mut [u8]);
}

/// Byte-oriented transport. A board crate's USB CDC-ACM driver implements
/// this; `rustboot-core`'s protocol state machine only ever sees bytes.
pub trait Transport {
    /// Pull at most one byte out of the receive ring, if one is queued.
    /// Must not block.
    fn read_byte(&mut self) -> Option<u8>;

    /// Push bytes to the transmit ring, spinning the USB task as needed
    /// until space is available. The only permitted suspension point on
    /// the transmit path (see the concurrency model).
    fn write_all(&mut self, bytes: &[u8]);

    /// The baud rate the host most recently requested via `SET_LINE_CODING`,
    /// if the port is open. Used for 1200-baud-touch detection.
    fn requested_baud(&self) -> Option<u32>;
}

/// Resident-vs-jump decision made once at boot, before the protocol state
/// machine or USB stack is ever touched.
///
/// Returns `true` ("remain resident") if the host is touching the port at
/// 1200 baud, or if the validity marker doesn't hold the expected magic.
pub fn entry_predicate(requested_baud: Option<u32>, marker_value: u32, expected_magic: u32) -> bool {
    requested_baud == Some(1200) || marker_value != expected_magic
}

/// Disable interrupts, relocate the vector table to the application's base,
/// load its initial stack pointer and reset vector, and transfer control.
/// Never returns.
///
/// # Safety
/// `app_start` must point at a valid, authenticated application image: a
/// stack pointer as the first word and a thumb entry point as the second.
/// Caller must guarantee this (rustboot-core only calls this after a
/// successful `DONE`).
///
/// Only built for `arm` targets: the asm below is Thumb-specific. Board
/// crates are the only callers and only ever build for `thumbv6m-none-eabi`;
/// gating it this way lets `rustboot-core` depend on this crate for its
/// trait surface without dragging Thumb asm into host `cargo test` builds.
#[cfg(target_arch = "arm")]
pub unsafe fn jump_to_app(app_start: u32) -> ! {
    use core::arch::asm;
    use cortex_m::peripheral::SCB;

    cortex_m::interrupt::disable();

    let vector_table = app_start as *const u32;
    let initial_sp = core::ptr::read_volatile(vector_table);
    let reset_vector = core::ptr::read_volatile(vector_table.add(1));

    let scb = &*SCB::PTR;
    scb.vtor.write(app_start);

    asm!(
        "msr msp, {sp}",
        "bx {entry}",
        sp = in(reg) initial_sp,
        entry = in(reg) reset_vector,
        options(noreturn),
    );
}
