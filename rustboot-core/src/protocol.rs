//! Line-and-binary protocol state machine (C5): accumulates textual
//! commands, drives binary payload reception for `WRITE`, and dispatches
//! onto the CRC (C1), hasher (C2), Ed25519 verifier (C3) and flash engine
//! (C4). Byte-at-a-time, matching how the main loop pulls one byte per
//! iteration off the USB CDC receive ring (see the concurrency model).

use core::fmt::Write as _;

use rustboot_hal::FlashHal;

use crate::config::{APP_START, FLASH_SIZE, PAGE, PUBLIC_KEY, VERSION_MAJOR, VERSION_MINOR};
use crate::error::LoaderError;
use crate::crc32::Crc32;
use crate::crypto;
use crate::flash::FlashEngine;
use crate::sha256::Hasher;

/// Command lines longer than this silently reset the buffer, per the data
/// model's "overflow resets the buffer silently" rule.
const CMD_BUF_LEN: usize = 128;

/// A reply line, built in place with no heap: `&'static str` covers every
/// fixed reply, `core::fmt::Write` covers `HELLO`'s version string.
pub struct ReplyBuf {
    buf: [u8; 40],
    len: usize,
}

impl ReplyBuf {
    fn new() -> Self {
        ReplyBuf { buf: [0; 40], len: 0 }
    }

    fn from_str(s: &str) -> Self {
        let mut b = Self::new();
        let bytes = s.as_bytes();
        let n = core::cmp::min(b.buf.len(), bytes.len());
        b.buf[..n].copy_from_slice(&bytes[..n]);
        b.len = n;
        b
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl core::fmt::Write for ReplyBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let end = core::cmp::min(self.buf.len(), self.len + bytes.len());
        let n = end - self.len;
        self.buf[self.len..end].copy_from_slice(&bytes[..n]);
        self.len = end;
        Ok(())
    }
}

fn static_reply(s: &str) -> Effect {
    Effect::Reply(ReplyBuf::from_str(s))
}

/// What the caller (the board's main loop) must do after feeding a byte.
pub enum Effect {
    /// Mid-command or mid-payload; nothing to send yet.
    None,
    /// Write this reply to the transport.
    Reply(ReplyBuf),
    /// Write this reply, then jump to the given address. Does not return
    /// in practice (the caller's `jump_to_app` call diverges); modeled as
    /// data here so the state machine itself stays host-testable.
    ReplyAndJump(ReplyBuf, u32),
}

#[derive(Clone, Copy)]
struct WriteTransaction {
    dst_addr: u32,
    expected_length: u32,
    expected_crc: u32,
    received: u32,
    crc_state: Crc32,
    page_buf: [u8; PAGE],
    page_fill: usize,
}

impl WriteTransaction {
    fn new(addr: u32, len: u32, crc: u32) -> Self {
        WriteTransaction {
            dst_addr: addr,
            expected_length: len,
            expected_crc: crc,
            received: 0,
            crc_state: Crc32::new(),
            page_buf: [0u8; PAGE],
            page_fill: 0,
        }
    }
}

#[derive(Clone, Copy)]
enum State {
    WaitCmd,
    WriteData(WriteTransaction),
}

/// The protocol state machine. Owns the flash engine and the running
/// image hasher; the only way in is [`Protocol::feed`], one byte at a
/// time, mirroring the external CDC-ACM byte stream.
pub struct Protocol<H: FlashHal> {
    state: State,
    cmd_buf: [u8; CMD_BUF_LEN],
    cmd_len: usize,
    flash: FlashEngine<H>,
    hasher: Hasher,
    public_key: [u8; 32],
}

impl<H: FlashHal> Protocol<H> {
    pub fn new(hal: H) -> Self {
        Self::with_public_key(hal, PUBLIC_KEY)
    }

    /// Build a state machine trusting `public_key` instead of the
    /// compiled-in [`PUBLIC_KEY`] — a staging build signed with a
    /// different key, or a test harness, can swap it in here.
    pub fn with_public_key(hal: H, public_key: [u8; 32]) -> Self {
        Protocol {
            state: State::WaitCmd,
            cmd_buf: [0; CMD_BUF_LEN],
            cmd_len: 0,
            flash: FlashEngine::new(hal),
            hasher: Hasher::init(),
            public_key,
        }
    }

    /// Read flash contents directly, bypassing the wire protocol.
    /// Exposed for host-side tooling and tests that need to confirm the
    /// committed image independent of the loader's replies.
    pub fn read_flash(&self, addr: u32, buf: &mut [u8]) {
        self.flash.read(addr, buf);
    }

    /// Feed one byte pulled off the transport. Returns the effect the
    /// caller must apply.
    pub fn feed(&mut self, byte: u8) -> Effect {
        match self.state {
            State::WaitCmd => self.on_cmd_byte(byte),
            State::WriteData(_) => self.on_data_byte(byte),
        }
    }

    fn on_cmd_byte(&mut self, byte: u8) -> Effect {
        match byte {
            b'\r' => Effect::None,
            b'\n' => {
                let effect = self.dispatch_line();
                self.cmd_len = 0;
                effect
            }
            _ => {
                if self.cmd_len >= CMD_BUF_LEN {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("command buffer overflow, resetting");
                    self.cmd_len = 0;
                } else {
                    self.cmd_buf[self.cmd_len] = byte;
                    self.cmd_len += 1;
                }
                Effect::None
            }
        }
    }

    fn on_data_byte(&mut self, byte: u8) -> Effect {
        let mut txn = match self.state {
            State::WriteData(t) => t,
            State::WaitCmd => unreachable!("on_data_byte called outside WRITE_DATA"),
        };

        txn.crc_state.update(byte);
        self.hasher.update(&[byte]);
        txn.page_buf[txn.page_fill] = byte;
        txn.page_fill += 1;
        txn.received += 1;

        if txn.page_fill == PAGE {
            self.flash.program(txn.dst_addr, &txn.page_buf[..txn.page_fill]);
            txn.dst_addr += PAGE as u32;
            txn.page_fill = 0;
        }

        if txn.received == txn.expected_length {
            if txn.page_fill > 0 {
                self.flash.program(txn.dst_addr, &txn.page_buf[..txn.page_fill]);
            }
            let crc_ok = txn.crc_state.finalize() == txn.expected_crc;
            #[cfg(feature = "defmt")]
            if !crc_ok {
                defmt::warn!("block CRC mismatch, bytes already committed");
            }
            self.state = State::WaitCmd;
            static_reply(if crc_ok { "OK WRITE\n" } else { LoaderError::BadCrc.reply() })
        } else {
            self.state = State::WriteData(txn);
            Effect::None
        }
    }

    fn dispatch_line(&mut self) -> Effect {
        let line = match core::str::from_utf8(&self.cmd_buf[..self.cmd_len]) {
            Ok(s) => s,
            Err(_) => return static_reply(LoaderError::Unknown.reply()),
        };
        self.dispatch(line.trim())
    }

    fn dispatch(&mut self, line: &str) -> Effect {
        let (cmd, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim_start()),
            None => (line, ""),
        };
        match cmd {
            "HELLO" if rest.is_empty() => self.cmd_hello(),
            "ERASE" if rest == "APP" => self.cmd_erase(),
            "WRITE" => self.cmd_write(rest),
            "DONE" => self.cmd_done(rest),
            _ => {
                #[cfg(feature = "defmt")]
                defmt::warn!("unrecognized command");
                static_reply(LoaderError::Unknown.reply())
            }
        }
    }

    fn cmd_hello(&self) -> Effect {
        let mut buf = ReplyBuf::new();
        // VERSION_MAJOR/MINOR are compiled-in u32 constants; core::fmt's
        // `Write` over a fixed buffer avoids needing an allocator just to
        // render two digits.
        let _ = write!(buf, "OK BOOT v{}.{}\n", VERSION_MAJOR, VERSION_MINOR);
        Effect::Reply(buf)
    }

    fn cmd_erase(&mut self) -> Effect {
        #[cfg(feature = "defmt")]
        defmt::info!("ERASE APP");
        self.flash.erase_application();
        self.hasher = Hasher::init();
        static_reply("OK ERASE\n")
    }

    fn cmd_write(&mut self, rest: &str) -> Effect {
        let mut tokens = rest.split_whitespace();
        let (addr_tok, len_tok, crc_tok) = (tokens.next(), tokens.next(), tokens.next());
        let (addr_tok, len_tok, crc_tok) = match (addr_tok, len_tok, crc_tok) {
            (Some(a), Some(l), Some(c)) => (a, l, c),
            _ => return static_reply(LoaderError::BadFormat.reply()),
        };

        let (addr, len, crc) = match (
            parse_number(addr_tok),
            parse_number(len_tok),
            parse_number(crc_tok),
        ) {
            (Some(a), Some(l), Some(c)) => (a, l, c),
            _ => return static_reply(LoaderError::BadFormat.reply()),
        };

        let end = match addr.checked_add(len) {
            Some(e) => e,
            None => return static_reply(LoaderError::BadParam.reply()),
        };
        if addr < APP_START || end > FLASH_SIZE {
            return static_reply(LoaderError::BadParam.reply());
        }

        if len == 0 {
            // No bytes will ever arrive to trigger the usual completion
            // check in `on_data_byte`; finalize immediately.
            let crc_ok = Crc32::new().finalize() == crc;
            return static_reply(if crc_ok { "OK WRITE\n" } else { LoaderError::BadCrc.reply() });
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("WRITE {=u32:08x} len={=u32}", addr, len);
        self.state = State::WriteData(WriteTransaction::new(addr, len, crc));
        Effect::None
    }

    fn cmd_done(&mut self, rest: &str) -> Effect {
        let hex = match rest.split_whitespace().next() {
            Some(h) if h.len() == 128 => h,
            _ => return static_reply(LoaderError::BadFormat.reply()),
        };

        let mut signature = [0u8; 64];
        if !decode_hex_128(hex, &mut signature) {
            return static_reply(LoaderError::BadFormat.reply());
        }

        // Peek the digest rather than consuming the hasher: a failed
        // verification leaves the state machine in WAIT_CMD "so the host
        // may retry" (spec.md §4.5), and a bare retry with a corrected
        // `DONE` line over the same streamed image must still work
        // without a full re-`ERASE`/re-`WRITE`.
        let digest = self.hasher.finalize_peek();
        if crypto::verify(&self.public_key, &signature, &digest) {
            #[cfg(feature = "defmt")]
            defmt::info!("signature verified, committing and jumping to application");
            self.hasher = Hasher::init();
            self.flash.set_app_valid();
            Effect::ReplyAndJump(ReplyBuf::from_str("OK DONE\n"), APP_START)
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("signature verification failed");
            static_reply(LoaderError::BadSignature.reply())
        }
    }
}

/// Parse a `WRITE`/`DONE` numeric token: optional leading sign (ignored),
/// `0x`/`0X` selects hex, a bare leading `0` (with more digits) selects
/// octal, else decimal. Parses only the leading run of valid digits for
/// the selected base; since the token was already space-split, trailing
/// garbage past that run is not treated as an error here.
fn parse_number(tok: &str) -> Option<u32> {
    let tok = tok.strip_prefix('+').or_else(|| tok.strip_prefix('-')).unwrap_or(tok);
    if tok.is_empty() {
        return None;
    }

    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        let digits = leading_run(hex, |c| c.is_ascii_hexdigit());
        if digits.is_empty() {
            return None;
        }
        u32::from_str_radix(digits, 16).ok()
    } else if tok.len() > 1 && tok.starts_with('0') {
        let digits = leading_run(&tok[1..], |c| ('0'..='7').contains(&c));
        if digits.is_empty() {
            return None;
        }
        u32::from_str_radix(digits, 8).ok()
    } else {
        let digits = leading_run(tok, |c| c.is_ascii_digit());
        if digits.is_empty() {
            return None;
        }
        digits.parse::<u32>().ok()
    }
}

fn leading_run(s: &str, pred: impl Fn(char) -> bool) -> &str {
    let end = s.find(|c| !pred(c)).unwrap_or(s.len());
    &s[..end]
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn decode_hex_128(input: &str, out: &mut [u8; 64]) -> bool {
    let bytes = input.as_bytes();
    if bytes.len() != 128 {
        return false;
    }
    for i in 0..64 {
        match (hex_val(bytes[2 * i]), hex_val(bytes[2 * i + 1])) {
            (Some(h), Some(l)) => out[i] = (h << 4) | l,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ROW;
    use crate::crc32::crc32;

    struct MockFlash {
        mem: std::vec::Vec<u8>,
    }

    impl MockFlash {
        fn new() -> Self {
            MockFlash {
                mem: std::vec![0xFFu8; FLASH_SIZE as usize],
            }
        }
    }

    impl FlashHal for MockFlash {
        fn init(&mut self) {}
        fn erase_row(&mut self, row_addr: u32) {
            let a = row_addr as usize;
            for b in &mut self.mem[a..a + ROW] {
                *b = 0xFF;
            }
        }
        fn program_page(&mut self, page_addr: u32, data: &[u8]) {
            let a = page_addr as usize;
            self.mem[a..a + data.len()].copy_from_slice(data);
        }
        fn read(&self, addr: u32, buf: &mut [u8]) {
            let a = addr as usize;
            buf.copy_from_slice(&self.mem[a..a + buf.len()]);
        }
    }

    fn feed_all(p: &mut Protocol<MockFlash>, bytes: &[u8]) -> std::vec::Vec<u8> {
        let mut out = std::vec::Vec::new();
        for &b in bytes {
            match p.feed(b) {
                Effect::None => {}
                Effect::Reply(r) => out.extend_from_slice(r.as_bytes()),
                Effect::ReplyAndJump(r, _) => out.extend_from_slice(r.as_bytes()),
            }
        }
        out
    }

    #[test]
    fn hello_replies_with_version() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let out = feed_all(&mut p, b"HELLO\n");
        assert_eq!(out, b"OK BOOT v1.0\n");
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let out = feed_all(&mut p, b"FROBNICATE\n");
        assert_eq!(out, b"ERR UNKNOWN\n");
    }

    #[test]
    fn command_buffer_overflow_resets_silently() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let long_garbage = std::vec![b'X'; CMD_BUF_LEN + 10];
        let mut out = feed_all(&mut p, &long_garbage);
        // The overflowing garbage alone produces no reply; a fresh valid
        // command afterwards still works, proving the state machine
        // recovered.
        assert!(out.is_empty());
        out.extend(feed_all(&mut p, b"HELLO\n"));
        assert_eq!(out, b"OK BOOT v1.0\n");
    }

    #[test]
    fn erase_app_clears_application_region() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        p.flash.read(APP_START, &mut [0u8; 0]); // sanity: flash is reachable
        let out = feed_all(&mut p, b"ERASE APP\n");
        assert_eq!(out, b"OK ERASE\n");
        let mut buf = [0u8; 16];
        p.flash.read(APP_START, &mut buf);
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn write_below_app_start_is_rejected_with_param_error() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let out = feed_all(&mut p, b"WRITE 0x0000 4 0xDEADBEEF\n");
        assert_eq!(out, b"ERR PARAM\n");
    }

    #[test]
    fn write_missing_fields_is_format_error() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let out = feed_all(&mut p, b"WRITE 0x2000 4\n");
        assert_eq!(out, b"ERR FORMAT\n");
    }

    #[test]
    fn write_good_crc_programs_bytes_and_pads_page_with_0xff() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let crc = crc32(b"ABCD");
        let mut cmd = std::format!("WRITE 0x2000 4 0x{:08X}\n", crc).into_bytes();
        cmd.extend_from_slice(b"ABCD");
        let out = feed_all(&mut p, &cmd);
        assert_eq!(out, b"OK WRITE\n");

        let mut page = [0u8; PAGE];
        p.flash.read(0x2000, &mut page);
        assert_eq!(&page[..4], b"ABCD");
        assert!(page[4..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn write_bad_crc_still_commits_bytes_but_reports_error() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let mut cmd = b"WRITE 0x2000 4 0x00000000\n".to_vec();
        cmd.extend_from_slice(b"ABCD");
        let out = feed_all(&mut p, &cmd);
        assert_eq!(out, b"ERR CRC\n");

        let mut page = [0u8; 4];
        p.flash.read(0x2000, &mut page);
        assert_eq!(&page, b"ABCD");
    }

    #[test]
    fn write_spanning_exactly_one_page_returns_to_wait_cmd() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let data = [0x5Au8; PAGE];
        let crc = crc32(&data);
        let mut cmd = std::format!("WRITE 0x2000 {} 0x{:08X}\n", PAGE, crc).into_bytes();
        cmd.extend_from_slice(&data);
        let out = feed_all(&mut p, &cmd);
        assert_eq!(out, b"OK WRITE\n");

        // A HELLO right after proves the machine is back in WAIT_CMD, not
        // stuck mid-payload.
        let out = feed_all(&mut p, b"HELLO\n");
        assert_eq!(out, b"OK BOOT v1.0\n");
    }

    #[test]
    fn done_with_malformed_signature_is_format_error() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let out = feed_all(&mut p, b"DONE not-enough-hex\n");
        assert_eq!(out, b"ERR FORMAT\n");
    }

    #[test]
    fn done_with_wrong_signature_is_rejected_and_marker_untouched() {
        let mut p = Protocol::with_public_key(MockFlash::new(), [0u8; 32]);
        let zeros_hex: std::string::String = std::iter::repeat('0').take(128).collect();
        let cmd = std::format!("DONE {}\n", zeros_hex);
        let out = feed_all(&mut p, cmd.as_bytes());
        assert_eq!(out, b"ERR SIGNATURE\n");

        let mut marker = [0u8; 4];
        p.flash.read(APP_START - 4, &mut marker);
        assert!(marker.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn done_with_valid_signature_sets_marker_and_jumps() {
        // `ed25519-dalek` stands in for a real signing host here (the
        // role `rbsigner` plays in the workspace): it signs the exact
        // digest this state machine will independently compute over the
        // streamed image, so the fixture doesn't depend on finding a
        // preimage for a fixed hash the way a hardcoded vector would.
        use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};

        let secret = SecretKey::from_bytes(&[7u8; 32]).expect("32-byte seed is always valid");
        let public = PublicKey::from(&secret);
        let keypair = Keypair { secret, public };

        let mut p = Protocol::with_public_key(MockFlash::new(), public.to_bytes());
        feed_all(&mut p, b"ERASE APP\n");

        let image = b"tiny firmware image";
        let crc = crc32(image);
        let mut cmd = std::format!("WRITE 0x2000 {} 0x{:08X}\n", image.len(), crc).into_bytes();
        cmd.extend_from_slice(image);
        assert_eq!(feed_all(&mut p, &cmd), b"OK WRITE\n");

        let digest = {
            let mut h = crate::sha256::Hasher::init();
            h.update(image);
            h.finalize()
        };
        let signature = keypair.sign(&digest);
        let hex: std::string::String = signature
            .to_bytes()
            .iter()
            .map(|b| std::format!("{:02x}", b))
            .collect();
        let cmd = std::format!("DONE {}\n", hex);

        let mut replied = false;
        let mut jumped_to = None;
        for &b in cmd.as_bytes() {
            match p.feed(b) {
                Effect::None => {}
                Effect::Reply(r) => {
                    replied = true;
                    assert_eq!(r.as_bytes(), b"OK DONE\n");
                }
                Effect::ReplyAndJump(r, addr) => {
                    replied = true;
                    assert_eq!(r.as_bytes(), b"OK DONE\n");
                    jumped_to = Some(addr);
                }
            }
        }
        assert!(replied);
        assert_eq!(jumped_to, Some(APP_START));

        let mut marker = [0u8; 4];
        p.flash.read(APP_START - 4, &mut marker);
        assert_eq!(u32::from_le_bytes(marker), crate::config::VALID_MAGIC);
    }

    #[test]
    fn done_retry_after_bad_signature_succeeds_without_rewriting() {
        // A rejected DONE leaves WAIT_CMD "so the host may retry" per
        // spec.md §4.5; this checks the bare-retry case the spec implies
        // works (no intervening ERASE/WRITE), which requires the image
        // hasher to survive the failed attempt.
        use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};

        let secret = SecretKey::from_bytes(&[11u8; 32]).expect("32-byte seed is always valid");
        let public = PublicKey::from(&secret);
        let keypair = Keypair { secret, public };

        let mut p = Protocol::with_public_key(MockFlash::new(), public.to_bytes());
        feed_all(&mut p, b"ERASE APP\n");

        let image = b"retry-me firmware image";
        let crc = crc32(image);
        let mut cmd = std::format!("WRITE 0x2000 {} 0x{:08X}\n", image.len(), crc).into_bytes();
        cmd.extend_from_slice(image);
        assert_eq!(feed_all(&mut p, &cmd), b"OK WRITE\n");

        let zeros_hex: std::string::String = std::iter::repeat('0').take(128).collect();
        let bad_done = std::format!("DONE {}\n", zeros_hex);
        assert_eq!(feed_all(&mut p, bad_done.as_bytes()), b"ERR SIGNATURE\n");

        let digest = {
            let mut h = crate::sha256::Hasher::init();
            h.update(image);
            h.finalize()
        };
        let signature = keypair.sign(&digest);
        let hex: std::string::String = signature
            .to_bytes()
            .iter()
            .map(|b| std::format!("{:02x}", b))
            .collect();
        let good_done = std::format!("DONE {}\n", hex);

        let mut jumped_to = None;
        for &b in good_done.as_bytes() {
            if let Effect::ReplyAndJump(_, addr) = p.feed(b) {
                jumped_to = Some(addr);
            }
        }
        assert_eq!(jumped_to, Some(APP_START));
    }

    #[test]
    fn parse_number_accepts_decimal_hex_and_octal() {
        assert_eq!(parse_number("1234"), Some(1234));
        assert_eq!(parse_number("0x2000"), Some(0x2000));
        assert_eq!(parse_number("0X2000"), Some(0x2000));
        assert_eq!(parse_number("017"), Some(15));
        assert_eq!(parse_number("0"), Some(0));
    }
}
