/*
# BitIO Module

 Bit-granular access to byte streams. Box payloads interleave sub-byte
 integers with ordinary byte runs, so the reader and writer here expose both
 an MSB-first `read_bits`/`write_bits` interface and plain `io::Read` /
 `io::Write` passthrough (which degrades to the bit path when the cursor is
 not byte-aligned).

 Key components:
 - `Reader`: bit reader over any `Read`, byte-realigning `Seek`
 - `Writer`: bit writer with a running bit count and zero-padded `finish`
 - `BitRead` / `BitReadSeek` / `BitWrite`: object-safe trait views handed
   to box callbacks
*/

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Byte stream that supports both reading and seeking, the shape the
/// pre-decode hook receives.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

pub trait BitRead: Read {
    /// Read `n` bits (`n <= 64`), MSB first, right-aligned in the result.
    /// `n == 0` reads nothing and returns 0.
    fn read_bits(&mut self, n: u32) -> io::Result<u64>;

    /// Whether the cursor sits on a byte boundary.
    fn aligned(&self) -> bool;
}

pub trait BitReadSeek: BitRead + Seek {}
impl<T: BitRead + Seek + ?Sized> BitReadSeek for T {}

pub trait BitWrite: Write {
    /// Write the low `n` bits of `value` (`n <= 64`), MSB first.
    fn write_bits(&mut self, value: u64, n: u32) -> io::Result<()>;

    /// Total bits written so far, excluding final padding.
    fn bits_written(&self) -> u64;
}

/// Mask for the `n` least significant bits of a byte.
fn mask8(n: u8) -> u8 {
    if n >= 8 { 0xff } else { (1 << n) - 1 }
}

pub struct Reader<R> {
    inner: R,
    buf: u8,
    // bits of `buf` not yet consumed
    left: u8,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: 0, left: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> BitRead for Reader<R> {
    fn read_bits(&mut self, n: u32) -> io::Result<u64> {
        if n > 64 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bit width exceeds 64"));
        }
        let mut value = 0u64;
        let mut want = n;
        while want > 0 {
            if self.left == 0 {
                self.buf = self.inner.read_u8()?;
                self.left = 8;
            }
            let take = want.min(self.left as u32) as u8;
            let chunk = (self.buf >> (self.left - take)) & mask8(take);
            value = (value << take) | chunk as u64;
            self.left -= take;
            want -= take as u32;
        }
        Ok(value)
    }

    fn aligned(&self) -> bool {
        self.left == 0
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.left == 0 {
            return self.inner.read(out);
        }
        let mut n = 0;
        for slot in out.iter_mut() {
            match self.read_bits(8) {
                Ok(v) => {
                    *slot = v as u8;
                    n += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for Reader<R> {
    /// Seeks operate on byte offsets and realign the cursor to the target
    /// byte. Mid-byte `Current` offsets are relative to the byte holding the
    /// bit cursor, which the underlying stream has already passed.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let pos = match pos {
            SeekFrom::Current(off) if self.left != 0 => SeekFrom::Current(off - 1),
            other => other,
        };
        self.left = 0;
        self.inner.seek(pos)
    }
}

pub struct Writer<W> {
    inner: W,
    buf: u8,
    // bits of `buf` already filled
    used: u8,
    bits: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, buf: 0, used: 0, bits: 0 }
    }

    /// Flush the trailing partial byte, padded with zero bits on the right.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.used > 0 {
            let b = self.buf << (8 - self.used);
            self.inner.write_u8(b)?;
            self.buf = 0;
            self.used = 0;
        }
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> BitWrite for Writer<W> {
    fn write_bits(&mut self, value: u64, n: u32) -> io::Result<()> {
        if n > 64 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bit width exceeds 64"));
        }
        let mut want = n;
        while want > 0 {
            let take = want.min(8 - self.used as u32);
            let chunk = ((value >> (want - take)) as u8) & mask8(take as u8);
            self.buf = if take == 8 { chunk } else { (self.buf << take) | chunk };
            self.used += take as u8;
            want -= take;
            if self.used == 8 {
                self.inner.write_u8(self.buf)?;
                self.buf = 0;
                self.used = 0;
            }
        }
        self.bits += n as u64;
        Ok(())
    }

    fn bits_written(&self) -> u64 {
        self.bits
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.used == 0 {
            let n = self.inner.write(data)?;
            self.bits += n as u64 * 8;
            return Ok(n);
        }
        for b in data {
            self.write_bits(*b as u64, 8)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
