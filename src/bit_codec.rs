//! Bit-addressable buffers and lossy float codecs used by the binary archive
//!
//! Fields are packed MSB-first: the first bit written becomes the most
//! significant bit of the first byte. Integer fields round-trip exactly; float
//! fields go through a [`FloatCodec`] and are lossy by construction.
//!
//! Reading goes through a [`BitSource`], either a plain byte slice
//! ([`SliceSource`]) or a gzip stream decompressed on demand through a fixed
//! sliding cache ([`GzSource`]), so a large archive never has to be inflated
//! into memory at once.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

/// Size of the decompression cache window of [`GzSource`], in bytes
pub const GZ_CACHE_SIZE: usize = 32768;

/// Default width of a bit-shaved float field
pub const DEFAULT_FLOAT_BITS: u32 = 17;

/// Lower bound of the default scale-offset range, in LDraw units
pub const SCALE_OFFSET_MIN: f32 = -23973.3;

/// Upper bound of the default scale-offset range, in LDraw units
pub const SCALE_OFFSET_MAX: f32 = 10368.0;

fn mask(n: u32) -> u64 {
    (1u64 << n) - 1
}

/// Extract `n` bits starting at `offset` from a byte-addressed source
fn read_bits_with<F>(
    operation: &'static str,
    bit_len: usize,
    offset: usize,
    n: u32,
    mut byte_at: F,
) -> Result<u32>
where
    F: FnMut(usize) -> Result<u8>,
{
    if n > 32 || offset.checked_add(n as usize).is_none_or(|end| end > bit_len) {
        return Err(Error::BitRange {
            operation,
            offset,
            bits: n,
            len: bit_len,
        });
    }

    let mut value: u64 = 0;
    let mut pos = offset;
    let mut remaining = n;
    while remaining > 0 {
        let byte = byte_at(pos / 8)?;
        let avail = 8 - (pos % 8) as u32;
        let take = avail.min(remaining);
        let chunk = (u64::from(byte) >> (avail - take)) & mask(take);
        value = (value << take) | chunk;
        pos += take as usize;
        remaining -= take;
    }
    Ok(value as u32)
}

/// Growable, write-once bit buffer
///
/// # Example
///
/// ```
/// use libldr::bit_codec::BitBuffer;
///
/// let mut buf = BitBuffer::new();
/// buf.write_bits(0b101, 3);
/// buf.write_bits(0x1234, 16);
/// assert_eq!(buf.len(), 19);
/// assert_eq!(buf.read_bits(0, 3).unwrap(), 0b101);
/// assert_eq!(buf.read_bits(3, 16).unwrap(), 0x1234);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    data: Vec<u8>,
    len: usize,
}

impl BitBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes; every bit of every byte counts as written
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() * 8;
        Self { data, len }
    }

    /// Number of bits written so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bit has been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing bytes; the last byte is zero-padded
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Append the low `n` bits of `value`, most significant first
    ///
    /// Widths above 32 are clamped to 32.
    pub fn write_bits(&mut self, value: u32, n: u32) {
        let n = n.min(32);
        let value = u64::from(value) & mask(n);
        let mut remaining = n;
        while remaining > 0 {
            let used = (self.len % 8) as u32;
            if used == 0 {
                self.data.push(0);
            }
            let free = 8 - used;
            let take = free.min(remaining);
            let chunk = ((value >> (remaining - take)) & mask(take)) as u8;
            if let Some(last) = self.data.last_mut() {
                *last |= chunk << (free - take);
            }
            self.len += take as usize;
            remaining -= take;
        }
    }

    /// Append one byte
    pub fn write_u8(&mut self, value: u8) {
        self.write_bits(u32::from(value), 8);
    }

    /// Append a 16-bit value
    pub fn write_u16(&mut self, value: u16) {
        self.write_bits(u32::from(value), 16);
    }

    /// Append a 32-bit value
    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(value, 32);
    }

    /// Append a 64-bit value, high half first
    pub fn write_u64(&mut self, value: u64) {
        self.write_bits((value >> 32) as u32, 32);
        self.write_bits(value as u32, 32);
    }

    /// Append a single flag bit
    pub fn write_bool(&mut self, value: bool) {
        self.write_bits(u32::from(value), 1);
    }

    /// Append a float through the given codec
    pub fn write_float(&mut self, value: f32, codec: &dyn FloatCodec) {
        self.write_bits(codec.encode(value), codec.bits());
    }

    /// Append every bit of another buffer
    pub fn append(&mut self, other: &BitBuffer) {
        let mut pos = 0;
        while pos < other.len {
            let n = (other.len - pos).min(32) as u32;
            if let Ok(v) = other.read_bits(pos, n) {
                self.write_bits(v, n);
            }
            pos += n as usize;
        }
    }

    /// Read `n` bits (at most 32) starting at bit `offset`
    ///
    /// # Errors
    ///
    /// Returns [`Error::BitRange`] when the read would go past the last
    /// written bit.
    pub fn read_bits(&self, offset: usize, n: u32) -> Result<u32> {
        read_bits_with("BitBuffer::read_bits", self.len, offset, n, |i| {
            Ok(self.data[i])
        })
    }

    /// Compare `n` bits at `offset` in `self` with `n` bits at `other_offset` in `other`
    pub fn bits_equal(&self, offset: usize, other: &BitBuffer, other_offset: usize, n: usize) -> bool {
        if offset + n > self.len || other_offset + n > other.len {
            return false;
        }
        let mut done = 0;
        while done < n {
            let step = (n - done).min(32) as u32;
            let a = self.read_bits(offset + done, step);
            let b = other.read_bits(other_offset + done, step);
            match (a, b) {
                (Ok(a), Ok(b)) if a == b => {}
                _ => return false,
            }
            done += step as usize;
        }
        true
    }

    /// Sequential reader over this buffer
    pub fn reader(&self) -> BitReader<SliceSource<'_>> {
        BitReader::new(SliceSource::with_bit_len(&self.data, self.len))
    }
}

/// Random-access byte storage that a [`BitReader`] decodes from
pub trait BitSource {
    /// Total number of readable bits
    fn bit_len(&self) -> usize;

    /// Fetch the byte at `index`
    fn byte_at(&mut self, index: usize) -> Result<u8>;
}

/// In-memory byte block
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    bit_len: usize,
}

impl<'a> SliceSource<'a> {
    /// Expose every bit of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            bit_len: bytes.len() * 8,
        }
    }

    /// Expose only the first `bit_len` bits of `bytes`
    pub fn with_bit_len(bytes: &'a [u8], bit_len: usize) -> Self {
        Self {
            bytes,
            bit_len: bit_len.min(bytes.len() * 8),
        }
    }
}

impl BitSource for SliceSource<'_> {
    fn bit_len(&self) -> usize {
        self.bit_len
    }

    fn byte_at(&mut self, index: usize) -> Result<u8> {
        self.bytes.get(index).copied().ok_or(Error::BitRange {
            operation: "SliceSource::byte_at",
            offset: index * 8,
            bits: 8,
            len: self.bit_len,
        })
    }
}

/// Gzip-compressed byte stream read through a sliding cache
///
/// The decoded length comes from the gzip ISIZE trailer, so a single-member
/// stream smaller than 4 GiB is required. Reads inside the cached window are
/// served from memory; a forward jump skips decompressed bytes and a backward
/// jump restarts decompression from the beginning.
pub struct GzSource {
    compressed: Arc<[u8]>,
    decoder: GzDecoder<Cursor<Arc<[u8]>>>,
    decoded_pos: usize,
    cache: Vec<u8>,
    cache_start: usize,
    len: usize,
}

impl std::fmt::Debug for GzSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzSource")
            .field("compressed_len", &self.compressed.len())
            .field("len", &self.len)
            .field("cache_start", &self.cache_start)
            .field("cache_len", &self.cache.len())
            .finish()
    }
}

impl GzSource {
    /// Wrap a complete gzip member
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArchive`] when the data is too short to hold a
    /// gzip header and trailer.
    pub fn new(compressed: impl Into<Arc<[u8]>>) -> Result<Self> {
        let compressed: Arc<[u8]> = compressed.into();
        // 10-byte header + 8-byte trailer
        if compressed.len() < 18 || compressed[0] != 0x1f || compressed[1] != 0x8b {
            return Err(Error::invalid_archive(
                "GzSource::new",
                "data is not a gzip stream",
            ));
        }
        let tail = &compressed[compressed.len() - 4..];
        let len = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as usize;
        let decoder = GzDecoder::new(Cursor::new(Arc::clone(&compressed)));
        Ok(Self {
            compressed,
            decoder,
            decoded_pos: 0,
            cache: Vec::new(),
            cache_start: 0,
            len,
        })
    }

    /// Decoded length in bytes
    pub fn decoded_len(&self) -> usize {
        self.len
    }

    fn load_block(&mut self, block_start: usize) -> Result<()> {
        if block_start < self.decoded_pos {
            tracing::trace!(block_start, "restarting gzip stream for backward seek");
            self.decoder = GzDecoder::new(Cursor::new(Arc::clone(&self.compressed)));
            self.decoded_pos = 0;
        }
        let skip = (block_start - self.decoded_pos) as u64;
        if skip > 0 {
            let skipped = io::copy(&mut (&mut self.decoder).take(skip), &mut io::sink())?;
            self.decoded_pos += skipped as usize;
            if skipped < skip {
                return Err(Error::invalid_archive(
                    "GzSource::load_block",
                    "compressed stream ended early",
                ));
            }
        }
        let want = GZ_CACHE_SIZE.min(self.len - block_start);
        self.cache.resize(want, 0);
        self.decoder.read_exact(&mut self.cache)?;
        self.decoded_pos += want;
        self.cache_start = block_start;
        Ok(())
    }
}

impl BitSource for GzSource {
    fn bit_len(&self) -> usize {
        self.len * 8
    }

    fn byte_at(&mut self, index: usize) -> Result<u8> {
        if index >= self.len {
            return Err(Error::BitRange {
                operation: "GzSource::byte_at",
                offset: index * 8,
                bits: 8,
                len: self.len * 8,
            });
        }
        let in_cache = index >= self.cache_start && index < self.cache_start + self.cache.len();
        if !in_cache {
            self.load_block(index - index % GZ_CACHE_SIZE)?;
        }
        Ok(self.cache[index - self.cache_start])
    }
}

/// Cursor that decodes fields sequentially from a [`BitSource`]
#[derive(Debug)]
pub struct BitReader<S> {
    source: S,
    pos: usize,
}

impl<S: BitSource> BitReader<S> {
    /// Start reading at bit 0
    pub fn new(source: S) -> Self {
        Self { source, pos: 0 }
    }

    /// Current bit position
    pub fn bit_pos(&self) -> usize {
        self.pos
    }

    /// Jump to an absolute bit position
    pub fn set_bit_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Total readable bits of the underlying source
    pub fn bit_len(&self) -> usize {
        self.source.bit_len()
    }

    /// True when no more bits remain
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.source.bit_len()
    }

    /// Read `n` bits and advance
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        let len = self.source.bit_len();
        let source = &mut self.source;
        let value = read_bits_with("BitReader::read_bits", len, self.pos, n, |i| {
            source.byte_at(i)
        })?;
        self.pos += n as usize;
        Ok(value)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Read a 16-bit value
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    /// Read a 32-bit value
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bits(32)
    }

    /// Read a 64-bit value, high half first
    pub fn read_u64(&mut self) -> Result<u64> {
        let hi = u64::from(self.read_bits(32)?);
        let lo = u64::from(self.read_bits(32)?);
        Ok((hi << 32) | lo)
    }

    /// Read a flag bit
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Read a float through the given codec
    pub fn read_float(&mut self, codec: &dyn FloatCodec) -> Result<f32> {
        Ok(codec.decode(self.read_bits(codec.bits())?))
    }

    /// Mutable access to the source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the reader and return its source
    pub fn into_inner(self) -> S {
        self.source
    }
}

/// Lossy float compression strategy
///
/// Implementations only promise that `decode(encode(x))` is close to `x`.
pub trait FloatCodec {
    /// Width of an encoded value in bits
    fn bits(&self) -> u32;

    /// Compress a float into the low `bits()` bits of a `u32`
    fn encode(&self, value: f32) -> u32;

    /// Expand an encoded value
    fn decode(&self, bits: u32) -> f32;
}

/// Keeps the top bits of the IEEE-754 pattern, rounding to nearest
///
/// At the default width of 17 bits, sign and exponent are kept intact and
/// the mantissa is cut to 8 bits, giving about two significant decimal digits
/// of relative precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitShave {
    bits: u32,
}

impl BitShave {
    /// Create a codec of the given width, clamped to `9..=32` so sign and exponent survive
    pub fn new(bits: u32) -> Self {
        Self {
            bits: bits.clamp(9, 32),
        }
    }
}

impl Default for BitShave {
    fn default() -> Self {
        Self::new(DEFAULT_FLOAT_BITS)
    }
}

impl FloatCodec for BitShave {
    fn bits(&self) -> u32 {
        self.bits
    }

    fn encode(&self, value: f32) -> u32 {
        let u = value.to_bits();
        let shift = 32 - self.bits;
        if shift == 0 {
            return u;
        }
        let rounded = match u.checked_add(1 << (shift - 1)) {
            // a carry into the sign bit only happens for NaN patterns
            Some(r) if (r ^ u) & 0x8000_0000 == 0 => r,
            _ => u,
        };
        rounded >> shift
    }

    fn decode(&self, bits: u32) -> f32 {
        f32::from_bits(bits << (32 - self.bits))
    }
}

/// Linear quantisation of a fixed range into `bits` steps
///
/// Values outside `[min, max]` are clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleOffset {
    min: f32,
    max: f32,
    bits: u32,
}

impl ScaleOffset {
    /// Create a codec for `[min, max]` with the given width (clamped to `1..=32`)
    pub fn new(min: f32, max: f32, bits: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            bits: bits.clamp(1, 32),
        }
    }

    /// Lower bound of the range
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Upper bound of the range
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Distance between two adjacent quantised values
    pub fn step(&self) -> f64 {
        let steps = mask(self.bits) as f64;
        (f64::from(self.max) - f64::from(self.min)) / steps
    }
}

impl Default for ScaleOffset {
    fn default() -> Self {
        Self::new(SCALE_OFFSET_MIN, SCALE_OFFSET_MAX, DEFAULT_FLOAT_BITS)
    }
}

impl FloatCodec for ScaleOffset {
    fn bits(&self) -> u32 {
        self.bits
    }

    fn encode(&self, value: f32) -> u32 {
        let step = self.step();
        if step == 0.0 || value.is_nan() {
            return 0;
        }
        let clamped = f64::from(value.clamp(self.min, self.max));
        let q = ((clamped - f64::from(self.min)) / step).round();
        q.min(mask(self.bits) as f64) as u32
    }

    fn decode(&self, bits: u32) -> f32 {
        (f64::from(self.min) + f64::from(bits) * self.step()) as f32
    }
}

/// Float codec selected at runtime, as recorded in an archive header
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatEncoding {
    /// IEEE bit pattern truncation
    BitShave(BitShave),
    /// Fixed-range linear quantisation
    ScaleOffset(ScaleOffset),
}

impl FloatEncoding {
    /// Numeric identifier written into archive headers
    pub fn id(&self) -> u8 {
        match self {
            FloatEncoding::BitShave(_) => 0,
            FloatEncoding::ScaleOffset(_) => 1,
        }
    }
}

impl Default for FloatEncoding {
    fn default() -> Self {
        FloatEncoding::BitShave(BitShave::default())
    }
}

impl FloatCodec for FloatEncoding {
    fn bits(&self) -> u32 {
        match self {
            FloatEncoding::BitShave(c) => c.bits(),
            FloatEncoding::ScaleOffset(c) => c.bits(),
        }
    }

    fn encode(&self, value: f32) -> u32 {
        match self {
            FloatEncoding::BitShave(c) => c.encode(value),
            FloatEncoding::ScaleOffset(c) => c.encode(value),
        }
    }

    fn decode(&self, bits: u32) -> f32 {
        match self {
            FloatEncoding::BitShave(c) => c.decode(bits),
            FloatEncoding::ScaleOffset(c) => c.decode(bits),
        }
    }
}

/// Round a float to the value a `bits`-wide bit-shaved field would store
///
/// # Example
///
/// ```
/// use libldr::bit_codec::round_bits;
///
/// assert_eq!(round_bits(20.0, 17), 20.0);
/// assert!((round_bits(0.1234, 17) - 0.1234).abs() < 0.001);
/// ```
pub fn round_bits(value: f32, bits: u32) -> f32 {
    let codec = BitShave::new(bits);
    codec.decode(codec.encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_msb_first_layout() {
        let mut buf = BitBuffer::new();
        buf.write_bits(1, 1);
        buf.write_bits(0, 1);
        buf.write_bits(0b11, 2);
        assert_eq!(buf.as_bytes(), &[0b1011_0000]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_fields_across_byte_boundaries() {
        let mut buf = BitBuffer::new();
        buf.write_bits(5, 3);
        buf.write_bits(0x7f, 7);
        buf.write_bits(0x1abcd, 17);
        buf.write_bits(0x3fff_ffff, 30);
        buf.write_bits(0xdead_beef, 32);

        assert_eq!(buf.read_bits(0, 3).unwrap(), 5);
        assert_eq!(buf.read_bits(3, 7).unwrap(), 0x7f);
        assert_eq!(buf.read_bits(10, 17).unwrap(), 0x1abcd);
        assert_eq!(buf.read_bits(27, 30).unwrap(), 0x3fff_ffff);
        assert_eq!(buf.read_bits(57, 32).unwrap(), 0xdead_beef);
    }

    #[test]
    fn test_write_masks_extra_bits() {
        let mut buf = BitBuffer::new();
        buf.write_bits(0xff, 3);
        assert_eq!(buf.read_bits(0, 3).unwrap(), 0b111);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut buf = BitBuffer::new();
        buf.write_bits(3, 2);
        let err = buf.read_bits(1, 2).unwrap_err();
        assert!(matches!(err, Error::BitRange { offset: 1, bits: 2, len: 2, .. }));
        assert!(buf.read_bits(0, 33).is_err());
    }

    #[test]
    fn test_typed_helpers() {
        let mut buf = BitBuffer::new();
        buf.write_bool(true);
        buf.write_u8(0xab);
        buf.write_u16(0xbeef);
        buf.write_u32(0x0102_0304);
        buf.write_u64(0x1122_3344_5566_7788);

        let mut r = buf.reader();
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u8().unwrap(), 0xab);
        assert_eq!(r.read_u16().unwrap(), 0xbeef);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(r.read_u64().unwrap(), 0x1122_3344_5566_7788);
        assert!(r.is_exhausted());
        assert!(r.read_bool().is_err());
    }

    #[test]
    fn test_append_preserves_bits() {
        let mut a = BitBuffer::new();
        a.write_bits(1, 1);
        let mut b = BitBuffer::new();
        b.write_bits(0x2aaaa, 18);
        b.write_bits(0x12345678, 32);
        a.append(&b);
        assert_eq!(a.len(), 51);
        assert_eq!(a.read_bits(1, 18).unwrap(), 0x2aaaa);
        assert!(a.bits_equal(1, &b, 0, b.len()));
        assert!(!a.bits_equal(0, &b, 0, b.len()));
    }

    #[test]
    fn test_bit_shave_exact_for_short_mantissas() {
        let codec = BitShave::default();
        for v in [0.0f32, 1.0, -1.0, 20.0, -24.0, 0.5, 6.0, 1024.0] {
            assert_eq!(codec.decode(codec.encode(v)), v);
        }
    }

    #[test]
    fn test_bit_shave_rounds_to_nearest() {
        let codec = BitShave::default();
        // 1 + 2^-9 lies exactly halfway and rounds up
        let halfway = 1.0 + 1.0 / 512.0;
        assert_eq!(codec.decode(codec.encode(halfway)), 1.0 + 1.0 / 256.0);
        let below = 1.0 + 1.0 / 1024.0;
        assert_eq!(codec.decode(codec.encode(below)), 1.0);
    }

    #[test]
    fn test_bit_shave_relative_error() {
        let codec = BitShave::default();
        for v in [0.1234f32, 3.14159, -123.456, 9999.9] {
            let d = codec.decode(codec.encode(v));
            assert!(((d - v) / v).abs() < 1.0 / 256.0, "{} -> {}", v, d);
        }
    }

    #[test]
    fn test_scale_offset_within_half_step() {
        let codec = ScaleOffset::default();
        let half = codec.step() / 2.0 + 1e-3;
        for v in [SCALE_OFFSET_MIN, -100.0, 0.0, 12.5, SCALE_OFFSET_MAX] {
            let d = codec.decode(codec.encode(v));
            assert!((f64::from(d) - f64::from(v)).abs() <= half, "{} -> {}", v, d);
        }
    }

    #[test]
    fn test_scale_offset_clamps() {
        let codec = ScaleOffset::new(0.0, 10.0, 8);
        assert_eq!(codec.encode(-5.0), 0);
        assert_eq!(codec.encode(50.0), 255);
        assert_eq!(codec.decode(255), 10.0);
    }

    #[test]
    fn test_round_bits_matches_codec() {
        let codec = BitShave::new(17);
        let v = 37.77f32;
        assert_eq!(round_bits(v, 17), codec.decode(codec.encode(v)));
    }

    #[test]
    fn test_gz_source_reads_across_blocks() {
        let data: Vec<u8> = (0..(GZ_CACHE_SIZE * 2 + 100)).map(|i| (i % 251) as u8).collect();
        let mut src = GzSource::new(gzip(&data)).unwrap();
        assert_eq!(src.decoded_len(), data.len());

        let far = GZ_CACHE_SIZE * 2 + 50;
        assert_eq!(src.byte_at(far).unwrap(), data[far]);
        // backward seek restarts the stream
        assert_eq!(src.byte_at(3).unwrap(), data[3]);
        assert_eq!(src.byte_at(GZ_CACHE_SIZE).unwrap(), data[GZ_CACHE_SIZE]);
        assert!(src.byte_at(data.len()).is_err());
    }

    #[test]
    fn test_gz_source_matches_slice_source() {
        let mut buf = BitBuffer::new();
        for i in 0..500u32 {
            buf.write_bits(i * 7919, 19);
        }
        let compressed = gzip(buf.as_bytes());
        let mut gz = BitReader::new(GzSource::new(compressed).unwrap());
        let mut plain = buf.reader();
        for _ in 0..500 {
            assert_eq!(gz.read_bits(19).unwrap(), plain.read_bits(19).unwrap());
        }
    }

    #[test]
    fn test_gz_source_rejects_garbage() {
        assert!(GzSource::new(vec![1u8, 2, 3]).is_err());
        assert!(GzSource::new(vec![0u8; 32]).is_err());
    }
}
