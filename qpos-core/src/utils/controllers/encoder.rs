//! Quadrature encoder position source.
//!
//! The motor shaft position is a 16-bit counter that moves by one count per
//! quadrature edge (4× decode) and wraps silently at both ends. On the target
//! the counter is maintained by the decode path (hardware QEI or a pin-change
//! handler); the control loop only ever reads it.

use core::sync::atomic::{AtomicU16, Ordering};

use embedded_hal::digital::InputPin;

/// Raw encoder position, monotonic modulo 65536.
pub type Position = u16;

/// Anything the control loop can sample the shaft position from.
///
/// `read` must not block: it is called from the tick context.
pub trait PositionSource {
    fn read(&self) -> Position;
}

/// 16-bit wrapping position counter shared between the decode path and readers.
///
/// There is exactly one writer (the decoder), so updates are a plain
/// load/store pair and work on targets without compare-and-swap.
pub struct QuadratureCounter {
    count: AtomicU16,
}

impl QuadratureCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU16::new(0),
        }
    }

    /// Move the counter by `delta` counts, wrapping modulo 65536.
    #[inline]
    pub fn step(&self, delta: i8) {
        let current = self.count.load(Ordering::Relaxed);
        self.count
            .store(current.wrapping_add_signed(delta as i16), Ordering::Release);
    }

    /// Clear the position count.
    #[inline]
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }
}

impl Default for QuadratureCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for QuadratureCounter {
    #[inline]
    fn read(&self) -> Position {
        self.count.load(Ordering::Acquire)
    }
}

impl<T: PositionSource + ?Sized> PositionSource for &T {
    #[inline]
    fn read(&self) -> Position {
        (**self).read()
    }
}

/// Channel state packed as `A << 1 | B`.
#[inline]
fn phase(a: bool, b: bool) -> u8 {
    ((a as u8) << 1) | b as u8
}

/// Count delta for every (previous, current) phase pair.
///
/// Gray-code sequence 00 → 01 → 11 → 10 counts up; the reverse counts down.
/// No change and illegal two-channel jumps count nothing.
const TRANSITIONS: [i8; 16] = [
    0, 1, -1, 0, //
    -1, 0, 0, 1, //
    1, 0, 0, -1, //
    0, -1, 1, 0, //
];

/// 4× quadrature decode state machine.
///
/// Feed it the current level of channels A and B on every edge (or faster);
/// each valid transition moves the position by one count.
#[derive(Debug, Clone, Copy)]
pub struct QuadratureDecoder {
    last: u8,
    illegal: u32,
}

impl QuadratureDecoder {
    /// Start decoding from the given channel levels.
    pub const fn new(a: bool, b: bool) -> Self {
        Self {
            last: ((a as u8) << 1) | b as u8,
            illegal: 0,
        }
    }

    /// Decode one sample and return the count delta (-1, 0 or +1).
    pub fn decode(&mut self, a: bool, b: bool) -> i8 {
        let current = phase(a, b);
        let index = ((self.last << 2) | current) as usize;
        // both channels changed at once: an edge was missed
        if self.last ^ current == 0b11 {
            self.illegal = self.illegal.wrapping_add(1);
        }
        self.last = current;
        TRANSITIONS[index]
    }

    /// Decode one sample and apply it to `counter`.
    pub fn update(&mut self, counter: &QuadratureCounter, a: bool, b: bool) -> i8 {
        let delta = self.decode(a, b);
        if delta != 0 {
            counter.step(delta);
        }
        delta
    }

    /// Number of illegal (double-edge) transitions seen so far.
    pub fn illegal_transitions(&self) -> u32 {
        self.illegal
    }
}

/// Decoder that samples channels A and B from GPIO inputs.
pub struct PinDecoder<A, B> {
    a: A,
    b: B,
    decoder: QuadratureDecoder,
}

impl<A, B, E> PinDecoder<A, B>
where
    A: InputPin<Error = E>,
    B: InputPin<Error = E>,
{
    /// Wrap two input pins; the first `poll` establishes the reference phase.
    pub fn new(a: A, b: B) -> Self {
        Self {
            a,
            b,
            decoder: QuadratureDecoder::new(false, false),
        }
    }

    /// Read both channels and step `counter` accordingly.
    pub fn poll(&mut self, counter: &QuadratureCounter) -> Result<i8, E> {
        let a = self.a.is_high()?;
        let b = self.b.is_high()?;
        Ok(self.decoder.update(counter, a, b))
    }

    pub fn illegal_transitions(&self) -> u32 {
        self.decoder.illegal_transitions()
    }

    /// Consume the decoder and return the input pins.
    pub fn free(self) -> (A, B) {
        (self.a, self.b)
    }
}
