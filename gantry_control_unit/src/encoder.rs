//! Quadrature decoding and jog input filtering.
//!
//! One transition table serves every rotary encoder on the machine; the
//! instances differ only in what consumes the decoded tick. The UI encoder
//! feeds menu events (with a debounced push button that preempts channel
//! logic), while each jog encoder feeds its axis position counter through a
//! tolerance filter that rejects single-tick direction jitter.

use gantry_common::signal::InputLine;
use gantry_common::types::Direction;

// ─── Quadrature Decoder ─────────────────────────────────────────────

/// Decode state of one encoder's A/B channel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// Both channels released.
    Idle = 0,
    /// A asserted first, direction still open.
    AFirst = 1,
    /// B asserted first, direction still open.
    BFirst = 2,
    /// Completed a counter-clockwise transition.
    Left = 3,
    /// Completed a clockwise transition.
    Right = 4,
}

/// Gray-code transition decoder for one encoder.
///
/// A tick is emitted exactly when the second channel asserts after the
/// first; asserting both channels simultaneously from idle is ambiguous
/// and rejected. Releasing both channels returns to idle from any state.
#[derive(Debug, Default)]
pub struct QuadratureDecoder {
    state: ChannelState,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::Idle
    }
}

impl QuadratureDecoder {
    pub const fn new() -> Self {
        Self {
            state: ChannelState::Idle,
        }
    }

    /// Current decode state.
    #[inline]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Feed one sample of the asserted-ness of channels A and B.
    ///
    /// Returns a direction tick when a valid transition completes.
    pub fn sample(&mut self, a: bool, b: bool) -> Option<Direction> {
        use ChannelState::*;

        let (next, tick) = match (self.state, a, b) {
            // Simultaneous assert from idle is ambiguous.
            (Idle, true, true) => (Idle, None),
            (Idle, true, false) => (AFirst, None),
            (Idle, false, true) => (BFirst, None),

            // Second channel closes the transition.
            (AFirst, _, true) => (Left, Some(Direction::Left)),
            (BFirst, true, _) => (Right, Some(Direction::Right)),

            // Full release returns to idle from any state.
            (_, false, false) => (Idle, None),

            // Hold position otherwise (first channel still alone, or a
            // completed transition waiting for release).
            (state, _, _) => (state, None),
        };

        self.state = next;
        tick
    }
}

// ─── Tolerance Filter ───────────────────────────────────────────────

/// Jitter-rejection accumulator for jog ticks.
///
/// A tick is committed to the position counter only after `tolerance`
/// consecutive same-direction ticks since the last commit or reversal.
/// A reversal discards the accumulated count; the reversing tick becomes
/// the first tick of the new direction. Rapid alternation therefore never
/// commits — observed behavior of the source firmware, preserved as-is.
///
/// Invariant: `|counter| <= tolerance`.
#[derive(Debug)]
pub struct ToleranceFilter {
    tolerance: i32,
    counter: i32,
}

impl ToleranceFilter {
    /// `tolerance` is clamped to at least 1 (1 = no filtering).
    pub fn new(tolerance: u8) -> Self {
        Self {
            tolerance: i32::from(tolerance.max(1)),
            counter: 0,
        }
    }

    /// Accumulated same-direction ticks, signed.
    #[inline]
    pub const fn counter(&self) -> i32 {
        self.counter
    }

    /// Feed one decoded tick; returns the tick when it commits.
    pub fn apply(&mut self, tick: Direction) -> Option<Direction> {
        let sign = tick.sign();
        if self.counter != 0 && self.counter.signum() != sign {
            // Reversal: discard jitter, restart the count in the new
            // direction with this tick.
            self.counter = sign;
            return None;
        }
        self.counter += sign;
        if self.counter.abs() >= self.tolerance {
            self.counter = 0;
            Some(tick)
        } else {
            None
        }
    }
}

// ─── Debounced Button ───────────────────────────────────────────────

/// Settle-time debounce for the UI encoder push button.
///
/// The raw level must stay asserted for `settle_ticks` consecutive polls
/// before a press latches; the latch releases when the level drops, arming
/// the next press.
#[derive(Debug)]
pub struct DebouncedButton {
    settle_ticks: u32,
    held: u32,
    latched: bool,
}

impl DebouncedButton {
    pub const fn new(settle_ticks: u32) -> Self {
        Self {
            settle_ticks,
            held: 0,
            latched: false,
        }
    }

    /// Whether a settled press is currently held.
    #[inline]
    pub const fn is_pressed(&self) -> bool {
        self.latched
    }

    /// Feed one raw sample; returns `true` on the poll that latches a press.
    pub fn sample(&mut self, raw_pressed: bool) -> bool {
        if !raw_pressed {
            self.held = 0;
            self.latched = false;
            return false;
        }
        self.held = self.held.saturating_add(1);
        if !self.latched && self.held >= self.settle_ticks {
            self.latched = true;
            return true;
        }
        false
    }
}

// ─── Encoder Instances ──────────────────────────────────────────────

/// Event produced by the UI encoder for the menu layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Left,
    Right,
    Pressed,
}

/// The operator's menu encoder: A/B channels plus a push button.
pub struct UiEncoder {
    chan_a: InputLine,
    chan_b: InputLine,
    button: InputLine,
    decoder: QuadratureDecoder,
    debounce: DebouncedButton,
}

impl UiEncoder {
    pub fn new(chan_a: InputLine, chan_b: InputLine, button: InputLine, settle_ticks: u32) -> Self {
        Self {
            chan_a,
            chan_b,
            button,
            decoder: QuadratureDecoder::new(),
            debounce: DebouncedButton::new(settle_ticks),
        }
    }

    /// Configure all three inputs.
    pub fn init(&self) {
        self.chan_a.init();
        self.chan_b.init();
        self.button.init();
    }

    /// Sample the encoder once.
    ///
    /// The button preempts channel logic: while the raw button level is
    /// asserted, A/B transitions are not evaluated.
    pub fn poll(&mut self) -> Option<UiEvent> {
        let raw_pressed = self.button.is_asserted();
        if self.debounce.sample(raw_pressed) {
            return Some(UiEvent::Pressed);
        }
        if raw_pressed {
            return None;
        }
        match self.decoder.sample(self.chan_a.is_asserted(), self.chan_b.is_asserted()) {
            Some(Direction::Left) => Some(UiEvent::Left),
            Some(Direction::Right) => Some(UiEvent::Right),
            None => None,
        }
    }
}

/// A jog encoder feeding one axis position counter through the tolerance
/// filter.
pub struct JogEncoder {
    chan_a: InputLine,
    chan_b: InputLine,
    decoder: QuadratureDecoder,
    filter: ToleranceFilter,
}

impl JogEncoder {
    pub fn new(chan_a: InputLine, chan_b: InputLine, tolerance: u8) -> Self {
        Self {
            chan_a,
            chan_b,
            decoder: QuadratureDecoder::new(),
            filter: ToleranceFilter::new(tolerance),
        }
    }

    pub fn init(&self) {
        self.chan_a.init();
        self.chan_b.init();
    }

    /// Sample the encoder once; returns a committed position tick.
    pub fn poll(&mut self) -> Option<Direction> {
        self.decoder
            .sample(self.chan_a.is_asserted(), self.chan_b.is_asserted())
            .and_then(|tick| self.filter.apply(tick))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
