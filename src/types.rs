pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

/// Edge-triggered audio signal tied to the sound timer.
///
/// `StartTone` is emitted when FX18 loads a nonzero value, `StopTone` when the
/// 60Hz tick decrements the sound timer to zero. Each edge fires exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSignal {
    StartTone,
    StopTone,
}

/// Report produced when a fetched opcode matches no known instruction.
///
/// Non-fatal: execution continues past the offending instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal opcode {opcode:#06X} at address {address:#05X}")]
pub struct IllegalOpcode {
    pub opcode: u16,
    pub address: u16,
}

/// Observable side effects of a single CPU step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepEffects {
    /// The display buffer changed (draw or clear) and should be presented again.
    pub redraw: bool,
    /// Audio edge produced by FX18.
    pub audio: Option<AudioSignal>,
    /// Set when the fetched opcode had no registered handler.
    pub illegal_opcode: Option<IllegalOpcode>,
}

/// Fatal faults that terminate the current run.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryFault { address: u16 },

    #[error("stack overflow: subroutine calls nested deeper than {depth} levels")]
    StackOverflow { depth: usize },

    #[error("stack underflow: attempted to return with an empty call stack")]
    StackUnderflow,
}
