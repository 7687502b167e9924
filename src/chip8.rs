use crate::font::{FONT, FONT_START_ADDRESS};
use crate::opcode::Opcode;
use crate::types::{AudioSignal, Chip8Error, DISPLAY_X, DISPLAY_Y, Display, StepEffects};
use crate::u4;

// The constants are specified by the CHIP-8 specification
const ROM_START_ADDRESS: usize = 0x200;
pub(crate) const MEMORY_SIZE: usize = 4096;
pub(crate) const STACK_DEPTH: usize = 16;

/// Stall state for the FX0A instruction.
///
/// While not `Idle`, `step()` consumes cycles without fetching, so the program
/// counter holds still until the captured key has been pressed and released.
#[derive(Clone, Copy)]
pub(crate) enum KeyWait {
    Idle,
    /// Scanning the keypad for any pressed key; its index goes into `dest`.
    AwaitingPress { dest: u4 },
    /// A key was captured; execution resumes once it is released.
    AwaitingRelease { key: u8 },
}

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array, font glyphs in the first 80 bytes
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Display<bool>,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns, at most `STACK_DEPTH` deep
    pub(crate) stack: Vec<u16>,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, tone is active while non-zero
    pub(crate) sound_timer: u8,

    /// FX0A stall state
    pub(crate) key_wait: KeyWait,
    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],

    /// Compatibility choice for FX1E: when set, VF = 1 if I leaves the 12-bit
    /// address space. Historical interpreters disagree; off by default.
    pub vf_on_index_overflow: bool,
}

impl Chip8 {
    pub fn new() -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[FONT_START_ADDRESS..FONT_START_ADDRESS + FONT.len()].copy_from_slice(&FONT);

        Chip8 {
            memory,
            display: [[false; DISPLAY_X]; DISPLAY_Y],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::with_capacity(STACK_DEPTH),
            delay_timer: 0,
            sound_timer: 0,
            key_wait: KeyWait::Idle,
            keypad: [false; 16],
            vf_on_index_overflow: false,
        }
    }

    /// Copies a program image into memory starting at 0x200 and resets the
    /// program counter to it.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS,
            })?
            .copy_from_slice(rom);

        self.pc = ROM_START_ADDRESS as u16;

        Ok(())
    }

    /// Executes a single fetch-decode-execute cycle.
    ///
    /// Returns the observable side effects of the cycle, or a fatal fault.
    pub fn step(&mut self) -> Result<StepEffects, Chip8Error> {
        if let Some(effects) = self.poll_key_wait() {
            return Ok(effects);
        }

        let opcode = self.fetch()?;
        self.execute(Opcode::decode(opcode))
    }

    /// Decrements the delay and sound timers. Should be called at 60Hz.
    ///
    /// Emits `StopTone` exactly once, when the sound timer reaches zero.
    pub fn tick_timers(&mut self) -> Option<AudioSignal> {
        self.delay_timer = self.delay_timer.saturating_sub(1);

        if self.sound_timer > 0 {
            self.sound_timer -= 1;
            if self.sound_timer == 0 {
                return Some(AudioSignal::StopTone);
            }
        }

        None
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.display[y][x]
    }

    /// Advances the FX0A stall state.
    ///
    /// Returns `Some` when the cycle is consumed by the stall, `None` when
    /// execution should proceed with a normal fetch.
    fn poll_key_wait(&mut self) -> Option<StepEffects> {
        match self.key_wait {
            KeyWait::Idle => None,
            KeyWait::AwaitingPress { dest } => {
                if let Some(key) = (0..16).find(|&key| self.keypad[key as usize]) {
                    self.v[dest] = key;
                    self.key_wait = KeyWait::AwaitingRelease { key };
                }
                Some(StepEffects::default())
            }
            KeyWait::AwaitingRelease { key } => {
                if self.keypad[key as usize] {
                    Some(StepEffects::default())
                } else {
                    // Key released, resume with a normal fetch this cycle
                    self.key_wait = KeyWait::Idle;
                    None
                }
            }
        }
    }

    /// Fetches the next 16-bit opcode from memory, big-endian.
    fn fetch(&mut self) -> Result<u16, Chip8Error> {
        let high = *self.mem_get(self.pc)?;
        let low = *self.mem_get(self.pc.wrapping_add(1))?;

        Ok(u16::from_be_bytes([high, low]))
    }

    /// Helper to get a mutable reference to a memory location with bounds checking.
    pub(crate) fn mem_get(&mut self, addr: u16) -> Result<&mut u8, Chip8Error> {
        self.memory
            .get_mut(addr as usize)
            .ok_or(Chip8Error::MemoryFault { address: addr })
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_writes_font_and_resets_state() {
        let chip8 = Chip8::new();

        assert_eq!(chip8.memory[0..5], [0xF0, 0x90, 0x90, 0x90, 0xF0]);
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.i, 0);
        assert_eq!(chip8.v, [0; 16]);
        assert!(chip8.stack.is_empty());
    }

    #[test]
    fn load_copies_program_at_rom_start() {
        let mut chip8 = Chip8::new();
        chip8.load(&[0xAB, 0xCD]).unwrap();

        assert_eq!(chip8.memory[0x200..0x202], [0xAB, 0xCD]);
        assert_eq!(chip8.pc, 0x200);
    }

    #[test]
    fn load_rejects_oversized_program() {
        let mut chip8 = Chip8::new();
        let too_big = vec![0; MEMORY_SIZE - 0x200 + 1];

        assert_eq!(
            chip8.load(&too_big),
            Err(Chip8Error::RomTooLarge {
                size: too_big.len(),
                max_size: MEMORY_SIZE - 0x200,
            })
        );
    }

    #[test]
    fn timers_decrement_and_saturate_at_zero() {
        let mut chip8 = Chip8::new();
        chip8.delay_timer = 2;

        assert_eq!(chip8.tick_timers(), None);
        assert_eq!(chip8.delay_timer, 1);
        assert_eq!(chip8.tick_timers(), None);
        assert_eq!(chip8.delay_timer, 0);
        assert_eq!(chip8.tick_timers(), None);
        assert_eq!(chip8.delay_timer, 0);
    }

    #[test]
    fn sound_timer_emits_stop_tone_edge_once() {
        let mut chip8 = Chip8::new();
        chip8.sound_timer = 1;

        assert_eq!(chip8.tick_timers(), Some(AudioSignal::StopTone));
        assert_eq!(chip8.sound_timer, 0);
        assert_eq!(chip8.tick_timers(), None);
        assert_eq!(chip8.tick_timers(), None);
    }

    #[test]
    fn fetch_past_end_of_memory_is_a_memory_fault() {
        let mut chip8 = Chip8::new();
        chip8.pc = 0xFFF;

        assert_eq!(
            chip8.step(),
            Err(Chip8Error::MemoryFault { address: 0x1000 })
        );
    }

    #[test]
    fn wait_for_key_stalls_until_press_and_release() {
        let mut chip8 = Chip8::new();
        // F50A: wait for a key, store it in V5
        chip8.load(&[0xF5, 0x0A]).unwrap();

        // The instruction itself executes, then the machine stalls
        chip8.step().unwrap();
        for _ in 0..3 {
            chip8.step().unwrap();
            assert_eq!(chip8.pc, 0x202);
            assert_eq!(chip8.v[5], 0);
        }

        // Pressing key 5 captures it, but the stall holds until release
        chip8.set_key(u4::new(5), true);
        chip8.step().unwrap();
        assert_eq!(chip8.v[5], 5);
        assert_eq!(chip8.pc, 0x202);

        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x202);

        // Release resumes normal execution (next opcode is 0000, a no-op)
        chip8.set_key(u4::new(5), false);
        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x204);
    }

    #[test]
    fn timers_keep_ticking_during_key_wait_stall() {
        let mut chip8 = Chip8::new();
        chip8.load(&[0xF0, 0x0A]).unwrap();
        chip8.delay_timer = 10;

        chip8.step().unwrap();
        chip8.step().unwrap();
        chip8.tick_timers();

        assert_eq!(chip8.delay_timer, 9);
        assert_eq!(chip8.pc, 0x202);
    }
}
