use crate::chip8::{Chip8, KeyWait, STACK_DEPTH};
use crate::font::FONT_START_ADDRESS;
use crate::opcode::{Opcode, OpcodeALU};
use crate::types::{
    AudioSignal, Chip8Error, DISPLAY_X, DISPLAY_Y, IllegalOpcode, StepEffects,
};
use crate::u4;

impl Chip8 {
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<StepEffects, Chip8Error> {
        // PC is advanced before dispatch, so control-flow instructions operate
        // on the address of the next instruction by default.
        self.pc = self.pc.wrapping_add(2);

        let mut effects = StepEffects::default();

        match opcode {
            Opcode::Sys { .. } => {
                // Native routine call on the original hardware, ignored here
            }
            Opcode::ClearDisplay => {
                self.display = [[false; DISPLAY_X]; DISPLAY_Y];
                effects.redraw = true;
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                if self.stack.len() == STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow { depth: STACK_DEPTH });
                }
                self.stack.push(self.pc);
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.stack.pop().ok_or(Chip8Error::StackUnderflow)?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                if self.v[x] == nn {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                if self.v[x] != nn {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegEqualReg { x, y } => {
                if self.v[x] == self.v[y] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                if self.v[x] != self.v[y] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = rand::random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
                if self.vf_on_index_overflow {
                    self.v[0xF] = (self.i > 0x0FFF) as u8;
                }
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n)?;
                effects.redraw = true;
            }
            Opcode::SkipIfPressed { x } => {
                if self.keypad[self.v[x] as usize & 0x0F] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipIfNotPressed { x } => {
                if !self.keypad[self.v[x] as usize & 0x0F] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::WaitForKey { x } => {
                self.key_wait = KeyWait::AwaitingPress { dest: x };
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                let was_active = self.sound_timer > 0;
                self.sound_timer = self.v[x];

                if self.sound_timer > 0 {
                    effects.audio = Some(AudioSignal::StartTone);
                } else if was_active {
                    effects.audio = Some(AudioSignal::StopTone);
                }
            }
            Opcode::FontChar { x } => {
                self.i = FONT_START_ADDRESS as u16 + u16::from(self.v[x]) * 5;
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                *self.mem_get(self.i)? = value / 100;
                *self.mem_get(self.i.wrapping_add(1))? = (value / 10) % 10;
                *self.mem_get(self.i.wrapping_add(2))? = value % 10;
            }
            Opcode::StoreRegs { x } => {
                for reg_index in 0..=usize::from(x) {
                    *self.mem_get(self.i)? = self.v[reg_index];
                    self.i = self.i.wrapping_add(1);
                }
            }
            Opcode::LoadRegs { x } => {
                for reg_index in 0..=usize::from(x) {
                    self.v[reg_index] = *self.mem_get(self.i)?;
                    self.i = self.i.wrapping_add(1);
                }
            }
            Opcode::Unknown(opcode) => {
                // Non-fatal: report and carry on at the already-advanced PC
                effects.illegal_opcode = Some(IllegalOpcode {
                    opcode,
                    address: self.pc.wrapping_sub(2),
                });
            }
        };

        Ok(effects)
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = if overflow { 1 } else { 0 };
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = if borrow { 0 } else { 1 }; // Notice that borrow is inverted
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[0xF] = if borrow { 0 } else { 1 };
            }
            OpcodeALU::ShiftRight => {
                let lsb = self.v[x] & 1;
                self.v[x] >>= 1;
                self.v[0xF] = lsb;
            }
            OpcodeALU::ShiftLeft => {
                let msb = (self.v[x] >> 7) & 1;
                self.v[x] <<= 1;
                self.v[0xF] = msb;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<(), Chip8Error> {
        let x_pos = self.v[x] as usize % DISPLAY_X;
        let y_pos = self.v[y] as usize % DISPLAY_Y;

        let mut any_erased = false;
        for row in 0..usize::from(n) {
            let sprite_byte = *self.mem_get(self.i.wrapping_add(row as u16))?;

            for col in 0..8 {
                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    // Coordinates wrap around both display edges
                    let pixel =
                        &mut self.display[(y_pos + row) % DISPLAY_Y][(x_pos + col) % DISPLAY_X];

                    // Flip the pixel
                    *pixel ^= true;

                    if !*pixel {
                        any_erased = true;
                    }
                }
            }
        }

        self.v[0xF] = if any_erased { 1 } else { 0 };
        Ok(())
    }
}
