// Copyright 2018 Ian Johnson

// This file is part of Vip8.

// Vip8 is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Vip8 is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Vip8.  If not, see <http://www.gnu.org/licenses/>.

//! The Chip-8 interpreter.
//!
//! The main focus of this module is the `Interpreter` struct, which contains
//! the state of a Chip-8 interpreter and provides the main interface to be
//! used by the front-end.  Each call to `step` executes exactly one
//! instruction; every instruction either advances the program counter by two
//! or assigns it a new value, so a run can never get stuck on a single
//! instruction (the one deliberate exception is `LD Vx, K`, which re-executes
//! until a key is pressed).  A few options can be configured using the
//! `Options` struct, such as the frequency of the delay and sound timers.

use std::default::Default;
use std::fmt::Write;
use std::io::Read;
use std::num::Wrapping;
use std::u8;

use failure::{Error, ResultExt};
use rand;

use MEM_SIZE;
use PROG_START;
use PROG_SIZE;
use Register;
use display::{self, HEX_SPRITES, HEX_SPRITE_HEIGHT};
use input::{self, Key};
use instruction::{Address, AddressOutOfBoundsError, AlignedAddress, Instruction, Opcode};
use timer::Timer;

/// The location at which to put the hex sprites.
const HEX_START: usize = 0x0;

/// An error resulting from a bad `RET` instruction.
#[derive(Debug, Fail)]
#[fail(display = "no subroutine to return from")]
pub struct NotInSubroutineError;

/// An error resulting from an input program being too large.
#[derive(Debug, Fail)]
#[fail(display = "input program is too large")]
pub struct ProgramTooLargeError;

/// Options for the interpreter.
pub struct Options {
    /// Whether to enable the timer (default `true`).
    pub enable_timer: bool,
    /// The frequency at which to run the delay and sound timers, in Hz
    /// (default 60).
    pub timer_freq: u32,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            enable_timer: true,
            timer_freq: 60,
        }
    }

    /// Returns a set of options useful for testing (e.g. no timer).
    pub fn testing() -> Self {
        Options {
            enable_timer: false,
            timer_freq: 60,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// A Chip-8 interpreter.
///
/// This struct contains the entire state of a Chip-8 interpreter and provides
/// all the expected methods for interacting with an interpreter, such as
/// stepping through execution and inspecting the internal state.  Several
/// instances can coexist, since all state is owned; this is used heavily in
/// the tests.
pub struct Interpreter {
    /// The internal memory.
    mem: [u8; MEM_SIZE],
    /// The display buffer.
    display: display::Buffer,
    /// The input state.
    input: input::State,
    /// The general-purpose registers `V0`-`VF`.
    regs: [Wrapping<u8>; 16],
    /// The special register `I`.
    reg_i: Address,
    /// The internal timer that drives `DT` and `ST`.
    timer: Timer,
    /// The delay timer.
    reg_dt: u8,
    /// The sound timer.
    reg_st: u8,
    /// The program counter.
    pc: AlignedAddress,
    /// The call stack (for returning from subroutines).
    call_stack: Vec<AlignedAddress>,
}

impl Interpreter {
    /// Returns a new interpreter with the default options.
    pub fn new() -> Self {
        Interpreter::with_options(Options::default())
    }

    /// Returns a new interpreter using the given options.
    pub fn with_options(options: Options) -> Self {
        let mut interpreter = Interpreter {
            mem: [0; MEM_SIZE],
            display: display::Buffer::new(),
            input: input::State::new(),
            regs: [Wrapping(0); 16],
            reg_i: Address::from_u16(0).unwrap(),
            timer: if options.enable_timer {
                Timer::new(options.timer_freq)
            } else {
                Timer::new_disabled(options.timer_freq)
            },
            reg_dt: 0,
            reg_st: 0,
            pc: Address::from_usize(PROG_START).unwrap().aligned().unwrap(),
            call_stack: Vec::new(),
        };

        // Copy sprites into memory.
        for (i, sprite) in HEX_SPRITES.iter().enumerate() {
            let start = HEX_START + i * HEX_SPRITE_HEIGHT;
            let end = start + sprite.len();
            interpreter.mem[start..end].copy_from_slice(sprite);
        }

        interpreter
    }

    /// Loads program data from the specified source.
    ///
    /// The program is rejected, and memory left untouched, if it does not
    /// fit in the space above `PROG_START`.
    pub fn load_program<R: Read>(&mut self, input: &mut R) -> Result<(), Error> {
        let mut prog = Vec::with_capacity(PROG_SIZE);
        input.read_to_end(&mut prog)?;
        if prog.len() > PROG_SIZE {
            return Err(ProgramTooLargeError.into());
        }
        self.mem[PROG_START..PROG_START + prog.len()].copy_from_slice(&prog);
        Ok(())
    }

    /// Returns a reference to the display buffer.
    pub fn display(&self) -> &display::Buffer {
        &self.display
    }

    /// Returns a mutable reference to the display buffer.
    pub fn display_mut(&mut self) -> &mut display::Buffer {
        &mut self.display
    }

    /// Returns a reference to the input state.
    pub fn input(&self) -> &input::State {
        &self.input
    }

    /// Returns a mutable reference to the input state.
    pub fn input_mut(&mut self) -> &mut input::State {
        &mut self.input
    }

    /// Returns a reference to the internal memory.
    pub fn mem(&self) -> &[u8; MEM_SIZE] {
        &self.mem
    }

    /// Returns a mutable reference to the internal memory.
    pub fn mem_mut(&mut self) -> &mut [u8; MEM_SIZE] {
        &mut self.mem
    }

    /// Returns the value of register `I`.
    pub fn i(&self) -> Address {
        self.reg_i
    }

    /// Sets the value of register `I`.
    pub fn set_i(&mut self, val: Address) {
        self.reg_i = val;
    }

    /// Returns the value of the delay timer.
    pub fn dt(&self) -> u8 {
        self.reg_dt
    }

    /// Sets the value of the delay timer.
    pub fn set_dt(&mut self, val: u8) {
        self.reg_dt = val;
    }

    /// Returns the value of the sound timer.
    pub fn st(&self) -> u8 {
        self.reg_st
    }

    /// Sets the value of the sound timer.
    pub fn set_st(&mut self, val: u8) {
        self.reg_st = val;
    }

    /// Returns the value in the given register.
    pub fn register(&self, reg: Register) -> u8 {
        self.regs[reg as usize].0
    }

    /// Sets the given register to the given value.
    pub fn set_register(&mut self, reg: Register, val: u8) {
        self.regs[reg as usize].0 = val
    }

    /// Returns the value of the program counter.
    pub fn pc(&self) -> AlignedAddress {
        self.pc
    }

    /// Returns the instruction at the program counter.
    pub fn current_instruction(&self) -> Result<Instruction, Error> {
        Instruction::from_opcode(self.current_opcode())
    }

    /// Returns the opcode at the program counter.
    pub fn current_opcode(&self) -> Opcode {
        let high = self.mem[self.pc.addr()];
        let low = self.mem[self.pc.addr() + 1];
        Opcode::from_bytes(high, low)
    }

    /// Formats the register file and program counter, in hexadecimal and
    /// decimal, for diagnostic output.
    pub fn dump_registers(&self) -> String {
        let mut out = String::new();
        for (i, reg) in self.regs.iter().enumerate() {
            write!(out, "V{:X}=#{:02X}({}) ", i, reg.0, reg.0).unwrap();
        }
        write!(out, "PC=#{:03X}({})", self.pc.addr(), self.pc.addr()).unwrap();
        out
    }

    /// Performs a single execution step.
    pub fn step(&mut self) -> Result<(), Error> {
        self.update_timers();
        let instr = self.current_instruction()?;
        trace!("executing {}", instr);
        self.execute(instr)?;
        trace!("{}", self.dump_registers());
        Ok(())
    }

    /// Executes the given instruction in the current interpreter context.
    ///
    /// The interpreter will behave as if the given instruction were executed
    /// at the current program location in memory.
    pub fn execute(&mut self, ins: Instruction) -> Result<(), Error> {
        use self::Instruction::*;

        match ins {
            Cls => self.display.clear(),
            Ret => {
                self.pc = self.call_stack
                    .pop()
                    .ok_or(NotInSubroutineError)
                    .with_context(|_| format!("error executing {}", ins))?;
            }
            Jp(addr) => {
                self.pc = addr;
                return Ok(());
            }
            Call(addr) => {
                self.call_stack.push(self.pc);
                self.pc = addr;
                return Ok(());
            }
            SeByte(reg, b) => if self.register(reg) == b {
                self.pc = (self.pc + 4).context("program counter overflowed")?;
                return Ok(());
            },
            SneByte(reg, b) => if self.register(reg) != b {
                self.pc = (self.pc + 4).context("program counter overflowed")?;
                return Ok(());
            },
            SeReg(reg1, reg2) => if self.register(reg1) == self.register(reg2) {
                self.pc = (self.pc + 4).context("program counter overflowed")?;
                return Ok(());
            },
            LdByte(reg, b) => self.set_register(reg, b),
            // `ADD Vx, byte` does not report a carry; only `ADD Vx, Vy`
            // touches `VF`.
            AddByte(reg, b) => {
                self.regs[reg as usize] += Wrapping(b);
            }
            LdReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.set_register(reg1, r2);
            }
            Or(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 | r2);
                // The logical operations clobber `VF` to 0, as on the
                // original COSMAC VIP interpreter.
                self.set_register(Register::VF, 0);
            }
            And(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 & r2);
                self.set_register(Register::VF, 0);
            }
            Xor(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 ^ r2);
                self.set_register(Register::VF, 0);
            }
            AddReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.add(reg1, r2);
            }
            Sub(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.sub(reg1, r2);
            }
            Shr(reg) => self.shr(reg),
            Subn(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.subn(reg1, r2);
            }
            Shl(reg) => self.shl(reg),
            SneReg(reg1, reg2) => if self.register(reg1) != self.register(reg2) {
                self.pc = (self.pc + 4)?;
                return Ok(());
            },
            LdI(addr) => self.reg_i = addr,
            JpV0(addr) => {
                self.pc = (addr + self.register(Register::V0) as usize)
                    .context("attempted to jump to out of bounds address")?
                    .aligned()
                    .context("attempted to jump to misaligned address")?;
                return Ok(());
            }
            Rnd(reg, b) => self.set_register(reg, rand::random::<u8>() & b),
            Drw(reg1, reg2, n) => self.drw(reg1, reg2, n)
                .with_context(|_| format!("error executing {}", ins))?,
            Skp(reg) => if self.input.is_pressed(Key::from_byte(self.register(reg))) {
                self.pc = (self.pc + 4).context("program counter overflowed")?;
                return Ok(());
            },
            Sknp(reg) => if !self.input.is_pressed(Key::from_byte(self.register(reg))) {
                self.pc = (self.pc + 4).context("program counter overflowed")?;
                return Ok(());
            },
            LdRegDt(reg) => {
                let dt = self.dt();
                self.set_register(reg, dt);
            }
            // This is a wait state, not a hang: leaving the program counter
            // unchanged re-executes the instruction until a key arrives.
            LdKey(reg) => match self.input.get_pressed() {
                Some(key) => self.set_register(reg, key as u8),
                None => return Ok(()),
            },
            LdDtReg(reg) => {
                let r = self.register(reg);
                self.set_dt(r);
            }
            LdSt(reg) => {
                let r = self.register(reg);
                self.set_st(r);
            }
            AddI(reg) => {
                let new_i =
                    (self.i() + self.register(reg) as usize).context("register 'I' overflowed")?;
                self.set_i(new_i);
            }
            LdF(reg) => {
                let r = self.register(reg) as usize;
                self.set_i(
                    Address::from_usize(HEX_START + HEX_SPRITE_HEIGHT * (r % HEX_SPRITES.len()))
                        .unwrap(),
                )
            }
            LdB(reg) => self.ld_b(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            LdDerefIReg(reg) => self.ld_deref_i_reg(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            LdRegDerefI(reg) => self.ld_reg_deref_i(reg)
                .with_context(|_| format!("error executing {}", ins))?,
        }

        self.pc = (self.pc + 2).context("program counter overflowed")?;
        Ok(())
    }

    /// Adds the given byte to the given register, setting `VF` to 1 on carry
    /// or 0 otherwise.
    fn add(&mut self, reg: Register, val: u8) {
        let carry = val > u8::MAX - self.register(reg);
        self.regs[reg as usize] += Wrapping(val);
        self.set_register(Register::VF, carry as u8);
    }

    /// Implements the `DRW` operation.
    ///
    /// The collision flag from the draw is stored into `VF`.
    fn drw(&mut self, reg1: Register, reg2: Register, n: u8) -> Result<(), Error> {
        let start = self.reg_i.addr();
        let end = start + n as usize;

        if end > MEM_SIZE {
            Err(AddressOutOfBoundsError(end - 1))?
        } else {
            let x = self.register(reg1) as usize;
            let y = self.register(reg2) as usize;

            let collision = self.display.draw_sprite(&self.mem[start..end], x, y);
            self.set_register(Register::VF, collision as u8);
            Ok(())
        }
    }

    /// Implements the `LD B, Vx` operation.
    fn ld_b(&mut self, reg: Register) -> Result<(), Error> {
        let val = self.register(reg);
        let hundreds = val / 100;
        let tens = val % 100 / 10;
        let ones = val % 10;
        let addr = self.i().addr();

        if addr + 2 >= MEM_SIZE {
            Err(AddressOutOfBoundsError(addr + 2))?
        } else {
            self.mem[addr] = hundreds;
            self.mem[addr + 1] = tens;
            self.mem[addr + 2] = ones;
            Ok(())
        }
    }

    /// Implements the `LD [I], Vx` operation, storing `V0` through `Vx`
    /// (inclusive) starting at `I`.
    fn ld_deref_i_reg(&mut self, reg: Register) -> Result<(), Error> {
        let count = reg as usize + 1;
        let start = self.i().addr();

        if start + count > MEM_SIZE {
            Err(AddressOutOfBoundsError(start + count - 1))?
        } else {
            for (dest, src) in self.mem[start..start + count]
                .iter_mut()
                .zip(self.regs[..count].iter())
            {
                *dest = src.0;
            }
            Ok(())
        }
    }

    /// Implements the `LD Vx, [I]` operation, filling `V0` through `Vx`
    /// (inclusive) from memory starting at `I`.
    fn ld_reg_deref_i(&mut self, reg: Register) -> Result<(), Error> {
        let count = reg as usize + 1;
        let start = self.i().addr();

        if start + count > MEM_SIZE {
            Err(AddressOutOfBoundsError(start + count - 1))?
        } else {
            for (dest, src) in self.regs[..count]
                .iter_mut()
                .zip(self.mem[start..start + count].iter())
            {
                *dest = Wrapping(*src);
            }
            Ok(())
        }
    }

    /// Shifts the given register left by one, setting `VF` to the old
    /// highest bit.
    fn shl(&mut self, reg: Register) {
        let r = self.register(reg);
        let old = (r & 1 << 7) >> 7;
        self.set_register(reg, r << 1);
        self.set_register(Register::VF, old);
    }

    /// Shifts the given register right by one, setting `VF` to the old
    /// lowest bit.
    fn shr(&mut self, reg: Register) {
        let r = self.register(reg);
        let old = r & 1;
        self.set_register(reg, r >> 1);
        self.set_register(Register::VF, old);
    }

    /// Subtracts the given byte from the given register, setting `VF` to 0 on
    /// borrow or 1 otherwise.
    fn sub(&mut self, reg: Register, val: u8) {
        let borrow = val > self.register(reg);
        self.regs[reg as usize] -= Wrapping(val);
        self.set_register(Register::VF, !borrow as u8);
    }

    /// Sets `reg` to `val - reg`, setting `VF` to 0 on borrow or 1 otherwise.
    fn subn(&mut self, reg: Register, val: u8) {
        let borrow = self.register(reg) > val;
        self.regs[reg as usize] = Wrapping(val) - self.regs[reg as usize];
        self.set_register(Register::VF, !borrow as u8);
    }

    /// Updates the internal timer as well as the `DT` and `ST` registers.
    fn update_timers(&mut self) {
        let ticks = self.timer.lap() as u8;
        let dt = self.dt();
        let st = self.st();
        self.set_dt(if dt > ticks { dt - ticks } else { 0 });
        self.set_st(if st > ticks { st - ticks } else { 0 });
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::u8;

    use num::FromPrimitive;

    use PROG_SIZE;
    use PROG_START;
    use input::Key;
    use instruction::{Address, Instruction, Opcode, Register};
    use interpreter::{Interpreter, Options};

    /// Tests the `ADD Vx, Vy` operation.
    #[test]
    fn instruction_add() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V0, V1, 24u8, 67u8),
            (V5, VD, 54u8, 102u8),
            (V7, VE, 255u8, 255u8),
            (V2, V4, 1u8, 255u8),
            (V5, V6, 0u8, 78u8),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, vy, b1, b2) in cases.into_iter() {
            let case = (vx, vy, b1, b2);
            let sum = b1.wrapping_add(b2);
            let carry = b1 as u32 + b2 as u32 > u8::MAX as u32;

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::AddReg(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), sum, "case {:?}", case);
            assert_eq!(interpreter.register(VF), carry as u8, "case {:?}", case);
        }
    }

    /// Tests that `ADD Vx, byte` wraps and leaves `VF` alone.
    #[test]
    fn instruction_add_byte() {
        use Register::*;

        // Test cases, in the format (Vx, b1, b2).
        let cases = [
            (V0, 24u8, 67u8),
            (V5, 200u8, 100u8),
            (V7, 255u8, 255u8),
            (V2, 255u8, 1u8),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, b1, b2) in cases.into_iter() {
            let case = (vx, b1, b2);

            interpreter.set_register(vx, b1);
            interpreter.set_register(VF, 0xAA);
            interpreter.execute(Instruction::AddByte(vx, b2)).unwrap();
            assert_eq!(interpreter.register(vx), b1.wrapping_add(b2), "case {:?}", case);
            assert_eq!(interpreter.register(VF), 0xAA, "case {:?}", case);
        }
    }

    /// Tests the `AND`, `OR` and `XOR` operations.
    #[test]
    fn instruction_bitwise() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V7, V2, 0x75, 0xF2),
            (V3, V8, 0x01, 0xFF),
            (VA, VE, 0x6A, 0x32),
            (V9, VC, 0x78, 0xFD),
            (V0, V1, 0xF0, 0x0F),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, vy, b1, b2) in cases.into_iter() {
            let case = (vx, vy, b1, b2);
            let or = b1 | b2;
            let and = b1 & b2;
            let xor = b1 ^ b2;

            // Test `OR`.
            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.set_register(VF, 1);
            interpreter.execute(Instruction::Or(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), or, "case {:?}", case);
            assert_eq!(interpreter.register(VF), 0, "case {:?}", case);

            // Test `AND`.
            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.set_register(VF, 1);
            interpreter.execute(Instruction::And(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), and, "case {:?}", case);
            assert_eq!(interpreter.register(VF), 0, "case {:?}", case);

            // Test `XOR`.
            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.set_register(VF, 1);
            interpreter.execute(Instruction::Xor(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), xor, "case {:?}", case);
            assert_eq!(interpreter.register(VF), 0, "case {:?}", case);
        }
    }

    /// Tests the `SUB` and `SUBN` operations.
    #[test]
    fn instruction_sub() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V9, V8, 70u8, 35u8),
            (V6, V2, 56u8, 2u8),
            (V0, V1, 0u8, 0u8),
            (VE, VA, 255u8, 255u8),
            (V3, V7, 1u8, 255u8),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, vy, b1, b2) in cases.into_iter() {
            let case = (vx, vy, b1, b2);
            let sub = b1.wrapping_sub(b2);
            let subn = b2.wrapping_sub(b1);
            let borrow = b2 > b1;
            let borrown = b1 > b2;

            // Test `SUB Vx, Vy`.
            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Sub(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), sub, "case {:?}", case);
            assert_eq!(interpreter.register(VF), !borrow as u8, "case {:?}", case);

            // Test `SUBN Vx, Vy`.
            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Subn(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), subn, "case {:?}", case);
            assert_eq!(interpreter.register(VF), !borrown as u8, "case {:?}", case);
        }
    }

    /// Tests the `SHR` and `SHL` operations.
    #[test]
    fn instruction_shift() {
        use Register::*;

        // Test cases, in the format (Vx, b).
        let cases = [
            (V0, 0b0000_0001u8),
            (V3, 0b1000_0000u8),
            (V7, 0b1010_1011u8),
            (VC, 0u8),
            (VE, 0xFFu8),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, b) in cases.into_iter() {
            let case = (vx, b);

            // `SHR` reports the bit lost from the bottom.
            interpreter.set_register(vx, b);
            interpreter.execute(Instruction::Shr(vx)).unwrap();
            assert_eq!(interpreter.register(vx), b >> 1, "case {:?}", case);
            assert_eq!(interpreter.register(VF), b & 1, "case {:?}", case);

            // `SHL` reports the bit lost from the top, normalized to 0/1.
            interpreter.set_register(vx, b);
            interpreter.execute(Instruction::Shl(vx)).unwrap();
            assert_eq!(interpreter.register(vx), b << 1, "case {:?}", case);
            assert_eq!(interpreter.register(VF), b >> 7, "case {:?}", case);
        }
    }

    /// Tests the PC effect of the skip operations.
    #[test]
    fn instruction_skips() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());

        // `SE Vx, byte` skips the next instruction only on equality.
        interpreter.set_register(V4, 0x0A);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::SeByte(V4, 0x0A)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 4);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::SeByte(V4, 0x05)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 2);

        // `SNE Vx, byte` is the other way around.
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::SneByte(V4, 0x05)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 4);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::SneByte(V4, 0x0A)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 2);

        // `SE Vx, Vy` and `SNE Vx, Vy` compare registers.
        interpreter.set_register(V5, 0x0A);
        interpreter.set_register(V6, 0x0B);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::SeReg(V4, V5)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 4);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::SneReg(V4, V6)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 4);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::SneReg(V4, V5)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 2);
    }

    /// Tests the key-dependent skips.
    #[test]
    fn instruction_key_skips() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.set_register(V2, 0x7);
        interpreter.input_mut().press(Key::K7);

        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::Skp(V2)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 4);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::Sknp(V2)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 2);

        interpreter.input_mut().release(Key::K7);
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::Sknp(V2)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 4);
    }

    /// Tests `JP`, `CALL` and `RET`.
    #[test]
    fn instruction_jump_call() {
        let mut interpreter = Interpreter::with_options(Options::testing());
        let target = Address::from_u16(0x400).unwrap().aligned().unwrap();
        let sub = Address::from_u16(0x600).unwrap().aligned().unwrap();

        interpreter.execute(Instruction::Jp(target)).unwrap();
        assert_eq!(interpreter.pc().addr(), 0x400);

        interpreter.execute(Instruction::Call(sub)).unwrap();
        assert_eq!(interpreter.pc().addr(), 0x600);

        // `RET` resumes just past the call site.
        interpreter.execute(Instruction::Ret).unwrap();
        assert_eq!(interpreter.pc().addr(), 0x402);

        // A `RET` with no matching `CALL` is an error.
        assert!(interpreter.execute(Instruction::Ret).is_err());
    }

    /// Tests the `LD B, Vx` operation.
    #[test]
    fn instruction_ld_b() {
        use Register::*;

        // Test cases, in the format (Vx, n1, n2, n3), where the three digits
        // to be stored are n1, n2 and n3 (in that order).
        let cases = [
            (V5, 1, 2, 3),
            (VD, 0, 0, 1),
            (VE, 1, 0, 0),
            (V2, 2, 5, 5),
            (V6, 0, 0, 0),
            (V8, 0, 6, 4),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.set_i(Address::from_u16(0x300).unwrap());

        for &(vx, n1, n2, n3) in cases.into_iter() {
            let case = (vx, n1, n2, n3);
            let n = 100 * n1 + 10 * n2 + n3;

            interpreter.set_register(vx, n);
            interpreter.execute(Instruction::LdB(vx)).unwrap();
            let i = interpreter.i().addr();
            assert_eq!(interpreter.mem()[i], n1, "case {:?}", case);
            assert_eq!(interpreter.mem()[i + 1], n2, "case {:?}", case);
            assert_eq!(interpreter.mem()[i + 2], n3, "case {:?}", case);
        }
    }

    /// Tests the `LD [I], Vx` and `LD Vx, [I]` operations.
    #[test]
    fn instruction_store_load() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.set_i(Address::from_u16(0x300).unwrap());
        for (i, &b) in [12u8, 34, 56, 78].iter().enumerate() {
            interpreter.set_register(Register::from_usize(i).unwrap(), b);
        }

        // Registers `V0` through `Vx` inclusive are stored.
        interpreter
            .execute(Instruction::LdDerefIReg(V3))
            .unwrap();
        assert_eq!(&interpreter.mem()[0x300..0x304], &[12, 34, 56, 78]);
        assert_eq!(interpreter.mem()[0x304], 0);

        interpreter.mem_mut()[0x300..0x304].copy_from_slice(&[1, 2, 3, 4]);
        interpreter
            .execute(Instruction::LdRegDerefI(V3))
            .unwrap();
        for (i, &b) in [1u8, 2, 3, 4].iter().enumerate() {
            assert_eq!(interpreter.register(Register::from_usize(i).unwrap()), b);
        }

        // An out-of-bounds store is an address error.
        interpreter.set_i(Address::from_usize(0xFFE).unwrap());
        assert!(interpreter.execute(Instruction::LdDerefIReg(V3)).is_err());
    }

    /// Tests the `DRW` operation: XOR compositing, the collision flag in
    /// `VF` and the program counter advance.
    #[test]
    fn instruction_drw() {
        use Register::*;

        let sprite = [0xC3u8, 0x42, 0x7E, 0x5A, 0x7E];
        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.set_i(Address::from_u16(0x500).unwrap());
        interpreter.mem_mut()[0x500..0x505].copy_from_slice(&sprite);
        interpreter.set_register(V0, 8);
        interpreter.set_register(V1, 4);

        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::Drw(V0, V1, 5)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 2);
        assert_eq!(interpreter.register(VF), 0);
        assert!(interpreter.display().data()[8][4]);

        // Redrawing undraws the sprite and reports the collision.
        let pc = interpreter.pc().addr();
        interpreter.execute(Instruction::Drw(V0, V1, 5)).unwrap();
        assert_eq!(interpreter.pc().addr(), pc + 2);
        assert_eq!(interpreter.register(VF), 1);
        assert!(
            interpreter
                .display()
                .data()
                .iter()
                .all(|col| col.iter().all(|&px| !px))
        );

        // A sprite extending past the end of memory is an address error.
        interpreter.set_i(Address::from_usize(0xFFE).unwrap());
        assert!(interpreter.execute(Instruction::Drw(V0, V1, 5)).is_err());
    }

    /// Tests that an over-long program is rejected without touching memory.
    #[test]
    fn load_program_too_large() {
        let prog = vec![0xAA; PROG_SIZE + 1];
        let mut interpreter = Interpreter::with_options(Options::testing());

        assert!(
            interpreter
                .load_program(&mut Cursor::new(&prog[..]))
                .is_err()
        );
        assert!(interpreter.mem()[PROG_START..].iter().all(|&b| b == 0));
    }

    /// Tests a counting loop end to end: `V0` is incremented from 0 to 10,
    /// with a skip-on-equal breaking out of the jump loop.
    #[test]
    fn counting_loop() {
        use Register::*;

        let prog = [
            0x60u8, 0x00, // LD V0, 0
            0x70, 0x01, // ADD V0, 1
            0x30, 0x0A, // SE V0, #0A
            0x12, 0x02, // JP #202
            0x60, 0x00, // LD V0, 0
            0x12, 0x02, // JP #202
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter
            .load_program(&mut Cursor::new(&prog[..]))
            .unwrap();

        let mut adds = 0;
        let mut steps = 0;
        while interpreter.register(V0) != 0x0A {
            if interpreter.current_opcode() == Opcode(0x7001) {
                adds += 1;
            }
            interpreter.step().unwrap();
            steps += 1;
            assert!(steps < 100, "loop failed to terminate");
        }

        // Exactly ten additions ran, and the pending skip jumps over the
        // loop-back instruction at #206.
        assert_eq!(adds, 10);
        assert_eq!(interpreter.pc().addr(), 0x204);
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x208);
    }

    /// Tests that executing an unrecognized opcode is an error that leaves
    /// the program counter alone.
    #[test]
    fn unknown_opcode() {
        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.mem_mut()[PROG_START] = 0xE0;
        interpreter.mem_mut()[PROG_START + 1] = 0x00;

        let pc = interpreter.pc().addr();
        assert!(interpreter.step().is_err());
        assert_eq!(interpreter.pc().addr(), pc);
    }
}
