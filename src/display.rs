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

//! The Chip-8 display buffer.

use std::default::Default;

use failure::Fail;

/// The width of the display.
pub const WIDTH: usize = 64;
/// The height of the display.
pub const HEIGHT: usize = 32;

/// The height of a hex digit sprite.
pub const HEX_SPRITE_HEIGHT: usize = 5;

/// The hex digit sprites.
pub const HEX_SPRITES: [[u8; HEX_SPRITE_HEIGHT]; 16] = [
    [0xF0, 0x90, 0x90, 0x90, 0xF0],
    [0x20, 0x60, 0x20, 0x20, 0x70],
    [0xF0, 0x10, 0xF0, 0x80, 0xF0],
    [0xF0, 0x10, 0xF0, 0x10, 0xF0],
    [0x90, 0x90, 0xF0, 0x10, 0x10],
    [0xF0, 0x80, 0xF0, 0x10, 0xF0],
    [0xF0, 0x80, 0xF0, 0x90, 0xF0],
    [0xF0, 0x10, 0x20, 0x40, 0x40],
    [0xF0, 0x90, 0xF0, 0x90, 0xF0],
    [0xF0, 0x90, 0xF0, 0x10, 0xF0],
    [0xF0, 0x90, 0xF0, 0x90, 0x90],
    [0xE0, 0x90, 0xE0, 0x90, 0xE0],
    [0xF0, 0x80, 0x80, 0x80, 0xF0],
    [0xE0, 0x90, 0x90, 0x90, 0xE0],
    [0xF0, 0x80, 0xF0, 0x80, 0xF0],
    [0xF0, 0x80, 0xF0, 0x80, 0x80],
];

/// A Chip-8 display buffer.
pub struct Buffer {
    /// The underlying display buffer data.
    data: [[bool; HEIGHT]; WIDTH],
    /// Whether the display needs to be refreshed.
    needs_refresh: bool,
}

impl Buffer {
    /// Returns a new display buffer with all pixels clear.
    pub fn new() -> Self {
        Buffer {
            data: [[false; HEIGHT]; WIDTH],
            needs_refresh: true,
        }
    }

    /// Clears the display.
    pub fn clear(&mut self) {
        for col in self.data.iter_mut() {
            for elem in col.iter_mut() {
                *elem = false;
            }
        }
        self.needs_refresh = true;
    }

    /// Returns a reference to the underlying pixel data.
    pub fn data(&self) -> &[[bool; HEIGHT]; WIDTH] {
        &self.data
    }

    /// Draws the given sprite at the given position.
    ///
    /// Each byte of the sprite is one row of 8 pixels, most significant bit
    /// leftmost; rows are drawn top to bottom.  Set sprite bits are XORed
    /// into the buffer, so drawing the same sprite twice at the same
    /// position restores the previous contents.  Pixels outside the display
    /// are clipped.
    ///
    /// Returns whether there was a collision, i.e. whether any pixel that
    /// was previously set was flipped off.
    pub fn draw_sprite(&mut self, sprite: &[u8], x: usize, y: usize) -> bool {
        let mut collision = false;

        for (j, row) in sprite.iter().enumerate() {
            for i in 0..8 {
                if row & (1 << (7 - i)) != 0 {
                    if self.toggle(x + i, y + j) {
                        collision = true;
                    }
                }
            }
        }

        collision
    }

    /// Forces a refresh on the next call to `refresh`, even if no draw
    /// operation has been performed.
    pub fn force_refresh(&mut self) {
        self.needs_refresh = true;
    }

    /// Refreshes the display using the given refresh function.
    ///
    /// If a refresh is unnecessary, nothing will be done.  The refresh
    /// function receives a "snapshot" of the display, and should draw that to
    /// whatever user-facing display buffer is currently being used.
    pub fn refresh<F, E>(&mut self, f: F) -> Result<(), E>
    where
        F: FnOnce(&Self) -> Result<(), E>,
        E: Fail,
    {
        if self.needs_refresh {
            f(self)?;
            self.needs_refresh = false;
        }
        Ok(())
    }

    /// Flips the on/off state of the given pixel, returning whether it was
    /// flipped off from the on state.
    fn toggle(&mut self, x: usize, y: usize) -> bool {
        if x < WIDTH && y < HEIGHT {
            let old = self.data[x][y];
            self.data[x][y] = !self.data[x][y];
            self.needs_refresh = true;

            old
        } else {
            false
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}
