/*
 *  display/oled.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  SSD1306 renderer over the Linux I2C bus
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::iso_8859_13::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Triangle};
use embedded_graphics::text::Text;
use linux_embedded_hal::I2cdev;
use log::debug;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

use super::error::DisplayError;
use super::{ArrowDirection, Renderer};

const PANEL_WIDTH: u32 = 128;
const PANEL_HEIGHT: u32 = 64;

// FONT_6X10 glyph cell width; good enough for scroll sizing
const CHAR_WIDTH: u32 = 6;

// Baselines for the three event lines
const LINE_BASELINES: [i32; 3] = [18, 38, 58];

type Panel = Ssd1306<
    I2CInterface<I2cdev>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// Hardware renderer for the 128x64 SSD1306 event display.
///
/// Scrollable content is kept as the three source lines; each
/// `set_scroll_position` redraws them shifted left, which avoids holding a
/// full virtual-width framebuffer for long summaries.
pub struct OledRenderer {
    panel: Panel,
    lines: [String; 3],
    powered: bool,
}

impl OledRenderer {
    pub fn new(bus: &str, address: u8) -> Result<Self, DisplayError> {
        let i2c = I2cdev::new(bus).map_err(|e| DisplayError::I2c(e.to_string()))?;
        let interface = I2CDisplayInterface::new_custom_address(i2c, address);
        let mut panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        panel
            .init()
            .map_err(|e| DisplayError::InitializationFailed(format!("{:?}", e)))?;
        debug!("SSD1306 initialized on {} @ 0x{:02x}", bus, address);

        Ok(Self {
            panel,
            lines: Default::default(),
            powered: true,
        })
    }

    fn power_on(&mut self) -> Result<(), DisplayError> {
        if !self.powered {
            self.panel.set_display_on(true)?;
            self.powered = true;
        }
        Ok(())
    }

    fn text_width(text: &str) -> u32 {
        text.chars().count() as u32 * CHAR_WIDTH
    }

    fn draw_lines_at(&mut self, offset: u32) -> Result<(), DisplayError> {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        self.panel.clear(BinaryColor::Off)?;
        for (line, baseline) in self.lines.iter().zip(LINE_BASELINES) {
            if line.is_empty() {
                continue;
            }
            Text::new(line, Point::new(-(offset as i32), baseline), style)
                .draw(&mut self.panel)?;
        }
        self.panel.flush()?;
        Ok(())
    }
}

impl Renderer for OledRenderer {
    fn draw_arrow(&mut self, direction: ArrowDirection) -> Result<(), DisplayError> {
        self.power_on()?;
        self.panel.clear(BinaryColor::Off)?;

        let (w, h) = (PANEL_WIDTH as i32, PANEL_HEIGHT as i32);
        let mid = h / 2;
        let glyph = match direction {
            ArrowDirection::Left => Triangle::new(
                Point::new(w / 2 - 16, mid),
                Point::new(w / 2 + 16, mid - 16),
                Point::new(w / 2 + 16, mid + 16),
            ),
            ArrowDirection::Right => Triangle::new(
                Point::new(w / 2 + 16, mid),
                Point::new(w / 2 - 16, mid - 16),
                Point::new(w / 2 - 16, mid + 16),
            ),
        };
        glyph
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut self.panel)?;
        self.panel.flush()?;
        Ok(())
    }

    fn render_scrollable(
        &mut self,
        line1: &str,
        line2: &str,
        line3: &str,
    ) -> Result<u32, DisplayError> {
        self.lines = [line1.to_string(), line2.to_string(), line3.to_string()];
        self.power_on()?;
        self.draw_lines_at(0)?;

        let widest = self.lines.iter().map(|l| Self::text_width(l)).max().unwrap_or(0);
        Ok(widest.saturating_sub(PANEL_WIDTH))
    }

    fn set_scroll_position(&mut self, offset: u32) -> Result<(), DisplayError> {
        self.draw_lines_at(offset)
    }

    fn hide(&mut self) -> Result<(), DisplayError> {
        self.panel.set_display_on(false)?;
        self.powered = false;
        Ok(())
    }

    fn show_static(&mut self, text: &str) -> Result<(), DisplayError> {
        self.power_on()?;
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        self.panel.clear(BinaryColor::Off)?;
        for (i, row) in text.lines().enumerate() {
            Text::new(row, Point::new(0, 12 * (i as i32 + 1)), style)
                .draw(&mut self.panel)?;
        }
        self.panel.flush()?;
        Ok(())
    }
}
