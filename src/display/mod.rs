/*
 *  display/mod.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Renderer abstraction for the event display
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

pub mod error;
pub mod mock;
pub mod oled;

pub use error::DisplayError;
pub use mock::MockRenderer;
pub use oled::OledRenderer;

/// Direction glyph shown briefly while navigating between events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowDirection {
    Left,
    Right,
}

/// Minimal drawing surface for the scheduler.
///
/// All methods are synchronous and are only ever invoked from the display
/// scheduler task, so implementations need no internal locking. A render
/// failure is recoverable: the scheduler logs it and moves on to the next
/// queued action.
pub trait Renderer: Send {
    /// Flash a left/right arrow as a navigation transition.
    fn draw_arrow(&mut self, direction: ArrowDirection) -> Result<(), DisplayError>;

    /// Draw the three event lines and return the horizontal scroll span in
    /// pixels (0 when the text fits the panel and no scrolling is needed).
    fn render_scrollable(
        &mut self,
        line1: &str,
        line2: &str,
        line3: &str,
    ) -> Result<u32, DisplayError>;

    /// Advance the scroll window of the last `render_scrollable` content.
    fn set_scroll_position(&mut self, offset: u32) -> Result<(), DisplayError>;

    /// Power the panel down.
    fn hide(&mut self) -> Result<(), DisplayError>;

    /// Show a small static message (idle status, fallback text).
    /// Newlines split the text across rows.
    fn show_static(&mut self, text: &str) -> Result<(), DisplayError>;
}
