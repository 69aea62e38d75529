/*
 *  display/error.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for the display subsystem
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

use std::convert::Infallible;
use thiserror::Error;

/// Unified error type for all display operations
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Hardware initialization failed
    #[error("display initialization failed: {0}")]
    InitializationFailed(String),

    /// I2C bus open/communication error
    #[error("I2C communication error: {0}")]
    I2c(String),

    /// Display controller interface error
    // display_interface::DisplayError does not implement std::error::Error,
    // so it is carried by value rather than as a source
    #[error("display interface error: {0:?}")]
    Interface(display_interface::DisplayError),

    /// Drawing operation failed
    #[error("drawing error: {0}")]
    Drawing(String),
}

impl From<display_interface::DisplayError> for DisplayError {
    fn from(err: display_interface::DisplayError) -> Self {
        DisplayError::Interface(err)
    }
}

// Buffered framebuffer drawing cannot fail; this lets `?` erase that.
impl From<Infallible> for DisplayError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}
