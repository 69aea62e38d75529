/*
 *  display/mock.rs
 *
 *  Vigil - worth the glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock renderer for testing without hardware
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

use std::sync::{Arc, Mutex};

use super::error::DisplayError;
use super::{ArrowDirection, Renderer};

/// One recorded renderer call
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    Arrow(ArrowDirection),
    Scrollable(String, String, String),
    ScrollTo(u32),
    Hide,
    Static(String),
}

/// Internal state for the mock renderer (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockRendererState {
    /// Every call, in invocation order
    pub ops: Vec<RenderOp>,

    /// Number of times hide() was called
    pub hide_count: usize,

    /// Scroll span returned by render_scrollable
    pub scroll_span: u32,

    /// Fail the next render_scrollable call (for error-path testing)
    pub fail_next_render: bool,
}

/// Records every renderer call so tests can assert ordering, counts,
/// and preemption without hardware.
#[derive(Debug, Clone, Default)]
pub struct MockRenderer {
    state: Arc<Mutex<MockRendererState>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose scrollable content always reports the given span.
    pub fn with_span(span: u32) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().scroll_span = span;
        mock
    }

    /// Get a handle to the shared state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockRendererState>> {
        Arc::clone(&self.state)
    }

    pub fn ops(&self) -> Vec<RenderOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn hide_count(&self) -> usize {
        self.state.lock().unwrap().hide_count
    }
}

impl Renderer for MockRenderer {
    fn draw_arrow(&mut self, direction: ArrowDirection) -> Result<(), DisplayError> {
        self.state.lock().unwrap().ops.push(RenderOp::Arrow(direction));
        Ok(())
    }

    fn render_scrollable(
        &mut self,
        line1: &str,
        line2: &str,
        line3: &str,
    ) -> Result<u32, DisplayError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_render {
            state.fail_next_render = false;
            return Err(DisplayError::Drawing("simulated render failure".to_string()));
        }
        state.ops.push(RenderOp::Scrollable(
            line1.to_string(),
            line2.to_string(),
            line3.to_string(),
        ));
        Ok(state.scroll_span)
    }

    fn set_scroll_position(&mut self, offset: u32) -> Result<(), DisplayError> {
        self.state.lock().unwrap().ops.push(RenderOp::ScrollTo(offset));
        Ok(())
    }

    fn hide(&mut self) -> Result<(), DisplayError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(RenderOp::Hide);
        state.hide_count += 1;
        Ok(())
    }

    fn show_static(&mut self, text: &str) -> Result<(), DisplayError> {
        self.state.lock().unwrap().ops.push(RenderOp::Static(text.to_string()));
        Ok(())
    }
}
