// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Renderers — turn a word-processor document into PDF.

pub mod office;
pub mod text;

pub use office::OfficeRenderer;
pub use text::TextRenderer;

use ignis_core::config::{RendererConfig, RendererKind};
use ignis_core::error::IgnisError;

/// Converts `.docx` bytes into PDF bytes.
pub trait DocumentRenderer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn render(&self, docx: &[u8]) -> Result<Vec<u8>, IgnisError>;
}

/// Build the renderer selected by the configuration.
pub fn renderer_from_config(config: &RendererConfig) -> Box<dyn DocumentRenderer> {
    match config.kind {
        RendererKind::Office => Box::new(OfficeRenderer::from_config(config)),
        RendererKind::Text => Box::new(TextRenderer::new()),
    }
}
