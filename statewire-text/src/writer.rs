use std::io::{self, Write};

/// Writes one semantic unit per line, indenting by block depth.
///
/// Indentation exists purely for human readers; the reader recovers structure
/// from brace depth, never from leading whitespace.
pub struct LineWriter<'a> {
    out: &'a mut dyn Write,
    depth: usize,
}

impl<'a> LineWriter<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out, depth: 0 }
    }

    /// Current block depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Writes one line at the current depth.
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        for _ in 0..self.depth {
            self.out.write_all(b"  ")?;
        }
        self.out.write_all(text.as_bytes())?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Writes a block-opening line (the caller supplies the trailing `{`)
    /// and pushes one level of depth.
    pub fn open(&mut self, header: &str) -> io::Result<()> {
        debug_assert!(header.ends_with('{'), "block header must end in `{{`");
        self.line(header)?;
        self.depth += 1;
        Ok(())
    }

    /// Pops one level of depth and writes the closing `}`.
    pub fn close(&mut self) -> io::Result<()> {
        debug_assert!(self.depth > 0, "close without matching open");
        self.depth = self.depth.saturating_sub(1);
        self.line("}")
    }
}
