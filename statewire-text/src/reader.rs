use std::io::BufRead;

use crate::WireError;
use crate::token;

/// Reads a statewire document line by line, tracking brace depth.
///
/// Blank lines and `#` comments are skipped. Depth is maintained by
/// classifying returned lines: a line ending in an unquoted `{` opens a
/// block, a line that is exactly `}` closes one. End of input while any
/// block is open is a [`WireError::TruncatedInput`].
///
/// One line of lookahead is supported via [`peek_line`]/[`push_back`];
/// decoders need it because an empty block may omit its data lines entirely.
///
/// [`peek_line`]: LineReader::peek_line
/// [`push_back`]: LineReader::push_back
pub struct LineReader<'a> {
    input: &'a mut dyn BufRead,
    pushed: Option<String>,
    depth: usize,
    line_no: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(input: &'a mut dyn BufRead) -> Self {
        Self {
            input,
            pushed: None,
            depth: 0,
            line_no: 0,
        }
    }

    /// Current block depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// One-based number of the last line read, for diagnostics.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    fn read_raw(&mut self) -> Result<Option<String>, WireError> {
        loop {
            let mut buf = String::new();
            if self.input.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = buf.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    /// Returns the next significant line, updating depth bookkeeping.
    ///
    /// `Ok(None)` means a clean end of input at depth zero.
    pub fn next_line(&mut self) -> Result<Option<String>, WireError> {
        let line = match self.pushed.take() {
            Some(line) => Some(line),
            None => self.read_raw()?,
        };
        let Some(line) = line else {
            if self.depth > 0 {
                return Err(WireError::TruncatedInput { line: self.line_no });
            }
            return Ok(None);
        };

        if line == "}" {
            if self.depth == 0 {
                return Err(WireError::UnbalancedClose { line: self.line_no });
            }
            self.depth -= 1;
        } else if token::opens_block(&line) {
            self.depth += 1;
        }
        Ok(Some(line))
    }

    /// Returns a previously read line to the reader, reverting its depth
    /// bookkeeping. At most one line can be held back.
    pub fn push_back(&mut self, line: String) {
        debug_assert!(self.pushed.is_none(), "only one line of lookahead");
        if line == "}" {
            self.depth += 1;
        } else if token::opens_block(&line) {
            self.depth -= 1;
        }
        self.pushed = Some(line);
    }

    /// Peeks at the next significant line without consuming it.
    pub fn peek_line(&mut self) -> Result<Option<String>, WireError> {
        match self.next_line()? {
            Some(line) => {
                self.push_back(line.clone());
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    /// Consumes lines until depth drops back to `target`. Used to skip an
    /// unknown field's block without interpreting it.
    pub fn skip_to_depth(&mut self, target: usize) -> Result<(), WireError> {
        while self.depth > target {
            // next_line errors on truncation, so None cannot occur here.
            if self.next_line()?.is_none() {
                return Err(WireError::TruncatedInput { line: self.line_no });
            }
        }
        Ok(())
    }
}
