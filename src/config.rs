/// Options shared by every decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Verify embedded CRC32 checksums. A mismatch is only ever a warning.
    pub verify_checksums: bool,
    /// Require RIFF children to tile their parent exactly. When disabled, a
    /// root chunk with a zero or oversized length extends to the end of the
    /// buffer instead of failing.
    pub strict_riff_sizes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            strict_riff_sizes: true,
        }
    }
}
