use std::io::Read;

/// A sliding window over a fixed (but growable) buffer of bytes pulled from a
/// [Read] implementation.
///
/// `buf[start..end]` holds data that has been read from the underlying
/// source but not yet consumed. `prior_reads` counts the bytes that were
/// consumed before the window was last shifted to the front of the buffer,
/// so `position` is always the absolute offset of the next unconsumed byte.
#[derive(Debug)]
pub struct BufferWindow {
    pub buf: Box<[u8]>,

    // start of window into buffer
    start: usize,

    // end of window into buffer
    end: usize,

    // number of consumed bytes from prior reads
    prior_reads: u64,
}

impl BufferWindow {
    #[inline]
    pub fn advance(&mut self, amt: usize) {
        debug_assert!(amt <= self.window_len());
        self.start += amt;
    }

    #[inline]
    pub fn window(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    #[inline]
    pub fn window_len(&self) -> usize {
        self.end - self.start
    }

    /// Absolute offset of the next unconsumed byte
    #[inline]
    pub fn position(&self) -> u64 {
        self.prior_reads + self.start as u64
    }

    /// Consume and return the next `amt` bytes of the window
    #[inline]
    pub fn split(&mut self, amt: usize) -> &[u8] {
        debug_assert!(amt <= self.window_len());
        let start = self.start;
        self.start += amt;
        &self.buf[start..start + amt]
    }

    /// Drop all buffered data and declare that the underlying reader is now
    /// positioned at `position`.
    #[inline]
    pub fn reset(&mut self, position: u64) {
        self.start = 0;
        self.end = 0;
        self.prior_reads = position;
    }

    /// Make sure a window of `len` bytes can fit in the buffer. A single
    /// field may be larger than the configured buffer, so the buffer grows
    /// to the next power of two instead of failing.
    pub fn reserve(&mut self, len: usize) {
        if len <= self.buf.len() {
            return;
        }

        let new_len = len.checked_next_power_of_two().unwrap_or(len);
        let mut new_buf = vec![0u8; new_len].into_boxed_slice();
        let carry_over = self.window_len();
        new_buf[..carry_over].copy_from_slice(self.window());
        self.prior_reads += self.start as u64;
        self.buf = new_buf;
        self.start = 0;
        self.end = carry_over;
    }

    /// This seems similar to `BufRead::fill_buf`, but whereas the `BufRead`
    /// will only call the underlying read if the buffer is currently empty,
    /// this function will copy over the bytes that haven't been consumed to the
    /// start.
    pub fn fill_buf(&mut self, mut reader: impl Read) -> std::io::Result<usize> {
        let carry_over = self.window_len();
        if carry_over >= self.buf.len() {
            let len = self.buf.len().max(1) * 2;
            self.reserve(len);
        }

        if self.start != 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.prior_reads += self.start as u64;
            self.start = 0;
            self.end = carry_over;
        }

        loop {
            match reader.read(&mut self.buf[self.end..]) {
                Ok(r) => {
                    self.end += r;
                    return Ok(r);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug)]
pub struct BufferWindowBuilder {
    buffer: Option<Box<[u8]>>,
    buffer_len: usize,
}

impl Default for BufferWindowBuilder {
    fn default() -> Self {
        // Default buffer size of 32 KiB, enough for nearly every subrecord
        let buffer_len = 32 * 1024;
        Self {
            buffer: None,
            buffer_len,
        }
    }
}

impl BufferWindowBuilder {
    #[inline]
    pub fn buffer(mut self, val: Box<[u8]>) -> BufferWindowBuilder {
        self.buffer = Some(val);
        self
    }

    #[inline]
    pub fn buffer_len(mut self, val: usize) -> BufferWindowBuilder {
        self.buffer_len = val;
        self
    }

    #[inline]
    pub fn build(self) -> BufferWindow {
        let init_len = self.buffer_len.max(16);
        let buf = self
            .buffer
            .filter(|x| !x.is_empty())
            .unwrap_or_else(|| vec![0; init_len].into_boxed_slice());
        BufferWindow {
            buf,
            start: 0,
            end: 0,
            prior_reads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_split() {
        let data: Vec<u8> = (0..40u8).collect();
        let mut reader = &data[..];
        let mut window = BufferWindowBuilder::default().buffer_len(16).build();

        assert_eq!(window.fill_buf(&mut reader).unwrap(), 16);
        assert_eq!(window.split(10), &data[..10]);
        assert_eq!(window.position(), 10);

        // unconsumed bytes are carried over to the front
        assert_eq!(window.fill_buf(&mut reader).unwrap(), 10);
        assert_eq!(window.window(), &data[10..26]);
        assert_eq!(window.position(), 10);
        assert_eq!(window.window_len(), 16);
    }

    #[test]
    fn test_grows_for_large_window() {
        let data = vec![7u8; 100];
        let mut reader = &data[..];
        let mut window = BufferWindowBuilder::default().buffer_len(16).build();
        window.reserve(100);
        while window.window_len() < 100 {
            assert_ne!(window.fill_buf(&mut reader).unwrap(), 0);
        }

        assert_eq!(window.buf.len(), 128);
        assert_eq!(window.split(100), &data[..]);
        assert_eq!(window.position(), 100);
    }

    #[test]
    fn test_reset() {
        let data = vec![1u8; 32];
        let mut window = BufferWindowBuilder::default().buffer_len(16).build();
        window.fill_buf(&data[..]).unwrap();
        window.advance(4);
        window.reset(1000);
        assert_eq!(window.window_len(), 0);
        assert_eq!(window.position(), 1000);
    }
}
