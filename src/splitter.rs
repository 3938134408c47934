use memchr::Memchr;

/// Splits a string on a single delimiter byte, keeping empty pieces.
///
/// The `mappings` grammar nests two of these: an outer split on `b';'`
/// yielding lines (empty lines included, they advance the generated line
/// counter), an inner split on `b','` yielding segments.
#[derive(Debug)]
pub(crate) struct Splitter<'a> {
    string: &'a str,
    memchr: Memchr<'a>,
    cur_start: usize,
}

impl<'a> Splitter<'a> {
    pub fn new(string: &'a str, delimiter: u8) -> Self {
        Self {
            string,
            memchr: memchr::memchr_iter(delimiter, string.as_bytes()),
            cur_start: 0,
        }
    }
}

impl<'a> Iterator for Splitter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let cur_end = match self.memchr.next() {
            Some(end) => end,
            None => {
                if self.cur_start > self.string.len() {
                    return None;
                }
                self.string.len()
            }
        };
        // SAFETY: cur_start and cur_end both come from memchr positions or
        // the string length, so the range is in bounds and on a char
        // boundary (the delimiter is ASCII).
        let piece = unsafe { self.string.get_unchecked(self.cur_start..cur_end) };
        self.cur_start = cur_end + 1;
        Some(piece)
    }
}
