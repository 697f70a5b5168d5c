use crate::utils::error::Result;
use regex::Regex;

/// Keeps only lines matching a regular expression (or, inverted, the ones that don't).
#[derive(Debug, Clone)]
pub struct LineFilter {
    regex: Regex,
    invert: bool,
}

impl LineFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            invert: false,
        })
    }

    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line) != self.invert
    }

    pub fn apply<I>(&self, lines: I) -> Filtered<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Filtered {
            filter: self,
            inner: lines.into_iter(),
            dropped: 0,
            header_pending: false,
        }
    }
}

pub struct Filtered<'f, I> {
    filter: &'f LineFilter,
    inner: I,
    dropped: usize,
    header_pending: bool,
}

impl<I> Filtered<'_, I> {
    /// Lets the first line through unfiltered so a header still reaches the processor.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.header_pending = has_header;
        self
    }

    /// Lines rejected so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<I> Iterator for Filtered<'_, I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.header_pending {
            self.header_pending = false;
            return self.inner.next();
        }
        for line in self.inner.by_ref() {
            if self.filter.is_match(line.as_ref()) {
                return Some(line);
            }
            self.dropped += 1;
        }
        None
    }
}
