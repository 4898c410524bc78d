use crate::error::ApiError;

/// Inclusive byte range within a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Never zero: a range always includes `start`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a `Range` header against a file of `size` bytes.
///
/// Only the first range of a `bytes=` header is honoured. A header in any
/// other unit or with unparseable bounds is ignored (`Ok(None)`), and the
/// whole file is served. A syntactically valid range whose start or end
/// falls outside the file is unsatisfiable.
pub fn parse_range(header: &str, size: u64) -> Result<Option<ByteRange>, ApiError> {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    let first = spec.split(',').next().unwrap_or("").trim();
    let Some((start, end)) = first.split_once('-') else {
        return Ok(None);
    };
    let (start, end) = (start.trim(), end.trim());

    let unsatisfiable = ApiError::RangeNotSatisfiable { size };

    // Suffix form: the last N bytes.
    if start.is_empty() {
        let Ok(suffix) = end.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || size == 0 {
            return Err(unsatisfiable);
        }
        return Ok(Some(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }));
    }

    let Ok(start) = start.parse::<u64>() else {
        return Ok(None);
    };
    let end = if end.is_empty() {
        size.saturating_sub(1)
    } else {
        match end.parse::<u64>() {
            Ok(end) => end,
            Err(_) => return Ok(None),
        }
    };

    if start >= size || end >= size || start > end {
        return Err(unsatisfiable);
    }

    Ok(Some(ByteRange { start, end }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_ended_covers_whole_file() {
        let r = parse_range("bytes=0-", 1000).unwrap().unwrap();
        assert_eq!(r, ByteRange { start: 0, end: 999 });
        assert_eq!(r.len(), 1000);
        assert_eq!(r.content_range(1000), "bytes 0-999/1000");
    }

    #[test]
    fn bounded_range() {
        let r = parse_range("bytes=100-199", 1000).unwrap().unwrap();
        assert_eq!(r.len(), 100);
        assert_eq!(r.content_range(1000), "bytes 100-199/1000");
    }

    #[test]
    fn out_of_bounds_is_unsatisfiable() {
        for header in ["bytes=1000-", "bytes=0-1000", "bytes=500-400", "bytes=2000-3000"] {
            match parse_range(header, 1000) {
                Err(ApiError::RangeNotSatisfiable { size }) => assert_eq!(size, 1000),
                other => panic!("{} gave {:?}", header, other),
            }
        }
        assert!(parse_range("bytes=0-", 0).is_err());
    }

    #[test]
    fn suffix_range() {
        let r = parse_range("bytes=-100", 1000).unwrap().unwrap();
        assert_eq!(r, ByteRange { start: 900, end: 999 });
        let r = parse_range("bytes=-5000", 1000).unwrap().unwrap();
        assert_eq!(r, ByteRange { start: 0, end: 999 });
    }

    #[test]
    fn foreign_or_malformed_headers_are_ignored() {
        assert_eq!(parse_range("items=0-5", 1000).unwrap(), None);
        assert_eq!(parse_range("bytes=abc-def", 1000).unwrap(), None);
        assert_eq!(parse_range("bytes=", 1000).unwrap(), None);
    }

    #[test]
    fn only_first_of_multiple_ranges() {
        let r = parse_range("bytes=0-9, 20-29", 100).unwrap().unwrap();
        assert_eq!(r, ByteRange { start: 0, end: 9 });
    }
}
