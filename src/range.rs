// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! RFC 7233 `Range` header parsing.

/// One byte range, inclusive on both ends, with `start <= end < len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ByteRange {
    pub(crate) start: u64,
    pub(crate) end: u64,
}

/// Outcome of parsing a `Range` header against an entity of a given length.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ParsedRanges {
    /// The header has no `=` separator.
    Malformed,
    /// Every range was dropped as invalid or out of bounds.
    Unsatisfiable,
    /// At least one satisfiable range, in the client's order.
    Satisfiable(Vec<ByteRange>),
}

/// Parses a `Range` header value against an entity `len` bytes long.
///
/// `-n` selects the final `n` bytes (clamped to the whole entity), `n-`
/// runs to the end, and last-byte positions beyond the entity are clamped.
/// Entries that do not parse or start past the end are dropped. With
/// `combine`, overlapping and adjacent ranges merge, and the result is
/// re-ordered to match the position of each surviving range in the
/// original header.
pub(crate) fn parse(len: u64, header: &str, combine: bool) -> ParsedRanges {
    let Some(eq) = header.find('=') else {
        return ParsedRanges::Malformed;
    };

    let mut ranges = Vec::new();
    for entry in header[eq + 1..].split(',') {
        let Some((first, second)) = entry.split_once('-') else {
            continue;
        };
        let (first, second) = (first.trim_matches(' '), second.trim_matches(' '));

        let (start, mut end) = if first.is_empty() {
            // Suffix form: the final `second` bytes.
            let Ok(suffix) = second.parse::<u64>() else {
                continue;
            };
            (len.saturating_sub(suffix), len.wrapping_sub(1))
        } else {
            let Ok(start) = first.parse::<u64>() else {
                continue;
            };
            let end = if second.is_empty() {
                len.wrapping_sub(1)
            } else {
                let Ok(end) = second.parse::<u64>() else {
                    continue;
                };
                end
            };
            (start, end)
        };

        if len == 0 {
            continue;
        }
        if end > len - 1 {
            end = len - 1;
        }
        if start > end {
            continue;
        }
        ranges.push(ByteRange { start, end });
    }

    if ranges.is_empty() {
        return ParsedRanges::Unsatisfiable;
    }
    if combine {
        ranges = combine_ranges(ranges);
    }
    ParsedRanges::Satisfiable(ranges)
}

/// Merges overlapping and adjacent ranges, then restores the client's
/// original ordering: each merged range sorts by the earliest header
/// position among the ranges it absorbed.
fn combine_ranges(ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    let mut ordered: Vec<(ByteRange, usize)> = ranges.into_iter().zip(0..).collect();
    ordered.sort_by_key(|(range, _)| range.start);

    let mut merged: Vec<(ByteRange, usize)> = Vec::with_capacity(ordered.len());
    for (range, index) in ordered {
        match merged.last_mut() {
            Some((current, current_index)) if range.start <= current.end.saturating_add(1) => {
                if range.end > current.end {
                    current.end = range.end;
                }
                *current_index = (*current_index).min(index);
            }
            _ => merged.push((range, index)),
        }
    }

    merged.sort_by_key(|&(_, index)| index);
    merged.into_iter().map(|(range, _)| range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn satisfiable(parsed: ParsedRanges) -> Vec<ByteRange> {
        match parsed {
            ParsedRanges::Satisfiable(ranges) => ranges,
            other => panic!("expected satisfiable ranges, got {other:?}"),
        }
    }

    fn range(start: u64, end: u64) -> ByteRange {
        ByteRange { start, end }
    }

    #[test]
    fn missing_equals_is_malformed() {
        assert_eq!(parse(100, "bytes", true), ParsedRanges::Malformed);
        assert_eq!(parse(100, "", true), ParsedRanges::Malformed);
    }

    #[test]
    fn simple_range() {
        assert_eq!(satisfiable(parse(100, "bytes=0-9", true)), [range(0, 9)]);
        assert_eq!(satisfiable(parse(6, "bytes=1-3", true)), [range(1, 3)]);
    }

    #[test]
    fn open_range_runs_to_end() {
        assert_eq!(satisfiable(parse(100, "bytes=40-", true)), [range(40, 99)]);
    }

    #[test]
    fn suffix_range() {
        assert_eq!(satisfiable(parse(100, "bytes=-20", true)), [range(80, 99)]);
    }

    #[test]
    fn suffix_longer_than_entity_clamps() {
        assert_eq!(satisfiable(parse(3, "bytes=-5", true)), [range(0, 2)]);
    }

    #[test]
    fn end_clamped_to_entity() {
        assert_eq!(satisfiable(parse(10, "bytes=5-500", true)), [range(5, 9)]);
    }

    #[test]
    fn start_past_end_is_unsatisfiable() {
        assert_eq!(parse(5, "bytes=10-", true), ParsedRanges::Unsatisfiable);
        assert_eq!(parse(5, "bytes=5-6", true), ParsedRanges::Unsatisfiable);
    }

    #[test]
    fn zero_suffix_is_unsatisfiable() {
        assert_eq!(parse(100, "bytes=-0", true), ParsedRanges::Unsatisfiable);
    }

    #[test]
    fn empty_entity_is_unsatisfiable() {
        assert_eq!(parse(0, "bytes=0-0", true), ParsedRanges::Unsatisfiable);
        assert_eq!(parse(0, "bytes=-1", true), ParsedRanges::Unsatisfiable);
    }

    #[test]
    fn invalid_entries_are_dropped() {
        assert_eq!(
            satisfiable(parse(100, "bytes=abc-,0-9,x-y", true)),
            [range(0, 9)]
        );
        assert_eq!(parse(100, "bytes=nope", true), ParsedRanges::Unsatisfiable);
    }

    #[test]
    fn multiple_disjoint_ranges_survive_combine() {
        assert_eq!(
            satisfiable(parse(100, "bytes=0-9,30-39", true)),
            [range(0, 9), range(30, 39)]
        );
    }

    #[test]
    fn overlapping_ranges_merge() {
        assert_eq!(
            satisfiable(parse(100, "bytes=0-10,5-20", true)),
            [range(0, 20)]
        );
    }

    #[test]
    fn adjacent_ranges_merge() {
        assert_eq!(
            satisfiable(parse(100, "bytes=0-9,10-19", true)),
            [range(0, 19)]
        );
    }

    #[test]
    fn combine_preserves_request_order() {
        // The client asked for the tail first; the merged set keeps that
        // order even though merging sorts by start internally.
        assert_eq!(
            satisfiable(parse(100, "bytes=90-99,0-4,5-9", true)),
            [range(90, 99), range(0, 9)]
        );
    }

    #[test]
    fn combined_output_is_disjoint_and_nonadjacent() {
        let ranges = satisfiable(parse(1000, "bytes=0-9,5-14,30-39,15-19,60-", true));
        let mut sorted = ranges.clone();
        sorted.sort_by_key(|r| r.start);
        for pair in sorted.windows(2) {
            assert!(pair[0].end + 1 < pair[1].start, "ranges {pair:?} touch");
        }
    }

    #[test]
    fn without_combine_ranges_stay_separate() {
        assert_eq!(
            satisfiable(parse(100, "bytes=0-10,5-20", false)),
            [range(0, 10), range(5, 20)]
        );
    }
}
