use std::collections::btree_map::{self, BTreeMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};

use crate::error::{Error, Result, TimeError};

/// A single timing: how long a run over `size` inputs took with `threads` threads.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Measurement {
    /// The number of elements processed.
    pub size: u64,
    /// The number of threads used.
    pub threads: u32,
    /// The wall-clock duration of the run, in seconds.
    pub elapsed: f64,
}

impl Measurement {
    /// Create a measurement from its parts.
    pub const fn new(size: u64, threads: u32, elapsed: f64) -> Measurement {
        Measurement { size, threads, elapsed }
    }
}

/// Elapsed times grouped by input size, then by thread count.
///
/// Both levels iterate in ascending order. Inserting a `(size, threads)` pair that is already
/// present replaces the earlier time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    sizes: BTreeMap<u64, BTreeMap<u32, f64>>,
}

impl Table {
    /// Create an empty table.
    pub const fn new() -> Table {
        Table { sizes: BTreeMap::new() }
    }

    /// Parse a measurements file with the default [`Parser`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Table> {
        Parser::new().parse_path(path)
    }

    /// Store a measurement, returning the elapsed time it replaced.
    pub fn insert(&mut self, m: Measurement) -> Option<f64> {
        self.sizes.entry(m.size).or_default().insert(m.threads, m.elapsed)
    }

    /// The elapsed time recorded for `size` inputs on `threads` threads.
    pub fn get(&self, size: u64, threads: u32) -> Option<f64> {
        self.sizes.get(&size)?.get(&threads).copied()
    }

    /// The number of `(size, threads)` pairs in the table.
    pub fn len(&self) -> usize {
        self.sizes.values().map(BTreeMap::len).sum()
    }

    /// Whether the table holds no measurements.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// The recorded input sizes, smallest first.
    pub fn sizes(&self) -> impl Iterator<Item = u64> + '_ {
        self.sizes.keys().copied()
    }

    /// The `(threads, elapsed)` points for one input size, fewest threads first.
    pub fn series(&self, size: u64) -> Option<Series<'_>> {
        self.sizes.get(&size).map(|s| Series(s.iter()))
    }

    /// Every input size with its series, smallest size first.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Series<'_>)> + '_ {
        self.sizes.iter().map(|(&size, s)| (size, Series(s.iter())))
    }

    pub(crate) fn elapsed_range(&self) -> Option<(f64, f64)> {
        self.sizes.values().flat_map(BTreeMap::values).fold(None, |range, &e| match range {
            None => Some((e, e)),
            Some((lo, hi)) => Some((f64::min(lo, e), f64::max(hi, e))),
        })
    }

    pub(crate) fn threads_range(&self) -> Option<(u32, u32)> {
        self.sizes.values().flat_map(BTreeMap::keys).fold(None, |range, &t| match range {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
    }
}

impl Extend<Measurement> for Table {
    fn extend<I: IntoIterator<Item = Measurement>>(&mut self, iter: I) {
        for m in iter {
            self.insert(m);
        }
    }
}

impl FromIterator<Measurement> for Table {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Table {
        let mut table = Table::new();
        table.extend(iter);
        table
    }
}

/// The `(threads, elapsed)` points recorded for a single input size, in ascending thread order.
#[derive(Debug, Clone)]
pub struct Series<'a>(btree_map::Iter<'a, u32, f64>);

impl Iterator for Series<'_> {
    type Item = (u32, f64);

    fn next(&mut self) -> Option<(u32, f64)> {
        self.0.next().map(|(&t, &e)| (t, e))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Series<'_> {}

/// Reads `size | threads | elapsed` lines into a [`Table`].
///
/// Fields are trimmed of surrounding whitespace. Lines with other than three fields are skipped
/// unless [`Parser::strict`] is set; a field that doesn't parse always fails the whole read.
/// Sizes and thread counts are unsigned, so a negative value is a parse error.
#[derive(Debug, Copy, Clone)]
pub struct Parser {
    delimiter: u8,
    strict: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

impl Parser {
    /// A parser for `|`-delimited lines that skips malformed lines.
    pub const fn new() -> Parser {
        Parser { delimiter: b'|', strict: false }
    }

    /// Use `delimiter` to separate fields.
    pub const fn delimiter(mut self, delimiter: u8) -> Parser {
        self.delimiter = delimiter;
        self
    }

    /// Fail with [`Error::FieldCount`] on lines with other than three fields instead of skipping
    /// them.
    pub const fn strict(mut self, strict: bool) -> Parser {
        self.strict = strict;
        self
    }

    /// Open and parse the file at `path`.
    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|source| Error::Open { path: path.to_path_buf(), source })?;
        debug!("reading measurements from {}", path.display());
        self.parse_reader(file)
    }

    /// Parse measurements from any reader.
    pub fn parse_reader<R: io::Read>(&self, rdr: R) -> Result<Table> {
        let mut splitter = ReaderBuilder::new();
        splitter.delimiter(self.delimiter).has_headers(false).quoting(false).trim(Trim::All);

        let mut table = Table::new();
        let mut skipped = 0usize;
        let mut record = StringRecord::new();
        // Lines are split one at a time so blank lines still count towards line numbers.
        for (idx, text) in BufReader::new(rdr).lines().enumerate() {
            let text = text.map_err(csv::Error::from)?;
            let line = idx as u64 + 1;
            if !splitter.from_reader(text.as_bytes()).read_record(&mut record)? {
                continue;
            }
            if record.len() != 3 {
                if self.strict {
                    return Err(Error::FieldCount { line, fields: record.len() });
                }
                warn!("line {}: skipping, expected 3 fields but found {}", line, record.len());
                skipped += 1;
                continue;
            }

            let m = parse_record(&record, line)?;
            if let Some(previous) = table.insert(m) {
                debug!(
                    "line {}: {}s replaces {}s for size={} threads={}",
                    line, m.elapsed, previous, m.size, m.threads
                );
            }
        }

        if skipped > 0 {
            info!("skipped {} malformed line(s)", skipped);
        }
        Ok(table)
    }
}

fn parse_record(record: &StringRecord, line: u64) -> Result<Measurement> {
    let size = &record[0];
    let size = size
        .parse::<u64>()
        .map_err(|source| Error::InvalidSize { line, value: size.to_string(), source })?;
    let threads = &record[1];
    let threads = threads
        .parse::<u32>()
        .map_err(|source| Error::InvalidThreads { line, value: threads.to_string(), source })?;
    let elapsed = &record[2];
    let elapsed = parse_elapsed(elapsed)
        .map_err(|source| Error::InvalidTime { line, value: elapsed.to_string(), source })?;
    Ok(Measurement::new(size, threads, elapsed))
}

/// Convert an elapsed time of the form `SS.sss` or `MM:SS.sss` to seconds.
///
/// ```
/// assert_eq!(benchplot::parse_elapsed("2:05"), Ok(125.0));
/// assert_eq!(benchplot::parse_elapsed("45.5"), Ok(45.5));
/// ```
pub fn parse_elapsed(s: &str) -> std::result::Result<f64, TimeError> {
    let seconds = match s.split_once(':') {
        Some((_, secs)) if secs.contains(':') => return Err(TimeError::TooManyColons),
        Some((mins, secs)) => {
            mins.trim().parse::<f64>()? * 60.0 + secs.trim().parse::<f64>()?
        }
        None => s.trim().parse()?,
    };
    if seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(TimeError::NotFinite)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use approx::assert_relative_eq;

    use super::*;

    fn parse(input: &str) -> Result<Table> {
        Parser::new().parse_reader(input.as_bytes())
    }

    #[test]
    fn elapsed() {
        assert_eq!(parse_elapsed("45.5"), Ok(45.5));
        assert_eq!(parse_elapsed("2:05"), Ok(125.0));
        assert_eq!(parse_elapsed("1:30"), Ok(90.0));
        assert_eq!(parse_elapsed("0:00.250"), Ok(0.25));
        assert_eq!(parse_elapsed(" 3 : 07.5 "), Ok(187.5));
        assert_relative_eq!(parse_elapsed("12:34.567").unwrap(), 754.567);

        assert_eq!(parse_elapsed("1:2:3"), Err(TimeError::TooManyColons));
        assert_eq!(parse_elapsed("nan"), Err(TimeError::NotFinite));
        assert_eq!(parse_elapsed("inf"), Err(TimeError::NotFinite));
        assert!(matches!(parse_elapsed(""), Err(TimeError::Number(_))));
        assert!(matches!(parse_elapsed("1:"), Err(TimeError::Number(_))));
        assert!(matches!(parse_elapsed("abc"), Err(TimeError::Number(_))));
    }

    #[test]
    fn well_formed_lines() {
        let table = parse("100 | 2 | 1:30\n100|4|45.5\n  2000 |1| 2:05  \n").unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(100, 2), Some(90.0));
        assert_eq!(table.get(100, 4), Some(45.5));
        assert_eq!(table.get(2000, 1), Some(125.0));
        assert_eq!(table.get(2000, 2), None);

        let expected: Table = [
            Measurement::new(100, 2, 90.0),
            Measurement::new(100, 4, 45.5),
            Measurement::new(2000, 1, 125.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(table, expected);
    }

    #[test]
    fn ordering() {
        let table = parse("500|8|1\n50|4|2\n500|1|3\n50|1|4\n5000|2|5\n").unwrap();

        assert_eq!(table.sizes().collect::<Vec<_>>(), vec![50, 500, 5000]);
        assert_eq!(table.series(500).unwrap().collect::<Vec<_>>(), vec![(1, 3.0), (8, 1.0)]);
        assert_eq!(table.series(50).unwrap().len(), 2);
        assert!(table.series(7).is_none());

        let sizes: Vec<u64> = table.iter().map(|(size, _)| size).collect();
        assert_eq!(sizes, vec![50, 500, 5000]);
    }

    #[test]
    fn wrong_field_counts_are_skipped() {
        let table = parse("100|1\n100|1|2|3\n\n   \nheader\n100|2|10.0\n|\n").unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(100, 2), Some(10.0));
    }

    #[test]
    fn strict_rejects_wrong_field_counts() {
        let err = Parser::new().strict(true).parse_reader("100|2|10\n100|1\n".as_bytes());

        match err {
            Err(Error::FieldCount { line, fields }) => {
                assert_eq!(line, 2);
                assert_eq!(fields, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn line_numbers_count_blank_lines() {
        match parse("100|2|1\n\n\nabc|2|1\n") {
            Err(Error::InvalidSize { line, value, .. }) => {
                assert_eq!(line, 4);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let input = "\r\n100|2|10\r\n\r\n100|1\r\n";
        match Parser::new().strict(true).parse_reader(input.as_bytes()) {
            Err(Error::FieldCount { line, fields }) => {
                assert_eq!(line, 4);
                assert_eq!(fields, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn last_duplicate_wins() {
        let table = parse("100|2|10\n100|2|20\n100|2|1:00\n").unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(100, 2), Some(60.0));
    }

    #[test]
    fn numeric_errors_are_fatal() {
        match parse("100|2|1\nabc|2|1\n") {
            Err(Error::InvalidSize { line, value, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match parse("100|-2|1\n") {
            Err(Error::InvalidThreads { line, value, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(value, "-2");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match parse("1|1|1\n\n100|2|1:2:3\n") {
            Err(Error::InvalidTime { line, value, source }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "1:2:3");
                assert_eq!(source, TimeError::TooManyColons);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn custom_delimiter() {
        let table =
            Parser::new().delimiter(b',').parse_reader("10, 3, 0:01.5\n".as_bytes()).unwrap();

        assert_eq!(table.get(10, 3), Some(1.5));
    }

    #[test]
    fn from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1000 | 1 | 1:00").unwrap();
        writeln!(file, "1000 | 2 | 31.5").unwrap();
        file.flush().unwrap();

        let table = Table::from_path(file.path()).unwrap();
        assert_eq!(table.get(1000, 1), Some(60.0));
        assert_eq!(table.get(1000, 2), Some(31.5));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("times.txt");

        match Table::from_path(&path) {
            Err(Error::Open { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn ranges() {
        assert_eq!(Table::new().elapsed_range(), None);
        assert_eq!(Table::new().threads_range(), None);

        let table = parse("1|3|2.5\n2|12|0.5\n2|1|9\n").unwrap();
        assert_eq!(table.elapsed_range(), Some((0.5, 9.0)));
        assert_eq!(table.threads_range(), Some((1, 12)));
    }
}
