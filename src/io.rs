//! Matrix Market reader.
//!
//! Only the `matrix coordinate` flavour is accepted, with `real`, `integer`
//! or `pattern` entries and `general` or `symmetric` storage. Entries come
//! back exactly as written (1-based); the converter in [`crate::csr`] does
//! the index translation and bounds checking.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use strum_macros::{Display, EnumString};

use crate::csr::Triple;
use crate::error::{Error, Result};

/// Upper bound on entries reserved up front from the declared count.
const MAX_PREALLOCATED_ENTRIES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Format {
    Coordinate,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Field {
    Real,
    Double,
    Integer,
    Pattern,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Symmetry {
    General,
    Symmetric,
    #[strum(serialize = "skew-symmetric")]
    SkewSymmetric,
    Hermitian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Banner {
    pub format: Format,
    pub field: Field,
    pub symmetry: Symmetry,
}

/// Parsed file: header sizes plus the coordinate entries in file order.
/// Symmetric files are expanded, so `triples` may hold more entries than
/// the header declared.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixMarket {
    pub banner: Banner,
    pub nrows: usize,
    pub ncols: usize,
    pub declared_nnz: usize,
    pub triples: Vec<Triple>,
}

pub fn read_matrix_market<P: AsRef<Path>>(path: P) -> Result<MatrixMarket> {
    let file = File::open(path.as_ref())?;
    parse_matrix_market(BufReader::new(file))
}

fn parse_token<T: FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T> {
    let token = token.ok_or_else(|| Error::parse(line, format!("missing {what}")))?;
    token
        .parse()
        .map_err(|_| Error::parse(line, format!("invalid {what} `{token}`")))
}

fn parse_banner(text: &str) -> Result<Banner> {
    let mut tokens = text.split_whitespace();
    if tokens.next() != Some("%%MatrixMarket") {
        return Err(Error::parse(1, "missing %%MatrixMarket banner"));
    }
    let object = tokens
        .next()
        .ok_or_else(|| Error::parse(1, "missing object type"))?;
    if !object.eq_ignore_ascii_case("matrix") {
        return Err(Error::UnsupportedFormat(format!(
            "object `{object}` is not a matrix"
        )));
    }
    let banner = Banner {
        format: parse_token(tokens.next(), 1, "storage format")?,
        field: parse_token(tokens.next(), 1, "value field")?,
        symmetry: parse_token(tokens.next(), 1, "symmetry")?,
    };

    if banner.format != Format::Coordinate {
        return Err(Error::UnsupportedFormat(
            "only sparse (coordinate) matrices are supported".into(),
        ));
    }
    if banner.field == Field::Complex {
        return Err(Error::UnsupportedFormat("complex values".into()));
    }
    if !matches!(banner.symmetry, Symmetry::General | Symmetry::Symmetric) {
        return Err(Error::UnsupportedFormat(format!(
            "{} storage",
            banner.symmetry
        )));
    }
    Ok(banner)
}

pub fn parse_matrix_market<R: BufRead>(reader: R) -> Result<MatrixMarket> {
    let mut lines = reader.lines().enumerate().map(|(i, line)| (i + 1, line));

    let banner = match lines.next() {
        Some((_, line)) => parse_banner(&line?)?,
        None => return Err(Error::parse(1, "empty input")),
    };

    // blank and comment lines may appear anywhere after the banner
    let mut content = lines.filter_map(|(number, line)| match line {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                None
            } else {
                Some(Ok((number, trimmed.to_string())))
            }
        }
        Err(e) => Some(Err(e)),
    });

    let (size_line, size_text) = content
        .next()
        .ok_or_else(|| Error::parse(2, "missing size line"))??;
    let mut tokens = size_text.split_whitespace();
    let nrows: usize = parse_token(tokens.next(), size_line, "row count")?;
    let ncols: usize = parse_token(tokens.next(), size_line, "column count")?;
    let declared_nnz: usize = parse_token(tokens.next(), size_line, "nonzero count")?;
    if tokens.next().is_some() {
        return Err(Error::parse(size_line, "size line has trailing data"));
    }

    let mut triples = Vec::with_capacity(declared_nnz.min(MAX_PREALLOCATED_ENTRIES));
    let mut last_line = size_line;
    for read in 0..declared_nnz {
        let (number, text) = match content.next() {
            Some(entry) => entry?,
            None => {
                return Err(Error::parse(
                    last_line + 1,
                    format!("expected {declared_nnz} entries, found {read}"),
                ))
            }
        };
        last_line = number;
        let mut tokens = text.split_whitespace();
        let row: usize = parse_token(tokens.next(), number, "row index")?;
        let col: usize = parse_token(tokens.next(), number, "column index")?;
        let value: f64 = match banner.field {
            Field::Pattern => 1.0,
            _ => parse_token(tokens.next(), number, "value")?,
        };
        triples.push(Triple::new(row, col, value));
        if banner.symmetry == Symmetry::Symmetric && row != col {
            triples.push(Triple::new(col, row, value));
        }
    }
    if content.next().is_some() {
        warn!("ignoring data after the {declared_nnz} declared entries");
    }

    debug!(
        "read {nrows}x{ncols} {} {} matrix with {} entries",
        banner.field,
        banner.symmetry,
        triples.len()
    );
    Ok(MatrixMarket {
        banner,
        nrows,
        ncols,
        declared_nnz,
        triples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<MatrixMarket> {
        parse_matrix_market(text.as_bytes())
    }

    #[test]
    fn general_real_matrix() {
        let mm = parse(
            "%%MatrixMarket matrix coordinate real general\n\
             % a comment\n\
             \n\
             3 3 3\n\
             1 1 2.5\n\
             3 2 -1e-2\n\
             2 3 4\n",
        )
        .unwrap();
        assert_eq!((mm.nrows, mm.ncols, mm.declared_nnz), (3, 3, 3));
        assert_eq!(
            mm.triples,
            vec![
                Triple::new(1, 1, 2.5),
                Triple::new(3, 2, -0.01),
                Triple::new(2, 3, 4.0),
            ]
        );
    }

    #[test]
    fn pattern_and_symmetric_expansion() {
        let mm = parse(
            "%%MatrixMarket matrix coordinate pattern symmetric\n\
             2 2 2\n\
             1 1\n\
             2 1\n",
        )
        .unwrap();
        assert_eq!(
            mm.triples,
            vec![
                Triple::new(1, 1, 1.0),
                Triple::new(2, 1, 1.0),
                Triple::new(1, 2, 1.0),
            ]
        );
    }

    #[test]
    fn dense_and_complex_files_are_unsupported() {
        assert!(matches!(
            parse("%%MatrixMarket matrix array real general\n2 2\n"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parse("%%MatrixMarket matrix coordinate complex general\n1 1 0\n"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parse("%%MatrixMarket vector coordinate real general\n1 1 0\n"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parse("%%MatrixMarket matrix coordinate real skew-symmetric\n1 1 0\n"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn malformed_input_reports_the_line() {
        assert!(matches!(
            parse("MatrixMarket matrix coordinate real general\n"),
            Err(Error::InputParse { line: 1, .. })
        ));
        assert!(matches!(
            parse("%%MatrixMarket matrix coordinate real general\n3 three 1\n"),
            Err(Error::InputParse { line: 2, .. })
        ));
        assert!(matches!(
            parse("%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n2 x 1.0\n"),
            Err(Error::InputParse { line: 4, .. })
        ));
        assert!(matches!(
            parse("%%MatrixMarket matrix coordinate real general\n2 2 1\n1 1\n"),
            Err(Error::InputParse { line: 3, .. })
        ));
    }

    #[test]
    fn missing_entries_are_reported() {
        match parse("%%MatrixMarket matrix coordinate real general\n2 2 3\n1 1 1.0\n") {
            Err(Error::InputParse { message, .. }) => {
                assert!(message.contains("expected 3 entries, found 1"))
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_nonzero_count_is_a_parse_error() {
        for declared in [usize::MAX, 100_000_000_000] {
            let text = format!(
                "%%MatrixMarket matrix coordinate real general\n100 100 {declared}\n1 1 1.0\n"
            );
            match parse(&text) {
                Err(Error::InputParse { line: 4, message }) => {
                    assert!(message.contains("found 1"), "{message}")
                }
                other => panic!("expected parse error, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            read_matrix_market("does/not/exist.mtx"),
            Err(Error::Io(_))
        ));
    }
}
