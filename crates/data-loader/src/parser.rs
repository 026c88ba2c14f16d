//! Parser for MovieLens-style data files.
//!
//! Both files use `::` as the field separator:
//! - ratings.dat: userId::movieId::rating::timestamp
//! - movies.dat: movieId::title::genres
//!
//! A malformed line is a per-record problem: it is logged with `warn!` and
//! skipped, and loading carries on. Only I/O failures abort a parse.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::{FromStr, Split};
use tracing::{debug, warn};

const RATINGS_FILE: &str = "ratings.dat";
const MOVIES_FILE: &str = "movies.dat";

/// Read a whole file as ISO-8859-1 (Latin-1).
///
/// Every byte maps directly to the Unicode code point of the same value, so
/// this never fails on content.
fn read_latin1(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    Ok(bytes.iter().map(|&b| b as char).collect())
}

/// Parse the ratings.dat file
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    let content = read_latin1(path)?;
    Ok(parse_ratings_str(&content))
}

/// Parse the movies.dat file
pub fn parse_movies(path: &Path) -> Result<Vec<Movie>> {
    let content = read_latin1(path)?;
    Ok(parse_movies_str(&content))
}

/// Parse ratings from already-decoded file content, skipping bad lines.
pub fn parse_ratings_str(content: &str) -> Vec<Rating> {
    parse_records(content, RATINGS_FILE, parse_rating_line)
}

/// Parse movies from already-decoded file content, skipping bad lines.
pub fn parse_movies_str(content: &str) -> Vec<Movie> {
    parse_records(content, MOVIES_FILE, parse_movie_line)
}

fn parse_records<T>(
    content: &str,
    file: &str,
    parse_line: impl Fn(&str, usize) -> Result<T>,
) -> Vec<T> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in content.lines().enumerate() {
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }
        match parse_line(line_trimmed, idx + 1) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Skipping record: {} ({:?})", e, line_trimmed);
                skipped += 1;
            }
        }
    }

    debug!("Parsed {} records from {} ({} skipped)", records.len(), file, skipped);
    records
}

/// Parse one `userId::movieId::rating::timestamp` line
pub fn parse_rating_line(line: &str, line_no: usize) -> Result<Rating> {
    let mut parts = line.split("::");

    let user_id = parse_field(&mut parts, RATINGS_FILE, line_no, "userId")?;
    let movie_id = parse_field(&mut parts, RATINGS_FILE, line_no, "movieId")?;
    let rating: f32 = parse_field(&mut parts, RATINGS_FILE, line_no, "rating")?;
    let timestamp = parse_field(&mut parts, RATINGS_FILE, line_no, "timestamp")?;

    // `f32::from_str` accepts "nan" and "inf"
    if !rating.is_finite() {
        return Err(DataLoadError::ParseError {
            file: RATINGS_FILE.to_string(),
            line: line_no,
            reason: format!("Invalid rating: {} is not finite", rating),
        });
    }

    Ok(Rating {
        user_id,
        movie_id,
        rating,
        timestamp,
    })
}

/// Parse one `movieId::title::genres` line
pub fn parse_movie_line(line: &str, line_no: usize) -> Result<Movie> {
    let mut parts = line.split("::");

    let id = parse_field(&mut parts, MOVIES_FILE, line_no, "movieId")?;
    let title = next_field(&mut parts, MOVIES_FILE, line_no, "title")?;
    let genres = next_field(&mut parts, MOVIES_FILE, line_no, "genres")?;

    Ok(Movie {
        id,
        title: title.to_string(),
        year: extract_year_from_title(title),
        genres: parse_genres(genres),
    })
}

fn next_field<'a>(
    parts: &mut Split<'a, &str>,
    file: &str,
    line: usize,
    name: &str,
) -> Result<&'a str> {
    parts.next().ok_or_else(|| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Missing {}", name),
    })
}

fn parse_field<T>(parts: &mut Split<'_, &str>, file: &str, line: usize, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = next_field(parts, file, line, name)?;
    raw.trim().parse().map_err(|e| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Invalid {}: {}", name, e),
    })
}

/// Extract year from movie title
///
/// Example: "Toy Story (1995)" -> Some(1995)
///          "Movie Title" -> None
fn extract_year_from_title(title: &str) -> Option<u16> {
    let start = title.rfind('(')?;
    let end = title.rfind(')')?;
    if start < end {
        return title[start + 1..end].parse::<u16>().ok();
    }
    None
}

/// Split pipe-separated genres, dropping the "(no genres listed)" marker.
fn parse_genres(s: &str) -> Vec<String> {
    s.split('|')
        .map(str::trim)
        .filter(|g| !g.is_empty() && *g != "(no genres listed)")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year_from_title("Toy Story (1995)"), Some(1995));
        assert_eq!(extract_year_from_title("Movie Title"), None);
        assert_eq!(extract_year_from_title("City of Lost Children, The (Cité des enfants perdus, La) (1995)"), Some(1995));
    }

    #[test]
    fn test_parse_rating_line() {
        let rating = parse_rating_line("1::1193::5::978300760", 1).unwrap();
        assert_eq!(rating.user_id, 1);
        assert_eq!(rating.movie_id, 1193);
        assert_eq!(rating.rating, 5.0);
        assert_eq!(rating.timestamp, 978300760);

        // Half-star scale
        let rating = parse_rating_line("7::32::3.5::1049784430", 1).unwrap();
        assert_eq!(rating.rating, 3.5);
    }

    #[test]
    fn test_parse_rating_line_errors() {
        let err = parse_rating_line("1::1193::5", 4).unwrap_err();
        assert!(matches!(err, DataLoadError::ParseError { line: 4, .. }));

        let err = parse_rating_line("1::abc::5::978300760", 2).unwrap_err();
        match err {
            DataLoadError::ParseError { reason, .. } => assert!(reason.contains("movieId")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ratings_skips_malformed_lines() {
        let content = "1::10::4::100\n\
                       garbage\n\
                       \n\
                       2::10::x::100\n\
                       2::11::3::101\n";
        let ratings = parse_ratings_str(content);
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].movie_id, 10);
        assert_eq!(ratings[1].movie_id, 11);
    }

    #[test]
    fn test_parse_ratings_skips_non_finite_values() {
        let content = "1::1::4::100\n\
                       1::2::nan::101\n\
                       1::3::inf::102\n\
                       2::1::3::103\n";
        let ratings = parse_ratings_str(content);
        assert_eq!(ratings.len(), 2);
        assert!(ratings.iter().all(|r| r.rating.is_finite()));
        assert_eq!((ratings[1].user_id, ratings[1].movie_id), (2, 1));

        let err = parse_rating_line("1::2::NaN::101", 7).unwrap_err();
        assert!(matches!(err, DataLoadError::ParseError { line: 7, .. }));
    }

    #[test]
    fn test_parse_movies_decodes_latin1() {
        let path = std::env::temp_dir().join(format!("movies-latin1-{}.dat", std::process::id()));
        std::fs::write(&path, b"1::Cit\xe9 (1995)::Drama\n").unwrap();

        let movies = parse_movies(&path);
        std::fs::remove_file(&path).unwrap();

        let movies = movies.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Cit\u{e9} (1995)");
        assert_eq!(movies[0].year, Some(1995));
    }

    #[test]
    fn test_parse_movie_line() {
        let movie = parse_movie_line("1::Toy Story (1995)::Animation|Children's|Comedy", 1).unwrap();
        assert_eq!(movie.id, 1);
        assert_eq!(movie.title, "Toy Story (1995)");
        assert_eq!(movie.year, Some(1995));
        assert_eq!(movie.genres, vec!["Animation", "Children's", "Comedy"]);

        let movie = parse_movie_line("8::Untitled::(no genres listed)", 1).unwrap();
        assert_eq!(movie.year, None);
        assert!(movie.genres.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = parse_ratings(Path::new("/definitely/not/here/ratings.dat")).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }
}
