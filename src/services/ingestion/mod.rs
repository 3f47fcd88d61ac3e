//! Builds the interaction matrix from Netflix-prize style text files.
//!
//! `movie_titles.csv` holds `movie_id,year,title` lines in ISO-8859-1.
//! Rating files are blocks introduced by a `movie_id:` line followed by
//! `user_id,rating,YYYY-MM-DD` lines.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use nalgebra::DMatrix;
use tracing::{info, warn};

use crate::config::DataConfig;
use crate::models::{InteractionMatrix, Movie, Rating};
use crate::utils::decode_latin1;

pub const UNKNOWN_TITLE: &str = "Unknown Movie";

pub fn load_movie_titles<R: BufRead>(mut reader: R) -> Result<Vec<Movie>> {
    let mut movies = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = decode_latin1(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let movie = parse_movie_line(line).with_context(|| format!("movie titles line {line_no}"))?;
        movies.push(movie);
    }

    info!("Loaded {} movies", movies.len());
    Ok(movies)
}

fn parse_movie_line(line: &str) -> Result<Movie> {
    let mut parts = line.splitn(3, ',');
    let (Some(id), Some(year), Some(title)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("expected `movie_id,year,title`, got {line:?}");
    };
    let movie_id = id
        .trim()
        .parse()
        .with_context(|| format!("invalid movie id {id:?}"))?;
    let year = match year.trim() {
        "" | "NULL" => None,
        y => Some(y.parse().with_context(|| format!("invalid year {y:?}"))?),
    };
    Ok(Movie {
        movie_id,
        year,
        title: title.trim().to_string(),
    })
}

pub fn load_ratings<R: BufRead>(reader: R) -> Result<Vec<Rating>> {
    let mut ratings = Vec::new();
    let mut current_movie: Option<u32> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("ratings line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(id) = line.strip_suffix(':') {
            let movie_id = id
                .trim()
                .parse()
                .with_context(|| format!("ratings line {line_no}: invalid movie id {id:?}"))?;
            current_movie = Some(movie_id);
            continue;
        }

        let movie_id = current_movie
            .ok_or_else(|| anyhow!("ratings line {line_no}: rating before any `movie_id:` header"))?;
        let rating =
            parse_rating_line(movie_id, line).with_context(|| format!("ratings line {line_no}"))?;
        if rating.rating == 0 {
            warn!("Skipping zero rating on line {} (zero means unrated)", line_no);
            continue;
        }
        ratings.push(rating);
    }

    info!("Loaded {} ratings", ratings.len());
    Ok(ratings)
}

fn parse_rating_line(movie_id: u32, line: &str) -> Result<Rating> {
    let mut parts = line.split(',');
    let (Some(user), Some(value)) = (parts.next(), parts.next()) else {
        bail!("expected `user_id,rating,date`, got {line:?}");
    };
    let date = match parts.next().map(str::trim) {
        None | Some("") => None,
        Some(d) => Some(
            NaiveDate::parse_from_str(d, "%Y-%m-%d").with_context(|| format!("invalid date {d:?}"))?,
        ),
    };
    Ok(Rating {
        movie_id,
        user_id: user
            .trim()
            .parse()
            .with_context(|| format!("invalid user id {user:?}"))?,
        rating: value
            .trim()
            .parse()
            .with_context(|| format!("invalid rating {value:?}"))?,
        date,
    })
}

/// Rows follow the order in which users first appear in the ratings; columns
/// the order in which movies first appear.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub movies: Vec<Movie>,
    pub ratings: Vec<Rating>,
    pub matrix: Arc<InteractionMatrix>,
    user_ids: Vec<u32>,
    movie_ids: Vec<u32>,
    titles: HashMap<u32, String>,
}

impl Dataset {
    pub fn build(movies: Vec<Movie>, ratings: Vec<Rating>) -> Result<Self> {
        let mut user_ids = Vec::new();
        let mut movie_ids = Vec::new();
        let mut user_rows = HashMap::new();
        let mut movie_cols = HashMap::new();

        for rating in &ratings {
            user_rows.entry(rating.user_id).or_insert_with(|| {
                user_ids.push(rating.user_id);
                user_ids.len() - 1
            });
            movie_cols.entry(rating.movie_id).or_insert_with(|| {
                movie_ids.push(rating.movie_id);
                movie_ids.len() - 1
            });
        }

        let mut values = DMatrix::zeros(user_ids.len(), movie_ids.len());
        for rating in &ratings {
            values[(user_rows[&rating.user_id], movie_cols[&rating.movie_id])] = f64::from(rating.rating);
        }
        let matrix = InteractionMatrix::new(values).context("building interaction matrix")?;
        info!(
            "Built {}x{} interaction matrix",
            matrix.n_users(),
            matrix.n_items()
        );

        let titles = movies
            .iter()
            .map(|m| (m.movie_id, m.title.clone()))
            .collect();

        Ok(Self {
            movies,
            ratings,
            matrix: Arc::new(matrix),
            user_ids,
            movie_ids,
            titles,
        })
    }

    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn n_movies(&self) -> usize {
        self.movie_ids.len()
    }

    pub fn movie_for_item(&self, item_id: usize) -> Option<u32> {
        item_id
            .checked_sub(1)
            .and_then(|col| self.movie_ids.get(col))
            .copied()
    }

    /// Source user id for a 1-based user id.
    pub fn source_user(&self, user_id: usize) -> Option<u32> {
        user_id
            .checked_sub(1)
            .and_then(|row| self.user_ids.get(row))
            .copied()
    }

    pub fn title_for_item(&self, item_id: usize) -> &str {
        self.movie_for_item(item_id)
            .and_then(|movie_id| self.titles.get(&movie_id))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TITLE)
    }
}

pub struct DataLoader;

impl DataLoader {
    pub fn from_config(config: &DataConfig) -> Result<Dataset> {
        let movies = load_movie_titles(open(&config.movie_titles_path)?)?;
        let ratings = load_ratings(open(&config.ratings_path)?)?;
        Dataset::build(movies, ratings)
    }
}

fn open(path: impl AsRef<Path>) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}
