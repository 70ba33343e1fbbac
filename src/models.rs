use sea_orm::Set;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::{
    entities::movie,
    error::{AppError, AppResult},
};

pub const PAGE_SIZE: u64 = 5;
pub const MAX_TEXT_LEN: usize = 255;

/// Body of `POST /movies/` and `PUT /movies/{id}`.
///
/// Absent keys deserialize to `None`, which is what gives PUT its full-replace
/// behaviour. Keys outside the movie columns are rejected.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoviePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub trailer: Option<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub genre_id: Option<i32>,
    pub director_id: Option<i32>,
}

impl MoviePayload {
    pub fn validate(&self) -> AppResult<()> {
        let texts = [
            ("title", &self.title),
            ("description", &self.description),
            ("trailer", &self.trailer),
        ];
        for (field, value) in texts {
            check_text_len(field, value.as_deref())?;
        }
        Ok(())
    }

    pub fn into_active_model(self) -> movie::ActiveModel {
        let mut model = movie::ActiveModel::default();
        self.overwrite(&mut model);
        model
    }

    /// Sets every column from the payload, nulling the ones it leaves out.
    pub fn overwrite(self, model: &mut movie::ActiveModel) {
        model.title = Set(self.title);
        model.description = Set(self.description);
        model.trailer = Set(self.trailer);
        model.year = Set(self.year);
        model.rating = Set(self.rating);
        model.genre_id = Set(self.genre_id);
        model.director_id = Set(self.director_id);
    }
}

/// Body of `PUT /movies/{id}`. Reads the movie columns and ignores every other
/// key, so a body fetched with GET (including its `id`) can be sent back as is.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieReplacement {
    pub title: Option<String>,
    pub description: Option<String>,
    pub trailer: Option<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub genre_id: Option<i32>,
    pub director_id: Option<i32>,
}

impl From<MovieReplacement> for MoviePayload {
    fn from(r: MovieReplacement) -> Self {
        Self {
            title: r.title,
            description: r.description,
            trailer: r.trailer,
            year: r.year,
            rating: r.rating,
            genre_id: r.genre_id,
            director_id: r.director_id,
        }
    }
}

pub fn check_text_len(field: &str, value: Option<&str>) -> AppResult<()> {
    match value {
        Some(v) if v.chars().count() > MAX_TEXT_LEN => Err(AppError::Validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieListQuery {
    page: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub director_id: Option<i32>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub genre_id: Option<i32>,
}

/// `?genre_id=` with no value leaves the filter off.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(de::Error::custom),
    }
}

impl MovieListQuery {
    /// One-based page number. Missing, unparsable and non-positive values mean the first page.
    pub fn page(&self) -> u64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Created {
    pub id: i32,
}
