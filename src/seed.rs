//! Startup fixtures. Directors and genres cannot be created over HTTP, so a
//! deployment loads them (and optionally some movies) from a JSON file.

use std::path::Path;

use anyhow::Context;
use sea_orm::{
    ActiveValue::NotSet, DatabaseConnection, EntityTrait, Set, TransactionTrait,
    sea_query::OnConflict,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    entities::{director, genre, movie},
    error::AppResult,
    models::{MoviePayload, check_text_len},
};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub genres: Vec<NamedRow>,
    #[serde(default)]
    pub directors: Vec<NamedRow>,
    #[serde(default)]
    pub movies: Vec<MovieRow>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedRow {
    pub id: i32,
    pub name: Option<String>,
}

#[cfg(test)]
impl NamedRow {
    pub fn new(id: i32, name: &str) -> Self {
        Self { id, name: Some(name.to_string()) }
    }
}

/// A movie row; without an `id` it is inserted on every run.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieRow {
    pub id: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub trailer: Option<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub genre_id: Option<i32>,
    pub director_id: Option<i32>,
}

impl MovieRow {
    fn into_active_model(self) -> AppResult<movie::ActiveModel> {
        let payload = MoviePayload {
            title: self.title,
            description: self.description,
            trailer: self.trailer,
            year: self.year,
            rating: self.rating,
            genre_id: self.genre_id,
            director_id: self.director_id,
        };
        payload.validate()?;
        let mut model = payload.into_active_model();
        model.id = self.id.map_or(NotSet, Set);
        Ok(model)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub genres: u64,
    pub directors: u64,
    pub movies: u64,
}

pub async fn load_file(db: &DatabaseConnection, path: &Path) -> AppResult<SeedSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    apply(db, fixture).await
}

/// Inserts the fixture in one transaction. Rows whose id already exists are skipped.
pub async fn apply(db: &DatabaseConnection, fixture: Fixture) -> AppResult<SeedSummary> {
    let mut summary = SeedSummary::default();
    let txn = db.begin().await?;

    for row in fixture.genres {
        check_text_len("genre name", row.name.as_deref())?;
        let model = genre::ActiveModel { id: Set(row.id), name: Set(row.name) };
        summary.genres += genre::Entity::insert(model)
            .on_conflict(OnConflict::column(genre::Column::Id).do_nothing().to_owned())
            .exec_without_returning(&txn)
            .await?;
    }

    for row in fixture.directors {
        check_text_len("director name", row.name.as_deref())?;
        let model = director::ActiveModel { id: Set(row.id), name: Set(row.name) };
        summary.directors += director::Entity::insert(model)
            .on_conflict(OnConflict::column(director::Column::Id).do_nothing().to_owned())
            .exec_without_returning(&txn)
            .await?;
    }

    for row in fixture.movies {
        summary.movies += movie::Entity::insert(row.into_active_model()?)
            .on_conflict(OnConflict::column(movie::Column::Id).do_nothing().to_owned())
            .exec_without_returning(&txn)
            .await?;
    }

    txn.commit().await?;
    info!(
        genres = summary.genres,
        directors = summary.directors,
        movies = summary.movies,
        "seed applied"
    );
    Ok(summary)
}
