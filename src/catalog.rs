use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QueryTrait, TransactionTrait,
};
use tracing::{debug, info};

use crate::{
    entities::{director, genre, movie},
    error::{AppError, AppResult},
    models::{MoviePayload, PAGE_SIZE},
};

/// Optional equality filters for the movie listing. `None` leaves the column unconstrained.
#[derive(Clone, Copy, Debug, Default)]
pub struct MovieFilter {
    pub director_id: Option<i32>,
    pub genre_id: Option<i32>,
}

#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
}

impl Catalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// One page of movies, ordered by id. Pages past the end come back empty.
    pub async fn list_movies(&self, filter: MovieFilter, page: u64) -> AppResult<Vec<movie::Model>> {
        debug!(
            director_id = ?filter.director_id,
            genre_id = ?filter.genre_id,
            page,
            "listing movies"
        );

        // Offsets past i64::MAX cannot be expressed by the store; nothing lives there.
        let offset_page = page.saturating_sub(1);
        if offset_page > i64::MAX as u64 / PAGE_SIZE {
            return Ok(Vec::new());
        }

        let movies = movie::Entity::find()
            .apply_if(filter.director_id, |q, id| q.filter(movie::Column::DirectorId.eq(id)))
            .apply_if(filter.genre_id, |q, id| q.filter(movie::Column::GenreId.eq(id)))
            .order_by_asc(movie::Column::Id)
            .paginate(&self.db, PAGE_SIZE)
            .fetch_page(offset_page)
            .await?;

        Ok(movies)
    }

    pub async fn get_movie(&self, id: i32) -> AppResult<movie::Model> {
        movie::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {id}")))
    }

    pub async fn create_movie(&self, payload: MoviePayload) -> AppResult<movie::Model> {
        payload.validate()?;

        let txn = self.db.begin().await?;
        let movie = payload.into_active_model().insert(&txn).await?;
        txn.commit().await?;

        info!(id = movie.id, "movie created");
        Ok(movie)
    }

    /// Full replace: columns missing from `payload` become null.
    pub async fn replace_movie(&self, id: i32, payload: MoviePayload) -> AppResult<movie::Model> {
        payload.validate()?;

        let txn = self.db.begin().await?;
        let Some(existing) = movie::Entity::find_by_id(id).one(&txn).await? else {
            return Err(AppError::NotFound(format!("movie {id}")));
        };

        let mut model = existing.into_active_model();
        payload.overwrite(&mut model);
        let movie = model.update(&txn).await?;
        txn.commit().await?;

        info!(id, "movie replaced");
        Ok(movie)
    }

    pub async fn delete_movie(&self, id: i32) -> AppResult<()> {
        let txn = self.db.begin().await?;
        let res = movie::Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound(format!("movie {id}")));
        }
        txn.commit().await?;

        info!(id, "movie deleted");
        Ok(())
    }

    pub async fn list_directors(&self) -> AppResult<Vec<director::Model>> {
        let directors =
            director::Entity::find().order_by_asc(director::Column::Id).all(&self.db).await?;
        Ok(directors)
    }

    pub async fn get_director(&self, id: i32) -> AppResult<director::Model> {
        director::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("director {id}")))
    }

    pub async fn list_genres(&self) -> AppResult<Vec<genre::Model>> {
        let genres = genre::Entity::find().order_by_asc(genre::Column::Id).all(&self.db).await?;
        Ok(genres)
    }

    pub async fn get_genre(&self, id: i32) -> AppResult<genre::Model> {
        genre::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("genre {id}")))
    }
}
