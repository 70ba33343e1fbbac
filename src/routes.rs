use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
};
use axum_extra::extract::WithRejection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    catalog::MovieFilter,
    entities::{director, genre, movie},
    error::{AppError, AppResult},
    legacy,
    models::{Created, MovieListQuery, MoviePayload, MovieReplacement},
};

type IdPath = WithRejection<Path<i32>, AppError>;

pub fn router(state: Arc<AppState>) -> Router {
    let legacy_responses = state.config.legacy_responses;

    let app = Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/", get(list_movies).post(create_movie))
        .route("/movies/{id}", get(get_movie).put(replace_movie).delete(delete_movie))
        .route("/directors", get(list_directors))
        .route("/directors/", get(list_directors))
        .route("/directors/{id}", get(get_director))
        .route("/genres", get(list_genres))
        .route("/genres/", get(list_genres))
        .route("/genres/{id}", get(get_genre))
        .fallback(unknown_route)
        .with_state(state);

    let app = if legacy_responses {
        app.layer(middleware::from_fn(legacy::original_shapes))
    } else {
        app
    };

    app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<MovieListQuery>, AppError>,
) -> AppResult<Json<Vec<movie::Model>>> {
    let filter = MovieFilter { director_id: query.director_id, genre_id: query.genre_id };
    let movies = state.catalog.list_movies(filter, query.page()).await?;
    Ok(Json(movies))
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<MoviePayload>, AppError>,
) -> AppResult<(StatusCode, Json<Created>)> {
    let movie = state.catalog.create_movie(payload).await?;
    Ok((StatusCode::CREATED, Json(Created { id: movie.id })))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(id), _): IdPath,
) -> AppResult<Json<movie::Model>> {
    Ok(Json(state.catalog.get_movie(id).await?))
}

pub async fn replace_movie(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(body), _): WithRejection<Json<MovieReplacement>, AppError>,
) -> AppResult<StatusCode> {
    state.catalog.replace_movie(id, body.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(id), _): IdPath,
) -> AppResult<StatusCode> {
    state.catalog.delete_movie(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_directors(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<director::Model>>> {
    Ok(Json(state.catalog.list_directors().await?))
}

pub async fn get_director(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(id), _): IdPath,
) -> AppResult<Json<director::Model>> {
    Ok(Json(state.catalog.get_director(id).await?))
}

pub async fn list_genres(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<genre::Model>>> {
    Ok(Json(state.catalog.list_genres().await?))
}

pub async fn get_genre(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(id), _): IdPath,
) -> AppResult<Json<genre::Model>> {
    Ok(Json(state.catalog.get_genre(id).await?))
}

async fn unknown_route() -> AppError {
    AppError::NotFound("route".to_string())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, Bytes},
        http::{Method, Request, header::CONTENT_TYPE},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        catalog::Catalog,
        config::Config,
        db,
        seed::{self, Fixture, NamedRow},
    };

    async fn app(legacy_responses: bool) -> Router {
        let db = db::memory().await;
        let fixture = Fixture {
            genres: vec![NamedRow::new(1, "Western"), NamedRow::new(2, "Noir")],
            directors: vec![NamedRow::new(1, "Sergio Leone")],
            movies: vec![],
        };
        seed::apply(&db, fixture).await.unwrap();

        let config = Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            seed_file: None,
            legacy_responses,
        };
        router(Arc::new(AppState { config: Arc::new(config), catalog: Catalog::new(db) }))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes)
    }

    async fn send_json(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn create(app: &Router, body: Value) -> i64 {
        let (status, created) = send_json(app, Method::POST, "/movies/", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        created["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn create_then_get_returns_every_column() {
        let app = app(false).await;
        let id = create(&app, json!({"title": "Alpha", "year": 2020, "rating": 7.5})).await;

        let (status, body) = send_json(&app, Method::GET, &format!("/movies/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "id": id,
                "title": "Alpha",
                "description": null,
                "trailer": null,
                "year": 2020,
                "rating": 7.5,
                "genre_id": null,
                "director_id": null
            })
        );
    }

    #[tokio::test]
    async fn create_rejects_unknown_and_mistyped_fields() {
        let app = app(false).await;

        let (status, body) =
            send_json(&app, Method::POST, "/movies/", Some(json!({"title": "A", "studio": "B"})))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("studio"));

        let (status, _) =
            send_json(&app, Method::POST, "/movies/", Some(json!({"year": "nineteen"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send_json(&app, Method::POST, "/movies/", Some(json!({"genre_id": 77}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = send_json(&app, Method::GET, "/movies/", None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn unknown_ids_are_404() {
        let app = app(false).await;
        for uri in ["/movies/999", "/directors/999", "/genres/999", "/movies/abc"] {
            let (status, body) = send_json(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"], "not_found");
        }

        let (status, _) = send(&app, Method::GET, "/actors/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_replaces_the_whole_row() {
        let app = app(false).await;
        let id = create(
            &app,
            json!({"title": "Draft", "description": "wip", "year": 1966, "genre_id": 1, "director_id": 1}),
        )
        .await;
        let uri = format!("/movies/{id}");

        let (status, bytes) =
            send(&app, Method::PUT, &uri, Some(json!({"title": "Final", "rating": 8.8}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(bytes.is_empty());

        let (_, body) = send_json(&app, Method::GET, &uri, None).await;
        assert_eq!(body["title"], "Final");
        assert_eq!(body["rating"], 8.8);
        assert_eq!(body["description"], Value::Null);
        assert_eq!(body["year"], Value::Null);
        assert_eq!(body["genre_id"], Value::Null);
        assert_eq!(body["director_id"], Value::Null);
    }

    #[tokio::test]
    async fn put_accepts_a_body_read_back_from_get() {
        for legacy in [false, true] {
            let app = app(legacy).await;
            let (status, _) =
                send(&app, Method::POST, "/movies/", Some(json!({"title": "a"}))).await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, _) = send(
                &app,
                Method::PUT,
                "/movies/1",
                Some(json!({"id": 1, "title": "b", "poster": "ignored.png"})),
            )
            .await;
            assert_eq!(status, StatusCode::NO_CONTENT, "legacy = {legacy}");
        }

        let app = app(false).await;
        let id = create(&app, json!({"title": "Round trip", "year": 2001, "genre_id": 2})).await;
        let uri = format!("/movies/{id}");
        let (_, mut body) = send_json(&app, Method::GET, &uri, None).await;
        body["rating"] = json!(9.1);

        let (status, _) = send(&app, Method::PUT, &uri, Some(body.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, after) = send_json(&app, Method::GET, &uri, None).await;
        assert_eq!(after, body);
    }

    #[tokio::test]
    async fn listing_beyond_any_offset_is_empty() {
        let app = app(false).await;
        create(&app, json!({"title": "Lonely"})).await;

        for page in ["18446744073709551615", "9223372036854775807", "2000000000000000000"] {
            let (status, body) =
                send_json(&app, Method::GET, &format!("/movies/?page={page}"), None).await;
            assert_eq!(status, StatusCode::OK, "page {page}");
            assert_eq!(body, json!([]));
        }
    }

    #[tokio::test]
    async fn blank_filter_lists_everything() {
        let app = app(false).await;
        create(&app, json!({"title": "A", "director_id": 1})).await;
        create(&app, json!({"title": "B"})).await;

        let (status, body) =
            send_json(&app, Method::GET, "/movies/?director_id=&genre_id=", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn put_and_delete_on_missing_movie_are_404() {
        let app = app(false).await;
        let (status, _) = send(&app, Method::PUT, "/movies/5", Some(json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, "/movies/5", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_the_movie() {
        let app = app(false).await;
        let id = create(&app, json!({"title": "Short-lived"})).await;
        let uri = format!("/movies/{id}");

        let (status, bytes) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(bytes.is_empty());

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listing_pages_by_five() {
        let app = app(false).await;
        for n in 0..12 {
            create(&app, json!({"title": format!("Reel {n}")})).await;
        }

        let mut ids = Vec::new();
        for (page, expected) in [(1, 5), (2, 5), (3, 2), (4, 0)] {
            let (status, body) =
                send_json(&app, Method::GET, &format!("/movies/?page={page}"), None).await;
            assert_eq!(status, StatusCode::OK);
            let movies = body.as_array().unwrap();
            assert_eq!(movies.len(), expected, "page {page}");
            ids.extend(movies.iter().map(|m| m["id"].as_i64().unwrap()));
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 12);

        let (_, body) = send_json(&app, Method::GET, "/movies?page=abc", None).await;
        assert_eq!(body.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn listing_filters_by_genre_and_director() {
        let app = app(false).await;
        create(&app, json!({"title": "A", "genre_id": 1, "director_id": 1})).await;
        create(&app, json!({"title": "B", "genre_id": 2})).await;
        create(&app, json!({"title": "C", "genre_id": 1})).await;
        create(&app, json!({"title": "D"})).await;

        let (_, body) = send_json(&app, Method::GET, "/movies/?genre_id=1", None).await;
        let titles: Vec<_> = body.as_array().unwrap().iter().map(|m| m["title"].clone()).collect();
        assert_eq!(titles, vec![json!("A"), json!("C")]);

        let (_, body) =
            send_json(&app, Method::GET, "/movies/?genre_id=1&director_id=1", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send_json(&app, Method::GET, "/movies/", None).await;
        assert_eq!(body.as_array().unwrap().len(), 4);

        let (status, _) = send(&app, Method::GET, "/movies/?genre_id=drama", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn directors_and_genres_are_readable() {
        let app = app(false).await;

        let (status, body) = send_json(&app, Method::GET, "/directors/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"id": 1, "name": "Sergio Leone"}]));

        let (_, body) = send_json(&app, Method::GET, "/directors/1", None).await;
        assert_eq!(body, json!({"id": 1, "name": "Sergio Leone"}));

        let (_, body) = send_json(&app, Method::GET, "/genres", None).await;
        assert_eq!(body, json!([{"id": 1, "name": "Western"}, {"id": 2, "name": "Noir"}]));

        let (_, body) = send_json(&app, Method::GET, "/genres/2", None).await;
        assert_eq!(body["name"], "Noir");
    }

    #[tokio::test]
    async fn legacy_mode_reproduces_original_shapes() {
        let app = app(true).await;

        let (status, bytes) =
            send(&app, Method::POST, "/movies/", Some(json!({"title": "Old School"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(bytes.is_empty());

        let (status, body) = send_json(&app, Method::GET, "/movies/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[1], 200);
        let id = body[0][0]["id"].as_i64().unwrap();
        assert_eq!(body[0][0]["title"], "Old School");

        let (_, body) = send_json(&app, Method::GET, &format!("/movies/{id}"), None).await;
        assert_eq!(body, json!([{
            "id": id,
            "title": "Old School",
            "description": null,
            "trailer": null,
            "year": null,
            "rating": null,
            "genre_id": null,
            "director_id": null
        }, 200]));

        let (status, body) = send_json(&app, Method::GET, "/genres/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!("404"));

        let (status, body) =
            send_json(&app, Method::POST, "/movies/", Some(json!({"bogus": true}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }
}
