use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use svdrec::services::evaluation::Evaluator;
use svdrec::services::ingestion::{load_movie_titles, load_ratings, Dataset};
use svdrec::services::serving::{routes::create_router, ServingService};
use svdrec::*;
use tower::ServiceExt;

const TITLES: &str = "1,2003,Dinosaur Planet\n2,2004,Isle of Man TT 2004 Review\n3,1997,Character\n4,1994,Paula Abdul's Get Up & Dance\n5,2004,The Rise and Fall of ECW\n";

const RATINGS: &str = "\
1:
101,5,2005-09-06
102,4,2005-05-13
103,1,2005-10-19
2:
101,4,2005-12-26
104,1,2004-05-03
3:
102,2,2005-11-17
103,5,2004-08-05
104,4,2005-04-14
4:
101,1,2005-01-01
103,4,2005-02-02
5:
104,5,2005-03-03
";

fn dataset() -> Arc<Dataset> {
    let movies = load_movie_titles(TITLES.as_bytes()).unwrap();
    let ratings = load_ratings(RATINGS.as_bytes()).unwrap();
    Arc::new(Dataset::build(movies, ratings).unwrap())
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_concrete_scenario() {
    let matrix = Arc::new(InteractionMatrix::from_row_slice(2, 3, &[5.0, 0.0, 3.0, 0.0, 4.0, 0.0]).unwrap());
    let mut model = SvdModel::new(matrix, SvdParams::new(1, 0.1, 0.0, 0)).unwrap();
    model.train();

    let predictions = model.predict();
    assert_eq!(predictions.shape(), (2, 3));
    assert!(predictions.iter().all(|&v| v == 16.0));
    assert_eq!(model.predict(), predictions);

    let recs = model.recommend_movies(1, 5).unwrap();
    assert_eq!(recs, vec![Recommendation { item_id: 2, score: 16.0 }]);
}

#[tokio::test]
async fn test_train_evaluate_recommend_flow() {
    let dataset = dataset();
    assert_eq!(dataset.n_users(), 4);
    assert_eq!(dataset.n_movies(), 5);

    let params = SvdParams::new(3, 0.01, 0.1, 20_000).with_seed(2024);
    let mut model = SvdModel::new(Arc::clone(&dataset.matrix), params).unwrap();
    let before = Evaluator::new(&model).evaluate();
    let summary = model.train();
    let after = Evaluator::new(&model).evaluate();

    assert_eq!(summary.steps_run, 20_000);
    assert_eq!(after.observed, 11);
    assert!(after.rmse < before.rmse);
    assert!(after.mae < before.mae);
    assert!((after.rmse - summary.final_rmse).abs() < 1e-9);

    for user_id in 1..=dataset.n_users() {
        let rated = dataset.matrix.rated_items(user_id - 1).unwrap();
        let recs = model.recommend_movies(user_id, 100).unwrap();
        assert_eq!(recs.len(), dataset.n_movies() - rated.len());
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(recs.iter().all(|r| !rated.contains(&(r.item_id - 1))));
    }
}

#[tokio::test]
async fn test_parameters_from_config_file_format() {
    let config: Config = serde_json::from_str(
        r#"{"model": {"n_factors": 2, "learning_rate": 0.02, "regularization": 0.05, "n_epochs": 10, "seed": 1, "init": {"method": "uniform", "low": 0.5, "high": 1.5}}}"#,
    )
    .unwrap();
    assert_eq!(config.model.update_steps, 10);

    let model = SvdModel::new(dataset().matrix.clone(), config.model).unwrap();
    assert!(model.user_factors().iter().all(|&v| (0.5..1.5).contains(&v)));
    assert!(model.item_factors().iter().all(|&v| (0.5..1.5).contains(&v)));
}

fn router() -> axum::Router {
    let dataset = dataset();
    let params = SvdParams::new(2, 0.01, 0.1, 1_000).with_seed(5);
    let mut model = SvdModel::new(Arc::clone(&dataset.matrix), params).unwrap();
    model.train();
    let service = Arc::new(ServingService::new(
        model,
        dataset,
        svdrec::config::RecommendationConfig::default(),
    ));
    create_router(service)
}

#[tokio::test]
async fn test_http_recommendations() {
    let (status, body) = get_json(router(), "/recommendations/1?count=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["source_user_id"], 101);

    let recs = body["data"]["recommendations"].as_array().unwrap();
    // user 101 rated movies 1, 2 and 4
    assert_eq!(recs.len(), 2);
    let ids: Vec<u64> = recs.iter().map(|r| r["movie_id"].as_u64().unwrap()).collect();
    assert!(ids.contains(&3) && ids.contains(&5));
    assert!(recs.iter().all(|r| r["title"] != "Unknown Movie"));
}

#[tokio::test]
async fn test_http_unknown_user_is_not_found() {
    let (status, body) = get_json(router(), "/recommendations/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Enter a valid user ID");
}

#[tokio::test]
async fn test_http_zero_count_is_bad_request() {
    let app = router();
    let (status, body) = get_json(app.clone(), "/recommendations/1?count=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = get_json(app, "/stats").await;
    assert_eq!(body["data"]["total_requests"], 1);
    assert_eq!(body["data"]["failed_requests"], 1);
}

#[tokio::test]
async fn test_http_health_and_stats() {
    let app = router();
    let (status, body) = get_json(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");

    let _ = get_json(app.clone(), "/recommendations/2").await;
    let (status, body) = get_json(app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_requests"], 1);
    assert_eq!(body["data"]["successful_requests"], 1);
}

#[tokio::test]
async fn test_http_train() {
    let response = router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/train")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["steps_run"], 1_000);
}
