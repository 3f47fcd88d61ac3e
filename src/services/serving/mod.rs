pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::algorithms::{SvdModel, TrainingSummary};
use crate::config::RecommendationConfig;
use crate::models::{RecommendationItem, RecommendationResponse};
use crate::services::ingestion::Dataset;
use crate::utils::validation::validate_recommendation_count;

/// The model sits behind a `RwLock`: any number of requests read it
/// concurrently, and `retrain` is the only writer.
pub struct ServingService {
    model: Arc<RwLock<SvdModel>>,
    dataset: Arc<Dataset>,
    config: RecommendationConfig,
    serving_stats: Arc<DashMap<String, u64>>,
}

impl ServingService {
    pub fn new(model: SvdModel, dataset: Arc<Dataset>, config: RecommendationConfig) -> Self {
        Self {
            model: Arc::new(RwLock::new(model)),
            dataset,
            config,
            serving_stats: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Ranked unseen movies for the 1-based `user_id`, at most `max_count` of them.
    pub async fn recommend(&self, user_id: usize, count: usize) -> Result<RecommendationResponse> {
        self.increment_stat("total_requests");
        let start_time = Instant::now();

        let count = match validate_recommendation_count(count, &self.config) {
            Ok(count) => count,
            Err(e) => {
                self.increment_stat("failed_requests");
                return Err(e);
            }
        };
        let ranked = {
            let model = self.model.read().await;
            model.recommend_movies(user_id, count)
        };
        let ranked = match ranked {
            Ok(ranked) => ranked,
            Err(e) => {
                self.increment_stat("failed_requests");
                return Err(e.into());
            }
        };

        let recommendations = ranked
            .into_iter()
            .map(|rec| RecommendationItem {
                item_id: rec.item_id,
                movie_id: self.dataset.movie_for_item(rec.item_id),
                title: self.dataset.title_for_item(rec.item_id).to_string(),
                score: rec.score,
            })
            .collect();

        self.increment_stat("successful_requests");
        info!(
            "Served {} recommendations for user {} in {}ms",
            count,
            user_id,
            start_time.elapsed().as_millis()
        );

        Ok(RecommendationResponse {
            user_id,
            source_user_id: self.dataset.source_user(user_id),
            recommendations,
            has_more: count < self.config.max_count,
            generated_at: Utc::now(),
        })
    }

    pub async fn expand(&self, user_id: usize, current: usize) -> Result<RecommendationResponse> {
        let next = current.saturating_add(self.config.page_size).min(self.config.max_count);
        self.recommend(user_id, next).await
    }

    /// Holds the write lock for the whole pass; requests wait until it ends.
    pub async fn retrain(&self) -> Result<TrainingSummary> {
        let mut model = Arc::clone(&self.model).write_owned().await;
        let summary = tokio::task::spawn_blocking(move || model.train())
            .await
            .context("training task failed")?;
        self.increment_stat("training_runs");
        Ok(summary)
    }

    pub fn stats(&self) -> HashMap<String, u64> {
        self.serving_stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    fn increment_stat(&self, key: &str) {
        *self.serving_stats.entry(key.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::SvdParams;
    use crate::models::{Movie, Rating};

    fn service() -> ServingService {
        let movies = vec![
            Movie { movie_id: 10, year: Some(2001), title: "Ten".to_string() },
            Movie { movie_id: 20, year: None, title: "Twenty".to_string() },
        ];
        let rating = |movie_id, user_id, rating| Rating { movie_id, user_id, rating, date: None };
        let ratings = vec![rating(10, 7, 5), rating(30, 7, 3), rating(20, 8, 4)];
        let dataset = Arc::new(Dataset::build(movies, ratings).unwrap());
        let model = SvdModel::new(Arc::clone(&dataset.matrix), SvdParams::new(1, 0.1, 0.0, 0)).unwrap();
        ServingService::new(model, dataset, RecommendationConfig::default())
    }

    #[tokio::test]
    async fn test_recommend_resolves_titles() {
        let service = service();
        let response = service.recommend(1, 10).await.unwrap();
        assert_eq!(response.user_id, 1);
        assert_eq!(response.source_user_id, Some(7));
        assert_eq!(response.recommendations.len(), 1);
        let item = &response.recommendations[0];
        assert_eq!(item.item_id, 3);
        assert_eq!(item.movie_id, Some(20));
        assert_eq!(item.title, "Twenty");
        assert_eq!(item.score, 16.0);
        assert!(response.has_more);
    }

    #[tokio::test]
    async fn test_missing_titles_fall_back() {
        let response = service().recommend(2, 10).await.unwrap();
        let titles: Vec<_> = response.recommendations.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Ten", "Unknown Movie"]);
    }

    #[tokio::test]
    async fn test_expand_caps_at_max_count() {
        let service = service();
        let response = service.expand(1, 95).await.unwrap();
        assert!(!response.has_more);
        let response = service.expand(1, 10).await.unwrap();
        assert!(response.has_more);
    }

    #[tokio::test]
    async fn test_unknown_user_counts_as_failure() {
        let service = service();
        assert!(service.recommend(3, 10).await.is_err());
        assert!(service.recommend(1, 0).await.is_err());
        assert!(service.recommend(1, 10).await.is_ok());
        let stats = service.stats();
        assert_eq!(stats.get("total_requests"), Some(&3));
        assert_eq!(stats.get("failed_requests"), Some(&2));
        assert_eq!(stats.get("successful_requests"), Some(&1));
    }

    #[tokio::test]
    async fn test_retrain_with_zero_steps_keeps_predictions() {
        let service = service();
        let before = service.recommend(1, 10).await.unwrap().recommendations[0].score;
        let summary = service.retrain().await.unwrap();
        assert_eq!(summary.steps_run, 0);
        let after = service.recommend(1, 10).await.unwrap().recommendations[0].score;
        assert_eq!(before, after);
        assert_eq!(service.stats().get("training_runs"), Some(&1));
    }
}
