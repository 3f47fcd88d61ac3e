use anyhow::{anyhow, Result};

use crate::config::{Config, RecommendationConfig};

/// Clamps a requested recommendation count to `max_count`. Zero is rejected.
pub fn validate_recommendation_count(count: usize, config: &RecommendationConfig) -> Result<usize> {
    if count == 0 {
        return Err(anyhow!("Number of recommendations must be greater than 0"));
    }
    Ok(count.min(config.max_count))
}

pub fn parse_user_id(input: &str) -> Result<usize> {
    let trimmed = input.trim();
    let user_id: usize = trimmed
        .parse()
        .map_err(|_| anyhow!("Invalid user ID: {:?}", trimmed))?;
    if user_id == 0 {
        return Err(anyhow!("User IDs start at 1"));
    }
    Ok(user_id)
}

pub fn validate_config(config: &Config) -> Result<()> {
    config.model.validate()?;

    let rec = &config.recommendation;
    if rec.max_count == 0 {
        return Err(anyhow!("recommendation.max_count must be greater than 0"));
    }
    if rec.page_size == 0 {
        return Err(anyhow!("recommendation.page_size must be greater than 0"));
    }
    if rec.default_count == 0 || rec.default_count > rec.max_count {
        return Err(anyhow!(
            "recommendation.default_count must be in 1..={}, got {}",
            rec.max_count,
            rec.default_count
        ));
    }
    if config.server.workers == 0 {
        return Err(anyhow!("server.workers must be greater than 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_recommendation_count() {
        let config = RecommendationConfig::default();
        assert_eq!(validate_recommendation_count(10, &config).unwrap(), 10);
        assert_eq!(validate_recommendation_count(500, &config).unwrap(), 100);
        assert!(validate_recommendation_count(0, &config).is_err());
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(" 42\n").unwrap(), 42);
        assert!(parse_user_id("0").is_err());
        assert!(parse_user_id("-3").is_err());
        assert!(parse_user_id("abc").is_err());
    }

    #[test]
    fn test_validate_config() {
        let mut config = Config::default();
        assert!(validate_config(&config).is_ok());

        config.recommendation.default_count = 200;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.model.n_factors = 0;
        assert!(validate_config(&config).is_err());
    }
}
