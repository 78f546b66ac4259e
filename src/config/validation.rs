use crate::config::types::{
    Config, CrawlerConfig, InputConfig, OutputConfig, SiteConfig, StoreConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_input_config(&config.input)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    if let Some(store) = &config.store {
        validate_store_config(store)?;
    }
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = parse_http_url(&config.base_url, "base-url")?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }
    Ok(())
}

/// Validates the start mode and the filter values
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    match (config.start_urls.is_empty(), config.dataset_type.is_some()) {
        (true, false) => return Err(ConfigError::MissingStartMode),
        (false, true) => return Err(ConfigError::AmbiguousStartMode),
        _ => {}
    }

    for start_url in &config.start_urls {
        parse_http_url(start_url, "start URL")?;
    }

    if config.max_entries == Some(0) {
        return Err(ConfigError::Validation(
            "max-entries must be >= 1 when set".to_string(),
        ));
    }

    if config.last_n_days == Some(0) {
        return Err(ConfigError::Validation(
            "last-n-days must be >= 1 when set".to_string(),
        ));
    }

    if config.min_salary_period.is_some() && config.min_salary_value.is_none() {
        return Err(ConfigError::Validation(
            "min-salary-period requires min-salary-value".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.request_timeout_secs == 0 || config.listing_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "task timeouts must be >= 1 second".to_string(),
        ));
    }

    if config.page_size == 0 {
        return Err(ConfigError::Validation(
            "page-size must be >= 1".to_string(),
        ));
    }

    if config.max_requests_per_crawl == Some(0) {
        return Err(ConfigError::Validation(
            "max-requests-per-crawl must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.dataset_id.is_empty() || config.reporting_dataset_id.is_empty() {
        return Err(ConfigError::Validation(
            "dataset ids cannot be empty".to_string(),
        ));
    }

    if config.dataset_id == config.reporting_dataset_id {
        return Err(ConfigError::Validation(format!(
            "reporting-dataset-id must differ from dataset-id ('{}')",
            config.dataset_id
        )));
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    parse_http_url(&config.endpoint_url, "store endpoint-url")?;

    if config.hits_per_page < 1 || config.hits_per_page > 1000 {
        return Err(ConfigError::Validation(format!(
            "hits-per-page must be between 1 and 1000, got {}",
            config.hits_per_page
        )));
    }

    if config.dataset_id.is_empty() {
        return Err(ConfigError::Validation(
            "store dataset-id cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn parse_http_url(raw: &str, what: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, raw
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::DatasetType;

    fn input_with(start_urls: Vec<&str>, dataset_type: Option<DatasetType>) -> InputConfig {
        InputConfig {
            start_urls: start_urls.into_iter().map(String::from).collect(),
            dataset_type,
            ..InputConfig::default()
        }
    }

    #[test]
    fn test_start_mode_is_exclusive() {
        assert!(matches!(
            validate_input_config(&input_with(vec![], None)),
            Err(ConfigError::MissingStartMode)
        ));
        assert!(matches!(
            validate_input_config(&input_with(
                vec!["https://www.profesia.sk/praca/"],
                Some(DatasetType::JobOffers)
            )),
            Err(ConfigError::AmbiguousStartMode)
        ));
        assert!(validate_input_config(&input_with(vec![], Some(DatasetType::Partners))).is_ok());
        assert!(
            validate_input_config(&input_with(vec!["https://www.profesia.sk/praca/"], None))
                .is_ok()
        );
    }

    #[test]
    fn test_rejects_non_http_start_url() {
        let result = validate_input_config(&input_with(vec!["ftp://profesia.sk/"], None));
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_salary_period_requires_value() {
        let mut input = input_with(vec![], Some(DatasetType::JobOffers));
        input.min_salary_period = Some(crate::config::types::SalaryPeriod::Hour);
        assert!(validate_input_config(&input).is_err());

        input.min_salary_value = Some(5);
        assert!(validate_input_config(&input).is_ok());
    }

    #[test]
    fn test_crawler_limits() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.max_concurrency = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.max_concurrency = 4;
        config.page_size = 0;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_reporting_dataset_must_differ() {
        let output = OutputConfig {
            database_path: "./out.db".to_string(),
            dataset_id: "default".to_string(),
            reporting_dataset_id: "default".to_string(),
        };
        assert!(validate_output_config(&output).is_err());
    }
}
