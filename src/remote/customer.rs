use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::domain::customer::{Customer, CustomerDirectory, CustomerLookupError, NationalId};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

/// Customer directory over HTTP: `GET {root}/customer/{cpf}`.
pub struct HttpCustomerDirectory {
    client: reqwest::Client,
    root_url: String,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

impl HttpCustomerDirectory {
    pub fn new(root_url: impl Into<String>, timeout: Duration) -> Result<Self, CustomerLookupError> {
        Self::with_breaker(root_url, timeout, CircuitBreakerConfig::default())
    }

    pub fn with_breaker(
        root_url: impl Into<String>,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Result<Self, CustomerLookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let root_url: String = root_url.into();

        Ok(Self {
            client,
            root_url: root_url.trim_end_matches('/').to_string(),
            circuit_breaker: CircuitBreaker::new("customer_directory", breaker),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    fn endpoint(&self, national_id: &str) -> String {
        format!("{}/customer/{}", self.root_url, national_id)
    }

    /// A 404 is an answer, not a failure: it yields `Ok(None)` so it does not
    /// count against the circuit breaker.
    async fn fetch(&self, url: &str) -> Result<Option<Customer>, CustomerLookupError> {
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Customer>().await?)),
            status => Err(CustomerLookupError::Status(status.as_u16())),
        }
    }
}

#[async_trait]
impl CustomerDirectory for HttpCustomerDirectory {
    async fn lookup_by_national_id(&self, national_id: &str) -> Result<Customer, CustomerLookupError> {
        let url = self.endpoint(national_id);
        let result = self.circuit_breaker.call(self.fetch(&url)).await;

        if let Some(metrics) = &self.metrics {
            metrics.update_circuit_breaker_state(self.circuit_breaker.state());
        }

        match result {
            Ok(Some(customer)) => {
                tracing::debug!(national_id = %NationalId(national_id), "Customer resolved");
                Ok(customer)
            }
            Ok(None) => Err(CustomerLookupError::NotFound),
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::warn!("Circuit breaker open - customer directory unavailable");
                Err(CustomerLookupError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::warn!(error = %e, national_id = %NationalId(national_id), "Customer lookup failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn directory(server: &MockServer) -> HttpCustomerDirectory {
        HttpCustomerDirectory::with_breaker(
            format!("{}/api/", server.uri()),
            Duration::from_secs(2),
            CircuitBreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_secs(60),
                success_threshold: 1,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/customer/12345678900"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1,
                "name": "João",
                "cpf": "12345678900",
                "email": "joao@example.com"
            })))
            .mount(&server)
            .await;

        let customer = directory(&server)
            .await
            .lookup_by_national_id("12345678900")
            .await
            .unwrap();
        assert_eq!(customer.name, "João");
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let directory = directory(&server).await;
        for _ in 0..3 {
            assert!(matches!(
                directory.lookup_by_national_id("000").await,
                Err(CustomerLookupError::NotFound)
            ));
        }
        assert_eq!(directory.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_server_errors_open_the_circuit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let directory = directory(&server).await;
        assert!(matches!(
            directory.lookup_by_national_id("1").await,
            Err(CustomerLookupError::Status(500))
        ));
        assert!(directory.lookup_by_national_id("1").await.is_err());
        assert!(matches!(
            directory.lookup_by_national_id("1").await,
            Err(CustomerLookupError::CircuitOpen)
        ));
    }
}
