use async_trait::async_trait;

/// Third-party payment gateway.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// One payment attempt. Retrying is the caller's decision.
    async fn pay(&self) -> bool;
}
