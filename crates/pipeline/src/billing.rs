//! Points reservation and refunds around a generation task.

use std::sync::Arc;

use mediagen_core::channels::Owner;
use mediagen_core::error::CoreError;
use mediagen_core::types::{Points, TaskId};
use mediagen_db::models::points::REASON_GENERATION_CHARGE;

use crate::error::GenerationError;
use crate::store::PointsStore;

/// Charges and refunds task costs. Only `user` owners are ever billed.
#[derive(Clone)]
pub struct BillingGateway {
    points: Arc<dyn PointsStore>,
}

impl BillingGateway {
    pub fn new(points: Arc<dyn PointsStore>) -> Self {
        Self { points }
    }

    /// Debit `amount` for `task_id` before the provider is called.
    ///
    /// Fails with [`CoreError::InsufficientBalance`] (nothing written) when
    /// the balance does not cover the amount.
    pub async fn reserve(
        &self,
        owner: &Owner,
        amount: Points,
        task_id: TaskId,
        description: &str,
    ) -> Result<(), GenerationError> {
        if !owner.kind.is_billable() || amount <= 0 {
            return Ok(());
        }
        let debited = self
            .points
            .debit(&owner.id, amount, task_id, REASON_GENERATION_CHARGE, description)
            .await?;
        if !debited {
            tracing::info!(owner_id = %owner.id, %task_id, amount, "Insufficient balance");
            return Err(CoreError::InsufficientBalance { required: amount }.into());
        }
        tracing::debug!(owner_id = %owner.id, %task_id, amount, "Points reserved");
        Ok(())
    }

    /// Credit `amount` back. A repeated refund for the same task and reason
    /// returns `false` and changes nothing.
    pub async fn refund(
        &self,
        owner: &Owner,
        task_id: TaskId,
        amount: Points,
        reason: &str,
        description: &str,
    ) -> Result<bool, GenerationError> {
        if !owner.kind.is_billable() || amount <= 0 {
            return Ok(false);
        }
        let credited = self
            .points
            .credit(&owner.id, amount, task_id, reason, description)
            .await?;
        if credited {
            tracing::info!(owner_id = %owner.id, %task_id, amount, reason, "Points refunded");
        }
        Ok(credited)
    }

    /// Current balance; owners without an account have zero.
    pub async fn balance(&self, owner_id: &str) -> Result<Points, GenerationError> {
        Ok(self.points.balance(owner_id).await?.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use mediagen_core::channels::OwnerKind;
    use mediagen_db::models::points::REASON_CREATE_FAILURE_COMPENSATION;
    use uuid::Uuid;

    use super::*;
    use crate::memory::MemoryStore;

    fn gateway() -> (Arc<MemoryStore>, BillingGateway) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), BillingGateway::new(store))
    }

    #[tokio::test]
    async fn reserve_debits_user() {
        let (store, billing) = gateway();
        store.deposit("u1", 25);
        let owner = Owner::new("u1", OwnerKind::User);

        billing.reserve(&owner, 10, Uuid::now_v7(), "kling").await.unwrap();
        assert_eq!(billing.balance("u1").await.unwrap(), 15);
    }

    #[tokio::test]
    async fn reserve_fails_without_funds() {
        let (store, billing) = gateway();
        store.deposit("u1", 5);
        let owner = Owner::new("u1", OwnerKind::User);

        let result = billing.reserve(&owner, 10, Uuid::now_v7(), "kling").await;
        assert_matches!(
            result,
            Err(GenerationError::Core(CoreError::InsufficientBalance { required: 10 }))
        );
        assert_eq!(billing.balance("u1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn admin_is_never_charged() {
        let (_, billing) = gateway();
        let admin = Owner::new("ops", OwnerKind::Admin);

        billing.reserve(&admin, 10, Uuid::now_v7(), "kling").await.unwrap();
        assert_eq!(billing.balance("ops").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refund_is_idempotent_per_reason() {
        let (store, billing) = gateway();
        store.deposit("u1", 10);
        let owner = Owner::new("u1", OwnerKind::User);
        let task_id = Uuid::now_v7();

        billing.reserve(&owner, 10, task_id, "kling").await.unwrap();
        let first = billing
            .refund(&owner, task_id, 10, REASON_CREATE_FAILURE_COMPENSATION, "create failed")
            .await
            .unwrap();
        let second = billing
            .refund(&owner, task_id, 10, REASON_CREATE_FAILURE_COMPENSATION, "create failed")
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(billing.balance("u1").await.unwrap(), 10);
    }
}
