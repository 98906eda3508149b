use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::locks::RequestLocks;
use crate::error::MatchError;
use crate::models::{Match, MatchStatus, RequestStatus, ServiceRequest};
use crate::services::{with_timeout, MatchStore, RequestStore};

/// Client-driven accept/reject of proposed matches
#[derive(Clone)]
pub struct MatchLifecycle {
    requests: Arc<dyn RequestStore>,
    matches: Arc<dyn MatchStore>,
    locks: Arc<RequestLocks>,
    store_timeout: Duration,
}

impl MatchLifecycle {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        matches: Arc<dyn MatchStore>,
        locks: Arc<RequestLocks>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            requests,
            matches,
            locks,
            store_timeout,
        }
    }

    /// Accept a proposal on behalf of the client owning its request.
    ///
    /// The request becomes `accepted` and every other `proposed` match of the
    /// same request is rejected. Accepting an accepted match returns it and
    /// completes any step a failed earlier call left undone; accepting a
    /// rejected one is a conflict.
    pub async fn accept_match(&self, match_id: Uuid, client_id: Uuid) -> Result<Match, MatchError> {
        let request_id = self.load_match(match_id).await?.request_id;
        let _guard = self.locks.lock(request_id).await;

        let (proposal, request) = self.authorize(match_id, client_id).await?;

        match proposal.status {
            // A retry after a partial failure finishes what the first call started
            MatchStatus::Accepted => {
                self.settle_acceptance(&request, match_id, Utc::now()).await?;
                return Ok(proposal);
            }
            MatchStatus::Proposed => {}
            other => {
                return Err(MatchError::Conflict(format!(
                    "Match {} is {} and cannot be accepted",
                    match_id, other
                )))
            }
        }

        // An accepted request already has its provider
        if !request.status.accepts_matching() {
            return Err(MatchError::Conflict(format!(
                "Request {} is {} and cannot accept a match",
                request.id, request.status
            )));
        }

        let now = Utc::now();
        let accepted = self.set_status(match_id, MatchStatus::Accepted, now).await?;
        let rejected = self.settle_acceptance(&request, match_id, now).await?;

        tracing::info!(
            "Client {} accepted match {} for request {} ({} competing proposals rejected)",
            client_id,
            match_id,
            request.id,
            rejected
        );

        Ok(accepted)
    }

    /// Reject a proposal on behalf of the client owning its request.
    ///
    /// The request keeps its status. Rejecting a rejected match is a no-op;
    /// rejecting an accepted one is a conflict.
    pub async fn reject_match(&self, match_id: Uuid, client_id: Uuid) -> Result<Match, MatchError> {
        let request_id = self.load_match(match_id).await?.request_id;
        let _guard = self.locks.lock(request_id).await;

        let (proposal, _request) = self.authorize(match_id, client_id).await?;

        match proposal.status {
            MatchStatus::Rejected => return Ok(proposal),
            MatchStatus::Proposed => {}
            other => {
                return Err(MatchError::Conflict(format!(
                    "Match {} is {} and cannot be rejected",
                    match_id, other
                )))
            }
        }

        let rejected = self.set_status(match_id, MatchStatus::Rejected, Utc::now()).await?;

        tracing::info!("Client {} rejected match {}", client_id, match_id);

        Ok(rejected)
    }

    /// Move the request to `accepted` and reject the competing proposals.
    ///
    /// Every step is a no-op once applied, so it is safe to run again.
    /// Returns how many proposals were rejected.
    async fn settle_acceptance(
        &self,
        request: &ServiceRequest,
        match_id: Uuid,
        responded_at: chrono::DateTime<Utc>,
    ) -> Result<usize, MatchError> {
        if request.status.accepts_matching() {
            with_timeout(
                self.store_timeout,
                self.requests.update_status(request.id, RequestStatus::Accepted),
            )
            .await?;
        }

        let siblings = with_timeout(self.store_timeout, self.matches.list_by_request(request.id)).await?;
        let mut rejected = 0;
        for sibling in siblings
            .iter()
            .filter(|m| m.id != match_id && m.status == MatchStatus::Proposed)
        {
            self.set_status(sibling.id, MatchStatus::Rejected, responded_at).await?;
            rejected += 1;
        }

        Ok(rejected)
    }

    async fn load_match(&self, match_id: Uuid) -> Result<Match, MatchError> {
        with_timeout(self.store_timeout, self.matches.get(match_id))
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("Match {} not found", match_id)))
    }

    /// Re-read the match under the request lock and check the caller owns its request
    async fn authorize(
        &self,
        match_id: Uuid,
        client_id: Uuid,
    ) -> Result<(Match, ServiceRequest), MatchError> {
        let proposal = self.load_match(match_id).await?;
        let request = with_timeout(self.store_timeout, self.requests.get(proposal.request_id))
            .await?
            .ok_or_else(|| {
                MatchError::NotFound(format!("Request {} not found", proposal.request_id))
            })?;

        if !request.is_owned_by(client_id) {
            tracing::warn!(
                "Client {} tried to respond to match {} of another client's request",
                client_id,
                match_id
            );
            return Err(MatchError::Forbidden(
                "Match belongs to another client's request".to_string(),
            ));
        }

        Ok((proposal, request))
    }

    async fn set_status(
        &self,
        match_id: Uuid,
        status: MatchStatus,
        responded_at: chrono::DateTime<Utc>,
    ) -> Result<Match, MatchError> {
        with_timeout(
            self.store_timeout,
            self.matches.update_status(match_id, status, Some(responded_at)),
        )
        .await?
        .ok_or_else(|| MatchError::NotFound(format!("Match {} not found", match_id)))
    }
}
