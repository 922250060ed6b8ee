//! Existence probes for deletion tracking.
//!
//! Deletion on these APIs is asynchronous: a DELETE is accepted and the
//! resource lingers until a background worker reclaims it. Waiters poll for
//! the resource until the service reports 404. The probe maps the outcomes
//! of such a poll onto an explicit result instead of treating absence as a
//! failure.

use super::{RestClient, RestError, RestFuture, Transport};

/// Outcome of probing a resource path for existence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourcePresence {
    /// The service returned the resource.
    Present,
    /// The service reported 404 for the resource.
    Gone,
}

impl ResourcePresence {
    /// True when the resource is no longer visible.
    #[must_use]
    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Gone)
    }
}

impl<T: Transport> RestClient<T> {
    /// Probes `path` and classifies the outcome.
    ///
    /// A 200 means the resource is still present and a 404 means it is gone;
    /// both are successful probes. Any other status, and any transport
    /// failure, propagates to the caller undisturbed.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::UnexpectedStatus`] for statuses other than 200
    /// and 404, and [`RestError::Transport`] when the request never
    /// completed.
    pub async fn probe(&self, path: &str) -> Result<ResourcePresence, RestError> {
        let response = self.get(path, &[]).await?;
        if response.status == 404 {
            return Ok(ResourcePresence::Gone);
        }
        response.expected_success(&[200])?;
        Ok(ResourcePresence::Present)
    }
}

/// Clients that can report whether one of their resources is deleted.
///
/// Cleanup and waiter code treats every service uniformly through this
/// trait: issue the delete, then poll [`ResourceClient::is_resource_deleted`]
/// until it reports `true`.
pub trait ResourceClient: Send + Sync {
    /// Short name of the resource family, used in diagnostics.
    fn resource_type(&self) -> &'static str;

    /// Reports whether the resource no longer exists.
    fn is_resource_deleted<'a>(&'a self, resource_id: &'a str) -> RestFuture<'a, bool>;
}
