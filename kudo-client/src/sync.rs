use std::collections::{BTreeMap, HashMap};

use crate::api::{Backend, Engagement, EntityRef, Mutation, UserId};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MutationId(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationStatus {
    InFlight,
    Committed,
    RolledBack,
}

/// An optimistic change that was shown before the backend confirmed it
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingMutation {
    pub id: MutationId,
    pub entity: EntityRef,
    pub mutation: Mutation,

    /// State of the entity right before this mutation was applied locally
    pub previous: Engagement,
    pub proposed: Engagement,
    pub status: MutationStatus,
}

/// The remote call confirming one optimistic mutation
///
/// It holds no borrow on the controller that started it: the screen stays
/// readable and can start more mutations while this one is in flight.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCall {
    pub id: MutationId,
    pub entity: EntityRef,
    pub mutation: Mutation,
}

impl RemoteCall {
    /// What the backend returns is not merged back: refreshing is up to the caller.
    pub async fn send<B>(&self, backend: &mut B) -> anyhow::Result<()>
    where
        B: ?Sized + Backend,
    {
        tracing::trace!(id=?self.id, entity=%self.entity, mutation=%self.mutation, "sending mutation");
        match (&self.entity, self.mutation) {
            (EntityRef::Post(p), Mutation::Vote(d)) => backend.vote_post(p, d).await.map(|_| ()),
            (EntityRef::Post(p), Mutation::React(r)) => backend.like_post(p, r).await.map(|_| ()),
            (EntityRef::Comment(c), Mutation::Vote(d)) => {
                backend.vote_comment(c, d).await.map(|_| ())
            }
            (EntityRef::Comment(c), Mutation::React(r)) => {
                backend.react_comment(c, r).await.map(|_| ())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{0} is not loaded")]
    UnknownEntity(EntityRef),

    #[error("no pending mutation {0:?}")]
    UnknownMutation(MutationId),

    #[error("remote call for {entity} failed, change was rolled back: {error:#}")]
    RemoteCallFailed {
        entity: EntityRef,
        error: anyhow::Error,
    },
}

/// Votes and reactions of the entities one screen displays, as the acting user
/// currently sees them
///
/// Each mutation keeps its own snapshot. Rolling one back restores that snapshot
/// even if a newer mutation on the same entity was applied in the meantime.
#[derive(Debug)]
pub struct SyncController {
    actor: UserId,
    state: HashMap<EntityRef, Engagement>,
    pending: BTreeMap<MutationId, PendingMutation>,
    next_id: u64,
}

impl SyncController {
    pub fn new(actor: UserId) -> SyncController {
        SyncController {
            actor,
            state: HashMap::new(),
            pending: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn actor(&self) -> &UserId {
        &self.actor
    }

    /// Overwrites the local state with what the backend just returned
    ///
    /// In-flight mutations are left alone and will still commit or roll back.
    pub fn load(&mut self, entity: EntityRef, engagement: Engagement) {
        tracing::trace!(%entity, "loading engagement");
        self.state.insert(entity, engagement);
    }

    /// Stops tracking an entity, dropping its pending mutations without applying them
    pub fn forget(&mut self, entity: &EntityRef) {
        self.state.remove(entity);
        self.pending.retain(|_, p| p.entity != *entity);
    }

    pub fn engagement(&self, entity: &EntityRef) -> Option<&Engagement> {
        self.state.get(entity)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingMutation> {
        self.pending.values()
    }

    pub fn pending_for<'a>(
        &'a self,
        entity: &'a EntityRef,
    ) -> impl 'a + Iterator<Item = &'a PendingMutation> {
        self.pending.values().filter(move |p| p.entity == *entity)
    }

    /// Applies `mutation` locally and records it as in flight
    pub fn begin(&mut self, entity: EntityRef, mutation: Mutation) -> Result<MutationId, SyncError> {
        let current = self
            .state
            .get_mut(&entity)
            .ok_or_else(|| SyncError::UnknownEntity(entity.clone()))?;
        let previous = current.clone();
        let proposed = previous.apply(&self.actor, mutation);
        *current = proposed.clone();

        let id = MutationId(self.next_id);
        self.next_id += 1;
        tracing::debug!(?id, %entity, %mutation, "applying optimistic mutation");
        self.pending.insert(
            id,
            PendingMutation {
                id,
                entity,
                mutation,
                previous,
                proposed,
                status: MutationStatus::InFlight,
            },
        );
        Ok(id)
    }

    /// The backend accepted the mutation, the optimistic state stays
    pub fn commit(&mut self, id: MutationId) -> Result<PendingMutation, SyncError> {
        let mut p = self
            .pending
            .remove(&id)
            .ok_or(SyncError::UnknownMutation(id))?;
        tracing::trace!(?id, entity=%p.entity, "committed mutation");
        p.status = MutationStatus::Committed;
        Ok(p)
    }

    /// The backend refused the mutation, restore the state it was applied over
    pub fn roll_back(&mut self, id: MutationId) -> Result<PendingMutation, SyncError> {
        let mut p = self
            .pending
            .remove(&id)
            .ok_or(SyncError::UnknownMutation(id))?;
        tracing::info!(?id, entity=%p.entity, mutation=%p.mutation, "rolling back mutation");
        match self.state.get_mut(&p.entity) {
            Some(current) => {
                if *current != p.proposed {
                    tracing::debug!(
                        ?id,
                        entity=%p.entity,
                        "entity changed since this mutation, rolling back over the newer state"
                    );
                }
                *current = p.previous.clone();
            }
            None => tracing::debug!(?id, entity=%p.entity, "entity no longer loaded, nothing to restore"),
        }
        p.status = MutationStatus::RolledBack;
        Ok(p)
    }

    /// Forgets about a mutation without committing nor rolling it back, for when
    /// its result no longer matters
    pub fn abandon(&mut self, id: MutationId) -> Option<PendingMutation> {
        self.pending.remove(&id)
    }

    /// Settles a mutation with the outcome of its remote call
    ///
    /// Returns the entity's state once settled, or the remote failure after having
    /// rolled back.
    pub fn resolve(
        &mut self,
        id: MutationId,
        outcome: anyhow::Result<()>,
    ) -> Result<Engagement, SyncError> {
        match outcome {
            Ok(()) => {
                let p = self.commit(id)?;
                Ok(self.state.get(&p.entity).cloned().unwrap_or(p.proposed))
            }
            Err(error) => {
                let p = self.roll_back(id)?;
                Err(SyncError::RemoteCallFailed {
                    entity: p.entity,
                    error,
                })
            }
        }
    }

    /// Applies `mutation` locally and hands back the call that will confirm it
    ///
    /// Its outcome goes to `resolve`.
    pub fn start(&mut self, entity: EntityRef, mutation: Mutation) -> Result<RemoteCall, SyncError> {
        let id = self.begin(entity.clone(), mutation)?;
        Ok(RemoteCall {
            id,
            entity,
            mutation,
        })
    }

    /// Applies `mutation` locally, then sends it to the backend
    ///
    /// This keeps the controller borrowed until the backend answers, use `start`
    /// to have several mutations in flight.
    pub async fn submit<B>(
        &mut self,
        backend: &mut B,
        entity: EntityRef,
        mutation: Mutation,
    ) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let call = self.start(entity, mutation)?;
        let outcome = call.send(backend).await;
        self.resolve(call.id, outcome)
    }
}
