//! The authorization engine.
//!
//! Resolves `check` requests against the published model's rewrite rules:
//! a direct tuple match, a computed userset (ownership), or a grant derived
//! through a linking tuple (membership). Resolution is cycle-safe — a
//! revisited `(relation, object)` goal resolves as a non-match — and runs
//! under a time budget distinct from any caller-level timeout.
//!
//! Fail-closed: a timeout or an unreachable backend surfaces as
//! [`PolicyError::Timeout`], which every caller must treat as deny.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use warden_core::ModelVersion;

use crate::error::{PolicyError, PolicyResult};
use crate::model::{AuthorizationModel, RelationRewrite};
use crate::store::{TupleFilter, TupleStore};
use crate::tuple::{ObjectRef, RelationName, RelationshipTuple, UserRef};

/// Internal time budget for one `check` resolution, in milliseconds.
/// Deliberately short so a slow policy backend cannot stall the request
/// pipeline; the provider layer has its own, much longer timeout.
pub const CHECK_BUDGET_MS: u64 = 100;

/// Hard bound on resolution depth. Rewrite graphs derived from data can
/// nest arbitrarily; anything deeper than this resolves as a non-match.
pub const MAX_RESOLUTION_DEPTH: usize = 32;

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = PolicyResult<bool>> + Send + 'a>>;

/// A resolution goal already visited on the current path.
type Visited = HashSet<(RelationName, ObjectRef)>;

// ---------------------------------------------------------------------------
// AuthorizationEngine
// ---------------------------------------------------------------------------

/// Relationship-based policy evaluator over `(user, relation, object)`
/// tuples.
///
/// Holds the published [`AuthorizationModel`] (swapped atomically, never
/// mutated) and issues reads/writes against the injected [`TupleStore`].
/// A `check` after a completed `write` on the same instance observes that
/// write, provided the store honors [`crate::store::MAX_STALENESS_SECS`].
pub struct AuthorizationEngine {
    store: Arc<dyn TupleStore>,
    model: RwLock<Option<Arc<AuthorizationModel>>>,
    check_budget: Duration,
}

impl AuthorizationEngine {
    pub fn new(store: Arc<dyn TupleStore>) -> Self {
        Self {
            store,
            model: RwLock::new(None),
            check_budget: Duration::from_millis(CHECK_BUDGET_MS),
        }
    }

    /// Override the check budget. Intended for tests.
    pub fn with_check_budget(mut self, budget: Duration) -> Self {
        self.check_budget = budget;
        self
    }

    /// Publish a new authorization model. The previous model is replaced
    /// atomically; in-flight checks keep the snapshot they started with.
    pub fn publish_model(&self, model: AuthorizationModel) -> PolicyResult<ModelVersion> {
        model.validate()?;
        let version = model.version;
        let mut slot = self
            .model
            .write()
            .map_err(|_| PolicyError::Backend("model lock poisoned".into()))?;
        if let Some(current) = slot.as_ref() {
            if model.version <= current.version {
                return Err(PolicyError::Validation(format!(
                    "model version {} does not supersede published {}",
                    model.version, current.version
                )));
            }
        }
        tracing::info!(version = %version, "authorization model published");
        *slot = Some(Arc::new(model));
        Ok(version)
    }

    /// Version of the currently published model, if any.
    pub fn model_version(&self) -> Option<ModelVersion> {
        self.model
            .read()
            .ok()
            .and_then(|m| m.as_ref().map(|m| m.version))
    }

    fn current_model(&self) -> PolicyResult<Arc<AuthorizationModel>> {
        self.model
            .read()
            .map_err(|_| PolicyError::Backend("model lock poisoned".into()))?
            .clone()
            .ok_or(PolicyError::NoModel)
    }

    // -----------------------------------------------------------------------
    // write / delete
    // -----------------------------------------------------------------------

    /// Atomic batch upsert. Duplicate idempotent writes are not conflicts;
    /// every tuple is validated against the model before the backend sees
    /// the batch.
    pub async fn write(&self, tuples: &[RelationshipTuple]) -> PolicyResult<()> {
        let model = self.current_model()?;
        for tuple in tuples {
            tuple.validate()?;
            if model
                .rewrite(&tuple.object.object_type, &tuple.relation)
                .is_none()
            {
                return Err(PolicyError::UnknownRelation {
                    object_type: tuple.object.object_type.clone(),
                    relation: tuple.relation.to_string(),
                });
            }
        }
        self.store.apply(tuples, &[]).await?;
        tracing::debug!(count = tuples.len(), "tuples written");
        Ok(())
    }

    /// Idempotent batch removal; absent tuples are a no-op.
    pub async fn delete(&self, tuples: &[RelationshipTuple]) -> PolicyResult<()> {
        for tuple in tuples {
            tuple.validate()?;
        }
        self.store.apply(&[], tuples).await?;
        tracing::debug!(count = tuples.len(), "tuples deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // check
    // -----------------------------------------------------------------------

    /// Resolve whether `user` holds `relation` on `object`.
    ///
    /// Returns `Ok(false)` for a clean non-match. `Err(Timeout)` means the
    /// budget was exceeded or the backend was unreachable; callers must
    /// treat it as deny.
    pub async fn check(
        &self,
        user: &UserRef,
        relation: &RelationName,
        object: &ObjectRef,
    ) -> PolicyResult<bool> {
        user.validate()?;
        object.validate()?;
        let model = self.current_model()?;
        if model.rewrite(&object.object_type, relation).is_none() {
            return Err(PolicyError::UnknownRelation {
                object_type: object.object_type.clone(),
                relation: relation.to_string(),
            });
        }

        let deadline = Instant::now() + self.check_budget;
        let mut visited = Visited::new();
        let resolution = self.resolve(
            model.as_ref(),
            user,
            relation.clone(),
            object.clone(),
            &mut visited,
            0,
            deadline,
        );

        // The outer timeout covers a backend that hangs rather than errors;
        // the inner deadline checks keep a responsive backend honest.
        match tokio::time::timeout(self.check_budget, resolution).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    user = %user,
                    relation = %relation,
                    object = %object,
                    "check exceeded its time budget"
                );
                Err(PolicyError::Timeout)
            }
        }
    }

    /// Resolve one `(relation, object)` goal for `user`.
    #[allow(clippy::too_many_arguments)]
    fn resolve<'a>(
        &'a self,
        model: &'a AuthorizationModel,
        user: &'a UserRef,
        relation: RelationName,
        object: ObjectRef,
        visited: &'a mut Visited,
        depth: usize,
        deadline: Instant,
    ) -> ResolveFuture<'a> {
        Box::pin(async move {
            if depth > MAX_RESOLUTION_DEPTH {
                return Ok(false);
            }
            if Instant::now() >= deadline {
                return Err(PolicyError::Timeout);
            }
            // Revisiting a goal on this resolution means a cycle in the
            // grant graph; it cannot add new grants, so it is a non-match.
            if !visited.insert((relation.clone(), object.clone())) {
                return Ok(false);
            }

            let rewrite = match model.rewrite(&object.object_type, &relation) {
                Some(rewrite) => rewrite,
                // Data can link to objects whose type the model does not
                // define; such links grant nothing.
                None => return Ok(false),
            };

            self.resolve_rewrite(model, user, rewrite, &relation, &object, visited, depth, deadline)
                .await
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_rewrite<'a>(
        &'a self,
        model: &'a AuthorizationModel,
        user: &'a UserRef,
        rewrite: &'a RelationRewrite,
        relation: &'a RelationName,
        object: &'a ObjectRef,
        visited: &'a mut Visited,
        depth: usize,
        deadline: Instant,
    ) -> ResolveFuture<'a> {
        Box::pin(async move {
            if Instant::now() >= deadline {
                return Err(PolicyError::Timeout);
            }
            match rewrite {
                RelationRewrite::Direct => {
                    let tuples = self
                        .read_fail_closed(&TupleFilter::by_relation_and_object(
                            relation.clone(),
                            object.clone(),
                        ))
                        .await?;
                    for tuple in &tuples {
                        if &tuple.user == user {
                            return Ok(true);
                        }
                    }
                    // Userset subjects fan out into their own goals.
                    for tuple in &tuples {
                        if let UserRef::Userset {
                            object: via_object,
                            relation: via_relation,
                        } = &tuple.user
                        {
                            if self
                                .resolve(
                                    model,
                                    user,
                                    via_relation.clone(),
                                    via_object.clone(),
                                    &mut *visited,
                                    depth + 1,
                                    deadline,
                                )
                                .await?
                            {
                                return Ok(true);
                            }
                        }
                    }
                    Ok(false)
                }
                RelationRewrite::ComputedUserset { relation: target } => {
                    self.resolve(
                        model,
                        user,
                        target.clone(),
                        object.clone(),
                        visited,
                        depth + 1,
                        deadline,
                    )
                    .await
                }
                RelationRewrite::TupleToUserset {
                    tupleset_relation,
                    computed_relation,
                } => {
                    let links = self
                        .read_fail_closed(&TupleFilter::by_relation_and_object(
                            tupleset_relation.clone(),
                            object.clone(),
                        ))
                        .await?;
                    for link in &links {
                        // A linking tuple's user names the bridged object,
                        // e.g. (org:acme, org, tool:chat).
                        let bridged = match &link.user {
                            UserRef::Subject { id } => match ObjectRef::parse(id) {
                                Ok(object) => object,
                                Err(_) => continue,
                            },
                            UserRef::Userset { .. } => continue,
                        };
                        if self
                            .resolve(
                                model,
                                user,
                                computed_relation.clone(),
                                bridged,
                                &mut *visited,
                                depth + 1,
                                deadline,
                            )
                            .await?
                        {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                RelationRewrite::Union { children } => {
                    for child in children {
                        if self
                            .resolve_rewrite(
                                model,
                                user,
                                child,
                                relation,
                                object,
                                &mut *visited,
                                depth,
                                deadline,
                            )
                            .await?
                        {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        })
    }

    /// Read through the store, converting backend failure into the
    /// fail-closed timeout error. An unreachable backend must never look
    /// different from a slow one to the caller.
    async fn read_fail_closed(
        &self,
        filter: &TupleFilter,
    ) -> PolicyResult<Vec<RelationshipTuple>> {
        match self.store.read(filter).await {
            Ok(tuples) => Ok(tuples),
            Err(PolicyError::Backend(msg)) => {
                tracing::warn!(error = %msg, "tuple store unreachable during check, denying");
                Err(PolicyError::Timeout)
            }
            Err(other) => Err(other),
        }
    }

    // -----------------------------------------------------------------------
    // expand
    // -----------------------------------------------------------------------

    /// Return the full grant tree for `(relation, object)`, for auditing.
    /// Read-only; cycles appear as leaf nodes without children.
    pub async fn expand(
        &self,
        relation: &RelationName,
        object: &ObjectRef,
    ) -> PolicyResult<UsersetTree> {
        object.validate()?;
        let model = self.current_model()?;
        if model.rewrite(&object.object_type, relation).is_none() {
            return Err(PolicyError::UnknownRelation {
                object_type: object.object_type.clone(),
                relation: relation.to_string(),
            });
        }

        let mut visited = Visited::new();
        let root = self
            .expand_node(model.as_ref(), relation.clone(), object.clone(), &mut visited, 0)
            .await?;
        Ok(UsersetTree { root })
    }

    fn expand_node<'a>(
        &'a self,
        model: &'a AuthorizationModel,
        relation: RelationName,
        object: ObjectRef,
        visited: &'a mut Visited,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = PolicyResult<UsersetNode>> + Send + 'a>> {
        Box::pin(async move {
            let mut node = UsersetNode {
                object: object.clone(),
                relation: relation.clone(),
                subjects: Vec::new(),
                children: Vec::new(),
            };
            if depth > MAX_RESOLUTION_DEPTH || !visited.insert((relation.clone(), object.clone())) {
                return Ok(node);
            }

            let tuples = self
                .store
                .read(&TupleFilter::by_relation_and_object(
                    relation.clone(),
                    object.clone(),
                ))
                .await?;
            for tuple in &tuples {
                match &tuple.user {
                    UserRef::Subject { .. } => node.subjects.push(tuple.user.clone()),
                    UserRef::Userset {
                        object: via_object,
                        relation: via_relation,
                    } => {
                        let child = self
                            .expand_node(
                                model,
                                via_relation.clone(),
                                via_object.clone(),
                                &mut *visited,
                                depth + 1,
                            )
                            .await?;
                        node.children.push(child);
                    }
                }
            }

            // Rewrite-derived branches: ownership and linked usersets.
            if let Some(rewrite) = model.rewrite(&object.object_type, &relation) {
                self.expand_rewrite(model, rewrite, &object, &mut node, visited, depth)
                    .await?;
            }
            Ok(node)
        })
    }

    fn expand_rewrite<'a>(
        &'a self,
        model: &'a AuthorizationModel,
        rewrite: &'a RelationRewrite,
        object: &'a ObjectRef,
        node: &'a mut UsersetNode,
        visited: &'a mut Visited,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = PolicyResult<()>> + Send + 'a>> {
        Box::pin(async move {
            match rewrite {
                RelationRewrite::Direct => Ok(()),
                RelationRewrite::ComputedUserset { relation: target } => {
                    let child = self
                        .expand_node(
                            model,
                            target.clone(),
                            object.clone(),
                            &mut *visited,
                            depth + 1,
                        )
                        .await?;
                    node.children.push(child);
                    Ok(())
                }
                RelationRewrite::TupleToUserset {
                    tupleset_relation,
                    computed_relation,
                } => {
                    let links = self
                        .store
                        .read(&TupleFilter::by_relation_and_object(
                            tupleset_relation.clone(),
                            object.clone(),
                        ))
                        .await?;
                    for link in &links {
                        if let UserRef::Subject { id } = &link.user {
                            if let Ok(bridged) = ObjectRef::parse(id) {
                                let child = self
                                    .expand_node(
                                        model,
                                        computed_relation.clone(),
                                        bridged,
                                        &mut *visited,
                                        depth + 1,
                                    )
                                    .await?;
                                node.children.push(child);
                            }
                        }
                    }
                    Ok(())
                }
                RelationRewrite::Union { children } => {
                    for child in children {
                        self.expand_rewrite(model, child, object, &mut *node, &mut *visited, depth)
                            .await?;
                    }
                    Ok(())
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // list_objects
    // -----------------------------------------------------------------------

    /// Reverse-index query: every object of `object_type` on which `user`
    /// holds `relation`. Candidates are the distinct objects of that type
    /// present in the store; each is resolved under one shared budget.
    pub async fn list_objects(
        &self,
        user: &UserRef,
        relation: &RelationName,
        object_type: &str,
    ) -> PolicyResult<BTreeSet<ObjectRef>> {
        user.validate()?;
        let model = self.current_model()?;
        if model
            .types
            .get(object_type)
            .map(|t| !t.contains_key(relation))
            .unwrap_or(true)
        {
            return Err(PolicyError::UnknownRelation {
                object_type: object_type.to_string(),
                relation: relation.to_string(),
            });
        }

        let tuples = self
            .read_fail_closed(&TupleFilter::by_object_type(object_type))
            .await?;
        let candidates: BTreeSet<ObjectRef> =
            tuples.into_iter().map(|t| t.object).collect();

        let deadline = Instant::now() + self.check_budget;
        let mut granted = BTreeSet::new();
        for object in candidates {
            let mut visited = Visited::new();
            if self
                .resolve(
                    model.as_ref(),
                    user,
                    relation.clone(),
                    object.clone(),
                    &mut visited,
                    0,
                    deadline,
                )
                .await?
            {
                granted.insert(object);
            }
        }
        Ok(granted)
    }
}

// ---------------------------------------------------------------------------
// UsersetTree
// ---------------------------------------------------------------------------

/// The expanded grant tree for one `(relation, object)` pair.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UsersetTree {
    pub root: UsersetNode,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UsersetNode {
    pub object: ObjectRef,
    pub relation: RelationName,
    /// Subjects granted directly at this node.
    pub subjects: Vec<UserRef>,
    /// Userset-, ownership-, and link-derived branches.
    pub children: Vec<UsersetNode>,
}

impl UsersetTree {
    /// Flatten every subject reachable in the tree.
    pub fn all_subjects(&self) -> BTreeSet<UserRef> {
        let mut subjects = BTreeSet::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            subjects.extend(node.subjects.iter().cloned());
            stack.extend(node.children.iter());
        }
        subjects
    }
}
