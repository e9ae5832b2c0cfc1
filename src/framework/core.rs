//! Record store actor behind the in-process authorities.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A record kept by a [`ResourceActor`]: an order, a server-side cart.
///
/// Hooks are `async` and receive the `Context` handed to
/// [`ResourceActor::run`], which is how a stored order pushes its status
/// changes to the event server.
#[async_trait]
pub trait ActorEntity: Clone + Send + Sync + 'static {
    /// Allocated by the actor from a running `u32` counter.
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug + From<u32>;
    type Create: Send + Sync + Debug;
    type Update: Send + Sync + Debug;
    /// Commands beyond create/update, e.g. the cart's add/remove/clear.
    type Action: Send + Sync + Debug;
    type ActionResult: Send + Sync + Debug;
    /// `()` when the hooks need nothing.
    type Context: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    fn from_create_params(id: Self::Id, params: Self::Create) -> Result<Self, Self::Error>;

    /// Runs before the record is stored; an error discards it.
    async fn on_create(&mut self, _ctx: &Self::Context) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn on_update(
        &mut self,
        update: Self::Update,
        ctx: &Self::Context,
    ) -> Result<(), Self::Error>;

    async fn handle_action(
        &mut self,
        action: Self::Action,
        ctx: &Self::Context,
    ) -> Result<Self::ActionResult, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("Resource actor is not running")]
    ActorClosed,
    #[error("Resource actor stopped before answering")]
    ActorDropped,
    #[error("No resource with id {0}")]
    NotFound(String),
    #[error("{0}")]
    EntityError(Box<dyn std::error::Error + Send + Sync>),
}

impl FrameworkError {
    fn entity<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        FrameworkError::EntityError(Box::new(e))
    }

    /// Recovers the entity's own error type, if this wraps one.
    pub fn entity_error<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            FrameworkError::EntityError(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}

pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

#[derive(Debug)]
pub enum ResourceRequest<T: ActorEntity> {
    Create {
        params: T::Create,
        respond_to: Response<T::Id>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>>,
    },
    List {
        respond_to: Response<Vec<T>>,
    },
    Update {
        id: T::Id,
        update: T::Update,
        respond_to: Response<T>,
    },
    Action {
        id: T::Id,
        action: T::Action,
        respond_to: Response<T::ActionResult>,
    },
}

/// Owns every record of one kind and applies requests one at a time.
///
/// Update and action hooks run against a copy; the stored record is replaced
/// only when the hook succeeds.
pub struct ResourceActor<T: ActorEntity> {
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    store: HashMap<T::Id, T>,
    next_id: u32,
    resource: &'static str,
}

impl<T: ActorEntity> ResourceActor<T> {
    pub fn new(buffer_size: usize) -> (Self, ResourceClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let resource = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or("resource");
        let actor = Self {
            receiver,
            store: HashMap::new(),
            next_id: 1,
            resource,
        };
        (actor, ResourceClient::new(sender))
    }

    /// Serves requests until every client is dropped.
    pub async fn run(mut self, context: T::Context) {
        let resource = self.resource;
        info!(resource, "Store started");

        while let Some(request) = self.receiver.recv().await {
            match request {
                ResourceRequest::Create { params, respond_to } => {
                    let _ = respond_to.send(self.create(params, &context).await);
                }
                ResourceRequest::Get { id, respond_to } => {
                    debug!(resource, %id, "Get");
                    let _ = respond_to.send(Ok(self.store.get(&id).cloned()));
                }
                ResourceRequest::List { respond_to } => {
                    let _ = respond_to.send(Ok(self.store.values().cloned().collect()));
                }
                ResourceRequest::Update {
                    id,
                    update,
                    respond_to,
                } => {
                    debug!(resource, %id, ?update, "Update");
                    let _ = respond_to.send(self.update(id, update, &context).await);
                }
                ResourceRequest::Action {
                    id,
                    action,
                    respond_to,
                } => {
                    debug!(resource, %id, ?action, "Action");
                    let _ = respond_to.send(self.act(id, action, &context).await);
                }
            }
        }

        info!(resource, records = self.store.len(), "Store stopped");
    }

    async fn create(&mut self, params: T::Create, context: &T::Context) -> Result<T::Id, FrameworkError> {
        let id = T::Id::from(self.next_id);
        self.next_id += 1;

        let mut record = T::from_create_params(id.clone(), params).map_err(|e| {
            warn!(resource = self.resource, error = %e, "Rejected create");
            FrameworkError::entity(e)
        })?;
        record.on_create(context).await.map_err(|e| {
            warn!(resource = self.resource, %id, error = %e, "Create hook failed");
            FrameworkError::entity(e)
        })?;
        self.store.insert(id.clone(), record);
        info!(resource = self.resource, %id, records = self.store.len(), "Created");
        Ok(id)
    }

    async fn update(
        &mut self,
        id: T::Id,
        update: T::Update,
        context: &T::Context,
    ) -> Result<T, FrameworkError> {
        let mut record = self.candidate(&id)?;
        record
            .on_update(update, context)
            .await
            .map_err(|e| self.refused(&id, e))?;
        self.commit(id, record.clone());
        Ok(record)
    }

    async fn act(
        &mut self,
        id: T::Id,
        action: T::Action,
        context: &T::Context,
    ) -> Result<T::ActionResult, FrameworkError> {
        let mut record = self.candidate(&id)?;
        let result = record
            .handle_action(action, context)
            .await
            .map_err(|e| self.refused(&id, e))?;
        self.commit(id, record);
        Ok(result)
    }

    /// A copy of the stored record for a hook to work on.
    fn candidate(&self, id: &T::Id) -> Result<T, FrameworkError> {
        self.store.get(id).cloned().ok_or_else(|| {
            warn!(resource = self.resource, %id, "Not found");
            FrameworkError::NotFound(id.to_string())
        })
    }

    fn refused(&self, id: &T::Id, e: T::Error) -> FrameworkError {
        warn!(resource = self.resource, %id, error = %e, "Change refused");
        FrameworkError::entity(e)
    }

    fn commit(&mut self, id: T::Id, record: T) {
        info!(resource = self.resource, %id, "Modified");
        self.store.insert(id, record);
    }
}

/// Cloneable handle to a [`ResourceActor`].
pub struct ResourceClient<T: ActorEntity> {
    sender: mpsc::Sender<ResourceRequest<T>>,
}

// A derive would demand `T: Clone` of the handle.
impl<T: ActorEntity> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: ActorEntity> ResourceClient<T> {
    pub fn new(sender: mpsc::Sender<ResourceRequest<T>>) -> Self {
        Self { sender }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Response<R>) -> ResourceRequest<T>,
    ) -> Result<R, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn create(&self, params: T::Create) -> Result<T::Id, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Create { params, respond_to })
            .await
    }

    pub async fn get(&self, id: T::Id) -> Result<Option<T>, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Get { id, respond_to })
            .await
    }

    pub async fn list(&self) -> Result<Vec<T>, FrameworkError> {
        self.request(|respond_to| ResourceRequest::List { respond_to })
            .await
    }

    pub async fn update(&self, id: T::Id, update: T::Update) -> Result<T, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Update {
            id,
            update,
            respond_to,
        })
        .await
    }

    pub async fn perform_action(
        &self,
        id: T::Id,
        action: T::Action,
    ) -> Result<T::ActionResult, FrameworkError> {
        self.request(|respond_to| ResourceRequest::Action {
            id,
            action,
            respond_to,
        })
        .await
    }
}
