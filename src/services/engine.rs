//! The engine: one task that owns the view and serializes every mutation.
//!
//! Commands arrive over an mpsc channel from cloneable [`EngineHandle`]s.
//! Network round trips run as futures polled by the same `select!` loop, so
//! their completions are applied one at a time, in arrival order, between
//! commands. Nothing else ever touches the [`Synchronizer`].

use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::document::{DocumentService, DocumentStore};
use super::notifications::Notification;
use crate::backend::{Backend, SubtreeFetcher};
use crate::config::Config;
use crate::error::AppError;
use crate::models::{DocumentSnapshot, ElementList, FieldEdit};
use crate::view::{
    Canvas, Download, ExpandOutcome, ExpandTicket, Exporter, LayoutReport, LayoutRunner, MenuAction,
    MenuItem, Selection, Synchronizer, ViewState,
};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Notifications for collaborators outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum EngineEvent {
    /// The side panel should show this selection, or close.
    Sidebar { selection: Option<Selection> },
    /// A transient message for the user.
    Notify { notification: Notification },
    /// A new authoritative document arrived.
    DocumentChanged { name: String },
    /// Layout finished and the viewport was fitted.
    LayoutCompleted { report: LayoutReport },
    /// A sub-tree response was applied.
    Expanded {
        node_id: String,
        outcome: ExpandOutcome,
    },
}

/// Engine state snapshot returned by [`EngineHandle::state`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineState {
    /// Name of the current document.
    pub document: Option<String>,
    /// Round trips still awaiting a response.
    pub in_flight: usize,
    #[serde(flatten)]
    pub view: ViewState,
}

/// Which round trip produced a document snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentOrigin {
    Upload,
    JsonEdit,
    FieldEdit,
}

impl DocumentOrigin {
    fn describe(self) -> &'static str {
        match self {
            DocumentOrigin::Upload => "upload",
            DocumentOrigin::JsonEdit => "document edit",
            DocumentOrigin::FieldEdit => "field edit",
        }
    }
}

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Upload {
        file_name: String,
        contents: Vec<u8>,
    },
    Tap {
        target: Option<String>,
        reply: Reply<Result<bool, AppError>>,
    },
    ContextTap {
        target: Option<String>,
        reply: Reply<Result<Option<Selection>, AppError>>,
    },
    Menu {
        target: Option<String>,
        reply: Reply<Vec<MenuItem>>,
    },
    Invoke {
        action: MenuAction,
        target: Option<String>,
        reply: Reply<bool>,
    },
    Fit,
    Refresh,
    Edit(FieldEdit),
    EditSelected {
        key: String,
        value: String,
        reply: Reply<Result<(), AppError>>,
    },
    EditJson(Value),
    Export {
        reply: Reply<Result<Download, AppError>>,
    },
    DownloadDocument {
        reply: Reply<Result<Download, AppError>>,
    },
    State {
        reply: Reply<EngineState>,
    },
    Settle {
        reply: Reply<()>,
    },
    Shutdown,
}

enum Completion {
    Expand {
        ticket: ExpandTicket,
        result: Result<ElementList, AppError>,
    },
    Document {
        origin: DocumentOrigin,
        result: Result<DocumentSnapshot, AppError>,
    },
}

/// One turn of the engine loop.
enum Step {
    Completed(Completion),
    Received(Option<Command>),
}

/// Owns the synchronizer, the document store and the backend handles.
pub struct Engine {
    sync: Synchronizer<Canvas>,
    store: DocumentStore,
    fetcher: Arc<dyn SubtreeFetcher>,
    documents: DocumentService,
    exporter: Exporter,
    document_file_name: String,
    events: broadcast::Sender<EngineEvent>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
    settle_waiters: Vec<Reply<()>>,
}

impl Engine {
    pub fn new(backend: Backend, config: &Config) -> Self {
        let layout = LayoutRunner::from_config(&config.layout, &config.viewport);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sync: Synchronizer::new(Canvas::new(), layout),
            store: DocumentStore::default(),
            fetcher: backend.fetcher,
            documents: DocumentService::new(backend.documents),
            exporter: Exporter::from_config(&config.export),
            document_file_name: config.export.document_file_name.clone(),
            events,
            pending: FuturesUnordered::new(),
            settle_waiters: Vec::new(),
        }
    }

    /// Starts the engine on its own task.
    pub fn spawn(self) -> EngineHandle {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let handle = EngineHandle {
            commands,
            events: self.events.clone(),
        };
        tokio::spawn(self.run(receiver));
        handle
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::debug!("Engine started");
        loop {
            let step = tokio::select! {
                Some(completion) = self.pending.next(), if !self.pending.is_empty() => {
                    Step::Completed(completion)
                }
                command = commands.recv() => Step::Received(command),
            };
            match step {
                Step::Completed(completion) => self.complete(completion),
                Step::Received(Some(command)) => {
                    if !self.handle(command) {
                        break;
                    }
                }
                Step::Received(None) => break,
            }
            if self.pending.is_empty() {
                for waiter in self.settle_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }
        tracing::debug!(abandoned = self.pending.len(), "Engine stopped");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Handles one command. Returns false when the engine should stop.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Upload {
                file_name,
                contents,
            } => {
                let documents = self.documents.clone();
                self.submit(DocumentOrigin::Upload, async move {
                    documents.upload(&file_name, contents).await
                });
            }
            Command::Tap { target, reply } => {
                let result = match self.sync.tap(target.as_deref()) {
                    Ok(Some(ticket)) => {
                        self.fetch_subtree(ticket);
                        Ok(true)
                    }
                    Ok(None) => Ok(false),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring tap");
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            Command::ContextTap { target, reply } => {
                let result = self.mutate(|sync| sync.context_tap(target.as_deref()));
                if let Ok(selection) = &result {
                    self.emit(EngineEvent::Sidebar {
                        selection: selection.clone(),
                    });
                }
                let _ = reply.send(result);
            }
            Command::Menu { target, reply } => {
                let _ = reply.send(self.sync.menu(target.as_deref()));
            }
            Command::Invoke {
                action,
                target,
                reply,
            } => {
                let changed = self.mutate(|sync| sync.invoke(action, target.as_deref()));
                let _ = reply.send(changed.is_some());
            }
            Command::Fit => {
                self.mutate(|sync| sync.run_layout());
            }
            Command::Refresh => self.refresh(),
            Command::Edit(edit) => self.submit_edit(edit),
            Command::EditSelected { key, value, reply } => {
                let result = self.sync.sidebar().edit_request(&key, &value);
                let result = result.map(|edit| self.submit_edit(edit));
                if let Err(e) = &result {
                    self.emit(EngineEvent::Notify {
                        notification: Notification::warning(e.user_message()),
                    });
                }
                let _ = reply.send(result);
            }
            Command::EditJson(schema_json) => {
                let documents = self.documents.clone();
                self.submit(DocumentOrigin::JsonEdit, async move {
                    documents.reload(schema_json).await
                });
            }
            Command::Export { reply } => {
                let result = self.exporter.render(self.sync.view(), self.sync.positions());
                let _ = reply.send(result);
            }
            Command::DownloadDocument { reply } => {
                let _ = reply.send(self.store.export_json(&self.document_file_name));
            }
            Command::State { reply } => {
                let _ = reply.send(EngineState {
                    document: self.store.name().map(str::to_string),
                    in_flight: self.pending.len(),
                    view: self.sync.state(),
                });
            }
            Command::Settle { reply } => self.settle_waiters.push(reply),
            Command::Shutdown => return false,
        }
        true
    }

    /// Full reload from the current snapshot.
    fn refresh(&mut self) {
        let Some(elements) = self.store.elements().cloned() else {
            tracing::debug!("Nothing to refresh");
            return;
        };
        if let Err(e) = self.mutate(|sync| sync.reload(&elements)) {
            tracing::error!(error = %e, "Refresh failed");
        }
    }

    fn submit_edit(&mut self, edit: FieldEdit) {
        let documents = self.documents.clone();
        self.submit(DocumentOrigin::FieldEdit, async move {
            documents.update_field(edit).await
        });
    }

    // ========================================================================
    // Round trips
    // ========================================================================

    fn fetch_subtree(&mut self, ticket: ExpandTicket) {
        tracing::debug!(node_id = %ticket.node_id, generation = ticket.generation, "Fetching sub-tree");
        let fetcher = Arc::clone(&self.fetcher);
        self.pending.push(
            async move {
                let result = fetcher.fetch_subtree(&ticket.node_id).await;
                Completion::Expand { ticket, result }
            }
            .boxed(),
        );
    }

    fn submit<F>(&mut self, origin: DocumentOrigin, round_trip: F)
    where
        F: std::future::Future<Output = Result<DocumentSnapshot, AppError>> + Send + 'static,
    {
        self.pending.push(
            async move {
                Completion::Document {
                    origin,
                    result: round_trip.await,
                }
            }
            .boxed(),
        );
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Expand { ticket, result } => {
                let outcome = self.mutate(|sync| sync.apply_expand(&ticket, result));
                self.emit(EngineEvent::Expanded {
                    node_id: ticket.node_id,
                    outcome,
                });
            }
            Completion::Document { origin, result } => self.apply_document(origin, result),
        }
    }

    /// Makes a returned snapshot current. The view reloads only when the
    /// element list differs from the one already shown.
    fn apply_document(&mut self, origin: DocumentOrigin, result: Result<DocumentSnapshot, AppError>) {
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(origin = origin.describe(), error = %e, "Document round trip failed");
                self.emit(EngineEvent::Notify {
                    notification: Notification::from_error(&e),
                });
                return;
            }
        };

        if self.store.differs(&snapshot.parsed_schema) {
            let elements = snapshot.parsed_schema.clone();
            if let Err(e) = self.mutate(|sync| sync.reload(&elements)) {
                tracing::error!(origin = origin.describe(), error = %e, "Rejected document snapshot");
                self.emit(EngineEvent::Notify {
                    notification: Notification::from_error(&e),
                });
                return;
            }
        } else {
            tracing::debug!(origin = origin.describe(), "Snapshot unchanged, keeping view");
        }

        let name = snapshot.name.clone();
        self.store.apply(snapshot);
        tracing::info!(origin = origin.describe(), name = %name, "Document updated");
        self.emit(EngineEvent::DocumentChanged { name: name.clone() });
        if origin == DocumentOrigin::Upload {
            self.emit(EngineEvent::Notify {
                notification: Notification::success(format!("Loaded {name}")),
            });
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Runs `f` against the synchronizer and reports any layout it caused.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut Synchronizer<Canvas>) -> T) -> T {
        let runs = self.sync.layout_runs();
        let out = f(&mut self.sync);
        if self.sync.layout_runs() != runs {
            if let Some(report) = self.sync.last_layout().cloned() {
                self.emit(EngineEvent::LayoutCompleted { report });
            }
        }
        out
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Cloneable handle for driving a spawned [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), AppError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::EngineStopped)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response.await.map_err(|_| AppError::EngineStopped)
    }

    /// Uploads a document. The outcome arrives as events.
    pub async fn upload(&self, file_name: impl Into<String>, contents: Vec<u8>) -> Result<(), AppError> {
        self.send(Command::Upload {
            file_name: file_name.into(),
            contents,
        })
        .await
    }

    /// Reads `path` and uploads it.
    pub async fn upload_file(&self, path: &Path) -> Result<(), AppError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let contents = tokio::fs::read(path).await?;
        self.upload(file_name, contents).await
    }

    /// Primary click. Returns true when an expand was started.
    pub async fn tap(&self, target: Option<&str>) -> Result<bool, AppError> {
        let target = target.map(str::to_string);
        self.request(|reply| Command::Tap { target, reply }).await?
    }

    /// Secondary click. Returns the selection now shown in the side panel.
    pub async fn context_tap(&self, target: Option<&str>) -> Result<Option<Selection>, AppError> {
        let target = target.map(str::to_string);
        self.request(|reply| Command::ContextTap { target, reply })
            .await?
    }

    pub async fn menu(&self, target: Option<&str>) -> Result<Vec<MenuItem>, AppError> {
        let target = target.map(str::to_string);
        self.request(|reply| Command::Menu { target, reply }).await
    }

    /// Runs a menu action. Returns false when the action was a no-op.
    pub async fn invoke(&self, action: MenuAction, target: Option<&str>) -> Result<bool, AppError> {
        let target = target.map(str::to_string);
        self.request(|reply| Command::Invoke {
            action,
            target,
            reply,
        })
        .await
    }

    pub async fn remove(&self, id: &str) -> Result<bool, AppError> {
        self.invoke(MenuAction::Remove, Some(id)).await
    }

    pub async fn undo(&self) -> Result<bool, AppError> {
        self.invoke(MenuAction::Undo, None).await
    }

    /// Re-runs layout and fits the viewport.
    pub async fn fit(&self) -> Result<(), AppError> {
        self.send(Command::Fit).await
    }

    /// Full reload of the current document.
    pub async fn refresh(&self) -> Result<(), AppError> {
        self.send(Command::Refresh).await
    }

    /// Submits a field edit for any element.
    pub async fn edit(&self, edit: FieldEdit) -> Result<(), AppError> {
        self.send(Command::Edit(edit)).await
    }

    /// Submits a field edit for the element open in the side panel.
    pub async fn edit_selected(&self, key: &str, value: &str) -> Result<(), AppError> {
        let key = key.to_string();
        let value = value.to_string();
        self.request(|reply| Command::EditSelected { key, value, reply })
            .await?
    }

    /// Sends an edited raw document through the reload endpoint.
    pub async fn edit_json(&self, schema_json: Value) -> Result<(), AppError> {
        self.send(Command::EditJson(schema_json)).await
    }

    /// Rasterizes the current view.
    pub async fn export(&self) -> Result<Download, AppError> {
        self.request(|reply| Command::Export { reply }).await?
    }

    /// The current raw document as pretty JSON.
    pub async fn download_document(&self) -> Result<Download, AppError> {
        self.request(|reply| Command::DownloadDocument { reply })
            .await?
    }

    pub async fn state(&self) -> Result<EngineState, AppError> {
        self.request(|reply| Command::State { reply }).await
    }

    /// Resolves once no round trip is in flight.
    pub async fn settle(&self) -> Result<(), AppError> {
        self.request(|reply| Command::Settle { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.send(Command::Shutdown).await
    }
}
