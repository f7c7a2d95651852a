use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    catalog::{
        Catalog, CatalogError,
        model::{BookAndAuthors, BookDraft},
    },
    filter::{Filter, ids::IdSet},
    types::BookId,
};

use super::events::CatalogEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("catalog runtime has stopped")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Commands that may wait for the writer before senders block.
    pub command_queue_bound: usize,
    /// Events buffered per subscriber before slow subscribers lag.
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
        }
    }
}

/// Cloneable handle to the catalog writer.
#[derive(Clone)]
pub struct CatalogHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<CatalogEvent>,
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    AddBook {
        draft: BookDraft,
        replace: bool,
        resp: Reply<BookId>,
    },
    UpdateBook {
        id: BookId,
        draft: BookDraft,
        resp: Reply<bool>,
    },
    DeleteBooks {
        ids: IdSet,
        filter: Option<Filter>,
        resp: Reply<usize>,
    },
    QueryIds {
        filter: Option<Filter>,
        resp: Reply<Vec<BookId>>,
    },
    GetBook {
        id: BookId,
        resp: Reply<Option<BookAndAuthors>>,
    },
    Undo {
        resp: Reply<bool>,
    },
    Redo {
        resp: Reply<bool>,
    },
    CanUndo {
        resp: Reply<bool>,
    },
    CanRedo {
        resp: Reply<bool>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

/// Moves `catalog` onto a blocking worker that applies commands one at a
/// time. Must be called from within a tokio runtime.
pub fn spawn_catalog(catalog: Catalog, config: RuntimeConfig) -> CatalogHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<CatalogEvent>(config.event_capacity.max(1));
    let events_tx_loop = events_tx.clone();

    tokio::task::spawn_blocking(move || {
        let mut catalog = catalog;
        while let Some(cmd) = cmd_rx.blocking_recv() {
            match cmd {
                Command::Shutdown { resp } => {
                    let _ = resp.send(catalog.close().map_err(RuntimeError::from));
                    tracing::debug!("catalog runtime shut down");
                    return;
                }
                cmd => handle_command(cmd, &mut catalog, &events_tx_loop),
            }
        }
        tracing::debug!("all catalog handles dropped");
    });

    CatalogHandle { cmd_tx, events_tx }
}

impl CatalogHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events_tx.subscribe()
    }

    /// Adds a book. With `replace`, a book with the same volume and source
    /// id is replaced; otherwise the add is refused and returns 0.
    pub async fn add_book(&self, draft: BookDraft, replace: bool) -> Result<BookId, RuntimeError> {
        self.request(|resp| Command::AddBook { draft, replace, resp }).await
    }

    pub async fn update_book(&self, id: BookId, draft: BookDraft) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::UpdateBook { id, draft, resp }).await
    }

    pub async fn delete_books(
        &self,
        ids: IdSet,
        filter: Option<Filter>,
    ) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::DeleteBooks { ids, filter, resp }).await
    }

    pub async fn query_ids(&self, filter: Option<Filter>) -> Result<Vec<BookId>, RuntimeError> {
        self.request(|resp| Command::QueryIds { filter, resp }).await
    }

    pub async fn get_book(&self, id: BookId) -> Result<Option<BookAndAuthors>, RuntimeError> {
        self.request(|resp| Command::GetBook { id, resp }).await
    }

    pub async fn undo(&self) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Undo { resp }).await
    }

    pub async fn redo(&self) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Redo { resp }).await
    }

    pub async fn can_undo(&self) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::CanUndo { resp }).await
    }

    pub async fn can_redo(&self) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::CanRedo { resp }).await
    }

    /// Closes the catalog and stops the writer.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

fn handle_command(
    cmd: Command,
    catalog: &mut Catalog,
    events_tx: &broadcast::Sender<CatalogEvent>,
) {
    match cmd {
        Command::AddBook { draft, replace, resp } => {
            let res = catalog.add_book(&draft, |_| replace).map_err(RuntimeError::from);
            match res {
                Ok(id) if id != 0 => {
                    let _ = events_tx.send(CatalogEvent::BookAdded { id });
                }
                _ => {}
            }
            let _ = resp.send(res);
        }
        Command::UpdateBook { id, draft, resp } => {
            let res = catalog.update_book(id, &draft).map_err(RuntimeError::from);
            if let Ok(true) = res {
                let _ = events_tx.send(CatalogEvent::BookUpdated { id });
            }
            let _ = resp.send(res);
        }
        Command::DeleteBooks { ids, filter, resp } => {
            let res = catalog.delete_books(ids, filter.as_ref()).map_err(RuntimeError::from);
            match res {
                Ok(count) if count > 0 => {
                    let _ = events_tx.send(CatalogEvent::BooksDeleted { count });
                }
                _ => {}
            }
            let _ = resp.send(res);
        }
        Command::QueryIds { filter, resp } => {
            let _ = resp.send(catalog.book_ids(filter.as_ref()).map_err(RuntimeError::from));
        }
        Command::GetBook { id, resp } => {
            let _ = resp.send(catalog.get_book_and_authors(id).map_err(RuntimeError::from));
        }
        Command::Undo { resp } => {
            let res = catalog.undo().map_err(RuntimeError::from);
            if let Ok(true) = res {
                let _ = events_tx.send(CatalogEvent::UndoApplied);
            }
            let _ = resp.send(res);
        }
        Command::Redo { resp } => {
            let res = catalog.redo().map_err(RuntimeError::from);
            if let Ok(true) = res {
                let _ = events_tx.send(CatalogEvent::RedoApplied);
            }
            let _ = resp.send(res);
        }
        Command::CanUndo { resp } => {
            let _ = resp.send(Ok(catalog.can_undo()));
        }
        Command::CanRedo { resp } => {
            let _ = resp.send(Ok(catalog.can_redo()));
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(Ok(()));
        }
    }
}
