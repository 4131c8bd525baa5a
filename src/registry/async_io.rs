//! Async facade over [`Procs`]
//!
//! Every registry call may block (bounded queues, thread joins on delete), so
//! each one runs on tokio's blocking pool.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::media::Frame;
use crate::processor::PrivateOpt;

use super::repr::ProcsListing;
use super::request::{ProcsFilter, ProcsRequest};
use super::store::Procs;

/// Cloneable async handle to a registry
#[derive(Debug, Clone)]
pub struct AsyncProcs {
    inner: Arc<Procs>,
}

impl AsyncProcs {
    /// Wrap a shared registry
    pub fn new(procs: Arc<Procs>) -> Self {
        Self { inner: procs }
    }

    /// The wrapped registry
    pub fn procs(&self) -> &Arc<Procs> {
        &self.inner
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Procs) -> Result<T> + Send + 'static,
    {
        let procs = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&procs))
            .await
            .map_err(|e| Error::Failed(format!("registry task failed: {e}")))?
    }

    /// See [`Procs::dispatch`]
    pub async fn dispatch(&self, request: ProcsRequest) -> Result<Value> {
        self.run(move |procs| procs.dispatch(request)).await
    }

    /// See [`Procs::post`]
    pub async fn post(&self, proc_name: impl Into<String>, settings: impl Into<String>) -> Result<usize> {
        let (proc_name, settings) = (proc_name.into(), settings.into());
        self.run(move |procs| procs.post(&proc_name, &settings)).await
    }

    /// See [`Procs::delete`]
    pub async fn delete(&self, id: usize) -> Result<()> {
        self.run(move |procs| procs.delete(id)).await
    }

    /// See [`Procs::list`]
    pub async fn list(&self, filter: ProcsFilter) -> Result<ProcsListing> {
        self.run(move |procs| procs.list(&filter)).await
    }

    /// See [`Procs::get`]
    pub async fn get(&self, id: usize) -> Result<Map<String, Value>> {
        self.run(move |procs| procs.get(id)).await
    }

    /// See [`Procs::put`]
    pub async fn put(&self, id: usize, settings: impl Into<String>) -> Result<()> {
        let settings = settings.into();
        self.run(move |procs| procs.put(id, &settings)).await
    }

    /// See [`Procs::unblock`]
    pub async fn unblock(&self, id: usize) -> Result<()> {
        self.run(move |procs| procs.unblock(id)).await
    }

    /// See [`Procs::private_opt`]
    pub async fn private_opt(&self, id: usize, opt: PrivateOpt) -> Result<Value> {
        self.run(move |procs| procs.private_opt(id, opt)).await
    }

    /// Send a frame; the frame is moved to the blocking task
    pub async fn send_frame(&self, id: usize, frame: Frame) -> Result<()> {
        self.run(move |procs| procs.send_frame(id, &frame)).await
    }

    /// Receive a frame
    pub async fn recv_frame(&self, id: usize) -> Result<Frame> {
        self.run(move |procs| procs.recv_frame(id)).await
    }
}
