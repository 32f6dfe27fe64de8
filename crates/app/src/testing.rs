//! In-memory port fakes shared by the unit tests.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;

use kisslight_domain::error::HubError;

use crate::ports::{DeviceRecord, DeviceStore, MessageBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Publish(String, String),
    Subscribe(String),
    Unsubscribe(String),
}

/// Bus that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingBus {
    pub calls: Mutex<Vec<BusCall>>,
    pub failing: Mutex<bool>,
}

impl RecordingBus {
    pub fn calls(&self) -> Vec<BusCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn publishes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BusCall::Publish(topic, payload) => Some((topic, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }

    fn record(&self, call: BusCall) -> Result<(), HubError> {
        if *self.failing.lock().unwrap() {
            return Err(HubError::Bus("bus offline".into()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl MessageBus for RecordingBus {
    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self.record(BusCall::Publish(topic.to_string(), payload.to_string()));
        async { result }
    }

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self.record(BusCall::Subscribe(topic.to_string()));
        async { result }
    }

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self.record(BusCall::Unsubscribe(topic.to_string()));
        async { result }
    }
}

/// Store keeping rows in a vector, with per-operation failure injection.
#[derive(Default)]
pub struct InMemoryStore {
    pub rows: Mutex<Vec<DeviceRecord>>,
    pub failing: Mutex<HashSet<&'static str>>,
}

impl InMemoryStore {
    pub fn with_rows(rows: Vec<DeviceRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
            failing: Mutex::default(),
        }
    }

    pub fn rows(&self) -> Vec<DeviceRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn check(&self, operation: &'static str) -> Result<(), HubError> {
        if self.failing.lock().unwrap().contains(operation) {
            return Err(HubError::Storage(format!("{operation} failed").into()));
        }
        Ok(())
    }

    fn with_row(&self, name: &str, topic: &str, f: impl FnOnce(&mut DeviceRecord)) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.name == name && row.topic == topic) {
            f(row);
        }
    }
}

impl DeviceStore for InMemoryStore {
    fn count(&self) -> impl Future<Output = Result<u64, HubError>> + Send {
        let count = self.rows.lock().unwrap().len() as u64;
        async move { Ok(count) }
    }

    fn dump(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, HubError>> + Send {
        let rows = self.rows();
        async { Ok(rows) }
    }

    fn insert(&self, record: &DeviceRecord) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self.check("insert").map(|()| {
            self.rows.lock().unwrap().push(record.clone());
        });
        async { result }
    }

    fn delete(
        &self,
        name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self.check("delete").map(|()| {
            self.rows
                .lock()
                .unwrap()
                .retain(|row| !(row.name == name && row.topic == topic));
        });
        async { result }
    }

    fn update_state(
        &self,
        name: &str,
        topic: &str,
        state: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self
            .check("update_state")
            .map(|()| self.with_row(name, topic, |row| row.state = state.to_string()));
        async { result }
    }

    fn update_name(
        &self,
        old_name: &str,
        new_name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self
            .check("update_name")
            .map(|()| self.with_row(old_name, topic, |row| row.name = new_name.to_string()));
        async { result }
    }

    fn update_topic(
        &self,
        old_topic: &str,
        new_topic: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = self
            .check("update_topic")
            .map(|()| self.with_row(name, old_topic, |row| row.topic = new_topic.to_string()));
        async { result }
    }
}
