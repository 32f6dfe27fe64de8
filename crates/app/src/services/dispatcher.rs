//! Dispatcher — executes control protocol requests against the registry.
//!
//! Every request touching the registry runs entirely under the shared lock,
//! bus calls included, so requests never interleave with the status handler
//! or a flush cycle. Bus failures are logged and do not undo registry
//! changes; only TRANSMIT reports them to the client.

use kisslight_domain::device::{self, Device, DeviceType};
use kisslight_domain::error::{HubError, RegistryError, ValidationError};
use kisslight_domain::protocol::{ListEntry, Request, Response, UpdateRequest};

use crate::ports::MessageBus;
use crate::registry::SharedRegistry;
use crate::services::topic_binder::TopicBinder;

/// Value shown by STATUS for a command the state does not report.
const UNKNOWN_VALUE: &str = "UNKNOWN";

/// Turns requests into registry mutations, bus traffic, and responses.
pub struct Dispatcher<B> {
    registry: SharedRegistry,
    binder: TopicBinder<B>,
}

impl<B: MessageBus> Dispatcher<B> {
    pub fn new(registry: SharedRegistry, bus: B) -> Self {
        Self {
            registry,
            binder: TopicBinder::new(bus),
        }
    }

    pub fn binder(&self) -> &TopicBinder<B> {
        &self.binder
    }

    /// Parse and execute one request line.
    pub async fn handle_line(&self, line: &str) -> Response {
        match line.parse::<Request>() {
            Ok(request) => self.handle(request).await,
            Err(err) => {
                tracing::debug!(%err, "rejected request");
                err.into()
            }
        }
    }

    /// Execute a parsed request.
    #[tracing::instrument(skip(self))]
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Transmit { topic, message } => self.transmit(topic, &message).await,
            Request::Toggle { name } => self.toggle(&name).await,
            Request::Set {
                name,
                command,
                message,
            } => self.set(&name, command, &message).await,
            Request::Add {
                name,
                topic,
                device_type,
                extra,
            } => self.add(name, topic, &device_type, extra).await,
            Request::Delete { name } => self.delete(&name).await,
            Request::Update(UpdateRequest::Name { name, new_name }) => {
                self.rename(&name, new_name).await
            }
            Request::Update(UpdateRequest::Topic { name, new_topic }) => {
                self.retopic(&name, new_topic).await
            }
            Request::Update(UpdateRequest::State { name }) => self.refresh(&name).await,
            Request::List => self.list().await,
            Request::Status { name } => self.status(&name).await,
            Request::Quit => Response::Goodbye,
        }
    }

    async fn transmit(&self, topic: String, message: &str) -> Response {
        match self.binder.bus().publish(&topic, message).await {
            Ok(()) => Response::Transmitted { topic },
            Err(err) => {
                tracing::warn!(%err, %topic, "transmit failed");
                Response::BusError { topic }
            }
        }
    }

    async fn toggle(&self, name: &str) -> Response {
        let registry = self.registry.lock().await;
        let Some(device) = registry.find(name).and_then(|index| registry.get(index)) else {
            return no_such_device(name);
        };
        let command = device.device_type.toggle_command();
        log_bus_failure(
            self.binder.send(&device.topic, command, "TOGGLE").await,
            &device.topic,
        );
        Response::Toggled {
            name: device.name.clone(),
        }
    }

    async fn set(&self, name: &str, command: String, message: &str) -> Response {
        let registry = self.registry.lock().await;
        let Some(device) = registry.find(name).and_then(|index| registry.get(index)) else {
            return no_such_device(name);
        };
        if !device.commands.contains(&command) {
            return Response::InvalidArgument { argument: command };
        }
        log_bus_failure(
            self.binder.send(&device.topic, &command, message).await,
            &device.topic,
        );
        Response::CommandSet {
            name: device.name.clone(),
            command: command.to_ascii_uppercase(),
        }
    }

    async fn add(
        &self,
        name: String,
        topic: String,
        device_type: &str,
        extra: Option<String>,
    ) -> Response {
        let Some(kind) = device_type
            .parse::<i64>()
            .ok()
            .and_then(|code| DeviceType::from_code(code).ok())
        else {
            return Response::InvalidArgument {
                argument: device_type.to_string(),
            };
        };
        let mut builder = Device::builder()
            .name(name.clone())
            .topic(topic.clone())
            .device_type(kind);
        if let Some(extra) = extra.clone() {
            builder = builder.extra(extra);
        }
        let device = match builder.build() {
            Ok(device) => device,
            Err(HubError::Validation(err)) => {
                return invalid_field(&err, &name, &topic, extra.as_deref());
            }
            Err(err) => {
                tracing::warn!(%err, %name, "unexpected error building device");
                return Response::BadRequest;
            }
        };

        let mut registry = self.registry.lock().await;
        match registry.insert(device) {
            Ok(_) => {}
            Err(RegistryError::Duplicate(name)) => return Response::Duplicate { name },
            Err(RegistryError::Full { capacity }) => {
                tracing::warn!(%name, capacity, "registry full, device not added");
                return Response::RegistryFull { name };
            }
        }
        log_bus_failure(self.binder.attach(&topic).await, &topic);
        tracing::info!(%name, %topic, device_type = %kind, "device added");
        Response::Added { name }
    }

    async fn delete(&self, name: &str) -> Response {
        let mut registry = self.registry.lock().await;
        let Some(index) = registry.find(name) else {
            return no_such_device(name);
        };
        if let Some(device) = registry.get(index) {
            log_bus_failure(self.binder.detach(&device.topic).await, &device.topic);
        }
        let Some(device) = registry.remove(index) else {
            return no_such_device(name);
        };
        tracing::info!(name = %device.name, "device deleted");
        Response::Deleted { name: device.name }
    }

    async fn rename(&self, name: &str, new_name: String) -> Response {
        if let Err(err) = device::validate_name(&new_name) {
            tracing::debug!(%err, "rejected new name");
            return Response::InvalidArgument { argument: new_name };
        }
        let mut registry = self.registry.lock().await;
        let Some(index) = registry.find(name) else {
            return no_such_device(name);
        };
        match registry.rename(index, &new_name) {
            Ok(Some(old)) => {
                tracing::info!(%old, new = %new_name, "device renamed");
                Response::Renamed { old, new: new_name }
            }
            Ok(None) => no_such_device(name),
            Err(_) => Response::Duplicate { name: new_name },
        }
    }

    async fn retopic(&self, name: &str, new_topic: String) -> Response {
        if let Err(err) = device::validate_topic(&new_topic) {
            tracing::debug!(%err, "rejected new topic");
            return Response::InvalidArgument {
                argument: new_topic,
            };
        }
        let mut registry = self.registry.lock().await;
        let Some(index) = registry.find(name) else {
            return no_such_device(name);
        };
        let Some(device) = registry.get(index) else {
            return no_such_device(name);
        };
        let old_topic = device.topic.clone();
        let device_name = device.name.clone();

        log_bus_failure(
            self.binder.announce_topic(&old_topic, &new_topic).await,
            &old_topic,
        );
        log_bus_failure(self.binder.detach(&old_topic).await, &old_topic);
        registry.retopic(index, &new_topic);
        log_bus_failure(self.binder.subscribe(&new_topic).await, &new_topic);

        tracing::info!(name = %device_name, old = %old_topic, new = %new_topic, "device topic changed");
        Response::TopicChanged {
            name: device_name,
            topic: new_topic,
        }
    }

    async fn refresh(&self, name: &str) -> Response {
        let mut registry = self.registry.lock().await;
        let Some(index) = registry.find(name) else {
            return no_such_device(name);
        };
        let Some(device) = registry.get(index) else {
            return no_such_device(name);
        };
        let device_name = device.name.clone();
        log_bus_failure(
            self.binder.request_state(&device.topic).await,
            &device.topic,
        );
        registry.touch_state(index);
        Response::StateRequested { name: device_name }
    }

    async fn list(&self) -> Response {
        let registry = self.registry.lock().await;
        Response::List(
            registry
                .occupied()
                .map(|(_, device)| ListEntry {
                    name: device.name.clone(),
                    topic: device.topic.clone(),
                    type_label: device.device_type.label(),
                })
                .collect(),
        )
    }

    async fn status(&self, name: &str) -> Response {
        let registry = self.registry.lock().await;
        let Some(device) = registry.find(name).and_then(|index| registry.get(index)) else {
            return no_such_device(name);
        };
        let values = device
            .commands
            .iter()
            .map(|command| {
                let value = device.state.get(command).unwrap_or(UNKNOWN_VALUE);
                (command.to_string(), value.to_string())
            })
            .collect();
        Response::Status {
            name: device.name.clone(),
            values,
        }
    }
}

fn no_such_device(name: &str) -> Response {
    Response::NoSuchDevice {
        name: name.to_string(),
    }
}

/// Name the ADD argument a validation error points at.
fn invalid_field(err: &ValidationError, name: &str, topic: &str, extra: Option<&str>) -> Response {
    tracing::debug!(%err, "rejected device");
    let argument = match err {
        ValidationError::EmptyName | ValidationError::TooLong { field: "name", .. } => name,
        ValidationError::EmptyTopic | ValidationError::TooLong { field: "topic", .. } => topic,
        _ => extra.unwrap_or("extra"),
    };
    Response::InvalidArgument {
        argument: argument.to_string(),
    }
}

fn log_bus_failure(result: Result<(), HubError>, topic: &str) {
    if let Err(err) = result {
        tracing::warn!(%err, topic, "bus call failed, registry change kept");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kisslight_domain::change::ChangeCode;

    use super::*;
    use crate::registry::Registry;
    use crate::testing::{BusCall, RecordingBus};

    fn dispatcher(capacity: usize) -> Dispatcher<Arc<RecordingBus>> {
        let registry = Arc::new(tokio::sync::Mutex::new(Registry::with_capacity(capacity)));
        Dispatcher::new(registry, Arc::new(RecordingBus::default()))
    }

    async fn run(dispatcher: &Dispatcher<Arc<RecordingBus>>, line: &str) -> Response {
        dispatcher.handle_line(line).await
    }

    fn bus(dispatcher: &Dispatcher<Arc<RecordingBus>>) -> &RecordingBus {
        dispatcher.binder().bus()
    }

    async fn change_of(dispatcher: &Dispatcher<Arc<RecordingBus>>, name: &str) -> ChangeCode {
        let registry = dispatcher.registry.lock().await;
        let index = registry.find(name).unwrap();
        registry.slots()[index].change
    }

    #[tokio::test]
    async fn should_bind_topics_and_stage_insert_when_adding() {
        let dispatcher = dispatcher(4);
        let response = run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        assert_eq!(
            response,
            Response::Added {
                name: "lamp1".to_string()
            }
        );
        assert_eq!(
            bus(&dispatcher).calls(),
            vec![
                BusCall::Subscribe("stat/lamp1/RESULT".to_string()),
                BusCall::Publish("cmnd/lamp1/STATE".to_string(), String::new()),
            ]
        );
        assert_eq!(change_of(&dispatcher, "lamp1").await, ChangeCode::Insert);
    }

    #[tokio::test]
    async fn should_report_template_power_in_status_after_add() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        let response = run(&dispatcher, "STATUS lamp1 KL/0.3").await;
        assert_eq!(
            response,
            Response::Status {
                name: "lamp1".to_string(),
                values: vec![("POWER".to_string(), "UKNOWN".to_string())],
            }
        );
    }

    #[tokio::test]
    async fn should_show_unknown_for_commands_missing_from_state() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD bulb bulb 2 KL/0.3").await;
        let Response::Status { values, .. } = run(&dispatcher, "STATUS bulb KL/0.3").await else {
            panic!("expected status response");
        };
        assert_eq!(values[1], ("DIMMER".to_string(), "UNKNOWN".to_string()));
    }

    #[tokio::test]
    async fn should_publish_valid_command_and_reject_invalid_one() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        let before = bus(&dispatcher).publishes().len();

        let ok = run(&dispatcher, "SET lamp1 POWER ON KL/0.3").await;
        assert_eq!(ok.code(), 201);
        let publishes = bus(&dispatcher).publishes();
        assert_eq!(
            publishes.last().unwrap(),
            &("cmnd/lamp1/POWER".to_string(), "ON".to_string())
        );

        let rejected = run(&dispatcher, "SET lamp1 DIMMER 50 KL/0.3").await;
        assert_eq!(
            rejected,
            Response::InvalidArgument {
                argument: "DIMMER".to_string()
            }
        );
        assert_eq!(bus(&dispatcher).publishes().len(), before + 1);
    }

    #[tokio::test]
    async fn should_toggle_power_zero_for_power_strip() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD strip strip 1 3 KL/0.3").await;
        run(&dispatcher, "ADD lamp lamp 0 KL/0.3").await;
        run(&dispatcher, "TOGGLE STRIP KL/0.3").await;
        run(&dispatcher, "TOGGLE lamp KL/0.3").await;
        let publishes = bus(&dispatcher).publishes();
        assert!(publishes.contains(&("cmnd/strip/POWER0".to_string(), "TOGGLE".to_string())));
        assert!(publishes.contains(&("cmnd/lamp/POWER".to_string(), "TOGGLE".to_string())));
    }

    #[tokio::test]
    async fn should_rebind_topics_in_order_when_topic_changes() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        let offset = bus(&dispatcher).calls().len();

        let response = run(&dispatcher, "UPDATE TOPIC lamp1 lamp1b KL/0.3").await;
        assert_eq!(response.code(), 209);
        assert_eq!(
            bus(&dispatcher).calls()[offset..].to_vec(),
            vec![
                BusCall::Publish("cmnd/lamp1/TOPIC".to_string(), "lamp1b".to_string()),
                BusCall::Unsubscribe("stat/lamp1/RESULT".to_string()),
                BusCall::Subscribe("stat/lamp1b/RESULT".to_string()),
            ]
        );
        let registry = dispatcher.registry.lock().await;
        assert_eq!(registry.find_by_status_topic("stat/lamp1/RESULT"), None);
        assert!(registry.find_by_status_topic("stat/lamp1b/RESULT").is_some());
    }

    #[tokio::test]
    async fn should_reject_duplicate_add_and_rename() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        run(&dispatcher, "ADD lamp2 lamp2 0 KL/0.3").await;
        assert_eq!(run(&dispatcher, "ADD LAMP1 other 0 KL/0.3").await.code(), 408);
        assert_eq!(
            run(&dispatcher, "UPDATE NAME lamp2 Lamp1 KL/0.3").await.code(),
            408
        );
        let renamed = run(&dispatcher, "UPDATE NAME lamp2 lamp3 KL/0.3").await;
        assert_eq!(
            renamed,
            Response::Renamed {
                old: "lamp2".to_string(),
                new: "lamp3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn should_answer_full_when_registry_has_no_free_slot() {
        let dispatcher = dispatcher(1);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        let response = run(&dispatcher, "ADD lamp2 lamp2 0 KL/0.3").await;
        assert_eq!(response.code(), 403);
    }

    #[tokio::test]
    async fn should_reject_invalid_type_and_missing_extra() {
        let dispatcher = dispatcher(4);
        assert_eq!(
            run(&dispatcher, "ADD lamp1 lamp1 9 KL/0.3").await,
            Response::InvalidArgument {
                argument: "9".to_string()
            }
        );
        assert_eq!(run(&dispatcher, "ADD strip strip 1 KL/0.3").await.code(), 405);
        assert_eq!(run(&dispatcher, "ADD fan fan 7 KL/0.3").await.code(), 405);
        assert!(bus(&dispatcher).calls().is_empty());
    }

    #[tokio::test]
    async fn should_unsubscribe_and_stage_delete_when_deleting() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        let response = run(&dispatcher, "DELETE lamp1 KL/0.3").await;
        assert_eq!(response.code(), 203);
        assert_eq!(
            bus(&dispatcher).calls().last().unwrap(),
            &BusCall::Unsubscribe("stat/lamp1/RESULT".to_string())
        );
        assert_eq!(run(&dispatcher, "STATUS lamp1 KL/0.3").await.code(), 404);
    }

    #[tokio::test]
    async fn should_request_state_and_stage_state_write() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        dispatcher.registry.lock().await.slots_mut()[0].settle();

        let response = run(&dispatcher, "UPDATE STATE lamp1 KL/0.3").await;
        assert_eq!(response.code(), 210);
        assert_eq!(
            bus(&dispatcher).publishes().last().unwrap(),
            &("cmnd/lamp1/STATE".to_string(), String::new())
        );
        assert_eq!(change_of(&dispatcher, "lamp1").await, ChangeCode::State);
    }

    #[tokio::test]
    async fn should_list_devices_with_type_labels() {
        let dispatcher = dispatcher(4);
        run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await;
        run(&dispatcher, "ADD bulb bulbt 6 KL/0.3").await;
        let response = run(&dispatcher, "LIST KL/0.3").await;
        assert_eq!(
            response.to_string(),
            "KL/0.3 204 2 devices\nlamp1 lamp1 outlet/toggleable\nbulb bulbt rgbcctbulb\n.\n"
        );
    }

    #[tokio::test]
    async fn should_surface_bus_error_only_for_transmit() {
        let dispatcher = dispatcher(4);
        bus(&dispatcher).fail();
        assert_eq!(
            run(&dispatcher, "TRANSMIT cmnd/x/POWER ON KL/0.3").await,
            Response::BusError {
                topic: "cmnd/x/POWER".to_string()
            }
        );
        assert_eq!(run(&dispatcher, "ADD lamp1 lamp1 0 KL/0.3").await.code(), 202);
    }

    #[tokio::test]
    async fn should_answer_unknown_device_for_every_lookup_verb() {
        let dispatcher = dispatcher(4);
        for line in [
            "TOGGLE ghost KL/0.3",
            "SET ghost POWER ON KL/0.3",
            "DELETE ghost KL/0.3",
            "UPDATE NAME ghost spirit KL/0.3",
            "UPDATE TOPIC ghost spirit KL/0.3",
            "UPDATE STATE ghost KL/0.3",
            "STATUS ghost KL/0.3",
        ] {
            assert_eq!(run(&dispatcher, line).await.code(), 404, "{line}");
        }
    }

    #[tokio::test]
    async fn should_answer_goodbye_on_quit() {
        let dispatcher = dispatcher(1);
        assert!(run(&dispatcher, "QUIT").await.closes_connection());
        assert_eq!(run(&dispatcher, "DANCE KL/0.3").await.code(), 400);
    }
}
