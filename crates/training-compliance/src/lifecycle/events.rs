use std::sync::Arc;

use tracing::warn;

use super::domain::Employee;

/// Outbound hooks for employee bookkeeping (document folders, archival).
///
/// Subscribers run after the core has committed; their failures are logged
/// and never undo the committed change.
pub trait EmployeeEventSubscriber: Send + Sync {
    fn name(&self) -> &str;

    fn on_employee_created(&self, _employee: &Employee) -> Result<(), SubscriberError> {
        Ok(())
    }

    fn on_employee_id_changed(
        &self,
        _employee: &Employee,
        _previous_number: &str,
    ) -> Result<(), SubscriberError> {
        Ok(())
    }

    fn on_employee_deleted(&self, _employee: &Employee) -> Result<(), SubscriberError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("subscriber failed: {0}")]
pub struct SubscriberError(pub String);

/// Fan-out dispatcher for `EmployeeEventSubscriber`s.
#[derive(Clone, Default)]
pub struct EmployeeEvents {
    subscribers: Vec<Arc<dyn EmployeeEventSubscriber>>,
}

impl EmployeeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn EmployeeEventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Returns the number of subscribers that failed.
    pub fn employee_created(&self, employee: &Employee) -> usize {
        self.dispatch("employee_created", |subscriber| {
            subscriber.on_employee_created(employee)
        })
    }

    pub fn employee_id_changed(&self, employee: &Employee, previous_number: &str) -> usize {
        self.dispatch("employee_id_changed", |subscriber| {
            subscriber.on_employee_id_changed(employee, previous_number)
        })
    }

    pub fn employee_deleted(&self, employee: &Employee) -> usize {
        self.dispatch("employee_deleted", |subscriber| {
            subscriber.on_employee_deleted(employee)
        })
    }

    fn dispatch<F>(&self, event: &'static str, mut notify: F) -> usize
    where
        F: FnMut(&dyn EmployeeEventSubscriber) -> Result<(), SubscriberError>,
    {
        let mut failures = 0;
        for subscriber in &self.subscribers {
            if let Err(err) = notify(subscriber.as_ref()) {
                failures += 1;
                warn!(event, subscriber = subscriber.name(), error = %err, "employee subscriber failed");
            }
        }
        failures
    }
}

impl std::fmt::Debug for EmployeeEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmployeeEvents")
            .field(
                "subscribers",
                &self
                    .subscribers
                    .iter()
                    .map(|subscriber| subscriber.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
