//! Isolated subscriber invocation and first-failure-wins aggregation.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::callback::{Callback, CallbackId};
use crate::error::DispatchError;

/// One failed subscriber invocation.
#[derive(Debug, Clone)]
pub(crate) struct SubscriberFailure {
    pub callback: CallbackId,
    pub message: String,
    pub panicked: bool,
}

/// Invoke `callback`, converting both `Err` returns and panics into a failure.
pub(crate) fn invoke_isolated<T: 'static>(
    callback: &Callback<T>,
    value: &T,
) -> Result<(), SubscriberFailure> {
    match catch_unwind(AssertUnwindSafe(|| callback.call(value))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SubscriberFailure {
            callback: callback.id().clone(),
            message: format!("{e:#}"),
            panicked: false,
        }),
        Err(payload) => Err(SubscriberFailure {
            callback: callback.id().clone(),
            message: panic_message(payload.as_ref()),
            panicked: true,
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Keeps the first failure of a drain loop and counts the rest.
#[derive(Debug, Default)]
pub(crate) struct FailureLog {
    first: Option<SubscriberFailure>,
    count: usize,
}

impl FailureLog {
    pub fn record(&mut self, failure: SubscriberFailure) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(failure);
        }
    }

    /// Invoke every recipient with `value`, recording failures.
    ///
    /// `component` prefixes the log line emitted per failure when `log_each` is set.
    pub fn dispatch<T: 'static>(
        &mut self,
        recipients: &[Callback<T>],
        value: &T,
        component: &str,
        log_each: bool,
    ) {
        for callback in recipients {
            if let Err(failure) = invoke_isolated(callback, value) {
                if log_each {
                    log::error!(
                        "[{component}] Subscriber {} {}: {}",
                        failure.callback,
                        if failure.panicked { "panicked" } else { "failed" },
                        failure.message
                    );
                }
                self.record(failure);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn into_result(self) -> Result<(), DispatchError> {
        match self.first {
            None => Ok(()),
            Some(first) => Err(DispatchError {
                first: first.callback,
                message: first.message,
                panicked: first.panicked,
                failures: self.count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_isolated_catches_panic() {
        let cb = Callback::<i32>::named("boom", |_| panic!("kaboom"));
        let failure = invoke_isolated(&cb, &1).unwrap_err();
        assert!(failure.panicked);
        assert_eq!(failure.message, "kaboom");
        assert_eq!(failure.callback, *cb.id());
    }

    #[test]
    fn test_invoke_isolated_formatted_panic() {
        let cb = Callback::<i32>::new(|v| panic!("bad value {v}"));
        let failure = invoke_isolated(&cb, &3).unwrap_err();
        assert_eq!(failure.message, "bad value 3");
    }

    #[test]
    fn test_failure_log_keeps_first() {
        let first = Callback::<i32>::fallible_named("first", |_| anyhow::bail!("one"));
        let second = Callback::<i32>::fallible_named("second", |_| anyhow::bail!("two"));
        let ok = Callback::<i32>::named("ok", |_| {});

        let mut log = FailureLog::default();
        log.dispatch(&[first.clone(), ok, second], &0, "test", false);
        assert!(!log.is_empty());

        let err = log.into_result().unwrap_err();
        assert_eq!(err.first, *first.id());
        assert_eq!(err.message, "one");
        assert!(!err.panicked);
        assert_eq!(err.failures, 2);
    }

    #[test]
    fn test_empty_failure_log_is_ok() {
        assert!(FailureLog::default().into_result().is_ok());
    }
}
