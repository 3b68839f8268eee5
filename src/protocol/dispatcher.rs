//! Handler registry keyed by method name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::schema::ServiceSpec;
use crate::core::value::{StructValue, Value};
use crate::error::{ProtocolError, Result};
use crate::protocol::exception::{ApplicationException, ExceptionKind};

/// Outcome of a handler: the return value (`None` for void) or a failure.
pub type HandlerResult = std::result::Result<Option<Value>, HandlerError>;

type HandlerFn = dyn Fn(&StructValue) -> HandlerResult + Send + Sync + 'static;

/// How a handler can fail.
#[derive(Debug, Clone)]
pub enum HandlerError {
    /// One of the method's declared exception structs.
    Declared(StructValue),
    /// Sent to the caller unchanged as an EXCEPTION message.
    Application(ApplicationException),
    /// Anything else; reported to the caller as INTERNAL_ERROR.
    Internal(String),
}

impl HandlerError {
    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Declared(exc) => write!(f, "declared exception {}", exc.spec().name()),
            HandlerError::Application(exc) => write!(f, "{exc}"),
            HandlerError::Internal(message) => f.write_str(message),
        }
    }
}

impl From<ApplicationException> for HandlerError {
    fn from(exc: ApplicationException) -> Self {
        HandlerError::Application(exc)
    }
}

impl From<ProtocolError> for HandlerError {
    fn from(err: ProtocolError) -> Self {
        HandlerError::Internal(err.to_string())
    }
}

/// Method-name routing table for one service.
///
/// Built once before serving and read-only afterwards, so workers share it
/// without locking.
pub struct Dispatcher {
    service: Arc<ServiceSpec>,
    handlers: HashMap<String, Box<HandlerFn>>,
}

impl Dispatcher {
    pub fn new(service: Arc<ServiceSpec>) -> Self {
        Self {
            service,
            handlers: HashMap::new(),
        }
    }

    pub fn service(&self) -> &Arc<ServiceSpec> {
        &self.service
    }

    /// Register the handler for a declared method.
    pub fn register<F>(&mut self, method: &str, handler: F) -> Result<()>
    where
        F: Fn(&StructValue) -> HandlerResult + Send + Sync + 'static,
    {
        if self.service.method(method).is_none() {
            return Err(ProtocolError::UnknownMethod(format!(
                "{} does not declare '{method}'",
                self.service.name()
            )));
        }
        self.handlers.insert(method.to_string(), Box::new(handler));
        Ok(())
    }

    /// Builder-style [`Dispatcher::register`].
    pub fn with<F>(mut self, method: &str, handler: F) -> Result<Self>
    where
        F: Fn(&StructValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(method, handler)?;
        Ok(self)
    }

    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Declared methods without a registered handler.
    pub fn unhandled(&self) -> impl Iterator<Item = &str> {
        self.service
            .methods()
            .map(|m| m.name())
            .filter(|name| !self.handlers.contains_key(*name))
    }

    pub fn dispatch(&self, method: &str, args: &StructValue) -> HandlerResult {
        match self.handlers.get(method) {
            Some(handler) => handler(args),
            None => Err(HandlerError::Application(ApplicationException::new(
                ExceptionKind::UnknownMethod,
                format!("unknown method: {method}"),
            ))),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &self.service.name())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::schema::{MethodSpec, TypeSpec};

    fn service() -> Arc<ServiceSpec> {
        ServiceSpec::builder("Svc")
            .method(
                MethodSpec::builder("ping")
                    .returns(TypeSpec::String)
                    .build()
                    .unwrap(),
            )
            .method(MethodSpec::builder("idle").build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_undeclared_method_cannot_be_registered() {
        let err = Dispatcher::new(service())
            .with("pong", |_| Ok(None))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMethod(_)));
    }

    #[test]
    fn test_dispatch_routes_by_name() {
        let dispatcher = Dispatcher::new(service())
            .with("ping", |_| Ok(Some(Value::from("pong"))))
            .unwrap();
        let args = StructValue::new(dispatcher.service().method("ping").unwrap().args());

        assert_eq!(dispatcher.dispatch("ping", &args).unwrap(), Some(Value::from("pong")));
        assert!(dispatcher.has_handler("ping"));
        assert_eq!(dispatcher.unhandled().collect::<Vec<_>>(), vec!["idle"]);

        match dispatcher.dispatch("idle", &args) {
            Err(HandlerError::Application(exc)) => {
                assert_eq!(exc.kind, ExceptionKind::UnknownMethod)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
