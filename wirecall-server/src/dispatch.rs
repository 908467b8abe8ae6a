//! Method registry and request dispatch.
//!
//! Handlers are registered against method names before the server starts,
//! then the dispatcher is shared read-only across connection workers. Each
//! handler runs on its own task so a panicking handler is contained and
//! reported as a `MethodInternal` fault instead of tearing down the
//! connection.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use wirecall_protocol::frame::validate_method_name;
use wirecall_protocol::{ErrorCode, Fault, Request, Response, ERROR_METHOD, WARNING_METHOD};
use wirecall_schema::CompiledSchema;

use crate::error::ServerError;
use crate::session::Session;

/// What a handler produces: a response payload, or a fault.
pub type HandlerResult = Result<Map<String, Value>, Fault>;

type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
type Handler = Arc<dyn Fn(Request, Arc<Session>) -> HandlerFuture + Send + Sync>;

/// Maps method names to handlers and dispatches decoded requests.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
    schema: Option<Arc<CompiledSchema>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a compiled schema; request payloads are then validated
    /// before their handler runs.
    pub fn with_schema(mut self, schema: Arc<CompiledSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Registers a handler for a method name, replacing any existing
    /// registration for that name.
    ///
    /// Names must be valid on the wire and not collide with the reserved
    /// `__error`/`__warning` tags.
    pub fn register<F, Fut>(&mut self, method_name: &str, handler: F) -> Result<(), ServerError>
    where
        F: Fn(Request, Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        validate_method_name(method_name)?;
        if method_name == ERROR_METHOD || method_name == WARNING_METHOD {
            return Err(ServerError::ReservedMethod(method_name.to_string()));
        }
        let wrapped: Handler =
            Arc::new(move |request, session| Box::pin(handler(request, session)));
        let previous = self.handlers.insert(method_name.to_string(), wrapped);
        if previous.is_some() {
            tracing::debug!("Replaced handler for method {}", method_name);
        }
        Ok(())
    }

    /// Merges another dispatcher's registrations into this one. Clashing
    /// names follow [`register`](Self::register) semantics: the incoming
    /// handler replaces the existing one.
    pub fn include(&mut self, other: Dispatcher) {
        for (name, handler) in other.handlers {
            if self.handlers.insert(name.clone(), handler).is_some() {
                tracing::debug!("Replaced handler for method {}", name);
            }
        }
    }

    /// Registered method names.
    pub fn method_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Decodes and dispatches one frame, always producing a response.
    ///
    /// An undecodable frame yields an error response tagged `__warning` or
    /// `__error` (by fault severity) with the zero trace ID, since no
    /// request context exists to correlate against.
    pub async fn dispatch_frame(&self, frame: &[u8], session: &Arc<Session>) -> Response {
        match Request::decode(frame) {
            Ok(request) => self.dispatch(request, session).await,
            Err(e) => {
                tracing::warn!("Dropping undecodable frame: {}", e);
                Response::from_fault(&e.fault(), None)
            }
        }
    }

    /// Dispatches a decoded request, always producing a response.
    pub async fn dispatch(&self, request: Request, session: &Arc<Session>) -> Response {
        if let Some(ref schema) = self.schema {
            let payload = Value::Object(request.payload.clone());
            if let Err(fault) = schema.validate_request(&request.method_name, &payload) {
                return Response::from_fault(&fault, Some(&request));
            }
        }

        let Some(handler) = self.handlers.get(&request.method_name) else {
            let fault = Fault::unknown_method(&request.method_name);
            return Response::from_fault(&fault, Some(&request));
        };

        // Run the handler on its own task so a panic surfaces as a
        // JoinError here instead of unwinding through the connection loop.
        let handler = handler.clone();
        let task_request = request.clone();
        let task_session = session.clone();
        let task = tokio::spawn(async move { handler(task_request, task_session).await });

        match task.await {
            Ok(Ok(payload)) => Response::ok(&request).with_payload(payload),
            Ok(Err(fault)) => {
                tracing::debug!(
                    "Method {} failed: {} (trace_id={})",
                    request.method_name,
                    fault.error_code,
                    request.trace_id
                );
                Response::from_fault(&fault, Some(&request))
            }
            Err(join_error) => {
                let kind = if join_error.is_panic() {
                    "panic"
                } else {
                    "cancelled"
                };
                tracing::error!(
                    "Method {} aborted ({}): {} (trace_id={})",
                    request.method_name,
                    kind,
                    join_error,
                    request.trace_id
                );
                let fault = Fault::wrap(ErrorCode::MethodInternal, &join_error)
                    .with_detail("kind", kind);
                Response::from_fault(&fault, Some(&request))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wirecall_protocol::{ZERO_TRACE_ID, WARNING_METHOD};
    use wirecall_schema::AnnotationSchema;

    fn test_session() -> Arc<Session> {
        Arc::new(Session::new("127.0.0.1:12345".parse().unwrap()))
    }

    fn echo_dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("echo", |request: Request, _session| async move {
                Ok(request.payload)
            })
            .unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let dispatcher = echo_dispatcher();
        let mut payload = Map::new();
        payload.insert("n".to_string(), json!(1));
        let request = Request::new("echo").with_payload(payload.clone());
        let trace_id = request.trace_id.clone();

        let response = dispatcher.dispatch(request, &test_session()).await;
        assert!(response.success);
        assert_eq!(response.method_name, "echo");
        assert_eq!(response.trace_id, trace_id);
        assert_eq!(response.payload, payload);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let dispatcher = echo_dispatcher();
        let request = Request::new("missing");
        let response = dispatcher.dispatch(request, &test_session()).await;
        assert!(!response.success);
        assert_eq!(response.method_name, "missing");
        assert_eq!(response.payload["error_code"], "UnknownMethod");
        assert_eq!(response.payload["details"]["method"], "missing");
    }

    #[tokio::test]
    async fn test_handler_fault_is_contained() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("fail", |_request: Request, _session| async move {
                Err(Fault::new(ErrorCode::MethodInternal).with_detail("reason", "boom"))
            })
            .unwrap();

        let response = dispatcher
            .dispatch(Request::new("fail"), &test_session())
            .await;
        assert!(!response.success);
        assert_eq!(response.payload["error_code"], "MethodInternal");
        assert_eq!(response.payload["details"]["reason"], "boom");
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("explode", |_request: Request, _session| async move {
                panic!("handler bug");
                #[allow(unreachable_code)]
                Ok(Map::new())
            })
            .unwrap();

        let response = dispatcher
            .dispatch(Request::new("explode"), &test_session())
            .await;
        assert!(!response.success);
        assert_eq!(response.method_name, "explode");
        assert_eq!(response.payload["error_code"], "MethodInternal");
        assert_eq!(response.payload["details"]["kind"], "panic");
    }

    #[tokio::test]
    async fn test_undecodable_frame_gets_zero_trace() {
        let dispatcher = echo_dispatcher();
        let response = dispatcher
            .dispatch_frame(b"no braces here", &test_session())
            .await;
        assert!(!response.success);
        assert_eq!(response.method_name, WARNING_METHOD);
        assert_eq!(response.trace_id, ZERO_TRACE_ID);
    }

    #[tokio::test]
    async fn test_handler_sees_session() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("whoami", |_request: Request, session: Arc<Session>| async move {
                let mut payload = Map::new();
                payload.insert("session_id".to_string(), json!(session.id));
                Ok(payload)
            })
            .unwrap();

        let session = test_session();
        let response = dispatcher.dispatch(Request::new("whoami"), &session).await;
        assert!(response.success);
        assert_eq!(response.payload["session_id"], json!(session.id));
    }

    #[tokio::test]
    async fn test_schema_validation_before_handler() {
        let schema = AnnotationSchema::from_str(
            r#"{"methods": {"echo": {"request": {"n": "int"}, "response": {"n": "int"}}}}"#,
        )
        .unwrap();
        let compiled = Arc::new(CompiledSchema::compile(&schema).unwrap());
        let dispatcher = echo_dispatcher().with_schema(compiled);

        let mut payload = Map::new();
        payload.insert("n".to_string(), json!("not an int"));
        let response = dispatcher
            .dispatch(
                Request::new("echo").with_payload(payload),
                &test_session(),
            )
            .await;
        assert!(!response.success);
        assert_eq!(response.payload["error_code"], "ValidationError");
        assert_eq!(response.payload["details"]["field"], "n");
    }

    #[tokio::test]
    async fn test_register_replaces_existing() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("ping", |_req: Request, _session| async move {
                let mut payload = Map::new();
                payload.insert("version".to_string(), json!(1));
                Ok(payload)
            })
            .unwrap();
        dispatcher
            .register("ping", |_req: Request, _session| async move {
                let mut payload = Map::new();
                payload.insert("version".to_string(), json!(2));
                Ok(payload)
            })
            .unwrap();

        let response = dispatcher
            .dispatch(Request::new("ping"), &test_session())
            .await;
        assert_eq!(response.payload["version"], 2);
    }

    #[test]
    fn test_register_rejects_reserved() {
        let mut dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.register("__error", |_req: Request, _session| async move {
                Ok(Map::new())
            }),
            Err(ServerError::ReservedMethod(_))
        ));
        assert!(matches!(
            dispatcher.register("", |_req: Request, _session| async move { Ok(Map::new()) }),
            Err(ServerError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_include_merges_registrations() {
        let mut base = Dispatcher::new();
        base.register("ping", |_req: Request, _session| async move {
            Ok(Map::new())
        })
        .unwrap();

        let mut extra = Dispatcher::new();
        extra
            .register("pong", |_req: Request, _session| async move { Ok(Map::new()) })
            .unwrap();

        base.include(extra);
        let mut names = base.method_names();
        names.sort_unstable();
        assert_eq!(names, ["ping", "pong"]);
    }

    #[tokio::test]
    async fn test_include_overwrites_clashing_names() {
        let mut base = Dispatcher::new();
        base.register("ping", |_req: Request, _session| async move {
            let mut payload = Map::new();
            payload.insert("version".to_string(), json!(1));
            Ok(payload)
        })
        .unwrap();

        let mut overlay = Dispatcher::new();
        overlay
            .register("ping", |_req: Request, _session| async move {
                let mut payload = Map::new();
                payload.insert("version".to_string(), json!(2));
                Ok(payload)
            })
            .unwrap();

        base.include(overlay);
        let response = base.dispatch(Request::new("ping"), &test_session()).await;
        assert_eq!(response.payload["version"], 2);
    }
}
