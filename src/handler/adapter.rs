//! Adapters from each supported handler shape to [`Handler`].
//!
//! Every adapter applies the same response contract:
//! - an error is logged with the request URL and answered `500 Internal Server Error`
//! - `None` is answered `204 No Content` with an empty body
//! - `Some(value)` is encoded as JSON and answered `200`
//! - raw handlers get the exchange untouched and own the response

use axum::http::StatusCode;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

use crate::context::Context;
use crate::handler::{Handler, JsonMap, INTERNAL_SERVER_ERROR};
use crate::http::Exchange;
use crate::observability::metrics;

/// Handler taking the context and writing its own response.
pub fn from_ctx<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Context handler that may fail.
pub fn from_ctx_result<F, E>(f: F) -> Handler
where
    F: Fn(&mut Context) -> Result<(), E> + Send + Sync + 'static,
    E: Display,
{
    from_ctx(move |ctx| {
        if let Err(err) = f(ctx) {
            fail(ctx, &err);
        }
    })
}

/// No arguments, no result.
pub fn from_fn<F>(f: F) -> Handler
where
    F: Fn() + Send + Sync + 'static,
{
    from_ctx(move |_| f())
}

/// No arguments, may fail.
pub fn from_result<F, E>(f: F) -> Handler
where
    F: Fn() -> Result<(), E> + Send + Sync + 'static,
    E: Display,
{
    from_ctx(move |ctx| {
        if let Err(err) = f() {
            fail(ctx, &err);
        }
    })
}

/// Handler working directly on the raw exchange.
///
/// An unbound context gets a fresh empty exchange instead of failing.
pub fn from_raw<F>(f: F) -> Handler
where
    F: Fn(&mut Exchange) + Send + Sync + 'static,
{
    from_ctx(move |ctx| match ctx.exchange_mut() {
        Some(exchange) => f(exchange),
        None => f(&mut Exchange::default()),
    })
}

/// Raw exchange handler that may fail.
pub fn from_raw_result<F, E>(f: F) -> Handler
where
    F: Fn(&mut Exchange) -> Result<(), E> + Send + Sync + 'static,
    E: Display,
{
    from_ctx(move |ctx| {
        let result = match ctx.exchange_mut() {
            Some(exchange) => f(exchange),
            None => f(&mut Exchange::default()),
        };
        if let Err(err) = result {
            fail(ctx, &err);
        }
    })
}

/// Context handler returning an optional JSON object.
pub fn from_ctx_map<F>(f: F) -> Handler
where
    F: Fn(&mut Context) -> Option<JsonMap> + Send + Sync + 'static,
{
    from_ctx_json(f)
}

pub fn from_ctx_map_result<F, E>(f: F) -> Handler
where
    F: Fn(&mut Context) -> Result<Option<JsonMap>, E> + Send + Sync + 'static,
    E: Display,
{
    from_ctx_json_result(f)
}

/// Context handler returning any optional serializable value.
pub fn from_ctx_json<F, T>(f: F) -> Handler
where
    F: Fn(&mut Context) -> Option<T> + Send + Sync + 'static,
    T: Serialize,
{
    from_ctx(move |ctx| {
        let value = f(ctx);
        respond(ctx, value);
    })
}

pub fn from_ctx_json_result<F, T, E>(f: F) -> Handler
where
    F: Fn(&mut Context) -> Result<Option<T>, E> + Send + Sync + 'static,
    T: Serialize,
    E: Display,
{
    from_ctx(move |ctx| match f(ctx) {
        Ok(value) => respond(ctx, value),
        Err(err) => fail(ctx, &err),
    })
}

pub fn from_map<F>(f: F) -> Handler
where
    F: Fn() -> Option<JsonMap> + Send + Sync + 'static,
{
    from_json(f)
}

pub fn from_map_result<F, E>(f: F) -> Handler
where
    F: Fn() -> Result<Option<JsonMap>, E> + Send + Sync + 'static,
    E: Display,
{
    from_json_result(f)
}

pub fn from_json<F, T>(f: F) -> Handler
where
    F: Fn() -> Option<T> + Send + Sync + 'static,
    T: Serialize,
{
    from_ctx(move |ctx| respond(ctx, f()))
}

pub fn from_json_result<F, T, E>(f: F) -> Handler
where
    F: Fn() -> Result<Option<T>, E> + Send + Sync + 'static,
    T: Serialize,
    E: Display,
{
    from_ctx(move |ctx| match f() {
        Ok(value) => respond(ctx, value),
        Err(err) => fail(ctx, &err),
    })
}

/// Write a structured result: 204 for `None`, JSON otherwise.
fn respond<T: Serialize>(ctx: &mut Context, value: Option<T>) {
    let Some(value) = value else {
        ctx.set_status(StatusCode::NO_CONTENT);
        if let Some(ex) = ctx.exchange_mut() {
            ex.reset_body();
        }
        return;
    };

    if let Err(err) = ctx.json(&value) {
        {
            let _entered = ctx.logger().map(tracing::Span::enter);
            tracing::error!(url = %ctx.uri(), error = %err, "Failed to encode JSON response");
        }
        metrics::record_handler_error("encode");
        ctx.error(INTERNAL_SERVER_ERROR, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

fn fail(ctx: &mut Context, err: &dyn Display) {
    ctx.log_error(err);
    metrics::record_handler_error("handler");
    ctx.error(INTERNAL_SERVER_ERROR, StatusCode::INTERNAL_SERVER_ERROR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use axum::http::{header, Request};
    use bytes::Bytes;
    use serde_json::json;

    fn run(handler: &Handler) -> Exchange {
        let app = App::new();
        let mut ctx = Context::default();
        let request = Request::builder()
            .uri("/things/1")
            .body(Bytes::new())
            .unwrap();
        ctx.bind(Exchange::new(request), &app);
        handler(&mut ctx);
        ctx.take_exchange().unwrap()
    }

    fn assert_500(ex: &Exchange) {
        assert_eq!(ex.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ex.response_body(), INTERNAL_SERVER_ERROR.as_bytes());
    }

    fn assert_204(ex: &Exchange) {
        assert_eq!(ex.status(), StatusCode::NO_CONTENT);
        assert!(ex.response_body().is_empty());
    }

    fn assert_json(ex: &Exchange, expected: serde_json::Value) {
        assert_eq!(ex.status(), StatusCode::OK);
        assert_eq!(
            ex.response_headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        let body: serde_json::Value = serde_json::from_slice(ex.response_body()).unwrap();
        assert_eq!(body, expected);
    }

    fn ok_map() -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("ok".into(), json!(true));
        map
    }

    #[test]
    fn test_error_shapes_answer_500() {
        let handlers = [
            from_result(|| Err("boom")),
            from_ctx_result(|_| Err("boom")),
            from_raw_result(|_| Err("boom")),
            from_map_result(|| Err::<Option<JsonMap>, _>("boom")),
            from_ctx_map_result(|_| Err::<Option<JsonMap>, _>("boom")),
            from_json_result(|| Err::<Option<u32>, _>("boom")),
            from_ctx_json_result(|_| Err::<Option<u32>, _>("boom")),
        ];
        for handler in &handlers {
            assert_500(&run(handler));
        }
    }

    #[test]
    fn test_error_discards_partial_output() {
        let handler = from_ctx_result(|ctx| {
            ctx.write("half a response");
            Err("boom")
        });
        assert_500(&run(&handler));
    }

    #[test]
    fn test_none_shapes_answer_204() {
        let handlers = [
            from_map(|| None),
            from_ctx_map(|_| None),
            from_map_result(|| Ok::<_, String>(None)),
            from_ctx_map_result(|_| Ok::<_, String>(None)),
            from_json(|| None::<u8>),
            from_ctx_json(|_| None::<u8>),
            from_json_result(|| Ok::<Option<u8>, String>(None)),
            from_ctx_json_result(|_| Ok::<Option<u8>, String>(None)),
        ];
        for handler in &handlers {
            assert_204(&run(handler));
        }
    }

    #[test]
    fn test_value_shapes_answer_json() {
        let handlers = [
            from_map(|| Some(ok_map())),
            from_ctx_map(|_| Some(ok_map())),
            from_map_result(|| Ok::<_, String>(Some(ok_map()))),
            from_ctx_map_result(|_| Ok::<_, String>(Some(ok_map()))),
            from_json(|| Some(json!({"ok": true}))),
            from_ctx_json(|_| Some(json!({"ok": true}))),
            from_json_result(|| Ok::<_, String>(Some(json!({"ok": true})))),
            from_ctx_json_result(|_| Ok::<_, String>(Some(json!({"ok": true})))),
        ];
        for handler in &handlers {
            let ex = run(handler);
            assert_json(&ex, json!({"ok": true}));
            assert_eq!(ex.response_body(), br#"{"ok":true}"#);
        }
    }

    #[test]
    fn test_struct_round_trips() {
        #[derive(Serialize, serde::Deserialize, Debug, PartialEq, Clone)]
        struct Item {
            id: u32,
            tags: Vec<String>,
        }

        let item = Item { id: 1, tags: vec!["a".into()] };
        let returned = item.clone();
        let ex = run(&from_ctx_json(move |_| Some(returned.clone())));

        let decoded: Item = serde_json::from_slice(ex.response_body()).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_empty_map_is_not_absent() {
        let ex = run(&from_map(|| Some(JsonMap::new())));
        assert_json(&ex, json!({}));
    }

    #[test]
    fn test_encoding_failure_answers_500() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("cannot encode"))
            }
        }

        assert_500(&run(&from_json(|| Some(Broken))));
    }

    #[test]
    fn test_plain_shapes_leave_response_alone() {
        let ex = run(&from_fn(|| {}));
        assert_eq!(ex.status(), StatusCode::OK);
        assert!(ex.response_body().is_empty());

        let ex = run(&from_result(|| Ok::<(), String>(())));
        assert_eq!(ex.status(), StatusCode::OK);

        let ex = run(&from_ctx(|ctx| ctx.write("hi")));
        assert_eq!(ex.response_body(), b"hi");
    }

    #[test]
    fn test_raw_handler_sees_exchange() {
        let handler = from_raw(|ex| {
            let path = ex.path().to_string();
            ex.set_status(StatusCode::ACCEPTED);
            ex.write(path.as_bytes());
        });
        let ex = run(&handler);
        assert_eq!(ex.status(), StatusCode::ACCEPTED);
        assert_eq!(ex.response_body(), b"/things/1");
    }

    #[test]
    fn test_raw_handler_on_unbound_context() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_in = seen.clone();
        let handler = from_raw(move |ex| {
            *seen_in.lock().unwrap() = Some(ex.path().to_string());
        });

        let mut ctx = Context::default();
        handler(&mut ctx);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("/"));

        let failing = from_raw_result(|_| Err("boom"));
        failing(&mut ctx);
        assert!(ctx.exchange().is_none());
    }
}
